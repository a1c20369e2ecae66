use tracing::debug;
use wasmtime::{Caller, Linker};

use super::ENV;
use crate::context::{BridgeContext, FrameFunc, FrameLoop, GuestAllocator};
use crate::error::FrameLoopInstalled;
use crate::heap::table_func;

pub(super) fn register_web_functions(linker: &mut Linker<BridgeContext>) -> wasmtime::Result<()> {
    linker.func_wrap(
        ENV,
        "web_set_mem_funcs",
        |mut caller: Caller<'_, BridgeContext>, alloc: u32, free: u32| -> wasmtime::Result<()> {
            let allocator = GuestAllocator {
                alloc: table_func(&mut caller, alloc)?,
                free: table_func(&mut caller, free)?,
            };
            debug!(alloc, free, "guest allocator registered");
            caller.data_mut().allocator = Some(allocator);
            Ok(())
        },
    )?;

    // Installs the frame step and unwinds `_start`; the host drives frames
    // from then on.
    linker.func_wrap(
        ENV,
        "web_raf",
        |mut caller: Caller<'_, BridgeContext>,
         _app: u32,
         func: u32,
         _controller: u32,
         opaque: u32|
         -> wasmtime::Result<()> {
            let step: FrameFunc = table_func(&mut caller, func)?;
            debug!(func, opaque, "frame loop installed");
            caller.data_mut().frame = Some(FrameLoop { step, opaque });
            Err(wasmtime::Error::new(FrameLoopInstalled))
        },
    )?;

    Ok(())
}
