//! GL object names. Only lifetimes and bindings cross the bridge.

use wasmtime::{Caller, Linker};

use super::ENV;
use crate::context::BridgeContext;
use crate::error::Trap;
use crate::gfx::GpuKind;
use crate::heap::split;

fn name_bytes(n: u32) -> Result<u32, Trap> {
    n.checked_mul(4).ok_or(Trap::NameCount(n))
}

/// `glGen*(n, ids)`: write `n` fresh names to `ids`. The whole array is
/// checked before any object is created.
fn gen_names(
    caller: &mut Caller<'_, BridgeContext>,
    kind: GpuKind,
    n: u32,
    ids: u32,
) -> wasmtime::Result<()> {
    let (mut view, cx) = split(caller)?;
    let slots = view.bytes_mut(ids, name_bytes(n)?)?;
    for slot in slots.chunks_exact_mut(4) {
        let name = cx.gfx.create(kind).map_err(Trap::from)?;
        slot.copy_from_slice(&name.to_le_bytes());
    }
    Ok(())
}

/// `glDelete*(n, ids)`
fn delete_names(
    caller: &mut Caller<'_, BridgeContext>,
    kind: GpuKind,
    n: u32,
    ids: u32,
) -> wasmtime::Result<()> {
    let (view, cx) = split(caller)?;
    for slot in view.bytes(ids, name_bytes(n)?)?.chunks_exact(4) {
        let name = u32::from_le_bytes([slot[0], slot[1], slot[2], slot[3]]);
        cx.gfx.delete(kind, name).map_err(Trap::from)?;
    }
    Ok(())
}

macro_rules! object_functions {
    ($linker:expr, $kind:expr, $gen:literal, $delete:literal, $bind:literal) => {
        $linker.func_wrap(
            ENV,
            $gen,
            |mut caller: Caller<'_, BridgeContext>, n: u32, ids: u32| {
                gen_names(&mut caller, $kind, n, ids)
            },
        )?;
        $linker.func_wrap(
            ENV,
            $delete,
            |mut caller: Caller<'_, BridgeContext>, n: u32, ids: u32| {
                delete_names(&mut caller, $kind, n, ids)
            },
        )?;
        $linker.func_wrap(
            ENV,
            $bind,
            |mut caller: Caller<'_, BridgeContext>,
             target: u32,
             name: u32|
             -> wasmtime::Result<()> {
                caller
                    .data_mut()
                    .gfx
                    .bind($kind, target, name)
                    .map_err(Trap::from)?;
                Ok(())
            },
        )?;
    };
}

pub(super) fn register_gfx_functions(linker: &mut Linker<BridgeContext>) -> wasmtime::Result<()> {
    object_functions!(
        linker,
        GpuKind::Texture,
        "glGenTextures",
        "glDeleteTextures",
        "glBindTexture"
    );
    object_functions!(
        linker,
        GpuKind::Buffer,
        "glGenBuffers",
        "glDeleteBuffers",
        "glBindBuffer"
    );
    object_functions!(
        linker,
        GpuKind::Framebuffer,
        "glGenFramebuffers",
        "glDeleteFramebuffers",
        "glBindFramebuffer"
    );

    linker.func_wrap(
        ENV,
        "glCreateProgram",
        |mut caller: Caller<'_, BridgeContext>| -> wasmtime::Result<u32> {
            Ok(caller
                .data_mut()
                .gfx
                .create(GpuKind::Program)
                .map_err(Trap::from)?)
        },
    )?;

    linker.func_wrap(
        ENV,
        "glCreateShader",
        |mut caller: Caller<'_, BridgeContext>, _shader_type: u32| -> wasmtime::Result<u32> {
            Ok(caller
                .data_mut()
                .gfx
                .create(GpuKind::Shader)
                .map_err(Trap::from)?)
        },
    )?;

    linker.func_wrap(
        ENV,
        "glDeleteProgram",
        |mut caller: Caller<'_, BridgeContext>, program: u32| -> wasmtime::Result<()> {
            caller
                .data_mut()
                .gfx
                .delete(GpuKind::Program, program)
                .map_err(Trap::from)?;
            Ok(())
        },
    )?;

    linker.func_wrap(
        ENV,
        "glDeleteShader",
        |mut caller: Caller<'_, BridgeContext>, shader: u32| -> wasmtime::Result<()> {
            caller
                .data_mut()
                .gfx
                .delete(GpuKind::Shader, shader)
                .map_err(Trap::from)?;
            Ok(())
        },
    )?;

    linker.func_wrap(
        ENV,
        "glUseProgram",
        |mut caller: Caller<'_, BridgeContext>, program: u32| -> wasmtime::Result<()> {
            caller
                .data_mut()
                .gfx
                .use_program(program)
                .map_err(Trap::from)?;
            Ok(())
        },
    )?;

    linker.func_wrap(
        ENV,
        "glAttachShader",
        |mut caller: Caller<'_, BridgeContext>,
         program: u32,
         shader: u32|
         -> wasmtime::Result<()> {
            caller
                .data_mut()
                .gfx
                .attach_shader(program, shader)
                .map_err(Trap::from)?;
            Ok(())
        },
    )?;

    Ok(())
}
