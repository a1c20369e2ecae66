//! Guest memory and functions as seen from inside an import call.

use hostlink_core::{GuestHeap, MemoryView};
use wasmtime::{Caller, Extern, Memory, TypedFunc, WasmParams, WasmResults};

use crate::context::{BridgeContext, ResponseCallback};
use crate::error::Trap;

pub(crate) const MEMORY_EXPORT: &str = "memory";
pub(crate) const FUNCTION_TABLE_EXPORT: &str = "__indirect_function_table";

pub(crate) fn guest_memory(caller: &mut Caller<'_, BridgeContext>) -> wasmtime::Result<Memory> {
    let memory = caller
        .get_export(MEMORY_EXPORT)
        .and_then(Extern::into_memory)
        .ok_or(Trap::MissingExport(MEMORY_EXPORT))?;
    Ok(memory)
}

/// Borrow linear memory and the bridge state at the same time.
pub(crate) fn split<'a>(
    caller: &'a mut Caller<'_, BridgeContext>,
) -> wasmtime::Result<(MemoryView<'a>, &'a mut BridgeContext)> {
    let memory = guest_memory(caller)?;
    let (bytes, context) = memory.data_and_store_mut(caller);
    Ok((MemoryView::new(bytes), context))
}

/// Resolve a C function pointer to a typed function.
pub(crate) fn table_func<P, R>(
    caller: &mut Caller<'_, BridgeContext>,
    index: u32,
) -> wasmtime::Result<TypedFunc<P, R>>
where
    P: WasmParams,
    R: WasmResults,
{
    let table = caller
        .get_export(FUNCTION_TABLE_EXPORT)
        .and_then(Extern::into_table)
        .ok_or(Trap::MissingExport(FUNCTION_TABLE_EXPORT))?;
    let func = table
        .get(&mut *caller, u64::from(index))
        .and_then(|entry| entry.as_func().flatten().cloned())
        .ok_or(Trap::NoFunction(index))?;
    func.typed::<P, R>(&*caller)
}

/// [`GuestHeap`] over a live import call.
pub(crate) struct WasmHeap<'a, 'b> {
    caller: &'a mut Caller<'b, BridgeContext>,
    memory: Memory,
}

impl<'a, 'b> WasmHeap<'a, 'b> {
    pub(crate) fn new(caller: &'a mut Caller<'b, BridgeContext>) -> wasmtime::Result<Self> {
        let memory = guest_memory(caller)?;
        Ok(Self { caller, memory })
    }
}

impl GuestHeap for WasmHeap<'_, '_> {
    type Callback = ResponseCallback;
    type Error = wasmtime::Error;

    fn view(&mut self) -> MemoryView<'_> {
        MemoryView::new(self.memory.data_mut(&mut *self.caller))
    }

    fn alloc(&mut self, size: u32) -> wasmtime::Result<u32> {
        let allocator = self
            .caller
            .data()
            .allocator
            .clone()
            .ok_or(Trap::NoAllocator)?;
        allocator.alloc.call(&mut *self.caller, (size, 1))
    }

    fn free(&mut self, ptr: u32) -> wasmtime::Result<()> {
        if ptr == 0 {
            return Ok(());
        }
        let allocator = self
            .caller
            .data()
            .allocator
            .clone()
            .ok_or(Trap::NoAllocator)?;
        allocator.free.call(&mut *self.caller, ptr)
    }

    fn invoke(
        &mut self,
        callback: &ResponseCallback,
        status: u16,
        response_out: u32,
        size_out: u32,
    ) -> wasmtime::Result<()> {
        callback.call(
            &mut *self.caller,
            (u32::from(status), response_out, size_out),
        )
    }
}
