use crate::memory::{MemoryError, MemoryView};

/// The guest-side services a host operation needs while it runs: memory
/// access, the guest's own allocator, and calls back into guest code.
///
/// Implementations must hand out a fresh [`MemoryView`] on every call to
/// [`GuestHeap::view`]; any of the other methods may run guest code that grows
/// linear memory.
pub trait GuestHeap {
    /// A guest function resolved ahead of time.
    type Callback;
    type Error: From<MemoryError>;

    fn view(&mut self) -> MemoryView<'_>;

    /// Allocate `size` bytes with the guest's allocator. A zero result is the
    /// guest's own failure signal and is passed through unchanged.
    fn alloc(&mut self, size: u32) -> Result<u32, Self::Error>;

    fn free(&mut self, ptr: u32) -> Result<(), Self::Error>;

    /// Invoke a request completion callback with the status code and the
    /// addresses of the response pointer and size slots.
    fn invoke(
        &mut self,
        callback: &Self::Callback,
        status: u16,
        response_out: u32,
        size_out: u32,
    ) -> Result<(), Self::Error>;
}
