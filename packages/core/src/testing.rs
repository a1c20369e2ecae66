//! In-process fakes for exercising host operations without a wasm engine.

use crate::heap::GuestHeap;
use crate::memory::{MemoryError, MemoryView};

/// Callback type understood by [`VecHeap`].
pub type VecCallback = fn(&mut MemoryView<'_>, u16, u32, u32);

/// A [`GuestHeap`] over a plain byte vector with a bump allocator.
///
/// Every allocation, free, and callback invocation is recorded so tests can
/// assert on the exact guest-visible side effects.
pub struct VecHeap {
    pub memory: Vec<u8>,
    pub allocs: Vec<(u32, u32)>,
    pub frees: Vec<u32>,
    pub calls: Vec<(u16, u32, u32)>,
    next: u32,
    fail_alloc: bool,
}

impl VecHeap {
    /// Allocations start at this offset; lower addresses are free for test
    /// scratch slots.
    pub const HEAP_BASE: u32 = 1024;

    pub fn new(size: usize) -> Self {
        Self {
            memory: vec![0; size],
            allocs: Vec::new(),
            frees: Vec::new(),
            calls: Vec::new(),
            next: Self::HEAP_BASE,
            fail_alloc: false,
        }
    }

    /// Make every subsequent allocation return zero.
    pub fn failing_alloc(mut self) -> Self {
        self.fail_alloc = true;
        self
    }

    pub fn read_u32(&self, offset: u32) -> u32 {
        let at = offset as usize;
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.memory[at..at + 4]);
        u32::from_le_bytes(raw)
    }

    pub fn read_u16(&self, offset: u32) -> u16 {
        let at = offset as usize;
        u16::from_le_bytes([self.memory[at], self.memory[at + 1]])
    }

    pub fn write_u32(&mut self, offset: u32, value: u32) {
        let at = offset as usize;
        self.memory[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }
}

impl GuestHeap for VecHeap {
    type Callback = VecCallback;
    type Error = MemoryError;

    fn view(&mut self) -> MemoryView<'_> {
        MemoryView::new(&mut self.memory)
    }

    fn alloc(&mut self, size: u32) -> Result<u32, MemoryError> {
        let end = u64::from(self.next) + u64::from(size);
        if self.fail_alloc || end > self.memory.len() as u64 {
            return Ok(0);
        }

        let ptr = self.next;
        self.next = (end as u32).next_multiple_of(8);
        self.allocs.push((ptr, size));
        Ok(ptr)
    }

    fn free(&mut self, ptr: u32) -> Result<(), MemoryError> {
        self.frees.push(ptr);
        Ok(())
    }

    fn invoke(
        &mut self,
        callback: &VecCallback,
        status: u16,
        response_out: u32,
        size_out: u32,
    ) -> Result<(), MemoryError> {
        self.calls.push((status, response_out, size_out));
        callback(&mut self.view(), status, response_out, size_out);
        Ok(())
    }
}

/// A callback that leaves the response untouched.
pub fn noop_callback(_: &mut MemoryView<'_>, _: u16, _: u32, _: u32) {}
