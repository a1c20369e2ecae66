//! Accessors over a guest's linear memory.
//!
//! A [`MemoryView`] borrows the guest memory slice for exactly one host call.
//! Linear memory can grow (and move) whenever the guest runs, so a view must
//! be rebuilt from the runtime's memory handle after every call back into the
//! guest. The borrow on the slice makes holding one across such a call a
//! compile error rather than a stale pointer.
//!
//! All multi-byte values are little-endian, as in the wasm memory model.

use std::ops::Range;

use thiserror::Error;

/// Upper bound on the bytes scanned by [`MemoryView::read_cstring`].
pub const CSTRING_LIMIT: usize = 0x7FFF_FFFF;

/// Errors raised by guest memory accesses.
///
/// These are caller contract violations: the guest handed the host a range
/// its own allocator never produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// The requested range does not fit in linear memory.
    #[error("guest memory access out of bounds: offset {offset}, len {len}, memory size {size}")]
    OutOfBounds { offset: u64, len: u64, size: usize },
}

/// A bounds-checked window over guest linear memory.
pub struct MemoryView<'a> {
    bytes: &'a mut [u8],
}

impl<'a> MemoryView<'a> {
    /// Wrap the current linear memory slice.
    pub fn new(bytes: &'a mut [u8]) -> Self {
        Self { bytes }
    }

    /// Current size of linear memory in bytes.
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    fn range(&self, offset: u32, len: usize) -> Result<Range<usize>, MemoryError> {
        let start = offset as usize;
        start
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .map(|end| start..end)
            .ok_or(MemoryError::OutOfBounds {
                offset: u64::from(offset),
                len: len as u64,
                size: self.bytes.len(),
            })
    }

    fn array<const N: usize>(&self, offset: u32) -> Result<[u8; N], MemoryError> {
        let range = self.range(offset, N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[range]);
        Ok(out)
    }

    pub fn read_u32(&self, offset: u32) -> Result<u32, MemoryError> {
        self.array(offset).map(u32::from_le_bytes)
    }

    pub fn read_u16(&self, offset: u32) -> Result<u16, MemoryError> {
        self.array(offset).map(u16::from_le_bytes)
    }

    pub fn read_i32(&self, offset: u32) -> Result<i32, MemoryError> {
        self.array(offset).map(i32::from_le_bytes)
    }

    pub fn read_i8(&self, offset: u32) -> Result<i8, MemoryError> {
        self.array(offset).map(i8::from_le_bytes)
    }

    pub fn read_f32(&self, offset: u32) -> Result<f32, MemoryError> {
        self.array(offset).map(f32::from_le_bytes)
    }

    pub fn read_u64(&self, offset: u32) -> Result<u64, MemoryError> {
        self.array(offset).map(u64::from_le_bytes)
    }

    pub fn write_u32(&mut self, offset: u32, value: u32) -> Result<(), MemoryError> {
        self.copy_in(offset, &value.to_le_bytes())
    }

    pub fn write_u16(&mut self, offset: u32, value: u16) -> Result<(), MemoryError> {
        self.copy_in(offset, &value.to_le_bytes())
    }

    pub fn write_i32(&mut self, offset: u32, value: i32) -> Result<(), MemoryError> {
        self.copy_in(offset, &value.to_le_bytes())
    }

    pub fn write_i8(&mut self, offset: u32, value: i8) -> Result<(), MemoryError> {
        self.copy_in(offset, &value.to_le_bytes())
    }

    pub fn write_f32(&mut self, offset: u32, value: f32) -> Result<(), MemoryError> {
        self.copy_in(offset, &value.to_le_bytes())
    }

    pub fn write_u64(&mut self, offset: u32, value: u64) -> Result<(), MemoryError> {
        self.copy_in(offset, &value.to_le_bytes())
    }

    /// Read a NUL-terminated string.
    ///
    /// Stops at the first NUL, at the end of linear memory, or after
    /// [`CSTRING_LIMIT`] bytes, whichever comes first. Invalid UTF-8 is
    /// replaced rather than rejected.
    pub fn read_cstring(&self, offset: u32) -> Result<String, MemoryError> {
        let start = self.range(offset, 0)?.start;
        let window = &self.bytes[start..];
        let window = &window[..window.len().min(CSTRING_LIMIT)];
        let end = window.iter().position(|b| *b == 0).unwrap_or(window.len());
        Ok(String::from_utf8_lossy(&window[..end]).into_owned())
    }

    /// Write `text` as a NUL-terminated string into a buffer of `capacity`
    /// bytes.
    ///
    /// The text is cut to `capacity - 1` bytes so the terminator always fits.
    /// A zero capacity writes nothing. Returns the number of text bytes
    /// written, excluding the terminator.
    pub fn write_cstring(
        &mut self,
        text: &str,
        offset: u32,
        capacity: u32,
    ) -> Result<usize, MemoryError> {
        if capacity == 0 {
            return Ok(0);
        }

        let len = text.len().min(capacity as usize - 1);
        let range = self.range(offset, len + 1)?;
        let dst = &mut self.bytes[range];
        dst[..len].copy_from_slice(&text.as_bytes()[..len]);
        dst[len] = 0;
        Ok(len)
    }

    /// Copy host bytes into guest memory.
    pub fn copy_in(&mut self, offset: u32, bytes: &[u8]) -> Result<(), MemoryError> {
        let range = self.range(offset, bytes.len())?;
        self.bytes[range].copy_from_slice(bytes);
        Ok(())
    }

    /// Borrow a range of guest memory without copying.
    pub fn bytes(&self, offset: u32, len: u32) -> Result<&[u8], MemoryError> {
        let range = self.range(offset, len as usize)?;
        Ok(&self.bytes[range])
    }

    /// Mutably borrow a range of guest memory without copying.
    pub fn bytes_mut(&mut self, offset: u32, len: u32) -> Result<&mut [u8], MemoryError> {
        let range = self.range(offset, len as usize)?;
        Ok(&mut self.bytes[range])
    }
}
