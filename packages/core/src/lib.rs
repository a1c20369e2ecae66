//! Host-side primitives shared by every hostlink bridge component.
//!
//! - [`memory`]: bounds-checked little-endian access to guest linear memory.
//! - [`handle`]: generational handle tables for host resources.
//! - [`heap`]: the seam through which host code allocates in, and calls back
//!   into, the guest.

pub mod handle;
pub mod heap;
pub mod memory;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use handle::{Handle, HandleError, HandleTable};
pub use heap::GuestHeap;
pub use memory::{MemoryError, MemoryView, CSTRING_LIMIT};
