//! Host key-value persistence for guest filesystems.
//!
//! Keys are guest paths and values are opaque strings (the filesystem shim
//! stores one base64 blob per path). Nothing here interprets either.
//!
//! # Example
//!
//! ```rust
//! use hostlink_kv::{KvStore, KvWriter, MemoryKv};
//!
//! fn seed(store: &mut dyn KvStore) {
//!     store.set("/config.ini", "W2FwcF0=".to_string()).unwrap();
//! }
//!
//! let mut store = MemoryKv::new();
//! seed(&mut store);
//! ```

mod disk;
mod error;
mod memory;
mod traits;

pub use disk::DiskKv;
pub use error::KvError;
pub use memory::MemoryKv;
pub use traits::{KvReader, KvStore, KvWriter};
