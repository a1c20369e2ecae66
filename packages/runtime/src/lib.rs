//! Run a WASI guest against the hostlink bridge.
//!
//! The guest is a core module built for `wasm32-wasi` that also imports a
//! small `env` surface for networking, a frame loop and GL object names.
//! Everything it can reach lives in a [`BridgeContext`]:
//!
//! - files are entries in a [`KvStore`](hostlink_kv::KvStore), one base64
//!   blob per path ([`VirtualFs`]);
//! - HTTP requests run on a tokio pool and are observed by polling
//!   ([`RequestTable`](hostlink_http::RequestTable));
//! - GL objects are generational handles ([`Graphics`]).
//!
//! # Example
//!
//! ```no_run
//! use hostlink_runtime::{BridgeConfig, BridgeContext, GuestModule, RunOutcome};
//!
//! let config = BridgeConfig::default();
//! let context = BridgeContext::open(&config)?;
//! let outcome = GuestModule::from_file("guest.wasm")?.run(context)?;
//! assert_eq!(outcome, RunOutcome::Returned);
//! # Ok::<(), hostlink_runtime::BridgeError>(())
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod gfx;
mod heap;
pub mod host;
pub mod imports;
pub mod vfs;

pub use config::{BridgeConfig, FrameConfig, FsConfig, ReadMode};
pub use context::{BridgeContext, FrameLoop, GuestAllocator, ResponseCallback};
pub use error::{BridgeError, FrameLoopInstalled, GuestExit, Result, Trap};
pub use gfx::{GfxError, GpuKind, GpuObject, Graphics, GraphicsBackend, HeadlessGraphics};
pub use host::{GuestInstance, GuestModule, RunOutcome};
pub use vfs::{Errno, FileKind, VirtualFs, Whence};
