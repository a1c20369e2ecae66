//! Error types for the bridge runtime.

use thiserror::Error;

/// Errors that can occur setting up or running a guest.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// An I/O error occurred.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The config file could not be parsed.
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    /// The host key-value store failed.
    #[error("store error: {0}")]
    Store(#[from] hostlink_kv::KvError),

    /// The HTTP layer could not be started.
    #[error("http error: {0}")]
    Http(#[from] hostlink_http::Error),

    /// The guest does not export something the bridge requires.
    #[error("export not found: {0}")]
    ExportNotFound(String),

    /// The engine failed at the named stage.
    #[error("wasmtime {stage} failed: {message}")]
    Wasm {
        stage: &'static str,
        message: String,
    },
}

impl BridgeError {
    pub(crate) fn wasm(stage: &'static str, error: impl std::fmt::Display) -> Self {
        BridgeError::Wasm {
            stage,
            message: format!("{error:#}"),
        }
    }
}

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Trap raised by `proc_exit`; unwinds the guest with its exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("guest exited with status {0}")]
pub struct GuestExit(pub i32);

/// Trap raised by `web_raf` to unwind `_start` once the frame loop is
/// installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("guest handed control to the frame loop")]
pub struct FrameLoopInstalled;

/// Caller-contract violations. Raised from import functions, these abort
/// the guest with a trap.
#[derive(Debug, Error)]
pub enum Trap {
    #[error(transparent)]
    Graphics(#[from] crate::gfx::GfxError),

    #[error("name count {0} does not fit in memory")]
    NameCount(u32),

    #[error("guest does not export `{0}`")]
    MissingExport(&'static str),

    #[error("no function at table index {0}")]
    NoFunction(u32),

    #[error("web_set_mem_funcs has not been called")]
    NoAllocator,
}
