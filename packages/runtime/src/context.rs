//! Per-guest bridge state.
//!
//! One [`BridgeContext`] is the data of one wasmtime `Store`. It owns every
//! resource the guest can name: open descriptors, HTTP requests, graphics
//! objects and the guest functions the host calls back into.

use std::sync::Arc;
use std::time::{Duration, Instant};

use hostlink_http::{HttpExecutor, ReqwestExecutor, RequestTable};
use hostlink_kv::{DiskKv, KvStore, MemoryKv};
use tracing::debug;
use wasmtime::TypedFunc;

use crate::config::{BridgeConfig, FrameConfig};
use crate::error::Result;
use crate::gfx::{Graphics, GraphicsBackend};
use crate::vfs::VirtualFs;

/// `void (*)(uint16_t status, void **response, size_t *size)`
pub type ResponseCallback = TypedFunc<(u32, u32, u32), ()>;

/// `bool (*)(void *opaque)`
pub type FrameFunc = TypedFunc<u32, u32>;

/// The guest's `malloc`/`free` pair, resolved once from the function table.
#[derive(Clone)]
pub struct GuestAllocator {
    /// `void *(*)(size_t size, size_t count)`
    pub alloc: TypedFunc<(u32, u32), u32>,
    pub free: TypedFunc<u32, ()>,
}

/// The per-frame step function installed by `web_raf`.
#[derive(Clone)]
pub struct FrameLoop {
    pub step: FrameFunc,
    pub opaque: u32,
}

pub struct BridgeContext {
    pub(crate) args: Vec<String>,
    pub(crate) hostname: String,
    started: Instant,
    pub(crate) allocator: Option<GuestAllocator>,
    pub(crate) requests: RequestTable<ResponseCallback>,
    pub(crate) fs: VirtualFs,
    pub(crate) gfx: Graphics,
    pub(crate) frame: Option<FrameLoop>,
    pub(crate) frames: FrameConfig,
    pub(crate) trap_unknown_imports: bool,
}

impl BridgeContext {
    pub fn new(
        config: &BridgeConfig,
        store: Box<dyn KvStore>,
        executor: Arc<dyn HttpExecutor>,
    ) -> Result<Self> {
        Ok(Self {
            args: config.args(),
            hostname: config.hostname.clone(),
            started: Instant::now(),
            allocator: None,
            requests: RequestTable::new(executor, &config.net)?,
            fs: VirtualFs::new(store, &config.fs),
            gfx: Graphics::headless(),
            frame: None,
            frames: config.frames.clone(),
            trap_unknown_imports: config.trap_unknown_imports,
        })
    }

    /// Build a context with the default store and transport: the file at
    /// `store_path` (or memory when unset) and a reqwest client.
    pub fn open(config: &BridgeConfig) -> Result<Self> {
        let store: Box<dyn KvStore> = match &config.store_path {
            Some(path) => {
                debug!(path = %path.display(), "opening file store");
                Box::new(DiskKv::open(path)?)
            }
            None => Box::new(MemoryKv::new()),
        };
        let executor = Arc::new(ReqwestExecutor::new(&config.net)?);
        Self::new(config, store, executor)
    }

    pub fn with_graphics(mut self, backend: Box<dyn GraphicsBackend>) -> Self {
        self.gfx = Graphics::new(backend);
        self
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Time since the context was created. Backs the guest's clocks.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn fs(&self) -> &VirtualFs {
        &self.fs
    }

    pub fn fs_mut(&mut self) -> &mut VirtualFs {
        &mut self.fs
    }

    pub fn graphics(&self) -> &Graphics {
        &self.gfx
    }

    pub fn requests(&self) -> &RequestTable<ResponseCallback> {
        &self.requests
    }

    pub fn has_allocator(&self) -> bool {
        self.allocator.is_some()
    }

    pub fn frame_loop(&self) -> Option<&FrameLoop> {
        self.frame.as_ref()
    }
}
