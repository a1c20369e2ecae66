//! Pollable HTTP requests for a synchronous guest.
//!
//! The guest cannot await, so a request is split in two halves:
//!
//! ```text
//! 1. issue(request, callback) -> handle
//!    Registers a CONTINUE record and spawns the transport future.
//!
//! 2. poll(handle, ...) -> state
//!    CONTINUE until the transport finishes, then OK or ERROR exactly once
//!    (writing status, size and a guest-allocated copy of the body), then
//!    DONE forever after.
//!
//! 3. clear(handle)
//!    Drops the record and frees the guest buffer.
//! ```
//!
//! The transport task only ever writes the record's [`Completion`]; every
//! guest-visible side effect happens inside `poll` on the guest's thread.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use hostlink_core::{GuestHeap, Handle, HandleTable};
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, warn};

use crate::config::NetConfig;
use crate::error::Error;
use crate::executor::HttpExecutor;
use crate::state::{AsyncState, Completion, Resolution};
use crate::types::HttpRequest;

/// Guest addresses a poll reports into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSlots {
    /// Where the response buffer pointer is written.
    pub response: u32,
    /// Where the response length is written.
    pub size: u32,
    /// Where the HTTP status is written, as a `u16`.
    pub status: u32,
}

#[derive(Debug, Default)]
struct GuestSide {
    done: bool,
    buffer: Option<u32>,
}

/// One issued request.
pub struct PendingRequest<C> {
    callback: Option<C>,
    completion: Arc<Completion>,
    guest: Mutex<GuestSide>,
}

impl<C> PendingRequest<C> {
    fn new(callback: Option<C>, completion: Arc<Completion>) -> Self {
        Self {
            callback,
            completion,
            guest: Mutex::new(GuestSide::default()),
        }
    }

    fn guest(&self) -> std::sync::MutexGuard<'_, GuestSide> {
        self.guest.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Whether the transport has finished.
    pub fn is_resolved(&self) -> bool {
        self.completion.is_resolved()
    }

    /// Block until the transport finishes or `timeout` elapses.
    pub fn wait_resolved(&self, timeout: Duration) -> bool {
        self.completion.wait_timeout(timeout)
    }

    /// Advance the request and report it to the guest.
    ///
    /// Returns the state before advancing. The first observation of a
    /// finished request marks it DONE before touching guest memory, so a
    /// poll re-entered from the callback already sees DONE. No lock is held
    /// while guest code runs.
    pub fn poll<H>(&self, heap: &mut H, slots: PollSlots) -> Result<AsyncState, H::Error>
    where
        H: GuestHeap<Callback = C>,
    {
        let resolution = {
            let mut guest = self.guest();
            if guest.done {
                return Ok(AsyncState::Done);
            }
            let Some(resolution) = self.completion.get() else {
                return Ok(AsyncState::Continue);
            };
            guest.done = true;
            resolution
        };

        heap.view().write_u16(slots.status, resolution.status)?;

        if let Some(body) = &resolution.body {
            let len = body.len() as u32;
            heap.view().write_u32(slots.size, len)?;

            let ptr = heap.alloc(len + 1)?;
            if ptr == 0 {
                warn!(len, "guest allocator returned NULL for response body");
            } else {
                let mut view = heap.view();
                view.copy_in(ptr, body)?;
                view.write_i8(ptr + len, 0)?;
                self.guest().buffer = Some(ptr);
            }
            heap.view().write_u32(slots.response, ptr)?;

            if resolution.state == AsyncState::Ok {
                if let Some(callback) = &self.callback {
                    heap.invoke(
                        callback,
                        resolution.status,
                        slots.response,
                        slots.size,
                    )?;
                    // The callback may take ownership of the buffer or swap it.
                    let current = heap.view().read_u32(slots.response)?;
                    self.guest().buffer = (current != 0).then_some(current);
                }
            }
        }

        Ok(resolution.state)
    }

    /// Free the guest buffer recorded for this request, at most once.
    pub fn release_buffer<H: GuestHeap>(&self, heap: &mut H) -> Result<(), H::Error> {
        let buffer = self.guest().buffer.take();
        match buffer {
            Some(ptr) => heap.free(ptr),
            None => Ok(()),
        }
    }
}

/// Registry of in-flight and finished requests.
///
/// Owns the runtime the transport futures run on. `C` is the guest callback
/// type, resolved once when the request is issued.
pub struct RequestTable<C> {
    runtime: Runtime,
    executor: Arc<dyn HttpExecutor>,
    requests: HandleTable<Arc<PendingRequest<C>>>,
}

impl<C> RequestTable<C> {
    pub fn new(executor: Arc<dyn HttpExecutor>, config: &NetConfig) -> Result<Self, Error> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(config.worker_threads.max(1))
            .thread_name("hostlink-http")
            .enable_all()
            .build()
            .map_err(Error::Runtime)?;

        Ok(Self {
            runtime,
            executor,
            requests: HandleTable::new(),
        })
    }

    /// Register a request and start it. Never blocks.
    pub fn issue(&mut self, request: HttpRequest, callback: Option<C>) -> Result<Handle, Error> {
        let completion = Arc::new(Completion::new());
        let handle = self
            .requests
            .put(Arc::new(PendingRequest::new(callback, completion.clone())))?;

        debug!(%handle, method = %request.method, url = %request.url, "issuing request");

        let executor = self.executor.clone();
        self.runtime.spawn(async move {
            let resolution = match executor.execute(request).await {
                Ok(response) => {
                    debug!(
                        %handle,
                        status = response.status,
                        bytes = response.body.len(),
                        "request resolved"
                    );
                    Resolution::ok(response.status, response.body)
                }
                Err(e) => {
                    warn!(%handle, error = %e, "request failed");
                    Resolution::error()
                }
            };
            completion.resolve(resolution);
        });

        Ok(handle)
    }

    pub fn get(&self, handle: Handle) -> Option<Arc<PendingRequest<C>>> {
        self.requests.get(handle).cloned()
    }

    /// Drop the record. An in-flight transport keeps running and resolves
    /// into a completion nobody reads.
    pub fn remove(&mut self, handle: Handle) -> Option<Arc<PendingRequest<C>>> {
        self.requests.take(handle)
    }

    /// Poll a request. Unknown handles report DONE with no side effects.
    pub fn poll<H>(
        &self,
        handle: Handle,
        heap: &mut H,
        slots: PollSlots,
    ) -> Result<AsyncState, H::Error>
    where
        H: GuestHeap<Callback = C>,
    {
        match self.get(handle) {
            Some(request) => request.poll(heap, slots),
            None => Ok(AsyncState::Done),
        }
    }

    /// Remove a request and free its guest buffer. Unknown handles are a no-op.
    pub fn clear<H: GuestHeap>(&mut self, handle: Handle, heap: &mut H) -> Result<(), H::Error> {
        match self.remove(handle) {
            Some(request) => {
                debug!(%handle, "clearing request");
                request.release_buffer(heap)
            }
            None => Ok(()),
        }
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}
