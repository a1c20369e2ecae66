use std::sync::{Condvar, Mutex};
use std::time::Duration;

use bytes::Bytes;

/// The state of an async HTTP request, as the guest library numbers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum AsyncState {
    /// Request completed and its response has not been observed yet
    Ok = 0,
    /// Request was observed, cleared, or never existed
    Done = 1,
    /// Request is in progress
    Continue = 2,
    /// Request failed without a response
    Error = 3,
}

impl AsyncState {
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, AsyncState::Ok | AsyncState::Error)
    }
}

/// The outcome of a finished transport task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Either [`AsyncState::Ok`] or [`AsyncState::Error`].
    pub state: AsyncState,
    /// HTTP status, 0 on error.
    pub status: u16,
    pub body: Option<Bytes>,
}

impl Resolution {
    pub fn ok(status: u16, body: Bytes) -> Self {
        Self {
            state: AsyncState::Ok,
            status,
            body: Some(body),
        }
    }

    pub fn error() -> Self {
        Self {
            state: AsyncState::Error,
            status: 0,
            body: None,
        }
    }
}

/// Single-writer slot the transport task fills once.
///
/// The task only writes and the poll side only reads, so the lock is held
/// for a clone at most.
#[derive(Debug, Default)]
pub struct Completion {
    slot: Mutex<Option<Resolution>>,
    resolved: Condvar,
}

impl Completion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the resolution. Later calls are ignored.
    pub fn resolve(&self, resolution: Resolution) {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_none() {
            *slot = Some(resolution);
            self.resolved.notify_all();
        }
    }

    /// Block the calling thread until resolved or `timeout` elapses.
    /// Returns whether the completion is resolved.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        let (slot, _) = self
            .resolved
            .wait_timeout_while(slot, timeout, |slot| slot.is_none())
            .unwrap_or_else(|e| e.into_inner());
        slot.is_some()
    }

    pub fn get(&self) -> Option<Resolution> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn is_resolved(&self) -> bool {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_guest_library() {
        assert_eq!(AsyncState::Ok.code(), 0);
        assert_eq!(AsyncState::Done.code(), 1);
        assert_eq!(AsyncState::Continue.code(), 2);
        assert_eq!(AsyncState::Error.code(), 3);
    }

    #[test]
    fn terminal_states() {
        assert!(AsyncState::Ok.is_terminal());
        assert!(AsyncState::Error.is_terminal());
        assert!(!AsyncState::Continue.is_terminal());
        assert!(!AsyncState::Done.is_terminal());
    }

    #[test]
    fn completion_is_written_once() {
        let completion = Completion::new();
        assert!(!completion.is_resolved());

        completion.resolve(Resolution::ok(200, Bytes::from_static(b"first")));
        completion.resolve(Resolution::error());

        let resolution = completion.get().unwrap();
        assert_eq!(resolution.state, AsyncState::Ok);
        assert_eq!(resolution.body.as_deref(), Some(&b"first"[..]));
    }

    #[test]
    fn wait_returns_once_resolved() {
        let completion = std::sync::Arc::new(Completion::new());
        assert!(!completion.wait_timeout(Duration::from_millis(10)));

        let writer = std::thread::spawn({
            let completion = completion.clone();
            move || completion.resolve(Resolution::error())
        });

        assert!(completion.wait_timeout(Duration::from_secs(5)));
        writer.join().unwrap();
    }

    #[test]
    fn error_resolution_has_no_status() {
        let resolution = Resolution::error();
        assert_eq!(resolution.status, 0);
        assert!(resolution.body.is_none());
    }
}
