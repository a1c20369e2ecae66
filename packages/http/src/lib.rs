//! # hostlink-http
//!
//! Asynchronous HTTP for guests that can only poll.
//!
//! ## Usage Model
//!
//! ```ignore
//! use hostlink_http::{HttpRequest, PollSlots, RequestTable, ReqwestExecutor, NetConfig};
//!
//! let config = NetConfig::default();
//! let mut requests = RequestTable::new(Arc::new(ReqwestExecutor::new(&config)?), &config)?;
//!
//! // Starts executing immediately in the background
//! let handle = requests.issue(HttpRequest::get("https://example.com/"), None)?;
//!
//! // Each guest frame: CONTINUE until the response lands, then OK once, then DONE
//! let state = requests.poll(handle, &mut heap, slots)?;
//!
//! // Release the guest buffer
//! requests.clear(handle, &mut heap)?;
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod requests;
pub mod state;
pub mod types;
pub mod url;

// Re-export main types
pub use config::NetConfig;
pub use error::Error;
pub use executor::{HttpExecutor, ReqwestExecutor};
pub use requests::{PendingRequest, PollSlots, RequestTable};
pub use state::{AsyncState, Completion, Resolution};
pub use types::{HttpRequest, HttpResponse};
pub use crate::url::{parse_header_block, parse_url};
