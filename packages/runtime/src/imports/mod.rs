//! Host functions linked into the guest.
//!
//! | module | functions |
//! |---|---|
//! | `wasi_snapshot_preview1` | args, clocks, descriptors over [`VirtualFs`](crate::vfs::VirtualFs) |
//! | `env` | `web_*` runtime hooks, `MTY_Http*` requests, unistd stubs, GL object names |

use wasmtime::Linker;

use crate::context::BridgeContext;

mod gfx;
mod net;
mod wasi;
mod web;

pub(crate) const ENV: &str = "env";

/// Register every bridge import with the linker.
pub fn register_all(linker: &mut Linker<BridgeContext>) -> wasmtime::Result<()> {
    wasi::register_wasi_functions(linker)?;
    web::register_web_functions(linker)?;
    net::register_net_functions(linker)?;
    gfx::register_gfx_functions(linker)?;

    Ok(())
}
