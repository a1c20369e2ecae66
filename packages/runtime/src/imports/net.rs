//! `MTY_Http*` requests and the unistd stubs that ride along with them.

use bytes::Bytes;
use hostlink_core::Handle;
use hostlink_http::{parse_url, AsyncState, HttpRequest, PollSlots};
use tracing::{debug, warn};
use wasmtime::{Caller, Linker};

use super::ENV;
use crate::context::{BridgeContext, ResponseCallback};
use crate::heap::{split, table_func, WasmHeap};

/// Drop the request behind `raw`, freeing its guest buffer.
fn release(caller: &mut Caller<'_, BridgeContext>, raw: u32) -> wasmtime::Result<()> {
    let Some(handle) = Handle::from_raw(raw) else {
        return Ok(());
    };
    let Some(request) = caller.data_mut().requests.remove(handle) else {
        return Ok(());
    };
    debug!(%handle, "releasing request");
    request.release_buffer(&mut WasmHeap::new(caller)?)
}

#[allow(clippy::too_many_arguments)]
fn async_request(
    caller: &mut Caller<'_, BridgeContext>,
    index: u32,
    host: u32,
    secure: u32,
    method: u32,
    path: u32,
    headers: u32,
    body: u32,
    body_size: u32,
    timeout_ms: u32,
    callback: u32,
) -> wasmtime::Result<()> {
    let request = {
        let (view, _) = split(caller)?;
        let headers = match headers {
            0 => String::new(),
            ptr => view.read_cstring(ptr)?,
        };
        let body = match body {
            0 => None,
            ptr => Some(Bytes::copy_from_slice(view.bytes(ptr, body_size)?)),
        };
        HttpRequest::from_parts(
            &view.read_cstring(host)?,
            secure != 0,
            &view.read_cstring(method)?,
            &view.read_cstring(path)?,
            &headers,
            body,
            timeout_ms,
        )
    };

    // Reusing an index slot detaches whatever it held.
    let (view, _) = split(caller)?;
    let previous = view.read_u32(index)?;
    release(caller, previous)?;

    let callback: Option<ResponseCallback> = match callback {
        0 => None,
        func => Some(table_func(caller, func)?),
    };

    let handle = caller.data_mut().requests.issue(request, callback)?;
    let (mut view, _) = split(caller)?;
    view.write_u32(index, handle.raw())?;
    Ok(())
}

fn async_poll(
    caller: &mut Caller<'_, BridgeContext>,
    index: u32,
    slots: PollSlots,
) -> wasmtime::Result<AsyncState> {
    let Some(handle) = Handle::from_raw(index) else {
        return Ok(AsyncState::Done);
    };
    let Some(request) = caller.data().requests.get(handle) else {
        return Ok(AsyncState::Done);
    };
    request.poll(&mut WasmHeap::new(caller)?, slots)
}

pub(super) fn register_net_functions(linker: &mut Linker<BridgeContext>) -> wasmtime::Result<()> {
    // The worker pool is sized from host configuration.
    linker.func_wrap(
        ENV,
        "MTY_HttpAsyncCreate",
        |_caller: Caller<'_, BridgeContext>, _max_threads: u32| {},
    )?;
    linker.func_wrap(ENV, "MTY_HttpAsyncDestroy", |_caller: Caller<'_, BridgeContext>| {})?;

    linker.func_wrap(
        ENV,
        "MTY_HttpParseUrl",
        |mut caller: Caller<'_, BridgeContext>,
         url: u32,
         host_out: u32,
         host_size: u32,
         path_out: u32,
         path_size: u32|
         -> wasmtime::Result<u32> {
            let (mut view, _) = split(&mut caller)?;
            let url = view.read_cstring(url)?;
            match parse_url(&url) {
                Ok((host, path)) => {
                    view.write_cstring(&host, host_out, host_size)?;
                    view.write_cstring(&path, path_out, path_size)?;
                    Ok(1)
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "MTY_HttpParseUrl failed");
                    Ok(0)
                }
            }
        },
    )?;

    // The transport percent-encodes, so this is a bounded copy.
    linker.func_wrap(
        ENV,
        "MTY_HttpEncodeUrl",
        |mut caller: Caller<'_, BridgeContext>,
         src: u32,
         dst: u32,
         dst_len: u32|
         -> wasmtime::Result<()> {
            let (mut view, _) = split(&mut caller)?;
            let text = view.read_cstring(src)?;
            view.write_cstring(&text, dst, dst_len)?;
            Ok(())
        },
    )?;

    linker.func_wrap(
        ENV,
        "MTY_HttpAsyncRequest",
        |mut caller: Caller<'_, BridgeContext>,
         index: u32,
         host: u32,
         secure: u32,
         method: u32,
         path: u32,
         headers: u32,
         body: u32,
         body_size: u32,
         timeout_ms: u32,
         callback: u32|
         -> wasmtime::Result<()> {
            async_request(
                &mut caller,
                index,
                host,
                secure,
                method,
                path,
                headers,
                body,
                body_size,
                timeout_ms,
                callback,
            )
        },
    )?;

    linker.func_wrap(
        ENV,
        "MTY_HttpAsyncPoll",
        |mut caller: Caller<'_, BridgeContext>,
         index: u32,
         response: u32,
         size: u32,
         status: u32|
         -> wasmtime::Result<u32> {
            let slots = PollSlots {
                response,
                size,
                status,
            };
            async_poll(&mut caller, index, slots).map(AsyncState::code)
        },
    )?;

    linker.func_wrap(
        ENV,
        "MTY_HttpAsyncClear",
        |mut caller: Caller<'_, BridgeContext>, index: u32| -> wasmtime::Result<()> {
            let (view, _) = split(&mut caller)?;
            let raw = view.read_u32(index)?;
            release(&mut caller, raw)?;

            let (mut view, _) = split(&mut caller)?;
            view.write_u32(index, 0)?;
            Ok(())
        },
    )?;

    linker.func_wrap(
        ENV,
        "gethostname",
        |mut caller: Caller<'_, BridgeContext>, buf: u32, size: u32| -> wasmtime::Result<u32> {
            let (mut view, cx) = split(&mut caller)?;
            view.write_cstring(&cx.hostname, buf, size)?;
            Ok(0)
        },
    )?;

    linker.func_wrap(
        ENV,
        "flock",
        |_caller: Caller<'_, BridgeContext>, _fd: u32, _operation: u32| -> u32 { 0 },
    )?;

    Ok(())
}
