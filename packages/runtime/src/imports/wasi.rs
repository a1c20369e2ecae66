//! `wasi_snapshot_preview1` over the virtual filesystem.
//!
//! Every function returns a WASI errno. Guest pointers that fall outside
//! linear memory trap instead.

use hostlink_core::MemoryView;
use wasmtime::{Caller, Linker};

use crate::context::BridgeContext;
use crate::error::GuestExit;
use crate::heap::split;
use crate::vfs::{Errno, Whence, ROOT_FD};

const WASI: &str = "wasi_snapshot_preview1";

const SUCCESS: u32 = 0;
const FDFLAGS_APPEND: u32 = 1;

const FILESTAT_SIZE: usize = 64;
const FILESTAT_FILETYPE: u32 = 16;
const FILESTAT_SIZE_OFFSET: u32 = 32;
const FILETYPE_REGULAR: i8 = 4;

const FDSTAT_SIZE: usize = 24;
const PREOPEN_NAME: &[u8] = b"/";

type WasiResult = wasmtime::Result<Result<(), Errno>>;

fn errno(result: WasiResult) -> wasmtime::Result<u32> {
    result.map(|status| status.map_or_else(Errno::code, |()| SUCCESS))
}

fn guest_path(view: &MemoryView<'_>, ptr: u32, len: u32) -> wasmtime::Result<String> {
    Ok(String::from_utf8_lossy(view.bytes(ptr, len)?).into_owned())
}

/// Total length of the strings plus one NUL each.
fn packed_size(strings: &[String]) -> u32 {
    strings.iter().map(|s| s.len() as u32 + 1).sum()
}

/// Gather an iovec list into one buffer.
fn gather(view: &MemoryView<'_>, iovs: u32, count: u32) -> wasmtime::Result<Vec<u8>> {
    let mut data = Vec::new();
    for i in 0..count {
        let iov = iovs + i * 8;
        let (buf, len) = (view.read_u32(iov)?, view.read_u32(iov + 4)?);
        data.extend_from_slice(view.bytes(buf, len)?);
    }
    Ok(data)
}

/// Scatter `data` over an iovec list, returning how many bytes were placed.
fn scatter(view: &mut MemoryView<'_>, iovs: u32, count: u32, data: &[u8]) -> wasmtime::Result<u32> {
    let mut remaining = data;
    for i in 0..count {
        if remaining.is_empty() {
            break;
        }
        let iov = iovs + i * 8;
        let (buf, len) = (view.read_u32(iov)?, view.read_u32(iov + 4)?);
        let n = remaining.len().min(len as usize);
        view.copy_in(buf, &remaining[..n])?;
        remaining = &remaining[n..];
    }
    Ok((data.len() - remaining.len()) as u32)
}

fn capacity(view: &MemoryView<'_>, iovs: u32, count: u32) -> wasmtime::Result<usize> {
    let mut total = 0usize;
    for i in 0..count {
        total = total.saturating_add(view.read_u32(iovs + i * 8 + 4)? as usize);
    }
    Ok(total)
}

fn args_sizes_get(caller: &mut Caller<'_, BridgeContext>, argc: u32, size: u32) -> WasiResult {
    let (mut view, cx) = split(caller)?;
    view.write_u32(argc, cx.args.len() as u32)?;
    view.write_u32(size, packed_size(&cx.args))?;
    Ok(Ok(()))
}

fn args_get(caller: &mut Caller<'_, BridgeContext>, argv: u32, buf: u32) -> WasiResult {
    let (mut view, cx) = split(caller)?;
    let mut cursor = buf;
    for (i, arg) in cx.args.iter().enumerate() {
        view.write_u32(argv + 4 * i as u32, cursor)?;
        view.copy_in(cursor, arg.as_bytes())?;
        view.write_i8(cursor + arg.len() as u32, 0)?;
        cursor += arg.len() as u32 + 1;
    }
    Ok(Ok(()))
}

fn environ_sizes_get(caller: &mut Caller<'_, BridgeContext>, count: u32, size: u32) -> WasiResult {
    let (mut view, _) = split(caller)?;
    view.write_u32(count, 0)?;
    view.write_u32(size, 0)?;
    Ok(Ok(()))
}

fn fd_prestat_get(caller: &mut Caller<'_, BridgeContext>, fd: u32, buf: u32) -> WasiResult {
    if fd != ROOT_FD {
        return Ok(Err(Errno::Badf));
    }
    let (mut view, _) = split(caller)?;
    // Tag 0 is a directory.
    view.write_u32(buf, 0)?;
    view.write_u32(buf + 4, PREOPEN_NAME.len() as u32)?;
    Ok(Ok(()))
}

fn fd_prestat_dir_name(
    caller: &mut Caller<'_, BridgeContext>,
    fd: u32,
    path: u32,
    len: u32,
) -> WasiResult {
    if fd != ROOT_FD {
        return Ok(Err(Errno::Badf));
    }
    let (mut view, _) = split(caller)?;
    let n = PREOPEN_NAME.len().min(len as usize);
    view.copy_in(path, &PREOPEN_NAME[..n])?;
    Ok(Ok(()))
}

/// Reports success for missing paths too, with a zeroed record.
fn path_filestat_get(
    caller: &mut Caller<'_, BridgeContext>,
    path: u32,
    path_len: u32,
    buf: u32,
) -> WasiResult {
    let (mut view, cx) = split(caller)?;
    let path = guest_path(&view, path, path_len)?;

    view.copy_in(buf, &[0; FILESTAT_SIZE])?;
    if let Some(size) = cx.fs.stat(&path) {
        view.write_i8(buf + FILESTAT_FILETYPE, FILETYPE_REGULAR)?;
        view.write_u64(buf + FILESTAT_SIZE_OFFSET, size)?;
    }
    Ok(Ok(()))
}

fn path_open(
    caller: &mut Caller<'_, BridgeContext>,
    path: u32,
    path_len: u32,
    fdflags: u32,
    fd_out: u32,
) -> WasiResult {
    let (mut view, cx) = split(caller)?;
    let path = guest_path(&view, path, path_len)?;

    match cx.fs.open(&path, fdflags & FDFLAGS_APPEND != 0) {
        Ok(fd) => {
            view.write_u32(fd_out, fd)?;
            Ok(Ok(()))
        }
        Err(e) => Ok(Err(e)),
    }
}

fn fd_fdstat_get(caller: &mut Caller<'_, BridgeContext>, fd: u32, buf: u32) -> WasiResult {
    let (mut view, cx) = split(caller)?;
    let kind = match cx.fs.kind(fd) {
        Ok(kind) => kind,
        Err(e) => return Ok(Err(e)),
    };
    let flags = if cx.fs.is_append(fd) { FDFLAGS_APPEND } else { 0 };

    view.copy_in(buf, &[0; FDSTAT_SIZE])?;
    view.write_i8(buf, kind.filetype() as i8)?;
    view.write_u16(buf + 2, flags as u16)?;
    view.write_u64(buf + 8, u64::MAX)?;
    view.write_u64(buf + 16, u64::MAX)?;
    Ok(Ok(()))
}

fn fd_seek(
    caller: &mut Caller<'_, BridgeContext>,
    fd: u32,
    offset: i64,
    whence: u32,
    out: u32,
) -> WasiResult {
    let (mut view, cx) = split(caller)?;
    let result = Whence::from_raw(whence).and_then(|whence| cx.fs.seek(fd, offset, whence));
    match result {
        Ok(position) => {
            view.write_u64(out, position)?;
            Ok(Ok(()))
        }
        Err(e) => Ok(Err(e)),
    }
}

fn fd_read(
    caller: &mut Caller<'_, BridgeContext>,
    fd: u32,
    iovs: u32,
    iovs_len: u32,
    nread: u32,
) -> WasiResult {
    let (mut view, cx) = split(caller)?;
    let wanted = capacity(&view, iovs, iovs_len)?;
    let data = match cx.fs.read(fd, wanted) {
        Ok(data) => data,
        Err(e) => return Ok(Err(e)),
    };

    let n = scatter(&mut view, iovs, iovs_len, &data)?;
    view.write_u32(nread, n)?;
    Ok(Ok(()))
}

fn fd_write(
    caller: &mut Caller<'_, BridgeContext>,
    fd: u32,
    iovs: u32,
    iovs_len: u32,
    nwritten: u32,
) -> WasiResult {
    let (mut view, cx) = split(caller)?;
    let data = gather(&view, iovs, iovs_len)?;
    let n = match cx.fs.write(fd, &data) {
        Ok(n) => n,
        Err(e) => return Ok(Err(e)),
    };

    view.write_u32(nwritten, n as u32)?;
    Ok(Ok(()))
}

fn clock_time_get(caller: &mut Caller<'_, BridgeContext>, out: u32) -> WasiResult {
    let (mut view, cx) = split(caller)?;
    let nanos = u64::try_from(cx.elapsed().as_nanos()).unwrap_or(u64::MAX);
    view.write_u64(out, nanos)?;
    Ok(Ok(()))
}

fn poll_oneoff(caller: &mut Caller<'_, BridgeContext>, nevents: u32) -> WasiResult {
    let (mut view, _) = split(caller)?;
    view.write_u32(nevents, 0)?;
    Ok(Ok(()))
}

pub(super) fn register_wasi_functions(linker: &mut Linker<BridgeContext>) -> wasmtime::Result<()> {
    linker.func_wrap(
        WASI,
        "args_sizes_get",
        |mut caller: Caller<'_, BridgeContext>, argc: u32, size: u32| {
            errno(args_sizes_get(&mut caller, argc, size))
        },
    )?;

    linker.func_wrap(
        WASI,
        "args_get",
        |mut caller: Caller<'_, BridgeContext>, argv: u32, buf: u32| {
            errno(args_get(&mut caller, argv, buf))
        },
    )?;

    linker.func_wrap(
        WASI,
        "environ_sizes_get",
        |mut caller: Caller<'_, BridgeContext>, count: u32, size: u32| {
            errno(environ_sizes_get(&mut caller, count, size))
        },
    )?;

    linker.func_wrap(
        WASI,
        "environ_get",
        |_caller: Caller<'_, BridgeContext>, _environ: u32, _buf: u32| -> u32 { SUCCESS },
    )?;

    linker.func_wrap(
        WASI,
        "fd_prestat_get",
        |mut caller: Caller<'_, BridgeContext>, fd: u32, buf: u32| {
            errno(fd_prestat_get(&mut caller, fd, buf))
        },
    )?;

    linker.func_wrap(
        WASI,
        "fd_prestat_dir_name",
        |mut caller: Caller<'_, BridgeContext>, fd: u32, path: u32, len: u32| {
            errno(fd_prestat_dir_name(&mut caller, fd, path, len))
        },
    )?;

    linker.func_wrap(
        WASI,
        "path_filestat_get",
        |mut caller: Caller<'_, BridgeContext>,
         _fd: u32,
         _flags: u32,
         path: u32,
         path_len: u32,
         buf: u32| { errno(path_filestat_get(&mut caller, path, path_len, buf)) },
    )?;

    linker.func_wrap(
        WASI,
        "path_open",
        |mut caller: Caller<'_, BridgeContext>,
         _fd: u32,
         _dirflags: u32,
         path: u32,
         path_len: u32,
         _oflags: u32,
         _rights_base: u64,
         _rights_inheriting: u64,
         fdflags: u32,
         fd_out: u32| { errno(path_open(&mut caller, path, path_len, fdflags, fd_out)) },
    )?;

    // The key space is flat: directories always exist and never need removing.
    for name in ["path_create_directory", "path_remove_directory", "path_unlink_file"] {
        linker.func_wrap(
            WASI,
            name,
            |_caller: Caller<'_, BridgeContext>, _fd: u32, _path: u32, _len: u32| -> u32 {
                SUCCESS
            },
        )?;
    }

    linker.func_wrap(
        WASI,
        "path_readlink",
        |_caller: Caller<'_, BridgeContext>,
         _fd: u32,
         _path: u32,
         _path_len: u32,
         _buf: u32,
         _buf_len: u32,
         _out: u32|
         -> u32 { Errno::Notsup.code() },
    )?;

    linker.func_wrap(
        WASI,
        "fd_close",
        |mut caller: Caller<'_, BridgeContext>, fd: u32| -> u32 {
            caller
                .data_mut()
                .fs
                .close(fd)
                .map_or_else(Errno::code, |()| SUCCESS)
        },
    )?;

    linker.func_wrap(
        WASI,
        "fd_fdstat_get",
        |mut caller: Caller<'_, BridgeContext>, fd: u32, buf: u32| {
            errno(fd_fdstat_get(&mut caller, fd, buf))
        },
    )?;

    linker.func_wrap(
        WASI,
        "fd_fdstat_set_flags",
        |_caller: Caller<'_, BridgeContext>, _fd: u32, _flags: u32| -> u32 { SUCCESS },
    )?;

    linker.func_wrap(
        WASI,
        "fd_readdir",
        |_caller: Caller<'_, BridgeContext>,
         _fd: u32,
         _buf: u32,
         _buf_len: u32,
         _cookie: u64,
         _out: u32|
         -> u32 { Errno::Badf.code() },
    )?;

    linker.func_wrap(
        WASI,
        "fd_seek",
        |mut caller: Caller<'_, BridgeContext>, fd: u32, offset: i64, whence: u32, out: u32| {
            errno(fd_seek(&mut caller, fd, offset, whence, out))
        },
    )?;

    linker.func_wrap(
        WASI,
        "fd_read",
        |mut caller: Caller<'_, BridgeContext>, fd: u32, iovs: u32, iovs_len: u32, nread: u32| {
            errno(fd_read(&mut caller, fd, iovs, iovs_len, nread))
        },
    )?;

    linker.func_wrap(
        WASI,
        "fd_write",
        |mut caller: Caller<'_, BridgeContext>,
         fd: u32,
         iovs: u32,
         iovs_len: u32,
         nwritten: u32| { errno(fd_write(&mut caller, fd, iovs, iovs_len, nwritten)) },
    )?;

    linker.func_wrap(
        WASI,
        "clock_time_get",
        |mut caller: Caller<'_, BridgeContext>, _id: u32, _precision: u64, out: u32| {
            errno(clock_time_get(&mut caller, out))
        },
    )?;

    linker.func_wrap(
        WASI,
        "poll_oneoff",
        |mut caller: Caller<'_, BridgeContext>,
         _subscriptions: u32,
         _events: u32,
         _count: u32,
         nevents: u32| { errno(poll_oneoff(&mut caller, nevents)) },
    )?;

    linker.func_wrap(
        WASI,
        "proc_exit",
        |_caller: Caller<'_, BridgeContext>, code: i32| -> wasmtime::Result<()> {
            Err(wasmtime::Error::new(GuestExit(code)))
        },
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_size_counts_terminators() {
        let args = vec!["guest.wasm".to_string(), "a=1".to_string()];
        assert_eq!(packed_size(&args), 11 + 4);
        assert_eq!(packed_size(&[]), 0);
    }

    fn iovecs(memory: &mut [u8], at: u32, list: &[(u32, u32)]) {
        let mut view = MemoryView::new(memory);
        for (i, (buf, len)) in list.iter().enumerate() {
            let iov = at + 8 * i as u32;
            view.write_u32(iov, *buf).unwrap();
            view.write_u32(iov + 4, *len).unwrap();
        }
    }

    #[test]
    fn scatter_fills_iovecs_in_order() {
        let mut memory = vec![0u8; 256];
        iovecs(&mut memory, 0, &[(100, 3), (200, 10)]);
        let mut view = MemoryView::new(&mut memory);

        assert_eq!(capacity(&view, 0, 2).unwrap(), 13);
        let n = scatter(&mut view, 0, 2, b"hello").unwrap();

        assert_eq!(n, 5);
        assert_eq!(view.bytes(100, 3).unwrap(), b"hel");
        assert_eq!(view.bytes(200, 3).unwrap(), b"lo\0");
    }

    #[test]
    fn scatter_empty_leaves_buffers_untouched() {
        let mut memory = vec![0xAAu8; 64];
        iovecs(&mut memory, 0, &[(32, 16)]);
        let mut view = MemoryView::new(&mut memory);

        assert_eq!(scatter(&mut view, 0, 1, b"").unwrap(), 0);
        assert!(view.bytes(32, 16).unwrap().iter().all(|b| *b == 0xAA));
    }

    #[test]
    fn gather_concatenates_iovecs() {
        let mut memory = vec![0u8; 128];
        iovecs(&mut memory, 0, &[(64, 2), (80, 3)]);
        memory[64..66].copy_from_slice(b"ab");
        memory[80..83].copy_from_slice(b"cde");
        let view = MemoryView::new(&mut memory);

        assert_eq!(gather(&view, 0, 2).unwrap(), b"abcde");
    }

    #[test]
    fn out_of_range_iovec_is_an_error() {
        let mut memory = vec![0u8; 32];
        iovecs(&mut memory, 0, &[(30, 8)]);
        let view = MemoryView::new(&mut memory);

        assert!(gather(&view, 0, 1).is_err());
    }

    #[test]
    fn errno_maps_outcomes() {
        assert_eq!(errno(Ok(Ok(()))).unwrap(), 0);
        assert_eq!(errno(Ok(Err(Errno::Badf))).unwrap(), 8);
        assert!(errno(Err(wasmtime::Error::new(GuestExit(1)))).is_err());
    }
}
