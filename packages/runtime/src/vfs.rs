//! Descriptor-based filesystem emulated on a key-value store.
//!
//! Each file is one store entry: the path is the key and the value is the
//! base64 encoding of the whole file. Descriptors are in-memory records over
//! those entries; nothing about them is persisted.
//!
//! Descriptors 0-2 are stdio and 3 is the preopened root directory. Files
//! opened by the guest get descriptors from a separate counter starting at
//! [`FsConfig::first_descriptor`].
//!
//! Appends decode the stored blob, extend it, and re-encode the result, so
//! the cost of a write grows with the file. Guest save files are small enough
//! for this to be acceptable.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use hostlink_kv::KvStore;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{FsConfig, ReadMode};

pub const STDIN: u32 = 0;
pub const STDOUT: u32 = 1;
pub const STDERR: u32 = 2;
/// The preopened `/` directory.
pub const ROOT_FD: u32 = 3;

/// WASI errno values the filesystem reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[repr(u16)]
pub enum Errno {
    #[error("bad file descriptor")]
    Badf = 8,
    #[error("invalid argument")]
    Inval = 28,
    #[error("I/O error")]
    Io = 29,
    #[error("too many open files")]
    Mfile = 33,
    #[error("not supported")]
    Notsup = 58,
    #[error("invalid seek")]
    Spipe = 70,
}

impl Errno {
    pub fn code(self) -> u32 {
        self as u32
    }
}

/// Seek origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set,
    Cur,
    End,
}

impl Whence {
    pub fn from_raw(raw: u32) -> Result<Self, Errno> {
        match raw {
            0 => Ok(Whence::Set),
            1 => Ok(Whence::Cur),
            2 => Ok(Whence::End),
            _ => Err(Errno::Inval),
        }
    }
}

/// What a descriptor refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    CharacterDevice,
    Directory,
    RegularFile,
}

impl FileKind {
    /// WASI `filetype` value.
    pub fn filetype(self) -> u8 {
        match self {
            FileKind::CharacterDevice => 2,
            FileKind::Directory => 3,
            FileKind::RegularFile => 4,
        }
    }
}

#[derive(Debug)]
struct OpenFile {
    path: String,
    append: bool,
    offset: u64,
}

pub struct VirtualFs {
    store: Box<dyn KvStore>,
    files: BTreeMap<u32, OpenFile>,
    next_fd: u32,
    read_mode: ReadMode,
}

impl VirtualFs {
    pub fn new(store: Box<dyn KvStore>, config: &FsConfig) -> Self {
        Self {
            store,
            files: BTreeMap::new(),
            next_fd: config.first_descriptor.max(ROOT_FD + 1),
            read_mode: config.read_mode,
        }
    }

    /// The backing store.
    pub fn store_mut(&mut self) -> &mut dyn KvStore {
        self.store.as_mut()
    }

    /// Open `path`. The entry is neither created nor checked.
    pub fn open(&mut self, path: &str, append: bool) -> Result<u32, Errno> {
        let fd = self.next_fd;
        self.next_fd = fd.checked_add(1).ok_or(Errno::Mfile)?;

        debug!(fd, path, append, "open");
        self.files.insert(
            fd,
            OpenFile {
                path: path.to_string(),
                append,
                offset: 0,
            },
        );
        Ok(fd)
    }

    /// Forget a descriptor. Stored contents are untouched.
    pub fn close(&mut self, fd: u32) -> Result<(), Errno> {
        if fd <= ROOT_FD {
            return Ok(());
        }
        match self.files.remove(&fd) {
            Some(file) => {
                debug!(fd, path = %file.path, "close");
                Ok(())
            }
            None => Err(Errno::Badf),
        }
    }

    pub fn kind(&self, fd: u32) -> Result<FileKind, Errno> {
        match fd {
            STDIN | STDOUT | STDERR => Ok(FileKind::CharacterDevice),
            ROOT_FD => Ok(FileKind::Directory),
            _ if self.files.contains_key(&fd) => Ok(FileKind::RegularFile),
            _ => Err(Errno::Badf),
        }
    }

    /// Whether `fd` was opened for appending.
    pub fn is_append(&self, fd: u32) -> bool {
        self.files.get(&fd).is_some_and(|file| file.append)
    }

    /// Size of the file at `path`, if it exists and decodes.
    pub fn stat(&mut self, path: &str) -> Option<u64> {
        match self.load(path) {
            Ok(Some(bytes)) => Some(bytes.len() as u64),
            Ok(None) => None,
            Err(errno) => {
                debug!(path, %errno, "stat of unreadable entry");
                None
            }
        }
    }

    /// Read up to `capacity` bytes.
    pub fn read(&mut self, fd: u32, capacity: usize) -> Result<Bytes, Errno> {
        if fd == STDIN {
            return Ok(Bytes::new());
        }

        let (path, offset) = match self.files.get(&fd) {
            Some(file) => (file.path.clone(), file.offset),
            None => return Err(Errno::Badf),
        };

        let Some(contents) = self.load(&path)? else {
            return Ok(Bytes::new());
        };

        let start = match self.read_mode {
            ReadMode::WholeFile => 0,
            ReadMode::Sequential => (offset as usize).min(contents.len()),
        };
        let end = contents.len().min(start.saturating_add(capacity));
        let chunk = Bytes::from(contents).slice(start..end);

        if self.read_mode == ReadMode::Sequential {
            if let Some(file) = self.files.get_mut(&fd) {
                file.offset = end as u64;
            }
        }
        Ok(chunk)
    }

    /// Write `data`, returning the number of bytes accepted.
    ///
    /// Stdio is forwarded to the log. An open file is replaced by `data`
    /// unless it was opened for appending and already has contents.
    pub fn write(&mut self, fd: u32, data: &[u8]) -> Result<usize, Errno> {
        match fd {
            STDOUT => {
                info!(target: "guest::stdout", "{}", guest_text(data));
                return Ok(data.len());
            }
            STDERR => {
                warn!(target: "guest::stderr", "{}", guest_text(data));
                return Ok(data.len());
            }
            _ => {}
        }

        let (path, append) = match self.files.get(&fd) {
            Some(file) => (file.path.clone(), file.append),
            None => return Err(Errno::Badf),
        };

        let existing = if append { self.load(&path)? } else { None };
        let contents = match existing {
            Some(mut existing) => {
                existing.extend_from_slice(data);
                existing
            }
            None => data.to_vec(),
        };

        self.store
            .set(&path, STANDARD.encode(&contents))
            .map_err(|e| {
                warn!(path, error = %e, "store write failed");
                Errno::Io
            })?;

        if let Some(file) = self.files.get_mut(&fd) {
            file.offset += data.len() as u64;
        }
        Ok(data.len())
    }

    /// Move the tracked offset. Stdio is not seekable.
    pub fn seek(&mut self, fd: u32, offset: i64, whence: Whence) -> Result<u64, Errno> {
        if fd <= STDERR {
            return Err(Errno::Spipe);
        }

        let (path, current) = match self.files.get(&fd) {
            Some(file) => (file.path.clone(), file.offset),
            None => return Err(Errno::Badf),
        };

        let base = match whence {
            Whence::Set => 0,
            Whence::Cur => current,
            Whence::End => self.load(&path)?.map_or(0, |bytes| bytes.len() as u64),
        };

        let target = i64::try_from(base)
            .ok()
            .and_then(|base| base.checked_add(offset))
            .filter(|target| *target >= 0)
            .ok_or(Errno::Inval)? as u64;

        if let Some(file) = self.files.get_mut(&fd) {
            file.offset = target;
        }
        Ok(target)
    }

    fn load(&mut self, path: &str) -> Result<Option<Vec<u8>>, Errno> {
        let blob = self.store.get(path).map_err(|e| {
            warn!(path, error = %e, "store read failed");
            Errno::Io
        })?;

        blob.map(|blob| {
            STANDARD.decode(blob.as_bytes()).map_err(|e| {
                warn!(path, error = %e, "stored entry is not valid base64");
                Errno::Io
            })
        })
        .transpose()
    }
}

/// Guest text up to the first NUL, lossily decoded.
fn guest_text(data: &[u8]) -> std::borrow::Cow<'_, str> {
    let end = data.iter().position(|b| *b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostlink_kv::{KvReader, KvWriter, MemoryKv};

    fn fs() -> VirtualFs {
        VirtualFs::new(Box::new(MemoryKv::new()), &FsConfig::default())
    }

    fn seeded(entries: &[(&str, &[u8])]) -> VirtualFs {
        let store = MemoryKv::with_entries(
            entries
                .iter()
                .map(|(path, bytes)| (path.to_string(), STANDARD.encode(bytes))),
        );
        VirtualFs::new(Box::new(store), &FsConfig::default())
    }

    #[test]
    fn descriptors_start_at_configured_base() {
        let mut fs = fs();
        assert_eq!(fs.open("a", false).unwrap(), 64);
        assert_eq!(fs.open("b", false).unwrap(), 65);
    }

    #[test]
    fn write_then_read_round_trips() {
        let mut fs = fs();
        let fd = fs.open("save.dat", false).unwrap();

        assert_eq!(fs.write(fd, b"level=3").unwrap(), 7);
        assert_eq!(&fs.read(fd, 4096).unwrap()[..], b"level=3");
        assert_eq!(fs.stat("save.dat"), Some(7));
    }

    #[test]
    fn second_plain_write_replaces() {
        let mut fs = fs();
        let fd = fs.open("save.dat", false).unwrap();

        fs.write(fd, b"first contents").unwrap();
        fs.write(fd, b"second").unwrap();

        assert_eq!(&fs.read(fd, 4096).unwrap()[..], b"second");
    }

    #[test]
    fn append_extends_existing_contents() {
        let mut fs = seeded(&[("log.txt", b"one,")]);
        let fd = fs.open("log.txt", true).unwrap();

        fs.write(fd, b"two,").unwrap();
        fs.write(fd, b"three").unwrap();

        assert_eq!(&fs.read(fd, 4096).unwrap()[..], b"one,two,three");
    }

    #[test]
    fn append_to_missing_entry_creates_it() {
        let mut fs = fs();
        let fd = fs.open("new.txt", true).unwrap();
        fs.write(fd, b"hi").unwrap();

        assert_eq!(fs.stat("new.txt"), Some(2));
    }

    #[test]
    fn whole_file_reads_restart_at_zero() {
        let mut fs = seeded(&[("data", b"abcdef")]);
        let fd = fs.open("data", false).unwrap();

        assert_eq!(&fs.read(fd, 4).unwrap()[..], b"abcd");
        assert_eq!(&fs.read(fd, 4).unwrap()[..], b"abcd");
    }

    #[test]
    fn sequential_reads_advance() {
        let store = MemoryKv::with_entries([("data", STANDARD.encode(b"abcdef"))]);
        let config = FsConfig {
            read_mode: ReadMode::Sequential,
            ..FsConfig::default()
        };
        let mut fs = VirtualFs::new(Box::new(store), &config);
        let fd = fs.open("data", false).unwrap();

        assert_eq!(&fs.read(fd, 4).unwrap()[..], b"abcd");
        assert_eq!(&fs.read(fd, 4).unwrap()[..], b"ef");
        assert!(fs.read(fd, 4).unwrap().is_empty());

        fs.seek(fd, 1, Whence::Set).unwrap();
        assert_eq!(&fs.read(fd, 2).unwrap()[..], b"bc");
    }

    #[test]
    fn missing_entry_reads_nothing() {
        let mut fs = fs();
        let fd = fs.open("nope", false).unwrap();

        assert!(fs.read(fd, 4096).unwrap().is_empty());
        assert_eq!(fs.stat("nope"), None);
    }

    #[test]
    fn unknown_descriptors_are_badf() {
        let mut fs = fs();

        assert_eq!(fs.read(99, 10), Err(Errno::Badf));
        assert_eq!(fs.write(99, b"x"), Err(Errno::Badf));
        assert_eq!(fs.seek(99, 0, Whence::Set), Err(Errno::Badf));
        assert_eq!(fs.close(99), Err(Errno::Badf));
        assert_eq!(fs.kind(99), Err(Errno::Badf));
    }

    #[test]
    fn stdio_is_not_seekable() {
        let mut fs = fs();
        assert_eq!(fs.seek(STDOUT, 0, Whence::Set), Err(Errno::Spipe));
        assert_eq!(fs.write(STDOUT, b"hello\0garbage").unwrap(), 13);
        assert_eq!(fs.write(STDERR, b"oops").unwrap(), 4);
    }

    #[test]
    fn seek_tracks_offset() {
        let mut fs = seeded(&[("data", b"0123456789")]);
        let fd = fs.open("data", false).unwrap();

        assert_eq!(fs.seek(fd, 4, Whence::Set).unwrap(), 4);
        assert_eq!(fs.seek(fd, 2, Whence::Cur).unwrap(), 6);
        assert_eq!(fs.seek(fd, -3, Whence::End).unwrap(), 7);
        assert_eq!(fs.seek(fd, -8, Whence::Cur), Err(Errno::Inval));
        assert_eq!(Whence::from_raw(7), Err(Errno::Inval));
    }

    #[test]
    fn close_keeps_contents() {
        let mut fs = fs();
        let fd = fs.open("keep", false).unwrap();
        fs.write(fd, b"kept").unwrap();
        fs.close(fd).unwrap();

        assert_eq!(fs.read(fd, 10), Err(Errno::Badf));
        assert_eq!(fs.stat("keep"), Some(4));
    }

    #[test]
    fn blobs_are_base64_of_whole_file() {
        let mut fs = fs();
        let fd = fs.open("f", true).unwrap();
        fs.write(fd, b"ab").unwrap();
        fs.write(fd, b"c").unwrap();

        let blob = fs.store_mut().get("f").unwrap().unwrap();
        assert_eq!(blob, STANDARD.encode(b"abc"));
    }

    #[test]
    fn corrupt_blob_is_an_io_error() {
        let mut store = MemoryKv::new();
        store.set("bad", "***".to_string()).unwrap();
        let mut fs = VirtualFs::new(Box::new(store), &FsConfig::default());
        let fd = fs.open("bad", false).unwrap();

        assert_eq!(fs.read(fd, 10), Err(Errno::Io));
        assert_eq!(fs.stat("bad"), None);
    }

    #[test]
    fn plain_write_replaces_corrupt_blob() {
        let mut store = MemoryKv::new();
        store.set("bad", "***not base64***".to_string()).unwrap();
        let mut fs = VirtualFs::new(Box::new(store), &FsConfig::default());
        let fd = fs.open("bad", false).unwrap();

        assert_eq!(fs.write(fd, b"fresh").unwrap(), 5);
        assert_eq!(&fs.read(fd, 10).unwrap()[..], b"fresh");
    }

    #[test]
    fn append_over_corrupt_blob_is_an_io_error() {
        let mut store = MemoryKv::new();
        store.set("bad", "***".to_string()).unwrap();
        let mut fs = VirtualFs::new(Box::new(store), &FsConfig::default());
        let fd = fs.open("bad", true).unwrap();

        assert_eq!(fs.write(fd, b"more"), Err(Errno::Io));
        assert_eq!(fs.store_mut().get("bad").unwrap().as_deref(), Some("***"));
    }

    #[test]
    fn descriptor_kinds() {
        let mut fs = fs();
        let fd = fs.open("x", true).unwrap();

        assert_eq!(fs.kind(STDIN).unwrap().filetype(), 2);
        assert_eq!(fs.kind(ROOT_FD).unwrap(), FileKind::Directory);
        assert_eq!(fs.kind(fd).unwrap(), FileKind::RegularFile);
        assert!(fs.is_append(fd));
    }
}
