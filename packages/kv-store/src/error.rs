//! Error types for key-value stores.
//!
//! A missing key is not an error; readers report it as `Ok(None)`.

use std::path::PathBuf;

/// Errors raised by a key-value store backend.
#[derive(Debug)]
pub enum KvError {
    /// Generic I/O failure in the backing medium.
    Io(std::io::Error),

    /// The backing file exists but does not hold a string map.
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl std::fmt::Display for KvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KvError::Io(e) => write!(f, "store I/O error: {}", e),
            KvError::Corrupt { path, source } => {
                write!(f, "store file {} is corrupt: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for KvError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            KvError::Io(e) => Some(e),
            KvError::Corrupt { source, .. } => Some(source),
        }
    }
}

impl From<std::io::Error> for KvError {
    fn from(e: std::io::Error) -> Self {
        KvError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_works() {
        let io = KvError::Io(std::io::Error::other("disk full"));
        assert_eq!(format!("{}", io), "store I/O error: disk full");

        let source = serde_json::from_str::<u8>("nope").unwrap_err();
        let e = KvError::Corrupt {
            path: PathBuf::from("/tmp/store.json"),
            source,
        };
        assert!(format!("{}", e).contains("/tmp/store.json"));
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let kv_err: KvError = io_err.into();
        assert!(matches!(kv_err, KvError::Io(_)));
        assert!(std::error::Error::source(&kv_err).is_some());
    }
}
