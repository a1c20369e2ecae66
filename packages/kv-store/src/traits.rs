//! Core traits for key-value persistence.

use crate::KvError;

/// Read string values by key.
///
/// # Object Safety
///
/// This trait is object-safe: you can use `Box<dyn KvReader>`.
pub trait KvReader: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - The key does not exist (not an error condition).
    /// * `Ok(Some(value))` - The stored value.
    /// * `Err(KvError)` - The backing medium failed.
    fn get(&mut self, key: &str) -> Result<Option<String>, KvError>;
}

/// Write string values by key.
///
/// # Object Safety
///
/// This trait is object-safe: you can use `Box<dyn KvWriter>`.
pub trait KvWriter: Send + Sync {
    /// Store `value` under `key`, replacing any previous value.
    fn set(&mut self, key: &str, value: String) -> Result<(), KvError>;
}

/// Combined read/write.
///
/// Automatically implemented for any type that implements both `KvReader`
/// and `KvWriter`.
pub trait KvStore: KvReader + KvWriter {}
impl<T: KvReader + KvWriter> KvStore for T {}

// Blanket implementations for references and boxes

impl<T: KvReader + ?Sized> KvReader for &mut T {
    fn get(&mut self, key: &str) -> Result<Option<String>, KvError> {
        (**self).get(key)
    }
}

impl<T: KvWriter + ?Sized> KvWriter for &mut T {
    fn set(&mut self, key: &str, value: String) -> Result<(), KvError> {
        (**self).set(key, value)
    }
}

impl<T: KvReader + ?Sized> KvReader for Box<T> {
    fn get(&mut self, key: &str) -> Result<Option<String>, KvError> {
        self.as_mut().get(key)
    }
}

impl<T: KvWriter + ?Sized> KvWriter for Box<T> {
    fn set(&mut self, key: &str, value: String) -> Result<(), KvError> {
        self.as_mut().set(key, value)
    }
}
