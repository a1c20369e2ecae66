//! Opaque integer handles for host resources.
//!
//! The guest cannot hold host objects, so every resource it refers to (a
//! pending request, a GPU object) lives in a [`HandleTable`] and crosses the
//! boundary as a non-zero `u32`. Zero is reserved for "no resource".
//!
//! A raw handle packs a slot index and a generation:
//!
//! ```text
//!  31          20 19                 0
//! +--------------+--------------------+
//! |  generation  |     slot + 1       |
//! +--------------+--------------------+
//! ```
//!
//! Taking a value bumps its slot's generation, so a stale handle no longer
//! matches and a released value is never handed out again. A slot whose
//! generation is exhausted is retired instead of reused.

use std::fmt;
use std::num::NonZeroU32;

use thiserror::Error;

const INDEX_BITS: u32 = 20;
const INDEX_MASK: u32 = (1 << INDEX_BITS) - 1;
const MAX_GENERATION: u32 = (1 << (32 - INDEX_BITS)) - 1;
const MAX_SLOTS: usize = INDEX_MASK as usize;

/// A live reference into a [`HandleTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(NonZeroU32);

impl Handle {
    /// Interpret a value received from the guest. Zero is "no resource".
    pub fn from_raw(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    /// The value handed to the guest.
    pub fn raw(self) -> u32 {
        self.0.get()
    }

    fn pack(index: usize, generation: u32) -> Self {
        Self(NonZeroU32::MIN.saturating_add(index as u32) | (generation << INDEX_BITS))
    }

    fn index(self) -> usize {
        ((self.raw() & INDEX_MASK) - 1) as usize
    }

    fn generation(self) -> u32 {
        self.raw() >> INDEX_BITS
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.raw())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandleError {
    #[error("handle table exhausted")]
    Exhausted,
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Maps handles to host-side values.
pub struct HandleTable<T> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
    len: usize,
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HandleTable<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Store a value and return a fresh handle for it.
    pub fn put(&mut self, value: T) -> Result<Handle, HandleError> {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                if self.slots.len() >= MAX_SLOTS {
                    return Err(HandleError::Exhausted);
                }
                self.slots.push(Slot {
                    generation: 0,
                    value: None,
                });
                self.slots.len() - 1
            }
        };

        let slot = &mut self.slots[index];
        slot.value = Some(value);
        self.len += 1;
        Ok(Handle::pack(index, slot.generation))
    }

    fn slot(&self, handle: Handle) -> Option<&Slot<T>> {
        self.slots
            .get(handle.index())
            .filter(|slot| slot.generation == handle.generation())
    }

    fn slot_mut(&mut self, handle: Handle) -> Option<&mut Slot<T>> {
        self.slots
            .get_mut(handle.index())
            .filter(|slot| slot.generation == handle.generation())
    }

    pub fn get(&self, handle: Handle) -> Option<&T> {
        self.slot(handle).and_then(|slot| slot.value.as_ref())
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        self.slot_mut(handle).and_then(|slot| slot.value.as_mut())
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.get(handle).is_some()
    }

    /// Remove a value. The handle is dead afterwards.
    pub fn take(&mut self, handle: Handle) -> Option<T> {
        let index = handle.index();
        let slot = self.slot_mut(handle)?;
        let value = slot.value.take()?;

        if slot.generation < MAX_GENERATION {
            slot.generation += 1;
            self.free.push(index);
        }
        self.len -= 1;
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate over live entries.
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value
                .as_ref()
                .map(|value| (Handle::pack(index, slot.generation), value))
        })
    }
}
