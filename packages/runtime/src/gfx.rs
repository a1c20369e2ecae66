//! Graphics object handles.
//!
//! GL names are host objects the guest refers to by number. They live in a
//! [`HandleTable`] so a deleted name is never reissued and a stale one is
//! caught. Drawing is out of scope: the backend only sees object lifetimes
//! and bindings.

use std::collections::HashSet;

use hostlink_core::{Handle, HandleError, HandleTable};
use thiserror::Error;
use tracing::trace;

/// GL object kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuKind {
    Texture,
    Buffer,
    Framebuffer,
    Program,
    Shader,
}

/// Identifier a backend assigns to an object it created.
pub type BackendId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuObject {
    pub kind: GpuKind,
    pub id: BackendId,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GfxError {
    #[error("unknown {kind:?} name {raw}")]
    UnknownName { kind: GpuKind, raw: u32 },

    #[error("name {raw} is a {actual:?}, expected a {expected:?}")]
    WrongKind {
        raw: u32,
        expected: GpuKind,
        actual: GpuKind,
    },

    #[error(transparent)]
    Handles(#[from] HandleError),
}

/// Receives object lifetimes and bindings.
pub trait GraphicsBackend: Send {
    fn create(&mut self, kind: GpuKind) -> BackendId;
    fn delete(&mut self, object: GpuObject);
    /// Bind `object` to `target`, or unbind the target when `None`.
    fn bind(&mut self, kind: GpuKind, target: u32, object: Option<GpuObject>);
    fn use_program(&mut self, program: Option<GpuObject>);
    fn attach_shader(&mut self, program: GpuObject, shader: GpuObject);
}

/// A backend with no device behind it.
#[derive(Debug, Default)]
pub struct HeadlessGraphics {
    next_id: BackendId,
    live: HashSet<BackendId>,
}

impl HeadlessGraphics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_objects(&self) -> usize {
        self.live.len()
    }
}

impl GraphicsBackend for HeadlessGraphics {
    fn create(&mut self, kind: GpuKind) -> BackendId {
        self.next_id += 1;
        self.live.insert(self.next_id);
        trace!(?kind, id = self.next_id, "create");
        self.next_id
    }

    fn delete(&mut self, object: GpuObject) {
        trace!(?object, "delete");
        self.live.remove(&object.id);
    }

    fn bind(&mut self, kind: GpuKind, target: u32, object: Option<GpuObject>) {
        trace!(?kind, target, ?object, "bind");
    }

    fn use_program(&mut self, program: Option<GpuObject>) {
        trace!(?program, "use program");
    }

    fn attach_shader(&mut self, program: GpuObject, shader: GpuObject) {
        trace!(?program, ?shader, "attach shader");
    }
}

/// Guest-visible GL names over a backend.
pub struct Graphics {
    objects: HandleTable<GpuObject>,
    backend: Box<dyn GraphicsBackend>,
}

impl Graphics {
    pub fn new(backend: Box<dyn GraphicsBackend>) -> Self {
        Self {
            objects: HandleTable::new(),
            backend,
        }
    }

    pub fn headless() -> Self {
        Self::new(Box::new(HeadlessGraphics::new()))
    }

    /// Number of live names.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn create(&mut self, kind: GpuKind) -> Result<u32, GfxError> {
        let id = self.backend.create(kind);
        let object = GpuObject { kind, id };
        match self.objects.put(object) {
            Ok(handle) => Ok(handle.raw()),
            Err(e) => {
                self.backend.delete(object);
                Err(e.into())
            }
        }
    }

    /// Look up a name. Zero means "no object".
    pub fn resolve(&self, kind: GpuKind, raw: u32) -> Result<Option<GpuObject>, GfxError> {
        let Some(handle) = Handle::from_raw(raw) else {
            return Ok(None);
        };
        let object = *self
            .objects
            .get(handle)
            .ok_or(GfxError::UnknownName { kind, raw })?;
        if object.kind != kind {
            return Err(GfxError::WrongKind {
                raw,
                expected: kind,
                actual: object.kind,
            });
        }
        Ok(Some(object))
    }

    /// Delete a name. Deleting zero is a no-op.
    pub fn delete(&mut self, kind: GpuKind, raw: u32) -> Result<(), GfxError> {
        if let Some(object) = self.resolve(kind, raw)? {
            if let Some(handle) = Handle::from_raw(raw) {
                self.objects.take(handle);
            }
            self.backend.delete(object);
        }
        Ok(())
    }

    pub fn bind(&mut self, kind: GpuKind, target: u32, raw: u32) -> Result<(), GfxError> {
        let object = self.resolve(kind, raw)?;
        self.backend.bind(kind, target, object);
        Ok(())
    }

    pub fn use_program(&mut self, raw: u32) -> Result<(), GfxError> {
        let program = self.resolve(GpuKind::Program, raw)?;
        self.backend.use_program(program);
        Ok(())
    }

    pub fn attach_shader(&mut self, program: u32, shader: u32) -> Result<(), GfxError> {
        let program = self.resolve(GpuKind::Program, program)?;
        let shader = self.resolve(GpuKind::Shader, shader)?;
        if let (Some(program), Some(shader)) = (program, shader) {
            self.backend.attach_shader(program, shader);
        }
        Ok(())
    }
}
