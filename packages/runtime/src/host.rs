//! Loading and running a guest module.

use std::path::Path;
use std::thread;

use tracing::{debug, info};
use wasmtime::{Engine, Instance, Linker, Memory, Module, Store, WasmParams, WasmResults};

use crate::context::{BridgeContext, FrameLoop};
use crate::error::{BridgeError, FrameLoopInstalled, GuestExit, Result};
use crate::heap::MEMORY_EXPORT;
use crate::imports;

const ENTRY_POINT: &str = "_start";

/// How a guest run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// `_start` returned without installing a frame loop.
    Returned,
    /// The guest called `proc_exit`.
    Exited(i32),
    /// The frame loop stopped, either because the step function returned
    /// false or because the configured frame cap was reached.
    FramesEnded { frames: u64 },
}

impl RunOutcome {
    /// Process exit status for this outcome.
    pub fn exit_code(self) -> i32 {
        match self {
            RunOutcome::Exited(code) => code,
            RunOutcome::Returned | RunOutcome::FramesEnded { .. } => 0,
        }
    }
}

/// A compiled guest module.
pub struct GuestModule {
    engine: Engine,
    module: Module,
}

impl GuestModule {
    /// Compile a module from binary or text format.
    pub fn new(bytes: impl AsRef<[u8]>) -> Result<Self> {
        let engine = Engine::default();
        let module =
            Module::new(&engine, bytes.as_ref()).map_err(|e| BridgeError::wasm("compile", e))?;
        Ok(Self { engine, module })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::new(bytes)
    }

    /// Link the bridge imports and instantiate against `context`.
    pub fn instantiate(&self, context: BridgeContext) -> Result<GuestInstance> {
        let mut linker = Linker::<BridgeContext>::new(&self.engine);
        imports::register_all(&mut linker).map_err(|e| BridgeError::wasm("linker", e))?;
        if context.trap_unknown_imports {
            linker
                .define_unknown_imports_as_traps(&self.module)
                .map_err(|e| BridgeError::wasm("linker", e))?;
        }

        let mut store = Store::new(&self.engine, context);
        let instance = linker
            .instantiate(&mut store, &self.module)
            .map_err(|e| BridgeError::wasm("instantiate", e))?;

        let memory = instance
            .get_memory(&mut store, MEMORY_EXPORT)
            .ok_or_else(|| BridgeError::ExportNotFound(MEMORY_EXPORT.to_string()))?;

        Ok(GuestInstance {
            store,
            instance,
            memory,
        })
    }

    /// Instantiate and run to completion.
    pub fn run(&self, context: BridgeContext) -> Result<RunOutcome> {
        self.instantiate(context)?.run()
    }
}

/// An instantiated guest and its bridge state.
pub struct GuestInstance {
    store: Store<BridgeContext>,
    instance: Instance,
    memory: Memory,
}

impl GuestInstance {
    pub fn context(&self) -> &BridgeContext {
        self.store.data()
    }

    pub fn context_mut(&mut self) -> &mut BridgeContext {
        self.store.data_mut()
    }

    pub fn into_context(self) -> BridgeContext {
        self.store.into_data()
    }

    /// The guest's linear memory as it is now.
    pub fn memory(&self) -> &[u8] {
        self.memory.data(&self.store)
    }

    /// Call an exported function.
    pub fn call<P, R>(&mut self, name: &str, params: P) -> Result<R>
    where
        P: WasmParams,
        R: WasmResults,
    {
        let func = self
            .instance
            .get_func(&mut self.store, name)
            .ok_or_else(|| BridgeError::ExportNotFound(name.to_string()))?
            .typed::<P, R>(&self.store)
            .map_err(|e| BridgeError::wasm("lookup", e))?;
        func.call(&mut self.store, params).map_err(|e| BridgeError::wasm("call", e))
    }

    /// Call `_start`, then drive the frame loop if the guest installed one.
    pub fn run(&mut self) -> Result<RunOutcome> {
        let start = self
            .instance
            .get_func(&mut self.store, ENTRY_POINT)
            .ok_or_else(|| BridgeError::ExportNotFound(ENTRY_POINT.to_string()))?
            .typed::<(), ()>(&self.store)
            .map_err(|e| BridgeError::wasm("lookup", e))?;

        match start.call(&mut self.store, ()) {
            Ok(()) => Ok(RunOutcome::Returned),
            Err(e) => {
                if let Some(exit) = e.downcast_ref::<GuestExit>() {
                    return Ok(RunOutcome::Exited(exit.0));
                }
                if e.downcast_ref::<FrameLoopInstalled>().is_some() {
                    return self.run_frames();
                }
                Err(BridgeError::wasm("_start", e))
            }
        }
    }

    fn run_frames(&mut self) -> Result<RunOutcome> {
        let Some(FrameLoop { step, opaque }) = self.store.data().frame.clone() else {
            return Ok(RunOutcome::Returned);
        };
        let config = self.store.data().frames.clone();
        info!(
            interval_ms = config.interval_ms,
            max_frames = ?config.max_frames,
            "entering frame loop"
        );

        let mut frames = 0u64;
        loop {
            if config.max_frames.is_some_and(|max| frames >= max) {
                debug!(frames, "frame cap reached");
                return Ok(RunOutcome::FramesEnded { frames });
            }

            let keep_going = match step.call(&mut self.store, opaque) {
                Ok(result) => result != 0,
                Err(e) => match e.downcast_ref::<GuestExit>() {
                    Some(exit) => return Ok(RunOutcome::Exited(exit.0)),
                    None => return Err(BridgeError::wasm("frame", e)),
                },
            };
            frames += 1;

            if !keep_going {
                debug!(frames, "guest ended the frame loop");
                return Ok(RunOutcome::FramesEnded { frames });
            }
            thread::sleep(config.interval());
        }
    }
}
