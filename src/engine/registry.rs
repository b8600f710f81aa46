//! Shared ownership of the engine's handle table.

use std::sync::Mutex;

use super::PdfEngine;
use crate::error::{Error, Result};

/// Exclusive owner of an engine and every document it has loaded.
///
/// Sessions keep a `Weak` reference plus their own handle; once the
/// registry is dropped those sessions report themselves unloaded. Every
/// engine call goes through the lock, which serialises access per registry.
pub struct EngineRegistry {
    inner: Mutex<Box<dyn PdfEngine>>,
}

impl EngineRegistry {
    pub fn new<E: PdfEngine + 'static>(engine: E) -> Self {
        Self::from_boxed(Box::new(engine))
    }

    pub fn from_boxed(engine: Box<dyn PdfEngine>) -> Self {
        Self {
            inner: Mutex::new(engine),
        }
    }

    /// Run `f` with exclusive access to the engine.
    pub fn with_engine<T>(&self, f: impl FnOnce(&mut dyn PdfEngine) -> T) -> Result<T> {
        let mut engine = self
            .inner
            .lock()
            .map_err(|e| Error::State(format!("Failed to acquire engine lock: {}", e)))?;
        Ok(f(engine.as_mut()))
    }

    pub fn list_loaded_handles(&self) -> Result<Vec<String>> {
        self.with_engine(|engine| engine.list_loaded_handles())
    }

    pub fn is_loaded(&self, handle: &str) -> Result<bool> {
        self.with_engine(|engine| engine.is_loaded(handle))
    }
}

impl std::fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineRegistry").finish_non_exhaustive()
    }
}
