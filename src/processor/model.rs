//! One-time model initialisation
//!
//! Heavy models are expensive to load and safe to share. A [`LazyModel`] is
//! declared as a `static` and initialised by whichever caller reaches it
//! first; concurrent first callers wait on the init lock instead of loading a
//! second copy.
//!
//! ```ignore
//! static DETECTOR: LazyModel<OwlVit> = LazyModel::new();
//!
//! let model = DETECTOR.get_or_try_init(|| OwlVit::load("owlvit-base-patch32"))?;
//! ```

use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use crate::error::ProcessorError;

/// Process-wide lazily initialised model
pub struct LazyModel<T> {
    cell: OnceLock<Arc<T>>,
    init_lock: Mutex<()>,
}

impl<T> LazyModel<T> {
    /// Create an empty cell (usable in `static` items)
    pub const fn new() -> Self {
        Self {
            cell: OnceLock::new(),
            init_lock: Mutex::new(()),
        }
    }

    /// Get the model if it has been initialised
    pub fn get(&self) -> Option<Arc<T>> {
        self.cell.get().cloned()
    }

    /// Check if the model has been initialised
    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Get the model, running `init` if this is the first successful call
    ///
    /// A failed `init` leaves the cell empty so the next call retries.
    pub fn get_or_try_init<F>(&self, init: F) -> Result<Arc<T>, ProcessorError>
    where
        F: FnOnce() -> Result<T, ProcessorError>,
    {
        if let Some(model) = self.cell.get() {
            return Ok(Arc::clone(model));
        }

        let _guard = self.init_lock.lock().unwrap_or_else(PoisonError::into_inner);

        // Another caller may have finished while we waited
        if let Some(model) = self.cell.get() {
            return Ok(Arc::clone(model));
        }

        let model = Arc::new(init()?);
        let _ = self.cell.set(Arc::clone(&model));
        tracing::info!(model = std::any::type_name::<T>(), "Model initialised");

        Ok(model)
    }
}

impl<T> Default for LazyModel<T> {
    fn default() -> Self {
        Self::new()
    }
}
