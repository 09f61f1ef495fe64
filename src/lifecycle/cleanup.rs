//! Resource release hooks run after every callback has returned.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// A named, run-once release step (pooled connections, file handles, ...).
pub struct CleanupHook {
    name: String,
    release: Box<dyn FnOnce() + Send>,
}

impl CleanupHook {
    pub fn new<F>(name: impl Into<String>, release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            name: name.into(),
            release: Box::new(release),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the hook. A panic is logged and reported as `false`.
    pub fn run(self) -> bool {
        let CleanupHook { name, release } = self;
        match catch_unwind(AssertUnwindSafe(release)) {
            Ok(()) => {
                tracing::info!(resource = %name, "Resource released");
                true
            }
            Err(_) => {
                tracing::error!(resource = %name, "Resource release panicked");
                false
            }
        }
    }
}

impl fmt::Debug for CleanupHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CleanupHook")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Run hooks in registration order; one failing hook does not stop the rest.
///
/// Returns how many hooks released cleanly.
pub fn release_all(hooks: Vec<CleanupHook>) -> usize {
    hooks.into_iter().map(CleanupHook::run).filter(|ok| *ok).count()
}
