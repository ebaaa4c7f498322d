use crate::MethodDescriptor;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// The table a [`crate::ServiceRegistry`] keeps its methods in.
pub type MethodTable = HashMap<String, Arc<MethodDescriptor>>;

/// Closure-passing access to a method table behind a lock.
///
/// Callers never hold the guard themselves, so no critical section can
/// outlive the closure; in particular, a handler is never run under it.
pub trait WithMethods: Send + Sync {
    fn with_methods<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut MethodTable) -> R;
}

impl WithMethods for Mutex<MethodTable> {
    fn with_methods<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut MethodTable) -> R,
    {
        let mut guard = self.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }
}
