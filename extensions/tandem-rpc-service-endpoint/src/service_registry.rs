use crate::{MethodDescriptor, MethodTable, WithMethods};
use std::sync::{Arc, Mutex};

/// Name → method table shared by every connection of a server.
///
/// Every operation takes the table lock only long enough to touch the map;
/// lookups hand out an `Arc` so the handler runs unlocked. Registering a
/// method therefore never waits on an invocation, and an invocation keeps
/// using the descriptor it looked up even if the name is re-registered
/// meanwhile.
#[derive(Default)]
pub struct ServiceRegistry {
    methods: Mutex<MethodTable>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `descriptor` under its name, returning the one it replaced.
    pub fn register(&self, descriptor: MethodDescriptor) -> Option<Arc<MethodDescriptor>> {
        let name = descriptor.name().to_owned();
        let replaced = self
            .methods
            .with_methods(|methods| methods.insert(name.clone(), Arc::new(descriptor)));

        match &replaced {
            Some(_) => tracing::info!("Replaced method {}", name),
            None => tracing::info!("Registered method {}", name),
        }
        replaced
    }

    pub fn unregister(&self, name: &str) -> Option<Arc<MethodDescriptor>> {
        let removed = self.methods.with_methods(|methods| methods.remove(name));
        if removed.is_some() {
            tracing::info!("Unregistered method {}", name);
        }
        removed
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<MethodDescriptor>> {
        self.methods.with_methods(|methods| methods.get(name).cloned())
    }

    /// Registered method names, sorted.
    pub fn method_names(&self) -> Vec<String> {
        let mut names = self
            .methods
            .with_methods(|methods| methods.keys().cloned().collect::<Vec<_>>());
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.methods.with_methods(|methods| methods.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("methods", &self.method_names())
            .finish()
    }
}
