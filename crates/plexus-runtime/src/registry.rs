//! Factory Registry - Binding Name to Factory Storage
//!
//! # Architecture
//!
//! Bindings register their factory under a unique name, either when they
//! are linked in or from inside a dynamically loaded module. The runtime
//! then dispatches every proxy/stub request across the registered
//! factories.
//!
//! ## The Flow
//!
//! ```text
//! Module load (dlopen)
//! └── plexus_binding_entry(registrar)
//!     └── register("dbus", factory)
//!         └── check-and-insert under the registry lock
//!
//! Dispatch
//! ├── snapshot()            (lock held only while cloning)
//! └── for each factory: create_proxy / register_stub
//! ```
//!
//! ## Why a snapshot?
//!
//! A module load triggered between dispatch passes calls back into
//! `register()`. If dispatch held the lock while iterating, that callback
//! would deadlock on the same mutex. Cloning the `Arc`s out first keeps
//! the lock scope down to the check-and-insert.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use plexus_common::BindingName;
use tracing::{debug, warn};

use crate::factory::Factory;

/// One entry of a dispatch snapshot.
pub type FactoryEntry = (BindingName, Arc<dyn Factory>);

/// Registry of binding factories.
///
/// Entries are added, never removed. A binding name maps to at most one
/// factory: the first registration wins.
#[derive(Default)]
pub struct FactoryRegistry {
    factories: Mutex<BTreeMap<BindingName, Arc<dyn Factory>>>,
}

impl FactoryRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` under `binding`.
    ///
    /// Returns `false` without touching the registry when the name is
    /// already taken.
    pub fn register(&self, binding: impl Into<BindingName>, factory: Arc<dyn Factory>) -> bool {
        let binding = binding.into();
        debug!("[Registry] Registering factory for binding={}", binding);

        let mut factories = self.factories.lock();
        if factories.contains_key(&binding) {
            warn!("[Registry] Binding '{}' is already registered, ignoring", binding);
            return false;
        }
        factories.insert(binding.clone(), factory);
        drop(factories);

        debug!("[Registry] ✅ Factory registered: {}", binding);
        true
    }

    /// Removing a binding is not supported; always returns `false`.
    ///
    /// Factories may hand out proxies and stubs that outlive any removal,
    /// so a binding stays registered for the process lifetime.
    pub fn unregister(&self, binding: &BindingName) -> bool {
        debug!("[Registry] Unregister requested for binding={} (not supported)", binding);
        false
    }

    /// Returns the factory registered under `binding`.
    pub fn get(&self, binding: &BindingName) -> Option<Arc<dyn Factory>> {
        self.factories.lock().get(binding).cloned()
    }

    pub fn contains(&self, binding: &BindingName) -> bool {
        self.factories.lock().contains_key(binding)
    }

    /// Registered binding names in name order.
    pub fn names(&self) -> Vec<BindingName> {
        self.factories.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.factories.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.lock().is_empty()
    }

    /// Consistent copy of the registry for one dispatch pass.
    ///
    /// The `preferred` binding (normally the configured default) comes
    /// first; the rest follow in name order.
    pub fn snapshot(&self, preferred: Option<&BindingName>) -> Vec<FactoryEntry> {
        let factories = self.factories.lock();
        let mut entries = Vec::with_capacity(factories.len());

        if let Some(name) = preferred {
            if let Some(factory) = factories.get(name) {
                entries.push((name.clone(), Arc::clone(factory)));
            }
        }
        for (name, factory) in factories.iter() {
            if Some(name) != preferred {
                entries.push((name.clone(), Arc::clone(factory)));
            }
        }

        entries
    }
}
