//! Plugin Entry - Explicit Binding Registration
//!
//! # Architecture
//!
//! A binding packaged as a dynamic module does not reach for a global
//! runtime when it is loaded. Instead the loader looks up one well-known
//! entry symbol and calls it with a [`BindingRegistrar`]; the module
//! registers its factory through that callback before the load returns.
//!
//! ```text
//! ModuleLoader::load("libdbus_binding")
//!     ↓ dlopen(RTLD_LAZY | RTLD_GLOBAL)
//!     ↓ dlsym("plexus_binding_entry")
//! plexus_binding_entry(&registrar)
//!     └── registrar.register("dbus", Arc::new(DBusFactory::new()))
//!             └── FactoryRegistry::register (check-and-insert)
//! ```
//!
//! ## Declaring a binding
//!
//! ```rust,ignore
//! // In a crate built with crate-type = ["cdylib", "rlib"]
//! plexus_runtime::declare_binding!("dbus", DBusFactory::new());
//! ```
//!
//! The entry uses the Rust ABI, so a module must be built with the same
//! toolchain as the process loading it.

use std::sync::Arc;

use plexus_common::BindingName;
use tracing::debug;

use crate::factory::Factory;
use crate::registry::FactoryRegistry;

/// Name of the symbol every binding module exports, NUL-terminated for
/// the native loader.
pub const ENTRY_SYMBOL: &[u8] = b"plexus_binding_entry\0";

/// Signature of the exported entry point.
pub type BindingEntryFn = fn(&BindingRegistrar<'_>);

/// Registration callback handed to a binding while its module loads.
pub struct BindingRegistrar<'a> {
    registry: &'a FactoryRegistry,
}

impl<'a> BindingRegistrar<'a> {
    pub fn new(registry: &'a FactoryRegistry) -> Self {
        Self { registry }
    }

    /// Registers `factory` under `binding`.
    ///
    /// Returns `false` when the name is already taken; the first binding
    /// registered under a name keeps it.
    pub fn register(&self, binding: impl Into<BindingName>, factory: Arc<dyn Factory>) -> bool {
        let binding = binding.into();
        debug!("[Plugin] Binding '{}' registering through entry point", binding);
        self.registry.register(binding, factory)
    }
}

/// Emits the `plexus_binding_entry` symbol for a binding crate.
///
/// `$binding` is the binding name, `$factory` an expression building the
/// factory. The expression runs once per load of the module.
#[macro_export]
macro_rules! declare_binding {
    ($binding:expr, $factory:expr) => {
        #[no_mangle]
        pub fn plexus_binding_entry(registrar: &$crate::plugin::BindingRegistrar<'_>) {
            let factory: ::std::sync::Arc<dyn $crate::factory::Factory> =
                ::std::sync::Arc::new($factory);
            registrar.register($binding, factory);
        }
    };
}
