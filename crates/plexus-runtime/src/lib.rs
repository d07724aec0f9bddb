//! # Plexus Runtime
//!
//! Binding registry and dispatch protocol for the Plexus middleware.
//!
//! Application code addresses services as `domain:interface:instance` and
//! asks the runtime for proxies or stub registrations. The runtime decides
//! which transport binding serves each address:
//! - Bindings implement [`Factory`] and register under a unique name
//! - Requests go to every registered factory, default binding first
//! - When none serves an address, the module named after it is loaded
//!   on demand and the request is retried once
//! - Startup settings come from defaults, a YAML file and the environment

pub mod config;
pub mod factory;
pub mod loader;
pub mod module_name;
pub mod plugin;
pub mod registry;
pub mod runtime;

// Re-export commonly used items
pub use config::{ConfigFile, ConfigSources, RuntimeConfig};
pub use factory::{
    ConnectionSelector,
    Factory,
    MainLoopContext,
    Proxy,
    ProxyInterface,
    StubBase,
    StubInterface,
};
pub use loader::{DynamicModuleOpener, ModuleLoader, ModuleOpener};
pub use module_name::{derive_module_name, module_name_for, LibraryOverrides};
pub use plugin::{BindingEntryFn, BindingRegistrar, ENTRY_SYMBOL};
pub use registry::{FactoryEntry, FactoryRegistry};
pub use runtime::Runtime;

pub use plexus_common::{BindingName, ConnectionId, Error, Result, ServiceAddress, DEFAULT_DOMAIN};
