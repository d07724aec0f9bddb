//! Runtime - Binding Dispatch and On-Demand Module Loading
//!
//! # Architecture
//!
//! The runtime owns the three pieces of process-wide state: the resolved
//! configuration, the factory registry and the set of loaded modules.
//! Application code asks it for proxies and stub registrations; the
//! runtime decides which binding serves the address.
//!
//! ```text
//! create_proxy(domain, interface, instance, selector)
//!     ↓
//! 1. Pass over a registry snapshot (default binding first)
//!    └── first factory returning Some wins
//! 2. Nothing? derive module name (override or lib<d>__<i>__<n>)
//! 3. Load it; the module registers its factory through the registrar
//! 4. Load succeeded? exactly one more pass
//! 5. Still nothing → None
//! ```
//!
//! `register_stub` follows the same protocol with `is_proxy = false`.
//! `unregister_service` and discovery only ask the factories already
//! present and never load anything.
//!
//! ## Locking
//!
//! Each pass runs over a snapshot, and the load in step 3 runs with no
//! registry lock held, so a module registering itself cannot deadlock
//! against dispatch.
//!
//! # Rust Learning Note
//!
//! The process-wide instance lives in a `lazy_static!` and is reached
//! through [`Runtime::get`]. Everything else takes `&self`, so tests build
//! private runtimes with [`Runtime::with_opener`] and never touch the
//! global one.

use std::collections::BTreeSet;
use std::sync::Arc;

use lazy_static::lazy_static;
use plexus_common::{BindingName, ServiceAddress};
use tracing::{debug, warn};

use crate::config::RuntimeConfig;
use crate::factory::{ConnectionSelector, Factory, Proxy, ProxyInterface, StubBase, StubInterface};
use crate::loader::{DynamicModuleOpener, ModuleLoader, ModuleOpener};
use crate::module_name::{derive_module_name, module_name_for};
use crate::plugin::BindingRegistrar;
use crate::registry::FactoryRegistry;

lazy_static! {
    static ref RUNTIME: Arc<Runtime> = Arc::new(Runtime::new(RuntimeConfig::from_env()));
}

/// Binding registry plus dispatch protocol.
pub struct Runtime {
    config: RuntimeConfig,
    registry: FactoryRegistry,
    loader: ModuleLoader,
}

impl Runtime {
    /// Process-wide runtime, created on first access.
    ///
    /// Concurrent first calls observe the same instance.
    pub fn get() -> Arc<Runtime> {
        Arc::clone(&RUNTIME)
    }

    /// Runtime loading modules through the platform dynamic loader.
    pub fn new(config: RuntimeConfig) -> Self {
        Self::with_opener(config, Arc::new(DynamicModuleOpener::new()))
    }

    /// Runtime loading modules through `opener`.
    pub fn with_opener(config: RuntimeConfig, opener: Arc<dyn ModuleOpener>) -> Self {
        config.log_settings();
        let loader = ModuleLoader::new(config.default_folder.clone(), opener);

        Self {
            config,
            registry: FactoryRegistry::new(),
            loader,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn registry(&self) -> &FactoryRegistry {
        &self.registry
    }

    pub fn loader(&self) -> &ModuleLoader {
        &self.loader
    }

    /// Registers a statically linked binding.
    pub fn register_factory(&self, binding: impl Into<BindingName>, factory: Arc<dyn Factory>) -> bool {
        self.registry.register(binding, factory)
    }

    /// Always `false`: bindings stay registered for the process lifetime.
    pub fn unregister_factory(&self, binding: &BindingName) -> bool {
        self.registry.unregister(binding)
    }

    /// Loads `name` and lets it register its bindings into this runtime.
    pub fn load_module(&self, name: &str) -> bool {
        let registrar = BindingRegistrar::new(&self.registry);
        self.loader.load(name, &registrar)
    }

    /// Module expected to serve `address` in the given direction.
    pub fn module_name(&self, address: &ServiceAddress, is_proxy: bool) -> String {
        module_name_for(&self.config.overrides, address, is_proxy)
    }

    /// Builds a proxy for `domain:interface:instance`.
    ///
    /// `None` means no registered or loadable binding serves the address.
    pub fn create_proxy(
        &self,
        domain: &str,
        interface: &str,
        instance: &str,
        selector: impl Into<ConnectionSelector>,
    ) -> Option<Arc<dyn Proxy>> {
        let selector = selector.into();
        debug!(
            "[Runtime] create_proxy {}:{}:{} ({:?})",
            domain, interface, instance, selector
        );

        self.dispatch(domain, interface, instance, true, |binding, factory| {
            let proxy = factory.create_proxy(domain, interface, instance, &selector)?;
            debug!("[Runtime] ✅ Binding '{}' created proxy for {}", binding, proxy.address());
            Some(proxy)
        })
    }

    /// Typed [`Runtime::create_proxy`]; the interface comes from `P`.
    pub fn build_proxy<P: ProxyInterface>(
        &self,
        domain: &str,
        instance: &str,
        selector: impl Into<ConnectionSelector>,
    ) -> Option<P> {
        self.create_proxy(domain, P::INTERFACE, instance, selector)
            .map(P::from_proxy)
    }

    /// [`Runtime::build_proxy`] from a serialized `domain:interface:instance`.
    ///
    /// A malformed address, or one naming another interface, yields `None`.
    pub fn build_proxy_at<P: ProxyInterface>(
        &self,
        address: &str,
        selector: impl Into<ConnectionSelector>,
    ) -> Option<P> {
        let address = match ServiceAddress::parse(address) {
            Ok(address) => address,
            Err(e) => {
                warn!("[Runtime] Cannot build proxy: {}", e);
                return None;
            }
        };

        if address.interface() != P::INTERFACE {
            warn!(
                "[Runtime] Address {} does not name interface {}",
                address,
                P::INTERFACE
            );
            return None;
        }

        self.build_proxy(address.domain(), address.instance(), selector)
    }

    /// Exposes `stub` under `domain:interface:instance` through the first
    /// binding accepting it.
    pub fn register_stub(
        &self,
        domain: &str,
        interface: &str,
        instance: &str,
        stub: Arc<dyn StubBase>,
        selector: impl Into<ConnectionSelector>,
    ) -> bool {
        let selector = selector.into();
        debug!(
            "[Runtime] register_stub {}:{}:{} ({:?})",
            domain, interface, instance, selector
        );

        self.dispatch(domain, interface, instance, false, |binding, factory| {
            let registered =
                factory.register_stub(domain, interface, instance, Arc::clone(&stub), &selector);
            if registered {
                debug!(
                    "[Runtime] ✅ Binding '{}' registered {}:{}:{}",
                    binding, domain, interface, instance
                );
            }
            registered.then_some(())
        })
        .is_some()
    }

    /// Typed [`Runtime::register_stub`]; the interface comes from `S`.
    pub fn register_service<S: StubInterface>(
        &self,
        domain: &str,
        instance: &str,
        service: Arc<S>,
        selector: impl Into<ConnectionSelector>,
    ) -> bool {
        self.register_stub(domain, S::INTERFACE, instance, service, selector)
    }

    /// Withdraws a stub. Only bindings already registered are asked.
    pub fn unregister_service(&self, domain: &str, interface: &str, instance: &str) -> bool {
        let unregistered = self
            .registry
            .snapshot(Some(&self.config.default_binding))
            .into_iter()
            .any(|(_, factory)| factory.unregister_stub(domain, interface, instance));

        debug!(
            "[Runtime] unregister_service {}:{}:{} → {}",
            domain, interface, instance, unregistered
        );
        unregistered
    }

    /// Addresses of the known instances of `interface` in `domain`, across
    /// all registered bindings, sorted and without duplicates.
    pub fn available_instances(&self, interface: &str, domain: &str) -> Vec<String> {
        let instances: BTreeSet<String> = self
            .registry
            .snapshot(None)
            .into_iter()
            .flat_map(|(_, factory)| factory.available_instances(interface, domain))
            .collect();

        instances.into_iter().collect()
    }

    /// Whether any registered binding serves `address`.
    pub fn is_instance_alive(&self, address: &ServiceAddress) -> bool {
        self.registry
            .snapshot(Some(&self.config.default_binding))
            .into_iter()
            .any(|(_, factory)| factory.is_instance_alive(address))
    }

    /// [`Runtime::is_instance_alive`] from separate segments. Malformed
    /// segments are never alive.
    pub fn is_instance_alive_in(&self, instance: &str, interface: &str, domain: &str) -> bool {
        match ServiceAddress::new(domain, interface, instance) {
            Ok(address) => self.is_instance_alive(&address),
            Err(e) => {
                debug!("[Runtime] {}", e);
                false
            }
        }
    }

    /// Try, load, retry once.
    fn dispatch<T>(
        &self,
        domain: &str,
        interface: &str,
        instance: &str,
        is_proxy: bool,
        mut attempt: impl FnMut(&BindingName, &dyn Factory) -> Option<T>,
    ) -> Option<T> {
        if let Some(found) = self.dispatch_pass(&mut attempt) {
            return Some(found);
        }

        let module = derive_module_name(&self.config.overrides, domain, interface, instance, is_proxy);
        debug!(
            "[Runtime] No binding serves {}:{}:{}, loading module {}",
            domain, interface, instance, module
        );
        if !self.load_module(&module) {
            return None;
        }

        let found = self.dispatch_pass(&mut attempt);
        if found.is_none() {
            debug!("[Runtime] Module {} did not provide a serving binding", module);
        }
        found
    }

    fn dispatch_pass<T>(
        &self,
        attempt: &mut impl FnMut(&BindingName, &dyn Factory) -> Option<T>,
    ) -> Option<T> {
        self.registry
            .snapshot(Some(&self.config.default_binding))
            .iter()
            .find_map(|(binding, factory)| attempt(binding, factory.as_ref()))
    }
}
