//! Local binding (in-process, no transport).
//!
//! # Rust Learning Note
//!
//! A proxy built by this binding holds the stub itself: calling through
//! it is a plain method call on the implementation, with no marshaling.
//!
//! ```text
//! LocalFactory
//! └── stubs: Arc<RwLock<HashMap>>
//!     └── [domain:interface:instance] → Arc<dyn StubBase>
//!                                            ↑
//! LocalProxy ── stub() / downcast::<T>() ────┘
//! ```
//!
//! The table is shared with every proxy, so [`Proxy::is_available`] turns
//! `false` as soon as the stub is unregistered.
//!
//! ## Using it
//!
//! Linked in:
//!
//! ```rust,ignore
//! plexus_binding_local::register(&Runtime::get())?;
//! ```
//!
//! Or built as a `cdylib` and loaded on demand: the crate exports the
//! `plexus_binding_entry` symbol and registers itself as `"local"`.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use plexus_common::{Error, Result, ServiceAddress};
use plexus_runtime::{ConnectionSelector, Factory, Proxy, Runtime, StubBase};
use tracing::{debug, trace};

/// Name this binding registers under.
pub const BINDING_NAME: &str = "local";

type StubTable = Arc<RwLock<HashMap<ServiceAddress, Arc<dyn StubBase>>>>;

/// In-process [`Factory`].
#[derive(Default)]
pub struct LocalFactory {
    stubs: StubTable,
}

impl LocalFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stubs currently registered.
    pub fn len(&self) -> usize {
        self.stubs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.stubs.read().is_empty()
    }

    fn address(domain: &str, interface: &str, instance: &str) -> Option<ServiceAddress> {
        match ServiceAddress::new(domain, interface, instance) {
            Ok(address) => Some(address),
            Err(e) => {
                trace!("[Local] Declining request: {}", e);
                None
            }
        }
    }
}

impl Factory for LocalFactory {
    fn create_proxy(
        &self,
        domain: &str,
        interface: &str,
        instance: &str,
        _selector: &ConnectionSelector,
    ) -> Option<Arc<dyn Proxy>> {
        let address = Self::address(domain, interface, instance)?;
        let stub = self.stubs.read().get(&address).cloned()?;

        debug!("[Local] Creating proxy for {}", address);
        Some(Arc::new(LocalProxy {
            address,
            stub,
            stubs: Arc::clone(&self.stubs),
        }))
    }

    fn register_stub(
        &self,
        domain: &str,
        interface: &str,
        instance: &str,
        stub: Arc<dyn StubBase>,
        selector: &ConnectionSelector,
    ) -> bool {
        let Some(address) = Self::address(domain, interface, instance) else {
            return false;
        };

        let mut stubs = self.stubs.write();
        if stubs.contains_key(&address) {
            debug!("[Local] {} is already claimed", address);
            return false;
        }
        debug!("[Local] ✅ Registered stub {} ({:?})", address, selector);
        stubs.insert(address, stub);
        true
    }

    fn unregister_stub(&self, domain: &str, interface: &str, instance: &str) -> bool {
        let Some(address) = Self::address(domain, interface, instance) else {
            return false;
        };

        let removed = self.stubs.write().remove(&address).is_some();
        if removed {
            debug!("[Local] Unregistered stub {}", address);
        }
        removed
    }

    fn available_instances(&self, interface: &str, domain: &str) -> Vec<String> {
        let mut instances: Vec<String> = self
            .stubs
            .read()
            .keys()
            .filter(|address| address.interface() == interface && address.domain() == domain)
            .map(ToString::to_string)
            .collect();
        instances.sort();
        instances
    }

    fn is_instance_alive(&self, address: &ServiceAddress) -> bool {
        self.stubs.read().contains_key(address)
    }
}

/// Proxy handing out the registered stub itself.
pub struct LocalProxy {
    address: ServiceAddress,
    stub: Arc<dyn StubBase>,
    stubs: StubTable,
}

impl LocalProxy {
    /// The in-process target.
    pub fn stub(&self) -> Arc<dyn StubBase> {
        Arc::clone(&self.stub)
    }

    /// The target as its concrete type, if it is a `T`.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.stub().into_any().downcast::<T>().ok()
    }
}

impl fmt::Debug for LocalProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalProxy")
            .field("address", &self.address)
            .finish()
    }
}

impl Proxy for LocalProxy {
    fn address(&self) -> &ServiceAddress {
        &self.address
    }

    fn is_available(&self) -> bool {
        self.stubs
            .read()
            .get(&self.address)
            .map_or(false, |current| Arc::ptr_eq(current, &self.stub))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Registers a fresh [`LocalFactory`] with `runtime`.
pub fn register(runtime: &Runtime) -> Result<()> {
    if runtime.register_factory(BINDING_NAME, Arc::new(LocalFactory::new())) {
        Ok(())
    } else {
        Err(Error::duplicate_binding(BINDING_NAME))
    }
}

plexus_runtime::declare_binding!(BINDING_NAME, LocalFactory::new());

#[cfg(test)]
mod tests {
    use super::*;
    use plexus_runtime::plugin::BindingRegistrar;
    use plexus_runtime::{BindingEntryFn, FactoryRegistry, RuntimeConfig};
    use std::path::Path;

    struct Echo(&'static str);

    fn selector() -> ConnectionSelector {
        ConnectionSelector::default()
    }

    #[test]
    fn test_proxy_only_for_registered_stub() {
        let factory = LocalFactory::new();
        assert!(factory.create_proxy("local", "a.Echo", "main", &selector()).is_none());

        assert!(factory.register_stub("local", "a.Echo", "main", Arc::new(Echo("hi")), &selector()));
        let proxy = factory.create_proxy("local", "a.Echo", "main", &selector()).unwrap();
        assert_eq!(proxy.address().to_string(), "local:a.Echo:main");
        assert!(proxy.is_available());
    }

    #[test]
    fn test_downcast_recovers_stub() {
        let factory = LocalFactory::new();
        factory.register_stub("local", "a.Echo", "main", Arc::new(Echo("hi")), &selector());

        let proxy = factory.create_proxy("local", "a.Echo", "main", &selector()).unwrap();
        let local = proxy.as_any().downcast_ref::<LocalProxy>().unwrap();
        assert_eq!(local.downcast::<Echo>().unwrap().0, "hi");
        assert!(local.downcast::<String>().is_none());
    }

    #[test]
    fn test_second_claim_fails() {
        let factory = LocalFactory::new();
        assert!(factory.register_stub("local", "a.Echo", "main", Arc::new(Echo("one")), &selector()));
        assert!(!factory.register_stub("local", "a.Echo", "main", Arc::new(Echo("two")), &selector()));

        let proxy = factory.create_proxy("local", "a.Echo", "main", &selector()).unwrap();
        let local = proxy.as_any().downcast_ref::<LocalProxy>().unwrap();
        assert_eq!(local.downcast::<Echo>().unwrap().0, "one");
    }

    #[test]
    fn test_concurrent_claims_have_one_winner() {
        let factory = LocalFactory::new();

        let wins: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        factory.register_stub("local", "a.Echo", "main", Arc::new(Echo("x")), &selector())
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap() as usize)
                .sum()
        });

        assert_eq!(wins, 1);
        assert_eq!(factory.len(), 1);
    }

    #[test]
    fn test_unregister_makes_proxy_unavailable() {
        let factory = LocalFactory::new();
        factory.register_stub("local", "a.Echo", "main", Arc::new(Echo("hi")), &selector());
        let proxy = factory.create_proxy("local", "a.Echo", "main", &selector()).unwrap();

        assert!(factory.unregister_stub("local", "a.Echo", "main"));
        assert!(!factory.unregister_stub("local", "a.Echo", "main"));
        assert!(!proxy.is_available());
        assert!(factory.is_empty());

        // A new claim does not revive the old proxy.
        factory.register_stub("local", "a.Echo", "main", Arc::new(Echo("again")), &selector());
        assert!(!proxy.is_available());
    }

    #[test]
    fn test_invalid_segments_are_declined() {
        let factory = LocalFactory::new();
        assert!(!factory.register_stub("", "a.Echo", "main", Arc::new(Echo("hi")), &selector()));
        assert!(!factory.register_stub("local", "a:Echo", "main", Arc::new(Echo("hi")), &selector()));
        assert!(factory.create_proxy("local", "a.Echo", "", &selector()).is_none());
        assert!(factory.is_empty());
    }

    #[test]
    fn test_available_instances_filters_and_sorts() {
        let factory = LocalFactory::new();
        factory.register_stub("local", "a.Echo", "zeta", Arc::new(Echo("z")), &selector());
        factory.register_stub("local", "a.Echo", "alpha", Arc::new(Echo("a")), &selector());
        factory.register_stub("local", "a.Other", "main", Arc::new(Echo("o")), &selector());
        factory.register_stub("car", "a.Echo", "main", Arc::new(Echo("c")), &selector());

        assert_eq!(
            factory.available_instances("a.Echo", "local"),
            vec!["local:a.Echo:alpha".to_string(), "local:a.Echo:zeta".to_string()]
        );

        let alive = ServiceAddress::parse("car:a.Echo:main").unwrap();
        let gone = ServiceAddress::parse("car:a.Echo:other").unwrap();
        assert!(factory.is_instance_alive(&alive));
        assert!(!factory.is_instance_alive(&gone));
    }

    #[test]
    fn test_register_with_runtime() {
        let runtime = Runtime::with_opener(RuntimeConfig::default(), Arc::new(NoModules));
        register(&runtime).unwrap();
        assert!(matches!(register(&runtime), Err(Error::DuplicateBinding { .. })));

        assert!(runtime.register_stub("local", "a.Echo", "main", Arc::new(Echo("hi")), ""));
        let proxy = runtime.create_proxy("local", "a.Echo", "main", "").unwrap();
        assert!(proxy.is_available());
        assert!(runtime.unregister_service("local", "a.Echo", "main"));
    }

    #[test]
    fn test_entry_point_registers_local() {
        let registry = FactoryRegistry::new();
        let entry: BindingEntryFn = plexus_binding_entry;
        entry(&BindingRegistrar::new(&registry));

        assert_eq!(registry.names(), vec![plexus_common::BindingName::from(BINDING_NAME)]);
    }

    struct NoModules;

    impl plexus_runtime::ModuleOpener for NoModules {
        fn open(&self, path: &Path, _registrar: &BindingRegistrar<'_>) -> Result<()> {
            Err(Error::module_load(path.display().to_string(), "no modules in tests"))
        }
    }
}
