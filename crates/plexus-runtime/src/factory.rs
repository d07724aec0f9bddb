//! Factory - the capability set every binding plugin implements.
//!
//! # Design Philosophy
//!
//! The runtime never knows which transports exist. It only knows this
//! trait: one fixed capability set, one implementation per transport,
//! stored behind `Arc<dyn Factory>` in the registry.
//!
//! ```text
//! Runtime
//! ├── "dbus"  ──→ Arc<dyn Factory>  (loaded from libdbus_binding.so)
//! ├── "local" ──→ Arc<dyn Factory>  (linked in)
//! └── "someip" ─→ Arc<dyn Factory>  (loaded on demand)
//! ```
//!
//! Generated per-interface wrappers sit on top of [`Proxy`] and
//! [`StubBase`] through [`ProxyInterface`] and [`StubInterface`].

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use plexus_common::{ConnectionId, ServiceAddress};

/// Asynchronous dispatch context owned by the application's event loop.
///
/// The runtime only passes it through to bindings.
pub trait MainLoopContext: Send + Sync {
    /// Human-readable name, used in logs.
    fn name(&self) -> &str;
}

/// Selects which connection a binding should use for a proxy or stub.
///
/// Either an explicit connection id or an event-loop context; both paths
/// go through the same dispatch protocol.
#[derive(Clone)]
pub enum ConnectionSelector {
    Connection(ConnectionId),
    Context(Arc<dyn MainLoopContext>),
}

impl Default for ConnectionSelector {
    fn default() -> Self {
        ConnectionSelector::Connection(ConnectionId::default())
    }
}

impl fmt::Debug for ConnectionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionSelector::Connection(id) => f.debug_tuple("Connection").field(id).finish(),
            ConnectionSelector::Context(context) => {
                f.debug_tuple("Context").field(&context.name()).finish()
            }
        }
    }
}

impl From<ConnectionId> for ConnectionSelector {
    fn from(id: ConnectionId) -> Self {
        ConnectionSelector::Connection(id)
    }
}

impl From<&str> for ConnectionSelector {
    fn from(id: &str) -> Self {
        ConnectionSelector::Connection(ConnectionId::from(id))
    }
}

impl From<Arc<dyn MainLoopContext>> for ConnectionSelector {
    fn from(context: Arc<dyn MainLoopContext>) -> Self {
        ConnectionSelector::Context(context)
    }
}

/// Client-side handle produced by a binding.
pub trait Proxy: Send + Sync {
    /// Address this proxy talks to.
    fn address(&self) -> &ServiceAddress;

    /// Whether the remote side is currently reachable.
    fn is_available(&self) -> bool;

    /// Lets generated wrappers recover the binding's concrete proxy type.
    fn as_any(&self) -> &dyn Any;
}

/// Server-side object exposed under a service address.
///
/// Every `Send + Sync + 'static` type is a stub; bindings recover the
/// concrete type through [`StubBase::into_any`].
pub trait StubBase: Any + Send + Sync {
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> StubBase for T {
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Typed client wrapper for one interface (normally generated code).
pub trait ProxyInterface: Sized {
    /// Interface name, the middle segment of the service address.
    const INTERFACE: &'static str;

    /// Wraps the binding's proxy handle.
    fn from_proxy(proxy: Arc<dyn Proxy>) -> Self;
}

/// Stub implementation of one interface (normally generated code).
pub trait StubInterface: StubBase {
    /// Interface name, the middle segment of the service address.
    const INTERFACE: &'static str;
}

/// Binding plugin contract consumed by the runtime.
///
/// # Lifecycle
///
/// 1. A binding constructs its factory (at link time or inside a module's
///    entry point)
/// 2. It registers the factory under a unique binding name
/// 3. The runtime asks every registered factory, in turn, whether it can
///    serve a request; the first positive answer wins
///
/// Implementations must be cheap to query: declining a request should not
/// touch the transport.
pub trait Factory: Send + Sync {
    /// Creates a proxy for `domain:interface:instance`, or `None` when this
    /// binding does not serve the address.
    fn create_proxy(
        &self,
        domain: &str,
        interface: &str,
        instance: &str,
        selector: &ConnectionSelector,
    ) -> Option<Arc<dyn Proxy>>;

    /// Exposes `stub` under `domain:interface:instance`.
    ///
    /// Returns `false` when this binding does not serve the address or the
    /// address is already claimed.
    fn register_stub(
        &self,
        domain: &str,
        interface: &str,
        instance: &str,
        stub: Arc<dyn StubBase>,
        selector: &ConnectionSelector,
    ) -> bool;

    /// Withdraws a stub registered through this binding.
    fn unregister_stub(&self, domain: &str, interface: &str, instance: &str) -> bool;

    /// Serialized addresses of the instances of `interface` known in
    /// `domain`. Callers without a domain pass [`plexus_common::DEFAULT_DOMAIN`].
    fn available_instances(&self, interface: &str, domain: &str) -> Vec<String>;

    /// Whether `address` is currently served.
    fn is_instance_alive(&self, address: &ServiceAddress) -> bool;

    /// [`Factory::is_instance_alive`] from separate segments; callers
    /// without a domain pass [`plexus_common::DEFAULT_DOMAIN`]. Malformed
    /// segments are never alive.
    fn is_instance_alive_in(&self, instance: &str, interface: &str, domain: &str) -> bool {
        ServiceAddress::new(domain, interface, instance)
            .map(|address| self.is_instance_alive(&address))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Loop;

    impl MainLoopContext for Loop {
        fn name(&self) -> &str {
            "glib-main"
        }
    }

    #[test]
    fn test_selector_default_is_default_connection() {
        match ConnectionSelector::default() {
            ConnectionSelector::Connection(id) => assert!(id.is_default()),
            other => panic!("unexpected selector {:?}", other),
        }
    }

    #[test]
    fn test_selector_conversions() {
        let selector = ConnectionSelector::from("session");
        assert!(matches!(selector, ConnectionSelector::Connection(ref id) if id.as_str() == "session"));

        let context: Arc<dyn MainLoopContext> = Arc::new(Loop);
        let selector = ConnectionSelector::from(context);
        assert_eq!(format!("{:?}", selector), "Context(\"glib-main\")");
    }

    struct OneInstance;

    impl Factory for OneInstance {
        fn create_proxy(
            &self,
            _domain: &str,
            _interface: &str,
            _instance: &str,
            _selector: &ConnectionSelector,
        ) -> Option<Arc<dyn Proxy>> {
            None
        }

        fn register_stub(
            &self,
            _domain: &str,
            _interface: &str,
            _instance: &str,
            _stub: Arc<dyn StubBase>,
            _selector: &ConnectionSelector,
        ) -> bool {
            false
        }

        fn unregister_stub(&self, _domain: &str, _interface: &str, _instance: &str) -> bool {
            false
        }

        fn available_instances(&self, _interface: &str, _domain: &str) -> Vec<String> {
            Vec::new()
        }

        fn is_instance_alive(&self, address: &ServiceAddress) -> bool {
            address.to_string() == "local:a.Echo:main"
        }
    }

    #[test]
    fn test_instance_alive_from_segments() {
        let factory = OneInstance;
        assert!(factory.is_instance_alive_in("main", "a.Echo", plexus_common::DEFAULT_DOMAIN));
        assert!(!factory.is_instance_alive_in("other", "a.Echo", "local"));
        assert!(!factory.is_instance_alive_in("", "a.Echo", "local"));
        assert!(!factory.is_instance_alive_in("main", "a:Echo", "local"));
    }

    #[test]
    fn test_stub_downcast() {
        struct EchoStub(u32);

        let stub: Arc<dyn StubBase> = Arc::new(EchoStub(7));
        let any = stub.into_any();
        let echo = any.downcast::<EchoStub>().ok().unwrap();
        assert_eq!(echo.0, 7);
    }
}
