//! Module name derivation: which module should serve an address.

use std::collections::HashMap;

use plexus_common::ServiceAddress;

/// Prefix of every synthesized module name.
pub const MODULE_PREFIX: &str = "lib";

/// Separator between the address segments in a synthesized module name.
pub const MODULE_SEPARATOR: &str = "__";

/// Configured `(address, is_proxy)` → module name overrides.
///
/// Built once while the configuration is resolved and read-only afterward.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryOverrides {
    entries: HashMap<(String, bool), String>,
}

impl LibraryOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an override; a later insert for the same key replaces the
    /// earlier one.
    pub fn insert(&mut self, address: impl Into<String>, is_proxy: bool, module: impl Into<String>) {
        self.entries.insert((address.into(), is_proxy), module.into());
    }

    /// Module configured for `(address, is_proxy)`. An empty module name
    /// counts as no override.
    pub fn get(&self, address: &str, is_proxy: bool) -> Option<&str> {
        self.entries
            .get(&(address.to_string(), is_proxy))
            .map(String::as_str)
            .filter(|module| !module.is_empty())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Name of the module expected to serve `domain:interface:instance`.
///
/// A non-empty override for `(address, is_proxy)` is returned verbatim. Otherwise
/// the name is `lib<domain>__<interface>__<instance>` with every `.`
/// turned into `_`. The platform suffix is added by the loader.
pub fn derive_module_name(
    overrides: &LibraryOverrides,
    domain: &str,
    interface: &str,
    instance: &str,
    is_proxy: bool,
) -> String {
    let address = format!("{}:{}:{}", domain, interface, instance);
    if let Some(module) = overrides.get(&address, is_proxy) {
        return module.to_string();
    }

    let mut name = String::with_capacity(
        MODULE_PREFIX.len() + address.len() + 2 * MODULE_SEPARATOR.len(),
    );
    name.push_str(MODULE_PREFIX);
    name.push_str(domain);
    name.push_str(MODULE_SEPARATOR);
    name.push_str(interface);
    name.push_str(MODULE_SEPARATOR);
    name.push_str(instance);
    name.replace('.', "_")
}

/// [`derive_module_name`] for an already parsed address.
pub fn module_name_for(overrides: &LibraryOverrides, address: &ServiceAddress, is_proxy: bool) -> String {
    derive_module_name(
        overrides,
        address.domain(),
        address.interface(),
        address.instance(),
        is_proxy,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthesized_name() {
        let overrides = LibraryOverrides::new();
        assert_eq!(
            derive_module_name(&overrides, "local", "com.acme.Echo", "main", true),
            "liblocal__com_acme_Echo__main"
        );
    }

    #[test]
    fn test_dots_replaced_in_every_segment() {
        let overrides = LibraryOverrides::new();
        let name = derive_module_name(&overrides, "car.body", "a.b.C", "front.left", false);
        assert_eq!(name, "libcar_body__a_b_C__front_left");
        assert!(!name.contains('.'));
    }

    #[test]
    fn test_deterministic() {
        let overrides = LibraryOverrides::new();
        let first = derive_module_name(&overrides, "d", "i.j", "n", true);
        let second = derive_module_name(&overrides, "d", "i.j", "n", true);
        assert_eq!(first, second);
    }

    #[test]
    fn test_override_wins_per_direction() {
        let mut overrides = LibraryOverrides::new();
        overrides.insert("local:com.acme.Echo:main", true, "libecho-proxy.so");

        assert_eq!(
            derive_module_name(&overrides, "local", "com.acme.Echo", "main", true),
            "libecho-proxy.so"
        );
        // The stub direction has no override and falls back to the default.
        assert_eq!(
            derive_module_name(&overrides, "local", "com.acme.Echo", "main", false),
            "liblocal__com_acme_Echo__main"
        );
    }

    #[test]
    fn test_override_is_returned_verbatim() {
        let mut overrides = LibraryOverrides::new();
        overrides.insert("local:x:y", false, "lib.with.dots");
        assert_eq!(
            derive_module_name(&overrides, "local", "x", "y", false),
            "lib.with.dots"
        );
    }

    #[test]
    fn test_empty_override_falls_back_to_synthesized_name() {
        let mut overrides = LibraryOverrides::new();
        overrides.insert("local:a.B:main", true, "");

        assert_eq!(overrides.get("local:a.B:main", true), None);
        assert_eq!(
            derive_module_name(&overrides, "local", "a.B", "main", true),
            "liblocal__a_B__main"
        );
    }

    #[test]
    fn test_module_name_for_address() {
        let overrides = LibraryOverrides::new();
        let address = ServiceAddress::parse("local:com.acme.Echo:main").unwrap();
        assert_eq!(
            module_name_for(&overrides, &address, true),
            "liblocal__com_acme_Echo__main"
        );
    }
}
