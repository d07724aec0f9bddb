//! Core domain types used throughout the Plexus runtime.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::{Error, Result};

/// Domain assumed by discovery calls when the caller does not name one.
pub const DEFAULT_DOMAIN: &str = "local";

/// Separator between the three address segments.
const SEGMENT_SEPARATOR: char = ':';

/// Location-transparent service identifier: `domain:interface:instance`.
///
/// Every segment is non-empty and free of `:`. Interface names usually use
/// dot notation (`com.acme.Echo`); nothing here interprets them.
///
/// # Example
/// ```
/// use plexus_common::ServiceAddress;
///
/// let address: ServiceAddress = "local:com.acme.Echo:main".parse().unwrap();
/// assert_eq!(address.domain(), "local");
/// assert_eq!(address.interface(), "com.acme.Echo");
/// assert_eq!(address.instance(), "main");
/// assert_eq!(address.to_string(), "local:com.acme.Echo:main");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServiceAddress {
    domain: String,
    interface: String,
    instance: String,
}

impl ServiceAddress {
    /// Builds an address from its three segments.
    ///
    /// Fails with [`Error::InvalidAddress`] when a segment is empty or
    /// contains the separator.
    pub fn new(
        domain: impl Into<String>,
        interface: impl Into<String>,
        instance: impl Into<String>,
    ) -> Result<Self> {
        let address = Self {
            domain: domain.into(),
            interface: interface.into(),
            instance: instance.into(),
        };

        for (name, segment) in [
            ("domain", &address.domain),
            ("interface", &address.interface),
            ("instance", &address.instance),
        ] {
            if segment.is_empty() {
                return Err(Error::invalid_address(
                    address.to_string(),
                    format!("{} segment is empty", name),
                ));
            }
            if segment.contains(SEGMENT_SEPARATOR) {
                return Err(Error::invalid_address(
                    address.to_string(),
                    format!("{} segment contains '{}'", name, SEGMENT_SEPARATOR),
                ));
            }
        }

        Ok(address)
    }

    /// Parses the serialized `domain:interface:instance` form.
    ///
    /// No trimming and no case-folding: what goes in is what comes out.
    pub fn parse(raw: &str) -> Result<Self> {
        let segments: Vec<&str> = raw.split(SEGMENT_SEPARATOR).collect();
        if segments.len() != 3 {
            return Err(Error::invalid_address(
                raw,
                format!("expected 3 segments, found {}", segments.len()),
            ));
        }
        if segments.iter().any(|s| s.is_empty()) {
            return Err(Error::invalid_address(raw, "empty segment"));
        }

        Ok(Self {
            domain: segments[0].to_string(),
            interface: segments[1].to_string(),
            instance: segments[2].to_string(),
        })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }
}

impl fmt::Display for ServiceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}",
            self.domain,
            self.interface,
            self.instance,
            sep = SEGMENT_SEPARATOR
        )
    }
}

impl FromStr for ServiceAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ServiceAddress {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<ServiceAddress> for String {
    fn from(address: ServiceAddress) -> Self {
        address.to_string()
    }
}

/// Binding identifier - names one transport plugin in the factory registry.
///
/// # Example
/// ```
/// use plexus_common::BindingName;
///
/// let binding = BindingName::from("local");
/// assert_eq!(binding.as_str(), "local");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BindingName(String);

impl BindingName {
    /// Creates a new BindingName from a string.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the binding name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BindingName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for BindingName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for BindingName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Connection identifier handed through to bindings untouched.
///
/// The empty id is the default connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for the default (empty) connection.
    pub fn is_default(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ConnectionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_reserialize() {
        for raw in ["local:com.acme.Echo:main", "d:i:n", "A.b:C.d.E:f_1"] {
            let address = ServiceAddress::parse(raw).unwrap();
            assert_eq!(address.to_string(), raw);
        }
    }

    #[test]
    fn test_parse_rejects_wrong_shapes() {
        for raw in ["", "a", "a:b", "a:b:c:d", ":b:c", "a::c", "a:b:", "::", ":::"] {
            let err = ServiceAddress::parse(raw).unwrap_err();
            assert!(
                matches!(err, Error::InvalidAddress { .. }),
                "expected InvalidAddress for {:?}",
                raw
            );
        }
    }

    #[test]
    fn test_parse_does_not_trim_or_fold() {
        let address = ServiceAddress::parse(" Local:Echo :X").unwrap();
        assert_eq!(address.domain(), " Local");
        assert_eq!(address.interface(), "Echo ");
        assert_eq!(address.instance(), "X");
    }

    #[test]
    fn test_new_validates_segments() {
        assert!(ServiceAddress::new("local", "com.acme.Echo", "main").is_ok());
        assert!(ServiceAddress::new("", "i", "n").is_err());
        assert!(ServiceAddress::new("d", "i:j", "n").is_err());
        assert!(ServiceAddress::new("d", "i", "").is_err());
    }

    #[test]
    fn test_address_serde_as_string() {
        let address = ServiceAddress::parse("local:com.acme.Echo:main").unwrap();
        let yaml = serde_yaml::to_string(&address).unwrap();
        assert_eq!(yaml.trim(), "local:com.acme.Echo:main");

        let back: ServiceAddress = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, address);

        assert!(serde_yaml::from_str::<ServiceAddress>("not-an-address").is_err());
    }

    #[test]
    fn test_binding_name() {
        let name = BindingName::from("dbus");
        assert_eq!(name.as_str(), "dbus");
        assert_eq!(name.to_string(), "dbus");
    }

    #[test]
    fn test_connection_id_default() {
        assert!(ConnectionId::default().is_default());
        assert!(!ConnectionId::from("session").is_default());
    }
}
