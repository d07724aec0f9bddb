//! Error types for the Plexus runtime.
//!
//! # Rust Learning Note
//!
//! Most runtime operations report "nothing served this address" as `None`
//! or `false`, because in a pluggable system that is an expected outcome.
//! `Error` is reserved for the places where a caller can actually act on a
//! failure: parsing an address, reading a configuration file, opening a
//! module.
//!
//! ```rust
//! use plexus_common::{Error, Result, ServiceAddress};
//!
//! fn parse_all(raw: &[&str]) -> Result<Vec<ServiceAddress>> {
//!     raw.iter().map(|s| s.parse()).collect()
//! }
//!
//! assert!(parse_all(&["local:a.B:one"]).is_ok());
//! assert!(matches!(parse_all(&["local:a.B"]), Err(Error::InvalidAddress { .. })));
//! ```

use thiserror::Error;

/// Result type alias for Plexus operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Plexus operations.
///
/// # Rust Learning Note
///
/// We use the `thiserror` crate to derive `std::error::Error` and
/// `Display`. Each variant carries the context a log line needs.
#[derive(Debug, Error)]
pub enum Error {
    /// A service address did not have the `domain:interface:instance` shape.
    #[error("Invalid service address '{address}': {reason}")]
    InvalidAddress {
        address: String,
        reason: String,
    },

    /// The native loader could not open or resolve a binding module.
    #[error("Failed to load module '{module}': {reason}")]
    ModuleLoad {
        module: String,
        reason: String,
    },

    /// A configuration file exists but could not be used.
    #[error("Configuration error in '{path}': {message}")]
    Config {
        path: String,
        message: String,
    },

    /// A binding name is already taken in the factory registry.
    #[error("Binding already registered: {binding}")]
    DuplicateBinding {
        binding: String,
    },

    /// I/O error (wraps std::io::Error).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context.
    #[error("{message}: {source}")]
    WithContext {
        message: String,
        source: Box<Error>,
    },
}

impl Error {
    /// Creates an InvalidAddress error.
    pub fn invalid_address(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAddress {
            address: address.into(),
            reason: reason.into(),
        }
    }

    /// Creates a ModuleLoad error.
    pub fn module_load(module: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ModuleLoad {
            module: module.into(),
            reason: reason.into(),
        }
    }

    /// Creates a Config error.
    pub fn config(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a DuplicateBinding error.
    pub fn duplicate_binding(binding: impl Into<String>) -> Self {
        Self::DuplicateBinding {
            binding: binding.into(),
        }
    }

    /// Adds context to an error.
    ///
    /// # Example
    /// ```
    /// use plexus_common::{Error, Result};
    ///
    /// fn inner() -> Result<()> {
    ///     Err(Error::module_load("libfoo.so", "not found"))
    /// }
    ///
    /// fn outer() -> Result<()> {
    ///     inner().map_err(|e| e.context("Failed to load binding"))
    /// }
    ///
    /// assert!(outer().unwrap_err().to_string().starts_with("Failed to load binding"));
    /// ```
    pub fn context(self, message: impl Into<String>) -> Self {
        Self::WithContext {
            message: message.into(),
            source: Box::new(self),
        }
    }
}

// Convenience methods for Result types
pub trait ResultExt<T> {
    /// Adds context to an error result.
    fn context(self, message: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(message))
    }
}
