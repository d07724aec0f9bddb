//! Configuration Types for the Runtime
//!
//! Settings are layered once at startup, lowest priority first:
//!
//! ```text
//! built-in defaults  <  configuration file  <  environment
//! ```
//!
//! The result is one immutable [`RuntimeConfig`]; nothing changes it later.
//!
//! ## Configuration file
//!
//! YAML, looked up as `./plexus.yaml`, else `$PLEXUS_CONFIG`, else
//! `/etc/plexus.yaml`:
//!
//! ```yaml
//! default:
//!   binding: dbus
//!   folder: /opt/acme/lib/plexus
//! proxy:
//!   "local:com.acme.Echo:main": libecho_dbus_proxy
//! stub:
//!   "local:com.acme.Echo:main": libecho_dbus_stub
//! ```
//!
//! A missing file or section is not an error. An unreadable or malformed
//! file is logged and the defaults stay in force. Empty values, in the
//! file or the environment, never override anything.
//!
//! ## Environment
//!
//! `PLEXUS_DEFAULT_BINDING` and `PLEXUS_DEFAULT_FOLDER` override whatever
//! the file set, so deployments can adjust packaged configuration without
//! editing it. Empty values are ignored.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use plexus_common::{BindingName, Error, Result, ResultExt, ServiceAddress};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::module_name::LibraryOverrides;

pub const DEFAULT_BINDING: &str = "local";
pub const DEFAULT_FOLDER: &str = "/usr/local/lib/plexus";
pub const DEFAULT_CONFIG_FILE: &str = "plexus.yaml";
pub const DEFAULT_CONFIG_FOLDER: &str = "/etc";

pub const ENV_CONFIG: &str = "PLEXUS_CONFIG";
pub const ENV_DEFAULT_BINDING: &str = "PLEXUS_DEFAULT_BINDING";
pub const ENV_DEFAULT_FOLDER: &str = "PLEXUS_DEFAULT_FOLDER";

/// On-disk configuration file layout.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub default: DefaultSection,

    /// Serialized address → module name, for proxies. Null or empty
    /// module names are ignored.
    #[serde(default)]
    pub proxy: BTreeMap<String, Option<String>>,

    /// Serialized address → module name, for stubs.
    #[serde(default)]
    pub stub: BTreeMap<String, Option<String>>,
}

/// The `default` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DefaultSection {
    #[serde(default)]
    pub binding: Option<String>,

    #[serde(default)]
    pub folder: Option<String>,
}

impl ConfigFile {
    /// Loads the file at `path`; `Ok(None)` when it does not exist.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .map_err(Error::from)
            .context(format!("Failed to read {}", path.display()))?;

        Self::load_from_string(&content)
            .map(Some)
            .map_err(|e| Error::config(path.display().to_string(), e.to_string()))
    }

    /// Parses YAML content. Empty content is an empty configuration.
    pub fn load_from_string(content: &str) -> std::result::Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }
}

/// Where configuration comes from: environment variables and the working
/// directory.
///
/// Injected so that resolution can be exercised without touching the
/// process environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    env: HashMap<String, String>,
    working_dir: Option<PathBuf>,
}

impl ConfigSources {
    /// No environment, no working directory.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Sources of the running process.
    pub fn from_process() -> Self {
        let env = std::env::vars()
            .filter(|(key, _)| key.starts_with("PLEXUS_"))
            .collect();

        Self {
            env,
            working_dir: std::env::current_dir().ok(),
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Skips the working-directory lookup, so `PLEXUS_CONFIG` decides.
    pub fn without_working_dir(mut self) -> Self {
        self.working_dir = None;
        self
    }

    /// Non-empty value of `key`.
    fn var(&self, key: &str) -> Option<&str> {
        self.env
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}

/// Resolved runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Binding dispatched first.
    pub default_binding: BindingName,

    /// Folder searched for binding modules before the platform search path.
    pub default_folder: PathBuf,

    /// Configuration file consulted (it may not exist).
    pub config_path: PathBuf,

    /// Module name overrides from the configuration file.
    pub overrides: LibraryOverrides,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_binding: BindingName::from(DEFAULT_BINDING),
            default_folder: PathBuf::from(DEFAULT_FOLDER),
            config_path: Path::new(DEFAULT_CONFIG_FOLDER).join(DEFAULT_CONFIG_FILE),
            overrides: LibraryOverrides::new(),
        }
    }
}

impl RuntimeConfig {
    /// Resolves configuration from the running process.
    pub fn from_env() -> Self {
        Self::resolve(&ConfigSources::from_process())
    }

    /// Layers defaults, configuration file and environment.
    pub fn resolve(sources: &ConfigSources) -> Self {
        let mut config = Self {
            config_path: Self::config_path_for(sources),
            ..Self::default()
        };

        match ConfigFile::load_from_file(&config.config_path) {
            Ok(Some(file)) => config.apply_file(file),
            Ok(None) => {
                debug!("[Config] No configuration file at {}", config.config_path.display());
            }
            Err(e) => warn!("[Config] Ignoring configuration file: {}", e),
        }

        if let Some(binding) = sources.var(ENV_DEFAULT_BINDING) {
            config.default_binding = BindingName::from(binding);
        }
        if let Some(folder) = sources.var(ENV_DEFAULT_FOLDER) {
            config.default_folder = PathBuf::from(folder);
        }

        config
    }

    /// `plexus.yaml` in the working directory when present, else
    /// `$PLEXUS_CONFIG`, else `/etc/plexus.yaml`.
    pub fn config_path_for(sources: &ConfigSources) -> PathBuf {
        if let Some(dir) = &sources.working_dir {
            let local = dir.join(DEFAULT_CONFIG_FILE);
            if local.is_file() {
                return local;
            }
        }

        match sources.var(ENV_CONFIG) {
            Some(path) => PathBuf::from(path),
            None => Path::new(DEFAULT_CONFIG_FOLDER).join(DEFAULT_CONFIG_FILE),
        }
    }

    pub fn with_default_binding(mut self, binding: impl Into<BindingName>) -> Self {
        self.default_binding = binding.into();
        self
    }

    pub fn with_default_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.default_folder = folder.into();
        self
    }

    pub fn with_override(mut self, address: impl Into<String>, is_proxy: bool, module: impl Into<String>) -> Self {
        self.overrides.insert(address, is_proxy, module);
        self
    }

    /// Logs the settings in force.
    pub fn log_settings(&self) {
        info!("Using default binding '{}'", self.default_binding);
        info!("Using default shared library folder '{}'", self.default_folder.display());
        info!("Using default configuration file '{}'", self.config_path.display());
        if !self.overrides.is_empty() {
            info!("Using {} module override(s)", self.overrides.len());
        }
    }

    fn apply_file(&mut self, file: ConfigFile) {
        if let Some(binding) = file.default.binding.filter(|b| !b.is_empty()) {
            self.default_binding = BindingName::from(binding);
        }
        if let Some(folder) = file.default.folder.filter(|f| !f.is_empty()) {
            self.default_folder = PathBuf::from(folder);
        }

        for (is_proxy, section) in [(true, file.proxy), (false, file.stub)] {
            for (address, module) in section {
                let Some(module) = module.filter(|m| !m.is_empty()) else {
                    debug!("[Config] Skipping empty module for {}", address);
                    continue;
                };
                if ServiceAddress::parse(&address).is_err() {
                    warn!("[Config] Override key '{}' is not a service address", address);
                }
                debug!(
                    "[Config] Adding {} mapping: {} --> {}",
                    if is_proxy { "proxy" } else { "stub" },
                    address,
                    module
                );
                self.overrides.insert(address, is_proxy, module);
            }
        }
    }
}
