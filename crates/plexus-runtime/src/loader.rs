//! Module Loader - opens binding modules exactly once.
//!
//! # Rust Learning Note
//!
//! The native part (dlopen / LoadLibrary) sits behind the small
//! [`ModuleOpener`] trait. The loader itself only owns the bookkeeping:
//! suffix normalization, path resolution and the set of modules already
//! loaded. Tests swap in an opener that registers factories directly and
//! counts invocations, so no real shared objects are needed.
//!
//! ## Locking
//!
//! ```text
//! load(name)
//! ├── lock(loaded) → contains? → unlock     ← check
//! ├── opener.open(path, registrar)          ← no lock held
//! │       └── registrar.register(...)       ← takes the registry lock
//! └── lock(loaded) → insert → unlock        ← record
//! ```
//!
//! Two threads loading the same module at the same moment may both reach
//! the opener; the native loader reference-counts the library and the
//! second entry call loses its registrations as duplicates.

use std::collections::BTreeSet;
use std::env::consts::DLL_SUFFIX;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use plexus_common::{Error, Result};
use tracing::{debug, error, trace};

use crate::plugin::{BindingEntryFn, BindingRegistrar, ENTRY_SYMBOL};

/// Native capability that opens one module and runs its registration.
pub trait ModuleOpener: Send + Sync {
    /// Opens the module at `path` and lets it register its bindings
    /// through `registrar` before returning.
    fn open(&self, path: &Path, registrar: &BindingRegistrar<'_>) -> Result<()>;
}

/// [`ModuleOpener`] backed by the platform dynamic loader.
///
/// Libraries stay mapped for the process lifetime: factories they
/// registered are referenced from the registry forever.
#[derive(Default)]
pub struct DynamicModuleOpener {
    libraries: Mutex<Vec<libloading::Library>>,
}

impl DynamicModuleOpener {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(unix)]
    fn open_library(path: &Path) -> std::result::Result<libloading::Library, libloading::Error> {
        use libloading::os::unix::{Library, RTLD_GLOBAL, RTLD_LAZY};

        // SAFETY: loading a module runs its initializers. Binding modules
        // are trusted code installed next to the application.
        let library = unsafe { Library::open(Some(path), RTLD_LAZY | RTLD_GLOBAL)? };
        Ok(library.into())
    }

    #[cfg(not(unix))]
    fn open_library(path: &Path) -> std::result::Result<libloading::Library, libloading::Error> {
        // SAFETY: see the unix variant.
        unsafe { libloading::Library::new(path) }
    }
}

impl ModuleOpener for DynamicModuleOpener {
    fn open(&self, path: &Path, registrar: &BindingRegistrar<'_>) -> Result<()> {
        let library = Self::open_library(path)
            .map_err(|e| Error::module_load(path.display().to_string(), e.to_string()))?;

        // SAFETY: modules export the entry through `declare_binding!`,
        // which fixes its signature to `BindingEntryFn`.
        match unsafe { library.get::<BindingEntryFn>(ENTRY_SYMBOL) } {
            Ok(entry) => {
                trace!("[Loader] Calling entry point of {}", path.display());
                (*entry)(registrar);
            }
            Err(e) => {
                // The module may still register from a load-time constructor.
                debug!("[Loader] {} exports no entry point: {}", path.display(), e);
            }
        }

        self.libraries.lock().push(library);
        Ok(())
    }
}

/// Loads binding modules idempotently.
pub struct ModuleLoader {
    folder: PathBuf,
    opener: Arc<dyn ModuleOpener>,
    loaded: Mutex<BTreeSet<String>>,
}

impl ModuleLoader {
    /// Creates a loader looking for modules in `folder` first.
    pub fn new(folder: impl Into<PathBuf>, opener: Arc<dyn ModuleOpener>) -> Self {
        Self {
            folder: folder.into(),
            opener,
            loaded: Mutex::new(BTreeSet::new()),
        }
    }

    /// Loader using the platform dynamic loader.
    pub fn dynamic(folder: impl Into<PathBuf>) -> Self {
        Self::new(folder, Arc::new(DynamicModuleOpener::new()))
    }

    /// Appends the platform module suffix unless `name` already ends with it.
    pub fn normalize(name: &str) -> String {
        if name.ends_with(DLL_SUFFIX) {
            name.to_string()
        } else {
            format!("{}{}", name, DLL_SUFFIX)
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Loads `name` once; later calls for the same module succeed without
    /// reopening it.
    ///
    /// Never fails loudly: a module that cannot be opened is logged with
    /// the native diagnostic and reported as `false`. Failures are not
    /// remembered, so a module installed later can still be loaded.
    pub fn load(&self, name: &str, registrar: &BindingRegistrar<'_>) -> bool {
        let module = Self::normalize(name);

        if self.loaded.lock().contains(&module) {
            trace!("[Loader] Module {} already loaded", module);
            return true;
        }

        let path = self.resolve(&module);
        match self.opener.open(&path, registrar) {
            Ok(()) => {
                self.loaded.lock().insert(module.clone());
                debug!("[Loader] ✅ Loading module \"{}\" succeeded ({})", module, path.display());
                true
            }
            Err(e) => {
                error!("[Loader] Loading module \"{}\" failed ({})", module, e);
                false
            }
        }
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.lock().contains(&Self::normalize(name))
    }

    /// Normalized names of all modules loaded so far, sorted.
    pub fn loaded_modules(&self) -> Vec<String> {
        self.loaded.lock().iter().cloned().collect()
    }

    /// `folder/module` when that file exists; otherwise the bare name so
    /// the platform search path applies. Names with a directory part are
    /// used as given.
    fn resolve(&self, module: &str) -> PathBuf {
        let given = Path::new(module);
        if given.components().count() > 1 {
            return given.to_path_buf();
        }

        let candidate = self.folder.join(module);
        if candidate.is_file() {
            candidate
        } else {
            given.to_path_buf()
        }
    }
}
