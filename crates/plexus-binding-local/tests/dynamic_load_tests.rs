//! Loads this crate's `cdylib` through the platform dynamic loader and
//! drives the binding it registers.

use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::path::PathBuf;
use std::sync::Arc;

use plexus_runtime::{BindingName, Runtime, RuntimeConfig};

struct Echo;

fn module_stem() -> String {
    format!("{}plexus_binding_local", DLL_PREFIX)
}

/// The shared object cargo built next to this test binary, if any.
fn built_module() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let deps = exe.parent()?;
    let file = format!("{}{}", module_stem(), DLL_SUFFIX);

    [deps.parent()?.join(&file), deps.join(&file)]
        .into_iter()
        .find(|candidate| candidate.is_file())
}

#[test]
fn test_dynamic_module_registers_local_binding() {
    let Some(module) = built_module() else {
        eprintln!("{} was not built next to the test binary, skipping", module_stem());
        return;
    };
    let folder = module.parent().unwrap().to_path_buf();
    let runtime = Runtime::new(RuntimeConfig::default().with_default_folder(folder));

    assert!(runtime.registry().is_empty());
    assert!(runtime.load_module(&module_stem()));
    assert!(runtime.loader().is_loaded(&module_stem()));
    assert!(runtime.registry().contains(&BindingName::from("local")));

    // Loading again keeps the one registration.
    assert!(runtime.load_module(&module_stem()));
    assert_eq!(runtime.registry().len(), 1);
}

#[test]
fn test_dynamically_loaded_binding_serves_requests() {
    let Some(module) = built_module() else {
        eprintln!("{} was not built next to the test binary, skipping", module_stem());
        return;
    };
    let folder = module.parent().unwrap().to_path_buf();
    let runtime = Runtime::new(RuntimeConfig::default().with_default_folder(folder));
    assert!(runtime.load_module(&module_stem()));

    assert!(runtime.register_stub("local", "a.Echo", "main", Arc::new(Echo), ""));
    assert!(runtime.is_instance_alive_in("main", "a.Echo", "local"));

    let proxy = runtime.create_proxy("local", "a.Echo", "main", "").unwrap();
    assert_eq!(proxy.address().to_string(), "local:a.Echo:main");
    assert!(proxy.is_available());
    assert_eq!(
        runtime.available_instances("a.Echo", "local"),
        vec!["local:a.Echo:main".to_string()]
    );
}
