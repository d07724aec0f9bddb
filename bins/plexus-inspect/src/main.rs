use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;

use plexus_common::ServiceAddress;
use plexus_runtime::config::ENV_CONFIG;
use plexus_runtime::{ConfigSources, Runtime, RuntimeConfig};

/// Plexus Inspect - shows which module serves a service address
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Service address (domain:interface:instance), repeatable
    #[arg(short, long = "address", value_name = "ADDRESS", required = true)]
    addresses: Vec<String>,

    /// Configuration file path (YAML), instead of the usual lookup
    /// (a plexus.yaml in the working directory is then ignored)
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Derive the stub module name instead of the proxy one
    #[arg(long)]
    stub: bool,

    /// Try to load the derived modules
    #[arg(long)]
    load: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    initialize_logging(args.debug)?;

    let mut sources = ConfigSources::from_process();
    if let Some(path) = &args.config {
        sources = sources.with_env(ENV_CONFIG, path.as_str()).without_working_dir();
    }
    let config = RuntimeConfig::resolve(&sources);
    println!("config:  {}", config.config_path.display());
    println!("binding: {}", config.default_binding);
    println!("folder:  {}", config.default_folder.display());

    let runtime = Runtime::new(config);
    plexus_binding_local::register(&runtime).context("Failed to register the local binding")?;

    let mut failures = 0usize;
    for raw in &args.addresses {
        if let Err(e) = inspect(&runtime, raw, &args) {
            error!("{:#}", e);
            failures += 1;
        }
    }

    let bindings: Vec<String> = runtime
        .registry()
        .names()
        .iter()
        .map(ToString::to_string)
        .collect();
    println!("bindings: {}", bindings.join(", "));

    if failures > 0 {
        anyhow::bail!("{} of {} address(es) failed", failures, args.addresses.len());
    }
    Ok(())
}

fn inspect(runtime: &Runtime, raw: &str, args: &Args) -> Result<()> {
    let address = ServiceAddress::parse(raw)
        .with_context(|| format!("Cannot inspect '{}'", raw))?;
    let module = runtime.module_name(&address, !args.stub);

    println!("{}", address);
    println!("  domain:    {}", address.domain());
    println!("  interface: {}", address.interface());
    println!("  instance:  {}", address.instance());
    println!("  {} module: {}", if args.stub { "stub" } else { "proxy" }, module);

    if args.load {
        if !runtime.load_module(&module) {
            anyhow::bail!("Module {} for {} could not be loaded", module, address);
        }
        println!("  loaded:    yes");
    }

    println!("  alive:     {}", runtime.is_instance_alive(&address));
    Ok(())
}

fn initialize_logging(debug: bool) -> Result<()> {
    let level = if debug { "debug" } else { "warn" };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level))
        )
        .with_target(false)
        .with_thread_ids(true)
        .init();

    Ok(())
}
