//! Client inspector.
//!
//! Loads a manifest of client declarations and properties, builds every
//! client and prints what was built as JSON.
//!
//! ```text
//! declarative-client --manifest clients.toml contracts
//! declarative-client --manifest clients.toml config users
//! declarative-client --manifest clients.toml call users get 42
//! declarative-client --manifest clients.toml watch
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use declarative_client::config::loader::load_manifest;
use declarative_client::config::watcher::ManifestWatcher;
use declarative_client::observability::logging::init_logging;
use declarative_client::registrar::bootstrap;

#[derive(Parser)]
#[command(name = "declarative-client")]
#[command(about = "Inspect and call declarative HTTP clients", long_about = None)]
struct Cli {
    /// Manifest with client declarations and properties
    #[arg(short, long, default_value = "clients.toml")]
    manifest: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the compiled request templates of every client
    Contracts,
    /// Print the effective configuration and target of one client
    Config {
        /// Context id or qualifier
        client: String,
    },
    /// Invoke one method and print the decoded result
    Call {
        client: String,
        /// Method name or config key
        method: String,
        /// Arguments as JSON; bare words are taken as strings
        args: Vec<String>,
    },
    /// Watch the manifest and refresh request options on change
    Watch,
}

fn parse_arg(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging("declarative_client=info");
    let cli = Cli::parse();

    let manifest = load_manifest(&cli.manifest)?;
    let boot = bootstrap(&manifest)?;

    match cli.command {
        Commands::Contracts => {
            let mut contracts = BTreeMap::new();
            for descriptor in boot.registry.descriptors() {
                let compiled = boot.registry.compiled(&descriptor.context_id)?;
                let mut templates = BTreeMap::new();
                for (key, template) in compiled.client.contract().templates() {
                    templates.insert(key.clone(), serde_json::to_value(template.as_ref())?);
                }
                contracts.insert(descriptor.context_id.clone(), templates);
            }
            println!("{}", serde_json::to_string_pretty(&contracts)?);
        }
        Commands::Config { client } => {
            let compiled = boot.registry.compiled(&client)?;
            let output = json!({
                "descriptor": compiled.descriptor.as_ref(),
                "target": compiled.target,
                "load_balanced": compiled.client.transport().is_load_balanced(),
                "config": compiled.client.config().summary(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Call { client, method, args } => {
            let client = boot.registry.client(&client)?;
            let args: Vec<Value> = args.iter().map(|a| parse_arg(a)).collect();
            let result = client.invoke(&method, &args).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Watch => {
            let (watcher, mut updates) = ManifestWatcher::new(&cli.manifest, boot.refresh.clone());
            let _watcher = watcher.run()?;
            tracing::info!(path = ?cli.manifest, cells = boot.refresh.names().len(), "Watching manifest");
            loop {
                tokio::select! {
                    Some(properties) = updates.recv() => {
                        tracing::info!(
                            refresh_enabled = properties.refresh_enabled,
                            buckets = properties.config.len(),
                            "Client properties reloaded"
                        );
                    }
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("Stopping watcher");
                        break;
                    }
                }
            }
        }
    }
    Ok(())
}
