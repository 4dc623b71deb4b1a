//! foreman-inventory CLI
//!
//! Ansible dynamic inventory script backed by Foreman. Prints JSON on stdout;
//! logs go to stderr (`RUST_LOG`, default `warn`).

use std::path::{Path, PathBuf};

use clap::Parser;
use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use tracing_subscriber::EnvFilter;

use foreman_inventory::{CacheStore, Config, ForemanClient, InventoryBuilder, Query, to_pretty_json};

/// Fallback cache file stem when the executable name is unavailable
const DEFAULT_PROGRAM: &str = "foreman-inventory";

#[derive(Debug, Parser)]
#[command(name = "foreman-inventory")]
#[command(about = "Produce an Ansible inventory from Foreman", long_about = None)]
struct Cli {
    /// List all hosts and groups (default)
    #[arg(long, default_value_t = true)]
    list: bool,

    /// Print all variables about a specific host
    #[arg(long, value_name = "NAME")]
    host: Option<String>,

    /// Ignore the cache and query Foreman
    #[arg(long)]
    refresh_cache: bool,

    /// Configuration file (overrides the default search path)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

impl Cli {
    fn query(&self) -> Query {
        match &self.host {
            Some(name) => Query::Host(name.clone()),
            None => Query::List,
        }
    }
}

/// File stem of the running executable, used to name the cache files
fn program_name() -> String {
    std::env::current_exe()
        .ok()
        .as_deref()
        .and_then(Path::file_stem)
        .and_then(|s| s.to_str())
        .map_or_else(|| DEFAULT_PROGRAM.to_string(), str::to_string)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let settings = Config::load_default(cli.config.as_deref())
        .and_then(Config::into_settings)
        .wrap_err("failed to load configuration")?;
    tracing::debug!(?settings, "configuration loaded");

    let client = ForemanClient::new(&settings).wrap_err("failed to create Foreman client")?;
    let store = CacheStore::new(&settings.cache_path, &program_name());
    let builder = InventoryBuilder::new(settings, client, store);

    let output = builder
        .run(&cli.query(), cli.refresh_cache)
        .await
        .wrap_err("failed to build inventory")?;

    println!("{}", to_pretty_json(&output)?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_list() {
        let cli = Cli::try_parse_from(["foreman-inventory"]).unwrap();
        assert!(cli.list);
        assert!(!cli.refresh_cache);
        assert_eq!(cli.query(), Query::List);
    }

    #[test]
    fn test_host_mode() {
        let cli = Cli::try_parse_from(["foreman-inventory", "--host", "web01"]).unwrap();
        assert_eq!(cli.query(), Query::Host("web01".to_string()));
    }

    #[test]
    fn test_refresh_and_config() {
        let cli = Cli::try_parse_from([
            "foreman-inventory",
            "--list",
            "--refresh-cache",
            "--config",
            "/etc/ansible/foreman.toml",
        ])
        .unwrap();
        assert!(cli.refresh_cache);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/ansible/foreman.toml")));
    }

    #[test]
    fn test_host_requires_value() {
        assert!(Cli::try_parse_from(["foreman-inventory", "--host"]).is_err());
    }

    #[test]
    fn test_program_name() {
        assert!(!program_name().is_empty());
    }
}
