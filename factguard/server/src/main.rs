use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use factguard_pipeline::FactguardConfig;

#[derive(Parser, Debug)]
#[command(name = "factguard", version, about = "Fact-verification HTTP service")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "factguard.toml")]
    config: PathBuf,
    /// Overrides `[server].listen`.
    #[arg(long)]
    listen: Option<String>,
    /// Default tracing filter when `RUST_LOG` is unset.
    #[arg(long, default_value = "info")]
    log_filter: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    factguard_server::init_tracing(&cli.log_filter)?;
    let config = if cli.config.exists() {
        FactguardConfig::load(&cli.config)?
    } else {
        tracing::warn!(config = %cli.config.display(), "config file not found; using defaults");
        FactguardConfig::default()
    };
    factguard_server::run(config, cli.listen).await
}
