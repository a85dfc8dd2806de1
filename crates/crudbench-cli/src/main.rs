use anyhow::Result;
use clap::Parser;
use tracing::debug;

use crudbench_cli::{
    cli::{Cli, Commands},
    commands,
};
use crudbench_config::{BenchConfig, Overrides};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(cli.log_filter()))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => {
            let config = BenchConfig::load(cli.config.as_deref(), &args.overrides())?;
            debug!(sizes = ?config.workload.sizes, backend = ?args.backend, "Effective configuration");
            commands::run::execute(config, args.backend).await?;
        }
        Commands::Config => {
            let config = BenchConfig::load(cli.config.as_deref(), &Overrides::default())?;
            commands::config::execute(&config)?;
        }
    }

    Ok(())
}
