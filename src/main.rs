//! Flowcast - Main Entry Point
//!
//! River discharge forecasting from a single daily series.

use clap::Parser;
use flowcast::cli::{cmd_info, cmd_predict, cmd_train, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flowcast=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train(args) => {
            cmd_train(&args)?;
        }
        Commands::Predict { model, data, site, output } => {
            cmd_predict(&model, &data, &site, output.as_deref())?;
        }
        Commands::Info { data, site } => {
            cmd_info(&data, &site)?;
        }
    }

    Ok(())
}
