//! VinoVeritas - Main Entry Point

use clap::Parser;
use vinoveritas::cli::{cmd_eda, cmd_info, cmd_predict, cmd_serve, cmd_train, Cli, Commands, TrainArgs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vinoveritas=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Train { config, data, separator, estimator, n_iter, cv, test_size, seed, jobs, output }) => {
            cmd_train(TrainArgs { config, data, separator, estimator, n_iter, cv, test_size, seed, jobs, output }).await?;
        }
        Some(Commands::Predict { artifacts, features }) => {
            cmd_predict(&artifacts, &features).await?;
        }
        Some(Commands::Eda { data, separator, output }) => {
            cmd_eda(data.as_deref(), separator, &output).await?;
        }
        Some(Commands::Serve { port, host, artifacts }) => {
            cmd_serve(&host, port, &artifacts).await?;
        }
        Some(Commands::Info { artifacts }) => {
            cmd_info(&artifacts)?;
        }
        None => {
            // Default: train with the default configuration
            cmd_train(TrainArgs { separator: ';', ..Default::default() }).await?;
        }
    }

    Ok(())
}
