use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use verdict::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "verdict=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { model, port, host } => {
            verdict::cli::serve(model.resolve()?, port, host).await?;
        }
        Commands::Predict { model, text } => {
            verdict::cli::predict(model.resolve()?, text).await?;
        }
        Commands::Status { model } => {
            verdict::cli::status(model.resolve()?).await?;
        }
        Commands::Train { data_path } => {
            verdict::cli::train(data_path).await?;
        }
        Commands::Classify { data_path, instances } => {
            verdict::cli::classify(data_path, instances).await?;
        }
    }

    Ok(())
}
