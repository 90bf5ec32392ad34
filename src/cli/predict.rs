//! One-shot prediction command

use anyhow::Result;

use crate::config::VerdictConfig;
use crate::engine::InferenceService;

/// Load the model, classify `text` and print the probabilities as JSON
pub async fn predict(config: VerdictConfig, text: String) -> Result<()> {
    let service = InferenceService::from_config(&config);
    service.load().await?;

    let result = service.predict(text).await;
    service.shutdown().await;

    println!("{}", serde_json::to_string_pretty(&result?)?);
    Ok(())
}
