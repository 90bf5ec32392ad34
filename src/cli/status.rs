//! Model status command

use anyhow::Result;

use crate::config::VerdictConfig;
use crate::engine::InferenceService;
use crate::loader::ResourcePaths;

/// Report whether the configured model files exist and load
pub async fn status(config: VerdictConfig) -> Result<()> {
    let paths = ResourcePaths::new(&config.model.model_path, &config.model.tokenizer_path);

    println!("Model:     {}", config.model.model_path.display());
    println!("Tokenizer: {}", config.model.tokenizer_path.display());

    let missing = paths.missing();
    if !missing.is_empty() {
        println!("\nStatus: missing");
        for path in missing {
            println!("  not found: {}", path.display());
        }
        return Ok(());
    }

    let service = InferenceService::from_config(&config);
    match service.load().await {
        Ok(()) => {
            let loaded_at = service
                .manager()
                .with_current(|resource| resource.loaded_at())?;
            println!("\nStatus: {}", service.status());
            println!("Loaded at: {}", loaded_at.to_rfc3339());
        }
        Err(e) => {
            println!("\nStatus: invalid");
            println!("  {}", e);
        }
    }
    service.shutdown().await;

    Ok(())
}
