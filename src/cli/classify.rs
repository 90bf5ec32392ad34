//! Decision-tree classification command

use std::path::PathBuf;

use anyhow::Result;

use crate::training;

/// Fit a tree on `data_path` and print a label for every row of `instances`
pub async fn classify(data_path: PathBuf, instances: Option<PathBuf>) -> Result<()> {
    let instances = instances.unwrap_or_else(|| data_path.clone());
    let task = move || training::classify_with_tree(&data_path, &instances);
    let labels = tokio::task::spawn_blocking(task).await??;

    for (i, label) in labels.iter().enumerate() {
        println!("instance {}: {}", i, label.as_deref().unwrap_or("?"));
    }
    Ok(())
}
