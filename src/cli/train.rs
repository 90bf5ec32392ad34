//! Decision-tree training command

use std::path::PathBuf;

use anyhow::Result;

use crate::training;

/// Fit a tree on `data_path` and print its description
pub async fn train(data_path: PathBuf) -> Result<()> {
    let description =
        tokio::task::spawn_blocking(move || training::train_tree(&data_path)).await??;
    println!("{}", description);
    Ok(())
}
