//! Offline decision-tree training
//!
//! Backs the `/v1/train` endpoints and the `verdict train` / `verdict classify`
//! commands. Training reads an ARFF or CSV dataset, fits a tree and returns
//! its text rendering or the labels it assigns to a second set of instances.
//! It never touches the served model.

mod dataset;
mod tree;

pub use dataset::{Attribute, AttributeKind, Dataset, Value};
pub use tree::{DecisionTree, TreeModel};

#[cfg(test)]
pub(crate) use dataset::{SCORES_CSV, WEATHER_ARFF};

use std::path::Path;

use anyhow::{Context, Result};

/// A learning algorithm
pub trait Classifier {
    type Model: TrainedModel;

    fn fit(&self, data: &Dataset) -> Result<Self::Model>;
}

/// Result of fitting a classifier
pub trait TrainedModel {
    /// Human-readable rendering of the model
    fn describe(&self) -> String;

    /// Predicted class label for one row, laid out like the training data
    fn classify(&self, row: &[Value]) -> Option<String>;
}

/// Fit a decision tree on the dataset at `path` and describe it
pub fn train_tree<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    let data = Dataset::from_path(path)?;
    tracing::info!(
        "Training decision tree on {} ({} instances, {} attributes)",
        path.display(),
        data.rows.len(),
        data.attributes.len()
    );
    let model = DecisionTree::default().fit(&data)?;
    Ok(model.describe())
}

/// Fit a decision tree on `train_path` and label every row of `instances_path`.
///
/// The instances file must declare the same attributes in the same order;
/// its class column may be missing (`?`). Rows the tree cannot place get
/// `None`.
pub fn classify_with_tree<P, Q>(train_path: P, instances_path: Q) -> Result<Vec<Option<String>>>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let train_path = train_path.as_ref();
    let instances_path = instances_path.as_ref();

    let data = Dataset::from_path(train_path)?;
    let model = DecisionTree::default().fit(&data)?;

    let instances = Dataset::from_path(instances_path)?;
    let rows = instances
        .rows_for(model.attributes())
        .with_context(|| format!("{} does not match the training data", instances_path.display()))?;

    tracing::info!(
        "Classifying {} instances from {} with a tree fitted on {}",
        rows.len(),
        instances_path.display(),
        train_path.display()
    );
    Ok(rows.iter().map(|row| model.classify(row)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_train_tree_from_arff_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weather.arff");
        std::fs::write(&path, WEATHER_ARFF).unwrap();

        let tree = train_tree(&path).unwrap();
        assert!(tree.contains("outlook = overcast: yes (4.0)"));
        assert!(tree.contains("Size of the tree"));
    }

    #[test]
    fn test_train_tree_from_csv_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scores.csv");
        std::fs::write(&path, SCORES_CSV).unwrap();

        let tree = train_tree(&path).unwrap();
        assert!(tree.contains("score <= 3: fail (3.0)"));
    }

    #[test]
    fn test_classify_with_tree() {
        let dir = tempfile::tempdir().unwrap();
        let train = dir.path().join("scores.csv");
        std::fs::write(&train, SCORES_CSV).unwrap();
        let instances = dir.path().join("new.csv");
        std::fs::write(&instances, "score,grade\n2.5,?\n9.5,?\n?,?\n").unwrap();

        let labels = classify_with_tree(&train, &instances).unwrap();
        assert_eq!(
            labels,
            vec![
                Some("fail".to_string()),
                Some("pass".to_string()),
                Some("fail".to_string())
            ]
        );
    }

    #[test]
    fn test_classify_with_tree_rejects_other_layout() {
        let dir = tempfile::tempdir().unwrap();
        let train = dir.path().join("scores.csv");
        std::fs::write(&train, SCORES_CSV).unwrap();
        let instances = dir.path().join("other.csv");
        std::fs::write(&instances, "height,grade\n2,fail\n").unwrap();

        assert!(classify_with_tree(&train, &instances).is_err());
    }

    #[test]
    fn test_train_tree_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(train_tree(dir.path().join("absent.arff")).is_err());
    }
}
