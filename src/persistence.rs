//! Model serialization and persistence
//!
//! A fitted [`LinearLearner`] is stored as pretty-printed JSON together with
//! the feature layout it was trained on, so datasets read with the full set
//! of columns can be restricted to the model's features before prediction.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::{Dataset, Grouper, Learner, RermError, Result};
use crate::learner::{LearnerConfig, LinearLearner};
use crate::loss::LossKind;

/// Serializable representation of a fitted linear model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializableModel {
    /// Feature weights followed by the bias
    pub weights: Vec<f64>,
    /// Original column ids of the weighted features
    pub feature_index: Vec<usize>,
    pub feature_names: Option<Vec<String>>,
    pub loss: LossKind,
    pub grouper: Option<Grouper>,
    pub config: LearnerConfig,
    pub metadata: ModelMetadata,
}

/// Model metadata for tracking and validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Library version used to create the model
    pub library_version: String,
    /// Name of the training dataset
    pub training_set: String,
    pub training_size: usize,
    /// Creation timestamp
    pub created_at: String,
}

impl SerializableModel {
    /// Snapshot a learner fitted on `dataset`
    pub fn from_learner(learner: &LinearLearner, dataset: &Dataset) -> Result<Self> {
        let weights = learner.weight().ok_or(RermError::ModelNotTrained)?.to_vec();
        if weights.len() != dataset.num_features() + 1 {
            return Err(RermError::DimensionMismatch {
                expected: dataset.num_features() + 1,
                actual: weights.len(),
            });
        }
        Ok(Self {
            weights,
            feature_index: dataset.feature_index().to_vec(),
            feature_names: dataset.feature_names().map(<[String]>::to_vec),
            loss: learner.loss().kind(),
            grouper: learner.grouper(),
            config: learner.config().clone(),
            metadata: ModelMetadata {
                library_version: env!("CARGO_PKG_VERSION").to_string(),
                training_set: dataset.name().to_string(),
                training_size: dataset.len(),
                created_at: chrono::Utc::now().to_rfc3339(),
            },
        })
    }

    /// Save model to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Load model from file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let model: Self = serde_json::from_reader(reader)?;
        if model.weights.len() != model.feature_index.len() + 1 {
            return Err(RermError::SerializationError(format!(
                "{} weights stored for {} features",
                model.weights.len(),
                model.feature_index.len()
            )));
        }
        Ok(model)
    }

    pub fn num_features(&self) -> usize {
        self.feature_index.len()
    }

    /// Rebuild the fitted learner
    pub fn to_learner(&self) -> Result<LinearLearner> {
        LinearLearner::from_parts(
            self.config.clone(),
            self.loss,
            self.grouper,
            self.weights.clone(),
        )
    }

    /// Restrict `dataset` to the model's columns unless it already matches them
    pub fn prepare(&self, dataset: &mut Dataset) -> Result<()> {
        if dataset.feature_index() == self.feature_index.as_slice() {
            return Ok(());
        }
        let positions = self
            .feature_index
            .iter()
            .map(|id| {
                dataset
                    .feature_index()
                    .iter()
                    .position(|column| column == id)
                    .ok_or_else(|| {
                        RermError::InvalidParameter(format!(
                            "dataset '{}' has no feature {id}",
                            dataset.name()
                        ))
                    })
            })
            .collect::<Result<Vec<usize>>>()?;
        dataset.keep_features(&positions)
    }

    /// Print model summary
    pub fn print_summary(&self) {
        println!("=== Linear Model Summary ===");
        println!("Features: {}", self.num_features());
        println!("Loss: {}", self.loss);
        println!("Solver: {}", self.config.solver);
        println!("lambda2: {}", self.config.lambda2);
        println!("lambda1: {}", self.config.lambda1);
        if let Some(bias) = self.weights.last() {
            println!("Bias: {bias:.6}");
        }
        println!(
            "Trained on: {} ({} points)",
            self.metadata.training_set, self.metadata.training_size
        );
        println!("Library Version: {}", self.metadata.library_version);
        println!("Created: {}", self.metadata.created_at);

        let n = self.num_features();
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| self.weights[b].abs().total_cmp(&self.weights[a].abs()));
        println!("Largest weights:");
        for &i in order.iter().take(10) {
            let name = self
                .feature_names
                .as_ref()
                .and_then(|names| names.get(i).cloned())
                .unwrap_or_else(|| format!("f{}", self.feature_index[i]));
            println!("  {name}: {:.6}", self.weights[i]);
        }
    }
}
