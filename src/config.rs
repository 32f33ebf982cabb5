//! Pipeline definition read from YAML.
//!
//! ```yaml
//! source: titanic
//! dbname: ml_datasets
//! id_column: rowid
//! target_column: survived
//! train_sample_rate: 0.8
//! stratify: true
//! numerical_columns:
//!   - columns: [age, fare]
//!     transformer:
//!       imputer: {strategy: median, phase: train}
//!       normalizer: {strategy: standardize, phase: train}
//! categorical_columns:
//!   - columns: [embarked, sex]
//!     transformer:
//!       imputer: {strategy: constant, fill_value: missing}
//! vectorizer:
//!   hashing: true
//! trainer:
//!   - name: train_classifier
//!     option: -loss logloss -opt AdaGrad
//! predictor:
//!   - name: predict_classifier
//! evaluator:
//!   metrics: [auc, logloss]
//! ```

use std::{fs, path::Path};

use serde::Deserialize;

use crate::{
    error::Result,
    model::{PredictOptions, TrainOptions},
    preprocessing::VectorizeOptions,
    value::Value,
};

fn default_query_dir() -> String {
    "queries".to_string()
}

/// Top-level pipeline definition.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PipelineConfig {
    /// Source table name
    pub source: String,
    /// Database the workflow runs against
    pub dbname: String,
    pub id_column: String,
    pub target_column: String,
    /// Ratio of rows kept for training, exported to the workflow as-is
    pub train_sample_rate: Value,
    #[serde(default)]
    pub stratify: bool,
    /// Amplify positive rows when training. Exclusive with `oversample_n_times`.
    #[serde(default)]
    pub oversample_pos_n_times: Option<Value>,
    /// Amplify every training row
    #[serde(default)]
    pub oversample_n_times: Option<Value>,
    #[serde(default)]
    pub numerical_columns: Vec<ColumnGroup>,
    #[serde(default)]
    pub categorical_columns: Vec<ColumnGroup>,
    #[serde(default)]
    pub vectorizer: VectorizerConfig,
    #[serde(default)]
    pub trainer: Vec<TrainerConfig>,
    #[serde(default)]
    pub predictor: Vec<PredictorConfig>,
    pub evaluator: EvaluatorConfig,
    #[serde(default = "default_query_dir")]
    pub query_dir: String,
}

impl PipelineConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let yaml = fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }
}

/// Columns sharing one role and one transformer configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ColumnGroup {
    pub columns: Vec<String>,
    #[serde(default)]
    pub transformer: Option<TransformerConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TransformerConfig {
    #[serde(default)]
    pub imputer: Option<ImputerConfig>,
    #[serde(default)]
    pub normalizer: Option<NormalizerConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImputerConfig {
    pub strategy: String,
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub fill_value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NormalizerConfig {
    pub strategy: String,
    #[serde(default)]
    pub phase: Option<String>,
}

fn default_train_table() -> String {
    "train".to_string()
}

fn default_test_table() -> String {
    "test".to_string()
}

fn default_whole_table() -> String {
    "whole".to_string()
}

/// Vectorization options plus the tables the vectorized splits land in.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VectorizerConfig {
    #[serde(default = "default_train_table")]
    pub train_table: String,
    #[serde(default = "default_test_table")]
    pub test_table: String,
    #[serde(default = "default_whole_table")]
    pub whole_table: String,
    #[serde(flatten)]
    pub options: VectorizeOptions,
}

impl Default for VectorizerConfig {
    fn default() -> Self {
        VectorizerConfig {
            train_table: default_train_table(),
            test_table: default_test_table(),
            whole_table: default_whole_table(),
            options: VectorizeOptions::default(),
        }
    }
}

/// One entry of the `trainer` list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrainerConfig {
    /// Training function, e.g. `train_classifier`
    pub name: String,
    #[serde(default)]
    pub model_table: Option<String>,
    /// Sparse tree ensembles: append `-attrs` derived from the column groups
    #[serde(default)]
    pub guess_attrs: bool,
    #[serde(flatten)]
    pub options: TrainOptions,
}

/// One entry of the `predictor` list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PredictorConfig {
    /// Prediction function, e.g. `predict_classifier`
    pub name: String,
    /// Table the predictions are written to
    #[serde(default)]
    pub output_table: Option<String>,
    /// Table to predict. Default: the vectorized test table
    #[serde(default)]
    pub target_table: Option<String>,
    #[serde(default)]
    pub model_table: Option<String>,
    /// Tree ensembles only: the model was trained on the `features` column
    #[serde(default)]
    pub sparse: bool,
    #[serde(flatten)]
    pub options: PredictOptions,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EvaluatorConfig {
    pub metrics: Metrics,
}

/// A single metric name or a list of them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Metrics {
    One(String),
    Many(Vec<String>),
}

impl Metrics {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Metrics::One(metric) => vec![metric.clone()],
            Metrics::Many(metrics) => metrics.clone(),
        }
    }
}
