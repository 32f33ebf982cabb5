//! Training and prediction query generators.
//!
//! Algorithms are looked up by the names used in the pipeline definition
//! (`train_classifier`, `predict_randomforest_regressor`, ...) through the
//! static [`ALGORITHMS`] registry.

mod base;
mod linear;
mod tree;

pub use linear::{predict_classifier, predict_regressor, train_classifier, train_regressor};
pub use tree::{
    ensure_attrs, extract_attrs, predict_randomforest_classifier, predict_randomforest_regressor,
    train_randomforest_classifier, train_randomforest_regressor,
};

use serde::Deserialize;

use crate::{
    error::{GenError, Result},
    value::Value,
};

/// Options shared by every training query generator.
///
/// Fields a given algorithm does not use are ignored by it: `sparse`,
/// the column lists and `feature_cardinality` only matter for tree ensembles,
/// `bias` only for linear models.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrainOptions {
    /// Source table. Default: "${source}"
    pub source_table: String,
    /// Target column. Default: "target"
    pub target: String,
    /// Option string passed to the training function
    pub option: Option<String>,
    pub bias: bool,
    pub hashing: bool,
    /// Amplification of the positive class. Exclusive with `oversample_n_times`.
    pub oversample_pos_n_times: Option<Value>,
    /// Amplification of the whole training set. Exclusive with `oversample_pos_n_times`.
    pub oversample_n_times: Option<Value>,
    /// Train tree ensembles on a sparse `features` column instead of a dense array
    pub sparse: bool,
    pub categorical_columns: Option<Vec<String>>,
    pub numerical_columns: Option<Vec<String>>,
    pub feature_cardinality: Option<Value>,
}

impl Default for TrainOptions {
    fn default() -> Self {
        TrainOptions {
            source_table: "${source}".to_string(),
            target: "target".to_string(),
            option: None,
            bias: false,
            hashing: false,
            oversample_pos_n_times: None,
            oversample_n_times: None,
            sparse: false,
            categorical_columns: None,
            numerical_columns: None,
            feature_cardinality: None,
        }
    }
}

impl TrainOptions {
    pub fn new(source_table: impl Into<String>, target: impl Into<String>) -> Self {
        TrainOptions {
            source_table: source_table.into(),
            target: target.into(),
            ..Default::default()
        }
    }
}

/// Options shared by every prediction query generator.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PredictOptions {
    /// Table to predict. Default: "${target_table}"
    pub target_table: String,
    /// Default: "rowid"
    pub id_column: String,
    /// Default: "${model_table}"
    pub model_table: String,
    /// Apply sigmoid to linear classifier scores. Default: true
    pub sigmoid: bool,
    /// Output column of linear regressors. Default: "target"
    pub predicted_column: Option<String>,
    pub bias: bool,
    pub hashing: bool,
    /// Set when the model was trained with positive-class oversampling
    pub oversample_pos_n_times: Option<Value>,
    /// Raw columns for dense tree ensemble prediction
    pub categorical_columns: Option<Vec<String>>,
    pub numerical_columns: Option<Vec<String>>,
    pub feature_cardinality: Option<Value>,
}

impl Default for PredictOptions {
    fn default() -> Self {
        PredictOptions {
            target_table: "${target_table}".to_string(),
            id_column: "rowid".to_string(),
            model_table: "${model_table}".to_string(),
            sigmoid: true,
            predicted_column: None,
            bias: false,
            hashing: false,
            oversample_pos_n_times: None,
            categorical_columns: None,
            numerical_columns: None,
            feature_cardinality: None,
        }
    }
}

impl PredictOptions {
    pub fn new(
        target_table: impl Into<String>,
        id_column: impl Into<String>,
        model_table: impl Into<String>,
    ) -> Self {
        PredictOptions {
            target_table: target_table.into(),
            id_column: id_column.into(),
            model_table: model_table.into(),
            ..Default::default()
        }
    }
}

/// A prediction query and the column holding its predicted values.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub query: String,
    pub predicted_column: String,
}

pub type TrainFn = fn(&TrainOptions) -> Result<String>;
pub type PredictFn = fn(&PredictOptions) -> Result<Prediction>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Linear,
    TreeEnsemble,
}

/// A registered algorithm with its training and prediction generators.
#[derive(Debug)]
pub struct Algorithm {
    pub name: &'static str,
    pub family: Family,
    pub train: TrainFn,
    pub predict: PredictFn,
}

impl Algorithm {
    pub fn train_name(&self) -> String {
        format!("train_{}", self.name)
    }

    pub fn predict_name(&self) -> String {
        format!("predict_{}", self.name)
    }
}

pub static ALGORITHMS: [Algorithm; 4] = [
    Algorithm {
        name: "classifier",
        family: Family::Linear,
        train: train_classifier,
        predict: predict_classifier,
    },
    Algorithm {
        name: "regressor",
        family: Family::Linear,
        train: train_regressor,
        predict: predict_regressor,
    },
    Algorithm {
        name: "randomforest_classifier",
        family: Family::TreeEnsemble,
        train: train_randomforest_classifier,
        predict: predict_randomforest_classifier,
    },
    Algorithm {
        name: "randomforest_regressor",
        family: Family::TreeEnsemble,
        train: train_randomforest_regressor,
        predict: predict_randomforest_regressor,
    },
];

fn lookup(prefix: &str, name: &str) -> Result<&'static Algorithm> {
    name.strip_prefix(prefix)
        .and_then(|id| ALGORITHMS.iter().find(|a| a.name == id))
        .ok_or_else(|| {
            let known: Vec<String> =
                ALGORITHMS.iter().map(|a| format!("{}{}", prefix, a.name)).collect();
            GenError::config(format!(
                "Unknown algorithm: '{}'. Available: {}",
                name,
                known.join(", ")
            ))
        })
}

/// Resolve a training function name such as `train_classifier`.
pub fn trainer(name: &str) -> Result<&'static Algorithm> {
    lookup("train_", name)
}

/// Resolve a prediction function name such as `predict_classifier`.
pub fn predictor(name: &str) -> Result<&'static Algorithm> {
    lookup("predict_", name)
}
