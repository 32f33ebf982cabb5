//! Evaluation query generation.
//!
//! Metrics map onto Hivemall evaluation functions, except `accuracy`,
//! `precision` and `recall` which are computed inline for binary labels.

use std::{fmt, str::FromStr};

use crate::{
    error::{GenError, Result},
    query::{build_query, indent},
};

/// A supported evaluation metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Logloss,
    Auc,
    Mse,
    Rmse,
    Mae,
    R2,
    Fmeasure,
    FmeasureBinary,
    AveragePrecision,
    Hitrate,
    Ndcg,
    PrecisionAt,
    RecallAt,
    Accuracy,
    Precision,
    Recall,
}

impl Metric {
    pub const ALL: [Metric; 16] = [
        Metric::Logloss,
        Metric::Auc,
        Metric::Mse,
        Metric::Rmse,
        Metric::Mae,
        Metric::R2,
        Metric::Fmeasure,
        Metric::FmeasureBinary,
        Metric::AveragePrecision,
        Metric::Hitrate,
        Metric::Ndcg,
        Metric::PrecisionAt,
        Metric::RecallAt,
        Metric::Accuracy,
        Metric::Precision,
        Metric::Recall,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Metric::Logloss => "logloss",
            Metric::Auc => "auc",
            Metric::Mse => "mse",
            Metric::Rmse => "rmse",
            Metric::Mae => "mae",
            Metric::R2 => "r2",
            Metric::Fmeasure => "fmeasure",
            Metric::FmeasureBinary => "fmeasure_binary",
            Metric::AveragePrecision => "average_precision",
            Metric::Hitrate => "hitrate",
            Metric::Ndcg => "ndcg",
            Metric::PrecisionAt => "precision_at",
            Metric::RecallAt => "recall_at",
            Metric::Accuracy => "accuracy",
            Metric::Precision => "precision",
            Metric::Recall => "recall",
        }
    }

    /// Metrics scored from a probability, called as `(target, predicted)`
    fn requires_probability(self) -> bool {
        matches!(self, Metric::Auc | Metric::Logloss)
    }
}

impl FromStr for Metric {
    type Err = GenError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_lowercase();
        Metric::ALL
            .into_iter()
            .find(|m| m.name() == lower)
            .ok_or_else(|| GenError::config(format!("Unknown metric: {}", lower)))
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parse metric names, reporting every unknown one at once.
pub fn parse_metrics<S: AsRef<str>>(metrics: &[S]) -> Result<Vec<Metric>> {
    let mut known = Vec::new();
    let mut unknown = Vec::new();
    for metric in metrics {
        match metric.as_ref().parse::<Metric>() {
            Ok(m) => known.push(m),
            Err(_) => unknown.push(metric.as_ref().to_lowercase()),
        }
    }

    if !unknown.is_empty() {
        return Err(GenError::config(format!("Unknown metric: {}", unknown.join(", "))));
    }
    Ok(known)
}

/// Table and id settings for [`evaluate`].
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluateOptions {
    /// Table holding actual values. Default: "test"
    pub target_table: String,
    /// Table holding predictions. Default: "prediction"
    pub prediction_table: String,
    /// Column joining both tables. Default: "rowid"
    pub id_column: String,
}

impl Default for EvaluateOptions {
    fn default() -> Self {
        EvaluateOptions {
            target_table: "test".to_string(),
            prediction_table: "prediction".to_string(),
            id_column: "rowid".to_string(),
        }
    }
}

/// Column references used when rendering metric expressions
struct Columns<'a> {
    predicted: &'a str,
    target: &'a str,
}

impl Columns<'_> {
    fn clause(&self, metric: Metric) -> String {
        let (predicted, target) = (self.predicted, self.target);
        let true_positive =
            format!("sum(if({predicted} = {target} and {target} = 1, 1, 0))");

        match metric {
            Metric::Fmeasure => format!("fmeasure({target}, {predicted}) as fmeasure"),
            Metric::FmeasureBinary => format!(
                "fmeasure({target}, {predicted}, '-average binary') as fmeasure_binary"
            ),
            Metric::Accuracy => format!("cast({true_positive} as double)/count(1) as accuracy"),
            // precision and recall only make sense for binary labels
            Metric::Precision => format!(
                "cast({true_positive} as double)/sum(if({predicted} = 1, 1, 0)) as precision"
            ),
            Metric::Recall => format!(
                "cast({true_positive} as double)/sum(if({target} = 1, 1, 0)) as recall"
            ),
            other => format!("{other}({predicted}, {target}) as {other}"),
        }
    }
}

/// Build the evaluation query.
///
/// When `auc` is requested, predictions are first ordered by probability in a
/// sub-select and every metric is computed over that ordering.
pub fn evaluate<S: AsRef<str>>(
    metrics: &[S],
    target_column: &str,
    predicted_column: &str,
    options: &EvaluateOptions,
) -> Result<String> {
    let metrics = parse_metrics(metrics)?;
    let id = &options.id_column;

    if metrics.contains(&Metric::Auc) {
        let columns = Columns {
            predicted: predicted_column,
            target: target_column,
        };
        let evaluations: Vec<String> = metrics
            .iter()
            .map(|&metric| {
                if metric.requires_probability() {
                    format!("{metric}({target_column}, {predicted_column}) as {metric}")
                } else {
                    columns.clause(metric)
                }
            })
            .collect();

        let condition = format!(
            "join\n  {} t on (p.{id} = t.{id})\norder by\n  probability desc",
            options.target_table
        );
        let ordered = build_query(
            &[format!("p.{predicted_column}, t.{target_column}")],
            &format!("{} p", options.prediction_table),
            Some(&condition),
            true,
            None,
        )?;

        build_query(
            &evaluations,
            &format!("(\n{}\n) t2", indent(&ordered, "  ")),
            None,
            false,
            None,
        )
    } else {
        let predicted = format!("p.{predicted_column}");
        let target = format!("t.{target_column}");
        let columns = Columns {
            predicted: &predicted,
            target: &target,
        };
        let evaluations: Vec<String> = metrics.iter().map(|&m| columns.clause(m)).collect();

        let condition = format!("join\n  {} t on (p.{id} = t.{id})", options.target_table);
        build_query(
            &evaluations,
            &format!("{} p", options.prediction_table),
            Some(&condition),
            false,
            None,
        )
    }
}
