//! Preprocessing query generators: imputation, normalization, shuffling and
//! splitting, vectorization, downsampling rate and cardinality estimation.

mod cardinality;
mod downsample_rate;
mod impute;
mod normalization;
mod shuffle;
mod vectorization;

pub use cardinality::cardinality;
pub use downsample_rate::downsampling_rate;
pub use impute::{ImputeStrategy, Imputer};
pub use normalization::{NormalizeStrategy, Normalizer};
pub use shuffle::{ShuffleOptions, shuffle, train_test_split};
pub use vectorization::{VectorizeOptions, dense_feature_array, vectorize};

/// `"train"` → `"_train"`; no phase → `""`
fn phase_suffix(phase: Option<&str>) -> String {
    match phase {
        Some(p) if !p.is_empty() => format!("_{}", p),
        _ => String::new(),
    }
}

/// Placeholder for a statistic stored by the stats query
fn last_result(column: &str, statistic: &str, phase: &str) -> String {
    format!("${{td.last_results.{}_{}{}}}", column, statistic, phase)
}

fn join_clauses<S: AsRef<str>>(columns: &[S], clause: impl Fn(&str) -> String) -> String {
    columns
        .iter()
        .map(|c| clause(c.as_ref()))
        .collect::<Vec<_>>()
        .join("\n, ")
}
