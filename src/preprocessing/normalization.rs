use std::str::FromStr;

use crate::error::{GenError, Result};

use super::{join_clauses, last_result, phase_suffix};

/// Scaling applied to numerical columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizeStrategy {
    Log1p,
    MinMax,
    Standardize,
}

impl FromStr for NormalizeStrategy {
    type Err = GenError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "log1p" => Ok(Self::Log1p),
            "minmax" => Ok(Self::MinMax),
            "standardize" => Ok(Self::Standardize),
            other => Err(GenError::config(format!("Unknown strategy: {}", other))),
        }
    }
}

/// Normalizes or scales numerical values, and reverts the scaling.
///
/// `minmax` and `standardize` read their statistics from the results of the
/// stats query through `${td.last_results.*}` placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalizer {
    strategy: NormalizeStrategy,
    phase: String,
}

impl Normalizer {
    pub fn new(strategy: &str, phase: Option<&str>) -> Result<Self> {
        Ok(Normalizer {
            strategy: strategy.parse()?,
            phase: phase_suffix(phase),
        })
    }

    pub fn strategy(&self) -> NormalizeStrategy {
        self.strategy
    }

    pub fn render<S: AsRef<str>>(&self, columns: &[S]) -> String {
        join_clauses(columns, |column| match self.strategy {
            NormalizeStrategy::Log1p => format!("ln({column} + 1) as {column}"),
            NormalizeStrategy::MinMax => format!(
                "rescale(\n  {column}\n  , {min}\n  , {max}\n) as {column}",
                min = last_result(column, "min", &self.phase),
                max = last_result(column, "max", &self.phase),
            ),
            NormalizeStrategy::Standardize => format!(
                "zscore(\n  {column}\n  , {mean}\n  , {std}\n) as {column}",
                mean = last_result(column, "mean", &self.phase),
                std = last_result(column, "std", &self.phase),
            ),
        })
    }

    /// Algebraic inverse of [`render`](Self::render).
    pub fn invert<S: AsRef<str>>(&self, columns: &[S]) -> String {
        join_clauses(columns, |column| match self.strategy {
            NormalizeStrategy::Log1p => format!("exp({column}) - 1 as {column}"),
            NormalizeStrategy::MinMax => {
                let min = last_result(column, "min", &self.phase);
                let max = last_result(column, "max", &self.phase);
                format!("{column} * ({max} - {min})\n  + {min} as {column}")
            }
            NormalizeStrategy::Standardize => format!(
                "{column} * {std} + {mean} as {column}",
                std = last_result(column, "std", &self.phase),
                mean = last_result(column, "mean", &self.phase),
            ),
        })
    }
}
