use std::str::FromStr;

use crate::{
    error::{GenError, Result},
    value::Value,
};

use super::{join_clauses, last_result, phase_suffix};

/// How missing values are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImputeStrategy {
    Mean,
    Median,
    Constant,
}

impl FromStr for ImputeStrategy {
    type Err = GenError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mean" => Ok(Self::Mean),
            "median" => Ok(Self::Median),
            "constant" => Ok(Self::Constant),
            other => Err(GenError::config(format!(
                "Unknown imputation strategy: '{}'. strategy should be mean, median or constant",
                other
            ))),
        }
    }
}

/// Fills NULL values with a precomputed statistic or a constant.
///
/// # Examples
///
/// ```
/// use molehill::preprocessing::Imputer;
///
/// let imputer = Imputer::new("median", Some("train"), None, false).unwrap();
/// assert_eq!(
///     imputer.render(&["age"]),
///     "coalesce(age, ${td.last_results.age_median_train}) as age"
/// );
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Imputer {
    strategy: ImputeStrategy,
    phase: String,
    fill_value: Option<Value>,
    categorical: bool,
}

impl Imputer {
    pub fn new(
        strategy: &str,
        phase: Option<&str>,
        fill_value: Option<Value>,
        categorical: bool,
    ) -> Result<Self> {
        let strategy: ImputeStrategy = strategy.parse()?;
        let fill_value = fill_value.filter(|v| !v.is_null());

        if strategy == ImputeStrategy::Constant && fill_value.is_none() {
            return Err(GenError::config(
                "fill_value should not be None for constant imputation.",
            ));
        }

        Ok(Imputer {
            strategy,
            phase: phase_suffix(phase),
            fill_value,
            categorical,
        })
    }

    pub fn strategy(&self) -> ImputeStrategy {
        self.strategy
    }

    /// One `coalesce(..) as column` clause per column, in input order.
    pub fn render<S: AsRef<str>>(&self, columns: &[S]) -> String {
        join_clauses(columns, |column| {
            let source = if self.categorical {
                format!("cast({} as varchar)", column)
            } else {
                column.to_string()
            };
            format!("coalesce({}, {}) as {}", source, self.statistic(column), column)
        })
    }

    fn statistic(&self, column: &str) -> String {
        match self.strategy {
            ImputeStrategy::Mean => last_result(column, "mean", &self.phase),
            ImputeStrategy::Median => last_result(column, "median", &self.phase),
            ImputeStrategy::Constant => self
                .fill_value
                .as_ref()
                .map(Value::sql_literal)
                .unwrap_or_default(),
        }
    }
}
