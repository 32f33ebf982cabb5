//! Statistics queries feeding imputation and normalization.
//!
//! [`compute_stats`] runs once per split (whole, train, test) and
//! [`combine_train_test_stats`] flattens the three result tables into one row,
//! so a later task can read every statistic as `${td.last_results.<name>}`.

use crate::{
    error::{GenError, Result},
    query::build_query,
};

/// Statistic aliases in output order, paired with their aggregate template.
const STATISTICS: [(&str, &str); 7] = [
    ("mean", "avg({})"),
    ("std", "stddev_pop({})"),
    ("min", "min({})"),
    ("25", "approx_percentile({}, 0.25)"),
    ("median", "approx_percentile({}, 0.5)"),
    ("75", "approx_percentile({}, 0.75)"),
    ("max", "max({})"),
];

/// Phases combined by [`combine_train_test_stats`], with their output suffix
const PHASES: [(&str, &str); 3] = [("train", "_train"), ("test", "_test"), ("whole", "")];

pub fn compute_stats<S: AsRef<str>>(source: &str, numerical_columns: &[S]) -> Result<String> {
    require_columns(numerical_columns)?;
    let clauses: Vec<String> = numerical_columns
        .iter()
        .flat_map(|column| {
            let column = column.as_ref();
            STATISTICS.iter().map(move |(name, aggregate)| {
                format!("{} as {}_{}", aggregate.replace("{}", column), column, name)
            })
        })
        .collect();

    build_query(&[clauses.join("\n, ")], source, None, false, None)
}

pub fn combine_train_test_stats<S: AsRef<str>>(
    source: &str,
    numerical_columns: &[S],
) -> Result<String> {
    require_columns(numerical_columns)?;

    let mut clauses = Vec::new();
    for column in numerical_columns {
        let column = column.as_ref();
        for (phase, suffix) in PHASES {
            for (name, _) in STATISTICS {
                clauses.push(format!("{phase}.{column}_{name} as {column}_{name}{suffix}"));
            }
        }
    }

    let tables = format!(
        "{source}_train_stats as train, {source}_test_stats as test, {source}_stats as whole"
    );
    build_query(&[clauses.join("\n, ")], &tables, None, false, None)
}

fn require_columns<S>(numerical_columns: &[S]) -> Result<()> {
    if numerical_columns.is_empty() {
        return Err(GenError::config("statistics require at least one numerical column"));
    }
    Ok(())
}
