use crate::{
    error::{GenError, Result},
    query::build_query,
};

/// Build a query estimating the largest cardinality among categorical
/// columns, a starting point for `feature_cardinality` when hashing.
pub fn cardinality<S: AsRef<str>>(source: &str, categorical_columns: &[S]) -> Result<String> {
    if categorical_columns.is_empty() {
        return Err(GenError::config(
            "cardinality requires at least one categorical column",
        ));
    }

    let distincts: Vec<String> = categorical_columns
        .iter()
        .map(|c| format!("approx_distinct({})", c.as_ref()))
        .collect();

    build_query(
        &[format!(
            "array_max(array[{}]) as max_categorical_cardinality",
            distincts.join(", ")
        )],
        source,
        None,
        false,
        None,
    )
}
