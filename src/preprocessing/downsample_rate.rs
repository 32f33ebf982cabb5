use crate::{
    error::Result,
    query::{WithClauses, build_query},
};

/// Build the query computing the downsampling rate implied by positive-class
/// oversampling by `${oversample_pos_n_times}`.
///
/// Linear predictors read the result back as
/// `${td.last_results.downsampling_rate}` to correct their scores.
pub fn downsampling_rate(source: &str, target_column: &str) -> Result<String> {
    let mut with_clauses = WithClauses::new();
    with_clauses.insert(
        "label_count",
        build_query(
            &[target_column, "cast(count(1) as double) as cnt"],
            source,
            Some(&format!("group by\n  {}", target_column)),
            true,
            None,
        )?,
    );
    with_clauses.insert(
        "aggregated",
        build_query(
            &[format!("map_agg({}, cnt) as kv", target_column)],
            "label_count",
            None,
            true,
            None,
        )?,
    );

    build_query(
        &["(kv[0] / (kv[0] + kv[1] * cast(${oversample_pos_n_times} as double))) / (kv[0] / (kv[0] + kv[1])) as downsampling_rate"],
        "aggregated",
        None,
        false,
        Some(&with_clauses),
    )
}
