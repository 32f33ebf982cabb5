use crate::{
    error::Result,
    query::{WithClauses, build_query},
};

use super::{PredictOptions, Prediction, TrainOptions, base::BaseModel};

fn train_linear(function: &str, options: &TrainOptions) -> Result<String> {
    BaseModel {
        storage_format: Some("feature, weight"),
        option: options.option.as_deref(),
        bias: options.bias,
        hashing: options.hashing,
        oversample_pos_n_times: options.oversample_pos_n_times.as_ref(),
        oversample_n_times: options.oversample_n_times.as_ref(),
        ..BaseModel::new(function, &options.target, &options.source_table)
    }
    .query()
}

/// Build a `train_classifier` query.
///
/// # Examples
///
/// ```
/// use molehill::model::{TrainOptions, train_classifier};
///
/// let options = TrainOptions { bias: true, ..TrainOptions::new("src_tbl", "label") };
/// let query = train_classifier(&options).unwrap();
/// assert!(query.contains("add_bias(features)"));
/// ```
pub fn train_classifier(options: &TrainOptions) -> Result<String> {
    train_linear("train_classifier", options)
}

/// Build a `train_regressor` query.
pub fn train_regressor(options: &TrainOptions) -> Result<String> {
    train_linear("train_regressor", options)
}

fn linear_prediction(
    predicted_column: &str,
    options: &PredictOptions,
    sigmoid: bool,
) -> Result<String> {
    let id = &options.id_column;

    let mut features = "features".to_string();
    if options.hashing {
        features = format!("feature_hashing({})", features);
    }
    if options.bias {
        features = format!("add_bias({})", features);
    }

    let total_weight = if sigmoid {
        format!("sigmoid(sum(m1.weight * t1.value)) as {}", predicted_column)
    } else {
        format!("sum(m1.weight * t1.value) as {}", predicted_column)
    };

    let mut with_clauses = WithClauses::new();
    with_clauses.insert(
        "features_exploded",
        build_query(
            &[id.as_str(), "extract_feature(fv) as feature", "extract_weight(fv) as value"],
            &format!(
                "{} t1\nLATERAL VIEW explode({}) t2 as fv",
                options.target_table, features
            ),
            None,
            true,
            None,
        )?,
    );

    let joined = format!(
        "features_exploded t1\nleft outer join {} m1\n  on (t1.feature = m1.feature)",
        options.model_table
    );
    let group_by = format!("group by\n  t1.{}", id);
    let selects = [format!("t1.{}", id), total_weight];

    if options.oversample_pos_n_times.as_ref().is_some_and(|v| !v.is_null()) {
        with_clauses.insert("score", build_query(&selects, &joined, Some(&group_by), true, None)?);

        // undo the class rebalancing applied at training time
        let p = predicted_column;
        build_query(
            &[
                format!("t.{}", id),
                format!(
                    "t.{p} / (t.{p} + (1.0 - t.{p}) / ${{td.last_results.downsampling_rate}}) as {p}"
                ),
            ],
            "score t",
            None,
            false,
            Some(&with_clauses),
        )
    } else {
        build_query(&selects, &joined, Some(&group_by), false, Some(&with_clauses))
    }
}

/// Build a prediction query for `train_classifier` models.
///
/// The predicted column is `probability` with sigmoid, `total_weight` without.
pub fn predict_classifier(options: &PredictOptions) -> Result<Prediction> {
    let predicted_column = if options.sigmoid { "probability" } else { "total_weight" };

    Ok(Prediction {
        query: linear_prediction(predicted_column, options, options.sigmoid)?,
        predicted_column: predicted_column.to_string(),
    })
}

/// Build a prediction query for `train_regressor` models.
pub fn predict_regressor(options: &PredictOptions) -> Result<Prediction> {
    let predicted_column = options.predicted_column.as_deref().unwrap_or("target");

    Ok(Prediction {
        query: linear_prediction(predicted_column, options, false)?,
        predicted_column: predicted_column.to_string(),
    })
}
