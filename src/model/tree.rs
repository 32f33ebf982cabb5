use std::sync::LazyLock;

use regex::Regex;

use crate::{
    error::{GenError, Result},
    preprocessing::dense_feature_array,
    query::{WithClauses, build_query},
};

use super::{PredictOptions, Prediction, TrainOptions, base::BaseModel};

static ATTRS_OPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(^|\s)-(attrs|attribute_types)(\s|$)").expect("valid attrs option pattern")
});

/// Attribute types for a dense feature array: one `Q` per numerical column,
/// then one `C` per categorical column.
///
/// # Examples
///
/// ```
/// use molehill::model::extract_attrs;
///
/// assert_eq!(extract_attrs(&["cat1", "cat2"], &["num1", "num2", "num3"]), "-attrs Q,Q,Q,C,C");
/// ```
pub fn extract_attrs<S: AsRef<str>>(categorical_columns: &[S], numerical_columns: &[S]) -> String {
    let attrs: Vec<&str> = std::iter::repeat_n("Q", numerical_columns.len())
        .chain(std::iter::repeat_n("C", categorical_columns.len()))
        .collect();
    format!("-attrs {}", attrs.join(","))
}

/// Append `-attrs` to `option` unless it already declares attribute types.
pub fn ensure_attrs<S: AsRef<str>>(
    option: &str,
    categorical_columns: &[S],
    numerical_columns: &[S],
) -> String {
    if ATTRS_OPTION.is_match(option) {
        return option.to_string();
    }

    let attrs = extract_attrs(categorical_columns, numerical_columns);
    if option.is_empty() {
        attrs
    } else {
        format!("{} {}", option, attrs)
    }
}

fn train_tree(function: &str, options: &TrainOptions) -> Result<String> {
    // the oversampled roll-up averages per-feature weights, forests have none
    let oversampled = [&options.oversample_pos_n_times, &options.oversample_n_times]
        .into_iter()
        .any(|n| n.as_ref().is_some_and(|v| !v.is_null()));
    if oversampled {
        return Err(GenError::config(format!(
            "{} does not support oversample_pos_n_times or oversample_n_times",
            function
        )));
    }

    let base = BaseModel {
        hashing: options.hashing,
        bias: options.bias,
        ..BaseModel::new(function, &options.target, &options.source_table)
    };

    if options.sparse {
        let models = BaseModel {
            option: options.option.as_deref(),
            with_clause: true,
            ..base
        }
        .query()?;

        // map typed var_importance is not supported downstream, flatten it to text
        let var_importance = "concat_ws(',', collect_set(concat(k1, ':', v1))) as var_importance";
        return build_query(
            &["model_id", "model_weight", "model", var_importance, "oob_errors", "oob_tests"],
            "models",
            Some("lateral view explode(var_importance) t1 as k1, v1\ngroup by 1, 2, 3, 5, 6"),
            false,
            Some(&WithClauses::new().with("models", models)),
        );
    }

    if options.categorical_columns.is_none() && options.numerical_columns.is_none() {
        return Err(GenError::config(
            "Either categorical_columns or numerical_columns should not be None",
        ));
    }
    let categorical = options.categorical_columns.as_deref().unwrap_or_default();
    let numerical = options.numerical_columns.as_deref().unwrap_or_default();

    let option = ensure_attrs(options.option.as_deref().unwrap_or(""), categorical, numerical);
    let features = dense_feature_array(
        categorical,
        numerical,
        options.hashing,
        options.feature_cardinality.as_ref(),
        "",
    );

    BaseModel {
        option: Some(&option),
        features: &features,
        hashing: false,
        bias: false,
        ..base
    }
    .query()
}

/// Build a `train_randomforest_classifier` query.
///
/// Dense mode (the default) builds the feature array from the configured
/// columns and derives `-attrs`; sparse mode trains on a `features` column.
/// Oversampling options are rejected.
pub fn train_randomforest_classifier(options: &TrainOptions) -> Result<String> {
    train_tree("train_randomforest_classifier", options)
}

/// Build a `train_randomforest_regressor` query.
pub fn train_randomforest_regressor(options: &TrainOptions) -> Result<String> {
    train_tree("train_randomforest_regressor", options)
}

fn tree_prediction(options: &PredictOptions, classification: bool) -> Result<String> {
    let id = &options.id_column;

    let categorical = options.categorical_columns.as_deref().unwrap_or_default();
    let numerical = options.numerical_columns.as_deref().unwrap_or_default();
    let features = if categorical.is_empty() && numerical.is_empty() {
        let mut features = "t.features".to_string();
        if options.hashing {
            features = format!("feature_hashing({})", features);
        }
        if options.bias {
            features = format!("add_bias({})", features);
        }
        features
    } else {
        dense_feature_array(
            categorical,
            numerical,
            options.hashing,
            options.feature_cardinality.as_ref(),
            "t.",
        )
    };
    let classification_flag = if classification { ", \"-classification\"" } else { "" };

    let mut with_clauses = WithClauses::new();
    with_clauses.insert(
        "p",
        build_query(
            &["model_id", "model_weight", "model"],
            &options.model_table,
            Some("DISTRIBUTE BY rand(1)"),
            true,
            None,
        )?,
    );
    with_clauses.insert(
        "t1",
        build_query(
            &[
                format!("t.{}", id),
                "p.model_weight".to_string(),
                format!(
                    "tree_predict(p.model_id, p.model, {}{}) as predicted",
                    features, classification_flag
                ),
            ],
            "p",
            Some(&format!("left outer join {} t", options.target_table)),
            true,
            None,
        )?,
    );
    with_clauses.insert(
        "ensembled",
        build_query(
            &[
                id.to_string(),
                "rf_ensemble(predicted.value, predicted.posteriori, model_weight) as predicted"
                    .to_string(),
            ],
            "t1",
            Some(&format!("group by\n  {}", id)),
            true,
            None,
        )?,
    );

    build_query(
        &[id.as_str(), "predicted.label", "predicted.probabilities[1] as probability"],
        "ensembled",
        None,
        false,
        Some(&with_clauses),
    )
}

/// Build a prediction query for random forest classifiers.
pub fn predict_randomforest_classifier(options: &PredictOptions) -> Result<Prediction> {
    Ok(Prediction {
        query: tree_prediction(options, true)?,
        predicted_column: "probability".to_string(),
    })
}

/// Build a prediction query for random forest regressors.
pub fn predict_randomforest_regressor(options: &PredictOptions) -> Result<Prediction> {
    Ok(Prediction {
        query: tree_prediction(options, false)?,
        predicted_column: "target".to_string(),
    })
}
