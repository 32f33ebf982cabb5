use serde::Deserialize;

use crate::{
    error::{GenError, Result},
    query::{build_query, indent},
    value::Value,
};

/// Options for [`vectorize`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct VectorizeOptions {
    pub categorical_columns: Option<Vec<String>>,
    pub numerical_columns: Option<Vec<String>>,
    /// Id column name. Default: "rowid"
    pub id_column: String,
    /// Output feature column name. Default: "features"
    pub features: String,
    pub bias: bool,
    /// Hash features at vectorization time, useful with many categorical values
    pub hashing: bool,
    /// Emit NULL/0 entries so every row has the same number of features
    pub emit_null: bool,
    /// Force value 1 for categorical features
    pub force_value: bool,
    pub dense: bool,
    /// Upper bound of the hashed feature space
    pub feature_cardinality: Option<Value>,
}

impl Default for VectorizeOptions {
    fn default() -> Self {
        VectorizeOptions {
            categorical_columns: None,
            numerical_columns: None,
            id_column: "rowid".to_string(),
            features: "features".to_string(),
            bias: false,
            hashing: false,
            emit_null: false,
            force_value: false,
            dense: false,
            feature_cardinality: None,
        }
    }
}

/// Build the vectorization query producing `(id, features, target)` rows.
///
/// # Examples
///
/// ```
/// use molehill::preprocessing::{vectorize, VectorizeOptions};
///
/// let options = VectorizeOptions {
///     numerical_columns: Some(vec!["age".into(), "fare".into()]),
///     dense: true,
///     ..Default::default()
/// };
/// let query = vectorize("titanic", "survived", &options).unwrap();
/// assert!(query.contains("array(age, fare) as features"));
/// ```
pub fn vectorize(source: &str, target_column: &str, options: &VectorizeOptions) -> Result<String> {
    let categorical = options.categorical_columns.as_deref().unwrap_or_default();
    let numerical = options.numerical_columns.as_deref().unwrap_or_default();

    if categorical.is_empty() && numerical.is_empty() {
        return Err(GenError::config(
            "Either one categorical or numerical column is required.",
        ));
    }

    let mut feature_query = if options.dense {
        dense_feature_array(
            categorical,
            numerical,
            options.hashing,
            options.feature_cardinality.as_ref(),
            "",
        )
    } else {
        let mut query =
            feature_column_query(categorical, numerical, options.emit_null, options.force_value);

        if options.hashing {
            let cardinality = match &options.feature_cardinality {
                Some(n) if !n.is_null() => indent(&format!("\n, '-num_features {}'", n), "  "),
                _ => String::new(),
            };
            query = format!("feature_hashing(\n{}{}\n)", indent(&query, "  "), cardinality);
        }

        if options.bias {
            query = format!("add_bias(\n{}\n)", indent(&query, "  "));
        }
        query
    };
    feature_query.push_str(&format!(" as {}", options.features));

    build_query(
        &[options.id_column.as_str(), feature_query.as_str(), target_column],
        source,
        None,
        false,
        None,
    )
}

/// Positional feature array: numerical columns first, then categorical ones.
///
/// With `hashing`, categorical references become `mhash(column[, cardinality])`.
/// `prefix` qualifies every column reference (e.g. `"t."`).
pub fn dense_feature_array<S: AsRef<str>>(
    categorical_columns: &[S],
    numerical_columns: &[S],
    hashing: bool,
    feature_cardinality: Option<&Value>,
    prefix: &str,
) -> String {
    let feature_size = match feature_cardinality {
        Some(n) if !n.is_null() => format!(", {}", n),
        _ => String::new(),
    };

    let mut columns: Vec<String> = numerical_columns
        .iter()
        .map(|c| format!("{}{}", prefix, c.as_ref()))
        .collect();
    columns.extend(categorical_columns.iter().map(|c| {
        if hashing {
            format!("mhash({}{}{})", prefix, c.as_ref(), feature_size)
        } else {
            format!("{}{}", prefix, c.as_ref())
        }
    }));

    format!("array({})", columns.join(", "))
}

#[derive(Clone, Copy)]
enum FeatureKind {
    Numerical,
    Categorical,
}

impl FeatureKind {
    fn function(self) -> &'static str {
        match self {
            FeatureKind::Numerical => "quantitative_features",
            FeatureKind::Categorical => "categorical_features",
        }
    }
}

fn feature_array(columns: &[String], kind: FeatureKind, emit_null: bool, force_value: bool) -> String {
    let names = format!("array(\"{}\")", columns.join("\", \""));
    let mut body = format!("{}\n, {}", names, columns.join("\n, "));

    let mut flags = Vec::new();
    if emit_null {
        flags.push("-emit_null");
    }
    if force_value && matches!(kind, FeatureKind::Categorical) {
        flags.push("-force_value");
    }
    if !flags.is_empty() {
        body.push_str(&format!("\n, '{}'", flags.join(" ")));
    }

    format!("{}(\n{}\n)", kind.function(), indent(&body, "  "))
}

fn feature_column_query(
    categorical_columns: &[String],
    numerical_columns: &[String],
    emit_null: bool,
    force_value: bool,
) -> String {
    let mut arrays = Vec::new();
    if !numerical_columns.is_empty() {
        arrays.push(feature_array(numerical_columns, FeatureKind::Numerical, emit_null, false));
    }
    if !categorical_columns.is_empty() {
        arrays.push(feature_array(
            categorical_columns,
            FeatureKind::Categorical,
            emit_null,
            force_value,
        ));
    }

    if arrays.len() == 1 {
        return arrays.remove(0);
    }

    let inner: Vec<String> = arrays.iter().map(|a| indent(a, "  ")).collect();
    format!("array_concat(\n{}\n)", inner.join(",\n"))
}
