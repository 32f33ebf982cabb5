use crate::{
    error::{GenError, Result},
    query::{WithClauses, build_query, indent},
    value::Value,
};

/// Shared training query composition for every algorithm.
pub(crate) struct BaseModel<'a> {
    /// Hivemall training function, e.g. `train_classifier`
    pub function: &'a str,
    /// Output columns of the training function, e.g. `feature, weight`
    pub storage_format: Option<&'a str>,
    pub target: &'a str,
    pub source_table: &'a str,
    pub option: Option<&'a str>,
    pub bias: bool,
    pub hashing: bool,
    /// The query is nested as a CTE body by the caller
    pub with_clause: bool,
    pub oversample_pos_n_times: Option<&'a Value>,
    pub oversample_n_times: Option<&'a Value>,
    /// Features expression. Default: "features"
    pub features: &'a str,
}

impl<'a> BaseModel<'a> {
    pub fn new(function: &'a str, target: &'a str, source_table: &'a str) -> Self {
        BaseModel {
            function,
            storage_format: None,
            target,
            source_table,
            option: None,
            bias: false,
            hashing: false,
            with_clause: false,
            oversample_pos_n_times: None,
            oversample_n_times: None,
            features: "features",
        }
    }

    pub fn query(&self) -> Result<String> {
        let pos_n_times = self.oversample_pos_n_times.filter(|v| !v.is_null());
        let n_times = self.oversample_n_times.filter(|v| !v.is_null());

        if pos_n_times.is_some() && n_times.is_some() {
            return Err(GenError::config(
                "oversample_pos_n_times and oversample_n_times are exclusive.",
            ));
        }

        let oversampled = pos_n_times.is_some() || n_times.is_some();
        let training_source = if oversampled { "train_oversampled" } else { self.source_table };
        let training =
            build_query(&[self.training_clause()], training_source, None, oversampled || self.with_clause, None)?;

        let mut with_clauses = WithClauses::new();
        if let Some(factor) = pos_n_times {
            with_clauses.insert("train_oversampled", self.positive_oversampling(factor)?);
        } else if let Some(factor) = n_times {
            with_clauses.insert(
                "amplified",
                build_query(
                    &[self.amplify(factor)],
                    self.source_table,
                    None,
                    true,
                    None,
                )?,
            );
            with_clauses.insert(
                "train_oversampled",
                build_query(
                    &[self.features, self.target],
                    "amplified",
                    Some("CLUSTER BY rand(43)"),
                    true,
                    None,
                )?,
            );
        } else {
            return Ok(training);
        }
        with_clauses.insert("model_oversampled", training);

        build_query(
            &["feature", "avg(weight) as weight"],
            "model_oversampled",
            Some("group by\n  feature"),
            self.with_clause,
            Some(&with_clauses),
        )
    }

    /// `function(features, target[, 'option'])[ as (storage_format)]`
    fn training_clause(&self) -> String {
        let mut features = self.features.to_string();
        if self.hashing {
            features = format!("feature_hashing({})", features);
        }
        if self.bias {
            features = format!("add_bias({})", features);
        }

        let mut clause = format!("{}(\n  {}\n  , {}\n", self.function, features, self.target);
        if let Some(option) = self.option.filter(|o| !o.is_empty()) {
            clause.push_str(&format!("  , '{}'\n", option));
        }
        clause.push(')');
        if let Some(format) = self.storage_format {
            clause.push_str(&format!(" as ({})", format));
        }
        clause
    }

    fn amplify(&self, factor: &Value) -> String {
        format!(
            "amplify({}, {}, {}) as (features, {})",
            factor, self.features, self.target, self.target
        )
    }

    /// Negative rows as they are, positive rows amplified by `factor`.
    fn positive_oversampling(&self, factor: &Value) -> Result<String> {
        let negatives = build_query(
            &[self.features, self.target],
            self.source_table,
            Some(&format!("where {} = 0", self.target)),
            true,
            None,
        )?;
        let amplified = build_query(
            &[self.amplify(factor)],
            self.source_table,
            Some(&format!("where {} = 1", self.target)),
            true,
            None,
        )?;
        let positives = build_query(
            &[self.features, self.target],
            &format!("(\n{}\n) t0", indent(&amplified, "  ")),
            None,
            true,
            None,
        )?;

        Ok(format!("{}\nunion all\n{}", negatives, positives))
    }
}
