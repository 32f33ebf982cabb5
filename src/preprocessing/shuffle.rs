use crate::{error::Result, query::build_query, value::Value};

/// Options for [`shuffle`].
#[derive(Debug, Clone, PartialEq)]
pub struct ShuffleOptions {
    /// Source table. Default: "${source}"
    pub source: String,
    /// Id column assigned by `rowid()`. Default: "rowid"
    pub id_column: String,
    /// Rank rows within each label instead of drawing one random value
    pub stratify: bool,
    /// Seed of the random value used for sampling
    pub rnd_seed: u32,
    /// Seed of the `cluster by` random shuffle
    pub cluster_seed: u32,
}

impl Default for ShuffleOptions {
    fn default() -> Self {
        ShuffleOptions {
            source: "${source}".to_string(),
            id_column: "rowid".to_string(),
            stratify: false,
            rnd_seed: 32,
            cluster_seed: 43,
        }
    }
}

/// Build the shuffle query assigning row ids and the random ordering used by
/// [`train_test_split`]. Meant to run on Hive.
pub fn shuffle<S: AsRef<str>>(
    columns: &[S],
    target_column: &str,
    options: &ShuffleOptions,
) -> Result<String> {
    let mut selects = vec![format!("rowid() as {}", options.id_column), target_column.to_string()];
    selects.extend(columns.iter().map(|c| c.as_ref().to_string()));

    let condition = if options.stratify {
        selects.push(format!(
            "count(1) over (partition by {}) as per_label_count",
            target_column
        ));
        selects.push(format!(
            "rank() over (partition by {} order by rand({})) as rank_in_label",
            target_column, options.rnd_seed
        ));
        None
    } else {
        selects.push(format!("rand({}) as rnd", options.rnd_seed));
        Some(format!("cluster by rand({})", options.cluster_seed))
    };

    build_query(&selects, &options.source, condition.as_deref(), false, None)
}

/// Build the train and test split queries over a shuffled table.
///
/// `train_sample_rate` is usually the `${train_sample_rate}` placeholder.
/// Must be used with the same `stratify` flag as [`shuffle`].
pub fn train_test_split(
    source: &str,
    train_sample_rate: &Value,
    stratify: bool,
) -> Result<(String, String)> {
    let condition = |op: &str| {
        if stratify {
            format!(
                "where\n  rank_in_label {} (per_label_count * {})",
                op, train_sample_rate
            )
        } else {
            format!("where\n  rnd {} {}", op, train_sample_rate)
        }
    };

    let train = build_query(&["*"], source, Some(&condition("<=")), false, None)?;
    let test = build_query(&["*"], source, Some(&condition(">")), false, None)?;
    Ok((train, test))
}
