//! Pipeline orchestration: turns a [`PipelineConfig`] into query files and a
//! digdag workflow.
//!
//! The generated workflow has three top-level groups:
//!
//! - `+preparation` - shuffle and train/test split, then optional imputation
//!   and normalization, each computing statistics on whole/train/test first
//! - `+vectorization` - feature vectors for the whole, train and test tables
//! - `+main` - training tasks, the downsampling rate when positive
//!   oversampling is configured, then per-predictor prediction and evaluation

use std::{
    collections::HashSet,
    fs, io,
    path::{Path, PathBuf},
};

use tracing::{debug, info, warn};

use crate::{
    config::{ColumnGroup, PipelineConfig, PredictorConfig, TrainerConfig},
    error::{GenError, Result},
    evaluation::{EvaluateOptions, evaluate, parse_metrics},
    model::{self, Algorithm, Family},
    preprocessing::{
        Imputer, Normalizer, ShuffleOptions, downsampling_rate, shuffle, train_test_split,
        vectorize,
    },
    query::{QueryBuilder, build_query},
    stats::{combine_train_test_stats, compute_stats},
    value::Value,
    workflow::{Task, to_dig},
};

/// Column lists and transform clauses flattened from the column groups.
///
/// Transform clauses come in two flavours: one reading statistics of the
/// configured phase (applied to train and test) and one reading statistics of
/// the whole dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnPlan {
    pub columns: Vec<String>,
    pub numerical_columns: Vec<String>,
    pub categorical_columns: Vec<String>,
    pub imputed_columns: Vec<String>,
    pub imputation_clauses: Vec<String>,
    pub imputation_clauses_whole: Vec<String>,
    pub normalized_columns: Vec<String>,
    pub normalization_clauses: Vec<String>,
    pub normalization_clauses_whole: Vec<String>,
}

impl ColumnPlan {
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let mut plan = ColumnPlan::default();
        let mut seen = HashSet::new();

        for group in &config.numerical_columns {
            plan.add_group(group, false, &mut seen)?;
        }
        for group in &config.categorical_columns {
            plan.add_group(group, true, &mut seen)?;
        }
        Ok(plan)
    }

    fn add_group(
        &mut self,
        group: &ColumnGroup,
        categorical: bool,
        seen: &mut HashSet<String>,
    ) -> Result<()> {
        for column in &group.columns {
            if !seen.insert(column.clone()) {
                return Err(GenError::config(format!(
                    "Column '{}' appears more than once in the column lists",
                    column
                )));
            }
        }

        let columns = &group.columns;
        self.columns.extend(columns.iter().cloned());
        if categorical {
            self.categorical_columns.extend(columns.iter().cloned());
        } else {
            self.numerical_columns.extend(columns.iter().cloned());
        }

        let Some(transformer) = &group.transformer else {
            return Ok(());
        };

        if let Some(imputer) = &transformer.imputer {
            let phased = Imputer::new(
                &imputer.strategy,
                imputer.phase.as_deref(),
                imputer.fill_value.clone(),
                categorical,
            )?;
            let whole =
                Imputer::new(&imputer.strategy, None, imputer.fill_value.clone(), categorical)?;

            self.imputed_columns.extend(columns.iter().cloned());
            self.imputation_clauses.push(phased.render(columns));
            self.imputation_clauses_whole.push(whole.render(columns));
        }

        if let Some(normalizer) = &transformer.normalizer {
            let phased = Normalizer::new(&normalizer.strategy, normalizer.phase.as_deref())?;
            let whole = Normalizer::new(&normalizer.strategy, None)?;

            self.normalized_columns.extend(columns.iter().cloned());
            self.normalization_clauses.push(phased.render(columns));
            self.normalization_clauses_whole.push(whole.render(columns));
        }
        Ok(())
    }
}

/// Tables produced by a preparation stage, consumed by the next one.
#[derive(Debug, Clone)]
struct StageTables {
    whole: String,
    train: String,
    test: String,
}

/// One transform stage (imputation or normalization) of the preparation group.
struct TransformStage<'a> {
    query_basename: &'a str,
    /// Prefix of the tables the stage reads (`<prefix>_train`, `<prefix>_test`)
    input_prefix: String,
    output_prefix: String,
    target_columns: &'a [String],
    clauses: &'a [String],
    clauses_whole: &'a [String],
    engine: &'a str,
}

/// Generates every query file and the workflow document of a pipeline.
pub struct Pipeline {
    builder: QueryBuilder,
    query_dir: PathBuf,
    plan: ColumnPlan,
    id_column: String,
    target_column: String,
    stats_path: PathBuf,
    combine_stats_path: PathBuf,
    workflow_path: Option<PathBuf>,
}

impl Pipeline {
    /// `builder` stamps every written query, e.g. with the tool version.
    pub fn new(builder: QueryBuilder) -> Self {
        Pipeline {
            builder,
            query_dir: PathBuf::from("queries"),
            plan: ColumnPlan::default(),
            id_column: "rowid".to_string(),
            target_column: "target".to_string(),
            stats_path: PathBuf::new(),
            combine_stats_path: PathBuf::new(),
            workflow_path: None,
        }
    }

    /// Where the last run wrote the workflow document.
    pub fn workflow_path(&self) -> Option<&Path> {
        self.workflow_path.as_deref()
    }

    /// Read `config_file` and dump queries and the workflow.
    ///
    /// The workflow goes to `dest_file`, or `<source>.dig` when not given.
    /// With `overwrite`, the query directory is removed first and an existing
    /// workflow file is replaced.
    pub fn dump_pipeline(
        &mut self,
        config_file: impl AsRef<Path>,
        dest_file: Option<&Path>,
        overwrite: bool,
    ) -> Result<PathBuf> {
        let config = PipelineConfig::from_path(config_file)?;
        self.dump(&config, dest_file, overwrite)
    }

    /// Dump queries and the workflow for an already parsed definition.
    pub fn dump(
        &mut self,
        config: &PipelineConfig,
        dest_file: Option<&Path>,
        overwrite: bool,
    ) -> Result<PathBuf> {
        let oversample_pos_n_times =
            config.oversample_pos_n_times.as_ref().filter(|v| !v.is_null());
        let oversample_n_times = config.oversample_n_times.as_ref().filter(|v| !v.is_null());
        if oversample_pos_n_times.is_some() && oversample_n_times.is_some() {
            return Err(GenError::config(
                "oversample_pos_n_times and oversample_n_times are exclusive.",
            ));
        }

        // resolve algorithms and metrics before anything is written
        let trainers = config
            .trainer
            .iter()
            .map(|t| {
                let algorithm = model::trainer(&t.name)?;
                if t.guess_attrs && algorithm.family != Family::TreeEnsemble {
                    return Err(GenError::config(format!(
                        "guess_attrs is only supported by tree ensembles, got '{}'",
                        t.name
                    )));
                }
                Ok((algorithm, t))
            })
            .collect::<Result<Vec<_>>>()?;
        let predictors = config
            .predictor
            .iter()
            .map(|p| model::predictor(&p.name).map(|algorithm| (algorithm, p)))
            .collect::<Result<Vec<_>>>()?;
        let metrics = config.evaluator.metrics.to_vec();
        parse_metrics(&metrics)?;

        self.plan = ColumnPlan::from_config(config)?;
        self.id_column = config.id_column.clone();
        self.target_column = config.target_column.clone();
        self.query_dir = PathBuf::from(&config.query_dir);
        self.stats_path = self.query_dir.join("stats.sql");
        self.combine_stats_path = self.query_dir.join("combine_stats.sql");

        info!(source = %config.source, query_dir = %self.query_dir.display(), "generating pipeline");

        let mut export = Task::new()
            .set("source", config.source.as_str())
            .set("train_sample_rate", config.train_sample_rate.clone());
        if let Some(n) = oversample_n_times {
            export.insert("oversample_n_times", n.clone());
        } else if let Some(n) = oversample_pos_n_times {
            export.insert("oversample_pos_n_times", n.clone());
        }
        export.insert(
            "td",
            Task::new().set("database", config.dbname.as_str()).set("engine", "hive"),
        );

        if overwrite {
            match fs::remove_dir_all(&self.query_dir) {
                Ok(()) => warn!(path = %self.query_dir.display(), "removed existing query directory"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        let mut preparation = self.build_shuffle_and_split_task(config.stratify)?;

        let source = config.source.as_str();
        let mut tables = StageTables {
            whole: format!("{}_shuffled", source),
            train: format!("{}_train", source),
            test: format!("{}_test", source),
        };
        let mut prefix = source.to_string();

        let do_imputation = !self.plan.imputation_clauses.is_empty();
        let do_normalization = !self.plan.normalization_clauses.is_empty();

        if (do_imputation || do_normalization) && self.needs_stats() {
            let stats = compute_stats("${source}", &self.plan.numerical_columns)?;
            let combined = combine_train_test_stats("${source}", &self.plan.numerical_columns)?;
            self.save_query(&self.stats_path, &stats)?;
            self.save_query(&self.combine_stats_path, &combined)?;
        }

        if do_imputation {
            info!("adding imputation stage");
            let plan = self.plan.clone();
            let stage = TransformStage {
                query_basename: "impute",
                input_prefix: prefix.clone(),
                output_prefix: format!("{}_imputed", source),
                target_columns: &plan.imputed_columns,
                clauses: &plan.imputation_clauses,
                clauses_whole: &plan.imputation_clauses_whole,
                engine: "presto",
            };
            let (task, next) = self.build_task_with_stats(&stage, &tables)?;
            preparation.insert("+imputation", task);
            prefix = stage.output_prefix.clone();
            tables = next;
        }

        if do_normalization {
            info!("adding normalization stage");
            let plan = self.plan.clone();
            let stage = TransformStage {
                query_basename: "normalize",
                input_prefix: prefix.clone(),
                output_prefix: format!("{}_norm", source),
                target_columns: &plan.normalized_columns,
                clauses: &plan.normalization_clauses,
                clauses_whole: &plan.normalization_clauses_whole,
                engine: "hive",
            };
            let (task, next) = self.build_task_with_stats(&stage, &tables)?;
            preparation.insert("+normalization", task);
            tables = next;
        }

        let mut workflow = Task::new().set("_export", export).set("+preparation", preparation);

        let vectorizer = &config.vectorizer;
        let vectorize_task = self.build_vectorize_task(config, &tables)?;
        workflow.insert("+vectorization", vectorize_task);

        let mut train_tasks = parallel_group(trainers.len());
        for (idx, (algorithm, trainer)) in trainers.iter().enumerate() {
            let task = self.build_train_task(
                algorithm,
                trainer,
                &vectorizer.train_table,
                &tables.train,
                oversample_pos_n_times.is_some(),
                oversample_n_times.is_some(),
            )?;
            train_tasks.insert(format!("+train_{}", idx), task);
        }

        let evaluate_query = evaluate(
            &metrics,
            &self.target_column,
            "${predicted_column}",
            &EvaluateOptions {
                target_table: "${actual}".to_string(),
                prediction_table: "${predicted_table}".to_string(),
                id_column: self.id_column.clone(),
            },
        )?;
        self.save_query(&self.query_dir.join("evaluate.sql"), &evaluate_query)?;

        let mut main = Task::new().set("+train", train_tasks);
        if oversample_pos_n_times.is_some() {
            main.insert(
                "+compute_downsampling_rate",
                self.build_downsampling_task(&vectorizer.train_table)?,
            );
        }

        let mut predict_tasks = parallel_group(predictors.len());
        let single_predictor = predictors.len() == 1;
        for (idx, (algorithm, predictor)) in predictors.iter().enumerate() {
            let task = self.build_predict_and_eval_task(
                algorithm,
                predictor,
                idx,
                &vectorizer.test_table,
                &tables.test,
                &metrics,
                single_predictor,
                oversample_pos_n_times.is_some(),
            )?;
            predict_tasks.insert(format!("+seq_{}", idx), task);
        }
        main.insert("+predict", predict_tasks);
        workflow.insert("+main", main);

        let workflow_path = dest_file
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(format!("{}.dig", source)));

        if !overwrite && workflow_path.exists() {
            return Err(GenError::AlreadyExists(workflow_path));
        }

        write_file(&workflow_path, &to_dig(&workflow))?;
        info!(path = %workflow_path.display(), "wrote workflow");

        self.workflow_path = Some(workflow_path.clone());
        Ok(workflow_path)
    }

    /// Statistics only cover numerical columns.
    fn needs_stats(&self) -> bool {
        !self.plan.numerical_columns.is_empty()
    }

    fn save_query(&self, path: &Path, query: &str) -> Result<()> {
        write_file(path, &self.builder.stamp(query))?;
        debug!(path = %path.display(), "wrote query");
        Ok(())
    }

    fn query_path(&self, basename: &str) -> PathBuf {
        self.query_dir.join(format!("{}.sql", basename))
    }

    fn build_shuffle_and_split_task(&self, stratify: bool) -> Result<Task> {
        let shuffle_query = shuffle(
            &self.plan.columns,
            &self.target_column,
            &ShuffleOptions {
                id_column: self.id_column.clone(),
                stratify,
                ..Default::default()
            },
        )?;
        let shuffle_path = self.query_path("shuffle");
        self.save_query(&shuffle_path, &shuffle_query)?;

        let (train_query, test_query) = train_test_split(
            "${source}_shuffled",
            &Value::from("${train_sample_rate}"),
            stratify,
        )?;
        let split_train_path = self.query_path("split_train");
        let split_test_path = self.query_path("split_test");
        self.save_query(&split_train_path, &train_query)?;
        self.save_query(&split_test_path, &test_query)?;

        let split = Task::new()
            .parallel()
            .set(
                "+train",
                Task::new()
                    .set("td>", path_value(&split_train_path))
                    .set("engine", "presto")
                    .set("create_table", "${source}_train"),
            )
            .set(
                "+test",
                Task::new()
                    .set("td>", path_value(&split_test_path))
                    .set("engine", "presto")
                    .set("create_table", "${source}_test"),
            );

        Ok(Task::new()
            .set(
                "+shuffle",
                Task::new()
                    .set("td>", path_value(&shuffle_path))
                    .set("create_table", "${source}_shuffled"),
            )
            .set("+split", split))
    }

    fn stats_task(&self, source: &str, create_table: &str) -> Task {
        Task::new()
            .set("td>", path_value(&self.stats_path))
            .set("engine", "presto")
            .set("source", source)
            .set("create_table", create_table)
    }

    fn build_task_with_stats(
        &self,
        stage: &TransformStage<'_>,
        input: &StageTables,
    ) -> Result<(Task, StageTables)> {
        let complement: Vec<String> = self
            .plan
            .columns
            .iter()
            .filter(|c| !stage.target_columns.contains(c))
            .cloned()
            .collect();

        let transform_query = |clauses: &[String]| {
            let mut selects = vec![self.id_column.clone(), self.target_column.clone()];
            selects.extend(clauses.iter().cloned());
            selects.extend(complement.iter().cloned());
            build_query(&selects, "${source}", None, false, None)
        };

        let query_path = self.query_path(stage.query_basename);
        let query_path_whole = self.query_path(&format!("{}_whole", stage.query_basename));
        self.save_query(&query_path, &transform_query(stage.clauses)?)?;
        self.save_query(&query_path_whole, &transform_query(stage.clauses_whole)?)?;

        let output = StageTables {
            whole: stage.output_prefix.clone(),
            train: format!("{}_train", stage.output_prefix),
            test: format!("{}_test", stage.output_prefix),
        };

        let input_prefix = &stage.input_prefix;
        let compute_stats = Task::new()
            .parallel()
            .set("+whole", self.stats_task(&input.whole, &format!("{}_stats", input_prefix)))
            .set("+train", self.stats_task(&input.train, "${source}_stats"))
            .set("+test", self.stats_task(&input.test, "${source}_stats"));

        let combine = Task::new()
            .set("td>", path_value(&self.combine_stats_path))
            .set("engine", "presto")
            .set("source", input_prefix.as_str())
            .set("store_last_results", true);

        let exec = |query: &Path, source: &str, create_table: &str| {
            Task::new()
                .set("td>", path_value(query))
                .set("engine", stage.engine)
                .set("source", source)
                .set("create_table", create_table)
        };
        let execute = Task::new()
            .parallel()
            .set("+whole", exec(&query_path_whole, &input.whole, &output.whole))
            .set("+train", exec(&query_path, &input.train, &output.train))
            .set("+test", exec(&query_path, &input.test, &output.test));

        let mut task = Task::new();
        if self.needs_stats() {
            task.insert("+compute_stats", compute_stats);
            task.insert("+combine_train_test_stats", combine);
        }
        task.insert("+execute", execute);

        Ok((task, output))
    }

    fn build_vectorize_task(&self, config: &PipelineConfig, sources: &StageTables) -> Result<Task> {
        let vectorizer = &config.vectorizer;
        let mut options = vectorizer.options.clone();
        if options.categorical_columns.is_none() {
            options.categorical_columns = Some(self.plan.categorical_columns.clone());
        }
        if options.numerical_columns.is_none() {
            options.numerical_columns = Some(self.plan.numerical_columns.clone());
        }
        options.id_column = self.id_column.clone();

        let query = vectorize("${source}", &self.target_column, &options)?;
        let path = self.query_path("vectorize");
        self.save_query(&path, &query)?;

        let apply = |source: &str, table: &str| {
            Task::new()
                .set("td>", path_value(&path))
                .set("source", source)
                .set("create_table", table)
        };

        Ok(Task::new()
            .parallel()
            .set("+whole", apply(&sources.whole, &vectorizer.whole_table))
            .set("+train", apply(&sources.train, &vectorizer.train_table))
            .set("+test", apply(&sources.test, &vectorizer.test_table)))
    }

    /// Dense tree ensembles build their feature array from raw columns.
    fn is_dense_tree(algorithm: &Algorithm, sparse: bool) -> bool {
        algorithm.family == Family::TreeEnsemble && !sparse
    }

    fn build_train_task(
        &self,
        algorithm: &Algorithm,
        trainer: &TrainerConfig,
        train_table: &str,
        raw_train_table: &str,
        oversample_pos: bool,
        oversample_all: bool,
    ) -> Result<Task> {
        let mut options = trainer.options.clone();
        options.target = self.target_column.clone();

        // tree ensembles cannot be averaged per feature after oversampling
        if algorithm.family == Family::Linear {
            if oversample_all && options.oversample_n_times.is_none() {
                options.oversample_n_times = Some(Value::from("${oversample_n_times}"));
            } else if oversample_pos && options.oversample_pos_n_times.is_none() {
                options.oversample_pos_n_times = Some(Value::from("${oversample_pos_n_times}"));
            }
        }

        let dense = Self::is_dense_tree(algorithm, options.sparse);
        if dense && options.categorical_columns.is_none() && options.numerical_columns.is_none() {
            options.categorical_columns = Some(self.plan.categorical_columns.clone());
            options.numerical_columns = Some(self.plan.numerical_columns.clone());
        }
        // dense training derives -attrs on its own
        if trainer.guess_attrs && options.sparse {
            options.option = Some(model::ensure_attrs(
                options.option.as_deref().unwrap_or(""),
                &self.plan.categorical_columns,
                &self.plan.numerical_columns,
            ));
        }

        let query = (algorithm.train)(&options)?;
        let path = self.query_path(&trainer.name);
        self.save_query(&path, &query)?;

        Ok(Task::new()
            .set("td>", path_value(&path))
            .set("source", if dense { raw_train_table } else { train_table })
            .set("create_table", trainer.model_table.as_deref().unwrap_or("model")))
    }

    fn build_downsampling_task(&self, source: &str) -> Result<Task> {
        let query = downsampling_rate("${source}", "${target_column}")?;
        let path = self.query_path("downsampling_rate");
        self.save_query(&path, &query)?;

        Ok(Task::new()
            .set("td>", path_value(&path))
            .set("source", source)
            .set("target_column", self.target_column.as_str())
            .set("engine", "presto")
            .set("store_last_results", true))
    }

    #[allow(clippy::too_many_arguments)]
    fn build_predict_and_eval_task(
        &self,
        algorithm: &Algorithm,
        predictor: &PredictorConfig,
        idx: usize,
        test_table: &str,
        raw_test_table: &str,
        metrics: &[String],
        single_predictor: bool,
        oversample_pos: bool,
    ) -> Result<Task> {
        let mut options = predictor.options.clone();
        options.id_column = self.id_column.clone();

        if oversample_pos
            && algorithm.family == Family::Linear
            && options.oversample_pos_n_times.is_none()
        {
            options.oversample_pos_n_times = Some(Value::from("${oversample_pos_n_times}"));
        }

        let dense = Self::is_dense_tree(algorithm, predictor.sparse);
        if dense && options.categorical_columns.is_none() && options.numerical_columns.is_none() {
            options.categorical_columns = Some(self.plan.categorical_columns.clone());
            options.numerical_columns = Some(self.plan.numerical_columns.clone());
        }

        let default_output = if single_predictor {
            "prediction".to_string()
        } else {
            format!("prediction_{}", idx)
        };
        let predict_table = predictor.output_table.clone().unwrap_or(default_output);
        let default_target = if dense { raw_test_table } else { test_table };
        let target_table = predictor.target_table.as_deref().unwrap_or(default_target);
        let model_table = predictor.model_table.as_deref().unwrap_or("model");

        let prediction = (algorithm.predict)(&options)?;
        let path = self.query_path(&predictor.name);
        self.save_query(&path, &prediction.query)?;

        let accuracy: Vec<String> = metrics
            .iter()
            .map(|m| format!("{0}: ${{td.last_results.{0}}}", m.to_lowercase()))
            .collect();

        Ok(Task::new()
            .set(
                "+exec_predict",
                Task::new()
                    .set("td>", path_value(&path))
                    .set("target_table", target_table)
                    .set("create_table", predict_table.as_str())
                    .set("model_table", model_table),
            )
            .set(
                "+evaluate",
                Task::new()
                    .set("td>", path_value(&self.query_path("evaluate")))
                    .set("actual", test_table)
                    .set("predicted_table", predict_table.as_str())
                    .set("predicted_column", prediction.predicted_column.as_str())
                    .set("store_last_results", true),
            )
            .set("+show_accuracy", Task::new().set("echo>", accuracy.join("\t"))))
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(QueryBuilder::default())
    }
}

/// Group flagged `_parallel` when it will hold more than one task.
fn parallel_group(size: usize) -> Task {
    if size > 1 { Task::new().parallel() } else { Task::new() }
}

fn path_value(path: &Path) -> String {
    path.display().to_string()
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    Ok(())
}
