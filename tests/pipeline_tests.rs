#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use molehill::cli::{self, CliError, GenerateOptions};
    use molehill::config::Metrics;
    use molehill::{ColumnPlan, GenError, Pipeline, PipelineConfig, QueryBuilder, Value};
    use tempfile::tempdir;

    fn titanic_yaml(query_dir: &Path) -> String {
        format!(
            "\
source: titanic
dbname: ml_datasets
id_column: rowid
target_column: survived
train_sample_rate: 0.8
numerical_columns:
  - columns: [age]
    transformer:
      imputer:
        strategy: median
        phase: train
      normalizer:
        strategy: standardize
        phase: train
  - columns: [fare]
categorical_columns:
  - columns: [sex]
    transformer:
      imputer:
        strategy: constant
        fill_value: missing
trainer:
  - name: train_classifier
    option: -loss logloss -opt AdaGrad
predictor:
  - name: predict_classifier
evaluator:
  metrics: [auc, logloss]
query_dir: {}
",
            query_dir.display()
        )
    }

    fn bank_yaml(query_dir: &Path) -> String {
        format!(
            "\
source: bank
dbname: ml
id_column: id
target_column: y
train_sample_rate: 0.75
oversample_pos_n_times: 2
numerical_columns:
  - columns: [age]
categorical_columns:
  - columns: [job]
trainer:
  - name: train_classifier
  - name: train_randomforest_classifier
    model_table: rf_model
predictor:
  - name: predict_classifier
  - name: predict_randomforest_classifier
    model_table: rf_model
evaluator:
  metrics: auc
query_dir: {}
",
            query_dir.display()
        )
    }

    fn read(path: impl AsRef<Path>) -> String {
        fs::read_to_string(path).unwrap()
    }

    /// Replace the `QUERIES` placeholder with the actual query directory
    fn with_query_dir(expected: &str, query_dir: &Path) -> String {
        expected.replace("QUERIES", &query_dir.display().to_string())
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    #[test]
    fn test_config_defaults() {
        let config = PipelineConfig::from_yaml(
            "source: src\ndbname: db\nid_column: id\ntarget_column: y\ntrain_sample_rate: 0.7\nevaluator:\n  metrics: rmse\n",
        )
        .unwrap();

        assert_eq!(config.train_sample_rate, Value::Float(0.7));
        assert_eq!(config.query_dir, "queries");
        assert!(!config.stratify);
        assert_eq!(config.vectorizer.train_table, "train");
        assert_eq!(config.vectorizer.whole_table, "whole");
        assert_eq!(config.evaluator.metrics, Metrics::One("rmse".to_string()));
        assert!(config.trainer.is_empty());
    }

    #[test]
    fn test_config_requires_train_sample_rate() {
        let err = PipelineConfig::from_yaml(
            "source: src\ndbname: db\nid_column: id\ntarget_column: y\nevaluator:\n  metrics: rmse\n",
        )
        .unwrap_err();
        assert!(matches!(err, GenError::Yaml(_)));
        assert!(err.to_string().contains("train_sample_rate"));
    }

    #[test]
    fn test_config_trainer_options_are_flattened() {
        let config = PipelineConfig::from_yaml(&titanic_yaml(Path::new("queries"))).unwrap();

        let trainer = &config.trainer[0];
        assert_eq!(trainer.name, "train_classifier");
        assert_eq!(trainer.options.option.as_deref(), Some("-loss logloss -opt AdaGrad"));
        assert_eq!(config.train_sample_rate, Value::Float(0.8));
        assert_eq!(
            config.evaluator.metrics.to_vec(),
            vec!["auc".to_string(), "logloss".to_string()]
        );
    }

    #[test]
    fn test_column_plan() {
        let config = PipelineConfig::from_yaml(&titanic_yaml(Path::new("queries"))).unwrap();
        let plan = ColumnPlan::from_config(&config).unwrap();

        assert_eq!(plan.columns, vec!["age", "fare", "sex"]);
        assert_eq!(plan.numerical_columns, vec!["age", "fare"]);
        assert_eq!(plan.categorical_columns, vec!["sex"]);
        assert_eq!(plan.imputed_columns, vec!["age", "sex"]);
        assert_eq!(plan.normalized_columns, vec!["age"]);
        assert_eq!(
            plan.imputation_clauses,
            vec![
                "coalesce(age, ${td.last_results.age_median_train}) as age",
                "coalesce(cast(sex as varchar), 'missing') as sex",
            ]
        );
        assert_eq!(
            plan.imputation_clauses_whole[0],
            "coalesce(age, ${td.last_results.age_median}) as age"
        );
    }

    #[test]
    fn test_duplicate_columns_are_rejected() {
        let yaml = titanic_yaml(Path::new("queries")).replace("columns: [sex]", "columns: [age]");
        let config = PipelineConfig::from_yaml(&yaml).unwrap();
        let err = ColumnPlan::from_config(&config).unwrap_err();
        assert!(matches!(err, GenError::Configuration(_)));
    }

    // ========================================================================
    // Pipeline generation
    // ========================================================================

    #[test]
    fn test_dump_titanic_workflow() {
        let dir = tempdir().unwrap();
        let query_dir = dir.path().join("queries");
        let dest = dir.path().join("titanic.dig");
        let config = PipelineConfig::from_yaml(&titanic_yaml(&query_dir)).unwrap();

        let mut pipeline = Pipeline::new(QueryBuilder::with_version("0.2.0"));
        let path = pipeline.dump(&config, Some(&dest), false).unwrap();
        assert_eq!(path, dest);
        assert_eq!(pipeline.workflow_path(), Some(dest.as_path()));

        let expected = "\
_export:
  source: titanic
  train_sample_rate: 0.8
  td:
    database: ml_datasets
    engine: hive
+preparation:
  +shuffle:
    td>: QUERIES/shuffle.sql
    create_table: ${source}_shuffled
  +split:
    _parallel: true
    +train:
      td>: QUERIES/split_train.sql
      engine: presto
      create_table: ${source}_train
    +test:
      td>: QUERIES/split_test.sql
      engine: presto
      create_table: ${source}_test
  +imputation:
    +compute_stats:
      _parallel: true
      +whole:
        td>: QUERIES/stats.sql
        engine: presto
        source: titanic_shuffled
        create_table: titanic_stats
      +train:
        td>: QUERIES/stats.sql
        engine: presto
        source: titanic_train
        create_table: ${source}_stats
      +test:
        td>: QUERIES/stats.sql
        engine: presto
        source: titanic_test
        create_table: ${source}_stats
    +combine_train_test_stats:
      td>: QUERIES/combine_stats.sql
      engine: presto
      source: titanic
      store_last_results: true
    +execute:
      _parallel: true
      +whole:
        td>: QUERIES/impute_whole.sql
        engine: presto
        source: titanic_shuffled
        create_table: titanic_imputed
      +train:
        td>: QUERIES/impute.sql
        engine: presto
        source: titanic_train
        create_table: titanic_imputed_train
      +test:
        td>: QUERIES/impute.sql
        engine: presto
        source: titanic_test
        create_table: titanic_imputed_test
  +normalization:
    +compute_stats:
      _parallel: true
      +whole:
        td>: QUERIES/stats.sql
        engine: presto
        source: titanic_imputed
        create_table: titanic_imputed_stats
      +train:
        td>: QUERIES/stats.sql
        engine: presto
        source: titanic_imputed_train
        create_table: ${source}_stats
      +test:
        td>: QUERIES/stats.sql
        engine: presto
        source: titanic_imputed_test
        create_table: ${source}_stats
    +combine_train_test_stats:
      td>: QUERIES/combine_stats.sql
      engine: presto
      source: titanic_imputed
      store_last_results: true
    +execute:
      _parallel: true
      +whole:
        td>: QUERIES/normalize_whole.sql
        engine: hive
        source: titanic_imputed
        create_table: titanic_norm
      +train:
        td>: QUERIES/normalize.sql
        engine: hive
        source: titanic_imputed_train
        create_table: titanic_norm_train
      +test:
        td>: QUERIES/normalize.sql
        engine: hive
        source: titanic_imputed_test
        create_table: titanic_norm_test
+vectorization:
  _parallel: true
  +whole:
    td>: QUERIES/vectorize.sql
    source: titanic_norm
    create_table: whole
  +train:
    td>: QUERIES/vectorize.sql
    source: titanic_norm_train
    create_table: train
  +test:
    td>: QUERIES/vectorize.sql
    source: titanic_norm_test
    create_table: test
+main:
  +train:
    +train_0:
      td>: QUERIES/train_classifier.sql
      source: train
      create_table: model
  +predict:
    +seq_0:
      +exec_predict:
        td>: QUERIES/predict_classifier.sql
        target_table: test
        create_table: prediction
        model_table: model
      +evaluate:
        td>: QUERIES/evaluate.sql
        actual: test
        predicted_table: prediction
        predicted_column: probability
        store_last_results: true
      +show_accuracy:
        echo>: \"auc: ${td.last_results.auc}\\tlogloss: ${td.last_results.logloss}\"
";
        assert_eq!(read(&dest), with_query_dir(expected, &query_dir));
    }

    #[test]
    fn test_dump_titanic_queries() {
        let dir = tempdir().unwrap();
        let query_dir = dir.path().join("queries");
        let config = PipelineConfig::from_yaml(&titanic_yaml(&query_dir)).unwrap();

        let mut pipeline = Pipeline::new(QueryBuilder::with_version("0.2.0"));
        pipeline.dump(&config, Some(&dir.path().join("titanic.dig")), false).unwrap();

        for name in [
            "shuffle", "split_train", "split_test", "stats", "combine_stats", "impute",
            "impute_whole", "normalize", "normalize_whole", "vectorize", "train_classifier",
            "evaluate", "predict_classifier",
        ] {
            let query = read(query_dir.join(format!("{}.sql", name)));
            assert!(query.starts_with("-- molehill/0.2.0\n"), "{} is not stamped", name);
        }
        assert!(!query_dir.join("downsampling_rate.sql").exists());

        assert_eq!(
            read(query_dir.join("impute.sql")),
            "-- molehill/0.2.0\nselect\n  rowid\n  , survived\n  , coalesce(age, ${td.last_results.age_median_train}) as age\n  , coalesce(cast(sex as varchar), 'missing') as sex\n  , fare\nfrom\n  ${source}\n;\n"
        );

        let normalize_whole = read(query_dir.join("normalize_whole.sql"));
        assert!(normalize_whole.contains("  , zscore(\n    age\n    , ${td.last_results.age_mean}\n"));
        assert!(normalize_whole.contains("  ) as age\n  , fare\n  , sex\nfrom\n"));

        let train = read(query_dir.join("train_classifier.sql"));
        assert!(train.contains("    , survived\n    , '-loss logloss -opt AdaGrad'\n"));
        assert!(train.contains("from\n  ${source}\n"));

        let evaluate = read(query_dir.join("evaluate.sql"));
        assert!(evaluate.contains("  auc(survived, ${predicted_column}) as auc\n"));
        assert!(evaluate.contains("      ${predicted_table} p\n"));
        assert!(evaluate.contains("      ${actual} t on (p.rowid = t.rowid)\n"));
    }

    #[test]
    fn test_dump_multiple_models_with_positive_oversampling() {
        let dir = tempdir().unwrap();
        let query_dir = dir.path().join("queries");
        let dest = dir.path().join("bank.dig");
        let config = PipelineConfig::from_yaml(&bank_yaml(&query_dir)).unwrap();

        Pipeline::default().dump(&config, Some(&dest), false).unwrap();
        let dig = read(&dest);

        assert!(dig.starts_with(
            "_export:\n  source: bank\n  train_sample_rate: 0.75\n  oversample_pos_n_times: 2\n  td:\n"
        ));
        assert!(!dig.contains("+imputation"));
        assert!(!query_dir.join("stats.sql").exists());
        assert!(dig.contains(
            "+vectorization:\n  _parallel: true\n  +whole:\n    td>: QUERIES/vectorize.sql\n    source: bank_shuffled\n"
                .replace("QUERIES", &query_dir.display().to_string())
                .as_str()
        ));

        let expected_main = "\
+main:
  +train:
    _parallel: true
    +train_0:
      td>: QUERIES/train_classifier.sql
      source: train
      create_table: model
    +train_1:
      td>: QUERIES/train_randomforest_classifier.sql
      source: bank_train
      create_table: rf_model
  +compute_downsampling_rate:
    td>: QUERIES/downsampling_rate.sql
    source: train
    target_column: y
    engine: presto
    store_last_results: true
  +predict:
    _parallel: true
    +seq_0:
      +exec_predict:
        td>: QUERIES/predict_classifier.sql
        target_table: test
        create_table: prediction_0
        model_table: model
      +evaluate:
        td>: QUERIES/evaluate.sql
        actual: test
        predicted_table: prediction_0
        predicted_column: probability
        store_last_results: true
      +show_accuracy:
        echo>: 'auc: ${td.last_results.auc}'
    +seq_1:
      +exec_predict:
        td>: QUERIES/predict_randomforest_classifier.sql
        target_table: bank_test
        create_table: prediction_1
        model_table: rf_model
      +evaluate:
        td>: QUERIES/evaluate.sql
        actual: test
        predicted_table: prediction_1
        predicted_column: probability
        store_last_results: true
      +show_accuracy:
        echo>: 'auc: ${td.last_results.auc}'
";
        assert!(dig.ends_with(&with_query_dir(expected_main, &query_dir)));

        // unversioned builder writes bare queries
        assert!(read(query_dir.join("shuffle.sql")).starts_with("select\n  rowid() as id\n"));

        let linear = read(query_dir.join("train_classifier.sql"));
        assert!(linear.contains("amplify(${oversample_pos_n_times}, features, y) as (features, y)"));

        let forest = read(query_dir.join("train_randomforest_classifier.sql"));
        assert!(forest.contains("    array(age, job)\n    , y\n    , '-attrs Q,C'\n"));
        assert!(!forest.contains("amplify"));

        let linear_prediction = read(query_dir.join("predict_classifier.sql"));
        assert!(linear_prediction.contains("${td.last_results.downsampling_rate}"));

        let forest_prediction = read(query_dir.join("predict_randomforest_classifier.sql"));
        assert!(forest_prediction.contains("tree_predict(p.model_id, p.model, array(t.age, t.job), \"-classification\")"));
        assert!(forest_prediction.contains("    ${model_table}\n"));

        assert!(read(query_dir.join("downsampling_rate.sql")).contains("    ${target_column}\n"));
    }

    #[test]
    fn test_guess_attrs_for_sparse_forest() {
        let dir = tempdir().unwrap();
        let query_dir = dir.path().join("queries");
        let yaml = titanic_yaml(&query_dir).replace(
            "  - name: train_classifier\n    option: -loss logloss -opt AdaGrad\n",
            "  - name: train_randomforest_classifier\n    sparse: true\n    guess_attrs: true\n    option: -trees 10\n",
        );
        let config = PipelineConfig::from_yaml(&yaml).unwrap();
        assert!(config.trainer[0].guess_attrs);

        Pipeline::default()
            .dump(&config, Some(&dir.path().join("titanic.dig")), false)
            .unwrap();

        let forest = read(query_dir.join("train_randomforest_classifier.sql"));
        assert!(forest.contains("      features\n      , survived\n      , '-trees 10 -attrs Q,Q,C'\n"));
    }

    #[test]
    fn test_guess_attrs_rejected_for_linear_trainer() {
        let dir = tempdir().unwrap();
        let query_dir = dir.path().join("queries");
        let yaml = titanic_yaml(&query_dir).replace(
            "    option: -loss logloss -opt AdaGrad\n",
            "    option: -loss logloss -opt AdaGrad\n    guess_attrs: true\n",
        );
        let config = PipelineConfig::from_yaml(&yaml).unwrap();

        let err = Pipeline::default()
            .dump(&config, Some(&dir.path().join("titanic.dig")), false)
            .unwrap_err();
        assert!(matches!(err, GenError::Configuration(_)));
        assert!(err.to_string().contains("guess_attrs"));
        assert!(!query_dir.exists());
    }

    // ========================================================================
    // Overwrite and failures
    // ========================================================================

    #[test]
    fn test_existing_workflow_requires_overwrite() {
        let dir = tempdir().unwrap();
        let query_dir = dir.path().join("queries");
        let dest = dir.path().join("titanic.dig");
        fs::write(&dest, "old").unwrap();
        let config = PipelineConfig::from_yaml(&titanic_yaml(&query_dir)).unwrap();

        let err = Pipeline::default().dump(&config, Some(&dest), false).unwrap_err();
        match err {
            GenError::AlreadyExists(path) => assert_eq!(path, dest),
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(read(&dest), "old");
        // queries are written before the workflow file is checked
        assert!(query_dir.join("shuffle.sql").exists());

        Pipeline::default().dump(&config, Some(&dest), true).unwrap();
        assert!(read(&dest).starts_with("_export:\n"));
    }

    #[test]
    fn test_overwrite_clears_query_dir() {
        let dir = tempdir().unwrap();
        let query_dir = dir.path().join("queries");
        fs::create_dir_all(&query_dir).unwrap();
        fs::write(query_dir.join("stale.sql"), "select 1").unwrap();
        let config = PipelineConfig::from_yaml(&titanic_yaml(&query_dir)).unwrap();

        Pipeline::default()
            .dump(&config, Some(&dir.path().join("titanic.dig")), true)
            .unwrap();

        assert!(!query_dir.join("stale.sql").exists());
        assert!(query_dir.join("vectorize.sql").exists());
    }

    #[test]
    fn test_unknown_algorithm_writes_nothing() {
        let dir = tempdir().unwrap();
        let query_dir = dir.path().join("queries");
        let yaml = titanic_yaml(&query_dir).replace("name: train_classifier", "name: train_svm");
        let config = PipelineConfig::from_yaml(&yaml).unwrap();

        let err = Pipeline::default()
            .dump(&config, Some(&dir.path().join("titanic.dig")), false)
            .unwrap_err();
        assert!(matches!(err, GenError::Configuration(_)));
        assert!(!query_dir.exists());
    }

    #[test]
    fn test_unknown_metric_is_rejected() {
        let dir = tempdir().unwrap();
        let yaml = titanic_yaml(&dir.path().join("queries"))
            .replace("metrics: [auc, logloss]", "metrics: [auc, kappa]");
        let config = PipelineConfig::from_yaml(&yaml).unwrap();

        let err = Pipeline::default()
            .dump(&config, Some(&dir.path().join("titanic.dig")), false)
            .unwrap_err();
        assert!(err.to_string().contains("kappa"));
    }

    // ========================================================================
    // CLI entry point
    // ========================================================================

    #[test]
    fn test_execute_generate() {
        let dir = tempdir().unwrap();
        let config_file = dir.path().join("titanic.yml");
        fs::write(&config_file, titanic_yaml(&dir.path().join("queries"))).unwrap();
        let dest = dir.path().join("out.dig");

        let options = GenerateOptions {
            config_file,
            dest: Some(dest.clone()),
            overwrite: false,
            version: Some("0.2.0".to_string()),
        };
        assert_eq!(cli::execute_generate(&options).unwrap(), dest);
        assert!(read(dir.path().join("queries/shuffle.sql")).starts_with("-- molehill/0.2.0\n"));

        let err = cli::execute_generate(&options).unwrap_err();
        assert!(matches!(err, CliError::Generate(GenError::AlreadyExists(_))));
        assert!(err.to_string().contains("--overwrite"));
    }

    #[test]
    fn test_execute_generate_missing_config() {
        let dir = tempdir().unwrap();
        let options = GenerateOptions {
            config_file: dir.path().join("missing.yml"),
            ..Default::default()
        };
        let err = cli::execute_generate(&options).unwrap_err();
        assert!(matches!(err, CliError::MissingConfig(_)));
    }
}
