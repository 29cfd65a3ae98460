//! End-to-end runs through the orchestrator with in-memory collaborators.

use approx::assert_abs_diff_eq;

use boostlab::data::{Cell, Column, Dataset};
use boostlab::pipeline::LogLevel;
use boostlab::store::MemoryStore;
use boostlab::testing::synthetic_mixed_dataset;
use boostlab::training::Metric;
use boostlab::{
    Collaborators, Objective, ParamGrid, PipelineSettings, RunStatus, TrainRequest, TrainingError,
    TrainingOrchestrator,
};

// =============================================================================
// Helpers
// =============================================================================

const DATASET: &str = "mixed.csv";

fn features() -> Vec<String> {
    ["num_a", "num_b", "cat_a", "cat_b"].map(String::from).to_vec()
}

fn request() -> TrainRequest {
    TrainRequest::builder()
        .model_name("mixed")
        .dataset(DATASET)
        .target_column("target")
        .feature_columns(features())
        .param_grid(ParamGrid::new().with_values("max_depth", [3]))
        .build()
}

fn store() -> MemoryStore {
    MemoryStore::new().with_dataset(DATASET, synthetic_mixed_dataset(100, 42))
}

fn orchestrator() -> TrainingOrchestrator {
    // Fewer rounds keep the tests fast; the phase logic is unchanged.
    TrainingOrchestrator::new(PipelineSettings::builder().max_rounds(60).default_rounds(40).build())
}

// =============================================================================
// Successful runs
// =============================================================================

#[test]
fn mixed_dataset_binary_run() {
    let store = store();
    let result = orchestrator()
        .run("r1", &request(), &Collaborators::uniform(&store))
        .unwrap();

    assert_eq!(store.statuses("r1"), RunStatus::SEQUENCE.to_vec());

    let record = store.run("r1").unwrap();
    let preprocessing = record.preprocessing_info.unwrap();
    assert_eq!(preprocessing.feature_names, features());
    assert_eq!(preprocessing.column_types.numeric, vec!["num_a", "num_b"]);
    assert_eq!(preprocessing.column_types.categorical, vec!["cat_a", "cat_b"]);

    let dataset_info = record.dataset_info.unwrap();
    assert_eq!(dataset_info.n_rows, 100);
    assert_eq!(dataset_info.missing_counts["num_b"], 5);
    assert_eq!(dataset_info.target_distribution.values().sum::<usize>(), 100);

    let tuning = record.tuning_info.unwrap();
    assert_eq!(tuning.method, "grid_search");
    assert_eq!(tuning.n_candidates, 1);
    assert_eq!(tuning.metric, Metric::Auc);

    assert_eq!(result.n_train, 80);
    assert_eq!(result.n_test, 20);
    assert!(result.n_rounds >= 1);
    assert_eq!(result.evaluation.metric, Metric::Auc);
    assert!((0.0..=1.0).contains(&result.evaluation.score));
    assert!((0.0..=1.0).contains(&result.cv_score));
    assert!(result.evaluation.metrics.contains_key("logloss"));
    assert!(result.evaluation.metrics.contains_key("accuracy"));
    assert_eq!(result.evaluation.predictions.len(), 20);
    assert!(result.evaluation.predictions.iter().all(|p| (0.0..=1.0).contains(p)));

    let lift = &result.evaluation.lift_chart;
    assert!(!lift.is_empty() && lift.len() <= 10);
    assert_eq!(lift.iter().map(|b| b.count).sum::<usize>(), 20);

    let importance = &result.evaluation.feature_importance;
    assert_eq!(importance.len(), 4);
    assert!(importance.values().all(|v| *v >= 0.0));

    assert_eq!(record.model.as_ref(), Some(&result.model));
    assert_eq!(result.model_path.as_deref(), Some("memory://models/r1"));
    assert_eq!(record.result.as_ref(), Some(&result));
    assert!(record.failure.is_none());
    assert!(record.progress.iter().all(|(level, _)| *level != LogLevel::Error));
    // One candidate is below the reporting interval.
    assert!(!record.progress.iter().any(|(_, message)| message.starts_with("Evaluated")));
}

#[test]
fn runs_are_deterministic() {
    let a = store();
    let b = store();
    let first = orchestrator().run("a", &request(), &Collaborators::uniform(&a)).unwrap();
    let second = orchestrator().run("b", &request(), &Collaborators::uniform(&b)).unwrap();

    assert_eq!(first.best_params, second.best_params);
    assert_eq!(first.n_rounds, second.n_rounds);
    assert_abs_diff_eq!(first.cv_score, second.cv_score);
    assert_eq!(first.evaluation.predictions, second.evaluation.predictions);
    assert_eq!(first.model, second.model);
}

#[test]
fn tuning_off_uses_default_parameters() {
    let store = store();
    let request = TrainRequest {
        tune_parameters: false,
        param_grid: None,
        ..request()
    };
    let result = orchestrator()
        .run("defaults", &request, &Collaborators::uniform(&store))
        .unwrap();

    let tuning = store.run("defaults").unwrap().tuning_info.unwrap();
    assert_eq!(tuning.method, "defaults");
    assert_eq!(tuning.n_candidates, 1);
    assert_eq!(tuning.max_rounds, 40);
    assert_eq!(result.best_params.get("max_depth").and_then(|v| v.as_int()), Some(6));
    assert!(result.n_rounds <= 40);
}

#[test]
fn regression_run_reports_rmse() {
    let store = store();
    let request = TrainRequest {
        objective: Objective::SquaredError,
        target_column: "num_a".into(),
        feature_columns: ["num_b", "cat_a", "cat_b", "target"].map(String::from).to_vec(),
        ..request()
    };
    let result = orchestrator()
        .run("reg", &request, &Collaborators::uniform(&store))
        .unwrap();

    assert_eq!(result.evaluation.metric, Metric::Rmse);
    assert!(result.evaluation.score >= 0.0);
    assert!(result.evaluation.metrics.contains_key("mae"));
    assert!(result.target_encoding.is_none());
    let info = store.run("reg").unwrap().dataset_info.unwrap();
    assert!(info.target_distribution.is_empty());
}

#[test]
fn stored_result_predicts_new_rows() {
    let store = store();
    let result = orchestrator()
        .run("predict", &request(), &Collaborators::uniform(&store))
        .unwrap();

    // Feature columns only, in a different order, with an unseen category.
    let fresh = Dataset::new(vec![
        Column::from_values("cat_b", ["yes", "no", "maybe"]),
        Column::from_values("num_a", [1.2, -0.3, 0.5]),
        Column::new("cat_a", vec![Cell::from("red"), Cell::Missing, Cell::from("purple")]),
        Column::from_values("num_b", [Some(10.0), None, Some(50.0)]),
    ])
    .unwrap();
    let predictions = result.predict(&fresh).unwrap();
    assert_eq!(predictions.len(), 3);
    assert!(predictions.iter().all(|p| (0.0..=1.0).contains(p)));

    let round_tripped: boostlab::TrainingResult =
        serde_json::from_str(&serde_json::to_string(&result).unwrap()).unwrap();
    let again = round_tripped.predict(&fresh).unwrap();
    for (a, b) in again.iter().zip(&predictions) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-6);
    }
}

#[test]
fn store_failures_do_not_abort() {
    let store = store().failing_writes();
    let result = orchestrator()
        .run("flaky", &request(), &Collaborators::uniform(&store))
        .unwrap();

    assert!(result.model_path.is_none());
    let record = store.run("flaky").unwrap();
    assert_eq!(record.statuses, RunStatus::SEQUENCE.to_vec());
    assert!(record.result.is_none());
    let warnings = record
        .progress
        .iter()
        .filter(|(level, _)| *level == LogLevel::Warning)
        .count();
    // dataset, preprocessing, tuning, model and result writes
    assert_eq!(warnings, 5);
}

// =============================================================================
// Failed runs
// =============================================================================

fn assert_failed_in(store: &MemoryStore, run_id: &str, phase: RunStatus) {
    let record = store.run(run_id).unwrap();
    assert_eq!(record.statuses.last(), Some(&RunStatus::Failed));
    let (_, failed_phase) = record.failure.unwrap();
    assert_eq!(failed_phase, phase);
    assert!(record.result.is_none());
    assert!(record.progress.iter().any(|(level, _)| *level == LogLevel::Error));
}

#[test]
fn non_tunable_grid_entry_fails_before_loading() {
    let store = MemoryStore::new();
    let request = TrainRequest {
        param_grid: Some(
            ParamGrid::new()
                .with_values("max_depth", [3])
                .with_values("objective", ["reg:squarederror"]),
        ),
        ..request()
    };
    let err = orchestrator()
        .run("bad-grid", &request, &Collaborators::uniform(&store))
        .unwrap_err();

    let TrainingError::InvalidParameterGrid(problems) = &err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(problems.len(), 1);
    assert!(problems[0].contains("objective"));
    // The dataset was never registered, so reaching the source would have
    // produced DatasetNotFound instead.
    assert_eq!(store.statuses("bad-grid"), vec![RunStatus::LoadingData, RunStatus::Failed]);
    assert_failed_in(&store, "bad-grid", RunStatus::LoadingData);
}

#[test]
fn missing_dataset_fails_in_loading() {
    let store = MemoryStore::new();
    let err = orchestrator()
        .run("nodata", &request(), &Collaborators::uniform(&store))
        .unwrap_err();
    assert_eq!(
        err,
        TrainingError::DatasetNotFound {
            identifier: DATASET.into()
        }
    );
    assert_failed_in(&store, "nodata", RunStatus::LoadingData);
}

#[test]
fn missing_target_column_fails_in_preprocessing() {
    let store = store();
    let request = TrainRequest {
        target_column: "label".into(),
        ..request()
    };
    let err = orchestrator()
        .run("notarget", &request, &Collaborators::uniform(&store))
        .unwrap_err();
    assert_eq!(err, TrainingError::ColumnNotFound { column: "label".into() });
    assert_failed_in(&store, "notarget", RunStatus::Preprocessing);
}

#[test]
fn invalid_request_fails_in_loading() {
    let store = store();
    let request = TrainRequest {
        cv_folds: 1,
        ..request()
    };
    let err = orchestrator()
        .run("folds", &request, &Collaborators::uniform(&store))
        .unwrap_err();
    assert!(matches!(err, TrainingError::InvalidRequest(_)));
    assert!(err.is_validation());
    assert_failed_in(&store, "folds", RunStatus::LoadingData);
}

#[test]
fn singleton_class_fails_in_splitting() {
    let dataset = Dataset::new(vec![
        Column::from_values("x", [0.0, 1.0, 2.0, 3.0, 4.0, 5.0]),
        Column::from_values("y", [0.0, 1.0, 1.0, 1.0, 1.0, 1.0]),
    ])
    .unwrap();
    let store = MemoryStore::new().with_dataset("tiny.csv", dataset);
    let request = TrainRequest::builder()
        .model_name("tiny")
        .dataset("tiny.csv")
        .target_column("y")
        .feature_columns(vec!["x".into()])
        .build();
    let err = orchestrator()
        .run("tiny", &request, &Collaborators::uniform(&store))
        .unwrap_err();
    assert!(matches!(err, TrainingError::InsufficientData(_)));
    assert_failed_in(&store, "tiny", RunStatus::Splitting);
}
