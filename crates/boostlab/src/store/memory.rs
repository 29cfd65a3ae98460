//! In-memory implementation of every collaborator.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::data::Dataset;
use crate::error::TrainingError;
use crate::model::GBDTModel;
use crate::pipeline::{
    DatasetInfo, DatasetSource, LogLevel, ModelSink, PreprocessingInfo, ProgressSink, ResultStore, RunStatus,
    StatusSink, StoreError, StoreResult, TrainingResult, TuningInfo,
};

/// Everything recorded for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunRecord {
    pub statuses: Vec<RunStatus>,
    pub progress: Vec<(LogLevel, String)>,
    pub dataset_info: Option<DatasetInfo>,
    pub preprocessing_info: Option<PreprocessingInfo>,
    pub tuning_info: Option<TuningInfo>,
    pub result: Option<TrainingResult>,
    /// Failure message and the phase it happened in.
    pub failure: Option<(String, RunStatus)>,
    pub model: Option<GBDTModel>,
}

/// Thread-safe in-memory store.
///
/// Serves datasets registered with [`MemoryStore::with_dataset`] and keeps a
/// [`RunRecord`] per run id. With [`MemoryStore::failing_writes`] every
/// result-store and model-sink write fails, while statuses and progress are
/// still recorded.
#[derive(Debug, Default)]
pub struct MemoryStore {
    datasets: Mutex<BTreeMap<String, Dataset>>,
    runs: Mutex<BTreeMap<String, RunRecord>>,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dataset(self, identifier: impl Into<String>, dataset: Dataset) -> Self {
        self.insert_dataset(identifier, dataset);
        self
    }

    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub fn insert_dataset(&self, identifier: impl Into<String>, dataset: Dataset) {
        lock(&self.datasets).insert(identifier.into(), dataset);
    }

    /// Snapshot of a run's record.
    pub fn run(&self, run_id: &str) -> Option<RunRecord> {
        lock(&self.runs).get(run_id).cloned()
    }

    pub fn statuses(&self, run_id: &str) -> Vec<RunStatus> {
        self.run(run_id).map(|r| r.statuses).unwrap_or_default()
    }

    fn update(&self, run_id: &str, f: impl FnOnce(&mut RunRecord)) {
        f(lock(&self.runs).entry(run_id.to_string()).or_default());
    }

    fn write(&self, run_id: &str, f: impl FnOnce(&mut RunRecord)) -> StoreResult<()> {
        if self.fail_writes {
            return Err(StoreError::Unavailable("writes disabled".into()));
        }
        self.update(run_id, f);
        Ok(())
    }
}

/// Recover the data from a poisoned lock; records are plain values.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl DatasetSource for MemoryStore {
    fn read(&self, identifier: &str) -> Result<Dataset, TrainingError> {
        lock(&self.datasets)
            .get(identifier)
            .cloned()
            .ok_or_else(|| TrainingError::DatasetNotFound {
                identifier: identifier.to_string(),
            })
    }
}

impl StatusSink for MemoryStore {
    fn set_status(&self, run_id: &str, status: RunStatus) -> StoreResult<()> {
        self.update(run_id, |r| r.statuses.push(status));
        Ok(())
    }
}

impl ProgressSink for MemoryStore {
    fn log_progress(&self, run_id: &str, message: &str, level: LogLevel) {
        self.update(run_id, |r| r.progress.push((level, message.to_string())));
    }
}

impl ResultStore for MemoryStore {
    fn save_dataset_info(&self, run_id: &str, info: &DatasetInfo) -> StoreResult<()> {
        self.write(run_id, |r| r.dataset_info = Some(info.clone()))
    }

    fn save_preprocessing_info(&self, run_id: &str, info: &PreprocessingInfo) -> StoreResult<()> {
        self.write(run_id, |r| r.preprocessing_info = Some(info.clone()))
    }

    fn save_tuning_info(&self, run_id: &str, info: &TuningInfo) -> StoreResult<()> {
        self.write(run_id, |r| r.tuning_info = Some(info.clone()))
    }

    fn save_result(&self, run_id: &str, result: &TrainingResult) -> StoreResult<()> {
        self.write(run_id, |r| r.result = Some(result.clone()))
    }

    fn mark_failed(&self, run_id: &str, message: &str, phase: RunStatus) -> StoreResult<()> {
        self.write(run_id, |r| r.failure = Some((message.to_string(), phase)))
    }
}

impl ModelSink for MemoryStore {
    fn write_model(&self, run_id: &str, model: &GBDTModel) -> StoreResult<String> {
        self.write(run_id, |r| r.model = Some(model.clone()))?;
        Ok(format!("memory://models/{run_id}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::synthetic_mixed_dataset;

    #[test]
    fn serves_registered_datasets() {
        let store = MemoryStore::new().with_dataset("a.csv", synthetic_mixed_dataset(10, 1));
        assert_eq!(store.read("a.csv").unwrap().n_rows(), 10);
        assert_eq!(
            store.read("b.csv").unwrap_err(),
            TrainingError::DatasetNotFound {
                identifier: "b.csv".into()
            }
        );
    }

    #[test]
    fn records_per_run() {
        let store = MemoryStore::new();
        store.set_status("r1", RunStatus::LoadingData).unwrap();
        store.log_progress("r1", "hello", LogLevel::Info);
        store.mark_failed("r1", "boom", RunStatus::LoadingData).unwrap();
        let record = store.run("r1").unwrap();
        assert_eq!(record.statuses, vec![RunStatus::LoadingData]);
        assert_eq!(record.progress, vec![(LogLevel::Info, "hello".to_string())]);
        assert_eq!(record.failure, Some(("boom".into(), RunStatus::LoadingData)));
        assert!(store.run("r2").is_none());
    }

    #[test]
    fn failing_writes_keep_statuses() {
        let store = MemoryStore::new().failing_writes();
        assert!(store.mark_failed("r", "x", RunStatus::Tuning).is_err());
        store.set_status("r", RunStatus::LoadingData).unwrap();
        assert_eq!(store.statuses("r"), vec![RunStatus::LoadingData]);
        assert!(store.run("r").unwrap().failure.is_none());
    }
}
