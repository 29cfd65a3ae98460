//! Filesystem-backed collaborators.
//!
//! Layout under a root directory:
//!
//! ```text
//! uploads/<dataset>.csv     CsvDirectorySource
//! runs/<run_id>.json        JsonFileStore (one document per run)
//! models/<run_id>.json      FileModelSink
//! logs/<run_id>.jsonl       JsonLinesProgressLog
//! ```

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::data::{CsvOptions, Dataset, read_csv};
use crate::error::TrainingError;
use crate::model::{GBDTModel, PersistError};
use crate::pipeline::{
    DatasetInfo, DatasetSource, LogLevel, ModelSink, PreprocessingInfo, ProgressSink, ResultStore, RunStatus,
    StatusSink, StoreError, StoreResult, TrainingResult, TuningInfo,
};

/// A single plain file name: no separators, no `.`/`..`, not absolute.
fn is_plain_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(components.next(), Some(Component::Normal(_))) && components.next().is_none()
}

fn run_file(dir: &Path, run_id: &str, extension: &str) -> StoreResult<PathBuf> {
    if !is_plain_name(run_id) {
        return Err(StoreError::Unavailable(format!("invalid run id '{run_id}'")));
    }
    Ok(dir.join(format!("{run_id}.{extension}")))
}

// =============================================================================
// Dataset source
// =============================================================================

/// Reads `<root>/<identifier>` as CSV. Identifiers must be plain file names.
#[derive(Debug, Clone)]
pub struct CsvDirectorySource {
    root: PathBuf,
    options: CsvOptions,
}

impl CsvDirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            options: CsvOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CsvOptions) -> Self {
        self.options = options;
        self
    }
}

impl DatasetSource for CsvDirectorySource {
    fn read(&self, identifier: &str) -> Result<Dataset, TrainingError> {
        let not_found = || TrainingError::DatasetNotFound {
            identifier: identifier.to_string(),
        };
        if !is_plain_name(identifier) {
            tracing::warn!(identifier, "rejected dataset identifier outside the upload directory");
            return Err(not_found());
        }
        let path = self.root.join(identifier);
        if !path.is_file() {
            return Err(not_found());
        }
        let dataset = read_csv(&path, &self.options)?;
        tracing::debug!(path = %path.display(), rows = dataset.n_rows(), "dataset loaded");
        Ok(dataset)
    }
}

// =============================================================================
// Run documents
// =============================================================================

/// One JSON document per run; each call upserts one section.
///
/// Writes go through a temporary file and a rename, serialized by a process
/// local lock.
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The whole document of a run, if it exists.
    pub fn load(&self, run_id: &str) -> StoreResult<Option<Value>> {
        let path = run_file(&self.dir, run_id, "json")?;
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&fs::read_to_string(path)?)?))
    }

    fn upsert(&self, run_id: &str, sections: Vec<(&str, Value)>) -> StoreResult<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let path = run_file(&self.dir, run_id, "json")?;
        let mut document = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<Value>(&text)? {
                Value::Object(map) => map,
                _ => Map::new(),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(e.into()),
        };
        document.insert("run_id".into(), Value::from(run_id));
        for (key, value) in sections {
            document.insert(key.to_string(), value);
        }
        document.insert("updated_at".into(), Value::from(Utc::now().to_rfc3339()));

        fs::create_dir_all(&self.dir)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&Value::Object(document))?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn upsert_section(&self, run_id: &str, key: &str, value: &impl Serialize) -> StoreResult<()> {
        self.upsert(run_id, vec![(key, serde_json::to_value(value)?)])
    }
}

impl StatusSink for JsonFileStore {
    fn set_status(&self, run_id: &str, status: RunStatus) -> StoreResult<()> {
        self.upsert_section(run_id, "status", &status)
    }
}

impl ResultStore for JsonFileStore {
    fn save_dataset_info(&self, run_id: &str, info: &DatasetInfo) -> StoreResult<()> {
        self.upsert_section(run_id, "dataset_info", info)
    }

    fn save_preprocessing_info(&self, run_id: &str, info: &PreprocessingInfo) -> StoreResult<()> {
        self.upsert_section(run_id, "preprocessing_info", info)
    }

    fn save_tuning_info(&self, run_id: &str, info: &TuningInfo) -> StoreResult<()> {
        self.upsert_section(run_id, "tuning_info", info)
    }

    fn save_result(&self, run_id: &str, result: &TrainingResult) -> StoreResult<()> {
        self.upsert_section(run_id, "result", result)
    }

    fn mark_failed(&self, run_id: &str, message: &str, phase: RunStatus) -> StoreResult<()> {
        self.upsert(
            run_id,
            vec![
                ("status", serde_json::to_value(RunStatus::Failed)?),
                ("error", json!({ "message": message, "phase": phase })),
            ],
        )
    }
}

// =============================================================================
// Models
// =============================================================================

/// Writes `<dir>/<run_id>.json` model files.
#[derive(Debug, Clone)]
pub struct FileModelSink {
    dir: PathBuf,
}

impl FileModelSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl From<PersistError> for StoreError {
    fn from(e: PersistError) -> Self {
        match e {
            PersistError::Io(io) => StoreError::Io(io),
            other => StoreError::Serialization(other.to_string()),
        }
    }
}

impl ModelSink for FileModelSink {
    fn write_model(&self, run_id: &str, model: &GBDTModel) -> StoreResult<String> {
        let path = run_file(&self.dir, run_id, "json")?;
        model.save(&path)?;
        Ok(path.display().to_string())
    }
}

// =============================================================================
// Progress
// =============================================================================

/// Appends progress as JSON lines to `<dir>/<run_id>.jsonl`.
#[derive(Debug, Clone)]
pub struct JsonLinesProgressLog {
    dir: PathBuf,
}

impl JsonLinesProgressLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn append(&self, run_id: &str, message: &str, level: LogLevel) -> StoreResult<()> {
        let path = run_file(&self.dir, run_id, "jsonl")?;
        fs::create_dir_all(&self.dir)?;
        let line = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "message": message,
        });
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

impl ProgressSink for JsonLinesProgressLog {
    fn log_progress(&self, run_id: &str, message: &str, level: LogLevel) {
        if let Err(e) = self.append(run_id, message, level) {
            tracing::warn!(run_id, error = %e, "cannot append progress log");
        }
    }
}

/// Forwards progress to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgressSink;

impl ProgressSink for TracingProgressSink {
    fn log_progress(&self, run_id: &str, message: &str, level: LogLevel) {
        match level {
            LogLevel::Debug => tracing::debug!(run_id, "{message}"),
            LogLevel::Info => tracing::info!(run_id, "{message}"),
            LogLevel::Warning => tracing::warn!(run_id, "{message}"),
            LogLevel::Error => tracing::error!(run_id, "{message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_names_only() {
        assert!(is_plain_name("data.csv"));
        assert!(!is_plain_name("../secret.csv"));
        assert!(!is_plain_name("/etc/passwd"));
        assert!(!is_plain_name("a/b.csv"));
        assert!(!is_plain_name(""));
        assert!(!is_plain_name("."));
    }

    #[test]
    fn source_rejects_traversal_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ok.csv"), "a,b\n1,x\n").unwrap();
        let source = CsvDirectorySource::new(dir.path());
        assert_eq!(source.read("ok.csv").unwrap().n_rows(), 1);
        for bad in ["../ok.csv", "missing.csv"] {
            assert!(matches!(
                source.read(bad),
                Err(TrainingError::DatasetNotFound { .. })
            ));
        }
    }

    #[test]
    fn sections_are_upserted() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("runs"));
        store.set_status("r1", RunStatus::LoadingData).unwrap();
        store.set_status("r1", RunStatus::Preprocessing).unwrap();
        store.mark_failed("r1", "boom", RunStatus::Preprocessing).unwrap();
        let doc = store.load("r1").unwrap().unwrap();
        assert_eq!(doc["status"], "failed");
        assert_eq!(doc["error"]["phase"], "preprocessing");
        assert_eq!(doc["error"]["message"], "boom");
        assert!(doc["updated_at"].is_string());
        assert!(store.load("r2").unwrap().is_none());
        assert!(store.set_status("../r", RunStatus::LoadingData).is_err());
    }

    #[test]
    fn progress_lines_append() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonLinesProgressLog::new(dir.path());
        log.log_progress("r", "one", LogLevel::Info);
        log.log_progress("r", "two", LogLevel::Warning);
        let text = fs::read_to_string(dir.path().join("r.jsonl")).unwrap();
        let lines: Vec<Value> = text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["level"], "warning");
        assert_eq!(lines[0]["message"], "one");
    }
}
