use crate::domain::ensemble::performance::PerformanceHistory;
use crate::domain::ensemble::weights::ModelWeights;
use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// JSON-backed model weights.
///
/// Two file shapes are accepted:
/// - nested tuner output: `{"accuracies": {...}, "weights": {...}}`
/// - flat map: `{"ARIMA": 1.2, "GARCH": 0.8}`
///
/// A missing or unreadable file yields default weights; readers only ever see
/// the immutable snapshot taken at load time.
pub struct WeightStore {
    file_path: PathBuf,
    history: PerformanceHistory,
    snapshot: Arc<ModelWeights>,
}

impl WeightStore {
    /// Open the store and read the file, falling back to defaults on any problem
    pub fn load(file_path: impl Into<PathBuf>) -> Self {
        let mut store = Self {
            file_path: file_path.into(),
            history: PerformanceHistory::default(),
            snapshot: Arc::new(ModelWeights::default()),
        };
        store.reload();
        store
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    pub fn history(&self) -> &PerformanceHistory {
        &self.history
    }

    /// Current weights, shared read-only
    pub fn snapshot(&self) -> Arc<ModelWeights> {
        Arc::clone(&self.snapshot)
    }

    /// Re-read the file and swap in a fresh snapshot. Earlier snapshots stay valid.
    pub fn reload(&mut self) -> Arc<ModelWeights> {
        self.history = match Self::read_history(&self.file_path) {
            Ok(Some(history)) => {
                info!(
                    "Loaded weights for {} models from {:?}",
                    history.weights.len(),
                    self.file_path
                );
                history
            }
            Ok(None) => {
                info!("No weight file at {:?}, using default weights", self.file_path);
                PerformanceHistory::default()
            }
            Err(e) => {
                warn!("{:#}. Using default weights", e);
                PerformanceHistory::default()
            }
        };
        self.snapshot = Arc::new(self.history.model_weights());
        self.snapshot()
    }

    /// Strict read: `Ok(None)` when the file does not exist
    pub fn read_history(path: &Path) -> Result<Option<PerformanceHistory>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)
            .context(format!("Failed to read weight file {:?}", path))?;
        let history =
            parse_weight_file(&content).context(format!("Failed to parse weight file {:?}", path))?;
        Ok(Some(history))
    }

    /// Persist the history (atomically) and refresh the snapshot
    pub fn save(&mut self, history: &PerformanceHistory) -> Result<()> {
        if let Some(parent) = self.file_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).context("Failed to create weight file directory")?;
        }

        let content =
            serde_json::to_string_pretty(history).context("Failed to serialize weights")?;

        // Atomic write: write to temp file then rename
        let temp_path = self.file_path.with_extension("tmp");
        fs::write(&temp_path, content).context("Failed to write temp weight file")?;
        fs::rename(&temp_path, &self.file_path).context("Failed to rename weight file")?;

        self.history = history.clone();
        self.snapshot = Arc::new(history.model_weights());
        info!("Saved weights to {:?}", self.file_path);
        Ok(())
    }
}

fn parse_weight_file(content: &str) -> Result<PerformanceHistory> {
    let value: Value = serde_json::from_str(content).context("Invalid JSON")?;
    let object = value
        .as_object()
        .context("Weight file must contain a JSON object")?;

    if object.contains_key("weights") || object.contains_key("accuracies") {
        return serde_json::from_value(value).context("Invalid nested weight file");
    }

    let flat: HashMap<String, f64> =
        serde_json::from_value(value).context("Flat weight file values must be numbers")?;
    Ok(PerformanceHistory {
        accuracies: BTreeMap::new(),
        weights: flat.into_iter().collect(),
    })
}
