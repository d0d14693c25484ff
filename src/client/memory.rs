//! In-memory tracking client using `DashMap`.
//!
//! Data is lost when the client is dropped. Used by tests, demos and the
//! `memory:` tracking URI.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{latest_metrics, validate_batch, TrackingClient};
use crate::artifacts::{local_path, normalize_artifact_path, read_tree, write_tree};
use crate::experiment::{
    Experiment, Metric, Param, Run, RunData, RunInfo, RunStatus, RunTag, UNKNOWN_USER,
};
use crate::{Error, Result};

/// Name and id of the experiment every store starts with.
pub const DEFAULT_EXPERIMENT_NAME: &str = "Default";
const DEFAULT_EXPERIMENT_ID: &str = "0";

#[derive(Debug)]
struct StoredRun {
    seq: u64,
    info: RunInfo,
    params: BTreeMap<String, String>,
    metrics: BTreeMap<String, Vec<Metric>>,
    tags: BTreeMap<String, String>,
    artifacts: BTreeMap<String, Vec<u8>>,
}

impl StoredRun {
    fn to_run(&self) -> Run {
        Run::new(
            self.info.clone(),
            RunData {
                params: self.params.clone(),
                metrics: latest_metrics(self.metrics.values()),
                tags: self.tags.clone(),
            },
        )
    }
}

/// In-memory tracking store.
///
/// Thread-safe; every method takes `&self`. Keeps the full metric history
/// per key while `get_run` exposes only the latest point.
#[derive(Debug)]
pub struct MemoryTrackingClient {
    uri: String,
    experiments: DashMap<String, Experiment>,
    experiment_names: DashMap<String, String>,
    runs: DashMap<String, StoredRun>,
    next_experiment_id: AtomicU64,
    next_seq: AtomicU64,
}

impl MemoryTrackingClient {
    /// Create a store holding only the default experiment.
    #[must_use]
    pub fn new() -> Self {
        Self::with_uri("memory:")
    }

    /// Create a store that reports `uri` as its location.
    #[must_use]
    pub fn with_uri(uri: impl Into<String>) -> Self {
        let client = Self {
            uri: uri.into(),
            experiments: DashMap::new(),
            experiment_names: DashMap::new(),
            runs: DashMap::new(),
            next_experiment_id: AtomicU64::new(1),
            next_seq: AtomicU64::new(0),
        };
        client.experiments.insert(
            DEFAULT_EXPERIMENT_ID.to_string(),
            Experiment::new(DEFAULT_EXPERIMENT_ID, DEFAULT_EXPERIMENT_NAME),
        );
        client
            .experiment_names
            .insert(DEFAULT_EXPERIMENT_NAME.to_string(), DEFAULT_EXPERIMENT_ID.to_string());
        client
    }

    /// Get the number of experiments, including the default one.
    #[must_use]
    pub fn experiment_count(&self) -> usize {
        self.experiments.len()
    }

    /// Get the number of runs across all experiments.
    #[must_use]
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Create a run attributed to `user_id`.
    ///
    /// Stands in for clients that record the calling user at creation time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExperimentNotFound`] if the experiment does not exist
    pub fn create_run_for_user(&self, experiment_id: &str, user_id: &str) -> Result<Run> {
        if !self.experiments.contains_key(experiment_id) {
            return Err(Error::ExperimentNotFound(experiment_id.to_string()));
        }
        let run_id = uuid::Uuid::new_v4().simple().to_string();
        let info = RunInfo::new(run_id.clone(), experiment_id)
            .with_user_id(user_id)
            .with_artifact_uri(format!("{}/{experiment_id}/{run_id}/artifacts", self.uri));
        let stored = StoredRun {
            seq: self.next_seq.fetch_add(1, Ordering::SeqCst),
            info,
            params: BTreeMap::new(),
            metrics: BTreeMap::new(),
            tags: BTreeMap::new(),
            artifacts: BTreeMap::new(),
        };
        let run = stored.to_run();
        self.runs.insert(run_id, stored);
        Ok(run)
    }

    /// Full history of one metric, ordered by step.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RunNotFound`] if the run does not exist
    pub fn metric_history(&self, run_id: &str, key: &str) -> Result<Vec<Metric>> {
        let run = self
            .runs
            .get(run_id)
            .ok_or_else(|| Error::RunNotFound(run_id.to_string()))?;
        let mut points = run.metrics.get(key).cloned().unwrap_or_default();
        points.sort_by_key(Metric::step);
        Ok(points)
    }

    /// Artifact tree of a run, keyed by relative path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RunNotFound`] if the run does not exist
    pub fn artifact_tree(&self, run_id: &str) -> Result<BTreeMap<String, Vec<u8>>> {
        self.runs
            .get(run_id)
            .map(|run| run.artifacts.clone())
            .ok_or_else(|| Error::RunNotFound(run_id.to_string()))
    }
}

impl Default for MemoryTrackingClient {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackingClient for MemoryTrackingClient {
    fn tracking_uri(&self) -> String {
        self.uri.clone()
    }

    fn get_run(&self, run_id: &str) -> Result<Run> {
        self.runs
            .get(run_id)
            .map(|run| run.to_run())
            .ok_or_else(|| Error::RunNotFound(run_id.to_string()))
    }

    fn create_run(&self, experiment_id: &str) -> Result<Run> {
        self.create_run_for_user(experiment_id, UNKNOWN_USER)
    }

    fn log_batch(
        &self,
        run_id: &str,
        metrics: &[Metric],
        params: &[Param],
        tags: &[RunTag],
    ) -> Result<()> {
        let mut run = self
            .runs
            .get_mut(run_id)
            .ok_or_else(|| Error::RunNotFound(run_id.to_string()))?;
        validate_batch(run_id, &run.params, metrics, params, tags)?;

        for param in params {
            run.params.insert(param.key.clone(), param.value.clone());
        }
        for metric in metrics {
            run.metrics
                .entry(metric.key().to_string())
                .or_default()
                .push(metric.clone());
        }
        for tag in tags {
            run.tags.insert(tag.key.clone(), tag.value.clone());
        }
        Ok(())
    }

    fn set_terminated(&self, run_id: &str, status: RunStatus) -> Result<()> {
        let mut run = self
            .runs
            .get_mut(run_id)
            .ok_or_else(|| Error::RunNotFound(run_id.to_string()))?;
        run.info.terminate(status);
        Ok(())
    }

    fn download_artifacts(&self, run_id: &str, path: &str, dst_dir: &Path) -> Result<PathBuf> {
        let prefix = normalize_artifact_path(path)?;
        let run = self
            .runs
            .get(run_id)
            .ok_or_else(|| Error::RunNotFound(run_id.to_string()))?;
        let selected: Vec<_> = run
            .artifacts
            .iter()
            .filter(|(key, _)| {
                prefix.is_empty() || **key == prefix || key.starts_with(&format!("{prefix}/"))
            })
            .collect();
        if selected.is_empty() && !prefix.is_empty() {
            return Err(Error::InvalidInput(format!(
                "no artifacts at '{prefix}' for run {run_id}"
            )));
        }
        write_tree(dst_dir, selected)?;
        Ok(local_path(dst_dir, &prefix))
    }

    fn log_artifacts(&self, run_id: &str, local_dir: &Path) -> Result<()> {
        if !local_dir.is_dir() {
            return Err(Error::InvalidInput(format!(
                "artifact source is not a directory: {}",
                local_dir.display()
            )));
        }
        let files = read_tree(local_dir)?;
        let mut run = self
            .runs
            .get_mut(run_id)
            .ok_or_else(|| Error::RunNotFound(run_id.to_string()))?;
        run.artifacts.extend(files);
        Ok(())
    }

    fn get_experiment(&self, experiment_id: &str) -> Result<Experiment> {
        self.experiments
            .get(experiment_id)
            .map(|e| e.value().clone())
            .ok_or_else(|| Error::ExperimentNotFound(experiment_id.to_string()))
    }

    fn get_experiment_by_name(&self, name: &str) -> Result<Option<Experiment>> {
        let Some(id) = self.experiment_names.get(name).map(|id| id.value().clone()) else {
            return Ok(None);
        };
        Ok(self.experiments.get(&id).map(|e| e.value().clone()))
    }

    fn create_experiment(&self, name: &str) -> Result<Experiment> {
        if name.trim().is_empty() {
            return Err(Error::InvalidInput("experiment name must not be empty".to_string()));
        }
        match self.experiment_names.entry(name.to_string()) {
            Entry::Occupied(_) => Err(Error::ExperimentExists(name.to_string())),
            Entry::Vacant(slot) => {
                let id = self.next_experiment_id.fetch_add(1, Ordering::SeqCst).to_string();
                let experiment = Experiment::new(id.clone(), name)
                    .with_artifact_location(format!("{}/{id}", self.uri));
                self.experiments.insert(id.clone(), experiment.clone());
                slot.insert(id);
                Ok(experiment)
            }
        }
    }

    fn list_run_infos(&self, experiment_id: &str) -> Result<Vec<RunInfo>> {
        if !self.experiments.contains_key(experiment_id) {
            return Err(Error::ExperimentNotFound(experiment_id.to_string()));
        }
        let mut infos: Vec<(u64, RunInfo)> = self
            .runs
            .iter()
            .filter(|run| run.info.experiment_id() == experiment_id)
            .map(|run| (run.seq, run.info.clone()))
            .collect();
        infos.sort_by_key(|(seq, _)| *seq);
        Ok(infos.into_iter().map(|(_, info)| info).collect())
    }
}
