//! Tracking-service clients
//!
//! The copy engine talks to tracking stores only through [`TrackingClient`].
//! Source and destination are separate client values passed into each
//! copier, never process-wide handles.
//!
//! # Example
//!
//! ```rust
//! use trueno_migrate::client::{MemoryTrackingClient, TrackingClient};
//! use trueno_migrate::experiment::{Param, RunStatus};
//!
//! # fn example() -> trueno_migrate::Result<()> {
//! let client = MemoryTrackingClient::new();
//! let experiment = client.create_experiment("demo")?;
//! let run = client.create_run(experiment.experiment_id())?;
//!
//! client.log_batch(run.run_id(), &[], &[Param::new("lr", "0.1")], &[])?;
//! client.set_terminated(run.run_id(), RunStatus::Finished)?;
//!
//! let run = client.get_run(run.run_id())?;
//! assert_eq!(run.data().params()["lr"], "0.1");
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

mod file;
mod memory;

pub use file::FileTrackingClient;
pub(crate) use file::{read_json, write_json};
pub use memory::MemoryTrackingClient;

use std::path::{Path, PathBuf};

use crate::experiment::{Experiment, Metric, Param, Run, RunInfo, RunStatus, RunTag};
use crate::{Error, Result};

/// Operations the copy engine needs from a tracking service.
///
/// Calls block until the store answers. Timeouts and retries, if any, belong
/// to the implementation.
pub trait TrackingClient: Send + Sync {
    /// Location of the store, recorded in provenance tags.
    fn tracking_uri(&self) -> String;

    /// Read a run with params, latest metrics and tags.
    ///
    /// Fails with [`Error::RunNotFound`] for unknown ids.
    fn get_run(&self, run_id: &str) -> Result<Run>;

    /// Create an empty run owned by the unknown user.
    ///
    /// Fails with [`Error::ExperimentNotFound`] for unknown experiments.
    fn create_run(&self, experiment_id: &str) -> Result<Run>;

    /// Write metrics, params and tags in one batch.
    ///
    /// The batch is validated before anything is applied.
    fn log_batch(
        &self,
        run_id: &str,
        metrics: &[Metric],
        params: &[Param],
        tags: &[RunTag],
    ) -> Result<()>;

    /// Set a single tag, overwriting any previous value.
    fn set_tag(&self, run_id: &str, key: &str, value: &str) -> Result<()> {
        self.log_batch(run_id, &[], &[], &[RunTag::new(key, value)])
    }

    /// Move a run to `status`.
    fn set_terminated(&self, run_id: &str, status: RunStatus) -> Result<()>;

    /// Materialize the artifacts under `path` (empty for the whole tree)
    /// inside `dst_dir`, returning the local directory holding them.
    fn download_artifacts(&self, run_id: &str, path: &str, dst_dir: &Path) -> Result<PathBuf>;

    /// Upload the tree under `local_dir` as the run's artifacts.
    fn log_artifacts(&self, run_id: &str, local_dir: &Path) -> Result<()>;

    /// Read an experiment by id.
    fn get_experiment(&self, experiment_id: &str) -> Result<Experiment>;

    /// Look up an experiment by name.
    ///
    /// Fails with [`Error::AmbiguousExperiment`] if several experiments match.
    fn get_experiment_by_name(&self, name: &str) -> Result<Option<Experiment>>;

    /// Create an experiment. Fails if the name is taken.
    fn create_experiment(&self, name: &str) -> Result<Experiment>;

    /// Runs of an experiment, in a stable store order.
    fn list_run_infos(&self, experiment_id: &str) -> Result<Vec<RunInfo>>;
}

/// Open a client for a tracking URI.
///
/// - `memory:` opens an empty in-process store
/// - `file:///path` or a bare path opens a directory store, creating it if needed
///
/// # Errors
///
/// Returns [`Error::UnsupportedTrackingUri`] for other schemes, or an IO error
/// if the directory store cannot be created
pub fn from_uri(uri: &str) -> Result<Box<dyn TrackingClient>> {
    if uri == "memory:" || uri.starts_with("memory://") {
        return Ok(Box::new(MemoryTrackingClient::with_uri(uri)));
    }
    if let Some(path) = uri.strip_prefix("file://") {
        return Ok(Box::new(FileTrackingClient::open(path)?));
    }
    if uri.contains("://") || uri.is_empty() {
        return Err(Error::UnsupportedTrackingUri(uri.to_string()));
    }
    Ok(Box::new(FileTrackingClient::open(uri)?))
}

/// Whether `id` can name a single directory entry.
///
/// Rejects empty ids and anything with a separator or dot, so joining the id
/// onto a directory never leaves that directory.
pub(crate) fn is_path_safe_id(id: &str) -> bool {
    !id.is_empty() && !id.contains(['/', '\\', '.'])
}

/// Pick the latest point per key from a metric history.
pub(crate) fn latest_metrics<'a, I>(history: I) -> std::collections::BTreeMap<String, Metric>
where
    I: IntoIterator<Item = &'a Vec<Metric>>,
{
    history
        .into_iter()
        .filter_map(|points| {
            points
                .iter()
                .reduce(|latest, point| if point.is_newer_than(latest) { point } else { latest })
                .map(|latest| (latest.key().to_string(), latest.clone()))
        })
        .collect()
}

/// Reject batches a tracking store would refuse, before applying any entry.
pub(crate) fn validate_batch(
    run_id: &str,
    existing_params: &std::collections::BTreeMap<String, String>,
    metrics: &[Metric],
    params: &[Param],
    tags: &[RunTag],
) -> Result<()> {
    let keys = metrics
        .iter()
        .map(Metric::key)
        .chain(params.iter().map(|p| p.key.as_str()))
        .chain(tags.iter().map(|t| t.key.as_str()));
    for key in keys {
        if key.trim().is_empty() {
            return Err(Error::destination_write(run_id, "empty key in batch"));
        }
    }
    for param in params {
        if let Some(old) = existing_params.get(&param.key) {
            if *old != param.value {
                return Err(Error::destination_write(
                    run_id,
                    format!(
                        "changing param values is not allowed: '{}' is '{old}', got '{}'",
                        param.key, param.value
                    ),
                ));
            }
        }
    }
    Ok(())
}
