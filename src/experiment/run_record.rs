//! Run Record - one recorded execution with params, metrics and tags

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Metric;
use crate::{Error, Result};

/// Owner assigned by a tracking store when the creator is not known.
pub const UNKNOWN_USER: &str = "unknown";

/// Status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    /// Run is currently executing.
    Running,
    /// Run is queued but not yet started.
    Scheduled,
    /// Run completed successfully.
    Finished,
    /// Run failed with an error.
    Failed,
    /// Run was killed by user or system.
    Killed,
}

impl RunStatus {
    /// Wire name of the status (`"FINISHED"`, ...).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Scheduled => "SCHEDULED",
            Self::Finished => "FINISHED",
            Self::Failed => "FAILED",
            Self::Killed => "KILLED",
        }
    }

    /// Whether the status ends a run's lifecycle.
    #[must_use]
    pub const fn is_terminated(self) -> bool {
        matches!(self, Self::Finished | Self::Failed | Self::Killed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "RUNNING" => Ok(Self::Running),
            "SCHEDULED" => Ok(Self::Scheduled),
            "FINISHED" => Ok(Self::Finished),
            "FAILED" => Ok(Self::Failed),
            "KILLED" => Ok(Self::Killed),
            _ => Err(Error::InvalidInput(format!("unknown run status '{s}'"))),
        }
    }
}

/// Whether an entity is live or soft-deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleStage {
    /// Visible entity.
    #[default]
    Active,
    /// Soft-deleted entity.
    Deleted,
}

impl LifecycleStage {
    /// Wire name of the stage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A run parameter. Immutable once logged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    /// Parameter name
    pub key: String,
    /// Parameter value
    pub value: String,
}

impl Param {
    /// Create a parameter.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A mutable string annotation on a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTag {
    /// Tag name
    pub key: String,
    /// Tag value
    pub value: String,
}

impl RunTag {
    /// Create a tag.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Identity and lifecycle of a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunInfo {
    pub(crate) run_id: String,
    pub(crate) experiment_id: String,
    pub(crate) user_id: String,
    pub(crate) status: RunStatus,
    pub(crate) lifecycle_stage: LifecycleStage,
    pub(crate) start_time: DateTime<Utc>,
    pub(crate) end_time: Option<DateTime<Utc>>,
    pub(crate) artifact_uri: Option<String>,
}

impl RunInfo {
    /// Create a freshly started run owned by [`UNKNOWN_USER`].
    #[must_use]
    pub fn new(run_id: impl Into<String>, experiment_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            experiment_id: experiment_id.into(),
            user_id: UNKNOWN_USER.to_string(),
            status: RunStatus::Running,
            lifecycle_stage: LifecycleStage::Active,
            start_time: Utc::now(),
            end_time: None,
            artifact_uri: None,
        }
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the parent experiment ID.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Get the owning user.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Get the current run status.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        self.status
    }

    /// Get the lifecycle stage.
    #[must_use]
    pub const fn lifecycle_stage(&self) -> LifecycleStage {
        self.lifecycle_stage
    }

    /// Get the start timestamp.
    #[must_use]
    pub const fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Get the end timestamp, if the run has terminated.
    #[must_use]
    pub const fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    /// Get the artifact root URI, if the store exposes one.
    #[must_use]
    pub fn artifact_uri(&self) -> Option<&str> {
        self.artifact_uri.as_deref()
    }

    /// Set the owning user.
    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    /// Set the artifact root URI.
    #[must_use]
    pub fn with_artifact_uri(mut self, uri: impl Into<String>) -> Self {
        self.artifact_uri = Some(uri.into());
        self
    }

    /// Move the run to `status`, stamping the end time for terminal states.
    pub fn terminate(&mut self, status: RunStatus) {
        self.status = status;
        self.end_time = status.is_terminated().then(Utc::now);
    }
}

/// Summary view of a run's logged data.
///
/// Metrics hold only the latest point per key; the full series stays in the
/// tracking store.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunData {
    pub(crate) params: BTreeMap<String, String>,
    pub(crate) metrics: BTreeMap<String, Metric>,
    pub(crate) tags: BTreeMap<String, String>,
}

impl RunData {
    /// Parameters by name.
    #[must_use]
    pub const fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// Latest metric point by name.
    #[must_use]
    pub const fn metrics(&self) -> &BTreeMap<String, Metric> {
        &self.metrics
    }

    /// Latest metric value by name.
    #[must_use]
    pub fn metric_values(&self) -> BTreeMap<String, f64> {
        self.metrics
            .iter()
            .map(|(key, metric)| (key.clone(), metric.value()))
            .collect()
    }

    /// Tags by name.
    #[must_use]
    pub const fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    /// Value of a single tag.
    #[must_use]
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

/// Run Record: a read view of one run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Run {
    pub(crate) info: RunInfo,
    pub(crate) data: RunData,
}

impl Run {
    /// Create a run from its parts.
    #[must_use]
    pub const fn new(info: RunInfo, data: RunData) -> Self {
        Self { info, data }
    }

    /// Identity and lifecycle.
    #[must_use]
    pub const fn info(&self) -> &RunInfo {
        &self.info
    }

    /// Logged params, latest metrics and tags.
    #[must_use]
    pub const fn data(&self) -> &RunData {
        &self.data
    }

    /// Shorthand for `info().run_id()`.
    #[must_use]
    pub fn run_id(&self) -> &str {
        self.info.run_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_info_defaults() {
        let info = RunInfo::new("run-1", "exp-1");
        assert_eq!(info.user_id(), UNKNOWN_USER);
        assert_eq!(info.status(), RunStatus::Running);
        assert_eq!(info.lifecycle_stage(), LifecycleStage::Active);
        assert!(info.end_time().is_none());
    }

    #[test]
    fn test_run_lifecycle() {
        let mut info = RunInfo::new("run-1", "exp-1");
        info.terminate(RunStatus::Finished);
        assert_eq!(info.status(), RunStatus::Finished);
        assert!(info.end_time().is_some());

        info.terminate(RunStatus::Scheduled);
        assert!(info.end_time().is_none());
    }

    #[test]
    fn test_run_status_wire_names() {
        assert_eq!(serde_json::to_string(&RunStatus::Killed).unwrap(), "\"KILLED\"");
        assert_eq!("finished".parse::<RunStatus>().unwrap(), RunStatus::Finished);
        assert!("DONE".parse::<RunStatus>().is_err());
    }
}
