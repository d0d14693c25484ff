//! Experiment Record - named collection of runs

use serde::{Deserialize, Serialize};

use super::LifecycleStage;

/// Experiment Record represents a tracked experiment.
///
/// Names are unique within one tracking store; ids are opaque and differ
/// between stores.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Experiment {
    experiment_id: String,
    name: String,
    #[serde(default)]
    lifecycle_stage: LifecycleStage,
    #[serde(default)]
    artifact_location: Option<String>,
}

impl Experiment {
    /// Create an active experiment with the given ID and name.
    #[must_use]
    pub fn new(experiment_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            experiment_id: experiment_id.into(),
            name: name.into(),
            lifecycle_stage: LifecycleStage::Active,
            artifact_location: None,
        }
    }

    /// Set the artifact root location.
    #[must_use]
    pub fn with_artifact_location(mut self, location: impl Into<String>) -> Self {
        self.artifact_location = Some(location.into());
        self
    }

    /// Get the experiment ID.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Get the experiment name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the lifecycle stage.
    #[must_use]
    pub const fn lifecycle_stage(&self) -> LifecycleStage {
        self.lifecycle_stage
    }

    /// Get the artifact root location, if any.
    #[must_use]
    pub fn artifact_location(&self) -> Option<&str> {
        self.artifact_location.as_deref()
    }
}
