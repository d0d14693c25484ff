//! Copy engine
//!
//! Copies runs between two live tracking clients.
//!
//! ```text
//! ExperimentCopier ──(per run)──> RunCopier ──> tags::transform_tags
//!        │
//!        └── RunIdMapping ──(after all runs)──> parent relinking
//! ```
//!
//! Destination runs are always new. Nothing is rolled back: a failure leaves
//! every run created so far in the destination store.

mod experiment;
mod mapping;
mod run;

pub use experiment::{ExperimentCopier, ExperimentCopyReport};
pub use mapping::{CopiedRun, RunIdMapping};
pub use run::RunCopier;

pub(crate) use run::{latest_metric_batch, param_batch};

use tracing::info;

use crate::client::TrackingClient;
use crate::experiment::Experiment;
use crate::{Error, Result};

/// Return the experiment called `name`, creating it if missing.
///
/// # Errors
///
/// Fails if the lookup is ambiguous or the store refuses the creation
pub fn get_or_create_experiment(client: &dyn TrackingClient, name: &str) -> Result<Experiment> {
    if let Some(experiment) = client.get_experiment_by_name(name)? {
        return Ok(experiment);
    }
    let experiment = client.create_experiment(name)?;
    info!(
        experiment_id = experiment.experiment_id(),
        experiment_name = name,
        tracking_uri = %client.tracking_uri(),
        "created experiment"
    );
    Ok(experiment)
}

/// Find an existing experiment by name, falling back to treating the
/// argument as an experiment id.
///
/// # Errors
///
/// Returns [`Error::ExperimentNameNotFound`] if neither lookup matches
pub fn find_experiment(client: &dyn TrackingClient, name_or_id: &str) -> Result<Experiment> {
    if let Some(experiment) = client.get_experiment_by_name(name_or_id)? {
        return Ok(experiment);
    }
    match client.get_experiment(name_or_id) {
        Ok(experiment) => Ok(experiment),
        Err(Error::ExperimentNotFound(_)) => {
            Err(Error::ExperimentNameNotFound(name_or_id.to_string()))
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MemoryTrackingClient;

    #[test]
    fn test_get_or_create_reuses_existing() {
        let client = MemoryTrackingClient::new();
        let first = get_or_create_experiment(&client, "target").unwrap();
        let second = get_or_create_experiment(&client, "target").unwrap();
        assert_eq!(first.experiment_id(), second.experiment_id());
        assert_eq!(client.experiment_count(), 2);
    }

    #[test]
    fn test_get_or_create_rejects_invalid_name() {
        let client = MemoryTrackingClient::new();
        assert!(get_or_create_experiment(&client, "  ").is_err());
    }

    #[test]
    fn test_find_experiment_by_name_or_id() {
        let client = MemoryTrackingClient::new();
        let exp = client.create_experiment("by-name").unwrap();
        assert_eq!(find_experiment(&client, "by-name").unwrap(), exp);
        assert_eq!(find_experiment(&client, exp.experiment_id()).unwrap(), exp);
        assert!(matches!(
            find_experiment(&client, "missing"),
            Err(Error::ExperimentNameNotFound(_))
        ));
    }
}
