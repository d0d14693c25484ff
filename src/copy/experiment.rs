//! Experiment Copier - copy every run of an experiment and re-link parents

use serde::Serialize;
use tracing::info;

use super::{find_experiment, get_or_create_experiment, RunCopier, RunIdMapping};
use crate::client::TrackingClient;
use crate::tags::TagPolicy;
use crate::Result;

/// What an experiment copy or import produced.
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentCopyReport {
    /// Source experiment id
    pub src_experiment_id: String,
    /// Destination experiment id
    pub dst_experiment_id: String,
    /// Source to destination run ids, in copy order
    pub runs: RunIdMapping,
    /// Number of destination runs whose parent link was rewritten
    pub relinked_parents: usize,
}

/// Copies all runs of a source experiment into a destination experiment.
///
/// Runs are copied one at a time in the order the source store lists them.
/// Parent links are rewritten in a second pass once every run is copied.
pub struct ExperimentCopier<'a> {
    run_copier: RunCopier<'a>,
}

impl<'a> ExperimentCopier<'a> {
    /// Create a copier with the default tag policy.
    #[must_use]
    pub fn new(src: &'a dyn TrackingClient, dst: &'a dyn TrackingClient) -> Self {
        Self {
            run_copier: RunCopier::new(src, dst),
        }
    }

    /// Set the tag policy applied to every run.
    #[must_use]
    pub fn with_policy(mut self, policy: TagPolicy) -> Self {
        self.run_copier = self.run_copier.with_policy(policy);
        self
    }

    /// Use a preconfigured run copier.
    #[must_use]
    pub const fn from_run_copier(run_copier: RunCopier<'a>) -> Self {
        Self { run_copier }
    }

    /// Copy experiment `src_experiment` (name, or id as fallback) into the
    /// experiment named `dst_experiment_name`.
    ///
    /// # Errors
    ///
    /// Aborts on the first failing run. Runs copied before the failure stay
    /// in the destination and are not relinked.
    pub fn copy_experiment(
        &self,
        src_experiment: &str,
        dst_experiment_name: &str,
    ) -> Result<ExperimentCopyReport> {
        let src = self.run_copier.src();
        let dst = self.run_copier.dst();

        let dst_exp = get_or_create_experiment(dst, dst_experiment_name)?;
        let src_exp = find_experiment(src, src_experiment)?;
        let infos = src.list_run_infos(src_exp.experiment_id())?;
        info!(
            src_experiment_id = src_exp.experiment_id(),
            dst_experiment_id = dst_exp.experiment_id(),
            runs = infos.len(),
            "copying experiment"
        );

        let mut mapping = RunIdMapping::new();
        for run_info in &infos {
            let copied = self
                .run_copier
                .copy_run_to(run_info.run_id(), dst_exp.experiment_id())?;
            mapping.insert(copied);
        }

        let relinked_parents = mapping.relink_parents(dst)?;
        info!(
            dst_experiment_id = dst_exp.experiment_id(),
            runs = mapping.len(),
            relinked_parents,
            "experiment copied"
        );

        Ok(ExperimentCopyReport {
            src_experiment_id: src_exp.experiment_id().to_string(),
            dst_experiment_id: dst_exp.experiment_id().to_string(),
            runs: mapping,
            relinked_parents,
        })
    }
}
