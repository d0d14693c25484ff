//! Run Copier - replicate one run into a destination experiment

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::{get_or_create_experiment, CopiedRun};
use crate::artifacts::ArtifactStaging;
use crate::client::TrackingClient;
use crate::experiment::{Metric, Param, Run};
use crate::tags::{to_run_tags, transform_tags, TagPolicy, PARENT_RUN_ID_TAG};
use crate::{Error, Result};

/// Copies single runs from a source client to a destination client.
///
/// Each copy creates a fresh destination run, writes params, latest metrics
/// and tags in one batch, transfers artifacts through a local staging
/// directory, then sets the source status.
///
/// Metric history is not carried over: each metric is re-logged once with
/// its latest value, the copy time as timestamp and step 0.
pub struct RunCopier<'a> {
    src: &'a dyn TrackingClient,
    dst: &'a dyn TrackingClient,
    policy: TagPolicy,
    staging_root: Option<PathBuf>,
}

impl<'a> RunCopier<'a> {
    /// Create a copier with the default tag policy.
    #[must_use]
    pub fn new(src: &'a dyn TrackingClient, dst: &'a dyn TrackingClient) -> Self {
        Self {
            src,
            dst,
            policy: TagPolicy::default(),
            staging_root: None,
        }
    }

    /// Set the tag policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: TagPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Stage artifacts under `root` instead of the system temp dir.
    #[must_use]
    pub fn with_staging_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.staging_root = Some(root.into());
        self
    }

    /// Tag policy in effect.
    #[must_use]
    pub const fn policy(&self) -> TagPolicy {
        self.policy
    }

    /// Source client.
    #[must_use]
    pub fn src(&self) -> &'a dyn TrackingClient {
        self.src
    }

    /// Destination client.
    #[must_use]
    pub fn dst(&self) -> &'a dyn TrackingClient {
        self.dst
    }

    /// Copy a run into the experiment named `dst_experiment_name`, creating
    /// the experiment if needed.
    ///
    /// # Errors
    ///
    /// See [`RunCopier::copy_run_to`]
    pub fn copy_run(&self, src_run_id: &str, dst_experiment_name: &str) -> Result<CopiedRun> {
        let dst_experiment = get_or_create_experiment(self.dst, dst_experiment_name)?;
        debug!(
            dst_experiment_id = dst_experiment.experiment_id(),
            dst_experiment_name,
            "resolved destination experiment"
        );
        self.copy_run_to(src_run_id, dst_experiment.experiment_id())
    }

    /// Copy a run into an existing destination experiment.
    ///
    /// # Errors
    ///
    /// - not found: the source run or destination experiment is missing
    /// - destination write: run creation or the batch write was refused;
    ///   the empty destination run is left behind
    /// - [`Error::ArtifactTransfer`]: metadata is committed, artifacts are
    ///   missing or partial
    pub fn copy_run_to(&self, src_run_id: &str, dst_experiment_id: &str) -> Result<CopiedRun> {
        let src_run = self.src.get_run(src_run_id)?;
        let dst_run = self.dst.create_run(dst_experiment_id)?;
        let dst_run_id = dst_run.run_id().to_string();
        info!(src_run_id, dst_run_id = %dst_run_id, dst_experiment_id, "copying run");

        self.copy_run_data(&src_run, &dst_run_id)?;
        let staging = self
            .copy_artifacts(src_run_id, &dst_run_id)
            .map_err(|source| Error::ArtifactTransfer {
                src_run_id: src_run_id.to_string(),
                dst_run_id: dst_run_id.clone(),
                source: Box::new(source),
            })?;
        // Artifacts are uploaded; a cleanup failure is not a transfer failure.
        if let Err(err) = staging.close() {
            warn!(
                dst_run_id = %dst_run_id,
                error = %err,
                "failed to remove artifact staging dir"
            );
        }
        self.dst
            .set_terminated(&dst_run_id, src_run.info().status())?;

        Ok(CopiedRun {
            src_run_id: src_run_id.to_string(),
            dst_run_id,
            src_parent_run_id: src_run.data().tag(PARENT_RUN_ID_TAG).map(str::to_string),
        })
    }

    fn copy_run_data(&self, src_run: &Run, dst_run_id: &str) -> Result<()> {
        let now = Utc::now();
        let params = param_batch(src_run.data().params());
        let metrics = latest_metric_batch(src_run.data().metrics(), now);
        let tags = transform_tags(src_run, &self.src.tracking_uri(), self.policy, now);
        debug!(
            dst_run_id,
            params = params.len(),
            metrics = metrics.len(),
            tags = tags.len(),
            "logging batch"
        );
        self.dst
            .log_batch(dst_run_id, &metrics, &params, &to_run_tags(&tags))
    }

    /// Transfer all artifacts and hand back the staging dir for cleanup.
    ///
    /// On error the staging dir is dropped, which removes it.
    fn copy_artifacts(&self, src_run_id: &str, dst_run_id: &str) -> Result<ArtifactStaging> {
        let staging = match &self.staging_root {
            Some(root) => ArtifactStaging::new_in(root)?,
            None => ArtifactStaging::new()?,
        };
        let local = self
            .src
            .download_artifacts(src_run_id, "", staging.path())?;
        self.dst.log_artifacts(dst_run_id, &local)?;
        Ok(staging)
    }
}

/// Params of a source run as a batch payload.
pub(crate) fn param_batch(params: &BTreeMap<String, String>) -> Vec<Param> {
    params.iter().map(|(k, v)| Param::new(k, v)).collect()
}

/// Latest metric values re-stamped at `now`, step 0.
pub(crate) fn latest_metric_batch(
    metrics: &BTreeMap<String, Metric>,
    now: DateTime<Utc>,
) -> Vec<Metric> {
    metrics
        .values()
        .map(|m| Metric::builder(m.key(), m.value()).timestamp(now).step(0).build())
        .collect()
}
