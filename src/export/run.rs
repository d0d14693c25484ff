//! Run export to disk and import from disk

use std::fs;
use std::path::Path;

use chrono::Utc;
use tracing::{debug, info};

use super::{ExportInfo, ExportedRun, ARTIFACTS_DIR, RUN_FILE};
use crate::client::{read_json, write_json, TrackingClient};
use crate::copy::{get_or_create_experiment, latest_metric_batch, param_batch, CopiedRun};
use crate::tags::{
    add_metadata_tags, filter_mlflow_tags, set_dst_user_id, strip_metadata_tags, to_run_tags,
    PARENT_RUN_ID_TAG,
};
use crate::{Error, Result};

/// Writes a run's metadata and artifacts into a directory.
pub struct RunExporter<'a> {
    client: &'a dyn TrackingClient,
    export_metadata_tags: bool,
}

impl<'a> RunExporter<'a> {
    /// Create an exporter reading from `client`.
    #[must_use]
    pub fn new(client: &'a dyn TrackingClient) -> Self {
        Self {
            client,
            export_metadata_tags: false,
        }
    }

    /// Add provenance tags to exported runs.
    #[must_use]
    pub const fn export_metadata_tags(mut self, enabled: bool) -> Self {
        self.export_metadata_tags = enabled;
        self
    }

    /// Client runs are read from.
    #[must_use]
    pub fn client(&self) -> &'a dyn TrackingClient {
        self.client
    }

    /// Export run `run_id` into `output_dir`.
    ///
    /// # Errors
    ///
    /// Fails if the run is missing or the directory cannot be written
    pub fn export_run(&self, run_id: &str, output_dir: &Path) -> Result<ExportedRun> {
        let run = self.client.get_run(run_id)?;
        let export_info = ExportInfo::now(self.client.tracking_uri());

        let mut tags = run.data().tags().clone();
        if self.export_metadata_tags {
            add_metadata_tags(&mut tags, &run, &export_info.tracking_uri, export_info.exported_at);
        }
        let exported = ExportedRun {
            export_info,
            info: run.info().clone(),
            params: run.data().params().clone(),
            metrics: run.data().metrics().clone(),
            tags,
        };

        fs::create_dir_all(output_dir)?;
        write_json(&output_dir.join(RUN_FILE), &exported)?;
        let artifacts = output_dir.join(ARTIFACTS_DIR);
        fs::create_dir_all(&artifacts)?;
        self.client.download_artifacts(run_id, "", &artifacts)?;

        info!(run_id, output_dir = %output_dir.display(), "exported run");
        Ok(exported)
    }
}

/// Creates runs from directories written by [`RunExporter`].
pub struct RunImporter<'a> {
    client: &'a dyn TrackingClient,
    import_mlflow_tags: bool,
    import_metadata_tags: bool,
    use_src_user_id: bool,
}

impl<'a> RunImporter<'a> {
    /// Create an importer writing to `client`.
    #[must_use]
    pub fn new(client: &'a dyn TrackingClient) -> Self {
        Self {
            client,
            import_mlflow_tags: false,
            import_metadata_tags: false,
            use_src_user_id: false,
        }
    }

    /// Keep reserved `mlflow.` tags from the export.
    #[must_use]
    pub const fn import_mlflow_tags(mut self, enabled: bool) -> Self {
        self.import_mlflow_tags = enabled;
        self
    }

    /// Keep provenance tags from the export.
    #[must_use]
    pub const fn import_metadata_tags(mut self, enabled: bool) -> Self {
        self.import_metadata_tags = enabled;
        self
    }

    /// Attribute imported runs to the exported owner.
    #[must_use]
    pub const fn use_src_user_id(mut self, enabled: bool) -> Self {
        self.use_src_user_id = enabled;
        self
    }

    /// Client runs are written to.
    #[must_use]
    pub fn client(&self) -> &'a dyn TrackingClient {
        self.client
    }

    /// Import the run in `input_dir` into the experiment named
    /// `experiment_name`, creating it if needed.
    ///
    /// # Errors
    ///
    /// See [`RunImporter::import_run_to`]
    pub fn import_run(&self, experiment_name: &str, input_dir: &Path) -> Result<CopiedRun> {
        let experiment = get_or_create_experiment(self.client, experiment_name)?;
        self.import_run_to(experiment.experiment_id(), input_dir)
    }

    /// Import the run in `input_dir` into an existing experiment.
    ///
    /// # Errors
    ///
    /// Fails if `run.json` is missing or malformed, the destination refuses a
    /// write, or the artifact upload fails ([`Error::ArtifactTransfer`])
    pub fn import_run_to(&self, experiment_id: &str, input_dir: &Path) -> Result<CopiedRun> {
        let exported: ExportedRun = read_json(&input_dir.join(RUN_FILE))?;
        let src_run_id = exported.info.run_id().to_string();
        let dst_run = self.client.create_run(experiment_id)?;
        let dst_run_id = dst_run.run_id().to_string();

        let mut tags = exported.tags.clone();
        if !self.import_metadata_tags {
            tags = strip_metadata_tags(tags);
        }
        let mut tags = filter_mlflow_tags(tags, self.import_mlflow_tags);
        set_dst_user_id(&mut tags, exported.info.user_id(), self.use_src_user_id);

        let params = param_batch(&exported.params);
        let metrics = latest_metric_batch(&exported.metrics, Utc::now());
        debug!(dst_run_id = %dst_run_id, tags = tags.len(), "logging imported batch");
        self.client
            .log_batch(&dst_run_id, &metrics, &params, &to_run_tags(&tags))?;

        let artifacts = input_dir.join(ARTIFACTS_DIR);
        if artifacts.is_dir() {
            self.client
                .log_artifacts(&dst_run_id, &artifacts)
                .map_err(|source| Error::ArtifactTransfer {
                    src_run_id: src_run_id.clone(),
                    dst_run_id: dst_run_id.clone(),
                    source: Box::new(source),
                })?;
        }
        self.client
            .set_terminated(&dst_run_id, exported.info.status())?;

        info!(src_run_id = %src_run_id, dst_run_id = %dst_run_id, "imported run");
        Ok(CopiedRun {
            src_run_id,
            dst_run_id,
            src_parent_run_id: exported.tags.get(PARENT_RUN_ID_TAG).cloned(),
        })
    }
}
