//! Experiment export to disk and import from disk

use std::fs;
use std::path::Path;

use tracing::info;

use super::{ExperimentManifest, ExportInfo, RunExporter, RunImporter, MANIFEST_FILE};
use crate::client::{is_path_safe_id, read_json, write_json, TrackingClient};
use crate::copy::{find_experiment, get_or_create_experiment, ExperimentCopyReport, RunIdMapping};
use crate::{Error, Result};

/// Writes every run of an experiment into a directory.
pub struct ExperimentExporter<'a> {
    run_exporter: RunExporter<'a>,
}

impl<'a> ExperimentExporter<'a> {
    /// Create an exporter reading from `client`.
    #[must_use]
    pub fn new(client: &'a dyn TrackingClient) -> Self {
        Self {
            run_exporter: RunExporter::new(client),
        }
    }

    /// Add provenance tags to exported runs.
    #[must_use]
    pub fn export_metadata_tags(mut self, enabled: bool) -> Self {
        self.run_exporter = self.run_exporter.export_metadata_tags(enabled);
        self
    }

    /// Export experiment `experiment` (name, or id as fallback) into
    /// `output_dir`.
    ///
    /// # Errors
    ///
    /// Aborts on the first run that cannot be exported; the manifest is only
    /// written once every run is on disk
    pub fn export_experiment(
        &self,
        experiment: &str,
        output_dir: &Path,
    ) -> Result<ExperimentManifest> {
        let client = self.run_exporter.client();
        let experiment = find_experiment(client, experiment)?;
        let infos = client.list_run_infos(experiment.experiment_id())?;
        fs::create_dir_all(output_dir)?;

        let mut run_ids = Vec::with_capacity(infos.len());
        for run_info in &infos {
            self.run_exporter
                .export_run(run_info.run_id(), &output_dir.join(run_info.run_id()))?;
            run_ids.push(run_info.run_id().to_string());
        }

        let manifest = ExperimentManifest {
            export_info: ExportInfo::now(client.tracking_uri()),
            experiment_id: experiment.experiment_id().to_string(),
            name: experiment.name().to_string(),
            run_ids,
        };
        write_json(&output_dir.join(MANIFEST_FILE), &manifest)?;
        info!(
            experiment_id = experiment.experiment_id(),
            runs = manifest.run_ids.len(),
            output_dir = %output_dir.display(),
            "exported experiment"
        );
        Ok(manifest)
    }
}

/// Imports a directory written by [`ExperimentExporter`].
pub struct ExperimentImporter<'a> {
    run_importer: RunImporter<'a>,
}

impl<'a> ExperimentImporter<'a> {
    /// Create an importer writing to `client`.
    #[must_use]
    pub fn new(client: &'a dyn TrackingClient) -> Self {
        Self::from_run_importer(RunImporter::new(client))
    }

    /// Use a preconfigured run importer for tag handling.
    #[must_use]
    pub const fn from_run_importer(run_importer: RunImporter<'a>) -> Self {
        Self { run_importer }
    }

    /// Keep reserved `mlflow.` tags from the export.
    #[must_use]
    pub fn import_mlflow_tags(mut self, enabled: bool) -> Self {
        self.run_importer = self.run_importer.import_mlflow_tags(enabled);
        self
    }

    /// Keep provenance tags from the export.
    #[must_use]
    pub fn import_metadata_tags(mut self, enabled: bool) -> Self {
        self.run_importer = self.run_importer.import_metadata_tags(enabled);
        self
    }

    /// Attribute imported runs to the exported owners.
    #[must_use]
    pub fn use_src_user_id(mut self, enabled: bool) -> Self {
        self.run_importer = self.run_importer.use_src_user_id(enabled);
        self
    }

    /// Import every run listed in `input_dir`'s manifest into the experiment
    /// named `experiment_name`, then re-link parent runs.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` before importing anything if a manifest run id
    /// is not a plain directory name.
    ///
    /// Aborts on the first failing run; runs imported before it remain
    pub fn import_experiment(
        &self,
        experiment_name: &str,
        input_dir: &Path,
    ) -> Result<ExperimentCopyReport> {
        let client = self.run_importer.client();
        let manifest: ExperimentManifest = read_json(&input_dir.join(MANIFEST_FILE))?;
        if let Some(bad) = manifest.run_ids.iter().find(|id| !is_path_safe_id(id)) {
            return Err(Error::InvalidInput(format!(
                "manifest run id '{bad}' is not a plain directory name"
            )));
        }
        let experiment = get_or_create_experiment(client, experiment_name)?;

        let mut mapping = RunIdMapping::new();
        for run_id in &manifest.run_ids {
            let imported = self
                .run_importer
                .import_run_to(experiment.experiment_id(), &input_dir.join(run_id))?;
            mapping.insert(imported);
        }
        let relinked_parents = mapping.relink_parents(client)?;
        info!(
            dst_experiment_id = experiment.experiment_id(),
            runs = mapping.len(),
            relinked_parents,
            "imported experiment"
        );

        Ok(ExperimentCopyReport {
            src_experiment_id: manifest.experiment_id,
            dst_experiment_id: experiment.experiment_id().to_string(),
            runs: mapping,
            relinked_parents,
        })
    }
}
