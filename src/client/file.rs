//! Directory-backed tracking client.
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/<experiment_id>/meta.json
//! <root>/<experiment_id>/<run_id>/run.json
//! <root>/<experiment_id>/<run_id>/artifacts/...
//! ```
//!
//! `run.json` keeps the full metric history. Records are rewritten through a
//! temporary file and renamed into place.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{is_path_safe_id, latest_metrics, validate_batch, TrackingClient};
use crate::artifacts::{copy_tree, local_path, normalize_artifact_path};
use crate::experiment::{
    Experiment, Metric, Param, Run, RunData, RunInfo, RunStatus, RunTag,
};
use crate::{Error, Result};

const EXPERIMENT_META: &str = "meta.json";
const RUN_META: &str = "run.json";
const ARTIFACTS_DIR: &str = "artifacts";

#[derive(Debug, Serialize, Deserialize)]
struct RunFile {
    info: RunInfo,
    #[serde(default)]
    params: BTreeMap<String, String>,
    #[serde(default)]
    metrics: BTreeMap<String, Vec<Metric>>,
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

impl RunFile {
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

/// Tracking store persisted as JSON files in a local directory.
#[derive(Debug, Clone)]
pub struct FileTrackingClient {
    root: PathBuf,
}

impl FileTrackingClient {
    /// Open the store at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn experiment_dirs(&self) -> Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.join(EXPERIMENT_META).is_file() {
                dirs.push(path);
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    fn experiments(&self) -> Result<Vec<Experiment>> {
        self.experiment_dirs()?
            .iter()
            .map(|dir| read_json(&dir.join(EXPERIMENT_META)))
            .collect()
    }

    fn experiment_dir(&self, experiment_id: &str) -> Result<PathBuf> {
        if !is_path_safe_id(experiment_id) {
            return Err(Error::ExperimentNotFound(experiment_id.to_string()));
        }
        let dir = self.root.join(experiment_id);
        if dir.join(EXPERIMENT_META).is_file() {
            Ok(dir)
        } else {
            Err(Error::ExperimentNotFound(experiment_id.to_string()))
        }
    }

    fn run_dir(&self, run_id: &str) -> Result<PathBuf> {
        if !is_path_safe_id(run_id) {
            return Err(Error::RunNotFound(run_id.to_string()));
        }
        self.experiment_dirs()?
            .into_iter()
            .map(|dir| dir.join(run_id))
            .find(|dir| dir.join(RUN_META).is_file())
            .ok_or_else(|| Error::RunNotFound(run_id.to_string()))
    }

    fn read_run(&self, run_id: &str) -> Result<(PathBuf, RunFile)> {
        let dir = self.run_dir(run_id)?;
        let record = read_json(&dir.join(RUN_META))?;
        Ok((dir, record))
    }

    fn next_experiment_id(&self) -> Result<String> {
        let next = self
            .experiment_dirs()?
            .iter()
            .filter_map(|dir| dir.file_name()?.to_str()?.parse::<u64>().ok())
            .max()
            .map_or(0, |max| max + 1);
        Ok(next.to_string())
    }
}

impl TrackingClient for FileTrackingClient {
    fn tracking_uri(&self) -> String {
        format!("file://{}", self.root.display())
    }

    fn get_run(&self, run_id: &str) -> Result<Run> {
        let (_, record) = self.read_run(run_id)?;
        Ok(record.to_run())
    }

    fn create_run(&self, experiment_id: &str) -> Result<Run> {
        let experiment_dir = self.experiment_dir(experiment_id)?;
        let run_id = uuid::Uuid::new_v4().simple().to_string();
        let run_dir = experiment_dir.join(&run_id);
        let artifacts = run_dir.join(ARTIFACTS_DIR);
        fs::create_dir_all(&artifacts)?;

        let record = RunFile {
            info: RunInfo::new(run_id, experiment_id)
                .with_artifact_uri(format!("file://{}", artifacts.display())),
            params: BTreeMap::new(),
            metrics: BTreeMap::new(),
            tags: BTreeMap::new(),
        };
        write_json(&run_dir.join(RUN_META), &record)?;
        Ok(record.to_run())
    }

    fn log_batch(
        &self,
        run_id: &str,
        metrics: &[Metric],
        params: &[Param],
        tags: &[RunTag],
    ) -> Result<()> {
        let (dir, mut record) = self.read_run(run_id)?;
        validate_batch(run_id, &record.params, metrics, params, tags)?;

        for param in params {
            record.params.insert(param.key.clone(), param.value.clone());
        }
        for metric in metrics {
            record
                .metrics
                .entry(metric.key().to_string())
                .or_default()
                .push(metric.clone());
        }
        for tag in tags {
            record.tags.insert(tag.key.clone(), tag.value.clone());
        }
        write_json(&dir.join(RUN_META), &record)
            .map_err(|e| Error::destination_write(run_id, e.to_string()))
    }

    fn set_terminated(&self, run_id: &str, status: RunStatus) -> Result<()> {
        let (dir, mut record) = self.read_run(run_id)?;
        record.info.terminate(status);
        write_json(&dir.join(RUN_META), &record)
    }

    fn download_artifacts(&self, run_id: &str, path: &str, dst_dir: &Path) -> Result<PathBuf> {
        let prefix = normalize_artifact_path(path)?;
        let artifacts = self.run_dir(run_id)?.join(ARTIFACTS_DIR);
        let source = local_path(&artifacts, &prefix);
        let target = local_path(dst_dir, &prefix);

        if source.is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&source, &target)?;
        } else if source.is_dir() || prefix.is_empty() {
            copy_tree(&source, &target)?;
        } else {
            return Err(Error::InvalidInput(format!(
                "no artifacts at '{prefix}' for run {run_id}"
            )));
        }
        Ok(target)
    }

    fn log_artifacts(&self, run_id: &str, local_dir: &Path) -> Result<()> {
        if !local_dir.is_dir() {
            return Err(Error::InvalidInput(format!(
                "artifact source is not a directory: {}",
                local_dir.display()
            )));
        }
        let artifacts = self.run_dir(run_id)?.join(ARTIFACTS_DIR);
        copy_tree(local_dir, &artifacts)?;
        Ok(())
    }

    fn get_experiment(&self, experiment_id: &str) -> Result<Experiment> {
        let dir = self.experiment_dir(experiment_id)?;
        read_json(&dir.join(EXPERIMENT_META))
    }

    fn get_experiment_by_name(&self, name: &str) -> Result<Option<Experiment>> {
        let mut matches: Vec<Experiment> = self
            .experiments()?
            .into_iter()
            .filter(|experiment| experiment.name() == name)
            .collect();
        match matches.len() {
            0 | 1 => Ok(matches.pop()),
            count => Err(Error::AmbiguousExperiment {
                name: name.to_string(),
                count,
            }),
        }
    }

    fn create_experiment(&self, name: &str) -> Result<Experiment> {
        if name.trim().is_empty() {
            return Err(Error::InvalidInput("experiment name must not be empty".to_string()));
        }
        if self.get_experiment_by_name(name)?.is_some() {
            return Err(Error::ExperimentExists(name.to_string()));
        }
        let id = self.next_experiment_id()?;
        let dir = self.root.join(&id);
        fs::create_dir_all(&dir)?;
        let experiment =
            Experiment::new(id, name).with_artifact_location(format!("file://{}", dir.display()));
        write_json(&dir.join(EXPERIMENT_META), &experiment)?;
        Ok(experiment)
    }

    fn list_run_infos(&self, experiment_id: &str) -> Result<Vec<RunInfo>> {
        let dir = self.experiment_dir(experiment_id)?;
        let mut infos = Vec::new();
        for entry in fs::read_dir(dir)? {
            let meta = entry?.path().join(RUN_META);
            if meta.is_file() {
                let record: RunFile = read_json(&meta)?;
                infos.push(record.info);
            }
        }
        infos.sort_by(|a, b| {
            a.start_time()
                .cmp(&b.start_time())
                .then_with(|| a.run_id().cmp(b.run_id()))
        });
        Ok(infos)
    }
}

pub(crate) fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::Other(format!("no parent directory for {}", path.display())))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, value)?;
    tmp.write_all(b"\n")?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}
