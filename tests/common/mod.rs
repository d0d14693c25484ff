//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use trueno_migrate::artifacts::read_tree;
use trueno_migrate::client::{MemoryTrackingClient, TrackingClient};
use trueno_migrate::experiment::{Experiment, Metric, Param, Run, RunInfo, RunStatus, RunTag};
use trueno_migrate::tags::RUN_NAME_TAG;
use trueno_migrate::{Error, Result};

pub const SOURCE_USER: &str = "alice";

/// Source run with one param, one metric, one user tag, a run name and two
/// artifacts (`info.txt` and `dir2/info.txt`).
pub fn create_simple_run(
    client: &dyn TrackingClient,
    experiment_name: &str,
) -> (Experiment, Run) {
    let experiment = client.create_experiment(experiment_name).unwrap();
    let run = client.create_run(experiment.experiment_id()).unwrap();
    populate_run(client, run.run_id(), &[]);
    (experiment, client.get_run(run.run_id()).unwrap())
}

/// Same as [`create_simple_run`] on a memory store, owned by [`SOURCE_USER`].
pub fn create_owned_run(
    client: &MemoryTrackingClient,
    experiment_id: &str,
    extra_tags: &[(&str, &str)],
) -> Run {
    let run = client.create_run_for_user(experiment_id, SOURCE_USER).unwrap();
    populate_run(client, run.run_id(), extra_tags);
    client.get_run(run.run_id()).unwrap()
}

fn populate_run(client: &dyn TrackingClient, run_id: &str, extra_tags: &[(&str, &str)]) {
    let mut tags = vec![
        RunTag::new("my_tag", "my_val"),
        RunTag::new(RUN_NAME_TAG, "my_run"),
    ];
    tags.extend(extra_tags.iter().map(|(k, v)| RunTag::new(*k, *v)));
    client
        .log_batch(
            run_id,
            &[Metric::new("m1", 0.1)],
            &[Param::new("p1", "0.1")],
            &tags,
        )
        .unwrap();

    let artifacts = tempfile::tempdir().unwrap();
    std::fs::write(artifacts.path().join("info.txt"), "Hi artifact").unwrap();
    std::fs::create_dir_all(artifacts.path().join("dir2")).unwrap();
    std::fs::write(artifacts.path().join("dir2").join("info.txt"), "Hi artifact").unwrap();
    client.log_artifacts(run_id, artifacts.path()).unwrap();

    client.set_terminated(run_id, RunStatus::Finished).unwrap();
}

/// Full artifact tree of a run, read through the client.
pub fn artifacts_of(client: &dyn TrackingClient, run_id: &str) -> BTreeMap<String, Vec<u8>> {
    let dir = tempfile::tempdir().unwrap();
    let local = client.download_artifacts(run_id, "", dir.path()).unwrap();
    read_tree(&local).unwrap()
}

/// Status, lifecycle, params, latest metric values and artifacts match.
pub fn compare_runs_no_tags(
    src: &dyn TrackingClient,
    run1: &Run,
    dst: &dyn TrackingClient,
    run2: &Run,
) {
    assert_eq!(run1.info().lifecycle_stage(), run2.info().lifecycle_stage());
    assert_eq!(run1.info().status(), run2.info().status());
    assert_eq!(run1.data().params(), run2.data().params());
    assert_eq!(run1.data().metric_values(), run2.data().metric_values());
    assert_eq!(
        artifacts_of(src, run1.run_id()),
        artifacts_of(dst, run2.run_id())
    );
}

/// Default-policy tag comparison: the run name is regenerated, not copied.
pub fn compare_run_no_import_mlflow_tags(
    src: &dyn TrackingClient,
    run1: &Run,
    dst: &dyn TrackingClient,
    run2: &Run,
) {
    compare_runs_no_tags(src, run1, dst, run2);
    assert!(run1.data().tags().contains_key(RUN_NAME_TAG));
    assert!(!run2.data().tags().contains_key(RUN_NAME_TAG));
    let mut expected = run1.data().tags().clone();
    expected.remove(RUN_NAME_TAG);
    assert_eq!(&expected, run2.data().tags());
}

/// Single run of an experiment, looked up by name.
pub fn only_run(client: &dyn TrackingClient, experiment_name: &str) -> Run {
    let experiment = client
        .get_experiment_by_name(experiment_name)
        .unwrap()
        .expect("experiment exists");
    let infos = client.list_run_infos(experiment.experiment_id()).unwrap();
    assert_eq!(infos.len(), 1);
    client.get_run(infos[0].run_id()).unwrap()
}

/// Client wrapper that records staging directories and can fail the
/// artifact download halfway through, or delete the uploaded directory so
/// staging cleanup fails.
pub struct InstrumentedClient<'a> {
    pub inner: &'a dyn TrackingClient,
    pub fail_download: bool,
    pub remove_uploaded: bool,
    pub staging_dirs: Mutex<Vec<PathBuf>>,
}

impl<'a> InstrumentedClient<'a> {
    pub fn new(inner: &'a dyn TrackingClient) -> Self {
        Self {
            inner,
            fail_download: false,
            remove_uploaded: false,
            staging_dirs: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_download(inner: &'a dyn TrackingClient) -> Self {
        Self {
            fail_download: true,
            ..Self::new(inner)
        }
    }

    pub fn removing_uploaded(inner: &'a dyn TrackingClient) -> Self {
        Self {
            remove_uploaded: true,
            ..Self::new(inner)
        }
    }

    pub fn staging_dirs(&self) -> Vec<PathBuf> {
        self.staging_dirs.lock().unwrap().clone()
    }
}

impl TrackingClient for InstrumentedClient<'_> {
    fn tracking_uri(&self) -> String {
        self.inner.tracking_uri()
    }

    fn get_run(&self, run_id: &str) -> Result<Run> {
        self.inner.get_run(run_id)
    }

    fn create_run(&self, experiment_id: &str) -> Result<Run> {
        self.inner.create_run(experiment_id)
    }

    fn log_batch(
        &self,
        run_id: &str,
        metrics: &[Metric],
        params: &[Param],
        tags: &[RunTag],
    ) -> Result<()> {
        self.inner.log_batch(run_id, metrics, params, tags)
    }

    fn set_terminated(&self, run_id: &str, status: RunStatus) -> Result<()> {
        self.inner.set_terminated(run_id, status)
    }

    fn download_artifacts(&self, run_id: &str, path: &str, dst_dir: &Path) -> Result<PathBuf> {
        self.staging_dirs.lock().unwrap().push(dst_dir.to_path_buf());
        if self.fail_download {
            std::fs::write(dst_dir.join("partial.bin"), [0u8; 8])?;
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset during artifact download",
            )));
        }
        self.inner.download_artifacts(run_id, path, dst_dir)
    }

    fn log_artifacts(&self, run_id: &str, local_dir: &Path) -> Result<()> {
        self.inner.log_artifacts(run_id, local_dir)?;
        if self.remove_uploaded {
            self.staging_dirs.lock().unwrap().push(local_dir.to_path_buf());
            std::fs::remove_dir_all(local_dir)?;
        }
        Ok(())
    }

    fn get_experiment(&self, experiment_id: &str) -> Result<Experiment> {
        self.inner.get_experiment(experiment_id)
    }

    fn get_experiment_by_name(&self, name: &str) -> Result<Option<Experiment>> {
        self.inner.get_experiment_by_name(name)
    }

    fn create_experiment(&self, name: &str) -> Result<Experiment> {
        self.inner.create_experiment(name)
    }

    fn list_run_infos(&self, experiment_id: &str) -> Result<Vec<RunInfo>> {
        self.inner.list_run_infos(experiment_id)
    }
}
