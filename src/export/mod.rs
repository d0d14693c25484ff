//! Export / import through local disk
//!
//! The two-step variant of the copy engine: runs are exported from a source
//! client into a directory, then imported into a destination client, possibly
//! on another machine.
//!
//! ```text
//! <run dir>/run.json          ExportedRun
//! <run dir>/artifacts/...     full artifact tree
//!
//! <experiment dir>/manifest.json        ExperimentManifest
//! <experiment dir>/<src_run_id>/...     one run dir per run
//! ```

mod experiment;
mod run;

pub use experiment::{ExperimentExporter, ExperimentImporter};
pub use run::{RunExporter, RunImporter};

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::experiment::{Metric, RunInfo};

/// File holding an exported run's metadata.
pub const RUN_FILE: &str = "run.json";
/// File listing the runs of an exported experiment.
pub const MANIFEST_FILE: &str = "manifest.json";
/// Directory holding an exported run's artifact tree.
pub const ARTIFACTS_DIR: &str = "artifacts";

/// Where and when an export was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportInfo {
    /// Export time
    pub exported_at: DateTime<Utc>,
    /// Source tracking URI
    pub tracking_uri: String,
    /// Version of the exporting tool
    pub tool_version: String,
}

impl ExportInfo {
    pub(crate) fn now(tracking_uri: String) -> Self {
        Self {
            exported_at: Utc::now(),
            tracking_uri,
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Serialized form of one exported run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedRun {
    /// Export provenance
    pub export_info: ExportInfo,
    /// Source run identity and status
    pub info: RunInfo,
    /// Parameters
    pub params: BTreeMap<String, String>,
    /// Latest point per metric
    pub metrics: BTreeMap<String, Metric>,
    /// Tags, including provenance tags if the export requested them
    pub tags: BTreeMap<String, String>,
}

/// Serialized index of an exported experiment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentManifest {
    /// Export provenance
    pub export_info: ExportInfo,
    /// Source experiment id
    pub experiment_id: String,
    /// Source experiment name
    pub name: String,
    /// Source run ids, in export order; each names a run directory
    pub run_ids: Vec<String>,
}
