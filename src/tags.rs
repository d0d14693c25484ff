//! Tag transformation for copied runs
//!
//! Computes the exact tag set logged on a destination run from the source
//! run's tags and a [`TagPolicy`]. Three steps, applied in order:
//!
//! 1. provenance tags under [`METADATA_TAG_PREFIX`] (`export_metadata_tags`)
//! 2. reserved `mlflow.` tags dropped, except [`PARENT_RUN_ID_TAG`]
//!    (unless `import_mlflow_tags`)
//! 3. [`USER_TAG`] set to the source owner (`use_src_user_id`), else removed
//!
//! Everything here is pure; the export timestamp is an input.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::warn;

use crate::experiment::{Run, RunTag};

/// Prefix of tags managed by the tracking service itself.
pub const MLFLOW_TAG_PREFIX: &str = "mlflow.";
/// Reserved tag linking a run to its logical parent.
pub const PARENT_RUN_ID_TAG: &str = "mlflow.parentRunId";
/// Reserved tag holding the display name of a run.
pub const RUN_NAME_TAG: &str = "mlflow.runName";
/// Reserved tag recording the user a run is attributed to.
pub const USER_TAG: &str = "mlflow.user";
/// Prefix of provenance tags written by this tool.
pub const METADATA_TAG_PREFIX: &str = "mlflow_tools.metadata.";

/// Tag handling switches for a copy or export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TagPolicy {
    /// Record where the run came from under [`METADATA_TAG_PREFIX`].
    pub export_metadata_tags: bool,
    /// Keep reserved `mlflow.` tags instead of letting the destination
    /// regenerate them.
    pub import_mlflow_tags: bool,
    /// Attribute the destination run to the source owner via [`USER_TAG`].
    pub use_src_user_id: bool,
}

impl TagPolicy {
    /// Policy with every switch off.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            export_metadata_tags: false,
            import_mlflow_tags: false,
            use_src_user_id: false,
        }
    }

    /// Set `export_metadata_tags`.
    #[must_use]
    pub const fn export_metadata_tags(mut self, enabled: bool) -> Self {
        self.export_metadata_tags = enabled;
        self
    }

    /// Set `import_mlflow_tags`.
    #[must_use]
    pub const fn import_mlflow_tags(mut self, enabled: bool) -> Self {
        self.import_mlflow_tags = enabled;
        self
    }

    /// Set `use_src_user_id`.
    #[must_use]
    pub const fn use_src_user_id(mut self, enabled: bool) -> Self {
        self.use_src_user_id = enabled;
        self
    }
}

/// Full key of a provenance tag.
#[must_use]
pub fn metadata_key(name: &str) -> String {
    format!("{METADATA_TAG_PREFIX}{name}")
}

/// Compute the destination tag set for `run`.
///
/// `tracking_uri` is the source store location and `exported_at` the time of
/// the copy; both only feed provenance tags.
#[must_use]
pub fn transform_tags(
    run: &Run,
    tracking_uri: &str,
    policy: TagPolicy,
    exported_at: DateTime<Utc>,
) -> BTreeMap<String, String> {
    let mut tags = run.data().tags().clone();
    if policy.export_metadata_tags {
        add_metadata_tags(&mut tags, run, tracking_uri, exported_at);
    }
    let mut tags = filter_mlflow_tags(tags, policy.import_mlflow_tags);
    set_dst_user_id(&mut tags, run.info().user_id(), policy.use_src_user_id);
    tags
}

/// Add provenance tags recording the source of `run`.
///
/// A source tag with the same key is replaced; engine-written metadata wins.
pub fn add_metadata_tags(
    tags: &mut BTreeMap<String, String>,
    run: &Run,
    tracking_uri: &str,
    exported_at: DateTime<Utc>,
) {
    let info = run.info();
    let mut metadata = vec![
        ("run_id", info.run_id().to_string()),
        ("experiment_id", info.experiment_id().to_string()),
        ("user_id", info.user_id().to_string()),
        ("tracking_uri", tracking_uri.to_string()),
        ("status", info.status().to_string()),
        ("lifecycle_stage", info.lifecycle_stage().to_string()),
        ("timestamp", exported_at.timestamp().to_string()),
        (
            "timestamp_nice",
            exported_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        ),
    ];
    if let Some(uri) = info.artifact_uri() {
        metadata.push(("artifact_uri", uri.to_string()));
    }

    for (name, value) in metadata {
        let key = metadata_key(name);
        if let Some(previous) = tags.insert(key.clone(), value.clone()) {
            if previous != value {
                warn!(
                    run_id = info.run_id(),
                    tag = %key,
                    source_value = %previous,
                    "source tag collides with provenance tag; provenance value kept"
                );
            }
        }
    }
}

/// Drop reserved tags unless `import_mlflow_tags` is set.
///
/// [`PARENT_RUN_ID_TAG`] always survives so parent links can be remapped.
#[must_use]
pub fn filter_mlflow_tags(
    tags: BTreeMap<String, String>,
    import_mlflow_tags: bool,
) -> BTreeMap<String, String> {
    if import_mlflow_tags {
        return tags;
    }
    tags.into_iter()
        .filter(|(key, _)| !key.starts_with(MLFLOW_TAG_PREFIX) || key == PARENT_RUN_ID_TAG)
        .collect()
}

/// Apply the user attribution policy.
///
/// The create call of a tracking store takes no owner, so the source owner
/// can only travel as a tag.
pub fn set_dst_user_id(
    tags: &mut BTreeMap<String, String>,
    src_user_id: &str,
    use_src_user_id: bool,
) {
    if use_src_user_id {
        tags.insert(USER_TAG.to_string(), src_user_id.to_string());
    } else {
        tags.remove(USER_TAG);
    }
}

/// Remove provenance tags, for imports that do not want them.
#[must_use]
pub fn strip_metadata_tags(tags: BTreeMap<String, String>) -> BTreeMap<String, String> {
    tags.into_iter()
        .filter(|(key, _)| !key.starts_with(METADATA_TAG_PREFIX))
        .collect()
}

/// Convert a tag map into a batch payload.
#[must_use]
pub fn to_run_tags(tags: &BTreeMap<String, String>) -> Vec<RunTag> {
    tags.iter().map(|(k, v)| RunTag::new(k, v)).collect()
}
