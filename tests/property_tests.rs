//! Property-based tests for tag transformation and parent relinking
//!
//! - Test tag policy invariants over arbitrary tag sets
//! - Test that relinking preserves run topology
//! - Run with ProptestConfig::with_cases(100)

use std::collections::BTreeMap;

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use proptest::sample::Index;
use trueno_migrate::client::{MemoryTrackingClient, TrackingClient};
use trueno_migrate::copy::ExperimentCopier;
use trueno_migrate::experiment::{Param, Run, RunTag};
use trueno_migrate::tags::{
    metadata_key, transform_tags, TagPolicy, METADATA_TAG_PREFIX, MLFLOW_TAG_PREFIX,
    PARENT_RUN_ID_TAG, USER_TAG,
};

const OWNER: &str = "alice";

// ============================================================================
// Property Test Generators (Strategies)
// ============================================================================

/// Tag keys mixing plain, reserved and provenance names
fn arb_tag_key() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => "[a-z][a-z0-9_]{0,7}",
        2 => "mlflow\\.[a-zA-Z]{1,8}",
        1 => Just(PARENT_RUN_ID_TAG.to_string()),
        1 => Just(USER_TAG.to_string()),
        1 => "mlflow_tools\\.metadata\\.[a-z_]{1,8}",
    ]
}

fn arb_tags() -> impl Strategy<Value = BTreeMap<String, String>> {
    proptest::collection::btree_map(arb_tag_key(), "[a-z0-9]{0,8}", 0..12)
}

fn arb_policy() -> impl Strategy<Value = TagPolicy> {
    (any::<bool>(), any::<bool>(), any::<bool>()).prop_map(|(metadata, mlflow, user)| {
        TagPolicy::new()
            .export_metadata_tags(metadata)
            .import_mlflow_tags(mlflow)
            .use_src_user_id(user)
    })
}

/// Source run owned by [`OWNER`] carrying `tags`
fn source_run(tags: &BTreeMap<String, String>) -> Run {
    let client = MemoryTrackingClient::new();
    let run = client.create_run_for_user("0", OWNER).unwrap();
    let batch: Vec<RunTag> = tags.iter().map(|(k, v)| RunTag::new(k, v)).collect();
    client.log_batch(run.run_id(), &[], &[], &batch).unwrap();
    client.get_run(run.run_id()).unwrap()
}

fn is_plain(key: &str) -> bool {
    !key.starts_with(MLFLOW_TAG_PREFIX) && !key.starts_with(METADATA_TAG_PREFIX)
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // ========================================================================
    // Tag Transformation Properties
    // ========================================================================

    /// Property: same inputs produce the same tag set
    #[test]
    fn prop_transform_tags_deterministic(tags in arb_tags(), policy in arb_policy()) {
        let run = source_run(&tags);
        let ts = Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap();
        prop_assert_eq!(
            transform_tags(&run, "memory:", policy, ts),
            transform_tags(&run, "memory:", policy, ts)
        );
    }

    /// Property: plain source tags are copied unchanged under every policy
    #[test]
    fn prop_plain_tags_preserved(tags in arb_tags(), policy in arb_policy()) {
        let run = source_run(&tags);
        let out = transform_tags(&run, "memory:", policy, Utc::now());
        for (key, value) in tags.iter().filter(|(k, _)| is_plain(k)) {
            prop_assert_eq!(out.get(key), Some(value));
        }
    }

    /// Property: without import_mlflow_tags only the parent link and the
    /// requested user attribution remain in the reserved namespace
    #[test]
    fn prop_reserved_tags_filtered(tags in arb_tags(), policy in arb_policy()) {
        let policy = policy.import_mlflow_tags(false);
        let run = source_run(&tags);
        let out = transform_tags(&run, "memory:", policy, Utc::now());
        for key in out.keys().filter(|k| k.starts_with(MLFLOW_TAG_PREFIX)) {
            prop_assert!(
                key == PARENT_RUN_ID_TAG || (key == USER_TAG && policy.use_src_user_id),
                "unexpected reserved tag {}",
                key
            );
        }
        prop_assert_eq!(out.get(PARENT_RUN_ID_TAG), tags.get(PARENT_RUN_ID_TAG));
    }

    /// Property: with import_mlflow_tags every reserved tag except the user
    /// attribution survives
    #[test]
    fn prop_reserved_tags_kept(tags in arb_tags(), policy in arb_policy()) {
        let policy = policy.import_mlflow_tags(true);
        let run = source_run(&tags);
        let out = transform_tags(&run, "memory:", policy, Utc::now());
        for (key, value) in tags
            .iter()
            .filter(|(k, _)| k.starts_with(MLFLOW_TAG_PREFIX) && *k != USER_TAG)
        {
            prop_assert_eq!(out.get(key), Some(value));
        }
    }

    /// Property: user attribution follows use_src_user_id alone
    #[test]
    fn prop_user_attribution(tags in arb_tags(), policy in arb_policy()) {
        let run = source_run(&tags);
        let out = transform_tags(&run, "memory:", policy, Utc::now());
        if policy.use_src_user_id {
            prop_assert_eq!(out.get(USER_TAG).map(String::as_str), Some(OWNER));
        } else {
            prop_assert!(!out.contains_key(USER_TAG));
        }
    }

    /// Property: export_metadata_tags records the source run, and its values
    /// win over colliding source tags
    #[test]
    fn prop_metadata_tags(tags in arb_tags(), policy in arb_policy()) {
        let run = source_run(&tags);
        let out = transform_tags(&run, "memory:", policy, Utc::now());
        if policy.export_metadata_tags {
            prop_assert_eq!(
                out.get(&metadata_key("run_id")).map(String::as_str),
                Some(run.run_id())
            );
            prop_assert_eq!(
                out.get(&metadata_key("user_id")).map(String::as_str),
                Some(OWNER)
            );
        } else {
            let added: Vec<_> = out
                .keys()
                .filter(|k| k.starts_with(METADATA_TAG_PREFIX) && !tags.contains_key(*k))
                .collect();
            prop_assert!(added.is_empty(), "unexpected provenance tags {:?}", added);
        }
    }

    // ========================================================================
    // Relinking Properties
    // ========================================================================

    /// Property: copying an experiment preserves the parent forest
    #[test]
    fn prop_experiment_copy_preserves_topology(
        parents in proptest::collection::vec(proptest::option::of(any::<Index>()), 1..8)
    ) {
        let src = MemoryTrackingClient::new();
        let dst = MemoryTrackingClient::new();
        let exp = src.create_experiment("forest").unwrap();

        let mut src_ids: Vec<String> = Vec::new();
        let mut src_parent_of: Vec<Option<usize>> = Vec::new();
        for (pos, parent) in parents.iter().enumerate() {
            let parent = parent.filter(|_| pos > 0).map(|ix| ix.index(pos));
            let tags: Vec<RunTag> = parent
                .map(|p| RunTag::new(PARENT_RUN_ID_TAG, src_ids[p].as_str()))
                .into_iter()
                .collect();
            let run = src.create_run(exp.experiment_id()).unwrap();
            src.log_batch(run.run_id(), &[], &[Param::new("pos", pos.to_string())], &tags)
                .unwrap();
            src_ids.push(run.run_id().to_string());
            src_parent_of.push(parent);
        }

        let report = ExperimentCopier::new(&src, &dst)
            .copy_experiment("forest", "forest-copy")
            .unwrap();

        let linked = src_parent_of.iter().filter(|p| p.is_some()).count();
        prop_assert_eq!(report.runs.len(), parents.len());
        prop_assert_eq!(report.relinked_parents, linked);
        for (pos, parent) in src_parent_of.iter().enumerate() {
            let dst_id = report.runs.dst_run_id(&src_ids[pos]).unwrap();
            let dst_run = dst.get_run(dst_id).unwrap();
            let expected = parent.map(|p| report.runs.dst_run_id(&src_ids[p]).unwrap());
            prop_assert_eq!(dst_run.data().tag(PARENT_RUN_ID_TAG), expected);
        }
    }
}
