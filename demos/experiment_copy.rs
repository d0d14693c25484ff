//! Experiment Copy Example
//!
//! Builds a small hyperparameter sweep (one parent run, three child runs)
//! in an in-memory store, copies it into a directory store, and shows how
//! parent links are rewritten to the new run ids.
//!
//! Run with: cargo run --example experiment_copy

use trueno_migrate::client::{FileTrackingClient, MemoryTrackingClient, TrackingClient};
use trueno_migrate::copy::ExperimentCopier;
use trueno_migrate::experiment::{Metric, Param, RunStatus, RunTag};
use trueno_migrate::tags::{TagPolicy, PARENT_RUN_ID_TAG, RUN_NAME_TAG, USER_TAG};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("trueno_migrate=info")
        .with_writer(std::io::stderr)
        .init();

    println!("=== trueno-migrate Experiment Copy ===\n");

    // -------------------------------------------------------------------------
    // 1. Build a sweep in the source store
    // -------------------------------------------------------------------------
    println!("1. Creating source sweep...");

    let src = MemoryTrackingClient::new();
    let experiment = src.create_experiment("lr-sweep")?;
    let parent = src.create_run_for_user(experiment.experiment_id(), "alice")?;
    src.log_batch(
        parent.run_id(),
        &[],
        &[Param::new("model", "resnet50")],
        &[RunTag::new(RUN_NAME_TAG, "sweep")],
    )?;

    let trials = [("0.1", 0.4), ("0.01", 0.1), ("0.001", 0.25)];
    for (i, (lr, floor)) in trials.into_iter().enumerate() {
        let child = src.create_run_for_user(experiment.experiment_id(), "alice")?;
        let metrics: Vec<Metric> = (0..5_i32)
            .map(|epoch| {
                let loss = 2.0 / f64::from(epoch + 1) + floor;
                Metric::builder("loss", loss).step(i64::from(epoch)).build()
            })
            .collect();
        src.log_batch(
            child.run_id(),
            &metrics,
            &[Param::new("lr", lr)],
            &[
                RunTag::new(PARENT_RUN_ID_TAG, parent.run_id()),
                RunTag::new(RUN_NAME_TAG, format!("trial-{i}")),
            ],
        )?;
        src.set_terminated(child.run_id(), RunStatus::Finished)?;
        println!("   child {} lr={lr}", child.run_id());
    }
    src.set_terminated(parent.run_id(), RunStatus::Finished)?;
    println!("   parent {}", parent.run_id());

    // -------------------------------------------------------------------------
    // 2. Copy into a directory store
    // -------------------------------------------------------------------------
    println!("\n2. Copying experiment...");

    let store = tempfile::tempdir()?;
    let dst = FileTrackingClient::open(store.path())?;
    let policy = TagPolicy::new()
        .export_metadata_tags(true)
        .use_src_user_id(true);
    let report = ExperimentCopier::new(&src, &dst)
        .with_policy(policy)
        .copy_experiment("lr-sweep", "lr-sweep-copy")?;

    println!("   Destination experiment: {}", report.dst_experiment_id);
    println!("   Runs copied: {}", report.runs.len());
    println!("   Parent links rewritten: {}", report.relinked_parents);

    // -------------------------------------------------------------------------
    // 3. Inspect the copies
    // -------------------------------------------------------------------------
    println!("\n3. Destination runs:");

    for copied in report.runs.runs() {
        let run = dst.get_run(&copied.dst_run_id)?;
        println!(
            "   {} <- {} status={} user={} parent={}",
            copied.dst_run_id,
            copied.src_run_id,
            run.info().status(),
            run.data().tag(USER_TAG).unwrap_or("-"),
            run.data().tag(PARENT_RUN_ID_TAG).unwrap_or("-"),
        );
    }

    println!("\n4. Copy report:");
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
