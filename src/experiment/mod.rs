//! Experiment Tracking Schema
//!
//! Read views and write payloads exchanged with a tracking store.
//!
//! ## Schema Overview
//!
//! ```text
//! Experiment (1) ──< Run (N)
//!                     │
//!                     ├── RunInfo   [id, owner, status, lifecycle]
//!                     └── RunData   [params, latest metrics, tags]
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use trueno_migrate::experiment::{Experiment, Metric, RunInfo, RunStatus};
//!
//! let experiment = Experiment::new("1", "My Experiment");
//!
//! let mut info = RunInfo::new("run-001", experiment.experiment_id());
//! let metric = Metric::builder("loss", 0.5).step(3).build();
//! assert_eq!(metric.step(), 3);
//!
//! info.terminate(RunStatus::Finished);
//! assert!(info.end_time().is_some());
//! ```

mod experiment_record;
mod metric_record;
mod run_record;

pub use experiment_record::Experiment;
pub use metric_record::{Metric, MetricBuilder};
pub use run_record::{
    LifecycleStage, Param, Run, RunData, RunInfo, RunStatus, RunTag, UNKNOWN_USER,
};
