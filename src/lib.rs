//! # trueno-migrate: Experiment-Tracking Run Migration
//!
//! Copies runs (params, metrics, tags, status, artifacts) between two
//! tracking stores whose run ids, experiment ids and users are unrelated.
//!
//! ## Design Principles
//!
//! - **New runs only**: a destination run is always created, never overwritten
//! - **Explicit clients**: source and destination are values passed into each
//!   copier, so either side can be swapped or tested alone
//! - **Two-phase relinking**: parent links are remapped only after every run
//!   of a batch is copied
//! - **Scoped staging**: artifacts pass through a temporary directory that is
//!   removed on every exit path
//!
//! ## Example Usage
//!
//! ```rust
//! use trueno_migrate::client::{MemoryTrackingClient, TrackingClient};
//! use trueno_migrate::copy::RunCopier;
//! use trueno_migrate::experiment::{Param, RunStatus};
//! use trueno_migrate::tags::TagPolicy;
//!
//! # fn main() -> trueno_migrate::Result<()> {
//! let src = MemoryTrackingClient::new();
//! let dst = MemoryTrackingClient::new();
//!
//! let exp = src.create_experiment("training")?;
//! let run = src.create_run(exp.experiment_id())?;
//! src.log_batch(run.run_id(), &[], &[Param::new("lr", "0.01")], &[])?;
//! src.set_terminated(run.run_id(), RunStatus::Finished)?;
//!
//! let copier = RunCopier::new(&src, &dst)
//!     .with_policy(TagPolicy::new().export_metadata_tags(true));
//! let copied = copier.copy_run(run.run_id(), "training-copy")?;
//!
//! let dst_run = dst.get_run(&copied.dst_run_id)?;
//! assert_eq!(dst_run.data().params()["lr"], "0.01");
//! assert_eq!(dst_run.info().status(), RunStatus::Finished);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod artifacts;
pub mod client;
pub mod copy;
pub mod error;
pub mod experiment;
pub mod export;
pub mod tags;

pub use error::{Error, ErrorCategory, Result};
