//! Source-to-destination run id remapping

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::TrackingClient;
use crate::tags::PARENT_RUN_ID_TAG;
use crate::Result;

/// Outcome of copying one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopiedRun {
    /// Run id in the source store
    pub src_run_id: String,
    /// Newly created run id in the destination store
    pub dst_run_id: String,
    /// Source value of the parent-link tag, if the source run had one
    pub src_parent_run_id: Option<String>,
}

/// Remapping table built while copying a batch of runs.
///
/// Parent links are only rewritten by [`RunIdMapping::relink_parents`], once
/// every run of the batch is in the table.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunIdMapping {
    runs: Vec<CopiedRun>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl RunIdMapping {
    /// Create an empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a copied run. A repeated source id replaces the earlier entry.
    pub fn insert(&mut self, copied: CopiedRun) {
        if let Some(&slot) = self.index.get(&copied.src_run_id) {
            self.runs[slot] = copied;
        } else {
            self.index.insert(copied.src_run_id.clone(), self.runs.len());
            self.runs.push(copied);
        }
    }

    /// Destination id of a source run copied in this batch.
    #[must_use]
    pub fn dst_run_id(&self, src_run_id: &str) -> Option<&str> {
        self.index
            .get(src_run_id)
            .map(|&slot| self.runs[slot].dst_run_id.as_str())
    }

    /// Copied runs in copy order.
    #[must_use]
    pub fn runs(&self) -> &[CopiedRun] {
        &self.runs
    }

    /// Number of copied runs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// Whether no run was copied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Point each copied child at its parent's destination id.
    ///
    /// Parents outside the batch keep their source id. Returns the number of
    /// runs relinked.
    ///
    /// # Errors
    ///
    /// Returns the first tag write failure; earlier relinks stay applied
    pub fn relink_parents(&self, dst: &dyn TrackingClient) -> Result<usize> {
        let mut relinked = 0;
        for run in &self.runs {
            let Some(src_parent) = run.src_parent_run_id.as_deref() else {
                continue;
            };
            match self.dst_run_id(src_parent) {
                Some(dst_parent) => {
                    dst.set_tag(&run.dst_run_id, PARENT_RUN_ID_TAG, dst_parent)?;
                    debug!(
                        dst_run_id = %run.dst_run_id,
                        src_parent,
                        dst_parent,
                        "relinked parent run"
                    );
                    relinked += 1;
                }
                None => debug!(
                    dst_run_id = %run.dst_run_id,
                    src_parent,
                    "parent run not in batch; keeping source id"
                ),
            }
        }
        Ok(relinked)
    }
}
