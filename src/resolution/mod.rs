//! Canonicalization cache: normalize, diff against the mapping store, ask the
//! oracle about the gaps, merge, persist, apply.

pub mod orchestrator;
pub mod policy;

pub use orchestrator::{apply_mapping, diff_unseen, merge_answer, MergeSummary, ResolutionOrchestrator, ResolutionOutcome};
pub use policy::{CategoryPolicy, ManufacturerPolicy, Rejection, ResolutionPolicy, UNKNOWN};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Loaded,
    Diffed,
    Resolved,
    SkippedResolution,
    Persisted,
    Applied,
}

/// An oracle answer that failed validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedKey {
    pub key: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub policy: String,
    pub started_at: String,
    pub records: usize,
    pub distinct_keys: usize,
    /// Records whose raw value was absent, blank or not a string.
    pub empty_keys: usize,
    pub unseen: usize,
    pub resolved: usize,
    pub rejected: Vec<RejectedKey>,
    /// Unseen keys still absent after the merge; they are retried next run.
    pub unresolved: Vec<String>,
    pub oracle_calls: usize,
    pub mapping_size_before: usize,
    pub mapping_size_after: usize,
    /// Phases entered, in order.
    pub phases: Vec<RunPhase>,
    pub elapsed_ms: u64,
}

impl RunReport {
    pub fn start(policy: &str, records: usize) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            policy: policy.to_string(),
            started_at: Utc::now().to_rfc3339(),
            records,
            distinct_keys: 0,
            empty_keys: 0,
            unseen: 0,
            resolved: 0,
            rejected: Vec::new(),
            unresolved: Vec::new(),
            oracle_calls: 0,
            mapping_size_before: 0,
            mapping_size_after: 0,
            phases: Vec::new(),
            elapsed_ms: 0,
        }
    }

    pub fn enter(&mut self, phase: RunPhase) {
        self.phases.push(phase);
    }
}
