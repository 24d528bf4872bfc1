//! Batch lifecycle and reporting.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{BatchId, Effect, JobOutcome};

/// Phase of the batch orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case", tag = "phase")]
pub enum BatchPhase {
    /// No batch has been launched yet
    #[default]
    Idle,
    /// Jobs launched, none finished
    Running { total: usize },
    /// At least one job finished, `pending` still outstanding
    Draining { pending: usize },
    /// Every job reached a terminal outcome
    Complete,
}

impl BatchPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchPhase::Idle => "idle",
            BatchPhase::Running { .. } => "running",
            BatchPhase::Draining { .. } => "draining",
            BatchPhase::Complete => "complete",
        }
    }

    /// Whether a batch is in flight.
    pub fn is_active(&self) -> bool {
        matches!(self, BatchPhase::Running { .. } | BatchPhase::Draining { .. })
    }
}

impl fmt::Display for BatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Summary of a finished batch.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BatchReport {
    pub batch_id: BatchId,
    pub total: usize,
    /// Outcomes in completion order
    pub outcomes: Vec<JobOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.success).count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }

    /// Order-independent view of the outcomes.
    pub fn outcome_set(&self) -> Vec<(Effect, bool)> {
        let mut set: Vec<_> = self.outcomes.iter().map(|o| (o.effect, o.success)).collect();
        set.sort();
        set
    }
}
