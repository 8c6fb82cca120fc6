//! Operation slot
//!
//! Holds the one translation operation a session may have at a time: either a
//! pending debounce timer or an in-flight request. Claiming the slot aborts
//! whatever held it before, and a task that lost the slot finds out by
//! comparing its id before it touches shared state.
//!
//! The slot lives inside the session mutex, so checking `is_active` and then
//! mutating the output happen atomically with respect to cancellation.

use log::{debug, info};
use std::time::Instant;
use tokio::task::JoinHandle;

/// Represents the current phase of the translation operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationPhase {
    /// Nothing scheduled or in flight
    Idle,
    /// Waiting for the quiet period to elapse
    Scheduled {
        operation_id: u64,
        started_at: Instant,
    },
    /// Request sent, response being streamed
    Streaming {
        operation_id: u64,
        started_at: Instant,
    },
}

impl OperationPhase {
    pub fn operation_id(&self) -> Option<u64> {
        match self {
            OperationPhase::Idle => None,
            OperationPhase::Scheduled { operation_id, .. } => Some(*operation_id),
            OperationPhase::Streaming { operation_id, .. } => Some(*operation_id),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, OperationPhase::Idle)
    }
}

pub struct OperationSlot {
    /// Monotonically increasing; each claim gets a fresh id.
    next_operation_id: u64,

    phase: OperationPhase,

    /// Task driving the current operation, aborted on cancel.
    task: Option<JoinHandle<()>>,
}

impl Default for OperationSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationSlot {
    pub fn new() -> Self {
        Self {
            next_operation_id: 1,
            phase: OperationPhase::Idle,
            task: None,
        }
    }

    fn claim(&mut self, scheduled: bool) -> u64 {
        self.cancel();

        let operation_id = self.next_operation_id;
        self.next_operation_id += 1;
        let started_at = Instant::now();

        self.phase = if scheduled {
            OperationPhase::Scheduled {
                operation_id,
                started_at,
            }
        } else {
            OperationPhase::Streaming {
                operation_id,
                started_at,
            }
        };

        operation_id
    }

    /// Claim the slot for a debounced translation.
    pub fn schedule(&mut self) -> u64 {
        let operation_id = self.claim(true);
        debug!("Scheduled translation operation {}", operation_id);
        operation_id
    }

    /// Claim the slot for an immediate translation.
    pub fn start_streaming(&mut self) -> u64 {
        let operation_id = self.claim(false);
        debug!("Started translation operation {}", operation_id);
        operation_id
    }

    /// Record the task driving `operation_id`. A task for a superseded
    /// operation is aborted straight away.
    pub fn attach(&mut self, operation_id: u64, task: JoinHandle<()>) {
        if self.is_active(operation_id) {
            self.task = Some(task);
        } else {
            task.abort();
        }
    }

    /// Move a scheduled operation on to streaming.
    ///
    /// Returns false if the operation has been superseded.
    pub fn transition_to_streaming(&mut self, operation_id: u64) -> bool {
        if !self.is_active(operation_id) {
            debug!(
                "Operation {} is no longer active, skipping request",
                operation_id
            );
            return false;
        }

        if let OperationPhase::Scheduled { .. } = self.phase {
            self.phase = OperationPhase::Streaming {
                operation_id,
                started_at: Instant::now(),
            };
            debug!("Operation {} transitioned to streaming", operation_id);
        }
        true
    }

    /// Release the slot from inside the operation's own task. The task handle
    /// is dropped, not aborted.
    pub fn complete(&mut self, operation_id: u64) -> bool {
        if !self.is_active(operation_id) {
            debug!(
                "Operation {} was already superseded, not marking as complete",
                operation_id
            );
            return false;
        }

        if let OperationPhase::Streaming { started_at, .. } = self.phase {
            info!(
                "Operation {} completed in {}ms",
                operation_id,
                started_at.elapsed().as_millis()
            );
        }
        self.phase = OperationPhase::Idle;
        self.task = None;
        true
    }

    /// Abort the current operation, if any, and return its id.
    pub fn cancel(&mut self) -> Option<u64> {
        let previous = self.phase.operation_id();
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Some(operation_id) = previous {
            debug!(
                "Cancelled operation {} (was in phase {:?})",
                operation_id, self.phase
            );
        }
        self.phase = OperationPhase::Idle;
        previous
    }

    pub fn is_active(&self, operation_id: u64) -> bool {
        self.phase.operation_id() == Some(operation_id)
    }

    pub fn has_active_operation(&self) -> bool {
        !self.phase.is_idle()
    }

    pub fn phase(&self) -> &OperationPhase {
        &self.phase
    }
}
