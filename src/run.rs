//! Per-run state: identity, state machine, events and cancellation

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Unique identifier of one pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a run is in its lifecycle
///
/// `Idle -> StageRunning(0) -> ... -> StageRunning(n-1) -> Validating -> Completed`,
/// with `Failed` reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    Idle,
    StageRunning { index: usize },
    Validating,
    Completed,
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed)
    }

    pub fn can_transition_to(self, next: RunState) -> bool {
        use RunState::*;
        match (self, next) {
            (Completed | Failed, _) => false,
            (_, Failed) => true,
            (Idle, StageRunning { index }) => index == 0,
            (StageRunning { index: a }, StageRunning { index: b }) => b == a + 1,
            (StageRunning { .. }, Validating) => true,
            (Validating, Completed) => true,
            _ => false,
        }
    }
}

/// Progress notifications emitted while a run executes
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    RunStarted { run_id: RunId, stages: usize },
    StateChanged { run_id: RunId, state: RunState },
    StageStarted { run_id: RunId, stage: String, role: String },
    StageCompleted { run_id: RunId, stage: String, output_len: usize },
    StageFailed { run_id: RunId, stage: String, error: String },
    RunCompleted { run_id: RunId, activities: usize },
    RunFailed { run_id: RunId, error: String },
}

/// Cooperative cancellation, checked between stages
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Tracks a single run's state and reports transitions
pub(crate) struct RunTracker {
    pub id: RunId,
    state: RunState,
    event_tx: Option<mpsc::UnboundedSender<RunEvent>>,
}

impl RunTracker {
    pub fn new(event_tx: Option<mpsc::UnboundedSender<RunEvent>>) -> Self {
        Self {
            id: RunId::new(),
            state: RunState::Idle,
            event_tx,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn transition(&mut self, next: RunState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal run transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(run_id = %self.id, from = ?self.state, to = ?next, "Run state change");
        self.state = next;
        self.emit(RunEvent::StateChanged {
            run_id: self.id,
            state: next,
        });
    }

    pub fn emit(&self, event: RunEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }
}
