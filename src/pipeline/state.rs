//! Pipeline State Machine
//!
//! Explicit phase machine for one unit of work, observable through a watch
//! channel. Phase transitions are validated; every transition is appended to
//! an event log for diagnostics.

use std::sync::Mutex;

use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use crate::{now_rfc3339, CoreError, CoreResult};

// =============================================================================
// Phases
// =============================================================================

/// Phase of one pipeline unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    Preparing,
    Analyzing,
    GeneratingSuggestions,
    /// Suspend point: an external selection resumes the flow
    AwaitingSelection,
    Transforming,
    Finalizing,
    Completed,
    /// Recoverable failure state; the fallback path re-enters the flow
    Error,
}

impl PipelinePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelinePhase::Preparing => "preparing",
            PipelinePhase::Analyzing => "analyzing",
            PipelinePhase::GeneratingSuggestions => "generating_suggestions",
            PipelinePhase::AwaitingSelection => "awaiting_selection",
            PipelinePhase::Transforming => "transforming",
            PipelinePhase::Finalizing => "finalizing",
            PipelinePhase::Completed => "completed",
            PipelinePhase::Error => "error",
        }
    }

    /// Human-readable status label shown alongside progress
    pub fn label(&self) -> &'static str {
        match self {
            PipelinePhase::Preparing => "Preparing photo",
            PipelinePhase::Analyzing => "Analyzing photo",
            PipelinePhase::GeneratingSuggestions => "Generating suggestions",
            PipelinePhase::AwaitingSelection => "Ready for selection",
            PipelinePhase::Transforming => "Transforming",
            PipelinePhase::Finalizing => "Finalizing result",
            PipelinePhase::Completed => "Done",
            PipelinePhase::Error => "Recovering",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelinePhase::Completed)
    }

    /// Baseline pipeline progress on entering this phase. Transforming spans
    /// up to the Finalizing baseline, driven by the job's own feed.
    pub fn base_progress(&self) -> f64 {
        match self {
            PipelinePhase::Preparing => 0.0,
            PipelinePhase::Analyzing => 0.1,
            PipelinePhase::GeneratingSuggestions => 0.4,
            PipelinePhase::AwaitingSelection => 0.6,
            PipelinePhase::Transforming => 0.6,
            PipelinePhase::Finalizing => 0.95,
            PipelinePhase::Completed => 1.0,
            PipelinePhase::Error => 0.0,
        }
    }

    /// Whether moving to `next` is a legal transition.
    ///
    /// The forward chain advances one phase at a time; `Error` is reachable
    /// from any non-terminal phase and exits anywhere back into the flow
    /// (fallback recovery); `Preparing` is re-enterable from any phase
    /// ("try again" restarts the unit of work).
    pub fn can_transition_to(&self, next: PipelinePhase) -> bool {
        if next == PipelinePhase::Preparing {
            return true;
        }
        let forward = match self {
            PipelinePhase::Preparing => next == PipelinePhase::Analyzing,
            PipelinePhase::Analyzing => next == PipelinePhase::GeneratingSuggestions,
            PipelinePhase::GeneratingSuggestions => next == PipelinePhase::AwaitingSelection,
            PipelinePhase::AwaitingSelection => next == PipelinePhase::Transforming,
            PipelinePhase::Transforming => next == PipelinePhase::Finalizing,
            PipelinePhase::Finalizing => next == PipelinePhase::Completed,
            PipelinePhase::Completed => false,
            PipelinePhase::Error => next != PipelinePhase::Error,
        };
        forward
            || (next == PipelinePhase::Error
                && !self.is_terminal()
                && *self != PipelinePhase::Error)
    }
}

impl std::fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Observable State
// =============================================================================

/// Published view of one unit of work
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSnapshot {
    pub phase: PipelinePhase,
    /// Overall pipeline progress in [0, 1]
    pub progress: f64,
    pub status_label: String,
}

/// One entry in the transition log
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineEvent {
    pub phase: PipelinePhase,
    pub at: String,
    pub detail: Option<String>,
}

/// Validated, observable phase machine for one unit of work.
///
/// Readers subscribe to the watch channel; writers drive transitions through
/// `transition`/`fail`. Progress only regresses when the unit restarts at
/// `Preparing`.
#[derive(Debug)]
pub struct PipelineState {
    tx: watch::Sender<PipelineSnapshot>,
    events: Mutex<Vec<PipelineEvent>>,
}

impl PipelineState {
    pub fn new() -> Self {
        Self::starting_at(PipelinePhase::Preparing)
    }

    /// State resuming at a later phase, for units of work entering mid-flow
    /// (a transform job starts at the selection suspend point).
    pub fn starting_at(phase: PipelinePhase) -> Self {
        let snapshot = PipelineSnapshot {
            phase,
            progress: phase.base_progress(),
            status_label: phase.label().to_string(),
        };
        let (tx, _) = watch::channel(snapshot);

        let state = Self {
            tx,
            events: Mutex::new(Vec::new()),
        };
        state.push_event(phase, None);
        state
    }

    pub fn phase(&self) -> PipelinePhase {
        self.tx.borrow().phase
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PipelineSnapshot> {
        self.tx.subscribe()
    }

    /// Copy of the transition log
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Advances to the next phase, or fails with `InvalidStateTransition`.
    pub fn transition(&self, next: PipelinePhase) -> CoreResult<()> {
        self.transition_with(next, None)
    }

    /// Enters `Error`, recording the failure text in the event log.
    pub fn fail(&self, detail: impl Into<String>) -> CoreResult<()> {
        self.transition_with(PipelinePhase::Error, Some(detail.into()))
    }

    fn transition_with(&self, next: PipelinePhase, detail: Option<String>) -> CoreResult<()> {
        let current = self.phase();
        if !current.can_transition_to(next) {
            return Err(CoreError::InvalidStateTransition(format!(
                "{} -> {}",
                current, next
            )));
        }

        debug!(from = %current, to = %next, "pipeline transition");
        self.push_event(next, detail);

        self.tx.send_modify(|snapshot| {
            let restarted = next == PipelinePhase::Preparing;
            let base = next.base_progress();
            snapshot.phase = next;
            snapshot.status_label = next.label().to_string();
            snapshot.progress = if restarted {
                base
            } else {
                snapshot.progress.max(base)
            };
        });
        Ok(())
    }

    /// Maps a transform job's own progress feed into the Transforming span of
    /// overall progress. Ignored outside the Transforming phase.
    pub fn set_transform_progress(&self, job_progress: f64) {
        let job_progress = if job_progress.is_finite() {
            job_progress.clamp(0.0, 1.0)
        } else {
            return;
        };

        self.tx.send_if_modified(|snapshot| {
            if snapshot.phase != PipelinePhase::Transforming {
                return false;
            }
            let floor = PipelinePhase::Transforming.base_progress();
            let ceiling = PipelinePhase::Finalizing.base_progress();
            let mapped = floor + job_progress * (ceiling - floor);
            if mapped > snapshot.progress {
                snapshot.progress = mapped;
                true
            } else {
                false
            }
        });
    }

    fn push_event(&self, phase: PipelinePhase, detail: Option<String>) {
        self.events.lock().unwrap().push(PipelineEvent {
            phase,
            at: now_rfc3339(),
            detail,
        });
    }
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::new()
    }
}
