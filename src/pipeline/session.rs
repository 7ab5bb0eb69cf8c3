//! Per-photo session state and the events delivered to the caller.

use crate::error::Error;
use crate::gate::GateDecision;
use crate::inference::PredictionSet;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

/// Identity of one classification session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SessionId(pub(crate) u64);

impl SessionId {
    /// Numeric value of the id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a session is in the classification flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Created, nothing started yet.
    Idle,
    /// Building the gate model's input tensor.
    Preprocessing,
    /// Gate model running.
    GateInference,
    /// Gate decision available.
    GateEvaluated,
    /// Gate rejected the photo; waiting for the user to cancel or bypass.
    AwaitingUserChoice,
    /// User chose to continue despite the rejection.
    BypassAccepted,
    /// Species model running.
    SpeciesInference,
    /// Species predictions available.
    Done,
    /// User cancelled after a rejection.
    Cancelled,
    /// An asset or inference error ended the session.
    Failed,
}

impl Phase {
    /// Whether the session can no longer make progress.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Cancelled | Self::Failed)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Preprocessing => "preprocessing",
            Self::GateInference => "gate inference",
            Self::GateEvaluated => "gate evaluated",
            Self::AwaitingUserChoice => "awaiting user choice",
            Self::BypassAccepted => "bypass accepted",
            Self::SpeciesInference => "species inference",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// How the caller resolves a gate rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateChoice {
    /// Drop the session.
    Cancel,
    /// Run species identification anyway.
    Bypass,
}

/// Snapshot of one session's state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationSession {
    /// Session identity.
    pub id: SessionId,
    /// Width of the submitted photo.
    pub photo_width: u32,
    /// Height of the submitted photo.
    pub photo_height: u32,
    /// Gate model top-K, once evaluated.
    pub gate_predictions: Option<PredictionSet>,
    /// Gate decision, once evaluated.
    pub decision: Option<GateDecision>,
    /// Whether the user overrode a rejection in this session.
    pub bypass: bool,
    /// Species top-K, once identified.
    pub species_predictions: Option<PredictionSet>,
    /// Current phase.
    pub phase: Phase,
    /// Error message when the session failed.
    pub failure: Option<String>,
}

/// Something the caller can observe about its session.
#[derive(Debug)]
pub enum SessionEvent {
    /// Gate output and decision; sent whether or not the photo was accepted.
    GateEvaluated {
        /// Gate model top-K.
        predictions: PredictionSet,
        /// Heuristic outcome.
        decision: GateDecision,
    },
    /// The gate rejected the photo; resolve with
    /// [`Orchestrator::resolve_gate_rejection`](crate::pipeline::Orchestrator::resolve_gate_rejection).
    AwaitingUserChoice,
    /// Final species guess.
    SpeciesIdentified {
        /// Species model top-K.
        predictions: PredictionSet,
        /// Whether the gate was bypassed to get here.
        bypassed: bool,
    },
    /// The session was cancelled after a rejection.
    Cancelled,
    /// The session failed.
    Failed(Error),
}

/// Caller's side of a session: its id and event stream.
#[derive(Debug)]
pub struct SessionHandle {
    pub(crate) id: SessionId,
    pub(crate) events: mpsc::UnboundedReceiver<SessionEvent>,
}

impl SessionHandle {
    /// Session identity.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once the session has ended, was cancelled, or was
    /// superseded by a newer photo.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }
}

/// Orchestrator-side state of the current session.
pub(crate) struct ActiveSession {
    pub(crate) state: ClassificationSession,
    events: Option<mpsc::UnboundedSender<SessionEvent>>,
    pub(crate) choice: Option<oneshot::Sender<GateChoice>>,
}

impl ActiveSession {
    pub(crate) fn new(
        id: SessionId,
        photo_width: u32,
        photo_height: u32,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            state: ClassificationSession {
                id,
                photo_width,
                photo_height,
                gate_predictions: None,
                decision: None,
                bypass: false,
                species_predictions: None,
                phase: Phase::Idle,
                failure: None,
            },
            events: Some(events),
            choice: None,
        }
    }

    /// Send an event. A caller that dropped its handle is not an error.
    pub(crate) fn send(&self, event: SessionEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }

    /// Close the event stream after the final event.
    pub(crate) fn close(&mut self) {
        self.events = None;
        self.choice = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_starts_idle_without_bypass() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let active = ActiveSession::new(SessionId(3), 640, 480, tx);
        assert_eq!(active.state.phase, Phase::Idle);
        assert!(!active.state.bypass);
        assert_eq!(active.state.id.to_string(), "#3");
    }

    #[test]
    fn test_terminal_phases() {
        assert!(Phase::Done.is_terminal());
        assert!(Phase::Cancelled.is_terminal());
        assert!(Phase::Failed.is_terminal());
        assert!(!Phase::AwaitingUserChoice.is_terminal());
        assert!(!Phase::Idle.is_terminal());
    }

    #[tokio::test]
    async fn test_closed_session_ends_event_stream() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut active = ActiveSession::new(SessionId(1), 1, 1, tx);
        let mut handle = SessionHandle {
            id: SessionId(1),
            events: rx,
        };

        active.send(SessionEvent::Cancelled);
        active.close();

        assert!(matches!(handle.next_event().await, Some(SessionEvent::Cancelled)));
        assert!(handle.next_event().await.is_none());
    }
}
