//! Error taxonomy for a correlation call.
//!
//! Every variant is terminal for the call. Nothing is retried here; a caller
//! that wants a retry re-invokes the correlation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a correlation call is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorrelationPhase {
    Idle,
    Evaluating,
    ZeroMatchCheck,
    Authorizing,
    Instantiating,
    Done,
}

impl fmt::Display for CorrelationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CorrelationPhase::Idle => "idle",
            CorrelationPhase::Evaluating => "evaluating",
            CorrelationPhase::ZeroMatchCheck => "zero_match_check",
            CorrelationPhase::Authorizing => "authorizing",
            CorrelationPhase::Instantiating => "instantiating",
            CorrelationPhase::Done => "done",
        };
        f.write_str(s)
    }
}

/// One match rejected by the authorization gate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Denial {
    pub definition_id: String,
    pub start_event_id: String,
    pub reason: String,
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (start event '{}'): {}",
            self.definition_id, self.start_event_id, self.reason
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CorrelationError {
    #[error("Invalid correlation request: {0}")]
    InvalidRequest(String),

    #[error("Condition evaluation failed: {0}")]
    EvaluationError(#[source] anyhow::Error),

    #[error("No process instances were started during correlation of the conditional start events")]
    NoMatches,

    #[error(
        "Not authorized to start {} of {} matched definition(s): {}",
        .denied.len(),
        .matched,
        join_denials(.denied)
    )]
    AuthorizationFailed { matched: usize, denied: Vec<Denial> },

    #[error("Start event '{start_event_id}' not found in process definition {definition_id}")]
    StartEventNotFound {
        definition_id: String,
        start_event_id: String,
    },

    #[error("Process instantiation failed: {0}")]
    InstantiationError(#[source] anyhow::Error),
}

impl CorrelationError {
    /// The phase in which the call failed.
    pub fn phase(&self) -> CorrelationPhase {
        match self {
            CorrelationError::InvalidRequest(_) => CorrelationPhase::Idle,
            CorrelationError::EvaluationError(_) => CorrelationPhase::Evaluating,
            CorrelationError::NoMatches => CorrelationPhase::ZeroMatchCheck,
            CorrelationError::AuthorizationFailed { .. } => CorrelationPhase::Authorizing,
            CorrelationError::StartEventNotFound { .. }
            | CorrelationError::InstantiationError(_) => CorrelationPhase::Instantiating,
        }
    }
}

fn join_denials(denied: &[Denial]) -> String {
    denied
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
