//! Per-event handler state machine
//!
//! ```text
//! Received → Validated → (Transcribed) → Retrieved → Analyzed → Logged → Replied
//!     └──────────┴────────────┴──────────────┴───────────┴──────────────→ Failed
//! ```

use std::fmt;

use site_inspector_core::{AnalysisResult, Error, PipelineStage};

#[derive(Debug, Clone, PartialEq)]
pub enum HandlerState {
    Received,
    Validated,
    /// Voice reports only
    Transcribed,
    Retrieved,
    Analyzed,
    /// Log append attempted; a failed append does not fail the run
    Logged,
    Replied,
    Failed { stage: PipelineStage, error: Error },
}

impl HandlerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Replied | Self::Failed { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Validated => "validated",
            Self::Transcribed => "transcribed",
            Self::Retrieved => "retrieved",
            Self::Analyzed => "analyzed",
            Self::Logged => "logged",
            Self::Replied => "replied",
            Self::Failed { .. } => "failed",
        }
    }

    /// Whether `next` may follow `self`
    fn allows(&self, next: &HandlerState) -> bool {
        use HandlerState::*;
        match (self, next) {
            (_, Failed { .. }) => !self.is_terminal(),
            (Received, Validated) | (Received, Replied) => true,
            (Validated, Transcribed) | (Validated, Retrieved) => true,
            (Transcribed, Retrieved) => true,
            (Retrieved, Analyzed) => true,
            (Analyzed, Logged) => true,
            (Logged, Replied) => true,
            _ => false,
        }
    }
}

impl fmt::Display for HandlerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { stage, error } => write!(f, "failed({}: {})", stage, error),
            other => f.write_str(other.name()),
        }
    }
}

/// Result of handling one event
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// States visited, first is `Received`, last is terminal
    pub trail: Vec<HandlerState>,
    pub analysis: Option<AnalysisResult>,
}

impl RunOutcome {
    pub fn state(&self) -> &HandlerState {
        self.trail.last().unwrap_or(&HandlerState::Received)
    }

    pub fn is_replied(&self) -> bool {
        matches!(self.state(), HandlerState::Replied)
    }

    pub fn failure(&self) -> Option<(PipelineStage, &Error)> {
        match self.state() {
            HandlerState::Failed { stage, error } => Some((*stage, error)),
            _ => None,
        }
    }

    pub fn visited(&self, state: &HandlerState) -> bool {
        self.trail.contains(state)
    }
}

/// Tracks transitions of a single run
#[derive(Debug)]
pub(crate) struct Run {
    trail: Vec<HandlerState>,
    analysis: Option<AnalysisResult>,
}

impl Run {
    pub(crate) fn new() -> Self {
        Self {
            trail: vec![HandlerState::Received],
            analysis: None,
        }
    }

    pub(crate) fn current(&self) -> &HandlerState {
        self.trail.last().unwrap_or(&HandlerState::Received)
    }

    pub(crate) fn advance(&mut self, next: HandlerState) {
        let current = self.current();
        if !current.allows(&next) {
            // Programming error in the handler; keep going but make it visible
            tracing::error!(from = %current, to = %next, "Invalid handler transition");
        } else {
            tracing::debug!(from = %current, to = %next, "Handler transition");
        }
        self.trail.push(next);
    }

    pub(crate) fn set_analysis(&mut self, analysis: AnalysisResult) {
        self.analysis = Some(analysis);
    }

    pub(crate) fn replied(mut self) -> RunOutcome {
        self.advance(HandlerState::Replied);
        self.finish()
    }

    pub(crate) fn fail(mut self, stage: PipelineStage, error: Error) -> RunOutcome {
        self.advance(HandlerState::Failed { stage, error });
        self.finish()
    }

    fn finish(self) -> RunOutcome {
        RunOutcome {
            trail: self.trail,
            analysis: self.analysis,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use site_inspector_core::ValidationError;

    #[test]
    fn test_text_path() {
        let mut run = Run::new();
        for state in [
            HandlerState::Validated,
            HandlerState::Retrieved,
            HandlerState::Analyzed,
            HandlerState::Logged,
        ] {
            assert!(run.current().allows(&state));
            run.advance(state);
        }
        let outcome = run.replied();
        assert!(outcome.is_replied());
        assert!(!outcome.visited(&HandlerState::Transcribed));
    }

    #[test]
    fn test_failure_is_terminal() {
        let outcome = Run::new().fail(
            PipelineStage::Validation,
            ValidationError::EmptyInput.into(),
        );
        assert!(outcome.state().is_terminal());
        let (stage, _) = outcome.failure().unwrap();
        assert_eq!(stage, PipelineStage::Validation);
        assert!(!outcome.state().allows(&HandlerState::Replied));
    }

    #[test]
    fn test_skipping_analysis_not_allowed() {
        assert!(!HandlerState::Retrieved.allows(&HandlerState::Logged));
        assert!(!HandlerState::Validated.allows(&HandlerState::Analyzed));
    }
}
