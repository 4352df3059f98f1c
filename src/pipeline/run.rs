//! Per-request run lifecycle

use crate::Error;

/// Stage of a single run
///
/// Runs only move forward: `Received -> SttDone -> BackendDone ->
/// Accumulated -> Segmented -> Synthesizing(n)* -> Complete`, or to
/// `Failed` from anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Received,
    SttDone,
    BackendDone,
    Accumulated,
    Segmented,
    /// Synthesizing the sentence with this 1-based index
    Synthesizing(usize),
    Complete,
    Failed,
}

impl RunStage {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::SttDone => "stt_done",
            Self::BackendDone => "backend_done",
            Self::Accumulated => "accumulated",
            Self::Segmented => "segmented",
            Self::Synthesizing(_) => "synthesizing",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }

    const fn rank(self) -> usize {
        match self {
            Self::Received => 0,
            Self::SttDone => 1,
            Self::BackendDone => 2,
            Self::Accumulated => 3,
            Self::Segmented => 4,
            Self::Synthesizing(_) => 5,
            Self::Complete | Self::Failed => 6,
        }
    }
}

/// One request's trip through the pipeline
#[derive(Debug, Clone)]
pub struct PipelineRun {
    request_id: String,
    stage: RunStage,
}

impl PipelineRun {
    #[must_use]
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            stage: RunStage::Received,
        }
    }

    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    #[must_use]
    pub const fn stage(&self) -> RunStage {
        self.stage
    }

    /// Move to `next`; backwards moves and moves out of a terminal stage are refused
    pub fn advance(&mut self, next: RunStage) -> bool {
        let forward = match (self.stage, next) {
            (RunStage::Synthesizing(current), RunStage::Synthesizing(n)) => n >= current,
            (current, next) => next.rank() > current.rank() || next == RunStage::Failed,
        };

        if self.stage.is_terminal() || !forward {
            tracing::warn!(
                request_id = %self.request_id,
                from = ?self.stage,
                to = ?next,
                "refusing run stage transition"
            );
            return false;
        }

        tracing::debug!(request_id = %self.request_id, from = ?self.stage, to = ?next, "run stage");
        self.stage = next;
        true
    }

    /// Terminate the run as failed
    pub fn fail(&mut self, error: &Error) {
        tracing::warn!(
            request_id = %self.request_id,
            stage = self.stage.name(),
            error = %error,
            "run failed"
        );
        self.advance(RunStage::Failed);
    }
}
