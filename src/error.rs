//! Errors that stop an operation outright. Generation-time failures never
//! appear here: they are folded into pipeline state instead.
use crate::model::Surface;
use crate::pipeline::PipelineStatus;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("topic must be non-empty")]
    EmptyTopic,
    #[error("at least one surface must be enabled")]
    NoSurfaces,
    #[error("no active connection to the content service")]
    NotConnected,
}

impl SubmitError {
    /// Validation failures are the caller's input; everything else needs
    /// remediation outside the request.
    pub fn is_validation(&self) -> bool {
        matches!(self, SubmitError::EmptyTopic | SubmitError::NoSurfaces)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefineError {
    #[error("{surface} is {status}; refinement needs a completed result")]
    NotCompleted {
        surface: Surface,
        status: PipelineStatus,
    },
    #[error("{surface} has no text to refine")]
    EmptyText { surface: Surface },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("{surface} is {status}; only completed output can be scheduled")]
    NotCompleted {
        surface: Surface,
        status: PipelineStatus,
    },
}
