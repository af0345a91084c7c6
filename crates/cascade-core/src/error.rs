use derive_more::From;
use orion_error::{ErrorCode, StructError, UvsReason};

/// Error kinds raised by the cascade engine. Per-rule failures (an
/// unresolved API, an empty caller set) are not represented here — they
/// are recoverable stage-fail conditions handled inline by
/// [`crate::evaluator::run`]. `CascadeReason` is reserved for
/// conditions a rule's cascade cannot recover from on its own.
#[derive(Debug, Clone, PartialEq, thiserror::Error, From)]
pub enum CascadeReason {
    #[error("call-graph search error")]
    GraphSearch,
    #[error("rule evaluation error")]
    RuleExec,
    #[error("{0}")]
    Uvs(UvsReason),
}

impl ErrorCode for CascadeReason {
    fn error_code(&self) -> i32 {
        match self {
            Self::GraphSearch => 3001,
            Self::RuleExec => 3002,
            Self::Uvs(u) => u.error_code(),
        }
    }
}

pub type CascadeError = StructError<CascadeReason>;
pub type CascadeResult<T> = Result<T, CascadeError>;

/// The empty-caller-set condition from the error taxonomy: one or both
/// sides handed to [`crate::callgraph::find_mutual_parents`] were empty.
/// This is distinct from "searched but found nothing" — callers treat it
/// as a stage-4 fail, never as a fatal error (see crate-level docs).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmptyCallerSet;
