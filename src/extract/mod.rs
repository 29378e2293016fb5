//! Extraction engine: initial LM extraction plus connectivity refinement.
//!
//! [`initial::extract_initial`] performs the one-shot grounded extraction;
//! [`refine::refine`] iteratively asks the LM for bridging triples until the
//! graph is connected to within tolerance or a stop condition fires.

pub mod initial;
pub mod refine;

use miette::Diagnostic;
use thiserror::Error;

use crate::error::ResourceError;
use crate::llm::ClientError;

pub use initial::{InitialExtraction, extract_initial};
pub use refine::{
    CancelToken, IterationRecord, IterationStatus, RefinementGoal, RefinementTrace, StopReason,
    refine,
};

/// Errors from the initial extraction phase.
///
/// Refinement has no error type: per-iteration client failures are absorbed
/// into the trace and partial results are returned instead.
#[derive(Debug, Error, Diagnostic)]
pub enum ExtractError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Client(#[from] ClientError),
}

/// Convenience alias for extraction results.
pub type ExtractResult<T> = std::result::Result<T, ExtractError>;
