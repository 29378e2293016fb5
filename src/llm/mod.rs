//! LM client contract: the two operations the extraction core needs.
//!
//! The core is polymorphic over [`LmClient`] and never branches on backend
//! identity. Every backend failure surfaces as a [`ClientError`]; the
//! refiner treats all of them identically (partial results are preserved,
//! retry policy belongs to the client, not the core).

pub mod ollama;

use miette::Diagnostic;
use thiserror::Error;

use crate::domain::{FewShotExample, TypeSchema};
use crate::triple::RawItem;

pub use ollama::{OllamaClient, OllamaConfig};

/// Errors from an LM backend. One category, one recovery policy.
#[derive(Debug, Error, Diagnostic)]
pub enum ClientError {
    #[error("LM backend is not available at {url}")]
    #[diagnostic(
        code(kgw::llm::unavailable),
        help("Start the backend (e.g. `ollama serve`) or point --base-url at a running one.")
    )]
    Unavailable { url: String },

    #[error("LM request failed: {message}")]
    #[diagnostic(
        code(kgw::llm::request_failed),
        help("Check that the backend is running and the model is pulled.")
    )]
    RequestFailed { message: String },

    #[error("failed to parse LM response: {message}")]
    #[diagnostic(
        code(kgw::llm::parse_error),
        help("The model returned an unexpected response format.")
    )]
    ParseError { message: String },

    #[error("LM request timed out after {timeout_secs}s")]
    #[diagnostic(
        code(kgw::llm::timeout),
        help("Increase the timeout or use a smaller model.")
    )]
    Timeout { timeout_secs: u64 },

    #[error("LM request was cancelled")]
    #[diagnostic(
        code(kgw::llm::cancelled),
        help("The in-flight request was interrupted by a cancellation signal.")
    )]
    Cancelled,
}

/// Convenience alias for client operation results.
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// An LM backend capable of the two operations the core consumes.
///
/// Both operations are synchronous from the core's perspective; per-call
/// timeouts are the client's responsibility.
pub trait LmClient: Send + Sync {
    /// Stable identifier of the backing model, recorded in metadata.
    fn model_identifier(&self) -> String;

    /// Grounded extraction over source text: items MAY carry char spans.
    fn extract_grounded(
        &self,
        text: &str,
        prompt: &str,
        examples: &[FewShotExample],
        schema: Option<&TypeSchema>,
        temperature: f32,
    ) -> ClientResult<Vec<RawItem>>;

    /// Ungrounded JSON generation from a fully substituted prompt.
    fn generate_json(
        &self,
        prompt: &str,
        schema: Option<&TypeSchema>,
        temperature: f32,
    ) -> ClientResult<Vec<RawItem>>;
}

/// Recover a JSON array of triple items from free-form LM output.
///
/// Models wrap JSON in prose or code fences often enough that the raw
/// response cannot be fed straight to the deserializer; scan for the
/// outermost array instead. A response with no array at all is a parse
/// error; an array element that is not item-shaped becomes an empty item so
/// the validation layer counts it as dropped.
pub fn parse_items(response: &str) -> ClientResult<Vec<RawItem>> {
    let trimmed = response.trim();
    let json_str = if trimmed.starts_with('[') {
        trimmed
    } else {
        let start = trimmed.find('[');
        let end = trimmed.rfind(']');
        match (start, end) {
            (Some(s), Some(e)) if e > s => &trimmed[s..=e],
            _ => {
                return Err(ClientError::ParseError {
                    message: "no JSON array found in response".into(),
                });
            }
        }
    };

    let values: Vec<serde_json::Value> =
        serde_json::from_str(json_str).map_err(|e| ClientError::ParseError {
            message: format!("JSON parse error: {e}"),
        })?;

    Ok(values
        .into_iter()
        .map(|value| match serde_json::from_value::<RawItem>(value) {
            Ok(item) => item,
            Err(e) => {
                tracing::warn!(error = %e, "non-item element in LM array");
                RawItem::default()
            }
        })
        .collect())
}
