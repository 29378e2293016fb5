//! Rich diagnostic error types for the kgweaver engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so users know exactly what
//! went wrong and how to fix it. The LM client error lives with the client in
//! [`crate::llm`]; everything else is defined here.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::llm::ClientError;

/// Top-level error type for the kgweaver engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text, source chains) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum KgwError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Pipeline(#[from] PipelineError),
}

// ---------------------------------------------------------------------------
// Domain resource errors
// ---------------------------------------------------------------------------

/// Errors raised while loading or validating a domain resource bundle.
///
/// Resource errors are always fatal: a missing or malformed domain cannot be
/// silently substituted, so they propagate unchanged to the caller.
#[derive(Debug, Error, Diagnostic)]
pub enum ResourceError {
    #[error("domain not found: \"{domain}\" (looked in {path})")]
    #[diagnostic(
        code(kgw::domain::not_found),
        help(
            "No directory for this domain exists under the domains root. \
             List available domains with `kgw domains list`, or create \
             `{path}/domain.toml`."
        )
    )]
    DomainNotFound { domain: String, path: String },

    #[error("failed to read resource file {path}")]
    #[diagnostic(
        code(kgw::domain::io),
        help("Check that the file exists and has read permissions.")
    )]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed resource file {path}: {message}")]
    #[diagnostic(
        code(kgw::domain::malformed),
        help(
            "The resource file could not be parsed. Fix the syntax error \
             reported above; domain files are TOML, few-shot example files \
             are JSON."
        )
    )]
    Malformed { path: PathBuf, message: String },

    #[error("domain \"{domain}\" has no \"{mode}\" extraction prompt")]
    #[diagnostic(
        code(kgw::domain::missing_prompt),
        help(
            "Add the prompt under the [prompts] table of the domain's \
             domain.toml, or request a mode the domain provides."
        )
    )]
    MissingPrompt { domain: String, mode: String },

    #[error("empty prompt \"{name}\" in domain \"{domain}\"")]
    #[diagnostic(
        code(kgw::domain::empty_prompt),
        help("Prompts must be non-empty strings. Fill in the prompt text.")
    )]
    EmptyPrompt { domain: String, name: String },

    #[error(
        "bridging prompt for domain \"{domain}\" is missing substitution site \"{site}\""
    )]
    #[diagnostic(
        code(kgw::domain::missing_substitution),
        help(
            "A bridging prompt must contain all three literal substitution \
             sites: {{num_components}}, {{component_info}}, and {{text}}."
        )
    )]
    MissingSubstitution { domain: String, site: String },

    #[error("invalid few-shot example {index} in {path}: {message}")]
    #[diagnostic(
        code(kgw::domain::invalid_example),
        help(
            "Each few-shot example needs a non-empty source span and at least \
             one triple with non-empty head, relation, and tail."
        )
    )]
    InvalidExample {
        path: PathBuf,
        index: usize,
        message: String,
    },
}

/// Convenience alias for resource-loading results.
pub type ResourceResult<T> = std::result::Result<T, ResourceError>;

// ---------------------------------------------------------------------------
// Input record errors
// ---------------------------------------------------------------------------

/// Errors from loading input records.
#[derive(Debug, Error, Diagnostic)]
pub enum InputError {
    #[error("failed to read records file {path}")]
    #[diagnostic(
        code(kgw::input::io),
        help("Check that the file exists and has read permissions.")
    )]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported records format: \"{format}\"")]
    #[diagnostic(
        code(kgw::input::unsupported_format),
        help("Supported formats are: jsonl and csv.")
    )]
    UnsupportedFormat { format: String },

    #[error("records file {path} has no usable records")]
    #[diagnostic(
        code(kgw::input::no_records),
        help(
            "Every line was empty or malformed. JSONL records need \"id\" and \
             \"text\" string fields; CSV files need id and text columns."
        )
    )]
    NoRecords { path: PathBuf },

    #[error("CSV file {path} is missing required column \"{column}\"")]
    #[diagnostic(
        code(kgw::input::missing_column),
        help("The header row must contain both an \"id\" and a \"text\" column.")
    )]
    MissingColumn { path: PathBuf, column: String },
}

/// Convenience alias for input-loading results.
pub type InputResult<T> = std::result::Result<T, InputError>;

// ---------------------------------------------------------------------------
// Pipeline errors
// ---------------------------------------------------------------------------

/// Errors from the per-record extraction pipeline.
#[derive(Debug, Error, Diagnostic)]
pub enum PipelineError {
    #[error("initial extraction failed for record \"{record_id}\"")]
    #[diagnostic(
        code(kgw::pipeline::initial_extraction),
        help(
            "The initial LM call failed before any triples were produced. \
             Check that the backend is reachable; the inner error has details."
        )
    )]
    InitialExtraction {
        record_id: String,
        #[source]
        source: ClientError,
    },

    #[error("invalid extraction config: {message}")]
    #[diagnostic(
        code(kgw::pipeline::invalid_config),
        help("Check the ExtractionConfig fields. {message}")
    )]
    InvalidConfig { message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Resource(#[from] ResourceError),
}

/// Convenience alias for pipeline results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// Convenience alias for functions returning kgweaver results.
pub type KgwResult<T> = std::result::Result<T, KgwError>;
