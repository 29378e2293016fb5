//! Per-record orchestration: extract, refine, assemble metadata.
//!
//! Records are processed independently with no cross-record state; callers
//! may invoke [`process_record`] concurrently. The orchestrator performs no
//! I/O; persistence of results is the caller's responsibility.

use serde::{Deserialize, Serialize};

use crate::domain::DomainResources;
use crate::error::{PipelineError, PipelineResult};
use crate::extract::refine::{CancelToken, RefinementGoal};
use crate::extract::{ExtractError, extract_initial, refine};
use crate::llm::LmClient;
use crate::metadata::{ExtractionMetadata, MetadataContext, assemble_metadata};
use crate::triple::Triple;

/// An input document. Fields beyond `id` and `text` are tolerated and
/// passed through to the result unchanged; the core never inspects them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub text: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Record {
    /// Create a record with no passthrough fields.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            extra: serde_json::Map::new(),
        }
    }
}

/// Per-run extraction settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExtractionConfig {
    pub mode: crate::domain::PromptMode,
    /// Acceptable number of weakly connected components.
    pub max_disconnected: usize,
    /// Refinement iteration budget; 0 disables refinement.
    pub max_iterations: usize,
    pub temperature: f32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            mode: crate::domain::PromptMode::Open,
            max_disconnected: 1,
            max_iterations: 3,
            temperature: 0.2,
        }
    }
}

impl ExtractionConfig {
    /// Reject configurations no extraction could honor.
    pub fn validate(&self) -> PipelineResult<()> {
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(PipelineError::InvalidConfig {
                message: format!("temperature must be finite and >= 0, got {}", self.temperature),
            });
        }
        Ok(())
    }

    fn goal(&self) -> RefinementGoal {
        RefinementGoal {
            max_disconnected: self.max_disconnected,
            max_iterations: self.max_iterations,
            temperature: self.temperature,
        }
    }
}

/// The per-record output: triples plus the audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub record_id: String,
    pub triples: Vec<Triple>,
    pub metadata: ExtractionMetadata,
    /// Passthrough fields from the input record.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Run the full extraction pipeline over one record.
///
/// Empty or whitespace-only text short-circuits with an empty triple set
/// and `empty_input = true`; that is a degenerate input, not an error. A
/// client failure during the *initial* call is an error (there is no
/// partial result to preserve); failures during refinement come back as a
/// partial result in the metadata instead.
pub fn process_record(
    record: &Record,
    domain: &DomainResources,
    client: &dyn LmClient,
    config: &ExtractionConfig,
    cancel: &CancelToken,
) -> PipelineResult<ExtractionResult> {
    config.validate()?;
    let goal = config.goal();

    if record.text.trim().is_empty() {
        tracing::info!(record_id = %record.id, "empty input, skipping extraction");
        let metadata = assemble_metadata(
            MetadataContext {
                record_id: &record.id,
                text: &record.text,
                domain,
                mode: config.mode,
                model_identifier: client.model_identifier(),
                goal: &goal,
                initial_count: 0,
                initial_dropped: 0,
                trace: None,
                empty_input: true,
            },
            &[],
        );
        return Ok(ExtractionResult {
            record_id: record.id.clone(),
            triples: Vec::new(),
            metadata,
            extra: record.extra.clone(),
        });
    }

    let initial = extract_initial(&record.text, domain, config.mode, client, config.temperature)
        .map_err(|e| match e {
            ExtractError::Resource(r) => PipelineError::Resource(r),
            ExtractError::Client(c) => PipelineError::InitialExtraction {
                record_id: record.id.clone(),
                source: c,
            },
        })?;
    let initial_count = initial.triples.len();

    let (triples, trace) = refine(&record.text, domain, client, initial.triples, &goal, cancel);

    let metadata = assemble_metadata(
        MetadataContext {
            record_id: &record.id,
            text: &record.text,
            domain,
            mode: config.mode,
            model_identifier: client.model_identifier(),
            goal: &goal,
            initial_count,
            initial_dropped: initial.dropped,
            trace: Some(&trace),
            empty_input: false,
        },
        &triples,
    );

    Ok(ExtractionResult {
        record_id: record.id.clone(),
        triples,
        metadata,
        extra: record.extra.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ClientError, ClientResult};
    use crate::triple::RawItem;
    use std::sync::Mutex;

    struct ScriptedClient {
        responses: Mutex<Vec<ClientResult<Vec<RawItem>>>>,
    }

    impl LmClient for ScriptedClient {
        fn model_identifier(&self) -> String {
            "mock:scripted".into()
        }

        fn extract_grounded(
            &self,
            _text: &str,
            _prompt: &str,
            _examples: &[crate::domain::FewShotExample],
            _schema: Option<&crate::domain::TypeSchema>,
            _temperature: f32,
        ) -> ClientResult<Vec<RawItem>> {
            self.generate_json("", None, 0.0)
        }

        fn generate_json(
            &self,
            _prompt: &str,
            _schema: Option<&crate::domain::TypeSchema>,
            _temperature: f32,
        ) -> ClientResult<Vec<RawItem>> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(ClientError::RequestFailed {
                    message: "script exhausted".into(),
                });
            }
            responses.remove(0)
        }
    }

    fn domain() -> crate::domain::DomainResources {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("domain.toml"),
            "[prompts]\nopen = \"Extract triples.\"\n",
        )
        .unwrap();
        crate::domain::DomainResources::load("test", dir.path()).unwrap()
    }

    fn raw(head: &str, relation: &str, tail: &str) -> RawItem {
        RawItem {
            head: Some(head.into()),
            relation: Some(relation.into()),
            tail: Some(tail.into()),
            ..Default::default()
        }
    }

    #[test]
    fn empty_input_short_circuits() {
        let client = ScriptedClient {
            responses: Mutex::new(vec![]),
        };
        let record = Record::new("r1", "   \n\t ");
        let result = process_record(
            &record,
            &domain(),
            &client,
            &ExtractionConfig::default(),
            &CancelToken::new(),
        )
        .unwrap();
        assert!(result.triples.is_empty());
        assert!(result.metadata.empty_input);
        assert!(result.metadata.iterative_extraction.is_none());
    }

    #[test]
    fn initial_client_failure_is_an_error() {
        let client = ScriptedClient {
            responses: Mutex::new(vec![Err(ClientError::RequestFailed {
                message: "down".into(),
            })]),
        };
        let record = Record::new("r1", "Alice knows Bob.");
        let err = process_record(
            &record,
            &domain(),
            &client,
            &ExtractionConfig::default(),
            &CancelToken::new(),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::InitialExtraction { .. }));
    }

    #[test]
    fn passthrough_fields_survive_to_the_result() {
        let client = ScriptedClient {
            responses: Mutex::new(vec![Ok(vec![raw("Alice", "knows", "Bob")])]),
        };
        let mut record = Record::new("r1", "Alice knows Bob.");
        record
            .extra
            .insert("source".into(), serde_json::json!("wiki"));
        let result = process_record(
            &record,
            &domain(),
            &client,
            &ExtractionConfig::default(),
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(result.extra["source"], serde_json::json!("wiki"));
        assert_eq!(result.triples.len(), 1);
        assert_eq!(
            result.metadata.iterative_extraction.unwrap().total_llm_calls,
            1
        );
    }

    #[test]
    fn negative_temperature_is_rejected() {
        let config = ExtractionConfig {
            temperature: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
