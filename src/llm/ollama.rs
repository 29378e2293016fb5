//! Ollama backend for the LM client contract.
//!
//! Talks to the Ollama REST API over blocking HTTP. Grounded extraction and
//! bridging generation both go through `/api/generate` with a JSON-array
//! response contract; the caller-side parser recovers the array from
//! whatever prose the model wraps around it.

use crate::domain::{FewShotExample, TypeSchema};
use crate::triple::RawItem;

use super::{ClientError, ClientResult, LmClient, parse_items};

/// Configuration for the Ollama client.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Base URL for the Ollama API.
    pub base_url: String,
    /// Model name to use.
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            model: "llama3.2".into(),
            timeout_secs: 120,
        }
    }
}

/// Client for the Ollama REST API.
pub struct OllamaClient {
    config: OllamaConfig,
    available: bool,
}

impl OllamaClient {
    /// Create a new Ollama client with the given configuration.
    pub fn new(config: OllamaConfig) -> Self {
        Self {
            config,
            available: false,
        }
    }

    /// Probe the Ollama server to check availability.
    ///
    /// Sends a lightweight request to the `/api/tags` endpoint.
    pub fn probe(&mut self) -> bool {
        let url = format!("{}/api/tags", self.config.base_url);
        let agent = ureq::AgentBuilder::new()
            .timeout(std::time::Duration::from_secs(5))
            .build();

        self.available = matches!(agent.get(&url).call(), Ok(resp) if resp.status() == 200);
        self.available
    }

    /// Whether the Ollama server answered the last probe.
    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Generate a completion from a prompt.
    fn generate(
        &self,
        prompt: &str,
        system: Option<&str>,
        temperature: f32,
    ) -> Result<String, ClientError> {
        if !self.available {
            return Err(ClientError::Unavailable {
                url: self.config.base_url.clone(),
            });
        }

        let url = format!("{}/api/generate", self.config.base_url);
        let agent = ureq::AgentBuilder::new()
            .timeout(std::time::Duration::from_secs(self.config.timeout_secs))
            .build();

        let mut body = serde_json::json!({
            "model": self.config.model,
            "prompt": prompt,
            "stream": false,
            "options": { "temperature": temperature },
        });

        if let Some(sys) = system {
            body["system"] = serde_json::Value::String(sys.to_string());
        }

        let body_str = serde_json::to_string(&body).map_err(|e| ClientError::RequestFailed {
            message: format!("JSON serialize error: {e}"),
        })?;

        let resp = agent
            .post(&url)
            .set("Content-Type", "application/json")
            .send_string(&body_str)
            .map_err(|e: ureq::Error| ClientError::RequestFailed {
                message: e.to_string(),
            })?;

        let resp_str = resp.into_string().map_err(|e| ClientError::ParseError {
            message: e.to_string(),
        })?;

        let json: serde_json::Value =
            serde_json::from_str(&resp_str).map_err(|e| ClientError::ParseError {
                message: e.to_string(),
            })?;

        json["response"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| ClientError::ParseError {
                message: "missing 'response' field".into(),
            })
    }

    fn render_system(&self, prompt: &str, schema: Option<&TypeSchema>) -> String {
        let mut system = prompt.to_string();
        if let Some(schema) = schema {
            if !schema.entity_types.is_empty() {
                system.push_str("\n\nAllowed entity types: ");
                system.push_str(
                    &schema
                        .entity_types
                        .iter()
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(", "),
                );
            }
            if !schema.relation_types.is_empty() {
                system.push_str("\nAllowed relation types: ");
                system.push_str(
                    &schema
                        .relation_types
                        .iter()
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(", "),
                );
            }
        }
        system
    }
}

/// Render few-shot examples ahead of the target text.
fn render_examples(examples: &[FewShotExample]) -> String {
    let mut out = String::new();
    for example in examples {
        out.push_str("Text: ");
        out.push_str(&example.text);
        out.push_str("\nTriples: ");
        // Example triples serialize cleanly; fall back to an empty array
        // rather than failing the whole prompt.
        let triples =
            serde_json::to_string(&example.triples).unwrap_or_else(|_| "[]".to_string());
        out.push_str(&triples);
        out.push_str("\n\n");
    }
    out
}

impl LmClient for OllamaClient {
    fn model_identifier(&self) -> String {
        format!("ollama:{}", self.config.model)
    }

    fn extract_grounded(
        &self,
        text: &str,
        prompt: &str,
        examples: &[FewShotExample],
        schema: Option<&TypeSchema>,
        temperature: f32,
    ) -> ClientResult<Vec<RawItem>> {
        let system = self.render_system(prompt, schema);
        let mut user = render_examples(examples);
        user.push_str("Text: ");
        user.push_str(text);
        user.push_str("\nTriples:");

        let response = self.generate(&user, Some(&system), temperature)?;
        parse_items(&response)
    }

    fn generate_json(
        &self,
        prompt: &str,
        schema: Option<&TypeSchema>,
        temperature: f32,
    ) -> ClientResult<Vec<RawItem>> {
        let system = schema.map(|s| self.render_system("", Some(s)));
        let response = self.generate(prompt, system.as_deref(), temperature)?;
        parse_items(&response)
    }
}

impl std::fmt::Debug for OllamaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaClient")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .field("available", &self.available)
            .finish()
    }
}
