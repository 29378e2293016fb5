//! Domain resource bundles: prompts, few-shot examples, optional type schema.
//!
//! A domain lives in a directory under the domains root:
//!
//! ```text
//! <root>/<domain_id>/domain.toml     # [prompts] open/constrained/bridging, [schema]
//! <root>/<domain_id>/examples.json   # few-shot examples (optional)
//! ```
//!
//! Resources are discovered lazily on first access, validated once, then
//! cached and immutable for the process lifetime. Readers on multiple
//! threads share the cached bundle without synchronization. Malformed or
//! missing resources are a fatal [`ResourceError`] with no silent
//! fallback, with one documented exception: a domain without its own
//! bridging prompt uses the crate default, and an externally configured
//! prompt always wins when present.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::{ResourceError, ResourceResult};

/// Substitution sites every bridging prompt must carry.
pub const BRIDGING_SITES: [&str; 3] = ["{num_components}", "{component_info}", "{text}"];

/// Default bridging prompt, used when a domain does not configure its own.
pub const DEFAULT_BRIDGING_PROMPT: &str = "\
The knowledge graph extracted from the text below currently has \
{num_components} disconnected components:

{component_info}

Original text:
{text}

Identify relationships that connect entities across different components. \
Return a JSON array of objects with fields: head, relation, tail, \
justification. Every triple must bridge two components and carry a \
justification grounded in the text. Only return the JSON array, no other \
text.";

/// Which extraction prompt variant to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptMode {
    /// Free-form extraction.
    Open,
    /// Extraction constrained by the domain's type schema.
    Constrained,
}

impl std::fmt::Display for PromptMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PromptMode::Open => write!(f, "open"),
            PromptMode::Constrained => write!(f, "constrained"),
        }
    }
}

impl std::str::FromStr for PromptMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(PromptMode::Open),
            "constrained" => Ok(PromptMode::Constrained),
            other => Err(format!("unknown prompt mode \"{other}\" (expected open or constrained)")),
        }
    }
}

/// One triple inside a few-shot example.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExampleTriple {
    pub head: String,
    pub relation: String,
    pub tail: String,
    /// "explicit" or "contextual"; free-form here, the LM only imitates it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub char_start: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub char_end: Option<usize>,
}

/// A worked extraction example shown to the LM before the real text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FewShotExample {
    /// Source span the triples were extracted from.
    pub text: String,
    /// One or more demonstration triples.
    pub triples: Vec<ExampleTriple>,
}

/// Optional closed vocabularies for constrained extraction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeSchema {
    #[serde(default)]
    pub entity_types: BTreeSet<String>,
    #[serde(default)]
    pub relation_types: BTreeSet<String>,
}

/// Prompt identifiers recorded in extraction metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptIdentifiers {
    /// `<domain>/<mode>` of the extraction prompt used.
    pub extraction: String,
    /// `<domain>/bridging` or `builtin/bridging` for the crate default.
    pub bridging: String,
}

// ---------------------------------------------------------------------------
// On-disk shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct DomainFile {
    prompts: PromptsSection,
    #[serde(default)]
    schema: Option<TypeSchema>,
}

#[derive(Debug, Deserialize)]
struct PromptsSection {
    #[serde(default)]
    open: Option<String>,
    #[serde(default)]
    constrained: Option<String>,
    #[serde(default)]
    bridging: Option<String>,
}

// ---------------------------------------------------------------------------
// Resource bundle
// ---------------------------------------------------------------------------

/// A validated, immutable domain resource bundle.
///
/// Purely a read interface: the core never writes to domain resources.
#[derive(Debug)]
pub struct DomainResources {
    id: String,
    open_prompt: Option<String>,
    constrained_prompt: Option<String>,
    bridging_prompt: String,
    /// Whether the bridging prompt came from the domain file (vs the default).
    bridging_external: bool,
    examples: Vec<FewShotExample>,
    schema: Option<TypeSchema>,
}

impl DomainResources {
    /// Load and validate a domain bundle from its directory.
    pub fn load(id: &str, dir: &Path) -> ResourceResult<Self> {
        let toml_path = dir.join("domain.toml");
        let raw = std::fs::read_to_string(&toml_path).map_err(|source| ResourceError::Io {
            path: toml_path.clone(),
            source,
        })?;
        let file: DomainFile = toml::from_str(&raw).map_err(|e| ResourceError::Malformed {
            path: toml_path.clone(),
            message: e.to_string(),
        })?;

        for (name, prompt) in [
            ("open", &file.prompts.open),
            ("constrained", &file.prompts.constrained),
            ("bridging", &file.prompts.bridging),
        ] {
            if let Some(p) = prompt
                && p.trim().is_empty()
            {
                return Err(ResourceError::EmptyPrompt {
                    domain: id.to_string(),
                    name: name.to_string(),
                });
            }
        }

        // Externally configured bridging prompt wins; otherwise the default.
        let bridging_external = file.prompts.bridging.is_some();
        let bridging_prompt = file
            .prompts
            .bridging
            .unwrap_or_else(|| DEFAULT_BRIDGING_PROMPT.to_string());
        for site in BRIDGING_SITES {
            if !bridging_prompt.contains(site) {
                return Err(ResourceError::MissingSubstitution {
                    domain: id.to_string(),
                    site: site.to_string(),
                });
            }
        }

        let examples = load_examples(dir)?;

        tracing::debug!(
            domain = id,
            examples = examples.len(),
            has_schema = file.schema.is_some(),
            bridging_external,
            "loaded domain resources"
        );

        Ok(Self {
            id: id.to_string(),
            open_prompt: file.prompts.open,
            constrained_prompt: file.prompts.constrained,
            bridging_prompt,
            bridging_external,
            examples,
            schema: file.schema,
        })
    }

    /// Domain identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Extraction prompt for the given mode.
    pub fn prompt(&self, mode: PromptMode) -> ResourceResult<&str> {
        let prompt = match mode {
            PromptMode::Open => self.open_prompt.as_deref(),
            PromptMode::Constrained => self.constrained_prompt.as_deref(),
        };
        prompt.ok_or_else(|| ResourceError::MissingPrompt {
            domain: self.id.clone(),
            mode: mode.to_string(),
        })
    }

    /// Few-shot examples, in file order.
    pub fn examples(&self) -> &[FewShotExample] {
        &self.examples
    }

    /// The bridging prompt (external if configured, otherwise the default).
    pub fn bridging_prompt(&self) -> &str {
        &self.bridging_prompt
    }

    /// Optional type schema for constrained extraction.
    pub fn schema(&self) -> Option<&TypeSchema> {
        self.schema.as_ref()
    }

    /// Substitute the three bridging sites literally. No expression language.
    pub fn render_bridging(&self, num_components: usize, component_info: &str, text: &str) -> String {
        self.bridging_prompt
            .replace("{num_components}", &num_components.to_string())
            .replace("{component_info}", component_info)
            .replace("{text}", text)
    }

    /// Identifiers of the prompts in use, for the metadata record.
    pub fn prompt_identifiers(&self, mode: PromptMode) -> PromptIdentifiers {
        PromptIdentifiers {
            extraction: format!("{}/{mode}", self.id),
            bridging: if self.bridging_external {
                format!("{}/bridging", self.id)
            } else {
                "builtin/bridging".to_string()
            },
        }
    }
}

fn load_examples(dir: &Path) -> ResourceResult<Vec<FewShotExample>> {
    let path = dir.join("examples.json");
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = std::fs::read_to_string(&path).map_err(|source| ResourceError::Io {
        path: path.clone(),
        source,
    })?;
    let examples: Vec<FewShotExample> =
        serde_json::from_str(&raw).map_err(|e| ResourceError::Malformed {
            path: path.clone(),
            message: e.to_string(),
        })?;

    for (index, example) in examples.iter().enumerate() {
        if example.text.trim().is_empty() {
            return Err(ResourceError::InvalidExample {
                path: path.clone(),
                index,
                message: "empty source text".into(),
            });
        }
        if example.triples.is_empty() {
            return Err(ResourceError::InvalidExample {
                path: path.clone(),
                index,
                message: "no triples".into(),
            });
        }
        for t in &example.triples {
            if t.head.trim().is_empty() || t.relation.trim().is_empty() || t.tail.trim().is_empty()
            {
                return Err(ResourceError::InvalidExample {
                    path: path.clone(),
                    index,
                    message: "triple with empty head, relation, or tail".into(),
                });
            }
            if let (Some(start), Some(end)) = (t.char_start, t.char_end)
                && start > end
            {
                return Err(ResourceError::InvalidExample {
                    path: path.clone(),
                    index,
                    message: format!("char range {start}..{end} is inverted"),
                });
            }
        }
    }

    Ok(examples)
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Lazy-loading, caching registry of domain bundles.
///
/// Loaded bundles are shared (`Arc`) and never reloaded within a process;
/// hot-reloading a domain means starting a new process, never swapping a
/// bundle mid-refinement.
pub struct DomainRegistry {
    root: PathBuf,
    cache: DashMap<String, Arc<DomainResources>>,
}

impl DomainRegistry {
    /// Create a registry over a domains root directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: DashMap::new(),
        }
    }

    /// Get a domain bundle, loading and validating it on first access.
    pub fn get(&self, id: &str) -> ResourceResult<Arc<DomainResources>> {
        if let Some(cached) = self.cache.get(id) {
            return Ok(Arc::clone(cached.value()));
        }

        let dir = self.root.join(id);
        if !dir.join("domain.toml").is_file() {
            return Err(ResourceError::DomainNotFound {
                domain: id.to_string(),
                path: dir.display().to_string(),
            });
        }

        let loaded = Arc::new(DomainResources::load(id, &dir)?);
        // Another thread may have raced the load; first insert wins either way,
        // both values came from the same immutable files.
        self.cache.insert(id.to_string(), Arc::clone(&loaded));
        Ok(loaded)
    }

    /// List domain identifiers present under the root.
    pub fn list(&self) -> Vec<String> {
        let mut ids = Vec::new();
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return ids;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.join("domain.toml").is_file()
                && let Some(name) = path.file_name().and_then(|n| n.to_str())
            {
                ids.push(name.to_string());
            }
        }
        ids.sort();
        ids
    }

    /// The domains root this registry reads from.
    pub fn root(&self) -> &Path {
        &self.root
    }
}
