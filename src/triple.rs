//! Triple model: validated (head, relation, tail) assertions with provenance.
//!
//! LM backends return loosely-typed JSON items ([`RawItem`]); this module
//! turns them into validated [`Triple`]s. Invalid items are dropped with a
//! warning and counted rather than failing the whole extraction, since LMs
//! occasionally emit partial items and degraded output beats a hard failure.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// How a triple was supported by the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Inference {
    /// Directly stated in the source text.
    Explicit,
    /// Inferred from context; carries a justification during refinement.
    Contextual,
}

impl std::fmt::Display for Inference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Inference::Explicit => write!(f, "explicit"),
            Inference::Contextual => write!(f, "contextual"),
        }
    }
}

/// A directed (head, relation, tail) assertion with provenance metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Triple {
    /// Head entity. Non-empty, trimmed, case preserved.
    pub head: String,
    /// Relation label. Non-empty, trimmed, case preserved.
    pub relation: String,
    /// Tail entity. Non-empty, trimmed, case preserved.
    pub tail: String,
    /// Whether the triple is explicit or contextual.
    pub inference: Inference,
    /// Why the LM believes this triple holds. Always present on
    /// refinement-emitted triples.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
    /// Character offset (inclusive) of the supporting span in the source text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub char_start: Option<usize>,
    /// Character offset (exclusive) of the supporting span.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub char_end: Option<usize>,
    /// Verbatim supporting span from the source text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction_text: Option<String>,
    /// 0 = initial extraction, k >= 1 = k-th refinement iteration.
    pub iteration_source: usize,
}

impl Triple {
    /// Create a bare explicit triple from the initial extraction.
    pub fn new(
        head: impl Into<String>,
        relation: impl Into<String>,
        tail: impl Into<String>,
    ) -> Self {
        Self {
            head: head.into(),
            relation: relation.into(),
            tail: tail.into(),
            inference: Inference::Explicit,
            justification: None,
            char_start: None,
            char_end: None,
            extraction_text: None,
            iteration_source: 0,
        }
    }

    /// Identity key for deduplication: case-folded, whitespace-trimmed
    /// (head, relation, tail). Inference, grounding, and iteration source
    /// are deliberately excluded; a re-extraction of the same fact with
    /// different grounding is redundant.
    pub fn key(&self) -> TripleKey {
        TripleKey {
            head: normalize(&self.head),
            relation: normalize(&self.relation),
            tail: normalize(&self.tail),
        }
    }

    /// Whether this triple carries a character-span grounding.
    pub fn is_grounded(&self) -> bool {
        self.char_start.is_some() && self.char_end.is_some()
    }
}

/// Normalized identity of a triple: case-folded and trimmed head/relation/tail.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TripleKey {
    pub head: String,
    pub relation: String,
    pub tail: String,
}

/// Normalize an entity or relation label for identity comparison.
pub fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

// ---------------------------------------------------------------------------
// Ordered identity set
// ---------------------------------------------------------------------------

/// An insertion-ordered set of triples, deduplicated by identity.
///
/// The first occurrence of an identity wins, which preserves the earliest
/// char grounding across re-extractions.
#[derive(Debug, Default)]
pub struct TripleSet {
    triples: Vec<Triple>,
    seen: HashSet<TripleKey>,
}

impl TripleSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a set from a list, deduplicating first-wins.
    pub fn from_triples(triples: impl IntoIterator<Item = Triple>) -> Self {
        let mut set = Self::new();
        for t in triples {
            set.insert(t);
        }
        set
    }

    /// Insert a triple. Returns `false` if its identity was already present.
    pub fn insert(&mut self, triple: Triple) -> bool {
        if !self.seen.insert(triple.key()) {
            return false;
        }
        self.triples.push(triple);
        true
    }

    /// Whether a triple with this identity is already present.
    pub fn contains(&self, key: &TripleKey) -> bool {
        self.seen.contains(key)
    }

    /// Number of distinct triples.
    pub fn len(&self) -> usize {
        self.triples.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Triple> {
        self.triples.iter()
    }

    /// Borrow the triples in insertion order.
    pub fn as_slice(&self) -> &[Triple] {
        &self.triples
    }

    /// Consume the set, returning triples in insertion order.
    pub fn into_vec(self) -> Vec<Triple> {
        self.triples
    }
}

// ---------------------------------------------------------------------------
// LM payload validation
// ---------------------------------------------------------------------------

/// A loosely-typed triple item as returned by an LM backend.
///
/// Keys beyond these are ignored. Everything is optional except
/// head/relation/tail so that partial items can be detected and dropped
/// instead of failing deserialization of the whole response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawItem {
    #[serde(default)]
    pub head: Option<String>,
    #[serde(default)]
    pub relation: Option<String>,
    #[serde(default)]
    pub tail: Option<String>,
    #[serde(default)]
    pub inference: Option<String>,
    #[serde(default)]
    pub justification: Option<String>,
    #[serde(default)]
    pub char_start: Option<i64>,
    #[serde(default)]
    pub char_end: Option<i64>,
    #[serde(default)]
    pub extraction_text: Option<String>,
}

/// Which phase is validating, controlling inference defaults and
/// justification requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationPhase {
    /// Initial extraction: inference defaults to explicit, iteration 0.
    Initial,
    /// Refinement iteration k >= 1: inference is forced to contextual and
    /// a non-empty justification is required.
    Refinement { iteration: usize },
}

/// Result of validating a batch of raw LM items.
#[derive(Debug)]
pub struct ValidationOutcome {
    /// Triples that passed validation, in LM order.
    pub triples: Vec<Triple>,
    /// Number of items dropped for failing shape validation.
    pub dropped: usize,
}

/// Validate a batch of raw LM items against the source text.
///
/// Invalid items are dropped with a warning; grounding fields that are
/// internally inconsistent are cleared while the triple itself is kept.
/// Char offsets are character positions into `text`; `extraction_text` is
/// kept only when it matches the grounded span byte-for-byte or after
/// whitespace normalization.
pub fn validate_items(items: Vec<RawItem>, text: &str, phase: ValidationPhase) -> ValidationOutcome {
    let mut triples = Vec::with_capacity(items.len());
    let mut dropped = 0usize;

    for (index, item) in items.into_iter().enumerate() {
        match validate_item(item, text, phase) {
            Some(triple) => triples.push(triple),
            None => {
                tracing::warn!(index, ?phase, "dropping invalid LM item");
                dropped += 1;
            }
        }
    }

    ValidationOutcome { triples, dropped }
}

fn validate_item(item: RawItem, text: &str, phase: ValidationPhase) -> Option<Triple> {
    let head = item.head.as_deref().map(str::trim).unwrap_or_default();
    let relation = item.relation.as_deref().map(str::trim).unwrap_or_default();
    let tail = item.tail.as_deref().map(str::trim).unwrap_or_default();
    if head.is_empty() || relation.is_empty() || tail.is_empty() {
        return None;
    }

    let inference = match phase {
        ValidationPhase::Refinement { .. } => Inference::Contextual,
        ValidationPhase::Initial => match item.inference.as_deref().map(str::trim) {
            None | Some("") => Inference::Explicit,
            Some(s) => match s.to_lowercase().as_str() {
                "explicit" => Inference::Explicit,
                "contextual" => Inference::Contextual,
                other => {
                    tracing::warn!(inference = other, "unknown inference label, defaulting");
                    Inference::Explicit
                }
            },
        },
    };

    let justification = item
        .justification
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let iteration_source = match phase {
        ValidationPhase::Initial => 0,
        ValidationPhase::Refinement { iteration } => {
            // Bridging triples must explain themselves.
            justification.as_ref()?;
            iteration
        }
    };

    let (char_start, char_end, extraction_text) =
        validate_grounding(item.char_start, item.char_end, item.extraction_text, text);

    Some(Triple {
        head: head.to_string(),
        relation: relation.to_string(),
        tail: tail.to_string(),
        inference,
        justification,
        char_start,
        char_end,
        extraction_text,
        iteration_source,
    })
}

/// Check grounding fields for internal consistency, clearing them when they
/// do not hold. Presence is opportunistic, never assumed.
fn validate_grounding(
    start: Option<i64>,
    end: Option<i64>,
    extraction_text: Option<String>,
    text: &str,
) -> (Option<usize>, Option<usize>, Option<String>) {
    let extraction_text = extraction_text.filter(|s| !s.trim().is_empty());

    let (Some(start), Some(end)) = (start, end) else {
        // A span needs both offsets; a lone one carries no information.
        return (None, None, extraction_text);
    };

    let text_chars = text.chars().count();
    if start < 0 || end < start || end as usize > text_chars {
        tracing::warn!(start, end, text_chars, "inconsistent char span, clearing grounding");
        return (None, None, extraction_text);
    }
    let (start, end) = (start as usize, end as usize);

    let Some(expected) = extraction_text else {
        return (Some(start), Some(end), None);
    };

    let span: String = text.chars().skip(start).take(end - start).collect();
    if span == expected || squash_whitespace(&span) == squash_whitespace(&expected) {
        (Some(start), Some(end), Some(expected))
    } else {
        tracing::warn!(start, end, "extraction_text does not match span, clearing grounding");
        (None, None, Some(expected))
    }
}

fn squash_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
