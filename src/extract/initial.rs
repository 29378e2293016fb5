//! Initial extraction: one grounded LM call producing a validated triple list.

use crate::domain::{DomainResources, PromptMode};
use crate::llm::LmClient;
use crate::triple::{Triple, TripleSet, ValidationPhase, validate_items};

use super::ExtractResult;

/// Outcome of the initial extraction call.
#[derive(Debug)]
pub struct InitialExtraction {
    /// Validated, identity-deduplicated triples in LM order.
    pub triples: Vec<Triple>,
    /// Items dropped during validation.
    pub dropped: usize,
}

/// Run the initial extraction against the domain's prompt and examples.
///
/// Returned triples carry `iteration_source = 0` and default to explicit
/// inference. Within-call duplicates keep their first occurrence, which
/// preserves the earliest char grounding. Zero items from the LM is an
/// empty result, not an error; a client failure propagates since there is
/// no partial result to preserve.
pub fn extract_initial(
    text: &str,
    domain: &DomainResources,
    mode: PromptMode,
    client: &dyn LmClient,
    temperature: f32,
) -> ExtractResult<InitialExtraction> {
    let prompt = domain.prompt(mode)?;

    let items =
        client.extract_grounded(text, prompt, domain.examples(), domain.schema(), temperature)?;
    let raw_count = items.len();

    let outcome = validate_items(items, text, ValidationPhase::Initial);
    let deduped = TripleSet::from_triples(outcome.triples);

    tracing::debug!(
        domain = domain.id(),
        %mode,
        raw = raw_count,
        kept = deduped.len(),
        dropped = outcome.dropped,
        "initial extraction complete"
    );

    Ok(InitialExtraction {
        triples: deduped.into_vec(),
        dropped: outcome.dropped,
    })
}
