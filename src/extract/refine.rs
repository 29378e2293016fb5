//! Connectivity refiner: iterative bridging-triple extraction.
//!
//! Each iteration rebuilds the graph from the accumulated triple set,
//! renders the component structure into the domain's bridging prompt, asks
//! the LM for bridging triples, and stops on a closed four-way condition
//! (plus failure and cancellation). Triples accepted before a failure are
//! always preserved; retry policy belongs to the LM client, not here.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::domain::DomainResources;
use crate::graph::TripleGraph;
use crate::graph::components::{components, format_components};
use crate::llm::{ClientError, LmClient};
use crate::triple::{Triple, TripleSet, ValidationPhase, validate_items};

/// Why refinement stopped. Mutually exclusive, closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Component count reached `max_disconnected`.
    ConnectivityGoalAchieved,
    /// Iteration budget exhausted before the goal was met.
    MaxIterationsReached,
    /// The LM produced only duplicates of known triples.
    NoNewTriplesFound,
    /// New triples arrived but the component count did not drop.
    NoConnectivityImprovement,
    /// An LM call failed; accumulated triples were preserved.
    LlmFailure,
    /// External cancellation was observed.
    Cancelled,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StopReason::ConnectivityGoalAchieved => "connectivity_goal_achieved",
            StopReason::MaxIterationsReached => "max_iterations_reached",
            StopReason::NoNewTriplesFound => "no_new_triples_found",
            StopReason::NoConnectivityImprovement => "no_connectivity_improvement",
            StopReason::LlmFailure => "llm_failure",
            StopReason::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// Outcome of a single refinement iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IterationStatus {
    Success,
    Failed,
}

/// Per-iteration audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationRecord {
    /// 1-based iteration number.
    pub iteration: usize,
    pub status: IterationStatus,
    /// Triples accepted this iteration after dedup.
    pub new_triples: usize,
    /// Accumulated triple count after this iteration.
    pub total_triples: usize,
    /// Component count after this iteration.
    pub disconnected_components: usize,
    /// Items dropped by validation this iteration.
    pub dropped_items: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub early_stop_reason: Option<StopReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Tolerances for the refinement loop.
///
/// `max_iterations = 0` disables refinement entirely; the initial triples
/// come back verbatim.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RefinementGoal {
    /// Acceptable number of weakly connected components.
    pub max_disconnected: usize,
    /// Bridging-call budget.
    pub max_iterations: usize,
    /// Sampling temperature for bridging calls.
    pub temperature: f32,
}

impl Default for RefinementGoal {
    fn default() -> Self {
        Self {
            max_disconnected: 1,
            max_iterations: 3,
            temperature: 0.2,
        }
    }
}

/// Audit trail of a refinement run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefinementTrace {
    /// Component count of the graph over the initial triples.
    pub initial_components: usize,
    /// Component count over the final triple set.
    pub final_components: usize,
    /// Completed (non-failed) iterations.
    pub iterations_used: usize,
    pub stop_reason: StopReason,
    /// True when an LM failure or cancellation cut the run short.
    pub partial_result: bool,
    /// Ordered per-iteration records, failed attempts included.
    pub iterations: Vec<IterationRecord>,
    /// Items dropped by validation across all iterations.
    pub dropped_items: usize,
}

/// Cooperative cancellation flag, checked at the top of each iteration.
///
/// Clone freely; all clones share one flag. The inner `Arc<AtomicBool>` is
/// exposed so the CLI can hand it to `signal_hook::flag::register`.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A fresh, un-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// The shared flag, for signal-handler registration.
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.0)
    }
}

/// Iteratively extract bridging triples until the graph meets the
/// connectivity goal or a stop condition fires.
///
/// Never fails: client errors terminate the loop with everything
/// accumulated so far and `partial_result = true`. Insertion order is
/// preserved: initial triples first, then each iteration's new triples in
/// LM order.
pub fn refine(
    text: &str,
    domain: &DomainResources,
    client: &dyn LmClient,
    initial_triples: Vec<Triple>,
    goal: &RefinementGoal,
    cancel: &CancelToken,
) -> (Vec<Triple>, RefinementTrace) {
    let mut all = TripleSet::from_triples(initial_triples);
    let initial_components = components(&TripleGraph::build(all.as_slice())).len();

    let mut prev_components = initial_components;
    let mut iterations_used = 0usize;
    let mut iterations: Vec<IterationRecord> = Vec::new();
    let mut dropped_items = 0usize;
    let mut partial_result = false;
    let mut stop_reason: Option<StopReason> = None;

    if prev_components <= goal.max_disconnected {
        // Goal already met by the initial extraction; no bridging call is made.
        stop_reason = Some(StopReason::ConnectivityGoalAchieved);
    }

    let mut k = 0usize;
    while stop_reason.is_none() && k < goal.max_iterations {
        k += 1;

        if cancel.is_cancelled() {
            tracing::info!(iteration = k, "cancellation observed, stopping refinement");
            partial_result = true;
            stop_reason = Some(StopReason::Cancelled);
            break;
        }
        if prev_components <= goal.max_disconnected {
            stop_reason = Some(StopReason::ConnectivityGoalAchieved);
            break;
        }

        let graph = TripleGraph::build(all.as_slice());
        let comps = components(&graph);
        let prompt =
            domain.render_bridging(comps.len(), &format_components(&graph, &comps), text);

        tracing::debug!(
            iteration = k,
            components = comps.len(),
            triples = all.len(),
            "requesting bridging triples"
        );

        let items = match client.generate_json(&prompt, domain.schema(), goal.temperature) {
            Ok(items) => items,
            Err(e) => {
                let cancelled = matches!(e, ClientError::Cancelled);
                tracing::warn!(iteration = k, error = %e, "bridging call failed");
                iterations.push(IterationRecord {
                    iteration: k,
                    status: IterationStatus::Failed,
                    new_triples: 0,
                    total_triples: all.len(),
                    disconnected_components: prev_components,
                    dropped_items: 0,
                    early_stop_reason: None,
                    error: Some(e.to_string()),
                });
                partial_result = true;
                stop_reason = Some(if cancelled {
                    StopReason::Cancelled
                } else {
                    StopReason::LlmFailure
                });
                break;
            }
        };

        let outcome = validate_items(items, text, ValidationPhase::Refinement { iteration: k });
        dropped_items += outcome.dropped;

        let mut new_triples = 0usize;
        for triple in outcome.triples {
            if all.insert(triple) {
                new_triples += 1;
            }
        }

        if new_triples == 0 {
            iterations_used = k;
            iterations.push(IterationRecord {
                iteration: k,
                status: IterationStatus::Success,
                new_triples: 0,
                total_triples: all.len(),
                disconnected_components: prev_components,
                dropped_items: outcome.dropped,
                early_stop_reason: Some(StopReason::NoNewTriplesFound),
                error: None,
            });
            stop_reason = Some(StopReason::NoNewTriplesFound);
            break;
        }

        let current = components(&TripleGraph::build(all.as_slice())).len();

        if current >= prev_components {
            // The new triples are kept (validated, possibly useful); only
            // the loop terminates.
            iterations_used = k;
            iterations.push(IterationRecord {
                iteration: k,
                status: IterationStatus::Success,
                new_triples,
                total_triples: all.len(),
                disconnected_components: current,
                dropped_items: outcome.dropped,
                early_stop_reason: Some(StopReason::NoConnectivityImprovement),
                error: None,
            });
            stop_reason = Some(StopReason::NoConnectivityImprovement);
            break;
        }

        iterations.push(IterationRecord {
            iteration: k,
            status: IterationStatus::Success,
            new_triples,
            total_triples: all.len(),
            disconnected_components: current,
            dropped_items: outcome.dropped,
            early_stop_reason: None,
            error: None,
        });
        prev_components = current;
        iterations_used = k;

        if current <= goal.max_disconnected {
            stop_reason = Some(StopReason::ConnectivityGoalAchieved);
            break;
        }
    }

    let stop_reason = stop_reason.unwrap_or(StopReason::MaxIterationsReached);
    let final_components = components(&TripleGraph::build(all.as_slice())).len();

    tracing::info!(
        %stop_reason,
        iterations_used,
        initial_components,
        final_components,
        triples = all.len(),
        "refinement finished"
    );

    let trace = RefinementTrace {
        initial_components,
        final_components,
        iterations_used,
        stop_reason,
        partial_result,
        iterations,
        dropped_items,
    };
    (all.into_vec(), trace)
}
