//! # kgweaver
//!
//! Connectivity-aware knowledge-graph extraction from unstructured text,
//! using an LM backend as the extraction engine.
//!
//! ## Architecture
//!
//! - **Triple model** (`triple`): validated (head, relation, tail) assertions
//!   with provenance and identity-based dedup
//! - **Graph view** (`graph`): petgraph-backed directed graph with weakly
//!   connected component analysis
//! - **Domain resources** (`domain`): lazy-loaded prompt + few-shot + schema
//!   bundles, cached per process
//! - **LM clients** (`llm`): the two-operation client contract and the
//!   Ollama backend
//! - **Extraction engine** (`extract`): initial extraction plus the
//!   iterative connectivity refinement loop
//! - **Pipeline** (`pipeline`): per-record orchestration and the result
//!   contract; **metadata** carries the audit record
//!
//! ## Library usage
//!
//! ```no_run
//! use kgweaver::domain::{DomainRegistry, PromptMode};
//! use kgweaver::extract::refine::CancelToken;
//! use kgweaver::llm::{OllamaClient, OllamaConfig};
//! use kgweaver::pipeline::{ExtractionConfig, Record, process_record};
//!
//! let registry = DomainRegistry::new("./domains");
//! let domain = registry.get("general").unwrap();
//! let mut client = OllamaClient::new(OllamaConfig::default());
//! client.probe();
//!
//! let record = Record::new("doc-1", "Alice knows Bob. Carol knows Dave.");
//! let result = process_record(
//!     &record,
//!     &domain,
//!     &client,
//!     &ExtractionConfig::default(),
//!     &CancelToken::new(),
//! )
//! .unwrap();
//! println!("{} triples", result.triples.len());
//! ```

pub mod domain;
pub mod error;
pub mod export;
pub mod extract;
pub mod graph;
pub mod input;
pub mod llm;
pub mod metadata;
pub mod pipeline;
pub mod triple;
