//! Shared test helpers: a deterministic scripted LM and domain fixtures.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use kgweaver::domain::{DomainRegistry, DomainResources, FewShotExample, TypeSchema};
use kgweaver::llm::{ClientError, ClientResult, LmClient};
use kgweaver::triple::RawItem;

/// Deterministic mock LM: a fixed initial-extraction response plus a queue
/// of scripted bridging responses. `Err(message)` entries become
/// `ClientError::RequestFailed`.
pub struct MockLm {
    initial: Vec<RawItem>,
    bridging: Mutex<VecDeque<Result<Vec<RawItem>, String>>>,
    pub extract_calls: AtomicUsize,
    pub generate_calls: AtomicUsize,
}

impl MockLm {
    pub fn new(
        initial: Vec<RawItem>,
        bridging: Vec<Result<Vec<RawItem>, String>>,
    ) -> Self {
        Self {
            initial,
            bridging: Mutex::new(bridging.into()),
            extract_calls: AtomicUsize::new(0),
            generate_calls: AtomicUsize::new(0),
        }
    }

    pub fn total_calls(&self) -> usize {
        self.extract_calls.load(Ordering::Relaxed) + self.generate_calls.load(Ordering::Relaxed)
    }
}

impl LmClient for MockLm {
    fn model_identifier(&self) -> String {
        "mock:deterministic".into()
    }

    fn extract_grounded(
        &self,
        _text: &str,
        _prompt: &str,
        _examples: &[FewShotExample],
        _schema: Option<&TypeSchema>,
        _temperature: f32,
    ) -> ClientResult<Vec<RawItem>> {
        self.extract_calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.initial.clone())
    }

    fn generate_json(
        &self,
        _prompt: &str,
        _schema: Option<&TypeSchema>,
        _temperature: f32,
    ) -> ClientResult<Vec<RawItem>> {
        self.generate_calls.fetch_add(1, Ordering::Relaxed);
        let mut queue = self.bridging.lock().unwrap();
        match queue.pop_front() {
            Some(Ok(items)) => Ok(items),
            Some(Err(message)) => Err(ClientError::RequestFailed { message }),
            None => Ok(Vec::new()),
        }
    }
}

/// A plain explicit item, as the initial extraction would return it.
pub fn item(head: &str, relation: &str, tail: &str) -> RawItem {
    RawItem {
        head: Some(head.into()),
        relation: Some(relation.into()),
        tail: Some(tail.into()),
        ..Default::default()
    }
}

/// A bridging item with the justification refinement requires.
pub fn bridging_item(head: &str, relation: &str, tail: &str) -> RawItem {
    RawItem {
        justification: Some("mentioned in the same passage".into()),
        ..item(head, relation, tail)
    }
}

/// Write a minimal valid domain bundle and return a registry over it.
///
/// The returned tempdir must outlive the registry.
pub fn fixture_registry() -> (tempfile::TempDir, DomainRegistry) {
    let root = tempfile::TempDir::new().unwrap();
    let dir = root.path().join("general");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("domain.toml"),
        r#"[prompts]
open = "Extract factual (head, relation, tail) triples from the text. Return a JSON array."
"#,
    )
    .unwrap();
    let registry = DomainRegistry::new(root.path());
    (root, registry)
}

/// Load the fixture domain directly.
pub fn fixture_domain() -> (tempfile::TempDir, std::sync::Arc<DomainResources>) {
    let (root, registry) = fixture_registry();
    let domain = registry.get("general").unwrap();
    (root, domain)
}
