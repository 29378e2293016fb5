//! Domain resource loading and validation against on-disk fixtures.

use std::path::Path;

use kgweaver::domain::{DomainRegistry, PromptMode};
use kgweaver::error::ResourceError;

fn write_domain(root: &Path, id: &str, domain_toml: &str) {
    let dir = root.join(id);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("domain.toml"), domain_toml).unwrap();
}

#[test]
fn full_bundle_loads_and_validates() {
    let root = tempfile::TempDir::new().unwrap();
    write_domain(
        root.path(),
        "medicine",
        r#"[prompts]
open = "Extract medical triples."
constrained = "Extract triples using only the allowed types."
bridging = "There are {num_components} components:\n{component_info}\nText: {text}"

[schema]
entity_types = ["Drug", "Disease"]
relation_types = ["treats", "causes"]
"#,
    );
    std::fs::write(
        root.path().join("medicine/examples.json"),
        r#"[{"text": "Aspirin treats headaches.",
             "triples": [{"head": "Aspirin", "relation": "treats", "tail": "headaches",
                          "inference": "explicit", "char_start": 0, "char_end": 24}]}]"#,
    )
    .unwrap();

    let registry = DomainRegistry::new(root.path());
    let domain = registry.get("medicine").unwrap();

    assert_eq!(domain.prompt(PromptMode::Open).unwrap(), "Extract medical triples.");
    assert!(domain.prompt(PromptMode::Constrained).is_ok());
    assert_eq!(domain.examples().len(), 1);
    let schema = domain.schema().unwrap();
    assert!(schema.entity_types.contains("Drug"));
    assert_eq!(domain.prompt_identifiers(PromptMode::Open).bridging, "medicine/bridging");
}

#[test]
fn missing_domain_is_a_not_found_error() {
    let root = tempfile::TempDir::new().unwrap();
    let registry = DomainRegistry::new(root.path());
    let err = registry.get("nope").unwrap_err();
    assert!(matches!(err, ResourceError::DomainNotFound { .. }));
}

#[test]
fn missing_constrained_prompt_errors_on_access() {
    let root = tempfile::TempDir::new().unwrap();
    write_domain(root.path(), "minimal", "[prompts]\nopen = \"Extract.\"\n");
    let registry = DomainRegistry::new(root.path());
    let domain = registry.get("minimal").unwrap();

    assert!(domain.prompt(PromptMode::Open).is_ok());
    let err = domain.prompt(PromptMode::Constrained).unwrap_err();
    assert!(matches!(err, ResourceError::MissingPrompt { .. }));
}

#[test]
fn default_bridging_prompt_used_when_not_configured() {
    let root = tempfile::TempDir::new().unwrap();
    write_domain(root.path(), "minimal", "[prompts]\nopen = \"Extract.\"\n");
    let registry = DomainRegistry::new(root.path());
    let domain = registry.get("minimal").unwrap();

    assert_eq!(domain.prompt_identifiers(PromptMode::Open).bridging, "builtin/bridging");
    let rendered = domain.render_bridging(2, "Component 0 (2 entities): a, b", "the text");
    assert!(rendered.contains("2 disconnected components"));
    assert!(rendered.contains("Component 0 (2 entities): a, b"));
    assert!(rendered.contains("the text"));
}

#[test]
fn bridging_prompt_missing_a_site_is_rejected() {
    let root = tempfile::TempDir::new().unwrap();
    write_domain(
        root.path(),
        "broken",
        "[prompts]\nopen = \"Extract.\"\nbridging = \"Only {num_components} and {text} here.\"\n",
    );
    let registry = DomainRegistry::new(root.path());
    let err = registry.get("broken").unwrap_err();
    match err {
        ResourceError::MissingSubstitution { site, .. } => {
            assert_eq!(site, "{component_info}");
        }
        other => panic!("expected MissingSubstitution, got {other:?}"),
    }
}

#[test]
fn empty_prompt_is_rejected() {
    let root = tempfile::TempDir::new().unwrap();
    write_domain(root.path(), "blank", "[prompts]\nopen = \"   \"\n");
    let registry = DomainRegistry::new(root.path());
    let err = registry.get("blank").unwrap_err();
    assert!(matches!(err, ResourceError::EmptyPrompt { .. }));
}

#[test]
fn malformed_toml_is_rejected_with_path() {
    let root = tempfile::TempDir::new().unwrap();
    write_domain(root.path(), "syntax", "[prompts\nopen = broken\n");
    let registry = DomainRegistry::new(root.path());
    let err = registry.get("syntax").unwrap_err();
    match err {
        ResourceError::Malformed { path, .. } => {
            assert!(path.ends_with("syntax/domain.toml"));
        }
        other => panic!("expected Malformed, got {other:?}"),
    }
}

#[test]
fn invalid_example_is_rejected_with_index() {
    let root = tempfile::TempDir::new().unwrap();
    write_domain(root.path(), "exdom", "[prompts]\nopen = \"Extract.\"\n");
    std::fs::write(
        root.path().join("exdom/examples.json"),
        r#"[{"text": "ok", "triples": [{"head": "a", "relation": "r", "tail": "b"}]},
            {"text": "bad", "triples": []}]"#,
    )
    .unwrap();
    let registry = DomainRegistry::new(root.path());
    let err = registry.get("exdom").unwrap_err();
    match err {
        ResourceError::InvalidExample { index, .. } => assert_eq!(index, 1),
        other => panic!("expected InvalidExample, got {other:?}"),
    }
}

#[test]
fn registry_caches_loaded_bundles() {
    let root = tempfile::TempDir::new().unwrap();
    write_domain(root.path(), "cached", "[prompts]\nopen = \"Extract.\"\n");
    let registry = DomainRegistry::new(root.path());

    let first = registry.get("cached").unwrap();
    // Remove the files: the cached bundle must keep serving.
    std::fs::remove_dir_all(root.path().join("cached")).unwrap();
    let second = registry.get("cached").unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &second));
}

#[test]
fn list_returns_sorted_domain_ids() {
    let root = tempfile::TempDir::new().unwrap();
    write_domain(root.path(), "zeta", "[prompts]\nopen = \"Extract.\"\n");
    write_domain(root.path(), "alpha", "[prompts]\nopen = \"Extract.\"\n");
    // A directory without domain.toml is not a domain.
    std::fs::create_dir_all(root.path().join("not-a-domain")).unwrap();

    let registry = DomainRegistry::new(root.path());
    assert_eq!(registry.list(), vec!["alpha", "zeta"]);
}
