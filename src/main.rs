//! kgw CLI: connectivity-aware knowledge-graph extraction.

use std::path::PathBuf;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use rayon::prelude::*;

use kgweaver::domain::{DomainRegistry, PromptMode};
use kgweaver::export;
use kgweaver::extract::refine::CancelToken;
use kgweaver::input::{RecordFormat, load_records};
use kgweaver::llm::{OllamaClient, OllamaConfig};
use kgweaver::pipeline::{ExtractionConfig, ExtractionResult, process_record};

#[derive(Parser)]
#[command(name = "kgw", version, about = "Knowledge graph extraction via LLM backends")]
struct Cli {
    /// Directory containing domain resource bundles.
    #[arg(long, global = true, default_value = "./domains")]
    domains_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract knowledge graphs from a records file, one result per record.
    Extract {
        /// Records file (JSONL with id/text fields, or CSV with id/text columns).
        #[arg(long)]
        input: PathBuf,

        /// Input format: "jsonl" or "csv". Inferred from the extension if omitted.
        #[arg(long)]
        format: Option<String>,

        /// Domain identifier under the domains directory.
        #[arg(long)]
        domain: String,

        /// Output directory for per-record result JSON files.
        #[arg(long, default_value = "./out")]
        output: PathBuf,

        /// Prompt mode: "open" or "constrained".
        #[arg(long, default_value = "open")]
        mode: String,

        /// Acceptable number of disconnected components.
        #[arg(long, default_value = "1")]
        max_disconnected: usize,

        /// Refinement iteration budget (0 disables refinement).
        #[arg(long, default_value = "3")]
        max_iterations: usize,

        /// Sampling temperature.
        #[arg(long, default_value = "0.2")]
        temperature: f32,

        /// Ollama base URL.
        #[arg(long, default_value = "http://localhost:11434")]
        base_url: String,

        /// Ollama model name.
        #[arg(long, default_value = "llama3.2")]
        model: String,

        /// Per-call timeout in seconds.
        #[arg(long, default_value = "120")]
        timeout_secs: u64,

        /// Parallel worker count (default: rayon's choice).
        #[arg(long)]
        jobs: Option<usize>,
    },

    /// Inspect domain resource bundles.
    Domains {
        #[command(subcommand)]
        action: DomainsAction,
    },

    /// Convert an extraction result file to another graph format.
    Convert {
        /// An ExtractionResult JSON file produced by `kgw extract`.
        #[arg(long)]
        input: PathBuf,

        /// Target format: "graph-json" or "dot".
        #[arg(long, default_value = "graph-json")]
        to: String,

        /// Output file (stdout if omitted).
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum DomainsAction {
    /// List domains under the domains directory.
    List,
    /// Load and validate one domain bundle.
    Validate {
        /// Domain identifier.
        #[arg(long)]
        domain: String,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let registry = DomainRegistry::new(&cli.domains_dir);

    match cli.command {
        Commands::Extract {
            input,
            format,
            domain,
            output,
            mode,
            max_disconnected,
            max_iterations,
            temperature,
            base_url,
            model,
            timeout_secs,
            jobs,
        } => {
            let format = format
                .map(|f| f.parse::<RecordFormat>())
                .transpose()
                .into_diagnostic()?;
            let mode: PromptMode = mode.parse().map_err(|e: String| miette::miette!("{e}"))?;

            let config = ExtractionConfig {
                mode,
                max_disconnected,
                max_iterations,
                temperature,
            };

            // Fail fast on a bad domain before touching the backend.
            let domain = registry.get(&domain).into_diagnostic()?;

            let mut client = OllamaClient::new(OllamaConfig {
                base_url: base_url.clone(),
                model,
                timeout_secs,
            });
            if !client.probe() {
                return Err(miette::miette!(
                    "no LM backend answered at {base_url}; start one with `ollama serve` \
                     or pass --base-url"
                ));
            }

            let loaded = load_records(&input, format).into_diagnostic()?;
            std::fs::create_dir_all(&output).into_diagnostic()?;

            // Ctrl-C flips the shared flag; in-flight records finish their
            // current LM call, then stop between iterations.
            let cancel = CancelToken::new();
            signal_hook::flag::register(signal_hook::consts::SIGINT, cancel.flag())
                .into_diagnostic()?;

            if let Some(jobs) = jobs {
                rayon::ThreadPoolBuilder::new()
                    .num_threads(jobs)
                    .build_global()
                    .into_diagnostic()?;
            }

            let failures = AtomicUsize::new(0);
            loaded.records.par_iter().for_each(|record| {
                if cancel.is_cancelled() {
                    return;
                }
                match process_record(record, &domain, &client, &config, &cancel) {
                    Ok(result) => {
                        let path = output.join(format!("{}.json", sanitize_id(&record.id)));
                        match serde_json::to_string_pretty(&result) {
                            Ok(json) => {
                                if let Err(e) = std::fs::write(&path, json) {
                                    tracing::error!(record_id = %record.id, error = %e, "write failed");
                                    failures.fetch_add(1, Ordering::Relaxed);
                                }
                            }
                            Err(e) => {
                                tracing::error!(record_id = %record.id, error = %e, "serialize failed");
                                failures.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!(record_id = %record.id, error = %e, "extraction failed");
                        failures.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });

            let failed = failures.load(Ordering::Relaxed);
            let total = loaded.records.len();
            println!(
                "Processed {} record(s): {} succeeded, {} failed, {} input line(s) skipped.",
                total,
                total - failed,
                failed,
                loaded.skipped
            );
            println!("Results written to {}", output.display());
            if cancel.is_cancelled() {
                println!("Run was cancelled; unprocessed records were skipped.");
            }
        }

        Commands::Domains { action } => match action {
            DomainsAction::List => {
                let ids = registry.list();
                if ids.is_empty() {
                    println!("No domains found under {}", registry.root().display());
                } else {
                    for id in ids {
                        println!("{id}");
                    }
                }
            }
            DomainsAction::Validate { domain } => {
                let bundle = registry.get(&domain).into_diagnostic()?;
                println!(
                    "Domain \"{}\" is valid: {} few-shot example(s), schema: {}, bridging: {}",
                    bundle.id(),
                    bundle.examples().len(),
                    if bundle.schema().is_some() { "yes" } else { "no" },
                    bundle.prompt_identifiers(PromptMode::Open).bridging,
                );
            }
        },

        Commands::Convert { input, to, output } => {
            let raw = std::fs::read_to_string(&input).into_diagnostic()?;
            let result: ExtractionResult = serde_json::from_str(&raw).into_diagnostic()?;

            let rendered = match to.as_str() {
                "graph-json" => {
                    serde_json::to_string_pretty(&export::to_graph_export(&result.triples))
                        .into_diagnostic()?
                }
                "dot" => export::to_dot(&result.triples, &result.record_id),
                other => {
                    return Err(miette::miette!(
                        "unsupported target format \"{other}\" (expected graph-json or dot)"
                    ));
                }
            };

            match output {
                Some(path) => std::fs::write(&path, rendered).into_diagnostic()?,
                None => println!("{rendered}"),
            }
        }
    }

    Ok(())
}

/// Make a record id safe to use as a file name.
fn sanitize_id(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
