//! termbridge: aligns English tabletop-game terminology with a bilingual glossary.
//! Finds which glossary terms occur in a text (inflected forms included) and
//! rewrites a text with each term's translation attached inline.

pub mod config;
pub mod error;
pub mod export;
pub mod metrics;
pub mod terms;
pub mod worker;

pub use config::{EngineConfig, LemmaConfig};
pub use error::{EngineError, EngineWarning, GlossaryError, Report, TemplateError};
pub use terms::attach::AttachTemplate;
pub use terms::extract::{ExtractedTerm, ExtractionResult};
pub use terms::glossary::{Glossary, HeaderMode};
pub use terms::lemma::LemmaStore;
pub use terms::{EngineOptions, GlossaryEntry, MatchSpan, TermEngine};
pub use worker::{JobEvent, JobKind, JobOutput, Worker, WorkerHandle};

/// Install the global tracing subscriber. `RUST_LOG` overrides `default_filter`.
/// Later calls are no-ops.
pub fn init_tracing(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .try_init();
}
