//! Terminology matching engine.
//! Glossary → term index; text → tokens → match spans → extraction list or
//! text with translations attached. Performs no I/O.

pub mod attach;
pub mod cache;
pub mod extract;
pub mod glossary;
pub mod index;
pub mod lemma;
pub mod matcher;
pub mod normalize;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{EngineWarning, Report};
use crate::metrics::{metric_names, MetricsRegistry};

use attach::AttachTemplate;
use cache::IndexCache;
use extract::ExtractionResult;
use glossary::Glossary;
use index::TermIndex;
use lemma::LemmaStore;

/// One glossary row. `source` may span several words.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GlossaryEntry {
    pub source: String,
    pub target: String,
}

/// A matched range of the original text. `end` is exclusive; byte offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchSpan<'a> {
    pub start: usize,
    pub end: usize,
    pub entry: &'a GlossaryEntry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    pub index_cache_capacity: usize,
    /// Warn when input is reliably detected as non-English.
    pub detect_language: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            index_cache_capacity: 8,
            detect_language: true,
        }
    }
}

/// Shared engine: lemma store, index cache, metrics. All methods take `&self`
/// and the engine can be used from several threads.
pub struct TermEngine {
    lemmas: Arc<LemmaStore>,
    cache: IndexCache,
    metrics: Arc<MetricsRegistry>,
    options: EngineOptions,
}

impl TermEngine {
    pub fn new(lemmas: Arc<LemmaStore>, options: EngineOptions) -> Self {
        Self::with_metrics(lemmas, options, Arc::new(MetricsRegistry::new()))
    }

    pub fn with_metrics(
        lemmas: Arc<LemmaStore>,
        options: EngineOptions,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            lemmas,
            cache: IndexCache::new(options.index_cache_capacity),
            metrics,
            options,
        }
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub fn lemma_store(&self) -> &Arc<LemmaStore> {
        &self.lemmas
    }

    /// Built (or cached) index for `glossary`.
    pub fn index_for(&self, glossary: &Glossary) -> Arc<TermIndex> {
        let key = IndexCache::compute_key(&glossary.fingerprint(), &self.lemmas.fingerprint());
        let (index, _hit) = self.cache.get_or_build(key, || {
            let span = self.metrics.span(metric_names::INDEX_BUILD);
            let index = TermIndex::build(glossary, Arc::clone(&self.lemmas));
            span.finish();
            index
        });
        index
    }

    /// Distinct glossary terms found in `text`, in first-seen order.
    pub fn extract(&self, glossary: &Glossary, text: &str) -> Report<ExtractionResult> {
        let warnings = self.warnings_for(text);
        let index = self.index_for(glossary);
        let result = self.with_spans(&index, text, |spans| {
            let span = self.metrics.span(metric_names::EXTRACT);
            let result = extract::extract(spans);
            span.finish();
            result
        });
        debug!(found = result.len(), "extraction finished");
        Report::new(result, warnings)
    }

    /// `text` with every matched span rendered through `template`.
    pub fn attach(&self, glossary: &Glossary, text: &str, template: &AttachTemplate) -> Report<String> {
        let warnings = self.warnings_for(text);
        let index = self.index_for(glossary);
        let output = self.with_spans(&index, text, |spans| {
            let span = self.metrics.span(metric_names::ATTACH);
            let output = attach::attach(text, spans, template);
            span.finish();
            debug!(attached = spans.len(), "attachment finished");
            output
        });
        Report::new(output, warnings)
    }

    fn with_spans<T>(&self, index: &TermIndex, text: &str, f: impl FnOnce(&[MatchSpan<'_>]) -> T) -> T {
        let span = self.metrics.span(metric_names::NORMALIZE);
        let tokens = index.normalizer().normalize(text);
        span.finish();

        let span = self.metrics.span(metric_names::MATCH);
        let spans = matcher::find_matches(text, &tokens, index);
        span.finish();

        f(&spans)
    }

    fn warnings_for(&self, text: &str) -> Vec<EngineWarning> {
        let mut warnings: Vec<EngineWarning> = self.lemmas.warning().into_iter().collect();
        if self.options.detect_language {
            if let Some(lang) = normalize::detect_language(text).filter(|&l| l != whatlang::Lang::Eng) {
                let code = normalize::language_code(lang);
                warn!(detected = code, "input is not English");
                warnings.push(EngineWarning::NonEnglishInput {
                    detected: code.to_string(),
                });
            }
        }
        warnings
    }
}
