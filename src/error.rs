//! Error and warning types shared by the engine, the worker and the CLI.
//! Errors abort an operation; warnings ride along with a successful result.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// Glossary could not be loaded or validated.
#[derive(Debug, thiserror::Error)]
pub enum GlossaryError {
    #[error("glossary is empty")]
    Empty,
    #[error("glossary needs at least two columns (source, target), found {found}")]
    TooFewColumns { found: usize },
    #[error("glossary has {rows} rows but none with both a source and a target term")]
    NoValidRows { rows: usize },
    #[error("unsupported glossary format: {0}")]
    UnsupportedFormat(String),
    #[error("glossary IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("glossary CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("glossary JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GlossaryError {
    /// True for content problems (the InvalidGlossary kind), false for IO failures,
    /// including those the CSV reader hit while opening or reading the file.
    pub fn is_invalid_glossary(&self) -> bool {
        match self {
            GlossaryError::Io(_) => false,
            GlossaryError::Csv(e) => !matches!(e.kind(), csv::ErrorKind::Io(_)),
            _ => true,
        }
    }
}

/// Attachment template could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("template must contain {{original}} exactly once")]
    MissingOriginal,
    #[error("template contains {{original}} more than once")]
    DuplicateOriginal,
    #[error("template must contain {{translation}}")]
    MissingTranslation,
    #[error("unknown placeholder {{{0}}}")]
    UnknownPlaceholder(String),
    #[error("unbalanced brace at byte {0}")]
    UnbalancedBrace(usize),
}

/// Lemma data could not be prepared. Never surfaces as an operation error;
/// the engine degrades to identity normalization and reports a warning.
#[derive(Debug, thiserror::Error)]
pub enum LemmaError {
    #[error("lemma data IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed lemma data at {path}:{line}")]
    Malformed { path: PathBuf, line: usize },
    #[error("lemma data download failed: {0}")]
    Fetch(String),
    #[error("lemma data missing in {0} and no fetch URL configured")]
    Missing(PathBuf),
}

/// Top-level error returned by engine entry points.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Glossary(#[from] GlossaryError),
    #[error("invalid attach template: {0}")]
    Template(#[from] TemplateError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("config error: {0}")]
    Config(String),
    #[error("worker stopped")]
    WorkerStopped,
    #[error("job failed: {0}")]
    JobFailed(String),
}

/// Non-fatal conditions the caller must be told about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum EngineWarning {
    /// Lemma data unavailable; words are only case-folded.
    NormalizationUnavailable { reason: String },
    /// Input text is reliably detected as a language other than English.
    NonEnglishInput { detected: String },
    /// Input file was not valid UTF-8; invalid bytes were replaced.
    LossyDecoding { path: PathBuf },
}

impl fmt::Display for EngineWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineWarning::NormalizationUnavailable { reason } => {
                write!(f, "lemmatization unavailable, matching exact word forms only ({reason})")
            }
            EngineWarning::NonEnglishInput { detected } => {
                write!(f, "input looks like '{detected}', not English; inflected forms may be missed")
            }
            EngineWarning::LossyDecoding { path } => {
                write!(f, "{} is not valid UTF-8, invalid bytes were replaced", path.display())
            }
        }
    }
}

/// A successful result plus any warnings raised while producing it.
#[derive(Debug, Clone)]
pub struct Report<T> {
    pub value: T,
    pub warnings: Vec<EngineWarning>,
}

impl<T> Report<T> {
    pub fn new(value: T, warnings: Vec<EngineWarning>) -> Self {
        Self { value, warnings }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Report<U> {
        Report {
            value: f(self.value),
            warnings: self.warnings,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, EngineWarning::NormalizationUnavailable { .. }))
    }
}
