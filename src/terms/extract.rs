//! Extractor: distinct matched glossary entries in first-seen order.

use std::collections::HashMap;

use serde::Serialize;

use super::{GlossaryEntry, MatchSpan};

/// One distinct glossary entry found in the text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedTerm {
    pub entry: GlossaryEntry,
    pub occurrences: usize,
    /// Byte offset of the first occurrence.
    pub first_offset: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionResult {
    pub terms: Vec<ExtractedTerm>,
}

impl ExtractionResult {
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn source_terms(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(|t| t.entry.source.as_str())
    }

    /// `(source, target)` pairs in first-seen order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.terms
            .iter()
            .map(|t| (t.entry.source.as_str(), t.entry.target.as_str()))
    }
}

/// Deduplicate spans by source term, keeping first-seen order.
pub fn extract(spans: &[MatchSpan<'_>]) -> ExtractionResult {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut terms: Vec<ExtractedTerm> = Vec::new();
    for span in spans {
        match seen.get(span.entry.source.as_str()) {
            Some(&i) => terms[i].occurrences += 1,
            None => {
                seen.insert(span.entry.source.as_str(), terms.len());
                terms.push(ExtractedTerm {
                    entry: span.entry.clone(),
                    occurrences: 1,
                    first_offset: span.start,
                });
            }
        }
    }
    ExtractionResult { terms }
}
