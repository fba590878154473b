//! Term index: glossary source terms as a trie over lemma sequences.
//! Lookup walks the token stream from a position and reports the longest
//! glossary term ending there. Terms sharing a lemma sequence ("Strike",
//! "Striking") share a node; the one spelled like the text wins, otherwise
//! the first loaded.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use super::glossary::Glossary;
use super::lemma::{self, LemmaStore, Lemmatizer};
use super::normalize::{self, Normalizer, Token};
use super::GlossaryEntry;

/// One trie step: a lemma plus the punctuation joining it to the previous word.
type Edge = (String, String);

#[derive(Debug, Default)]
struct Node {
    /// (joint, next node) per lemma.
    children: HashMap<String, Vec<(String, usize)>>,
    /// Terms ending here, in load order. Singular variants come after the
    /// terms spelled this way.
    entries: Vec<usize>,
}

/// Longest term found at a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexHit {
    pub entry: usize,
    /// Number of tokens consumed.
    pub len: usize,
}

/// Built once per glossary; read-only afterwards and safe to share.
#[derive(Debug)]
pub struct TermIndex {
    entries: Vec<GlossaryEntry>,
    /// Lower-cased words of each source term.
    surfaces: Vec<Vec<String>>,
    /// Punctuation closing each source term, e.g. ")" for "Strike (Melee)".
    tails: Vec<String>,
    nodes: Vec<Node>,
    normalizer: Normalizer,
    duplicates: usize,
    unmatchable: usize,
}

impl TermIndex {
    /// Tokenize and lemmatize every source term with the same normalizer used
    /// for input text, then insert in glossary order. Plural words of a term
    /// also get their singular forms indexed, so "Fireballs" matches "fireball".
    pub fn build(glossary: &Glossary, store: Arc<LemmaStore>) -> Self {
        let vocabulary = normalize::vocabulary(glossary.entries().iter().map(|e| e.source.as_str()));
        let degraded = store.is_degraded();
        let normalizer = Normalizer::new(Lemmatizer::new(store, vocabulary));

        let mut index = Self {
            entries: glossary.entries().to_vec(),
            surfaces: Vec::with_capacity(glossary.len()),
            tails: Vec::with_capacity(glossary.len()),
            nodes: vec![Node::default()],
            normalizer,
            duplicates: 0,
            unmatchable: 0,
        };

        let mut paths = Vec::with_capacity(index.entries.len());
        for i in 0..index.entries.len() {
            let source = &index.entries[i].source;
            let tokens = index.normalizer.normalize(source);
            index
                .surfaces
                .push(tokens.iter().map(|t| t.text.to_lowercase()).collect());
            index
                .tails
                .push(tokens.last().map_or("", |t| source[t.end..].trim()).to_string());
            if tokens.is_empty() {
                debug!(source = %source, "term has no words, never matches");
                index.unmatchable += 1;
            }
            paths.push(tokens);
        }

        for (i, tokens) in paths.iter().enumerate() {
            if !tokens.is_empty() {
                index.insert(&lemma_path(tokens), i);
            }
        }

        let mut variants = 0;
        if !degraded {
            for (i, tokens) in paths.iter().enumerate() {
                for path in index.singular_paths(tokens) {
                    if index.insert_variant(&path, i) {
                        variants += 1;
                    }
                }
            }
        }

        info!(
            terms = index.entries.len(),
            nodes = index.nodes.len(),
            variants,
            duplicates = index.duplicates,
            unmatchable = index.unmatchable,
            "term index built"
        );
        index
    }

    /// Paths with one plural word replaced by the lemma of a singular form.
    fn singular_paths(&self, tokens: &[Token]) -> Vec<Vec<Edge>> {
        let base = lemma_path(tokens);
        let lemmatizer = self.normalizer.lemmatizer();

        let mut paths = Vec::new();
        for (k, token) in tokens.iter().enumerate() {
            let folded = token.text.to_lowercase();
            for singular in lemma::singular_candidates(&folded) {
                let reduced = lemmatizer.lemmatize(&singular);
                if reduced == token.lemma {
                    continue;
                }
                let mut path = base.clone();
                path[k].0 = reduced;
                paths.push(path);
            }
        }
        paths
    }

    fn node_for(&mut self, path: &[Edge]) -> usize {
        let mut node = 0;
        for (lemma, joint) in path {
            let existing = self.nodes[node]
                .children
                .get(lemma)
                .and_then(|edges| edges.iter().find(|(j, _)| j == joint))
                .map(|&(_, next)| next);
            node = match existing {
                Some(next) => next,
                None => {
                    let next = self.nodes.len();
                    self.nodes.push(Node::default());
                    self.nodes[node]
                        .children
                        .entry(lemma.clone())
                        .or_default()
                        .push((joint.clone(), next));
                    next
                }
            };
        }
        node
    }

    fn insert(&mut self, path: &[Edge], entry: usize) {
        let node = self.node_for(path);
        let shadowed = self.nodes[node]
            .entries
            .iter()
            .copied()
            .find(|&e| self.surfaces[e] == self.surfaces[entry]);
        match shadowed {
            Some(first) => {
                debug!(
                    kept = %self.entries[first].source,
                    dropped = %self.entries[entry].source,
                    "duplicate term, keeping first"
                );
                self.duplicates += 1;
            }
            None => self.nodes[node].entries.push(entry),
        }
    }

    /// Returns false when the node already holds the entry.
    fn insert_variant(&mut self, path: &[Edge], entry: usize) -> bool {
        let node = self.node_for(path);
        if self.nodes[node].entries.contains(&entry) {
            return false;
        }
        self.nodes[node].entries.push(entry);
        true
    }

    /// Longest glossary term whose lemmas match `tokens[pos..]`.
    pub fn lookup(&self, tokens: &[Token], pos: usize) -> Option<IndexHit> {
        let mut node = 0;
        let mut best: Option<(usize, usize)> = None;
        for (k, token) in tokens.get(pos..)?.iter().enumerate() {
            let joint = edge_joint(k, token);
            let Some(next) = self.nodes[node]
                .children
                .get(&token.lemma)
                .and_then(|edges| edges.iter().find(|(j, _)| j == joint))
                .map(|&(_, next)| next)
            else {
                break;
            };
            node = next;
            if !self.nodes[node].entries.is_empty() {
                best = Some((node, k + 1));
            }
        }

        let (node, len) = best?;
        let matched = &tokens[pos..pos + len];
        let entries = &self.nodes[node].entries;
        let entry = entries
            .iter()
            .copied()
            .find(|&e| self.spelled_like(e, matched))
            .or_else(|| entries.first().copied())?;
        Some(IndexHit { entry, len })
    }

    fn spelled_like(&self, entry: usize, tokens: &[Token]) -> bool {
        let words = &self.surfaces[entry];
        words.len() == tokens.len()
            && words
                .iter()
                .zip(tokens)
                .all(|(word, token)| *word == token.text.to_lowercase())
    }

    pub fn entry(&self, idx: usize) -> &GlossaryEntry {
        &self.entries[idx]
    }

    /// Punctuation that closes the source term, empty for most terms.
    pub fn tail(&self, idx: usize) -> &str {
        &self.tails[idx]
    }

    /// The normalizer input text must go through to match this index.
    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn term_count(&self) -> usize {
        self.entries.len()
    }

    /// Entries shadowed by an earlier entry spelled the same way.
    pub fn duplicate_count(&self) -> usize {
        self.duplicates
    }
}

fn lemma_path(tokens: &[Token]) -> Vec<Edge> {
    tokens
        .iter()
        .enumerate()
        .map(|(k, t)| (t.lemma.clone(), edge_joint(k, t).to_string()))
        .collect()
}

/// The joint before a term's first word does not constrain matching.
fn edge_joint(k: usize, token: &Token) -> &str {
    if k == 0 {
        ""
    } else {
        &token.joint
    }
}
