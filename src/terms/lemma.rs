//! Lemmatization resource and WordNet-style lemmatizer.
//! `LemmaStore` is built once (built-in table, local data directory, or a
//! one-time download into that directory) and is read-only afterwards.
//! Any failure degrades to identity normalization with a warning.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tracing::{debug, info, warn};

use crate::config::LemmaConfig;
use crate::error::{EngineWarning, LemmaError};

/// Irregular forms shipped with the crate.
const BUILTIN_EXCEPTIONS: &str = include_str!("../../data/exceptions.tsv");

pub const EXCEPTIONS_FILE: &str = "exceptions.tsv";
pub const LEXICON_FILE: &str = "lexicon.txt";

/// Shortest stem a suffix rule may leave behind.
const MIN_STEM: usize = 2;
/// Same, when the result is known only from the glossary.
const MIN_GLOSSARY_STEM: usize = 3;

/// Detachment rules, tried in order. Result must be a known word.
const NOUN_RULES: &[(&str, &str)] = &[
    ("s", ""),
    ("ses", "s"),
    ("xes", "x"),
    ("zes", "z"),
    ("ches", "ch"),
    ("shes", "sh"),
    ("men", "man"),
    ("ies", "y"),
];

const VERB_RULES: &[(&str, &str)] = &[
    ("s", ""),
    ("ies", "y"),
    ("es", "e"),
    ("es", ""),
    ("ed", "e"),
    ("ed", ""),
    ("ing", "e"),
    ("ing", ""),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartOfSpeech {
    Noun,
    Verb,
}

impl PartOfSpeech {
    fn rules(self) -> &'static [(&'static str, &'static str)] {
        match self {
            PartOfSpeech::Noun => NOUN_RULES,
            PartOfSpeech::Verb => VERB_RULES,
        }
    }
}

#[derive(Debug, Default)]
struct LemmaData {
    noun_exceptions: HashMap<String, String>,
    verb_exceptions: HashMap<String, String>,
    lexicon: HashSet<String>,
}

impl LemmaData {
    fn exceptions(&self, pos: PartOfSpeech) -> &HashMap<String, String> {
        match pos {
            PartOfSpeech::Noun => &self.noun_exceptions,
            PartOfSpeech::Verb => &self.verb_exceptions,
        }
    }

    /// Parse `form<TAB>lemma[<TAB>n|v]` lines. Blank lines and `#` comments are skipped.
    fn merge_exceptions(&mut self, content: &str, origin: &Path) -> Result<usize, LemmaError> {
        let mut count = 0;
        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut cols = line.split('\t').map(str::trim);
            let (Some(form), Some(lemma)) = (cols.next(), cols.next()) else {
                return Err(LemmaError::Malformed {
                    path: origin.to_path_buf(),
                    line: line_no + 1,
                });
            };
            if form.is_empty() || lemma.is_empty() {
                return Err(LemmaError::Malformed {
                    path: origin.to_path_buf(),
                    line: line_no + 1,
                });
            }
            let (form, lemma) = (form.to_lowercase(), lemma.to_lowercase());
            match cols.next().unwrap_or("") {
                "n" => {
                    self.noun_exceptions.insert(form, lemma);
                }
                "v" => {
                    self.verb_exceptions.insert(form, lemma);
                }
                "" => {
                    self.noun_exceptions.insert(form.clone(), lemma.clone());
                    self.verb_exceptions.insert(form, lemma);
                }
                _ => {
                    return Err(LemmaError::Malformed {
                        path: origin.to_path_buf(),
                        line: line_no + 1,
                    })
                }
            }
            count += 1;
        }
        Ok(count)
    }

    fn merge_lexicon(&mut self, content: &str) -> usize {
        let before = self.lexicon.len();
        self.lexicon.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .map(str::to_lowercase),
        );
        self.lexicon.len() - before
    }
}

/// Process-wide lemmatization resource. Create once, share as `Arc<LemmaStore>`.
#[derive(Debug)]
pub struct LemmaStore {
    /// `None` means identity normalization (case-folding only).
    data: Option<LemmaData>,
    degraded: Option<String>,
    fingerprint: [u8; 32],
}

impl LemmaStore {
    /// Store backed by the built-in irregular-form table only.
    pub fn builtin() -> Self {
        let mut data = LemmaData::default();
        match data.merge_exceptions(BUILTIN_EXCEPTIONS, Path::new("<builtin>")) {
            Ok(count) => {
                debug!(exceptions = count, "builtin lemma table loaded");
                Self::from_data(data, BUILTIN_EXCEPTIONS.as_bytes())
            }
            Err(e) => Self::identity(e.to_string()),
        }
    }

    /// Degraded store: words are only case-folded.
    pub fn identity(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        warn!(reason = %reason, "lemmatization unavailable, using identity normalization");
        Self {
            data: None,
            degraded: Some(reason),
            fingerprint: *blake3::hash(b"identity").as_bytes(),
        }
    }

    /// Built-in table extended with `exceptions.tsv` and `lexicon.txt` from `dir`.
    /// At least one of the two files must exist.
    pub fn from_dir(dir: &Path) -> Result<Self, LemmaError> {
        let mut data = LemmaData::default();
        data.merge_exceptions(BUILTIN_EXCEPTIONS, Path::new("<builtin>"))?;

        let mut hasher = blake3::Hasher::new();
        hasher.update(BUILTIN_EXCEPTIONS.as_bytes());

        let exceptions_path = dir.join(EXCEPTIONS_FILE);
        let lexicon_path = dir.join(LEXICON_FILE);
        if !exceptions_path.exists() && !lexicon_path.exists() {
            return Err(LemmaError::Missing(dir.to_path_buf()));
        }

        if exceptions_path.exists() {
            let content = read_data_file(&exceptions_path)?;
            let count = data.merge_exceptions(&content, &exceptions_path)?;
            hasher.update(content.as_bytes());
            debug!(path = %exceptions_path.display(), exceptions = count, "lemma exceptions loaded");
        }
        if lexicon_path.exists() {
            let content = read_data_file(&lexicon_path)?;
            let count = data.merge_lexicon(&content);
            hasher.update(b"|");
            hasher.update(content.as_bytes());
            debug!(path = %lexicon_path.display(), words = count, "lexicon loaded");
        }

        info!(
            dir = %dir.display(),
            nouns = data.noun_exceptions.len(),
            verbs = data.verb_exceptions.len(),
            lexicon = data.lexicon.len(),
            "lemma data ready"
        );
        Ok(Self {
            data: Some(data),
            degraded: None,
            fingerprint: *hasher.finalize().as_bytes(),
        })
    }

    /// Resolve the configured lemma source. Downloads missing files when a
    /// fetch URL is set; files already present are never fetched again.
    /// Never fails: problems yield an identity store carrying the reason.
    pub async fn initialize(config: &LemmaConfig) -> Self {
        let Some(dir) = config.data_dir.as_deref() else {
            return Self::builtin();
        };

        if let Some(url) = config.fetch_url.as_deref() {
            let timeout = Duration::from_secs(config.fetch_timeout_secs.max(1));
            if let Err(e) = fetch_missing(dir, url, timeout).await {
                warn!(error = %e, "lemma data download failed");
                return Self::identity(e.to_string());
            }
        }

        match Self::from_dir(dir) {
            Ok(store) => store,
            Err(e) => Self::identity(e.to_string()),
        }
    }

    fn from_data(data: LemmaData, source: &[u8]) -> Self {
        Self {
            data: Some(data),
            degraded: None,
            fingerprint: *blake3::hash(source).as_bytes(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.data.is_none()
    }

    /// Warning to attach to every operation run against a degraded store.
    pub fn warning(&self) -> Option<EngineWarning> {
        self.degraded
            .as_ref()
            .map(|reason| EngineWarning::NormalizationUnavailable { reason: reason.clone() })
    }

    /// Identifies the data content, for index cache keys.
    pub fn fingerprint(&self) -> [u8; 32] {
        self.fingerprint
    }
}

fn read_data_file(path: &Path) -> Result<String, LemmaError> {
    std::fs::read_to_string(path).map_err(|source| LemmaError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Lemmatizer bound to one glossary's vocabulary.
/// Words of the glossary count as known base forms alongside the lexicon, so
/// "fireballs" reduces to "fireball" whenever the glossary mentions "fireball".
#[derive(Debug, Clone)]
pub struct Lemmatizer {
    store: Arc<LemmaStore>,
    vocabulary: HashSet<String>,
}

impl Lemmatizer {
    pub fn new(store: Arc<LemmaStore>, vocabulary: HashSet<String>) -> Self {
        Self { store, vocabulary }
    }

    pub fn store(&self) -> &Arc<LemmaStore> {
        &self.store
    }

    /// Case-fold `word` and reduce it: verb pass, then noun pass.
    pub fn lemmatize(&self, word: &str) -> String {
        let folded = word.to_lowercase();
        let Some(data) = self.store.data.as_ref() else {
            return folded;
        };
        let verb = self.morph(data, &folded, PartOfSpeech::Verb);
        self.morph(data, &verb, PartOfSpeech::Noun)
    }

    fn is_known(&self, data: &LemmaData, word: &str) -> bool {
        data.lexicon.contains(word) || self.vocabulary.contains(word)
    }

    /// A detached stem may land on a lexicon word from two characters up, but
    /// on a glossary-only word ("AC", "DC") only from three, so "aces" stays "aces".
    fn accepts(&self, data: &LemmaData, candidate: &str, stem_len: usize) -> bool {
        if data.lexicon.contains(candidate) {
            return stem_len >= MIN_STEM;
        }
        stem_len >= MIN_GLOSSARY_STEM && self.vocabulary.contains(candidate)
    }

    /// Shortest known candidate wins; first rule on ties; unknown words stay as they are.
    fn morph(&self, data: &LemmaData, word: &str, pos: PartOfSpeech) -> String {
        if let Some(lemma) = data.exceptions(pos).get(word) {
            return lemma.clone();
        }

        let mut best: Option<String> = self.is_known(data, word).then(|| word.to_string());
        for (suffix, ending) in pos.rules() {
            let Some(stem) = word.strip_suffix(suffix) else {
                continue;
            };
            let stem_len = stem.chars().count();
            let candidate = format!("{stem}{ending}");
            let shorter = best
                .as_ref()
                .map_or(true, |b| candidate.chars().count() < b.chars().count());
            if shorter && self.accepts(data, &candidate, stem_len) {
                best = Some(candidate);
            }
        }
        best.unwrap_or_else(|| word.to_string())
    }
}

/// Singular forms a lower-cased plural-looking word may come from.
/// "fireballs" gives "fireball", "matches" gives "matche" and "match".
pub fn singular_candidates(word: &str) -> impl Iterator<Item = String> + '_ {
    let blocked = ["ss", "us", "is"].iter().any(|end| word.ends_with(end));
    NOUN_RULES.iter().filter_map(move |(suffix, ending)| {
        if *suffix == "s" && blocked {
            return None;
        }
        let stem = word.strip_suffix(suffix)?;
        (stem.chars().count() >= MIN_GLOSSARY_STEM).then(|| format!("{stem}{ending}"))
    })
}

/// Download whichever lemma files are missing from `dir`.
async fn fetch_missing(dir: &Path, base_url: &str, timeout: Duration) -> Result<(), LemmaError> {
    let missing: Vec<&str> = [EXCEPTIONS_FILE, LEXICON_FILE]
        .into_iter()
        .filter(|name| !dir.join(name).exists())
        .collect();
    if missing.is_empty() {
        debug!(dir = %dir.display(), "lemma data present, no download needed");
        return Ok(());
    }

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| LemmaError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

    let http = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| LemmaError::Fetch(e.to_string()))?;

    for name in missing {
        let url = format!("{}/{}", base_url.trim_end_matches('/'), name);
        info!(url = %url, "downloading lemma data");
        let bytes = download_with_retry(&http, &url).await?;

        // Write to a sibling temp file first so a partial download never looks complete
        let target = dir.join(name);
        let partial: PathBuf = dir.join(format!("{name}.part"));
        tokio::fs::write(&partial, &bytes)
            .await
            .map_err(|source| LemmaError::Io {
                path: partial.clone(),
                source,
            })?;
        tokio::fs::rename(&partial, &target)
            .await
            .map_err(|source| LemmaError::Io {
                path: target.clone(),
                source,
            })?;
        info!(path = %target.display(), bytes = bytes.len(), "lemma data saved");
    }
    Ok(())
}

/// GET with retry: 5xx gets exponential backoff (max 2), a timeout is retried once.
async fn download_with_retry(http: &reqwest::Client, url: &str) -> Result<Vec<u8>, LemmaError> {
    let max_5xx_retries: u32 = 2;
    let mut attempt: u32 = 0;
    let mut timeout_retried = false;

    loop {
        match http.get(url).send().await {
            Ok(resp) if resp.status().is_success() => {
                let mut body = Vec::new();
                let mut stream = resp.bytes_stream();
                while let Some(chunk) = stream.next().await {
                    let chunk = chunk.map_err(|e| LemmaError::Fetch(e.to_string()))?;
                    body.extend_from_slice(&chunk);
                }
                return Ok(body);
            }
            Ok(resp) if resp.status().is_server_error() => {
                if attempt >= max_5xx_retries {
                    return Err(LemmaError::Fetch(format!("server error: {}", resp.status())));
                }
                let wait = Duration::from_millis(500 * (1 << attempt));
                warn!(
                    attempt,
                    status = resp.status().as_u16(),
                    wait_ms = wait.as_millis() as u64,
                    "5xx error, retrying"
                );
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
            Ok(resp) => {
                return Err(LemmaError::Fetch(format!("unexpected status {} for {url}", resp.status())));
            }
            Err(e) if e.is_timeout() => {
                if timeout_retried {
                    return Err(LemmaError::Fetch(format!("timeout fetching {url}")));
                }
                warn!("request timeout, retrying once");
                timeout_retried = true;
            }
            Err(e) => return Err(LemmaError::Fetch(e.to_string())),
        }
    }
}
