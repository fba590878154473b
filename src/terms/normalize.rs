//! Tokenization, lemmatization and language detection.
//! Turns raw text into word tokens that keep their exact byte spans, so
//! matches can always be mapped back onto the untouched original text.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::lemma::Lemmatizer;

/// A word: maximal run of letters, combining marks and digits.
static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{L}\p{M}\p{N}]+").expect("word pattern is valid"));

/// Punctuation between a word and the previous one, with whitespace, hyphens
/// and apostrophes dropped. "fire-ball" and "fire ball" both give "", while
/// "Strike (Melee)" gives "(" before "Melee". Empty for the first token.
fn joint_of(gap: &str) -> String {
    gap.chars()
        .filter(|&c| !c.is_whitespace() && !is_joiner(c))
        .collect()
}

/// One word of the input. `start..end` is a byte range into the original text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub lemma: String,
    pub joint: String,
}

/// Word spans with their joints, without lemmas.
pub fn word_spans(text: &str) -> impl Iterator<Item = (usize, usize, String)> + '_ {
    let mut prev_end: Option<usize> = None;
    WORD.find_iter(text).map(move |m| {
        let joint = match prev_end {
            Some(prev) => joint_of(&text[prev..m.start()]),
            None => String::new(),
        };
        prev_end = Some(m.end());
        (m.start(), m.end(), joint)
    })
}

/// Lower-cased word forms of all `terms`; these count as known base forms.
pub fn vocabulary<'a>(terms: impl IntoIterator<Item = &'a str>) -> HashSet<String> {
    terms
        .into_iter()
        .flat_map(|term| word_spans(term).map(move |(s, e, _)| term[s..e].to_lowercase()))
        .collect()
}

/// Tokenizer plus lemmatizer. Holds no mutable state.
#[derive(Debug, Clone)]
pub struct Normalizer {
    lemmatizer: Lemmatizer,
}

impl Normalizer {
    pub fn new(lemmatizer: Lemmatizer) -> Self {
        Self { lemmatizer }
    }

    pub fn lemmatizer(&self) -> &Lemmatizer {
        &self.lemmatizer
    }

    /// Tokens in text order. Empty or punctuation-only input yields no tokens.
    pub fn normalize(&self, text: &str) -> Vec<Token> {
        word_spans(text)
            .map(|(start, end, joint)| {
                let surface = &text[start..end];
                Token {
                    text: surface.to_string(),
                    start,
                    end,
                    lemma: self.lemmatizer.lemmatize(surface),
                    joint,
                }
            })
            .collect()
    }
}

/// Language of `text` when whatlang is confident about it.
pub fn detect_language(text: &str) -> Option<whatlang::Lang> {
    whatlang::detect(text)
        .filter(whatlang::Info::is_reliable)
        .map(|info| info.lang())
}

/// Two-letter code for the languages tabletop rules are usually translated
/// between; whatlang's three-letter code otherwise.
pub fn language_code(lang: whatlang::Lang) -> &'static str {
    use whatlang::Lang;
    match lang {
        Lang::Eng => "en",
        Lang::Cmn => "zh",
        Lang::Jpn => "ja",
        Lang::Kor => "ko",
        Lang::Deu => "de",
        Lang::Fra => "fr",
        Lang::Spa => "es",
        Lang::Rus => "ru",
        Lang::Por => "pt",
        Lang::Ita => "it",
        Lang::Pol => "pl",
        other => other.code(),
    }
}
