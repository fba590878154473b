//! Greedy leftmost-longest matching of the token stream against a `TermIndex`.

use super::index::TermIndex;
use super::normalize::Token;
use super::MatchSpan;

/// Non-overlapping spans in ascending offset order. Deterministic for a given
/// index and token stream. `tokens` must come from `text`.
///
/// A span ends after the last matched word, or after the term's closing
/// punctuation when the text repeats it verbatim ("Strike (Melee)").
pub fn find_matches<'i>(text: &str, tokens: &[Token], index: &'i TermIndex) -> Vec<MatchSpan<'i>> {
    let mut spans = Vec::new();
    let mut pos = 0;
    while pos < tokens.len() {
        match index.lookup(tokens, pos) {
            Some(hit) => {
                let mut end = tokens[pos + hit.len - 1].end;
                let tail = index.tail(hit.entry);
                if !tail.is_empty() && text[end..].starts_with(tail) {
                    end += tail.len();
                }
                spans.push(MatchSpan {
                    start: tokens[pos].start,
                    end,
                    entry: index.entry(hit.entry),
                });
                pos += hit.len;
            }
            None => pos += 1,
        }
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terms::glossary::{Glossary, HeaderMode};
    use crate::terms::lemma::LemmaStore;
    use std::sync::Arc;

    fn index(pairs: &[(&str, &str)]) -> TermIndex {
        let glossary =
            Glossary::from_rows(pairs.iter().map(|(s, t)| [*s, *t]), HeaderMode::Absent).unwrap();
        TermIndex::build(&glossary, Arc::new(LemmaStore::builtin()))
    }

    fn matched<'t>(text: &'t str, pairs: &[(&str, &str)]) -> Vec<(&'t str, String)> {
        let idx = index(pairs);
        let tokens = idx.normalizer().normalize(text);
        find_matches(text, &tokens, &idx)
            .into_iter()
            .map(|s| (&text[s.start..s.end], s.entry.target.clone()))
            .collect()
    }

    #[test]
    fn longest_match_beats_prefix() {
        assert_eq!(
            matched("a fire ball", &[("fire", "X"), ("fire ball", "Y")]),
            [("fire ball", "Y".to_string())]
        );
    }

    #[test]
    fn span_covers_original_surface_with_inner_spacing() {
        assert_eq!(
            matched("Take an Attack  of\nOpportunity!", &[("attack of opportunity", "借机攻击")]),
            [("Attack  of\nOpportunity", "借机攻击".to_string())]
        );
    }

    #[test]
    fn consumed_tokens_are_not_rematched() {
        // "ball" inside "fire ball" must not also match on its own
        assert_eq!(
            matched("fire ball", &[("fire ball", "Y"), ("ball", "Z")]),
            [("fire ball", "Y".to_string())]
        );
    }

    #[test]
    fn leftmost_match_wins_over_later_longer_one() {
        assert_eq!(
            matched("flat footed strike", &[("flat footed", "A"), ("footed strike", "B")]),
            [("flat footed", "A".to_string())]
        );
    }

    #[test]
    fn repeated_terms_each_produce_a_span() {
        let spans = matched("Shield, shield and SHIELDS.", &[("shield", "盾")]);
        let surfaces: Vec<&str> = spans.iter().map(|(s, _)| *s).collect();
        assert_eq!(surfaces, ["Shield", "shield", "SHIELDS"]);
    }

    #[test]
    fn span_takes_in_closing_punctuation_of_the_term() {
        let pairs = [("Strike (Melee)", "打击（近战）")];
        assert_eq!(
            matched("a Strike (Melee) roll", &pairs),
            [("Strike (Melee)", "打击（近战）".to_string())]
        );
        // punctuation missing from the text is not required
        assert_eq!(
            matched("a Strike (Melee", &pairs),
            [("Strike (Melee", "打击（近战）".to_string())]
        );
        assert!(matched("a Strike, Melee roll", &pairs).is_empty());
    }

    #[test]
    fn no_tokens_no_spans() {
        assert!(matched("", &[("shield", "盾")]).is_empty());
        assert!(matched("nothing relevant here", &[("shield", "盾")]).is_empty());
    }
}
