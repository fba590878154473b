//! Attacher: copies the original text and renders each matched span through
//! a format template such as `{original} {translation}`.

use std::fmt;
use std::str::FromStr;

use crate::error::TemplateError;

use super::MatchSpan;

pub const DEFAULT_TEMPLATE: &str = "{original} {translation}";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Original,
    Translation,
}

/// Parsed template. `{original}` appears exactly once, `{translation}` at
/// least once, `{{`/`}}` are literal braces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachTemplate {
    raw: String,
    pieces: Vec<Piece>,
}

impl AttachTemplate {
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        let mut pieces = Vec::new();
        let mut literal = String::new();
        let mut chars = raw.char_indices().peekable();

        while let Some((i, c)) = chars.next() {
            match c {
                '{' if chars.peek().map(|&(_, n)| n) == Some('{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek().map(|&(_, n)| n) == Some('}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let rest = &raw[i + 1..];
                    let close = rest.find('}').ok_or(TemplateError::UnbalancedBrace(i))?;
                    let name = &rest[..close];
                    let piece = match name {
                        "original" => Piece::Original,
                        "translation" => Piece::Translation,
                        other => return Err(TemplateError::UnknownPlaceholder(other.to_string())),
                    };
                    // Skip the placeholder body and its closing brace
                    for _ in 0..name.chars().count() + 1 {
                        chars.next();
                    }
                    if !literal.is_empty() {
                        pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                    }
                    pieces.push(piece);
                }
                '}' => return Err(TemplateError::UnbalancedBrace(i)),
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            pieces.push(Piece::Literal(literal));
        }

        match pieces.iter().filter(|p| **p == Piece::Original).count() {
            0 => return Err(TemplateError::MissingOriginal),
            1 => {}
            _ => return Err(TemplateError::DuplicateOriginal),
        }
        if !pieces.contains(&Piece::Translation) {
            return Err(TemplateError::MissingTranslation);
        }

        Ok(Self {
            raw: raw.to_string(),
            pieces,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Append the rendered template for one span to `out`.
    pub fn render_into(&self, original: &str, translation: &str, out: &mut String) {
        for piece in &self.pieces {
            match piece {
                Piece::Literal(s) => out.push_str(s),
                Piece::Original => out.push_str(original),
                Piece::Translation => out.push_str(translation),
            }
        }
    }

    pub fn render(&self, original: &str, translation: &str) -> String {
        let mut out = String::new();
        self.render_into(original, translation, &mut out);
        out
    }
}

impl Default for AttachTemplate {
    fn default() -> Self {
        Self {
            raw: DEFAULT_TEMPLATE.to_string(),
            pieces: vec![
                Piece::Original,
                Piece::Literal(" ".to_string()),
                Piece::Translation,
            ],
        }
    }
}

impl FromStr for AttachTemplate {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for AttachTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Copy `text` once with a cursor, rendering every span through `template`.
/// Text outside spans is copied byte for byte. `spans` must be ascending and
/// non-overlapping, as produced by the matcher.
pub fn attach(text: &str, spans: &[MatchSpan<'_>], template: &AttachTemplate) -> String {
    let mut out = String::with_capacity(text.len() + spans.len() * 16);
    let mut cursor = 0;
    for span in spans {
        debug_assert!(span.start >= cursor, "spans overlap or are unordered");
        out.push_str(&text[cursor..span.start]);
        template.render_into(&text[span.start..span.end], &span.entry.target, &mut out);
        cursor = span.end;
    }
    out.push_str(&text[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terms::GlossaryEntry;

    #[test]
    fn default_template_appends_translation() {
        let t = AttachTemplate::default();
        assert_eq!(t.render("fireballs", "火球术"), "fireballs 火球术");
        assert_eq!(t, AttachTemplate::parse(DEFAULT_TEMPLATE).unwrap());
    }

    #[test]
    fn parses_custom_templates() {
        let t: AttachTemplate = "{translation} {original}".parse().unwrap();
        assert_eq!(t.render("Shield", "盾"), "盾 Shield");
        let t: AttachTemplate = "{original}（{translation}）".parse().unwrap();
        assert_eq!(t.render("Shield", "盾"), "Shield（盾）");
        let t: AttachTemplate = "{{{original}}}[{translation}]".parse().unwrap();
        assert_eq!(t.render("Shield", "盾"), "{Shield}[盾]");
    }

    #[test]
    fn rejects_bad_templates() {
        assert_eq!(AttachTemplate::parse("{translation}"), Err(TemplateError::MissingOriginal));
        assert_eq!(AttachTemplate::parse("{original}"), Err(TemplateError::MissingTranslation));
        assert_eq!(
            AttachTemplate::parse("{original}{original}{translation}"),
            Err(TemplateError::DuplicateOriginal)
        );
        assert_eq!(
            AttachTemplate::parse("{original} {lang}"),
            Err(TemplateError::UnknownPlaceholder("lang".into()))
        );
        assert_eq!(
            AttachTemplate::parse("{original} {translation"),
            Err(TemplateError::UnbalancedBrace(11))
        );
        assert_eq!(
            AttachTemplate::parse("{original}} {translation}"),
            Err(TemplateError::UnbalancedBrace(10))
        );
    }

    #[test]
    fn attach_preserves_surrounding_text() {
        let fireball = GlossaryEntry {
            source: "fireball".into(),
            target: "火球术".into(),
        };
        let text = "Two fireballs hit the wall.";
        let spans = [MatchSpan { start: 4, end: 13, entry: &fireball }];
        assert_eq!(
            attach(text, &spans, &AttachTemplate::default()),
            "Two fireballs 火球术 hit the wall."
        );
    }

    #[test]
    fn attach_without_spans_is_identity() {
        let text = "  Nothing\tto\nsee.  ";
        assert_eq!(attach(text, &[], &AttachTemplate::default()), text);
        assert_eq!(attach("", &[], &AttachTemplate::default()), "");
    }
}
