//! Glossary store: ordered source → target term pairs.
//! Loads tabular data (in-memory rows, CSV, TSV) or the JSON glossary format,
//! validating up front so matching never sees a malformed glossary.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::GlossaryEntry;
use crate::error::GlossaryError;

/// Column labels recognised as a header row.
const HEADER_LABELS: &[&str] = &[
    "source",
    "target",
    "term",
    "translation",
    "english",
    "chinese",
    "original",
    "en",
    "zh",
    "原文",
    "译文",
    "原名",
    "译名",
    "英文",
    "中文",
];

/// How to treat the first row of tabular glossary data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderMode {
    /// Skip the first row if both of its first two cells are known column labels.
    #[default]
    Auto,
    Present,
    Absent,
}

/// On-disk JSON glossary format.
#[derive(Debug, Deserialize)]
struct GlossaryFile {
    #[serde(default)]
    version: u32,
    entries: Vec<GlossaryEntry>,
}

/// Validated glossary. Never empty; row order is match priority.
#[derive(Debug, Clone)]
pub struct Glossary {
    version: u32,
    entries: Vec<GlossaryEntry>,
}

impl Glossary {
    /// Build from tabular rows. Column 1 is the source term, column 2 the
    /// target; further columns are ignored. Cells are trimmed and rows missing
    /// either term are skipped.
    pub fn from_rows<I, R, S>(rows: I, header: HeaderMode) -> Result<Self, GlossaryError>
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rows: Vec<Vec<String>> = rows
            .into_iter()
            .map(|row| row.into_iter().map(|cell| clean_cell(cell.as_ref())).collect())
            .collect();

        if rows.is_empty() {
            return Err(GlossaryError::Empty);
        }
        let widest = rows.iter().map(Vec::len).max().unwrap_or(0);
        if widest < 2 {
            return Err(GlossaryError::TooFewColumns { found: widest });
        }

        let skip_header = match header {
            HeaderMode::Present => true,
            HeaderMode::Absent => false,
            HeaderMode::Auto => looks_like_header(&rows[0]),
        };
        if skip_header {
            debug!(header = ?rows[0], "skipping glossary header row");
        }
        let data = &rows[usize::from(skip_header)..];

        let mut entries = Vec::with_capacity(data.len());
        for (i, row) in data.iter().enumerate() {
            match (row.first(), row.get(1)) {
                (Some(source), Some(target)) if !source.is_empty() && !target.is_empty() => {
                    entries.push(GlossaryEntry {
                        source: source.clone(),
                        target: target.clone(),
                    });
                }
                _ => debug!(row = i + 1 + usize::from(skip_header), "skipping incomplete glossary row"),
            }
        }

        if entries.is_empty() {
            return Err(GlossaryError::NoValidRows { rows: data.len() });
        }
        info!(
            terms = entries.len(),
            skipped = data.len() - entries.len(),
            "glossary loaded"
        );
        Ok(Self { version: 0, entries })
    }

    /// Build from already-paired entries, with the same validation as rows.
    pub fn from_entries(entries: Vec<GlossaryEntry>) -> Result<Self, GlossaryError> {
        Self::from_rows(
            entries.into_iter().map(|e| [e.source, e.target]),
            HeaderMode::Absent,
        )
    }

    /// Load by file extension: `.csv`, `.tsv`/`.txt`, or `.json`.
    pub fn load(path: &Path, header: HeaderMode) -> Result<Self, GlossaryError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Self::load_delimited(path, b',', header),
            "tsv" | "txt" => Self::load_delimited(path, b'\t', header),
            "json" => Self::load_json(path),
            other => Err(GlossaryError::UnsupportedFormat(if other.is_empty() {
                path.display().to_string()
            } else {
                format!(".{other}")
            })),
        }
    }

    /// Load delimiter-separated rows. Rows may have differing widths.
    pub fn load_delimited(path: &Path, delimiter: u8, header: HeaderMode) -> Result<Self, GlossaryError> {
        info!(path = %path.display(), "loading glossary");
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .from_path(path)?;
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect::<Vec<_>>());
        }
        Self::from_rows(rows, header)
    }

    /// Load the JSON format: `{ "version": 1, "entries": [{ "source", "target" }] }`.
    pub fn load_json(path: &Path) -> Result<Self, GlossaryError> {
        info!(path = %path.display(), "loading glossary");
        let content = std::fs::read_to_string(path)?;
        let file: GlossaryFile = serde_json::from_str(&content)?;
        let mut glossary = Self::from_entries(file.entries)?;
        glossary.version = file.version;
        Ok(glossary)
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn entries(&self) -> &[GlossaryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// blake3 digest of the ordered pairs. Equal glossaries share built indexes.
    pub fn fingerprint(&self) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        for entry in &self.entries {
            hasher.update(entry.source.as_bytes());
            hasher.update(&[0x1f]);
            hasher.update(entry.target.as_bytes());
            hasher.update(&[0x1e]);
        }
        *hasher.finalize().as_bytes()
    }
}

/// Trim whitespace and a leading byte-order mark (spreadsheet exports).
fn clean_cell(cell: &str) -> String {
    cell.trim_start_matches('\u{feff}').trim().to_string()
}

fn looks_like_header(row: &[String]) -> bool {
    let is_label = |cell: Option<&String>| {
        cell.map(|c| c.to_lowercase())
            .is_some_and(|c| HEADER_LABELS.contains(&c.as_str()))
    };
    is_label(row.first()) && is_label(row.get(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn parses_rows_and_trims_cells() {
        let g = Glossary::from_rows(
            rows(&[&[" Fireball ", " 火球术 "], &["Hit Points", "生命值", "extra"]]),
            HeaderMode::Auto,
        )
        .unwrap();
        assert_eq!(g.len(), 2);
        assert_eq!(g.entries()[0].source, "Fireball");
        assert_eq!(g.entries()[0].target, "火球术");
        assert_eq!(g.entries()[1].target, "生命值");
    }

    #[test]
    fn detects_known_header_row() {
        let g = Glossary::from_rows(
            rows(&[&["原文", "译文"], &["Fireball", "火球术"]]),
            HeaderMode::Auto,
        )
        .unwrap();
        assert_eq!(g.len(), 1);
        assert_eq!(g.entries()[0].source, "Fireball");

        let g = Glossary::from_rows(
            rows(&[&["Source", "Target"], &["Fireball", "火球术"]]),
            HeaderMode::Absent,
        )
        .unwrap();
        assert_eq!(g.len(), 2);
    }

    #[test]
    fn data_row_is_not_mistaken_for_header() {
        let g = Glossary::from_rows(
            rows(&[&["Fireball", "火球术"], &["Shield", "护盾"]]),
            HeaderMode::Auto,
        )
        .unwrap();
        assert_eq!(g.len(), 2);
    }

    #[test]
    fn rejects_degenerate_tables() {
        let empty: Vec<Vec<String>> = Vec::new();
        assert!(matches!(
            Glossary::from_rows(empty, HeaderMode::Auto),
            Err(GlossaryError::Empty)
        ));
        assert!(matches!(
            Glossary::from_rows(rows(&[&["only"], &["one"]]), HeaderMode::Auto),
            Err(GlossaryError::TooFewColumns { found: 1 })
        ));
        assert!(matches!(
            Glossary::from_rows(rows(&[&["a", ""], &["", "b"]]), HeaderMode::Absent),
            Err(GlossaryError::NoValidRows { rows: 2 })
        ));
    }

    #[test]
    fn skips_incomplete_rows() {
        let g = Glossary::from_rows(
            rows(&[&["Fireball", "火球术"], &["Orphan"], &["", "孤儿"], &["Shield", "护盾"]]),
            HeaderMode::Absent,
        )
        .unwrap();
        let sources: Vec<&str> = g.entries().iter().map(|e| e.source.as_str()).collect();
        assert_eq!(sources, ["Fireball", "Shield"]);
    }

    #[test]
    fn loads_csv_with_bom_and_header() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        write!(file, "\u{feff}source,target\nFireball,火球术\n\"Attack of Opportunity\",借机攻击\n").unwrap();
        let g = Glossary::load(file.path(), HeaderMode::Auto).unwrap();
        assert_eq!(g.len(), 2);
        assert_eq!(g.entries()[1].source, "Attack of Opportunity");
    }

    #[test]
    fn loads_tsv_with_ragged_rows() {
        let mut file = tempfile::Builder::new().suffix(".tsv").tempfile().unwrap();
        write!(file, "Fireball\t火球术\nlonely\nShield\t护盾\tnote\n").unwrap();
        let g = Glossary::load(file.path(), HeaderMode::Absent).unwrap();
        assert_eq!(g.len(), 2);
    }

    #[test]
    fn loads_json_format() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"version": 3, "entries": [{{"source": "Fireball", "target": "火球术"}}]}}"#
        )
        .unwrap();
        let g = Glossary::load(file.path(), HeaderMode::Auto).unwrap();
        assert_eq!(g.version(), 3);
        assert_eq!(g.entries()[0].target, "火球术");
    }

    #[test]
    fn missing_file_is_an_io_failure_not_an_invalid_glossary() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["absent.csv", "absent.tsv", "absent.json"] {
            let err = Glossary::load(&dir.path().join(name), HeaderMode::Auto).unwrap_err();
            assert!(!err.is_invalid_glossary(), "{name}: {err}");
        }
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = Glossary::load(Path::new("terms.xlsx"), HeaderMode::Auto).unwrap_err();
        assert!(matches!(err, GlossaryError::UnsupportedFormat(ref ext) if ext == ".xlsx"));
    }

    #[test]
    fn fingerprint_depends_on_order() {
        let a = Glossary::from_rows(rows(&[&["a", "1"], &["b", "2"]]), HeaderMode::Absent).unwrap();
        let b = Glossary::from_rows(rows(&[&["b", "2"], &["a", "1"]]), HeaderMode::Absent).unwrap();
        let a2 = a.clone();
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint(), a2.fingerprint());
    }
}
