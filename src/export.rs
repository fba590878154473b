//! Text file I/O and extraction-result rendering (plain list, CSV).

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{EngineError, EngineWarning, Report};
use crate::terms::extract::{ExtractedTerm, ExtractionResult};

pub const LIST_HEADER: &str = "Extracted terms (source -> target):";
pub const CSV_COLUMNS: (&str, &str) = ("原文", "译文");

/// Paths written by [`export_extraction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub list: PathBuf,
    pub csv: PathBuf,
}

/// Read a text file as UTF-8. A leading BOM is dropped; invalid bytes are
/// replaced and reported as a warning.
pub fn load_text(path: &Path) -> Result<Report<String>, EngineError> {
    info!(path = %path.display(), "reading text file");
    let bytes = std::fs::read(path)?;
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(&bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => Ok(Report::new(text.to_string(), Vec::new())),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "invalid UTF-8, replacing bad bytes");
            Ok(Report::new(
                String::from_utf8_lossy(bytes).into_owned(),
                vec![EngineWarning::LossyDecoding {
                    path: path.to_path_buf(),
                }],
            ))
        }
    }
}

/// Write `content` as UTF-8, creating parent directories.
pub fn save_text(path: &Path, content: &str) -> Result<(), EngineError> {
    ensure_parent(path)?;
    std::fs::write(path, content)?;
    info!(path = %path.display(), bytes = content.len(), "file saved");
    Ok(())
}

/// Terms ordered longest source first; ties keep first-seen order.
pub fn sorted_for_export(result: &ExtractionResult) -> Vec<&ExtractedTerm> {
    let mut terms: Vec<&ExtractedTerm> = result.terms.iter().collect();
    terms.sort_by_key(|t| std::cmp::Reverse(t.entry.source.chars().count()));
    terms
}

/// Header, separator, then one `source    target` line per term.
pub fn render_plain_list(result: &ExtractionResult) -> String {
    let mut out = format!("{LIST_HEADER}\n{}\n", "=".repeat(40));
    for term in sorted_for_export(result) {
        out.push_str(&term.entry.source);
        out.push_str("    ");
        out.push_str(&term.entry.target);
        out.push('\n');
    }
    out
}

/// Two-column CSV with a header row, same order as the plain list.
pub fn write_csv(result: &ExtractionResult, path: &Path) -> Result<(), EngineError> {
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([CSV_COLUMNS.0, CSV_COLUMNS.1])?;
    for term in sorted_for_export(result) {
        writer.write_record([term.entry.source.as_str(), term.entry.target.as_str()])?;
    }
    writer.flush()?;
    info!(path = %path.display(), rows = result.len(), "CSV exported");
    Ok(())
}

/// Write `<prefix>_results.txt` and `<prefix>_results.csv`.
/// Nothing is written when no terms were found.
pub fn export_extraction(result: &ExtractionResult, prefix: &Path) -> Result<Option<ExportPaths>, EngineError> {
    if result.is_empty() {
        info!("no matching terms, no output files written");
        return Ok(None);
    }
    let paths = ExportPaths {
        list: with_suffix(prefix, "_results.txt"),
        csv: with_suffix(prefix, "_results.csv"),
    };
    save_text(&paths.list, &render_plain_list(result))?;
    write_csv(result, &paths.csv)?;
    info!(terms = result.len(), "results exported");
    Ok(Some(paths))
}

fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = prefix.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

fn ensure_parent(path: &Path) -> Result<(), EngineError> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            std::fs::create_dir_all(dir)?;
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terms::GlossaryEntry;

    fn result(pairs: &[(&str, &str)]) -> ExtractionResult {
        ExtractionResult {
            terms: pairs
                .iter()
                .enumerate()
                .map(|(i, (s, t))| ExtractedTerm {
                    entry: GlossaryEntry {
                        source: s.to_string(),
                        target: t.to_string(),
                    },
                    occurrences: 1,
                    first_offset: i * 10,
                })
                .collect(),
        }
    }

    #[test]
    fn plain_list_sorts_longest_first() {
        let r = result(&[("wall", "墙"), ("Attack of Opportunity", "借机攻击"), ("shield", "盾")]);
        let text = render_plain_list(&r);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], LIST_HEADER);
        assert_eq!(lines[1], "=".repeat(40));
        assert_eq!(&lines[2..], ["Attack of Opportunity    借机攻击", "shield    盾", "wall    墙"]);
    }

    #[test]
    fn export_writes_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("out").join("chapter1");
        let r = result(&[("fireball", "火球术")]);
        let paths = export_extraction(&r, &prefix).unwrap().unwrap();
        assert!(paths.list.ends_with("chapter1_results.txt"));
        let csv = std::fs::read_to_string(&paths.csv).unwrap();
        assert_eq!(csv, "原文,译文\nfireball,火球术\n");
        assert!(std::fs::read_to_string(&paths.list).unwrap().contains("fireball    火球术"));
    }

    #[test]
    fn empty_result_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("empty");
        assert_eq!(export_extraction(&ExtractionResult::default(), &prefix).unwrap(), None);
        assert!(!with_suffix(&prefix, "_results.txt").exists());
    }

    #[test]
    fn load_text_strips_bom_and_reports_lossy_input() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.txt");
        std::fs::write(&good, b"\xEF\xBB\xBFFireball!").unwrap();
        let report = load_text(&good).unwrap();
        assert_eq!(report.value, "Fireball!");
        assert!(report.warnings.is_empty());

        let bad = dir.path().join("bad.txt");
        std::fs::write(&bad, b"caf\xE9 fireball").unwrap();
        let report = load_text(&bad).unwrap();
        assert_eq!(report.value, "caf\u{FFFD} fireball");
        assert_eq!(report.warnings, [EngineWarning::LossyDecoding { path: bad.clone() }]);
    }

    #[test]
    fn save_text_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b.txt");
        save_text(&path, "Two fireballs 火球术").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "Two fireballs 火球术");
    }
}
