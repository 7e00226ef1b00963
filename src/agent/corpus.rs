//! In-memory corpus backing the `file_search` capability.
//!
//! Files are read once per session and split into paragraphs. A query is
//! answered by ranking paragraphs on how many distinct query terms they
//! contain, then on total term occurrences.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::error::ResearchError;

/// Maximum characters returned per passage.
const MAX_PASSAGE_CHARS: usize = 1500;
/// Characters of each file returned when no paragraph matches.
const HEAD_CHARS: usize = 2000;
/// Minimum term length considered during ranking.
const MIN_TERM_LEN: usize = 3;

static WORD_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"[\p{L}\p{N}_]+").ok());
static PARAGRAPH_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\n\s*\n").ok());

/// A passage returned by [`FileCorpus::search`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Passage {
    /// Source file.
    pub path: String,
    /// Passage text, truncated.
    pub text: String,
}

#[derive(Debug, Clone)]
struct Document {
    path: PathBuf,
    text: String,
    paragraphs: Vec<String>,
}

/// Loaded user files.
#[derive(Debug, Clone, Default)]
pub struct FileCorpus {
    documents: Vec<Document>,
}

impl FileCorpus {
    /// Reads every file in `paths`.
    ///
    /// # Errors
    ///
    /// Returns [`ResearchError::InvalidQuery`] naming the first unreadable file.
    pub fn load(paths: &[PathBuf]) -> Result<Self, ResearchError> {
        let mut documents = Vec::with_capacity(paths.len());
        for path in paths {
            let text =
                std::fs::read_to_string(path).map_err(|e| ResearchError::InvalidQuery {
                    message: format!("cannot read file {}: {e}", path.display()),
                })?;
            debug!(path = %path.display(), bytes = text.len(), "loaded file");
            documents.push(Document::new(path, text));
        }
        Ok(Self { documents })
    }

    /// Builds a corpus from in-memory `(path, text)` pairs.
    #[must_use]
    pub fn from_texts<P: AsRef<Path>>(texts: impl IntoIterator<Item = (P, String)>) -> Self {
        Self {
            documents: texts
                .into_iter()
                .map(|(p, t)| Document::new(p.as_ref(), t))
                .collect(),
        }
    }

    /// Number of loaded files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether no files are loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Returns up to `max_passages` passages relevant to `query`.
    ///
    /// When no paragraph shares a term with the query, the head of each
    /// file is returned instead so the agent still sees the material.
    #[must_use]
    pub fn search(&self, query: &str, max_passages: usize) -> Vec<Passage> {
        let terms = terms(query);
        let mut scored: Vec<(usize, usize, &Document, &str)> = Vec::new();

        for doc in &self.documents {
            for paragraph in &doc.paragraphs {
                let lower = paragraph.to_lowercase();
                let words = words(&lower);
                let distinct = terms.iter().filter(|t| words.contains(t.as_str())).count();
                if distinct == 0 {
                    continue;
                }
                let hits = words_iter(&lower)
                    .filter(|w| terms.contains(*w))
                    .count();
                scored.push((distinct, hits, doc, paragraph.as_str()));
            }
        }

        if scored.is_empty() {
            return self
                .documents
                .iter()
                .take(max_passages)
                .map(|doc| Passage {
                    path: doc.path.display().to_string(),
                    text: truncate(&doc.text, HEAD_CHARS),
                })
                .collect();
        }

        // Stable sort keeps file and paragraph order among equals.
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));
        scored
            .into_iter()
            .take(max_passages)
            .map(|(_, _, doc, paragraph)| Passage {
                path: doc.path.display().to_string(),
                text: truncate(paragraph, MAX_PASSAGE_CHARS),
            })
            .collect()
    }
}

impl Document {
    fn new(path: &Path, text: String) -> Self {
        let paragraphs = PARAGRAPH_RE.as_ref().map_or_else(
            || vec![text.clone()],
            |re| {
                re.split(&text)
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect()
            },
        );
        Self {
            path: path.to_path_buf(),
            text,
            paragraphs,
        }
    }
}

fn words_iter(text: &str) -> impl Iterator<Item = &str> {
    WORD_RE
        .as_ref()
        .into_iter()
        .flat_map(move |re| re.find_iter(text).map(|m| m.as_str()))
}

fn words(text: &str) -> HashSet<&str> {
    words_iter(text).collect()
}

fn terms(query: &str) -> HashSet<String> {
    let lower = query.to_lowercase();
    words_iter(&lower)
        .filter(|w| w.chars().count() >= MIN_TERM_LEN)
        .map(str::to_string)
        .collect()
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn corpus() -> FileCorpus {
        FileCorpus::from_texts([
            (
                "notes.md",
                "Intro paragraph about nothing.\n\nQuantum error correction uses surface codes.\n\nSurface codes need many physical qubits per logical qubit.".to_string(),
            ),
            ("other.md", "Unrelated cooking recipe.".to_string()),
        ])
    }

    #[test]
    fn test_ranks_by_distinct_terms() {
        let hits = corpus().search("surface codes qubits", 2);
        assert_eq!(hits.len(), 2);
        assert!(hits[0].text.starts_with("Surface codes need"));
        assert_eq!(hits[0].path, "notes.md");
    }

    #[test]
    fn test_no_match_returns_file_heads() {
        let hits = corpus().search("zebra", 5);
        assert_eq!(hits.len(), 2);
        assert!(hits[0].text.starts_with("Intro paragraph"));
    }

    #[test]
    fn test_short_terms_ignored() {
        let hits = corpus().search("of a", 1);
        assert_eq!(hits.len(), 1);
        assert!(hits[0].text.starts_with("Intro paragraph"));
    }

    #[test]
    fn test_truncate_is_char_safe() {
        let text = "é".repeat(10);
        assert_eq!(truncate(&text, 3), "ééé...");
        assert_eq!(truncate("abc", 10), "abc");
    }

    #[test]
    fn test_load_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap_or_else(|_| unreachable!());
        writeln!(file, "Rust ownership rules.\n\nBorrow checker details.")
            .unwrap_or_else(|_| unreachable!());
        let corpus =
            FileCorpus::load(&[file.path().to_path_buf()]).unwrap_or_else(|_| unreachable!());
        assert_eq!(corpus.len(), 1);
        let hits = corpus.search("borrow checker", 1);
        assert!(hits[0].text.contains("Borrow checker"));
    }

    #[test]
    fn test_load_missing_file() {
        let result = FileCorpus::load(&[PathBuf::from("/nonexistent/research.md")]);
        assert!(matches!(result, Err(ResearchError::InvalidQuery { .. })));
    }
}
