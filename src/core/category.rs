//! Research category produced by the router.
//!
//! The category selects which writer, reviser and standards evaluator
//! variant the pipeline uses downstream.

use serde::{Deserialize, Serialize};

/// Fixed set of research categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResearchCategory {
    /// Natural sciences, medicine, mathematics.
    Scientific,
    /// Computing, engineering, technology.
    Technical,
    /// History, philosophy, literature, social sciences.
    Humanities,
    /// Topics spanning several of the above.
    Interdisciplinary,
}

impl ResearchCategory {
    /// All categories, in declaration order.
    pub const ALL: [Self; 4] = [
        Self::Scientific,
        Self::Technical,
        Self::Humanities,
        Self::Interdisciplinary,
    ];

    /// Parses a category label (case-insensitive, tolerant of punctuation
    /// and common synonyms).
    ///
    /// Returns `None` for anything outside the fixed set so callers can
    /// apply their own fallback.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let label: String = s
            .trim()
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect();

        match label.as_str() {
            "scientific" | "science" | "sciences" => Some(Self::Scientific),
            "technical" | "technology" | "tech" | "engineering" => Some(Self::Technical),
            "humanities" | "humanity" | "history" | "philosophy" => Some(Self::Humanities),
            "interdisciplinary" | "crossdisciplinary" | "multidisciplinary" => {
                Some(Self::Interdisciplinary)
            }
            _ => None,
        }
    }

    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Scientific => "scientific",
            Self::Technical => "technical",
            Self::Humanities => "humanities",
            Self::Interdisciplinary => "interdisciplinary",
        }
    }
}

impl Default for ResearchCategory {
    fn default() -> Self {
        Self::Interdisciplinary
    }
}

impl std::fmt::Display for ResearchCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
