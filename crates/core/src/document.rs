//! Regulatory excerpts returned by retrieval

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Where an excerpt comes from: document title, number and clause.
///
/// Ordering is lexicographic on (number, clause, title) and is used as the
/// stable tie-breaker when relevance scores are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct SourceReference {
    pub title: String,
    pub number: String,
    #[serde(default)]
    pub clause: String,
}

impl SourceReference {
    pub fn new(
        title: impl Into<String>,
        number: impl Into<String>,
        clause: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            number: number.into(),
            clause: clause.into(),
        }
    }

    /// Short citation such as `СП 70.13330.2012, п. 9.1.5`
    pub fn citation(&self) -> String {
        let head = if self.number.is_empty() {
            self.title.clone()
        } else {
            self.number.clone()
        };
        if self.clause.is_empty() {
            head
        } else {
            format!("{}, п. {}", head, self.clause)
        }
    }

    fn sort_key(&self) -> (&str, &str, &str) {
        (&self.number, &self.clause, &self.title)
    }
}

impl Ord for SourceReference {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for SourceReference {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SourceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.title.is_empty() || self.number.is_empty() {
            f.write_str(&self.citation())
        } else if self.clause.is_empty() {
            write!(f, "{} «{}»", self.number, self.title)
        } else {
            write!(f, "{} «{}», п. {}", self.number, self.title, self.clause)
        }
    }
}

/// One ranked excerpt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    /// Index-level identifier, secondary tie-breaker after the source
    pub document_id: String,
    pub excerpt_text: String,
    pub source: SourceReference,
    /// Higher is more relevant, in [0, 1] for cosine indexes
    pub relevance_score: f32,
}

impl RetrievedDocument {
    /// Deterministic ranking: score descending, then source, then id
    pub fn rank_cmp(a: &Self, b: &Self) -> Ordering {
        b.relevance_score
            .total_cmp(&a.relevance_score)
            .then_with(|| a.source.cmp(&b.source))
            .then_with(|| a.document_id.cmp(&b.document_id))
    }

    /// Excerpt shortened to `max_chars` characters with an ellipsis
    pub fn excerpt_preview(&self, max_chars: usize) -> String {
        truncate_chars(&self.excerpt_text, max_chars)
    }
}

/// Cut a string at a character boundary, appending "..." when shortened
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, number: &str, score: f32) -> RetrievedDocument {
        RetrievedDocument {
            document_id: id.into(),
            excerpt_text: "текст".into(),
            source: SourceReference::new("Бетонные конструкции", number, "6.1"),
            relevance_score: score,
        }
    }

    #[test]
    fn test_citation_format() {
        let src = SourceReference::new("Несущие и ограждающие конструкции", "СП 70.13330.2012", "9.1.5");
        assert_eq!(src.citation(), "СП 70.13330.2012, п. 9.1.5");
        assert_eq!(
            src.to_string(),
            "СП 70.13330.2012 «Несущие и ограждающие конструкции», п. 9.1.5"
        );

        let bare = SourceReference::new("Инструкция", "", "");
        assert_eq!(bare.citation(), "Инструкция");
    }

    #[test]
    fn test_rank_ties_use_source_then_id() {
        let mut docs = vec![
            doc("b", "СП 2", 0.5),
            doc("a", "СП 2", 0.5),
            doc("z", "СП 1", 0.5),
            doc("y", "СП 9", 0.9),
        ];
        docs.sort_by(RetrievedDocument::rank_cmp);
        let ids: Vec<_> = docs.iter().map(|d| d.document_id.as_str()).collect();
        assert_eq!(ids, vec!["y", "z", "a", "b"]);
    }

    #[test]
    fn test_truncate_chars_counts_characters() {
        assert_eq!(truncate_chars("абвгд", 3), "абв...");
        assert_eq!(truncate_chars("абв", 3), "абв");
        assert_eq!(truncate_chars("", 3), "");
    }
}
