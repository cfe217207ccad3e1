//! Structured analysis produced by the reasoning backend

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::document::SourceReference;

/// Violation severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Accepts English and Russian labels, case-insensitive
    pub fn parse(label: &str) -> Option<Self> {
        let label = label.trim().to_lowercase();
        let severity = match label.as_str() {
            "low" | "minor" | "низкая" | "низкий" | "незначительная" => Self::Low,
            "medium" | "moderate" | "средняя" | "средний" | "умеренная" => Self::Medium,
            "high" | "major" | "высокая" | "высокий" | "значительная" => Self::High,
            "critical" | "severe" | "критическая" | "критический" | "аварийная" => Self::Critical,
            _ => return None,
        };
        Some(severity)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Label shown to users
    pub fn label_ru(&self) -> &'static str {
        match self {
            Self::Low => "низкая",
            Self::Medium => "средняя",
            Self::High => "высокая",
            Self::Critical => "критическая",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Low => "🟢",
            Self::Medium => "🟡",
            Self::High => "🟠",
            Self::Critical => "🔴",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated analysis of one report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Violation class, e.g. "structural defect"
    pub classification: String,
    pub severity: Severity,
    /// Regulations the recommendation relies on, most relevant first
    pub cited_references: Vec<SourceReference>,
    pub recommendation_text: String,
    /// Standardised restatement of the user's description
    #[serde(default)]
    pub corrected_description: Option<String>,
}

impl AnalysisResult {
    /// Cited references joined for a single spreadsheet cell
    pub fn citations_joined(&self) -> String {
        self.cited_references
            .iter()
            .map(SourceReference::citation)
            .collect::<Vec<_>>()
            .join("; ")
    }
}
