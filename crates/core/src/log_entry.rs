//! Flattened interaction rows for the append-only log

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::analysis::AnalysisResult;
use crate::document::{truncate_chars, RetrievedDocument};
use crate::report::{InputKind, RawInput, UserId, ViolationReport};

/// Outcome marker of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    Validation,
    Transcription,
    Retrieval,
    Analysis,
    Logging,
    Reply,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Transcription => "transcription",
            Self::Retrieval => "retrieval",
            Self::Analysis => "analysis",
            Self::Logging => "logging",
            Self::Reply => "reply",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Number of excerpts summarised in the `context` column
const CONTEXT_EXCERPTS: usize = 3;
/// Characters kept per excerpt in the `context` column
const CONTEXT_EXCERPT_CHARS: usize = 200;

/// One row of the interaction log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub user_id: UserId,
    pub input_kind: InputKind,
    pub input_text: String,
    pub retrieved: Vec<RetrievedDocument>,
    pub analysis: Option<AnalysisResult>,
    pub status: RunStatus,
    pub failed_stage: Option<PipelineStage>,
    pub error: Option<String>,
    pub model: String,
}

impl LogEntry {
    /// Column headers, in row order
    pub const COLUMNS: [&'static str; 14] = [
        "timestamp",
        "user_id",
        "input_text",
        "retrieved_sources",
        "classification",
        "severity",
        "recommendation",
        "status",
        "input_kind",
        "failed_stage",
        "error",
        "cited_references",
        "model",
        "context",
    ];

    pub fn success(
        report: &ViolationReport,
        retrieved: Vec<RetrievedDocument>,
        analysis: AnalysisResult,
        model: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            user_id: report.user_id(),
            input_kind: report.input_kind(),
            input_text: logged_input(report),
            retrieved,
            analysis: Some(analysis),
            status: RunStatus::Success,
            failed_stage: None,
            error: None,
            model: model.into(),
        }
    }

    /// Row for a run that passed validation but failed later.
    /// Analysis columns stay empty.
    pub fn failure(
        report: &ViolationReport,
        retrieved: Vec<RetrievedDocument>,
        stage: PipelineStage,
        error: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            user_id: report.user_id(),
            input_kind: report.input_kind(),
            input_text: logged_input(report),
            retrieved,
            analysis: None,
            status: RunStatus::Failed,
            failed_stage: Some(stage),
            error: Some(error.into()),
            model: model.into(),
        }
    }

    /// Sources of the retrieved excerpts joined with "; "
    pub fn sources_joined(&self) -> String {
        self.retrieved
            .iter()
            .map(|doc| doc.source.citation())
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Short summary of the top excerpts
    pub fn context_summary(&self) -> String {
        self.retrieved
            .iter()
            .take(CONTEXT_EXCERPTS)
            .enumerate()
            .map(|(i, doc)| {
                format!(
                    "Чанк {}:\nДокумент: {}\nТекст: {}",
                    i + 1,
                    doc.source.citation(),
                    truncate_chars(&doc.excerpt_text, CONTEXT_EXCERPT_CHARS)
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Flatten into cells matching [`LogEntry::COLUMNS`]
    pub fn to_row(&self) -> Vec<String> {
        let (classification, severity, recommendation, cited) = match &self.analysis {
            Some(a) => (
                a.classification.clone(),
                a.severity.to_string(),
                a.recommendation_text.clone(),
                a.citations_joined(),
            ),
            None => Default::default(),
        };

        vec![
            self.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            self.user_id.to_string(),
            self.input_text.clone(),
            self.sources_joined(),
            classification,
            severity,
            recommendation,
            self.status.to_string(),
            self.input_kind.to_string(),
            self.failed_stage.map(|s| s.to_string()).unwrap_or_default(),
            self.error.clone().unwrap_or_default(),
            cited,
            self.model.clone(),
            self.context_summary(),
        ]
    }
}

/// Description for the `input_text` column. An untranscribed voice report
/// is logged as a `voice:<file_id> (<secs>s)` marker.
fn logged_input(report: &ViolationReport) -> String {
    match (report.description(), report.raw_input()) {
        (Some(text), _) => text.to_string(),
        (None, RawInput::Voice(audio)) => {
            format!("voice:{} ({}s)", audio.file_id, audio.meta.duration.as_secs())
        },
        (None, RawInput::Text(_)) => String::new(),
    }
}
