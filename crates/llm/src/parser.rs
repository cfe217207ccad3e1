//! Model answer parsing
//!
//! The answer must be one JSON object. Markdown fences and leading prose are
//! tolerated; anything that does not yield the required fields is a
//! `MalformedResponse`.

use serde::Deserialize;

use site_inspector_core::{AnalysisError, AnalysisResult, RetrievedDocument, Severity, SourceReference};

#[derive(Debug, Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    classification: Option<String>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    corrected_description: Option<String>,
    #[serde(default)]
    cited_references: Option<Vec<RawReference>>,
    #[serde(default, alias = "recommendation_text")]
    recommendation: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawReference {
    Structured {
        #[serde(default, alias = "number")]
        document_number: String,
        #[serde(default, alias = "title")]
        document_title: String,
        #[serde(default, alias = "clause")]
        clause_number: String,
    },
    Plain(String),
}

/// Slice between the first `{` and the last `}`
fn json_object_slice(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

fn required(field: &str, value: Option<String>) -> Result<String, AnalysisError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AnalysisError::MalformedResponse(format!("missing field `{}`", field)))
}

/// Match a cited reference against the context so the canonical title and
/// number are used. Unknown references are kept as the model wrote them.
fn resolve_reference(raw: RawReference, context: &[RetrievedDocument]) -> Option<SourceReference> {
    let (number, title, clause) = match raw {
        RawReference::Structured {
            document_number,
            document_title,
            clause_number,
        } => (
            document_number.trim().to_string(),
            document_title.trim().to_string(),
            clause_number.trim().to_string(),
        ),
        RawReference::Plain(text) => {
            let text = text.trim().to_string();
            if text.is_empty() {
                return None;
            }
            let matched = context.iter().find(|d| {
                !d.source.number.is_empty() && text.contains(&d.source.number)
            });
            return Some(match matched {
                Some(doc) => doc.source.clone(),
                None => SourceReference::new(text, "", ""),
            });
        },
    };

    if number.is_empty() && title.is_empty() {
        return None;
    }

    let same_number = |d: &&RetrievedDocument| !number.is_empty() && d.source.number == number;
    let exact = context
        .iter()
        .filter(same_number)
        .find(|d| clause.is_empty() || d.source.clause == clause);

    Some(match exact {
        Some(doc) => doc.source.clone(),
        _ => {
            let title = if title.is_empty() {
                context
                    .iter()
                    .find(same_number)
                    .map(|d| d.source.title.clone())
                    .unwrap_or_default()
            } else {
                title
            };
            SourceReference::new(title, number, clause)
        },
    })
}

/// Parse and validate the model answer
///
/// When the model cites nothing but context exists, the top excerpt is cited.
pub fn parse_analysis(
    raw: &str,
    context: &[RetrievedDocument],
) -> Result<AnalysisResult, AnalysisError> {
    let json = json_object_slice(raw)
        .ok_or_else(|| AnalysisError::MalformedResponse("no JSON object in answer".to_string()))?;

    let parsed: RawAnalysis = serde_json::from_str(json)
        .map_err(|e| AnalysisError::MalformedResponse(format!("invalid JSON: {}", e)))?;

    let classification = required("classification", parsed.classification)?;
    let severity_label = required("severity", parsed.severity)?;
    let severity = Severity::parse(&severity_label).ok_or_else(|| {
        AnalysisError::MalformedResponse(format!("unknown severity `{}`", severity_label))
    })?;
    let recommendation_text = required("recommendation", parsed.recommendation)?;

    let mut cited_references: Vec<SourceReference> = Vec::new();
    for reference in parsed
        .cited_references
        .unwrap_or_default()
        .into_iter()
        .filter_map(|r| resolve_reference(r, context))
    {
        if !cited_references.contains(&reference) {
            cited_references.push(reference);
        }
    }

    if cited_references.is_empty() {
        if let Some(top) = context.first() {
            cited_references.push(top.source.clone());
        }
    }

    Ok(AnalysisResult {
        classification,
        severity,
        cited_references,
        recommendation_text,
        corrected_description: parsed
            .corrected_description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty()),
    })
}
