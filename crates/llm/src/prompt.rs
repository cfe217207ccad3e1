//! Prompt Building
//!
//! Constructs the construction-control analysis prompt. The model is asked
//! for one JSON object whose fields map onto `AnalysisResult`.

use serde::{Deserialize, Serialize};
use std::fmt;

use site_inspector_core::RetrievedDocument;

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

pub const NO_CONTEXT: &str = "Релевантные нормативные документы не найдены.";

const SYSTEM_PROMPT: &str = "Вы — профессиональный ИИ-ассистент в сфере строительного контроля. \
Ваша задача — преобразовывать описания нарушений в стандартизированные формулировки с учётом \
актуальной нормативной документации, подбирать ссылки на нормы, оценивать серьёзность нарушения \
и предлагать конкретные меры по устранению.";

const ANSWER_FORMAT: &str = r#"Ответь ОДНИМ JSON-объектом без пояснений и без markdown:
{
  "classification": "краткая категория нарушения, например \"structural defect\" или \"дефект несущих конструкций\"",
  "severity": "low | medium | high | critical",
  "corrected_description": "кратко и чётко скорректированное описание нарушения",
  "cited_references": [
    { "document_number": "номер документа из контекста", "document_title": "название", "clause_number": "пункт" }
  ],
  "recommendation": "конкретные меры по устранению с указанием срока"
}
Ссылайся только на документы из контекста. Если подходящих документов нет, оставь cited_references пустым.
Если сообщение не относится к строительному контролю, укажи classification "вне компетенции", severity "low" и в recommendation напиши: "Я могу отвечать только на вопросы по строительному контролю и нормативам.""#;

/// Numbered context block, one entry per excerpt
pub fn format_context(documents: &[RetrievedDocument]) -> String {
    if documents.is_empty() {
        return NO_CONTEXT.to_string();
    }

    documents
        .iter()
        .enumerate()
        .map(|(i, doc)| {
            format!(
                "Документ {}:\n- Название: {}\n- Номер: {}\n- Пункт: {}\n- Текст: {}\n- Релевантность: {:.3}\n",
                i + 1,
                doc.source.title,
                doc.source.number,
                doc.source.clause,
                doc.excerpt_text,
                doc.relevance_score
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prompt builder for the analysis call
#[derive(Debug, Default)]
pub struct PromptBuilder {
    messages: Vec<Message>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Role and task description
    pub fn system_prompt(mut self) -> Self {
        self.messages.push(Message::system(SYSTEM_PROMPT));
        self
    }

    /// Violation description, retrieved excerpts and answer format
    pub fn violation(mut self, description: &str, context: &[RetrievedDocument]) -> Self {
        let body = format!(
            "Исходный текст нарушения: {}\n\nКонтекст из нормативной базы:\n{}\n\n{}",
            description,
            format_context(context),
            ANSWER_FORMAT
        );
        self.messages.push(Message::user(body));
        self
    }

    /// Build final message list
    pub fn build(self) -> Vec<Message> {
        self.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use site_inspector_core::SourceReference;

    fn doc() -> RetrievedDocument {
        RetrievedDocument {
            document_id: "sp70-9.18.3".into(),
            excerpt_text: "Трещины в несущих стенах подлежат обследованию.".into(),
            source: SourceReference::new(
                "Несущие и ограждающие конструкции",
                "СП 70.13330.2012",
                "9.18.3",
            ),
            relevance_score: 0.87654,
        }
    }

    #[test]
    fn test_format_context() {
        let context = format_context(&[doc()]);
        assert!(context.starts_with("Документ 1:"));
        assert!(context.contains("- Номер: СП 70.13330.2012"));
        assert!(context.contains("- Пункт: 9.18.3"));
        assert!(context.contains("- Релевантность: 0.877"));
    }

    #[test]
    fn test_empty_context_message() {
        assert_eq!(format_context(&[]), NO_CONTEXT);
    }

    #[test]
    fn test_builder_produces_system_then_user() {
        let messages = PromptBuilder::new()
            .system_prompt()
            .violation("трещина в несущей стене, дом 12", &[doc()])
            .build();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].role, Role::User);
        assert!(messages[1].content.contains("трещина в несущей стене, дом 12"));
        assert!(messages[1].content.contains("\"severity\""));
    }
}
