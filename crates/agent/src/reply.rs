//! User-facing texts and reply formatting
//!
//! Replies use Telegram HTML parse mode. Every piece of user or model text
//! is escaped, and long fields are cut so the message stays under the
//! transport limit.

use site_inspector_core::{
    truncate_chars, AnalysisError, AnalysisResult, Error, InlineButton, OutboundMessage,
    TranscriptionError, ValidationError,
};

use crate::event::CallbackAction;

/// Telegram message length limit
pub const MAX_MESSAGE_CHARS: usize = 4096;

const MAX_ORIGINAL_CHARS: usize = 800;
const MAX_DESCRIPTION_CHARS: usize = 800;
const MAX_RECOMMENDATION_CHARS: usize = 1500;
const MAX_CITATIONS: usize = 5;
const MAX_CITATION_CHARS: usize = 200;

pub const PROGRESS_VOICE: &str = "🔄 Обрабатываю голосовое сообщение...";
pub const PROGRESS_ANALYZING: &str = "🔍 Анализирую нарушение...";
pub const UNSUPPORTED_HINT: &str =
    "❌ Пожалуйста, отправьте голосовое сообщение или текстовое описание нарушения.";

const NEW_VIOLATION_BUTTON: &str = "🚨 Сообщить о нарушении";

/// Escape `<`, `>`, `&` and `"` for HTML parse mode
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    out
}

fn new_violation_button() -> InlineButton {
    InlineButton::new(NEW_VIOLATION_BUTTON, CallbackAction::NewViolation.as_data())
}

/// Plain text message with the "report a violation" button
pub fn with_keyboard(text: impl Into<String>) -> OutboundMessage {
    OutboundMessage::plain(text).with_button(new_violation_button())
}

pub fn welcome(max_voice_secs: u64) -> OutboundMessage {
    let text = format!(
        "🔍 <b>Привет, инспектор!</b>\n\n\
         Я помогу проанализировать нарушения и найти соответствующие нормативные документы.\n\n\
         💡 <b>Как использовать:</b>\n\
         1. Нажмите кнопку «Сообщить о нарушении»\n\
         2. Отправьте голосовое или текстовое описание нарушения\n\
         3. Получите анализ с корректировкой формулировки и ссылками на нормативные документы\n\n\
         ❗ <b>Поддерживаемые форматы:</b>\n\
         • Голосовые сообщения (до {} секунд)\n\
         • Текстовые сообщения\n\n\
         Нажмите кнопку ниже, чтобы начать:",
        max_voice_secs
    );
    OutboundMessage::html(text).with_button(new_violation_button())
}

pub fn help(max_voice_secs: u64) -> OutboundMessage {
    let text = format!(
        "📋 <b>Справка по использованию бота</b>\n\n\
         <b>Основные команды:</b>\n\
         /start - Запуск бота\n\
         /help - Показать эту справку\n\n\
         <b>Процесс работы:</b>\n\
         1. <b>Отправка нарушения</b> - нажмите «Сообщить о нарушении» и опишите нарушение\n\
         2. <b>Обработка</b> - бот преобразует речь в текст и проанализирует нарушение\n\
         3. <b>Результат</b> - вы получите:\n\
         \u{2003}• скорректированное описание нарушения\n\
         \u{2003}• классификацию и оценку серьёзности\n\
         \u{2003}• ссылки на нормативные документы\n\
         \u{2003}• предложения по устранению\n\n\
         <b>Требования к голосовым сообщениям:</b>\n\
         • Длительность: до {} секунд\n\
         • Язык: русский\n\
         • Качество: чёткая речь\n\n\
         <b>Примеры нарушений:</b>\n\
         • «Трещина в несущей стене, дом 12»\n\
         • «Отсутствуют перильные ограждения на лестнице»\n\
         • «Неисправная электропроводка на этаже»\n\n\
         Если возникли проблемы, попробуйте отправить сообщение заново.",
        max_voice_secs
    );
    OutboundMessage::html(text).with_button(new_violation_button())
}

pub fn recording_instructions(max_voice_secs: u64) -> OutboundMessage {
    let text = format!(
        "🎤 <b>Отправьте голосовое сообщение</b>\n\n\
         Опишите нарушение голосом или текстом.\n\n\
         ❗ <b>Рекомендации:</b>\n\
         • Говорите чётко и понятно\n\
         • Опишите конкретное нарушение\n\
         • Укажите место и обстоятельства\n\n\
         <b>Примеры:</b>\n\
         • «На захватке 3 не установлены защитные ограждения»\n\
         • «Трещина в несущей стене, дом 12»\n\n\
         ⏱️ <b>Максимальная длительность:</b> {} секунд",
        max_voice_secs
    );
    OutboundMessage::html(text)
}

/// Successful analysis
pub fn analysis_reply(original_text: &str, analysis: &AnalysisResult) -> OutboundMessage {
    let mut text = String::from("✅ <b>Анализ нарушения завершен</b>\n\n");

    text.push_str(&format!(
        "📝 <b>Исходный текст:</b>\n<i>{}</i>\n\n",
        escape_html(&truncate_chars(original_text, MAX_ORIGINAL_CHARS))
    ));

    if let Some(corrected) = &analysis.corrected_description {
        text.push_str(&format!(
            "✍️ <b>Скорректированное описание:</b>\n{}\n\n",
            escape_html(&truncate_chars(corrected, MAX_DESCRIPTION_CHARS))
        ));
    }

    text.push_str(&format!(
        "🏷 <b>Классификация:</b> {}\n{} <b>Серьёзность:</b> {} ({})\n\n",
        escape_html(&truncate_chars(&analysis.classification, MAX_CITATION_CHARS)),
        analysis.severity.emoji(),
        analysis.severity.label_ru(),
        analysis.severity
    ));

    text.push_str("📖 <b>Нормативные документы:</b>\n");
    if analysis.cited_references.is_empty() {
        text.push_str("<i>подходящие документы не найдены</i>\n");
    } else {
        for reference in analysis.cited_references.iter().take(MAX_CITATIONS) {
            text.push_str(&format!(
                "• {}\n",
                escape_html(&truncate_chars(&reference.to_string(), MAX_CITATION_CHARS))
            ));
        }
    }

    text.push_str(&format!(
        "\n❗ <b>Предлагаемые меры по устранению:</b>\n{}\n\n",
        escape_html(&truncate_chars(
            &analysis.recommendation_text,
            MAX_RECOMMENDATION_CHARS
        ))
    ));
    text.push_str("Нажмите кнопку ниже для нового нарушения:");

    fit(OutboundMessage::html(text).with_button(new_violation_button()))
}

/// Keep a message under the transport limit. An oversized HTML message is
/// sent as plain text so a cut never lands inside a tag.
fn fit(message: OutboundMessage) -> OutboundMessage {
    if message.text.chars().count() <= MAX_MESSAGE_CHARS {
        return message;
    }
    let plain = if message.html {
        strip_tags(&message.text)
    } else {
        message.text.clone()
    };
    OutboundMessage {
        text: truncate_chars(&plain, MAX_MESSAGE_CHARS - 3),
        html: false,
        ..message
    }
}

fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {},
        }
    }
    out.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}

fn validation_text(error: &ValidationError) -> String {
    match error {
        ValidationError::EmptyInput => "Текст не может быть пустым".to_string(),
        ValidationError::TooShort { min, .. } => {
            format!("Текст слишком короткий. Минимальная длина: {} символов", min)
        },
        ValidationError::TooLong { max, .. } => {
            format!("Текст слишком длинный. Максимальная длина: {} символов", max)
        },
        ValidationError::UnsupportedFormat(format) => {
            format!("Формат аудио не поддерживается: {}", format)
        },
        ValidationError::DurationExceeded { max, .. } => format!(
            "Голосовое сообщение слишком длинное. Максимальная длительность: {} секунд",
            max.as_secs()
        ),
        ValidationError::DurationTooShort { .. } => {
            "Голосовое сообщение слишком короткое".to_string()
        },
        ValidationError::FileTooLarge { max, .. } => format!(
            "Аудиофайл слишком большой. Максимальный размер: {} МБ",
            max / (1024 * 1024)
        ),
    }
}

/// Reply for a failed run. Internal error details stay in the logs.
pub fn error_reply(error: &Error) -> OutboundMessage {
    let text = match error {
        Error::Validation(e) => format!(
            "❌ {}\n\nПопробуйте отправить сообщение заново.",
            validation_text(e)
        ),
        Error::Transcription(TranscriptionError::Unintelligible { .. }) => {
            "❌ Не удалось разобрать речь.\n\nГоворите чётче или отправьте текстовое описание нарушения."
                .to_string()
        },
        Error::Transcription(_) => {
            "❌ Ошибка распознавания речи.\n\nПопробуйте отправить сообщение заново или используйте текстовый ввод."
                .to_string()
        },
        Error::Retrieval(_) => {
            "❌ База нормативных документов временно недоступна.\n\nПопробуйте позже.".to_string()
        },
        Error::Analysis(AnalysisError::MalformedResponse(_)) => {
            "❌ Не удалось получить корректный анализ нарушения.\n\nПопробуйте отправить более подробное описание нарушения."
                .to_string()
        },
        Error::Analysis(_) => {
            "❌ Сервис анализа временно недоступен.\n\nПопробуйте позже.".to_string()
        },
        Error::Log(_) | Error::Delivery(_) => {
            "❌ Произошла ошибка при обработке.\n\nПопробуйте позже.".to_string()
        },
    };
    with_keyboard(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use site_inspector_core::{Severity, SourceReference};
    use std::time::Duration;

    fn analysis() -> AnalysisResult {
        AnalysisResult {
            classification: "structural defect".into(),
            severity: Severity::High,
            cited_references: vec![SourceReference::new(
                "Несущие и ограждающие конструкции",
                "СП 70.13330.2012",
                "9.18.3",
            )],
            recommendation_text: "Приостановить работы <срочно> & обследовать".into(),
            corrected_description: Some("Трещина в несущей стене жилого дома №12".into()),
        }
    }

    #[test]
    fn test_analysis_reply_contents() {
        let reply = analysis_reply("трещина в несущей стене, дом 12", &analysis());
        assert!(reply.html);
        assert!(reply.text.contains("structural defect"));
        assert!(reply.text.contains("высокая (high)"));
        assert!(reply.text.contains("СП 70.13330.2012 «Несущие и ограждающие конструкции», п. 9.18.3"));
        assert!(reply.text.contains("&lt;срочно&gt; &amp; обследовать"));
        assert_eq!(reply.buttons[0].callback_data, "new_violation");
    }

    #[test]
    fn test_user_text_is_escaped() {
        let reply = analysis_reply("<b>dom</b>", &analysis());
        assert!(reply.text.contains("&lt;b&gt;dom&lt;/b&gt;"));
    }

    #[test]
    fn test_reply_fits_limit() {
        let mut long = analysis();
        long.recommendation_text = "&".repeat(1500);
        long.corrected_description = Some("<".repeat(800));
        long.classification = "x".repeat(5000);
        let reply = analysis_reply(&"д".repeat(3000), &long);
        assert!(reply.text.chars().count() <= MAX_MESSAGE_CHARS);
    }

    #[test]
    fn test_oversized_html_falls_back_to_plain() {
        let message = fit(OutboundMessage::html(format!("<b>{}</b>", "я".repeat(5000))));
        assert!(!message.html);
        assert!(!message.text.contains("<b>"));
        assert!(message.text.chars().count() <= MAX_MESSAGE_CHARS);
    }

    #[test]
    fn test_error_replies_hide_details() {
        let reply = error_reply(&AnalysisError::MalformedResponse("missing field".into()).into());
        assert!(!reply.text.contains("missing field"));
        assert!(!reply.html);

        let reply = error_reply(
            &ValidationError::DurationExceeded {
                actual: Duration::from_secs(75),
                max: Duration::from_secs(60),
            }
            .into(),
        );
        assert!(reply.text.contains("60 секунд"));
    }

    #[test]
    fn test_welcome_mentions_limit() {
        assert!(welcome(60).text.contains("до 60 секунд"));
        assert_eq!(help(60).buttons.len(), 1);
    }
}
