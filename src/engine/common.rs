use std::time::Duration;
use reqwest::Client;
use tracing::debug;

use crate::config::EnginesConfig;
use crate::error::{Result, NeuralError};
use crate::language::Language;
use super::EngineKind;

/// Build the HTTP client shared by both backends
pub fn create_http_client(config: &EnginesConfig) -> Result<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .pool_max_idle_per_host(4)
        .user_agent(concat!("neural/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Map a transport-level reqwest failure to the gateway's taxonomy
pub fn classify_request_error(engine: EngineKind, endpoint: &str, error: reqwest::Error) -> NeuralError {
    if error.is_connect() {
        NeuralError::ConnectionRefused {
            engine,
            endpoint: endpoint.to_string(),
        }
    } else if error.is_timeout() {
        NeuralError::Transport {
            engine,
            message: format!("request to {} timed out", endpoint),
        }
    } else {
        NeuralError::Transport {
            engine,
            message: format!("HTTP request failed: {}", error),
        }
    }
}

/// Instructions for a professional-quality translation
pub fn translation_instructions(from: Language, to: Language) -> String {
    format!(
        "You are an expert professional translator specializing in {} to {} translation.\n\
         \n\
         Instructions:\n\
         - Translate accurately while preserving context, tone, and cultural nuances\n\
         - Maintain the original formatting and structure\n\
         - For technical terms, use widely accepted translations\n\
         - For proper nouns, keep them as-is unless standard translations exist\n\
         - Return ONLY the translation, no explanations or notes",
        from.name(),
        to.name()
    )
}

/// Single-prompt form used by completion-style backends
pub fn build_translation_prompt(text: &str, from: Language, to: Language) -> String {
    format!(
        "{}\n\nText to translate:\n{}",
        translation_instructions(from, to),
        text
    )
}

/// Same-language proofreading prompt, phrased for the text's language
pub fn build_improve_prompt(text: &str, language: Language) -> String {
    match language {
        Language::Japanese => format!(
            "あなたは日本語の校正・文章改善のプロフェッショナルです。以下の指示に従ってテキストを改善してください：\n\n\
             指示：\n\
             - より自然で読みやすい日本語に改善\n\
             - 文法的な誤りを修正\n\
             - 表現をより洗練させる\n\
             - 改善した文章のみを返す（説明は不要）\n\n\
             改善するテキスト：\n{}",
            text
        ),
        Language::English => format!(
            "You are a professional English editor. Improve the following text:\n\n\
             Instructions:\n\
             - Make the English more natural and fluent\n\
             - Fix any grammatical errors\n\
             - Improve word choice and style\n\
             - Return only the improved text, no explanations\n\n\
             Text to improve:\n{}",
            text
        ),
        other => format!(
            "You are a professional {} editor. Improve the following text so it reads \
             naturally and clearly, fixing any grammatical errors. Keep it in {}. \
             Return only the improved text, no explanations.\n\n\
             Text to improve:\n{}",
            other.name(),
            other.name(),
            text
        ),
    }
}

/// Prompt asking a model to name the language of a text
pub fn build_detection_prompt(text: &str) -> String {
    format!(
        "Identify the language of the following text. \
         Reply with only its two-letter ISO 639-1 code.\n\n{}",
        text
    )
}

const RESPONSE_PREFIXES: [&str; 5] = [
    "Here is the translation:",
    "Here's the translation:",
    "Translation:",
    "Translated text:",
    "Improved text:",
];

/// Strip the chatter models tend to wrap around a translation
pub fn clean_translation_response(source: &str, response: &str) -> String {
    let mut cleaned = response.trim();

    for prefix in RESPONSE_PREFIXES {
        if cleaned.len() >= prefix.len()
            && cleaned.is_char_boundary(prefix.len())
            && cleaned[..prefix.len()].eq_ignore_ascii_case(prefix)
        {
            cleaned = cleaned[prefix.len()..].trim_start();
            break;
        }
    }

    // Quotes added around the whole answer, not present in the source
    let source = source.trim();
    for (open, close) in [('"', '"'), ('“', '”'), ('「', '」')] {
        if cleaned.chars().count() >= 2
            && cleaned.starts_with(open)
            && cleaned.ends_with(close)
            && !(source.starts_with(open) && source.ends_with(close))
        {
            cleaned = cleaned[open.len_utf8()..cleaned.len() - close.len_utf8()].trim();
            break;
        }
    }

    if cleaned.len() != response.len() {
        debug!("Cleaned model response ({} -> {} bytes)", response.len(), cleaned.len());
    }

    cleaned.to_string()
}

/// Parse a detection reply such as "ja", "Japanese" or "ja." into a language
pub fn parse_detection_reply(reply: &str) -> Option<Language> {
    let token = reply
        .split(|c: char| c.is_whitespace() || c == ',' || c == '.' || c == '"' || c == '\'')
        .find(|t| !t.is_empty())?;
    token.parse().ok()
}
