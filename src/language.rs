use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::NeuralError;

/// Concrete language tag understood by both engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Language {
    English,
    Japanese,
    Chinese,
    Korean,
    Spanish,
    French,
    German,
    Italian,
    Portuguese,
    Russian,
    Arabic,
    Hindi,
    Dutch,
    Polish,
    Turkish,
    Vietnamese,
    Thai,
    Indonesian,
    Swedish,
    Ukrainian,
}

impl Language {
    /// Every supported language, English first
    pub const ALL: [Language; 20] = [
        Language::English,
        Language::Japanese,
        Language::Chinese,
        Language::Korean,
        Language::Spanish,
        Language::French,
        Language::German,
        Language::Italian,
        Language::Portuguese,
        Language::Russian,
        Language::Arabic,
        Language::Hindi,
        Language::Dutch,
        Language::Polish,
        Language::Turkish,
        Language::Vietnamese,
        Language::Thai,
        Language::Indonesian,
        Language::Swedish,
        Language::Ukrainian,
    ];

    /// ISO 639-1 code
    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Japanese => "ja",
            Language::Chinese => "zh",
            Language::Korean => "ko",
            Language::Spanish => "es",
            Language::French => "fr",
            Language::German => "de",
            Language::Italian => "it",
            Language::Portuguese => "pt",
            Language::Russian => "ru",
            Language::Arabic => "ar",
            Language::Hindi => "hi",
            Language::Dutch => "nl",
            Language::Polish => "pl",
            Language::Turkish => "tr",
            Language::Vietnamese => "vi",
            Language::Thai => "th",
            Language::Indonesian => "id",
            Language::Swedish => "sv",
            Language::Ukrainian => "uk",
        }
    }

    /// English display name, also used in prompts and cache fingerprints
    pub fn name(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Japanese => "Japanese",
            Language::Chinese => "Chinese",
            Language::Korean => "Korean",
            Language::Spanish => "Spanish",
            Language::French => "French",
            Language::German => "German",
            Language::Italian => "Italian",
            Language::Portuguese => "Portuguese",
            Language::Russian => "Russian",
            Language::Arabic => "Arabic",
            Language::Hindi => "Hindi",
            Language::Dutch => "Dutch",
            Language::Polish => "Polish",
            Language::Turkish => "Turkish",
            Language::Vietnamese => "Vietnamese",
            Language::Thai => "Thai",
            Language::Indonesian => "Indonesian",
            Language::Swedish => "Swedish",
            Language::Ukrainian => "Ukrainian",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Language {
    type Err = NeuralError;

    /// Accepts either the ISO code or the English name, case-insensitive
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Language::ALL
            .iter()
            .copied()
            .find(|lang| {
                lang.code().eq_ignore_ascii_case(needle) || lang.name().eq_ignore_ascii_case(needle)
            })
            .ok_or_else(|| NeuralError::UnknownLanguage(s.to_string()))
    }
}

impl TryFrom<String> for Language {
    type Error = NeuralError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Language> for String {
    fn from(lang: Language) -> Self {
        lang.code().to_string()
    }
}

/// Source-language selection: detect per request, or a fixed language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SourceSelection {
    Auto,
    Manual(Language),
}

impl SourceSelection {
    pub fn is_auto(&self) -> bool {
        matches!(self, SourceSelection::Auto)
    }
}

impl fmt::Display for SourceSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceSelection::Auto => f.write_str("Auto"),
            SourceSelection::Manual(lang) => write!(f, "{}", lang),
        }
    }
}

impl FromStr for SourceSelection {
    type Err = NeuralError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("auto") {
            Ok(SourceSelection::Auto)
        } else {
            s.parse().map(SourceSelection::Manual)
        }
    }
}

impl TryFrom<String> for SourceSelection {
    type Error = NeuralError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SourceSelection> for String {
    fn from(selection: SourceSelection) -> Self {
        match selection {
            SourceSelection::Auto => "auto".to_string(),
            SourceSelection::Manual(lang) => lang.code().to_string(),
        }
    }
}

/// Immutable description of one translation to perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    pub text: String,
    pub from: SourceSelection,
    pub to: Language,
}

impl TranslationRequest {
    pub fn new(text: impl Into<String>, from: SourceSelection, to: Language) -> Self {
        Self {
            text: text.into(),
            from,
            to,
        }
    }
}

const CHINESE_PARTICLES: [char; 6] = ['的', '是', '在', '有', '了', '和'];

fn is_kana(c: char) -> bool {
    ('\u{3040}'..='\u{30FF}').contains(&c)
}

fn is_cjk(c: char) -> bool {
    ('\u{4E00}'..='\u{9FAF}').contains(&c)
}

fn is_hangul(c: char) -> bool {
    ('\u{AC00}'..='\u{D7AF}').contains(&c)
}

/// Script-based language guess used when no model-backed detection exists.
///
/// Kana or CJK ideographs mean Japanese, unless common Chinese particles appear
/// without any kana. Hangul means Korean. Everything else is treated as English.
pub fn detect_by_script(text: &str) -> Language {
    if text.chars().any(|c| is_kana(c) || is_cjk(c)) {
        let has_kana = text.chars().any(is_kana);
        let particles = text.chars().filter(|c| CHINESE_PARTICLES.contains(c)).count();
        if particles > 0 && !has_kana {
            return Language::Chinese;
        }
        return Language::Japanese;
    }

    if text.chars().any(is_hangul) {
        return Language::Korean;
    }

    Language::English
}
