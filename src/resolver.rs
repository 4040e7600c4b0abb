//! Language pair resolution
//!
//! Turns the declared source, the selected target and the user's native
//! language into a concrete pair whose two sides always differ.

use crate::language::Language;

/// Fixed target used when the source already is the native language
pub const FALLBACK_TARGET: Language = Language::English;

/// Where the source language of a request came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceHint {
    /// Chosen by the user, or the last known language after a failed detection
    Manual(Language),
    /// Produced by a fresh detection in Auto mode
    Detected(Language),
}

impl SourceHint {
    pub fn language(&self) -> Language {
        match self {
            SourceHint::Manual(lang) | SourceHint::Detected(lang) => *lang,
        }
    }
}

/// Concrete (from, to) pair used for both the engine call and the cache key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolvedPair {
    pub from: Language,
    pub to: Language,
}

pub fn resolve(hint: SourceHint, current_to: Language, native: Language) -> ResolvedPair {
    let from = hint.language();

    if let SourceHint::Manual(lang) = hint {
        if lang != current_to {
            return ResolvedPair { from, to: current_to };
        }
    }

    let mut to = if from == native {
        FALLBACK_TARGET
    } else {
        // English and any third language both go to the native language
        native
    };

    if to == from {
        to = if current_to != from {
            current_to
        } else {
            Language::ALL
                .iter()
                .copied()
                .find(|lang| *lang != from)
                .unwrap_or(FALLBACK_TARGET)
        };
    }

    ResolvedPair { from, to }
}
