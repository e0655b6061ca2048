//! Stop-word language guess for recipe text.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Spanish,
    English,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spanish => "es",
            Self::English => "en",
        }
    }

    pub fn from_str(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "es" | "spa" | "spanish" | "español" => Some(Self::Spanish),
            "en" | "eng" | "english" => Some(Self::English),
            _ => None,
        }
    }
}

const SPANISH: &[&str] = &[
    "de", "la", "el", "y", "en", "los", "las", "con", "del", "para", "una", "un", "al", "por",
    "taza", "cucharada", "cucharadita", "sal", "pimienta", "agregar", "cocinar", "hasta",
    "minutos", "horno", "aceite", "huevos", "harina", "azúcar", "cebolla", "ajo",
];

const ENGLISH: &[&str] = &[
    "the", "and", "of", "with", "to", "in", "for", "an", "until", "cup", "cups",
    "tablespoon", "teaspoon", "salt", "pepper", "add", "cook", "minutes", "oven", "oil",
    "eggs", "flour", "sugar", "onion", "garlic", "into", "from",
];

/// Fewer hits than this in both lists means the text is too short to judge.
const MIN_HITS: usize = 3;

/// Guess the language of `text`, or `None` when there is not enough signal.
pub fn detect(text: &str) -> Option<Language> {
    let mut spanish = 0usize;
    let mut english = 0usize;
    for word in text
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| !w.is_empty())
    {
        let word = word.to_lowercase();
        if SPANISH.contains(&word.as_str()) {
            spanish += 1;
        }
        if ENGLISH.contains(&word.as_str()) {
            english += 1;
        }
    }

    if spanish.max(english) < MIN_HITS || spanish == english {
        return None;
    }
    Some(if spanish > english {
        Language::Spanish
    } else {
        Language::English
    })
}

/// True when `text` is confidently detected as something other than `expected`.
pub fn is_mismatch(text: &str, expected: Language) -> bool {
    detect(text).is_some_and(|found| found != expected)
}
