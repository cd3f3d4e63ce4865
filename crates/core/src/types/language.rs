//! UI language preference.

use serde::{Deserialize, Serialize};

/// Error for unsupported language tags.
#[derive(thiserror::Error, Debug, Clone)]
#[error("unsupported language tag: {0}")]
pub struct LanguageError(pub String);

/// A supported UI language.
///
/// The set is closed; loading a persisted value outside it collapses to the
/// default (`en`) rather than failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum LanguageTag {
    /// English
    #[default]
    #[serde(rename = "en")]
    En,
    /// Filipino
    #[serde(rename = "fil")]
    Fil,
    /// Cebuano
    #[serde(rename = "ceb")]
    Ceb,
    /// Spanish
    #[serde(rename = "es")]
    Es,
    /// Simplified Chinese
    #[serde(rename = "zh-CN")]
    ZhCn,
    /// Japanese
    #[serde(rename = "ja")]
    Ja,
    /// Korean
    #[serde(rename = "ko")]
    Ko,
}

impl LanguageTag {
    /// All supported tags, in display order.
    pub const ALL: [Self; 7] = [
        Self::En,
        Self::Fil,
        Self::Ceb,
        Self::Es,
        Self::ZhCn,
        Self::Ja,
        Self::Ko,
    ];

    /// The canonical tag string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Fil => "fil",
            Self::Ceb => "ceb",
            Self::Es => "es",
            Self::ZhCn => "zh-CN",
            Self::Ja => "ja",
            Self::Ko => "ko",
        }
    }
}

impl std::fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LanguageTag {
    type Err = LanguageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| LanguageError(s.to_owned()))
    }
}
