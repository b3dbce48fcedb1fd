//! Request and result types exchanged with the generative model.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::security::SanitizedInput;

/// Recap writing style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    Concise,
    Detailed,
    Bullet,
    Casual,
    Formal,
}

impl Style {
    pub const ALL: [Style; 5] = [
        Style::Concise,
        Style::Detailed,
        Style::Bullet,
        Style::Casual,
        Style::Formal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Concise => "concise",
            Self::Detailed => "detailed",
            Self::Bullet => "bullet",
            Self::Casual => "casual",
            Self::Formal => "formal",
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a style name is not one of the supported styles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStyle;

impl FromStr for Style {
    type Err = UnknownStyle;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|style| style.as_str().eq_ignore_ascii_case(s))
            .ok_or(UnknownStyle)
    }
}

/// A validated recap request, ready for the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub text: String,
    pub days: Option<u32>,
    pub style: Style,
}

impl GenerationRequest {
    pub fn new(input: SanitizedInput, days: Option<u32>, style: Style) -> Self {
        Self {
            text: input.into_inner(),
            days,
            style,
        }
    }
}

/// Structured recap produced by the model or by the fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub title: String,
    pub participants: Vec<String>,
    pub recap: String,
}

impl GenerationResult {
    pub const FALLBACK_TITLE: &'static str = "Service Temporarily Unavailable";

    /// Labeled placeholder returned when the model cannot be reached.
    pub fn fallback() -> Self {
        Self {
            title: Self::FALLBACK_TITLE.to_string(),
            participants: vec!["System".to_string()],
            recap: "We're sorry, the recap service is temporarily unavailable. \
                    This is usually caused by high demand or maintenance. \
                    Please try again in a few minutes."
                .to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_parsing() {
        assert_eq!("CONCISE".parse(), Ok(Style::Concise));
        assert_eq!(" formal ".parse(), Ok(Style::Formal));
        assert_eq!("sarcastic".parse::<Style>(), Err(UnknownStyle));
        assert_eq!("".parse::<Style>(), Err(UnknownStyle));
    }

    #[test]
    fn test_result_parses_model_json() {
        let result: GenerationResult = serde_json::from_str(
            r#"{"title":"Trip","participants":["Ana","Bo"],"recap":"Planned the trip."}"#,
        )
        .unwrap();
        assert_eq!(result.participants, vec!["Ana", "Bo"]);
        assert!(serde_json::from_str::<GenerationResult>(r#"{"title":"x"}"#).is_err());
    }

    #[test]
    fn test_fallback_is_labeled() {
        let fallback = GenerationResult::fallback();
        assert_eq!(fallback.title, GenerationResult::FALLBACK_TITLE);
        assert_eq!(fallback.participants, vec!["System"]);
        assert!(!fallback.recap.is_empty());
    }
}
