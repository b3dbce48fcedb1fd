//! Untrusted conversation text screening.
//!
//! # Checks (in order, first failure wins)
//! 1. Length ceiling (characters)
//! 2. Line ceiling
//! 3. Prompt-injection denylist
//! 4. Runs of consecutive symbol characters
//! 5. Count of long base64-alphabet runs
//!
//! Accepted text is normalized: ASCII control characters (line breaks and
//! tabs included) are removed, then whitespace runs collapse to one space,
//! and the ends are trimmed.
//!
//! # Design Decisions
//! - Denylist only, no model in the loop. Obfuscated injections get through
//!   and some benign phrasing is rejected.
//! - Rejection reasons are logged but never returned to the caller

use lazy_static::lazy_static;
use regex::{Regex, RegexSet};

use crate::config::SanitizerConfig;
use crate::error::SanitizeError;
use crate::observability::metrics;
use crate::upstream::Style;

lazy_static! {
    static ref INJECTION_PATTERNS: RegexSet = RegexSet::new([
        // instruction overrides
        r"(?i)ignore\s+(previous|all)\s+(instructions?|prompts?|commands?)",
        r"(?i)forget\s+(everything|all|previous)",
        r"(?i)new\s+(instructions?|prompts?|commands?)",
        r"(?i)system\s*:?\s*(override|reset|clear)",
        // role assumption
        r"(?i)(pretend|act\s+as|you\s+are\s+now)\s+(a|an|the)\s+",
        r"(?i)role\s*:?\s*(admin|root|system|developer)",
        // output hijacking
        r#"(?i)(print|output|return|respond\s+with)\s+""#,
        r"(?i)format\s+(your\s+)?response\s+(as|in)",
        // literal escape tokens
        r"\\[nrNR]|\\[xX][0-9a-fA-F]{2}|\\[uU][0-9a-fA-F]{4}",
        // separator runs
        r"={3,}|#{3,}|-{3,}|\*{3,}",
    ])
    .unwrap();
}

const SPECIAL_CHARACTER_CLASS: &str = r##"[!@#$%^\&*(){}\[\]|\\:;"'<>,.?/\~`+=_\-]"##;
const BASE64_CLASS: &str = r"[A-Za-z0-9+/]";

/// Conversation text that passed every check and has been normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedInput(String);

impl SanitizedInput {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Screens untrusted text before it reaches the model.
#[derive(Debug, Clone)]
pub struct InputSanitizer {
    max_chars: usize,
    max_lines: usize,
    max_encoded_runs: usize,
    special_run: Regex,
    encoded_run: Regex,
}

impl InputSanitizer {
    pub fn new(config: &SanitizerConfig) -> Result<Self, regex::Error> {
        let special_run = Regex::new(&format!(
            "{}{{{},}}",
            SPECIAL_CHARACTER_CLASS, config.max_special_run
        ))?;
        let encoded_run = Regex::new(&format!(
            "{}{{{},}}={{0,2}}",
            BASE64_CLASS, config.min_encoded_run
        ))?;

        Ok(Self {
            max_chars: config.max_chars,
            max_lines: config.max_lines,
            max_encoded_runs: config.max_encoded_runs,
            special_run,
            encoded_run,
        })
    }

    /// Run every check and return the normalized text.
    pub fn sanitize(&self, raw: &str) -> Result<SanitizedInput, SanitizeError> {
        self.check(raw).map_err(|e| {
            tracing::warn!(check = e.check(), bytes = raw.len(), reason = %e, "Input rejected");
            metrics::record_input_rejected(e.check());
            e
        })?;
        Ok(SanitizedInput(normalize(raw)))
    }

    fn check(&self, raw: &str) -> Result<(), SanitizeError> {
        // byte length bounds char count from above
        if raw.len() > self.max_chars && raw.chars().count() > self.max_chars {
            return Err(SanitizeError::TooLong {
                max: self.max_chars,
            });
        }

        if line_count(raw) > self.max_lines {
            return Err(SanitizeError::TooManyLines {
                max: self.max_lines,
            });
        }

        if INJECTION_PATTERNS.is_match(raw) {
            return Err(SanitizeError::InjectionPattern);
        }

        if self.special_run.is_match(raw) {
            return Err(SanitizeError::ExcessiveSpecialCharacters);
        }

        let runs = self.encoded_run.find_iter(raw).count();
        if runs > self.max_encoded_runs {
            return Err(SanitizeError::EncodedPayload { runs });
        }

        Ok(())
    }

    /// Validate a style selector against the supported set.
    pub fn validate_style(&self, raw: &str) -> Result<Style, SanitizeError> {
        raw.trim().parse::<Style>().map_err(|_| {
            metrics::record_input_rejected(SanitizeError::InvalidStyle.check());
            SanitizeError::InvalidStyle
        })
    }

    /// Validate the optional look-back period in days.
    pub fn validate_days(&self, days: Option<i64>) -> Result<Option<u32>, SanitizeError> {
        match days {
            None => Ok(None),
            Some(d) if d >= 1 => u32::try_from(d)
                .map(Some)
                .map_err(|_| SanitizeError::InvalidDays),
            Some(_) => {
                metrics::record_input_rejected(SanitizeError::InvalidDays.check());
                Err(SanitizeError::InvalidDays)
            }
        }
    }
}

/// Number of lines, splitting on `\r\n`, `\n` and a lone `\r`.
///
/// A trailing separator starts one more (empty) line, so `"a\n"` has two.
pub fn line_count(raw: &str) -> usize {
    let bytes = raw.as_bytes();
    let mut lines = 1;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\r' => {
                lines += 1;
                if bytes.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
            }
            b'\n' => lines += 1,
            _ => {}
        }
        i += 1;
    }
    lines
}

/// Drop ASCII control characters, then collapse whitespace runs and trim.
pub fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;

    for c in raw.chars().filter(|c| !c.is_ascii_control()) {
        if c.is_whitespace() {
            pending_space = true;
        } else {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        }
    }

    out
}
