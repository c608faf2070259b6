//! Input sanitization and output redaction.
//!
//! Inputs lose script blocks and inline handlers before they are embedded or
//! stored. Outputs have recognizable personal data swapped for placeholder
//! tokens before they leave the store.

use regex_lite::Regex;

use crate::error::{Result, StoreError};

/// Placeholder for redacted email addresses.
pub const EMAIL_TOKEN: &str = "[EMAIL]";
/// Placeholder for redacted phone numbers.
pub const PHONE_TOKEN: &str = "[PHONE]";
/// Placeholder for redacted card numbers.
pub const CARD_TOKEN: &str = "[CARD]";
/// Placeholder for redacted social security numbers.
pub const SSN_TOKEN: &str = "[SSN]";

const SCRIPT_BLOCK: &str = r"(?is)<script\b[^>]*>.*?</script\s*>";
const SCRIPT_TAG: &str = r"(?i)</?script\b[^>]*>";
const JAVASCRIPT_SCHEME: &str = r"(?i)javascript\s*:";
const EVENT_HANDLER: &str = r"(?i)\bon\w+\s*=";

const CARD: &str = r"\b(?:\d{4}[ -]?){3}\d{4}\b";
const SSN: &str = r"\b\d{3}-\d{2}-\d{4}\b";
const PHONE: &str = r"(?:\+\d{1,3}[ .-]?)?(?:\(\d{3}\)|\b\d{3})[ .-]?\d{3}[ .-]?\d{4}\b";
const EMAIL: &str = r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}";

/// Text limits enforced by [`Sanitizer::sanitize_input`] and
/// [`Sanitizer::sanitize_query`], counted in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SanitizerLimits {
    /// Maximum stored content length.
    pub max_content_chars: usize,
    /// Maximum search query length.
    pub max_query_chars: usize,
}

impl Default for SanitizerLimits {
    fn default() -> Self {
        Self {
            max_content_chars: 10_000,
            max_query_chars: 1_000,
        }
    }
}

/// Compiled sanitization and redaction rules.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    limits: SanitizerLimits,
    strip: Vec<Regex>,
    redact: Vec<(Regex, &'static str)>,
}

impl Sanitizer {
    /// Compile the rule set.
    pub fn new(limits: SanitizerLimits) -> Result<Self> {
        let compile =
            |pattern: &str| Regex::new(pattern).map_err(|e| StoreError::Config(e.to_string()));

        Ok(Self {
            limits,
            strip: vec![
                compile(SCRIPT_BLOCK)?,
                compile(SCRIPT_TAG)?,
                compile(JAVASCRIPT_SCHEME)?,
                compile(EVENT_HANDLER)?,
            ],
            // Card and SSN run before phone so their digits are not
            // half-consumed as phone numbers.
            redact: vec![
                (compile(CARD)?, CARD_TOKEN),
                (compile(SSN)?, SSN_TOKEN),
                (compile(PHONE)?, PHONE_TOKEN),
                (compile(EMAIL)?, EMAIL_TOKEN),
            ],
        })
    }

    /// Active limits.
    pub fn limits(&self) -> SanitizerLimits {
        self.limits
    }

    /// Clean document content for storage.
    pub fn sanitize_input(&self, text: &str) -> Result<String> {
        self.sanitize_with_limit(text, self.limits.max_content_chars, "content")
    }

    /// Clean a search query.
    pub fn sanitize_query(&self, text: &str) -> Result<String> {
        self.sanitize_with_limit(text, self.limits.max_query_chars, "query")
    }

    fn sanitize_with_limit(&self, text: &str, max_chars: usize, what: &str) -> Result<String> {
        let mut current = text.to_string();

        // Removing one match can splice a new one together, so run to a
        // fixpoint. Every pass that changes anything shortens the text.
        loop {
            let mut next = current.clone();
            for pattern in &self.strip {
                next = pattern.replace_all(&next, "").into_owned();
            }
            if next == current {
                break;
            }
            current = next;
        }

        let cleaned = current.trim();
        if cleaned.is_empty() {
            return Err(StoreError::Validation(format!("{what} must not be empty")));
        }

        let length = cleaned.chars().count();
        if length > max_chars {
            return Err(StoreError::Validation(format!(
                "{what} too long: {length} characters, max {max_chars}"
            )));
        }

        Ok(cleaned.to_string())
    }

    /// Replace personal data with placeholder tokens. Best effort.
    pub fn redact_output(&self, text: &str) -> String {
        let mut redacted = text.to_string();
        for (pattern, token) in &self.redact {
            redacted = pattern.replace_all(&redacted, *token).into_owned();
        }
        redacted
    }

    /// Apply [`Sanitizer::redact_output`] to every string inside a JSON value.
    pub fn redact_value(&self, value: serde_json::Value) -> serde_json::Value {
        match value {
            serde_json::Value::String(text) => serde_json::Value::String(self.redact_output(&text)),
            serde_json::Value::Array(items) => {
                serde_json::Value::Array(items.into_iter().map(|v| self.redact_value(v)).collect())
            }
            serde_json::Value::Object(map) => serde_json::Value::Object(
                map.into_iter()
                    .map(|(key, v)| (key, self.redact_value(v)))
                    .collect(),
            ),
            other => other,
        }
    }

    /// Redact, then cut to `max_chars` characters with a trailing `...`.
    pub fn preview(&self, text: &str, max_chars: usize) -> String {
        let redacted = self.redact_output(text);
        if redacted.chars().count() <= max_chars {
            return redacted;
        }

        let mut preview: String = redacted.chars().take(max_chars).collect();
        preview.push_str("...");
        preview
    }
}
