//! Input guardrail: vetoes a user turn before it reaches the model.
//!
//! Policy: lowercase the input, split it on runs of non-word characters
//! (`\W+`, ASCII word characters), and fail if any token equals a denylisted
//! word. Matching is case-insensitive and whole-token only, so "skill" does
//! not trip "kill".

use codehelper_config::GuardrailConfig;
use regex_lite::Regex;
use std::collections::HashSet;

/// Outcome of validating a user turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardrailVerdict {
    Pass,
    Fail { reason: String },
}

impl GuardrailVerdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

/// A synchronous pre-model check on user input.
pub trait InputGuardrail: Send + Sync {
    fn validate(&self, user_text: &str) -> GuardrailVerdict;
}

#[derive(Debug, thiserror::Error)]
pub enum GuardrailError {
    #[error("Invalid token pattern: {0}")]
    InvalidPattern(String),
}

/// Denylist of whole words.
#[derive(Debug, Clone)]
pub struct DenylistGuardrail {
    denylist: HashSet<String>,
    separator: Regex,
}

impl DenylistGuardrail {
    pub fn new<I, S>(words: I) -> Result<Self, GuardrailError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let separator = Regex::new(r"\W+").map_err(|e| GuardrailError::InvalidPattern(e.to_string()))?;
        let denylist = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        Ok(Self { denylist, separator })
    }

    pub fn from_config(config: &GuardrailConfig) -> Result<Self, GuardrailError> {
        Self::new(&config.denylist)
    }

    pub fn is_empty(&self) -> bool {
        self.denylist.is_empty()
    }
}

impl InputGuardrail for DenylistGuardrail {
    fn validate(&self, user_text: &str) -> GuardrailVerdict {
        let lowered = user_text.to_lowercase();
        for token in self.separator.split(&lowered) {
            if self.denylist.contains(token) {
                tracing::info!(word = %token, "Guardrail rejected input");
                return GuardrailVerdict::Fail {
                    reason: format!("Sensitive word detected: {token}"),
                };
            }
        }
        GuardrailVerdict::Pass
    }
}
