//! Content-safety screening applied before any extraction work.

use async_trait::async_trait;
use regex::{RegexSet, RegexSetBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Phrases that mark an attempt to override instructions or switch persona.
pub const JAILBREAK_PATTERNS: &[&str] = &[
    r"ignore previous instructions",
    r"system override",
    r"DAN mode",
    r"developer mode",
    r"execute command",
    r"forget your rules",
    r"ignore all guidelines",
];

pub const HEURISTIC_REASON: &str = "Potential prompt injection detected (Heuristic).";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyVerdict {
    pub safe: bool,
    pub reason: Option<String>,
}

impl SafetyVerdict {
    pub fn safe() -> Self {
        Self { safe: true, reason: None }
    }

    pub fn unsafe_because(reason: impl Into<String>) -> Self {
        Self { safe: false, reason: Some(reason.into()) }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SafetyError {
    #[error("safety classifier failed: {0}")]
    Classifier(String),
    #[error("invalid safety pattern: {0}")]
    Pattern(String),
}

#[async_trait]
pub trait ContentSafety: Send + Sync {
    async fn classify(&self, text: &str) -> Result<SafetyVerdict, SafetyError>;
}

/// Case-insensitive pattern screen. Cheap enough to run on every request.
#[derive(Clone, Debug)]
pub struct HeuristicSafetyScreen {
    patterns: RegexSet,
}

impl HeuristicSafetyScreen {
    pub fn new() -> Result<Self, SafetyError> {
        Self::with_patterns(JAILBREAK_PATTERNS)
    }

    pub fn with_patterns<I, P>(patterns: I) -> Result<Self, SafetyError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        let patterns = RegexSetBuilder::new(patterns)
            .case_insensitive(true)
            .build()
            .map_err(|error| SafetyError::Pattern(error.to_string()))?;
        Ok(Self { patterns })
    }

    pub fn screen(&self, text: &str) -> SafetyVerdict {
        if self.patterns.is_match(text) {
            SafetyVerdict::unsafe_because(HEURISTIC_REASON)
        } else {
            SafetyVerdict::safe()
        }
    }
}

#[async_trait]
impl ContentSafety for HeuristicSafetyScreen {
    async fn classify(&self, text: &str) -> Result<SafetyVerdict, SafetyError> {
        Ok(self.screen(text))
    }
}

/// Heuristics first; the optional secondary classifier only sees text the
/// heuristics let through.
pub struct LayeredSafetyScreen<S> {
    heuristics: HeuristicSafetyScreen,
    secondary: Option<S>,
}

impl<S> LayeredSafetyScreen<S> {
    pub fn new(heuristics: HeuristicSafetyScreen, secondary: Option<S>) -> Self {
        Self { heuristics, secondary }
    }

    pub fn has_secondary(&self) -> bool {
        self.secondary.is_some()
    }
}

#[async_trait]
impl<S> ContentSafety for LayeredSafetyScreen<S>
where
    S: ContentSafety,
{
    async fn classify(&self, text: &str) -> Result<SafetyVerdict, SafetyError> {
        let verdict = self.heuristics.screen(text);
        if !verdict.safe {
            return Ok(verdict);
        }

        match &self.secondary {
            Some(secondary) => secondary.classify(text).await,
            None => Ok(verdict),
        }
    }
}
