use async_trait::async_trait;
use thiserror::Error;

use crate::domain::request::RequestItem;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("extraction provider failed: {0}")]
    Provider(String),
    #[error("extraction response was malformed: {0}")]
    MalformedResponse(String),
}

/// Turns a free-form transcript into structured request items.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, transcript: &str) -> Result<Vec<RequestItem>, ExtractionError>;
}

/// Each non-blank line becomes one lot of work.
pub fn fallback_line_items(transcript: &str) -> Vec<RequestItem> {
    transcript
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(RequestItem::lot)
        .collect()
}

/// Deterministic extractor for deployments without a language model.
#[derive(Clone, Copy, Debug, Default)]
pub struct LineSplitExtractor;

#[async_trait]
impl Extractor for LineSplitExtractor {
    async fn extract(&self, transcript: &str) -> Result<Vec<RequestItem>, ExtractionError> {
        Ok(fallback_line_items(transcript))
    }
}
