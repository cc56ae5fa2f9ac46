use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use renoquote_core::domain::request::{RequestItem, DEFAULT_LOCATION, DEFAULT_UNIT};
use renoquote_core::extraction::{ExtractionError, Extractor};

use crate::llm::{LlmClient, LlmPrompt};

pub const EXTRACTION_PROMPT: &str = "You are an expert renovation quantity surveyor. \
Read the client's transcript and extract every distinct renovation work item. \
The client may use colloquial shorthand or local slang; normalise each item into standard \
renovation terminology. \
Respond with a JSON array only, no prose. Each element is an object with the keys \
\"description\", \"quantity\", \"unit\" and \"location\". Omit a key when the transcript \
does not say it.";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExtractedEntry {
    Text(String),
    Item(ExtractedItem),
}

#[derive(Debug, Deserialize)]
struct ExtractedItem {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    quantity: Option<Value>,
    #[serde(default)]
    unit: Option<String>,
    #[serde(default)]
    location: Option<String>,
}

pub struct LlmExtractor<C> {
    client: C,
}

impl<C> LlmExtractor<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<C> Extractor for LlmExtractor<C>
where
    C: LlmClient,
{
    async fn extract(&self, transcript: &str) -> Result<Vec<RequestItem>, ExtractionError> {
        let prompt = LlmPrompt::new(EXTRACTION_PROMPT, transcript);
        let raw = self
            .client
            .complete(&prompt)
            .await
            .map_err(|error| ExtractionError::Provider(format!("{error:#}")))?;

        let items = parse_extraction_response(&raw)?;
        tracing::debug!(event_name = "llm.extraction.parsed", items = items.len(), "parsed items");
        Ok(items)
    }
}

/// Parses the model's reply into request items. The reply may wrap the array
/// in a code fence or prose; only the outermost `[...]` is read.
pub fn parse_extraction_response(raw: &str) -> Result<Vec<RequestItem>, ExtractionError> {
    let (Some(start), Some(end)) = (raw.find('['), raw.rfind(']')) else {
        return Err(ExtractionError::MalformedResponse("no JSON array in response".to_string()));
    };
    if end < start {
        return Err(ExtractionError::MalformedResponse("no JSON array in response".to_string()));
    }

    let entries: Vec<ExtractedEntry> = serde_json::from_str(&raw[start..=end])
        .map_err(|error| ExtractionError::MalformedResponse(error.to_string()))?;

    Ok(entries.into_iter().filter_map(into_request_item).collect())
}

fn into_request_item(entry: ExtractedEntry) -> Option<RequestItem> {
    match entry {
        ExtractedEntry::Text(text) => {
            let text = text.trim();
            (!text.is_empty()).then(|| RequestItem::lot(text))
        }
        ExtractedEntry::Item(item) => {
            let description = non_blank(item.description)?;
            Some(RequestItem::new(
                description,
                item.quantity.as_ref().and_then(parse_quantity).unwrap_or(Decimal::ONE),
                non_blank(item.unit).unwrap_or_else(|| DEFAULT_UNIT.to_string()),
                non_blank(item.location).unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
            ))
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn parse_quantity(value: &Value) -> Option<Decimal> {
    let parsed = match value {
        Value::Number(number) => Decimal::from_str(&number.to_string()).ok()?,
        Value::String(text) => Decimal::from_str(text.trim()).ok()?,
        _ => return None,
    };
    (parsed > Decimal::ZERO).then_some(parsed)
}
