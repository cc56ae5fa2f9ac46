use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::catalog::{CatalogEntryId, TenantId};
use crate::domain::validation::ValidationMessage;
use crate::errors::DomainError;
use crate::pipeline::state::PipelineState;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuotationId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotationStatus {
    Processing,
    Completed,
    Blocked,
    Failed,
}

impl QuotationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Blocked => "blocked",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "blocked" => Some(Self::Blocked),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: &QuotationStatus) -> bool {
        matches!(
            (self, next),
            (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Blocked)
                | (Self::Processing, Self::Failed)
        )
    }

    pub fn transition_to(&mut self, next: QuotationStatus) -> Result<(), DomainError> {
        if self.can_transition_to(&next) {
            *self = next;
            return Ok(());
        }

        Err(DomainError::InvalidQuotationTransition { from: self.clone(), to: next })
    }
}

/// A scored catalog or alias text considered while matching one request item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub text: String,
    pub score: u8,
    pub catalog_entry_id: CatalogEntryId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedItem {
    pub description: String,
    pub quantity: Decimal,
    pub unit: String,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
    pub confidence_score: u8,
    pub catalog_entry_id: CatalogEntryId,
    pub location: String,
}

/// A request item that no candidate matched confidently enough.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspenseItem {
    pub raw_text: String,
    pub top_candidates: Vec<MatchCandidate>,
    pub confidence_score: u8,
}

impl SuspenseItem {
    pub fn best_candidate(&self) -> Option<&MatchCandidate> {
        self.top_candidates.first()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quotation {
    pub tenant_id: TenantId,
    pub session_id: SessionId,
    pub items: Vec<MatchedItem>,
    pub total_amount: Decimal,
}

/// The persisted view of one quotation request and, once processed, its
/// pipeline outcome.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotationRecord {
    pub id: QuotationId,
    pub tenant_id: TenantId,
    pub session_id: SessionId,
    pub client_name: String,
    pub transcript: String,
    pub status: QuotationStatus,
    pub total_amount: Decimal,
    pub items: Vec<MatchedItem>,
    pub suspense_items: Vec<SuspenseItem>,
    pub validation_messages: Vec<ValidationMessage>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QuotationRecord {
    pub fn processing(
        id: QuotationId,
        tenant_id: TenantId,
        session_id: SessionId,
        client_name: impl Into<String>,
        transcript: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            tenant_id,
            session_id,
            client_name: client_name.into(),
            transcript: transcript.into(),
            status: QuotationStatus::Processing,
            total_amount: Decimal::ZERO,
            items: Vec::new(),
            suspense_items: Vec::new(),
            validation_messages: Vec::new(),
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Copies a finished run onto the record and moves it out of
    /// `Processing`. Blocked and failed runs keep no line items.
    pub fn record_outcome(&mut self, state: &PipelineState) -> Result<(), DomainError> {
        let outcome = state.outcome();
        self.status.transition_to(outcome.status())?;

        match &state.quotation {
            Some(quotation) if state.error.is_none() => {
                self.total_amount = quotation.total_amount;
                self.items = quotation.items.clone();
                self.suspense_items = state.suspense_items.clone();
            }
            _ => {
                self.total_amount = Decimal::ZERO;
                self.items.clear();
                self.suspense_items.clear();
            }
        }
        self.validation_messages = state.validation_messages.clone();
        self.error = state.error.as_ref().map(|error| error.message.clone());
        self.updated_at = Utc::now();
        Ok(())
    }
}
