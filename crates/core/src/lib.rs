pub mod aliases;
pub mod audit;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod extraction;
pub mod matching;
pub mod pipeline;
pub mod pricing;
pub mod safety;
pub mod validation;

pub use aliases::AliasResolver;
pub use audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink};
pub use catalog::{AliasStore, CatalogStore, CatalogStoreError, InMemoryCatalog};
pub use domain::catalog::{AliasEntry, CatalogEntry, CatalogEntryId, Tenant, TenantId};
pub use domain::quotation::{
    MatchCandidate, MatchedItem, Quotation, QuotationId, QuotationRecord, QuotationStatus,
    SessionId, SuspenseItem,
};
pub use domain::request::RequestItem;
pub use domain::validation::{Severity, ValidationMessage};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use extraction::{fallback_line_items, ExtractionError, Extractor, LineSplitExtractor};
pub use matching::{token_sort_ratio, MatchingEngine, MatchingSettings};
pub use pipeline::{PipelineError, PipelineOutcome, PipelineStage, PipelineState, QuotationPipeline};
pub use pricing::{DeterministicPricingEngine, PricingEngine};
pub use safety::{
    ContentSafety, HeuristicSafetyScreen, LayeredSafetyScreen, SafetyError, SafetyVerdict,
};
pub use validation::{DeterministicValidationChecker, ValidationChecker};
