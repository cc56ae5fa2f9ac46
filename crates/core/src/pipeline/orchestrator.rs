//! Fixed-order quotation pipeline:
//! guard -> extract -> match -> price -> validate.
//!
//! The guard is the only branch. When it sets an error the run ends there.
//! Every later stage degrades instead of aborting: extraction falls back to
//! line splitting, an unreadable catalog routes every item to suspense, and a
//! pricing fault ends the run with an error and no quotation.

use std::sync::Arc;

use tracing::{info, warn};

use crate::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use crate::catalog::CatalogStore;
use crate::extraction::{fallback_line_items, Extractor};
use crate::matching::{MatchingEngine, MatchingSettings};
use crate::pipeline::state::{PipelineError, PipelineStage, PipelineState, StageUpdate};
use crate::pricing::{DeterministicPricingEngine, PricingEngine};
use crate::safety::ContentSafety;
use crate::validation::{DeterministicValidationChecker, ValidationChecker};

const AUDIT_ACTOR: &str = "quotation-pipeline";

pub struct QuotationPipeline<S, X, C, P = DeterministicPricingEngine> {
    safety: S,
    extractor: X,
    catalog: C,
    matching: MatchingEngine,
    pricing: P,
    validation: DeterministicValidationChecker,
    audit: Option<Arc<dyn AuditSink>>,
}

impl<S, X, C> QuotationPipeline<S, X, C, DeterministicPricingEngine> {
    pub fn new(safety: S, extractor: X, catalog: C, settings: MatchingSettings) -> Self {
        Self {
            safety,
            extractor,
            catalog,
            matching: MatchingEngine::new(settings),
            pricing: DeterministicPricingEngine,
            validation: DeterministicValidationChecker,
            audit: None,
        }
    }
}

impl<S, X, C, P> QuotationPipeline<S, X, C, P> {
    pub fn with_pricing_engine<Q>(self, pricing: Q) -> QuotationPipeline<S, X, C, Q> {
        QuotationPipeline {
            safety: self.safety,
            extractor: self.extractor,
            catalog: self.catalog,
            matching: self.matching,
            pricing,
            validation: self.validation,
            audit: self.audit,
        }
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    pub fn matching_settings(&self) -> MatchingSettings {
        self.matching.settings()
    }
}

impl<S, X, C, P> QuotationPipeline<S, X, C, P>
where
    S: ContentSafety,
    X: Extractor,
    C: CatalogStore,
    P: PricingEngine,
{
    pub async fn run(&self, initial: PipelineState) -> PipelineState {
        let mut state = initial;

        let guard = self.screen(&state).await;
        self.record(&state, PipelineStage::Guard, &guard);
        state.apply(guard);
        if let Some(error) = &state.error {
            warn!(
                event_name = "pipeline.guard.blocked",
                correlation_id = %state.session_id.0,
                tenant_id = %state.tenant_id.0,
                reason = %error,
                "run blocked by safety screen"
            );
            self.emit(&state, "pipeline.blocked", AuditCategory::Safety, AuditOutcome::Rejected);
            return state;
        }

        let extracted = self.extract(&state).await;
        self.record(&state, PipelineStage::Extract, &extracted);
        state.apply(extracted);

        let matched = self.match_items(&state).await;
        self.record(&state, PipelineStage::Match, &matched);
        state.apply(matched);

        let priced = self.price(&state);
        self.record(&state, PipelineStage::Price, &priced);
        state.apply(priced);
        if state.error.is_some() {
            self.emit(&state, "pipeline.failed", AuditCategory::Pricing, AuditOutcome::Failed);
            return state;
        }

        let validated = self.validate(&state);
        state.apply(validated);

        info!(
            event_name = "pipeline.completed",
            correlation_id = %state.session_id.0,
            tenant_id = %state.tenant_id.0,
            request_items = state.request_items.len(),
            matched = state.matched_items.len(),
            suspense = state.suspense_items.len(),
            validation_messages = state.validation_messages.len(),
            "quotation compiled"
        );
        self.emit(&state, "pipeline.completed", AuditCategory::Pipeline, AuditOutcome::Success);
        state
    }

    async fn screen(&self, state: &PipelineState) -> StageUpdate {
        let text = state.screening_text();
        if text.trim().is_empty() {
            return StageUpdate::default();
        }

        match self.safety.classify(&text).await {
            Ok(verdict) if verdict.safe => StageUpdate::default(),
            Ok(verdict) => {
                let reason = verdict.reason.as_deref().unwrap_or("input rejected");
                StageUpdate {
                    error: Some(PipelineError::security_violation(reason)),
                    ..StageUpdate::default()
                }
            }
            // classifier outages fail open; the heuristics already ran
            Err(error) => StageUpdate::diagnostic(
                PipelineStage::Guard,
                format!("safety classifier unavailable, continuing: {error}"),
            ),
        }
    }

    async fn extract(&self, state: &PipelineState) -> StageUpdate {
        if state.transcript.trim().is_empty() {
            return StageUpdate::default();
        }

        match self.extractor.extract(&state.transcript).await {
            Ok(request_items) => {
                StageUpdate { request_items: Some(request_items), ..StageUpdate::default() }
            }
            Err(error) => StageUpdate {
                request_items: Some(fallback_line_items(&state.transcript)),
                ..StageUpdate::diagnostic(
                    PipelineStage::Extract,
                    format!("extraction failed, fell back to line splitting: {error}"),
                )
            },
        }
    }

    async fn match_items(&self, state: &PipelineState) -> StageUpdate {
        let entries = match self.catalog.list_entries(&state.tenant_id).await {
            Ok(entries) => entries,
            Err(error) => {
                let outcome = self.matching.suspend_all(&state.request_items);
                return StageUpdate {
                    matched_items: Some(outcome.matched),
                    suspense_items: Some(outcome.suspense),
                    ..StageUpdate::diagnostic(
                        PipelineStage::Match,
                        format!("catalog unavailable, all items suspended: {error}"),
                    )
                };
            }
        };

        let (aliases, diagnostics) = match self.catalog.list_aliases(&state.tenant_id).await {
            Ok(aliases) => (aliases, Vec::new()),
            Err(error) => (
                Vec::new(),
                StageUpdate::diagnostic(
                    PipelineStage::Match,
                    format!("aliases unavailable, matching catalog text only: {error}"),
                )
                .diagnostics,
            ),
        };

        let outcome = self.matching.match_items(&state.request_items, &entries, &aliases);
        StageUpdate {
            matched_items: Some(outcome.matched),
            suspense_items: Some(outcome.suspense),
            diagnostics,
            ..StageUpdate::default()
        }
    }

    fn price(&self, state: &PipelineState) -> StageUpdate {
        match self.pricing.price(&state.tenant_id, &state.session_id, &state.matched_items) {
            Ok(quotation) => StageUpdate {
                matched_items: Some(quotation.items.clone()),
                quotation: Some(quotation),
                ..StageUpdate::default()
            },
            Err(error) => StageUpdate {
                error: Some(PipelineError {
                    stage: PipelineStage::Price,
                    message: format!("Pricing failure: {error}"),
                }),
                ..StageUpdate::diagnostic(PipelineStage::Price, error.to_string())
            },
        }
    }

    fn validate(&self, state: &PipelineState) -> StageUpdate {
        let messages = self.validation.validate(state);
        for message in &messages {
            warn!(
                event_name = "pipeline.validate.issue",
                correlation_id = %state.session_id.0,
                tenant_id = %state.tenant_id.0,
                severity = ?message.severity,
                "{}",
                message.text
            );
        }
        StageUpdate { validation_messages: Some(messages), ..StageUpdate::default() }
    }

    fn record(&self, state: &PipelineState, stage: PipelineStage, update: &StageUpdate) {
        for diagnostic in &update.diagnostics {
            warn!(
                event_name = "pipeline.stage.degraded",
                correlation_id = %state.session_id.0,
                tenant_id = %state.tenant_id.0,
                stage = %stage,
                "{}",
                diagnostic.message
            );
            if let Some(sink) = &self.audit {
                sink.emit(
                    AuditEvent::new(
                        Some(state.tenant_id.clone()),
                        state.session_id.0.clone(),
                        "pipeline.stage_degraded",
                        stage_category(stage),
                        AUDIT_ACTOR,
                        AuditOutcome::Degraded,
                    )
                    .with_metadata("stage", stage.as_str())
                    .with_metadata("message", diagnostic.message.clone()),
                );
            }
        }
    }

    fn emit(
        &self,
        state: &PipelineState,
        event_type: &str,
        category: AuditCategory,
        outcome: AuditOutcome,
    ) {
        let Some(sink) = &self.audit else {
            return;
        };

        let mut event = AuditEvent::new(
            Some(state.tenant_id.clone()),
            state.session_id.0.clone(),
            event_type,
            category,
            AUDIT_ACTOR,
            outcome,
        )
        .with_metadata("request_items", state.request_items.len().to_string())
        .with_metadata("matched", state.matched_items.len().to_string())
        .with_metadata("suspense", state.suspense_items.len().to_string());
        if let Some(quotation) = &state.quotation {
            event = event.with_metadata("total_amount", quotation.total_amount.to_string());
        }
        if let Some(error) = &state.error {
            event = event.with_metadata("error", error.message.clone());
        }
        sink.emit(event);
    }
}

fn stage_category(stage: PipelineStage) -> AuditCategory {
    match stage {
        PipelineStage::Guard => AuditCategory::Safety,
        PipelineStage::Extract => AuditCategory::Extraction,
        PipelineStage::Match => AuditCategory::Matching,
        PipelineStage::Price => AuditCategory::Pricing,
        PipelineStage::Validate => AuditCategory::Validation,
    }
}
