//! Post-hoc consistency checks over a compiled run. Every rule is evaluated;
//! none of them mutates the quotation or blocks the run.

use rust_decimal::Decimal;

use crate::domain::validation::ValidationMessage;
use crate::pipeline::state::PipelineState;

/// Suspense share above which a run is flagged.
pub const MAX_SUSPENSE_RATIO: f64 = 0.5;

pub trait ValidationChecker: Send + Sync {
    fn validate(&self, state: &PipelineState) -> Vec<ValidationMessage>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DeterministicValidationChecker;

impl ValidationChecker for DeterministicValidationChecker {
    fn validate(&self, state: &PipelineState) -> Vec<ValidationMessage> {
        validate_pipeline(state)
    }
}

pub fn validate_pipeline(state: &PipelineState) -> Vec<ValidationMessage> {
    [check_ghost_processing(state), check_suspense_ratio(state), check_zero_total(state)]
        .into_iter()
        .flatten()
        .collect()
}

fn check_ghost_processing(state: &PipelineState) -> Option<ValidationMessage> {
    let ghost = !state.request_items.is_empty()
        && state.matched_items.is_empty()
        && state.suspense_items.is_empty();
    ghost.then(|| {
        ValidationMessage::warning("Input received but no items were matched or suspended.")
    })
}

fn check_suspense_ratio(state: &PipelineState) -> Option<ValidationMessage> {
    let total = state.matched_items.len() + state.suspense_items.len();
    if total == 0 {
        return None;
    }

    let ratio = state.suspense_items.len() as f64 / total as f64;
    (ratio > MAX_SUSPENSE_RATIO).then(|| {
        ValidationMessage::warning(format!(
            "High suspense ratio ({:.1}%). More than 50% of items could not be confidently matched.",
            ratio * 100.0
        ))
    })
}

fn check_zero_total(state: &PipelineState) -> Option<ValidationMessage> {
    let quotation = state.quotation.as_ref()?;
    if state.matched_items.is_empty() || !quotation.total_amount.is_zero() {
        return None;
    }

    let intentionally_free =
        state.matched_items.iter().all(|item| item.unit_price == Decimal::ZERO);
    (!intentionally_free).then(|| {
        ValidationMessage::error(
            "Quotation total is $0.00 despite having matched items with potential value.",
        )
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{validate_pipeline, DeterministicValidationChecker, ValidationChecker};
    use crate::domain::catalog::{CatalogEntryId, TenantId};
    use crate::domain::quotation::{MatchedItem, Quotation, SessionId, SuspenseItem};
    use crate::domain::request::RequestItem;
    use crate::domain::validation::Severity;
    use crate::pipeline::state::PipelineState;

    fn state() -> PipelineState {
        PipelineState::new(TenantId("t".to_owned()), SessionId("s".to_owned()), "")
    }

    fn matched(unit_price: Decimal, quantity: Decimal) -> MatchedItem {
        MatchedItem {
            description: "Vinyl Flooring 5mm".to_owned(),
            quantity,
            unit: "sqft".to_owned(),
            unit_price,
            subtotal: quantity * unit_price,
            confidence_score: 100,
            catalog_entry_id: CatalogEntryId("pl-vinyl".to_owned()),
            location: "General".to_owned(),
        }
    }

    fn suspense(text: &str) -> SuspenseItem {
        SuspenseItem { raw_text: text.to_owned(), top_candidates: Vec::new(), confidence_score: 0 }
    }

    fn quotation(state: &PipelineState, total: Decimal) -> Quotation {
        Quotation {
            tenant_id: state.tenant_id.clone(),
            session_id: state.session_id.clone(),
            items: state.matched_items.clone(),
            total_amount: total,
        }
    }

    #[test]
    fn clean_run_produces_no_messages() {
        let mut state = state();
        state.request_items = vec![RequestItem::lot("Vinyl Flooring 5mm")];
        state.matched_items = vec![matched(Decimal::new(550, 2), Decimal::new(10, 0))];
        state.quotation = Some(quotation(&state, Decimal::new(5500, 2)));

        assert!(DeterministicValidationChecker.validate(&state).is_empty());
    }

    #[test]
    fn ghost_processing_is_a_warning() {
        let mut state = state();
        state.request_items = vec![RequestItem::lot("Wall Hacking")];

        let messages = validate_pipeline(&state);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].severity, Severity::Warning);
        assert!(messages[0].text.contains("no items were matched or suspended"));
    }

    #[test]
    fn no_input_is_not_ghost_processing() {
        assert!(validate_pipeline(&state()).is_empty());
    }

    #[test]
    fn high_suspense_ratio_reports_one_decimal_percent() {
        let mut state = state();
        state.matched_items = vec![matched(Decimal::ONE, Decimal::ONE)];
        state.suspense_items = vec![suspense("a"), suspense("b")];
        state.quotation = Some(quotation(&state, Decimal::ONE));

        let messages = validate_pipeline(&state);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].text.contains("(66.7%)"), "{}", messages[0].text);
    }

    #[test]
    fn exactly_half_suspense_is_not_flagged() {
        let mut state = state();
        state.matched_items = vec![matched(Decimal::ONE, Decimal::ONE)];
        state.suspense_items = vec![suspense("a")];
        state.quotation = Some(quotation(&state, Decimal::ONE));

        assert!(validate_pipeline(&state).is_empty());
    }

    #[test]
    fn zero_total_with_priced_items_is_an_error() {
        let mut state = state();
        state.matched_items = vec![matched(Decimal::new(550, 2), Decimal::new(10, 0))];
        state.quotation = Some(quotation(&state, Decimal::ZERO));

        let messages = validate_pipeline(&state);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].is_error());
    }

    #[test]
    fn intentionally_free_quotation_is_not_an_error() {
        let mut state = state();
        state.matched_items = vec![matched(Decimal::ZERO, Decimal::ONE)];
        state.quotation = Some(quotation(&state, Decimal::ZERO));

        assert!(validate_pipeline(&state).is_empty());
    }

    #[test]
    fn all_rules_are_evaluated_together() {
        let mut state = state();
        state.request_items = vec![RequestItem::lot("a"), RequestItem::lot("b")];
        state.matched_items = vec![matched(Decimal::new(550, 2), Decimal::ONE)];
        state.suspense_items = vec![suspense("a"), suspense("b"), suspense("c")];
        state.quotation = Some(quotation(&state, Decimal::ZERO));

        let messages = validate_pipeline(&state);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].severity, Severity::Warning);
        assert_eq!(messages[1].severity, Severity::Error);
    }
}
