use rust_decimal::Decimal;

use crate::domain::catalog::TenantId;
use crate::domain::quotation::{MatchedItem, Quotation, SessionId};
use crate::errors::DomainError;

pub trait PricingEngine: Send + Sync {
    fn price(
        &self,
        tenant_id: &TenantId,
        session_id: &SessionId,
        matched_items: &[MatchedItem],
    ) -> Result<Quotation, DomainError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DeterministicPricingEngine;

impl PricingEngine for DeterministicPricingEngine {
    fn price(
        &self,
        tenant_id: &TenantId,
        session_id: &SessionId,
        matched_items: &[MatchedItem],
    ) -> Result<Quotation, DomainError> {
        price_quotation(tenant_id, session_id, matched_items)
    }
}

/// Builds the quotation, recomputing every subtotal from its own quantity
/// and unit price. Upstream subtotals are never reused.
pub fn price_quotation(
    tenant_id: &TenantId,
    session_id: &SessionId,
    matched_items: &[MatchedItem],
) -> Result<Quotation, DomainError> {
    let mut items = Vec::with_capacity(matched_items.len());
    let mut total_amount = Decimal::ZERO;

    for item in matched_items {
        let subtotal = line_subtotal(item)?;
        total_amount = total_amount.checked_add(subtotal).ok_or_else(|| {
            DomainError::PricingOverflow { context: "quotation total".to_owned() }
        })?;
        items.push(MatchedItem { subtotal, ..item.clone() });
    }

    Ok(Quotation {
        tenant_id: tenant_id.clone(),
        session_id: session_id.clone(),
        items,
        total_amount,
    })
}

pub fn line_subtotal(item: &MatchedItem) -> Result<Decimal, DomainError> {
    item.quantity.checked_mul(item.unit_price).ok_or_else(|| DomainError::PricingOverflow {
        context: format!("subtotal of `{}`", item.description),
    })
}
