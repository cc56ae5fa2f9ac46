//! Human review channel: promotes a suspense phrase to a verified alias of a
//! catalog entry. Later pipeline runs pick the alias up as a match target.

use std::sync::Arc;

use tracing::info;

use crate::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use crate::catalog::{AliasStore, CatalogStore, CatalogStoreError};
use crate::domain::catalog::{AliasEntry, CatalogEntryId, TenantId};
use crate::domain::quotation::MatchCandidate;
use crate::errors::{ApplicationError, DomainError};
use crate::matching::token_sort_ratio;

const AUDIT_ACTOR: &str = "alias-resolver";

pub struct AliasResolver<S> {
    store: S,
    audit: Option<Arc<dyn AuditSink>>,
}

impl<S> AliasResolver<S>
where
    S: CatalogStore + AliasStore,
{
    pub fn new(store: S) -> Self {
        Self { store, audit: None }
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Points `suspense_text` at `target` for this tenant. An existing alias
    /// with the same text is overwritten and marked verified.
    pub async fn resolve(
        &self,
        tenant_id: &TenantId,
        suspense_text: &str,
        target: &CatalogEntryId,
    ) -> Result<AliasEntry, ApplicationError> {
        let alias_text = suspense_text.trim();
        if alias_text.is_empty() {
            self.emit(tenant_id, "alias.rejected", AuditOutcome::Rejected, alias_text, target);
            return Err(DomainError::InvariantViolation("alias text must not be empty".to_owned())
                .into());
        }

        let entry = self.store.get_entry(target, tenant_id).await.map_err(store_error)?;
        let Some(entry) = entry else {
            self.emit(tenant_id, "alias.rejected", AuditOutcome::Rejected, alias_text, target);
            return Err(ApplicationError::ResolverNotFound {
                tenant_id: tenant_id.clone(),
                catalog_entry_id: target.clone(),
            });
        };

        let alias = self
            .store
            .upsert_alias(tenant_id, AliasEntry::verified(alias_text, entry.id.clone()))
            .await
            .map_err(store_error)?;

        info!(
            event_name = "alias.resolved",
            tenant_id = %tenant_id,
            alias_text = %alias.alias_text,
            catalog_entry_id = %alias.catalog_entry_id,
            description = %entry.description,
            "verified alias recorded"
        );
        self.emit(tenant_id, "alias.resolved", AuditOutcome::Success, alias_text, target);
        Ok(alias)
    }

    /// Whether `target` names a catalog entry of this tenant. Emits no audit
    /// event, so callers can check before choosing between resolve and search.
    pub async fn has_target(
        &self,
        tenant_id: &TenantId,
        target: &CatalogEntryId,
    ) -> Result<bool, ApplicationError> {
        let entry = self.store.get_entry(target, tenant_id).await.map_err(store_error)?;
        Ok(entry.is_some())
    }

    /// Ranks the tenant's catalog descriptions against a free-text query.
    pub async fn suggest_targets(
        &self,
        tenant_id: &TenantId,
        query: &str,
        limit: usize,
    ) -> Result<Vec<MatchCandidate>, ApplicationError> {
        let entries = self.store.list_entries(tenant_id).await.map_err(store_error)?;
        let mut ranked: Vec<MatchCandidate> = entries
            .into_iter()
            .map(|entry| MatchCandidate {
                score: token_sort_ratio(query, &entry.description),
                text: entry.description,
                catalog_entry_id: entry.id,
            })
            .collect();
        ranked.sort_by(|left, right| right.score.cmp(&left.score));
        ranked.truncate(limit);
        Ok(ranked)
    }

    fn emit(
        &self,
        tenant_id: &TenantId,
        event_type: &str,
        outcome: AuditOutcome,
        alias_text: &str,
        target: &CatalogEntryId,
    ) {
        if let Some(sink) = &self.audit {
            sink.emit(
                AuditEvent::new(
                    Some(tenant_id.clone()),
                    format!("alias:{alias_text}"),
                    event_type,
                    AuditCategory::Alias,
                    AUDIT_ACTOR,
                    outcome,
                )
                .with_metadata("alias_text", alias_text)
                .with_metadata("catalog_entry_id", target.0.clone()),
            );
        }
    }
}

fn store_error(error: CatalogStoreError) -> ApplicationError {
    match error {
        CatalogStoreError::Unavailable(message) => ApplicationError::CatalogUnavailable(message),
        CatalogStoreError::Decode(message) => ApplicationError::Persistence(message),
    }
}
