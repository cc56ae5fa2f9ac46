use std::sync::Arc;

use serde_json::json;

use renoquote_core::audit::TracingAuditSink;
use renoquote_core::{AliasResolver, ApplicationError, CatalogEntryId};
use renoquote_db::{SqlCatalogRepository, SqlTenantRepository, TenantRepository};

use crate::commands::{
    execute, open_database, CommandFailure, CommandResult, EXIT_DB, EXIT_INPUT,
    EXIT_NOT_FOUND,
};

const SUGGESTION_LIMIT: usize = 3;

fn resolver_failure(error: ApplicationError) -> CommandFailure {
    match error {
        ApplicationError::ResolverNotFound { .. } => {
            ("target_not_found", error.to_string(), EXIT_NOT_FOUND)
        }
        ApplicationError::Domain(_) => ("invalid_input", error.to_string(), EXIT_INPUT),
        other => ("persistence", other.to_string(), EXIT_DB),
    }
}

/// `target` is tried as a catalog entry id first. Otherwise it is a search:
/// suggestions are reported, and the best one is applied only with `confirm`.
pub fn run(suspense_text: &str, target: &str, tenant_name: &str, confirm: bool) -> CommandResult {
    execute("resolve", |config| async move {
        let pool = open_database(&config).await?;
        let tenant = SqlTenantRepository::new(pool.clone())
            .find_by_name(tenant_name)
            .await
            .map_err(|error| ("persistence", error.to_string(), EXIT_DB))?
            .ok_or_else(|| {
                ("tenant_not_found", format!("tenant `{tenant_name}` not found"), EXIT_NOT_FOUND)
            })?;
        let resolver = AliasResolver::new(Arc::new(SqlCatalogRepository::new(pool.clone())))
            .with_audit_sink(Arc::new(TracingAuditSink));

        let target_id = CatalogEntryId(target.to_string());
        let is_id = resolver.has_target(&tenant.id, &target_id).await.map_err(resolver_failure)?;
        let alias = if is_id {
            resolver.resolve(&tenant.id, suspense_text, &target_id).await.map_err(resolver_failure)?
        } else {
            let suggestions = resolver
                .suggest_targets(&tenant.id, target, SUGGESTION_LIMIT)
                .await
                .map_err(resolver_failure)?;
            let Some(best) = suggestions.first() else {
                return Err((
                    "target_not_found",
                    format!("price list for `{tenant_name}` is empty"),
                    EXIT_NOT_FOUND,
                ));
            };

            if !confirm {
                pool.close().await;
                return Ok(CommandResult::success_with_data(
                    "resolve",
                    format!(
                        "best match for `{target}` is `{}` (score {}); rerun with --confirm to apply",
                        best.text, best.score
                    ),
                    Some(json!({ "applied": false, "suggestions": suggestions })),
                ));
            }

            resolver
                .resolve(&tenant.id, suspense_text, &best.catalog_entry_id)
                .await
                .map_err(resolver_failure)?
        };
        pool.close().await;

        Ok(CommandResult::success_with_data(
            "resolve",
            format!("`{}` now resolves to catalog entry {}", alias.alias_text, alias.catalog_entry_id),
            Some(json!({ "applied": true, "alias": alias })),
        ))
    })
}
