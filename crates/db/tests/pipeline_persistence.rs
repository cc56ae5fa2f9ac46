use std::sync::Arc;

use rust_decimal::Decimal;

use renoquote_core::{
    AliasResolver, HeuristicSafetyScreen, LineSplitExtractor, MatchingSettings, PipelineState,
    QuotationId, QuotationPipeline, QuotationRecord, QuotationStatus, SessionId,
};
use renoquote_db::repositories::CatalogImportRow;
use renoquote_db::{
    connect_with_settings, migrations, QuotationRepository, SqlCatalogRepository,
    SqlQuotationRepository, SqlTenantRepository, TenantRepository,
};

type PersistenceTestResult<T = ()> = Result<T, String>;

macro_rules! require {
    ($cond:expr) => {
        if !$cond {
            return Err(format!("assertion failed: `{}`", stringify!($cond)));
        }
    };
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err(format!($($arg)*));
        }
    };
}

fn import_row(description: &str, unit: &str, unit_price: Decimal) -> CatalogImportRow {
    CatalogImportRow {
        category: "General".to_string(),
        description: description.to_string(),
        unit: unit.to_string(),
        unit_price,
        item_code: None,
    }
}

#[tokio::test]
async fn pipeline_outcome_is_persisted_and_alias_feeds_next_run() -> PersistenceTestResult {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.map_err(|e| e.to_string())?;
    migrations::run_pending(&pool).await.map_err(|e| e.to_string())?;

    let tenant = SqlTenantRepository::new(pool.clone())
        .find_or_create("Homeez")
        .await
        .map_err(|e| e.to_string())?;
    let catalog = Arc::new(SqlCatalogRepository::new(pool.clone()));
    catalog
        .replace_catalog(
            &tenant.id,
            &[
                import_row("Vinyl Flooring 5mm", "sqft", Decimal::new(550, 2)),
                import_row("Hacking of existing wall", "lot", Decimal::new(450, 0)),
            ],
        )
        .await
        .map_err(|e| e.to_string())?;

    let pipeline = QuotationPipeline::new(
        HeuristicSafetyScreen::new().map_err(|e| e.to_string())?,
        LineSplitExtractor,
        Arc::clone(&catalog),
        MatchingSettings::default(),
    );
    let quotations = SqlQuotationRepository::new(pool.clone());

    let transcript = "Vinyl Flooring 5mm\nWalkway";
    let mut record = QuotationRecord::processing(
        QuotationId("Q-1".to_string()),
        tenant.id.clone(),
        SessionId("session-1".to_string()),
        "API User",
        transcript,
    );
    quotations.save(&record).await.map_err(|e| e.to_string())?;

    let state = pipeline
        .run(PipelineState::new(tenant.id.clone(), record.session_id.clone(), transcript))
        .await;
    record.record_outcome(&state).map_err(|e| e.to_string())?;
    quotations.save(&record).await.map_err(|e| e.to_string())?;

    let stored = quotations
        .find_by_id(&record.id)
        .await
        .map_err(|e| e.to_string())?
        .ok_or("quotation should be stored")?;
    require!(stored.status == QuotationStatus::Completed, "status was {:?}", stored.status);
    require!(stored.items.len() == 1);
    require!(stored.suspense_items.len() == 1);
    require!(stored.suspense_items[0].raw_text == "Walkway");
    require!(stored.total_amount == Decimal::new(550, 2));

    let target = stored.suspense_items[0]
        .best_candidate()
        .map(|candidate| candidate.catalog_entry_id.clone())
        .ok_or("suspense item should carry candidates")?;
    AliasResolver::new(Arc::clone(&catalog))
        .resolve(&tenant.id, "Walkway", &target)
        .await
        .map_err(|e| e.to_string())?;

    let rerun = pipeline
        .run(PipelineState::new(tenant.id.clone(), SessionId("session-2".to_string()), "Walkway"))
        .await;
    require!(rerun.suspense_items.is_empty());
    require!(rerun.matched_items.len() == 1);
    require!(rerun.matched_items[0].catalog_entry_id == target);
    Ok(())
}
