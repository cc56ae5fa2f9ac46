use std::sync::Arc;

use renoquote_agent::AgentCollaborators;
use renoquote_core::audit::TracingAuditSink;
use renoquote_core::config::{AppConfig, ConfigError, LoadOptions};
use renoquote_core::{AliasResolver, QuotationPipeline};
use renoquote_db::{
    connect_from_config, migrations, DbPool, SqlCatalogRepository, SqlQuotationRepository,
    SqlTenantRepository,
};
use thiserror::Error;
use tracing::info;

use crate::quotation::ApiState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub api: ApiState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("llm collaborators could not be built: {0}")]
    Collaborators(String),
}

#[cfg_attr(not(test), allow(dead_code))]
pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_from_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let api = build_api_state(&config, db_pool.clone())?;
    Ok(Application { config, db_pool, api })
}

pub fn build_api_state(config: &AppConfig, db_pool: DbPool) -> Result<ApiState, BootstrapError> {
    let collaborators = AgentCollaborators::from_config(&config.llm)
        .map_err(|error| BootstrapError::Collaborators(format!("{error:#}")))?;
    let catalog = Arc::new(SqlCatalogRepository::new(db_pool.clone()));

    let pipeline = QuotationPipeline::new(
        collaborators.safety,
        collaborators.extractor,
        Arc::clone(&catalog),
        config.matching.settings(),
    )
    .with_audit_sink(Arc::new(TracingAuditSink));
    let resolver = AliasResolver::new(catalog).with_audit_sink(Arc::new(TracingAuditSink));

    Ok(ApiState {
        pipeline: Arc::new(pipeline),
        resolver: Arc::new(resolver),
        tenants: Arc::new(SqlTenantRepository::new(db_pool.clone())),
        quotations: Arc::new(SqlQuotationRepository::new(db_pool)),
    })
}
