use async_trait::async_trait;
use thiserror::Error;

use renoquote_core::domain::catalog::Tenant;
use renoquote_core::domain::quotation::{QuotationId, QuotationRecord};
use renoquote_core::errors::ApplicationError;

pub mod catalog;
pub mod memory;
pub mod quotation;
pub mod tenant;

pub use catalog::{CatalogImportRow, CatalogImportSummary, SqlCatalogRepository};
pub use memory::{InMemoryQuotationRepository, InMemoryTenantRepository};
pub use quotation::SqlQuotationRepository;
pub use tenant::SqlTenantRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(error: RepositoryError) -> Self {
        ApplicationError::Persistence(error.to_string())
    }
}

#[async_trait]
pub trait TenantRepository: Send + Sync {
    async fn find_by_name(&self, name: &str) -> Result<Option<Tenant>, RepositoryError>;

    /// Returns the tenant with this name, creating it first when absent.
    async fn find_or_create(&self, name: &str) -> Result<Tenant, RepositoryError>;
}

#[async_trait]
pub trait QuotationRepository: Send + Sync {
    async fn find_by_id(&self, id: &QuotationId)
        -> Result<Option<QuotationRecord>, RepositoryError>;

    /// Writes the header and replaces every stored line in one transaction.
    async fn save(&self, record: &QuotationRecord) -> Result<(), RepositoryError>;
}
