use std::collections::HashMap;

use tokio::sync::RwLock;
use uuid::Uuid;

use renoquote_core::domain::catalog::{Tenant, TenantId};
use renoquote_core::domain::quotation::{QuotationId, QuotationRecord};

use super::{QuotationRepository, RepositoryError, TenantRepository};

#[derive(Default)]
pub struct InMemoryTenantRepository {
    tenants: RwLock<HashMap<String, Tenant>>,
}

#[async_trait::async_trait]
impl TenantRepository for InMemoryTenantRepository {
    async fn find_by_name(&self, name: &str) -> Result<Option<Tenant>, RepositoryError> {
        let tenants = self.tenants.read().await;
        Ok(tenants.get(name).cloned())
    }

    async fn find_or_create(&self, name: &str) -> Result<Tenant, RepositoryError> {
        let mut tenants = self.tenants.write().await;
        let tenant = tenants.entry(name.to_string()).or_insert_with(|| Tenant {
            id: TenantId(Uuid::new_v4().to_string()),
            name: name.to_string(),
        });
        Ok(tenant.clone())
    }
}

#[derive(Default)]
pub struct InMemoryQuotationRepository {
    quotations: RwLock<HashMap<String, QuotationRecord>>,
}

#[async_trait::async_trait]
impl QuotationRepository for InMemoryQuotationRepository {
    async fn find_by_id(
        &self,
        id: &QuotationId,
    ) -> Result<Option<QuotationRecord>, RepositoryError> {
        let quotations = self.quotations.read().await;
        Ok(quotations.get(&id.0).cloned())
    }

    async fn save(&self, record: &QuotationRecord) -> Result<(), RepositoryError> {
        let mut quotations = self.quotations.write().await;
        quotations.insert(record.id.0.clone(), record.clone());
        Ok(())
    }
}
