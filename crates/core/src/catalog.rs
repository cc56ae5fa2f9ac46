//! Tenant-scoped catalog and alias lookups consumed by matching and alias
//! resolution. Storage lives behind these traits; `renoquote-db` provides the
//! SQLite implementation and [`InMemoryCatalog`] backs tests and demos.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::domain::catalog::{AliasEntry, CatalogEntry, CatalogEntryId, TenantId};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CatalogStoreError {
    #[error("catalog store unavailable: {0}")]
    Unavailable(String),
    #[error("catalog record could not be decoded: {0}")]
    Decode(String),
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Entries in insertion order.
    async fn list_entries(&self, tenant_id: &TenantId)
        -> Result<Vec<CatalogEntry>, CatalogStoreError>;

    /// Aliases in insertion order, verified or not.
    async fn list_aliases(&self, tenant_id: &TenantId)
        -> Result<Vec<AliasEntry>, CatalogStoreError>;

    async fn get_entry(
        &self,
        id: &CatalogEntryId,
        tenant_id: &TenantId,
    ) -> Result<Option<CatalogEntry>, CatalogStoreError>;
}

#[async_trait]
pub trait AliasStore: Send + Sync {
    /// Inserts or overwrites the alias keyed by `(tenant_id, alias.alias_text)`.
    /// Implementations must commit the whole record atomically.
    async fn upsert_alias(
        &self,
        tenant_id: &TenantId,
        alias: AliasEntry,
    ) -> Result<AliasEntry, CatalogStoreError>;
}

#[async_trait]
impl<T> CatalogStore for Arc<T>
where
    T: CatalogStore + ?Sized,
{
    async fn list_entries(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<CatalogEntry>, CatalogStoreError> {
        (**self).list_entries(tenant_id).await
    }

    async fn list_aliases(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<AliasEntry>, CatalogStoreError> {
        (**self).list_aliases(tenant_id).await
    }

    async fn get_entry(
        &self,
        id: &CatalogEntryId,
        tenant_id: &TenantId,
    ) -> Result<Option<CatalogEntry>, CatalogStoreError> {
        (**self).get_entry(id, tenant_id).await
    }
}

#[async_trait]
impl<T> AliasStore for Arc<T>
where
    T: AliasStore + ?Sized,
{
    async fn upsert_alias(
        &self,
        tenant_id: &TenantId,
        alias: AliasEntry,
    ) -> Result<AliasEntry, CatalogStoreError> {
        (**self).upsert_alias(tenant_id, alias).await
    }
}

#[derive(Default)]
struct TenantCatalog {
    entries: Vec<CatalogEntry>,
    aliases: Vec<AliasEntry>,
}

#[derive(Default)]
pub struct InMemoryCatalog {
    tenants: RwLock<HashMap<TenantId, TenantCatalog>>,
}

impl InMemoryCatalog {
    pub async fn insert_entry(&self, tenant_id: &TenantId, entry: CatalogEntry) {
        let mut tenants = self.tenants.write().await;
        let catalog = tenants.entry(tenant_id.clone()).or_default();
        match catalog.entries.iter_mut().find(|existing| existing.id == entry.id) {
            Some(existing) => *existing = entry,
            None => catalog.entries.push(entry),
        }
    }

    pub async fn alias_count(&self, tenant_id: &TenantId) -> usize {
        let tenants = self.tenants.read().await;
        tenants.get(tenant_id).map(|catalog| catalog.aliases.len()).unwrap_or(0)
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn list_entries(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<CatalogEntry>, CatalogStoreError> {
        let tenants = self.tenants.read().await;
        Ok(tenants.get(tenant_id).map(|catalog| catalog.entries.clone()).unwrap_or_default())
    }

    async fn list_aliases(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<AliasEntry>, CatalogStoreError> {
        let tenants = self.tenants.read().await;
        Ok(tenants.get(tenant_id).map(|catalog| catalog.aliases.clone()).unwrap_or_default())
    }

    async fn get_entry(
        &self,
        id: &CatalogEntryId,
        tenant_id: &TenantId,
    ) -> Result<Option<CatalogEntry>, CatalogStoreError> {
        let tenants = self.tenants.read().await;
        Ok(tenants
            .get(tenant_id)
            .and_then(|catalog| catalog.entries.iter().find(|entry| &entry.id == id))
            .cloned())
    }
}

#[async_trait]
impl AliasStore for InMemoryCatalog {
    async fn upsert_alias(
        &self,
        tenant_id: &TenantId,
        alias: AliasEntry,
    ) -> Result<AliasEntry, CatalogStoreError> {
        let mut tenants = self.tenants.write().await;
        let catalog = tenants.entry(tenant_id.clone()).or_default();
        match catalog.aliases.iter_mut().find(|existing| existing.alias_text == alias.alias_text)
        {
            Some(existing) => *existing = alias.clone(),
            None => catalog.aliases.push(alias.clone()),
        }
        Ok(alias)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{AliasStore, CatalogStore, InMemoryCatalog};
    use crate::domain::catalog::{AliasEntry, CatalogEntry, CatalogEntryId, TenantId};

    fn entry(id: &str, description: &str) -> CatalogEntry {
        CatalogEntry {
            id: CatalogEntryId(id.to_owned()),
            description: description.to_owned(),
            unit: "sqft".to_owned(),
            unit_price: Decimal::new(550, 2),
        }
    }

    #[tokio::test]
    async fn entries_are_scoped_by_tenant() {
        let catalog = InMemoryCatalog::default();
        let tenant_a = TenantId("a".to_owned());
        let tenant_b = TenantId("b".to_owned());
        catalog.insert_entry(&tenant_a, entry("pl-1", "Vinyl Flooring 5mm")).await;

        assert_eq!(catalog.list_entries(&tenant_a).await.expect("list").len(), 1);
        assert!(catalog.list_entries(&tenant_b).await.expect("list").is_empty());
        assert!(catalog
            .get_entry(&CatalogEntryId("pl-1".to_owned()), &tenant_b)
            .await
            .expect("get")
            .is_none());
    }

    #[tokio::test]
    async fn alias_upsert_is_last_writer_wins() {
        let catalog = InMemoryCatalog::default();
        let tenant = TenantId("a".to_owned());

        catalog
            .upsert_alias(&tenant, AliasEntry::verified("Walkway", CatalogEntryId("pl-1".into())))
            .await
            .expect("first upsert");
        catalog
            .upsert_alias(&tenant, AliasEntry::verified("Walkway", CatalogEntryId("pl-2".into())))
            .await
            .expect("second upsert");

        let aliases = catalog.list_aliases(&tenant).await.expect("list aliases");
        assert_eq!(aliases.len(), 1);
        assert_eq!(aliases[0].catalog_entry_id, CatalogEntryId("pl-2".to_owned()));
    }
}
