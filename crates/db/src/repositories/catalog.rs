use std::collections::HashSet;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::Row;
use uuid::Uuid;

use renoquote_core::catalog::{AliasStore, CatalogStore, CatalogStoreError};
use renoquote_core::domain::catalog::{AliasEntry, CatalogEntry, CatalogEntryId, TenantId};

use super::RepositoryError;
use crate::DbPool;

/// One cleaned price-list row ready to be stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogImportRow {
    pub category: String,
    pub description: String,
    pub unit: String,
    pub unit_price: Decimal,
    pub item_code: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CatalogImportSummary {
    pub upserted: usize,
    pub removed: usize,
}

pub struct SqlCatalogRepository {
    pool: DbPool,
}

impl SqlCatalogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Makes `rows` the tenant's whole catalog. Entries are keyed by
    /// description, so an entry that survives a re-import keeps its id and
    /// its aliases; entries missing from `rows` are deleted with their aliases.
    pub async fn replace_catalog(
        &self,
        tenant_id: &TenantId,
        rows: &[CatalogImportRow],
    ) -> Result<CatalogImportSummary, RepositoryError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        for (position, row) in rows.iter().enumerate() {
            sqlx::query(
                "INSERT INTO price_lists (id, tenant_id, category, description, unit, unit_price,
                                          item_code, position, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(tenant_id, description) DO UPDATE SET
                     category = excluded.category,
                     unit = excluded.unit,
                     unit_price = excluded.unit_price,
                     item_code = excluded.item_code,
                     position = excluded.position,
                     updated_at = excluded.updated_at",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&tenant_id.0)
            .bind(&row.category)
            .bind(&row.description)
            .bind(&row.unit)
            .bind(row.unit_price.to_string())
            .bind(&row.item_code)
            .bind(position as i64)
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        let keep: HashSet<&str> = rows.iter().map(|row| row.description.as_str()).collect();
        let existing = sqlx::query("SELECT id, description FROM price_lists WHERE tenant_id = ?")
            .bind(&tenant_id.0)
            .fetch_all(&mut *tx)
            .await?;

        let mut removed = 0;
        for row in &existing {
            let description: String =
                row.try_get("description").map_err(|e| RepositoryError::Decode(e.to_string()))?;
            if keep.contains(description.as_str()) {
                continue;
            }
            let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
            sqlx::query("DELETE FROM price_lists WHERE id = ?").bind(id).execute(&mut *tx).await?;
            removed += 1;
        }

        tx.commit().await?;
        Ok(CatalogImportSummary { upserted: rows.len(), removed })
    }
}

fn parse_decimal(value: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(value)
        .map_err(|e| RepositoryError::Decode(format!("invalid decimal `{value}`: {e}")))
}

fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<CatalogEntry, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let description: String =
        row.try_get("description").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let unit: String = row.try_get("unit").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let unit_price: String =
        row.try_get("unit_price").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(CatalogEntry {
        id: CatalogEntryId(id),
        description,
        unit,
        unit_price: parse_decimal(&unit_price)?,
    })
}

fn row_to_alias(row: &sqlx::sqlite::SqliteRow) -> Result<AliasEntry, RepositoryError> {
    let alias_text: String =
        row.try_get("alias_text").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let price_list_id: String =
        row.try_get("price_list_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let verified: bool =
        row.try_get("is_verified").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(AliasEntry { alias_text, catalog_entry_id: CatalogEntryId(price_list_id), verified })
}

fn store_error(error: RepositoryError) -> CatalogStoreError {
    match error {
        RepositoryError::Database(error) => CatalogStoreError::Unavailable(error.to_string()),
        RepositoryError::Decode(message) => CatalogStoreError::Decode(message),
    }
}

#[async_trait]
impl CatalogStore for SqlCatalogRepository {
    async fn list_entries(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<CatalogEntry>, CatalogStoreError> {
        let rows = sqlx::query(
            "SELECT id, description, unit, unit_price
             FROM price_lists WHERE tenant_id = ? ORDER BY position, rowid",
        )
        .bind(&tenant_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_error(e.into()))?;

        rows.iter().map(row_to_entry).collect::<Result<Vec<_>, _>>().map_err(store_error)
    }

    async fn list_aliases(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<AliasEntry>, CatalogStoreError> {
        let rows = sqlx::query(
            "SELECT alias_text, price_list_id, is_verified
             FROM product_aliases WHERE tenant_id = ? ORDER BY rowid",
        )
        .bind(&tenant_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_error(e.into()))?;

        rows.iter().map(row_to_alias).collect::<Result<Vec<_>, _>>().map_err(store_error)
    }

    async fn get_entry(
        &self,
        id: &CatalogEntryId,
        tenant_id: &TenantId,
    ) -> Result<Option<CatalogEntry>, CatalogStoreError> {
        let row = sqlx::query(
            "SELECT id, description, unit, unit_price
             FROM price_lists WHERE id = ? AND tenant_id = ?",
        )
        .bind(&id.0)
        .bind(&tenant_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_error(e.into()))?;

        row.as_ref().map(row_to_entry).transpose().map_err(store_error)
    }
}

#[async_trait]
impl AliasStore for SqlCatalogRepository {
    async fn upsert_alias(
        &self,
        tenant_id: &TenantId,
        alias: AliasEntry,
    ) -> Result<AliasEntry, CatalogStoreError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO product_aliases (tenant_id, alias_text, price_list_id, is_verified,
                                          created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(tenant_id, alias_text) DO UPDATE SET
                 price_list_id = excluded.price_list_id,
                 is_verified = excluded.is_verified,
                 updated_at = excluded.updated_at",
        )
        .bind(&tenant_id.0)
        .bind(&alias.alias_text)
        .bind(&alias.catalog_entry_id.0)
        .bind(alias.verified)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| store_error(e.into()))?;

        Ok(alias)
    }
}
