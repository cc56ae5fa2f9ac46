use chrono::Utc;
use sqlx::Row;
use uuid::Uuid;

use renoquote_core::domain::catalog::{Tenant, TenantId};

use super::{RepositoryError, TenantRepository};
use crate::DbPool;

pub struct SqlTenantRepository {
    pool: DbPool,
}

impl SqlTenantRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_tenant(row: &sqlx::sqlite::SqliteRow) -> Result<Tenant, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    Ok(Tenant { id: TenantId(id), name })
}

#[async_trait::async_trait]
impl TenantRepository for SqlTenantRepository {
    async fn find_by_name(&self, name: &str) -> Result<Option<Tenant>, RepositoryError> {
        let row = sqlx::query("SELECT id, name FROM tenants WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_tenant).transpose()
    }

    async fn find_or_create(&self, name: &str) -> Result<Tenant, RepositoryError> {
        sqlx::query(
            "INSERT INTO tenants (id, name, created_at) VALUES (?, ?, ?)
             ON CONFLICT(name) DO NOTHING",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(name)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        self.find_by_name(name)
            .await?
            .ok_or_else(|| RepositoryError::Decode(format!("tenant `{name}` vanished after insert")))
    }
}

#[cfg(test)]
mod tests {
    use super::SqlTenantRepository;
    use crate::repositories::TenantRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    #[tokio::test]
    async fn find_or_create_is_stable_per_name() {
        let repo = SqlTenantRepository::new(setup().await);

        let first = repo.find_or_create("Homeez").await.expect("create");
        let second = repo.find_or_create("Homeez").await.expect("find");

        assert_eq!(first, second);
        assert_eq!(first.name, "Homeez");
    }

    #[tokio::test]
    async fn unknown_tenant_is_none() {
        let repo = SqlTenantRepository::new(setup().await);

        assert!(repo.find_by_name("Nobody").await.expect("query").is_none());
    }
}
