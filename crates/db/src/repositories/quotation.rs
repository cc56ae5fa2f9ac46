use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::Row;

use renoquote_core::domain::catalog::{CatalogEntryId, TenantId};
use renoquote_core::domain::quotation::{
    MatchCandidate, MatchedItem, QuotationId, QuotationRecord, QuotationStatus, SessionId,
    SuspenseItem,
};
use renoquote_core::domain::validation::ValidationMessage;

use super::{QuotationRepository, RepositoryError};
use crate::DbPool;

pub struct SqlQuotationRepository {
    pool: DbPool,
}

impl SqlQuotationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode<T>(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<T, RepositoryError>
where
    T: for<'r> sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(column).map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn parse_decimal(value: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(value)
        .map_err(|e| RepositoryError::Decode(format!("invalid decimal `{value}`: {e}")))
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value).map(|dt| dt.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now())
}

enum StoredLine {
    Matched(MatchedItem),
    Suspense(SuspenseItem),
}

fn row_to_line(row: &sqlx::sqlite::SqliteRow) -> Result<StoredLine, RepositoryError> {
    let description: String = decode(row, "description")?;
    let confidence: i64 = decode(row, "confidence_score")?;
    let confidence_score = u8::try_from(confidence)
        .map_err(|_| RepositoryError::Decode(format!("confidence score {confidence} out of range")))?;
    let is_suspense: bool = decode(row, "is_suspense")?;

    if is_suspense {
        let best_matches: String = decode(row, "best_matches")?;
        let top_candidates: Vec<MatchCandidate> = serde_json::from_str(&best_matches)
            .map_err(|e| RepositoryError::Decode(format!("invalid best_matches: {e}")))?;
        return Ok(StoredLine::Suspense(SuspenseItem {
            raw_text: description,
            top_candidates,
            confidence_score,
        }));
    }

    let price_list_id: Option<String> = decode(row, "price_list_id")?;
    let price_list_id = price_list_id
        .ok_or_else(|| RepositoryError::Decode("matched line without price_list_id".to_string()))?;
    let quantity: String = decode(row, "quantity")?;
    let unit_price: String = decode(row, "unit_price")?;
    let subtotal: String = decode(row, "subtotal")?;

    Ok(StoredLine::Matched(MatchedItem {
        description,
        quantity: parse_decimal(&quantity)?,
        unit: decode(row, "unit")?,
        unit_price: parse_decimal(&unit_price)?,
        subtotal: parse_decimal(&subtotal)?,
        confidence_score,
        catalog_entry_id: CatalogEntryId(price_list_id),
        location: decode(row, "location")?,
    }))
}

#[async_trait::async_trait]
impl QuotationRepository for SqlQuotationRepository {
    async fn find_by_id(
        &self,
        id: &QuotationId,
    ) -> Result<Option<QuotationRecord>, RepositoryError> {
        let Some(header) = sqlx::query(
            "SELECT id, tenant_id, session_id, client_name, transcript, status, total_amount,
                    error, validation_messages, created_at, updated_at
             FROM quotations WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let status: String = decode(&header, "status")?;
        let status = QuotationStatus::parse(&status)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown quotation status `{status}`")))?;
        let total_amount: String = decode(&header, "total_amount")?;
        let validation_messages: String = decode(&header, "validation_messages")?;
        let validation_messages: Vec<ValidationMessage> =
            serde_json::from_str(&validation_messages)
                .map_err(|e| RepositoryError::Decode(format!("invalid validation_messages: {e}")))?;
        let created_at: String = decode(&header, "created_at")?;
        let updated_at: String = decode(&header, "updated_at")?;

        let lines = sqlx::query(
            "SELECT price_list_id, description, quantity, unit, unit_price, subtotal, location,
                    confidence_score, is_suspense, best_matches
             FROM quotation_items WHERE quotation_id = ? ORDER BY line_no",
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await?;

        let mut items = Vec::new();
        let mut suspense_items = Vec::new();
        for line in &lines {
            match row_to_line(line)? {
                StoredLine::Matched(item) => items.push(item),
                StoredLine::Suspense(item) => suspense_items.push(item),
            }
        }

        Ok(Some(QuotationRecord {
            id: QuotationId(decode(&header, "id")?),
            tenant_id: TenantId(decode(&header, "tenant_id")?),
            session_id: SessionId(decode(&header, "session_id")?),
            client_name: decode(&header, "client_name")?,
            transcript: decode(&header, "transcript")?,
            status,
            total_amount: parse_decimal(&total_amount)?,
            items,
            suspense_items,
            validation_messages,
            error: decode(&header, "error")?,
            created_at: parse_timestamp(&created_at),
            updated_at: parse_timestamp(&updated_at),
        }))
    }

    async fn save(&self, record: &QuotationRecord) -> Result<(), RepositoryError> {
        let validation_messages = serde_json::to_string(&record.validation_messages)
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO quotations (id, tenant_id, session_id, client_name, transcript, status,
                                     total_amount, error, validation_messages, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 status = excluded.status,
                 total_amount = excluded.total_amount,
                 error = excluded.error,
                 validation_messages = excluded.validation_messages,
                 updated_at = excluded.updated_at",
        )
        .bind(&record.id.0)
        .bind(&record.tenant_id.0)
        .bind(&record.session_id.0)
        .bind(&record.client_name)
        .bind(&record.transcript)
        .bind(record.status.as_str())
        .bind(record.total_amount.to_string())
        .bind(&record.error)
        .bind(validation_messages)
        .bind(record.created_at.to_rfc3339())
        .bind(record.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM quotation_items WHERE quotation_id = ?")
            .bind(&record.id.0)
            .execute(&mut *tx)
            .await?;

        let mut line_no: i64 = 0;
        for item in &record.items {
            sqlx::query(
                "INSERT INTO quotation_items (quotation_id, line_no, price_list_id, description,
                                              quantity, unit, unit_price, subtotal, location,
                                              confidence_score, is_suspense)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0)",
            )
            .bind(&record.id.0)
            .bind(line_no)
            .bind(&item.catalog_entry_id.0)
            .bind(&item.description)
            .bind(item.quantity.to_string())
            .bind(&item.unit)
            .bind(item.unit_price.to_string())
            .bind(item.subtotal.to_string())
            .bind(&item.location)
            .bind(i64::from(item.confidence_score))
            .execute(&mut *tx)
            .await?;
            line_no += 1;
        }

        for item in &record.suspense_items {
            let best_matches = serde_json::to_string(&item.top_candidates)
                .map_err(|e| RepositoryError::Decode(e.to_string()))?;
            sqlx::query(
                "INSERT INTO quotation_items (quotation_id, line_no, description, confidence_score,
                                              is_suspense, best_matches)
                 VALUES (?, ?, ?, ?, 1, ?)",
            )
            .bind(&record.id.0)
            .bind(line_no)
            .bind(&item.raw_text)
            .bind(i64::from(item.confidence_score))
            .bind(best_matches)
            .execute(&mut *tx)
            .await?;
            line_no += 1;
        }

        tx.commit().await?;
        Ok(())
    }
}
