use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use serde_json::json;

use renoquote_db::repositories::CatalogImportRow;
use renoquote_db::{SqlCatalogRepository, SqlTenantRepository, TenantRepository};

use crate::commands::{execute, open_database, CommandResult, EXIT_DB, EXIT_INPUT};

const DEFAULT_CATEGORY: &str = "General";
const DEFAULT_UNIT: &str = "lot";

struct Columns {
    category: Option<usize>,
    description: usize,
    unit: Option<usize>,
    unit_price: usize,
    code: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self> {
        let find = |name: &str| {
            headers.iter().position(|header| header.trim().eq_ignore_ascii_case(name))
        };
        let Some(description) = find("Description") else {
            bail!("price list is missing the `Description` column");
        };
        let Some(unit_price) = find("Unit Price") else {
            bail!("price list is missing the `Unit Price` column");
        };
        Ok(Self {
            category: find("Category"),
            description,
            unit: find("Unit"),
            unit_price,
            code: find("Code"),
        })
    }
}

/// Reads a `Category,Description,Unit,Unit Price[,Code]` price list.
///
/// Rows without a description or price are skipped, as are repeated
/// descriptions after the first. Prices may carry `$` and thousands
/// separators; a price that still does not parse is stored as zero. Rows
/// with a negative price are skipped, so catalog prices are never below zero.
pub fn parse_price_list<R: Read>(reader: R) -> Result<Vec<CatalogImportRow>> {
    let mut csv_reader =
        csv::ReaderBuilder::new().flexible(true).trim(csv::Trim::All).from_reader(reader);
    let columns = Columns::from_headers(csv_reader.headers().context("failed to read header")?)?;

    let mut seen = HashSet::new();
    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record.context("failed to read price list row")?;
        let field = |index: Option<usize>| {
            index.and_then(|index| record.get(index)).map(str::trim).filter(|value| !value.is_empty())
        };

        let (Some(description), Some(price)) =
            (field(Some(columns.description)), field(Some(columns.unit_price)))
        else {
            continue;
        };
        let unit_price = clean_price(price);
        if unit_price < Decimal::ZERO {
            continue;
        }
        if !seen.insert(description.to_string()) {
            continue;
        }

        rows.push(CatalogImportRow {
            category: field(columns.category).unwrap_or(DEFAULT_CATEGORY).to_string(),
            description: description.to_string(),
            unit: field(columns.unit).unwrap_or(DEFAULT_UNIT).to_string(),
            unit_price,
            item_code: field(columns.code).map(str::to_string),
        });
    }

    Ok(rows)
}

fn clean_price(raw: &str) -> Decimal {
    let cleaned: String = raw.chars().filter(|c| *c != '$' && *c != ',').collect();
    Decimal::from_str(cleaned.trim()).unwrap_or(Decimal::ZERO)
}

pub fn run(path: &Path, tenant_name: &str) -> CommandResult {
    let rows = match File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))
        .and_then(parse_price_list)
    {
        Ok(rows) => rows,
        Err(error) => {
            return CommandResult::failure("ingest", "invalid_input", format!("{error:#}"), EXIT_INPUT);
        }
    };

    execute("ingest", |config| async move {
        let pool = open_database(&config).await?;
        let tenant = SqlTenantRepository::new(pool.clone())
            .find_or_create(tenant_name)
            .await
            .map_err(|error| ("persistence", error.to_string(), EXIT_DB))?;
        let summary = SqlCatalogRepository::new(pool.clone())
            .replace_catalog(&tenant.id, &rows)
            .await
            .map_err(|error| ("persistence", error.to_string(), EXIT_DB))?;
        pool.close().await;

        Ok(CommandResult::success_with_data(
            "ingest",
            format!("loaded {} price list items for tenant `{}`", summary.upserted, tenant.name),
            Some(json!({
                "tenant_id": tenant.id.0,
                "upserted": summary.upserted,
                "removed": summary.removed,
            })),
        ))
    })
}
