use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TenantId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CatalogEntryId(pub String);

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for CatalogEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An isolated customer scope owning its own catalog and aliases.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
}

/// A priced, unit-denominated service offered by one tenant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: CatalogEntryId,
    pub description: String,
    pub unit: String,
    pub unit_price: Decimal,
}

/// Alternate phrasing that resolves to a canonical catalog entry.
///
/// The alias text is only ever a lookup key; pricing and description always
/// come from the referenced entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasEntry {
    pub alias_text: String,
    pub catalog_entry_id: CatalogEntryId,
    pub verified: bool,
}

impl AliasEntry {
    pub fn verified(alias_text: impl Into<String>, catalog_entry_id: CatalogEntryId) -> Self {
        Self { alias_text: alias_text.into(), catalog_entry_id, verified: true }
    }
}
