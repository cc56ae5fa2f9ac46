//! Fuzzy matching of request items against a tenant catalog.
//!
//! Every catalog description and every verified alias text becomes a
//! candidate. Catalog entries are indexed first, in store order, followed by
//! aliases, so on an exact score tie a canonical entry always outranks an
//! alias that points at it.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::catalog::{AliasEntry, CatalogEntry, CatalogEntryId};
use crate::domain::quotation::{MatchCandidate, MatchedItem, SuspenseItem};
use crate::domain::request::RequestItem;
use crate::matching::scorer::token_sort_ratio;

pub const DEFAULT_ACCEPTANCE_THRESHOLD: u8 = 98;
pub const DEFAULT_CANDIDATE_LIMIT: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchingSettings {
    /// Minimum top score (inclusive) for an item to be accepted.
    pub acceptance_threshold: u8,
    /// How many ranked candidates a suspense item keeps for review.
    pub candidate_limit: usize,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            acceptance_threshold: DEFAULT_ACCEPTANCE_THRESHOLD,
            candidate_limit: DEFAULT_CANDIDATE_LIMIT,
        }
    }
}

#[derive(Clone, Debug)]
struct IndexedCandidate<'a> {
    text: &'a str,
    entry: &'a CatalogEntry,
}

/// Candidate texts for one run, each resolved to its canonical entry.
#[derive(Clone, Debug, Default)]
pub struct CandidateIndex<'a> {
    candidates: Vec<IndexedCandidate<'a>>,
}

impl<'a> CandidateIndex<'a> {
    /// Builds the index with one id-keyed lookup so alias resolution stays
    /// linear in catalog plus alias size. Unverified aliases and aliases whose
    /// target is missing from `entries` are skipped.
    pub fn build(entries: &'a [CatalogEntry], aliases: &'a [AliasEntry]) -> Self {
        let by_id: HashMap<&CatalogEntryId, &CatalogEntry> =
            entries.iter().map(|entry| (&entry.id, entry)).collect();

        let mut candidates = Vec::with_capacity(entries.len() + aliases.len());
        candidates.extend(
            entries.iter().map(|entry| IndexedCandidate { text: &entry.description, entry }),
        );
        candidates.extend(aliases.iter().filter(|alias| alias.verified).filter_map(|alias| {
            by_id
                .get(&alias.catalog_entry_id)
                .map(|entry| IndexedCandidate { text: &alias.alias_text, entry })
        }));

        Self { candidates }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Top `limit` candidates by score, highest first. Equal scores keep
    /// index order.
    fn rank(&self, query: &str, limit: usize) -> Vec<(u8, &IndexedCandidate<'a>)> {
        let mut scored: Vec<(u8, &IndexedCandidate<'a>)> = self
            .candidates
            .iter()
            .map(|candidate| (token_sort_ratio(query, candidate.text), candidate))
            .collect();
        scored.sort_by(|left, right| right.0.cmp(&left.0));
        scored.truncate(limit);
        scored
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ItemMatch {
    Matched(MatchedItem),
    Suspense(SuspenseItem),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub matched: Vec<MatchedItem>,
    pub suspense: Vec<SuspenseItem>,
}

#[derive(Clone, Debug, Default)]
pub struct MatchingEngine {
    settings: MatchingSettings,
}

impl MatchingEngine {
    pub fn new(settings: MatchingSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> MatchingSettings {
        self.settings
    }

    /// Routes every item to exactly one of matched or suspense, preserving
    /// item order within each list.
    pub fn match_items(
        &self,
        items: &[RequestItem],
        entries: &[CatalogEntry],
        aliases: &[AliasEntry],
    ) -> MatchOutcome {
        let index = CandidateIndex::build(entries, aliases);
        let mut outcome = MatchOutcome::default();

        for item in items {
            match self.match_item(item, &index) {
                ItemMatch::Matched(matched) => outcome.matched.push(matched),
                ItemMatch::Suspense(suspense) => outcome.suspense.push(suspense),
            }
        }

        outcome
    }

    /// Every item lands in suspense with no candidates. Used when the
    /// catalog could not be read.
    pub fn suspend_all(&self, items: &[RequestItem]) -> MatchOutcome {
        MatchOutcome {
            matched: Vec::new(),
            suspense: items
                .iter()
                .map(|item| SuspenseItem {
                    raw_text: item.description.clone(),
                    top_candidates: Vec::new(),
                    confidence_score: 0,
                })
                .collect(),
        }
    }

    pub fn match_item(&self, item: &RequestItem, index: &CandidateIndex<'_>) -> ItemMatch {
        let ranked = index.rank(&item.description, self.settings.candidate_limit.max(1));

        match ranked.first() {
            Some((score, best)) if *score >= self.settings.acceptance_threshold => {
                let entry = best.entry;
                ItemMatch::Matched(MatchedItem {
                    description: entry.description.clone(),
                    quantity: item.quantity,
                    unit: entry.unit.clone(),
                    unit_price: entry.unit_price,
                    // overflow is reported when pricing recomputes the subtotal
                    subtotal: item.quantity.checked_mul(entry.unit_price).unwrap_or(Decimal::ZERO),
                    confidence_score: *score,
                    catalog_entry_id: entry.id.clone(),
                    location: item.location.clone(),
                })
            }
            best => ItemMatch::Suspense(SuspenseItem {
                raw_text: item.description.clone(),
                confidence_score: best.map(|(score, _)| *score).unwrap_or(0),
                top_candidates: ranked
                    .iter()
                    .map(|(score, candidate)| MatchCandidate {
                        text: candidate.text.to_owned(),
                        score: *score,
                        catalog_entry_id: candidate.entry.id.clone(),
                    })
                    .collect(),
            }),
        }
    }
}
