//! Post-run deduplication.
//!
//! Keeps the first record for every identity key and drops later ones.
//! Records without a usable key (blank name and no site identifier) are
//! always kept.

use mapharvest_core::{BusinessRecord, DedupStrategy};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Identity key of a record under `strategy`, `None` when it cannot be keyed.
#[must_use]
pub fn identity_key(record: &BusinessRecord, strategy: DedupStrategy) -> Option<String> {
    match strategy {
        DedupStrategy::ByIdentity => record
            .identity_id
            .text()
            .map(|id| format!("id:{id}"))
            .or_else(|| name_address_key(record)),
        DedupStrategy::ByNameAddress => name_address_key(record),
        DedupStrategy::None => None,
    }
}

/// SHA-256 of the lowercased, trimmed `name|address` pair.
fn name_address_key(record: &BusinessRecord) -> Option<String> {
    let name = record.name.text()?.to_lowercase();
    let address = record
        .full_address
        .text()
        .map(str::to_lowercase)
        .unwrap_or_default();

    let digest = Sha256::digest(format!("{name}|{address}").as_bytes());
    Some(format!("na:{}", hex::encode(digest)))
}

/// Collapse `records` by identity key, preserving first-seen order.
#[must_use]
pub fn dedupe(records: Vec<BusinessRecord>, strategy: DedupStrategy) -> Vec<BusinessRecord> {
    if strategy == DedupStrategy::None {
        return records;
    }

    let before = records.len();
    let mut seen = HashSet::new();
    let unique: Vec<BusinessRecord> = records
        .into_iter()
        .filter(|record| match identity_key(record, strategy) {
            Some(key) => seen.insert(key),
            None => true,
        })
        .collect();

    tracing::debug!(
        before,
        after = unique.len(),
        ?strategy,
        "deduplicated records"
    );
    unique
}
