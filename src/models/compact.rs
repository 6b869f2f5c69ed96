//! Compact daily ranking index.
//!
//! In memory the index is one sequence of `{id, val, rank}` entries. The
//! stored document flattens it into parallel `ids`/`vals`/`ranks` arrays;
//! reading a document whose arrays disagree in length fails.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::DateKey;

/// One ranked entity.
#[derive(Debug, Clone, PartialEq)]
pub struct CompactEntry {
    pub id: String,
    pub val: f64,
    /// 1-based position
    pub rank: u32,
}

/// Top-N ranking of one scope on one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "CompactIndexDoc", try_from = "CompactIndexDoc")]
pub struct CompactIndex {
    pub date_key: DateKey,
    pub scope_id: String,
    pub entries: Vec<CompactEntry>,
    pub generated_at: DateTime<Utc>,
}

impl CompactIndex {
    pub fn new(
        date_key: DateKey,
        scope_id: impl Into<String>,
        entries: Vec<CompactEntry>,
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            date_key,
            scope_id: scope_id.into(),
            entries,
            generated_at,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lookup table `id -> entry`, for baseline comparisons.
    pub fn by_id(&self) -> HashMap<&str, &CompactEntry> {
        self.entries.iter().map(|e| (e.id.as_str(), e)).collect()
    }
}

/// Stored form of [`CompactIndex`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompactIndexDoc {
    date_key: DateKey,
    scope_id: String,
    ids: Vec<String>,
    vals: Vec<f64>,
    ranks: Vec<u32>,
    n: usize,
    generated_at: DateTime<Utc>,
}

impl From<CompactIndex> for CompactIndexDoc {
    fn from(index: CompactIndex) -> Self {
        let n = index.entries.len();
        let mut ids = Vec::with_capacity(n);
        let mut vals = Vec::with_capacity(n);
        let mut ranks = Vec::with_capacity(n);
        for entry in index.entries {
            ids.push(entry.id);
            vals.push(entry.val);
            ranks.push(entry.rank);
        }
        Self {
            date_key: index.date_key,
            scope_id: index.scope_id,
            ids,
            vals,
            ranks,
            n,
            generated_at: index.generated_at,
        }
    }
}

impl TryFrom<CompactIndexDoc> for CompactIndex {
    type Error = String;

    fn try_from(doc: CompactIndexDoc) -> Result<Self, Self::Error> {
        if doc.ids.len() != doc.vals.len() || doc.ids.len() != doc.ranks.len() {
            return Err(format!(
                "compact index {} has mismatched arrays: {} ids, {} vals, {} ranks",
                doc.scope_id,
                doc.ids.len(),
                doc.vals.len(),
                doc.ranks.len()
            ));
        }
        let entries = doc
            .ids
            .into_iter()
            .zip(doc.vals)
            .zip(doc.ranks)
            .map(|((id, val), rank)| CompactEntry { id, val, rank })
            .collect();
        Ok(Self {
            date_key: doc.date_key,
            scope_id: doc.scope_id,
            entries,
            generated_at: doc.generated_at,
        })
    }
}

/// Rank candidates descending by value and keep the first `n`.
///
/// Ties are broken by id so the result does not depend on input order.
pub fn rank_top_n(mut candidates: Vec<(String, f64)>, n: usize) -> Vec<CompactEntry> {
    candidates.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    candidates.truncate(n);
    candidates
        .into_iter()
        .enumerate()
        .map(|(i, (id, val))| CompactEntry {
            id,
            val,
            rank: i as u32 + 1,
        })
        .collect()
}
