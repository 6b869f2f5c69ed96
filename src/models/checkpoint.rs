//! Incremental processing checkpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Marks how far player derivation has progressed.
///
/// Passed into the derivation stage by value; only the orchestrator reads or
/// persists it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub last_computed_at: Option<DateTime<Utc>>,
}

impl Checkpoint {
    pub fn at(ts: DateTime<Utc>) -> Self {
        Self {
            last_computed_at: Some(ts),
        }
    }

    /// Whether a document changed at `updated_at` still needs processing.
    pub fn is_pending(&self, updated_at: Option<DateTime<Utc>>) -> bool {
        match (self.last_computed_at, updated_at) {
            (None, _) => true,
            (Some(last), Some(updated)) => updated > last,
            (Some(_), None) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_empty_checkpoint_takes_everything() {
        let cp = Checkpoint::default();
        assert!(cp.is_pending(None));
        assert!(cp.is_pending(Some(Utc::now())));
    }

    #[test]
    fn test_strictly_newer_only() {
        let t = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let cp = Checkpoint::at(t);
        assert!(!cp.is_pending(Some(t)));
        assert!(cp.is_pending(Some(t + chrono::Duration::seconds(1))));
        assert!(!cp.is_pending(None));
    }
}
