//! Capacity accounting
//! Pure derivation of a usage summary from a record collection and a limit.
//! Sums the footprint of every persisted record regardless of enabled state,
//! matching the capacity-of-store semantics the UI has always shown.

use serde::{Deserialize, Serialize};

/// Per-record storage weight, typically a token count
pub trait Footprint {
    fn footprint(&self) -> u64;
}

/// Qualitative bucket for how full the store is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageStatus {
    Ample,
    Moderate,
    Tight,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub used: u64,
    pub limit: u64,
    pub ratio: f64,
    pub status: UsageStatus,
}

const MODERATE_AT: f64 = 0.45;
const TIGHT_AT: f64 = 0.8;

/// Sum record footprints against a limit
pub fn usage<T: Footprint>(records: &[T], limit: u64) -> UsageSummary {
    let used = records.iter().map(Footprint::footprint).sum();
    summarize(used, limit)
}

/// Summary from a precomputed used total. The limit is clamped to at least 1
/// and the ratio to at most 1.
pub fn summarize(used: u64, limit: u64) -> UsageSummary {
    let limit = limit.max(1);
    let ratio = (used as f64 / limit as f64).min(1.0);
    let status = if ratio < MODERATE_AT {
        UsageStatus::Ample
    } else if ratio < TIGHT_AT {
        UsageStatus::Moderate
    } else {
        UsageStatus::Tight
    };
    UsageSummary {
        used,
        limit,
        ratio,
        status,
    }
}
