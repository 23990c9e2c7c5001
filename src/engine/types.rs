use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

// Spread derived from one top-of-book observation.
// Field names on the wire match what the web front-end reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SpreadRecord {
    pub symbol: String,
    pub best_bid: f64,
    pub best_ask: f64,
    pub spread_percent: f64,
    pub absolute_diff: f64,
    pub volume_24h: f64,
    pub last_update: DateTime<Utc>,
}

impl SpreadRecord {
    /// Ranking used for distribution: widest spread first, then symbol.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        OrderedFloat(other.spread_percent)
            .cmp(&OrderedFloat(self.spread_percent))
            .then_with(|| self.symbol.cmp(&other.symbol))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SpreadOutcome {
    Valid(SpreadRecord),
    NotComputable,
}

/// Ranked copy of every live record at one emission tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DistributionSnapshot {
    pub records: Vec<SpreadRecord>,
}

impl DistributionSnapshot {
    pub fn ranked(mut records: Vec<SpreadRecord>) -> Self {
        records.sort_by(SpreadRecord::rank_cmp);
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn symbols(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.symbol.as_str()).collect()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
