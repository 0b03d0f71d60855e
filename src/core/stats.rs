use std::collections::BTreeMap;
use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

/// Rotation counters kept by every tree.
///
/// A double rotation counts once in `rebalances` and once in each of
/// `left` and `right`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationCounts {
    pub left: u64,
    pub right: u64,
    pub rebalances: u64,
}

impl AddAssign for RotationCounts {
    fn add_assign(&mut self, other: Self) {
        self.left += other.left;
        self.right += other.right;
        self.rebalances += other.rebalances;
    }
}

/// Snapshot of a single tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeStats {
    pub records: usize,
    pub height: usize,
    pub rotations: RotationCounts,
}

/// Snapshot of a whole category index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexStats {
    pub order: String,
    pub categories: usize,
    pub records: usize,
    pub rotations: RotationCounts,
    pub per_category: BTreeMap<String, TreeStats>,
}

/// Outcome of one load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStats {
    pub lines: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub malformed: usize,
    /// Inserted records whose start timestamp did not parse.
    pub undated: usize,
}

impl AddAssign for IngestStats {
    fn add_assign(&mut self, other: Self) {
        self.lines += other.lines;
        self.inserted += other.inserted;
        self.duplicates += other.duplicates;
        self.malformed += other.malformed;
        self.undated += other.undated;
    }
}
