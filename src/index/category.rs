use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::debug;

use crate::core::error::{Error, InsertError, Result};
use crate::core::stats::{IndexStats, RotationCounts};
use crate::core::types::Record;
use crate::index::avl::AvlTree;
use crate::index::order::{ById, RecordOrder};

/// One [`AvlTree`] per category (state), created on first insert.
///
/// Trees are only reachable through this type; callers get shared
/// references for diagnostics and go through the index for every mutation.
pub struct CategoryIndex<O: RecordOrder = ById> {
    trees: BTreeMap<String, AvlTree<O>>,
}

impl<O: RecordOrder> Default for CategoryIndex<O> {
    fn default() -> Self {
        CategoryIndex {
            trees: BTreeMap::new(),
        }
    }
}

impl<O: RecordOrder> CategoryIndex<O> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, category: &str, record: Record) -> std::result::Result<(), InsertError> {
        self.tree_mut(category).insert(record)
    }

    /// Index `record` under its own state.
    pub fn insert_record(&mut self, record: Record) -> std::result::Result<(), InsertError> {
        let category = record.state.clone();
        self.insert(&category, record)
    }

    pub fn delete(&mut self, category: &str, key: &Record) -> Result<Record> {
        match self.trees.get_mut(category) {
            Some(tree) => tree.delete(key),
            None => Err(Error::not_found(&key.id)),
        }
    }

    pub fn contains(&self, category: &str, key: &Record) -> bool {
        self.trees
            .get(category)
            .is_some_and(|tree| tree.contains(key))
    }

    /// Records in `category` starting on or after `date`; 0 for an unknown
    /// category.
    pub fn count_at_or_after(&self, category: &str, date: NaiveDate) -> usize {
        self.trees
            .get(category)
            .map_or(0, |tree| tree.count_at_or_after(date))
    }

    pub fn tree(&self, category: &str) -> Option<&AvlTree<O>> {
        self.trees.get(category)
    }

    /// Drop a whole category, returning its tree.
    pub fn remove_category(&mut self, category: &str) -> Option<AvlTree<O>> {
        self.trees.remove(category)
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> + '_ {
        self.trees.keys().map(String::as_str)
    }

    pub fn category_count(&self) -> usize {
        self.trees.len()
    }

    /// Total records across all categories.
    pub fn len(&self) -> usize {
        self.trees.values().map(AvlTree::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.values().all(AvlTree::is_empty)
    }

    pub fn rotations(&self) -> RotationCounts {
        let mut total = RotationCounts::default();
        for tree in self.trees.values() {
            total += tree.rotations();
        }
        total
    }

    pub fn left_rotations(&self) -> u64 {
        self.rotations().left
    }

    pub fn right_rotations(&self) -> u64 {
        self.rotations().right
    }

    pub fn rebalances(&self) -> u64 {
        self.rotations().rebalances
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            order: O::name().to_string(),
            categories: self.trees.len(),
            records: self.len(),
            rotations: self.rotations(),
            per_category: self
                .trees
                .iter()
                .map(|(category, tree)| (category.clone(), tree.stats()))
                .collect(),
        }
    }

    /// Install a tree built elsewhere. Used by the parallel loader, which
    /// builds each category on its own thread.
    pub(crate) fn adopt(&mut self, category: String, tree: AvlTree<O>) {
        self.trees.insert(category, tree);
    }

    fn tree_mut(&mut self, category: &str) -> &mut AvlTree<O> {
        self.trees.entry(category.to_string()).or_insert_with(|| {
            debug!(category, order = O::name(), "creating tree for new category");
            AvlTree::new()
        })
    }
}

impl<O: RecordOrder> std::fmt::Debug for CategoryIndex<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.trees.iter()).finish()
    }
}
