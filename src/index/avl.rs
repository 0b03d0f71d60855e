use std::cmp::{max, Ordering};
use std::fmt;
use std::marker::PhantomData;

use chrono::NaiveDate;

use crate::core::error::{Error, InsertError, Result};
use crate::core::stats::{RotationCounts, TreeStats};
use crate::core::types::Record;
use crate::index::order::{ById, RecordOrder};

type Link = Option<Box<Node>>;

struct Node {
    record: Record,
    height: usize,
    size: usize,
    left: Link,
    right: Link,
}

impl Node {
    fn leaf(record: Record) -> Box<Node> {
        Box::new(Node {
            record,
            height: 1,
            size: 1,
            left: None,
            right: None,
        })
    }

    /// Recompute cached height and size from the children.
    fn update(&mut self) {
        self.height = 1 + max(height(&self.left), height(&self.right));
        self.size = 1 + size(&self.left) + size(&self.right);
    }

    /// height(right) - height(left)
    fn balance_factor(&self) -> isize {
        height(&self.right) as isize - height(&self.left) as isize
    }
}

fn height(link: &Link) -> usize {
    link.as_ref().map_or(0, |n| n.height)
}

fn size(link: &Link) -> usize {
    link.as_ref().map_or(0, |n| n.size)
}

/// AVL tree of records, ordered by the policy `O`.
///
/// Every insert and delete rebalances the whole path back to the root, so
/// the height stays within ~1.44 log2(n). Nodes are owned by their parent's
/// child slot; rotations move boxes between slots and never share them.
pub struct AvlTree<O: RecordOrder = ById> {
    root: Link,
    rotations: RotationCounts,
    _order: PhantomData<fn() -> O>,
}

impl<O: RecordOrder> Default for AvlTree<O> {
    fn default() -> Self {
        AvlTree {
            root: None,
            rotations: RotationCounts::default(),
            _order: PhantomData,
        }
    }
}

impl<O: RecordOrder> AvlTree<O> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        size(&self.root)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Height of the root, 0 for an empty tree.
    pub fn height(&self) -> usize {
        height(&self.root)
    }

    pub fn left_rotations(&self) -> u64 {
        self.rotations.left
    }

    pub fn right_rotations(&self) -> u64 {
        self.rotations.right
    }

    /// Number of rebalancing steps that rotated (single or double).
    pub fn rebalances(&self) -> u64 {
        self.rotations.rebalances
    }

    pub fn rotations(&self) -> RotationCounts {
        self.rotations
    }

    pub fn stats(&self) -> TreeStats {
        TreeStats {
            records: self.len(),
            height: self.height(),
            rotations: self.rotations,
        }
    }

    /// Insert `record`. A record comparing equal to a stored one is
    /// rejected and handed back inside the error; the tree is untouched.
    pub fn insert(&mut self, record: Record) -> std::result::Result<(), InsertError> {
        insert::<O>(&mut self.root, record, &mut self.rotations)
    }

    /// Remove the record comparing equal to `key` and return it.
    pub fn delete(&mut self, key: &Record) -> Result<Record> {
        remove::<O>(&mut self.root, key, &mut self.rotations)
            .ok_or_else(|| Error::not_found(&key.id))
    }

    pub fn contains(&self, key: &Record) -> bool {
        self.get(key).is_some()
    }

    /// The stored record comparing equal to `key`.
    pub fn get(&self, key: &Record) -> Option<&Record> {
        let mut current = self.root.as_deref();
        while let Some(node) = current {
            current = match O::compare(key, &node.record) {
                Ordering::Less => node.left.as_deref(),
                Ordering::Greater => node.right.as_deref(),
                Ordering::Equal => return Some(&node.record),
            };
        }
        None
    }

    pub fn first(&self) -> Option<&Record> {
        let mut node = self.root.as_deref()?;
        while let Some(left) = node.left.as_deref() {
            node = left;
        }
        Some(&node.record)
    }

    pub fn last(&self) -> Option<&Record> {
        let mut node = self.root.as_deref()?;
        while let Some(right) = node.right.as_deref() {
            node = right;
        }
        Some(&node.record)
    }

    /// Number of records whose start date is on or after `date`.
    ///
    /// Under a date-monotonic order this walks a single root-to-leaf path
    /// and adds whole right subtrees by their cached size. Any other order
    /// says nothing about dates, so every record is inspected.
    pub fn count_at_or_after(&self, date: NaiveDate) -> usize {
        if O::DATE_MONOTONIC {
            count_along_path(&self.root, date)
        } else {
            self.iter().filter(|r| r.starts_on_or_after(date)).count()
        }
    }

    /// Identifiers in sorted order.
    pub fn in_order(&self) -> Vec<&str> {
        self.iter().map(|r| r.id.as_str()).collect()
    }

    /// Identifiers in node, left, right order.
    pub fn pre_order(&self) -> Vec<&str> {
        fn walk<'a>(link: &'a Link, out: &mut Vec<&'a str>) {
            if let Some(node) = link {
                out.push(&node.record.id);
                walk(&node.left, out);
                walk(&node.right, out);
            }
        }
        let mut out = Vec::with_capacity(self.len());
        walk(&self.root, &mut out);
        out
    }

    /// Identifiers in left, right, node order.
    pub fn post_order(&self) -> Vec<&str> {
        fn walk<'a>(link: &'a Link, out: &mut Vec<&'a str>) {
            if let Some(node) = link {
                walk(&node.left, out);
                walk(&node.right, out);
                out.push(&node.record.id);
            }
        }
        let mut out = Vec::with_capacity(self.len());
        walk(&self.root, &mut out);
        out
    }

    /// Records in sorted order.
    pub fn iter(&self) -> Iter<'_> {
        let mut iter = Iter {
            stack: Vec::with_capacity(self.height()),
            remaining: self.len(),
        };
        iter.push_left(self.root.as_deref());
        iter
    }
}

impl<O: RecordOrder> fmt::Debug for AvlTree<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AvlTree")
            .field("order", &O::name())
            .field("len", &self.len())
            .field("height", &self.height())
            .field("rotations", &self.rotations)
            .finish()
    }
}

impl<'a, O: RecordOrder> IntoIterator for &'a AvlTree<O> {
    type Item = &'a Record;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<O: RecordOrder> Extend<Record> for AvlTree<O> {
    /// Duplicates are dropped silently.
    fn extend<I: IntoIterator<Item = Record>>(&mut self, iter: I) {
        for record in iter {
            let _ = self.insert(record);
        }
    }
}

impl<O: RecordOrder> FromIterator<Record> for AvlTree<O> {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        let mut tree = AvlTree::new();
        tree.extend(iter);
        tree
    }
}

/// In-order iterator over the records of an [`AvlTree`].
pub struct Iter<'a> {
    stack: Vec<&'a Node>,
    remaining: usize,
}

impl<'a> Iter<'a> {
    fn push_left(&mut self, mut node: Option<&'a Node>) {
        while let Some(n) = node {
            self.stack.push(n);
            node = n.left.as_deref();
        }
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Record;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.push_left(node.right.as_deref());
        self.remaining -= 1;
        Some(&node.record)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Iter<'_> {}

fn insert<O: RecordOrder>(
    slot: &mut Link,
    record: Record,
    rotations: &mut RotationCounts,
) -> std::result::Result<(), InsertError> {
    match slot {
        None => {
            *slot = Some(Node::leaf(record));
            return Ok(());
        }
        Some(node) => match O::compare(&record, &node.record) {
            Ordering::Less => insert::<O>(&mut node.left, record, rotations)?,
            Ordering::Greater => insert::<O>(&mut node.right, record, rotations)?,
            Ordering::Equal => return Err(InsertError::duplicate(record)),
        },
    }
    rebalance_slot(slot, rotations);
    Ok(())
}

fn remove<O: RecordOrder>(
    slot: &mut Link,
    key: &Record,
    rotations: &mut RotationCounts,
) -> Option<Record> {
    let node = slot.as_mut()?;
    let removed = match O::compare(key, &node.record) {
        Ordering::Less => remove::<O>(&mut node.left, key, rotations)?,
        Ordering::Greater => remove::<O>(&mut node.right, key, rotations)?,
        Ordering::Equal => {
            let mut node = slot.take()?;
            match (node.left.take(), node.right.take()) {
                (None, None) => {}
                (Some(child), None) | (None, Some(child)) => *slot = Some(child),
                (Some(left), Some(right)) => {
                    let (successor, rest) = take_min(right, rotations);
                    let removed = std::mem::replace(&mut node.record, successor);
                    node.left = Some(left);
                    node.right = rest;
                    *slot = Some(rebalance(node, rotations));
                    return Some(removed);
                }
            }
            return Some(node.record);
        }
    };
    rebalance_slot(slot, rotations);
    Some(removed)
}

/// Detach the leftmost node of `node`'s subtree. Returns its record and
/// the rebalanced remainder; the detached node's right child takes its
/// place.
fn take_min(mut node: Box<Node>, rotations: &mut RotationCounts) -> (Record, Link) {
    match node.left.take() {
        None => {
            let Node { record, right, .. } = *node;
            (record, right)
        }
        Some(left) => {
            let (min, rest) = take_min(left, rotations);
            node.left = rest;
            (min, Some(rebalance(node, rotations)))
        }
    }
}

fn count_along_path(link: &Link, date: NaiveDate) -> usize {
    let mut count = 0;
    let mut current = link.as_deref();
    while let Some(node) = current {
        if node.record.starts_on_or_after(date) {
            // Right subtree sorts after this node, so every record there
            // qualifies too.
            count += 1 + size(&node.right);
            current = node.left.as_deref();
        } else {
            current = node.right.as_deref();
        }
    }
    count
}

fn rebalance_slot(slot: &mut Link, rotations: &mut RotationCounts) {
    if let Some(node) = slot.take() {
        *slot = Some(rebalance(node, rotations));
    }
}

/// Restore the AVL invariant at `node`, whose children already satisfy it.
/// Returns the new subtree root for the caller to re-link.
fn rebalance(mut node: Box<Node>, rotations: &mut RotationCounts) -> Box<Node> {
    node.update();
    let balance = node.balance_factor();
    if balance > 1 {
        rotations.rebalances += 1;
        if node.right.as_ref().is_some_and(|r| r.balance_factor() < 0) {
            node.right = node.right.take().map(|r| rotate_right(r, rotations));
        }
        rotate_left(node, rotations)
    } else if balance < -1 {
        rotations.rebalances += 1;
        if node.left.as_ref().is_some_and(|l| l.balance_factor() > 0) {
            node.left = node.left.take().map(|l| rotate_left(l, rotations));
        }
        rotate_right(node, rotations)
    } else {
        node
    }
}

fn rotate_left(mut x: Box<Node>, rotations: &mut RotationCounts) -> Box<Node> {
    let Some(mut y) = x.right.take() else {
        return x;
    };
    x.right = y.left.take();
    x.update();
    y.left = Some(x);
    y.update();
    rotations.left += 1;
    y
}

fn rotate_right(mut y: Box<Node>, rotations: &mut RotationCounts) -> Box<Node> {
    let Some(mut x) = y.left.take() else {
        return y;
    };
    y.left = x.right.take();
    y.update();
    x.right = Some(y);
    x.update();
    rotations.right += 1;
    x
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use proptest::prelude::*;

    use super::*;
    use crate::core::error::ErrorKind;
    use crate::index::order::ByStartDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn rec(id: &str) -> Record {
        Record::new(id, "IL", None)
    }

    fn dated(id: &str, day: NaiveDate) -> Record {
        Record::new(id, "IL", Some(day))
    }

    /// Walk the whole tree and assert ordering, cached fields and balance.
    fn validate<O: RecordOrder>(tree: &AvlTree<O>) {
        fn walk<O: RecordOrder>(link: &Link) -> (usize, usize) {
            let Some(node) = link else { return (0, 0) };
            if let Some(left) = &node.left {
                assert_eq!(O::compare(&left.record, &node.record), Ordering::Less);
            }
            if let Some(right) = &node.right {
                assert_eq!(O::compare(&right.record, &node.record), Ordering::Greater);
            }
            let (lh, ls) = walk::<O>(&node.left);
            let (rh, rs) = walk::<O>(&node.right);
            assert_eq!(node.height, 1 + max(lh, rh), "stale height at {}", node.record.id);
            assert_eq!(node.size, 1 + ls + rs, "stale size at {}", node.record.id);
            assert!((rh as isize - lh as isize).abs() <= 1, "unbalanced at {}", node.record.id);
            (node.height, node.size)
        }
        walk::<O>(&tree.root);

        // Child checks alone miss grandchildren on the wrong side.
        let records: Vec<&Record> = tree.iter().collect();
        for pair in records.windows(2) {
            assert_eq!(O::compare(pair[0], pair[1]), Ordering::Less);
        }
        assert_eq!(records.len(), tree.len());
    }

    #[test]
    fn empty_tree() {
        let tree: AvlTree = AvlTree::new();
        assert!(tree.is_empty());
        assert_eq!(tree.height(), 0);
        assert!(tree.in_order().is_empty());
        assert!(tree.pre_order().is_empty());
        assert!(tree.post_order().is_empty());
        assert_eq!(tree.count_at_or_after(date(2024, 1, 1)), 0);
        assert!(tree.first().is_none());
    }

    #[test]
    fn right_left_case_rotates_once() {
        let mut tree: AvlTree = AvlTree::new();
        for id in ["1", "3", "2"] {
            tree.insert(rec(id)).unwrap();
        }

        assert_eq!(tree.rebalances(), 1);
        assert_eq!(tree.right_rotations(), 1);
        assert_eq!(tree.left_rotations(), 1);
        assert_eq!(tree.pre_order(), vec!["2", "1", "3"]);
        validate(&tree);
    }

    #[test]
    fn left_left_case_is_single_right_rotation() {
        let mut tree: AvlTree = AvlTree::new();
        for id in ["c", "b", "a"] {
            tree.insert(rec(id)).unwrap();
        }

        assert_eq!(tree.rebalances(), 1);
        assert_eq!(tree.right_rotations(), 1);
        assert_eq!(tree.left_rotations(), 0);
        assert_eq!(tree.pre_order(), vec!["b", "a", "c"]);
    }

    #[test]
    fn traversal_orders() {
        let tree: AvlTree = ["d", "b", "f", "a", "c", "e", "g"]
            .into_iter()
            .map(rec)
            .collect();

        assert_eq!(tree.in_order(), vec!["a", "b", "c", "d", "e", "f", "g"]);
        assert_eq!(tree.pre_order(), vec!["d", "b", "a", "c", "f", "e", "g"]);
        assert_eq!(tree.post_order(), vec!["a", "c", "b", "e", "g", "f", "d"]);
        assert_eq!(tree.first().map(Record::id), Some("a"));
        assert_eq!(tree.last().map(Record::id), Some("g"));
        assert_eq!(tree.iter().len(), 7);
    }

    #[test]
    fn duplicate_is_rejected_and_returned() {
        let mut tree: AvlTree = AvlTree::new();
        tree.insert(rec("a")).unwrap();
        tree.insert(rec("b")).unwrap();
        let before = (tree.pre_order().join(","), tree.rotations());

        let mut again = rec("a");
        again.city = "Peoria".to_string();
        let err = tree.insert(again).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DuplicateKey);
        assert_eq!(err.record.city, "Peoria");
        assert_eq!(tree.len(), 2);
        assert_eq!((tree.pre_order().join(","), tree.rotations()), before);
        // Original kept.
        assert_eq!(tree.get(&rec("a")).map(|r| r.city.as_str()), Some(""));
    }

    #[test]
    fn delete_missing_key_reports_not_found() {
        let mut tree: AvlTree = ["a", "b"].into_iter().map(rec).collect();
        let err = tree.delete(&rec("z")).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(tree.len(), 2);

        let mut empty: AvlTree = AvlTree::new();
        assert!(empty.delete(&rec("a")).unwrap_err().is_not_found());
    }

    #[test]
    fn delete_leaf_and_single_child() {
        let mut tree: AvlTree = ["b", "a", "c", "d"].into_iter().map(rec).collect();
        // c has a single right child d.
        assert_eq!(tree.delete(&rec("c")).unwrap().id, "c");
        assert_eq!(tree.in_order(), vec!["a", "b", "d"]);
        validate(&tree);

        assert_eq!(tree.delete(&rec("a")).unwrap().id, "a");
        assert_eq!(tree.in_order(), vec!["b", "d"]);
        validate(&tree);
    }

    #[test]
    fn delete_two_children_reattaches_successor_right_child() {
        let mut tree: AvlTree = ["d", "b", "g", "a", "c", "e", "h", "f"]
            .into_iter()
            .map(rec)
            .collect();
        // Shape: d(b(a,c), g(e(-,f), h)); successor of d is e, whose right
        // child f must move up into e's old slot.
        assert_eq!(tree.pre_order(), vec!["d", "b", "a", "c", "g", "e", "f", "h"]);

        let removed = tree.delete(&rec("d")).unwrap();
        assert_eq!(removed.id, "d");
        assert_eq!(tree.pre_order(), vec!["e", "b", "a", "c", "g", "f", "h"]);
        assert!(tree.contains(&rec("f")));
        assert!(!tree.contains(&rec("d")));
        validate(&tree);
    }

    #[test]
    fn delete_rebalances_up_the_path() {
        let mut tree: AvlTree = ["c", "b", "d", "a"].into_iter().map(rec).collect();
        let rotations = tree.rotations();
        tree.delete(&rec("d")).unwrap();

        // Removing d leaves c left-heavy by two.
        assert_eq!(tree.rebalances(), rotations.rebalances + 1);
        assert_eq!(tree.pre_order(), vec!["b", "a", "c"]);
        validate(&tree);
    }

    #[test]
    fn sequential_inserts_stay_logarithmic() {
        let tree: AvlTree = (0..1024).map(|i| rec(&format!("{:05}", i))).collect();
        assert_eq!(tree.len(), 1024);
        // 1.44 * log2(1024) bound
        assert!(tree.height() <= 14, "height {}", tree.height());
        validate(&tree);
    }

    #[test]
    fn count_scenario_by_id_and_by_date() {
        let records = vec![
            dated("A", date(2024, 1, 1)),
            dated("B", date(2024, 1, 5)),
            dated("C", date(2024, 1, 3)),
            dated("D", date(2024, 1, 10)),
        ];
        let by_id: AvlTree<ById> = records.iter().cloned().collect();
        let by_date: AvlTree<ByStartDate> = records.into_iter().collect();

        for (query, expected) in [
            (date(2023, 12, 31), 4),
            (date(2024, 1, 3), 3),
            (date(2024, 1, 4), 2),
            (date(2024, 1, 10), 1),
            (date(2024, 1, 11), 0),
        ] {
            assert_eq!(by_id.count_at_or_after(query), expected, "by id, {}", query);
            assert_eq!(by_date.count_at_or_after(query), expected, "by date, {}", query);
        }
    }

    #[test]
    fn undated_records_never_count() {
        let tree: AvlTree<ByStartDate> = vec![
            Record::new("u1", "IL", None),
            dated("a", date(2024, 3, 1)),
            Record::new("u2", "IL", None),
        ]
        .into_iter()
        .collect();

        assert_eq!(tree.first().map(Record::id), Some("u1"));
        assert_eq!(tree.count_at_or_after(date(1970, 1, 1)), 1);
    }

    #[test]
    fn same_day_records_coexist_under_date_order() {
        let day = date(2024, 2, 2);
        let mut tree: AvlTree<ByStartDate> = AvlTree::new();
        tree.insert(dated("x", day)).unwrap();
        tree.insert(dated("y", day)).unwrap();
        assert!(tree.insert(dated("x", day)).is_err());
        assert_eq!(tree.count_at_or_after(day), 2);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Insert(u8, Option<u8>),
        Delete(u8, Option<u8>),
    }

    fn arbitrary_record() -> impl Strategy<Value = (u8, Option<u8>)> {
        // Small domains so operations collide on ids and dates.
        (0u8..64, proptest::option::weighted(0.9, 0u8..28))
    }

    fn arbitrary_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => arbitrary_record().prop_map(|(id, day)| Op::Insert(id, day)),
            1 => arbitrary_record().prop_map(|(id, day)| Op::Delete(id, day)),
        ]
    }

    fn make(id: u8, day: Option<u8>) -> Record {
        Record::new(
            format!("A-{:03}", id),
            "IL",
            day.map(|d| date(2024, 2, d as u32 + 1)),
        )
    }

    /// Run `ops` against a tree and a model keyed the same way.
    fn check_against_model<O: RecordOrder, K: Ord>(ops: &[Op], key: impl Fn(&Record) -> K) {
        let mut tree: AvlTree<O> = AvlTree::new();
        let mut model: BTreeMap<K, Record> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(id, day) => {
                    let record = make(*id, *day);
                    let k = key(&record);
                    let was_new = !model.contains_key(&k);
                    assert_eq!(tree.insert(record.clone()).is_ok(), was_new);
                    model.entry(k).or_insert(record);
                }
                Op::Delete(id, day) => {
                    let record = make(*id, *day);
                    let expected = model.remove(&key(&record));
                    let got = tree.delete(&record).ok();
                    assert_eq!(got, expected);
                }
            }
            assert_eq!(tree.len(), model.len());
        }

        validate(&tree);
        let ids: Vec<&str> = model.values().map(|r| r.id.as_str()).collect();
        assert_eq!(tree.in_order(), ids);

        for day in 0..30u32 {
            let query = date(2024, 2, 1) + chrono::Days::new(day as u64);
            let expected = model.values().filter(|r| r.starts_on_or_after(query)).count();
            assert_eq!(tree.count_at_or_after(query), expected);
        }
    }

    proptest! {
        #[test]
        fn prop_by_id_matches_model(ops in prop::collection::vec(arbitrary_op(), 0..200)) {
            check_against_model::<ById, _>(&ops, |r| r.id.clone());
        }

        #[test]
        fn prop_by_date_matches_model(ops in prop::collection::vec(arbitrary_op(), 0..200)) {
            check_against_model::<ByStartDate, _>(&ops, |r| (r.start_time, r.id.clone()));
        }

        /// Inserting every record twice builds the same shape as once.
        #[test]
        fn prop_duplicate_insert_is_idempotent(
            records in prop::collection::vec(arbitrary_record(), 0..100),
        ) {
            let mut once: AvlTree = AvlTree::new();
            let mut twice: AvlTree = AvlTree::new();
            for (id, day) in &records {
                let _ = once.insert(make(*id, *day));
                let _ = twice.insert(make(*id, *day));
                prop_assert!(twice.insert(make(*id, *day)).is_err());
            }
            prop_assert_eq!(once.pre_order(), twice.pre_order());
            prop_assert_eq!(once.in_order(), twice.in_order());
        }
    }
}
