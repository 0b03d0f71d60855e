use std::cmp::Ordering;

use crate::core::types::Record;

/// Total order used to position records inside an [`AvlTree`].
///
/// Two records comparing `Equal` are the same key: the second insert is
/// rejected as a duplicate.
///
/// [`AvlTree`]: crate::index::avl::AvlTree
pub trait RecordOrder {
    /// Set when an in-order walk visits records by non-decreasing start
    /// date, with undated records first. Date queries may prune subtrees
    /// only under such an order.
    const DATE_MONOTONIC: bool;

    fn compare(a: &Record, b: &Record) -> Ordering;

    fn name() -> &'static str;
}

/// Identifier order. Dates play no part, so date counts scan every node.
#[derive(Debug, Clone, Copy, Default)]
pub struct ById;

impl RecordOrder for ById {
    const DATE_MONOTONIC: bool = false;

    fn compare(a: &Record, b: &Record) -> Ordering {
        a.id.cmp(&b.id)
    }

    fn name() -> &'static str {
        "id"
    }
}

/// Start date first, identifier as tie-break.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByStartDate;

impl RecordOrder for ByStartDate {
    const DATE_MONOTONIC: bool = true;

    fn compare(a: &Record, b: &Record) -> Ordering {
        // None < Some(_): undated records sit at the far left.
        a.start_time
            .cmp(&b.start_time)
            .then_with(|| a.id.cmp(&b.id))
    }

    fn name() -> &'static str {
        "date"
    }
}
