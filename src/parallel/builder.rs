use std::collections::BTreeMap;

use csv::StringRecord;
use rayon::prelude::*;
use tracing::debug;

use crate::core::error::{Error, ErrorKind, InsertError, Result};
use crate::core::stats::IngestStats;
use crate::core::types::Record;
use crate::index::avl::AvlTree;
use crate::index::order::RecordOrder;
use crate::ingest::parser::{line_of, parse_row};

/// Parses lines and builds per-category trees on a dedicated rayon pool.
///
/// Trees never reference each other, so each category is built by one
/// worker, in input order. The result is identical to a sequential build.
pub struct ParallelBuilder {
    pub workers: usize,
    pub batch_size: usize,
    pool: rayon::ThreadPool,
}

impl ParallelBuilder {
    pub fn new(workers: usize, batch_size: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("accidex-build-{}", i))
            .build()
            .map_err(|e| Error::new(ErrorKind::Internal, format!("thread pool: {}", e)))?;

        Ok(ParallelBuilder {
            workers: workers.max(1),
            batch_size: batch_size.max(1),
            pool,
        })
    }

    /// Map rows to records in batches. Results keep input order; errors
    /// carry the source line number of their row.
    pub fn parse_rows(&self, rows: &[StringRecord]) -> Vec<Result<Record>> {
        let batch_size = self.batch_size;
        self.pool.install(|| {
            rows.par_chunks(batch_size)
                .enumerate()
                .flat_map_iter(|(batch, chunk)| {
                    debug!(batch, rows = chunk.len(), "parsing batch");
                    chunk.iter().map(|row| {
                        parse_row(row).map_err(|e| Error::malformed(line_of(row), e.context))
                    })
                })
                .collect()
        })
    }

    /// Build one tree per category.
    pub fn build_trees<O: RecordOrder>(
        &self,
        groups: BTreeMap<String, Vec<Record>>,
    ) -> Vec<(String, AvlTree<O>, IngestStats)> {
        self.pool.install(|| {
            groups
                .into_par_iter()
                .map(|(category, records)| {
                    let (tree, stats) = build_tree::<O>(records);
                    debug!(category = %category, records = tree.len(), "category built");
                    (category, tree, stats)
                })
                .collect()
        })
    }
}

/// Insert `records` in order into a fresh tree, counting what happened.
pub fn build_tree<O: RecordOrder>(records: Vec<Record>) -> (AvlTree<O>, IngestStats) {
    let mut tree = AvlTree::new();
    let mut stats = IngestStats::default();
    for record in records {
        let dated = record.is_dated();
        tally(tree.insert(record), dated, &mut stats);
    }
    (tree, stats)
}

/// Fold one insert outcome into `stats`.
pub(crate) fn tally(
    outcome: std::result::Result<(), InsertError>,
    dated: bool,
    stats: &mut IngestStats,
) {
    match outcome {
        Ok(()) => {
            stats.inserted += 1;
            if !dated {
                stats.undated += 1;
            }
        }
        Err(err) => {
            stats.duplicates += 1;
            debug!(id = %err.record.id, state = %err.record.state, "duplicate record skipped");
        }
    }
}
