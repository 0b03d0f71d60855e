pub mod core;
pub mod index;
pub mod ingest;
pub mod parallel;

pub use crate::core::config::{Config, MalformedPolicy};
pub use crate::core::error::{Error, ErrorKind, InsertError, Result};
pub use crate::core::stats::{IndexStats, IngestStats, RotationCounts, TreeStats};
pub use crate::core::types::Record;
pub use crate::index::{AvlTree, ById, ByStartDate, CategoryIndex, RecordOrder};
pub use crate::ingest::Loader;

/*
┌──────────────────────────────────── ACCIDEX LAYOUT ────────────────────────────────────┐
│                                                                                        │
│   csv rows ──────► ingest::parser::parse_row ───► Record                               │
│                         │  (date::parse_timestamp, bad dates become None)              │
│                         ▼                                                              │
│   ingest::Loader ── sequential ──► CategoryIndex::insert_record                        │
│        │                                                                               │
│        └─ parallel ──► parallel::ParallelBuilder                                       │
│                          parse batches on rayon, group by state,                       │
│                          build one AvlTree per state, CategoryIndex::adopt             │
│                                                                                        │
│   ┌──────────────────────── CategoryIndex<O> ────────────────────────┐                 │
│   │ trees: BTreeMap<String, AvlTree<O>>      // created lazily        │                │
│   └──────────────────────────────┬───────────────────────────────────┘                 │
│                                  ▼                                                     │
│   ┌──────────────────────── AvlTree<O: RecordOrder> ─────────────────┐                 │
│   │ root: Option<Box<Node>>                                          │                 │
│   │ rotations: RotationCounts                // left, right, rebal.  │                 │
│   │                                                                  │                 │
│   │ Node { record, height, size, left, right }                       │                 │
│   └──────────────────────────────────────────────────────────────────┘                 │
│                                                                                        │
│   RecordOrder: ById (identifier only, counts scan the tree)                            │
│                ByStartDate (date then id, counts follow one path)                      │
│                                                                                        │
└────────────────────────────────────────────────────────────────────────────────────────┘
*/
