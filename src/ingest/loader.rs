use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use csv::StringRecord;
use tracing::{info, warn};

use crate::core::config::{Config, MalformedPolicy};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::stats::IngestStats;
use crate::core::types::Record;
use crate::index::category::CategoryIndex;
use crate::index::order::RecordOrder;
use crate::ingest::parser::{line_of, parse_row};
use crate::parallel::builder::{tally, ParallelBuilder};

/// Reads report rows and routes every record into a [`CategoryIndex`]
/// under its state.
pub struct Loader {
    config: Config,
}

impl Loader {
    pub fn new(config: Config) -> Self {
        Loader { config }
    }

    pub fn load_path<O: RecordOrder>(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<(CategoryIndex<O>, IngestStats)> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| Error::new(ErrorKind::Io, format!("{}: {}", path.display(), e)))?;
        info!(path = %path.display(), "loading reports");
        self.load_reader(BufReader::new(file))
    }

    pub fn load_reader<O: RecordOrder, R: Read>(
        &self,
        reader: R,
    ) -> Result<(CategoryIndex<O>, IngestStats)> {
        let mut index = CategoryIndex::new();
        let stats = if self.config.parallel_build {
            let mut stats = IngestStats::default();
            let rows = self.read_rows(reader, &mut stats)?;
            stats += self.load_parallel(&mut index, &rows)?;
            stats
        } else {
            self.ingest_into(&mut index, reader)?
        };

        info!(
            order = O::name(),
            categories = index.category_count(),
            inserted = stats.inserted,
            duplicates = stats.duplicates,
            malformed = stats.malformed,
            undated = stats.undated,
            "index built"
        );
        Ok((index, stats))
    }

    /// Parse and insert rows one at a time into an existing index.
    pub fn ingest_into<O: RecordOrder, R: Read>(
        &self,
        index: &mut CategoryIndex<O>,
        reader: R,
    ) -> Result<IngestStats> {
        let mut stats = IngestStats::default();
        for row in self.csv_reader(reader).into_records() {
            stats.lines += 1;
            let parsed = match row {
                Ok(row) => parse_row(&row).map_err(|e| Error::malformed(line_of(&row), e.context)),
                Err(e) => Err(self.read_error(e)?),
            };
            let Some(record) = self.apply_policy(parsed, &mut stats)? else {
                continue;
            };
            let dated = record.is_dated();
            tally(index.insert_record(record), dated, &mut stats);
        }
        Ok(stats)
    }

    fn csv_reader<R: Read>(&self, reader: R) -> csv::Reader<R> {
        csv::ReaderBuilder::new()
            .has_headers(self.config.skip_header)
            .flexible(true)
            .from_reader(reader)
    }

    /// Collect raw rows. Rows the CSV layer rejects go through the
    /// malformed policy here; I/O failures always abort.
    fn read_rows<R: Read>(&self, reader: R, stats: &mut IngestStats) -> Result<Vec<StringRecord>> {
        let mut rows = Vec::new();
        for row in self.csv_reader(reader).into_records() {
            match row {
                Ok(row) => rows.push(row),
                Err(e) => {
                    stats.lines += 1;
                    self.apply_policy(Err(self.read_error(e)?), stats)?;
                }
            }
        }
        Ok(rows)
    }

    /// I/O errors pass through as `Err`; anything else becomes a malformed
    /// line error for the policy to judge.
    fn read_error(&self, err: csv::Error) -> Result<Error> {
        if err.is_io_error() {
            return Err(Error::from(err));
        }
        Ok(match err.position() {
            Some(pos) => Error::malformed(pos.line() as usize, &err),
            None => Error::from(err),
        })
    }

    fn load_parallel<O: RecordOrder>(
        &self,
        index: &mut CategoryIndex<O>,
        rows: &[StringRecord],
    ) -> Result<IngestStats> {
        let builder = ParallelBuilder::new(self.config.workers, self.config.batch_size)?;
        let mut stats = IngestStats::default();

        // Group by state, keeping input order inside each group so every tree
        // sees the same insert sequence as a sequential load.
        let mut groups: BTreeMap<String, Vec<Record>> = BTreeMap::new();
        for parsed in builder.parse_rows(rows) {
            stats.lines += 1;
            if let Some(record) = self.apply_policy(parsed, &mut stats)? {
                groups.entry(record.state.clone()).or_default().push(record);
            }
        }

        for (category, tree, tree_stats) in builder.build_trees::<O>(groups) {
            stats += tree_stats;
            index.adopt(category, tree);
        }
        Ok(stats)
    }

    fn apply_policy(&self, parsed: Result<Record>, stats: &mut IngestStats) -> Result<Option<Record>> {
        match parsed {
            Ok(record) => Ok(Some(record)),
            Err(err) => match self.config.malformed_policy {
                MalformedPolicy::Abort => Err(err),
                MalformedPolicy::Skip => {
                    stats.malformed += 1;
                    warn!(error = %err, "skipping malformed line");
                    Ok(None)
                }
            },
        }
    }
}

impl Default for Loader {
    fn default() -> Self {
        Loader::new(Config::default())
    }
}
