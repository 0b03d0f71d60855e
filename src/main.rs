use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use accidex::ingest::parse_query_date;
use accidex::{
    ById, ByStartDate, Config, Error, ErrorKind, IndexStats, IngestStats, Loader, RecordOrder, Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Order {
    /// Identifier order; date counts scan every record
    Id,
    /// Start date, then identifier; date counts follow one path
    Date,
}

/// Build per-state AVL indexes of accident reports and count the reports
/// on and after a date.
#[derive(Debug, Parser)]
#[command(name = "accidex", version)]
struct Args {
    /// CSV file of reports; the first line is a header
    file: PathBuf,

    /// State to query, e.g. IL
    state: String,

    /// Query date, yyyy-MM-dd
    date: String,

    /// Key order of the trees
    #[arg(long, value_enum, default_value_t = Order::Id)]
    order: Order,

    /// Build on the calling thread only
    #[arg(long)]
    sequential: bool,

    /// Fail on the first malformed line instead of skipping it
    #[arg(long)]
    strict: bool,

    /// Loader threads (default: one per CPU)
    #[arg(long)]
    workers: Option<usize>,

    /// Print a JSON report instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct Report<'a> {
    state: &'a str,
    date: String,
    count: usize,
    build_seconds: f64,
    query_seconds: f64,
    ingest: IngestStats,
    index: IndexStats,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut stdout = std::io::stdout().lock();
    let outcome = match args.order {
        Order::Id => run::<ById>(&args, &mut stdout),
        Order::Date => run::<ByStartDate>(&args, &mut stdout),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "accidex failed");
            ExitCode::FAILURE
        }
    }
}

fn config_for(args: &Args) -> Result<Config> {
    let mut config = if args.sequential {
        Config::sequential()
    } else {
        Config::default()
    };
    if args.strict {
        config = config.strict();
    }
    match args.workers {
        Some(0) => {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                "--workers must be at least 1".to_string(),
            ));
        }
        Some(workers) => config.workers = workers,
        None => {}
    }
    Ok(config)
}

fn run<O: RecordOrder>(args: &Args, out: &mut impl Write) -> Result<()> {
    let date = parse_query_date(&args.date)?;
    let config = config_for(args)?;

    let started = Instant::now();
    let (index, ingest) = Loader::new(config).load_path::<O>(&args.file)?;
    let build = started.elapsed();

    if index.tree(&args.state).is_none() {
        warn!(state = %args.state, "no reports indexed for state");
    }

    let started = Instant::now();
    let count = index.count_at_or_after(&args.state, date);
    let query = started.elapsed();

    if args.json {
        let report = Report {
            state: &args.state,
            date: date.to_string(),
            count,
            build_seconds: build.as_secs_f64(),
            query_seconds: query.as_secs_f64(),
            ingest,
            index: index.stats(),
        };
        writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
        return Ok(());
    }

    writeln!(out, "{:.4} Seconds to build the AVL trees", build.as_secs_f64())?;
    writeln!(out, "Total number of left rotations in all AVL trees: {}", index.left_rotations())?;
    writeln!(out, "Total number of right rotations in all AVL trees: {}", index.right_rotations())?;
    writeln!(
        out,
        "{} Reports are available for {} on and after the date {}",
        count, args.state, args.date
    )?;
    writeln!(out, "{:.6} Seconds to calculate the number of reports", query.as_secs_f64())?;
    Ok(())
}
