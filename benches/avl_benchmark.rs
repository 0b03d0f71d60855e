use accidex::{AvlTree, ById, ByStartDate, Record, RecordOrder};
use chrono::{Days, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::Rng;

/// Helper to create random reports spread over ~5 years
fn create_records(count: usize) -> Vec<Record> {
    let mut rng = rand::thread_rng();
    let base = NaiveDate::from_ymd_opt(2016, 1, 1).unwrap();
    (0..count)
        .map(|i| {
            let offset = rng.gen_range(0..1800u64);
            Record::new(format!("A-{}", i), "IL", base.checked_add_days(Days::new(offset)))
        })
        .collect()
}

fn build<O: RecordOrder>(records: &[Record]) -> AvlTree<O> {
    records.iter().cloned().collect()
}

/// Benchmark building a tree record by record
fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");

    for size in [1_000, 10_000, 100_000].iter() {
        let records = create_records(*size);
        group.bench_with_input(BenchmarkId::new("by_id", size), &records, |b, records| {
            b.iter(|| black_box(build::<ById>(records)));
        });
        group.bench_with_input(BenchmarkId::new("by_date", size), &records, |b, records| {
            b.iter(|| black_box(build::<ByStartDate>(records)));
        });
    }

    group.finish();
}

/// Benchmark the at-or-after count under both orders
fn bench_count(c: &mut Criterion) {
    let mut group = c.benchmark_group("count_at_or_after");
    let query = NaiveDate::from_ymd_opt(2018, 6, 1).unwrap();

    for size in [1_000, 10_000, 100_000].iter() {
        let records = create_records(*size);
        let by_id = build::<ById>(&records);
        let by_date = build::<ByStartDate>(&records);

        group.bench_with_input(BenchmarkId::new("scan_by_id", size), &by_id, |b, tree| {
            b.iter(|| black_box(tree.count_at_or_after(black_box(query))));
        });
        group.bench_with_input(BenchmarkId::new("path_by_date", size), &by_date, |b, tree| {
            b.iter(|| black_box(tree.count_at_or_after(black_box(query))));
        });
    }

    group.finish();
}

/// Benchmark delete + reinsert of existing keys
fn bench_delete(c: &mut Criterion) {
    let records = create_records(10_000);
    let mut tree = build::<ById>(&records);
    let mut rng = rand::thread_rng();

    c.bench_function("delete_reinsert_10k", |b| {
        b.iter(|| {
            let victim = &records[rng.gen_range(0..records.len())];
            let removed = tree.delete(victim).unwrap();
            tree.insert(removed).unwrap();
        });
    });
}

criterion_group!(benches, bench_insert, bench_count, bench_delete);
criterion_main!(benches);
