//! Performance benchmarks for models and collections.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tracked_model::{Collection, FieldDef, Key, Model, Schema, Value};

static ROW: Schema = Schema {
    name: "Row",
    fields: &[
        FieldDef {
            name: "label",
            default: || Value::from(""),
        },
        FieldDef {
            name: "count",
            default: || Value::Int(0),
        },
    ],
};

static TABLE: Schema = Schema {
    name: "Table",
    fields: &[FieldDef {
        name: "rows",
        default: || Value::Collection(Collection::new()),
    }],
};

fn filled(size: usize) -> Collection {
    let collection = Collection::new();
    for i in 0..size {
        collection.add(&Model::new(&ROW, i as i64)).unwrap();
    }
    collection
}

/// Benchmark appending members
fn bench_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("add");

    for size in [100, 1000, 5000] {
        group.bench_with_input(BenchmarkId::new("members", size), &size, |b, &size| {
            b.iter(|| black_box(filled(size)));
        });
    }

    group.finish();
}

/// Benchmark key lookup against collection size
fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup");

    for size in [100, 1000, 10000] {
        let collection = filled(size);
        let key = Key::Int((size / 2) as i64);

        group.bench_with_input(BenchmarkId::new("members", size), &size, |b, _| {
            b.iter(|| black_box(collection.get(&key).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark moves, which rebuild the index
fn bench_move(c: &mut Criterion) {
    let mut group = c.benchmark_group("move");

    for size in [100, 1000] {
        let collection = filled(size);

        group.bench_with_input(BenchmarkId::new("members", size), &size, |b, &size| {
            b.iter(|| {
                collection.move_at(0, size as isize).unwrap();
            });
        });
    }

    group.finish();
}

/// Benchmark a field change bubbling through a nested collection
fn bench_cascade(c: &mut Criterion) {
    let table = Model::new(&TABLE, "t");
    let rows = table.get("rows").unwrap().as_collection().unwrap().clone();
    for i in 0..100 {
        rows.add(&Model::new(&ROW, i)).unwrap();
    }
    let row = rows.at(50).unwrap();

    c.bench_function("cascade_set", |b| {
        b.iter(|| {
            row.set("count", black_box(1)).unwrap();
            table.persist();
        });
    });
}

criterion_group!(benches, bench_add, bench_lookup, bench_move, bench_cascade);
criterion_main!(benches);
