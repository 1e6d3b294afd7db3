//! This bench test simulates reconciling a large external table against an
//! already-populated request collection.

#![allow(missing_docs)]

use std::fmt::Write;

use chrono::{NaiveDate, Utc};
use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use encore::{Draft, Format, Request, reconcile};

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
}

/// Builds a CSV payload; row `i` carries the same dedupe key as `existing`'s
/// record `i`, so seeding 500 records makes half the rows duplicates.
fn payload(rows: usize) -> String {
    let mut table = String::from("Student Name,Song Title,Artist,Date Requested,Cost\n");
    for i in 0..rows {
        let _ = writeln!(table, "Student {i},Song {i},Band {},2024-01-15,12.5", i % 50);
    }
    table
}

fn existing(count: usize) -> Vec<Request> {
    (0..count)
        .map(|i| {
            let draft = Draft {
                student_name: format!("Student {i}"),
                song_title: format!("Song {i}"),
                artist: format!("Band {}", i % 50),
                ..Draft::default()
            };
            Request::create(draft, date(), Utc::now()).unwrap()
        })
        .collect()
}

fn import_many(c: &mut Criterion) {
    let table = payload(1_000);
    let records = existing(500);

    c.bench_function("import 1000 rows over 500 existing", |b| {
        b.iter_batched(
            || (table.clone(), records.clone()),
            |(table, records)| reconcile::import(Format::Csv, &table, &records, date(), Utc::now()),
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, import_many);
criterion_main!(benches);
