use std::fmt::Write as _;
use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};

use equipment_analytics::config::AnalyticsConfig;
use equipment_analytics::ingestion::csv::parse_equipment_csv;
use equipment_analytics::processing::aggregate;
use equipment_analytics::store::InMemoryDatasetStore;
use equipment_analytics::EquipmentAnalytics;

const TYPES: [&str; 4] = ["Pump", "Valve", "Compressor", "Heat Exchanger"];

fn synthetic_csv(rows: usize) -> Vec<u8> {
    let mut out = String::from("equipment_name,equipment_type,flowrate,pressure,temperature\n");
    for i in 0..rows {
        let _ = writeln!(
            out,
            "Unit-{i},{},{:.2},{:.2},{:.2}",
            TYPES[i % TYPES.len()],
            100.0 + (i % 37) as f64 * 1.5,
            5.0 + (i % 11) as f64 * 0.25,
            60.0 + (i % 23) as f64 * 0.75
        );
    }
    out.into_bytes()
}

fn bench_pipeline(c: &mut Criterion) {
    let csv = synthetic_csv(10_000);
    let records = parse_equipment_csv(&csv).map(|p| p.records).unwrap_or_default();

    c.bench_function("csv.parse.10k", |b| {
        b.iter(|| parse_equipment_csv(black_box(&csv)))
    });

    c.bench_function("processing.aggregate.10k", |b| {
        b.iter(|| aggregate(black_box(&records)))
    });

    let app = EquipmentAnalytics::new(
        &AnalyticsConfig::default(),
        Arc::new(InMemoryDatasetStore::new()),
    );
    c.bench_function("ingest.end_to_end.10k", |b| {
        b.iter(|| app.ingest("bench.csv", black_box(&csv)))
    });

    let small = synthetic_csv(500);
    if let Ok(outcome) = app.ingest("report.csv", &small) {
        c.bench_function("report.pdf.500", |b| b.iter(|| app.pdf(black_box(&outcome.id))));
    }
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
