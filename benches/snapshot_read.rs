//! Benchmarks for snapshot acquisition and typed reads
//!
//! Tests:
//! - Seqlock copy of one buffer slot at several buffer lengths
//! - Typed scalar and array reads from a copied snapshot
//! - Header parsing for a realistic variable count
//!
//! Platform: Cross-platform (synthetic region, CI-safe)

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use pitlane::memory::{InProcessSignal, ReaderConfig, SnapshotReader};
use pitlane::test_utils::RegionBuilder;
use pitlane::{ConnectionHeader, Variable, VariableType};
use std::hint::black_box;
use std::sync::Arc;

fn bench_latest_copy(c: &mut Criterion) {
    let mut group = c.benchmark_group("latest_copy");

    for buffer_length in [256usize, 4096, 65536] {
        let (store, mut publisher) = RegionBuilder::new()
            .with_buffer_length(buffer_length)
            .build()
            .into_store()
            .expect("synthetic region opens");
        publisher.publish_pattern(0x5A);
        let reader =
            SnapshotReader::new(store, Arc::new(InProcessSignal::new()), ReaderConfig::default());

        group.throughput(Throughput::Bytes(buffer_length as u64));
        group.bench_with_input(BenchmarkId::from_parameter(buffer_length), &reader, |b, reader| {
            b.iter(|| black_box(reader.latest().expect("no tearing without a writer")))
        });
    }

    group.finish();
}

fn bench_typed_reads(c: &mut Criterion) {
    let (store, mut publisher) = RegionBuilder::new()
        .with_variable("Speed", VariableType::Float, 1)
        .with_variable("Gear", VariableType::Int, 1)
        .with_variable("CarIdxLapDistPct", VariableType::Float, 64)
        .build()
        .into_store()
        .expect("synthetic region opens");
    publisher.publish_pattern(0);
    let reader =
        SnapshotReader::new(Arc::clone(&store), Arc::new(InProcessSignal::new()), ReaderConfig::default());
    let snapshot = reader.latest().expect("read succeeds").expect("slot published");

    let header = store.header();
    let speed: Variable<f32> = header.variable("Speed").expect("Speed bound");
    let gear: Variable<i32> = header.variable("Gear").expect("Gear bound");
    let lap_dist: Variable<f32> = header.variable("CarIdxLapDistPct").expect("array bound");

    let mut group = c.benchmark_group("typed_reads");
    group.bench_function("f32_speed", |b| b.iter(|| black_box(speed.read(&snapshot).unwrap())));
    group.bench_function("i32_gear", |b| b.iter(|| black_box(gear.read(&snapshot).unwrap())));
    group.bench_function("f32_array_64", |b| {
        b.iter(|| black_box(lap_dist.read_array(&snapshot).unwrap()))
    });
    group.finish();
}

fn bench_header_parse(c: &mut Criterion) {
    let builder = (0..300).fold(RegionBuilder::new(), |builder, i| {
        builder.with_variable(&format!("Var{i}"), VariableType::Float, 1)
    });
    let region = builder.build();

    c.bench_function("header_parse_300_vars", |b| {
        b.iter(|| black_box(ConnectionHeader::parse(region.bytes()).unwrap()))
    });
}

criterion_group!(benches, bench_latest_copy, bench_typed_reads, bench_header_parse);
criterion_main!(benches);
