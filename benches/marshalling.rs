//! Benchmarks for argument marshalling and result conversion.
//!
//! Measures the hot path of every managed call:
//! - Encoding host values into exact-width native slots
//! - Staging arguments in scratch memory
//! - Converting unboxed results back into managed values

extern crate monoscope;

use std::{hint::black_box, sync::Arc};

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use monoscope::{
    host::{simulated::SimulatedHost, HostEnvironment, NativeValue},
    invoke::{encode_primitive, ScratchArena},
    HostValue, Int64Mode, ManagedValue, PrimitiveKind,
};

/// Benchmark encoding one value per primitive kind.
fn bench_encode_primitives(c: &mut Criterion) {
    let cases = [
        (PrimitiveKind::Boolean, HostValue::from(true)),
        (PrimitiveKind::I32, HostValue::from(-42)),
        (PrimitiveKind::U64, HostValue::from(u64::MAX)),
        (PrimitiveKind::ISize, HostValue::from(0x7FFF_0000i64)),
        (PrimitiveKind::F64, HostValue::from(1.5)),
        (PrimitiveKind::F32, HostValue::from(7)),
    ];

    let mut group = c.benchmark_group("encode_primitive");
    for (kind, value) in &cases {
        group.bench_with_input(BenchmarkId::from_parameter(kind), value, |b, value| {
            b.iter(|| black_box(encode_primitive(black_box(*kind), value, 8)));
        });
    }
    group.finish();
}

/// Benchmark rejecting an out-of-range value, which formats an error message.
fn bench_encode_out_of_range(c: &mut Criterion) {
    let value = HostValue::from(300);

    c.bench_function("encode_primitive_out_of_range", |b| {
        b.iter(|| black_box(encode_primitive(PrimitiveKind::U8, black_box(&value), 8)));
    });
}

/// Benchmark staging a typical argument list: two primitives and a string.
fn bench_scratch_arena(c: &mut Criterion) {
    let host: Arc<dyn HostEnvironment> = Arc::new(SimulatedHost::new("mono.dll"));

    c.bench_function("scratch_arena_three_args", |b| {
        b.iter(|| {
            let mut arena = ScratchArena::new(Arc::clone(&host));
            let first = arena.store(&NativeValue::I32(1)).unwrap();
            let second = arena.store(&NativeValue::F64(2.0)).unwrap();
            let text = arena.store_c_string(black_box("Player.Health")).unwrap();
            black_box(arena.store_pointers(&[first, second, text]).unwrap())
        });
    });
}

/// Benchmark converting unboxed results, exact and lossy.
fn bench_result_conversion(c: &mut Criterion) {
    c.bench_function("from_native_i64_exact", |b| {
        b.iter(|| {
            let value = black_box(NativeValue::I64(-9));
            let converted = ManagedValue::from_native(PrimitiveKind::I64, value, Int64Mode::Exact);
            black_box(converted.unwrap())
        });
    });

    c.bench_function("from_native_u64_lossy", |b| {
        b.iter(|| {
            black_box(
                ManagedValue::from_native(
                    PrimitiveKind::U64,
                    black_box(NativeValue::U64(u64::MAX)),
                    Int64Mode::Lossy,
                )
                .unwrap(),
            )
        });
    });
}

criterion_group!(
    benches,
    bench_encode_primitives,
    bench_encode_out_of_range,
    bench_scratch_arena,
    bench_result_conversion
);
criterion_main!(benches);
