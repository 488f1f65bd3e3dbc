//! Frame codec benchmarks

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use regpoll_core::core::protocol::{crc16_modbus, decode_response, encode_read, encode_read_ack, encode_write};
use std::hint::black_box;
use regpoll_core::{DataType, PointDefinition, RegisterPoint, Value};

fn point(data_type: DataType) -> RegisterPoint {
    RegisterPoint::new(PointDefinition {
        name: "bench".to_string(),
        channel: "COM1".to_string(),
        data_type,
        device_address: 1,
        register_address: 0x10,
        read_only: false,
    })
}

fn checksum_benchmark(c: &mut Criterion) {
    let data: Vec<u8> = (0..256).map(|i| (i % 256) as u8).collect();

    let mut group = c.benchmark_group("checksum");
    group.throughput(Throughput::Bytes(data.len() as u64));

    group.bench_function("crc16_modbus", |b| {
        b.iter(|| black_box(crc16_modbus(black_box(&data))))
    });

    group.finish();
}

fn codec_benchmark(c: &mut Criterion) {
    let float = point(DataType::Float32);
    let coil = point(DataType::Bool);
    let response = encode_read_ack(1, Value::Float32(100.0));

    let mut group = c.benchmark_group("codec");

    group.bench_function("encode_read", |b| {
        b.iter(|| black_box(encode_read(black_box(&float))))
    });

    group.bench_function("encode_write_float32", |b| {
        b.iter(|| black_box(encode_write(black_box(&float), Value::Float32(12.5))))
    });

    group.bench_function("encode_write_coil", |b| {
        b.iter(|| black_box(encode_write(black_box(&coil), Value::Bool(true))))
    });

    group.bench_function("decode_float32", |b| {
        b.iter(|| black_box(decode_response(black_box(&response), DataType::Float32)))
    });

    group.finish();
}

criterion_group!(benches, checksum_benchmark, codec_benchmark);
criterion_main!(benches);
