//! Benchmarks for the EnigmaIOT wire helpers

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use enigmaiot::{crc32, hex_dump, MacAddress};

fn generate_frame(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

fn bench_crc(c: &mut Criterion) {
    let mut group = c.benchmark_group("crc32_mpeg2");

    for len in [16usize, 250, 4096] {
        let frame = generate_frame(len);
        group.throughput(Throughput::Bytes(len as u64));
        group.bench_function(format!("{}_bytes", len), |b| {
            b.iter(|| black_box(crc32(black_box(&frame))))
        });
    }

    group.finish();
}

fn bench_mac(c: &mut Criterion) {
    let mac = MacAddress::new([0xAA, 0xBB, 0xCC, 0x11, 0x22, 0x33]);
    let text = mac.to_string();

    c.bench_function("mac_to_string", |b| b.iter(|| black_box(mac).to_string()));
    c.bench_function("string_to_mac", |b| {
        b.iter(|| black_box(text.as_str()).parse::<MacAddress>())
    });
}

fn bench_hex_dump(c: &mut Criterion) {
    // ESP-NOW frames are at most 250 bytes
    let frame = generate_frame(250);
    c.bench_function("hex_dump_250_bytes", |b| {
        b.iter(|| black_box(hex_dump(black_box(&frame))))
    });
}

criterion_group!(benches, bench_crc, bench_mac, bench_hex_dump);
criterion_main!(benches);
