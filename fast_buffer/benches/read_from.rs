use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::io::{self, Read};
use tracing_subscriber::EnvFilter;

use fast_buffer::Allocator;

const SIZES: [usize; 7] = [
    1024,
    4 * 1024,
    16 * 1024,
    128 * 1024,
    512 * 1024,
    1024 * 1024,
    4 * 1024 * 1024,
];

/// Fill a pooled buffer from a reader, then drain it into a sink
fn bench_read_from(c: &mut Criterion) {
    // errors only unless RUST_LOG says otherwise
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();

    let alloc = Allocator::new();

    let mut group = c.benchmark_group("read_from");
    for size in SIZES {
        let data = vec![0x5a_u8; size];
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("pooled", size), &data, |b, data| {
            b.iter(|| {
                let mut fb = alloc.acquire(size);
                let mut src = &data[..];
                black_box(fb.read_from(&mut src).unwrap());
                black_box(fb.write_to(&mut io::sink()).unwrap());
                alloc.release(fb);
            })
        });

        group.bench_with_input(BenchmarkId::new("vec", size), &data, |b, data| {
            b.iter(|| {
                let mut buf = Vec::with_capacity(size);
                let mut src = &data[..];
                black_box(src.read_to_end(&mut buf).unwrap());
                black_box(io::copy(&mut &buf[..], &mut io::sink()).unwrap());
            })
        });
    }

    group.finish();
}

/// Slab checkout and checkin without any payload traffic
fn bench_allocate(c: &mut Criterion) {
    let alloc = Allocator::new();

    let mut group = c.benchmark_group("allocate");
    for size in SIZES {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let slab = alloc.allocate(black_box(size));
                alloc.free(slab).unwrap();
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_read_from, bench_allocate);
criterion_main!(benches);
