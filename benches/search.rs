use std::sync::atomic::{AtomicBool, Ordering};

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use onion_vanity::field::FieldElement;
use onion_vanity::search::{search, vector_division};
use onion_vanity::tor;
use onion_vanity::KeyKind;

fn field_element(v: u64) -> FieldElement {
    let mut bytes = [0u8; 32];
    bytes[..8].copy_from_slice(&v.to_le_bytes());
    bytes[13] = 0x5d;
    FieldElement::from_bytes(&bytes)
}

fn bench_vector_division(c: &mut Criterion) {
    let mut group = c.benchmark_group("vector_division");
    for n in [1024usize, 4096] {
        let x: Vec<FieldElement> = (1..=n as u64).map(field_element).collect();
        let y: Vec<FieldElement> = (2..=n as u64 + 1).map(field_element).collect();
        let mut u = vec![FieldElement::ZERO; n];
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| vector_division(&x, &y, &mut u));
        });
    }
    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let public_key = tor::public_key_for(&[9u8; 32]);
    const BATCHES: usize = 8;

    let mut group = c.benchmark_group("search");
    group.sample_size(20);
    for batch_size in [1024usize, 4096] {
        group.throughput(Throughput::Elements((BATCHES * (batch_size + 1)) as u64));
        group.bench_with_input(
            BenchmarkId::new("batches", batch_size),
            &batch_size,
            |b, &batch_size| {
                b.iter(|| {
                    let cancel = AtomicBool::new(false);
                    let mut seen = 0usize;
                    search(
                        &public_key,
                        0,
                        batch_size,
                        KeyKind::Service,
                        &cancel,
                        |_| {
                            seen += 1;
                            if seen >= BATCHES * (batch_size + 1) {
                                cancel.store(true, Ordering::Relaxed);
                            }
                            false
                        },
                        |_, _| {},
                    )
                    .expect("valid parameters")
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_vector_division, bench_search);
criterion_main!(benches);
