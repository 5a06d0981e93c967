//! Canonical encoding, signing and mempool admission throughput.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::{Map, Value};

use sealnet::{Mempool, TransactionBuilder, TransactionType};
use sealnet_core::{canonical_json, SealPublicKey};
use sealnet_testkit::vectors::{sample_payload, vector_keys};

fn payload_with_keys(n: usize) -> Map<String, Value> {
    (0..n)
        .map(|i| (format!("key-{i:04}"), Value::from(i as u64)))
        .collect()
}

fn bench_canonical_json(c: &mut Criterion) {
    let mut group = c.benchmark_group("canonical_json");
    for size in [1usize, 16, 256] {
        let value = Value::Object(payload_with_keys(size));
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &value, |b, v| {
            b.iter(|| canonical_json(black_box(v)))
        });
    }
    group.finish();
}

fn bench_sign_and_verify(c: &mut Criterion) {
    let (keys, seal) = vector_keys();
    let public = SealPublicKey::from_pem(&seal.public_key_pem().unwrap()).unwrap();
    let tx = TransactionBuilder::new(keys.fingerprint().clone(), TransactionType::Data, 0)
        .data(sample_payload())
        .timestamp(1736870400)
        .sign(&seal)
        .unwrap();

    c.bench_function("transaction_sign", |b| {
        b.iter(|| {
            TransactionBuilder::new(keys.fingerprint().clone(), TransactionType::Data, 0)
                .data(sample_payload())
                .timestamp(1736870400)
                .sign(black_box(&seal))
                .unwrap()
        })
    });
    c.bench_function("transaction_verify", |b| {
        b.iter(|| public.verify(&tx.canonical_bytes(), black_box(&tx.signature)))
    });
    c.bench_function("transaction_id", |b| b.iter(|| black_box(&tx).id()));
}

fn bench_mempool_admission(c: &mut Criterion) {
    let (keys, seal) = vector_keys();
    let txs: Vec<_> = (0..1_000u64)
        .map(|nonce| {
            TransactionBuilder::new(keys.fingerprint().clone(), TransactionType::Data, nonce)
                .timestamp(1736870400 + (nonce % 7) as i64)
                .sign(&seal)
                .unwrap()
        })
        .collect();

    let mut group = c.benchmark_group("mempool");
    group.throughput(Throughput::Elements(txs.len() as u64));
    group.bench_function("add_1000", |b| {
        b.iter(|| {
            let pool = Mempool::new();
            for tx in &txs {
                pool.add(tx.clone());
            }
            black_box(pool.get_pending(100))
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_canonical_json,
    bench_sign_and_verify,
    bench_mempool_admission
);
criterion_main!(benches);
