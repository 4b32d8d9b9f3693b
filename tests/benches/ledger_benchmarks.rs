//! # Ledger-Node Benchmarks
//!
//! | Component | Operation | Why it matters |
//! |-----------|-----------|----------------|
//! | ln-01 Proof of Work | anneal, difficulty | runs once per received block |
//! | ln-04 Mempool | admit a relayed batch | runs for every peer sync |
//! | ln-05 Wire Codec | encode, decode a batch | every message on the wire |

use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use ln_01_proof_of_work::{PowConfig, ProofOfWorkGate, RandomBuffer};
use ln_04_mempool::{wire_batch, AdmitOptions, DigestionLock, Mempool, MempoolConfig, MockLedger};
use ln_05_wire_codec::{decode, encode};
use ln_tests::fixtures::{address, keypair, signed, NOW};
use shared_crypto::sha224;
use shared_types::{Amount, ManualTimeSource};

const PREV: &str = "7a0f384876aca1c0e4e8b36e1cd76a3ef6c1e3e9a5e5e2b4d4ad0e1f";

// ============================================================================
// LN-01: Proof of Work
// ============================================================================

fn bench_proof_of_work(c: &mut Criterion) {
    let mut group = c.benchmark_group("ln-01-proof-of-work");
    let buffer = RandomBuffer::generate(1 << 20).unwrap();
    let gate = ProofOfWorkGate::new(Arc::new(buffer), PowConfig::default());
    let miner = keypair(1).address();
    let candidate = sha224(b"candidate block");

    group.bench_function("anneal", |b| b.iter(|| gate.anneal(black_box(&candidate))));
    group.bench_function("difficulty", |b| {
        let mut nonce = 0u64;
        b.iter(|| {
            nonce += 1;
            gate.difficulty(black_box(&miner), &format!("{:016x}", nonce), PREV)
        })
    });
    group.finish();
}

// ============================================================================
// LN-04: Mempool admission
// ============================================================================

fn bench_admission(c: &mut Criterion) {
    let mut group = c.benchmark_group("ln-04-mempool");
    group.measurement_time(Duration::from_secs(10));
    let sender = keypair(2);

    for size in [1usize, 10, 50] {
        let batch = wire_batch(
            &(0..size)
                .map(|i| signed(&sender, NOW - 100.0 + i as f64, &address('b'), Amount::from_coins(1), ""))
                .collect::<Vec<_>>(),
        );
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("admit_batch", size), &batch, |b, batch| {
            b.iter_batched(
                || {
                    let ledger = MockLedger::new().with_balance(&sender.address(), Amount::from_coins(1_000));
                    let lock: DigestionLock = Arc::default();
                    Mempool::open(
                        MempoolConfig::for_testing(),
                        Arc::new(ledger),
                        Arc::new(ManualTimeSource::new(NOW)),
                        lock,
                    )
                    .unwrap()
                },
                |mempool| mempool.admit("10.0.0.7", batch, AdmitOptions::RELAY),
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

// ============================================================================
// LN-05: Wire codec
// ============================================================================

fn bench_wire(c: &mut Criterion) {
    let mut group = c.benchmark_group("ln-05-wire-codec");
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let sender = keypair(3);
    let batch = wire_batch(
        &(0..100)
            .map(|i| signed(&sender, NOW - i as f64, &address('c'), Amount::from_coins(2), "memo"))
            .collect::<Vec<_>>(),
    );
    let frame = encode(&batch).unwrap();
    group.throughput(Throughput::Bytes(frame.len() as u64));

    group.bench_function("encode_100_txs", |b| b.iter(|| encode(black_box(&batch)).unwrap()));
    group.bench_function("decode_100_txs", |b| {
        b.iter(|| {
            let mut reader = frame.as_slice();
            runtime
                .block_on(decode(&mut reader, Duration::from_secs(1)))
                .unwrap()
        })
    });
    group.finish();
}

criterion_group!(benches, bench_proof_of_work, bench_admission, bench_wire);
criterion_main!(benches);
