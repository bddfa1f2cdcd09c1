use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use engine::Store;
use tempfile::tempdir;

const N_KEYS: usize = 1_000;
const VALUE_SIZE: usize = 100;

fn filled_store() -> (tempfile::TempDir, Store) {
    let dir = tempdir().unwrap();
    let store = Store::open(dir.path(), 64).unwrap();
    let value = vec![b'x'; VALUE_SIZE];
    for i in 0..N_KEYS {
        store.set(format!("key{}", i).as_bytes(), &value).unwrap();
    }
    (dir, store)
}

fn store_set_benchmark(c: &mut Criterion) {
    c.bench_function("store_set_1k", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let store = Store::open(dir.path(), 64).unwrap();
                (dir, store)
            },
            |(_dir, store)| {
                let value = vec![b'x'; VALUE_SIZE];
                for i in 0..N_KEYS {
                    store.set(format!("key{}", i).as_bytes(), &value).unwrap();
                }
            },
            BatchSize::SmallInput,
        );
    });
}

fn store_get_hit_benchmark(c: &mut Criterion) {
    c.bench_function("store_get_hit_1k", |b| {
        b.iter_batched(
            filled_store,
            |(_dir, store)| {
                for i in 0..N_KEYS {
                    let key = format!("key{}", i);
                    let v = store.get(key.as_bytes()).unwrap();
                    assert_eq!(v.len(), VALUE_SIZE);
                }
            },
            BatchSize::LargeInput,
        );
    });
}

fn store_recovery_benchmark(c: &mut Criterion) {
    c.bench_function("store_recovery_1k", |b| {
        b.iter_batched(
            || {
                let (dir, store) = filled_store();
                drop(store);
                dir
            },
            |dir| {
                let store = Store::open(dir.path(), 64).unwrap();
                assert_eq!(store.key_count().unwrap(), N_KEYS);
            },
            BatchSize::LargeInput,
        );
    });
}

criterion_group!(
    benches,
    store_set_benchmark,
    store_get_hit_benchmark,
    store_recovery_benchmark
);
criterion_main!(benches);
