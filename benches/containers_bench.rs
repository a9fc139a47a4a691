use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use rc_containers::{Bitset, HashTable, IdAllocator, List, TableConfig, Unsynced};
use std::sync::Arc;
use std::time::Duration;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn key(n: u64) -> String {
    format!("k{:016x}", n)
}

fn bench_table_put(c: &mut Criterion) {
    c.bench_function("hash_table_put_10k", |b| {
        b.iter_batched(
            || HashTable::<String, u64>::with_config(TableConfig::default().with_capacity(10_000)),
            |t| {
                let t = t.unwrap();
                for (i, x) in lcg(1).take(10_000).enumerate() {
                    t.put(key(x), Arc::new(i as u64)).unwrap();
                }
                black_box(t)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_table_get_hit(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash_table_get_hit");
    let keys: Vec<_> = lcg(7).take(20_000).map(key).collect();

    let synced: HashTable<String, u64> =
        HashTable::with_config(TableConfig::default().with_capacity(20_000)).unwrap();
    let unsynced: HashTable<String, u64, Unsynced> =
        HashTable::create(TableConfig::default().with_capacity(20_000)).unwrap();
    for (i, k) in keys.iter().enumerate() {
        synced.put(k.clone(), Arc::new(i as u64)).unwrap();
        unsynced.put(k.clone(), Arc::new(i as u64)).unwrap();
    }

    group.bench_function("synced", |b| {
        let mut it = keys.iter().cycle();
        b.iter(|| black_box(synced.get(it.next().unwrap().as_str())))
    });
    group.bench_function("unsynced", |b| {
        let mut it = keys.iter().cycle();
        b.iter(|| black_box(unsynced.get(it.next().unwrap().as_str())))
    });
    group.finish();
}

fn bench_table_get_miss(c: &mut Criterion) {
    c.bench_function("hash_table_get_miss", |b| {
        let t: HashTable<String, u64> = HashTable::new();
        for (i, x) in lcg(11).take(10_000).enumerate() {
            t.put(key(x), Arc::new(i as u64)).unwrap();
        }
        let mut miss = lcg(0xdead_beef);
        b.iter(|| {
            // keys unlikely in the table
            let k = key(miss.next().unwrap());
            black_box(t.get(k.as_str()));
        })
    });
}

fn bench_table_iterate(c: &mut Criterion) {
    c.bench_function("hash_table_iterate_10k", |b| {
        let t: HashTable<String, u64> = HashTable::new();
        for (i, x) in lcg(3).take(10_000).enumerate() {
            t.put(key(x), Arc::new(i as u64)).unwrap();
        }
        b.iter(|| {
            let sum: u64 = t.iter().map(|kv| *kv.unwrap().1).sum();
            black_box(sum)
        })
    });
}

fn bench_list_fifo(c: &mut Criterion) {
    c.bench_function("list_push_pop_1k", |b| {
        let list: List<u64> = List::new();
        b.iter(|| {
            for i in 0..1_000u64 {
                list.push_tail(Arc::new(i));
            }
            while let Some(v) = list.pop_head() {
                black_box(v);
            }
        })
    });
}

fn bench_bitset_scan(c: &mut Criterion) {
    c.bench_function("bitset_next_set_bit_sparse", |b| {
        let mut bits = Bitset::new(1 << 16).unwrap();
        for x in lcg(5).take(64) {
            bits.set((x % (1 << 16)) as usize).unwrap();
        }
        b.iter(|| black_box(bits.iter_ones().count()))
    });
}

fn bench_id_alloc_churn(c: &mut Criterion) {
    c.bench_function("id_alloc_alloc_free", |b| {
        let ids = IdAllocator::new(4096).unwrap();
        for _ in 0..4000 {
            ids.alloc().unwrap();
        }
        b.iter(|| {
            let id = ids.alloc().unwrap();
            ids.free(black_box(id)).unwrap();
        })
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(50)
        .measurement_time(Duration::from_secs(8))
        .warm_up_time(Duration::from_secs(2))
}

criterion_group! {
    name = benches;
    config = bench_config();
    targets = bench_table_put, bench_table_get_hit, bench_table_get_miss,
        bench_table_iterate, bench_list_fifo, bench_bitset_scan, bench_id_alloc_churn
}
criterion_main!(benches);
