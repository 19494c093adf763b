use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gracedb::common::{IndexConfig, PageId, PagerConfig};
use gracedb::{HashIndex, Pager};
use tempfile::TempDir;

fn benchmark_page_hits(c: &mut Criterion) {
    let temp_dir = TempDir::new().unwrap();
    let pager = Pager::open(temp_dir.path().join("bench.db"), PagerConfig::with_frames(64)).unwrap();
    for _ in 0..32 {
        pager.put_page(pager.get_new_page().unwrap()).unwrap();
    }

    c.bench_function("pager_get_put_hit", |b| {
        let mut n = 0u64;
        b.iter(|| {
            let page = pager.get_page(black_box(PageId::new(n % 32))).unwrap();
            pager.put_page(page).unwrap();
            n += 1;
        })
    });
}

fn benchmark_page_eviction(c: &mut Criterion) {
    let temp_dir = TempDir::new().unwrap();
    let pager = Pager::open(temp_dir.path().join("bench.db"), PagerConfig::with_frames(8)).unwrap();
    for _ in 0..256 {
        pager.put_page(pager.get_new_page().unwrap()).unwrap();
    }

    c.bench_function("pager_get_put_evict", |b| {
        let mut n = 0u64;
        b.iter(|| {
            let page = pager.get_page(black_box(PageId::new(n % 256))).unwrap();
            pager.put_page(page).unwrap();
            n += 7;
        })
    });
}

fn benchmark_hash_insert(c: &mut Criterion) {
    c.bench_function("hash_index_insert_1000", |b| {
        b.iter(|| {
            let temp_dir = TempDir::new().unwrap();
            let mut index = HashIndex::open(temp_dir.path().join("bench.db"), IndexConfig::default()).unwrap();
            for k in 0..1000 {
                index.insert(black_box(k), k).unwrap();
            }
            index.close().unwrap();
        })
    });
}

criterion_group!(benches, benchmark_page_hits, benchmark_page_eviction, benchmark_hash_insert);
criterion_main!(benches);
