use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use stampede::{CacheRegion, ExpirationOverride, RegionConfig};
use stampede_memory::MemoryBackend;
use tokio::runtime::Runtime;

fn warm_region() -> (Runtime, Arc<CacheRegion<MemoryBackend>>) {
    let rt = Runtime::new().unwrap();
    let region = Arc::new(CacheRegion::new());
    rt.block_on(async {
        region
            .configure(
                MemoryBackend::new(),
                RegionConfig::new().with_expiration_time(Duration::from_secs(60)),
            )
            .unwrap();
        region
            .get_or_create(
                "warm-key",
                || async { Ok(42i32) },
                ExpirationOverride::UseRegionDefault,
                None,
            )
            .await
            .unwrap();
    });
    (rt, region)
}

fn bench_warm_get(c: &mut Criterion) {
    let (rt, region) = warm_region();

    c.bench_function("get_or_create_warm_hit", |b| {
        b.iter(|| {
            rt.block_on(async {
                region
                    .get_or_create(
                        black_box("warm-key"),
                        || async { Ok(42i32) },
                        ExpirationOverride::UseRegionDefault,
                        None,
                    )
                    .await
                    .unwrap()
            })
        });
    });
}

fn bench_cold_miss(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    c.bench_function("get_or_create_cold_miss", |b| {
        b.iter(|| {
            rt.block_on(async {
                let region: CacheRegion<MemoryBackend> = CacheRegion::new();
                region.configure(MemoryBackend::new(), RegionConfig::new()).unwrap();
                region
                    .get_or_create(
                        black_box("key"),
                        || async { Ok(42i32) },
                        ExpirationOverride::UseRegionDefault,
                        None,
                    )
                    .await
                    .unwrap()
            })
        });
    });
}

criterion_group!(benches, bench_warm_get, bench_cold_miss);
criterion_main!(benches);
