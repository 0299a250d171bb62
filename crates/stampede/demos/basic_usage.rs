//! Minimal dogpile-lock usage against the in-memory backend: a cold miss
//! regenerates once, a warm read is served straight from the backend, and
//! a hard invalidation forces the next read to regenerate again.

use std::time::Duration;

use stampede::{CacheRegion, ExpirationOverride, RegionConfig};
use stampede_core::CacheReturn;
use stampede_memory::MemoryBackend;

async fn expensive_lookup(user_id: u64) -> stampede_core::Result<String> {
    println!("regenerating profile for user {user_id}...");
    Ok(format!("profile-for-{user_id}"))
}

#[tokio::main]
async fn main() -> stampede_core::Result<()> {
    let region: CacheRegion<MemoryBackend> = CacheRegion::new();
    region.configure(
        MemoryBackend::new(),
        RegionConfig::new().with_expiration_time(Duration::from_secs(30)),
    )?;

    let first = region
        .get_or_create(
            "user:42",
            || expensive_lookup(42),
            ExpirationOverride::UseRegionDefault,
            None,
        )
        .await?;
    print_result("first call (cold miss)", &first);

    let second = region
        .get_or_create(
            "user:42",
            || expensive_lookup(42),
            ExpirationOverride::UseRegionDefault,
            None,
        )
        .await?;
    print_result("second call (warm hit)", &second);

    region.invalidate(true)?;
    let third = region
        .get_or_create(
            "user:42",
            || expensive_lookup(42),
            ExpirationOverride::UseRegionDefault,
            None,
        )
        .await?;
    print_result("third call (after hard invalidate)", &third);

    Ok(())
}

fn print_result(label: &str, result: &CacheReturn<String>) {
    match result {
        CacheReturn::Value(env) => println!("{label}: {}", env.payload),
        CacheReturn::NoValue => println!("{label}: no value"),
    }
}
