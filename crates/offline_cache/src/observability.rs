use once_cell::sync::Lazy;
use prometheus::{register_int_counter, Encoder, IntCounter, TextEncoder};

// Prometheus metrics (default registry)
pub static CACHE_HITS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("offline_cache_hits_total", "Requests answered from the cache")
        .expect("register hits_total")
});

pub static CACHE_MISSES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("offline_cache_misses_total", "Requests with no cached entry")
        .expect("register misses_total")
});

pub static REVALIDATIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "offline_cache_revalidations_total",
        "Background refreshes that replaced a cached entry"
    )
    .expect("register revalidations_total")
});

pub static NETWORK_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("offline_cache_network_failures_total", "Failed network fetches")
        .expect("register network_failures_total")
});

pub static PRECACHE_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "offline_cache_precache_failures_total",
        "Manifest assets that could not be pre-cached"
    )
    .expect("register precache_failures_total")
});

pub static PURGED_GENERATIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "offline_cache_purged_generations_total",
        "Cache generations deleted on activation"
    )
    .expect("register purged_generations_total")
});

/// Force registration so every counter shows up in the first scrape.
pub fn register_all() {
    Lazy::force(&CACHE_HITS_TOTAL);
    Lazy::force(&CACHE_MISSES_TOTAL);
    Lazy::force(&REVALIDATIONS_TOTAL);
    Lazy::force(&NETWORK_FAILURES_TOTAL);
    Lazy::force(&PRECACHE_FAILURES_TOTAL);
    Lazy::force(&PURGED_GENERATIONS_TOTAL);
}

/// Default registry in Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
