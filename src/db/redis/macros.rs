/// Read-through caching for async lookups.
///
/// Returns the cached value for `$key` when present. Otherwise awaits `$block`,
/// queues the result for a background write with `$ttl` seconds to live, and
/// returns it. Cache read failures count as misses, so the lookup still goes
/// to the source when Redis is unavailable.
///
/// ```ignore
/// let record: ContentRecord = cached!(self.cache, CacheKey::OmdbTitle(id.to_string()), TTL, async move {
///     self.fetch_from_api(id).await
/// })?;
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        let key = $key;
        if let Some(cached) = $cache.get_or_miss(&key).await {
            Ok(cached)
        } else {
            let value = $block.await?;
            $cache.set_in_background(&key, &value, $ttl);
            Ok(value)
        }
    }};
}
