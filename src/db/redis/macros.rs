/// Read-through caching for a single guarded computation.
///
/// Probes the cache for `$key`. On a hit the cached value is returned without
/// running `$block`; on a miss `$block` is awaited, its value written back with
/// `$ttl` seconds of expiry, and returned. Errors from `$block` propagate with `?`
/// and leave the cache untouched.
///
/// # Arguments
/// * `$cache`: a [`Cache`](crate::db::Cache) (anything with `get_from_cache` and `set_in_cache`).
/// * `$key`: the [`CacheKey`](crate::db::CacheKey) to read and populate.
/// * `$ttl`: the time-to-live (TTL) for the cached value in seconds.
/// * `$block`: a future producing `AppResult<T>` on a miss.
///
/// # Example
/// ```rust,ignore
/// let contents: Vec<ContentItem> = cached!(self.cache, key, TOP_CONTENTS_TTL, async {
///     self.guarded.execute("top-contents", None, |store| async move {
///         store.fetch_ranked_contents(limit).await
///     }).await
/// })?;
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        if let Some(cached) = $cache.get_from_cache(&$key).await {
            Ok(cached)
        } else {
            let value = $block.await?;
            $cache.set_in_cache(&$key, &value, $ttl).await;
            Ok(value)
        }
    }};
}
