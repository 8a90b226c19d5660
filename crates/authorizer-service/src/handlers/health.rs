//! Liveness probe handler.

/// Returns "OK" while the process is serving requests.
///
/// Does NOT check key-set endpoints: an unreachable endpoint only affects
/// tokens whose key is not cached, and restarting would empty the cache.
pub async fn health_check() -> &'static str {
    "OK"
}
