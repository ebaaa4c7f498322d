use super::now;
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU64, Ordering};

/// A simple counter which is initialized at 0.
static GLOBAL_ID_COUNTER: Lazy<AtomicU64> = Lazy::new(|| AtomicU64::new(0));

/// Process-wide prefix so ids from two processes sharing a registry center
/// do not collide. Derived from the first time an id is requested.
static PROCESS_PREFIX: Lazy<String> =
    Lazy::new(|| format!("{:x}-{:x}", now(), std::process::id()));

/// Generates a request id that is unique for the lifetime of the process.
///
/// Ids are never reused, which keeps a late response from ever matching a
/// newer request.
#[inline]
pub fn generate_request_id() -> String {
    let n = GLOBAL_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}", PROCESS_PREFIX.as_str(), n)
}
