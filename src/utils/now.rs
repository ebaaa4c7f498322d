use chrono::Utc;

/// Returns the current timestamp in microseconds since the UNIX epoch.
///
/// Falls back to `0` if the clock reports a time that cannot be represented
/// in microseconds.
///
/// # Example:
/// ```rust
/// use tandem::utils::now;
/// let timestamp = now(); // Gets the current time in microseconds
/// ```
pub fn now() -> u64 {
    u64::try_from(Utc::now().timestamp_micros()).unwrap_or(0)
}
