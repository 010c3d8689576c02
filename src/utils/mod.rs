//! Shared utilities

pub mod hashing;
pub mod normalize;

/// Current wall-clock time as unix milliseconds. All persisted timestamps
/// use this resolution so consecutive scans never collide on a shared
/// second boundary.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
