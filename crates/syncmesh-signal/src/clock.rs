//! Time abstraction for testable expiry behavior.
//!
//! In production this is `std::time::Instant`. Unit tests use
//! `mock_instant::thread_local::Instant`, advanced through `MockClock`, so
//! registry expiry can be checked without waiting for the TTL to elapse.
//! `#[tokio::test]` runs on a current-thread runtime, which keeps the
//! thread-local clock consistent across awaits.

#[cfg(test)]
pub use mock_instant::thread_local::Instant;

#[cfg(not(test))]
pub use std::time::Instant;

#[cfg(test)]
pub use mock_instant::thread_local::MockClock;
