//! Environment abstraction for deterministic testing.
//!
//! Decouples game logic and the sync layer from system resources (wall clock,
//! randomness). Production uses the OS clock and RNG; tests use a seeded
//! environment with a virtual clock so timestamps and session ids are
//! reproducible.

/// Abstract environment providing time and randomness.
///
/// Implementations MUST guarantee:
///
/// - `wall_clock_secs()` never goes backwards within one process
/// - `random_bytes()` uses cryptographically secure entropy in production
pub trait Environment: Clone + Send + Sync + 'static {
    /// Seconds since the Unix epoch.
    ///
    /// Used for `updated_at` stamps on durable state rows, never for
    /// ordering decisions.
    fn wall_clock_secs(&self) -> u64;

    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    ///
    /// Convenience for session ids and user ids.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}
