//! Chaotic storage wrapper for fault injection testing
//!
//! Storage wrapper that randomly fails operations to test error handling and
//! recovery. Used for chaos testing to ensure persistence faults stay on the
//! sync path and never reach players.

use std::sync::{Arc, Mutex};

use super::{
    CharacterRecord, CharacterState, CharacterUpdate, Occupancy, RoomState, RoomUpdate, Storage,
    StorageError, UserRecord,
};

/// Chaotic storage wrapper that randomly injects failures
///
/// Delegates to an underlying storage implementation but randomly fails
/// operations based on a configured failure rate. A failed call never reaches
/// the inner storage, so injected faults leave no partial writes.
#[derive(Clone)]
pub struct ChaoticStorage<S: Storage> {
    inner: S,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    /// RNG state for deterministic chaos
    rng: Arc<Mutex<ChaoticRng>>,
    /// Number of injected failures so far
    failures: Arc<Mutex<usize>>,
}

/// Simple deterministic RNG for chaos injection
///
/// Linear congruential generator; same seed, same failure pattern.
struct ChaoticRng {
    state: u64,
}

impl ChaoticRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Generate next random value [0.0, 1.0)
    fn next(&mut self) -> f64 {
        // LCG constants from Numerical Recipes
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1u64 << 32;

        self.state = (A.wrapping_mul(self.state).wrapping_add(C)) % M;
        (self.state as f64) / (M as f64)
    }
}

impl<S: Storage> ChaoticStorage<S> {
    /// Create a new chaotic storage wrapper
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn new(inner: S, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, 0x1234_5678_9ABC_DEF0)
    }

    /// Create with explicit seed for reproducible chaos
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    #[allow(clippy::panic, reason = "Misconfigured test fixture")]
    pub fn with_seed(inner: S, failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
        );

        Self {
            inner,
            failure_rate,
            rng: Arc::new(Mutex::new(ChaoticRng::new(seed))),
            failures: Arc::new(Mutex::new(0)),
        }
    }

    /// Underlying storage (for checking invariants after chaos).
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Number of calls failed by injection.
    pub fn injected_failures(&self) -> usize {
        #[allow(clippy::expect_used)]
        *self.failures.lock().expect("failure counter mutex poisoned")
    }

    /// Fail this call with probability `failure_rate`.
    fn maybe_fail(&self, op: &str) -> Result<(), StorageError> {
        #[allow(clippy::expect_used)]
        let roll = self.rng.lock().expect("ChaoticRng mutex poisoned").next();
        if roll < self.failure_rate {
            #[allow(clippy::expect_used)]
            let mut failures = self.failures.lock().expect("failure counter mutex poisoned");
            *failures += 1;
            return Err(StorageError::Io(format!("chaotic failure injection: {op}")));
        }
        Ok(())
    }
}

impl<S: Storage> Storage for ChaoticStorage<S> {
    fn put_user(&self, user: &UserRecord) -> Result<(), StorageError> {
        self.maybe_fail("put_user")?;
        self.inner.put_user(user)
    }

    fn load_user(&self, username: &str) -> Result<Option<UserRecord>, StorageError> {
        self.maybe_fail("load_user")?;
        self.inner.load_user(username)
    }

    fn list_users(&self) -> Result<Vec<UserRecord>, StorageError> {
        self.maybe_fail("list_users")?;
        self.inner.list_users()
    }

    fn put_character(&self, character: &CharacterRecord) -> Result<(), StorageError> {
        self.maybe_fail("put_character")?;
        self.inner.put_character(character)
    }

    fn load_character(&self, id: &str) -> Result<Option<CharacterRecord>, StorageError> {
        self.maybe_fail("load_character")?;
        self.inner.load_character(id)
    }

    fn list_characters(&self) -> Result<Vec<CharacterRecord>, StorageError> {
        self.maybe_fail("list_characters")?;
        self.inner.list_characters()
    }

    fn create_character_state(&self, state: &CharacterState) -> Result<bool, StorageError> {
        self.maybe_fail("create_character_state")?;
        self.inner.create_character_state(state)
    }

    fn load_character_state(&self, id: &str) -> Result<Option<CharacterState>, StorageError> {
        self.maybe_fail("load_character_state")?;
        self.inner.load_character_state(id)
    }

    fn update_character_state(
        &self,
        id: &str,
        update: &CharacterUpdate,
        now: u64,
    ) -> Result<CharacterState, StorageError> {
        self.maybe_fail("update_character_state")?;
        self.inner.update_character_state(id, update, now)
    }

    fn delete_character_state(&self, id: &str) -> Result<bool, StorageError> {
        self.maybe_fail("delete_character_state")?;
        self.inner.delete_character_state(id)
    }

    fn list_character_states(&self) -> Result<Vec<CharacterState>, StorageError> {
        self.maybe_fail("list_character_states")?;
        self.inner.list_character_states()
    }

    fn list_characters_in_room(&self, room_id: &str) -> Result<Vec<CharacterState>, StorageError> {
        self.maybe_fail("list_characters_in_room")?;
        self.inner.list_characters_in_room(room_id)
    }

    fn create_room_state(&self, state: &RoomState) -> Result<bool, StorageError> {
        self.maybe_fail("create_room_state")?;
        self.inner.create_room_state(state)
    }

    fn load_room_state(&self, room_id: &str) -> Result<Option<RoomState>, StorageError> {
        self.maybe_fail("load_room_state")?;
        self.inner.load_room_state(room_id)
    }

    fn adjust_occupancy(
        &self,
        room_id: &str,
        delta: Occupancy,
        now: u64,
    ) -> Result<u32, StorageError> {
        self.maybe_fail("adjust_occupancy")?;
        self.inner.adjust_occupancy(room_id, delta, now)
    }

    fn update_room_state(
        &self,
        room_id: &str,
        update: &RoomUpdate,
        now: u64,
    ) -> Result<RoomState, StorageError> {
        self.maybe_fail("update_room_state")?;
        self.inner.update_room_state(room_id, update, now)
    }

    fn list_room_states(&self) -> Result<Vec<RoomState>, StorageError> {
        self.maybe_fail("list_room_states")?;
        self.inner.list_room_states()
    }
}
