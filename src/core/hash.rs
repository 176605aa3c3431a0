//! State Hashing for Verification
//!
//! Canonical FNV-1a-32 digest of `GameState` for cross-process equality
//! checks between the server, a predicting client, and an offline replay.
//! Field order is contractual — see `GameState::compute_hash` for the feed
//! sequence. Builder shape follows the same pattern a SHA-256 hasher would,
//! just folding into a running `u32` FNV accumulator instead.

/// FNV-1a-32 offset basis.
const FNV_OFFSET_BASIS: u32 = 0x811c9dc5;
/// FNV-1a-32 prime.
const FNV_PRIME: u32 = 0x01000193;

/// Output of `GameStateHasher::finalize`.
pub type StateHash = u32;

/// Deterministic FNV-1a-32 hasher for game state.
///
/// Order of `update_*` calls is critical for determinism; see the contractual
/// feed order documented on `GameState::compute_hash`.
pub struct GameStateHasher {
    state: u32,
}

impl GameStateHasher {
    /// Start a new hasher with a domain separator folded into the basis.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Self { state: FNV_OFFSET_BASIS };
        hasher.update_bytes(domain);
        hasher
    }

    /// Hasher for the per-tick `GameState` hash.
    pub fn for_game_state() -> Self {
        Self::new(b"FIGHTER_STATE_V1")
    }

    #[inline]
    pub fn update_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.state ^= b as u32;
            self.state = self.state.wrapping_mul(FNV_PRIME);
        }
    }

    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.update_bytes(&[value]);
    }

    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.update_bytes(&value.to_le_bytes());
    }

    #[inline]
    pub fn update_i32(&mut self, value: i32) {
        self.update_bytes(&value.to_le_bytes());
    }

    #[inline]
    pub fn update_f64(&mut self, value: f64) {
        self.update_bytes(&value.to_le_bytes());
    }

    #[inline]
    pub fn update_bool(&mut self, value: bool) {
        self.update_u8(value as u8);
    }

    /// Consume the hasher and return the digest.
    pub fn finalize(self) -> StateHash {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let make = || {
            let mut h = GameStateHasher::for_game_state();
            h.update_u32(100);
            h.update_f64(5.5);
            h.update_bool(true);
            h.finalize()
        };
        assert_eq!(make(), make());
    }

    #[test]
    fn hash_order_matters() {
        let h1 = {
            let mut h = GameStateHasher::new(b"test");
            h.update_u32(1);
            h.update_u32(2);
            h.finalize()
        };
        let h2 = {
            let mut h = GameStateHasher::new(b"test");
            h.update_u32(2);
            h.update_u32(1);
            h.finalize()
        };
        assert_ne!(h1, h2);
    }

    #[test]
    fn hash_is_a_positive_32_bit_value() {
        let mut h = GameStateHasher::for_game_state();
        h.update_u32(42);
        let digest = h.finalize();
        assert!(digest <= u32::MAX);
    }

    #[test]
    fn domain_separation_changes_hash() {
        let h1 = {
            let mut h = GameStateHasher::new(b"DOMAIN_A");
            h.update_u32(1);
            h.finalize()
        };
        let h2 = {
            let mut h = GameStateHasher::new(b"DOMAIN_B");
            h.update_u32(1);
            h.finalize()
        };
        assert_ne!(h1, h2);
    }
}
