//! Percentage-based gradual rollouts.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Decides whether a device receives an update under a staged rollout.
///
/// Devices that present a fingerprint are bucketed deterministically so the
/// same device gets the same answer across polls and server restarts.
/// Fingerprint-less requests fall back to a shared pseudo-random source
/// seeded once at startup.
pub struct RolloutGate {
    rng: Mutex<StdRng>,
}

impl RolloutGate {
    /// Create a gate with a wall-clock seeded random source.
    pub fn new() -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Returns true if a device should receive the update.
    ///
    /// `percentage` is 0-100; >=100 serves everyone, <=0 serves no one.
    /// A non-empty `fingerprint` is bucketed deterministically.
    pub fn should_serve(&self, percentage: i64, fingerprint: &str) -> bool {
        if percentage >= 100 {
            return true;
        }
        if percentage <= 0 {
            return false;
        }

        if !fingerprint.is_empty() {
            return i64::from(rollout_bucket(fingerprint)) < percentage;
        }

        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        i64::from(rng.gen_range(0..100u32)) < percentage
    }
}

impl Default for RolloutGate {
    fn default() -> Self {
        Self::new()
    }
}

/// The rollout bucket (0-99) a fingerprint falls into. Exposed for
/// debugging and analytics.
pub fn rollout_bucket(fingerprint: &str) -> u32 {
    let sum: u32 = fingerprint.bytes().map(u32::from).sum();
    sum % 100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_rollout_always_serves() {
        let gate = RolloutGate::new();
        assert!(gate.should_serve(100, "device-a"));
        assert!(gate.should_serve(150, ""));
    }

    #[test]
    fn zero_rollout_never_serves() {
        let gate = RolloutGate::new();
        assert!(!gate.should_serve(0, "device-a"));
        assert!(!gate.should_serve(-5, ""));
    }

    #[test]
    fn fingerprinted_rollout_is_deterministic() {
        let gate = RolloutGate::new();
        for pct in [1, 25, 50, 75, 99] {
            let first = gate.should_serve(pct, "device-a");
            for _ in 0..50 {
                assert_eq!(gate.should_serve(pct, "device-a"), first);
            }
        }
    }

    #[test]
    fn equal_byte_sums_share_a_bucket() {
        // "ab" and "ba" have the same byte sum.
        assert_eq!(rollout_bucket("ab"), rollout_bucket("ba"));
        let gate = RolloutGate::new();
        for pct in 1..100 {
            assert_eq!(gate.should_serve(pct, "ab"), gate.should_serve(pct, "ba"));
        }
    }

    #[test]
    fn rollout_is_monotonic_in_percentage() {
        let gate = RolloutGate::new();
        let fingerprint = "monotonic-device";
        let mut served = false;
        for pct in 0..=100 {
            let now = gate.should_serve(pct, fingerprint);
            if served {
                assert!(now, "serving must not revert as percentage grows");
            }
            served = now;
        }
        assert!(served);
    }

    #[test]
    fn bucket_matches_serve_threshold() {
        let fingerprint = "bucket-check";
        let bucket = rollout_bucket(fingerprint);
        let gate = RolloutGate::new();
        assert!(gate.should_serve(i64::from(bucket) + 1, fingerprint));
        assert!(!gate.should_serve(i64::from(bucket), fingerprint));
    }
}
