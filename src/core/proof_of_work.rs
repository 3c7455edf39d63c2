use crate::core::block::compute_block_hash;
use crate::core::Block;
use crate::error::{BlockchainError, Result};
use std::sync::atomic::{AtomicBool, Ordering};

/// A hash is a 64 character hex string, so anything above this can never be met
pub const MAX_DIFFICULTY: u32 = 64;

/// Nonce search over the header fields of one block.
///
/// The target is expressed as a number of leading `'0'` hex characters.
pub struct ProofOfWork {
    previous_hash: String,
    timestamp: i64,
    merkle_root: String,
    difficulty: u32,
}

/// Winning nonce, the hash it produced and how many hashes were tried
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowSolution {
    pub nonce: u64,
    pub hash: String,
    pub attempts: u64,
}

impl ProofOfWork {
    pub fn new_proof_of_work(
        previous_hash: &str,
        timestamp: i64,
        merkle_root: &str,
        difficulty: u32,
    ) -> Result<ProofOfWork> {
        if difficulty > MAX_DIFFICULTY {
            return Err(BlockchainError::Mining(format!(
                "Difficulty {difficulty} exceeds the maximum of {MAX_DIFFICULTY}"
            )));
        }
        Ok(ProofOfWork {
            previous_hash: previous_hash.to_string(),
            timestamp,
            merkle_root: merkle_root.to_string(),
            difficulty,
        })
    }

    pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
        let difficulty = difficulty as usize;
        hash.len() >= difficulty && hash.bytes().take(difficulty).all(|b| b == b'0')
    }

    /// Validate proof-of-work for a sealed block: the stored hash must be the
    /// digest of the block's own fields and must meet its difficulty.
    pub fn validate(block: &Block) -> bool {
        block.get_hash() == block.calculate_hash()
            && Self::meets_difficulty(block.get_hash(), block.get_difficulty())
    }

    fn prepare_hash(&self, nonce: u64) -> String {
        compute_block_hash(&self.previous_hash, self.timestamp, &self.merkle_root, nonce)
    }

    /// Search nonces from zero upward. `cancel` is polled once per attempt.
    pub fn run(&self, cancel: &AtomicBool) -> Result<PowSolution> {
        let mut nonce: u64 = 0;
        let mut attempts: u64 = 0;
        loop {
            if cancel.load(Ordering::Relaxed) {
                log::info!("Proof-of-work cancelled after {attempts} attempts");
                return Err(BlockchainError::MiningCancelled);
            }

            let hash = self.prepare_hash(nonce);
            attempts += 1;
            if Self::meets_difficulty(&hash, self.difficulty) {
                log::debug!("Found nonce {nonce} after {attempts} attempts: {hash}");
                return Ok(PowSolution {
                    nonce,
                    hash,
                    attempts,
                });
            }

            nonce = nonce.checked_add(1).ok_or_else(|| {
                BlockchainError::Mining("Nonce space exhausted".to_string())
            })?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::sha256_hex;

    fn pow(difficulty: u32, salt: &str) -> ProofOfWork {
        ProofOfWork::new_proof_of_work(salt, 1_700_000_000_000, &sha256_hex(b"root"), difficulty)
            .unwrap()
    }

    #[test]
    fn test_meets_difficulty() {
        assert!(ProofOfWork::meets_difficulty("00ab", 2));
        assert!(!ProofOfWork::meets_difficulty("0ab0", 2));
        assert!(ProofOfWork::meets_difficulty("abc", 0));
        assert!(!ProofOfWork::meets_difficulty("00", 3));
    }

    #[test]
    fn test_run_finds_leading_zeros() {
        let never = AtomicBool::new(false);
        for difficulty in 0..=3 {
            let solution = pow(difficulty, "prev").run(&never).unwrap();
            assert!(solution.hash.starts_with(&"0".repeat(difficulty as usize)));
            assert_eq!(solution.attempts, solution.nonce + 1);
        }
    }

    #[test]
    fn test_run_is_deterministic() {
        let never = AtomicBool::new(false);
        let first = pow(2, "prev").run(&never).unwrap();
        let second = pow(2, "prev").run(&never).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_cancel_stops_search() {
        let cancelled = AtomicBool::new(true);
        assert_eq!(
            pow(8, "prev").run(&cancelled),
            Err(BlockchainError::MiningCancelled)
        );
    }

    #[test]
    fn test_difficulty_above_hash_length_rejected() {
        assert!(ProofOfWork::new_proof_of_work("0", 0, "", MAX_DIFFICULTY + 1).is_err());
    }

    #[test]
    fn test_higher_difficulty_needs_more_work_on_average() {
        // Statistical: averaged over many independent searches, one more hex
        // zero should cost about sixteen times the attempts.
        let never = AtomicBool::new(false);
        let average = |difficulty: u32| -> f64 {
            let total: u64 = (0..24)
                .map(|i| {
                    pow(difficulty, &format!("salt-{i}"))
                        .run(&never)
                        .unwrap()
                        .attempts
                })
                .sum();
            total as f64 / 24.0
        };
        assert!(average(2) > average(1));
    }
}
