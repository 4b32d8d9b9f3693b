//! # Proof-of-Work Agreement
//!
//! Two nodes that build their buffers independently, one in memory and one
//! through the on-disk buffer file, must score every nonce identically.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::fixtures::*;
    use ln_01_proof_of_work::{BufferFile, PowConfig, PowVerdict, ProofOfWorkGate, RandomBuffer};
    use tempfile::TempDir;

    const PREV: &str = "7a0f384876aca1c0e4e8b36e1cd76a3ef6c1e3e9a5e5e2b4d4ad0e1f";

    fn gates() -> (ProofOfWorkGate, ProofOfWorkGate, TempDir) {
        let dir = TempDir::new().unwrap();
        let config = PowConfig::for_testing(dir.path().join("heavy3a.bin"));
        let in_memory = RandomBuffer::generate(TEST_BUFFER_SIZE).unwrap();
        let on_disk = BufferFile::new(&config.buffer_path, TEST_BUFFER_SIZE).open().unwrap();
        (
            ProofOfWorkGate::new(Arc::new(in_memory), config.clone()),
            ProofOfWorkGate::new(Arc::new(on_disk), config),
            dir,
        )
    }

    #[test]
    fn test_independent_buffers_score_alike() {
        let (a, b, _dir) = gates();
        let miner = keypair(4).address();
        for n in 0..200u32 {
            let nonce = format!("{:08x}", n);
            let score = a.difficulty(&miner, &nonce, PREV);
            assert_eq!(score, b.difficulty(&miner, &nonce, PREV));
            assert_eq!(score, a.difficulty(&miner, &nonce, PREV));
        }
    }

    #[test]
    fn test_verify_accepts_exactly_at_achieved_difficulty() {
        let (gate, _, _dir) = gates();
        let miner = keypair(4).address();
        for n in 0..50u32 {
            let nonce = format!("{:08x}", n);
            let achieved = gate.difficulty(&miner, &nonce, PREV);

            let at = gate.verify_block(&miner, &nonce, PREV, f64::from(achieved), NOW, NOW);
            assert_eq!(
                at,
                Ok(PowVerdict::Accepted {
                    achieved,
                    required: f64::from(achieved)
                })
            );
            let above = gate.verify_block(&miner, &nonce, PREV, f64::from(achieved + 1), NOW, NOW);
            assert!(above.is_err());
        }
    }

    #[test]
    fn test_mined_nonce_is_accepted_by_a_second_node() {
        let (a, b, _dir) = gates();
        let miner = keypair(4).address();
        let nonce = a.mine(&miner, PREV, 10, 1_000_000).unwrap();
        let verdict = b.verify_block(&miner, &nonce, PREV, 10.0, NOW, NOW - 1.0).unwrap();
        assert!(verdict.achieved() >= 10);
    }
}
