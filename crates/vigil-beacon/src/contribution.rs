use crate::canonical::{compute_canonical_randomness, compute_challenge};
use crate::error::{BeaconError, Result};
use crate::source::{BeaconOutput, RandomnessSource};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use vigil_types::AccountAddress;

#[derive(Debug, Default)]
struct Round {
    commitments: BTreeMap<AccountAddress, [u8; 32]>,
    reveals: BTreeMap<AccountAddress, Vec<u8>>,
}

#[derive(Debug, Clone, Copy)]
struct FinalizedRound {
    round: u64,
    randomness: [u8; 32],
    contributors: usize,
}

#[derive(Debug, Default)]
struct BeaconState {
    open: HashMap<u64, Round>,
    finalized: BTreeMap<u64, FinalizedRound>,
}

/// Commit-reveal randomness beacon.
///
/// Contributors commit `H(secret)` for a round, reveal the secret later and the
/// round is finalized from every valid reveal. Draws use the latest finalized
/// round.
#[derive(Clone)]
pub struct ContributionBeacon {
    genesis_root: [u8; 32],
    state: Arc<RwLock<BeaconState>>,
}

impl ContributionBeacon {
    pub fn new(genesis_root: [u8; 32]) -> Self {
        Self {
            genesis_root,
            state: Arc::new(RwLock::new(BeaconState::default())),
        }
    }

    pub fn commitment_for(secret: &[u8]) -> [u8; 32] {
        *blake3::hash(secret).as_bytes()
    }

    pub async fn commit(
        &self,
        round: u64,
        contributor: AccountAddress,
        commitment: [u8; 32],
    ) -> Result<()> {
        let mut state = self.state.write().await;
        if state.finalized.contains_key(&round) {
            return Err(BeaconError::RoundFinalized { round });
        }
        let entry = state.open.entry(round).or_default();
        if entry.commitments.contains_key(&contributor) {
            return Err(BeaconError::DuplicateCommitment { round, contributor });
        }
        entry.commitments.insert(contributor, commitment);
        debug!(round, contributor = %contributor, "Beacon commitment recorded");
        Ok(())
    }

    pub async fn reveal(
        &self,
        round: u64,
        contributor: AccountAddress,
        secret: &[u8],
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let entry = state
            .open
            .get_mut(&round)
            .ok_or(BeaconError::RoundNotOpen { round })?;
        let expected = entry
            .commitments
            .get(&contributor)
            .ok_or(BeaconError::MissingCommitment { round, contributor })?;
        if *expected != Self::commitment_for(secret) {
            return Err(BeaconError::RevealMismatch { contributor });
        }
        entry.reveals.insert(contributor, secret.to_vec());
        Ok(())
    }

    /// Close the round over whatever has been revealed.
    pub async fn finalize(&self, round: u64) -> Result<[u8; 32]> {
        let mut state = self.state.write().await;
        if state.finalized.contains_key(&round) {
            return Err(BeaconError::RoundFinalized { round });
        }
        let reveals_count = state
            .open
            .get(&round)
            .map(|r| r.reveals.len())
            .unwrap_or(0);
        if reveals_count == 0 {
            return Err(BeaconError::NoContributions { round });
        }

        let root_prev = state
            .finalized
            .range(..round)
            .next_back()
            .map(|(_, f)| f.randomness)
            .unwrap_or(self.genesis_root);

        let entry = state
            .open
            .remove(&round)
            .ok_or(BeaconError::RoundNotOpen { round })?;
        let secrets: Vec<&[u8]> = entry.reveals.values().map(|s| s.as_slice()).collect();
        let randomness = compute_canonical_randomness(&root_prev, &secrets);

        state.finalized.insert(
            round,
            FinalizedRound {
                round,
                randomness,
                contributors: secrets.len(),
            },
        );

        info!(
            round,
            contributors = secrets.len(),
            randomness = %hex::encode(&randomness[..8]),
            "🎲 Beacon round finalized"
        );
        Ok(randomness)
    }

    pub async fn latest_round(&self) -> Option<u64> {
        self.state.read().await.finalized.keys().next_back().copied()
    }
}

#[async_trait]
impl RandomnessSource for ContributionBeacon {
    async fn draw(&self, domain: &str, subject: u64) -> Result<BeaconOutput> {
        let state = self.state.read().await;
        let latest = state
            .finalized
            .values()
            .next_back()
            .copied()
            .ok_or(BeaconError::NoFinalizedRound)?;

        Ok(BeaconOutput {
            round: latest.round,
            randomness: compute_challenge(&latest.randomness, domain, &[&subject.to_le_bytes()]),
            contributors: latest.contributors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(label: &str) -> AccountAddress {
        AccountAddress::from_label(label)
    }

    #[tokio::test]
    async fn test_round_lifecycle() {
        let beacon = ContributionBeacon::new([0u8; 32]);
        assert!(matches!(
            beacon.draw("panel", 1).await,
            Err(BeaconError::NoFinalizedRound)
        ));

        beacon
            .commit(1, addr("a"), ContributionBeacon::commitment_for(b"alpha"))
            .await
            .unwrap();
        beacon
            .commit(1, addr("b"), ContributionBeacon::commitment_for(b"beta"))
            .await
            .unwrap();
        beacon.reveal(1, addr("a"), b"alpha").await.unwrap();
        beacon.reveal(1, addr("b"), b"beta").await.unwrap();
        beacon.finalize(1).await.unwrap();

        let out = beacon.draw("panel", 5).await.unwrap();
        assert_eq!(out.round, 1);
        assert_eq!(out.contributors, 2);
        assert_eq!(beacon.latest_round().await, Some(1));
    }

    #[tokio::test]
    async fn test_reveal_must_match_commitment() {
        let beacon = ContributionBeacon::new([0u8; 32]);
        beacon
            .commit(1, addr("a"), ContributionBeacon::commitment_for(b"alpha"))
            .await
            .unwrap();

        assert!(matches!(
            beacon.reveal(1, addr("a"), b"other").await,
            Err(BeaconError::RevealMismatch { .. })
        ));
        assert!(matches!(
            beacon.reveal(1, addr("b"), b"alpha").await,
            Err(BeaconError::MissingCommitment { .. })
        ));
        assert!(matches!(
            beacon.finalize(1).await,
            Err(BeaconError::NoContributions { round: 1 })
        ));
    }

    #[tokio::test]
    async fn test_rounds_chain() {
        let beacon = ContributionBeacon::new([0u8; 32]);
        for round in 1..=2 {
            beacon
                .commit(round, addr("a"), ContributionBeacon::commitment_for(b"same"))
                .await
                .unwrap();
            beacon.reveal(round, addr("a"), b"same").await.unwrap();
        }
        let r1 = beacon.finalize(1).await.unwrap();
        let r2 = beacon.finalize(2).await.unwrap();
        assert_ne!(r1, r2);
        assert!(matches!(
            beacon.commit(1, addr("b"), [0u8; 32]).await,
            Err(BeaconError::RoundFinalized { round: 1 })
        ));
    }
}
