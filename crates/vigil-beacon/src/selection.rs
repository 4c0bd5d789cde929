use crate::error::{BeaconError, Result};
use crate::source::{hex_bytes, BeaconOutput};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use vigil_types::AccountAddress;

/// A selected panel together with the beacon output that produced it, so the
/// draw can be recomputed by anyone auditing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelDraw {
    pub members: Vec<AccountAddress>,
    pub round: u64,
    #[serde(with = "hex_bytes")]
    pub randomness: [u8; 32],
}

fn member_score(
    randomness: &[u8; 32],
    domain: &str,
    subject: u64,
    candidate: &AccountAddress,
) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(randomness);
    hasher.update(domain.as_bytes());
    hasher.update(&[0]);
    hasher.update(&subject.to_le_bytes());
    hasher.update(candidate.as_bytes());
    *hasher.finalize().as_bytes()
}

/// Pick `size` distinct members from `candidates`.
///
/// Candidates are deduplicated, ranked by `H(randomness || domain || 0x00 ||
/// subject_le || candidate)` with the address as tie-break, and the lowest `size` scores win.
/// The result does not depend on the order candidates are passed in.
pub fn select_panel(
    output: &BeaconOutput,
    domain: &str,
    subject: u64,
    candidates: &[AccountAddress],
    size: usize,
) -> Result<PanelDraw> {
    let unique: BTreeSet<AccountAddress> = candidates.iter().copied().collect();
    if unique.len() < size {
        return Err(BeaconError::NotEnoughCandidates {
            requested: size,
            available: unique.len(),
        });
    }

    let mut scored: Vec<([u8; 32], AccountAddress)> = unique
        .into_iter()
        .map(|c| (member_score(&output.randomness, domain, subject, &c), c))
        .collect();
    scored.sort();

    Ok(PanelDraw {
        members: scored.into_iter().take(size).map(|(_, c)| c).collect(),
        round: output.round,
        randomness: output.randomness,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn output(byte: u8) -> BeaconOutput {
        BeaconOutput {
            round: 1,
            randomness: [byte; 32],
            contributors: 1,
        }
    }

    fn candidates(n: usize) -> Vec<AccountAddress> {
        (0..n)
            .map(|i| AccountAddress::from_label(&format!("verifier-{}", i)))
            .collect()
    }

    #[test]
    fn test_panel_is_distinct_and_sized() {
        let mut pool = candidates(6);
        pool.push(pool[0]);
        let draw = select_panel(&output(7), "verifier-panel", 1, &pool, 5).unwrap();

        let unique: BTreeSet<_> = draw.members.iter().collect();
        assert_eq!(draw.members.len(), 5);
        assert_eq!(unique.len(), 5);
    }

    #[test]
    fn test_not_enough_candidates() {
        let pool = candidates(2);
        assert_eq!(
            select_panel(&output(7), "verifier-panel", 1, &pool, 3),
            Err(BeaconError::NotEnoughCandidates {
                requested: 3,
                available: 2
            })
        );
    }

    #[test]
    fn test_randomness_changes_panel() {
        let pool = candidates(20);
        let panels: BTreeSet<Vec<AccountAddress>> = (0u8..8)
            .map(|b| select_panel(&output(b), "verifier-panel", 1, &pool, 3).unwrap().members)
            .collect();
        assert!(panels.len() > 1);
    }

    proptest! {
        #[test]
        fn prop_order_independent(seed in any::<u8>(), n in 3usize..12, rotate in 0usize..12) {
            let pool = candidates(n);
            let mut rotated = pool.clone();
            rotated.rotate_left(rotate % n);

            let a = select_panel(&output(seed), "arbitrator-panel", 9, &pool, 3).unwrap();
            let b = select_panel(&output(seed), "arbitrator-panel", 9, &rotated, 3).unwrap();
            prop_assert_eq!(a, b);
        }
    }
}
