use crate::types::ArbitrationVote;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use vigil_types::{AccountAddress, DisputeId};

const COMMITMENT_DOMAIN: &[u8] = b"vigil/vote-commitment";

/// Random blinding value mixed into a vote commitment.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Salt(#[serde(with = "crate::types::hex32")] [u8; 32]);

impl Salt {
    pub fn random() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Deterministic salt from a secret phrase, for scripted runs.
    pub fn from_phrase(phrase: &str) -> Self {
        Self(*blake3::hash(phrase.as_bytes()).as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Salt(..)")
    }
}

/// Commitment binding a hidden vote to one arbitrator on one dispute, so a
/// commitment cannot be copied from another panel member.
pub fn vote_commitment(
    dispute_id: DisputeId,
    arbitrator: AccountAddress,
    vote: ArbitrationVote,
    justification: &str,
    salt: &Salt,
) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(COMMITMENT_DOMAIN);
    hasher.update(&dispute_id.value().to_le_bytes());
    hasher.update(arbitrator.as_bytes());
    hasher.update(&[vote.tag()]);
    hasher.update(&(justification.len() as u64).to_le_bytes());
    hasher.update(justification.as_bytes());
    hasher.update(salt.as_bytes());
    *hasher.finalize().as_bytes()
}

/// A vote kept private by its arbitrator until the reveal phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedVote {
    pub vote: ArbitrationVote,
    pub justification: String,
    pub salt: Salt,
}

impl SealedVote {
    pub fn new(vote: ArbitrationVote, justification: impl Into<String>) -> Self {
        Self {
            vote,
            justification: justification.into(),
            salt: Salt::random(),
        }
    }

    pub fn commitment(&self, dispute_id: DisputeId, arbitrator: AccountAddress) -> [u8; 32] {
        vote_commitment(dispute_id, arbitrator, self.vote, &self.justification, &self.salt)
    }
}
