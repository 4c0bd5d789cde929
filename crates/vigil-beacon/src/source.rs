use crate::canonical::compute_challenge;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One draw from a randomness source, kept alongside the panel it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconOutput {
    pub round: u64,
    #[serde(with = "hex_bytes")]
    pub randomness: [u8; 32],
    pub contributors: usize,
}

/// External verifiable randomness. `subject` is the id the draw is for, so two
/// draws for different tasks never share randomness.
#[async_trait]
pub trait RandomnessSource: Send + Sync {
    async fn draw(&self, domain: &str, subject: u64) -> Result<BeaconOutput>;
}

/// Randomness from a published seed. Anyone holding the seed can recompute
/// every panel.
#[derive(Debug, Clone)]
pub struct SeededBeacon {
    seed: [u8; 32],
}

impl SeededBeacon {
    pub fn new(seed: [u8; 32]) -> Self {
        Self { seed }
    }

    pub fn from_phrase(phrase: &str) -> Self {
        Self::new(*blake3::hash(phrase.as_bytes()).as_bytes())
    }

    pub fn seed(&self) -> &[u8; 32] {
        &self.seed
    }
}

#[async_trait]
impl RandomnessSource for SeededBeacon {
    /// `blake3(domain || 0x00 || seed || subject_le)`, round = subject.
    async fn draw(&self, domain: &str, subject: u64) -> Result<BeaconOutput> {
        Ok(BeaconOutput {
            round: subject,
            randomness: compute_challenge(&self.seed, domain, &[&subject.to_le_bytes()]),
            contributors: 1,
        })
    }
}

pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 32 bytes"))
    }
}
