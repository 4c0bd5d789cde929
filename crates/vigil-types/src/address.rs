use crate::error::{Result, TypesError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

fn decode_32(s: &str) -> Result<[u8; 32]> {
    let trimmed = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(trimmed).map_err(|e| TypesError::InvalidHex(e.to_string()))?;
    if bytes.len() != 32 {
        return Err(TypesError::InvalidLength {
            expected: 32,
            actual: bytes.len(),
        });
    }
    let mut arr = [0u8; 32];
    arr.copy_from_slice(&bytes);
    Ok(arr)
}

/// 32-byte account identity on the ledger.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountAddress([u8; 32]);

impl AccountAddress {
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Deterministic protocol-owned account, e.g. the custody account of task 12
    /// is `derive("vigil/task-escrow", 12)`.
    pub fn derive(domain: &str, index: u64) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"vigil/account");
        hasher.update(domain.as_bytes());
        hasher.update(&index.to_le_bytes());
        Self(hasher.finalize().into())
    }

    /// Address for a human-readable label, used by scripted runs and tests.
    pub fn from_label(label: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"vigil/label");
        hasher.update(label.as_bytes());
        Self(hasher.finalize().into())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        decode_32(s).map(Self)
    }

    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl fmt::Debug for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountAddress({}...)", self.short())
    }
}

impl fmt::Display for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.short())
    }
}

impl Serialize for AccountAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for AccountAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Hash committing to private subject data. The data itself never enters the protocol.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubjectCommitment([u8; 32]);

impl SubjectCommitment {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Commit to subject data held off-protocol.
    pub fn commit(data: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"vigil/subject");
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        decode_32(s).map(Self)
    }
}

impl fmt::Debug for SubjectCommitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubjectCommitment({}...)", &self.to_hex()[..16])
    }
}

impl Serialize for SubjectCommitment {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for SubjectCommitment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_accounts_are_distinct() {
        let a = AccountAddress::derive("vigil/task-escrow", 1);
        let b = AccountAddress::derive("vigil/task-escrow", 2);
        let c = AccountAddress::derive("vigil/worker-stakes", 1);

        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, AccountAddress::derive("vigil/task-escrow", 1));
    }

    #[test]
    fn test_hex_parsing() {
        let addr = AccountAddress::from_label("alice");
        let parsed = AccountAddress::from_hex(&format!("0x{}", addr.to_hex())).unwrap();
        assert_eq!(addr, parsed);

        assert!(matches!(
            AccountAddress::from_hex("abcd"),
            Err(TypesError::InvalidLength { expected: 32, actual: 2 })
        ));
        assert!(matches!(
            AccountAddress::from_hex("zz"),
            Err(TypesError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_subject_commitment_hides_data() {
        let c = SubjectCommitment::commit(b"listing at 42 Example Street");
        assert_ne!(&c.as_bytes()[..], b"listing at 42 Example Street".as_slice());
        assert_eq!(c, SubjectCommitment::commit(b"listing at 42 Example Street"));
    }
}
