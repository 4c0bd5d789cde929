/// Round randomness: `R_k = H(R_{k-1} || XOR_i H(secret_i))`.
///
/// XOR makes the result independent of reveal order; chaining the previous
/// root means a round cannot be precomputed before its predecessor is final.
pub fn compute_canonical_randomness(root_prev: &[u8; 32], secrets: &[&[u8]]) -> [u8; 32] {
    let mut combined = [0u8; 32];
    for secret in secrets {
        let digest = blake3::hash(secret);
        for (acc, byte) in combined.iter_mut().zip(digest.as_bytes()) {
            *acc ^= byte;
        }
    }

    let mut hasher = blake3::Hasher::new();
    hasher.update(root_prev);
    hasher.update(&combined);
    *hasher.finalize().as_bytes()
}

/// Domain-separated value derived from round randomness.
pub fn compute_challenge(randomness: &[u8; 32], domain: &str, params: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(domain.as_bytes());
    hasher.update(&[0]);
    hasher.update(randomness);
    for param in params {
        hasher.update(param);
    }
    *hasher.finalize().as_bytes()
}
