//! Deterministic local embedding generator.
//!
//! Used once an index has given up on its backend. The text's SHA-256 digest
//! seeds a counter-mode expansion: block `i` is `SHA-256(seed || i)`, each
//! block yields eight `u32` words mapped onto [-1, 1], and the result is
//! normalized to a unit vector. Same text and dimension, same vector, in every
//! process.

use concord_core::EmbeddingVector;
use sha2::{Digest, Sha256};

/// Model identifier attached to fallback vectors.
pub const FALLBACK_MODEL_ID: &str = "concord-fallback";

const DOMAIN_TAG: &[u8] = b"concord-fallback-v1";

/// Generate the fallback embedding of `text` with `dimensions` components.
pub fn fallback_embedding(text: &str, dimensions: usize) -> EmbeddingVector {
    let dimensions = dimensions.max(1);

    let mut hasher = Sha256::new();
    hasher.update(DOMAIN_TAG);
    hasher.update(text.as_bytes());
    let seed = hasher.finalize();

    let mut data = Vec::with_capacity(dimensions);
    let mut block: u64 = 0;
    while data.len() < dimensions {
        let mut hasher = Sha256::new();
        hasher.update(seed);
        hasher.update(block.to_le_bytes());
        let digest = hasher.finalize();

        for word in digest.chunks_exact(4) {
            if data.len() == dimensions {
                break;
            }
            let raw = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
            data.push(((raw as f64 / u32::MAX as f64) * 2.0 - 1.0) as f32);
        }
        block += 1;
    }

    let norm: f32 = data.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut data {
            *x /= norm;
        }
    } else {
        data[0] = 1.0;
    }

    EmbeddingVector::new(data, FALLBACK_MODEL_ID.to_string())
}
