//! Embedding vector utilities.
//!
//! Pure helpers for dimension checks, BLOB serialization, and cosine
//! similarity. Embeddings are computed by an external detection pipeline;
//! this module only compares and stores them.

use crate::error::{Error, Result};

/// Default embedding dimensionality (ArcFace / FaceNet-128 family).
pub const DEFAULT_DIMS: usize = 128;

/// Reject an embedding whose length differs from the deployment's `dims`.
pub fn check_dims(embedding: &[f64], dims: usize) -> Result<()> {
    if embedding.len() != dims {
        return Err(Error::invalid(format!(
            "embedding has {} dimensions, expected {}",
            embedding.len(),
            dims
        )));
    }
    if embedding.iter().any(|v| !v.is_finite()) {
        return Err(Error::invalid("embedding contains non-finite values"));
    }
    Ok(())
}

/// Euclidean norm.
///
/// Components are divided by the largest absolute component before
/// squaring, so the sum neither overflows for large values nor underflows
/// to zero for tiny ones.
pub fn magnitude(v: &[f64]) -> f64 {
    let scale = max_abs(v);
    if scale == 0.0 || !scale.is_finite() {
        return scale;
    }
    scale * v.iter().map(|x| (x / scale) * (x / scale)).sum::<f64>().sqrt()
}

fn max_abs(v: &[f64]) -> f64 {
    v.iter().fold(0.0f64, |m, x| m.max(x.abs()))
}

/// Unit vector pointing the same way as `v`, or `None` when `v` is all
/// zeros. Expects finite input; see [`check_dims`].
pub fn normalize(v: &[f64]) -> Option<Vec<f64>> {
    let scale = max_abs(v);
    if scale == 0.0 || !scale.is_finite() {
        return None;
    }
    let scaled: Vec<f64> = v.iter().map(|x| x / scale).collect();
    let norm = magnitude(&scaled);
    Some(scaled.into_iter().map(|x| x / norm).collect())
}

/// Encode a vector as a BLOB (little-endian f64 bytes).
///
/// ```rust
/// use facefind_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f64, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 24);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f64]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 8);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB written by [`vec_to_blob`]. Trailing partial values are
/// ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f64> {
    blob.chunks_exact(8)
        .map(|chunk| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(chunk);
            f64::from_le_bytes(buf)
        })
        .collect()
}

/// Cosine similarity between a unit-length query and a stored embedding.
///
/// `unit_query` comes from [`normalize`], so a scan over many faces
/// normalizes the query once. The stored vector is rescaled by its largest
/// component, which makes the result independent of its absolute
/// magnitude. Returns `None` when the stored vector is all zeros or the
/// lengths differ. The result is clamped to `[-1.0, 1.0]` to absorb
/// rounding error.
pub fn cosine_similarity(unit_query: &[f64], other: &[f64]) -> Option<f64> {
    if unit_query.len() != other.len() || unit_query.is_empty() {
        return None;
    }
    let scale = max_abs(other);
    if scale == 0.0 || !scale.is_finite() {
        return None;
    }

    let mut dot = 0.0f64;
    let mut norm_other = 0.0f64;
    for (q, o) in unit_query.iter().zip(other.iter()) {
        let o = o / scale;
        dot += q * o;
        norm_other += o * o;
    }

    let similarity = dot / norm_other.sqrt();
    if similarity.is_nan() {
        return None;
    }
    Some(similarity.clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sim(a: &[f64], b: &[f64]) -> Option<f64> {
        cosine_similarity(&normalize(a)?, b)
    }

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f64, -2.5, 3.125, 0.0, -0.001];
        assert_eq!(blob_to_vec(&vec_to_blob(&vec)), vec);
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![0.3, -1.2, 4.0];
        assert!((sim(&v, &v).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_cosine_scale_invariant() {
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![10.0, 20.0, 30.0];
        assert!((sim(&a, &b).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let s = sim(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]).unwrap();
        assert!(s.abs() < 1e-12);
    }

    #[test]
    fn test_cosine_opposite() {
        let s = sim(&[1.0, 0.0], &[-1.0, 0.0]).unwrap();
        assert!((s + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_cosine_zero_magnitude_excluded() {
        assert_eq!(sim(&[1.0, 0.0], &[0.0, 0.0]), None);
    }

    #[test]
    fn test_cosine_independent_of_magnitude() {
        for scale in [1e-9, 1e-17, 1e-300, 1e200, 1e300] {
            let v: Vec<f64> = [0.3, -1.2, 4.0, 0.5].iter().map(|x| x * scale).collect();
            let s = sim(&v, &v).unwrap();
            assert!((s - 1.0).abs() < 1e-12, "scale {}: got {}", scale, s);
        }

        let small = [1e-9, 2e-9, 0.0];
        let large = [1e200, 2e200, 0.0];
        assert!((sim(&small, &large).unwrap() - 1.0).abs() < 1e-12);
        assert!((sim(&large, &small).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_tiny_nonzero_vector_normalizes() {
        let unit = normalize(&[1e-17, 0.0]).unwrap();
        assert_eq!(unit, vec![1.0, 0.0]);
        assert_eq!(normalize(&[0.0, 0.0]), None);
        assert_eq!(normalize(&[-0.0]), None);
    }

    #[test]
    fn test_magnitude_without_overflow() {
        assert!((magnitude(&[3.0, 4.0]) - 5.0).abs() < 1e-12);
        assert!((magnitude(&[3e200, 4e200]) / 5e200 - 1.0).abs() < 1e-12);
        assert!((magnitude(&[3e-200, 4e-200]) / 5e-200 - 1.0).abs() < 1e-12);
        assert_eq!(magnitude(&[0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_cosine_different_lengths() {
        assert_eq!(sim(&[1.0, 2.0], &[1.0]), None);
    }

    #[test]
    fn test_check_dims() {
        assert!(check_dims(&[0.0; 4], 4).is_ok());
        assert!(matches!(
            check_dims(&[0.0; 3], 4),
            Err(Error::InvalidInput(_))
        ));
        assert!(check_dims(&[f64::NAN, 0.0], 2).is_err());
    }
}
