//! Embedding blob codec.
//!
//! Embeddings are stored in SQLite `BLOB` columns as packed little-endian
//! `f32` values with no header. The dimension is implied by the length.

use crate::error::{Error, Result};

/// Pack an embedding into little-endian bytes.
pub fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Unpack an embedding previously written by [`encode_embedding`].
pub fn decode_embedding(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(Error::InvalidBlob(bytes.len()));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_is_little_endian() {
        let bytes = encode_embedding(&[1.0]);
        assert_eq!(bytes, vec![0x00, 0x00, 0x80, 0x3f]);
    }

    #[test]
    fn test_decode_restores_values() {
        let v = vec![0.25, -1.5, 3.0e-3];
        assert_eq!(decode_embedding(&encode_embedding(&v)).unwrap(), v);
    }

    #[test]
    fn test_truncated_blob_rejected() {
        assert_eq!(decode_embedding(&[0, 0, 128]), Err(Error::InvalidBlob(3)));
    }

    #[test]
    fn test_empty_blob_is_empty_vector() {
        assert!(decode_embedding(&[]).unwrap().is_empty());
    }
}
