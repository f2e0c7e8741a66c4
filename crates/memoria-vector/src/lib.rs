//! # memoria-vector
//!
//! Similarity primitives for memoria's SQLite-backed embedding search.
//!
//! Embeddings live next to their rows as packed `f32` blobs. Search loads the
//! candidate rows, decodes their blobs and ranks them by cosine similarity
//! against the query embedding.
//!
//! ```rust
//! use memoria_vector::{decode_embedding, encode_embedding, rank_by_similarity};
//!
//! let stored = encode_embedding(&[0.9, 0.1, 0.0]);
//! let candidate = decode_embedding(&stored).unwrap();
//! let ranked = rank_by_similarity(&[1.0, 0.0, 0.0], vec![("doc", candidate)], 0.3);
//! assert_eq!(ranked[0].item, "doc");
//! ```

#![warn(missing_docs)]

mod blob;
mod distance;
mod error;
mod ranking;

pub use blob::{decode_embedding, encode_embedding};
pub use distance::{cosine_similarity, try_cosine_similarity};
pub use error::{Error, Result};
pub use ranking::{rank_by_similarity, sort_scored, Scored};
