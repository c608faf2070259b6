//! Compact binary representation of embeddings.
//!
//! Vectors are stored as packed little-endian `f32` values. When serialized
//! through serde (e.g. inside a JSON record) the bytes travel as a base64
//! string rather than a textual list of floats.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};

const BYTES_PER_COMPONENT: usize = std::mem::size_of::<f32>();

/// An embedding in its persisted byte form.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EncodedEmbedding(Vec<u8>);

impl EncodedEmbedding {
    /// Pack a vector into little-endian bytes.
    pub fn encode(embedding: &[f32]) -> Self {
        let mut bytes = Vec::with_capacity(embedding.len() * BYTES_PER_COMPONENT);
        for value in embedding {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        Self(bytes)
    }

    /// Wrap raw bytes without checking them. Decoding validates.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Raw byte view.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Number of components this blob claims to hold.
    pub fn dimension(&self) -> usize {
        self.0.len() / BYTES_PER_COMPONENT
    }

    /// Unpack the vector.
    ///
    /// Fails on an empty blob, a length that is not a whole number of
    /// components, or any non-finite component.
    pub fn decode(&self) -> Result<Embedding> {
        if self.0.is_empty() {
            return Err(EmbeddingError::Decode("empty vector".to_string()));
        }
        if self.0.len() % BYTES_PER_COMPONENT != 0 {
            return Err(EmbeddingError::Decode(format!(
                "{} bytes is not a multiple of {BYTES_PER_COMPONENT}",
                self.0.len()
            )));
        }

        let mut embedding = Vec::with_capacity(self.dimension());
        for (position, chunk) in self.0.chunks_exact(BYTES_PER_COMPONENT).enumerate() {
            let value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            if !value.is_finite() {
                return Err(EmbeddingError::Decode(format!(
                    "non-finite component at position {position}"
                )));
            }
            embedding.push(value);
        }

        Ok(embedding)
    }
}

impl Serialize for EncodedEmbedding {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for EncodedEmbedding {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(Self)
            .map_err(serde::de::Error::custom)
    }
}
