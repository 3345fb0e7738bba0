//! Text transforms: tokenization, stop-word removal, and hashing
//! featurization into compact sparse vectors.

use std::collections::{HashMap, HashSet};

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

lazy_static! {
    /// Default English stop-word list used by the `RemoveStopWords` step.
    pub static ref STOP_WORDS: HashSet<&'static str> = [
        "a", "about", "above", "after", "again", "all", "also", "am", "an",
        "and", "any", "are", "as", "at", "be", "because", "been", "before",
        "being", "below", "between", "both", "but", "by", "can", "could",
        "did", "do", "does", "doing", "down", "during", "each", "few", "for",
        "from", "further", "had", "has", "have", "having", "he", "her",
        "here", "hers", "him", "his", "how", "i", "if", "in", "into", "is",
        "it", "its", "just", "me", "more", "most", "my", "no", "nor", "not",
        "now", "of", "off", "on", "once", "only", "or", "other", "our",
        "out", "over", "own", "same", "she", "should", "so", "some", "such",
        "than", "that", "the", "their", "them", "then", "there", "these",
        "they", "this", "those", "through", "to", "too", "under", "until",
        "up", "very", "was", "we", "were", "what", "when", "where", "which",
        "while", "who", "whom", "why", "will", "with", "would", "you",
        "your", "yours",
    ]
    .iter()
    .copied()
    .collect();
}

/// Splits text into lower-cased alphanumeric words.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// Drops tokens present in [`struct@STOP_WORDS`].
pub fn remove_stop_words(tokens: &[String]) -> Vec<String> {
    tokens
        .iter()
        .filter(|t| !STOP_WORDS.contains(t.as_str()))
        .cloned()
        .collect()
}

/// FNV-1a over a token's bytes. The bucket assignment is part of the
/// persisted model contract, so the hash must not change between releases.
fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = OFFSET;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// A compact sparse vector: parallel `(index, value)` arrays sorted by
/// index, with an explicit dimensionality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    pub dims: usize,
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseVector {
    pub fn empty(dims: usize) -> Self {
        Self {
            dims,
            indices: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Builds from unordered `(index, value)` entries, combining duplicates.
    pub fn from_entries(dims: usize, entries: HashMap<u32, f32>) -> Self {
        let mut pairs: Vec<(u32, f32)> = entries.into_iter().collect();
        pairs.sort_unstable_by_key(|(i, _)| *i);
        Self {
            dims,
            indices: pairs.iter().map(|(i, _)| *i).collect(),
            values: pairs.iter().map(|(_, v)| *v).collect(),
        }
    }

    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    /// Dot product against a dense slice of length `dims`.
    pub fn dot_dense(&self, dense: &[f32]) -> f32 {
        self.indices
            .iter()
            .zip(&self.values)
            .map(|(&i, &v)| v * dense[i as usize])
            .sum()
    }

    pub fn squared_norm(&self) -> f32 {
        self.values.iter().map(|v| v * v).sum()
    }

    /// Scales to unit L2 norm; an all-zero vector is left unchanged.
    pub fn l2_normalize(&mut self) {
        let norm = self.squared_norm().sqrt();
        if norm > 1e-10 {
            for v in &mut self.values {
                *v /= norm;
            }
        }
    }

    /// Concatenates parts into one vector whose dimensionality is the sum of
    /// the parts', offsetting indices by the preceding parts' sizes.
    pub fn concat(parts: &[&SparseVector]) -> Self {
        let dims = parts.iter().map(|p| p.dims).sum();
        let nnz = parts.iter().map(|p| p.nnz()).sum();
        let mut indices = Vec::with_capacity(nnz);
        let mut values = Vec::with_capacity(nnz);
        let mut offset = 0u32;
        for part in parts {
            indices.extend(part.indices.iter().map(|&i| i + offset));
            values.extend_from_slice(&part.values);
            offset += part.dims as u32;
        }
        Self {
            dims,
            indices,
            values,
        }
    }
}

/// Hashes word unigrams and bigrams into `2^hash_bits` buckets and
/// L2-normalizes the counts. Stateless by construction: tokens never seen
/// during training land in buckets the trainer left at zero weight, so novel
/// inference-time text degrades instead of erroring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashingFeaturizer {
    pub hash_bits: u8,
}

impl Default for HashingFeaturizer {
    fn default() -> Self {
        Self { hash_bits: 16 }
    }
}

impl HashingFeaturizer {
    pub fn new(hash_bits: u8) -> Self {
        Self { hash_bits }
    }

    pub fn dims(&self) -> usize {
        1usize << self.hash_bits
    }

    fn bucket(&self, token: &str) -> u32 {
        (fnv1a(token.as_bytes()) & (self.dims() as u64 - 1)) as u32
    }

    /// Featurizes a token sequence into a normalized sparse count vector.
    pub fn featurize(&self, tokens: &[String]) -> SparseVector {
        let mut counts: HashMap<u32, f32> = HashMap::new();
        for token in tokens {
            *counts.entry(self.bucket(token)).or_insert(0.0) += 1.0;
        }
        for pair in tokens.windows(2) {
            let bigram = format!("{} {}", pair[0], pair[1]);
            *counts.entry(self.bucket(&bigram)).or_insert(0.0) += 1.0;
        }
        let mut vector = SparseVector::from_entries(self.dims(), counts);
        vector.l2_normalize();
        vector
    }
}
