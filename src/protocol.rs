//! Pair records and key partitioning
//!
//! A pair travels between phases as one whole message. On disk it is a
//! fixed-layout record: the key NUL-padded to `MAX_KEY_LEN`, then the value
//! NUL-padded to `MAX_VALUE_LEN`. No length prefix, no delimiter.

use std::hash::Hasher;

use fnv::FnvHasher;

use crate::error::PairError;

pub const MAX_KEY_LEN: usize = 64;
pub const MAX_VALUE_LEN: usize = 256;
pub const RECORD_LEN: usize = MAX_KEY_LEN + MAX_VALUE_LEN;

/// Longest path a filename message may carry
pub const MAX_PATH_LEN: usize = 1024;

/// Bounded key/value record exchanged between map and reduce
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pair {
    key: String,
    value: String,
}

impl Pair {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Result<Self, PairError> {
        let key = key.into();
        let value = value.into();
        if key.len() > MAX_KEY_LEN {
            return Err(PairError::KeyTooLong {
                len: key.len(),
                max: MAX_KEY_LEN,
            });
        }
        if value.len() > MAX_VALUE_LEN {
            return Err(PairError::ValueTooLong {
                len: value.len(),
                max: MAX_VALUE_LEN,
            });
        }
        if key.contains('\0') {
            return Err(PairError::InteriorNul { field: "key" });
        }
        if value.contains('\0') {
            return Err(PairError::InteriorNul { field: "value" });
        }
        Ok(Self { key, value })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn into_parts(self) -> (String, String) {
        (self.key, self.value)
    }

    /// Encode into one fixed-layout record.
    pub fn encode(&self) -> [u8; RECORD_LEN] {
        let mut record = [0u8; RECORD_LEN];
        record[..self.key.len()].copy_from_slice(self.key.as_bytes());
        record[MAX_KEY_LEN..MAX_KEY_LEN + self.value.len()].copy_from_slice(self.value.as_bytes());
        record
    }

    /// Decode one record produced by [`Pair::encode`].
    pub fn decode(record: &[u8]) -> Result<Self, PairError> {
        if record.len() != RECORD_LEN {
            return Err(PairError::RecordLength {
                len: record.len(),
                expected: RECORD_LEN,
            });
        }
        let (key, value) = record.split_at(MAX_KEY_LEN);
        Ok(Self {
            key: decode_field(key, "key")?,
            value: decode_field(value, "value")?,
        })
    }
}

fn decode_field(bytes: &[u8], field: &'static str) -> Result<String, PairError> {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8(bytes[..end].to_vec()).map_err(|_| PairError::InvalidUtf8 { field })
}

/// Reduce worker index owning `key`.
///
/// FNV-1a over the key bytes, so the assignment is identical across runs and
/// machines for the same key universe and `reduce_count`.
pub fn partition(key: &str, reduce_count: usize) -> usize {
    debug_assert!(reduce_count > 0, "partition over an empty reduce pool");
    let mut hasher = FnvHasher::default();
    hasher.write(key.as_bytes());
    (hasher.finish() % reduce_count as u64) as usize
}
