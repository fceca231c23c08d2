//! Per-reduce-worker aggregation: key -> values in arrival order

use std::collections::HashMap;

use crate::error::AggregationError;
use crate::protocol::Pair;

/// One key and every value seen for it, in append order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyGroup {
    key: String,
    values: Vec<String>,
}

impl KeyGroup {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn into_parts(self) -> (String, Vec<String>) {
        (self.key, self.values)
    }
}

/// Groups in first-seen key order, with a hash index for lookups
#[derive(Debug, Default)]
pub struct KeyMultimap {
    index: HashMap<String, usize>,
    groups: Vec<KeyGroup>,
    values: usize,
}

impl KeyMultimap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the pair's value to its key's group, creating the group on first sight.
    pub fn insert(&mut self, pair: Pair) -> Result<(), AggregationError> {
        let (key, value) = pair.into_parts();

        if let Some(&slot) = self.index.get(&key) {
            let values = &mut self.groups[slot].values;
            values
                .try_reserve(1)
                .map_err(|source| AggregationError { key, source })?;
            values.push(value);
        } else {
            if let Err(source) = self
                .groups
                .try_reserve(1)
                .and_then(|_| self.index.try_reserve(1))
            {
                return Err(AggregationError { key, source });
            }
            self.index.insert(key.clone(), self.groups.len());
            self.groups.push(KeyGroup {
                key,
                values: vec![value],
            });
        }

        self.values += 1;
        Ok(())
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of values across all groups
    pub fn value_count(&self) -> usize {
        self.values
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.index
            .get(key)
            .map(|&slot| self.groups[slot].values.as_slice())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|g| g.key.as_str())
    }

    /// Consume the map, yielding groups in first-seen order.
    ///
    /// Each group is owned by the caller and freed as soon as it is dropped.
    pub fn into_groups(self) -> std::vec::IntoIter<KeyGroup> {
        self.groups.into_iter()
    }
}
