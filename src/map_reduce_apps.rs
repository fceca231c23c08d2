use std::sync::LazyLock;

use regex::Regex;

use crate::common::MapReduceApp;
use crate::error::PairError;
use crate::protocol::{Pair, MAX_KEY_LEN};

static WORDS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[a-zA-Z0-9]+\b").expect("invalid regex"));

/// Counts case-insensitive word occurrences
pub struct WordCount {}

impl MapReduceApp for WordCount {
    fn map(&self, chunk: &[u8]) -> Result<Vec<Pair>, PairError> {
        let contents = String::from_utf8_lossy(chunk);
        WORDS_REGEX
            .find_iter(&contents)
            .map(|w| w.as_str().to_lowercase())
            // a word that cannot be a key is not a word we count
            .filter(|w| w.len() <= MAX_KEY_LEN)
            .map(|w| Pair::new(w, "1"))
            .collect()
    }

    fn reduce(&self, key: &str, values: Vec<String>) -> Result<Pair, PairError> {
        Pair::new(key, values.len().to_string())
    }
}
