//! Word partitioning
//!
//! Groups words into buckets keyed by their first character and length, and
//! keeps only the residual (the word minus its first character) in each
//! bucket. Buckets are sorted before the table is handed to the writer.

use ahash::RandomState;
use hashbrown::HashMap;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fmt;

/// Bucket key: first character and length in characters
///
/// The same derivation must be used when querying the blacklist, otherwise
/// a word lands in a different bucket than the one it was stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DiscriminatorKey {
    first: char,
    length: usize,
}

impl DiscriminatorKey {
    pub fn new(first: char, length: usize) -> Self {
        Self { first, length }
    }

    /// Derive the key of a word, `None` for the empty string
    #[inline]
    pub fn of(word: &str) -> Option<Self> {
        let first = word.chars().next()?;
        Some(Self {
            first,
            length: char_length(word),
        })
    }

    pub fn first(&self) -> char {
        self.first
    }

    pub fn length(&self) -> usize {
        self.length
    }
}

impl fmt::Display for DiscriminatorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "('{}', {})", self.first, self.length)
    }
}

/// Length of a word in characters
#[inline]
pub fn char_length(word: &str) -> usize {
    if word.is_ascii() {
        word.len()
    } else {
        word.chars().count()
    }
}

/// The word without its first character
#[inline]
pub fn residual(word: &str) -> &str {
    let mut chars = word.chars();
    chars.next();
    chars.as_str()
}

/// Accumulates residuals by key for a single build
#[derive(Debug, Default)]
pub struct Partitioner {
    buckets: HashMap<DiscriminatorKey, Vec<String>, RandomState>,
    words: u64,
    skipped: u64,
}

impl Partitioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a word to its bucket
    ///
    /// The word is expected to be trimmed already. An empty word has no key
    /// and is skipped.
    pub fn insert(&mut self, mut word: String) {
        let Some(key) = DiscriminatorKey::of(&word) else {
            log::debug!("Skipping empty word");
            self.skipped += 1;
            return;
        };

        word.replace_range(..key.first.len_utf8(), "");
        self.buckets.entry(key).or_default().push(word);
        self.words += 1;
    }

    /// Fold another partitioner's buckets into this one
    pub fn merge(mut self, other: Partitioner) -> Self {
        // Drain the smaller map into the larger one
        let (mut into, from) = if self.buckets.len() >= other.buckets.len() {
            (std::mem::take(&mut self.buckets), other.buckets)
        } else {
            (other.buckets, std::mem::take(&mut self.buckets))
        };

        for (key, mut residuals) in from {
            into.entry(key).or_default().append(&mut residuals);
        }

        Self {
            buckets: into,
            words: self.words + other.words,
            skipped: self.skipped + other.skipped,
        }
    }

    /// Number of words added so far
    pub fn words(&self) -> u64 {
        self.words
    }

    /// Sort every bucket and produce the final table
    pub fn finish(self) -> PartitionTable {
        let mut buckets: Vec<_> = self.buckets.into_iter().collect();
        buckets
            .par_iter_mut()
            .for_each(|(_, residuals)| residuals.sort_unstable());

        PartitionTable {
            buckets: buckets.into_iter().collect(),
            rows: self.words,
            skipped: self.skipped,
        }
    }
}

impl Extend<String> for Partitioner {
    fn extend<I: IntoIterator<Item = String>>(&mut self, iter: I) {
        for word in iter {
            self.insert(word);
        }
    }
}

/// Partition words on the current thread
pub fn partition<I>(words: I) -> PartitionTable
where
    I: IntoIterator<Item = String>,
{
    let mut partitioner = Partitioner::new();
    partitioner.extend(words);
    partitioner.finish()
}

/// Partition words across the rayon pool
///
/// Each worker fills its own bucket map; maps are merged by key before any
/// bucket is sorted, so the result equals [`partition`] on the same input.
pub fn partition_parallel(words: Vec<String>) -> PartitionTable {
    words
        .into_par_iter()
        .fold(Partitioner::new, |mut partitioner, word| {
            partitioner.insert(word);
            partitioner
        })
        .reduce(Partitioner::new, Partitioner::merge)
        .finish()
}

/// Sorted residuals per key, ordered by key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionTable {
    buckets: BTreeMap<DiscriminatorKey, Vec<String>>,
    rows: u64,
    skipped: u64,
}

/// One persisted row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Row<'a> {
    pub first_letter: char,
    pub length: usize,
    pub suffix: &'a str,
}

impl PartitionTable {
    /// Residuals stored under a key
    pub fn get(&self, key: &DiscriminatorKey) -> Option<&[String]> {
        self.buckets.get(key).map(Vec::as_slice)
    }

    /// Check whether a word was partitioned into this table
    pub fn contains(&self, word: &str) -> bool {
        let Some(key) = DiscriminatorKey::of(word) else {
            return false;
        };
        self.get(&key)
            .map(|bucket| {
                bucket
                    .binary_search_by(|r| r.as_str().cmp(residual(word)))
                    .is_ok()
            })
            .unwrap_or(false)
    }

    /// Buckets in key order
    pub fn buckets(&self) -> impl Iterator<Item = (&DiscriminatorKey, &[String])> {
        self.buckets.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Flattened rows in key order, residuals ascending within a key
    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.buckets.iter().flat_map(|(key, residuals)| {
            residuals.iter().map(move |suffix| Row {
                first_letter: key.first,
                length: key.length,
                suffix,
            })
        })
    }

    /// Number of rows the table flattens into
    pub fn len(&self) -> u64 {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Empty words dropped during partitioning
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// The `n` largest buckets, largest first
    pub fn largest_buckets(&self, n: usize) -> Vec<(DiscriminatorKey, usize)> {
        let mut sizes: Vec<_> = self
            .buckets
            .iter()
            .map(|(key, residuals)| (*key, residuals.len()))
            .collect();
        sizes.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        sizes.truncate(n);
        sizes
    }

    /// Collapse repeated words, returning how many rows were removed
    ///
    /// Key plus residual reconstructs the word, so adjacent equal residuals
    /// in a sorted bucket are exactly the duplicate words.
    pub fn dedup(&mut self) -> u64 {
        let before = self.rows;
        let mut removed = 0u64;
        for residuals in self.buckets.values_mut() {
            let len = residuals.len();
            residuals.dedup();
            removed += (len - residuals.len()) as u64;
        }
        self.rows = before - removed;
        removed
    }
}
