//! # Password Blacklist
//!
//! Builds a SQLite database for fast "is this password blacklisted?" lookups
//! from a plaintext wordlist.
//!
//! Every word is bucketed by its first character and its length in
//! characters. Only the rest of the word (the suffix) is stored, next to the
//! bucket key:
//!
//! ```sql
//! CREATE TABLE blacklist (first_letter character(1), length integer, suffix varchar(255));
//! CREATE INDEX idx ON blacklist (first_letter, length);
//! ```
//!
//! A password `P` is blacklisted when a row exists with
//! `first_letter = P[0]`, `length = len(P)` and `suffix = P[1:]`.
//!
//! ## Usage
//!
//! ```bash
//! password-blacklist rockyou.txt blacklist.db
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use password_blacklist::index::IndexWriter;
//! use password_blacklist::partition::partition;
//!
//! let words = vec!["cat".to_string(), "car".to_string(), "dog".to_string()];
//! let table = partition(words);
//!
//! IndexWriter::new("blacklist.db").write(&table).unwrap();
//! ```

pub mod builder;
pub mod cli;
pub mod index;
pub mod partition;
pub mod progress;
pub mod wordlist;

pub use builder::{BuildConfig, Builder};
pub use cli::Args;
pub use index::{BlacklistIndex, IndexError, IndexWriter};
pub use partition::{DiscriminatorKey, PartitionTable, Partitioner};
