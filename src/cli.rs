//! Command-line interface definition for password-blacklist
//!
//! Provides argument parsing and validation for the blacklist builder.

use clap::Parser;
use std::path::PathBuf;

/// Build an indexed password blacklist from a plaintext wordlist
///
/// Words are bucketed by first character and length and written to a SQLite
/// database with an index over both, ready for point lookups.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "password-blacklist",
    author = "m0h1nd4",
    version,
    about = "Build an indexed SQLite password blacklist from a wordlist",
    long_about = r#"
╔══════════════════════════════════════════════════════════════════════════════╗
║                        PASSWORD-BLACKLIST v1.0.0                             ║
║                  Indexed Blacklists From Plaintext Wordlists                 ║
╚══════════════════════════════════════════════════════════════════════════════╝

Reads a wordlist (one password per line), buckets every word by its first
character and length, and writes the result to a SQLite database:

    CREATE TABLE blacklist (first_letter character(1), length integer, suffix varchar(255))
    CREATE INDEX idx ON blacklist (first_letter, length)

A password P is blacklisted when a row exists with first_letter = P[0],
length = len(P) and suffix = P[1:].

EXAMPLES:
    # Build a blacklist
    password-blacklist rockyou.txt blacklist.db

    # Drop repeated words and check the result afterwards
    password-blacklist rockyou.txt blacklist.db --dedup --verify

    # Show bucket statistics without writing anything
    password-blacklist rockyou.txt blacklist.db --dry-run --stats
"#,
    after_help = "For more information, visit: https://github.com/m0h1nd4/password-blacklist"
)]
pub struct Args {
    /// Wordlist file, one password per line
    #[arg(value_name = "WORDLIST")]
    pub wordlist: PathBuf,

    /// Database file to create (must not exist)
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Remove repeated words instead of storing one row per occurrence
    #[arg(long, default_value_t = false)]
    pub dedup: bool,

    /// Number of threads for partitioning (default: auto-detect)
    #[arg(short = 't', long, value_name = "NUM")]
    pub threads: Option<usize>,

    /// SQLite page cache size while building (e.g., "64MB", "1GB")
    #[arg(long, value_name = "SIZE", default_value = "64MB")]
    pub cache_size: String,

    /// Re-open the database after writing and check its contents
    #[arg(long, default_value_t = false)]
    pub verify: bool,

    /// Show bucket statistics
    #[arg(long, default_value_t = false)]
    pub stats: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, default_value_t = false)]
    pub quiet: bool,

    /// Verbose mode - detailed logging
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Dry run - partition the wordlist without writing the database
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

impl Args {
    /// Parse the cache size to bytes
    pub fn parse_cache_size(&self) -> anyhow::Result<usize> {
        parse_size(&self.cache_size)
    }

    /// Threads to partition with, defaulting to the CPU count
    pub fn thread_count(&self) -> usize {
        self.threads.unwrap_or_else(num_cpus::get).max(1)
    }
}

/// Parse human-readable size string to bytes
pub fn parse_size(size_str: &str) -> anyhow::Result<usize> {
    let size_str = size_str.trim().to_uppercase();

    let (num_str, multiplier) = if let Some(n) = size_str.strip_suffix("GB") {
        (n, 1024 * 1024 * 1024)
    } else if let Some(n) = size_str.strip_suffix("MB") {
        (n, 1024 * 1024)
    } else if let Some(n) = size_str.strip_suffix("KB") {
        (n, 1024)
    } else if let Some(n) = size_str.strip_suffix('B') {
        (n, 1)
    } else {
        (size_str.as_str(), 1)
    };

    let num: usize = num_str
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid size format: '{}'", size_str))?;

    num.checked_mul(multiplier)
        .ok_or_else(|| anyhow::anyhow!("Size too large: '{}'", size_str))
}
