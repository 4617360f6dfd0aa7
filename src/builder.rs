//! Build pipeline
//!
//! Loads the wordlist, partitions it, and writes the blacklist database.

use crate::cli::Args;
use crate::index::{IndexWriter, WriterConfig};
use crate::partition::{partition, partition_parallel, PartitionTable};
use crate::progress::{
    create_progress_bar, create_spinner, print_bullet, print_header, print_info, print_success,
    print_warning, BuildStats,
};
use crate::wordlist::load_words;

use anyhow::Context;
use bytesize::ByteSize;
use colored::*;
use indicatif::ProgressBar;
use std::path::PathBuf;

/// Number of largest buckets reported with `--stats`
const REPORTED_BUCKETS: usize = 10;

/// Build configuration
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub wordlist: PathBuf,
    pub output: PathBuf,
    pub dedup: bool,
    pub threads: usize,
    pub cache_size: usize,
    pub verify: bool,
    pub show_buckets: bool,
    pub dry_run: bool,
    pub quiet: bool,
    pub verbose: bool,
}

impl BuildConfig {
    pub fn from_args(args: &Args) -> anyhow::Result<Self> {
        Ok(Self {
            wordlist: args.wordlist.clone(),
            output: args.output.clone(),
            dedup: args.dedup,
            threads: args.thread_count(),
            cache_size: args.parse_cache_size()?,
            verify: args.verify,
            show_buckets: args.stats,
            dry_run: args.dry_run,
            quiet: args.quiet,
            verbose: args.verbose,
        })
    }

    /// Defaults for building `wordlist` into `output`
    pub fn new(wordlist: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            wordlist: wordlist.into(),
            output: output.into(),
            dedup: false,
            threads: 1,
            cache_size: 64 * 1024 * 1024,
            verify: false,
            show_buckets: false,
            dry_run: false,
            quiet: true,
            verbose: false,
        }
    }
}

/// Runs one build
pub struct Builder {
    config: BuildConfig,
}

impl Builder {
    pub fn new(config: BuildConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Build the blacklist database and return the collected statistics
    pub fn run(&self) -> anyhow::Result<BuildStats> {
        let mut stats = BuildStats::new();

        self.check_paths()?;

        let table = self.load_and_partition(&mut stats)?;

        if self.config.dry_run {
            self.dry_run_report(&table);
        } else {
            stats.rows_written = self.write(&table)?;
        }

        if !self.config.quiet {
            stats.print_summary(self.config.show_buckets);
        }

        Ok(stats)
    }

    /// Fail before any work if the input is missing or the output exists
    fn check_paths(&self) -> anyhow::Result<()> {
        if !self.config.wordlist.is_file() {
            anyhow::bail!("Wordlist not found: {:?}", self.config.wordlist);
        }
        if !self.config.dry_run && self.config.output.exists() {
            anyhow::bail!("Output file already exists: {:?}", self.config.output);
        }
        Ok(())
    }

    fn load_and_partition(&self, stats: &mut BuildStats) -> anyhow::Result<PartitionTable> {
        if !self.config.quiet {
            print_header("Reading wordlist...");
        }

        let spinner = self.spinner("Reading...");
        let wordlist = load_words(&self.config.wordlist)
            .with_context(|| format!("Failed to read wordlist {:?}", self.config.wordlist))?;
        spinner.finish_and_clear();

        stats.input_bytes = wordlist.bytes;
        stats.lines = wordlist.lines;
        stats.blank_lines = wordlist.blank_lines;

        if !self.config.quiet {
            print_info(&format!(
                "{} ({}, {})",
                self.config.wordlist.display(),
                ByteSize(wordlist.bytes),
                wordlist.encoding
            ));
            print_info(&format!("{} words", wordlist.words.len()));
        }
        log::info!(
            "Loaded {} words from {:?}",
            wordlist.words.len(),
            self.config.wordlist
        );

        if !self.config.quiet {
            print_header("Partitioning...");
        }

        let spinner = self.spinner("Bucketing words...");
        let mut table = if self.config.threads > 1 {
            log::debug!("Partitioning on {} threads", self.config.threads);
            partition_parallel(wordlist.words)
        } else {
            partition(wordlist.words)
        };
        spinner.finish_and_clear();

        stats.words = table.len();

        if table.skipped() > 0 {
            log::warn!("Skipped {} empty words", table.skipped());
        }

        if self.config.dedup {
            stats.duplicates_removed = table.dedup();
            log::info!("Removed {} duplicate words", stats.duplicates_removed);
        }

        stats.buckets = table.bucket_count() as u64;
        stats.largest_buckets = table.largest_buckets(REPORTED_BUCKETS);

        if !self.config.quiet {
            print_info(&format!(
                "{} buckets, {} rows",
                table.bucket_count(),
                table.len()
            ));
        }

        Ok(table)
    }

    fn write(&self, table: &PartitionTable) -> anyhow::Result<u64> {
        if !self.config.quiet {
            print_header("Writing database...");
            print_info(&format!("Output: {:?}", self.config.output));
        }

        let pb = if self.config.quiet {
            ProgressBar::hidden()
        } else {
            create_progress_bar(table.len(), "Inserting...")
        };

        let writer = IndexWriter::new(&self.config.output)
            .with_config(WriterConfig {
                cache_size: Some(self.config.cache_size),
                verify: self.config.verify,
            })
            .with_progress(pb.clone());

        let summary = writer
            .write(table)
            .with_context(|| format!("Failed to write blacklist {:?}", self.config.output))?;

        pb.finish_with_message("Complete".green().to_string());

        if !self.config.quiet {
            if self.config.verify {
                print_success("Row count, index and bucket lookups match");
            }
            print_success(&format!("Blacklist written to {:?}", summary.path));
        }

        Ok(summary.rows_written)
    }

    fn dry_run_report(&self, table: &PartitionTable) {
        if self.config.quiet {
            return;
        }

        print_header("DRY RUN - No database will be written");
        print_bullet(&format!("Output file: {:?}", self.config.output));
        print_bullet(&format!("Rows: {}", table.len()));
        print_bullet(&format!("Buckets: {}", table.bucket_count()));
        print_bullet(&format!(
            "Deduplication: {}",
            if self.config.dedup { "enabled" } else { "disabled" }
        ));

        if self.config.output.exists() {
            print_warning("Output file already exists; a real run would fail");
        }
    }

    fn spinner(&self, msg: &str) -> ProgressBar {
        if self.config.quiet {
            ProgressBar::hidden()
        } else {
            create_spinner(msg)
        }
    }
}
