//! Password Blacklist - build indexed blacklists from plaintext wordlists
//!
//! Main entry point for the command-line application.

use clap::Parser;
use std::process;

use password_blacklist::builder::{BuildConfig, Builder};
use password_blacklist::cli::Args;
use password_blacklist::progress::{print_banner, print_error, print_header, print_info};

fn main() {
    // Parse command-line arguments
    let args = Args::parse();

    // Set up logging
    if args.verbose {
        std::env::set_var("RUST_LOG", "debug");
    } else if !args.quiet {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    // Configure thread pool
    if let Some(threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .ok();
    }

    if let Err(e) = run(args) {
        print_error(&format!("{}", e));

        // Print chain of errors
        for cause in e.chain().skip(1) {
            print_error(&format!("  Caused by: {}", cause));
        }

        process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    if !args.quiet {
        print_banner();
    }

    validate_args(&args)?;

    let config = BuildConfig::from_args(&args)?;

    if !args.quiet && args.verbose {
        print_config(&config);
    }

    Builder::new(config).run()?;

    Ok(())
}

/// Validate command-line arguments
fn validate_args(args: &Args) -> anyhow::Result<()> {
    if !args.wordlist.is_file() {
        anyhow::bail!("Wordlist '{}' not found", args.wordlist.display());
    }

    if !args.dry_run && args.output.exists() {
        anyhow::bail!("File {} already exists", args.output.display());
    }

    if args.threads == Some(0) {
        anyhow::bail!("Thread count must be at least 1");
    }

    args.parse_cache_size()?;

    Ok(())
}

/// Print configuration summary
fn print_config(config: &BuildConfig) {
    print_header("Configuration");

    print_info(&format!("Wordlist:     {:?}", config.wordlist));
    print_info(&format!("Output:       {:?}", config.output));
    print_info(&format!("Dedup:        {}", config.dedup));
    print_info(&format!("Verify:       {}", config.verify));
    print_info(&format!("Threads:      {}", config.threads));
    print_info(&format!("Cache size:   {} MB", config.cache_size / (1024 * 1024)));
}
