//! Progress display module
//!
//! Styled status lines, spinners and the end-of-build summary.

use crate::partition::DiscriminatorKey;
use bytesize::ByteSize;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};

/// Print the application banner
pub fn print_banner() {
    let banner = r#"
╔══════════════════════════════════════════════════════════════════════════════╗
║                                                                              ║
║   ██████╗ ██╗      █████╗  ██████╗██╗  ██╗██╗     ██╗███████╗████████╗      ║
║   ██╔══██╗██║     ██╔══██╗██╔════╝██║ ██╔╝██║     ██║██╔════╝╚══██╔══╝      ║
║   ██████╔╝██║     ███████║██║     █████╔╝ ██║     ██║███████╗   ██║         ║
║   ██╔══██╗██║     ██╔══██║██║     ██╔═██╗ ██║     ██║╚════██║   ██║         ║
║   ██████╔╝███████╗██║  ██║╚██████╗██║  ██╗███████╗██║███████║   ██║         ║
║   ╚═════╝ ╚══════╝╚═╝  ╚═╝ ╚═════╝╚═╝  ╚═╝╚══════╝╚═╝╚══════╝   ╚═╝         ║
║                                                                              ║
║                  Indexed Blacklists From Plaintext Wordlists                 ║
║                                                              v1.0.0          ║
╚══════════════════════════════════════════════════════════════════════════════╝
"#;

    println!("{}", banner.green());
}

/// Print a section header
pub fn print_header(text: &str) {
    println!("\n{} {}", "▶".green(), text.green().bold());
}

/// Print an info message
pub fn print_info(text: &str) {
    println!("  {} {}", "ℹ".cyan(), text);
}

/// Print a success message
pub fn print_success(text: &str) {
    println!("  {} {}", "✔".green(), text.green());
}

/// Print a warning message
pub fn print_warning(text: &str) {
    println!("  {} {}", "⚠".yellow(), text.yellow());
}

/// Print an error message
pub fn print_error(text: &str) {
    eprintln!("  {} {}", "✖".red(), text.red());
}

/// Print a bullet point
pub fn print_bullet(text: &str) {
    println!("  {} {}", "•".green(), text);
}

/// Create a styled progress bar counting rows
pub fn create_progress_bar(total: u64, msg: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);

    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.green/dim}] {human_pos}/{human_len} rows ({per_sec}) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░"),
    );

    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));

    pb
}

/// Create a styled spinner for indeterminate progress
pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();

    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "),
    );

    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));

    pb
}

/// Statistics collected over one build
#[derive(Debug, Clone)]
pub struct BuildStats {
    pub input_bytes: u64,
    pub lines: u64,
    pub blank_lines: u64,
    pub words: u64,
    pub buckets: u64,
    pub duplicates_removed: u64,
    pub rows_written: u64,
    pub largest_buckets: Vec<(DiscriminatorKey, usize)>,
    pub start_time: Instant,
}

impl BuildStats {
    pub fn new() -> Self {
        Self {
            input_bytes: 0,
            lines: 0,
            blank_lines: 0,
            words: 0,
            buckets: 0,
            duplicates_removed: 0,
            rows_written: 0,
            largest_buckets: Vec::new(),
            start_time: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn words_per_second(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.words as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Mean residuals per bucket
    pub fn average_bucket(&self) -> f64 {
        if self.buckets == 0 {
            0.0
        } else {
            (self.words - self.duplicates_removed) as f64 / self.buckets as f64
        }
    }

    /// Print final statistics
    pub fn print_summary(&self, show_buckets: bool) {
        println!();
        println!("{}", "═".repeat(60).green());
        println!("{}", "                     BUILD COMPLETE".green().bold());
        println!("{}", "═".repeat(60).green());
        println!();

        println!("  {} {}", "Input size:     ".green(), ByteSize(self.input_bytes));
        println!("  {} {}", "Lines read:     ".green(), format_number(self.lines));
        println!("  {} {}", "Blank lines:    ".green(), format_number(self.blank_lines));
        println!("  {} {}", "Words:          ".green(), format_number(self.words));
        if self.duplicates_removed > 0 {
            println!(
                "  {} {}",
                "Duplicates:     ".yellow(),
                format_number(self.duplicates_removed)
            );
        }
        println!("  {} {}", "Buckets:        ".green(), format_number(self.buckets));
        println!(
            "  {} {}",
            "Rows written:   ".green().bold(),
            format_number(self.rows_written).green().bold()
        );

        if show_buckets {
            println!();
            println!("  {} {:.1}", "Avg bucket:     ".green(), self.average_bucket());
            for (key, size) in &self.largest_buckets {
                println!("  {} {} {}", "•".green(), key, format_number(*size as u64));
            }
        }

        println!();
        println!("  {} {}", "Duration:       ".green(), format_duration(self.elapsed()));
        println!(
            "  {} {:.2} words/sec",
            "Throughput:     ".green(),
            self.words_per_second()
        );
        println!();
        println!("{}", "═".repeat(60).green());
    }
}

impl Default for BuildStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a number with thousand separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    let chars: Vec<char> = s.chars().collect();

    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }

    result
}

/// Format duration as human-readable string
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();

    if secs < 60 {
        format!("{:.1}s", duration.as_secs_f64())
    } else if secs < 3600 {
        let mins = secs / 60;
        let secs = secs % 60;
        format!("{}m {}s", mins, secs)
    } else {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        format!("{}h {}m", hours, mins)
    }
}
