//! All human-readable output: the scan plan, verbosity-gated progress lines and the
//! final summary. Nothing else in the crate writes to stdout.

use std::fmt::Write as FmtWrite;
use std::io::{self, Write};
use std::path::Path;

use colored::*;

use crate::config::ScanConfig;
use crate::counter::FileTally;
use crate::patterns::GlobRule;
use crate::walker::WalkOutcome;

/// Files listed per histogram bucket below verbosity 4.
const BUCKET_LISTING_LIMIT: usize = 10;

pub struct Reporter {
    writer: Box<dyn Write>,
    verbosity: u8,
}

impl Reporter {
    pub fn new(verbosity: u8) -> Self {
        Reporter::with_writer(Box::new(io::stdout()), verbosity)
    }

    pub fn with_writer(writer: Box<dyn Write>, verbosity: u8) -> Self {
        Reporter { writer, verbosity }
    }

    /// Progress output is best effort; a broken stdout surfaces at the summary.
    fn line(&mut self, min_verbosity: u8, text: std::fmt::Arguments<'_>) {
        if self.verbosity >= min_verbosity {
            let _ = self.writer.write_fmt(text);
            let _ = self.writer.write_all(b"\n");
        }
    }

    /// The rules in effect (verbosity >= 1).
    pub fn plan(&mut self, config: &ScanConfig) -> io::Result<()> {
        if self.verbosity < 1 {
            return Ok(());
        }
        let plan = build_plan(config);
        self.writer.write_all(plan.as_bytes())
    }

    pub fn walk_started(&mut self, root: &Path) {
        self.line(
            2,
            format_args!("analyzing directories in \"{}\"...", root.display()),
        );
    }

    pub fn dir_progress(&mut self, index: usize, total: usize) {
        self.line(
            2,
            format_args!(
                "  - dir analysis {} / {} - {:.2}%",
                index,
                total,
                safe_percentage(index as u64, total as u64)
            ),
        );
    }

    pub fn dir_progress_done(&mut self, total: usize) {
        self.line(
            2,
            format_args!("  - dir analysis {} / {} - 100.00%", total, total),
        );
    }

    pub fn dir_included(&mut self, dir: &Path) {
        self.line(3, format_args!("    - including \"{}\"", dir.display()));
    }

    pub fn dir_excluded(&mut self, dir: &Path) {
        self.line(3, format_args!("    - skipping \"{}\"", dir.display()));
    }

    pub fn count_started(&mut self, candidates: usize, root: &Path) {
        self.line(
            2,
            format_args!(
                "analyzing {} files in \"{}\"...",
                candidates,
                root.display()
            ),
        );
    }

    pub fn file_progress(&mut self, index: usize, total: usize) {
        self.line(
            2,
            format_args!(
                "  - file analysis {} / {} - {:.2}%",
                index,
                total,
                safe_percentage(index as u64, total as u64)
            ),
        );
    }

    pub fn file_progress_done(&mut self, total: usize) {
        self.line(
            2,
            format_args!("  - file analysis {} / {} - 100.00%", total, total),
        );
    }

    pub fn file_viewing(&mut self, file: &Path) {
        self.line(4, format_args!("  - viewing \"{}\"", file.display()));
    }

    pub fn file_checking(&mut self, file: &Path) {
        self.line(4, format_args!("  - checking \"{}\"", file.display()));
    }

    pub fn file_found(&mut self, file: &Path) {
        self.line(3, format_args!("  - found \"{}\"", file.display()));
    }

    /// Tertiary analysis (verbosity >= 1) and the KLOC line.
    pub fn summary(&mut self, walk: &WalkOutcome, tally: &FileTally) -> io::Result<()> {
        let summary = build_summary(walk, tally, self.verbosity);
        self.writer.write_all(summary.as_bytes())?;
        self.writer.flush()
    }
}

fn safe_percentage(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        (numerator as f64 / denominator as f64) * 100.0
    }
}

fn write_rule_list(output: &mut String, heading: &str, rules: &[GlobRule]) {
    if rules.is_empty() {
        return;
    }
    let _ = writeln!(output, "{}", heading);
    for rule in rules {
        let _ = writeln!(output, "  - {}", rule.text());
    }
}

pub fn build_plan(config: &ScanConfig) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "scanning \"{}\"...", config.root.display());
    let patterns = &config.patterns;
    write_rule_list(&mut output, "including files:", &patterns.file_include);
    write_rule_list(&mut output, "excluding files:", &patterns.file_exclude);
    write_rule_list(&mut output, "excluding dirs:", &patterns.dir_exclude);
    write_rule_list(&mut output, ".gitignore:", &patterns.gitignore);
    output
}

pub fn format_klocs(locs: u64) -> String {
    format!("{:.2} KLOCs", locs as f64 / 1000.0)
}

pub fn build_summary(walk: &WalkOutcome, tally: &FileTally, verbosity: u8) -> String {
    let mut output = String::new();
    if verbosity >= 1 {
        write_tertiary_analysis(&mut output, walk, tally, verbosity);
    }
    let _ = writeln!(output, "{}", format_klocs(tally.locs).as_str().bold());
    output
}

fn write_tertiary_analysis(
    output: &mut String,
    walk: &WalkOutcome,
    tally: &FileTally,
    verbosity: u8,
) {
    let filtered = tally.files.len();
    let _ = writeln!(output, "{}", "tertiary analysis:".blue().bold());
    let _ = writeln!(
        output,
        "  - dir count: {}; ignored: {}; filtered: {}",
        walk.dirs.len(),
        walk.excluded_dir_count(),
        walk.included_dir_count()
    );
    let _ = writeln!(
        output,
        "  - file count: {}; ignored: {}; filtered: {}",
        tally.candidates,
        tally.candidates - filtered,
        filtered
    );

    let _ = writeln!(output, "  - extension frequency:");
    for (ext, count) in tally.extensions.iter() {
        let label = if ext.is_empty() { "<none>" } else { ext };
        let _ = writeln!(output, "    - {}: {}", label, count);
    }

    let _ = writeln!(output, "  - loc power frequency");
    let max_power = tally.max_power();
    for power in 0..=max_power {
        let bucket = tally.histogram.get(&power).map(Vec::as_slice).unwrap_or(&[]);
        let _ = writeln!(
            output,
            "    - [{:06}] 2^{}: {} / {} - {:.2}%",
            1u64 << power,
            power,
            bucket.len(),
            filtered,
            safe_percentage(bucket.len() as u64, filtered as u64)
        );

        let list_files = verbosity >= 3 || power >= max_power.saturating_sub(1);
        if !list_files {
            continue;
        }
        let shown = if verbosity >= 4 {
            bucket.len()
        } else {
            bucket.len().min(BUCKET_LISTING_LIMIT)
        };
        for record in &bucket[..shown] {
            let _ = writeln!(output, "      - {} - {}", record.relpath, record.lines);
        }
        if shown < bucket.len() {
            let _ = writeln!(output, "      - {} more files...", bucket.len() - shown);
        }
    }

    let _ = writeln!(
        output,
        "locs: {}; avg locs / file: {:.2}; file count: {}",
        tally.locs,
        tally.average_lines(),
        filtered
    );

    let unreadable = walk.unreadable + tally.unreadable;
    if unreadable > 0 {
        let _ = writeln!(
            output,
            "{}: {} entries could not be read",
            "Warning".red().bold(),
            unreadable.to_string().bright_yellow()
        );
    }
}
