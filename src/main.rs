//! Thousand Lines of Code finder
//!
//! Walks a directory tree, drops excluded directories, extensions and gitignore
//! matches, counts the lines of every remaining file and reports the total in KLOCs,
//! with an extension breakdown and a log2 histogram of file sizes at higher
//! verbosity.

mod cli;
mod config;
mod counter;
mod error;
mod logging;
mod patterns;
mod report;
mod walker;

use std::env;
use std::ffi::OsString;
use std::process::ExitCode;

use clap::error::ErrorKind as ClapErrorKind;
use clap::{CommandFactory, Parser};

use crate::cli::Args;
use crate::config::ScanConfig;
use crate::error::{KlocsError, Result};
use crate::report::Reporter;

/// Exit status for fatal errors and for the usage/help/version paths.
const EXIT_FAILURE: u8 = 1;
const EXIT_USAGE: u8 = 2;

fn main() -> ExitCode {
    ExitCode::from(run_with_args(env::args_os()))
}

fn run_with_args<I, T>(args: I) -> u8
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let argv: Vec<OsString> = args.into_iter().map(Into::into).collect();

    if argv.len() <= 1 {
        let _ = Args::command().print_help();
        return EXIT_FAILURE;
    }
    let only_version = argv.len() == 2
        && argv[1]
            .to_str()
            .is_some_and(|arg| arg == "-V" || arg == "--version");
    if only_version {
        println!("{}", cli::version_line());
        return EXIT_FAILURE;
    }

    let args = match Args::try_parse_from(&argv) {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ClapErrorKind::DisplayHelp
                | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                | ClapErrorKind::DisplayVersion => EXIT_FAILURE,
                _ => EXIT_USAGE,
            };
        }
    };
    if args.version {
        println!("{}", cli::version_line());
        return EXIT_FAILURE;
    }

    logging::init_logging(args.verbose);
    let outcome = ScanConfig::from_args(&args).and_then(|config| {
        let mut reporter = Reporter::new(config.verbosity);
        run(&config, &mut reporter)
    });
    match outcome {
        Ok(()) => 0,
        Err(err) => {
            tracing::error!(kind = ?err.kind(), "{}", err);
            EXIT_FAILURE
        }
    }
}

/// Plan, walk, count, report. Nothing is printed past the plan if any stage fails.
fn run(config: &ScanConfig, reporter: &mut Reporter) -> Result<()> {
    reporter.plan(config).map_err(KlocsError::Output)?;
    let walk = walker::walk_tree(config, reporter)?;
    let tally = counter::count_files(&walk.candidates, config, reporter)?;
    reporter.summary(&walk, &tally).map_err(KlocsError::Output)
}
