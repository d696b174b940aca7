use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::patterns::DEFAULT_NOT_DIRPATH;

#[derive(Parser, Debug)]
#[command(
    name = "klocs",
    author,
    version,
    about = "Thousand lines of code finder, not that KLOC is a good metric but you know.",
    long_about = "Counts the lines of every file under a directory, after directory, extension and \
                  gitignore filtering, and reports total KLOCs plus extension and size distributions.\n\n\
                  ex)\n    klocs . --not-dirpath node_modules .git ignoreme --extension .py\n    \
                  klocs . --gitignore .gitignore --extension .py .ps1 .c .cpp -vvv",
    disable_version_flag = true
)]
pub struct Args {
    /// The directory you want to analyze.
    pub dirpath: String,

    #[arg(long, num_args = 1.., value_name = "NAME", help = not_dirpath_help())]
    pub not_dirpath: Vec<String>,

    /// Replace the default directory exclusions with --not-dirpath instead of adding to them.
    #[arg(long)]
    pub override_not_dirpath: bool,

    /// Extensions you want to include; by default all extensions are included.
    #[arg(long, num_args = 1.., value_name = "EXT")]
    pub extension: Vec<String>,

    /// Extensions you don't want to count, ex) ".py" ".pyc".
    #[arg(long, num_args = 1.., value_name = "EXT")]
    pub not_extension: Vec<String>,

    /// A .gitignore-style file whose patterns exclude both directories and files.
    #[arg(long, value_name = "PATH")]
    pub gitignore: Option<PathBuf>,

    /// Print plans and tertiary analysis (-v), progress (-vv), current location (-vvv), and debug (-vvvv).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Abort on the first unreadable file or directory instead of skipping it.
    #[arg(long)]
    pub strict: bool,

    /// Print the current version.
    #[arg(short = 'V', long)]
    pub version: bool,
}

fn not_dirpath_help() -> String {
    format!(
        "Directories you don't want to iterate through. These get added to the defaults {:?}",
        DEFAULT_NOT_DIRPATH
    )
}

/// `klocs 0.1.0`
pub fn version_line() -> String {
    format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}
