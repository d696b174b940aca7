use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::Args;
use crate::error::{KlocsError, Result};
use crate::patterns::{PatternSet, PatternSources};

/// Resolved options for one run. Built once, read-only afterwards.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Canonical absolute path of the directory being scanned.
    pub root: PathBuf,
    pub patterns: PatternSet,
    pub verbosity: u8,
    /// Abort on unreadable entries instead of skipping them.
    pub strict: bool,
}

impl ScanConfig {
    pub fn from_args(args: &Args) -> Result<Self> {
        let root = resolve_root(Path::new(&args.dirpath))?;
        let sources = PatternSources {
            not_dirpath: args.not_dirpath.clone(),
            override_not_dirpath: args.override_not_dirpath,
            extensions: args.extension.clone(),
            not_extensions: args.not_extension.clone(),
            gitignore: args.gitignore.clone(),
        };
        let patterns = PatternSet::compile(&sources)?;
        Ok(ScanConfig {
            root,
            patterns,
            verbosity: args.verbose,
            strict: args.strict,
        })
    }
}

fn resolve_root(path: &Path) -> Result<PathBuf> {
    let metadata = fs::metadata(path).map_err(|_| KlocsError::MissingRoot(absolute(path)))?;
    if !metadata.is_dir() {
        return Err(KlocsError::RootNotDirectory(absolute(path)));
    }
    fs::canonicalize(path).map_err(|_| KlocsError::MissingRoot(absolute(path)))
}

/// Best-effort absolute form for error messages.
fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
