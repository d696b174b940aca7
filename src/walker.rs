//! Depth-first walk of the scan root. Excluded directories are recorded and pruned
//! before anything beneath them is opened; every file of an included directory
//! becomes a candidate for the file filter.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::config::ScanConfig;
use crate::error::Result;
use crate::patterns::rooted_path;
use crate::report::Reporter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryRecord {
    pub path: PathBuf,
    pub excluded: bool,
}

#[derive(Debug, Default)]
pub struct WalkOutcome {
    /// Absolute paths of every file found in an included directory, in visit order.
    pub candidates: Vec<PathBuf>,
    /// Every directory that was evaluated, in visit order.
    pub dirs: Vec<DirectoryRecord>,
    /// Entries skipped because they could not be read.
    pub unreadable: usize,
}

impl WalkOutcome {
    pub fn included_dir_count(&self) -> usize {
        self.dirs.iter().filter(|d| !d.excluded).count()
    }

    pub fn excluded_dir_count(&self) -> usize {
        self.dirs.iter().filter(|d| d.excluded).count()
    }
}

/// Direct subdirectories of the root, used only to pace progress output.
fn top_level_dirs(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir())
        .map(DirEntry::into_path)
        .collect()
}

/// Regular files, plus symlinks that resolve to one. Links are never followed
/// for directories.
fn is_candidate_file(entry: &DirEntry) -> bool {
    let file_type = entry.file_type();
    file_type.is_file() || (file_type.is_symlink() && entry.path().is_file())
}

pub fn walk_tree(config: &ScanConfig, reporter: &mut Reporter) -> Result<WalkOutcome> {
    let root = config.root.as_path();
    let mut outcome = WalkOutcome::default();

    reporter.walk_started(root);
    let top_level = top_level_dirs(root);

    let mut entries = WalkDir::new(root).sort_by_file_name().into_iter();
    while let Some(entry) = entries.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                if config.strict {
                    return Err(err.into());
                }
                warn!(error = %err, "skipping unreadable entry");
                outcome.unreadable += 1;
                continue;
            }
        };
        let path = entry.path();

        if entry.file_type().is_dir() {
            if let Some(index) = top_level.iter().position(|dir| dir == path) {
                reporter.dir_progress(index, top_level.len());
            }

            // The root is always scanned; rules only apply to what lies under it.
            // skip_current_dir keeps everything beneath an excluded directory unvisited.
            if entry.depth() > 0 && config.patterns.excludes_dir(&rooted_path(root, path)) {
                debug!(dir = %path.display(), "excluding directory");
                reporter.dir_excluded(path);
                outcome.dirs.push(DirectoryRecord {
                    path: path.to_path_buf(),
                    excluded: true,
                });
                entries.skip_current_dir();
                continue;
            }

            reporter.dir_included(path);
            outcome.dirs.push(DirectoryRecord {
                path: path.to_path_buf(),
                excluded: false,
            });
        } else if is_candidate_file(&entry) {
            outcome.candidates.push(entry.into_path());
        }
    }

    reporter.dir_progress_done(top_level.len());
    debug!(
        dirs = outcome.dirs.len(),
        candidates = outcome.candidates.len(),
        "walk finished"
    );
    Ok(outcome)
}
