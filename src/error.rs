use std::io;
use std::path::PathBuf;

/// Broad classification of a fatal error, used for exit handling and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input detected before any traversal starts.
    Configuration,
    /// Filtering left nothing to count.
    EmptyResult,
    /// A walk or read failure while running with `--strict`, or a failed report write.
    UnhandledIo,
}

#[derive(Debug, thiserror::Error)]
pub enum KlocsError {
    #[error("provided dirpath \"{}\" does not exist", .0.display())]
    MissingRoot(PathBuf),

    #[error("provided dirpath \"{}\" is not a directory", .0.display())]
    RootNotDirectory(PathBuf),

    #[error("could not read gitignore \"{}\": {source}", .path.display())]
    Gitignore { path: PathBuf, source: io::Error },

    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: glob::PatternError,
    },

    #[error("found 0 files")]
    EmptyResult,

    #[error("error walking directory tree: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("error reading \"{}\": {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("could not write report: {0}")]
    Output(#[source] io::Error),
}

impl KlocsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            KlocsError::MissingRoot(_)
            | KlocsError::RootNotDirectory(_)
            | KlocsError::Gitignore { .. }
            | KlocsError::InvalidPattern { .. } => ErrorKind::Configuration,
            KlocsError::EmptyResult => ErrorKind::EmptyResult,
            KlocsError::Walk(_) | KlocsError::Read { .. } | KlocsError::Output(_) => {
                ErrorKind::UnhandledIo
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, KlocsError>;
