//! Pattern compilation: turns directory names, extension lists and an optional
//! gitignore file into the glob rules used by the walker and the file filter.
//!
//! Every rule is matched against the path below the scan root, written with a leading
//! `/` (`/web/node_modules`), with `*` allowed to cross path separators. So
//! `*/node_modules` matches that directory at any depth, and nothing above the root
//! can ever match.

use std::fs;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use tracing::debug;

use crate::error::{KlocsError, Result};

/// Directory names excluded unless the caller overrides them.
pub const DEFAULT_NOT_DIRPATH: [&str; 7] = [
    ".git",
    ".svn",
    "node_modules",
    "venv",
    "__pycache__",
    ".pytest_cache",
    ".vscode",
];

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// A compiled glob together with the text it was built from.
#[derive(Debug, Clone)]
pub struct GlobRule {
    text: String,
    pattern: Pattern,
    dir_only: bool,
}

impl GlobRule {
    /// Compile `text` as a path glob.
    pub fn new(text: &str) -> Result<Self> {
        Self::with_source(text, text, false)
    }

    fn with_source(display: &str, glob: &str, dir_only: bool) -> Result<Self> {
        let pattern = Pattern::new(&collapse_inline_recursive(glob)).map_err(|source| {
            KlocsError::InvalidPattern {
                pattern: display.to_string(),
                source,
            }
        })?;
        Ok(GlobRule {
            text: display.to_string(),
            pattern,
            dir_only,
        })
    }

    /// Rule for one token of a gitignore file. A trailing `/` limits the rule to
    /// directories; tokens not already starting with `*` match at any depth.
    fn gitignore(token: &str) -> Result<Self> {
        let dir_only = token.ends_with('/');
        let body = token.trim_end_matches('/').trim_start_matches('/');
        let glob = if body.starts_with('*') {
            body.to_string()
        } else {
            format!("*/{}", body)
        };
        Self::with_source(token, &glob, dir_only)
    }

    /// The rule as the user wrote it (or as it was normalized for display).
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_dir_only(&self) -> bool {
        self.dir_only
    }

    /// `rooted` is a path as produced by [`rooted_path`].
    pub fn matches(&self, rooted: &str) -> bool {
        self.pattern.matches_with(rooted, MATCH_OPTIONS)
    }
}

/// `path` relative to `root`, with forward slashes and a leading `/`. The root itself
/// is `/`.
pub fn rooted_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let text = relative.to_string_lossy().replace('\\', "/");
    if text.starts_with('/') {
        text
    } else {
        format!("/{}", text)
    }
}

/// Rewrite `**` runs that are not a whole path component into a single `*`.
///
/// `*` already crosses separators under [`MATCH_OPTIONS`], so `**.py` and `*.py`
/// select the same paths; the `glob` crate only rejects the former.
fn collapse_inline_recursive(glob: &str) -> String {
    let chars: Vec<char> = glob.chars().collect();
    let mut out = String::with_capacity(glob.len());
    // Some(members seen) while inside a `[...]` class
    let mut class_members: Option<usize> = None;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if let Some(n) = class_members {
            out.push(c);
            // a `]` directly after `[` or `[!` is a member, not the terminator
            class_members = match c {
                ']' if n > 0 => None,
                '!' if n == 0 && chars[i - 1] == '[' => Some(0),
                _ => Some(n + 1),
            };
            i += 1;
            continue;
        }
        match c {
            '[' => {
                class_members = Some(0);
                out.push(c);
                i += 1;
            }
            '*' => {
                let start = i;
                while i < chars.len() && chars[i] == '*' {
                    i += 1;
                }
                let run = i - start;
                let whole_component = (start == 0 || chars[start - 1] == '/')
                    && (i == chars.len() || chars[i] == '/');
                if run >= 2 && whole_component {
                    out.push_str("**");
                } else {
                    out.push('*');
                }
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

/// Raw rule sources, as collected from the command line.
#[derive(Debug, Clone, Default)]
pub struct PatternSources {
    pub not_dirpath: Vec<String>,
    pub override_not_dirpath: bool,
    pub extensions: Vec<String>,
    pub not_extensions: Vec<String>,
    pub gitignore: Option<PathBuf>,
}

/// The compiled rule lists for one run.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    pub dir_exclude: Vec<GlobRule>,
    pub file_include: Vec<GlobRule>,
    pub file_exclude: Vec<GlobRule>,
    pub gitignore: Vec<GlobRule>,
}

impl PatternSet {
    pub fn compile(sources: &PatternSources) -> Result<Self> {
        let mut names: Vec<&str> = sources.not_dirpath.iter().map(String::as_str).collect();
        if !sources.override_not_dirpath {
            names.extend(DEFAULT_NOT_DIRPATH);
        }
        let dir_exclude = names
            .into_iter()
            .map(|name| GlobRule::new(&normalize_dir_name(name)))
            .collect::<Result<Vec<_>>>()?;

        let file_include = extension_rules(&sources.extensions)?;
        let file_exclude = extension_rules(&sources.not_extensions)?;

        let gitignore = match sources.gitignore.as_deref() {
            Some(path) => read_gitignore(path)?
                .iter()
                .map(|token| GlobRule::gitignore(token))
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        Ok(PatternSet {
            dir_exclude,
            file_include,
            file_exclude,
            gitignore,
        })
    }

    /// True when `dir` matches a directory exclusion or any gitignore rule.
    pub fn excludes_dir(&self, dir: &str) -> bool {
        self.dir_exclude
            .iter()
            .chain(self.gitignore.iter())
            .any(|rule| rule.matches(dir))
    }

    /// True when there is no include filter or `file` matches one of its rules.
    pub fn includes_file(&self, file: &str) -> bool {
        self.file_include.is_empty() || self.file_include.iter().any(|r| r.matches(file))
    }

    /// True when `file` matches an excluded extension or a non-directory gitignore rule.
    pub fn excludes_file(&self, file: &str) -> bool {
        self.file_exclude
            .iter()
            .chain(self.gitignore.iter().filter(|rule| !rule.is_dir_only()))
            .any(|rule| rule.matches(file))
    }
}

/// `node_modules/`, `..\build` and friends all become `*/<name>`.
pub fn normalize_dir_name(name: &str) -> String {
    let posix = name.replace('\\', "/").replace("../", "");
    let trimmed = posix.strip_suffix('/').unwrap_or(&posix);
    format!("*/{}", trimmed)
}

/// Ensure a leading dot: `py` and `.py` both become `.py`.
pub fn normalize_extension(ext: &str) -> String {
    if ext.starts_with('.') {
        ext.to_string()
    } else {
        format!(".{}", ext)
    }
}

fn extension_rules(extensions: &[String]) -> Result<Vec<GlobRule>> {
    extensions
        .iter()
        .map(|ext| {
            let ext = normalize_extension(ext);
            let display = format!("**{}", ext);
            GlobRule::with_source(&display, &format!("**{}", Pattern::escape(&ext)), false)
        })
        .collect()
}

/// Non-comment, non-blank tokens of a gitignore-style file.
pub fn read_gitignore(path: &Path) -> Result<Vec<String>> {
    let bytes = fs::read(path).map_err(|source| KlocsError::Gitignore {
        path: path.to_path_buf(),
        source,
    })?;
    let text = String::from_utf8_lossy(&bytes);
    let tokens: Vec<String> = text
        .lines()
        .filter_map(|line| {
            let token = line.split('#').next().unwrap_or("").trim();
            (!token.is_empty()).then(|| token.to_string())
        })
        .collect();
    debug!(path = %path.display(), count = tokens.len(), "read gitignore patterns");
    Ok(tokens)
}
