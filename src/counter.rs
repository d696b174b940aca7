use std::collections::BTreeMap;
use std::fs;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::ScanConfig;
use crate::error::{KlocsError, Result};
use crate::patterns::rooted_path;
use crate::report::Reporter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Path relative to the scan root, always with forward slashes.
    pub relpath: String,
    pub lines: u64,
}

/// Extension → matched file count, in first-seen order.
#[derive(Debug, Default, Clone)]
pub struct ExtensionFrequency {
    entries: Vec<(String, u64)>,
}

impl ExtensionFrequency {
    pub fn increment(&mut self, extension: &str) {
        match self.entries.iter_mut().find(|(ext, _)| ext == extension) {
            Some((_, count)) => *count += 1,
            None => self.entries.push((extension.to_string(), 1)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.entries.iter().map(|(ext, count)| (ext.as_str(), *count))
    }
}

/// Everything accumulated while filtering and counting the candidates.
#[derive(Debug, Default)]
pub struct FileTally {
    pub locs: u64,
    /// Number of candidates handed to the filter.
    pub candidates: usize,
    pub files: Vec<FileRecord>,
    pub extensions: ExtensionFrequency,
    pub histogram: BTreeMap<u32, Vec<FileRecord>>,
    /// Files that matched the filters but could not be read.
    pub unreadable: usize,
}

impl FileTally {
    pub fn record(&mut self, relpath: String, extension: String, lines: u64) {
        let record = FileRecord { relpath, lines };
        self.locs += lines;
        self.extensions.increment(&extension);
        self.histogram
            .entry(bucket_power(lines))
            .or_default()
            .push(record.clone());
        self.files.push(record);
    }

    pub fn max_power(&self) -> u32 {
        self.histogram.keys().next_back().copied().unwrap_or(0)
    }

    pub fn average_lines(&self) -> f64 {
        if self.files.is_empty() {
            0.0
        } else {
            self.locs as f64 / self.files.len() as f64
        }
    }
}

/// `floor(log2(lines))`, with empty files in bucket 0 alongside one-line files.
pub fn bucket_power(lines: u64) -> u32 {
    lines.checked_ilog2().unwrap_or(0)
}

/// Final dot-suffix of the file name, dot included. Leading dots belong to the name,
/// so `.bashrc` and `..foo` have none.
pub fn extension_of(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_default();
    let stem = name.trim_start_matches('.');
    match stem.rfind('.') {
        Some(dot) => stem[dot..].to_string(),
        None => String::new(),
    }
}

/// Count lines ended by `\n`, `\r\n` or a lone `\r`, plus a trailing segment without
/// a terminator. Works on bytes, so content that is not valid UTF-8 is counted all
/// the same.
pub fn count_lines<R: Read>(reader: R) -> io::Result<u64> {
    let mut reader = BufReader::with_capacity(64 * 1024, reader);
    let mut lines = 0u64;
    let mut last_byte = None;
    loop {
        let buffer = match reader.fill_buf() {
            Ok(buffer) => buffer,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        if buffer.is_empty() {
            break;
        }
        for &byte in buffer {
            match byte {
                b'\r' => lines += 1,
                // the `\r` before it already ended this line, possibly in the previous buffer
                b'\n' if last_byte != Some(b'\r') => lines += 1,
                _ => {}
            }
            last_byte = Some(byte);
        }
        let consumed = buffer.len();
        reader.consume(consumed);
    }
    if last_byte.is_some_and(|b| b != b'\n' && b != b'\r') {
        lines += 1;
    }
    Ok(lines)
}

pub fn count_file_lines(path: &Path) -> io::Result<u64> {
    let file = fs::File::open(path)?;
    count_lines(file)
}

/// Apply the include/exclude rules to every candidate and count the survivors.
///
/// Fails with [`KlocsError::EmptyResult`] when nothing survives.
pub fn count_files(
    candidates: &[PathBuf],
    config: &ScanConfig,
    reporter: &mut Reporter,
) -> Result<FileTally> {
    let patterns = &config.patterns;
    let total = candidates.len();
    let mut tally = FileTally {
        candidates: total,
        ..FileTally::default()
    };

    reporter.count_started(total, &config.root);
    let ten_percent = total / 10;
    let mut next_marker = 0;

    for (index, path) in candidates.iter().enumerate() {
        if index >= next_marker {
            reporter.file_progress(index, total);
            next_marker += ten_percent.max(1);
        }

        reporter.file_viewing(path);
        let rooted = rooted_path(&config.root, path);
        if !patterns.includes_file(&rooted) {
            continue;
        }
        reporter.file_checking(path);
        if patterns.excludes_file(&rooted) {
            continue;
        }
        reporter.file_found(path);

        let lines = match count_file_lines(path) {
            Ok(lines) => lines,
            Err(source) => {
                if config.strict {
                    return Err(KlocsError::Read {
                        path: path.clone(),
                        source,
                    });
                }
                warn!(file = %path.display(), error = %source, "skipping unreadable file");
                tally.unreadable += 1;
                continue;
            }
        };
        let relpath = rooted.trim_start_matches('/').to_string();
        tally.record(relpath, extension_of(path), lines);
    }

    reporter.file_progress_done(total);
    debug!(
        files = tally.files.len(),
        locs = tally.locs,
        unreadable = tally.unreadable,
        "counting finished"
    );

    if tally.files.is_empty() {
        return Err(KlocsError::EmptyResult);
    }
    Ok(tally)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::patterns::{PatternSet, PatternSources};
    use tempfile::TempDir;

    fn config_for(root: &Path, sources: PatternSources, strict: bool) -> ScanConfig {
        ScanConfig {
            root: root.to_path_buf(),
            patterns: PatternSet::compile(&sources).expect("patterns should compile"),
            verbosity: 0,
            strict,
        }
    }

    fn quiet_reporter() -> Reporter {
        Reporter::with_writer(Box::new(io::sink()), 0)
    }

    fn create_test_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).expect("failed to write test file");
        path
    }

    #[test]
    fn test_count_lines_terminators() -> io::Result<()> {
        assert_eq!(count_lines(&b""[..])?, 0);
        assert_eq!(count_lines(&b"\n"[..])?, 1);
        assert_eq!(count_lines(&b"one"[..])?, 1);
        assert_eq!(count_lines(&b"one\ntwo\n"[..])?, 2);
        assert_eq!(count_lines(&b"one\ntwo"[..])?, 2);
        assert_eq!(count_lines(&b"crlf\r\nline\r\n"[..])?, 2);
        assert_eq!(count_lines(&b"\n\n\n"[..])?, 3);
        assert_eq!(count_lines(&b"a\rb\rc\r"[..])?, 3);
        assert_eq!(count_lines(&b"a\rb"[..])?, 2);
        assert_eq!(count_lines(&b"mixed\r\nold\rnew\n"[..])?, 3);
        assert_eq!(count_lines(&b"\r\r\n\n"[..])?, 3);
        Ok(())
    }

    #[test]
    fn test_count_lines_crlf_split_across_reads() -> io::Result<()> {
        struct Chunked {
            chunks: Vec<&'static [u8]>,
        }

        impl Read for Chunked {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                if self.chunks.is_empty() {
                    return Ok(0);
                }
                let chunk = self.chunks.remove(0);
                buf[..chunk.len()].copy_from_slice(chunk);
                Ok(chunk.len())
            }
        }

        let split = Chunked {
            chunks: vec![b"one\r", b"\ntwo\r", b"\n"],
        };
        assert_eq!(count_lines(split)?, 2);
        let lone = Chunked {
            chunks: vec![b"one\r", b"two"],
        };
        assert_eq!(count_lines(lone)?, 2);
        Ok(())
    }

    #[test]
    fn test_count_lines_ignores_encoding() -> io::Result<()> {
        assert_eq!(count_lines(&b"caf\xe9\n\xff\xfe\x00bin"[..])?, 2);
        Ok(())
    }

    #[test]
    fn test_count_lines_surfaces_errors() {
        struct FailAfterFirstRead {
            state: u8,
        }

        impl Read for FailAfterFirstRead {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                match self.state {
                    0 => {
                        let data = b"ok\n";
                        let len = data.len().min(buf.len());
                        buf[..len].copy_from_slice(&data[..len]);
                        self.state = 1;
                        Ok(len)
                    }
                    1 => {
                        self.state = 2;
                        Err(io::Error::other("simulated failure"))
                    }
                    _ => Ok(0),
                }
            }
        }

        let result = count_lines(FailAfterFirstRead { state: 0 });
        assert!(
            result.is_err(),
            "line counter should surface the simulated failure"
        );
    }

    #[test]
    fn test_bucket_power_bounds() {
        assert_eq!(bucket_power(0), 0);
        assert_eq!(bucket_power(1), 0);
        for n in 1..=5000u64 {
            let p = bucket_power(n);
            assert!(1u64 << p <= n && n < 1u64 << (p + 1), "n={n} p={p}");
        }
        assert_eq!(bucket_power(1024), 10);
        assert_eq!(bucket_power(1023), 9);
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of(Path::new("/r/a.py")), ".py");
        assert_eq!(extension_of(Path::new("/r/archive.tar.GZ")), ".GZ");
        assert_eq!(extension_of(Path::new("/r/Makefile")), "");
        assert_eq!(extension_of(Path::new("/r/.bashrc")), "");
        assert_eq!(extension_of(Path::new("/r/..foo")), "");
        assert_eq!(extension_of(Path::new("/r/.config.toml")), ".toml");
        assert_eq!(extension_of(Path::new("/r/trailing.")), ".");
    }

    #[test]
    fn test_extension_frequency_keeps_first_seen_order() {
        let mut freq = ExtensionFrequency::default();
        for ext in [".rs", ".py", ".rs", "", ".py", ".rs"] {
            freq.increment(ext);
        }
        let entries: Vec<(&str, u64)> = freq.iter().collect();
        assert_eq!(entries, vec![(".rs", 3), (".py", 2), ("", 1)]);
        assert_eq!(freq.iter().map(|(_, count)| count).sum::<u64>(), 6);
        assert!(freq.iter().all(|(ext, _)| ext != ".go"));
    }

    #[test]
    fn test_exclude_wins_over_empty_include() -> Result<()> {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let root = temp_dir.path();
        let candidates = vec![
            create_test_file(root, "a.py", &"x\n".repeat(10)),
            create_test_file(root, "b.pyc", &"x\n".repeat(5)),
        ];
        let sources = PatternSources {
            not_extensions: vec!["pyc".into()],
            ..PatternSources::default()
        };
        let config = config_for(root, sources, false);
        let tally = count_files(&candidates, &config, &mut quiet_reporter())?;

        assert_eq!(tally.locs, 10);
        assert_eq!(
            tally.files,
            vec![FileRecord {
                relpath: "a.py".into(),
                lines: 10
            }]
        );
        assert_eq!(tally.candidates, 2);
        assert_eq!(tally.histogram.get(&3).map(Vec::len), Some(1));
        Ok(())
    }

    #[test]
    fn test_exclude_wins_over_matching_include() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let root = temp_dir.path();
        let candidates = vec![
            create_test_file(root, "keep.py", "x\n"),
            create_test_file(root, "skip.py", "x\n"),
        ];
        let sources = PatternSources {
            extensions: vec!["py".into()],
            not_extensions: vec!["py".into()],
            ..PatternSources::default()
        };
        let config = config_for(root, sources, false);
        let err = count_files(&candidates, &config, &mut quiet_reporter())
            .expect_err("everything is excluded");
        assert_eq!(err.kind(), ErrorKind::EmptyResult);
    }

    #[test]
    fn test_extension_frequencies_sum_to_file_count() -> Result<()> {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let root = temp_dir.path();
        fs::create_dir(root.join("sub")).expect("failed to create sub dir");
        let candidates = vec![
            create_test_file(root, "a.rs", "fn a() {}\n"),
            create_test_file(root, "empty.txt", ""),
            create_test_file(root, "Makefile", "all:\n\ttrue\n"),
            create_test_file(&root.join("sub"), "b.rs", "1\n2\n3\n4\n5"),
        ];
        let config = config_for(root, PatternSources::default(), false);
        let tally = count_files(&candidates, &config, &mut quiet_reporter())?;

        let frequency_sum: u64 = tally.extensions.iter().map(|(_, count)| count).sum();
        assert_eq!(frequency_sum, tally.files.len() as u64);
        assert!(tally.extensions.iter().any(|entry| entry == (".rs", 2)));
        assert_eq!(tally.locs, 1 + 2 + 5);
        let bucket_zero: Vec<&str> = tally.histogram[&0]
            .iter()
            .map(|r| r.relpath.as_str())
            .collect();
        assert_eq!(bucket_zero, vec!["a.rs", "empty.txt"]);
        assert_eq!(tally.histogram[&2][0].relpath, "sub/b.rs");
        assert_eq!(tally.max_power(), 2);
        Ok(())
    }

    #[test]
    fn test_unreadable_file_skipped_by_default() -> Result<()> {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let root = temp_dir.path();
        let candidates = vec![
            create_test_file(root, "here.txt", "x\n"),
            root.join("vanished.txt"),
        ];
        let config = config_for(root, PatternSources::default(), false);
        let tally = count_files(&candidates, &config, &mut quiet_reporter())?;
        assert_eq!(tally.files.len(), 1);
        assert_eq!(tally.unreadable, 1);
        Ok(())
    }

    #[test]
    fn test_unreadable_file_aborts_when_strict() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let root = temp_dir.path();
        let candidates = vec![
            create_test_file(root, "here.txt", "x\n"),
            root.join("vanished.txt"),
        ];
        let config = config_for(root, PatternSources::default(), true);
        let err = count_files(&candidates, &config, &mut quiet_reporter())
            .expect_err("strict mode should abort");
        assert_eq!(err.kind(), ErrorKind::UnhandledIo);
        assert!(err.to_string().contains("vanished.txt"), "{err}");
    }

    #[test]
    fn test_no_candidates_is_empty_result() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let config = config_for(temp_dir.path(), PatternSources::default(), false);
        let err = count_files(&[], &config, &mut quiet_reporter())
            .expect_err("no candidates means no files");
        assert!(matches!(err, KlocsError::EmptyResult));
    }
}
