//! # Scan Module
//!
//! Data model shared by the scanner, the editor and the reports: the tracked
//! path, the per-file classification and the immutable [`ScanResult`].

use std::fmt;
use std::path::{Component, Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::git::VcsError;
use crate::notice::Notice;

/// A file known to version control.
///
/// `path` is the path as listed by the VCS, relative to the directory the
/// listing ran in. `repo_path` is the same file relative to the work-tree
/// root, which is what exemption patterns are matched against. `file` is
/// where the content lives on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackedPath {
  path: PathBuf,
  repo_path: PathBuf,
  file: PathBuf,
}

impl TrackedPath {
  /// Creates a tracked path listed relative to `root`, the work-tree root.
  pub fn new(root: &Path, path: impl Into<PathBuf>) -> Self {
    let path = path.into();
    let file = root.join(&path);
    Self {
      repo_path: path.clone(),
      path,
      file,
    }
  }

  /// Creates a tracked path listed from `dir`, which sits at `prefix` below
  /// the work-tree root.
  pub fn in_subdir(dir: &Path, prefix: &Path, path: impl Into<PathBuf>) -> Self {
    let path = path.into();
    let file = dir.join(&path);
    let repo_path = normalize(&prefix.join(&path));
    Self { path, repo_path, file }
  }

  /// The path as listed by version control.
  pub fn path(&self) -> &Path {
    &self.path
  }

  /// The path relative to the work-tree root.
  pub fn repo_path(&self) -> &Path {
    &self.repo_path
  }

  /// The on-disk location of the file.
  pub fn file(&self) -> &Path {
    &self.file
  }

  /// Base name of the file, e.g. `gradlew.bat`.
  pub fn name(&self) -> String {
    self
      .path
      .file_name()
      .map(|name| name.to_string_lossy().into_owned())
      .unwrap_or_default()
  }

  /// Final extension including its dot, e.g. `.py`.
  ///
  /// Empty when there is no extension. Dot-files such as `.gitignore` have no
  /// extension, and neither does a name ending in a bare dot.
  pub fn suffix(&self) -> String {
    match self.path.extension() {
      Some(ext) if !ext.is_empty() => format!(".{}", ext.to_string_lossy()),
      _ => String::new(),
    }
  }
}

/// Lexically resolves `.` and `..`, as in `sub/../a.py`.
fn normalize(path: &Path) -> PathBuf {
  let mut normalized = PathBuf::new();
  for component in path.components() {
    match component {
      Component::CurDir => {}
      Component::ParentDir => {
        normalized.pop();
      }
      other => normalized.push(other),
    }
  }
  normalized
}

impl fmt::Display for TrackedPath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.path.display())
  }
}

/// The notice state of one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
  /// Matched an exemption rule; nothing else was looked at.
  Exempt,
  /// No copyright notice found.
  Missing,
  /// Notice year equals the year of the last commit.
  Correct,
  /// Notice year differs from the year of the last commit.
  IncorrectDate,
  /// The file could not be checked or corrected.
  Error,
}

impl Classification {
  /// Every classification, in legend order.
  pub const ALL: [Classification; 5] = [
    Classification::Exempt,
    Classification::Missing,
    Classification::Correct,
    Classification::IncorrectDate,
    Classification::Error,
  ];

  /// Single-character indicator printed during a non-verbose scan.
  pub const fn glyph(self) -> char {
    match self {
      Classification::Exempt => '-',
      Classification::Missing => '0',
      Classification::Correct => '.',
      Classification::IncorrectDate => 'X',
      Classification::Error => '!',
    }
  }

  pub const fn name(self) -> &'static str {
    match self {
      Classification::Exempt => "EXEMPT",
      Classification::Missing => "MISSING",
      Classification::Correct => "CORRECT",
      Classification::IncorrectDate => "INCORRECT_DATE",
      Classification::Error => "ERROR",
    }
  }
}

impl fmt::Display for Classification {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// Classifies a successfully scanned file.
///
/// Pure function of the detected notice and the last-modified date; exemption
/// and errors are decided before this is reached.
pub fn classify(notice: Option<&Notice>, last_modified: NaiveDate) -> Classification {
  match notice {
    None => Classification::Missing,
    Some(notice) if notice.year == last_modified.year() => Classification::Correct,
    Some(_) => Classification::IncorrectDate,
  }
}

/// Per-file failures. These are recorded against the file and never abort the
/// run.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
  /// The content is not valid UTF-8 text.
  #[error("content is not valid UTF-8 text (first invalid byte at offset {valid_up_to})")]
  Decode { valid_up_to: usize },

  /// No comment convention is registered for the file's format.
  #[error("no comment leader configured for file suffix \"{suffix}\"")]
  UnsupportedFormat { suffix: String },

  /// The commit history could not supply a date.
  #[error(transparent)]
  Vcs(#[from] VcsError),

  /// The file is listed but could not be read from the work tree.
  #[error("failed to read file: {0}")]
  Read(#[source] std::io::Error),

  /// A notice was inserted but the rescan did not find it.
  #[error("inserted notice was not found when the file was rescanned")]
  NoticeNotDetected,
}

impl ScanError {
  /// Short name of the error kind for the error block.
  pub const fn kind(&self) -> &'static str {
    match self {
      ScanError::Decode { .. } => "DecodeError",
      ScanError::UnsupportedFormat { .. } => "UnsupportedFormatError",
      ScanError::Vcs(_) => "VcsError",
      ScanError::Read(_) => "ReadError",
      ScanError::NoticeNotDetected => "NoticeNotDetectedError",
    }
  }
}

/// Outcome of scanning one file in one pass.
///
/// Never mutated after construction: a correction that changes the file on disk
/// is followed by a fresh scan producing a new value.
#[derive(Debug)]
pub struct ScanResult {
  pub path: TrackedPath,
  pub last_modified: Option<NaiveDate>,
  pub notice: Option<Notice>,
  pub classification: Classification,
  pub error: Option<ScanError>,
}

impl ScanResult {
  pub const fn exempt(path: TrackedPath) -> Self {
    Self {
      path,
      last_modified: None,
      notice: None,
      classification: Classification::Exempt,
      error: None,
    }
  }

  /// A file whose history and content were both read.
  pub fn scanned(path: TrackedPath, last_modified: NaiveDate, notice: Option<Notice>) -> Self {
    let classification = classify(notice.as_ref(), last_modified);
    Self {
      path,
      last_modified: Some(last_modified),
      notice,
      classification,
      error: None,
    }
  }

  /// A file that could not be scanned, keeping whatever was learned first.
  pub const fn failed(path: TrackedPath, last_modified: Option<NaiveDate>, error: ScanError) -> Self {
    Self {
      path,
      last_modified,
      notice: None,
      classification: Classification::Error,
      error: Some(error),
    }
  }

  /// Replaces this result with an errored one, e.g. when a required
  /// correction turned out to be impossible.
  pub fn with_error(self, error: ScanError) -> Self {
    Self {
      classification: Classification::Error,
      error: Some(error),
      ..self
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn notice(year: i32) -> Notice {
    Notice {
      style: "Copyright".to_string(),
      year,
      suffix: "Acme".to_string(),
      line_index: 0,
      year_span: 12..16,
    }
  }

  fn date(year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, 6, 15).expect("valid date")
  }

  #[test]
  fn test_subdir_paths_keep_the_root_relative_form() {
    let tracked = TrackedPath::in_subdir(Path::new("/repo/forAndroid"), Path::new("forAndroid"), "app/ic.xml");
    assert_eq!(tracked.path(), Path::new("app/ic.xml"));
    assert_eq!(tracked.repo_path(), Path::new("forAndroid/app/ic.xml"));
    assert_eq!(tracked.file(), Path::new("/repo/forAndroid/app/ic.xml"));

    let up = TrackedPath::in_subdir(Path::new("/repo/docs"), Path::new("docs"), "../setup.py");
    assert_eq!(up.repo_path(), Path::new("setup.py"));

    let top = TrackedPath::new(Path::new("/repo"), "setup.py");
    assert_eq!(top.repo_path(), top.path());
  }

  #[test]
  fn test_classify_is_total() {
    assert_eq!(classify(None, date(2020)), Classification::Missing);
    assert_eq!(classify(Some(&notice(2020)), date(2020)), Classification::Correct);
    assert_eq!(classify(Some(&notice(2020)), date(2024)), Classification::IncorrectDate);
    assert_eq!(classify(Some(&notice(2024)), date(2020)), Classification::IncorrectDate);
  }

  #[test]
  fn test_classify_is_deterministic() {
    for year in [1, 999, 2019, 2020, 2021, 9999] {
      let first = classify(Some(&notice(year)), date(2020));
      let second = classify(Some(&notice(year)), date(2020));
      assert_eq!(first, second);
      assert!(matches!(first, Classification::Correct | Classification::IncorrectDate));
    }
  }

  #[test]
  fn test_tracked_path_suffix_and_name() {
    let root = Path::new("/repo");
    assert_eq!(TrackedPath::new(root, "src/main.py").suffix(), ".py");
    assert_eq!(TrackedPath::new(root, "archive.tar.gz").suffix(), ".gz");
    assert_eq!(TrackedPath::new(root, ".gitignore").suffix(), "");
    assert_eq!(TrackedPath::new(root, "gradlew").suffix(), "");
    assert_eq!(TrackedPath::new(root, "gradlew.bat").name(), "gradlew.bat");
    assert_eq!(TrackedPath::new(root, "a/b.txt").file(), Path::new("/repo/a/b.txt"));
  }

  #[test]
  fn test_glyphs_are_distinct() {
    let glyphs: std::collections::HashSet<char> = Classification::ALL.iter().map(|c| c.glyph()).collect();
    assert_eq!(glyphs.len(), Classification::ALL.len());
  }

  #[test]
  fn test_with_error_keeps_date() {
    let result = ScanResult::scanned(TrackedPath::new(Path::new("."), "a.txt"), date(2021), None);
    let errored = result.with_error(ScanError::UnsupportedFormat {
      suffix: ".txt".to_string(),
    });
    assert_eq!(errored.classification, Classification::Error);
    assert_eq!(errored.last_modified, Some(date(2021)));
    assert_eq!(errored.error.as_ref().map(ScanError::kind), Some("UnsupportedFormatError"));
  }
}
