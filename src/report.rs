//! # Report Module
//!
//! Aggregates final scan results into the two summaries printed after a run,
//! and writes the optional JSON report.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use serde::Serialize;

use crate::scan::{Classification, ScanResult};

/// Per-format and per-owner breakdown of a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Summary {
  /// File format, then classification, then the paths in scan order.
  pub by_format: BTreeMap<String, BTreeMap<Classification, Vec<PathBuf>>>,
  /// Notice suffix (`None` for files without a notice), then paths.
  pub by_owner: BTreeMap<Option<String>, Vec<PathBuf>>,
  /// Number of files that ended in [`Classification::Error`].
  pub error_count: usize,
}

impl Summary {
  /// Builds the summary from final results.
  ///
  /// The format key of a file is its suffix, or its whole name when the name
  /// is exempt or there is no suffix.
  pub fn from_results<'a>(results: impl IntoIterator<Item = &'a ScanResult>, exempt_names: &[String]) -> Self {
    let mut summary = Self::default();
    for result in results {
      let name = result.path.name();
      let suffix = result.path.suffix();
      let format = if suffix.is_empty() || exempt_names.contains(&name) {
        name
      } else {
        suffix
      };

      summary
        .by_format
        .entry(format)
        .or_default()
        .entry(result.classification)
        .or_default()
        .push(result.path.path().to_path_buf());

      summary
        .by_owner
        .entry(result.notice.as_ref().map(|notice| notice.suffix.clone()))
        .or_default()
        .push(result.path.path().to_path_buf());

      if result.classification == Classification::Error {
        summary.error_count += 1;
      }
    }
    summary
  }

  /// Process exit status for the run.
  pub const fn exit_code(&self) -> i32 {
    if self.error_count > 0 { 1 } else { 0 }
  }

  /// Total files per classification.
  pub fn counts(&self) -> BTreeMap<Classification, usize> {
    let mut counts = BTreeMap::new();
    for states in self.by_format.values() {
      for (classification, paths) in states {
        *counts.entry(*classification).or_insert(0) += paths.len();
      }
    }
    counts
  }
}

/// The single path when there is exactly one, otherwise the count.
pub fn first_or_len(paths: &[PathBuf]) -> String {
  match paths {
    [only] => only.display().to_string(),
    _ => format!("{}.", paths.len()),
  }
}

/// One file in the JSON report.
#[derive(Debug, Serialize)]
pub struct FileRecord {
  #[serde(with = "path_serialization")]
  pub path: PathBuf,
  pub classification: Classification,
  pub last_modified: Option<NaiveDate>,
  pub notice: Option<NoticeRecord>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<ErrorRecord>,
}

#[derive(Debug, Serialize)]
pub struct NoticeRecord {
  pub style: String,
  pub year: i32,
  pub suffix: String,
  pub line: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorRecord {
  pub kind: &'static str,
  pub message: String,
}

impl From<&ScanResult> for FileRecord {
  fn from(result: &ScanResult) -> Self {
    Self {
      path: result.path.path().to_path_buf(),
      classification: result.classification,
      last_modified: result.last_modified,
      notice: result.notice.as_ref().map(|notice| NoticeRecord {
        style: notice.style.clone(),
        year: notice.year,
        suffix: notice.suffix.clone(),
        line: notice.line_index + 1,
      }),
      error: result.error.as_ref().map(|error| ErrorRecord {
        kind: error.kind(),
        message: error.to_string(),
      }),
    }
  }
}

/// Complete JSON report.
#[derive(Debug, Serialize)]
pub struct JsonReport {
  pub generated_at: String,
  pub path_count: usize,
  pub error_count: usize,
  pub counts: BTreeMap<Classification, usize>,
  pub files: Vec<FileRecord>,
}

impl JsonReport {
  pub fn new(results: &[ScanResult], summary: &Summary) -> Self {
    Self {
      generated_at: Local::now().to_rfc3339(),
      path_count: results.len(),
      error_count: summary.error_count,
      counts: summary.counts(),
      files: results.iter().map(FileRecord::from).collect(),
    }
  }

  pub fn to_json(&self) -> Result<String> {
    serde_json::to_string_pretty(self).with_context(|| "Failed to serialize JSON report")
  }

  /// Writes the report to `path`.
  pub fn write(&self, path: &Path) -> Result<()> {
    fs::write(path, self.to_json()?).with_context(|| format!("Failed to write report to {}", path.display()))
  }
}

/// Helper module for serializing PathBuf
mod path_serialization {
  use serde::Serializer;

  pub fn serialize<S>(path: &std::path::Path, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: Serializer,
  {
    serializer.serialize_str(&path.to_string_lossy())
  }
}
