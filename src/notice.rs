//! # Notice Detection Module
//!
//! Finds the copyright notice line in a file and extracts its fields. The
//! detector sits behind a trait so the scanner does not depend on one
//! particular matching rule.

use std::ops::Range;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::scan::ScanError;

/// Copyright line, with these capture groups:
///
/// - `style`, everything before the year, like `Copyright` or `Copyright (c)`
/// - `year`, one to four ASCII digits
/// - `suffix`, the rest of the line, typically the owner
///
/// Unanchored so that comment leaders in front of the notice are skipped.
static NOTICE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"(?i)(?P<style>copyright.*)\s+(?P<year>[0-9]{1,4})\s+(?P<suffix>.*)").expect("notice regex must compile")
});

/// A copyright notice found in a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
  pub style: String,
  pub year: i32,
  pub suffix: String,
  /// Zero-based index of the line holding the notice.
  pub line_index: usize,
  /// Byte range of the year digits within that line.
  pub year_span: Range<usize>,
}

/// Trait for notice detectors.
pub trait NoticeDetector: Send + Sync {
  /// Returns the first notice in `content`, if any.
  fn detect(&self, content: &str) -> Option<Notice>;
}

/// Default detector based on [`NOTICE_REGEX`].
#[derive(Debug, Default, Clone, Copy)]
pub struct RegexNoticeDetector;

impl NoticeDetector for RegexNoticeDetector {
  fn detect(&self, content: &str) -> Option<Notice> {
    detect_notice(content)
  }
}

/// Scans `content` line by line and returns the first copyright notice.
///
/// Lines are matched with their terminator and trailing whitespace removed, so
/// the year span is valid for the raw line as well. Later notice-like lines are
/// ignored.
pub fn detect_notice(content: &str) -> Option<Notice> {
  content.split_inclusive('\n').enumerate().find_map(|(line_index, line)| {
    let caps = NOTICE_REGEX.captures(line.trim_end())?;
    let year = caps.name("year")?;
    Some(Notice {
      style: caps["style"].to_string(),
      year: year.as_str().parse().ok()?,
      suffix: caps["suffix"].to_string(),
      line_index,
      year_span: year.range(),
    })
  })
}

/// Reads a whole file as UTF-8 text.
///
/// Binary content is reported as [`ScanError::Decode`] rather than being
/// decoded lossily, since a lossy decode could never be written back intact.
pub fn read_text(path: &Path) -> Result<String, ScanError> {
  let bytes = std::fs::read(path).map_err(ScanError::Read)?;
  String::from_utf8(bytes).map_err(|e| ScanError::Decode {
    valid_up_to: e.utf8_error().valid_up_to(),
  })
}

/// Reads `path` and returns its first copyright notice, if any.
pub fn read_notice(path: &Path) -> Result<Option<Notice>, ScanError> {
  Ok(detect_notice(&read_text(path)?))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_detect_hash_comment_notice() {
    let notice = detect_notice("# Copyright 2020 Acme\nprint('hi')\n").expect("notice");
    assert_eq!(notice.style, "Copyright");
    assert_eq!(notice.year, 2020);
    assert_eq!(notice.suffix, "Acme");
    assert_eq!(notice.line_index, 0);
    assert_eq!(notice.year_span, 12..16);
  }

  #[test]
  fn test_detect_is_case_insensitive_and_keeps_style() {
    let content = "/*\n * COPYRIGHT (c) 2023 VMware, Inc.\n */\n";
    let notice = detect_notice(content).expect("notice");
    assert_eq!(notice.style, "COPYRIGHT (c)");
    assert_eq!(notice.year, 2023);
    assert_eq!(notice.suffix, "VMware, Inc.");
    assert_eq!(notice.line_index, 1);
  }

  #[test]
  fn test_only_first_notice_counts() {
    let content = "// Copyright 2019 First\n// Copyright 2022 Second\n";
    let notice = detect_notice(content).expect("notice");
    assert_eq!(notice.year, 2019);
    assert_eq!(notice.suffix, "First");
  }

  #[test]
  fn test_trailing_whitespace_and_crlf_are_ignored() {
    let content = "// Copyright 2021 Acme Corp   \r\nfn main() {}\r\n";
    let notice = detect_notice(content).expect("notice");
    assert_eq!(notice.suffix, "Acme Corp");
    assert_eq!(&content[notice.year_span.clone()], "2021");
  }

  #[test]
  fn test_no_notice() {
    assert_eq!(detect_notice("fn main() {}\n"), None);
    assert_eq!(detect_notice(""), None);
    // A year with nothing after it does not make a notice.
    assert_eq!(detect_notice("# Copyright 2020\n"), None);
    // Five digits is not a year.
    assert_eq!(detect_notice("# Copyright 20201 Acme\n"), None);
  }

  #[test]
  fn test_short_years_are_accepted() {
    let notice = detect_notice("Copyright 99 Someone\n").expect("notice");
    assert_eq!(notice.year, 99);
  }

  #[test]
  fn test_read_text_rejects_binary() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("image.bin");
    std::fs::write(&path, [0x89, b'P', b'N', b'G', 0xff, 0xfe]).expect("write");

    let err = read_text(&path).expect_err("binary content");
    assert!(matches!(err, ScanError::Decode { valid_up_to: 0 }));
  }

  #[test]
  fn test_read_text_missing_file() {
    let err = read_text(Path::new("/definitely/not/here.txt")).expect_err("missing");
    assert!(matches!(err, ScanError::Read(_)));
  }

  #[test]
  fn test_read_notice_from_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("build.gradle");
    std::fs::write(&path, "// Copyright 2018 Acme\napply plugin: 'java'\n").expect("write");

    let notice = read_notice(&path).expect("readable").expect("notice");
    assert_eq!(notice.year, 2018);

    std::fs::write(&path, "apply plugin: 'java'\n").expect("write");
    assert_eq!(read_notice(&path).expect("readable"), None);
  }

  #[test]
  fn test_regex_detector_delegates() {
    let detector = RegexNoticeDetector;
    assert!(detector.detect("<!-- Copyright 2023 Acme -->").is_some());
  }
}
