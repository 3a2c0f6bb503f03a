//! # Output Module
//!
//! This module centralizes all user-facing output for the noticecheck tool:
//! the scan legend and progress glyphs, verbose per-file records, the error
//! block and the two summaries.
//!
//! Everything goes to stdout. Quiet mode keeps only the error block, so a
//! script can still see which files failed.

use std::io::Write;

use owo_colors::{OwoColorize, Stream};

use crate::logging::{is_quiet, is_verbose};
use crate::report::{Summary, first_or_len};
use crate::scan::{Classification, ScanError, ScanResult};

const INDENT: &str = "    ";

/// Print the heading shown before the first file is scanned.
///
/// Verbose runs print records, so they only get a heading. Otherwise the
/// legend of progress glyphs is printed.
pub fn print_scan_start() {
  if is_quiet() {
    return;
  }

  if is_verbose() {
    println!("Scanning...");
    return;
  }

  println!("Scan dots:");
  for classification in Classification::ALL {
    println!("{} {}", colored_glyph(classification), classification);
  }
}

/// Print the progress for one scanned file: its record in verbose mode, or
/// its glyph.
pub fn print_scan_progress(result: &ScanResult) {
  if is_quiet() {
    return;
  }

  if is_verbose() {
    println!("{}", format_record(result));
  } else {
    print!("{}", colored_glyph(result.classification));
    let _ = std::io::stdout().flush();
  }
}

/// Print the number of files scanned, ending the line of glyphs.
pub fn print_path_count(count: usize) {
  if is_quiet() {
    return;
  }

  if !is_verbose() {
    println!();
  }
  println!("Path count: {}.", count);
}

fn colored_glyph(classification: Classification) -> String {
  let glyph = classification.glyph();
  match classification {
    Classification::Exempt => glyph.if_supports_color(Stream::Stdout, |g| g.dimmed()).to_string(),
    Classification::Missing => glyph.if_supports_color(Stream::Stdout, |g| g.yellow()).to_string(),
    Classification::Correct => glyph.if_supports_color(Stream::Stdout, |g| g.green()).to_string(),
    Classification::IncorrectDate => glyph.if_supports_color(Stream::Stdout, |g| g.yellow()).to_string(),
    Classification::Error => glyph.if_supports_color(Stream::Stdout, |g| g.red()).to_string(),
  }
}

/// Two-line verbose record: the path, then the classification with whatever
/// was learned about the file.
pub fn format_record(result: &ScanResult) -> String {
  let mut fields = vec![result.classification.to_string()];
  if result.last_modified.is_some() || result.notice.is_some() {
    fields.push(
      result
        .last_modified
        .map_or_else(|| "None".to_string(), |date| date.format("%Y-%m-%d").to_string()),
    );
    match &result.notice {
      Some(notice) => {
        fields.push(format!("\"{}\"", notice.style));
        fields.push(notice.year.to_string());
        fields.push(format!("\"{}\"", notice.suffix));
      }
      None => fields.push("None".to_string()),
    }
  }
  format!("{}\n{}", result.path, fields.join(" "))
}

/// The error block lines for one failed file.
pub fn format_error(result: &ScanResult, error: &ScanError) -> String {
  let detail = match error {
    ScanError::Decode { .. } => format!(
      "Should the suffix \"{}\" be an exempt binary format?",
      result.path.suffix()
    ),
    other => other.to_string(),
  };
  format!("{}\nRaised {}.\n{}", result.path, error.kind(), detail)
}

/// Print every per-file error. Printed in quiet mode too.
///
/// Returns the number of errors printed.
pub fn print_errors(results: &[ScanResult]) -> usize {
  let mut count = 0;
  for result in results {
    if let Some(error) = &result.error {
      count += 1;
      let block = format_error(result, error);
      println!("{}", block.if_supports_color(Stream::Stdout, |b| b.red()));
    }
  }
  count
}

/// Both summary sections as text.
pub fn format_summary(summary: &Summary) -> String {
  let mut text = String::from("\nSummary by file format or exempt name and state:\n");
  for (format, states) in &summary.by_format {
    text.push_str(format);
    text.push('\n');

    let mut states: Vec<_> = states.iter().collect();
    states.sort_by_key(|(classification, _)| classification.name());
    for (classification, paths) in states {
      text.push_str(&format!("{}{}: {}\n", INDENT, classification, first_or_len(paths)));
    }
  }

  text.push_str("\nSummary by copyright:\n");
  let mut owners: Vec<_> = summary.by_owner.iter().collect();
  owners.sort_by_key(|&(owner, _)| owner.as_deref().unwrap_or("None"));
  for (owner, paths) in owners {
    let label = owner
      .as_ref()
      .map_or_else(|| "None".to_string(), |owner| format!("\"{}\"", owner));
    text.push_str(&format!("{} {}\n", label, first_or_len(paths)));
  }
  text
}

pub fn print_summary(summary: &Summary) {
  if is_quiet() {
    return;
  }
  print!("{}", format_summary(summary));
}
