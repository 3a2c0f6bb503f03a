//! # Diff Module
//!
//! This module renders the unified diff shown before a file is overwritten.

use owo_colors::{OwoColorize, Stream};
use similar::TextDiff;

/// Label used for the edited side of every diff.
pub const EDITED_LABEL: &str = "Edited";

/// Renders a unified diff between the original and the edited content.
///
/// `from` labels the original side, normally the file path. The edited side is
/// always labelled [`EDITED_LABEL`].
pub fn render_unified_diff(from: &str, original: &str, edited: &str) -> String {
  TextDiff::from_lines(original, edited)
    .unified_diff()
    .context_radius(3)
    .header(from, EDITED_LABEL)
    .to_string()
}

/// Colors a rendered diff line by line for the terminal.
///
/// Colors are only applied when stdout supports them, so the result can be
/// written to a pipe unchanged.
pub fn colorize_diff(diff: &str) -> String {
  let mut colored = String::with_capacity(diff.len());
  for line in diff.split_inclusive('\n') {
    let styled = if line.starts_with("+++") || line.starts_with("---") {
      line.if_supports_color(Stream::Stdout, |l| l.bold()).to_string()
    } else if line.starts_with('+') {
      line.if_supports_color(Stream::Stdout, |l| l.green()).to_string()
    } else if line.starts_with('-') {
      line.if_supports_color(Stream::Stdout, |l| l.red()).to_string()
    } else if line.starts_with("@@") {
      line.if_supports_color(Stream::Stdout, |l| l.cyan()).to_string()
    } else {
      line.to_string()
    };
    colored.push_str(&styled);
  }
  colored
}
