//! # Path Matcher Module
//!
//! Gitignore-style path patterns used to exempt files from checking.
//!
//! A pattern is a sequence of `/`-separated segments. Each segment is either
//! `**`, which stands for zero or more whole path segments, or a glob (`*`,
//! `?`, `[...]`) that is matched against exactly one path segment. Matching
//! runs from the last segment backward, so a relative pattern such as `d/e.*`
//! matches `a/b/c/d/e.txt`. A pattern that starts with `/` is anchored and must
//! account for every segment of the path.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::{Component, Path};
use std::str::FromStr;

use anyhow::{Context, Result};
use glob::MatchOptions;
use tracing::trace;

/// Options for single-segment globs. Wildcards never cross a separator and do
/// match leading dots, as in gitignore.
const SEGMENT_MATCH: MatchOptions = MatchOptions {
  case_sensitive: true,
  require_literal_separator: true,
  require_literal_leading_dot: false,
};

#[derive(Debug, thiserror::Error)]
pub enum PatternError {
  #[error("pattern {0:?} has no segments")]
  Empty(String),

  #[error("invalid segment {segment:?} in pattern {pattern:?}: {source}")]
  InvalidSegment {
    pattern: String,
    segment: String,
    source: glob::PatternError,
  },
}

#[derive(Debug, Clone)]
enum Segment {
  /// `**`
  AnyDirs,
  Glob(glob::Pattern),
}

impl Segment {
  fn matches(&self, part: &str) -> bool {
    match self {
      Segment::AnyDirs => true,
      Segment::Glob(glob) => glob.matches_with(part, SEGMENT_MATCH),
    }
  }
}

impl fmt::Display for Segment {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Segment::AnyDirs => f.write_str("**"),
      Segment::Glob(glob) => f.write_str(glob.as_str()),
    }
  }
}

/// A parsed exemption pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
  source: String,
  anchored: bool,
  segments: Vec<Segment>,
}

impl Pattern {
  pub fn as_str(&self) -> &str {
    &self.source
  }

  /// Whether `path` matches this pattern.
  ///
  /// The cursor starts at the last path segment. A glob segment must match the
  /// segment under the cursor, which then moves one place left. A `**`
  /// segment looks at its left neighbour, the needle: another `**` is
  /// collapsed into this one, no needle matches everything that remains, and
  /// otherwise the cursor moves left to the nearest segment matching the
  /// needle, which the next comparison consumes. The match fails if no such
  /// segment exists.
  pub fn matches(&self, path: &Path) -> bool {
    let parts = path_parts(path);
    let mut remaining = parts.len();

    trace!(path = ?parts, pattern = %self.source, "matching");

    for index in (0..self.segments.len()).rev() {
      let segment = &self.segments[index];

      if let Segment::AnyDirs = segment {
        let needle = index.checked_sub(1).map(|left| &self.segments[left]);
        match needle {
          None => {
            trace!("leading ** takes {:?}", &parts[..remaining]);
            return true;
          }
          Some(Segment::AnyDirs) => {
            trace!("collapsing **/**");
          }
          Some(needle) => match (0..remaining).rev().find(|&i| needle.matches(&parts[i])) {
            Some(found) => {
              trace!("** found {} at {:?}", needle, parts[found]);
              remaining = found + 1;
            }
            None => {
              trace!("** needle {} not found", needle);
              return false;
            }
          },
        }
        continue;
      }

      match remaining.checked_sub(1) {
        Some(cursor) if segment.matches(&parts[cursor]) => {
          trace!("{} matches {:?}", segment, parts[cursor]);
          remaining = cursor;
        }
        Some(cursor) => {
          trace!("{} does not match {:?}", segment, parts[cursor]);
          return false;
        }
        None => {
          trace!("{} has no path segment left", segment);
          return false;
        }
      }
    }

    !self.anchored || remaining == 0
  }
}

impl FromStr for Pattern {
  type Err = PatternError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let source = s.trim().replace('\\', "/");
    let anchored = source.starts_with('/');

    let segments = source
      .split('/')
      .filter(|segment| !segment.is_empty() && *segment != ".")
      .map(|segment| {
        if segment == "**" {
          Ok(Segment::AnyDirs)
        } else {
          glob::Pattern::new(segment)
            .map(Segment::Glob)
            .map_err(|e| PatternError::InvalidSegment {
              pattern: source.clone(),
              segment: segment.to_string(),
              source: e,
            })
        }
      })
      .collect::<Result<Vec<_>, _>>()?;

    if segments.is_empty() {
      return Err(PatternError::Empty(source));
    }

    Ok(Self {
      source,
      anchored,
      segments,
    })
  }
}

impl fmt::Display for Pattern {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.source)
  }
}

fn path_parts(path: &Path) -> Vec<String> {
  path
    .components()
    .filter_map(|component| match component {
      Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
      Component::ParentDir => Some("..".to_string()),
      _ => None,
    })
    .collect()
}

/// Whether `path` matches `pattern`.
pub fn matches(path: &Path, pattern: &Pattern) -> bool {
  pattern.matches(path)
}

/// The first pattern, in order, that matches `path`.
pub fn first_matching_pattern<'a>(path: &Path, patterns: &'a [Pattern]) -> Option<&'a Pattern> {
  patterns.iter().find(|pattern| pattern.matches(path))
}

/// Reads patterns from a gitignore-format file.
///
/// Blank lines and `#` comments are skipped. A missing file yields no
/// patterns. Lines are read as the iterator is consumed.
pub fn read_ignore_file(path: &Path) -> Result<impl Iterator<Item = Result<Pattern>>> {
  let lines = match File::open(path) {
    Ok(file) => Some(BufReader::new(file).lines()),
    Err(e) if e.kind() == ErrorKind::NotFound => None,
    Err(e) => return Err(e).with_context(|| format!("Failed to open ignore file: {}", path.display())),
  };

  let display = path.display().to_string();
  Ok(
    lines
      .into_iter()
      .flatten()
      .enumerate()
      .filter_map(move |(index, line)| {
        let line = match line {
          Ok(line) => line,
          Err(e) => return Some(Err(anyhow::Error::new(e).context(format!("Failed to read {}", display)))),
        };
        let stripped = line.trim();
        if stripped.is_empty() || stripped.starts_with('#') {
          return None;
        }
        Some(
          stripped
            .parse::<Pattern>()
            .with_context(|| format!("Invalid pattern at {}:{}", display, index + 1)),
        )
      }),
  )
}

/// An ordered set of exemption patterns.
#[derive(Debug, Clone, Default)]
pub struct PathMatcher {
  patterns: Vec<Pattern>,
}

impl PathMatcher {
  pub const fn new(patterns: Vec<Pattern>) -> Self {
    Self { patterns }
  }

  /// Parses each string as a pattern.
  pub fn from_strings<S: AsRef<str>>(patterns: &[S]) -> Result<Self, PatternError> {
    let patterns = patterns
      .iter()
      .map(|pattern| pattern.as_ref().parse())
      .collect::<Result<Vec<_>, _>>()?;
    Ok(Self::new(patterns))
  }

  /// Loads all patterns from an ignore file.
  pub fn from_ignore_file(path: &Path) -> Result<Self> {
    Ok(Self::new(read_ignore_file(path)?.collect::<Result<Vec<_>>>()?))
  }

  /// Appends the patterns of `other` after this matcher's own.
  pub fn extend(&mut self, other: PathMatcher) {
    self.patterns.extend(other.patterns);
  }

  /// The first pattern that matches `path`.
  pub fn first_match(&self, path: &Path) -> Option<&Pattern> {
    first_matching_pattern(path, &self.patterns)
  }

  pub fn patterns(&self) -> &[Pattern] {
    &self.patterns
  }

  pub fn is_empty(&self) -> bool {
    self.patterns.is_empty()
  }
}
