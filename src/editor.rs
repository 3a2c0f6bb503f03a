//! # Editor Module
//!
//! Builds edited copies of files: a notice year rewritten in place, or a new
//! notice inserted at the top. Edits are staged in a temporary file next to the
//! original and only replace it when committed.
//!
//! ## Example
//!
//! ```rust,no_run
//! use chrono::Local;
//! use noticecheck::editor::{CommentConventions, NoticeEditor, NoticeTemplate};
//! use noticecheck::scan::TrackedPath;
//!
//! # fn main() -> anyhow::Result<()> {
//! let template = NoticeTemplate::render("Copyright %Y Acme", Local::now().naive_local())?;
//! let editor = NoticeEditor::new(template, CommentConventions::default());
//!
//! let tracked = TrackedPath::new(std::path::Path::new("."), "setup.py");
//! let proposal = editor.insert_notice(&tracked)?;
//! proposal.commit()?;
//! # Ok(())
//! # }
//! ```

use std::fmt::Write as _;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use chrono::format::{Item, StrftimeItems};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::notice::{detect_notice, read_text};
use crate::scan::{ScanError, ScanResult, TrackedPath};

/// Errors preparing the notice template.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
  #[error("Failed to read notice template '{path}': {source}")]
  Read {
    path: PathBuf,
    source: std::io::Error,
  },

  #[error("Invalid date format in notice template line {line}: {text:?}")]
  InvalidFormat { line: usize, text: String },

  #[error("Notice template has no text")]
  Empty,

  /// No rendered line reads as a notice, e.g. `Copyright %Y` with no owner.
  /// Inserting it would leave the file looking unmarked.
  #[error("Notice template has no line like \"Copyright <year> <owner>\": {text:?}")]
  NoNotice { text: String },
}

/// The notice text to insert, with date fields already filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoticeTemplate {
  lines: Vec<String>,
}

impl NoticeTemplate {
  /// Reads a template file and formats it for `date`.
  pub fn load(path: &Path, date: NaiveDateTime) -> Result<Self, TemplateError> {
    debug!("Loading notice template from {}", path.display());
    let text = fs::read_to_string(path).map_err(|e| TemplateError::Read {
      path: path.to_path_buf(),
      source: e,
    })?;
    Self::render(&text, date)
  }

  /// Formats each line of `text` as a strftime pattern, so `%Y` becomes the
  /// year of `date`.
  ///
  /// Trailing whitespace is stripped from every line, and blank lines at the
  /// end are dropped.
  pub fn render(text: &str, date: NaiveDateTime) -> Result<Self, TemplateError> {
    let mut lines = Vec::new();
    for (index, raw) in text.lines().enumerate() {
      let pattern = raw.trim_end();
      let invalid = || TemplateError::InvalidFormat {
        line: index + 1,
        text: pattern.to_string(),
      };

      let items: Vec<Item<'_>> = StrftimeItems::new(pattern).collect();
      if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(invalid());
      }

      let mut line = String::new();
      write!(line, "{}", date.format_with_items(items.into_iter())).map_err(|_err| invalid())?;
      lines.push(line.trim_end().to_string());
    }

    while lines.last().is_some_and(String::is_empty) {
      lines.pop();
    }
    if lines.is_empty() {
      return Err(TemplateError::Empty);
    }
    let text = lines.join("\n");
    if detect_notice(&text).is_none() {
      return Err(TemplateError::NoNotice { text });
    }

    Ok(Self { lines })
  }

  pub fn lines(&self) -> &[String] {
    &self.lines
  }
}

/// How a notice is written into a given kind of file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoticeFormat {
  /// One comment per line, e.g. `# Copyright 2024 Acme`.
  Line { leader: String },
  /// An XML comment block.
  Markup,
}

/// Maps file suffixes and names to a [`NoticeFormat`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentConventions {
  /// Leader and the suffixes or file names that use it.
  leaders: Vec<(String, Vec<String>)>,
  markup_suffixes: Vec<String>,
}

impl Default for CommentConventions {
  fn default() -> Self {
    let leaders = [
      (
        "#",
        &[
          ".gitignore", ".pro", ".properties", ".py", ".rb", ".sh", ".toml", ".yaml", ".yml",
        ][..],
      ),
      (
        "//",
        &[
          ".c", ".cpp", ".go", ".gradle", ".h", ".java", ".js", ".kt", ".m", ".rs", ".swift", ".ts",
        ][..],
      ),
    ];
    Self::new(
      leaders
        .iter()
        .map(|(leader, keys)| (leader.to_string(), keys.iter().map(|key| key.to_string()).collect()))
        .collect(),
      vec![".xml".to_string(), ".html".to_string(), ".xcworkspacedata".to_string()],
    )
  }
}

impl CommentConventions {
  pub const fn new(leaders: Vec<(String, Vec<String>)>, markup_suffixes: Vec<String>) -> Self {
    Self {
      leaders,
      markup_suffixes,
    }
  }

  /// Registers `leader` for a suffix or file name, taking it away from any
  /// other leader and from the markup suffixes.
  pub fn set_leader(&mut self, key: &str, leader: &str) {
    for (_, keys) in &mut self.leaders {
      keys.retain(|k| k != key);
    }
    self.markup_suffixes.retain(|suffix| suffix != key);

    match self.leaders.iter_mut().find(|(existing, _)| existing == leader) {
      Some((_, keys)) => keys.push(key.to_string()),
      None => self.leaders.push((leader.to_string(), vec![key.to_string()])),
    }
  }

  /// Replaces the suffixes that get XML comment blocks.
  pub fn set_markup_suffixes(&mut self, suffixes: Vec<String>) {
    self.markup_suffixes = suffixes;
  }

  /// Looks up the format for a file.
  ///
  /// Markup suffixes win, then a leader registered for the suffix, then one
  /// registered for the whole file name. Dot-files such as `.gitignore` have
  /// no suffix, so they are found by name.
  pub fn format_for(&self, tracked: &TrackedPath) -> Option<NoticeFormat> {
    let suffix = tracked.suffix();
    if !suffix.is_empty() && self.markup_suffixes.contains(&suffix) {
      return Some(NoticeFormat::Markup);
    }

    let leader_for = |key: &str| {
      self
        .leaders
        .iter()
        .find(|(_, keys)| keys.iter().any(|k| k == key))
        .map(|(leader, _)| NoticeFormat::Line { leader: leader.clone() })
    };

    if !suffix.is_empty()
      && let Some(format) = leader_for(&suffix)
    {
      return Some(format);
    }
    leader_for(&tracked.name())
  }
}

/// Produces [`EditProposal`]s for notice corrections.
#[derive(Debug, Clone)]
pub struct NoticeEditor {
  template: NoticeTemplate,
  conventions: CommentConventions,
}

impl NoticeEditor {
  pub const fn new(template: NoticeTemplate, conventions: CommentConventions) -> Self {
    Self { template, conventions }
  }

  pub const fn template(&self) -> &NoticeTemplate {
    &self.template
  }

  /// Stages a copy of the scanned file with the notice year replaced by
  /// `year`.
  pub fn rewrite_year(&self, scan: &ScanResult, year: i32) -> Result<EditProposal> {
    let notice = scan
      .notice
      .as_ref()
      .with_context(|| format!("{} has no notice to rewrite", scan.path))?;

    let content = read_text(scan.path.file()).map_err(anyhow::Error::new)?;
    let edited = rewrite_year_in(&content, notice.line_index, notice.year_span.clone(), notice.year, year)
      .with_context(|| format!("Notice in {} changed since it was scanned", scan.path))?;

    debug!("Rewriting notice year in {} from {} to {}", scan.path, notice.year, year);
    EditProposal::stage(scan.path.clone(), &edited)
  }

  /// Stages a copy of the file with the template inserted as a notice.
  ///
  /// Fails with [`ScanError::UnsupportedFormat`] when no comment convention
  /// covers the file; that error is returned without added context so the
  /// caller can record it against the file.
  pub fn insert_notice(&self, tracked: &TrackedPath) -> Result<EditProposal> {
    let Some(format) = self.conventions.format_for(tracked) else {
      return Err(
        ScanError::UnsupportedFormat {
          suffix: tracked.suffix(),
        }
        .into(),
      );
    };

    let content = read_text(tracked.file()).map_err(anyhow::Error::new)?;
    let edited = insert_into(&content, &format, self.template.lines());

    debug!("Inserting notice into {} as {:?}", tracked, format);
    EditProposal::stage(tracked.clone(), &edited)
  }
}

/// Replaces the year digits at `span` on line `line_index`.
///
/// Returns `None` when that span no longer holds `expected`. Every other byte
/// of `content`, line terminators included, is kept.
pub fn rewrite_year_in(
  content: &str,
  line_index: usize,
  span: std::ops::Range<usize>,
  expected: i32,
  year: i32,
) -> Option<String> {
  let line_start: usize = content
    .split_inclusive('\n')
    .take(line_index)
    .map(str::len)
    .sum();
  let line = content[line_start..].split_inclusive('\n').next()?;
  let current = line.get(span.clone())?;
  if current.parse::<i32>().ok()? != expected {
    return None;
  }

  let start = line_start + span.start;
  let end = line_start + span.end;
  let mut edited = String::with_capacity(content.len() + 4);
  edited.push_str(&content[..start]);
  edited.push_str(&year.to_string());
  edited.push_str(&content[end..]);
  Some(edited)
}

/// Inserts a notice built from `lines` into `content`.
///
/// Every line, blank ones included, is written as `<leader> <line>`, or
/// indented four spaces inside an XML comment block.
pub fn insert_into(content: &str, format: &NoticeFormat, lines: &[String]) -> String {
  match format {
    NoticeFormat::Line { leader } => {
      let mut edited = String::with_capacity(content.len() + 128);
      for line in lines {
        edited.push_str(leader);
        edited.push(' ');
        edited.push_str(line);
        edited.push('\n');
      }
      let first_line = content.lines().next().unwrap_or("");
      if !first_line.trim().is_empty() {
        edited.push('\n');
      }
      edited.push_str(content);
      edited
    }
    NoticeFormat::Markup => {
      let mut block = String::from("<!--\n");
      for line in lines {
        block.push_str("    ");
        block.push_str(line);
        block.push('\n');
      }
      block.push_str("-->\n");

      let first = content.split_inclusive('\n').next().unwrap_or("");
      if first.starts_with("<?xml") || first.starts_with("<!DOCTYPE ") {
        let mut edited = String::with_capacity(content.len() + block.len() + 1);
        edited.push_str(first);
        if !first.ends_with('\n') {
          edited.push('\n');
        }
        edited.push_str(&block);
        edited.push_str(&content[first.len()..]);
        edited
      } else {
        block + content
      }
    }
  }
}

/// An edited copy of a file, staged next to the original.
///
/// Dropping a proposal removes the staged file. [`commit`](Self::commit)
/// renames it over the original. When the tracked path is a symlink the edit
/// is written through to the file it points at, and the link is left alone.
#[derive(Debug)]
pub struct EditProposal {
  tracked: TrackedPath,
  target: PathBuf,
  staged: NamedTempFile,
}

impl EditProposal {
  /// Writes `content` to a hidden temporary file in the target's directory,
  /// keeping its suffix so editors and diff tools treat it the same way.
  pub fn stage(tracked: TrackedPath, content: &str) -> Result<Self> {
    let target = write_target(tracked.file())?;
    let dir = target
      .parent()
      .filter(|dir| !dir.as_os_str().is_empty())
      .unwrap_or(Path::new("."));
    let stem = target
      .file_stem()
      .map(|stem| stem.to_string_lossy().into_owned())
      .unwrap_or_default();
    let prefix = format!(".{}_", stem.trim_start_matches('.'));
    let suffix = tracked.suffix();

    let mut staged = tempfile::Builder::new()
      .prefix(&prefix)
      .suffix(&suffix)
      .tempfile_in(dir)
      .with_context(|| format!("Failed to create staging file in {}", dir.display()))?;
    staged
      .write_all(content.as_bytes())
      .and_then(|()| staged.flush())
      .with_context(|| format!("Failed to write staging file {}", staged.path().display()))?;

    Ok(Self { tracked, target, staged })
  }

  pub const fn tracked(&self) -> &TrackedPath {
    &self.tracked
  }

  /// Location of the file the proposal would replace.
  pub fn original(&self) -> &Path {
    self.tracked.file()
  }

  /// The file [`commit`](Self::commit) replaces: the original, or the end
  /// of its symlink chain.
  pub fn target(&self) -> &Path {
    &self.target
  }

  pub fn staged_path(&self) -> &Path {
    self.staged.path()
  }

  /// Reads back the staged content.
  pub fn edited_text(&self) -> Result<String> {
    fs::read_to_string(self.staged.path())
      .with_context(|| format!("Failed to read staging file {}", self.staged.path().display()))
  }

  /// Replaces the original with the staged file.
  ///
  /// The staged file takes the original's permissions first, then is renamed
  /// over it in one step.
  pub fn commit(self) -> Result<()> {
    let target = self.target;
    let permissions = fs::metadata(&target)
      .with_context(|| format!("Failed to read permissions of {}", target.display()))?
      .permissions();
    fs::set_permissions(self.staged.path(), permissions)
      .with_context(|| format!("Failed to set permissions on {}", self.staged.path().display()))?;

    self
      .staged
      .persist(&target)
      .map_err(|e| e.error)
      .with_context(|| format!("Failed to replace {}", target.display()))?;
    Ok(())
  }
}

/// The file an edit of `path` must land in. Symlinks resolve to their final
/// target, so renaming over it keeps the link intact.
fn write_target(path: &Path) -> Result<PathBuf> {
  let metadata =
    fs::symlink_metadata(path).with_context(|| format!("Failed to read metadata of {}", path.display()))?;
  if metadata.file_type().is_symlink() {
    let target = fs::canonicalize(path).with_context(|| format!("Failed to resolve symlink {}", path.display()))?;
    debug!("{} is a symlink; editing {}", path.display(), target.display());
    Ok(target)
  } else {
    Ok(path.to_path_buf())
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;

  fn date(year: i32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, 3, 1)
      .and_then(|d| d.and_hms_opt(12, 0, 0))
      .expect("valid date")
  }

  fn lines(text: &[&str]) -> Vec<String> {
    text.iter().map(|line| line.to_string()).collect()
  }

  #[test]
  fn test_template_formats_year() {
    let template = NoticeTemplate::render("Copyright %Y Acme   \nAll rights reserved.\n\n\n", date(2025)).expect("template");
    assert_eq!(template.lines(), &["Copyright 2025 Acme", "All rights reserved."]);
  }

  #[test]
  fn test_template_rejects_bad_specifier() {
    let err = NoticeTemplate::render("Copyright %Y Acme\n(c) %", date(2025)).expect_err("bad format");
    assert!(matches!(err, TemplateError::InvalidFormat { line: 2, .. }));
  }

  #[test]
  fn test_template_must_contain_a_notice() {
    let err = NoticeTemplate::render("Copyright %Y\n", date(2025)).expect_err("no owner");
    assert!(matches!(err, TemplateError::NoNotice { ref text } if text == "Copyright 2025"));
    assert!(matches!(
      NoticeTemplate::render("All rights reserved.", date(2025)),
      Err(TemplateError::NoNotice { .. })
    ));
    // The notice may sit on any line.
    assert!(NoticeTemplate::render("Acme Tools\n(c) Copyright %Y Acme", date(2025)).is_ok());
  }

  #[test]
  fn test_template_rejects_empty_text() {
    assert!(matches!(NoticeTemplate::render("\n  \n", date(2025)), Err(TemplateError::Empty)));
  }

  #[test]
  fn test_rewrite_year_changes_only_the_digits() {
    let content = "#!/usr/bin/env python\r\n# Copyright 2020 Acme\r\nprint('x')";
    let notice = detect_notice(content).expect("notice");
    let edited = rewrite_year_in(content, notice.line_index, notice.year_span.clone(), 2020, 2024).expect("edit");
    assert_eq!(edited, "#!/usr/bin/env python\r\n# Copyright 2024 Acme\r\nprint('x')");

    let back = rewrite_year_in(&edited, notice.line_index, notice.year_span, 2024, 2020).expect("edit back");
    assert_eq!(back, content);
  }

  #[test]
  fn test_rewrite_year_detects_stale_span() {
    assert_eq!(rewrite_year_in("# Copyright 2021 Acme\n", 0, 12..16, 2020, 2024), None);
    assert_eq!(rewrite_year_in("# Copyright 2021 Acme\n", 3, 12..16, 2021, 2024), None);
  }

  #[test]
  fn test_insert_line_notice_adds_separator() {
    let leader = NoticeFormat::Line { leader: "#".to_string() };
    let notice = lines(&["Copyright 2024 Acme", "", "Licensed under MIT."]);
    assert_eq!(
      insert_into("import os\n", &leader, &notice),
      "# Copyright 2024 Acme\n# \n# Licensed under MIT.\n\nimport os\n"
    );
    assert_eq!(
      insert_into("\nimport os\n", &leader, &notice[..1]),
      "# Copyright 2024 Acme\n\nimport os\n"
    );
    assert_eq!(insert_into("", &leader, &notice[..1]), "# Copyright 2024 Acme\n");
  }

  #[test]
  fn test_insert_markup_after_declaration() {
    let notice = lines(&["Copyright 2024 Acme"]);
    assert_eq!(
      insert_into("<?xml version=\"1.0\"?>\n<root/>\n", &NoticeFormat::Markup, &notice),
      "<?xml version=\"1.0\"?>\n<!--\n    Copyright 2024 Acme\n-->\n<root/>\n"
    );
    assert_eq!(
      insert_into("<!DOCTYPE html>", &NoticeFormat::Markup, &notice),
      "<!DOCTYPE html>\n<!--\n    Copyright 2024 Acme\n-->\n"
    );
    assert_eq!(
      insert_into("<root/>\n", &NoticeFormat::Markup, &notice),
      "<!--\n    Copyright 2024 Acme\n-->\n<root/>\n"
    );
    assert_eq!(
      insert_into("<root/>\n", &NoticeFormat::Markup, &lines(&["Copyright 2024 Acme", "", "MIT"])),
      "<!--\n    Copyright 2024 Acme\n    \n    MIT\n-->\n<root/>\n"
    );
  }

  #[test]
  fn test_format_lookup() {
    let conventions = CommentConventions::default();
    let root = Path::new("/repo");
    let format = |path: &str| conventions.format_for(&TrackedPath::new(root, path));

    assert_eq!(format("app/build.gradle"), Some(NoticeFormat::Line { leader: "//".to_string() }));
    assert_eq!(format("tool.py"), Some(NoticeFormat::Line { leader: "#".to_string() }));
    assert_eq!(format("sub/.gitignore"), Some(NoticeFormat::Line { leader: "#".to_string() }));
    assert_eq!(format("res/layout.xml"), Some(NoticeFormat::Markup));
    assert_eq!(format("notes.txt"), None);
    assert_eq!(format("Makefile"), None);
  }

  #[test]
  fn test_set_leader_moves_key() {
    let mut conventions = CommentConventions::default();
    conventions.set_leader(".xml", "#");
    conventions.set_leader("Makefile", "#");
    conventions.set_leader(".sql", "--");

    let root = Path::new("/repo");
    let format = |path: &str| conventions.format_for(&TrackedPath::new(root, path));
    assert_eq!(format("a.xml"), Some(NoticeFormat::Line { leader: "#".to_string() }));
    assert_eq!(format("Makefile"), Some(NoticeFormat::Line { leader: "#".to_string() }));
    assert_eq!(format("q.sql"), Some(NoticeFormat::Line { leader: "--".to_string() }));
  }

  #[test]
  fn test_insert_notice_unsupported_format() -> Result<()> {
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join("notes.txt"), "hello\n")?;
    let template = NoticeTemplate::render("Copyright %Y Acme", date(2024))?;
    let editor = NoticeEditor::new(template, CommentConventions::default());

    let err = editor
      .insert_notice(&TrackedPath::new(dir.path(), "notes.txt"))
      .expect_err("no leader for .txt");
    assert!(matches!(
      err.downcast_ref::<ScanError>(),
      Some(ScanError::UnsupportedFormat { suffix }) if suffix == ".txt"
    ));
    Ok(())
  }

  #[test]
  fn test_proposal_commit_and_drop() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("tool.py");
    fs::write(&path, "print('hi')\n")?;
    let template = NoticeTemplate::render("Copyright %Y Acme", date(2024))?;
    let editor = NoticeEditor::new(template, CommentConventions::default());
    let tracked = TrackedPath::new(dir.path(), "tool.py");

    let rejected = editor.insert_notice(&tracked)?;
    let staged = rejected.staged_path().to_path_buf();
    assert!(staged.exists());
    assert_eq!(staged.parent(), Some(dir.path()));
    drop(rejected);
    assert!(!staged.exists());
    assert_eq!(fs::read_to_string(&path)?, "print('hi')\n");

    editor.insert_notice(&tracked)?.commit()?;
    assert_eq!(fs::read_to_string(&path)?, "# Copyright 2024 Acme\n\nprint('hi')\n");
    assert_eq!(fs::read_dir(dir.path())?.count(), 1);
    Ok(())
  }

  #[cfg(unix)]
  #[test]
  fn test_commit_keeps_permissions() -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("run.py");
    fs::write(&path, "print('hi')\n")?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;

    let template = NoticeTemplate::render("Copyright %Y Acme", date(2024))?;
    let editor = NoticeEditor::new(template, CommentConventions::default());
    editor.insert_notice(&TrackedPath::new(dir.path(), "run.py"))?.commit()?;

    assert_eq!(fs::metadata(&path)?.permissions().mode() & 0o777, 0o755);
    Ok(())
  }

  #[cfg(unix)]
  #[test]
  fn test_commit_writes_through_symlink() -> Result<()> {
    let dir = tempfile::tempdir()?;
    fs::create_dir(dir.path().join("real"))?;
    let real = dir.path().join("real/tool.py");
    fs::write(&real, "print('hi')\n")?;
    let link = dir.path().join("tool.py");
    std::os::unix::fs::symlink("real/tool.py", &link)?;

    let template = NoticeTemplate::render("Copyright %Y Acme", date(2024))?;
    let editor = NoticeEditor::new(template, CommentConventions::default());
    let proposal = editor.insert_notice(&TrackedPath::new(dir.path(), "tool.py"))?;
    assert_eq!(proposal.target(), real.canonicalize()?);
    assert_eq!(proposal.original(), link);
    proposal.commit()?;

    assert!(fs::symlink_metadata(&link)?.file_type().is_symlink());
    assert_eq!(fs::read_link(&link)?, Path::new("real/tool.py"));
    assert_eq!(fs::read_to_string(&real)?, "# Copyright 2024 Acme\n\nprint('hi')\n");
    Ok(())
  }
}
