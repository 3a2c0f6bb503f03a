//! # Git Module
//!
//! This module contains the version-control adapter: listing tracked files and
//! finding the date of the last commit that touched a file.

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use git2::{ErrorCode, Repository};
use tracing::{debug, trace};

use crate::scan::TrackedPath;

/// Lazy listing of tracked paths.
pub type TrackedPaths = Box<dyn Iterator<Item = Result<TrackedPath>>>;

/// Errors looking up the history of one file.
#[derive(Debug, thiserror::Error)]
pub enum VcsError {
  /// The path has no commits, e.g. it was added to the index but never
  /// committed.
  #[error("no commit history found for {path}")]
  NoHistory { path: PathBuf },

  #[error("git log failed for {path}: {message}")]
  Command { path: PathBuf, message: String },

  #[error("could not parse commit date {output:?} for {path}")]
  InvalidDate { path: PathBuf, output: String },

  #[error("failed to run git: {0}")]
  Spawn(#[source] std::io::Error),
}

/// Abstract version-control operations used by the checker.
pub trait VersionControl {
  /// Lists tracked files, restricted by `pathspecs` when any are given.
  ///
  /// The sequence is finite and can be restarted by calling again. No order is
  /// guaranteed.
  fn list_tracked(&self, pathspecs: &[String]) -> Result<TrackedPaths>;

  /// Date of the most recent commit that touched `path`, following renames.
  fn last_modified_date(&self, path: &Path) -> Result<NaiveDate, VcsError>;
}

/// [`VersionControl`] backed by the `git` command line.
///
/// `git2` has no equivalent of `git log --follow`, so history queries shell
/// out.
#[derive(Debug, Clone)]
pub struct GitCli {
  work_dir: PathBuf,
}

impl GitCli {
  /// Creates an adapter that runs git in `work_dir`. Listed paths are relative
  /// to it.
  pub fn new(work_dir: impl Into<PathBuf>) -> Self {
    Self {
      work_dir: work_dir.into(),
    }
  }

  pub fn work_dir(&self) -> &Path {
    &self.work_dir
  }

  fn git(&self) -> Command {
    let mut command = Command::new("git");
    command.current_dir(&self.work_dir);
    command
  }

  /// Location of the work dir below the work-tree root, e.g. `forAndroid/`.
  /// Empty at the root.
  fn show_prefix(&self) -> Result<PathBuf> {
    let output = self
      .git()
      .args(["rev-parse", "--show-prefix"])
      .stderr(Stdio::piped())
      .output()
      .with_context(|| "Failed to run git rev-parse")?;
    if !output.status.success() {
      anyhow::bail!(
        "git rev-parse --show-prefix failed: {}",
        String::from_utf8_lossy(&output.stderr).trim()
      );
    }

    let mut prefix = output.stdout;
    if prefix.last() == Some(&b'\n') {
      prefix.pop();
    }
    trace!("Work dir prefix: {:?}", String::from_utf8_lossy(&prefix));
    Ok(path_from_bytes(prefix))
  }
}

impl VersionControl for GitCli {
  fn list_tracked(&self, pathspecs: &[String]) -> Result<TrackedPaths> {
    debug!("Listing tracked files with pathspecs {:?}", pathspecs);
    let prefix = self.show_prefix()?;

    // -z gives NUL terminators and verbatim names for unprintable bytes.
    let mut child = self
      .git()
      .args(["ls-files", "-z", "--"])
      .args(pathspecs)
      .stdout(Stdio::piped())
      .spawn()
      .with_context(|| "Failed to run git ls-files")?;

    let stdout = child
      .stdout
      .take()
      .with_context(|| "git ls-files produced no output stream")?;

    Ok(Box::new(LsFiles {
      root: self.work_dir.clone(),
      prefix,
      child,
      reader: BufReader::new(stdout),
      finished: false,
    }))
  }

  fn last_modified_date(&self, path: &Path) -> Result<NaiveDate, VcsError> {
    // --diff-filter=r skips the commit that only renamed the file.
    let output = self
      .git()
      .args([
        "log",
        "--follow",
        "--diff-filter=r",
        "--max-count=1",
        "--pretty=format:%cd",
        "--date=format:%Y %m %d",
        "--",
      ])
      .arg(path)
      .stderr(Stdio::piped())
      .output()
      .map_err(VcsError::Spawn)?;

    if !output.status.success() {
      return Err(VcsError::Command {
        path: path.to_path_buf(),
        message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
      });
    }

    let text = String::from_utf8_lossy(&output.stdout);
    trace!("git log date for {}: {:?}", path.display(), text);
    parse_log_date(path, text.trim())
  }
}

/// Parses the `%Y %m %d` output of `git log`.
fn parse_log_date(path: &Path, text: &str) -> Result<NaiveDate, VcsError> {
  if text.is_empty() {
    return Err(VcsError::NoHistory {
      path: path.to_path_buf(),
    });
  }

  let invalid = || VcsError::InvalidDate {
    path: path.to_path_buf(),
    output: text.to_string(),
  };

  let parts: Vec<u32> = text
    .split_whitespace()
    .map(str::parse)
    .collect::<Result<_, _>>()
    .map_err(|_err| invalid())?;

  match parts.as_slice() {
    [year, month, day] => {
      let year = i32::try_from(*year).map_err(|_err| invalid())?;
      NaiveDate::from_ymd_opt(year, *month, *day).ok_or_else(invalid)
    }
    _ => Err(invalid()),
  }
}

/// Streaming reader over `git ls-files -z` output.
struct LsFiles {
  root: PathBuf,
  prefix: PathBuf,
  child: Child,
  reader: BufReader<ChildStdout>,
  finished: bool,
}

impl Iterator for LsFiles {
  type Item = Result<TrackedPath>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.finished {
      return None;
    }

    let mut name = Vec::new();
    match self.reader.read_until(0, &mut name) {
      Ok(0) => {
        self.finished = true;
        match self.child.wait() {
          Ok(status) if status.success() => None,
          Ok(status) => Some(Err(anyhow::anyhow!("git ls-files exited with {}", status))),
          Err(e) => Some(Err(anyhow::Error::new(e).context("Failed to wait for git ls-files"))),
        }
      }
      Ok(_) => {
        if name.last() == Some(&0) {
          name.pop();
        }
        Some(Ok(TrackedPath::in_subdir(&self.root, &self.prefix, path_from_bytes(name))))
      }
      Err(e) => {
        self.finished = true;
        Some(Err(anyhow::Error::new(e).context("Failed to read git ls-files output")))
      }
    }
  }
}

impl Drop for LsFiles {
  fn drop(&mut self) {
    // Listing abandoned early, e.g. by --stop-after.
    if !self.finished {
      let _ = self.child.kill();
      let _ = self.child.wait();
    }
  }
}

#[cfg(unix)]
fn path_from_bytes(bytes: Vec<u8>) -> PathBuf {
  use std::ffi::OsString;
  use std::os::unix::ffi::OsStringExt;

  PathBuf::from(OsString::from_vec(bytes))
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: Vec<u8>) -> PathBuf {
  PathBuf::from(String::from_utf8_lossy(&bytes).into_owned())
}

/// Finds the root of the git work tree containing `start`, if any.
pub fn discover_repo_root(start: &Path) -> Result<Option<PathBuf>> {
  match Repository::discover(start) {
    Ok(repo) => Ok(repo.workdir().map(Path::to_path_buf)),
    Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
    Err(e) => Err(e).with_context(|| format!("Failed to open git repository from {}", start.display())),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_log_date() {
    let date = parse_log_date(Path::new("a.py"), "2024 02 29").expect("date");
    assert_eq!(date, NaiveDate::from_ymd_opt(2024, 2, 29).expect("valid"));
  }

  #[test]
  fn test_parse_log_date_empty_is_no_history() {
    let err = parse_log_date(Path::new("a.py"), "").expect_err("no history");
    assert!(matches!(err, VcsError::NoHistory { .. }));
  }

  #[test]
  fn test_parse_log_date_garbage() {
    for text in ["2024 13 01", "yesterday", "2024 01", "2024 01 01 01"] {
      let err = parse_log_date(Path::new("a.py"), text).expect_err(text);
      assert!(matches!(err, VcsError::InvalidDate { .. }), "{text}");
    }
  }

  #[test]
  fn test_discover_repo_root_outside_repository() -> Result<()> {
    let dir = tempfile::tempdir()?;
    // The temp dir may itself live inside a repository on some machines, so
    // only check that discovery does not fail.
    let _ = discover_repo_root(dir.path())?;
    Ok(())
  }
}
