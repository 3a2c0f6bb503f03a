//! # Workspace Module
//!
//! This module defines the git work tree that noticecheck operates on.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::git;

/// The work tree being checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
  /// Top-level directory of the work tree. Config, ignore and template files
  /// are looked up here.
  root: PathBuf,
  /// Directory git runs in. Listed paths are relative to it.
  work_dir: PathBuf,
}

impl Workspace {
  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn work_dir(&self) -> &Path {
    &self.work_dir
  }
}

/// Resolve the workspace containing the current directory.
pub fn resolve_workspace() -> Result<Workspace> {
  let current_dir = std::env::current_dir().with_context(|| "Failed to get current directory")?;
  resolve_workspace_from(&current_dir)
}

/// Resolve the workspace containing `dir`. Fails outside a git work tree.
pub fn resolve_workspace_from(dir: &Path) -> Result<Workspace> {
  match git::discover_repo_root(dir)? {
    Some(root) => Ok(Workspace {
      root,
      work_dir: dir.to_path_buf(),
    }),
    None => bail!(
      "{} is not inside a git work tree; noticecheck checks tracked files only",
      dir.display()
    ),
  }
}
