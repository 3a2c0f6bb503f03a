#![allow(dead_code)]

use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};

/// Checks if git is available on the system.
pub fn is_git_available() -> bool {
  Command::new("git").arg("--version").status().is_ok()
}

/// Runs a git command in the given directory, returning an error with stderr on
/// failure.
pub fn run_git(dir: &Path, args: &[&str]) -> Result<()> {
  run_git_with_env(dir, args, &[])
}

fn run_git_with_env(dir: &Path, args: &[&str], env: &[(&str, &str)]) -> Result<()> {
  let output = Command::new("git")
    .args(args)
    .envs(env.iter().copied())
    .current_dir(dir)
    .output()
    .with_context(|| format!("Failed to execute git {:?}", args))?;

  if !output.status.success() {
    anyhow::bail!("git {:?} failed: {}", args, String::from_utf8_lossy(&output.stderr));
  }
  Ok(())
}

/// Initializes a git repository in the given directory with deterministic
/// settings.
///
/// Configures:
/// - Default branch name set to `main`
/// - User name and email for commits
/// - Disables commit signing for test isolation
pub fn init_git_repo(dir: &Path) -> Result<()> {
  run_git(dir, &["init"])?;
  run_git(dir, &["config", "init.defaultBranch", "main"])?;
  run_git(dir, &["branch", "-M", "main"])?;
  run_git(dir, &["config", "user.name", "Test User"])?;
  run_git(dir, &["config", "user.email", "test@example.com"])?;
  // Disable commit signing for test isolation
  run_git(dir, &["config", "commit.gpgsign", "false"])?;
  Ok(())
}

/// Stages `files` and commits them with both author and committer dates set
/// to `date`, e.g. `"2020-06-15T12:00:00"`.
pub fn commit_at(dir: &Path, files: &[&str], message: &str, date: &str) -> Result<()> {
  let mut add = vec!["add", "--"];
  add.extend_from_slice(files);
  run_git(dir, &add)?;
  run_git_with_env(
    dir,
    &["commit", "-m", message],
    &[("GIT_AUTHOR_DATE", date), ("GIT_COMMITTER_DATE", date)],
  )
}

/// Writes `content` to `name` under `dir`, creating parent directories.
pub fn write_file(dir: &Path, name: &str, content: impl AsRef<[u8]>) -> Result<()> {
  let path = dir.join(name);
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent)?;
  }
  std::fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))
}
