//! # noticecheck
//!
//! A tool that keeps the copyright notices of git-tracked files in step with
//! their commit history.

mod cli;

use anyhow::Result;

use crate::cli::{Cli, run_check};

fn main() -> Result<()> {
  let cli = Cli::parse_args();

  let code = run_check(cli.get_check_args())?;
  if code != 0 {
    std::process::exit(code);
  }
  Ok(())
}
