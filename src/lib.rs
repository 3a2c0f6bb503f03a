//! # noticecheck
//!
//! Audits the copyright notices of the files tracked by a git repository.
//!
//! Each tracked file is classified by comparing the year in its copyright
//! notice with the year of the last commit that touched it. Wrong years can be
//! rewritten and missing notices inserted from a template, each edit shown as
//! a diff and confirmed (or applied or skipped wholesale) before the original
//! is replaced.
//!
//! ## Usage as a Library
//!
//! ```rust,no_run
//! use chrono::Local;
//! use noticecheck::checker::{CheckerConfig, NoticeChecker};
//! use noticecheck::editor::{CommentConventions, NoticeEditor, NoticeTemplate};
//! use noticecheck::git::GitCli;
//! use noticecheck::overwrite::{EditMode, Overwrite};
//!
//! fn main() -> anyhow::Result<()> {
//!     let template = NoticeTemplate::render("Copyright %Y Acme, Inc.", Local::now().naive_local())?;
//!     let editor = NoticeEditor::new(template, CommentConventions::default());
//!
//!     // Report only, never touch a file
//!     let config = CheckerConfig {
//!         edit_mode: EditMode::No,
//!         ..CheckerConfig::default()
//!     };
//!
//!     let mut checker = NoticeChecker::new(config, GitCli::new("."), editor, Overwrite::stdio());
//!     let outcome = checker.run()?;
//!
//!     if outcome.exit_code() != 0 {
//!         println!("{} files could not be checked", outcome.summary.error_count);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! * [`checker`] - Scan loop, corrections and rescans
//! * [`notice`] - Finding the notice in a file
//! * [`editor`] - Year rewrites, notice insertion and staged edits
//! * [`path_matcher`] - Gitignore-style exemption patterns
//! * [`git`] - Tracked files and commit dates
//! * [`logging`] - Logging utilities for verbose output
//!
//! [`checker`]: crate::checker
//! [`notice`]: crate::notice
//! [`editor`]: crate::editor
//! [`path_matcher`]: crate::path_matcher
//! [`git`]: crate::git
//! [`logging`]: crate::logging

pub mod checker;
pub mod config;
pub mod diff;
pub mod editor;
pub mod git;
pub mod logging;
pub mod notice;
pub mod output;
pub mod overwrite;
pub mod path_matcher;
pub mod report;
pub mod scan;
pub mod workspace;
