//! # CLI Module
//!
//! This module contains the command-line interface implementation.
//! It uses clap for argument parsing and supports subcommands for
//! extensibility.

mod check;

pub use check::{CheckArgs, run_check};
use clap::builder::styling::{AnsiColor, Color, Style, Styles};
use clap::{Parser, Subcommand};

const CUSTOM_STYLES: Styles = Styles::styled()
  .header(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Green))).bold())
  .usage(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Green))).bold())
  .literal(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Blue))).bold())
  .placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan))))
  .error(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Red))).bold())
  .valid(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Green))))
  .invalid(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Yellow))));

const VERSION: &str = concat!(
  env!("CARGO_PKG_VERSION"),
  " (",
  env!("GIT_HASH"),
  " ",
  env!("GIT_DATE"),
  ")"
);

/// Top-level CLI arguments
#[derive(Parser, Debug)]
#[command(
  author,
  version = VERSION,
  about,
  styles = CUSTOM_STYLES,
  after_help = "Examples:
  # Report notice states without changing anything
  noticecheck --edit no

  # Review each correction as a diff and answer per file
  noticecheck --notice-template legal/copyright.txt

  # Scan everything first, then apply all corrections without asking
  noticecheck --summarise-first --edit yes

  # Check only the Android tree, one record per file
  noticecheck -v -- forAndroid/

  # Exempt generated sources and write a machine-readable report
  noticecheck --exempt \"**/generated/**\" --report-json notices.json
",
  help_template = "{before-help}{name} v{version}
{about-section}
{usage-heading} {usage}

{all-args}{after-help}
"
)]
pub struct Cli {
  #[command(subcommand)]
  pub command: Option<Command>,

  #[command(flatten)]
  pub check_args: CheckArgs,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
  /// Check and optionally correct copyright notices in tracked files (default)
  Check(CheckArgs),
}

impl Cli {
  /// Parse CLI arguments and return the Cli struct
  pub fn parse_args() -> Self {
    Self::parse()
  }

  /// Get the effective check arguments, whether from a subcommand or top-level
  pub fn get_check_args(self) -> CheckArgs {
    match self.command {
      Some(Command::Check(args)) => args,
      None => self.check_args,
    }
  }
}

