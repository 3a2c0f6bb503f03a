//! # Check Command
//!
//! This module implements the check command: audit the copyright notices of
//! tracked files and correct them as the edit mode allows. This is the default
//! command when no subcommand is specified.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use clap::Args;
use noticecheck::checker::{CheckerConfig, NoticeChecker};
use noticecheck::config::{Config, DEFAULT_IGNORE_FILENAME, DEFAULT_TEMPLATE_FILENAME, load_config};
use noticecheck::editor::{NoticeEditor, NoticeTemplate};
use noticecheck::git::GitCli;
use noticecheck::info_log;
use noticecheck::logging::{ColorMode, init_tracing, set_quiet, set_verbose};
use noticecheck::overwrite::{EditMode, Overwrite};
use noticecheck::path_matcher::{PathMatcher, Pattern};
use noticecheck::report::JsonReport;
use noticecheck::workspace::{Workspace, resolve_workspace};
use tracing::debug;

/// Arguments for the check command
#[derive(Args, Debug, Default)]
pub struct CheckArgs {
  /// Pathspecs passed to `git ls-files` to restrict which tracked files are
  /// checked. All tracked files under the current directory by default.
  #[arg(required = false)]
  pub pathspecs: Vec<String>,

  /// How to handle corrections: apply them all, apply none, or show each diff
  /// and ask
  #[arg(long, short = 'e', value_name = "MODE", value_enum, default_value_t = EditMode::Prompt)]
  pub edit: EditMode,

  /// Scan and summarise every file before making any correction
  #[arg(long, short = 's')]
  pub summarise_first: bool,

  /// Notice template; lines are strftime formats, e.g. "Copyright %Y Acme"
  /// [default: copyright.txt in the work-tree root]
  #[arg(long, short = 't', value_name = "FILE")]
  pub notice_template: Option<PathBuf>,

  /// Stop after this many files (0 checks every file)
  #[arg(long, value_name = "N", default_value_t = 0)]
  pub stop_after: usize,

  /// File name that is never checked (repeatable; replaces the defaults)
  #[arg(long, value_name = "NAME")]
  pub exempt_name: Vec<String>,

  /// Suffix, such as ".png", whose files are never checked (repeatable;
  /// replaces the defaults)
  #[arg(long, value_name = "SUFFIX")]
  pub exempt_suffix: Vec<String>,

  /// Suffix whose files never get a notice inserted (repeatable; replaces the
  /// defaults)
  #[arg(long, value_name = "SUFFIX")]
  pub exempt_missing_suffix: Vec<String>,

  /// Gitignore-style pattern for files that are never checked (repeatable)
  #[arg(long = "exempt", short = 'x', value_name = "PATTERN")]
  pub exempt: Vec<Pattern>,

  /// File of exemption patterns [default: .noticeignore in the work-tree
  /// root]
  #[arg(long, value_name = "FILE")]
  pub ignore_file: Option<PathBuf>,

  /// Path to config file (default: .noticecheck.toml in the work-tree root)
  #[arg(long, value_name = "FILE")]
  pub config: Option<PathBuf>,

  /// Ignore config file even if present
  #[arg(long)]
  pub no_config: bool,

  /// Write every final result and the counts as JSON to this path
  #[arg(long, value_name = "OUTPUT")]
  pub report_json: Option<PathBuf>,

  /// Print one record per file (-v), and raise the log level (-vv debug,
  /// -vvv trace)
  #[arg(short, long, action = clap::ArgAction::Count)]
  pub verbose: u8,

  /// Suppress all output except errors
  #[arg(short, long, conflicts_with = "verbose")]
  pub quiet: bool,

  /// Control when to use colored output (auto, never, always)
  #[arg(
    long,
    value_name = "WHEN",
    num_args = 0..=1,
    default_value_t = ColorMode::Auto,
    default_missing_value = "always",
    value_enum
  )]
  pub colors: ColorMode,

  /// Skip git repository ownership check. Useful when running in Docker or
  /// other containerized environments where the repository may be owned by a
  /// different user.
  #[arg(long)]
  pub skip_git_owner_check: bool,
}

impl CheckArgs {
  /// Validate the arguments and return an error if invalid
  fn validate(&self) -> Result<(), String> {
    let suffixes = self.exempt_suffix.iter().chain(&self.exempt_missing_suffix);
    for suffix in suffixes {
      if !suffix.starts_with('.') || suffix.len() < 2 {
        return Err(format!("Suffix {:?} should start with a dot, e.g. \".png\"", suffix));
      }
    }
    for name in &self.exempt_name {
      if name.is_empty() || name.contains('/') {
        return Err(format!("Exempt name {:?} should be a bare file name", name));
      }
    }
    Ok(())
  }
}

/// Run the check command with the given arguments, returning the exit code.
pub fn run_check(args: CheckArgs) -> Result<i32> {
  if let Err(e) = args.validate() {
    eprintln!("ERROR: {e}");
    return Ok(2);
  }

  // Initialize tracing subscriber for structured logging
  init_tracing(args.quiet, args.verbose);

  // Set verbose mode for output formatting and info_log! macro
  if args.verbose > 0 {
    set_verbose();
  } else if args.quiet {
    set_quiet();
  }
  args.colors.apply();

  // Disable git ownership check if requested (useful in Docker)
  if args.skip_git_owner_check {
    debug!("Disabling git repository ownership check");
    // SAFETY: This is safe to call as long as no git operations are in progress.
    // We call this early, before any Repository operations.
    unsafe {
      let _ = git2::opts::set_verify_owner_validation(false);
    }
  }

  let workspace = resolve_workspace()?;
  debug!("Using workspace root: {}", workspace.root().display());

  let config = load_config(args.config.as_deref(), workspace.root(), args.no_config)?.unwrap_or_default();

  let template_path = template_path(&args, &config, &workspace);
  let template = NoticeTemplate::load(&template_path, Local::now().naive_local())
    .with_context(|| format!("Failed to load notice template from {}", template_path.display()))?;
  let editor = NoticeEditor::new(template, config.conventions());

  let checker_config = checker_config(&args, &config, &workspace)?;
  debug!("Checker settings: {:?}", checker_config);

  let mut checker = NoticeChecker::new(
    checker_config,
    GitCli::new(workspace.work_dir()),
    editor,
    Overwrite::stdio(),
  );
  let outcome = checker.run()?;

  if let Some(ref output_path) = args.report_json {
    JsonReport::new(&outcome.results, &outcome.summary).write(output_path)?;
    info_log!("Generated JSON report at {}", output_path.display());
  }

  debug!(
    "Finished with {} errors across {} files",
    outcome.summary.error_count,
    outcome.results.len()
  );
  Ok(outcome.exit_code())
}

/// The template named on the command line, else in the config, else
/// `copyright.txt` in the work-tree root.
fn template_path(args: &CheckArgs, config: &Config, workspace: &Workspace) -> PathBuf {
  args
    .notice_template
    .clone()
    .or_else(|| config.template_path(workspace.root()))
    .unwrap_or_else(|| workspace.root().join(DEFAULT_TEMPLATE_FILENAME))
}

/// Builds the run settings. Command-line lists replace config lists, which
/// replace the built-in defaults. Exemption patterns from every source are
/// combined.
fn checker_config(args: &CheckArgs, config: &Config, workspace: &Workspace) -> Result<CheckerConfig> {
  let defaults = CheckerConfig::default();
  let pick = |cli: &[String], configured: &Option<Vec<String>>, default: Vec<String>| {
    if !cli.is_empty() {
      cli.to_vec()
    } else {
      configured.clone().unwrap_or(default)
    }
  };

  let mut patterns = PathMatcher::new(config.patterns()?);
  patterns.extend(PathMatcher::new(args.exempt.clone()));
  patterns.extend(ignore_file_patterns(args.ignore_file.as_deref(), workspace.root())?);

  Ok(CheckerConfig {
    pathspecs: args.pathspecs.clone(),
    exempt_names: pick(&args.exempt_name, &config.exempt_names, defaults.exempt_names),
    exempt_suffixes: pick(&args.exempt_suffix, &config.exempt_suffixes, defaults.exempt_suffixes),
    exempt_missing_suffixes: pick(
      &args.exempt_missing_suffix,
      &config.exempt_missing_suffixes,
      defaults.exempt_missing_suffixes,
    ),
    exempt_patterns: patterns,
    edit_mode: args.edit,
    stop_after: args.stop_after,
    summarise_first: args.summarise_first,
  })
}

/// Patterns from an explicit ignore file, which must exist, or from the
/// default one at the root, which may be absent.
fn ignore_file_patterns(explicit: Option<&Path>, root: &Path) -> Result<PathMatcher> {
  match explicit {
    Some(path) => {
      if !path.exists() {
        anyhow::bail!("Ignore file not found: {}", path.display());
      }
      PathMatcher::from_ignore_file(path)
    }
    None => PathMatcher::from_ignore_file(&root.join(DEFAULT_IGNORE_FILENAME)),
  }
}
