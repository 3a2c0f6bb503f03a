//! # Checker Module
//!
//! Drives a run: lists tracked files, classifies each one, offers corrections
//! through the overwrite controller and rescans whatever was changed.
//!
//! ## Example
//!
//! ```rust,no_run
//! use chrono::Local;
//! use noticecheck::checker::{CheckerConfig, NoticeChecker};
//! use noticecheck::editor::{CommentConventions, NoticeEditor, NoticeTemplate};
//! use noticecheck::git::GitCli;
//! use noticecheck::overwrite::Overwrite;
//!
//! # fn main() -> anyhow::Result<()> {
//! let template = NoticeTemplate::load("copyright.txt".as_ref(), Local::now().naive_local())?;
//! let editor = NoticeEditor::new(template, CommentConventions::default());
//!
//! let mut checker = NoticeChecker::new(CheckerConfig::default(), GitCli::new("."), editor, Overwrite::stdio());
//! let outcome = checker.run()?;
//! std::process::exit(outcome.exit_code());
//! # }
//! ```

use anyhow::Result;
use chrono::Datelike;
use tracing::{debug, warn};

use crate::editor::{EditProposal, NoticeEditor};
use crate::git::VersionControl;
use crate::notice::{NoticeDetector, RegexNoticeDetector, read_text};
use crate::output;
use crate::overwrite::{EditMode, Overwrite, OverwriteSession};
use crate::path_matcher::PathMatcher;
use crate::report::Summary;
use crate::scan::{Classification, ScanError, ScanResult, TrackedPath};
use crate::verbose_log;

/// Upper bound on corrections applied to one file before giving up on it.
pub const MAX_CORRECTION_ROUNDS: usize = 4;

/// Settings for one run. Built once, never changed during the run.
#[derive(Debug, Clone)]
pub struct CheckerConfig {
  /// Passed to `git ls-files` to restrict the listing.
  pub pathspecs: Vec<String>,
  /// File names that are never checked.
  pub exempt_names: Vec<String>,
  /// Suffixes, with their dot, that are never checked.
  pub exempt_suffixes: Vec<String>,
  /// Suffixes whose files are checked but never get a notice inserted.
  pub exempt_missing_suffixes: Vec<String>,
  pub exempt_patterns: PathMatcher,
  pub edit_mode: EditMode,
  /// Stop after this many files; 0 means no limit.
  pub stop_after: usize,
  /// Scan everything and print the summary before making any correction.
  pub summarise_first: bool,
}

impl Default for CheckerConfig {
  fn default() -> Self {
    Self {
      pathspecs: Vec::new(),
      exempt_names: strings(&["gradlew", "gradlew.bat", "CODE-OF-CONDUCT.md"]),
      exempt_suffixes: strings(&[".png", ".json", ".jar"]),
      exempt_missing_suffixes: strings(&[".md"]),
      exempt_patterns: PathMatcher::default(),
      edit_mode: EditMode::Prompt,
      stop_after: 0,
      summarise_first: false,
    }
  }
}

fn strings(values: &[&str]) -> Vec<String> {
  values.iter().map(|value| value.to_string()).collect()
}

/// Final results of a run and their summary.
#[derive(Debug)]
pub struct CheckOutcome {
  pub results: Vec<ScanResult>,
  pub summary: Summary,
}

impl CheckOutcome {
  pub const fn exit_code(&self) -> i32 {
    self.summary.exit_code()
  }
}

/// What happened to a proposed correction.
enum Step {
  /// The file changed on disk and must be rescanned.
  Applied,
  /// Nothing to correct, or the user kept the file.
  Kept,
  /// The correction could not be prepared.
  Failed(ScanError),
}

/// Checks and corrects copyright notices across a repository.
pub struct NoticeChecker<'io, V: VersionControl> {
  config: CheckerConfig,
  vcs: V,
  detector: Box<dyn NoticeDetector>,
  editor: NoticeEditor,
  overwrite: Overwrite<'io>,
  session: OverwriteSession,
}

impl<'io, V: VersionControl> NoticeChecker<'io, V> {
  pub fn new(config: CheckerConfig, vcs: V, editor: NoticeEditor, overwrite: Overwrite<'io>) -> Self {
    let session = OverwriteSession::new(config.edit_mode);
    Self {
      config,
      vcs,
      detector: Box::new(RegexNoticeDetector),
      editor,
      overwrite,
      session,
    }
  }

  /// Replaces the notice detector.
  pub fn with_detector(mut self, detector: Box<dyn NoticeDetector>) -> Self {
    self.detector = detector;
    self
  }

  pub const fn config(&self) -> &CheckerConfig {
    &self.config
  }

  pub const fn vcs(&self) -> &V {
    &self.vcs
  }

  /// Runs the whole check: scan, error block, summary and, in summarise-first
  /// mode with no errors, the deferred corrections followed by a second
  /// summary.
  pub fn run(&mut self) -> Result<CheckOutcome> {
    let results = self.scan()?;
    let errors = output::print_errors(&results);
    let summary = Summary::from_results(&results, &self.config.exempt_names);
    output::print_summary(&summary);

    if !self.config.summarise_first || errors > 0 {
      return Ok(CheckOutcome { results, summary });
    }

    verbose_log!("Applying corrections to {} scanned files", results.len());
    let results = self.correct_all(results)?;
    output::print_errors(&results);
    let summary = Summary::from_results(&results, &self.config.exempt_names);
    output::print_summary(&summary);
    Ok(CheckOutcome { results, summary })
  }

  /// Lists tracked files and checks each in listing order, printing progress.
  ///
  /// Honors the stop-after limit between files.
  pub fn scan(&mut self) -> Result<Vec<ScanResult>> {
    output::print_scan_start();

    let mut results = Vec::new();
    for tracked in self.vcs.list_tracked(&self.config.pathspecs)? {
      let result = self.check_file(tracked?)?;
      output::print_scan_progress(&result);
      results.push(result);

      if self.config.stop_after > 0 && results.len() >= self.config.stop_after {
        debug!("Stopping after {} files", results.len());
        break;
      }
    }

    output::print_path_count(results.len());
    Ok(results)
  }

  /// Classifies one file and, unless summarising first, corrects it until it
  /// settles.
  pub fn check_file(&mut self, tracked: TrackedPath) -> Result<ScanResult> {
    if self.is_exempt(&tracked) {
      return Ok(ScanResult::exempt(tracked));
    }

    let result = self.scan_file(tracked);
    if self.config.summarise_first {
      return Ok(result);
    }
    self.settle(result)
  }

  /// Runs the deferred corrections over results collected without them.
  ///
  /// Wrong years are handled for every file before any notice is inserted.
  /// Order is preserved.
  pub fn correct_all(&mut self, results: Vec<ScanResult>) -> Result<Vec<ScanResult>> {
    let results = self.correct_where(results, Classification::IncorrectDate)?;
    self.correct_where(results, Classification::Missing)
  }

  fn correct_where(&mut self, results: Vec<ScanResult>, classification: Classification) -> Result<Vec<ScanResult>> {
    results
      .into_iter()
      .map(|result| {
        if result.classification == classification {
          self.settle(result)
        } else {
          Ok(result)
        }
      })
      .collect()
  }

  fn is_exempt(&self, tracked: &TrackedPath) -> bool {
    let name = tracked.name();
    if self.config.exempt_names.contains(&name) {
      debug!("{} exempt by name", tracked);
      return true;
    }

    let suffix = tracked.suffix();
    if !suffix.is_empty() && self.config.exempt_suffixes.contains(&suffix) {
      debug!("{} exempt by suffix {}", tracked, suffix);
      return true;
    }

    if let Some(pattern) = self.config.exempt_patterns.first_match(tracked.repo_path()) {
      debug!("{} exempt by pattern {}", tracked, pattern);
      return true;
    }

    false
  }

  /// Looks up the last commit date, then reads and searches the content.
  fn scan_file(&self, tracked: TrackedPath) -> ScanResult {
    let last_modified = match self.vcs.last_modified_date(tracked.path()) {
      Ok(date) => date,
      Err(e) => return ScanResult::failed(tracked, None, e.into()),
    };

    match read_text(tracked.file()) {
      Ok(content) => {
        let notice = self.detector.detect(&content);
        ScanResult::scanned(tracked, last_modified, notice)
      }
      Err(e) => ScanResult::failed(tracked, Some(last_modified), e),
    }
  }

  /// Applies corrections and rescans until nothing more is accepted.
  fn settle(&mut self, mut result: ScanResult) -> Result<ScanResult> {
    for _ in 0..MAX_CORRECTION_ROUNDS {
      if result.error.is_some() {
        return Ok(result);
      }
      let inserting = result.classification == Classification::Missing;
      match self.correct_once(&result)? {
        Step::Applied => {
          result = self.scan_file(result.path.clone());
          // Inserting again would stack a second copy on top of the first.
          if inserting && result.classification == Classification::Missing {
            warn!("{} has no detectable notice after insertion", result.path);
            return Ok(result.with_error(ScanError::NoticeNotDetected));
          }
        }
        Step::Kept => return Ok(result),
        Step::Failed(e) => return Ok(result.with_error(e)),
      }
    }

    if self.needs_correction(&result) {
      warn!(
        "{} is still {} after {} corrections; leaving it",
        result.path, result.classification, MAX_CORRECTION_ROUNDS
      );
    }
    Ok(result)
  }

  fn needs_correction(&self, result: &ScanResult) -> bool {
    match result.classification {
      Classification::IncorrectDate => true,
      Classification::Missing => !self.config.exempt_missing_suffixes.contains(&result.path.suffix()),
      _ => false,
    }
  }

  fn correct_once(&mut self, result: &ScanResult) -> Result<Step> {
    if !self.needs_correction(result) {
      return Ok(Step::Kept);
    }

    let proposal = match result.classification {
      Classification::IncorrectDate => {
        let Some(date) = result.last_modified else {
          return Ok(Step::Kept);
        };
        self.editor.rewrite_year(result, date.year())
      }
      _ => self.editor.insert_notice(&result.path),
    };

    let proposal: EditProposal = match proposal {
      Ok(proposal) => proposal,
      Err(e) => {
        return match e.downcast::<ScanError>() {
          Ok(scan_error) => {
            debug!("Cannot correct {}: {}", result.path, scan_error);
            Ok(Step::Failed(scan_error))
          }
          Err(e) => Err(e),
        };
      }
    };

    if self.overwrite.decide(&mut self.session, proposal)? {
      verbose_log!("Overwrote {}", result.path);
      Ok(Step::Applied)
    } else {
      Ok(Step::Kept)
    }
  }
}
