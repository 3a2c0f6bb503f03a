//! # Overwrite Module
//!
//! Decides whether a staged edit replaces its original: always, never, or by
//! asking on the terminal. An answer ending in `*` sticks for the rest of the
//! run.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use tracing::debug;

use crate::diff::{colorize_diff, render_unified_diff};
use crate::editor::EditProposal;

pub const PROMPT: &str = "    Overwrite? (Y/y*/n/n*/?)";

const HELP: &[&str] = &[
  "y to overwrite, the default.",
  "n to keep and not overwrite.",
  "Append * to make that response to all future prompts.",
];

/// How proposed edits are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum EditMode {
  /// Replace every file without asking
  #[value(alias = "y")]
  Yes,
  /// Never replace a file
  #[value(alias = "n")]
  No,
  /// Show the diff and ask per file
  #[default]
  Prompt,
}

/// Decision state that persists across files within one run.
#[derive(Debug, Clone, Default)]
pub struct OverwriteSession {
  sticky: Option<bool>,
}

impl OverwriteSession {
  pub const fn new(mode: EditMode) -> Self {
    let sticky = match mode {
      EditMode::Yes => Some(true),
      EditMode::No => Some(false),
      EditMode::Prompt => None,
    };
    Self { sticky }
  }

  /// The decision applied without asking, if one is set.
  pub const fn sticky(&self) -> Option<bool> {
    self.sticky
  }
}

/// Applies the user's decision to edit proposals.
pub struct Overwrite<'io> {
  input: Box<dyn BufRead + 'io>,
  output: Box<dyn Write + 'io>,
}

impl Overwrite<'static> {
  /// Prompts on stdout and reads answers from stdin.
  pub fn stdio() -> Self {
    Self::new(io::stdin().lock(), io::stdout())
  }
}

impl<'io> Overwrite<'io> {
  pub fn new(input: impl BufRead + 'io, output: impl Write + 'io) -> Self {
    Self {
      input: Box::new(input),
      output: Box::new(output),
    }
  }

  /// Decides whether `proposal` replaces its original, and commits it if so.
  ///
  /// With a sticky decision nothing is printed. Otherwise the diff is shown and
  /// the user is prompted until they give a recognised answer. Running out of
  /// input while prompting is an error.
  pub fn decide(&mut self, session: &mut OverwriteSession, proposal: EditProposal) -> Result<bool> {
    let replace = match session.sticky {
      Some(replace) => replace,
      None => self.ask(session, &proposal)?,
    };

    if replace {
      debug!("Overwriting {}", proposal.tracked());
      proposal.commit()?;
    } else {
      debug!("Keeping {}", proposal.tracked());
    }
    Ok(replace)
  }

  fn ask(&mut self, session: &mut OverwriteSession, proposal: &EditProposal) -> Result<bool> {
    let diff = self.render_diff(proposal)?;
    writeln!(self.output)?;
    self.write_diff(&diff)?;

    loop {
      write!(self.output, "{}", PROMPT)?;
      self.output.flush()?;

      let mut line = String::new();
      let read = self
        .input
        .read_line(&mut line)
        .with_context(|| "Failed to read overwrite response")?;
      if read == 0 {
        bail!("Input ended while asking whether to overwrite {}", proposal.tracked());
      }

      let response = line.trim().to_lowercase();
      let sticky = response.ends_with('*');

      if response.is_empty() || response.starts_with('y') {
        writeln!(self.output, "Overwriting.")?;
        if sticky {
          session.sticky = Some(true);
        }
        return Ok(true);
      }
      if response.starts_with('n') {
        writeln!(self.output, "Keeping")?;
        if sticky {
          session.sticky = Some(false);
        }
        return Ok(false);
      }
      if response == "?" {
        self.write_diff(&diff)?;
        writeln!(self.output)?;
        for help in HELP {
          writeln!(self.output, "{}", help)?;
        }
        writeln!(self.output)?;
        continue;
      }

      writeln!(self.output, "Unrecognised \"{}\". Ctrl-C to quit or ? for help.", response)?;
    }
  }

  fn render_diff(&self, proposal: &EditProposal) -> Result<String> {
    let original = std::fs::read_to_string(proposal.original())
      .with_context(|| format!("Failed to read {}", proposal.original().display()))?;
    let edited = proposal.edited_text()?;
    Ok(render_unified_diff(
      &proposal.tracked().to_string(),
      &original,
      &edited,
    ))
  }

  fn write_diff(&mut self, diff: &str) -> Result<()> {
    write!(self.output, "{}", colorize_diff(diff))?;
    if !diff.is_empty() && !diff.ends_with('\n') {
      writeln!(self.output)?;
    }
    Ok(())
  }
}
