//! # Logging
//!
//! Two channels sit beside the scan report. `verbose_log!` narrates a `-v`
//! run on stderr: which config was picked up, which files were overwritten.
//! `info_log!` prints one-off notices such as the JSON report location on
//! stdout, and is silenced by `--quiet` together with the rest of the report.
//!
//! Finer diagnostics (pattern match transcripts, git commands) go through
//! `tracing`; see [`init_tracing`].
//!
//! ```rust
//! use noticecheck::logging::{ColorMode, set_verbose};
//! use noticecheck::{info_log, verbose_log};
//!
//! set_verbose();
//! ColorMode::Never.apply();
//!
//! verbose_log!("Overwrote {}", "forAndroid/build.gradle");
//! info_log!("Generated JSON report at {}", "notices.json");
//! ```

mod modes;

pub use modes::{ColorMode, init_tracing, is_quiet, is_verbose, set_normal, set_quiet, set_verbose};
use owo_colors::{OwoColorize, Stream};

/// `eprintln!` that only prints in a verbose run.
#[macro_export]
macro_rules! verbose_log {
    ($($arg:tt)*) => {
        if $crate::logging::is_verbose() {
            eprintln!($($arg)*);
        }
    };
}

/// `println!` in yellow, dropped in a quiet run.
#[macro_export]
macro_rules! info_log {
    ($($arg:tt)*) => {
        if !$crate::logging::is_quiet() {
            $crate::logging::print_info_log(&format!($($arg)*));
        }
    };
}

#[doc(hidden)]
pub fn print_info_log(message: &str) {
  println!("{}", message.if_supports_color(Stream::Stdout, |m| m.yellow()));
}
