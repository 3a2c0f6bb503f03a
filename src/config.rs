//! # Configuration Module
//!
//! This module provides configuration support for noticecheck, allowing users
//! to register comment leaders for more file formats, change the exemption
//! lists and choose the notice template.
//!
//! Configuration can be specified in a `.noticecheck.toml` file at the root of
//! the work tree or via the `NOTICECHECK_CONFIG` environment variable.
//!
//! ```toml
//! template = "legal/copyright.txt"
//! exempt-suffixes = [".png", ".json", ".jar", ".svg"]
//! exempt-patterns = ["vendor/**", "**/generated/*.java"]
//!
//! [comment-leaders]
//! "--" = [".sql"]
//! "#" = ["Makefile", ".cmake"]
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::editor::CommentConventions;
use crate::path_matcher::Pattern;
use crate::verbose_log;

/// The default config file name.
pub const DEFAULT_CONFIG_FILENAME: &str = ".noticecheck.toml";

/// Environment variable for specifying config file path.
pub const CONFIG_ENV_VAR: &str = "NOTICECHECK_CONFIG";

/// The default ignore file name, holding extra exemption patterns.
pub const DEFAULT_IGNORE_FILENAME: &str = ".noticeignore";

/// The default notice template, relative to the work-tree root.
pub const DEFAULT_TEMPLATE_FILENAME: &str = "copyright.txt";

/// Main configuration struct for noticecheck.
///
/// Every key is optional. Lists that are present replace the built-in lists;
/// comment leaders are merged into the built-in table.
#[derive(Debug, Default, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
  /// Comment leader, then the suffixes (`.sql`) or file names (`Makefile`)
  /// that use it.
  #[serde(default)]
  pub comment_leaders: BTreeMap<String, Vec<String>>,

  /// Suffixes whose notices are XML comment blocks.
  pub markup_suffixes: Option<Vec<String>>,

  /// File names that are never checked.
  pub exempt_names: Option<Vec<String>>,

  /// Suffixes that are never checked.
  pub exempt_suffixes: Option<Vec<String>>,

  /// Suffixes whose files never get a notice inserted.
  pub exempt_missing_suffixes: Option<Vec<String>>,

  /// Gitignore-style patterns for files that are never checked.
  #[serde(default)]
  pub exempt_patterns: Vec<String>,

  /// Notice template path, relative to the config file's work tree.
  pub template: Option<PathBuf>,
}

/// Error type for configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  /// The config file could not be read.
  #[error("Failed to read config file '{path}': {source}")]
  ReadError { path: PathBuf, source: std::io::Error },

  /// The config file contains invalid TOML.
  #[error("Failed to parse config file '{path}': {source}")]
  ParseError { path: PathBuf, source: toml::de::Error },

  /// A value is well-formed TOML but not usable.
  #[error("Invalid value for '{key}': {message}")]
  Invalid { key: String, message: String },
}

impl Config {
  /// Load configuration from a file.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    verbose_log!("Loading config from: {}", path.display());

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
      path: path.to_path_buf(),
      source: e,
    })?;

    let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
      path: path.to_path_buf(),
      source: e,
    })?;

    config.validate()?;

    verbose_log!("Loaded {} comment leader overrides", config.comment_leaders.len());

    Ok(config)
  }

  /// Validate the configuration.
  ///
  /// Checks that:
  /// - Leaders are non-empty
  /// - Suffixes start with a dot
  /// - Exempt names are bare file names
  /// - Exemption patterns parse
  fn validate(&self) -> Result<(), ConfigError> {
    let invalid = |key: &str, message: String| ConfigError::Invalid {
      key: key.to_string(),
      message,
    };

    for (leader, keys) in &self.comment_leaders {
      if leader.trim().is_empty() {
        return Err(invalid("comment-leaders", "leader cannot be empty".to_string()));
      }
      if keys.iter().any(|key| key.is_empty()) {
        return Err(invalid(
          "comment-leaders",
          format!("empty suffix or name for leader {:?}", leader),
        ));
      }
    }

    let suffix_lists = [
      ("markup-suffixes", &self.markup_suffixes),
      ("exempt-suffixes", &self.exempt_suffixes),
      ("exempt-missing-suffixes", &self.exempt_missing_suffixes),
    ];
    for (key, suffixes) in suffix_lists {
      for suffix in suffixes.iter().flatten() {
        if !suffix.starts_with('.') || suffix.len() < 2 {
          return Err(invalid(key, format!("suffix {:?} should start with a dot", suffix)));
        }
      }
    }

    for name in self.exempt_names.iter().flatten() {
      if name.is_empty() || name.contains('/') {
        return Err(invalid("exempt-names", format!("{:?} is not a file name", name)));
      }
    }

    for pattern in &self.exempt_patterns {
      pattern
        .parse::<Pattern>()
        .map_err(|e| invalid("exempt-patterns", e.to_string()))?;
    }

    Ok(())
  }

  /// The built-in comment conventions with this config's overrides applied.
  pub fn conventions(&self) -> CommentConventions {
    let mut conventions = CommentConventions::default();
    if let Some(suffixes) = &self.markup_suffixes {
      conventions.set_markup_suffixes(suffixes.clone());
    }
    for (leader, keys) in &self.comment_leaders {
      for key in keys {
        conventions.set_leader(key, leader);
      }
    }
    conventions
  }

  /// Parsed exemption patterns.
  pub fn patterns(&self) -> Result<Vec<Pattern>> {
    self
      .exempt_patterns
      .iter()
      .map(|pattern| {
        pattern
          .parse()
          .with_context(|| format!("Invalid exemption pattern {:?}", pattern))
      })
      .collect()
  }

  /// Template path resolved against `root`.
  pub fn template_path(&self, root: &Path) -> Option<PathBuf> {
    self.template.as_ref().map(|template| root.join(template))
  }
}

/// Discover the configuration file path.
///
/// The configuration file is discovered in the following order:
/// 1. Path specified via `--config` flag (passed as `explicit_path`)
/// 2. Path specified via `NOTICECHECK_CONFIG` environment variable
/// 3. `.noticecheck.toml` in the work-tree root
pub fn discover_config_path(explicit_path: Option<&Path>, workspace_root: &Path) -> Option<PathBuf> {
  // 1. Explicit path from CLI takes highest priority
  if let Some(path) = explicit_path {
    if path.exists() {
      verbose_log!("Using explicit config path: {}", path.display());
      return Some(path.to_path_buf());
    }
    verbose_log!("Explicit config path does not exist: {}", path.display());
    return None;
  }

  // 2. Check environment variable
  if let Ok(env_path) = std::env::var(CONFIG_ENV_VAR) {
    let path = PathBuf::from(&env_path);
    if path.exists() {
      verbose_log!("Using config from {}: {}", CONFIG_ENV_VAR, path.display());
      return Some(path);
    }
    verbose_log!("{} path does not exist: {}", CONFIG_ENV_VAR, env_path);
  }

  // 3. Check workspace root
  let workspace_config = workspace_root.join(DEFAULT_CONFIG_FILENAME);
  if workspace_config.exists() {
    verbose_log!("Using workspace config: {}", workspace_config.display());
    return Some(workspace_config);
  }

  verbose_log!("No config file found");
  None
}

/// Load configuration from the discovered path.
///
/// Returns `None` when discovery is disabled or no file is found. An explicit
/// path that does not exist is an error.
pub fn load_config(explicit_path: Option<&Path>, workspace_root: &Path, no_config: bool) -> Result<Option<Config>> {
  if no_config {
    verbose_log!("Config file discovery disabled (--no-config)");
    return Ok(None);
  }

  if let Some(path) = explicit_path
    && !path.exists()
  {
    anyhow::bail!("Config file not found: {}", path.display());
  }

  match discover_config_path(explicit_path, workspace_root) {
    Some(path) => {
      let config = Config::load(&path).with_context(|| format!("Failed to load config from {}", path.display()))?;
      Ok(Some(config))
    }
    None => Ok(None),
  }
}

#[cfg(test)]
mod tests {
  use tempfile::TempDir;

  use super::*;
  use crate::editor::NoticeFormat;
  use crate::scan::TrackedPath;

  #[test]
  fn test_parse_valid_config() {
    let config_content = concat!(
      "template = \"legal/notice.txt\"\n",
      "exempt-suffixes = [\".svg\"]\n",
      "exempt-patterns = [\"vendor/**\"]\n",
      "\n",
      "[comment-leaders]\n",
      "\"--\" = [\".sql\"]\n",
      "\"#\" = [\"Makefile\"]\n",
    );

    let config: Config = toml::from_str(config_content).expect("valid config should parse");
    config.validate().expect("valid config");

    assert_eq!(config.comment_leaders.len(), 2);
    assert_eq!(config.exempt_suffixes, Some(vec![".svg".to_string()]));
    assert_eq!(config.exempt_names, None);
    assert_eq!(
      config.template_path(Path::new("/repo")),
      Some(PathBuf::from("/repo/legal/notice.txt"))
    );
    assert_eq!(config.patterns().expect("patterns").len(), 1);
  }

  #[test]
  fn test_parse_empty_config() {
    let config: Config = toml::from_str("").expect("empty config should parse");
    assert_eq!(config, Config::default());
    assert_eq!(config.conventions(), CommentConventions::default());
  }

  #[test]
  fn test_unknown_key_is_rejected() {
    assert!(toml::from_str::<Config>("exempt-suffix = [\".png\"]\n").is_err());
  }

  #[test]
  fn test_validate_empty_leader() {
    let config = Config {
      comment_leaders: BTreeMap::from([(" ".to_string(), vec![".sql".to_string()])]),
      ..Config::default()
    };
    assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
  }

  #[test]
  fn test_validate_suffix_without_dot() {
    let config = Config {
      exempt_missing_suffixes: Some(vec!["md".to_string()]),
      ..Config::default()
    };
    let err = config.validate().expect_err("should fail");
    assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "exempt-missing-suffixes"));
  }

  #[test]
  fn test_validate_bad_pattern() {
    let config = Config {
      exempt_patterns: vec!["src/[oops".to_string()],
      ..Config::default()
    };
    assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
  }

  #[test]
  fn test_conventions_apply_overrides() {
    let config = Config {
      comment_leaders: BTreeMap::from([("--".to_string(), vec![".sql".to_string(), ".py".to_string()])]),
      markup_suffixes: Some(vec![".svg".to_string()]),
      ..Config::default()
    };
    let conventions = config.conventions();
    let format = |path: &str| conventions.format_for(&TrackedPath::new(Path::new("."), path));

    assert_eq!(format("q.sql"), Some(NoticeFormat::Line { leader: "--".to_string() }));
    assert_eq!(format("a.py"), Some(NoticeFormat::Line { leader: "--".to_string() }));
    assert_eq!(format("icon.svg"), Some(NoticeFormat::Markup));
    assert_eq!(format("layout.xml"), None);
  }

  #[test]
  fn test_load_config_file_not_found() {
    let result = Config::load(Path::new("/nonexistent/path/.noticecheck.toml"));
    assert!(matches!(result, Err(ConfigError::ReadError { .. })));
  }

  #[test]
  fn test_load_config_parse_error() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let config_path = temp_dir.path().join(DEFAULT_CONFIG_FILENAME);
    std::fs::write(&config_path, "exempt-names = \"gradlew\"\n").expect("write config");

    assert!(matches!(Config::load(&config_path), Err(ConfigError::ParseError { .. })));
  }

  #[test]
  fn test_discover_config_explicit_path() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let config_path = temp_dir.path().join("custom-config.toml");
    std::fs::write(&config_path, "").expect("write config");

    let result = discover_config_path(Some(&config_path), temp_dir.path());
    assert_eq!(result, Some(config_path));
  }

  #[test]
  fn test_discover_config_workspace_root() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let config_path = temp_dir.path().join(DEFAULT_CONFIG_FILENAME);
    std::fs::write(&config_path, "").expect("write config");

    assert_eq!(discover_config_path(None, temp_dir.path()), Some(config_path));
  }

  #[test]
  fn test_load_config_disabled_or_missing() {
    let temp_dir = TempDir::new().expect("create temp dir");
    std::fs::write(temp_dir.path().join(DEFAULT_CONFIG_FILENAME), "").expect("write config");

    assert!(load_config(None, temp_dir.path(), true).expect("disabled").is_none());
    assert!(load_config(Some(&temp_dir.path().join("absent.toml")), temp_dir.path(), false).is_err());
  }
}
