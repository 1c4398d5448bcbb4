//! Project configuration, read from `.tagref/config.yaml`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TagrefError};
use crate::indexer::scanner::BracketConfig;
use crate::linter::LinterConfig;

/// Directory holding per-project state.
pub const PROJECT_DIR: &str = ".tagref";
pub const CONFIG_FILENAME: &str = "config.yaml";
pub const INDEX_FILENAME: &str = "index";

pub fn default_config_path() -> PathBuf {
    Path::new(PROJECT_DIR).join(CONFIG_FILENAME)
}

pub fn default_index_path() -> PathBuf {
    Path::new(PROJECT_DIR).join(INDEX_FILENAME)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ScannerConfig {
    pub bracket: BracketConfig,

    /// Gitignore-style globs of paths never scanned.
    pub ignore: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Never read a persisted index; always scan.
    pub ignore_index: bool,

    pub scanner: ScannerConfig,

    pub linter: LinterConfig,
}

impl Config {
    pub fn parse(content: &str) -> Result<Self> {
        // An empty document deserializes to unit, not to a mapping.
        let blank = content
            .lines()
            .map(str::trim)
            .all(|l| l.is_empty() || l.starts_with('#'));
        if blank {
            return Ok(Self::default());
        }

        let mut config: Config = serde_yaml::from_str(content)
            .map_err(|e| TagrefError::Config(format!("invalid config file: {}", e)))?;

        config.scanner.bracket = config.scanner.bracket.or_default();
        config.linter.validate()?;

        Ok(config)
    }

    /// Loads the config at `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => {
                tracing::debug!(path = %path.display(), "loading config");
                Self::parse(&content)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(TagrefError::Config(format!("read {}: {}", path.display(), e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(!config.ignore_index);
        assert_eq!(config.scanner.bracket.left, "[#");
        assert_eq!(config.scanner.bracket.right, "#]");
        assert!(config.scanner.ignore.is_empty());
        assert!(config.linter.rules.is_empty());
    }

    #[test]
    fn test_empty_document() {
        assert_eq!(Config::parse("").unwrap(), Config::default());
        assert_eq!(Config::parse("# nothing\n").unwrap(), Config::default());
    }

    #[test]
    fn test_full_document() {
        let yaml = r#"
ignore-index: true
scanner:
  bracket:
    left: "<<"
    right: ">>"
  ignore:
    - vendor/
    - "*.min.js"
linter:
  rules:
    - name: only-in-src
      path-glob: "src/**"
      shell: [sh, -c, 'test -n "$TAGREF_NAME"']
"#;

        let config = Config::parse(yaml).unwrap();
        assert!(config.ignore_index);
        assert_eq!(config.scanner.bracket.left, "<<");
        assert_eq!(config.scanner.ignore, vec!["vendor/", "*.min.js"]);
        assert_eq!(config.linter.rules.len(), 1);
        assert_eq!(config.linter.rules[0].name, "only-in-src");
        assert_eq!(config.linter.rules[0].path_glob.as_deref(), Some("src/**"));
    }

    #[test]
    fn test_missing_bracket_uses_default() {
        let config = Config::parse("scanner:\n  ignore: [x]\n").unwrap();
        assert_eq!(config.scanner.bracket, BracketConfig::default());
        assert_eq!(config.scanner.ignore, vec!["x"]);
    }

    #[test]
    fn test_malformed_document() {
        assert!(matches!(
            Config::parse("ignore-index: [1, 2"),
            Err(TagrefError::Config(_))
        ));
        assert!(matches!(
            Config::parse("scanner: 7\n"),
            Err(TagrefError::Config(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(&dir.path().join("config.yaml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "ignore-index: true\n").unwrap();

        assert!(Config::load(&path).unwrap().ignore_index);
    }

    #[test]
    fn test_default_paths() {
        assert_eq!(default_config_path(), Path::new(".tagref/config.yaml"));
        assert_eq!(default_index_path(), Path::new(".tagref/index"));
    }
}
