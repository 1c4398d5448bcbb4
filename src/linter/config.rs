use serde::{Deserialize, Serialize};

use crate::error::{Result, TagrefError};

/// One lint rule. The path filter selects which entries the rule applies to;
/// `shell` is run for each selected entry and must exit with status 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Rule {
    pub name: String,

    /// Gitignore-style glob over the entry's path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_glob: Option<String>,

    /// Regular expression over the entry's path.
    #[serde(rename = "path-re", skip_serializing_if = "Option::is_none")]
    pub path_regexp: Option<String>,

    /// Command and arguments, executed without a shell.
    pub shell: Vec<String>,
}

impl Rule {
    /// Rule name for reports, `#<i>` when unnamed.
    pub fn display_name(&self, i: usize) -> String {
        if self.name.is_empty() {
            format!("#{}", i)
        } else {
            self.name.clone()
        }
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.path_glob.is_some() && self.path_regexp.is_some() {
            return Err("path-glob and path-re are mutually exclusive".to_string());
        }

        if self.shell.is_empty() {
            return Err("shell is required".to_string());
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinterConfig {
    pub rules: Vec<Rule>,
}

impl LinterConfig {
    pub fn validate(&self) -> Result<()> {
        for (i, rule) in self.rules.iter().enumerate() {
            rule.validate()
                .map_err(|e| TagrefError::Config(format!("rule {}: {}", rule.display_name(i), e)))?;
        }

        Ok(())
    }
}
