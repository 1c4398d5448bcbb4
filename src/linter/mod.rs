//! Checks index entries against user-defined rules.

pub mod config;

use std::process::{Command, Stdio};

pub use config::{LinterConfig, Rule};

use crate::error::{Result, TagrefError};
use crate::index::EntryView;
use crate::matcher::{compile_glob, compile_regexp, Matcher};

/// Decides whether an entry passes a rule's check.
pub trait RuleExecutor: Send + Sync {
    fn check(&self, rule: &Rule, entry: &dyn EntryView) -> Result<bool>;
}

/// Runs the rule's command with the entry exposed through the environment:
/// `TAGREF_NAME`, `TAGREF_PATH` and one `TAGREF_ATTR_<KEY>` per attribute.
/// Exit status 0 passes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellExecutor;

/// Environment variable name for attribute `key`.
pub fn attr_env_name(key: &str) -> String {
    let key: String = key
        .chars()
        .map(|c| match c {
            '-' | ':' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect();

    format!("TAGREF_ATTR_{}", key)
}

pub fn entry_env(entry: &dyn EntryView) -> Vec<(String, String)> {
    let mut env = vec![
        ("TAGREF_NAME".to_string(), entry.name().to_string()),
        ("TAGREF_PATH".to_string(), entry.path().to_string()),
    ];

    for key in entry.attribute_keys() {
        let value = entry.attribute(key).unwrap_or_default();
        env.push((attr_env_name(key), value.to_string()));
    }

    env
}

impl RuleExecutor for ShellExecutor {
    fn check(&self, rule: &Rule, entry: &dyn EntryView) -> Result<bool> {
        let Some((program, args)) = rule.shell.split_first() else {
            return Err(TagrefError::Lint(format!("{}: empty command", rule.name)));
        };

        tracing::info!(cmd = ?rule.shell, name = entry.name(), "executing lint rule");

        let status = Command::new(program)
            .args(args)
            .envs(entry_env(entry))
            .stdin(Stdio::null())
            .status()
            .map_err(|e| TagrefError::Lint(format!("{}: {}", program, e)))?;

        tracing::debug!(code = ?status.code(), "lint rule returned");

        Ok(status.success())
    }
}

struct CompiledRule {
    rule: Rule,
    path: Option<Matcher>,
}

pub struct Linter {
    rules: Vec<CompiledRule>,
    executor: Box<dyn RuleExecutor>,
}

impl Linter {
    pub fn new(config: &LinterConfig) -> Result<Self> {
        Self::with_executor(config, Box::new(ShellExecutor))
    }

    pub fn with_executor(config: &LinterConfig, executor: Box<dyn RuleExecutor>) -> Result<Self> {
        config.validate()?;

        let rules = config
            .rules
            .iter()
            .enumerate()
            .map(|(i, rule)| {
                let path = match (&rule.path_glob, &rule.path_regexp) {
                    (Some(g), _) => Some(compile_glob(g)),
                    (_, Some(re)) => Some(compile_regexp(re)),
                    (None, None) => None,
                }
                .transpose()
                .map_err(|e| TagrefError::Config(format!("rule {}: {}", rule.display_name(i), e)))?;

                Ok(CompiledRule {
                    rule: rule.clone(),
                    path,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rules, executor })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rule(&self, i: usize) -> Option<&Rule> {
        self.rules.get(i).map(|r| &r.rule)
    }

    /// Checks one rule. Entries outside the rule's path filter pass.
    pub fn lint_rule(&self, i: usize, entry: &dyn EntryView) -> Result<bool> {
        let Some(compiled) = self.rules.get(i) else {
            return Err(TagrefError::Lint(format!("no rule #{}", i)));
        };

        if let Some(m) = &compiled.path {
            if !m.is_match(entry.path()) {
                tracing::debug!(path = entry.path(), rule = i, "path not selected");
                return Ok(true);
            }
        }

        self.executor.check(&compiled.rule, entry).map_err(|e| {
            TagrefError::Lint(format!("rule {}: {}", compiled.rule.display_name(i), e))
        })
    }

    /// Returns the indices of the rules `entry` violates.
    pub fn lint(&self, entry: &dyn EntryView) -> Result<Vec<usize>> {
        let mut fails = Vec::new();

        for i in 0..self.rules.len() {
            if !self.lint_rule(i, entry)? {
                fails.push(i);
            }
        }

        Ok(fails)
    }
}
