//! Shell prompt heuristic.
//!
//! A match means "a foreground command probably just finished", nothing
//! stronger.

use crate::error::{Result, SyncError};
use regex::{Regex, RegexSet};

/// Trailing prompt shapes, each allowed trailing whitespace
pub const BUILTIN_PROMPT_PATTERNS: &[&str] = &[
    r"\$\s*$",
    r">\s*$",
    r"#\s*$",
    r"\]\s*$",
    r"~\]\$\s*$",
];

const ANSI_CSI: &str = r"\x1b\[[0-?]*[ -/]*[@-~]";

#[derive(Debug, Clone)]
pub struct PromptDetector {
    patterns: RegexSet,
    escapes: Regex,
}

impl PromptDetector {
    /// Built-in patterns plus `extra` regexes
    pub fn new(extra: &[String]) -> Result<Self> {
        let patterns = BUILTIN_PROMPT_PATTERNS
            .iter()
            .map(|p| p.to_string())
            .chain(extra.iter().cloned());
        let patterns = RegexSet::new(patterns)
            .map_err(|e| SyncError::ConfigError(format!("invalid prompt pattern: {}", e)))?;
        let escapes = Regex::new(ANSI_CSI)
            .map_err(|e| SyncError::ConfigError(format!("invalid escape pattern: {}", e)))?;
        Ok(Self { patterns, escapes })
    }

    pub fn builtin() -> Result<Self> {
        Self::new(&[])
    }

    /// Test one output chunk, decoded lossily, with escape sequences removed
    pub fn is_match(&self, chunk: &[u8]) -> bool {
        let text = String::from_utf8_lossy(chunk);
        let plain = self.escapes.replace_all(&text, "");
        self.patterns.is_match(&plain)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
