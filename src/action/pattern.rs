//! Output patterns used to decide whether a command really succeeded

use regex::Regex;
use std::fmt;

/// Pattern for matching command output
#[derive(Debug, Clone)]
pub enum ConditionPattern {
    /// Simple string contains match
    Simple(String),
    /// Regular expression match
    Regex(Regex),
}

impl ConditionPattern {
    /// Build a pattern, falling back to a plain substring if the regex is invalid
    pub fn new(pattern: &str, use_regex: bool) -> Self {
        if use_regex {
            match Regex::new(pattern) {
                Ok(regex) => ConditionPattern::Regex(regex),
                Err(e) => {
                    tracing::warn!("Invalid regex '{}' ({}), matching as plain text", pattern, e);
                    ConditionPattern::Simple(pattern.to_string())
                }
            }
        } else {
            ConditionPattern::Simple(pattern.to_string())
        }
    }

    /// Check if the pattern matches the given text
    pub fn matches(&self, text: &str) -> bool {
        match self {
            ConditionPattern::Simple(pattern) => text.contains(pattern),
            ConditionPattern::Regex(regex) => regex.is_match(text),
        }
    }
}

impl fmt::Display for ConditionPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionPattern::Simple(s) => write!(f, "{}", s),
            ConditionPattern::Regex(r) => write!(f, "[regex: {}]", r.as_str()),
        }
    }
}
