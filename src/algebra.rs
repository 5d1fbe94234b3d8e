//! Spelling-algebra pipelines: ordered textual rewrite rules.
//!
//! The chord composer runs three independent pipelines over a serialized
//! chord code: `algebra` (raw alphabet subset to canonical code),
//! `prompt_format` (canonical code to live feedback text) and
//! `output_format` (canonical code to the text replayed as keystrokes).
//! Rules are written `xform<d>pattern<d>replacement<d>`,
//! `xlit<d>from<d>to<d>` or `erase<d>pattern<d>` where `<d>` is the byte
//! following the opcode (conventionally `/`). A rule that does not match
//! leaves the code unchanged.

use regex::Regex;
use tracing::warn;

/// A single deterministic string rewrite.
#[derive(Debug, Clone)]
pub enum AlgebraRule {
    /// Regex substitution applied to every match. Replacement may use
    /// `$1`-style capture references.
    Xform { pattern: Regex, replacement: String },
    /// Character-for-character transliteration.
    Xlit { from: Vec<char>, to: Vec<char> },
    /// Deletes the code entirely when the pattern matches the whole code.
    Erase { pattern: Regex },
}

impl AlgebraRule {
    /// Parse one rule spec. Returns `None` for an unknown opcode, a bad
    /// regex, or mismatched `xlit` alphabets.
    pub fn parse(spec: &str) -> Option<Self> {
        let (op, body) = if let Some(rest) = spec.strip_prefix("xform") {
            ("xform", rest)
        } else if let Some(rest) = spec.strip_prefix("xlit") {
            ("xlit", rest)
        } else if let Some(rest) = spec.strip_prefix("erase") {
            ("erase", rest)
        } else {
            return None;
        };
        let delimiter = body.chars().next()?;
        let parts: Vec<&str> = body[delimiter.len_utf8()..].split(delimiter).collect();
        match op {
            "xform" => {
                if parts.len() < 2 {
                    return None;
                }
                let pattern = Regex::new(parts[0]).ok()?;
                Some(Self::Xform {
                    pattern,
                    replacement: parts[1].to_string(),
                })
            }
            "xlit" => {
                if parts.len() < 2 {
                    return None;
                }
                let from: Vec<char> = parts[0].chars().collect();
                let to: Vec<char> = parts[1].chars().collect();
                if from.is_empty() || from.len() != to.len() {
                    return None;
                }
                Some(Self::Xlit { from, to })
            }
            "erase" => {
                if parts.is_empty() || parts[0].is_empty() {
                    return None;
                }
                // erase only fires on a whole-code match
                let pattern = Regex::new(&format!("^(?:{})$", parts[0])).ok()?;
                Some(Self::Erase { pattern })
            }
            _ => unreachable!(),
        }
    }

    fn apply(&self, code: &str) -> String {
        match self {
            Self::Xform {
                pattern,
                replacement,
            } => pattern.replace_all(code, replacement.as_str()).into_owned(),
            Self::Xlit { from, to } => code
                .chars()
                .map(|ch| match from.iter().position(|&f| f == ch) {
                    Some(i) => to[i],
                    None => ch,
                })
                .collect(),
            Self::Erase { pattern } => {
                if pattern.is_match(code) {
                    String::new()
                } else {
                    code.to_string()
                }
            }
        }
    }
}

/// An ordered list of rewrite rules applied left to right.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    rules: Vec<AlgebraRule>,
}

impl Pipeline {
    /// Load a pipeline from configured rule specs, skipping malformed
    /// rules with a warning.
    pub fn load(specs: &[String]) -> Self {
        let mut rules = Vec::with_capacity(specs.len());
        for (i, spec) in specs.iter().enumerate() {
            match AlgebraRule::parse(spec) {
                Some(rule) => rules.push(rule),
                None => warn!(rule = %spec, index = i, "skipping invalid algebra rule"),
            }
        }
        Self { rules }
    }

    /// Apply every rule in declared order.
    pub fn apply(&self, code: &str) -> String {
        let mut code = code.to_string();
        for rule in &self.rules {
            code = rule.apply(&code);
        }
        code
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
