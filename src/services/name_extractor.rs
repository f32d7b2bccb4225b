//! Pulls the person's name out of OCR text and turns it into a filename token.

use regex::Regex;

use crate::error::{AppError, AppResult};

/// Characters that are unsafe in filenames on at least one common platform.
pub const RESERVED_CHARS: [char; 10] = ['/', '\\', '?', '%', '*', ':', '|', '"', '<', '>'];

/// Leaves room for an extension and a collision suffix under the usual
/// 255-byte filename limit.
const MAX_NAME_BYTES: usize = 200;

/// Which characters the value after the label may consist of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureClass {
    /// ASCII letters and horizontal whitespace only.
    Letters,
    /// Anything up to the end of the line.
    ToLineEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhitespacePolicy {
    /// Leave inner whitespace as recognized.
    Keep,
    /// Collapse each inner whitespace run to a single `_`.
    Underscore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservedCharPolicy {
    Replace(char),
    Strip,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamePolicy {
    pub label: String,
    pub capture: CaptureClass,
    pub whitespace: WhitespacePolicy,
    pub reserved: ReservedCharPolicy,
    pub sentinel: String,
}

impl NamePolicy {
    /// Policy for download copies: `Jane_Doe`, falling back to `unknown`.
    pub fn download() -> Self {
        Self {
            label: "Name:".to_string(),
            capture: CaptureClass::Letters,
            whitespace: WhitespacePolicy::Underscore,
            reserved: ReservedCharPolicy::Replace('-'),
            sentinel: "unknown".to_string(),
        }
    }

    /// Policy for on-disk renames: `Jane Doe`, falling back to `Unknown`.
    pub fn rename() -> Self {
        Self {
            label: "Name:".to_string(),
            capture: CaptureClass::ToLineEnd,
            whitespace: WhitespacePolicy::Keep,
            reserved: ReservedCharPolicy::Replace('-'),
            sentinel: "Unknown".to_string(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

/// Compiled form of a [`NamePolicy`]. Stateless after construction.
#[derive(Debug, Clone)]
pub struct NameExtractor {
    policy: NamePolicy,
    pattern: Regex,
}

impl NameExtractor {
    pub fn new(policy: NamePolicy) -> AppResult<Self> {
        if is_unsafe_token(&policy.sentinel) {
            return Err(AppError::config(format!(
                "sentinel '{}' is not a valid filename component",
                policy.sentinel
            )));
        }
        if let ReservedCharPolicy::Replace(c) = policy.reserved {
            if is_reserved(c) || c.is_control() {
                return Err(AppError::config(format!(
                    "replacement character '{}' is itself reserved",
                    c.escape_default()
                )));
            }
        }

        let capture = match policy.capture {
            CaptureClass::Letters => r"([A-Za-z \t]+)",
            CaptureClass::ToLineEnd => r"(.+)",
        };
        // The value may sit on the line after the label; it never spans lines.
        let source = format!(r"(?i){}\s*{}", regex::escape(policy.label.trim()), capture);
        let pattern = Regex::new(&source)
            .map_err(|e| AppError::config(format!("invalid name pattern: {}", e)))?;

        Ok(Self { policy, pattern })
    }

    pub fn policy(&self) -> &NamePolicy {
        &self.policy
    }

    /// Never returns an empty string; falls back to the policy sentinel.
    pub fn extract(&self, text: &str) -> String {
        let raw = match self.pattern.captures(text).and_then(|caps| caps.get(1)) {
            Some(m) => m.as_str(),
            None => return self.policy.sentinel.clone(),
        };

        let normalized = self.normalize(raw);
        if normalized.is_empty() {
            self.policy.sentinel.clone()
        } else {
            normalized
        }
    }

    fn normalize(&self, raw: &str) -> String {
        let trimmed = raw.trim();

        let spaced = match self.policy.whitespace {
            WhitespacePolicy::Keep => trimmed.to_string(),
            WhitespacePolicy::Underscore => trimmed.split_whitespace().collect::<Vec<_>>().join("_"),
        };

        let mut out = String::with_capacity(spaced.len());
        for c in spaced.chars() {
            if out.len() + c.len_utf8() > MAX_NAME_BYTES {
                break;
            }
            if c.is_control() {
                if c.is_whitespace() {
                    out.push(' ');
                }
                continue;
            }
            if is_reserved(c) {
                if let ReservedCharPolicy::Replace(r) = self.policy.reserved {
                    out.push(r);
                }
                continue;
            }
            out.push(c);
        }

        // A bare "." or ".." would resolve to a directory.
        let out = out.trim().to_string();
        if out.chars().all(|c| c == '.') {
            String::new()
        } else {
            out
        }
    }
}

fn is_reserved(c: char) -> bool {
    RESERVED_CHARS.contains(&c)
}

fn is_unsafe_token(token: &str) -> bool {
    token.trim().is_empty() || token.chars().any(|c| is_reserved(c) || c.is_control())
}
