//! Group naming: host-group labels and parameter-driven group patterns

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::{InventoryError, Result};
use crate::types::Params;

/// Prefix of groups derived from Foreman host-group names
pub const HOSTGROUP_PREFIX: &str = "foreman_";

static UNSAFE_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^A-Za-z0-9_]").expect("valid regex")
});

static PATTERN_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{|\}\}|\{([^{}]*)\}|[{}]").expect("valid regex")
});

/// Make a string usable as an Ansible group name
///
/// Spaces are dropped and every other character outside `[A-Za-z0-9_]`
/// becomes `_`.
#[must_use]
pub fn to_safe(word: &str) -> String {
    UNSAFE_CHARS
        .replace_all(&word.replace(' ', ""), "_")
        .into_owned()
}

/// Group label for a Foreman host-group name
///
/// `"Web Servers!"` becomes `"foreman_webservers_"`.
#[must_use]
pub fn hostgroup_label(hostgroup_name: &str) -> String {
    to_safe(&format!("{HOSTGROUP_PREFIX}{}", hostgroup_name.to_lowercase()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(String),
}

/// Parsed group pattern such as `"{app}-{tier}"`
///
/// `{name}` is replaced with the host's resolved parameter `name`; `{{` and
/// `}}` produce literal braces.
#[derive(Clone, PartialEq, Eq)]
pub struct GroupPattern {
    source: String,
    segments: Vec<Segment>,
}

impl GroupPattern {
    /// Parse a pattern template
    ///
    /// # Errors
    /// Returns an error on unbalanced braces, empty placeholders, or
    /// placeholders carrying format specs or attribute access.
    pub fn parse(pattern: &str) -> Result<Self> {
        let invalid = |reason: &str| InventoryError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut last = 0;

        for caps in PATTERN_TOKEN.captures_iter(pattern) {
            let Some(token) = caps.get(0) else { continue };
            literal.push_str(&pattern[last..token.start()]);
            last = token.end();

            match token.as_str() {
                "{{" => literal.push('{'),
                "}}" => literal.push('}'),
                "{" | "}" => return Err(invalid("unbalanced brace")),
                _ => {
                    let name = caps.get(1).map_or("", |m| m.as_str());
                    if name.is_empty() {
                        return Err(invalid("empty placeholder"));
                    }
                    if name.contains([':', '!', '.', '[']) {
                        return Err(invalid("only plain {name} placeholders are supported"));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field(name.to_string()));
                }
            }
        }

        literal.push_str(&pattern[last..]);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: pattern.to_string(),
            segments,
        })
    }

    /// Original template text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Placeholder names in order of appearance
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Field(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Fill the pattern from resolved parameters
    ///
    /// Returns `None` when a placeholder has no value; the host simply does
    /// not join this group.
    #[must_use]
    pub fn render(&self, params: &Params) -> Option<String> {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(name) => out.push_str(&render_value(params.get(name)?)?),
            }
        }
        Some(out)
    }
}

impl fmt::Debug for GroupPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GroupPattern({:?})", self.source)
    }
}

impl fmt::Display for GroupPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Text substituted for a parameter value; null counts as missing
fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
