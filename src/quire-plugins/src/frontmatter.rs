//! Frontmatter parsing.
//!
//! A template file may open with a metadata block delimited by `---` lines:
//!
//! ```markdown
//! ---
//! description: Scaffold a new API endpoint
//! model: claude-sonnet-4-5
//! ---
//!
//! Create an endpoint for $ARGUMENTS.
//! ```
//!
//! The block is a flat `key: value` mapping. Files without an opening
//! delimiter are body-only and parse to empty metadata.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::error::TemplateError;

/// Default frontmatter delimiter line.
pub const DEFAULT_DELIMITER: &str = "---";

/// Flat string metadata from a frontmatter block, in declaration order.
///
/// Equality ignores key order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(IndexMap<String, String>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Get a value by key, treating blank values as absent.
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.trim().is_empty())
    }

    /// Insert a value, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn description(&self) -> Option<&str> {
        self.get_non_empty("description")
    }

    pub fn model(&self) -> Option<&str> {
        self.get_non_empty("model")
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A parsed template file: metadata plus the untouched body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frontmatter {
    pub metadata: Metadata,
    pub body: String,
}

impl Frontmatter {
    /// Parse with the default `---` delimiter.
    pub fn parse(text: &str) -> Result<Self, TemplateError> {
        parse(text, DEFAULT_DELIMITER)
    }

    /// Get a required field, failing when it is absent or blank.
    pub fn require(&self, key: &str) -> Result<&str, TemplateError> {
        self.metadata
            .get_non_empty(key)
            .ok_or_else(|| TemplateError::missing(key))
    }

    /// Serialize back to file text with the default delimiter.
    pub fn render(&self) -> Result<String, TemplateError> {
        self.render_with(DEFAULT_DELIMITER)
    }

    /// Serialize back to file text.
    ///
    /// `parse(render(fm))` yields `fm` again: the metadata block is emitted as
    /// YAML and exactly one blank line separates it from the body.
    pub fn render_with(&self, delimiter: &str) -> Result<String, TemplateError> {
        let mut mapping = serde_yaml::Mapping::new();
        for (key, value) in self.metadata.iter() {
            mapping.insert(Value::String(key.to_string()), Value::String(value.to_string()));
        }

        let block = if mapping.is_empty() {
            String::new()
        } else {
            serde_yaml::to_string(&mapping)
                .map_err(|e| TemplateError::malformed(format!("cannot serialize metadata: {e}")))?
        };

        let mut out =
            String::with_capacity(block.len() + self.body.len() + delimiter.len() * 2 + 3);
        out.push_str(delimiter);
        out.push('\n');
        out.push_str(&block);
        out.push_str(delimiter);
        out.push_str("\n\n");
        out.push_str(&self.body);
        Ok(out)
    }
}

/// Parse frontmatter delimited by `delimiter` lines.
///
/// The body is everything after the closing delimiter line, byte for byte,
/// with a single leading blank line removed.
pub fn parse(text: &str, delimiter: &str) -> Result<Frontmatter, TemplateError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let (first, rest) = split_first_line(text);
    if first.trim_end() != delimiter {
        return Ok(Frontmatter {
            metadata: Metadata::new(),
            body: text.to_string(),
        });
    }

    let mut offset = 0;
    let mut closing = None;
    while offset < rest.len() {
        let (line, _) = split_first_line(&rest[offset..]);
        let consumed = (line.len() + 1).min(rest.len() - offset);
        if line.trim_end() == delimiter {
            closing = Some((offset, offset + consumed));
            break;
        }
        offset += consumed;
    }

    let Some((block_end, body_start)) = closing else {
        return Err(TemplateError::malformed(format!(
            "missing closing '{delimiter}' delimiter"
        )));
    };

    let metadata = parse_block(&rest[..block_end])?;
    let body = strip_one_blank_line(&rest[body_start..]);

    Ok(Frontmatter {
        metadata,
        body: body.to_string(),
    })
}

/// Split off the first line, without its `\n`. The remainder starts after it.
fn split_first_line(text: &str) -> (&str, &str) {
    match text.find('\n') {
        Some(pos) => (&text[..pos], &text[pos + 1..]),
        None => (text, ""),
    }
}

fn strip_one_blank_line(body: &str) -> &str {
    body.strip_prefix("\r\n")
        .or_else(|| body.strip_prefix('\n'))
        .unwrap_or(body)
}

fn parse_block(block: &str) -> Result<Metadata, TemplateError> {
    if block.trim().is_empty() {
        return Ok(Metadata::new());
    }

    match serde_yaml::from_str::<Value>(block) {
        Ok(Value::Mapping(mapping)) => {
            for (key, value) in &mapping {
                if !is_scalar(key) {
                    return Err(TemplateError::malformed("frontmatter keys must be scalars"));
                }
                if !is_scalar(value) {
                    return Err(TemplateError::malformed(format!(
                        "value for '{}' must be a scalar",
                        key_label(key)
                    )));
                }
            }

            // Plain scalars deserialize to their source text, so `1.10` stays `1.10`.
            let raw: IndexMap<String, Option<String>> = serde_yaml::from_str(block)
                .map_err(|e| TemplateError::malformed(e.to_string()))?;
            Ok(raw
                .into_iter()
                .map(|(key, value)| {
                    let value = value.map(|v| v.trim().to_string()).unwrap_or_default();
                    (key.trim().to_string(), value)
                })
                .collect())
        }
        Ok(Value::Null) => Ok(Metadata::new()),
        // Free-text values like `description: Use when: ...` are not valid YAML.
        _ => parse_lines(block),
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Sequence(_) | Value::Mapping(_) | Value::Tagged(_))
}

fn key_label(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        _ => "~".to_string(),
    }
}

/// Line-oriented fallback: split each line on its first `:`.
///
/// Indented lines continue the previous value.
fn parse_lines(block: &str) -> Result<Metadata, TemplateError> {
    let mut metadata = Metadata::new();
    // Key being continued and the separator its continuation lines join with.
    let mut last_key: Option<(String, &str)> = None;

    for line in block.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if line.starts_with([' ', '\t']) {
            if let Some((key, separator)) = &last_key {
                let value = metadata.get(key).unwrap_or_default();
                let joined = if value.is_empty() {
                    trimmed.to_string()
                } else {
                    format!("{value}{separator}{trimmed}")
                };
                metadata.insert(key.clone(), joined);
                continue;
            }
        }

        let Some((key, value)) = line.split_once(':') else {
            return Err(TemplateError::malformed(format!(
                "expected `key: value`, found '{trimmed}'"
            )));
        };

        let key = key.trim();
        if key.is_empty() {
            return Err(TemplateError::malformed(format!("empty key in '{trimmed}'")));
        }

        let value = value.trim();
        let (value, separator) = match block_indicator(value) {
            Some('|') => ("", "\n"),
            Some(_) => ("", " "),
            None => (unquote(value), " "),
        };
        metadata.insert(key, value);
        last_key = Some((key.to_string(), separator));
    }

    Ok(metadata)
}

/// `|` or `>` with an optional chomping indicator, as opens a YAML block scalar.
fn block_indicator(value: &str) -> Option<char> {
    let mut chars = value.chars();
    let style = chars.next().filter(|c| matches!(c, '|' | '>'))?;
    match chars.as_str() {
        "" | "-" | "+" => Some(style),
        _ => None,
    }
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return value[1..value.len() - 1].trim();
        }
    }
    value
}
