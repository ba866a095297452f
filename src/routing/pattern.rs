use crate::error::{Result, TrellisError};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::ops::Index;

const DEFAULT_SEGMENT: &str = "[^/]+";

/// A path template compiled into an anchored matcher.
///
/// `{name}` matches one or more non-slash characters, `{name:regex}` uses the
/// given expression instead. Everything else matches literally.
#[derive(Debug, Clone)]
pub struct Pattern {
    raw: String,
    regex: Regex,
    names: Vec<String>,
}

impl Pattern {
    pub fn compile(template: &str) -> Result<Self> {
        let mut source = String::from("^");
        let mut names: Vec<String> = Vec::new();
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            source.push_str(&regex::escape(&rest[..open]));
            let after = &rest[open + 1..];
            let close = after
                .find('}')
                .ok_or_else(|| invalid(template, "unclosed `{`"))?;

            let (name, constraint) = match after[..close].split_once(':') {
                Some((name, constraint)) => (name.trim(), constraint),
                None => (after[..close].trim(), DEFAULT_SEGMENT),
            };
            if name.is_empty() {
                return Err(invalid(template, "empty parameter name"));
            }
            if constraint.is_empty() {
                return Err(invalid(template, format!("empty constraint for `{name}`")));
            }
            if names.iter().any(|existing| existing == name) {
                return Err(invalid(template, format!("duplicate parameter `{name}`")));
            }

            source.push_str(&format!("(?P<p{}>{})", names.len(), constraint));
            names.push(name.to_string());
            rest = &after[close + 1..];
        }
        source.push_str(&regex::escape(rest));
        source.push('$');

        let regex = Regex::new(&source).map_err(|err| invalid(template, err.to_string()))?;
        Ok(Self {
            raw: template.to_string(),
            regex,
            names,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Parameter names in declaration order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Match the whole path, extracting parameters in declaration order.
    pub fn matches(&self, path: &str) -> Option<Params> {
        let captures = self.regex.captures(path)?;
        let entries = self
            .names
            .iter()
            .enumerate()
            .map(|(index, name)| {
                let raw = captures
                    .name(&format!("p{index}"))
                    .map_or("", |m| m.as_str());
                (name.clone(), ParamValue::from_segment(raw))
            })
            .collect();
        Some(Params { entries })
    }
}

fn invalid(pattern: &str, reason: impl Into<String>) -> TrellisError {
    TrellisError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: reason.into(),
    }
}

/// A path parameter. All-digit segments become integers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Str(String),
}

impl ParamValue {
    /// Digit-only segments that fit an `i64` are coerced; everything else stays a string.
    pub fn from_segment(segment: &str) -> Self {
        if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(number) = segment.parse::<i64>() {
                return Self::Int(number);
            }
        }
        Self::Str(segment.to_string())
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(number) => Some(*number),
            Self::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(text) => Some(text),
            Self::Int(_) => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(number) => write!(f, "{number}"),
            Self::Str(text) => f.write_str(text),
        }
    }
}

impl PartialEq<i64> for ParamValue {
    fn eq(&self, other: &i64) -> bool {
        self.as_int() == Some(*other)
    }
}

impl PartialEq<&str> for ParamValue {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == Some(*other)
    }
}

/// Parameters extracted from a matched path, in template order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Params {
    entries: Vec<(String, ParamValue)>,
}

impl Params {
    /// Positional access.
    pub fn get(&self, index: usize) -> Option<&ParamValue> {
        self.entries.get(index).map(|(_, value)| value)
    }

    pub fn named(&self, name: &str) -> Option<&ParamValue> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn values(&self) -> impl Iterator<Item = &ParamValue> {
        self.entries.iter().map(|(_, value)| value)
    }
}

impl Index<usize> for Params {
    type Output = ParamValue;

    fn index(&self, index: usize) -> &ParamValue {
        &self.entries[index].1
    }
}

impl FromIterator<(String, ParamValue)> for Params {
    fn from_iter<I: IntoIterator<Item = (String, ParamValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
