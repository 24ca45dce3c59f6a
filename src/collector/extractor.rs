use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::{
    error::{ExtractError, PatternError},
    schema::{MetricValue, PointBatch},
};

/// Segment that expands to every key of the mapping it points at.
pub const WILDCARD: &str = "*";

/// A validated dotted path into the status document.
///
/// Examples:
/// - "connections.current"  -> one point
/// - "opcounters.*"         -> one point per key under `opcounters`
///
/// INVARIANT:
/// - The wildcard, if present, is the last segment
/// - No segment is empty
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<String>,
    wildcard: bool,
}

impl PathPattern {
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        if raw.is_empty() {
            return Err(PatternError::Empty);
        }

        let mut segments: Vec<String> = raw.split('.').map(str::to_owned).collect();
        if segments.iter().any(String::is_empty) {
            return Err(PatternError::EmptySegment(raw.to_owned()));
        }

        let last = segments.len() - 1;
        if segments[..last].iter().any(|s| s == WILDCARD) {
            return Err(PatternError::WildcardNotLast(raw.to_owned()));
        }

        let wildcard = segments[last] == WILDCARD;
        if wildcard {
            if last == 0 {
                return Err(PatternError::BareWildcard(raw.to_owned()));
            }
            segments.pop();
        }

        Ok(Self {
            raw: raw.to_owned(),
            segments,
            wildcard,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    /// The pattern without the trailing wildcard segment.
    pub fn stem(&self) -> &str {
        if self.wildcard {
            &self.raw[..self.raw.len() - WILDCARD.len() - 1]
        } else {
            &self.raw
        }
    }
}

impl FromStr for PathPattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Parses a list of raw patterns, failing on the first invalid one.
pub fn parse_patterns<S: AsRef<str>>(raw: &[S]) -> Result<Vec<PathPattern>, PatternError> {
    raw.iter().map(|p| PathPattern::parse(p.as_ref())).collect()
}

/// Flattens `document` into a batch of points according to `patterns`.
///
/// Every name is `prefix + pattern`, or `prefix + stem + "." + key` for
/// wildcard expansions. Keys of a wildcard mapping come out in
/// lexicographic order.
///
/// Missing keys and unexpected nesting are errors, never skipped.
pub fn extract(
    document: &Value,
    patterns: &[PathPattern],
    prefix: &str,
    timestamp: i64,
) -> Result<PointBatch, ExtractError> {
    let mut batch = PointBatch::new(timestamp);

    for pattern in patterns {
        if pattern.wildcard {
            let target = walk(document, pattern, &pattern.segments)?;
            let Value::Object(children) = target else {
                return Err(ExtractError::NotAMapping {
                    pattern: pattern.raw.clone(),
                    key: pattern.stem().to_owned(),
                });
            };

            // the map may keep document order, names must not depend on it
            let mut entries: Vec<(&String, &Value)> = children.iter().collect();
            entries.sort_unstable_by(|a, b| a.0.cmp(b.0));

            for (key, value) in entries {
                let name = format!("{prefix}{}.{key}", pattern.stem());
                let value = numeric(value, &name)?;
                batch.push(name, value);
            }
        } else {
            let (parents, leaf) = pattern.segments.split_at(pattern.segments.len() - 1);
            let parent = walk(document, pattern, parents)?;
            let value = child(parent, pattern, &leaf[0])?;

            let name = format!("{prefix}{}", pattern.raw);
            let value = numeric(value, &name)?;
            batch.push(name, value);
        }
    }

    Ok(batch)
}

/// Descends through `segments`, each of which must name a mapping.
fn walk<'a>(
    document: &'a Value,
    pattern: &PathPattern,
    segments: &[String],
) -> Result<&'a Value, ExtractError> {
    let mut current = document;
    for segment in segments {
        current = child(current, pattern, segment)?;
        if !current.is_object() {
            return Err(ExtractError::NotAMapping {
                pattern: pattern.raw.clone(),
                key: segment.clone(),
            });
        }
    }
    Ok(current)
}

fn child<'a>(
    parent: &'a Value,
    pattern: &PathPattern,
    key: &str,
) -> Result<&'a Value, ExtractError> {
    parent.get(key).ok_or_else(|| ExtractError::MissingKey {
        pattern: pattern.raw.clone(),
        key: key.to_owned(),
    })
}

fn numeric(value: &Value, name: &str) -> Result<MetricValue, ExtractError> {
    MetricValue::from_json(value).ok_or_else(|| ExtractError::NotNumeric {
        name: name.to_owned(),
    })
}
