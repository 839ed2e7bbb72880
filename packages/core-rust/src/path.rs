//! Path patterns (`/users/:id`) and the static-segment priority ordering.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::{Map, Value};

use crate::error::RegistryError;

/// Characters escaped when a parameter value is substituted into a path.
/// Leaves the same unreserved set untouched as `encodeURIComponent`.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A parsed route path. Segments are either literals or `:name` placeholders
/// that capture exactly one non-empty segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Parses a pattern.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidPath`] when the pattern does not start
    /// with `/`, has an unnamed placeholder, or repeats a placeholder name.
    pub fn parse(raw: &str) -> Result<Self, RegistryError> {
        let invalid = |reason: &str| RegistryError::InvalidPath {
            path: raw.to_string(),
            reason: reason.to_string(),
        };

        let Some(rest) = raw.strip_prefix('/') else {
            return Err(invalid("must start with '/'"));
        };

        let mut segments = Vec::new();
        let mut seen = Vec::new();
        for part in rest.split('/') {
            if let Some(name) = part.strip_prefix(':') {
                if name.is_empty() {
                    return Err(invalid("placeholder without a name"));
                }
                if seen.contains(&name) {
                    return Err(invalid("placeholder name used twice"));
                }
                seen.push(name);
                segments.push(Segment::Param(name.to_string()));
            } else {
                segments.push(Segment::Literal(part.to_string()));
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Names of the placeholders, in path order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    #[must_use]
    pub fn is_static(&self) -> bool {
        self.param_names().next().is_none()
    }

    /// Matches a request path, returning the percent-decoded captures.
    ///
    /// The segment count must be equal; placeholders never match an empty
    /// segment.
    #[must_use]
    pub fn matches(&self, path: &str) -> Option<BTreeMap<String, String>> {
        let rest = path.strip_prefix('/')?;
        let parts: Vec<&str> = rest.split('/').collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = BTreeMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) => {
                    if literal != part {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    if part.is_empty() {
                        return None;
                    }
                    let decoded = percent_decode_str(part).decode_utf8().ok()?;
                    params.insert(name.clone(), decoded.into_owned());
                }
            }
        }
        Some(params)
    }

    /// Substitutes placeholders with values from `params`, percent-encoding each.
    ///
    /// # Errors
    ///
    /// Returns [`MissingParam`] naming the first placeholder without a usable
    /// value (absent, `null`, object, or array).
    pub fn render(&self, params: &Map<String, Value>) -> Result<String, MissingParam> {
        let mut out = String::with_capacity(self.raw.len());
        for segment in &self.segments {
            out.push('/');
            match segment {
                Segment::Literal(literal) => out.push_str(literal),
                Segment::Param(name) => {
                    let value = match params.get(name) {
                        Some(Value::String(s)) => s.clone(),
                        Some(Value::Number(n)) => n.to_string(),
                        Some(Value::Bool(b)) => b.to_string(),
                        _ => return Err(MissingParam(name.clone())),
                    };
                    out.extend(utf8_percent_encode(&value, SEGMENT));
                }
            }
        }
        Ok(out)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// A placeholder had no value to substitute.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("missing value for path parameter '{0}'")]
pub struct MissingParam(pub String);

// ---------------------------------------------------------------------------
// Static-segment priority
// ---------------------------------------------------------------------------

/// Orders two route paths so that literal segments win over placeholders.
///
/// Segments are compared left to right, a missing segment counting as the
/// empty literal. A literal sorts before a placeholder; two different
/// literals compare lexicographically. When every position ties in kind the
/// full paths decide.
#[must_use]
pub fn compare_static_priority(a: &str, b: &str) -> Ordering {
    let a_segments: Vec<&str> = a.split('/').collect();
    let b_segments: Vec<&str> = b.split('/').collect();

    for i in 0..a_segments.len().max(b_segments.len()) {
        let a_segment = a_segments.get(i).copied().unwrap_or("");
        let b_segment = b_segments.get(i).copied().unwrap_or("");

        let a_dynamic = a_segment.starts_with(':');
        let b_dynamic = b_segment.starts_with(':');

        if a_dynamic != b_dynamic {
            return if a_dynamic {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }

        if !a_dynamic && a_segment != b_segment {
            return a_segment.cmp(b_segment);
        }
    }

    a.cmp(b)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
