use std::collections::HashMap;

use super::template::{self, PathTemplateError, Segment};

/// A mapping from named-capture name to the raw path substring bound to it.
pub type NamedParameters = HashMap<String, String>;

/// A path template compiled into a segment-indexed state machine.
///
/// `*` matches exactly one path segment and discards it, `**` matches the
/// remaining suffix of the path and must be the template's final segment,
/// `:name` matches one segment and binds its raw text under `name`, and a
/// segment containing `|` (e.g. `v1|v2`) matches if the path segment equals
/// any of the alternatives.
///
/// Leading/trailing whitespace inside a path segment is ignored when
/// comparing against a literal or alternation segment. This quirk is not
/// documented anywhere upstream of this matcher and should not be relied
/// upon by new route templates; it is retained here only for parity with
/// previously observed behaviour and is a candidate for removal.
#[derive(Debug, Clone)]
pub struct CompiledMatcher {
    original: String,
    segments: Vec<Segment>,
    named: HashMap<String, usize>,
}

impl CompiledMatcher {
    /// Compiles a path template. Fails if `**` is not the final segment or a
    /// named capture appears more than once.
    pub fn compile(template: &str) -> Result<Self, PathTemplateError> {
        let (segments, named) = template::parse(template)?;
        Ok(Self {
            original: template.to_string(),
            segments,
            named,
        })
    }

    /// The template string this matcher was compiled from.
    pub fn template(&self) -> &str {
        &self.original
    }

    /// Returns `true` if `path` matches this template.
    pub fn is_match(&self, path: &str) -> bool {
        let normalized = template::normalize_path(path);
        let parts: Vec<&str> = normalized.split('/').collect();
        Self::match_parts(&self.segments, &parts)
    }

    /// Returns the named captures bound by matching `path`, or an empty map
    /// if `path` does not match. Never panics on a non-matching path.
    pub fn retrieve_parameters(&self, path: &str) -> NamedParameters {
        if self.named.is_empty() {
            return NamedParameters::new();
        }
        let normalized = template::normalize_path(path);
        let parts: Vec<&str> = normalized.split('/').collect();
        if !Self::match_parts(&self.segments, &parts) {
            return NamedParameters::new();
        }
        let mut params = NamedParameters::new();
        for (name, index) in &self.named {
            if let Some(value) = parts.get(*index) {
                params.insert(name.clone(), (*value).to_string());
            }
        }
        params
    }

    /// Walks the template's segments against the `/`-split path parts in
    /// lockstep. `**` short-circuits to a match; every other segment
    /// consumes exactly one path part.
    fn match_parts(segments: &[Segment], parts: &[&str]) -> bool {
        let mut pi = 0usize;
        for segment in segments {
            match segment {
                Segment::DoubleWildcard => return true,
                Segment::Wildcard | Segment::Named(_) => {
                    if pi >= parts.len() {
                        return false;
                    }
                    pi += 1;
                }
                Segment::Literal(literal) => {
                    let Some(part) = parts.get(pi) else {
                        return false;
                    };
                    if part.trim() != literal.as_str() {
                        return false;
                    }
                    pi += 1;
                }
                Segment::Alternation(alternatives) => {
                    let Some(part) = parts.get(pi) else {
                        return false;
                    };
                    let trimmed = part.trim();
                    if !alternatives.iter().any(|alt| alt == trimmed) {
                        return false;
                    }
                    pi += 1;
                }
            }
        }
        pi == parts.len()
    }
}
