use std::collections::HashMap;

/// One `/`-separated piece of a compiled path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    Literal(String),
    Alternation(Vec<String>),
    Named(String),
    Wildcard,
    DoubleWildcard,
}

/// Errors detected while compiling a [`super::CompiledMatcher`].
#[derive(Debug, thiserror::Error)]
pub enum PathTemplateError {
    #[error("'**' must be the final segment of a path template, found more after it in '{template}'")]
    DoubleWildcardNotTerminal { template: String },
    #[error("named parameter ':{name}' is not unique in template '{template}'")]
    DuplicateName { name: String, template: String },
}

/// Appends a trailing `/` unless the template already ends with one or with
/// `**` (a `**` segment already swallows any trailing separator).
fn normalize(template: &str) -> String {
    if template.ends_with('/') || template.ends_with("**") {
        template.to_string()
    } else {
        format!("{template}/")
    }
}

/// Splits a normalised template into segments and records the `/`-split index
/// of every named capture, matching the original source's indexing scheme
/// (the leading empty segment produced by a template's leading `/` counts).
pub(crate) fn parse(
    template: &str,
) -> Result<(Vec<Segment>, HashMap<String, usize>), PathTemplateError> {
    let normalized = normalize(template);
    let parts: Vec<&str> = normalized.split('/').collect();
    let mut segments = Vec::with_capacity(parts.len());
    let mut named = HashMap::new();
    let mut seen_double_wildcard = false;

    for (index, part) in parts.iter().enumerate() {
        if seen_double_wildcard {
            return Err(PathTemplateError::DoubleWildcardNotTerminal {
                template: template.to_string(),
            });
        }
        if *part == "**" {
            segments.push(Segment::DoubleWildcard);
            seen_double_wildcard = true;
        } else if *part == "*" {
            segments.push(Segment::Wildcard);
        } else if part.len() > 1 && part.starts_with(':') {
            let name = part[1..].to_string();
            if named.contains_key(&name) {
                return Err(PathTemplateError::DuplicateName {
                    name,
                    template: template.to_string(),
                });
            }
            named.insert(name.clone(), index);
            segments.push(Segment::Named(name));
        } else if part.contains('|') {
            segments.push(Segment::Alternation(
                part.split('|').map(str::to_string).collect(),
            ));
        } else {
            segments.push(Segment::Literal(part.to_string()));
        }
    }

    Ok((segments, named))
}

/// Normalises an incoming request path the same way a template is
/// normalised, so that `/a/b` and `/a/b/` are matched identically.
pub(crate) fn normalize_path(path: &str) -> String {
    normalize(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_double_wildcard_followed_by_segment() {
        let err = parse("/a/**/b").unwrap_err();
        assert!(matches!(err, PathTemplateError::DoubleWildcardNotTerminal { .. }));
    }

    #[test]
    fn rejects_named_parameter_after_double_wildcard() {
        let err = parse("/a/**/:id").unwrap_err();
        assert!(matches!(err, PathTemplateError::DoubleWildcardNotTerminal { .. }));
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = parse("/:id/:id").unwrap_err();
        assert!(matches!(err, PathTemplateError::DuplicateName { .. }));
    }

    #[test]
    fn lone_double_wildcard_compiles() {
        let (segments, named) = parse("/**").unwrap();
        assert_eq!(segments, vec![Segment::Literal(String::new()), Segment::DoubleWildcard]);
        assert!(named.is_empty());
    }

    #[test]
    fn alternation_segment_is_split() {
        let (segments, _) = parse("/v1|v2/x").unwrap();
        assert_eq!(
            segments[1],
            Segment::Alternation(vec!["v1".to_string(), "v2".to_string()])
        );
    }
}
