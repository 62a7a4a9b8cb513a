//! Method-grouped route table: registration, conflict detection, dispatch.

pub mod substitution;

use std::collections::HashMap;
use std::fmt;

use crate::path::{CompiledMatcher, NamedParameters, PathTemplateError};

/// HTTP methods a route may be registered under. Any other method is
/// rejected at registration time with [`RouterError::MethodNotAllowed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "PATCH" => Some(Self::Patch),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("method '{0}' is not allowed; only GET, POST, PUT, PATCH, DELETE are accepted")]
    MethodNotAllowed(String),
    #[error("invalid path template '{template}': {source}")]
    InvalidTemplate {
        template: String,
        #[source]
        source: PathTemplateError,
    },
    #[error(
        "handler is already registered for {method} {template}, it matches the existing route {existing}"
    )]
    Conflict {
        method: Method,
        template: String,
        existing: String,
    },
}

/// One registered route: the method it answers, its compiled matcher, and
/// an opaque handler value `H` (a boxed async handler closure in production,
/// a plain value in tests).
pub struct Route<H> {
    template: String,
    matcher: CompiledMatcher,
    handler: H,
}

impl<H> Route<H> {
    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }
}

/// A method-grouped table of [`Route`]s. Dispatch walks routes for the
/// request's method in registration order and returns the first whose
/// matcher accepts the path; this makes dispatch order equal to
/// registration order, as required by SPEC_FULL.md §8.
///
/// Registration is rejected if the new template would already be matched
/// by an existing route for the same method. The probe deliberately reuses
/// the *new* template's own literal text as a stand-in path against the
/// already-registered matchers — this faithfully reproduces a known
/// limitation of the system this router is modelled on: a new template
/// that itself contains wildcard characters can fail to match its own
/// literal text as a probe, and so register without a detected conflict
/// even though it could subsequently shadow or be shadowed by the existing
/// route at request time. This is not fixed here; see DESIGN.md.
pub struct Router<H> {
    routes: HashMap<Method, Vec<Route<H>>>,
}

impl<H> Default for Router<H> {
    fn default() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }
}

impl<H> Router<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, path: &str, handler: H) -> Result<(), RouterError> {
        self.handle(Method::Get, path, handler)
    }

    pub fn post(&mut self, path: &str, handler: H) -> Result<(), RouterError> {
        self.handle(Method::Post, path, handler)
    }

    pub fn put(&mut self, path: &str, handler: H) -> Result<(), RouterError> {
        self.handle(Method::Put, path, handler)
    }

    pub fn patch(&mut self, path: &str, handler: H) -> Result<(), RouterError> {
        self.handle(Method::Patch, path, handler)
    }

    pub fn delete(&mut self, path: &str, handler: H) -> Result<(), RouterError> {
        self.handle(Method::Delete, path, handler)
    }

    /// Registers `handler` for `method`/`path`. Fails on an unsupported
    /// method, an invalid template, or a conflict with an already
    /// registered route for the same method.
    pub fn handle(&mut self, method: Method, path: &str, handler: H) -> Result<(), RouterError> {
        if let Some(existing) = self.match_route(method, path) {
            return Err(RouterError::Conflict {
                method,
                template: path.to_string(),
                existing: existing.template.clone(),
            });
        }
        let matcher =
            CompiledMatcher::compile(path).map_err(|source| RouterError::InvalidTemplate {
                template: path.to_string(),
                source,
            })?;
        self.routes.entry(method).or_default().push(Route {
            template: path.to_string(),
            matcher,
            handler,
        });
        Ok(())
    }

    /// Dispatches a request: returns the first matching route's handler and
    /// the named parameters captured from `path`, or `None` if no route for
    /// `method` matches (the caller should answer 404).
    pub fn dispatch(&self, method: Method, path: &str) -> Option<(&H, NamedParameters)> {
        let route = self.match_route(method, path)?;
        let params = route.matcher.retrieve_parameters(path);
        Some((&route.handler, params))
    }

    fn match_route(&self, method: Method, path: &str) -> Option<&Route<H>> {
        self.routes
            .get(&method)?
            .iter()
            .find(|route| route.matcher.is_match(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsupported_method_text() {
        assert!(Method::parse("TRACE").is_none());
        assert!(Method::parse("get").is_some());
    }

    #[test]
    fn dispatch_order_equals_registration_order() {
        let mut router: Router<&'static str> = Router::new();
        router.get("/a/:id", "first").unwrap();
        router.get("/other", "second").unwrap();
        let (handler, params) = router.dispatch(Method::Get, "/a/42").unwrap();
        assert_eq!(*handler, "first");
        assert_eq!(params.get("id"), Some(&"42".to_string()));
    }

    #[test]
    fn conflicting_registration_is_rejected() {
        let mut router: Router<&'static str> = Router::new();
        router.get("/a/b", "first").unwrap();
        let err = router.get("/a/b", "second").unwrap_err();
        assert!(matches!(err, RouterError::Conflict { .. }));
    }

    #[test]
    fn dispatch_returns_none_for_unmatched_path() {
        let mut router: Router<&'static str> = Router::new();
        router.get("/a/b", "first").unwrap();
        assert!(router.dispatch(Method::Get, "/does/not/exist").is_none());
    }
}
