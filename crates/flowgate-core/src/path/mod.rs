//! Wildcard path templates: compilation, matching, and named-parameter capture.
//!
//! A [`PathTemplate`] string such as `/api/*/resource/:id/**` is compiled once
//! into a [`matcher::CompiledMatcher`] and then matched against many request
//! paths. See the module-level docs on `matcher` for the matching algorithm.

mod matcher;
mod template;

pub use matcher::{CompiledMatcher, NamedParameters};
pub use template::PathTemplateError;
