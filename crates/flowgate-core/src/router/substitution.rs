//! `:name` path-template rendering, used to rewrite a matched request's path
//! into the configured upstream path before forwarding.

use crate::path::NamedParameters;

/// A literal string containing `:name` placeholders, e.g.
/// `/v1/accounts/:id/orders`. Rendering substitutes every occurrence of
/// `:name` with the bound value from a [`NamedParameters`] map.
#[derive(Debug, Clone)]
pub struct ColonTemplate(String);

impl ColonTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Replaces every `:name` occurrence with its bound value. Unbound names
    /// are left untouched, matching the source behaviour of only replacing
    /// what was actually captured.
    pub fn render(&self, params: &NamedParameters) -> String {
        let mut result = self.0.clone();
        for (name, value) in params {
            result = result.replace(&format!(":{name}"), value);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_all_occurrences_of_each_name() {
        let tpl = ColonTemplate::new("/v1/:tenant/orders/:id/:tenant-copy");
        let mut params = NamedParameters::new();
        params.insert("tenant".to_string(), "acme".to_string());
        params.insert("id".to_string(), "7".to_string());
        assert_eq!(
            tpl.render(&params),
            "/v1/acme/orders/7/acme-copy"
        );
    }

    #[test]
    fn leaves_unbound_placeholders_untouched() {
        let tpl = ColonTemplate::new("/v1/:missing");
        let params = NamedParameters::new();
        assert_eq!(tpl.render(&params), "/v1/:missing");
    }
}
