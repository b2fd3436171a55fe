use std::collections::HashSet;

use seoflow_core::PublishedPage;

/// What the gate knows about the site around a draft.
#[derive(Debug, Clone, Default)]
pub struct GateContext<'a> {
    /// Live pages of the same org, for duplicate-intent and doorway checks.
    pub published: &'a [PublishedPage],
    /// Internal paths that resolve, normalized without trailing slashes.
    pub known_urls: HashSet<String>,
    /// Recognized local entities for the draft's city.
    pub local_entities: &'a [String],
    /// City the draft targets, masked out by the doorway check.
    pub city: Option<&'a str>,
    pub primary_keyword: &'a str,
}

impl GateContext<'_> {
    #[must_use]
    pub fn is_known_url(&self, href: &str) -> bool {
        self.known_urls.contains(&normalize_path(href))
    }
}

/// Strips query, fragment, and a trailing slash; keeps the root as `/`.
#[must_use]
pub(crate) fn normalize_path(href: &str) -> String {
    let path = href
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim();
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_lowercase()
    }
}

impl<'a> GateContext<'a> {
    /// Builder-style constructor; `known_urls` are normalized on the way in.
    pub fn new(
        published: &'a [PublishedPage],
        known_urls: impl IntoIterator<Item = String>,
        local_entities: &'a [String],
        city: Option<&'a str>,
        primary_keyword: &'a str,
    ) -> Self {
        Self {
            published,
            known_urls: known_urls.into_iter().map(|u| normalize_path(&u)).collect(),
            local_entities,
            city,
            primary_keyword,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_compare_without_query_or_trailing_slash() {
        let ctx = GateContext::new(&[], ["/Austin/Airport/".to_string()], &[], None, "");
        assert!(ctx.is_known_url("/austin/airport?utm=1"));
        assert!(ctx.is_known_url("/austin/airport#top"));
        assert!(!ctx.is_known_url("/dallas"));
    }
}
