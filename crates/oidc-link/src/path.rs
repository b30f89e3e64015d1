//! Dotted attribute paths and the path resolver.
//!
//! An attribute path such as `profile.:groups_claim` walks nested mappings one
//! segment at a time. A segment starting with `:` is an indirection: its name
//! is looked up as the setting `oidc_<name>` and the setting's value is used as
//! the key. This lets a deployment rename a claim without touching the path
//! itself.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

use crate::document::Document;

/// Marker that introduces an indirection segment.
pub const INDIRECTION_MARKER: char = ':';

/// Prefix applied to indirection segment names before the setting lookup.
pub const SETTING_PREFIX: &str = "oidc_";

/// Source of named settings for indirection segments.
pub trait SettingLookup {
    /// Returns the value of the setting with the given full name.
    fn setting(&self, name: &str) -> Option<String>;
}

impl SettingLookup for HashMap<String, String> {
    fn setting(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// One segment of an [`AttributePath`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Literal mapping key.
    Key(String),
    /// Name of a setting whose value is the mapping key.
    Setting(String),
}

impl PathSegment {
    fn parse(raw: &str) -> Self {
        match raw.strip_prefix(INDIRECTION_MARKER) {
            Some(name) => Self::Setting(name.to_string()),
            None => Self::Key(raw.to_string()),
        }
    }

    /// Returns the key this segment stands for, consulting `settings` for
    /// indirection segments.
    fn effective_key<'a>(&'a self, settings: &dyn SettingLookup) -> Option<Cow<'a, str>> {
        match self {
            Self::Key(key) => Some(Cow::Borrowed(key.as_str())),
            Self::Setting(name) => {
                let setting = format!("{SETTING_PREFIX}{name}");
                match settings.setting(&setting) {
                    Some(value) if !value.trim().is_empty() => Some(Cow::Owned(value)),
                    _ => {
                        tracing::warn!(setting = %setting, "Indirect path segment refers to an unset setting");
                        None
                    }
                }
            }
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Setting(name) => write!(f, "{INDIRECTION_MARKER}{name}"),
        }
    }
}

/// A configured dotted path into a claims or userinfo document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributePath {
    segments: Vec<PathSegment>,
}

impl AttributePath {
    /// Parses a dotted path. A blank string yields an empty path.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return Self::default();
        }

        Self {
            segments: raw.split('.').map(PathSegment::parse).collect(),
        }
    }

    /// Creates a path from already parsed segments.
    #[must_use]
    pub fn from_segments(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }

    /// Returns the segments of this path.
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Returns `true` if the path has no segments (not configured).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

/// Resolves `path` against `document`.
///
/// Returns `None` for an empty path, when an intermediate value is not a
/// mapping, when a key is missing, or when an indirection setting is unset.
/// Walking stops early at a blank value, which is returned as-is.
///
/// Indirection settings are read on every call.
#[must_use]
pub fn resolve<'d>(
    document: &'d Document,
    path: &AttributePath,
    settings: &dyn SettingLookup,
) -> Option<&'d Document> {
    walk(document, path.segments(), settings)
}

fn walk<'d>(
    fragment: &'d Document,
    segments: &[PathSegment],
    settings: &dyn SettingLookup,
) -> Option<&'d Document> {
    let (first, rest) = segments.split_first()?;
    let mapping = fragment.as_mapping()?;

    let key = first.effective_key(settings)?;
    if key.is_empty() {
        return None;
    }

    let value = mapping.get(&key)?;
    tracing::trace!(segment = %first, key = %key, "Dereferenced path segment");

    if rest.is_empty() || value.is_blank() {
        return Some(value);
    }

    walk(value, rest, settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentKey, Mapping};
    use serde_json::json;

    fn no_settings() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    fn test_parse_path() {
        let path = AttributePath::parse("profile.:groups_claim.name");
        assert_eq!(
            path.segments(),
            &[
                PathSegment::Key("profile".to_string()),
                PathSegment::Setting("groups_claim".to_string()),
                PathSegment::Key("name".to_string()),
            ]
        );
        assert_eq!(path.to_string(), "profile.:groups_claim.name");
    }

    #[test]
    fn test_parse_blank_path_is_empty() {
        assert!(AttributePath::parse("").is_empty());
        assert!(AttributePath::parse("   ").is_empty());
        assert!(!AttributePath::parse("email").is_empty());
    }

    #[test]
    fn test_empty_path_resolves_to_absent() {
        let doc = Document::from(json!({"email": "a@x.com"}));
        assert!(resolve(&doc, &AttributePath::default(), &no_settings()).is_none());
    }

    #[test]
    fn test_absent_document_resolves_to_absent() {
        let path = AttributePath::parse("email");
        assert!(resolve(&Document::Absent, &path, &no_settings()).is_none());
    }

    #[test]
    fn test_single_segment_is_direct_lookup() {
        let doc = Document::from(json!({"email": "a@x.com"}));
        let found = resolve(&doc, &AttributePath::parse("email"), &no_settings());
        assert_eq!(found.and_then(Document::as_str), Some("a@x.com"));

        let missing = resolve(&doc, &AttributePath::parse("nickname"), &no_settings());
        assert!(missing.is_none());
    }

    #[test]
    fn test_single_segment_finds_symbol_key() {
        let mut mapping = Mapping::new();
        mapping.insert(DocumentKey::symbol("nickname"), Document::from("az"));
        let doc = Document::Mapping(mapping);

        let found = resolve(&doc, &AttributePath::parse("nickname"), &no_settings());
        assert_eq!(found.and_then(Document::as_str), Some("az"));
    }

    #[test]
    fn test_nested_path() {
        let doc = Document::from(json!({"profile": {"contact": {"email": "a@x.com"}}}));
        let found = resolve(&doc, &AttributePath::parse("profile.contact.email"), &no_settings());
        assert_eq!(found.and_then(Document::as_str), Some("a@x.com"));
    }

    #[test]
    fn test_nested_path_through_symbolized_document() {
        let doc = Document::from(json!({"profile": {"email": "a@x.com"}})).symbolize();
        let found = resolve(&doc, &AttributePath::parse("profile.email"), &no_settings());
        assert_eq!(found.and_then(Document::as_str), Some("a@x.com"));
    }

    #[test]
    fn test_non_mapping_intermediate_is_absent() {
        let doc = Document::from(json!({"profile": "flat", "list": [{"email": "x"}]}));
        assert!(resolve(&doc, &AttributePath::parse("profile.email"), &no_settings()).is_none());
        assert!(resolve(&doc, &AttributePath::parse("list.email"), &no_settings()).is_none());
    }

    #[test]
    fn test_blank_intermediate_stops_walk() {
        let doc = Document::from(json!({"profile": null, "extra": ""}));

        let found = resolve(&doc, &AttributePath::parse("profile.email"), &no_settings());
        assert_eq!(found, Some(&Document::Absent));

        let found = resolve(&doc, &AttributePath::parse("extra.email"), &no_settings());
        assert!(found.is_some_and(Document::is_blank));
    }

    #[test]
    fn test_empty_literal_segment_is_absent() {
        let doc = Document::from(json!({"a": {"b": "c"}}));
        assert!(resolve(&doc, &AttributePath::parse("a..b"), &no_settings()).is_none());
    }

    #[test]
    fn test_indirection_uses_configured_key() {
        let doc = Document::from(json!({
            "roles": ["admins"],
            "memberOf": ["staff"]
        }));
        let path = AttributePath::parse(":groups_claim");

        for (configured, expected) in [("roles", "admins"), ("memberOf", "staff")] {
            let settings =
                HashMap::from([("oidc_groups_claim".to_string(), configured.to_string())]);
            let found = resolve(&doc, &path, &settings)
                .and_then(Document::as_sequence)
                .and_then(|items| items.first())
                .and_then(Document::as_str);
            assert_eq!(found, Some(expected));
        }
    }

    #[test]
    fn test_indirection_in_nested_segment() {
        let doc = Document::from(json!({"realm_access": {"roles": ["ops"]}}));
        let settings = HashMap::from([("oidc_roles_key".to_string(), "roles".to_string())]);

        let found = resolve(&doc, &AttributePath::parse("realm_access.:roles_key"), &settings);
        assert_eq!(found, Some(&Document::from(json!(["ops"]))));
    }

    #[test]
    fn test_indirection_with_unset_setting_is_absent() {
        let doc = Document::from(json!({"groups": ["a"]}));
        assert!(resolve(&doc, &AttributePath::parse(":groups_claim"), &no_settings()).is_none());

        let blank = HashMap::from([("oidc_groups_claim".to_string(), " ".to_string())]);
        assert!(resolve(&doc, &AttributePath::parse(":groups_claim"), &blank).is_none());
    }
}
