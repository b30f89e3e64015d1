//! Logical user attributes and the extraction result.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::document::Document;

/// A logical user attribute resolved from the identity provider documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    /// Stable external identifier of the user.
    ExternalUserId,
    /// Suggested local username.
    Username,
    /// Display name.
    DisplayName,
    /// Email address. Required for every login.
    Email,
    /// Group memberships.
    Groups,
}

impl Attribute {
    /// All attributes, in extraction order.
    pub const ALL: [Attribute; 5] = [
        Self::ExternalUserId,
        Self::Username,
        Self::DisplayName,
        Self::Email,
        Self::Groups,
    ];

    /// Short attribute name used in logs and setting names.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExternalUserId => "user_id",
            Self::Username => "username",
            Self::DisplayName => "name",
            Self::Email => "email",
            Self::Groups => "groups",
        }
    }

    /// Full name of the setting that holds this attribute's path.
    #[must_use]
    pub fn path_setting(&self) -> &'static str {
        match self {
            Self::ExternalUserId => "oidc_json_user_id_path",
            Self::Username => "oidc_json_username_path",
            Self::DisplayName => "oidc_json_name_path",
            Self::Email => "oidc_json_email_path",
            Self::Groups => "oidc_json_groups_path",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which document supplied an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeSource {
    /// The claims embedded in the token.
    Claims,
    /// The document fetched from the userinfo endpoint.
    UserInfo,
}

/// A resolved attribute value together with its source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedAttribute {
    /// The resolved, non-blank value.
    pub value: Document,
    /// The document it came from.
    pub source: AttributeSource,
}

/// Attributes extracted for one login attempt.
///
/// Values are only ever added; the first source to supply an attribute wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedAttributes {
    values: BTreeMap<Attribute, ResolvedAttribute>,
}

impl ExtractedAttributes {
    /// Creates an empty set of attributes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `value` for `attribute` unless a value is already present.
    ///
    /// Returns `true` if the value was recorded.
    pub fn insert_if_absent(
        &mut self,
        attribute: Attribute,
        value: Document,
        source: AttributeSource,
    ) -> bool {
        if self.values.contains_key(&attribute) {
            return false;
        }
        self.values
            .insert(attribute, ResolvedAttribute { value, source });
        true
    }

    /// Returns the raw value of an attribute.
    #[must_use]
    pub fn get(&self, attribute: Attribute) -> Option<&Document> {
        self.values.get(&attribute).map(|resolved| &resolved.value)
    }

    /// Returns the source of an attribute.
    #[must_use]
    pub fn source(&self, attribute: Attribute) -> Option<AttributeSource> {
        self.values.get(&attribute).map(|resolved| resolved.source)
    }

    /// Returns `true` if the attribute was resolved.
    #[must_use]
    pub fn contains(&self, attribute: Attribute) -> bool {
        self.values.contains_key(&attribute)
    }

    /// Returns the number of resolved attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if nothing was resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over the resolved attributes in extraction order.
    pub fn iter(&self) -> impl Iterator<Item = (Attribute, &ResolvedAttribute)> {
        self.values.iter().map(|(attribute, resolved)| (*attribute, resolved))
    }

    /// Returns a string-valued attribute, ignoring blank values.
    #[must_use]
    pub fn string(&self, attribute: Attribute) -> Option<String> {
        self.get(attribute)
            .and_then(Document::to_scalar_string)
            .filter(|s| !s.trim().is_empty())
    }

    /// External user id.
    #[must_use]
    pub fn external_user_id(&self) -> Option<String> {
        self.string(Attribute::ExternalUserId)
    }

    /// Suggested username.
    #[must_use]
    pub fn username(&self) -> Option<String> {
        self.string(Attribute::Username)
    }

    /// Display name.
    #[must_use]
    pub fn display_name(&self) -> Option<String> {
        self.string(Attribute::DisplayName)
    }

    /// Email address.
    #[must_use]
    pub fn email(&self) -> Option<String> {
        self.string(Attribute::Email)
    }

    /// Group memberships.
    ///
    /// Accepts a sequence of scalars or a comma-separated string.
    #[must_use]
    pub fn groups(&self) -> Vec<String> {
        let Some(value) = self.get(Attribute::Groups) else {
            return Vec::new();
        };

        if let Some(items) = value.as_sequence() {
            items
                .iter()
                .filter_map(Document::to_scalar_string)
                .filter(|g| !g.trim().is_empty())
                .collect()
        } else if let Some(s) = value.as_str() {
            s.split(',')
                .map(|g| g.trim().to_string())
                .filter(|g| !g.is_empty())
                .collect()
        } else {
            Vec::new()
        }
    }
}
