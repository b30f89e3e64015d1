//! Attribute extraction from claims and userinfo documents.
//!
//! # Overview
//!
//! 1. **Claims** - every configured attribute is resolved against the claims
//!    embedded in the token.
//! 2. **Userinfo** - only if something is still missing, the userinfo document
//!    is fetched once and the missing attributes are resolved against it.
//!
//! Attributes found in the claims are never replaced by userinfo values.

use std::future::Future;

use crate::attribute::{Attribute, AttributeSource, ExtractedAttributes};
use crate::config::{OidcSettings, SettingsHandle};
use crate::document::Document;
use crate::error::LinkResult;
use crate::path::{self, AttributePath};

/// Resolves logical attributes from the identity provider documents.
pub struct AttributeExtractor {
    settings: SettingsHandle,
}

impl AttributeExtractor {
    /// Creates an extractor reading attribute paths from `settings`.
    #[must_use]
    pub fn new(settings: SettingsHandle) -> Self {
        Self { settings }
    }

    /// Extracts all configured attributes.
    ///
    /// `fetch_user_info` is called at most once, and only when at least one
    /// configured attribute is missing from `claims`. Attributes without a
    /// configured path are skipped entirely.
    ///
    /// # Errors
    ///
    /// Propagates any error returned by `fetch_user_info`.
    pub async fn extract<F, Fut>(
        &self,
        claims: &Document,
        fetch_user_info: F,
    ) -> LinkResult<ExtractedAttributes>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = LinkResult<Document>>,
    {
        let settings = self.settings.load_full();
        let configured = configured_paths(&settings);
        let mut extracted = ExtractedAttributes::new();

        let pending = collect(
            &mut extracted,
            claims,
            configured,
            AttributeSource::Claims,
            &settings,
        );

        if pending.is_empty() {
            tracing::debug!("All configured attributes found in claims, skipping userinfo");
            return Ok(extracted);
        }

        tracing::debug!(
            missing = ?pending.iter().map(|(a, _)| a.as_str()).collect::<Vec<_>>(),
            "Fetching userinfo document for missing attributes"
        );
        let user_info = fetch_user_info().await?;

        let pending = if user_info.is_blank() {
            tracing::debug!("Userinfo document is empty");
            pending
        } else {
            collect(
                &mut extracted,
                &user_info,
                pending,
                AttributeSource::UserInfo,
                &settings,
            )
        };

        if !pending.is_empty() {
            tracing::debug!(
                unresolved = ?pending.iter().map(|(a, _)| a.as_str()).collect::<Vec<_>>(),
                "Some attributes were not found in claims or userinfo"
            );
        }

        Ok(extracted)
    }
}

/// Parses the configured path of every attribute, skipping unconfigured ones.
///
/// An attribute with a blank path is left out of extraction altogether. It
/// is not treated as missing, so it never forces a userinfo fetch.
fn configured_paths(settings: &OidcSettings) -> Vec<(Attribute, AttributePath)> {
    Attribute::ALL
        .into_iter()
        .filter_map(|attribute| {
            let path = AttributePath::parse(settings.path_for(attribute));
            if path.is_empty() {
                tracing::trace!(attribute = %attribute, "No path configured");
                None
            } else {
                Some((attribute, path))
            }
        })
        .collect()
}

/// Returns `true` if `value` has a shape the attribute can be read from.
///
/// Groups take a sequence or a comma separated string, every other
/// attribute takes a scalar.
fn has_usable_shape(attribute: Attribute, value: &Document) -> bool {
    match attribute {
        Attribute::Groups => value.as_sequence().is_some() || value.to_scalar_string().is_some(),
        _ => value.to_scalar_string().is_some(),
    }
}

/// Resolves `pending` against `document`, recording non-blank values of a
/// usable shape. Anything else stays pending.
///
/// Returns the attributes that are still missing.
fn collect(
    extracted: &mut ExtractedAttributes,
    document: &Document,
    pending: Vec<(Attribute, AttributePath)>,
    source: AttributeSource,
    settings: &OidcSettings,
) -> Vec<(Attribute, AttributePath)> {
    pending
        .into_iter()
        .filter(|(attribute, path)| {
            match path::resolve(document, path, settings).filter(|value| !value.is_blank()) {
                Some(value) if !has_usable_shape(*attribute, value) => {
                    tracing::debug!(
                        attribute = %attribute,
                        source = ?source,
                        "Attribute has an unusable shape, treating it as not found"
                    );
                    true
                }
                Some(value) => {
                    tracing::debug!(attribute = %attribute, source = ?source, "Attribute found");
                    extracted.insert_if_absent(*attribute, value.clone(), source);
                    false
                }
                None => {
                    tracing::debug!(attribute = %attribute, source = ?source, "Attribute not found");
                    true
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings_handle;
    use crate::error::LinkError;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn extractor(settings: OidcSettings) -> AttributeExtractor {
        AttributeExtractor::new(settings_handle(settings))
    }

    #[tokio::test]
    async fn test_claims_only_skips_fetch() {
        let extractor = extractor(
            OidcSettings::new()
                .with_path(Attribute::ExternalUserId, "sub")
                .with_path(Attribute::Username, "nickname")
                .with_path(Attribute::DisplayName, "name")
                .with_path(Attribute::Email, "email")
                .with_path(Attribute::Groups, "groups"),
        );
        let claims = Document::from(json!({
            "sub": "u1",
            "nickname": "az",
            "name": "A Z",
            "email": "a@x.com",
            "groups": ["admins"]
        }));
        let calls = AtomicUsize::new(0);

        let extracted = extractor
            .extract(&claims, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Document::Absent)
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(extracted.len(), 5);
        assert_eq!(extracted.username(), Some("az".to_string()));
        assert_eq!(extracted.groups(), vec!["admins"]);
    }

    #[tokio::test]
    async fn test_missing_attribute_fetches_once() {
        let extractor = extractor(OidcSettings::new().with_path(Attribute::Groups, "groups"));
        let claims = Document::from(json!({
            "sub": "u1",
            "preferred_username": "az",
            "name": "A Z",
            "email": "a@x.com"
        }));
        let calls = AtomicUsize::new(0);

        let extracted = extractor
            .extract(&claims, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Document::from(json!({"groups": ["admins"]})))
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(extracted.groups(), vec!["admins"]);
        assert_eq!(extracted.source(Attribute::Groups), Some(AttributeSource::UserInfo));
        assert_eq!(extracted.source(Attribute::Email), Some(AttributeSource::Claims));
    }

    #[tokio::test]
    async fn test_claims_values_are_not_overwritten() {
        let extractor = extractor(OidcSettings::new().with_path(Attribute::Groups, "groups"));
        let claims = Document::from(json!({"sub": "u1", "email": "claims@x.com"}));

        let extracted = extractor
            .extract(&claims, || async {
                Ok(Document::from(json!({
                    "sub": "other",
                    "email": "userinfo@x.com",
                    "preferred_username": "from-userinfo",
                    "groups": ["g"]
                })))
            })
            .await
            .unwrap();

        assert_eq!(extracted.external_user_id(), Some("u1".to_string()));
        assert_eq!(extracted.email(), Some("claims@x.com".to_string()));
        assert_eq!(extracted.username(), Some("from-userinfo".to_string()));
    }

    #[tokio::test]
    async fn test_blank_claim_counts_as_missing() {
        let extractor = extractor(OidcSettings::new());
        let claims = Document::from(json!({
            "sub": "u1",
            "preferred_username": "az",
            "name": "A Z",
            "email": "  "
        }));

        let extracted = extractor
            .extract(&claims, || async { Ok(Document::from(json!({"email": "a@x.com"}))) })
            .await
            .unwrap();

        assert_eq!(extracted.email(), Some("a@x.com".to_string()));
        assert_eq!(extracted.source(Attribute::Email), Some(AttributeSource::UserInfo));
    }

    #[tokio::test]
    async fn test_non_scalar_claim_counts_as_missing() {
        let extractor = extractor(OidcSettings::new());
        let claims = Document::from(json!({
            "sub": "u1",
            "preferred_username": "az",
            "name": "A Z",
            "email": {"primary": "a@x.com"}
        }));

        let extracted = extractor
            .extract(&claims, || async { Ok(Document::from(json!({"email": "b@x.com"}))) })
            .await
            .unwrap();

        assert_eq!(extracted.email(), Some("b@x.com".to_string()));
        assert_eq!(extracted.source(Attribute::Email), Some(AttributeSource::UserInfo));
    }

    #[test]
    fn test_usable_shapes() {
        let list = Document::from(json!(["a", "b"]));
        let text = Document::from("a,b");
        let nested = Document::from(json!({"primary": "a@x.com"}));

        assert!(has_usable_shape(Attribute::Groups, &list));
        assert!(has_usable_shape(Attribute::Groups, &text));
        assert!(!has_usable_shape(Attribute::Groups, &nested));
        assert!(has_usable_shape(Attribute::Email, &text));
        assert!(!has_usable_shape(Attribute::Email, &list));
        assert!(!has_usable_shape(Attribute::Email, &nested));
    }

    #[tokio::test]
    async fn test_unconfigured_attribute_does_not_trigger_fetch() {
        let extractor = extractor(
            OidcSettings::new()
                .with_path(Attribute::ExternalUserId, "")
                .with_path(Attribute::DisplayName, ""),
        );
        let claims = Document::from(json!({"preferred_username": "az", "email": "a@x.com"}));

        let extracted = extractor
            .extract(&claims, || async {
                Err(LinkError::configuration("fetch must not happen"))
            })
            .await
            .unwrap();

        assert!(extracted.external_user_id().is_none());
        assert!(extracted.display_name().is_none());
        assert_eq!(extracted.email(), Some("a@x.com".to_string()));
    }

    #[tokio::test]
    async fn test_unresolved_attributes_stay_absent() {
        let extractor = extractor(OidcSettings::new().with_path(Attribute::Groups, "groups"));
        let claims = Document::from(json!({"email": "a@x.com"}));

        let extracted = extractor
            .extract(&claims, || async { Ok(Document::from(json!({}))) })
            .await
            .unwrap();

        assert_eq!(extracted.len(), 1);
        assert!(extracted.groups().is_empty());
        assert!(extracted.username().is_none());
    }

    #[tokio::test]
    async fn test_fetch_error_is_propagated() {
        let extractor = extractor(OidcSettings::new());
        let claims = Document::from(json!({"sub": "u1"}));

        let result = extractor
            .extract(&claims, || async {
                Err(LinkError::UserInfoStatus { status: 503 })
            })
            .await;

        assert!(matches!(result, Err(LinkError::UserInfoStatus { status: 503 })));
    }

    #[tokio::test]
    async fn test_indirect_groups_path() {
        let extractor = extractor(
            OidcSettings::new()
                .with_path(Attribute::Groups, "realm_access.:groups_claim")
                .with_custom("groups_claim", "roles"),
        );
        let claims = Document::from(json!({
            "sub": "u1",
            "preferred_username": "az",
            "name": "A Z",
            "email": "a@x.com",
            "realm_access": {"roles": ["ops", "dev"]}
        }));

        let extracted = extractor
            .extract(&claims, || async { Ok(Document::Absent) })
            .await
            .unwrap();

        assert_eq!(extracted.groups(), vec!["ops", "dev"]);
    }

    #[tokio::test]
    async fn test_paths_follow_settings_changes() {
        let handle = settings_handle(OidcSettings::new().with_path(Attribute::Email, "email"));
        let extractor = AttributeExtractor::new(handle.clone());
        let claims = Document::from(json!({
            "sub": "u1",
            "preferred_username": "az",
            "name": "A Z",
            "email": "a@x.com",
            "mail": "other@x.com"
        }));

        let first = extractor
            .extract(&claims, || async { Ok(Document::Absent) })
            .await
            .unwrap();
        assert_eq!(first.email(), Some("a@x.com".to_string()));

        handle.store(std::sync::Arc::new(
            OidcSettings::new().with_path(Attribute::Email, "mail"),
        ));
        let second = extractor
            .extract(&claims, || async { Ok(Document::Absent) })
            .await
            .unwrap();
        assert_eq!(second.email(), Some("other@x.com".to_string()));
    }
}
