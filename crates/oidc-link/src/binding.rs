//! Persisted bindings between external identities and local accounts.
//!
//! A binding is stored under the key `oidc_basic_user_<external_user_id>` in
//! the `openid_connect` namespace of a generic key-value store. The external
//! user id is the only lookup and write key, so one external identity can
//! never map to more than one account.
//!
//! Records written by older deployments only carry `{"user_id": <id>}`; they
//! are still readable and get the external user id from the key.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::account::AccountId;
use crate::error::{LinkError, LinkResult};

/// Namespace that holds identity bindings.
pub const BINDING_NAMESPACE: &str = "openid_connect";

/// Prefix of binding keys.
pub const BINDING_KEY_PREFIX: &str = "oidc_basic_user_";

/// Returns the storage key for an external user id.
#[must_use]
pub fn binding_key(external_user_id: &str) -> String {
    format!("{BINDING_KEY_PREFIX}{external_user_id}")
}

/// A link from an external identity to a local account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityBinding {
    /// The identity provider's id for the user.
    #[serde(default)]
    pub external_user_id: String,

    /// The bound local account.
    #[serde(rename = "user_id")]
    pub account_id: AccountId,

    /// When the binding was written.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub linked_at: Option<OffsetDateTime>,
}

impl IdentityBinding {
    /// Creates a binding stamped with the current time.
    #[must_use]
    pub fn new(external_user_id: impl Into<String>, account_id: AccountId) -> Self {
        Self {
            external_user_id: external_user_id.into(),
            account_id,
            linked_at: Some(OffsetDateTime::now_utc()),
        }
    }

    /// Sets the linked_at timestamp.
    #[must_use]
    pub fn with_linked_at(mut self, linked_at: OffsetDateTime) -> Self {
        self.linked_at = Some(linked_at);
        self
    }
}

/// Storage for identity bindings.
///
/// Implementations must provide read-after-write consistency per key.
#[async_trait]
pub trait BindingStore: Send + Sync {
    /// Returns the binding for an external user id.
    async fn get(&self, external_user_id: &str) -> LinkResult<Option<IdentityBinding>>;

    /// Writes a binding, replacing any binding for the same external user id.
    async fn set(&self, binding: IdentityBinding) -> LinkResult<()>;
}

/// Namespaced JSON key-value storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads a value.
    async fn get(&self, namespace: &str, key: &str) -> LinkResult<Option<serde_json::Value>>;

    /// Writes a value.
    async fn set(&self, namespace: &str, key: &str, value: serde_json::Value) -> LinkResult<()>;
}

/// Binding store backed by a [`KeyValueStore`].
#[derive(Debug, Default)]
pub struct KeyValueBindingStore<S> {
    store: S,
}

impl<S: KeyValueStore> KeyValueBindingStore<S> {
    /// Wraps a key-value store.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the underlying key-value store.
    #[must_use]
    pub fn inner(&self) -> &S {
        &self.store
    }
}

#[async_trait]
impl<S: KeyValueStore> BindingStore for KeyValueBindingStore<S> {
    async fn get(&self, external_user_id: &str) -> LinkResult<Option<IdentityBinding>> {
        let key = binding_key(external_user_id);
        let Some(value) = self.store.get(BINDING_NAMESPACE, &key).await? else {
            return Ok(None);
        };

        let mut binding: IdentityBinding = serde_json::from_value(value).map_err(|e| {
            LinkError::binding_store(format!("Malformed binding record '{key}': {e}"))
        })?;
        if binding.external_user_id.is_empty() {
            binding.external_user_id = external_user_id.to_string();
        }
        Ok(Some(binding))
    }

    async fn set(&self, binding: IdentityBinding) -> LinkResult<()> {
        let key = binding_key(&binding.external_user_id);
        let value = serde_json::to_value(&binding)
            .map_err(|e| LinkError::binding_store(format!("Failed to encode binding: {e}")))?;
        self.store.set(BINDING_NAMESPACE, &key, value).await
    }
}

/// In-memory key-value store.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: RwLock<HashMap<(String, String), serde_json::Value>>,
}

impl MemoryKeyValueStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of entries in a namespace.
    pub async fn count(&self, namespace: &str) -> usize {
        self.entries
            .read()
            .await
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .count()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, namespace: &str, key: &str) -> LinkResult<Option<serde_json::Value>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(&(namespace.to_string(), key.to_string()))
            .cloned())
    }

    async fn set(&self, namespace: &str, key: &str, value: serde_json::Value) -> LinkResult<()> {
        self.entries
            .write()
            .await
            .insert((namespace.to_string(), key.to_string()), value);
        Ok(())
    }
}

/// Binding store kept in memory.
pub type MemoryBindingStore = KeyValueBindingStore<MemoryKeyValueStore>;

impl MemoryBindingStore {
    /// Creates an empty in-memory binding store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MemoryKeyValueStore::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn test_binding_key() {
        assert_eq!(binding_key("u1"), "oidc_basic_user_u1");
    }

    #[test]
    fn test_binding_serialization() {
        let binding = IdentityBinding::new("u1", AccountId(42))
            .with_linked_at(datetime!(2024-05-01 12:00 UTC));
        let json = serde_json::to_value(&binding).unwrap();

        assert_eq!(json["external_user_id"], "u1");
        assert_eq!(json["user_id"], 42);
        assert_eq!(json["linked_at"], "2024-05-01T12:00:00Z");
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let store = MemoryBindingStore::in_memory();
        assert!(store.get("u1").await.unwrap().is_none());

        store.set(IdentityBinding::new("u1", AccountId(42))).await.unwrap();
        let binding = store.get("u1").await.unwrap().unwrap();
        assert_eq!(binding.account_id, AccountId(42));
        assert_eq!(binding.external_user_id, "u1");
        assert!(binding.linked_at.is_some());

        let raw = store
            .inner()
            .get(BINDING_NAMESPACE, "oidc_basic_user_u1")
            .await
            .unwrap();
        assert!(raw.is_some());
    }

    #[tokio::test]
    async fn test_set_replaces_same_key() {
        let store = MemoryBindingStore::in_memory();
        store.set(IdentityBinding::new("u1", AccountId(1))).await.unwrap();
        store.set(IdentityBinding::new("u1", AccountId(2))).await.unwrap();

        assert_eq!(store.inner().count(BINDING_NAMESPACE).await, 1);
        assert_eq!(store.get("u1").await.unwrap().unwrap().account_id, AccountId(2));
    }

    #[tokio::test]
    async fn test_legacy_record_is_readable() {
        let kv = MemoryKeyValueStore::new();
        kv.set(BINDING_NAMESPACE, "oidc_basic_user_u1", json!({"user_id": 7}))
            .await
            .unwrap();
        let store = KeyValueBindingStore::new(kv);

        let binding = store.get("u1").await.unwrap().unwrap();
        assert_eq!(binding.external_user_id, "u1");
        assert_eq!(binding.account_id, AccountId(7));
        assert!(binding.linked_at.is_none());
    }

    #[tokio::test]
    async fn test_malformed_record_is_store_error() {
        let kv = MemoryKeyValueStore::new();
        kv.set(BINDING_NAMESPACE, "oidc_basic_user_u1", json!("garbage"))
            .await
            .unwrap();
        let store = KeyValueBindingStore::new(kv);

        let err = store.get("u1").await.unwrap_err();
        assert!(matches!(err, LinkError::BindingStore { .. }));
    }

    #[tokio::test]
    async fn test_namespaces_are_separate() {
        let kv = MemoryKeyValueStore::new();
        kv.set("other", "oidc_basic_user_u1", json!({"user_id": 1}))
            .await
            .unwrap();
        let store = KeyValueBindingStore::new(kv);

        assert!(store.get("u1").await.unwrap().is_none());
    }
}
