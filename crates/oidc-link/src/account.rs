//! Local accounts as seen by the identity linker.
//!
//! The account system owns accounts; the linker only looks them up by email
//! (for linking) and by id (to check that a binding still points to a live
//! account).

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::LinkResult;

/// Identifier of a local account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub i64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for AccountId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A local account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account id.
    pub id: AccountId,
    /// Login name.
    pub username: String,
    /// Primary email address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Account {
    /// Creates an account without an email address.
    #[must_use]
    pub fn new(id: impl Into<AccountId>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            email: None,
        }
    }

    /// Sets the email address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Normalizes an email address for comparison.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Read access to local accounts.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Finds an account by email address.
    ///
    /// Implementations must compare normalized addresses.
    async fn find_by_email(&self, email: &str) -> LinkResult<Option<Account>>;

    /// Finds an account by id. Returns `None` for deleted accounts.
    async fn find_by_id(&self, id: AccountId) -> LinkResult<Option<Account>>;
}

/// In-memory account store.
#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    accounts: RwLock<HashMap<AccountId, Account>>,
}

impl MemoryAccountStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an account.
    pub async fn insert(&self, account: Account) {
        self.accounts.write().await.insert(account.id, account);
    }

    /// Removes an account, returning it if it existed.
    pub async fn remove(&self, id: AccountId) -> Option<Account> {
        self.accounts.write().await.remove(&id)
    }

    /// Returns the number of accounts.
    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }

    /// Returns `true` if the store holds no accounts.
    pub async fn is_empty(&self) -> bool {
        self.accounts.read().await.is_empty()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn find_by_email(&self, email: &str) -> LinkResult<Option<Account>> {
        let wanted = normalize_email(email);
        if wanted.is_empty() {
            return Ok(None);
        }
        let accounts = self.accounts.read().await;
        Ok(accounts
            .values()
            .find(|account| {
                account
                    .email
                    .as_deref()
                    .is_some_and(|e| normalize_email(e) == wanted)
            })
            .cloned())
    }

    async fn find_by_id(&self, id: AccountId) -> LinkResult<Option<Account>> {
        Ok(self.accounts.read().await.get(&id).cloned())
    }
}
