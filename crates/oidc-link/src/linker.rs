//! Identity linking.
//!
//! # Overview
//!
//! For a given external user id the linker decides between:
//!
//! 1. **Existing binding** - the id is already bound to a live account.
//! 2. **Link by email** - no usable binding, `email_verified` is on and an
//!    account with the same normalized email exists. The binding is written.
//! 3. **Account creation** - anything else. The account system creates an
//!    account and calls [`IdentityLinker::finalize`] afterwards.
//!
//! Store errors are never swallowed: an uncertain binding state aborts the
//! attempt.

use std::fmt;
use std::sync::Arc;

use crate::account::{Account, AccountStore, normalize_email};
use crate::attribute::Attribute;
use crate::binding::{BindingStore, IdentityBinding};
use crate::config::SettingsHandle;
use crate::error::{LinkError, LinkResult};

/// How an existing account was matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkAction {
    /// The external id was already bound to the account.
    ExistingBinding,

    /// The account was found by email and a binding was written.
    LinkedByEmail,
}

impl LinkAction {
    /// Returns `true` if a binding was written during this attempt.
    #[must_use]
    pub fn is_linked(&self) -> bool {
        matches!(self, Self::LinkedByEmail)
    }
}

impl fmt::Display for LinkAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExistingBinding => write!(f, "existing_binding"),
            Self::LinkedByEmail => write!(f, "linked_by_email"),
        }
    }
}

/// Terminal state of binding resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    /// The external identity is bound to a live local account.
    BoundExisting {
        /// The bound account.
        account: Account,
        /// How the account was matched.
        action: LinkAction,
    },

    /// No account could be matched; the account system must create one.
    NeedsAccountCreation,
}

impl LinkOutcome {
    /// Returns the bound account, if any.
    #[must_use]
    pub fn account(&self) -> Option<&Account> {
        match self {
            Self::BoundExisting { account, .. } => Some(account),
            Self::NeedsAccountCreation => None,
        }
    }

    /// Returns `true` if the account system must create an account.
    #[must_use]
    pub fn needs_account_creation(&self) -> bool {
        matches!(self, Self::NeedsAccountCreation)
    }
}

/// Resolves external identities to local accounts.
pub struct IdentityLinker {
    accounts: Arc<dyn AccountStore>,
    bindings: Arc<dyn BindingStore>,
    settings: SettingsHandle,
}

impl IdentityLinker {
    /// Creates a new linker.
    #[must_use]
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        bindings: Arc<dyn BindingStore>,
        settings: SettingsHandle,
    ) -> Self {
        Self {
            accounts,
            bindings,
            settings,
        }
    }

    /// Resolves the binding for `external_user_id`.
    ///
    /// `email` is only consulted when no live binding exists and
    /// `email_verified` is enabled.
    ///
    /// # Errors
    ///
    /// Returns `MissingAttribute(ExternalUserId)` for a blank id, and
    /// propagates account and binding store errors.
    pub async fn resolve(&self, external_user_id: &str, email: &str) -> LinkResult<LinkOutcome> {
        if external_user_id.trim().is_empty() {
            return Err(LinkError::MissingAttribute(Attribute::ExternalUserId));
        }

        let stale = match self.bindings.get(external_user_id).await? {
            Some(binding) => match self.accounts.find_by_id(binding.account_id).await? {
                Some(account) => {
                    tracing::debug!(
                        external_user_id,
                        account_id = %account.id,
                        "Found existing identity binding"
                    );
                    return Ok(LinkOutcome::BoundExisting {
                        account,
                        action: LinkAction::ExistingBinding,
                    });
                }
                None => {
                    tracing::warn!(
                        external_user_id,
                        account_id = %binding.account_id,
                        "Identity binding points to a missing account"
                    );
                    Some(binding)
                }
            },
            None => None,
        };

        if !self.settings.load().email_verified {
            tracing::debug!(
                external_user_id,
                "Email is not trusted, account creation required"
            );
            return Ok(LinkOutcome::NeedsAccountCreation);
        }

        let Some(account) = self.accounts.find_by_email(&normalize_email(email)).await? else {
            tracing::debug!(external_user_id, "No account with matching email");
            return Ok(LinkOutcome::NeedsAccountCreation);
        };

        if let Some(stale) = stale {
            tracing::warn!(
                external_user_id,
                old_account_id = %stale.account_id,
                new_account_id = %account.id,
                "Overwriting stale identity binding"
            );
        }

        self.bindings
            .set(IdentityBinding::new(external_user_id, account.id))
            .await?;
        tracing::info!(
            external_user_id,
            account_id = %account.id,
            "Linked external identity by email"
        );

        Ok(LinkOutcome::BoundExisting {
            account,
            action: LinkAction::LinkedByEmail,
        })
    }

    /// Binds `external_user_id` to a newly created account.
    ///
    /// # Errors
    ///
    /// Returns `MissingAttribute(ExternalUserId)` for a blank id,
    /// `BindingConflict` if the id is already bound to another live account,
    /// and propagates account and binding store errors.
    pub async fn finalize(
        &self,
        external_user_id: &str,
        account: &Account,
    ) -> LinkResult<IdentityBinding> {
        if external_user_id.trim().is_empty() {
            return Err(LinkError::MissingAttribute(Attribute::ExternalUserId));
        }

        if let Some(existing) = self.bindings.get(external_user_id).await? {
            if existing.account_id == account.id {
                tracing::debug!(
                    external_user_id,
                    account_id = %account.id,
                    "Identity binding already in place"
                );
                return Ok(existing);
            }

            if self.accounts.find_by_id(existing.account_id).await?.is_some() {
                tracing::warn!(
                    external_user_id,
                    bound_account_id = %existing.account_id,
                    requested_account_id = %account.id,
                    "Refusing to rebind external identity bound to a live account"
                );
                return Err(LinkError::BindingConflict {
                    external_user_id: external_user_id.to_string(),
                    bound: existing.account_id,
                    requested: account.id,
                });
            }

            tracing::warn!(
                external_user_id,
                old_account_id = %existing.account_id,
                new_account_id = %account.id,
                "Overwriting stale identity binding"
            );
        }

        let binding = IdentityBinding::new(external_user_id, account.id);
        self.bindings.set(binding.clone()).await?;
        tracing::info!(
            external_user_id,
            account_id = %account.id,
            "Bound external identity to new account"
        );
        Ok(binding)
    }
}
