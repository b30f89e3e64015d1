//! Authentication result handed to the account system.

use serde::{Deserialize, Serialize};

use crate::account::Account;
use crate::attribute::ExtractedAttributes;
use crate::linker::LinkOutcome;

/// Data carried between `after_authenticate` and `after_create_account`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraData {
    /// The external user id the binding is written for.
    pub external_user_id: String,
}

/// Outcome of one login attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationResult {
    /// The matched local account, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bound_account: Option<Account>,

    /// Display name, falling back to the email.
    pub name: String,

    /// Suggested username, falling back to the email.
    pub username: String,

    /// Email address.
    pub email: String,

    /// Whether the email may be treated as verified.
    pub email_valid: bool,

    /// Group memberships.
    #[serde(default)]
    pub groups: Vec<String>,

    /// Data for finalizing the binding after account creation.
    pub extra_data: ExtraData,
}

impl AuthenticationResult {
    /// Returns `true` if the login matched an existing account.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.bound_account.is_some()
    }

    /// Returns `true` if the account system must create an account.
    #[must_use]
    pub fn needs_account_creation(&self) -> bool {
        self.bound_account.is_none()
    }
}

/// Assembles the result of a login attempt.
///
/// `email` is the already validated, non-blank address and
/// `external_user_id` the effective binding key.
#[must_use]
pub fn build_result(
    attributes: &ExtractedAttributes,
    email: &str,
    external_user_id: &str,
    outcome: LinkOutcome,
    email_verified: bool,
) -> AuthenticationResult {
    let bound_account = match outcome {
        LinkOutcome::BoundExisting { account, .. } => Some(account),
        LinkOutcome::NeedsAccountCreation => None,
    };

    AuthenticationResult {
        bound_account,
        name: attributes
            .display_name()
            .unwrap_or_else(|| email.to_string()),
        username: attributes.username().unwrap_or_else(|| email.to_string()),
        email: email.to_string(),
        email_valid: !email.trim().is_empty() && email_verified,
        groups: attributes.groups(),
        extra_data: ExtraData {
            external_user_id: external_user_id.to_string(),
        },
    }
}
