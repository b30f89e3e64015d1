//! Error types for attribute extraction and identity linking.
//!
//! Every failure surfaces to the caller of
//! [`OidcAuthenticator::after_authenticate`](crate::OidcAuthenticator::after_authenticate)
//! as a [`LinkError`]. Only a missing, non-required attribute is folded into
//! the result as an absent field.

use std::fmt;
use std::time::Duration;

use crate::account::AccountId;
use crate::attribute::Attribute;

/// Errors that can occur during a login attempt.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// A required attribute could not be resolved from either document.
    #[error("Missing required attribute: {0}")]
    MissingAttribute(Attribute),

    /// The userinfo request could not be sent or completed.
    #[error("Userinfo request failed: {0}")]
    UserInfoNetwork(#[source] reqwest::Error),

    /// The userinfo request exceeded the configured timeout.
    #[error("Userinfo request timed out after {0:?}")]
    UserInfoTimeout(Duration),

    /// The userinfo endpoint answered with a non-success status.
    #[error("Userinfo request failed: HTTP {status}")]
    UserInfoStatus {
        /// The HTTP status code.
        status: u16,
    },

    /// The userinfo response body is not valid JSON.
    #[error("Failed to parse userinfo response: {0}")]
    UserInfoParse(String),

    /// The OpenID Connect login is switched off.
    #[error("OpenID Connect authentication is disabled")]
    ProviderDisabled,

    /// Settings are missing or inconsistent.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// Reading or writing an identity binding failed.
    #[error("Binding store error: {message}")]
    BindingStore {
        /// Description of the storage error.
        message: String,
    },

    /// The external identity is already bound to a different live account.
    #[error("External identity '{external_user_id}' is already bound to account {bound}, refusing to bind account {requested}")]
    BindingConflict {
        /// The external user id.
        external_user_id: String,
        /// The account the identity is currently bound to.
        bound: AccountId,
        /// The account the caller tried to bind.
        requested: AccountId,
    },

    /// Looking up a local account failed.
    #[error("Account store error: {message}")]
    AccountStore {
        /// Description of the storage error.
        message: String,
    },
}

impl LinkError {
    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `BindingStore` error.
    #[must_use]
    pub fn binding_store(message: impl Into<String>) -> Self {
        Self::BindingStore {
            message: message.into(),
        }
    }

    /// Creates a new `AccountStore` error.
    #[must_use]
    pub fn account_store(message: impl Into<String>) -> Self {
        Self::AccountStore {
            message: message.into(),
        }
    }

    /// Returns the error category for logging and for deciding how to report it.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingAttribute(_) => ErrorCategory::FatalInput,
            Self::UserInfoNetwork(_)
            | Self::UserInfoTimeout(_)
            | Self::UserInfoStatus { .. }
            | Self::UserInfoParse(_) => ErrorCategory::Upstream,
            Self::ProviderDisabled | Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::BindingStore { .. }
            | Self::BindingConflict { .. }
            | Self::AccountStore { .. } => ErrorCategory::Storage,
        }
    }

    /// Returns `true` if the error message can be shown to the end user as is.
    #[must_use]
    pub fn is_user_visible(&self) -> bool {
        matches!(self, Self::MissingAttribute(_) | Self::ProviderDisabled)
    }

    /// Returns `true` if the identity provider or the network failed.
    #[must_use]
    pub fn is_upstream_error(&self) -> bool {
        self.category() == ErrorCategory::Upstream
    }
}

/// Categories of login failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// A required attribute is missing.
    FatalInput,
    /// The userinfo endpoint failed.
    Upstream,
    /// Settings are missing or the provider is disabled.
    Configuration,
    /// The binding or account store failed.
    Storage,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FatalInput => write!(f, "fatal_input"),
            Self::Upstream => write!(f, "upstream"),
            Self::Configuration => write!(f, "configuration"),
            Self::Storage => write!(f, "storage"),
        }
    }
}

/// Result alias used throughout the crate.
pub type LinkResult<T> = Result<T, LinkError>;
