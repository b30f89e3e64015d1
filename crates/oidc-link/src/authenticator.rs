//! The OpenID Connect authenticator.
//!
//! The account system calls [`OidcAuthenticator::after_authenticate`] once the
//! OpenID Connect handshake has completed, and
//! [`OidcAuthenticator::after_create_account`] after it has created an account
//! for a login that could not be matched.

use std::fmt;
use std::sync::Arc;

use tracing::{instrument, warn};

use crate::account::{Account, AccountStore};
use crate::attribute::Attribute;
use crate::binding::BindingStore;
use crate::config::SettingsHandle;
use crate::document::Document;
use crate::error::{LinkError, LinkResult};
use crate::extract::AttributeExtractor;
use crate::linker::{IdentityLinker, LinkOutcome};
use crate::result::{AuthenticationResult, build_result};
use crate::userinfo::{UserInfoClient, UserInfoSource};

/// Name under which the authenticator is registered.
pub const PROVIDER_NAME: &str = "openid_connect";

/// Data from a completed OpenID Connect handshake.
#[derive(Clone)]
pub struct CompletedHandshake {
    claims: Document,
    bearer_token: String,
    subject: String,
}

impl CompletedHandshake {
    /// Creates a handshake result.
    #[must_use]
    pub fn new(
        claims: impl Into<Document>,
        bearer_token: impl Into<String>,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            claims: claims.into(),
            bearer_token: bearer_token.into(),
            subject: subject.into(),
        }
    }

    /// Claims embedded in the token.
    #[must_use]
    pub fn claims(&self) -> &Document {
        &self.claims
    }

    /// Access token for the userinfo endpoint.
    #[must_use]
    pub fn bearer_token(&self) -> &str {
        &self.bearer_token
    }

    /// The identity provider's subject id.
    #[must_use]
    pub fn external_subject_id(&self) -> &str {
        &self.subject
    }
}

impl fmt::Debug for CompletedHandshake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletedHandshake")
            .field("claims", &self.claims)
            .field("bearer_token", &"[REDACTED]")
            .field("subject", &self.subject)
            .finish()
    }
}

/// Turns completed handshakes into authentication results.
pub struct OidcAuthenticator {
    settings: SettingsHandle,
    extractor: AttributeExtractor,
    linker: IdentityLinker,
    user_info: Arc<dyn UserInfoSource>,
}

impl OidcAuthenticator {
    /// Registered provider name.
    pub const NAME: &'static str = PROVIDER_NAME;

    /// Creates an authenticator that fetches userinfo over HTTP.
    #[must_use]
    pub fn new(
        settings: SettingsHandle,
        accounts: Arc<dyn AccountStore>,
        bindings: Arc<dyn BindingStore>,
    ) -> Self {
        Self {
            extractor: AttributeExtractor::new(settings.clone()),
            linker: IdentityLinker::new(accounts, bindings, settings.clone()),
            user_info: Arc::new(UserInfoClient::new(settings.clone())),
            settings,
        }
    }

    /// Replaces the userinfo source.
    #[must_use]
    pub fn with_user_info_source(mut self, source: Arc<dyn UserInfoSource>) -> Self {
        self.user_info = source;
        self
    }

    /// Returns the provider name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        Self::NAME
    }

    /// Returns the shared settings.
    #[must_use]
    pub fn settings(&self) -> &SettingsHandle {
        &self.settings
    }

    /// Processes a completed handshake.
    ///
    /// Extracts the user attributes, resolves the identity binding and builds
    /// the result. A binding is only written when the account is linked by
    /// email.
    ///
    /// # Errors
    ///
    /// - `ProviderDisabled` if logins are switched off.
    /// - `MissingAttribute(Email)` if no email could be resolved.
    /// - Userinfo, account store and binding store errors are propagated.
    #[instrument(skip_all, fields(subject = %handshake.external_subject_id()))]
    pub async fn after_authenticate(
        &self,
        handshake: &CompletedHandshake,
    ) -> LinkResult<AuthenticationResult> {
        let settings = self.settings.load_full();
        if !settings.enabled {
            return Err(LinkError::ProviderDisabled);
        }

        settings.debug_log(format_args!(
            "after_authenticate response: subject: {} claims: {}",
            handshake.external_subject_id(),
            handshake.claims()
        ));

        let attributes = self
            .extractor
            .extract(handshake.claims(), || {
                self.user_info
                    .fetch_user_info(handshake.bearer_token(), handshake.external_subject_id())
            })
            .await?;

        let Some(email) = attributes.email() else {
            warn!("No email found in claims or userinfo");
            return Err(LinkError::MissingAttribute(Attribute::Email));
        };

        let external_user_id = attributes.external_user_id().unwrap_or_else(|| {
            tracing::debug!("No external user id resolved, using the handshake subject");
            handshake.external_subject_id().trim().to_string()
        });

        let outcome = self.linker.resolve(&external_user_id, &email).await?;
        match &outcome {
            LinkOutcome::BoundExisting { account, action } => tracing::info!(
                external_user_id = %external_user_id,
                account_id = %account.id,
                action = %action,
                "OpenID Connect login matched an account"
            ),
            LinkOutcome::NeedsAccountCreation => tracing::info!(
                external_user_id = %external_user_id,
                "OpenID Connect login requires account creation"
            ),
        }

        Ok(build_result(
            &attributes,
            &email,
            &external_user_id,
            outcome,
            settings.email_verified,
        ))
    }

    /// Binds the external identity of `prior` to a newly created account.
    ///
    /// # Errors
    ///
    /// Returns `MissingAttribute(ExternalUserId)` if `prior` carries no
    /// external user id, `BindingConflict` if `prior` already matched an
    /// account or the id is bound to another live account, and propagates
    /// binding store errors.
    #[instrument(skip_all, fields(account_id = %account.id))]
    pub async fn after_create_account(
        &self,
        account: &Account,
        prior: &AuthenticationResult,
    ) -> LinkResult<()> {
        if let Some(bound) = &prior.bound_account {
            warn!(
                bound_account_id = %bound.id,
                "Login result already matched an account, refusing to bind a new one"
            );
            return Err(LinkError::BindingConflict {
                external_user_id: prior.extra_data.external_user_id.clone(),
                bound: bound.id,
                requested: account.id,
            });
        }

        self.linker
            .finalize(&prior.extra_data.external_user_id, account)
            .await?;
        Ok(())
    }
}
