//! OpenID Connect login settings.
//!
//! Settings are loaded from a TOML file with environment overrides and are
//! shared through a [`SettingsHandle`] so that operators can swap them while
//! the service is running. Every login attempt takes a fresh snapshot.
//!
//! # Example (TOML)
//!
//! ```toml
//! email_verified = true
//! user_json_url = "https://idp.example.com/userinfo?id=:id"
//! request_timeout = "5s"
//! json_groups_path = "realm_access.:groups_claim"
//!
//! [custom]
//! groups_claim = "roles"
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::attribute::Attribute;
use crate::path::{SETTING_PREFIX, SettingLookup};
use crate::userinfo::build_user_info_url;

/// Environment variable prefix for setting overrides, e.g. `OIDC__EMAIL_VERIFIED=true`.
pub const ENV_PREFIX: &str = "OIDC";

/// Settings consumed by the extractor, the userinfo client and the linker.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct OidcSettings {
    /// Enable/disable OpenID Connect logins entirely.
    pub enabled: bool,

    /// Treat the provider's email claim as verified.
    ///
    /// When enabled, a login without a binding is linked to a local account
    /// with the same email address. This is the only way an external identity
    /// can attach to an existing account.
    pub email_verified: bool,

    /// Log raw documents and userinfo URLs at warn level.
    pub debug_auth: bool,

    /// Userinfo URL template with `:token` and `:id` placeholders.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_json_url: Option<String>,

    /// Timeout for the userinfo request.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Path to the external user id.
    pub json_user_id_path: String,

    /// Path to the suggested username.
    pub json_username_path: String,

    /// Path to the display name.
    pub json_name_path: String,

    /// Path to the email address.
    pub json_email_path: String,

    /// Path to the group memberships.
    pub json_groups_path: String,

    /// Additional settings referenced by indirect path segments.
    ///
    /// `custom.groups_claim` is visible to paths as `:groups_claim`.
    pub custom: HashMap<String, String>,
}

impl Default for OidcSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            email_verified: false,
            debug_auth: false,
            user_json_url: None,
            request_timeout: Duration::from_secs(10),
            json_user_id_path: "sub".to_string(),
            json_username_path: "preferred_username".to_string(),
            json_name_path: "name".to_string(),
            json_email_path: "email".to_string(),
            json_groups_path: String::new(),
            custom: HashMap::new(),
        }
    }
}

impl OidcSettings {
    /// Creates settings with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether the provider's email claim is trusted.
    #[must_use]
    pub fn with_email_verified(mut self, verified: bool) -> Self {
        self.email_verified = verified;
        self
    }

    /// Enables or disables OpenID Connect logins.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Enables debug dumps of documents and URLs.
    #[must_use]
    pub fn with_debug_auth(mut self, debug: bool) -> Self {
        self.debug_auth = debug;
        self
    }

    /// Sets the userinfo URL template.
    #[must_use]
    pub fn with_user_json_url(mut self, template: impl Into<String>) -> Self {
        self.user_json_url = Some(template.into());
        self
    }

    /// Sets the userinfo request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the path for one attribute. An empty string unconfigures it.
    #[must_use]
    pub fn with_path(mut self, attribute: Attribute, path: impl Into<String>) -> Self {
        let path = path.into();
        match attribute {
            Attribute::ExternalUserId => self.json_user_id_path = path,
            Attribute::Username => self.json_username_path = path,
            Attribute::DisplayName => self.json_name_path = path,
            Attribute::Email => self.json_email_path = path,
            Attribute::Groups => self.json_groups_path = path,
        }
        self
    }

    /// Adds a custom setting for indirect path segments.
    #[must_use]
    pub fn with_custom(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom.insert(name.into(), value.into());
        self
    }

    /// Returns the configured path string for an attribute.
    #[must_use]
    pub fn path_for(&self, attribute: Attribute) -> &str {
        match attribute {
            Attribute::ExternalUserId => &self.json_user_id_path,
            Attribute::Username => &self.json_username_path,
            Attribute::DisplayName => &self.json_name_path,
            Attribute::Email => &self.json_email_path,
            Attribute::Groups => &self.json_groups_path,
        }
    }

    /// Validates the settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the request timeout is zero or
    /// the userinfo template does not produce an absolute URL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "request_timeout must be > 0".to_string(),
            ));
        }

        if let Some(template) = self.user_json_url.as_deref()
            && !template.trim().is_empty()
        {
            let sample = build_user_info_url(template, "token", "id");
            Url::parse(&sample).map_err(|e| {
                ConfigError::InvalidValue(format!(
                    "user_json_url '{template}' is not a valid URL template: {e}"
                ))
            })?;
        }

        Ok(())
    }

    /// Writes a debug line when `debug_auth` is enabled.
    pub(crate) fn debug_log(&self, info: fmt::Arguments<'_>) {
        if self.debug_auth {
            tracing::warn!("OIDC Debugging: {info}");
        }
    }
}

impl SettingLookup for OidcSettings {
    fn setting(&self, name: &str) -> Option<String> {
        let field = name.strip_prefix(SETTING_PREFIX)?;
        match field {
            "enabled" => Some(self.enabled.to_string()),
            "email_verified" => Some(self.email_verified.to_string()),
            "debug_auth" => Some(self.debug_auth.to_string()),
            "user_json_url" => self.user_json_url.clone(),
            "json_user_id_path" => Some(self.json_user_id_path.clone()),
            "json_username_path" => Some(self.json_username_path.clone()),
            "json_name_path" => Some(self.json_name_path.clone()),
            "json_email_path" => Some(self.json_email_path.clone()),
            "json_groups_path" => Some(self.json_groups_path.clone()),
            custom => self.custom.get(custom).cloned(),
        }
    }
}

/// Shared, swappable settings.
pub type SettingsHandle = Arc<ArcSwap<OidcSettings>>;

/// Wraps settings into a [`SettingsHandle`].
#[must_use]
pub fn settings_handle(settings: OidcSettings) -> SettingsHandle {
    Arc::new(ArcSwap::from_pointee(settings))
}

/// Configuration loading and validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// The configuration sources could not be read or deserialized.
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// Loads settings from an optional TOML file plus `OIDC__*` environment overrides.
///
/// # Errors
///
/// Returns an error if the file cannot be read, a value has the wrong type,
/// or validation fails.
pub fn load_settings(path: Option<&Path>) -> Result<OidcSettings, ConfigError> {
    let mut builder = Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(File::from(path.to_path_buf()));
    }
    // Environment variable overrides, e.g., OIDC__JSON_EMAIL_PATH=profile.email
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .try_parsing(true)
            .separator("__"),
    );

    let settings: OidcSettings = builder.build()?.try_deserialize()?;
    settings.validate()?;

    tracing::debug!(
        email_verified = settings.email_verified,
        userinfo = settings.user_json_url.is_some(),
        "Loaded OpenID Connect settings"
    );
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults() {
        let settings = OidcSettings::default();

        assert!(settings.enabled);
        assert!(!settings.email_verified);
        assert!(!settings.debug_auth);
        assert!(settings.user_json_url.is_none());
        assert_eq!(settings.request_timeout, Duration::from_secs(10));
        assert_eq!(settings.path_for(Attribute::Email), "email");
        assert_eq!(settings.path_for(Attribute::Groups), "");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_builder() {
        let settings = OidcSettings::new()
            .with_email_verified(true)
            .with_enabled(false)
            .with_debug_auth(true)
            .with_user_json_url("https://idp.example.com/users/:id")
            .with_request_timeout(Duration::from_secs(2))
            .with_path(Attribute::Username, "nickname")
            .with_custom("groups_claim", "roles");

        assert!(settings.email_verified);
        assert!(!settings.enabled);
        assert!(settings.debug_auth);
        assert_eq!(settings.path_for(Attribute::Username), "nickname");
        assert_eq!(settings.custom.get("groups_claim").map(String::as_str), Some("roles"));
    }

    #[test]
    fn test_setting_lookup() {
        let settings = OidcSettings::new()
            .with_path(Attribute::Groups, "groups")
            .with_user_json_url("https://idp/:id")
            .with_custom("groups_claim", "roles");

        assert_eq!(settings.setting("oidc_json_groups_path").as_deref(), Some("groups"));
        assert_eq!(settings.setting("oidc_user_json_url").as_deref(), Some("https://idp/:id"));
        assert_eq!(settings.setting("oidc_email_verified").as_deref(), Some("false"));
        assert_eq!(settings.setting("oidc_groups_claim").as_deref(), Some("roles"));
        assert!(settings.setting("oidc_unknown").is_none());
        assert!(settings.setting("groups_claim").is_none());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let settings = OidcSettings::new().with_request_timeout(Duration::ZERO);
        assert!(matches!(settings.validate(), Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_validate_rejects_relative_template() {
        let settings = OidcSettings::new().with_user_json_url("/userinfo/:id");
        assert!(matches!(settings.validate(), Err(ConfigError::InvalidValue(_))));

        let settings = OidcSettings::new().with_user_json_url("https://idp.example.com/:token");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_handle_swaps() {
        let handle = settings_handle(OidcSettings::default());
        assert!(!handle.load().email_verified);

        handle.store(Arc::new(OidcSettings::default().with_email_verified(true)));
        assert!(handle.load().email_verified);
    }
}
