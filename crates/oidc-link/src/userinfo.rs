//! Userinfo document fetching.
//!
//! The userinfo document is only requested when the token claims do not
//! already carry every configured attribute. The endpoint URL comes from the
//! `user_json_url` template, where `:token` is replaced by the bearer token
//! and `:id` by the external subject id.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use url::Url;

use crate::config::SettingsHandle;
use crate::document::Document;
use crate::error::{LinkError, LinkResult};

/// Placeholder for the bearer token in the URL template.
pub const TOKEN_PLACEHOLDER: &str = ":token";

/// Placeholder for the external subject id in the URL template.
pub const ID_PLACEHOLDER: &str = ":id";

/// Source of userinfo documents.
#[async_trait]
pub trait UserInfoSource: Send + Sync {
    /// Fetches the userinfo document for `subject` using `token`.
    async fn fetch_user_info(&self, token: &str, subject: &str) -> LinkResult<Document>;
}

/// Substitutes the placeholders of a userinfo URL template.
///
/// The token is substituted first, then the id; only the first occurrence of
/// each placeholder is replaced.
#[must_use]
pub fn build_user_info_url(template: &str, token: &str, subject: &str) -> String {
    template
        .replacen(TOKEN_PLACEHOLDER, token, 1)
        .replacen(ID_PLACEHOLDER, subject, 1)
}

/// HTTP client for the userinfo endpoint.
///
/// The URL template and the request timeout are read from the settings on
/// every request.
pub struct UserInfoClient {
    http_client: reqwest::Client,
    settings: SettingsHandle,
}

impl UserInfoClient {
    /// Creates a client with a default HTTP client.
    #[must_use]
    pub fn new(settings: SettingsHandle) -> Self {
        Self::with_http_client(reqwest::Client::new(), settings)
    }

    /// Creates a client reusing an existing HTTP client.
    #[must_use]
    pub fn with_http_client(http_client: reqwest::Client, settings: SettingsHandle) -> Self {
        Self {
            http_client,
            settings,
        }
    }
}

#[async_trait]
impl UserInfoSource for UserInfoClient {
    async fn fetch_user_info(&self, token: &str, subject: &str) -> LinkResult<Document> {
        let settings = self.settings.load_full();

        let template = settings
            .user_json_url
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| LinkError::configuration("user_json_url is not configured"))?;

        let url = Url::parse(&build_user_info_url(template, token, subject)).map_err(|e| {
            LinkError::configuration(format!("Invalid userinfo URL: {e}"))
        })?;

        settings.debug_log(format_args!("user_json_url: {url}"));
        tracing::debug!(host = url.host_str().unwrap_or(""), "Fetching userinfo document");

        let response = self
            .http_client
            .get(url)
            .bearer_auth(token)
            .header(ACCEPT, "application/json")
            .timeout(settings.request_timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LinkError::UserInfoTimeout(settings.request_timeout)
                } else {
                    tracing::warn!("Userinfo request failed: {}", e);
                    LinkError::UserInfoNetwork(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            tracing::warn!(status, "Userinfo endpoint returned an error status");
            return Err(LinkError::UserInfoStatus { status });
        }

        let body: serde_json::Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                LinkError::UserInfoTimeout(settings.request_timeout)
            } else {
                LinkError::UserInfoParse(e.to_string())
            }
        })?;

        let document = Document::from(body);
        settings.debug_log(format_args!("user_json: {document}"));

        Ok(document)
    }
}
