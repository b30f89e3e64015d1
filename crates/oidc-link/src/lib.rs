//! # oidc-link
//!
//! OpenID Connect login completion for an account system.
//!
//! This crate provides:
//! - Attribute paths over claims and userinfo documents, with setting indirection
//! - Attribute extraction with a single, lazy userinfo fetch
//! - Binding of external identities to local accounts, with email-gated linking
//! - The authentication result handed back to the account system
//!
//! ## Modules
//!
//! - [`document`] - Tree model for claims and userinfo documents
//! - [`path`] - Attribute path parsing and resolution
//! - [`attribute`] - Logical attributes and extraction results
//! - [`extract`] - Claims-first attribute extraction
//! - [`userinfo`] - Userinfo endpoint client
//! - [`account`] - Local account lookups
//! - [`binding`] - Identity binding storage
//! - [`linker`] - Binding resolution state machine
//! - [`result`] - Authentication result builder
//! - [`authenticator`] - Entry points called by the account system
//! - [`config`] - Settings, loading and validation
//! - [`error`] - Error types

pub mod account;
pub mod attribute;
pub mod authenticator;
pub mod binding;
pub mod config;
pub mod document;
pub mod error;
pub mod extract;
pub mod linker;
pub mod path;
pub mod result;
pub mod userinfo;

pub use account::{Account, AccountId, AccountStore, MemoryAccountStore, normalize_email};
pub use attribute::{Attribute, AttributeSource, ExtractedAttributes, ResolvedAttribute};
pub use authenticator::{CompletedHandshake, OidcAuthenticator, PROVIDER_NAME};
pub use binding::{
    BINDING_KEY_PREFIX, BINDING_NAMESPACE, BindingStore, IdentityBinding, KeyValueBindingStore,
    KeyValueStore, MemoryBindingStore, MemoryKeyValueStore, binding_key,
};
pub use config::{ConfigError, OidcSettings, SettingsHandle, load_settings, settings_handle};
pub use document::{Document, DocumentKey, Mapping, Scalar};
pub use error::{ErrorCategory, LinkError, LinkResult};
pub use extract::AttributeExtractor;
pub use linker::{IdentityLinker, LinkAction, LinkOutcome};
pub use path::{AttributePath, PathSegment, SettingLookup, resolve};
pub use result::{AuthenticationResult, ExtraData, build_result};
pub use userinfo::{UserInfoClient, UserInfoSource, build_user_info_url};
