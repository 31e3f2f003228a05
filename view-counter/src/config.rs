use crate::metafield::FieldType;
use serde::Deserialize;
use std::fmt;
use thiserror::Error;
use url::Url;

pub const ENV_SHARED_SECRET: &str = "SHOPIFY_SHARED_SECRET";
pub const ENV_STORE_DOMAIN: &str = "SHOPIFY_STORE_DOMAIN";
pub const ENV_ACCESS_TOKEN: &str = "SHOPIFY_ACCESS_TOKEN";
/// Set to `true` to accept unsigned requests. Only meant for manual testing.
pub const ENV_SKIP_SIGNATURE_CHECK: &str = "VIEW_COUNTER_SKIP_SIGNATURE_CHECK";

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("proxy_path must start with '/': {0}")]
    InvalidProxyPath(String),

    #[error("signature verification is enabled but no shared secret is configured")]
    MissingSharedSecret,

    #[error("admin API store needs a store_domain or an endpoint")]
    MissingStoreDomain,

    #[error("admin API store needs an access_token")]
    MissingAccessToken,

    #[error("invalid admin API endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    #[error("cors_allow_origin is not a valid header value: {0}")]
    InvalidCorsOrigin(String),

    #[error("{0} must be greater than 0")]
    ZeroLimit(&'static str),
}

/// A configuration value that must never show up in logs.
#[derive(Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Secret(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

fn default_listener() -> Listener {
    Listener {
        host: "127.0.0.1".into(),
        port: 3000,
    }
}

fn default_admin_listener() -> Listener {
    Listener {
        host: "127.0.0.1".into(),
        port: 3001,
    }
}

fn default_proxy_path() -> String {
    "/LMserver.js".into()
}

fn default_true() -> bool {
    true
}

fn default_max_body_bytes() -> usize {
    64 * 1024
}

fn default_cors_allow_origin() -> String {
    "*".into()
}

fn default_api_version() -> String {
    "2023-10".into()
}

fn default_namespace() -> String {
    "custom".into()
}

fn default_key() -> String {
    "total_views".into()
}

fn default_timeout_secs() -> u64 {
    10
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default = "default_listener")]
    pub listener: Listener,
    /// Serves `/health` and `/ready`
    #[serde(default = "default_admin_listener")]
    pub admin_listener: Listener,
    /// Path the storefront posts to
    #[serde(default = "default_proxy_path")]
    pub proxy_path: String,
    #[serde(default = "default_true")]
    pub verify_signature: bool,
    #[serde(default)]
    pub shared_secret: Secret,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    #[serde(default = "default_cors_allow_origin")]
    pub cors_allow_origin: String,
    pub store: StoreConfig,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    AdminApi(AdminApiConfig),
    /// Non-durable in-process counts, see `store::memory`
    Memory,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct AdminApiConfig {
    /// e.g. `my-shop.myshopify.com`
    #[serde(default)]
    pub store_domain: String,
    #[serde(default)]
    pub access_token: Secret,
    /// Overrides the endpoint derived from `store_domain`.
    #[serde(default)]
    pub endpoint: Option<Url>,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_key")]
    pub key: String,
    #[serde(default)]
    pub field_type: FieldType,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl AdminApiConfig {
    pub fn endpoint(&self) -> Result<Url, ValidationError> {
        if let Some(endpoint) = &self.endpoint {
            return Ok(endpoint.clone());
        }
        if self.store_domain.is_empty() {
            return Err(ValidationError::MissingStoreDomain);
        }

        let domain = ["https://", "http://"]
            .iter()
            .find_map(|scheme| self.store_domain.strip_prefix(scheme))
            .unwrap_or(self.store_domain.as_str())
            .trim_end_matches('/');
        Ok(Url::parse(&format!(
            "https://{domain}/admin/api/{}/graphql.json",
            self.api_version
        ))?)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.endpoint()?;
        if self.access_token.is_empty() {
            return Err(ValidationError::MissingAccessToken);
        }
        if self.timeout_secs == 0 {
            return Err(ValidationError::ZeroLimit("timeout_secs"));
        }
        Ok(())
    }
}

impl Config {
    /// Overlays secrets and the verification switch from the environment.
    ///
    /// `lookup` is `std::env::var(..).ok()` in production.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(secret) = lookup(ENV_SHARED_SECRET) {
            self.shared_secret = Secret::new(secret);
        }

        if let Some(skip) = lookup(ENV_SKIP_SIGNATURE_CHECK) {
            let skip = skip.trim();
            if skip.eq_ignore_ascii_case("true") || skip == "1" {
                self.verify_signature = false;
            }
        }

        if let StoreConfig::AdminApi(admin) = &mut self.store {
            if let Some(domain) = lookup(ENV_STORE_DOMAIN) {
                admin.store_domain = domain;
            }
            if let Some(token) = lookup(ENV_ACCESS_TOKEN) {
                admin.access_token = Secret::new(token);
            }
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;

        if !self.proxy_path.starts_with('/') {
            return Err(ValidationError::InvalidProxyPath(self.proxy_path.clone()));
        }
        if self.verify_signature && self.shared_secret.is_empty() {
            return Err(ValidationError::MissingSharedSecret);
        }
        if self.max_body_bytes == 0 {
            return Err(ValidationError::ZeroLimit("max_body_bytes"));
        }
        if http::HeaderValue::from_str(&self.cors_allow_origin).is_err() {
            return Err(ValidationError::InvalidCorsOrigin(
                self.cors_allow_origin.clone(),
            ));
        }

        match &self.store {
            StoreConfig::AdminApi(admin) => admin.validate(),
            StoreConfig::Memory => Ok(()),
        }
    }
}
