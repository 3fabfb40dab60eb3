use crate::cache_manager::{DEFAULT_SWEEP_INTERVAL, DEFAULT_TTL};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_ACCOUNTS_DOMAIN: &str = "https://accounts.zoho.com";
pub const DEFAULT_API_DOMAIN: &str = "https://www.zohoapis.com";
pub const DEFAULT_SHEET_API_DOMAIN: &str = "https://sheet.zoho.com";
/// Largest upstream body the gateway will buffer (50 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

/// Raw environment settings, as read by the `config` crate.
#[derive(Debug, Deserialize)]
struct Settings {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,

    zoho_client_id: Option<String>,
    zoho_client_secret: Option<String>,
    zoho_refresh_token: Option<String>,
    zoho_accounts_domain: Option<String>,
    zoho_api_domain: Option<String>,
    zoho_sheet_api_domain: Option<String>,
    zoho_from_email: Option<String>,

    zoho_workdrive_org_id: Option<String>,
    zoho_workdrive_default_parent_id: Option<String>,
    zoho_workdrive_client_id: Option<String>,
    zoho_workdrive_client_secret: Option<String>,
    zoho_workdrive_refresh_token: Option<String>,

    zoho_sheet_client_id: Option<String>,
    zoho_sheet_client_secret: Option<String>,
    zoho_sheet_refresh_token: Option<String>,

    public_api_base_url: Option<String>,
    #[serde(default = "default_upstream_timeout")]
    upstream_timeout_secs: u64,
    #[serde(default = "default_max_body_bytes")]
    upstream_max_body_bytes: usize,
    #[serde(default = "default_cache_ttl")]
    cache_ttl_secs: u64,
    #[serde(default = "default_sweep_interval")]
    cache_sweep_interval_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_upstream_timeout() -> u64 {
    30
}

fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

fn default_cache_ttl() -> u64 {
    DEFAULT_TTL.as_secs()
}

fn default_sweep_interval() -> u64 {
    DEFAULT_SWEEP_INTERVAL.as_secs()
}

/// OAuth credentials and domains for one upstream integration.
#[derive(Clone, PartialEq)]
pub struct CredentialSet {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub accounts_domain: String,
    pub api_domain: String,
    /// WorkDrive only.
    pub organization_id: Option<String>,
    /// WorkDrive only.
    pub default_parent_id: Option<String>,
}

impl fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSet")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("accounts_domain", &self.accounts_domain)
            .field("api_domain", &self.api_domain)
            .field("organization_id", &self.organization_id)
            .field("default_parent_id", &self.default_parent_id)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub crm: CredentialSet,
    /// `None` when no WorkDrive organization is configured.
    pub workdrive: Option<CredentialSet>,
    pub sheet: CredentialSet,
    pub from_email: Option<String>,
    pub public_base_url: String,
    pub upstream_timeout: Duration,
    pub upstream_max_body_bytes: usize,
    pub cache_ttl: Duration,
    pub cache_sweep_interval: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        // Values stay strings until deserialized, so long numeric ids keep
        // their exact digits.
        let settings: Settings = config::Config::builder()
            .add_source(config::Environment::default())
            .build()?
            .try_deserialize()?;

        Ok(Self::from_settings(settings)?)
    }

    fn from_settings(s: Settings) -> Result<Self, ConfigError> {
        let accounts_domain = trim_url(
            non_empty(s.zoho_accounts_domain).unwrap_or_else(|| DEFAULT_ACCOUNTS_DOMAIN.into()),
        );
        let api_domain =
            trim_url(non_empty(s.zoho_api_domain).unwrap_or_else(|| DEFAULT_API_DOMAIN.into()));
        let sheet_domain = trim_url(
            non_empty(s.zoho_sheet_api_domain).unwrap_or_else(|| DEFAULT_SHEET_API_DOMAIN.into()),
        );

        let client_id = required("ZOHO_CLIENT_ID", s.zoho_client_id)?;
        let client_secret = required("ZOHO_CLIENT_SECRET", s.zoho_client_secret)?;
        let refresh_token = required("ZOHO_REFRESH_TOKEN", s.zoho_refresh_token)?;

        let crm = CredentialSet {
            client_id: client_id.clone(),
            client_secret: client_secret.clone(),
            refresh_token: refresh_token.clone(),
            accounts_domain: accounts_domain.clone(),
            api_domain: api_domain.clone(),
            organization_id: None,
            default_parent_id: None,
        };

        let workdrive = non_empty(s.zoho_workdrive_org_id).map(|org_id| CredentialSet {
            client_id: non_empty(s.zoho_workdrive_client_id).unwrap_or_else(|| client_id.clone()),
            client_secret: non_empty(s.zoho_workdrive_client_secret)
                .unwrap_or_else(|| client_secret.clone()),
            refresh_token: non_empty(s.zoho_workdrive_refresh_token)
                .unwrap_or_else(|| refresh_token.clone()),
            accounts_domain: accounts_domain.clone(),
            api_domain: api_domain.clone(),
            organization_id: Some(org_id),
            default_parent_id: non_empty(s.zoho_workdrive_default_parent_id),
        });

        let sheet = CredentialSet {
            client_id: non_empty(s.zoho_sheet_client_id).unwrap_or(client_id),
            client_secret: non_empty(s.zoho_sheet_client_secret).unwrap_or(client_secret),
            refresh_token: non_empty(s.zoho_sheet_refresh_token).unwrap_or(refresh_token),
            accounts_domain,
            api_domain: sheet_domain,
            organization_id: None,
            default_parent_id: None,
        };

        let public_base_url = trim_url(
            non_empty(s.public_api_base_url)
                .unwrap_or_else(|| format!("http://localhost:{}", s.port)),
        );

        if s.upstream_max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "UPSTREAM_MAX_BODY_BYTES must be positive",
            ));
        }
        if s.cache_ttl_secs == 0 {
            return Err(ConfigError::Invalid("CACHE_TTL_SECS must be positive"));
        }
        if s.cache_sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "CACHE_SWEEP_INTERVAL_SECS must be positive",
            ));
        }

        Ok(Config {
            host: s.host,
            port: s.port,
            crm,
            workdrive,
            sheet,
            from_email: non_empty(s.zoho_from_email),
            public_base_url,
            upstream_timeout: Duration::from_secs(s.upstream_timeout_secs.max(1)),
            upstream_max_body_bytes: s.upstream_max_body_bytes,
            cache_ttl: Duration::from_secs(s.cache_ttl_secs),
            cache_sweep_interval: Duration::from_secs(s.cache_sweep_interval_secs),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{0}")]
    Invalid(&'static str),
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(name: &'static str, value: Option<String>) -> Result<String, ConfigError> {
    non_empty(value).ok_or(ConfigError::Missing(name))
}

fn trim_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

#[cfg(test)]
impl Config {
    /// Config pointing at fake upstream domains, for tests.
    pub fn for_tests() -> Self {
        let credentials = CredentialSet {
            client_id: "client-id".into(),
            client_secret: "client-secret".into(),
            refresh_token: "refresh-token".into(),
            accounts_domain: "https://accounts.test".into(),
            api_domain: "https://api.test".into(),
            organization_id: None,
            default_parent_id: None,
        };

        Config {
            host: "127.0.0.1".into(),
            port: 8080,
            crm: credentials.clone(),
            workdrive: Some(CredentialSet {
                organization_id: Some("org-1".into()),
                default_parent_id: Some("root-folder".into()),
                ..credentials.clone()
            }),
            sheet: CredentialSet {
                api_domain: "https://sheet.test".into(),
                ..credentials
            },
            from_email: Some("assistant@example.com".into()),
            public_base_url: "https://gateway.test".into(),
            upstream_timeout: Duration::from_secs(30),
            upstream_max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            cache_ttl: Duration::from_secs(300),
            cache_sweep_interval: Duration::from_secs(600),
        }
    }
}
