use serde::Deserialize;
use tally_fetch::ConfigError;

pub const ENV_URL: &str = "TALLY_SUPABASE_URL";
pub const ENV_KEY: &str = "TALLY_SUPABASE_KEY";
pub const ENV_TABLE: &str = "TALLY_SETTINGS_TABLE";
pub const ENV_ACCESS_TOKEN: &str = "TALLY_ACCESS_TOKEN";

pub const DEFAULT_TABLE: &str = "user_settings";

/// Where the hosted settings table lives and how to authenticate to it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RestStoreConfig {
    /// Project base URL, e.g. `https://abc.supabase.co`.
    pub url: String,

    /// Project API key, sent as `apikey`.
    pub api_key: String,

    #[serde(default = "default_table")]
    pub table: String,

    /// User session token. Row-level security sees this user; without it
    /// requests are made with the API key alone.
    #[serde(default)]
    pub access_token: Option<String>,
}

fn default_table() -> String {
    DEFAULT_TABLE.to_string()
}

impl RestStoreConfig {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            table: default_table(),
            access_token: None,
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing { name })
        };

        let mut config = Self::new(required(ENV_URL)?, required(ENV_KEY)?);
        if let Some(table) = lookup(ENV_TABLE).filter(|v| !v.is_empty()) {
            config.table = table;
        }
        config.access_token = lookup(ENV_ACCESS_TOKEN).filter(|v| !v.is_empty());
        Ok(config)
    }

    /// Token for the `Authorization` header.
    pub fn bearer(&self) -> &str {
        self.access_token.as_deref().unwrap_or(&self.api_key)
    }
}
