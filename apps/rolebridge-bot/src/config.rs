use std::time::Duration;

use rolebridge_keycloak::{KeycloakConfig, DEFAULT_CLIENT_ID, DEFAULT_REQUEST_TIMEOUT};
use rolebridge_sync::{ReconcileOptions, DEFAULT_IDP_ALIAS};
use secrecy::SecretString;

/// Default log filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,rolebridge=debug";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Configuration for the role bridge bot.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Keycloak server base URL.
    pub keycloak_url: String,

    /// Admin account used for the password grant.
    pub keycloak_username: String,
    pub keycloak_password: SecretString,

    /// Realm whose groups are synchronized.
    pub keycloak_realm: String,

    /// Realm the admin account authenticates against.
    pub keycloak_admin_realm: String,

    pub keycloak_client_id: String,

    /// Identity provider alias of the Discord federation link.
    pub idp_alias: String,

    pub request_timeout: Duration,

    pub discord_token: SecretString,

    /// Run a reconciliation pass once the guild cache is ready.
    pub sync_on_startup: bool,

    /// Log planned edits without writing them.
    pub dry_run: bool,

    /// Post a summary to the guild when a pair has drifted.
    pub notify_drift: bool,

    pub log_format: LogFormat,
    pub log_filter: String,
}

impl BotConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(|key| std::env::var(key))
    }

    /// Load configuration from a custom variable reader.
    ///
    /// This allows tests to supply variables without mutating process-global
    /// environment state.
    pub fn from_reader<F>(reader: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let required = |key: &str| {
            reader(key)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingVar(key.into()))
        };

        let keycloak_url = required("KEYCLOAK_URL")?;
        if !keycloak_url.starts_with("http://") && !keycloak_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "KEYCLOAK_URL".into(),
                "must start with http:// or https://".into(),
            ));
        }

        let keycloak_username = required("KEYCLOAK_USERNAME")?;
        let keycloak_password = SecretString::from(required("KEYCLOAK_PASSWORD")?);
        let keycloak_realm = required("KEYCLOAK_REALM")?;
        let keycloak_admin_realm = required("KEYCLOAK_ADMIN_REALM")?;
        let discord_token = SecretString::from(required("DISCORD_BOT_TOKEN")?);

        let keycloak_client_id =
            reader("KEYCLOAK_CLIENT_ID").unwrap_or_else(|_| DEFAULT_CLIENT_ID.to_string());

        let idp_alias =
            reader("KEYCLOAK_IDP_ALIAS").unwrap_or_else(|_| DEFAULT_IDP_ALIAS.to_string());

        let request_timeout = match reader("KEYCLOAK_TIMEOUT_SECS") {
            Ok(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or_else(|| {
                    ConfigError::InvalidValue(
                        "KEYCLOAK_TIMEOUT_SECS".into(),
                        format!("expected a positive number of seconds, got {raw:?}"),
                    )
                })?,
            Err(_) => DEFAULT_REQUEST_TIMEOUT,
        };

        let sync_on_startup = parse_flag(&reader, "SYNC_ON_STARTUP", true)?;
        let dry_run = parse_flag(&reader, "SYNC_DRY_RUN", false)?;
        let notify_drift = parse_flag(&reader, "SYNC_NOTIFY_DRIFT", false)?;

        let log_format = match reader("LOG_FORMAT")
            .unwrap_or_else(|_| "text".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "text" => LogFormat::Text,
            "json" => LogFormat::Json,
            other => {
                return Err(ConfigError::InvalidValue(
                    "LOG_FORMAT".into(),
                    format!("expected text or json, got {other:?}"),
                ))
            }
        };

        let log_filter = reader("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());

        Ok(Self {
            keycloak_url,
            keycloak_username,
            keycloak_password,
            keycloak_realm,
            keycloak_admin_realm,
            keycloak_client_id,
            idp_alias,
            request_timeout,
            discord_token,
            sync_on_startup,
            dry_run,
            notify_drift,
            log_format,
            log_filter,
        })
    }

    /// Admin client configuration.
    pub fn keycloak(&self) -> KeycloakConfig {
        KeycloakConfig::new(
            self.keycloak_url.clone(),
            self.keycloak_username.clone(),
            self.keycloak_password.clone(),
            self.keycloak_realm.clone(),
            self.keycloak_admin_realm.clone(),
        )
        .with_client_id(self.keycloak_client_id.clone())
        .with_request_timeout(self.request_timeout)
    }

    /// Reconciliation pass options.
    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            dry_run: self.dry_run,
            notify_drift: self.notify_drift,
            ..Default::default()
        }
    }
}

fn parse_flag<F>(reader: &F, key: &str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    match reader(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(ConfigError::InvalidValue(
                key.into(),
                format!("expected a boolean, got {raw:?}"),
            )),
        },
        Err(_) => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}
