use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::AuthError;

/// Path the auth routes are mounted under; callback URLs are built from it.
pub const AUTH_BASE_PATH: &str = "/api/auth";

/// Minimum length of the cookie secret (key derivation needs 32 bytes).
const MIN_SECRET_LEN: usize = 32;

/// Longest accepted session lifetime (ten years).
pub const MAX_SESSION_MAX_AGE_SECONDS: u64 = 10 * 365 * 24 * 60 * 60;

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Public URL of the application, e.g. `https://app.example.com`.
    /// Provider callback URLs are derived from it.
    pub base_url: Option<String>,

    /// Secret used to derive the private cookie key
    pub secret: Option<String>,

    /// Timeout applied to every outbound provider request
    #[serde(default = "default_http_timeout")]
    pub http_timeout_seconds: u64,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub discord: DiscordConfig,

    #[serde(default)]
    pub igms: IgmsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session cookie name
    #[serde(default = "default_session_cookie_name")]
    pub cookie_name: String,

    /// Session lifetime in seconds (default: 30 days)
    #[serde(default = "default_session_max_age")]
    pub max_age_seconds: u64,

    /// Secure cookie (HTTPS only)
    #[serde(default)]
    pub secure: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,

    /// Overrides the callback URL derived from `base_url`
    pub redirect_url: Option<String>,

    #[serde(default = "default_discord_authorize_url")]
    pub authorize_url: String,

    #[serde(default = "default_discord_token_url")]
    pub token_url: String,

    #[serde(default = "default_discord_userinfo_url")]
    pub userinfo_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IgmsConfig {
    /// Credentials sent to the token endpoint
    pub client_id: Option<String>,
    pub client_secret: Option<String>,

    /// Overrides the callback URL derived from `base_url`
    pub redirect_url: Option<String>,

    /// Application identifier sent on the consent page. IGMS issues it
    /// separately from the token endpoint credentials.
    #[serde(default = "default_igms_application_id")]
    pub application_id: String,

    #[serde(default = "default_igms_domain")]
    pub domain: String,

    #[serde(default = "default_igms_scope")]
    pub scope: String,

    /// `platform_type` a host record must carry to be taken as the user's identity
    #[serde(default = "default_igms_required_platform")]
    pub required_platform: String,
}

fn default_http_timeout() -> u64 {
    10
}

fn default_session_cookie_name() -> String {
    "hostdesk.session-token".to_string()
}

fn default_session_max_age() -> u64 {
    30 * 24 * 60 * 60
}

fn default_discord_authorize_url() -> String {
    "https://discord.com/api/oauth2/authorize".to_string()
}

fn default_discord_token_url() -> String {
    "https://discord.com/api/oauth2/token".to_string()
}

fn default_discord_userinfo_url() -> String {
    "https://discord.com/api/users/@me".to_string()
}

fn default_igms_application_id() -> String {
    "229".to_string()
}

fn default_igms_domain() -> String {
    "https://igms.com".to_string()
}

fn default_igms_scope() -> String {
    "listings,direct-bookings,calendar-control,messaging,tasks".to_string()
}

fn default_igms_required_platform() -> String {
    "airbnb".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            secret: None,
            http_timeout_seconds: default_http_timeout(),
            session: SessionConfig::default(),
            discord: DiscordConfig::default(),
            igms: IgmsConfig::default(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_session_cookie_name(),
            max_age_seconds: default_session_max_age(),
            secure: false,
        }
    }
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_url: None,
            authorize_url: default_discord_authorize_url(),
            token_url: default_discord_token_url(),
            userinfo_url: default_discord_userinfo_url(),
        }
    }
}

impl Default for IgmsConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_url: None,
            application_id: default_igms_application_id(),
            domain: default_igms_domain(),
            scope: default_igms_scope(),
            required_platform: default_igms_required_platform(),
        }
    }
}

impl AuthConfig {
    /// Check the settings every deployment must provide. Provider credentials
    /// are checked by the providers themselves when they are constructed.
    pub fn validate(&self) -> Result<(), AuthError> {
        let base_url = self
            .base_url
            .as_deref()
            .ok_or_else(|| AuthError::ConfigError("base_url not configured".to_string()))?;
        let parsed = url::Url::parse(base_url)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AuthError::ConfigError(format!(
                "base_url must be an http(s) URL, got {}",
                base_url
            )));
        }

        let secret = self
            .secret
            .as_deref()
            .ok_or_else(|| AuthError::ConfigError("secret not configured".to_string()))?;
        if secret.len() < MIN_SECRET_LEN {
            return Err(AuthError::ConfigError(format!(
                "secret must be at least {} bytes",
                MIN_SECRET_LEN
            )));
        }

        if self.http_timeout_seconds == 0 {
            return Err(AuthError::ConfigError(
                "http_timeout_seconds must be positive".to_string(),
            ));
        }

        self.session_max_age()?;

        Ok(())
    }

    /// Session lifetime, rejected when zero or longer than
    /// [`MAX_SESSION_MAX_AGE_SECONDS`].
    pub fn session_max_age(&self) -> Result<time::Duration, AuthError> {
        let seconds = self.session.max_age_seconds;
        if seconds == 0 || seconds > MAX_SESSION_MAX_AGE_SECONDS {
            return Err(AuthError::ConfigError(format!(
                "session.max_age_seconds must be between 1 and {}, got {}",
                MAX_SESSION_MAX_AGE_SECONDS, seconds
            )));
        }
        let seconds = i64::try_from(seconds).map_err(|_| {
            AuthError::ConfigError(format!("session.max_age_seconds out of range: {}", seconds))
        })?;
        Ok(time::Duration::seconds(seconds))
    }

    /// Callback URL for a provider, e.g. `{base_url}/api/auth/callback/igms`.
    pub fn callback_url(&self, provider_id: &str) -> Result<String, AuthError> {
        let base_url = self
            .base_url
            .as_deref()
            .ok_or_else(|| AuthError::ConfigError("base_url not configured".to_string()))?;
        Ok(format!(
            "{}{}/callback/{}",
            base_url.trim_end_matches('/'),
            AUTH_BASE_PATH,
            provider_id
        ))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }
}
