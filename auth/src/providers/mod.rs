pub mod discord;
pub mod igms;

pub use discord::DiscordProvider;
pub use igms::IgmsProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::AuthError;

/// Normalized identity every provider must produce from its profile response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Provider-scoped account id
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,
}

/// Token endpoint response. Only lives for the duration of a sign-in; the
/// adapter keeps a copy on the account row when the account is first linked.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenSet {
    /// Absolute expiry (Unix seconds), from `expires_at` or `now + expires_in`.
    pub fn absolute_expiry(&self, now: i64) -> Option<i64> {
        self.expires_at
            .or_else(|| self.expires_in.map(|secs| now + secs as i64))
    }
}

/// Where to send the browser, plus anything the callback needs to finish.
#[derive(Clone, Debug)]
pub struct AuthorizationRequest {
    pub url: Url,
    pub pkce_verifier: Option<String>,
}

/// A pluggable identity source.
///
/// A sign-in runs `authorization_url`, then (after the browser comes back)
/// `exchange_token`, `fetch_profile` and `normalize_profile` in that order.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Route segment and account `provider` column, e.g. `"igms"`
    fn id(&self) -> &str;

    /// Display name
    fn name(&self) -> &str;

    fn provider_type(&self) -> &str {
        "oauth"
    }

    fn callback_url(&self) -> &str;

    fn authorization_url(&self, state: &str) -> Result<AuthorizationRequest, AuthError>;

    async fn exchange_token(
        &self,
        code: &str,
        pkce_verifier: Option<&str>,
    ) -> Result<TokenSet, AuthError>;

    /// Raw user-info payload, shape is provider specific
    async fn fetch_profile(&self, tokens: &TokenSet) -> Result<serde_json::Value, AuthError>;

    fn normalize_profile(&self, profile: serde_json::Value) -> Result<Identity, AuthError>;
}

/// Run the post-redirect half of a handshake. Each step needs the previous
/// step's output, so a failure stops the sequence there.
pub async fn complete_handshake(
    provider: &dyn OAuthProvider,
    code: &str,
    pkce_verifier: Option<&str>,
) -> Result<(TokenSet, Identity), AuthError> {
    let tokens = provider.exchange_token(code, pkce_verifier).await?;
    let profile = provider.fetch_profile(&tokens).await?;
    let identity = provider.normalize_profile(profile)?;
    Ok((tokens, identity))
}
