use async_trait::async_trait;
use oauth2::{
    basic::{BasicClient, BasicTokenResponse},
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, HttpRequest, HttpResponse,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, RequestTokenError, Scope, TokenResponse,
    TokenUrl,
};
use serde::Deserialize;

use super::{AuthorizationRequest, Identity, OAuthProvider, TokenSet};
use crate::config::AuthConfig;
use crate::error::AuthError;

pub const DISCORD_PROVIDER_ID: &str = "discord";

const CDN_BASE: &str = "https://cdn.discordapp.com";

#[derive(Deserialize)]
struct DiscordUser {
    id: String,
    username: String,
    global_name: Option<String>,
    discriminator: Option<String>,
    avatar: Option<String>,
    email: Option<String>,
}

pub struct DiscordProvider {
    client: BasicClient,
    userinfo_url: String,
    redirect_url: String,
    http: reqwest::Client,
}

impl DiscordProvider {
    pub fn new(config: &AuthConfig, http: reqwest::Client) -> Result<Self, AuthError> {
        let discord = &config.discord;
        let client_id = discord
            .client_id
            .as_ref()
            .ok_or_else(|| AuthError::ConfigError("Discord client_id not configured".to_string()))?
            .clone();
        let client_secret = discord
            .client_secret
            .as_ref()
            .ok_or_else(|| {
                AuthError::ConfigError("Discord client_secret not configured".to_string())
            })?
            .clone();
        let redirect_url = match &discord.redirect_url {
            Some(url) => url.clone(),
            None => config.callback_url(DISCORD_PROVIDER_ID)?,
        };

        let client = BasicClient::new(
            ClientId::new(client_id),
            Some(ClientSecret::new(client_secret)),
            AuthUrl::new(discord.authorize_url.clone())?,
            Some(TokenUrl::new(discord.token_url.clone())?),
        )
        .set_redirect_uri(RedirectUrl::new(redirect_url.clone())?);

        Ok(Self {
            client,
            userinfo_url: discord.userinfo_url.clone(),
            redirect_url,
            http,
        })
    }
}

/// Send an oauth2 token request through the shared client so the configured
/// timeout applies to the exchange as well.
async fn send_oauth_request(
    http: reqwest::Client,
    request: HttpRequest,
) -> Result<HttpResponse, reqwest::Error> {
    let response = http
        .request(request.method, request.url.as_str())
        .headers(request.headers)
        .body(request.body)
        .send()
        .await?;

    let status_code = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await?.to_vec();

    Ok(HttpResponse {
        status_code,
        headers,
        body,
    })
}

fn token_set_from_response(response: &BasicTokenResponse) -> TokenSet {
    TokenSet {
        access_token: response.access_token().secret().clone(),
        refresh_token: response.refresh_token().map(|t| t.secret().clone()),
        expires_in: response.expires_in().map(|d| d.as_secs()),
        expires_at: None,
        token_type: Some(response.token_type().as_ref().to_string()),
        scope: response.scopes().map(|scopes| {
            scopes
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(" ")
        }),
    }
}

/// Avatar URL, falling back to the default avatar Discord assigns to users
/// without a custom one.
fn avatar_url(user: &DiscordUser) -> String {
    match &user.avatar {
        Some(hash) => {
            let format = if hash.starts_with("a_") { "gif" } else { "png" };
            format!("{}/avatars/{}/{}.{}", CDN_BASE, user.id, hash, format)
        }
        None => {
            let index = match user.discriminator.as_deref() {
                Some(d) if d != "0" => d.parse::<u64>().unwrap_or(0) % 5,
                _ => (user.id.parse::<u64>().unwrap_or(0) >> 22) % 6,
            };
            format!("{}/embed/avatars/{}.png", CDN_BASE, index)
        }
    }
}

#[async_trait]
impl OAuthProvider for DiscordProvider {
    fn id(&self) -> &str {
        DISCORD_PROVIDER_ID
    }

    fn name(&self) -> &str {
        "Discord"
    }

    fn callback_url(&self) -> &str {
        &self.redirect_url
    }

    fn authorization_url(&self, state: &str) -> Result<AuthorizationRequest, AuthError> {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let csrf_state = CsrfToken::new(state.to_string());

        let (url, _) = self
            .client
            .authorize_url(|| csrf_state)
            .add_scope(Scope::new("identify".to_string()))
            .add_scope(Scope::new("email".to_string()))
            .set_pkce_challenge(pkce_challenge)
            .url();

        Ok(AuthorizationRequest {
            url,
            pkce_verifier: Some(pkce_verifier.secret().clone()),
        })
    }

    async fn exchange_token(
        &self,
        code: &str,
        pkce_verifier: Option<&str>,
    ) -> Result<TokenSet, AuthError> {
        let mut token_request = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()));
        if let Some(verifier) = pkce_verifier {
            token_request =
                token_request.set_pkce_verifier(PkceCodeVerifier::new(verifier.to_string()));
        }

        let http = self.http.clone();
        let token_result = token_request
            .request_async(|request| send_oauth_request(http, request))
            .await
            .map_err(|e| match e {
                RequestTokenError::Request(e) => AuthError::NetworkError(e),
                other => AuthError::OAuthError(format!("Discord token exchange failed: {}", other)),
            })?;

        Ok(token_set_from_response(&token_result))
    }

    async fn fetch_profile(&self, tokens: &TokenSet) -> Result<serde_json::Value, AuthError> {
        let profile = self
            .http
            .get(&self.userinfo_url)
            .bearer_auth(&tokens.access_token)
            .send()
            .await?
            .error_for_status()?
            .json::<serde_json::Value>()
            .await?;

        Ok(profile)
    }

    fn normalize_profile(&self, profile: serde_json::Value) -> Result<Identity, AuthError> {
        let user: DiscordUser = serde_json::from_value(profile)?;
        let image = avatar_url(&user);

        Ok(Identity {
            name: Some(user.global_name.clone().unwrap_or_else(|| user.username.clone())),
            email: user.email.clone(),
            image: Some(image),
            id: user.id,
        })
    }
}
