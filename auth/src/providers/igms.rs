//! IGMS (property-management platform) sign-in.
//!
//! IGMS speaks an OAuth-like protocol that the generic clients cannot drive:
//! the token endpoint is called with GET and query parameters, and the user
//! profile is a list of connected host accounts rather than a single record.
//! The host whose `platform_type` matches the configured tag is taken as the
//! user's identity.

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use super::{AuthorizationRequest, Identity, OAuthProvider, TokenSet};
use crate::config::AuthConfig;
use crate::error::AuthError;

pub const IGMS_PROVIDER_ID: &str = "igms";

const AUTHORIZE_PATH: &str = "/app/auth.html";
const TOKEN_PATH: &str = "/auth/token";
const HOSTS_PATH: &str = "/api/v1/hosts";

/// Body of `GET /api/v1/hosts`
#[derive(Debug, Deserialize)]
pub struct IgmsHostResponse {
    #[serde(default)]
    pub data: Vec<IgmsHost>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct IgmsHost {
    pub platform_type: String,
    pub host_uid: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Vec<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

impl From<&IgmsHost> for Identity {
    fn from(host: &IgmsHost) -> Self {
        Identity {
            id: host.host_uid.clone(),
            name: host.name.clone(),
            email: host.email.first().cloned(),
            image: host.thumbnail_url.clone(),
        }
    }
}

/// First host in list order whose platform matches.
pub fn select_host<'a>(hosts: &'a [IgmsHost], platform: &str) -> Option<&'a IgmsHost> {
    hosts.iter().find(|host| host.platform_type == platform)
}

pub struct IgmsProvider {
    client_id: String,
    client_secret: String,
    application_id: String,
    scope: String,
    domain: Url,
    redirect_url: String,
    required_platform: String,
    http: reqwest::Client,
}

impl IgmsProvider {
    pub fn new(config: &AuthConfig, http: reqwest::Client) -> Result<Self, AuthError> {
        let igms = &config.igms;
        let client_id = igms
            .client_id
            .as_ref()
            .ok_or_else(|| AuthError::ConfigError("IGMS client_id not configured".to_string()))?
            .clone();
        let client_secret = igms
            .client_secret
            .as_ref()
            .ok_or_else(|| {
                AuthError::ConfigError("IGMS client_secret not configured".to_string())
            })?
            .clone();
        let redirect_url = match &igms.redirect_url {
            Some(url) => url.clone(),
            None => config.callback_url(IGMS_PROVIDER_ID)?,
        };

        Ok(Self {
            client_id,
            client_secret,
            application_id: igms.application_id.clone(),
            scope: igms.scope.clone(),
            domain: Url::parse(&igms.domain)?,
            redirect_url,
            required_platform: igms.required_platform.clone(),
            http,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, AuthError> {
        Ok(self.domain.join(path)?)
    }
}

#[async_trait]
impl OAuthProvider for IgmsProvider {
    fn id(&self) -> &str {
        IGMS_PROVIDER_ID
    }

    fn name(&self) -> &str {
        "IGMS"
    }

    fn callback_url(&self) -> &str {
        &self.redirect_url
    }

    fn authorization_url(&self, state: &str) -> Result<AuthorizationRequest, AuthError> {
        let mut url = self.endpoint(AUTHORIZE_PATH)?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.application_id)
            .append_pair("scope", &self.scope)
            .append_pair("redirect_uri", &self.redirect_url)
            .append_pair("state", state);

        Ok(AuthorizationRequest {
            url,
            pkce_verifier: None,
        })
    }

    async fn exchange_token(
        &self,
        code: &str,
        _pkce_verifier: Option<&str>,
    ) -> Result<TokenSet, AuthError> {
        let tokens = self
            .http
            .get(self.endpoint(TOKEN_PATH)?)
            .query(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_url.as_str()),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<TokenSet>()
            .await?;

        Ok(tokens)
    }

    async fn fetch_profile(&self, tokens: &TokenSet) -> Result<serde_json::Value, AuthError> {
        let profile = self
            .http
            .get(self.endpoint(HOSTS_PATH)?)
            .query(&[("access_token", tokens.access_token.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json::<serde_json::Value>()
            .await?;

        Ok(profile)
    }

    fn normalize_profile(&self, profile: serde_json::Value) -> Result<Identity, AuthError> {
        let response: IgmsHostResponse = serde_json::from_value(profile)?;
        tracing::debug!("IGMS returned {} host record(s)", response.data.len());

        let host = select_host(&response.data, &self.required_platform).ok_or_else(|| {
            AuthError::ProfileNotFound(format!(
                "no IGMS host with platform_type '{}'",
                self.required_platform
            ))
        })?;

        Ok(Identity::from(host))
    }
}
