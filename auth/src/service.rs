use axum_extra::extract::cookie::Key;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;
use std::collections::HashMap;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::adapter::{Adapter, DbSession, NewAccount, NewUser, User};
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::providers::{
    complete_handshake, DiscordProvider, Identity, IgmsProvider, OAuthProvider, TokenSet,
};
use crate::session::{enrich_session, PendingSignIn, Session, SessionCallback};

/// Everything the service needs, assembled once at startup.
pub struct AuthOptions {
    pub config: AuthConfig,
    pub adapter: Arc<dyn Adapter>,
    pub providers: Vec<Arc<dyn OAuthProvider>>,
    pub session_callback: SessionCallback,
}

impl AuthOptions {
    /// Standard setup: Discord and IGMS providers sharing one HTTP client,
    /// and the session callback that exposes the user id.
    pub fn from_config(config: AuthConfig, adapter: Arc<dyn Adapter>) -> Result<Self, AuthError> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .user_agent("HostDesk-Auth")
            .build()?;

        let providers: Vec<Arc<dyn OAuthProvider>> = vec![
            Arc::new(DiscordProvider::new(&config, http.clone())?),
            Arc::new(IgmsProvider::new(&config, http)?),
        ];

        Ok(Self {
            config,
            adapter,
            providers,
            session_callback: Arc::new(enrich_session),
        })
    }

    pub fn with_session_callback(mut self, callback: SessionCallback) -> Self {
        self.session_callback = callback;
        self
    }
}

/// Result of starting a sign-in
#[derive(Clone, Debug)]
pub struct SignInStart {
    /// Provider consent page to redirect the browser to
    pub authorization_url: String,
    /// Key of the pending sign-in, carried in the state cookie
    pub state_id: String,
}

/// What a cleanup pass removed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CleanupStats {
    pub pending_sign_ins: usize,
    pub sessions: usize,
}

/// Result of a completed sign-in
#[derive(Clone, Debug)]
pub struct SignInResult {
    pub session_token: String,
    pub session: Session,
    pub user: User,
    /// True when the user and account were created by this sign-in
    pub is_new_user: bool,
}

/// Main authentication service
pub struct AuthService {
    pub config: AuthConfig,
    adapter: Arc<dyn Adapter>,
    providers: Vec<Arc<dyn OAuthProvider>>,
    session_callback: SessionCallback,
    pending: Arc<RwLock<HashMap<String, PendingSignIn>>>,
    cookie_key: Key,
}

impl AuthService {
    pub fn new(options: AuthOptions) -> Result<Self, AuthError> {
        options.config.validate()?;

        let secret = options
            .config
            .secret
            .as_deref()
            .ok_or_else(|| AuthError::ConfigError("secret not configured".to_string()))?;
        let cookie_key = Key::derive_from(secret.as_bytes());

        let mut seen = std::collections::HashSet::new();
        for provider in &options.providers {
            if !seen.insert(provider.id().to_string()) {
                return Err(AuthError::ConfigError(format!(
                    "provider '{}' configured twice",
                    provider.id()
                )));
            }
        }

        Ok(Self {
            config: options.config,
            adapter: options.adapter,
            providers: options.providers,
            session_callback: options.session_callback,
            pending: Arc::new(RwLock::new(HashMap::new())),
            cookie_key,
        })
    }

    pub fn cookie_key(&self) -> Key {
        self.cookie_key.clone()
    }

    pub fn adapter(&self) -> &Arc<dyn Adapter> {
        &self.adapter
    }

    /// Configured providers, in configuration order
    pub fn providers(&self) -> &[Arc<dyn OAuthProvider>] {
        &self.providers
    }

    pub fn provider(&self, provider_id: &str) -> Result<&Arc<dyn OAuthProvider>, AuthError> {
        self.providers
            .iter()
            .find(|p| p.id() == provider_id)
            .ok_or_else(|| AuthError::UnknownProvider(provider_id.to_string()))
    }

    /// Build the authorization redirect and remember what the callback needs.
    pub async fn start_sign_in(&self, provider_id: &str) -> Result<SignInStart, AuthError> {
        let provider = self.provider(provider_id)?;
        let csrf_state = Uuid::new_v4().to_string();
        let request = provider.authorization_url(&csrf_state)?;

        let now = OffsetDateTime::now_utc();
        let state_id = Uuid::new_v4().to_string();
        let pending = PendingSignIn {
            provider_id: provider_id.to_string(),
            csrf_state,
            pkce_verifier: request.pkce_verifier,
            created_at: now,
        };
        {
            // Abandoned sign-ins go away here too, not only on the cleanup timer
            let mut map = self.pending.write().await;
            map.retain(|_, p| !p.is_expired(now));
            map.insert(state_id.clone(), pending);
        }

        tracing::info!("Starting {} sign-in", provider.name());
        Ok(SignInStart {
            authorization_url: request.url.to_string(),
            state_id,
        })
    }

    /// Remove and return a pending sign-in. Each one can be used once.
    pub async fn take_pending_sign_in(&self, state_id: &str) -> Option<PendingSignIn> {
        self.pending.write().await.remove(state_id)
    }

    /// Finish a sign-in from the provider callback: run the handshake, link or
    /// create the user, and issue a database session. Nothing is written to
    /// the adapter unless the handshake succeeded.
    pub async fn complete_sign_in(
        &self,
        provider_id: &str,
        code: &str,
        returned_state: Option<&str>,
        pending: &PendingSignIn,
    ) -> Result<SignInResult, AuthError> {
        let provider = self.provider(provider_id)?;

        if pending.provider_id != provider_id || pending.is_expired(OffsetDateTime::now_utc()) {
            return Err(AuthError::InvalidState);
        }
        // IGMS does not always echo `state`; when it is present it must match.
        if let Some(state) = returned_state {
            if state != pending.csrf_state {
                return Err(AuthError::InvalidState);
            }
        }

        let (tokens, identity) =
            complete_handshake(&**provider, code, pending.pkce_verifier.as_deref())
                .await
                .map_err(|e| {
                    tracing::warn!("{} sign-in failed: {}", provider.name(), e);
                    e
                })?;

        let (user, is_new_user) = self.link_identity(provider_id, &identity, &tokens).await?;
        let (session_token, session) = self.create_session(&user).await?;

        tracing::info!(
            "{} sign-in complete for user {} (new: {})",
            provider.name(),
            user.id,
            is_new_user
        );
        Ok(SignInResult {
            session_token,
            session,
            user,
            is_new_user,
        })
    }

    /// Returning users are found through their linked account. New identities
    /// get a fresh user, unless the email already belongs to a user who signed
    /// in through another provider.
    async fn link_identity(
        &self,
        provider_id: &str,
        identity: &Identity,
        tokens: &TokenSet,
    ) -> Result<(User, bool), AuthError> {
        if let Some(user) = self
            .adapter
            .get_user_by_account(provider_id, &identity.id)
            .await?
        {
            return Ok((user, false));
        }

        if let Some(email) = &identity.email {
            if self.adapter.get_user_by_email(email).await?.is_some() {
                return Err(AuthError::OAuthAccountNotLinked(email.clone()));
            }
        }

        let now = OffsetDateTime::now_utc().unix_timestamp();
        let (user, _account) = self
            .adapter
            .create_user_with_account(
                NewUser {
                    name: identity.name.clone(),
                    email: identity.email.clone(),
                    image: identity.image.clone(),
                },
                NewAccount {
                    account_type: "oauth".to_string(),
                    provider: provider_id.to_string(),
                    provider_account_id: identity.id.clone(),
                    access_token: Some(tokens.access_token.clone()),
                    refresh_token: tokens.refresh_token.clone(),
                    expires_at: tokens.absolute_expiry(now),
                    token_type: tokens.token_type.clone(),
                    scope: tokens.scope.clone(),
                },
            )
            .await?;

        Ok((user, true))
    }

    async fn create_session(&self, user: &User) -> Result<(String, Session), AuthError> {
        let expires = OffsetDateTime::now_utc()
            .checked_add(self.config.session_max_age()?)
            .ok_or_else(|| AuthError::ConfigError("session expiry out of range".to_string()))?;
        let db_session = self
            .adapter
            .create_session(DbSession {
                session_token: generate_session_token(),
                user_id: user.id.clone(),
                expires,
            })
            .await?;

        let session = (self.session_callback)(Session::from_user(user, db_session.expires), user);
        Ok((db_session.session_token, session))
    }

    /// Resolve a session token. Unknown and expired tokens resolve to `None`;
    /// expired ones are deleted on the way.
    pub async fn resolve_session(&self, session_token: &str) -> Result<Option<Session>, AuthError> {
        let Some((db_session, user)) = self.adapter.get_session_and_user(session_token).await?
        else {
            tracing::debug!("Session token not found");
            return Ok(None);
        };

        if db_session.is_expired(OffsetDateTime::now_utc()) {
            tracing::debug!("Session for user {} expired", user.id);
            self.adapter.delete_session(session_token).await?;
            return Ok(None);
        }

        let session = Session::from_user(&user, db_session.expires);
        Ok(Some((self.session_callback)(session, &user)))
    }

    /// Remove session (logout)
    pub async fn sign_out(&self, session_token: &str) -> Result<(), AuthError> {
        self.adapter.delete_session(session_token).await
    }

    /// Drop expired pending sign-ins and database sessions
    pub async fn cleanup_expired(&self) -> Result<CleanupStats, AuthError> {
        let now = OffsetDateTime::now_utc();
        let pending_sign_ins = {
            let mut map = self.pending.write().await;
            let before = map.len();
            map.retain(|_, pending| !pending.is_expired(now));
            before - map.len()
        };
        let sessions = self.adapter.delete_expired_sessions(now).await?;
        Ok(CleanupStats {
            pending_sign_ins,
            sessions,
        })
    }
}

/// 32 random bytes, URL-safe base64
fn generate_session_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
