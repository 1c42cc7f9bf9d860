//! HostDesk Authentication Library
//!
//! Sign-in for HostDesk through Discord (standard OAuth2) and IGMS, the
//! property-management platform whose OAuth-like handshake needs custom
//! token and profile requests. Users, linked accounts and sessions are kept
//! in a database behind the [`adapter::Adapter`] trait.
//!
//! # Features
//!
//! - Pluggable providers through the [`providers::OAuthProvider`] trait
//! - Database sessions with configurable lifetime, referenced by a private cookie
//! - A session callback shaping the payload handed to request handlers
//! - `/api/auth` routes: providers, sign-in, callback, session, sign-out
//! - Server-side session accessor and middleware for protecting routes
//!
//! # Example
//!
//! ```no_run
//! use hostdesk_auth::{AuthConfig, AuthOptions, AuthService, AuthState, SqliteAdapter};
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), hostdesk_auth::AuthError> {
//!     let config = AuthConfig::default();
//!     let adapter = Arc::new(SqliteAdapter::open_in_memory()?);
//!     let options = AuthOptions::from_config(config, adapter)?;
//!     let auth_state = AuthState::new(Arc::new(AuthService::new(options)?));
//!     // Mount hostdesk_auth::auth_routes() with auth_state under /api/auth
//!     # let _ = auth_state;
//!     Ok(())
//! }
//! ```

pub mod accessor;
pub mod adapter;
pub mod config;
pub mod error;
pub mod middleware;
pub mod providers;
pub mod routes;
pub mod service;
pub mod session;
pub mod views;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use std::ops::Deref;
use std::sync::Arc;

// Re-export commonly used types
pub use accessor::{get_server_session, ServerSession};
pub use adapter::{Adapter, SqliteAdapter};
pub use config::AuthConfig;
pub use error::AuthError;
pub use middleware::{optional_auth, require_auth};
pub use providers::{Identity, OAuthProvider, TokenSet};
pub use routes::auth_routes;
pub use service::{AuthOptions, AuthService, CleanupStats};
pub use session::{enrich_session, Session, SessionUser};

/// State wrapper for AuthService that implements FromRef for Key
/// This allows PrivateCookieJar to extract the cookie key from state
#[derive(Clone)]
pub struct AuthState {
    inner: Arc<AuthService>,
}

impl AuthState {
    pub fn new(auth_service: Arc<AuthService>) -> Self {
        Self {
            inner: auth_service,
        }
    }
}

impl Deref for AuthState {
    type Target = AuthService;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl From<Arc<AuthService>> for AuthState {
    fn from(service: Arc<AuthService>) -> Self {
        Self::new(service)
    }
}

impl FromRef<AuthState> for Key {
    fn from_ref(state: &AuthState) -> Self {
        state.cookie_key()
    }
}
