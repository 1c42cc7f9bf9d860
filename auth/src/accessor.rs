//! Server-side access to the current session.
//!
//! ```rust,ignore
//! async fn dashboard(ServerSession(session): ServerSession) -> impl IntoResponse {
//!     match session {
//!         Some(s) => format!("Hello, {}", s.user.id.unwrap_or_default()),
//!         None => "Hello, guest".to_string(),
//!     }
//! }
//! ```

use axum::extract::FromRequestParts;
use axum::http::{request::Parts, StatusCode};
use axum_extra::extract::cookie::PrivateCookieJar;

use crate::error::AuthError;
use crate::session::Session;
use crate::AuthState;

/// Current session for a request, or `None` when the request is not
/// authenticated. Errors come only from the adapter.
pub async fn get_server_session(
    auth_state: &AuthState,
    jar: &PrivateCookieJar,
) -> Result<Option<Session>, AuthError> {
    let Some(cookie) = jar.get(&auth_state.config.session.cookie_name) else {
        return Ok(None);
    };
    auth_state.resolve_session(cookie.value()).await
}

/// Extractor form of [`get_server_session`]
#[derive(Clone, Debug)]
pub struct ServerSession(pub Option<Session>);

impl FromRequestParts<AuthState> for ServerSession {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AuthState,
    ) -> Result<Self, Self::Rejection> {
        let jar: PrivateCookieJar = match PrivateCookieJar::from_request_parts(parts, state).await
        {
            Ok(jar) => jar,
            Err(never) => match never {},
        };

        get_server_session(state, &jar)
            .await
            .map(ServerSession)
            .map_err(|e| {
                tracing::error!("Session lookup failed: {}", e);
                StatusCode::from(e)
            })
    }
}
