use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::PrivateCookieJar;

use crate::accessor::get_server_session;
use crate::config::AUTH_BASE_PATH;
use crate::AuthState;

/// Middleware to require authentication. The resolved [`crate::Session`] is
/// stored in the request extensions for handlers to use.
pub async fn require_auth(
    State(auth_state): State<AuthState>,
    jar: PrivateCookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    match get_server_session(&auth_state, &jar).await {
        Ok(Some(session)) => {
            request.extensions_mut().insert(session);
            next.run(request).await
        }
        Ok(None) => Redirect::to(&format!("{}/signin", AUTH_BASE_PATH)).into_response(),
        Err(e) => {
            tracing::error!("Session validation failed: {}", e);
            axum::http::StatusCode::from(e).into_response()
        }
    }
}

/// Middleware to optionally extract authentication info without requiring it
pub async fn optional_auth(
    State(auth_state): State<AuthState>,
    jar: PrivateCookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    match get_server_session(&auth_state, &jar).await {
        Ok(Some(session)) => {
            request.extensions_mut().insert(session);
        }
        Ok(None) => {}
        Err(e) => tracing::debug!("Session lookup failed: {}", e),
    }

    next.run(request).await
}
