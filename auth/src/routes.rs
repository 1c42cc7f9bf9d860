use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::accessor::get_server_session;
use crate::config::AUTH_BASE_PATH;
use crate::error::AuthError;
use crate::session::PENDING_SIGN_IN_TTL_SECONDS;
use crate::views::{error_page_html, sign_in_page_html};
use crate::AuthState;

/// Cookie holding the pending sign-in id between redirect and callback
pub const OAUTH_STATE_COOKIE: &str = "hostdesk.oauth-state";

#[derive(Deserialize)]
struct AuthCallback {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Deserialize)]
struct ErrorQuery {
    error: Option<String>,
}

/// Entry of the `/providers` listing
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfo {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub provider_type: String,
    pub signin_url: String,
    pub callback_url: String,
}

/// Create authentication routes, to be nested under `/api/auth`
pub fn auth_routes() -> Router<AuthState> {
    Router::new()
        .route("/providers", get(list_providers))
        .route("/signin", get(sign_in_page))
        .route("/signin/{provider}", get(sign_in))
        .route("/callback/{provider}", get(callback))
        .route("/session", get(current_session))
        .route("/signout", post(sign_out))
        .route("/error", get(error_page))
}

fn error_redirect(kind: &str) -> Response {
    Redirect::to(&format!("{}/error?error={}", AUTH_BASE_PATH, kind)).into_response()
}

/// Helper to create session cookie
fn create_session_cookie(
    auth_state: &AuthState,
    session_token: String,
    expires: time::OffsetDateTime,
) -> Cookie<'static> {
    let cookie_name = auth_state.config.session.cookie_name.clone();
    let mut cookie = Cookie::new(cookie_name, session_token);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    if auth_state.config.session.secure {
        cookie.set_secure(true);
    }
    cookie.set_expires(expires);
    cookie
}

/// Helper to create OAuth state cookie (temporary, for OAuth flow)
fn create_oauth_state_cookie(state_id: String, secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::new(OAUTH_STATE_COOKIE, state_id);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    if secure {
        cookie.set_secure(true);
    }
    cookie.set_max_age(time::Duration::seconds(PENDING_SIGN_IN_TTL_SECONDS));
    cookie
}

fn removal_cookie(name: String) -> Cookie<'static> {
    let mut cookie = Cookie::from(name);
    cookie.set_path("/");
    cookie
}

async fn list_providers(
    State(auth_state): State<AuthState>,
) -> Json<BTreeMap<String, ProviderInfo>> {
    let providers = auth_state
        .providers()
        .iter()
        .map(|p| {
            let info = ProviderInfo {
                id: p.id().to_string(),
                name: p.name().to_string(),
                provider_type: p.provider_type().to_string(),
                signin_url: format!(
                    "{}{}/signin/{}",
                    auth_state
                        .config
                        .base_url
                        .as_deref()
                        .unwrap_or_default()
                        .trim_end_matches('/'),
                    AUTH_BASE_PATH,
                    p.id()
                ),
                callback_url: p.callback_url().to_string(),
            };
            (info.id.clone(), info)
        })
        .collect();
    Json(providers)
}

async fn sign_in_page(
    State(auth_state): State<AuthState>,
    Query(query): Query<ErrorQuery>,
) -> Html<String> {
    let providers: Vec<(&str, &str)> = auth_state
        .providers()
        .iter()
        .map(|p| (p.id(), p.name()))
        .collect();
    Html(sign_in_page_html(&providers, query.error.as_deref()))
}

async fn sign_in(
    State(auth_state): State<AuthState>,
    jar: PrivateCookieJar,
    Path(provider_id): Path<String>,
) -> Result<(PrivateCookieJar, Response), StatusCode> {
    let start = auth_state.start_sign_in(&provider_id).await.map_err(|e| {
        tracing::warn!("Cannot start sign-in with '{}': {}", provider_id, e);
        StatusCode::from(e)
    })?;

    let state_cookie = create_oauth_state_cookie(start.state_id, auth_state.config.session.secure);
    let updated_jar = jar.add(state_cookie);

    Ok((
        updated_jar,
        (StatusCode::FOUND, [(header::LOCATION, start.authorization_url)]).into_response(),
    ))
}

async fn callback(
    State(auth_state): State<AuthState>,
    jar: PrivateCookieJar,
    Path(provider_id): Path<String>,
    Query(query): Query<AuthCallback>,
) -> (PrivateCookieJar, Response) {
    let state_id = jar.get(OAUTH_STATE_COOKIE).map(|c| c.value().to_string());
    let jar = jar.remove(removal_cookie(OAUTH_STATE_COOKIE.to_string()));

    if let Some(error) = &query.error {
        let description = query.error_description.as_deref().unwrap_or("Unknown error");
        tracing::warn!("{} returned an error: {} - {}", provider_id, error, description);
        return (jar, error_redirect("OAuthCallback"));
    }

    let Some(code) = query.code.as_deref() else {
        tracing::warn!("{} callback without an authorization code", provider_id);
        return (jar, error_redirect("OAuthCallback"));
    };

    let pending = match state_id {
        Some(id) => auth_state.take_pending_sign_in(&id).await,
        None => None,
    };
    let Some(pending) = pending else {
        return (jar, error_redirect(AuthError::InvalidState.error_kind()));
    };

    match auth_state
        .complete_sign_in(&provider_id, code, query.state.as_deref(), &pending)
        .await
    {
        Ok(result) => {
            let session_cookie = create_session_cookie(
                &auth_state,
                result.session_token,
                result.session.expires,
            );
            (jar.add(session_cookie), Redirect::to("/").into_response())
        }
        Err(e) => {
            tracing::error!("{} callback failed: {}", provider_id, e);
            (jar, error_redirect(e.error_kind()))
        }
    }
}

async fn current_session(State(auth_state): State<AuthState>, jar: PrivateCookieJar) -> Response {
    match get_server_session(&auth_state, &jar).await {
        Ok(Some(session)) => Json(session).into_response(),
        Ok(None) => Json(serde_json::json!({})).into_response(),
        Err(e) => {
            tracing::error!("Session lookup failed: {}", e);
            StatusCode::from(e).into_response()
        }
    }
}

async fn sign_out(
    State(auth_state): State<AuthState>,
    jar: PrivateCookieJar,
) -> Result<(PrivateCookieJar, Response), StatusCode> {
    let cookie_name = auth_state.config.session.cookie_name.clone();
    if let Some(cookie) = jar.get(&cookie_name) {
        auth_state.sign_out(cookie.value()).await.map_err(|e| {
            tracing::error!("Sign-out failed: {}", e);
            StatusCode::from(e)
        })?;
    }

    let updated_jar = jar.remove(removal_cookie(cookie_name));
    Ok((
        updated_jar,
        (StatusCode::FOUND, [(header::LOCATION, "/".to_string())]).into_response(),
    ))
}

async fn error_page(Query(query): Query<ErrorQuery>) -> (StatusCode, Html<String>) {
    let kind = query.error.as_deref().unwrap_or("Default");
    (StatusCode::BAD_REQUEST, Html(error_page_html(kind)))
}
