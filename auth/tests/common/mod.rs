//! Mock provider endpoints and service setup shared by the integration tests.

#![allow(dead_code)]

use axum::{
    extract::Query,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use hostdesk_auth::{AuthConfig, AuthOptions, AuthService, AuthState, SqliteAdapter};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TEST_SECRET: &str = "0123456789abcdef0123456789abcdef";

/// Canned replies for one mock server instance
#[derive(Clone)]
pub struct MockReplies {
    pub igms_token: (StatusCode, Value),
    pub igms_hosts: Value,
    pub discord_token: Value,
    pub discord_user: Value,
    /// Hold both token endpoints this long before answering
    pub token_delay: Option<Duration>,
}

impl Default for MockReplies {
    fn default() -> Self {
        Self {
            igms_token: (StatusCode::OK, json!({ "access_token": "T1" })),
            igms_hosts: json!({
                "data": [
                    {
                        "platform_type": "vrbo",
                        "host_uid": "h1",
                        "name": "V",
                        "email": ["v@x.com"],
                        "thumbnail_url": null
                    },
                    {
                        "platform_type": "airbnb",
                        "host_uid": "h2",
                        "name": "A",
                        "email": ["a@x.com"],
                        "thumbnail_url": "u"
                    }
                ]
            }),
            discord_token: json!({
                "access_token": "D1",
                "token_type": "Bearer",
                "expires_in": 604800,
                "refresh_token": "R1",
                "scope": "identify email"
            }),
            discord_user: json!({
                "id": "80351110224678912",
                "username": "nelly",
                "global_name": "Nelly",
                "discriminator": "0",
                "avatar": null,
                "email": "nelly@example.com"
            }),
            token_delay: None,
        }
    }
}

/// Handle on a running mock server
pub struct MockProviders {
    pub base_url: String,
    pub igms_token_calls: Arc<AtomicUsize>,
    pub igms_hosts_calls: Arc<AtomicUsize>,
    pub igms_token_query: Arc<Mutex<Option<HashMap<String, String>>>>,
    pub igms_hosts_query: Arc<Mutex<Option<HashMap<String, String>>>>,
}

impl MockProviders {
    pub fn token_calls(&self) -> usize {
        self.igms_token_calls.load(Ordering::SeqCst)
    }

    pub fn hosts_calls(&self) -> usize {
        self.igms_hosts_calls.load(Ordering::SeqCst)
    }
}

/// Serve IGMS and Discord endpoints on an ephemeral local port.
pub async fn spawn_mock_providers(replies: MockReplies) -> MockProviders {
    let igms_token_calls = Arc::new(AtomicUsize::new(0));
    let igms_hosts_calls = Arc::new(AtomicUsize::new(0));
    let igms_token_query = Arc::new(Mutex::new(None));
    let igms_hosts_query = Arc::new(Mutex::new(None));

    let token_delay = replies.token_delay;

    let token_route = {
        let calls = igms_token_calls.clone();
        let seen = igms_token_query.clone();
        let (status, body) = replies.igms_token.clone();
        get(move |Query(query): Query<HashMap<String, String>>| {
            calls.fetch_add(1, Ordering::SeqCst);
            *seen.lock().unwrap() = Some(query);
            let body = body.clone();
            async move {
                if let Some(delay) = token_delay {
                    tokio::time::sleep(delay).await;
                }
                (status, Json(body))
            }
        })
    };

    let hosts_route = {
        let calls = igms_hosts_calls.clone();
        let seen = igms_hosts_query.clone();
        let body = replies.igms_hosts.clone();
        get(move |Query(query): Query<HashMap<String, String>>| {
            calls.fetch_add(1, Ordering::SeqCst);
            *seen.lock().unwrap() = Some(query);
            let body = body.clone();
            async move { Json(body) }
        })
    };

    let discord_token = replies.discord_token.clone();
    let discord_user = replies.discord_user.clone();

    let app = Router::new()
        .route("/auth/token", token_route)
        .route("/api/v1/hosts", hosts_route)
        .route(
            "/api/oauth2/token",
            post(move || {
                let body = discord_token.clone();
                async move {
                    if let Some(delay) = token_delay {
                        tokio::time::sleep(delay).await;
                    }
                    Json(body)
                }
            }),
        )
        .route(
            "/api/users/@me",
            get(move || {
                let body = discord_user.clone();
                async move { Json(body) }
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockProviders {
        base_url: format!("http://{}", addr),
        igms_token_calls,
        igms_hosts_calls,
        igms_token_query,
        igms_hosts_query,
    }
}

/// Configuration pointing both providers at the mock server
pub fn test_config(mock_base_url: &str) -> AuthConfig {
    let mut config = AuthConfig {
        base_url: Some("http://localhost:3000".to_string()),
        secret: Some(TEST_SECRET.to_string()),
        http_timeout_seconds: 5,
        ..AuthConfig::default()
    };
    config.discord.client_id = Some("discord-client".to_string());
    config.discord.client_secret = Some("discord-secret".to_string());
    config.discord.token_url = format!("{}/api/oauth2/token", mock_base_url);
    config.discord.userinfo_url = format!("{}/api/users/@me", mock_base_url);
    config.igms.client_id = Some("igms-client".to_string());
    config.igms.client_secret = Some("igms-secret".to_string());
    config.igms.domain = mock_base_url.to_string();
    config
}

pub fn test_service(config: AuthConfig) -> Arc<AuthService> {
    let adapter = Arc::new(SqliteAdapter::open_in_memory().unwrap());
    let options = AuthOptions::from_config(config, adapter).unwrap();
    Arc::new(AuthService::new(options).unwrap())
}

pub fn test_state(config: AuthConfig) -> AuthState {
    AuthState::new(test_service(config))
}
