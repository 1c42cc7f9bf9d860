//! IGMS handshake against a local mock of the IGMS endpoints.

mod common;

use axum::http::StatusCode;
use common::{spawn_mock_providers, test_config, MockReplies};
use hostdesk_auth::providers::{complete_handshake, IgmsProvider, OAuthProvider};
use hostdesk_auth::AuthError;
use serde_json::json;
use std::time::Duration;

fn provider(base_url: &str) -> IgmsProvider {
    IgmsProvider::new(&test_config(base_url), reqwest::Client::new()).unwrap()
}

#[tokio::test]
async fn test_airbnb_host_becomes_identity() {
    let mock = spawn_mock_providers(MockReplies::default()).await;
    let igms = provider(&mock.base_url);

    let (tokens, identity) = complete_handshake(&igms, "abc", None).await.unwrap();

    assert_eq!(tokens.access_token, "T1");
    assert_eq!(identity.id, "h2");
    assert_eq!(identity.name.as_deref(), Some("A"));
    assert_eq!(identity.email.as_deref(), Some("a@x.com"));
    assert_eq!(identity.image.as_deref(), Some("u"));
    assert_eq!(mock.token_calls(), 1);
    assert_eq!(mock.hosts_calls(), 1);
}

#[tokio::test]
async fn test_token_request_carries_client_credentials() {
    let mock = spawn_mock_providers(MockReplies::default()).await;
    let igms = provider(&mock.base_url);

    igms.exchange_token("abc", None).await.unwrap();

    let query = mock.igms_token_query.lock().unwrap().clone().unwrap();
    assert_eq!(query["grant_type"], "authorization_code");
    assert_eq!(query["code"], "abc");
    assert_eq!(query["client_id"], "igms-client");
    assert_eq!(query["client_secret"], "igms-secret");
    assert_eq!(
        query["redirect_uri"],
        "http://localhost:3000/api/auth/callback/igms"
    );
}

#[tokio::test]
async fn test_profile_request_passes_access_token() {
    let mock = spawn_mock_providers(MockReplies::default()).await;
    let igms = provider(&mock.base_url);

    complete_handshake(&igms, "abc", None).await.unwrap();

    let query = mock.igms_hosts_query.lock().unwrap().clone().unwrap();
    assert_eq!(query["access_token"], "T1");
}

#[tokio::test]
async fn test_no_hosts_is_profile_not_found() {
    let mock = spawn_mock_providers(MockReplies {
        igms_hosts: json!({ "data": [] }),
        ..MockReplies::default()
    })
    .await;
    let igms = provider(&mock.base_url);

    let result = complete_handshake(&igms, "abc", None).await;
    assert!(matches!(result, Err(AuthError::ProfileNotFound(_))));
}

#[tokio::test]
async fn test_only_other_platforms_is_profile_not_found() {
    let mock = spawn_mock_providers(MockReplies {
        igms_hosts: json!({
            "data": [
                { "platform_type": "vrbo", "host_uid": "h1", "name": "V", "email": ["v@x.com"] },
                { "platform_type": "booking", "host_uid": "h3", "name": "B", "email": [] }
            ]
        }),
        ..MockReplies::default()
    })
    .await;
    let igms = provider(&mock.base_url);

    let result = complete_handshake(&igms, "abc", None).await;
    assert!(matches!(result, Err(AuthError::ProfileNotFound(_))));
}

#[tokio::test]
async fn test_failed_token_exchange_skips_profile_request() {
    let mock = spawn_mock_providers(MockReplies {
        igms_token: (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": "server_error" }),
        ),
        ..MockReplies::default()
    })
    .await;
    let igms = provider(&mock.base_url);

    let result = complete_handshake(&igms, "abc", None).await;
    match result {
        Err(AuthError::NetworkError(e)) => {
            assert_eq!(e.status().map(|s| s.as_u16()), Some(500));
        }
        other => panic!("expected a transport error, got {:?}", other.map(|_| ())),
    }
    assert_eq!(mock.token_calls(), 1);
    assert_eq!(mock.hosts_calls(), 0);
}

#[tokio::test]
async fn test_unreachable_endpoint_is_network_error() {
    // Bind and drop to get a port with nothing listening
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let igms = provider(&format!("http://{}", addr));
    let result = complete_handshake(&igms, "abc", None).await;
    assert!(matches!(result, Err(AuthError::NetworkError(_))));
}

#[tokio::test]
async fn test_slow_token_endpoint_hits_configured_timeout() {
    let mock = spawn_mock_providers(MockReplies {
        token_delay: Some(Duration::from_secs(5)),
        ..MockReplies::default()
    })
    .await;
    let mut config = test_config(&mock.base_url);
    config.http_timeout_seconds = 1;
    let http = reqwest::Client::builder()
        .timeout(config.http_timeout())
        .build()
        .unwrap();
    let igms = IgmsProvider::new(&config, http).unwrap();

    let result = complete_handshake(&igms, "abc", None).await;
    match result {
        Err(AuthError::NetworkError(e)) => assert!(e.is_timeout()),
        other => panic!("expected a timeout, got {:?}", other.map(|_| ())),
    }
    assert_eq!(mock.token_calls(), 1);
    assert_eq!(mock.hosts_calls(), 0);
}
