mod config;

use axum::{
    middleware,
    response::Html,
    routing::get,
    Extension, Json, Router,
};
use hostdesk_auth::views::escape_html;
use hostdesk_auth::{
    auth_routes, require_auth, AuthOptions, AuthService, AuthState, CleanupStats, OAuthProvider,
    ServerSession, Session, SqliteAdapter,
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

fn build_router(auth_state: AuthState) -> Router {
    // Routes that only make sense for a signed-in user
    let protected = Router::new()
        .route("/api/me", get(current_user))
        .route_layer(middleware::from_fn_with_state(
            auth_state.clone(),
            require_auth,
        ));

    Router::new()
        .nest("/api/auth", auth_routes())
        .route("/", get(index))
        .route("/health", get(health_check))
        .merge(protected)
        .with_state(auth_state)
        .layer(TraceLayer::new_for_http())
}

/// Periodically drop expired sessions and abandoned sign-ins
fn spawn_cleanup_task(auth_service: Arc<AuthService>, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            match auth_service.cleanup_expired().await {
                Ok(stats) if stats == CleanupStats::default() => {}
                Ok(stats) => tracing::info!(
                    "Removed {} expired session(s) and {} abandoned sign-in(s)",
                    stats.sessions,
                    stats.pending_sign_ins
                ),
                Err(e) => tracing::error!("Cleanup failed: {}", e),
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::Config::load()?;

    // RUST_LOG wins over the configured level when set
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level().to_string()));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!("Starting HostDesk Server");
    tracing::info!("Configuration loaded:");
    tracing::info!("  Listen: {}:{}", config.server.host, config.server.port);
    tracing::info!("  Database: {}", config.database.path);
    tracing::info!(
        "  Base URL: {}",
        config.auth.base_url.as_deref().unwrap_or("<unset>")
    );
    tracing::info!("  Log level: {}", config.logging.level);

    let adapter = Arc::new(SqliteAdapter::open(Path::new(&config.database.path))?);
    let options = AuthOptions::from_config(config.auth.clone(), adapter).map_err(|e| {
        tracing::error!("Invalid authentication configuration: {}", e);
        e
    })?;
    let auth_service = Arc::new(AuthService::new(options)?);
    for provider in auth_service.providers() {
        tracing::info!("  Provider {}: callback {}", provider.name(), provider.callback_url());
    }

    spawn_cleanup_task(
        auth_service.clone(),
        Duration::from_secs(config.server.cleanup_interval_seconds.max(1)),
    );

    let app = build_router(AuthState::new(auth_service));

    let ip_addr = config.server.host.parse::<std::net::IpAddr>().unwrap_or_else(|e| {
        tracing::warn!("Failed to parse host '{}': {}. Using 0.0.0.0", config.server.host, e);
        [0, 0, 0, 0].into()
    });
    let addr = SocketAddr::from((ip_addr, config.server.port));

    tracing::info!("HTTP server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}

async fn index(ServerSession(session): ServerSession) -> Html<String> {
    let body = match session {
        Some(session) => format!(
            r#"<p>Signed in as {}</p>
<form method="post" action="/api/auth/signout"><button type="submit">Sign out</button></form>"#,
            escape_html(
                session
                    .user
                    .name
                    .as_deref()
                    .or(session.user.email.as_deref())
                    .unwrap_or("unknown user")
            )
        ),
        None => r#"<p><a href="/api/auth/signin">Sign in</a></p>"#.to_string(),
    };
    Html(format!(
        "<!DOCTYPE html>\n<html><head><title>HostDesk</title></head><body><h1>HostDesk</h1>{}</body></html>",
        body
    ))
}

async fn current_user(Extension(session): Extension<Session>) -> Json<Session> {
    Json(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    fn test_app(db_path: &Path) -> Router {
        let mut auth = hostdesk_auth::AuthConfig {
            base_url: Some("http://localhost:3000".to_string()),
            secret: Some("0123456789abcdef0123456789abcdef".to_string()),
            ..Default::default()
        };
        auth.discord.client_id = Some("discord-client".to_string());
        auth.discord.client_secret = Some("discord-secret".to_string());
        auth.igms.client_id = Some("igms-client".to_string());
        auth.igms.client_secret = Some("igms-secret".to_string());

        let adapter = Arc::new(SqliteAdapter::open(db_path).unwrap());
        let options = AuthOptions::from_config(auth, adapter).unwrap();
        build_router(AuthState::new(Arc::new(AuthService::new(options).unwrap())))
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(&dir.path().join("hostdesk.db"));

        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "OK");
    }

    #[tokio::test]
    async fn test_index_offers_sign_in_to_guests() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(&dir.path().join("hostdesk.db"));

        let response = app.oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains(r#"href="/api/auth/signin""#));
    }

    #[tokio::test]
    async fn test_protected_route_redirects_guests() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(&dir.path().join("hostdesk.db"));

        let response = app.oneshot(get("/api/me")).await.unwrap();
        assert!(response.status().is_redirection());
        assert_eq!(response.headers()[header::LOCATION], "/api/auth/signin");
    }

    #[tokio::test]
    async fn test_auth_routes_are_mounted() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(&dir.path().join("hostdesk.db"));

        let response = app.oneshot(get("/api/auth/signin")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("/api/auth/signin/discord"));
        assert!(html.contains("/api/auth/signin/igms"));
    }
}
