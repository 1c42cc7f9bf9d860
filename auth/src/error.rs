use axum::http::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("OAuth error: {0}")]
    OAuthError(String),

    /// The provider answered, but no profile record qualifies as the user's identity.
    #[error("User not found: {0}")]
    ProfileNotFound(String),

    #[error("Email {0} is already linked to an account from another provider")]
    OAuthAccountNotLinked(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Invalid or expired OAuth state")]
    InvalidState,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AuthError {
    /// Error code shown on the sign-in error page.
    pub fn error_kind(&self) -> &'static str {
        match self {
            AuthError::ConfigError(_) => "Configuration",
            AuthError::ProfileNotFound(_) => "UserNotFound",
            AuthError::OAuthAccountNotLinked(_) => "OAuthAccountNotLinked",
            AuthError::InvalidState => "Verification",
            AuthError::UnknownProvider(_) => "OAuthSignin",
            AuthError::NetworkError(_)
            | AuthError::JsonError(_)
            | AuthError::UrlError(_)
            | AuthError::DatabaseError(_)
            | AuthError::OAuthError(_) => "OAuthCallback",
        }
    }
}

impl From<AuthError> for StatusCode {
    fn from(error: AuthError) -> StatusCode {
        match error {
            AuthError::UnknownProvider(_) => StatusCode::NOT_FOUND,
            AuthError::InvalidState => StatusCode::BAD_REQUEST,
            AuthError::ProfileNotFound(_) | AuthError::OAuthAccountNotLinked(_) => {
                StatusCode::FORBIDDEN
            }
            AuthError::NetworkError(_) | AuthError::OAuthError(_) => StatusCode::BAD_GATEWAY,
            AuthError::JsonError(_)
            | AuthError::UrlError(_)
            | AuthError::DatabaseError(_)
            | AuthError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
