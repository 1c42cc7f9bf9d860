use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::OffsetDateTime;

use crate::adapter::User;

/// Pending sign-ins older than this are discarded
pub const PENDING_SIGN_IN_TTL_SECONDS: i64 = 600;

/// User part of the session payload handed to request handlers
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    /// Stable user id, filled in by the session callback
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,
}

/// Session payload returned by the session accessor and `/session`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: SessionUser,
    #[serde(with = "time::serde::rfc3339")]
    pub expires: OffsetDateTime,
}

impl Session {
    /// Default payload built from a user record, before any callback runs.
    pub fn from_user(user: &User, expires: OffsetDateTime) -> Self {
        Self {
            user: SessionUser {
                id: None,
                name: user.name.clone(),
                email: user.email.clone(),
                image: user.image.clone(),
            },
            expires,
        }
    }
}

/// Shapes the session payload before it leaves the service
pub type SessionCallback = Arc<dyn Fn(Session, &User) -> Session + Send + Sync>;

/// Copy the user's primary key onto the session so handlers can rely on
/// `session.user.id`.
pub fn enrich_session(session: Session, user: &User) -> Session {
    Session {
        user: SessionUser {
            id: Some(user.id.clone()),
            ..session.user
        },
        ..session
    }
}

/// State kept between the sign-in redirect and the provider callback
#[derive(Clone, Debug)]
pub struct PendingSignIn {
    pub provider_id: String,
    pub csrf_state: String,
    pub pkce_verifier: Option<String>,
    pub created_at: OffsetDateTime,
}

impl PendingSignIn {
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        (now - self.created_at).whole_seconds() > PENDING_SIGN_IN_TTL_SECONDS
    }
}
