//! Persistence for users, linked provider accounts and database sessions.
//!
//! The service only talks to the [`Adapter`] trait; [`SqliteAdapter`] is the
//! implementation shipped with the crate.

pub mod sqlite;

pub use sqlite::SqliteAdapter;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::AuthError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    /// Unix timestamp of email verification, if the provider vouched for it
    pub email_verified: Option<i64>,
    pub image: Option<String>,
}

#[derive(Clone, Debug)]
pub struct NewUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,
}

/// External identity linked to a user
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub user_id: String,
    pub account_type: String,
    pub provider: String,
    pub provider_account_id: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<i64>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
}

#[derive(Clone, Debug)]
pub struct NewAccount {
    pub account_type: String,
    pub provider: String,
    pub provider_account_id: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<i64>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DbSession {
    pub session_token: String,
    pub user_id: String,
    pub expires: OffsetDateTime,
}

impl DbSession {
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires <= now
    }
}

#[async_trait]
pub trait Adapter: Send + Sync {
    /// Create a user and its first linked account in one transaction.
    async fn create_user_with_account(
        &self,
        user: NewUser,
        account: NewAccount,
    ) -> Result<(User, Account), AuthError>;

    async fn get_user(&self, id: &str) -> Result<Option<User>, AuthError>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AuthError>;

    async fn get_user_by_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<Option<User>, AuthError>;

    async fn get_accounts_for_user(&self, user_id: &str) -> Result<Vec<Account>, AuthError>;

    async fn create_session(&self, session: DbSession) -> Result<DbSession, AuthError>;

    async fn get_session_and_user(
        &self,
        session_token: &str,
    ) -> Result<Option<(DbSession, User)>, AuthError>;

    async fn delete_session(&self, session_token: &str) -> Result<(), AuthError>;

    /// Remove sessions that expired before `now`; returns how many were removed.
    async fn delete_expired_sessions(&self, now: OffsetDateTime) -> Result<usize, AuthError>;
}
