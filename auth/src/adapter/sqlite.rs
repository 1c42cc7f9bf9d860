use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{Account, Adapter, DbSession, NewAccount, NewUser, User};
use crate::error::AuthError;

const USER_COLUMNS: &str = "users.id, users.name, users.email, users.email_verified, users.image";

/// SQLite-backed adapter. One connection, serialized behind an async mutex.
#[derive(Clone)]
pub struct SqliteAdapter {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteAdapter {
    /// Open (or create) the database file and apply the schema.
    pub fn open(db_path: &Path) -> Result<Self, AuthError> {
        let conn = Connection::open(db_path)?;

        // pragma_update rather than execute: journal_mode returns a row
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, AuthError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, AuthError> {
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        conn.execute_batch(include_str!("../../migrations/001_auth_schema.sql"))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        email_verified: row.get(3)?,
        image: row.get(4)?,
    })
}

fn account_from_row(row: &Row) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        user_id: row.get(1)?,
        account_type: row.get(2)?,
        provider: row.get(3)?,
        provider_account_id: row.get(4)?,
        access_token: row.get(5)?,
        refresh_token: row.get(6)?,
        expires_at: row.get(7)?,
        token_type: row.get(8)?,
        scope: row.get(9)?,
    })
}

fn timestamp_to_datetime(ts: i64) -> rusqlite::Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(ts).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Integer, Box::new(e))
    })
}

#[async_trait]
impl Adapter for SqliteAdapter {
    async fn create_user_with_account(
        &self,
        user: NewUser,
        account: NewAccount,
    ) -> Result<(User, Account), AuthError> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        let user = User {
            id: Uuid::new_v4().to_string(),
            name: user.name,
            email: user.email,
            email_verified: None,
            image: user.image,
        };
        tx.execute(
            "INSERT INTO users (id, name, email, email_verified, image) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![user.id, user.name, user.email, user.email_verified, user.image],
        )?;

        let account = Account {
            id: Uuid::new_v4().to_string(),
            user_id: user.id.clone(),
            account_type: account.account_type,
            provider: account.provider,
            provider_account_id: account.provider_account_id,
            access_token: account.access_token,
            refresh_token: account.refresh_token,
            expires_at: account.expires_at,
            token_type: account.token_type,
            scope: account.scope,
        };
        tx.execute(
            "INSERT INTO accounts (id, user_id, type, provider, provider_account_id,
                access_token, refresh_token, expires_at, token_type, scope)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                account.id,
                account.user_id,
                account.account_type,
                account.provider,
                account.provider_account_id,
                account.access_token,
                account.refresh_token,
                account.expires_at,
                account.token_type,
                account.scope,
            ],
        )?;

        tx.commit()?;
        Ok((user, account))
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>, AuthError> {
        let conn = self.conn.lock().await;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE users.id = ?1", USER_COLUMNS),
                params![id],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let conn = self.conn.lock().await;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE users.email = ?1", USER_COLUMNS),
                params![email],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    async fn get_user_by_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<Option<User>, AuthError> {
        let conn = self.conn.lock().await;
        let user = conn
            .query_row(
                &format!(
                    "SELECT {} FROM users
                     JOIN accounts ON accounts.user_id = users.id
                     WHERE accounts.provider = ?1 AND accounts.provider_account_id = ?2",
                    USER_COLUMNS
                ),
                params![provider, provider_account_id],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    async fn get_accounts_for_user(&self, user_id: &str) -> Result<Vec<Account>, AuthError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, type, provider, provider_account_id,
                    access_token, refresh_token, expires_at, token_type, scope
             FROM accounts WHERE user_id = ?1 ORDER BY provider",
        )?;
        let accounts = stmt
            .query_map(params![user_id], account_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(accounts)
    }

    async fn create_session(&self, session: DbSession) -> Result<DbSession, AuthError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO sessions (session_token, user_id, expires) VALUES (?1, ?2, ?3)",
            params![
                session.session_token,
                session.user_id,
                session.expires.unix_timestamp()
            ],
        )?;
        Ok(session)
    }

    async fn get_session_and_user(
        &self,
        session_token: &str,
    ) -> Result<Option<(DbSession, User)>, AuthError> {
        let conn = self.conn.lock().await;
        let found = conn
            .query_row(
                &format!(
                    "SELECT {}, sessions.session_token, sessions.expires FROM sessions
                     JOIN users ON users.id = sessions.user_id
                     WHERE sessions.session_token = ?1",
                    USER_COLUMNS
                ),
                params![session_token],
                |row| {
                    let user = user_from_row(row)?;
                    let session = DbSession {
                        session_token: row.get(5)?,
                        user_id: user.id.clone(),
                        expires: timestamp_to_datetime(row.get(6)?)?,
                    };
                    Ok((session, user))
                },
            )
            .optional()?;
        Ok(found)
    }

    async fn delete_session(&self, session_token: &str) -> Result<(), AuthError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "DELETE FROM sessions WHERE session_token = ?1",
            params![session_token],
        )?;
        Ok(())
    }

    async fn delete_expired_sessions(&self, now: OffsetDateTime) -> Result<usize, AuthError> {
        let conn = self.conn.lock().await;
        let removed = conn.execute(
            "DELETE FROM sessions WHERE expires <= ?1",
            params![now.unix_timestamp()],
        )?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: Some("A".to_string()),
            email: Some(email.to_string()),
            image: Some("u".to_string()),
        }
    }

    fn new_account(provider: &str, provider_account_id: &str) -> NewAccount {
        NewAccount {
            account_type: "oauth".to_string(),
            provider: provider.to_string(),
            provider_account_id: provider_account_id.to_string(),
            access_token: Some("T1".to_string()),
            refresh_token: None,
            expires_at: Some(1_900_000_000),
            token_type: Some("bearer".to_string()),
            scope: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_lookup_user_by_account() {
        let adapter = SqliteAdapter::open_in_memory().unwrap();
        let (user, account) = adapter
            .create_user_with_account(new_user("a@x.com"), new_account("igms", "h2"))
            .await
            .unwrap();

        assert_eq!(account.user_id, user.id);
        let by_account = adapter.get_user_by_account("igms", "h2").await.unwrap();
        assert_eq!(by_account, Some(user.clone()));
        let by_email = adapter.get_user_by_email("a@x.com").await.unwrap();
        assert_eq!(by_email, Some(user.clone()));
        assert_eq!(adapter.get_user(&user.id).await.unwrap(), Some(user.clone()));

        let accounts = adapter.get_accounts_for_user(&user.id).await.unwrap();
        assert_eq!(accounts, vec![account]);

        assert_eq!(adapter.get_user_by_account("igms", "h1").await.unwrap(), None);
        assert_eq!(adapter.get_user_by_account("discord", "h2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_failed_link_leaves_no_user_behind() {
        let adapter = SqliteAdapter::open_in_memory().unwrap();
        adapter
            .create_user_with_account(new_user("a@x.com"), new_account("igms", "h2"))
            .await
            .unwrap();

        // Same provider account again: the unique constraint rejects the
        // account insert and the user insert must roll back with it.
        let result = adapter
            .create_user_with_account(new_user("b@x.com"), new_account("igms", "h2"))
            .await;
        assert!(matches!(result, Err(AuthError::DatabaseError(_))));
        assert_eq!(adapter.get_user_by_email("b@x.com").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let adapter = SqliteAdapter::open_in_memory().unwrap();
        let (user, _) = adapter
            .create_user_with_account(new_user("a@x.com"), new_account("igms", "h2"))
            .await
            .unwrap();

        let now = OffsetDateTime::from_unix_timestamp(1_800_000_000).unwrap();
        let live = DbSession {
            session_token: "live".to_string(),
            user_id: user.id.clone(),
            expires: now + Duration::days(1),
        };
        let stale = DbSession {
            session_token: "stale".to_string(),
            user_id: user.id.clone(),
            expires: now - Duration::seconds(1),
        };
        adapter.create_session(live.clone()).await.unwrap();
        adapter.create_session(stale).await.unwrap();

        let (session, session_user) = adapter.get_session_and_user("live").await.unwrap().unwrap();
        assert_eq!(session, live);
        assert_eq!(session_user, user);

        assert_eq!(adapter.delete_expired_sessions(now).await.unwrap(), 1);
        assert!(adapter.get_session_and_user("stale").await.unwrap().is_none());

        adapter.delete_session("live").await.unwrap();
        assert!(adapter.get_session_and_user("live").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_foreign_keys_enabled() {
        let adapter = SqliteAdapter::open_in_memory().unwrap();
        let orphan = DbSession {
            session_token: "orphan".to_string(),
            user_id: "missing-user".to_string(),
            expires: OffsetDateTime::now_utc(),
        };
        let result = adapter.create_session(orphan).await;
        assert!(matches!(result, Err(AuthError::DatabaseError(_))));
    }
}
