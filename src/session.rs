//! Login sessions.
//!
//! A session is an explicit value: the logged-in user's profile and the time of login. Where it is
//! kept between runs is up to a `SessionStore`. Credentials are checked against the `users` table
//! of the data service by exact comparison; there is no hashing, lockout or token issuance.

use crate::api::{DataService, Query};
use crate::error::{ErrorType, IntoResult};
use crate::model::{Profile, User, USERS};
use crate::{utils, Result};
use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const INVALID_CREDENTIALS: &str = "invalid username or password";

/// The logged-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub profile: Profile,
    pub logged_in_at: DateTime<Utc>,
}

/// Keeps the current session between runs.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns the stored session, if there is one.
    async fn load(&self) -> Result<Option<Session>>;

    async fn save(&self, session: &Session) -> Result<()>;

    /// Forgets the stored session. Clearing an empty store succeeds.
    async fn clear(&self) -> Result<()>;
}

/// Stores the session as JSON in a file that only the current user can read.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> Result<Option<Session>> {
        if !self.path.is_file() {
            return Ok(None);
        }
        match utils::deserialize::<Session>(&self.path).await {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                warn!("Ignoring an unreadable session file: {e:#}");
                Ok(None)
            }
        }
    }

    async fn save(&self, session: &Session) -> Result<()> {
        let data = serde_json::to_string_pretty(session).context("Unable to serialize session")?;
        utils::write_private(&self.path, data).await
    }

    async fn clear(&self) -> Result<()> {
        utils::remove(&self.path).await
    }
}

/// Keeps the session in memory only.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    session: Mutex<Option<Session>>,
}

#[async_trait::async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> Result<Option<Session>> {
        Ok(self.session.lock().await.clone())
    }

    async fn save(&self, session: &Session) -> Result<()> {
        *self.session.lock().await = Some(session.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.session.lock().await = None;
        Ok(())
    }
}

/// Checks `username` and `password` against the users table and stores a new session.
///
/// # Errors
/// - An `Auth` error that does not say which of the two was wrong.
/// - A `Fetch` error if the users table cannot be read.
pub async fn login(
    service: &dyn DataService,
    store: &dyn SessionStore,
    username: &str,
    password: &str,
) -> Result<Session> {
    let username = username.trim();
    let rows = service
        .select(USERS, &Query::new().eq("username", username).limit(1))
        .await
        .context("Unable to look up the user")
        .pub_result(ErrorType::Fetch)?;

    let user = rows.first().map(User::from_row).transpose()?;
    let user = match user {
        Some(user) if user.password_matches(password) => user,
        _ => {
            debug!("Login rejected for '{username}'");
            return Err(anyhow!(INVALID_CREDENTIALS)).pub_result(ErrorType::Auth);
        }
    };

    let session = Session {
        profile: user.profile(),
        logged_in_at: Utc::now(),
    };
    store.save(&session).await?;
    Ok(session)
}

/// Clears the stored session. Logging out twice is not an error.
pub async fn logout(store: &dyn SessionStore) -> Result<()> {
    store.clear().await
}

/// The stored session, if any.
pub async fn current(store: &dyn SessionStore) -> Result<Option<Session>> {
    store.load().await
}

/// The stored session, or an `Auth` error telling the user to log in.
pub async fn require_session(store: &dyn SessionStore) -> Result<Session> {
    current(store)
        .await?
        .context("You are not logged in, run 'amil login' first")
        .pub_result(ErrorType::Auth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MemoryService;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_login_and_logout() {
        let service = MemoryService::default();
        let store = MemorySessionStore::default();
        assert!(current(&store).await.unwrap().is_none());

        let session = login(&service, &store, "admin", "admin123").await.unwrap();
        assert_eq!(session.profile.username, "admin");
        assert_eq!(session.profile.display_name(), "Pengurus Amil");
        assert_eq!(current(&store).await.unwrap(), Some(session));

        logout(&store).await.unwrap();
        logout(&store).await.unwrap();
        assert!(current(&store).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_failures_look_the_same() {
        let service = MemoryService::default();
        let store = MemorySessionStore::default();

        let wrong_password = login(&service, &store, "admin", "nope").await.unwrap_err();
        let wrong_user = login(&service, &store, "nobody", "admin123")
            .await
            .unwrap_err();
        assert_eq!(ErrorType::of(&wrong_password), Some(ErrorType::Auth));
        assert_eq!(ErrorType::of(&wrong_user), Some(ErrorType::Auth));
        assert_eq!(format!("{wrong_password:#}"), format!("{wrong_user:#}"));
        assert!(format!("{wrong_user:#}").contains(INVALID_CREDENTIALS));
        assert!(current(&store).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_require_session() {
        let store = MemorySessionStore::default();
        let e = require_session(&store).await.unwrap_err();
        assert_eq!(ErrorType::of(&e), Some(ErrorType::Auth));
    }

    #[tokio::test]
    async fn test_file_store() {
        let dir = TempDir::new().unwrap();
        let store = FileSessionStore::new(dir.path().join("session.json"));
        assert!(store.load().await.unwrap().is_none());

        let service = MemoryService::default();
        let session = login(&service, &store, "bendahara", "kas2025").await.unwrap();
        let text = utils::read(&dir.path().join("session.json")).await.unwrap();
        assert!(!text.contains("kas2025"));

        let reopened = FileSessionStore::new(dir.path().join("session.json"));
        assert_eq!(reopened.load().await.unwrap(), Some(session));

        reopened.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_session_file_is_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        utils::write(&path, "not json").await.unwrap();
        let store = FileSessionStore::new(path);
        assert!(store.load().await.unwrap().is_none());
    }
}
