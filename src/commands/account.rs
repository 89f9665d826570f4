use crate::api::DataService;
use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::model::Profile;
use crate::session::{self, Session, SessionStore};
use crate::Result;
use anyhow::Context;
use chrono::Local;

/// Checks the credentials and stores a session.
pub async fn login(
    service: &dyn DataService,
    store: &dyn SessionStore,
    username: &str,
    password: &str,
) -> Result<Out<Profile>> {
    let session = session::login(service, store, username, password).await?;
    Ok(Out::new(
        format!("Logged in as {}", session.profile.display_name()),
        session.profile,
    ))
}

/// Forgets the stored session. Logging out twice is fine.
pub async fn logout(store: &dyn SessionStore) -> Result<Out<()>> {
    session::logout(store)
        .await
        .context("Unable to remove the session")
        .pub_result(ErrorType::Auth)?;
    Ok("Logged out".into())
}

pub async fn whoami(store: &dyn SessionStore) -> Result<Out<Session>> {
    let Some(session) = session::current(store).await? else {
        return Ok("Not logged in".into());
    };
    let since = session
        .logged_in_at
        .with_timezone(&Local)
        .format("%d/%m/%Y %H:%M");
    let role = session.profile.role.as_deref().unwrap_or("-");
    Ok(Out::new(
        format!(
            "Logged in as {} ({}, role {role}) since {since}",
            session.profile.display_name(),
            session.profile.username
        ),
        session,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_login_whoami_logout() {
        let env = TestEnv::new().await;
        let out = whoami(env.store()).await.unwrap();
        assert_eq!(out.message(), "Not logged in");
        assert!(out.structure().is_none());

        let out = login(&*env.service(), env.store(), "admin", "admin123")
            .await
            .unwrap();
        assert_eq!(out.structure().unwrap().username, "admin");

        let out = whoami(env.store()).await.unwrap();
        assert!(out.message().starts_with("Logged in as"));
        assert_eq!(out.structure().unwrap().profile.username, "admin");

        logout(env.store()).await.unwrap();
        logout(env.store()).await.unwrap();
        assert!(whoami(env.store()).await.unwrap().structure().is_none());
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let env = TestEnv::new().await;
        let e = login(&*env.service(), env.store(), "admin", "nope")
            .await
            .unwrap_err();
        assert_eq!(ErrorType::of(&e), Some(ErrorType::Auth));
    }
}
