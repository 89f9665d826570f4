use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::{Config, Result, Settings};
use anyhow::Context;
use std::path::Path;

/// Creates the home directory, its subdirectories and an initial `config.json` built from
/// `settings` along with default settings.
///
/// # Arguments
/// - `amil_home` - The directory that will be the root of the home directory, e.g. `$HOME/amil`
/// - `settings` - The backend URL and key, and the image host account to upload to.
///
/// # Errors
/// - Returns a `Config` error if the URL is invalid or any file operation fails.
pub async fn init(amil_home: &Path, settings: Settings) -> Result<Out<()>> {
    let config = Config::create(amil_home, settings)
        .await
        .context("Unable to create the amil home directory and config")
        .pub_result(ErrorType::Config)?;
    Ok(format!(
        "Successfully created the amil home directory at {}",
        config.root().display()
    )
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn settings(url: &str) -> Settings {
        Settings {
            data_url: url.to_string(),
            data_key: "anon".to_string(),
            ..Settings::default()
        }
    }

    #[tokio::test]
    async fn test_init() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("amil");
        let out = init(&home, settings("https://example.supabase.co"))
            .await
            .unwrap();
        assert!(out.message().starts_with("Successfully created"));
        assert!(home.join("config.json").is_file());
        let config = Config::load(&home).await.unwrap();
        assert_eq!(config.data_url(), "https://example.supabase.co");
    }

    #[tokio::test]
    async fn test_init_bad_url() {
        let dir = TempDir::new().unwrap();
        let e = init(&dir.path().join("amil"), settings("not a url"))
            .await
            .unwrap_err();
        assert_eq!(ErrorType::of(&e), Some(ErrorType::Config));
    }
}
