//! Configuration file handling for amil.
//!
//! The configuration file is stored at `$AMIL_HOME/config.json` and holds the addresses and keys
//! of the hosted services along with reporting and polling settings.

use crate::model::BucketRule;
use crate::{utils, Result};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

const APP_NAME: &str = "amil";
const CONFIG_VERSION: u8 = 1;
const POLL_SECONDS: u64 = 5;
const SECRETS: &str = ".secrets";
const EXPORTS: &str = "exports";
const CONFIG_JSON: &str = "config.json";
const SESSION_JSON: &str = "session.json";
const TEST_DATA_JSON: &str = "test_data.json";

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$AMIL_HOME` and from there it loads `$AMIL_HOME/config.json`. It provides paths to
/// other items that are expected in a certain location within the home directory.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    secrets: PathBuf,
    exports: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
}

/// The values that `amil init` writes into a new configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub data_url: String,
    pub data_key: String,
    pub cloud_name: String,
    pub upload_preset: String,
}

impl Config {
    /// Creates the home directory, its subdirectories and an initial `config.json` built from
    /// `settings` along with default settings.
    ///
    /// # Errors
    /// - Returns an error if `settings.data_url` is not a URL or if any file operation fails.
    pub async fn create(dir: impl Into<PathBuf>, settings: Settings) -> Result<Self> {
        validate_url(&settings.data_url)?;

        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the amil home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let secrets = root.join(SECRETS);
        utils::make_dir(&secrets).await?;
        let exports = root.join(EXPORTS);
        utils::make_dir(&exports).await?;

        let config_path = root.join(CONFIG_JSON);
        let config_file = ConfigFile {
            data_url: settings.data_url,
            data_key: settings.data_key,
            cloud_name: settings.cloud_name,
            upload_preset: settings.upload_preset,
            ..ConfigFile::default()
        };
        config_file.save(&config_path).await?;

        Ok(Self {
            root,
            secrets,
            exports,
            config_path,
            config_file,
        })
    }

    /// This will
    /// - validate that `amil_home` exists and that the config file exists
    /// - load and validate the config file
    /// - validate that the secrets and exports directories exist
    /// - return the loaded configuration object
    pub async fn load(amil_home: impl Into<PathBuf>) -> Result<Self> {
        let maybe_relative = amil_home.into();
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("The amil home directory is missing, run 'amil init' first")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;

        let config = Self {
            root: root.clone(),
            secrets: root.join(SECRETS),
            exports: root.join(EXPORTS),
            config_path,
            config_file,
        };
        if !config.secrets.is_dir() {
            bail!(
                "The secrets directory is missing '{}'",
                config.secrets.display()
            )
        }
        if !config.exports.is_dir() {
            bail!(
                "The exports directory is missing '{}'",
                config.exports.display()
            )
        }
        Ok(config)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn secrets(&self) -> &Path {
        &self.secrets
    }

    /// Where exports go when no output path is given.
    pub fn exports(&self) -> &Path {
        &self.exports
    }

    /// The persisted login session.
    pub fn session_path(&self) -> PathBuf {
        self.secrets.join(SESSION_JSON)
    }

    /// The tables used in test mode.
    pub fn test_data_path(&self) -> PathBuf {
        self.root.join(TEST_DATA_JSON)
    }

    /// The base URL of the hosted backend, e.g. `https://xyz.supabase.co`.
    pub fn data_url(&self) -> &str {
        &self.config_file.data_url
    }

    /// The public API key of the hosted backend.
    pub fn data_key(&self) -> &str {
        &self.config_file.data_key
    }

    pub fn cloud_name(&self) -> &str {
        &self.config_file.cloud_name
    }

    pub fn upload_preset(&self) -> &str {
        &self.config_file.upload_preset
    }

    /// How voluntary giving is split into regular and irregular.
    pub fn bucket_rule(&self) -> BucketRule {
        self.config_file.bucket_rule
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.config_file.poll_seconds.max(1))
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "amil",
///   "config_version": 1,
///   "data_url": "https://xyz.supabase.co",
///   "data_key": "anon-key",
///   "cloud_name": "demo",
///   "upload_preset": "unsigned",
///   "bucket_rule": "sub_type",
///   "poll_seconds": 5
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "amil"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// Base URL of the hosted backend
    data_url: String,

    /// Public API key of the hosted backend
    #[serde(default)]
    data_key: String,

    /// Image host account name
    #[serde(default)]
    cloud_name: String,

    /// Unsigned upload preset of the image host
    #[serde(default)]
    upload_preset: String,

    #[serde(default)]
    bucket_rule: BucketRule,

    /// Seconds between polls of a watched table
    #[serde(default = "default_poll_seconds")]
    poll_seconds: u64,
}

fn default_poll_seconds() -> u64 {
    POLL_SECONDS
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            data_url: String::new(),
            data_key: String::new(),
            cloud_name: String::new(),
            upload_preset: String::new(),
            bucket_rule: BucketRule::default(),
            poll_seconds: POLL_SECONDS,
        }
    }
}

impl ConfigFile {
    /// Loads a ConfigFile asynchronously from the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or if it is not an amil config.
    async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: ConfigFile = utils::deserialize(path).await?;

        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );
        validate_url(&config.data_url)
            .with_context(|| format!("Invalid data_url in {}", path.display()))?;

        Ok(config)
    }

    /// Saves the ConfigFile to the specified path.
    async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
    }
}

fn validate_url(url: &str) -> Result<()> {
    let parsed = Url::parse(url).with_context(|| format!("'{url}' is not a valid URL"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!("'{url}' must be an http or https URL");
    }
    Ok(())
}
