//! Configuration file management for potluck.
//!
//! Provides a TOML-based config file at `~/.config/potluck/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use potluck_db::config::DbConfig;

/// Environment variable naming the acting user.
pub const USER_ENV: &str = "POTLUCK_USER_ID";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    pub database: DatabaseSection,
    pub user: UserSection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserSection {
    pub id: Uuid,
    pub display_name: String,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the potluck config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/potluck` or `~/.config/potluck`,
/// also on macOS.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("potluck");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("potluck")
}

/// Return the path to the potluck config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    parse_config(&contents)
}

fn parse_config(contents: &str) -> Result<ConfigFile> {
    toml::from_str(contents).context("failed to parse config file")
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct PotluckConfig {
    pub db_config: DbConfig,
    /// The acting user, when one could be determined.
    pub user_id: Option<Uuid>,
    pub display_name: Option<String>,
}

impl PotluckConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - DB URL: `cli_db_url` > `POTLUCK_DATABASE_URL` > `database.url` > `DbConfig::DEFAULT_URL`
    /// - User: `cli_user` > `POTLUCK_USER_ID` > `user.id` > none
    pub fn resolve(cli_db_url: Option<&str>, cli_user: Option<Uuid>) -> Result<Self> {
        let file_config = load_config().ok();

        let db_url = if let Some(url) = cli_db_url {
            url.to_owned()
        } else if let Ok(url) = std::env::var(DbConfig::URL_ENV) {
            url
        } else if let Some(ref cfg) = file_config {
            cfg.database.url.clone()
        } else {
            DbConfig::DEFAULT_URL.to_owned()
        };

        let user_id = if let Some(id) = cli_user {
            Some(id)
        } else if let Ok(raw) = std::env::var(USER_ENV) {
            let id = Uuid::parse_str(raw.trim())
                .with_context(|| format!("{USER_ENV} is not a valid UUID: {raw:?}"))?;
            Some(id)
        } else {
            file_config.as_ref().map(|cfg| cfg.user.id)
        };

        // The configured name only belongs to the configured user.
        let display_name = file_config
            .filter(|cfg| Some(cfg.user.id) == user_id)
            .map(|cfg| cfg.user.display_name);

        Ok(Self {
            db_config: DbConfig::new(db_url),
            user_id,
            display_name,
        })
    }

    /// The acting user, or an error explaining how to set one.
    pub fn require_user(&self) -> Result<Uuid> {
        match self.user_id {
            Some(id) => Ok(id),
            None => bail!(
                "no user configured; pass --user, set {USER_ENV}, or run `potluck init`"
            ),
        }
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
