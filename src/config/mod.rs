//! Configuration management for the parish application.
//!
//! This module handles loading and validating configuration settings from environment
//! variables, with sensible defaults. It covers where local state is stored, which
//! content API to talk to and how long to wait for it.
//!
//! # Environment Variables
//!
//! - `PARISH_DIR`: Path to the data directory (defaults to ~/.parish)
//! - `PARISH_API_URL`: Base URL of the content/session API
//! - `PARISH_TOKEN`: Bearer token for the API (defaults to empty)
//! - `PARISH_TIMEOUT_SECS`: HTTP request timeout in seconds (defaults to 15)
//! - `PARISH_SAVE_DEBOUNCE_MS`: Persistence debounce window in milliseconds (defaults to 250)
//! - `HOME`: Used for expanding the default data directory path

use crate::constants::{
    DATABASE_FILE_NAME, DEFAULT_API_URL, DEFAULT_DATA_SUBDIR, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_SAVE_DEBOUNCE_MS, ENV_VAR_HOME, ENV_VAR_PARISH_API_URL, ENV_VAR_PARISH_DIR,
    ENV_VAR_PARISH_SAVE_DEBOUNCE_MS, ENV_VAR_PARISH_TIMEOUT_SECS, ENV_VAR_PARISH_TOKEN,
    REDACTED_PLACEHOLDER,
};
use crate::errors::{AppError, AppResult};
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Configuration for the parish application.
///
/// # Examples
///
/// Creating a configuration manually:
/// ```
/// use parish::Config;
/// use std::path::PathBuf;
/// use std::time::Duration;
///
/// let config = Config {
///     data_dir: PathBuf::from("/path/to/data"),
///     api_url: "http://localhost:3000/api".to_string(),
///     auth_token: String::new(),
///     request_timeout: Duration::from_secs(5),
///     save_debounce: Duration::ZERO,
/// };
/// assert!(config.validate().is_ok());
/// ```
///
/// Loading configuration from environment variables:
/// ```no_run
/// use parish::Config;
/// use std::env;
///
/// env::set_var("PARISH_DIR", "/custom/data/path");
///
/// let config = Config::load().expect("Failed to load configuration");
/// assert_eq!(config.data_dir.to_str(), Some("/custom/data/path"));
/// ```
pub struct Config {
    /// Directory holding the local database.
    ///
    /// Loaded from `PARISH_DIR` with a fallback to ~/.parish.
    pub data_dir: PathBuf,

    /// Base URL of the content/session API, without a trailing slash.
    pub api_url: String,

    /// Bearer token sent with every API request.
    pub auth_token: String,

    /// Per-request HTTP timeout.
    pub request_timeout: Duration,

    /// How long persistence waits for further changes before writing.
    pub save_debounce: Duration,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("data_dir", &self.data_dir)
            .field("api_url", &self.api_url)
            .field("auth_token", &REDACTED_PLACEHOLDER)
            .field("request_timeout", &self.request_timeout)
            .field("save_debounce", &self.save_debounce)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from(""),
            api_url: DEFAULT_API_URL.to_string(),
            auth_token: String::new(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            save_debounce: Duration::from_millis(DEFAULT_SAVE_DEBOUNCE_MS),
        }
    }
}

impl Config {
    /// Loads configuration from environment variables with sensible defaults.
    ///
    /// The data directory path is expanded with `shellexpand`, so `~` and
    /// environment variable references work.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if:
    /// - The data directory path expansion fails or yields an empty path
    /// - A numeric variable is not a non-negative integer
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use parish::Config;
    ///
    /// match Config::load() {
    ///     Ok(config) => println!("Using API at {}", config.api_url),
    ///     Err(err) => eprintln!("Failed to load config: {}", err),
    /// }
    /// ```
    pub fn load() -> AppResult<Self> {
        let data_dir_str = env::var(ENV_VAR_PARISH_DIR).unwrap_or_else(|_| {
            let home = env::var(ENV_VAR_HOME).unwrap_or_default();
            format!("{}/{}", home, DEFAULT_DATA_SUBDIR)
        });

        // Expand the path (handles ~ and environment variables)
        let expanded_path = shellexpand::full(&data_dir_str)
            .map_err(|e| AppError::Config(format!("Failed to expand path: {}", e)))?;
        let data_dir = PathBuf::from(expanded_path.into_owned());

        if data_dir.as_os_str().is_empty() {
            return Err(AppError::Config("Data directory path is empty".to_string()));
        }

        let api_url = env::var(ENV_VAR_PARISH_API_URL)
            .ok()
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let auth_token = env::var(ENV_VAR_PARISH_TOKEN)
            .map(|token| token.trim().to_string())
            .unwrap_or_default();

        let request_timeout = Duration::from_secs(read_u64(
            ENV_VAR_PARISH_TIMEOUT_SECS,
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?);
        let save_debounce = Duration::from_millis(read_u64(
            ENV_VAR_PARISH_SAVE_DEBOUNCE_MS,
            DEFAULT_SAVE_DEBOUNCE_MS,
        )?);

        let config = Config {
            data_dir,
            api_url,
            auth_token,
            request_timeout,
            save_debounce,
        };
        debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    /// Validates that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` with one of the following messages:
    /// - "Data directory path is empty"
    /// - "Data directory must be an absolute path"
    /// - "API URL must start with http:// or https://"
    /// - "Request timeout must be greater than zero"
    pub fn validate(&self) -> AppResult<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(AppError::Config("Data directory path is empty".to_string()));
        }

        if !self.data_dir.is_absolute() {
            return Err(AppError::Config(
                "Data directory must be an absolute path".to_string(),
            ));
        }

        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(AppError::Config(
                "API URL must start with http:// or https://".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(AppError::Config(
                "Request timeout must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Path of the SQLite database inside the data directory.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE_NAME)
    }
}

fn read_u64(name: &str, default: u64) -> AppResult<u64> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().parse().map_err(|_| {
            AppError::Config(format!(
                "{} must be a non-negative integer, got '{}'",
                name, raw
            ))
        }),
        _ => Ok(default),
    }
}

/// Creates `dir` (and parents) if missing, owner-only on unix.
///
/// # Errors
///
/// Returns `AppError::Io` if the directory cannot be created or its
/// permissions cannot be set.
pub fn ensure_data_dir(dir: &Path) -> AppResult<()> {
    if dir.exists() {
        return Ok(());
    }
    fs::create_dir_all(dir)?;

    #[cfg(unix)]
    {
        use crate::constants::DEFAULT_DIR_PERMISSIONS;
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(DEFAULT_DIR_PERMISSIONS))?;
    }

    debug!("Created data directory");
    Ok(())
}
