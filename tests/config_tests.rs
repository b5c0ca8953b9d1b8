use serial_test::serial;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::tempdir;

use parish::config::Config;
use parish::constants::DEFAULT_API_URL;
use parish::errors::AppError;

const VARS: [&str; 6] = [
    "PARISH_DIR",
    "PARISH_API_URL",
    "PARISH_TOKEN",
    "PARISH_TIMEOUT_SECS",
    "PARISH_SAVE_DEBOUNCE_MS",
    "HOME",
];

/// Restores the saved environment when dropped, even if the test panics.
struct EnvGuard {
    saved: Vec<(&'static str, Option<String>)>,
}

impl EnvGuard {
    fn clean() -> Self {
        let saved = VARS.iter().map(|name| (*name, env::var(name).ok())).collect();
        for name in VARS {
            env::remove_var(name);
        }
        EnvGuard { saved }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (name, value) in &self.saved {
            match value {
                Some(value) => env::set_var(name, value),
                None => env::remove_var(name),
            }
        }
    }
}

#[test]
#[serial]
fn test_config_load_with_environment_vars() {
    let _guard = EnvGuard::clean();
    let temp_dir = tempdir().unwrap();
    let dir_path = temp_dir.path().to_string_lossy().to_string();

    env::set_var("PARISH_DIR", &dir_path);
    env::set_var("PARISH_API_URL", "http://localhost:3000/api/");
    env::set_var("PARISH_TOKEN", "  bearer-123  ");
    env::set_var("PARISH_TIMEOUT_SECS", "30");
    env::set_var("PARISH_SAVE_DEBOUNCE_MS", "0");

    let config = Config::load().unwrap();

    assert_eq!(config.data_dir, PathBuf::from(&dir_path));
    assert_eq!(config.api_url, "http://localhost:3000/api");
    assert_eq!(config.auth_token, "bearer-123");
    assert_eq!(config.request_timeout, Duration::from_secs(30));
    assert_eq!(config.save_debounce, Duration::ZERO);
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn test_config_load_with_fallbacks() {
    let _guard = EnvGuard::clean();
    let temp_dir = tempdir().unwrap();
    let home_path = temp_dir.path().to_string_lossy().to_string();
    env::set_var("HOME", &home_path);

    let config = Config::load().unwrap();

    assert_eq!(config.data_dir, PathBuf::from(&home_path).join(".parish"));
    assert_eq!(config.api_url, DEFAULT_API_URL);
    assert!(config.auth_token.is_empty());
    assert_eq!(config.request_timeout, Duration::from_secs(15));
    assert_eq!(config.save_debounce, Duration::from_millis(250));
}

#[test]
#[serial]
fn test_config_expands_tilde() {
    let _guard = EnvGuard::clean();
    let temp_dir = tempdir().unwrap();
    env::set_var("HOME", temp_dir.path());
    env::set_var("PARISH_DIR", "~/prayer-data");

    let config = Config::load().unwrap();

    assert_eq!(config.data_dir, temp_dir.path().join("prayer-data"));
    assert!(config.data_dir.is_absolute());
}

#[test]
#[serial]
fn test_config_blank_api_url_uses_default() {
    let _guard = EnvGuard::clean();
    env::set_var("PARISH_DIR", "/tmp/parish-test");
    env::set_var("PARISH_API_URL", "   ");

    let config = Config::load().unwrap();
    assert_eq!(config.api_url, DEFAULT_API_URL);
}

#[test]
#[serial]
fn test_config_rejects_bad_numbers() {
    let _guard = EnvGuard::clean();
    env::set_var("PARISH_DIR", "/tmp/parish-test");

    env::set_var("PARISH_SAVE_DEBOUNCE_MS", "-5");
    match Config::load() {
        Err(AppError::Config(message)) => assert!(message.contains("PARISH_SAVE_DEBOUNCE_MS")),
        other => panic!("Expected Config error, got {:?}", other),
    }

    env::remove_var("PARISH_SAVE_DEBOUNCE_MS");
    env::set_var("PARISH_TIMEOUT_SECS", "0");
    let config = Config::load().unwrap();
    assert!(matches!(config.validate(), Err(AppError::Config(_))));
}

#[test]
#[serial]
fn test_config_rejects_non_http_api_url() {
    let _guard = EnvGuard::clean();
    env::set_var("PARISH_DIR", "/tmp/parish-test");
    env::set_var("PARISH_API_URL", "file:///etc/passwd");

    let config = Config::load().unwrap();
    match config.validate() {
        Err(AppError::Config(message)) => assert!(message.contains("http")),
        other => panic!("Expected Config error, got {:?}", other),
    }
}
