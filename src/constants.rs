//! Constants used throughout the application.
//!
//! Storage namespaces, milestone thresholds, configuration keys and defaults
//! live here so they can be referenced consistently from every module.

// Application Metadata
/// The name of the application.
pub const APP_NAME: &str = "parish";
/// The description of the application used in CLI help text.
pub const APP_DESCRIPTION: &str = "A daily prayer companion with a private journal";

// CLI Arguments & Defaults
/// Log format identifier for plain text.
pub const LOG_FORMAT_TEXT: &str = "text";
/// Log format identifier for JSON.
pub const LOG_FORMAT_JSON: &str = "json";
/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

// Configuration Keys & Environment Variables
/// Environment variable for the data directory.
pub const ENV_VAR_PARISH_DIR: &str = "PARISH_DIR";
/// Environment variable for the content API base URL.
pub const ENV_VAR_PARISH_API_URL: &str = "PARISH_API_URL";
/// Environment variable for the API bearer token.
pub const ENV_VAR_PARISH_TOKEN: &str = "PARISH_TOKEN";
/// Environment variable for the HTTP request timeout, in seconds.
pub const ENV_VAR_PARISH_TIMEOUT_SECS: &str = "PARISH_TIMEOUT_SECS";
/// Environment variable for the persistence debounce window, in milliseconds.
pub const ENV_VAR_PARISH_SAVE_DEBOUNCE_MS: &str = "PARISH_SAVE_DEBOUNCE_MS";
/// Standard environment variable for the user's home directory.
pub const ENV_VAR_HOME: &str = "HOME";
/// Default sub-directory name for app data within the user's home directory.
pub const DEFAULT_DATA_SUBDIR: &str = ".parish";
/// Default base URL of the content/session API.
pub const DEFAULT_API_URL: &str = "https://daily-parish-beta.vercel.app/api";
/// Default HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
/// Default debounce window for persistence writes in milliseconds.
pub const DEFAULT_SAVE_DEBOUNCE_MS: u64 = 250;
/// Placeholder string for redacted information in debug output.
pub const REDACTED_PLACEHOLDER: &str = "[REDACTED]";

// File System Parameters
/// File name of the SQLite database inside the data directory.
pub const DATABASE_FILE_NAME: &str = "parish.db";
/// Default POSIX permissions for newly created directories (owner read/write/execute).
#[cfg(unix)]
pub const DEFAULT_DIR_PERMISSIONS: u32 = 0o700;

// Storage Namespaces
/// Namespace of the persisted journal record.
pub const JOURNAL_NAMESPACE: &str = "journal";
/// Namespace of the persisted session record.
pub const SESSION_NAMESPACE: &str = "session";
/// Namespace of the persisted settings record.
pub const SETTINGS_NAMESPACE: &str = "settings";

// Date/Time Logic
/// Date format string for ISO date format (YYYY-MM-DD).
pub const DATE_FORMAT_ISO: &str = "%Y-%m-%d";
/// Days since the first entry for the "1 week" milestone.
pub const ONE_WEEK_DAYS: u32 = 7;
/// Days since the first entry for the "2 weeks" milestone.
pub const TWO_WEEKS_DAYS: u32 = 14;
/// Days since the first entry for the "1 month" milestone.
pub const ONE_MONTH_DAYS: u32 = 30;
/// Days since the first entry for the "6 months" milestone.
pub const SIX_MONTHS_DAYS: u32 = 180;
/// Days since the first entry for the "1 year" milestone.
pub const ONE_YEAR_DAYS: u32 = 365;
/// Distinct practice days required for the "2 days" milestone.
pub const SECOND_DISTINCT_DAY_COUNT: usize = 2;

// Reminders
/// Default hour of the daily reminder.
pub const DEFAULT_REMINDER_HOUR: u8 = 7;
/// Default minute of the daily reminder.
pub const DEFAULT_REMINDER_MINUTE: u8 = 0;

// Content API
/// Path of the today's-readings endpoint.
pub const API_PATH_TODAY: &str = "/readings/today";
/// Path prefix of the readings-for-day endpoint.
pub const API_PATH_READINGS: &str = "/readings";
/// Path of the start-session endpoint.
pub const API_PATH_SESSION_START: &str = "/session/start";
/// Path of the complete-session endpoint.
pub const API_PATH_SESSION_COMPLETE: &str = "/session/complete";
/// Path of the session history endpoint.
pub const API_PATH_HISTORY: &str = "/history";
/// Path of the user profile endpoint.
pub const API_PATH_USER: &str = "/user";

// Logging Configuration
/// Service name used in tracing spans and structured logs.
pub const TRACING_SERVICE_NAME: &str = "parish";
/// Name for the root tracing span covering an application invocation.
pub const TRACING_ROOT_SPAN_NAME: &str = "app_invocation";
