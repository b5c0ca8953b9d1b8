/*!
# Parish

Parish is a local-first daily practice engine. It tracks today's reading
session against a remote content API and keeps a private prayer journal with
one-time milestones. The network is allowed to be unreliable.

## Core Features

- Load today's readings and start, play and complete today's session
- Short-circuit to "completed" when the server already has today's session
- Complete optimistically offline and confirm with the server later
- Detect calendar-day rollover when the app returns to the foreground
- Keep a journal of prayers with answered/unanswered status
- Surface practice milestones one at a time, each exactly once
- Schedule a daily reminder through a notification bridge

## Architecture

The codebase follows a modular architecture with clear separation of concerns:

- `clock`: Calendar days and the injectable time source
- `storage`: Persisted records (SQLite or in-memory) and debounced saving
- `journal`: The journal store and milestone detection
- `api`: The remote content/session API contract and HTTP client
- `session`: The daily session state machine
- `playback`: The playback-completion coordinator
- `settings`: Reminder settings, first-run flags and notification scheduling
- `app`: The `Engine` that owns one instance of each store
- `cli`: Command-line interface handling using clap
- `config`: Configuration loading and validation
- `errors`: Error handling infrastructure

## Usage Example

```rust,no_run
use parish::{Config, Engine};

#[tokio::main]
async fn main() -> parish::AppResult<()> {
    let config = Config::load()?;
    config.validate()?;

    let engine = Engine::open(&config)?;
    engine.session().load().await?;
    engine.journal().add_entry("For my family", None);

    engine.flush();
    Ok(())
}
```
*/

/// The application root owning every store
pub mod app;
/// Remote content/session API contract and HTTP client
pub mod api;
/// Command-line interface for parsing and handling user arguments
pub mod cli;
/// Calendar days and time sources
pub mod clock;
/// Configuration loading and management
pub mod config;
/// Constants used throughout the application
pub mod constants;
/// Error types and utilities for error handling
pub mod errors;
/// Prayer journal and milestones
pub mod journal;
/// Playback-completion coordination
pub mod playback;
/// Daily session state machine
pub mod session;
/// Settings and notification bridge
pub mod settings;
/// Durable storage backends
pub mod storage;

// Re-export important types for convenience
pub use app::Engine;
pub use cli::CliArgs;
pub use clock::{CalendarDay, Clock, ManualClock, SystemClock};
pub use config::Config;
pub use errors::{AppError, AppResult, FailureTag};
pub use journal::{JournalEntry, JournalStore, Milestone, MilestoneKind};
pub use session::{SessionMachine, SessionState, SessionStatus};
