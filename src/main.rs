/*!
# Parish - A Daily Prayer Companion

Parish is a command-line front end for the practice-continuity engine. It loads
the day's readings, tracks today's session, and keeps a private prayer journal.

## Usage

```
parish [OPTIONS] <COMMAND>

Commands:
  today       Load today's readings and start today's session
  day         Show the readings for another day without starting a session
  complete    Mark today's readings as read and complete the session
  pray        Add a prayer to the journal
  list        List journal entries, newest first
  answer      Mark a prayer as answered
  delete      Delete a journal entry
  milestones  Show milestones reached since last time
  history     Show completed sessions
  streak      Show the practice streak
  remind      Configure the daily reminder

Options:
      --log-format <FORMAT>  Log output format [default: text] [possible values: text, json]
  -h, --help                 Print help
  -V, --version              Print version
```

## Configuration

- `PARISH_DIR`: The data directory (defaults to "~/.parish")
- `PARISH_API_URL`: Base URL of the content API
- `PARISH_TOKEN`: Bearer token for the content API
- `PARISH_TIMEOUT_SECS`: HTTP request timeout in seconds
- `PARISH_SAVE_DEBOUNCE_MS`: Persistence debounce window in milliseconds
*/

use clap::Parser;
use parish::cli::{commands, CliArgs};
use parish::config::Config;
use parish::constants::{
    DEFAULT_LOG_LEVEL, LOG_FORMAT_JSON, TRACING_ROOT_SPAN_NAME, TRACING_SERVICE_NAME,
};
use parish::errors::AppResult;
use parish::Engine;
use std::io;
use std::process::ExitCode;
use tracing::{info, info_span, warn, Instrument};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Installs the global subscriber: `RUST_LOG` filtering, text or JSON, on stderr.
fn init_tracing(log_format: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format == LOG_FORMAT_JSON {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(io::stderr)
                    .with_current_span(true),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(io::stderr)
                    .with_target(false),
            )
            .init();
    }
}

/// The main application flow:
/// 1. Parses command-line arguments and initializes logging
/// 2. Loads and validates configuration
/// 3. Opens the engine over the local database
/// 4. Runs the command
/// 5. Flushes pending writes, whether or not the command succeeded
async fn run(args: CliArgs) -> AppResult<()> {
    let config = Config::load()?;
    config.validate()?;

    if args.command.needs_network() && config.auth_token.is_empty() {
        warn!("No API token configured; set PARISH_TOKEN to sign in");
    }

    let engine = Engine::open(&config)?;
    let mut stdout = io::stdout().lock();
    let result = commands::run(&engine, args.command, &mut stdout).await;
    engine.flush();
    result
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_tracing(&args.log_format);

    let span = info_span!(
        TRACING_ROOT_SPAN_NAME,
        service = TRACING_SERVICE_NAME,
        invocation_id = %Uuid::new_v4()
    );
    let result = async {
        info!("Starting parish");
        run(args).await
    }
    .instrument(span)
    .await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
