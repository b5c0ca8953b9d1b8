//! Command-line interface for the parish application.
//!
//! This module defines the argument structure with clap's derive API. Command
//! execution against an [`Engine`](crate::Engine) lives in [`commands`].

pub mod commands;

use crate::clock::CalendarDay;
use crate::constants::{APP_DESCRIPTION, APP_NAME, LOG_FORMAT_JSON, LOG_FORMAT_TEXT};
use clap::{Args, Parser, Subcommand};

/// A daily prayer companion with a private journal
#[derive(Parser, Debug)]
#[command(name = APP_NAME, about = APP_DESCRIPTION, version, long_about = None)]
pub struct CliArgs {
    /// Log output format
    #[arg(
        long,
        value_name = "FORMAT",
        default_value = LOG_FORMAT_TEXT,
        value_parser = [LOG_FORMAT_TEXT, LOG_FORMAT_JSON],
        global = true
    )]
    pub log_format: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Load today's readings and start today's session
    Today,

    /// Show the readings for another day without starting a session
    Day {
        /// Day to show (YYYY-MM-DD)
        date: CalendarDay,
    },

    /// Mark today's readings as read and complete the session
    Complete,

    /// Add a prayer to the journal
    Pray {
        /// Prayer text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,

        /// Link the prayer to a day's readings (YYYY-MM-DD)
        #[arg(long, value_name = "ID")]
        reading: Option<String>,
    },

    /// List journal entries, newest first
    List(ListArgs),

    /// Mark a prayer as answered
    Answer {
        /// Entry id
        id: String,

        /// Clear the answered mark instead
        #[arg(long)]
        undo: bool,
    },

    /// Delete a journal entry
    Delete {
        /// Entry id
        id: String,
    },

    /// Show milestones reached since last time
    Milestones,

    /// Show completed sessions
    History,

    /// Show the practice streak
    Streak,

    /// Configure the daily reminder
    Remind {
        #[command(subcommand)]
        action: RemindAction,
    },
}

impl Command {
    /// Whether the command talks to the content API.
    pub fn needs_network(&self) -> bool {
        matches!(
            self,
            Command::Today | Command::Day { .. } | Command::Complete | Command::History | Command::Streak
        )
    }
}

/// Which entries `list` shows. At most one filter applies.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
#[group(multiple = false)]
pub struct ListArgs {
    /// Only entries not yet answered
    #[arg(long)]
    pub active: bool,

    /// Only answered entries
    #[arg(long)]
    pub answered: bool,

    /// Only entries written on this day (YYYY-MM-DD)
    #[arg(long, value_name = "DAY")]
    pub date: Option<CalendarDay>,

    /// Only entries written today
    #[arg(long)]
    pub today: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum RemindAction {
    /// Turn the daily reminder on
    On,
    /// Turn the daily reminder off
    Off,
    /// Set the reminder time
    At {
        /// Time of day (HH:MM, 24-hour)
        #[arg(value_parser = parse_reminder_time)]
        time: (u8, u8),
    },
}

/// Parses `HH:MM` into an `(hour, minute)` pair.
///
/// # Examples
///
/// ```
/// use parish::cli::parse_reminder_time;
///
/// assert_eq!(parse_reminder_time("07:30"), Ok((7, 30)));
/// assert!(parse_reminder_time("24:00").is_err());
/// ```
pub fn parse_reminder_time(s: &str) -> Result<(u8, u8), String> {
    let (hour, minute) = s
        .trim()
        .split_once(':')
        .ok_or_else(|| format!("expected HH:MM, got '{}'", s))?;
    let hour: u8 = hour
        .parse()
        .map_err(|_| format!("invalid hour '{}'", hour))?;
    let minute: u8 = minute
        .parse()
        .map_err(|_| format!("invalid minute '{}'", minute))?;
    if hour > 23 || minute > 59 {
        return Err(format!("time out of range: '{}'", s));
    }
    Ok((hour, minute))
}
