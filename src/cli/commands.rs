//! Executes parsed commands against an [`Engine`].
//!
//! Output goes to the supplied writer; logs go through `tracing`.

use super::{Command, ListArgs, RemindAction};
use crate::api::ContentBundle;
use crate::app::Engine;
use crate::errors::{AppError, AppResult};
use crate::journal::JournalEntry;
use crate::session::{CompletionOutcome, SessionState, SessionStatus};
use std::io::Write;
use tracing::debug;

/// Runs one command.
///
/// # Errors
///
/// Network failures are returned as `AppError::Remote` carrying the failure
/// tag. Unknown entry ids are `AppError::InvalidInput`.
pub async fn run(engine: &Engine, command: Command, out: &mut impl Write) -> AppResult<()> {
    debug!("Running {:?}", command);
    match command {
        Command::Today => today(engine, out).await,
        Command::Day { date } => {
            engine.session().view_day(date).await;
            let state = engine.session().snapshot();
            ensure_loaded(&state)?;
            if let Some(content) = &state.content {
                print_content(out, content)?;
            }
            Ok(())
        }
        Command::Complete => complete(engine, out).await,
        Command::Pray { text, reading } => {
            let text = text.join(" ");
            if text.trim().is_empty() {
                return Err(AppError::InvalidInput(
                    "Prayer text cannot be empty".to_string(),
                ));
            }
            let entry = engine.journal().add_entry(&text, reading.as_deref());
            writeln!(out, "Added {}", entry.id)?;
            if let Some(milestone) = engine.journal().unseen_milestone() {
                writeln!(out, "New milestone: {} (see `parish milestones`)", milestone.label)?;
            }
            Ok(())
        }
        Command::List(filter) => list(engine, &filter, out),
        Command::Answer { id, undo } => {
            require_entry(engine, &id)?;
            engine.journal().set_answered(&id, !undo);
            if undo {
                writeln!(out, "Marked {} as not answered", id)?;
            } else {
                writeln!(out, "Marked {} as answered", id)?;
            }
            Ok(())
        }
        Command::Delete { id } => {
            require_entry(engine, &id)?;
            engine.journal().delete_entry(&id);
            writeln!(out, "Deleted {}", id)?;
            Ok(())
        }
        Command::Milestones => milestones(engine, out),
        Command::History => {
            let items = engine
                .api()
                .history(engine.auth_token())
                .await
                .map_err(|e| AppError::remote(&e))?;
            if items.is_empty() {
                writeln!(out, "No completed sessions yet.")?;
            }
            for item in items {
                writeln!(
                    out,
                    "{}  {}  {}",
                    item.day, item.first_reading_reference, item.gospel_reference
                )?;
            }
            Ok(())
        }
        Command::Streak => {
            let profile = engine
                .api()
                .profile(engine.auth_token())
                .await
                .map_err(|e| AppError::remote(&e))?;
            let streak = profile.streak;
            writeln!(out, "Current streak: {}", streak.current_streak)?;
            writeln!(out, "Longest streak: {}", streak.longest_streak)?;
            writeln!(out, "Total sessions: {}", streak.total_sessions)?;
            Ok(())
        }
        Command::Remind { action } => remind(engine, action, out).await,
    }
}

fn ensure_loaded(state: &SessionState) -> AppResult<()> {
    match &state.error {
        Some(failure) if state.status == SessionStatus::Error => Err(AppError::Remote {
            tag: failure.tag,
            message: failure.message.clone(),
        }),
        _ => Ok(()),
    }
}

async fn today(engine: &Engine, out: &mut impl Write) -> AppResult<()> {
    engine.session().load().await?;
    let state = engine.session().snapshot();
    ensure_loaded(&state)?;
    if let Some(content) = &state.content {
        print_content(out, content)?;
    }
    match state.status {
        SessionStatus::Completed => writeln!(out, "Today's session is complete.")?,
        status => writeln!(out, "Session: {}", status)?,
    }
    Ok(())
}

async fn complete(engine: &Engine, out: &mut impl Write) -> AppResult<()> {
    engine.session().load().await?;
    let state = engine.session().snapshot();
    ensure_loaded(&state)?;
    if state.status == SessionStatus::Completed {
        writeln!(out, "Today's session is already complete.")?;
        return Ok(());
    }

    engine.mark_read()?;
    match engine.finish_session().await? {
        CompletionOutcome::Confirmed(streak) => {
            writeln!(out, "Session complete. Current streak: {}", streak.current_streak)?;
        }
        CompletionOutcome::Unconfirmed { tag } => {
            writeln!(
                out,
                "Session complete. The server will be told later ({}).",
                tag
            )?;
        }
    }
    Ok(())
}

fn print_content(out: &mut impl Write, content: &ContentBundle) -> AppResult<()> {
    writeln!(out, "Readings for {}", content.day)?;
    writeln!(out)?;
    writeln!(out, "{}", content.first_reading.display_reference())?;
    writeln!(out, "{}", content.first_reading.text)?;
    writeln!(out)?;
    writeln!(out, "{}", content.gospel.display_reference())?;
    writeln!(out, "{}", content.gospel.text)?;
    if !content.commentary.is_empty() {
        writeln!(out)?;
        writeln!(out, "{}", content.commentary)?;
    }
    if let Some(audio_url) = &content.audio_url {
        writeln!(out)?;
        writeln!(out, "Audio: {}", audio_url)?;
    }
    Ok(())
}

fn list(engine: &Engine, filter: &ListArgs, out: &mut impl Write) -> AppResult<()> {
    let journal = engine.journal();
    let entries = if filter.active {
        journal.active_entries()
    } else if filter.answered {
        journal.answered_entries()
    } else if let Some(day) = filter.date {
        journal.entries_for_day(day)
    } else if filter.today {
        journal.entries_for_today()
    } else {
        journal.snapshot().entries
    };

    if entries.is_empty() {
        writeln!(out, "No prayers.")?;
    }
    for entry in &entries {
        print_entry(out, entry, &journal.entry_day(entry).to_string())?;
    }
    Ok(())
}

fn print_entry(out: &mut impl Write, entry: &JournalEntry, day: &str) -> AppResult<()> {
    let mark = if entry.is_answered() { "answered" } else { "open" };
    writeln!(out, "{}  {}  {:<8}  {}", entry.id, day, mark, entry.text)?;
    Ok(())
}

fn require_entry(engine: &Engine, id: &str) -> AppResult<()> {
    if engine.journal().snapshot().entries.iter().any(|e| e.id == id) {
        Ok(())
    } else {
        Err(AppError::InvalidInput(format!("No journal entry with id {}", id)))
    }
}

fn milestones(engine: &Engine, out: &mut impl Write) -> AppResult<()> {
    let journal = engine.journal();
    let mut shown = 0;
    while let Some(milestone) = journal.unseen_milestone() {
        writeln!(out, "Milestone reached: {}", milestone.label)?;
        journal.mark_milestone_seen(milestone.kind);
        shown += 1;
    }
    if shown == 0 {
        writeln!(out, "No new milestones.")?;
    }
    writeln!(
        out,
        "Praying for {} days, on {} distinct days.",
        journal.days_since_first_entry(),
        journal.unique_day_count()
    )?;
    Ok(())
}

async fn remind(engine: &Engine, action: RemindAction, out: &mut impl Write) -> AppResult<()> {
    let settings = engine.settings();
    match action {
        RemindAction::On => {
            let (hour, minute) = settings.reminder_time();
            if settings.set_reminder_enabled(true).await {
                writeln!(out, "Daily reminder on at {:02}:{:02}", hour, minute)?;
            } else {
                writeln!(out, "Notifications are not permitted; reminder stays off.")?;
            }
        }
        RemindAction::Off => {
            settings.set_reminder_enabled(false).await;
            writeln!(out, "Daily reminder off")?;
        }
        RemindAction::At { time: (hour, minute) } => {
            settings.set_reminder_time(hour, minute).await?;
            writeln!(out, "Reminder time set to {:02}:{:02}", hour, minute)?;
        }
    }
    Ok(())
}
