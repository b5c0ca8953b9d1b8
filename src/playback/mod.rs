//! Bridges an external audio transport into session-completion signals.
//!
//! The coordinator mirrors the transport's status callbacks into a
//! [`PlaybackState`] and turns the first natural end of playback into exactly
//! one [`NaturalCompletion`]. The latch resets only on
//! [`replay_from_start`](PlaybackCoordinator::replay_from_start); loops, plain
//! replays and scrubbing to the end never complete.

use crate::errors::PlaybackError;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// The audio engine the coordinator drives. Decoding and output live behind it.
pub trait Transport: Send {
    /// Prepares `source` for playback, replacing whatever was loaded.
    fn load(&mut self, source: &str) -> Result<(), PlaybackError>;

    fn play(&mut self) -> Result<(), PlaybackError>;

    fn pause(&mut self) -> Result<(), PlaybackError>;

    /// Moves the playhead to `position_ms`.
    fn seek(&mut self, position_ms: u64) -> Result<(), PlaybackError>;
}

/// A status callback from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportStatus {
    Unloaded {
        error: Option<String>,
    },
    Loaded {
        is_playing: bool,
        is_buffering: bool,
        position_ms: u64,
        duration_ms: u64,
        /// Set on the one callback at which playback reached the end.
        did_just_finish: bool,
        is_looping: bool,
    },
}

/// Mirrored transport state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackState {
    pub is_loaded: bool,
    pub is_playing: bool,
    pub is_buffering: bool,
    pub position_ms: u64,
    pub duration_ms: u64,
}

impl PlaybackState {
    /// `position / duration`, or 0 when the duration is unknown.
    pub fn progress_fraction(&self) -> f64 {
        if self.duration_ms == 0 {
            return 0.0;
        }
        (self.position_ms as f64 / self.duration_ms as f64).min(1.0)
    }

    fn at_end(&self, position_ms: u64) -> bool {
        self.duration_ms > 0 && position_ms >= self.duration_ms
    }
}

/// Emitted once when the loaded source plays through to its end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NaturalCompletion {
    pub source: String,
}

#[derive(Debug, Clone, Copy)]
struct Scrub {
    was_playing: bool,
}

/// Drives a [`Transport`] and decides when playback counts as completed.
pub struct PlaybackCoordinator<T: Transport> {
    transport: T,
    state: watch::Sender<PlaybackState>,
    source: Option<String>,
    completed: bool,
    suppress_finish: bool,
    scrub: Option<Scrub>,
}

impl<T: Transport> PlaybackCoordinator<T> {
    pub fn new(transport: T) -> Self {
        let (state, _) = watch::channel(PlaybackState::default());
        Self {
            transport,
            state,
            source: None,
            completed: false,
            suppress_finish: false,
            scrub: None,
        }
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> PlaybackState {
        *self.state.borrow()
    }

    /// Receives every future state change.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.state.subscribe()
    }

    /// The wrapped transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Whether a natural completion has already been emitted for this source.
    pub fn has_completed(&self) -> bool {
        self.completed
    }

    /// Whether a scrub gesture is in progress.
    pub fn is_scrubbing(&self) -> bool {
        self.scrub.is_some()
    }

    fn require_loaded(&self) -> Result<(), PlaybackError> {
        if self.state.borrow().is_loaded {
            Ok(())
        } else {
            Err(PlaybackError::NotLoaded)
        }
    }

    /// Loads a new source and resets every latch.
    pub fn load(&mut self, source: &str) -> Result<(), PlaybackError> {
        self.transport.load(source)?;
        self.source = Some(source.to_string());
        self.completed = false;
        self.suppress_finish = false;
        self.scrub = None;
        self.state.send_replace(PlaybackState {
            is_loaded: true,
            ..PlaybackState::default()
        });
        info!("Loaded audio source");
        Ok(())
    }

    /// Starts or resumes playback. At the end, playback restarts from zero
    /// without re-arming completion.
    pub fn play(&mut self) -> Result<(), PlaybackError> {
        self.require_loaded()?;
        let state = self.snapshot();
        if state.at_end(state.position_ms) {
            self.seek(0)?;
        }
        self.transport.play()?;
        self.state.send_modify(|state| state.is_playing = true);
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), PlaybackError> {
        self.require_loaded()?;
        self.transport.pause()?;
        self.state.send_modify(|state| state.is_playing = false);
        Ok(())
    }

    pub fn toggle(&mut self) -> Result<(), PlaybackError> {
        if self.state.borrow().is_playing {
            self.pause()
        } else {
            self.play()
        }
    }

    /// Moves the playhead. Seeking to the end does not count as finishing.
    pub fn seek(&mut self, position_ms: u64) -> Result<(), PlaybackError> {
        self.require_loaded()?;
        let state = self.snapshot();
        let position_ms = if state.duration_ms > 0 {
            position_ms.min(state.duration_ms)
        } else {
            position_ms
        };
        self.transport.seek(position_ms)?;
        self.suppress_finish = state.at_end(position_ms);
        self.state.send_modify(|state| state.position_ms = position_ms);
        debug!("Seeked to {}", format_time(position_ms));
        Ok(())
    }

    /// Rewinds, plays again, and re-arms completion.
    pub fn replay_from_start(&mut self) -> Result<(), PlaybackError> {
        self.require_loaded()?;
        self.completed = false;
        self.seek(0)?;
        self.transport.play()?;
        self.state.send_modify(|state| state.is_playing = true);
        debug!("Replaying from start");
        Ok(())
    }

    /// Starts a drag-to-seek gesture, pausing playback while it lasts.
    pub fn begin_scrub(&mut self) -> Result<(), PlaybackError> {
        self.require_loaded()?;
        let was_playing = self.state.borrow().is_playing;
        if was_playing {
            self.pause()?;
        }
        self.scrub = Some(Scrub { was_playing });
        Ok(())
    }

    /// Moves the displayed position during a scrub without touching the transport.
    pub fn update_scrub(&mut self, position_ms: u64) {
        if self.scrub.is_none() {
            return;
        }
        self.state.send_modify(|state| {
            state.position_ms = if state.duration_ms > 0 {
                position_ms.min(state.duration_ms)
            } else {
                position_ms
            };
        });
    }

    /// Ends the gesture: the transport jumps to `position_ms` and resumes
    /// only if it was playing before and the position is not the end.
    pub fn end_scrub(&mut self, position_ms: u64) -> Result<(), PlaybackError> {
        let Some(scrub) = self.scrub.take() else {
            return Ok(());
        };
        self.seek(position_ms)?;
        let state = self.snapshot();
        if scrub.was_playing && !state.at_end(state.position_ms) {
            self.transport.play()?;
            self.state.send_modify(|state| state.is_playing = true);
        }
        Ok(())
    }

    /// Mirrors a transport callback. Returns a completion the first time the
    /// source plays through to its end with looping off.
    pub fn on_status(&mut self, status: TransportStatus) -> Option<NaturalCompletion> {
        match status {
            TransportStatus::Unloaded { error } => {
                if let Some(error) = error {
                    warn!("Audio transport unloaded: {}", error);
                }
                self.state.send_replace(PlaybackState::default());
                None
            }
            TransportStatus::Loaded {
                is_playing,
                is_buffering,
                position_ms,
                duration_ms,
                did_just_finish,
                is_looping,
            } => {
                let scrubbing = self.scrub.is_some();
                self.state.send_modify(|state| {
                    state.is_loaded = true;
                    state.is_buffering = is_buffering;
                    state.duration_ms = duration_ms;
                    if !scrubbing {
                        state.is_playing = is_playing;
                        state.position_ms = position_ms;
                    }
                });

                if !did_just_finish {
                    return None;
                }
                if is_looping || scrubbing {
                    return None;
                }
                if self.suppress_finish {
                    self.suppress_finish = false;
                    debug!("Finish after seek to end ignored");
                    return None;
                }
                if self.completed {
                    return None;
                }

                self.completed = true;
                info!("Playback reached its natural end");
                Some(NaturalCompletion {
                    source: self.source.clone().unwrap_or_default(),
                })
            }
        }
    }
}

/// Renders milliseconds as `m:ss`.
///
/// # Examples
///
/// ```
/// use parish::playback::format_time;
///
/// assert_eq!(format_time(0), "0:00");
/// assert_eq!(format_time(65_400), "1:05");
/// assert_eq!(format_time(3_600_000), "60:00");
/// ```
pub fn format_time(ms: u64) -> String {
    let total_seconds = ms / 1000;
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}
