use castr_proto::{InfoMessage, Mode};

use crate::clock::granule_at;
use crate::error::Violation;

/// A mode change a master may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// `init → recording`
    Start,
    /// `recording → paused`
    Pause,
    /// `paused → recording`
    Resume,
    /// `recording | paused → buffering`
    End,
}

/// Recording mode and its time bookkeeping.
///
/// Times are session milliseconds; granule positions are the same instants
/// in 48 kHz ticks.
#[derive(Debug, Clone, Default)]
pub struct ModeState {
    mode: Mode,
    begin_ms: f64,
    /// Time of the latest mode change.
    anchor_ms: f64,
    last_paused: u64,
    last_resumed_ms: f64,
    last_resumed: u64,
    /// Recording time accumulated up to the latest pause or end.
    elapsed_ms: f64,
}

impl ModeState {
    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn begin_ms(&self) -> f64 {
        self.begin_ms
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }

    pub fn has_started(&self) -> bool {
        self.mode >= Mode::Recording
    }

    /// Decide what a master's request for `to` means in the current mode.
    ///
    /// Asking for the current mode, or for `finished` while already draining,
    /// is a no-op.
    pub fn request(&self, to: Mode) -> Result<Option<Transition>, Violation> {
        use Mode::*;
        if to == self.mode {
            return Ok(None);
        }
        match (self.mode, to) {
            (Init, Recording) => Ok(Some(Transition::Start)),
            (Recording, Paused) => Ok(Some(Transition::Pause)),
            (Paused, Recording) => Ok(Some(Transition::Resume)),
            (Recording | Paused, Buffering | Finished) => Ok(Some(Transition::End)),
            (Buffering, Finished) => Ok(None),
            (from, to) => Err(Violation::InvalidTransition { from, to }),
        }
    }

    /// Apply a transition at `now_ms` and return the granule position of the
    /// event.
    pub fn apply(&mut self, transition: Transition, now_ms: f64) -> u64 {
        let granule = granule_at(now_ms);
        match transition {
            Transition::Start => {
                self.mode = Mode::Recording;
                self.begin_ms = now_ms;
                self.last_resumed_ms = now_ms;
                self.last_resumed = granule;
                self.elapsed_ms = 0.0;
            }
            Transition::Pause => {
                self.mode = Mode::Paused;
                self.last_paused = granule;
                self.elapsed_ms += now_ms - self.last_resumed_ms;
            }
            Transition::Resume => {
                self.mode = Mode::Recording;
                self.last_resumed_ms = now_ms;
                self.last_resumed = granule;
            }
            Transition::End => {
                if self.mode == Mode::Recording {
                    self.elapsed_ms += now_ms - self.last_resumed_ms;
                }
                self.mode = Mode::Buffering;
                self.last_paused = granule;
            }
        }
        self.anchor_ms = now_ms;
        granule
    }

    /// Enter the terminal mode. Returns `false` if already there.
    pub fn finish(&mut self, now_ms: f64) -> bool {
        if self.mode == Mode::Finished {
            return false;
        }
        if self.mode == Mode::Recording {
            self.elapsed_ms += now_ms - self.last_resumed_ms;
        }
        self.mode = Mode::Finished;
        self.anchor_ms = now_ms;
        true
    }

    /// Whether a data packet at `granule_pos` is written.
    pub fn should_persist(&self, granule_pos: u64) -> bool {
        self.mode.persists_payload()
            && !(granule_pos >= self.last_paused && granule_pos < self.last_resumed)
    }

    /// The `info/mode` announcement for the current state.
    pub fn info(&self) -> InfoMessage {
        InfoMessage::Mode {
            mode: self.mode,
            anchor_ms: self.anchor_ms,
            elapsed_ms: self.elapsed_ms,
        }
    }
}
