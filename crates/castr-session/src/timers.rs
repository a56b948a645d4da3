use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::time::{delay_queue::Key, DelayQueue};

use crate::tracks::{ConnId, TrackId};

/// Everything the session waits on besides sockets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Track stopped speaking.
    Speech(TrackId),
    /// Quiet period while buffering is over.
    Buffering,
    Metering,
    /// Abandon an unstarted session.
    IdleWatchdog,
    /// Check whether a finished session has emptied out.
    FinishCheck,
    ExitLinger,
    SoundExpiry(String),
    /// Lift the kick ban on an origin.
    KickBan(String),
    /// Socket never logged in.
    Login(ConnId),
    /// Protocol ping to a data or master socket.
    Keepalive(ConnId),
}

/// Named one-shot timers. Arming a timer that is already armed restarts it.
#[derive(Debug, Default)]
pub struct Timers {
    queue: DelayQueue<TimerKind>,
    keys: HashMap<TimerKind, Key>,
    paused: HashMap<TimerKind, Duration>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, kind: TimerKind, after: Duration) {
        self.paused.remove(&kind);
        match self.keys.get(&kind) {
            Some(key) => self.queue.reset(key, after),
            None => {
                let key = self.queue.insert(kind.clone(), after);
                self.keys.insert(kind, key);
            }
        }
    }

    /// Returns `true` if the timer was armed or paused.
    pub fn cancel(&mut self, kind: &TimerKind) -> bool {
        let paused = self.paused.remove(kind).is_some();
        match self.keys.remove(kind) {
            Some(key) => {
                self.queue.remove(&key);
                true
            }
            None => paused,
        }
    }

    #[cfg(test)]
    fn is_armed(&self, kind: &TimerKind) -> bool {
        self.keys.contains_key(kind)
    }

    #[cfg(test)]
    fn is_paused(&self, kind: &TimerKind) -> bool {
        self.paused.contains_key(kind)
    }

    /// Stop the clock on a timer, keeping its remaining time.
    pub fn pause(&mut self, kind: &TimerKind) {
        if let Some(key) = self.keys.remove(kind) {
            let remaining = self
                .queue
                .deadline(&key)
                .saturating_duration_since(Instant::now());
            self.queue.remove(&key);
            self.paused.insert(kind.clone(), remaining);
        }
    }

    /// Restart a paused timer with the time it had left.
    pub fn resume(&mut self, kind: &TimerKind) {
        if let Some(remaining) = self.paused.remove(kind) {
            self.arm(kind.clone(), remaining);
        }
    }

    /// Cancel every timer matching `pred`.
    pub fn cancel_where(&mut self, mut pred: impl FnMut(&TimerKind) -> bool) {
        let doomed: Vec<TimerKind> = self
            .keys
            .keys()
            .chain(self.paused.keys())
            .filter(|kind| pred(kind))
            .cloned()
            .collect();
        for kind in doomed {
            self.cancel(&kind);
        }
    }

    /// Wait for the next timer to fire. Pending forever while none is armed.
    pub async fn next(&mut self) -> TimerKind {
        if self.queue.is_empty() {
            return std::future::pending().await;
        }
        match std::future::poll_fn(|cx| self.queue.poll_expired(cx)).await {
            Some(expired) => {
                let kind = expired.into_inner();
                self.keys.remove(&kind);
                kind
            }
            None => std::future::pending().await,
        }
    }
}
