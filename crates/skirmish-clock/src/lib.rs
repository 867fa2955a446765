//! Per-room countdown timers for Skirmish.
//!
//! Two clocks drive a running room: the main turn clock (a short
//! pre-turn delay, then a per-second countdown) and the combat clock
//! (a per-second countdown whose length depends on the acting
//! combatant). Both are instances of [`CountdownManager`], keyed by
//! whatever the owner wants (the room id, in practice).
//!
//! # Notices, not callbacks
//!
//! Each running countdown is a small Tokio task that pushes typed
//! [`CountdownNotice`]s into an `mpsc` channel owned by the room actor:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* player input */ }
//!         Some(notice) = turn_rx.recv() => {
//!             if turn_clock.is_current(&notice) { /* act on it */ }
//!         }
//!     }
//! }
//! ```
//!
//! # Cancellation
//!
//! Every start/resume gets a fresh generation number, and every
//! cancelling operation (start, pause, reset, delete) aborts the task and
//! retires its generation. A notice that was already queued before the
//! cancel still arrives, but [`CountdownManager::is_current`] rejects
//! it, so a cancelled countdown never fires.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration of one countdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountdownConfig {
    /// Length of the main countdown, in ticks.
    pub duration_secs: u32,
    /// Ticks of pre-delay run by [`CountdownManager::start`] before the
    /// main countdown. 0 disables the delay phase.
    pub pre_delay_secs: u32,
    /// Real length of one tick. One second outside of tests.
    pub tick: Duration,
}

impl Default for CountdownConfig {
    fn default() -> Self {
        Self {
            duration_secs: 30,
            pre_delay_secs: 0,
            tick: Duration::from_secs(1),
        }
    }
}

impl CountdownConfig {
    /// Shortest tick accepted; anything below is clamped.
    pub const MIN_TICK: Duration = Duration::from_millis(1);

    /// A countdown of `duration_secs` with no pre-delay.
    pub fn with_duration(duration_secs: u32) -> Self {
        Self {
            duration_secs,
            ..Default::default()
        }
    }

    /// Adds a pre-delay phase.
    pub fn pre_delay(mut self, pre_delay_secs: u32) -> Self {
        self.pre_delay_secs = pre_delay_secs;
        self
    }

    /// Clamps out-of-range values so the config is safe to run.
    pub fn validated(mut self) -> Self {
        if self.tick < Self::MIN_TICK {
            warn!(tick = ?self.tick, "countdown tick below minimum, clamping");
            self.tick = Self::MIN_TICK;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Notices
// ---------------------------------------------------------------------------

/// What a countdown task reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownEvent {
    /// Pre-delay phase, `remaining` ticks left before the countdown proper.
    DelayTick { remaining: u32 },
    /// The pre-delay reached zero; the main countdown starts now.
    Began,
    /// One tick of the main countdown elapsed.
    Tick { remaining: u32 },
    /// The main countdown reached zero.
    Expired,
}

/// A [`CountdownEvent`] tagged with the countdown it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountdownNotice<K> {
    pub key: K,
    /// Identifies the start/resume that produced this notice.
    pub generation: u64,
    pub event: CountdownEvent,
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

struct Countdown {
    config: CountdownConfig,
    /// Duration the next resume runs for. Shrinks on pause.
    duration: u32,
    remaining: Arc<AtomicU32>,
    generation: u64,
    task: Option<JoinHandle<()>>,
}

impl Countdown {
    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// A set of countdowns sharing one notice channel.
///
/// All operations are synchronous and must be called from inside a Tokio
/// runtime (start/resume spawn a task). Dropping the manager aborts every
/// running countdown.
pub struct CountdownManager<K> {
    timers: HashMap<K, Countdown>,
    sink: mpsc::UnboundedSender<CountdownNotice<K>>,
    next_generation: u64,
}

impl<K> CountdownManager<K>
where
    K: Clone + Eq + Hash + Send + std::fmt::Debug + 'static,
{
    /// Creates an empty manager delivering notices to `sink`.
    pub fn new(sink: mpsc::UnboundedSender<CountdownNotice<K>>) -> Self {
        Self {
            timers: HashMap::new(),
            sink,
            next_generation: 1,
        }
    }

    /// Registers a countdown for `key` without starting it.
    ///
    /// Returns `false` (and changes nothing) if `key` already exists.
    pub fn init(&mut self, key: K, config: CountdownConfig) -> bool {
        if self.timers.contains_key(&key) {
            trace!(?key, "countdown already initialised");
            return false;
        }
        let config = config.validated();
        let duration = config.duration_secs;
        self.timers.insert(
            key,
            Countdown {
                config,
                duration,
                remaining: Arc::new(AtomicU32::new(duration)),
                generation: 0,
                task: None,
            },
        );
        true
    }

    /// (Re)starts the countdown from its configured duration, running the
    /// pre-delay phase first. Any running task is cancelled.
    pub fn start(&mut self, key: &K) -> bool {
        let Some(timer) = self.timers.get_mut(key) else {
            return false;
        };
        timer.cancel();
        timer.duration = timer.config.duration_secs;
        timer.remaining.store(timer.duration, Ordering::SeqCst);
        let delay = timer.config.pre_delay_secs;
        self.spawn(key, delay);
        debug!(?key, delay, "countdown started");
        true
    }

    /// Replaces the configured duration, then [`start`](Self::start)s.
    pub fn start_with(&mut self, key: &K, duration_secs: u32) -> bool {
        match self.timers.get_mut(key) {
            Some(timer) => timer.config.duration_secs = duration_secs,
            None => return false,
        }
        self.start(key)
    }

    /// Cancels the countdown and keeps what was left as the duration of
    /// the next [`resume`](Self::resume). Returns the preserved value.
    pub fn pause(&mut self, key: &K) -> Option<u32> {
        let timer = self.timers.get_mut(key)?;
        timer.cancel();
        timer.duration = timer.remaining.load(Ordering::SeqCst);
        debug!(?key, remaining = timer.duration, "countdown paused");
        Some(timer.duration)
    }

    /// Restarts the countdown from the value preserved by the last pause,
    /// without a pre-delay.
    pub fn resume(&mut self, key: &K) -> bool {
        let Some(timer) = self.timers.get_mut(key) else {
            return false;
        };
        timer.cancel();
        timer.remaining.store(timer.duration, Ordering::SeqCst);
        self.spawn(key, 0);
        debug!(?key, "countdown resumed");
        true
    }

    /// Cancels the countdown and restores the configured duration.
    pub fn reset(&mut self, key: &K) -> bool {
        let Some(timer) = self.timers.get_mut(key) else {
            return false;
        };
        timer.cancel();
        timer.duration = timer.config.duration_secs;
        timer.remaining.store(timer.duration, Ordering::SeqCst);
        timer.generation = 0;
        true
    }

    /// Cancels and forgets the countdown.
    pub fn delete(&mut self, key: &K) -> bool {
        match self.timers.remove(key) {
            Some(mut timer) => {
                timer.cancel();
                debug!(?key, "countdown deleted");
                true
            }
            None => false,
        }
    }

    /// Ticks left on the countdown (the preserved value while paused).
    pub fn remaining(&self, key: &K) -> Option<u32> {
        self.timers
            .get(key)
            .map(|t| t.remaining.load(Ordering::SeqCst))
    }

    /// Returns `true` only for notices from the live run of a countdown.
    pub fn is_current(&self, notice: &CountdownNotice<K>) -> bool {
        self.timers
            .get(&notice.key)
            .is_some_and(|t| t.task.is_some() && t.generation == notice.generation)
    }

    /// Returns `true` while a countdown task is live for `key`.
    pub fn is_running(&self, key: &K) -> bool {
        self.timers
            .get(key)
            .and_then(|t| t.task.as_ref())
            .is_some_and(|task| !task.is_finished())
    }

    pub fn contains(&self, key: &K) -> bool {
        self.timers.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    fn spawn(&mut self, key: &K, pre_delay: u32) {
        let generation = self.next_generation;
        self.next_generation += 1;
        let Some(timer) = self.timers.get_mut(key) else {
            return;
        };
        timer.generation = generation;
        let run = CountdownRun {
            key: key.clone(),
            generation,
            tick: timer.config.tick,
            pre_delay,
            remaining: Arc::clone(&timer.remaining),
            sink: self.sink.clone(),
        };
        timer.task = Some(tokio::spawn(run.run()));
    }
}

impl<K> Drop for CountdownManager<K> {
    fn drop(&mut self) {
        for timer in self.timers.values_mut() {
            timer.cancel();
        }
    }
}

// ---------------------------------------------------------------------------
// Countdown task
// ---------------------------------------------------------------------------

struct CountdownRun<K> {
    key: K,
    generation: u64,
    tick: Duration,
    pre_delay: u32,
    remaining: Arc<AtomicU32>,
    sink: mpsc::UnboundedSender<CountdownNotice<K>>,
}

impl<K: Clone + std::fmt::Debug> CountdownRun<K> {
    async fn run(self) {
        if self.pre_delay > 0 {
            for left in (1..=self.pre_delay).rev() {
                if !self.notify(CountdownEvent::DelayTick { remaining: left }) {
                    return;
                }
                time::sleep(self.tick).await;
            }
            if !self.notify(CountdownEvent::Began) {
                return;
            }
        }

        let mut remaining = self.remaining.load(Ordering::SeqCst);
        while remaining > 0 {
            time::sleep(self.tick).await;
            remaining -= 1;
            self.remaining.store(remaining, Ordering::SeqCst);
            trace!(key = ?self.key, remaining, "countdown tick");
            if !self.notify(CountdownEvent::Tick { remaining }) {
                return;
            }
        }

        self.notify(CountdownEvent::Expired);
    }

    /// Returns `false` once the receiving side is gone.
    fn notify(&self, event: CountdownEvent) -> bool {
        self.sink
            .send(CountdownNotice {
                key: self.key.clone(),
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}
