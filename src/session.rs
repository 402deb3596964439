use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::matcher::{Advance, CharState, Counters, Keystroke, Matcher};
use crate::metrics::Metrics;
use crate::passage::Passage;
use crate::time_series::WpmSample;

pub const DEFAULT_TIME_LIMIT_SECS: u32 = 60;

const TICK: Duration = Duration::from_secs(1);

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Mode {
    /// Count down from the time limit; ends on timeout or completion
    #[default]
    Timed,
    /// No time limit; ends only when the passage is completed
    Passage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub mode: Mode,
    pub time_limit_secs: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Timed,
            time_limit_secs: DEFAULT_TIME_LIMIT_SECS,
        }
    }
}

impl SessionConfig {
    fn countdown_budget(&self) -> Option<u32> {
        match self.mode {
            Mode::Timed => Some(self.time_limit_secs.max(1)),
            Mode::Passage => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Timeout,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running,
    Finished(Termination),
}

/// One-tick-per-second schedule, armed by the first printable keystroke.
///
/// Owned by the session; dropping it is the cancellation.
#[derive(Debug, Clone)]
struct Countdown {
    next_tick: Instant,
}

impl Countdown {
    fn arm(now: Instant) -> Self {
        Self {
            next_tick: now + TICK,
        }
    }

    /// Whole seconds that have come due since the last call
    fn due_ticks(&mut self, now: Instant) -> u32 {
        let mut due = 0;
        while now >= self.next_tick {
            self.next_tick += TICK;
            due += 1;
        }
        due
    }
}

/// State machine for a single typing test over one passage
#[derive(Debug, Clone)]
pub struct Session {
    passage: Passage,
    config: SessionConfig,
    matcher: Matcher,
    phase: Phase,
    countdown: Option<Countdown>,
    started_at: Option<Instant>,
    remaining: Option<u32>,
    elapsed_secs: u32,
    live: Metrics,
    final_metrics: Option<Metrics>,
    samples: Vec<WpmSample>,
}

impl Session {
    pub fn new(passage: Passage, config: SessionConfig) -> Self {
        let matcher = Matcher::new(passage.len());
        Self {
            passage,
            config,
            matcher,
            phase: Phase::Idle,
            countdown: None,
            started_at: None,
            remaining: config.countdown_budget(),
            elapsed_secs: 0,
            live: Metrics::default(),
            final_metrics: None,
            samples: Vec::new(),
        }
    }

    /// Only applied while idle. Returns whether the change took effect.
    pub fn set_config(&mut self, config: SessionConfig) -> bool {
        if self.phase != Phase::Idle {
            return false;
        }
        self.config = config;
        self.remaining = config.countdown_budget();
        true
    }

    /// Idle -> Running with every per-session value reset.
    pub fn start(&mut self) -> bool {
        if self.phase != Phase::Idle {
            return false;
        }
        self.matcher = Matcher::new(self.passage.len());
        self.countdown = None;
        self.started_at = None;
        self.remaining = self.config.countdown_budget();
        self.elapsed_secs = 0;
        self.live = Metrics::default();
        self.final_metrics = None;
        self.samples.clear();
        self.phase = Phase::Running;
        tracing::debug!(len = self.passage.len(), mode = %self.config.mode, "session started");
        true
    }

    /// Feed one keystroke. Returns the termination cause when this keystroke
    /// finished the session.
    ///
    /// Seconds already due are ticked first, so a key landing after the
    /// deadline ends the session with `Timeout` and is dropped.
    pub fn press(&mut self, key: Keystroke, now: Instant) -> Option<Termination> {
        if self.phase != Phase::Running || self.remaining == Some(0) {
            return None;
        }
        if let Some(end) = self.tick(now) {
            return Some(end);
        }
        if key == Keystroke::Ignored {
            return None;
        }

        if key.is_printable() && self.countdown.is_none() {
            self.started_at = Some(now);
            self.countdown = Some(Countdown::arm(now));
            tracing::debug!("countdown armed");
        }

        let advance = self.matcher.apply(key, &self.passage);
        self.live = Metrics::compute(&self.matcher.counters(), self.elapsed_at(now));

        if advance == Advance::Completed {
            self.finish(Termination::Completed);
            return Some(Termination::Completed);
        }
        None
    }

    /// Advance the clock. Returns `Timeout` when the countdown ran out.
    ///
    /// Each due second is evaluated at its scheduled instant, so tick metrics
    /// use whole elapsed seconds while keystrokes use the exact time since the
    /// first key. A late tick therefore catches up without inflating elapsed
    /// time, and a timeout always freezes figures at exactly the limit.
    pub fn tick(&mut self, now: Instant) -> Option<Termination> {
        if self.phase != Phase::Running {
            return None;
        }
        let due = match self.countdown.as_mut() {
            Some(countdown) => countdown.due_ticks(now),
            None => return None,
        };

        for _ in 0..due {
            self.elapsed_secs += 1;
            if let Some(remaining) = self.remaining.as_mut() {
                *remaining = remaining.saturating_sub(1);
            }

            let nominal = Duration::from_secs(u64::from(self.elapsed_secs));
            self.live = Metrics::compute(&self.matcher.counters(), Some(nominal));
            self.samples
                .push(WpmSample::new(self.elapsed_secs, self.live.wpm));

            if self.remaining == Some(0) {
                self.finish(Termination::Timeout);
                return Some(Termination::Timeout);
            }
        }
        None
    }

    fn finish(&mut self, termination: Termination) {
        self.countdown = None;
        self.final_metrics = Some(self.live);
        self.phase = Phase::Finished(termination);
        tracing::debug!(
            ?termination,
            wpm = self.live.wpm,
            accuracy = self.live.accuracy,
            "session finished"
        );
    }

    fn elapsed_at(&self, now: Instant) -> Option<Duration> {
        self.started_at.map(|start| now.saturating_duration_since(start))
    }

    pub fn passage(&self) -> &Passage {
        &self.passage
    }

    pub fn config(&self) -> SessionConfig {
        self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }

    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, Phase::Finished(_))
    }

    pub fn termination(&self) -> Option<Termination> {
        match self.phase {
            Phase::Finished(t) => Some(t),
            _ => None,
        }
    }

    /// True once the first printable keystroke started the clock
    pub fn is_armed(&self) -> bool {
        self.started_at.is_some()
    }

    /// True while a countdown is scheduled
    pub fn has_pending_countdown(&self) -> bool {
        self.countdown.is_some()
    }

    pub fn states(&self) -> &[CharState] {
        self.matcher.states()
    }

    pub fn cursor(&self) -> usize {
        self.matcher.cursor()
    }

    pub fn counters(&self) -> Counters {
        self.matcher.counters()
    }

    /// Final figures once finished, live figures otherwise
    pub fn metrics(&self) -> Metrics {
        self.final_metrics.unwrap_or(self.live)
    }

    pub fn final_metrics(&self) -> Option<Metrics> {
        self.final_metrics
    }

    /// Seconds left in timed mode, `None` in passage mode
    pub fn remaining_secs(&self) -> Option<u32> {
        self.remaining
    }

    pub fn elapsed_secs(&self) -> u32 {
        self.elapsed_secs
    }

    pub fn wpm_samples(&self) -> &[WpmSample] {
        &self.samples
    }
}
