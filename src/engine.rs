use crate::error::PassageError;
use crate::ledger::{Outcome, ScoreLedger, ScoreRecord};
use crate::matcher::{Counters, Keystroke};
use crate::metrics::Metrics;
use crate::passages::{Difficulty, PassageSource};
use crate::runtime::Clock;
use crate::session::{Mode, Session, SessionConfig, Termination, DEFAULT_TIME_LIMIT_SECS};
use crate::time_series::WpmSample;

/// Initial choices for a new engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub difficulty: Difficulty,
    pub mode: Mode,
    pub time_limit_secs: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::default(),
            mode: Mode::default(),
            time_limit_secs: DEFAULT_TIME_LIMIT_SECS,
        }
    }
}

/// Everything the results view shows for a finished session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub difficulty: Difficulty,
    pub termination: Termination,
    pub outcome: Outcome,
    pub metrics: Metrics,
    pub counters: Counters,
    /// Best before this session was recorded
    pub previous_best: u32,
    pub personal_best: u32,
    pub recent_scores: Vec<ScoreRecord>,
    pub wpm_samples: Vec<WpmSample>,
}

/// Drives sessions for the front end and records their results
pub struct Engine<S: PassageSource, C: Clock> {
    source: S,
    ledger: ScoreLedger,
    clock: C,
    difficulty: Difficulty,
    config: SessionConfig,
    session: Option<Session>,
    report: Option<SessionReport>,
    startup_error: Option<PassageError>,
}

impl<S: PassageSource, C: Clock> Engine<S, C> {
    /// A passage that fails to load leaves the engine idle without a session;
    /// the error is kept for [`Engine::take_startup_error`] and `start`
    /// retries the load.
    pub fn new(source: S, ledger: ScoreLedger, clock: C, settings: EngineSettings) -> Self {
        let mut engine = Self {
            source,
            ledger,
            clock,
            difficulty: settings.difficulty,
            config: SessionConfig {
                mode: settings.mode,
                time_limit_secs: settings.time_limit_secs,
            },
            session: None,
            report: None,
            startup_error: None,
        };
        if let Err(e) = engine.load_session() {
            tracing::warn!(error = %e, difficulty = %engine.difficulty, "no passage at startup");
            engine.startup_error = Some(e);
        }
        engine
    }

    /// Why the initial passage could not be loaded, handed out once
    pub fn take_startup_error(&mut self) -> Option<PassageError> {
        self.startup_error.take()
    }

    fn load_session(&mut self) -> Result<(), PassageError> {
        self.report = None;
        self.session = None;
        let passage = self.source.select(self.difficulty)?;
        self.session = Some(Session::new(passage, self.config));
        Ok(())
    }

    /// Idle -> Running. Returns `Ok(false)` when a session is already under way.
    pub fn start(&mut self) -> Result<bool, PassageError> {
        if self.session.is_none() {
            self.load_session()?;
        }
        Ok(self.session.as_mut().is_some_and(Session::start))
    }

    pub fn press(&mut self, key: Keystroke) -> Option<Termination> {
        let now = self.clock.now();
        let end = self.session.as_mut()?.press(key, now);
        if end.is_some() {
            self.record_finished();
        }
        end
    }

    pub fn tick(&mut self) -> Option<Termination> {
        let now = self.clock.now();
        let end = self.session.as_mut()?.tick(now);
        if end.is_some() {
            self.record_finished();
        }
        end
    }

    fn record_finished(&mut self) {
        if self.report.is_some() {
            return;
        }
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let (Some(termination), Some(metrics)) = (session.termination(), session.final_metrics())
        else {
            return;
        };

        let previous_best = self.ledger.personal_best(self.difficulty);
        let outcome = self.ledger.record(
            self.difficulty,
            metrics.wpm,
            self.clock.today(),
            self.clock.epoch_millis(),
        );

        tracing::info!(
            difficulty = %self.difficulty,
            mode = %self.config.mode,
            ?termination,
            wpm = metrics.wpm,
            accuracy = metrics.accuracy,
            %outcome,
            "session finished"
        );

        self.report = Some(SessionReport {
            difficulty: self.difficulty,
            termination,
            outcome,
            metrics,
            counters: session.counters(),
            previous_best,
            personal_best: self.ledger.personal_best(self.difficulty),
            recent_scores: self.ledger.recent_scores(self.difficulty),
            wpm_samples: session.wpm_samples().to_vec(),
        });
    }

    /// Fresh idle session on a new passage
    pub fn retry(&mut self) -> Result<(), PassageError> {
        tracing::debug!(difficulty = %self.difficulty, "retry with a new passage");
        self.load_session()
    }

    /// Fresh idle session on the same passage. Nothing is recorded.
    pub fn restart(&mut self) {
        if let Some(session) = self.session.as_mut() {
            *session = Session::new(session.passage().clone(), self.config);
            self.report = None;
            tracing::debug!("restart on the same passage");
        }
    }

    fn is_idle(&self) -> bool {
        self.session.as_ref().map_or(true, Session::is_idle)
    }

    /// Applied only while idle; loads a passage of the new difficulty.
    ///
    /// `Ok(false)` means the change was refused. A load failure still switches
    /// the difficulty but leaves no session, and the error is returned.
    pub fn set_difficulty(&mut self, difficulty: Difficulty) -> Result<bool, PassageError> {
        if !self.is_idle() {
            return Ok(false);
        }
        self.difficulty = difficulty;
        if let Err(e) = self.load_session() {
            tracing::warn!(error = %e, %difficulty, "no passage for new difficulty");
            return Err(e);
        }
        Ok(true)
    }

    pub fn set_mode(&mut self, mode: Mode) -> bool {
        if !self.is_idle() {
            return false;
        }
        self.config.mode = mode;
        if let Some(session) = self.session.as_mut() {
            session.set_config(self.config);
        }
        true
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn report(&self) -> Option<&SessionReport> {
        self.report.as_ref()
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.report.as_ref().map(|r| r.outcome)
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn mode(&self) -> Mode {
        self.config.mode
    }

    pub fn time_limit_secs(&self) -> u32 {
        self.config.time_limit_secs
    }

    pub fn personal_best(&self) -> u32 {
        self.ledger.personal_best(self.difficulty)
    }

    pub fn recent_scores(&self) -> Vec<ScoreRecord> {
        self.ledger.recent_scores(self.difficulty)
    }
}
