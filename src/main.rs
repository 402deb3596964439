mod ui;

use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin, Write},
    path::PathBuf,
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use keystride::{
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore},
    engine::Engine,
    error::PassageError,
    ledger::ScoreLedger,
    matcher::Keystroke,
    passages::{Difficulty, FixedPassage, PassageBank, PassageSource},
    runtime::{
        Clock, CrosstermEventSource, FixedTicker, Runner, SystemClock, Ticker, TypingEvent,
        TypingEventSource,
    },
    session::{Mode, Session},
    store::{KeyValueStore, MemoryStore, SqliteStore},
};

/// timed typing test with live wpm, accuracy, personal bests and recent high scores
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A timed typing test: type the passage shown, watch live WPM and accuracy, and chase your personal best for each difficulty."
)]
pub struct Cli {
    /// passage difficulty (defaults to the saved setting)
    #[clap(short = 'd', long, value_enum)]
    difficulty: Option<Difficulty>,

    /// timed countdown or untimed passage mode
    #[clap(short = 'm', long, value_enum)]
    mode: Option<Mode>,

    /// number of seconds for timed mode
    #[clap(short = 's', long, value_parser = clap::value_parser!(u32).range(1..))]
    secs: Option<u32>,

    /// custom prompt to type; scores are not saved
    #[clap(short = 'p', long)]
    prompt: Option<String>,

    /// JSON file with easy/medium/hard passage pools
    #[clap(long, value_name = "FILE")]
    passages: Option<PathBuf>,

    /// print personal bests and recent high scores, then exit
    #[clap(long)]
    scores: bool,

    /// clear saved scores for every difficulty, then exit
    #[clap(long, conflicts_with = "scores")]
    reset_scores: bool,
}

impl Cli {
    /// Fold command-line overrides into the saved config. Returns whether
    /// anything changed.
    fn apply(&self, cfg: &mut Config) -> bool {
        let before = *cfg;
        if let Some(d) = self.difficulty {
            cfg.difficulty = d;
        }
        if let Some(m) = self.mode {
            cfg.mode = m;
        }
        if let Some(s) = self.secs {
            cfg.time_limit_secs = s;
        }
        before != *cfg
    }

    fn passage_source(&self) -> Result<Box<dyn PassageSource>, PassageError> {
        Ok(match (&self.prompt, &self.passages) {
            (Some(prompt), _) => Box::new(FixedPassage::new(prompt.clone())),
            (None, Some(path)) => Box::new(PassageBank::from_path(path)?),
            (None, None) => Box::new(PassageBank::embedded()?),
        })
    }

    fn score_store(&self) -> Box<dyn KeyValueStore> {
        if self.prompt.is_some() {
            return Box::new(MemoryStore::new());
        }
        match SqliteStore::new() {
            Ok(store) => Box::new(store),
            Err(e) => {
                tracing::warn!(error = %e, "score database unavailable, scores will not be saved");
                Box::new(MemoryStore::new())
            }
        }
    }
}

pub struct App<C: Clock = SystemClock> {
    pub engine: Engine<Box<dyn PassageSource>, C>,
    config_store: Option<Box<dyn ConfigStore>>,
    pub message: Option<String>,
}

impl<C: Clock> App<C> {
    pub fn new(
        mut engine: Engine<Box<dyn PassageSource>, C>,
        config_store: Option<Box<dyn ConfigStore>>,
    ) -> Self {
        let message = engine.take_startup_error().map(|e| e.to_string());
        Self {
            engine,
            config_store,
            message,
        }
    }

    fn is_idle(&self) -> bool {
        self.engine.session().map_or(true, Session::is_idle)
    }

    /// Returns false once the user asked to quit
    pub fn on_key(&mut self, key: KeyEvent) -> bool {
        if key.kind == KeyEventKind::Release {
            return true;
        }

        match key.code {
            KeyCode::Esc => return false,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return false,
            KeyCode::Tab => {
                self.message = self.engine.retry().err().map(|e| e.to_string());
            }
            KeyCode::Left => self.engine.restart(),
            _ if self.is_idle() => self.on_idle_key(key.code),
            _ => {
                self.engine.press(Keystroke::from(key));
            }
        }
        true
    }

    fn on_idle_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Enter => {
                self.message = self.engine.start().err().map(|e| e.to_string());
            }
            KeyCode::Char('1') => self.change_difficulty(Difficulty::Easy),
            KeyCode::Char('2') => self.change_difficulty(Difficulty::Medium),
            KeyCode::Char('3') => self.change_difficulty(Difficulty::Hard),
            KeyCode::Char('d') => self.change_difficulty(self.engine.difficulty().next()),
            KeyCode::Char('t') => self.change_mode(Mode::Timed),
            KeyCode::Char('p') => self.change_mode(Mode::Passage),
            _ => {}
        }
    }

    fn change_difficulty(&mut self, difficulty: Difficulty) {
        match self.engine.set_difficulty(difficulty) {
            Ok(false) => return,
            Ok(true) => self.message = None,
            Err(e) => self.message = Some(e.to_string()),
        }
        self.persist();
    }

    fn change_mode(&mut self, mode: Mode) {
        if self.engine.set_mode(mode) {
            self.persist();
        }
    }

    pub fn on_tick(&mut self) {
        self.engine.tick();
    }

    fn persist(&self) {
        let Some(store) = &self.config_store else {
            return;
        };
        let cfg = Config {
            difficulty: self.engine.difficulty(),
            mode: self.engine.mode(),
            time_limit_secs: self.engine.time_limit_secs(),
        };
        if let Err(e) = store.save(&cfg) {
            tracing::warn!(error = %e, "failed to save config");
        }
    }
}

fn init_logging() -> Option<WorkerGuard> {
    let log_dir = AppDirs::log_dir()?;
    std::fs::create_dir_all(&log_dir).ok()?;

    let file_appender = tracing_appender::rolling::never(&log_dir, "keystride.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("keystride=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .ok()?;
    Some(guard)
}

fn print_scores<W: Write>(ledger: &ScoreLedger, out: &mut W) -> io::Result<()> {
    for d in Difficulty::ALL {
        writeln!(out, "{d}: personal best {} wpm", ledger.personal_best(d))?;
        let scores = ledger.recent_scores(d);
        if scores.is_empty() {
            writeln!(out, "  no scores yet")?;
        }
        for (rank, score) in scores.iter().enumerate() {
            writeln!(
                out,
                "  {}. {} wpm  {}",
                rank + 1,
                score.wpm,
                score.date.format("%Y-%m-%d")
            )?;
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let _log_guard = init_logging();

    if cli.scores || cli.reset_scores {
        let mut ledger = ScoreLedger::new(Box::new(SqliteStore::new()?));
        if cli.reset_scores {
            for d in Difficulty::ALL {
                ledger.reset(d);
            }
            println!("scores cleared");
        } else {
            print_scores(&ledger, &mut io::stdout().lock())?;
        }
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let config_store = FileConfigStore::new();
    let mut config = config_store.load();
    if cli.apply(&mut config) {
        if let Err(e) = config_store.save(&config) {
            tracing::warn!(error = %e, "failed to save config");
        }
    }

    let source = cli.passage_source()?;
    let ledger = ScoreLedger::new(cli.score_store());
    let engine = Engine::new(source, ledger, SystemClock, config.into());
    let mut app = App::new(engine, Some(Box::new(config_store)));
    tracing::info!(difficulty = %config.difficulty, mode = %config.mode, "starting");

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let runner = Runner::new(CrosstermEventSource::new(), FixedTicker::default());
    let res = start_tui(&mut terminal, &mut app, &runner);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

fn start_tui<B: Backend, C: Clock, E: TypingEventSource, T: Ticker>(
    terminal: &mut Terminal<B>,
    app: &mut App<C>,
    runner: &Runner<E, T>,
) -> Result<(), Box<dyn Error>> {
    loop {
        terminal.draw(|f| f.render_widget(&*app, f.area()))?;

        match runner.step() {
            TypingEvent::Tick => app.on_tick(),
            TypingEvent::Resize => {}
            TypingEvent::Key(key) => {
                if !app.on_key(key) {
                    break;
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystride::{
        engine::EngineSettings, ledger::Outcome, runtime::ManualClock, runtime::TestEventSource,
        session::Termination,
    };
    use ratatui::backend::TestBackend;
    use std::sync::mpsc;
    use std::time::Duration;
    use tempfile::tempdir;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn test_app(text: &str, clock: &ManualClock) -> App<ManualClock> {
        let engine = Engine::new(
            Box::new(FixedPassage::new(text)) as Box<dyn PassageSource>,
            ScoreLedger::new(Box::new(MemoryStore::new())),
            clock.clone(),
            EngineSettings::default(),
        );
        App::new(engine, None)
    }

    fn type_str(app: &mut App<ManualClock>, text: &str) {
        for c in text.chars() {
            assert!(app.on_key(key(KeyCode::Char(c))));
        }
    }

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::parse_from(["keystride"]);

        assert_eq!(cli.difficulty, None);
        assert_eq!(cli.mode, None);
        assert_eq!(cli.secs, None);
        assert_eq!(cli.prompt, None);
        assert_eq!(cli.passages, None);
        assert!(!cli.scores);
        assert!(!cli.reset_scores);
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from(["keystride", "-d", "easy", "-m", "passage", "-s", "30"]);
        assert_eq!(cli.difficulty, Some(Difficulty::Easy));
        assert_eq!(cli.mode, Some(Mode::Passage));
        assert_eq!(cli.secs, Some(30));

        let cli = Cli::parse_from(["keystride", "--difficulty", "medium", "--mode", "timed"]);
        assert_eq!(cli.difficulty, Some(Difficulty::Medium));
        assert_eq!(cli.mode, Some(Mode::Timed));
    }

    #[test]
    fn test_cli_custom_prompt() {
        let cli = Cli::parse_from(["keystride", "-p", "hello world"]);
        assert_eq!(cli.prompt, Some("hello world".to_string()));

        let cli = Cli::parse_from(["keystride", "--prompt", "custom text"]);
        assert_eq!(cli.prompt, Some("custom text".to_string()));
    }

    #[test]
    fn test_cli_rejects_bad_values() {
        assert!(Cli::try_parse_from(["keystride", "-s", "0"]).is_err());
        assert!(Cli::try_parse_from(["keystride", "-d", "extreme"]).is_err());
        assert!(Cli::try_parse_from(["keystride", "--scores", "--reset-scores"]).is_err());
    }

    #[test]
    fn test_cli_apply_reports_changes() {
        let mut cfg = Config::default();

        assert!(!Cli::parse_from(["keystride"]).apply(&mut cfg));
        assert!(!Cli::parse_from(["keystride", "-d", "hard"]).apply(&mut cfg));
        assert!(Cli::parse_from(["keystride", "-d", "easy", "-s", "15"]).apply(&mut cfg));
        assert_eq!(cfg.difficulty, Difficulty::Easy);
        assert_eq!(cfg.time_limit_secs, 15);
        assert_eq!(cfg.mode, Mode::Timed);
    }

    #[test]
    fn test_cli_prompt_source_ignores_difficulty() {
        let cli = Cli::parse_from(["keystride", "-p", "abc"]);
        let source = cli.passage_source().unwrap();

        assert_eq!(source.select(Difficulty::Easy).unwrap().as_str(), "abc");
        assert_eq!(source.select(Difficulty::Hard).unwrap().as_str(), "abc");
    }

    #[test]
    fn test_cli_missing_passages_file() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        let cli = Cli::parse_from(["keystride", "--passages", missing.to_str().unwrap()]);

        assert!(matches!(
            cli.passage_source(),
            Err(PassageError::Io { .. })
        ));
    }

    #[test]
    fn test_keys_before_enter_do_not_type() {
        let clock = ManualClock::new();
        let mut app = test_app("cab", &clock);

        assert!(app.on_key(key(KeyCode::Char('c'))));
        assert_eq!(app.engine.session().unwrap().cursor(), 0);

        app.on_key(key(KeyCode::Enter));
        type_str(&mut app, "ca");
        assert_eq!(app.engine.session().unwrap().cursor(), 2);
    }

    #[test]
    fn test_full_session_through_keys() {
        let clock = ManualClock::new();
        let mut app = test_app("cat", &clock);

        app.on_key(key(KeyCode::Enter));
        type_str(&mut app, "cxt");

        let session = app.engine.session().unwrap();
        assert_eq!(session.termination(), Some(Termination::Completed));
        assert_eq!(session.metrics().accuracy, 67);
        assert_eq!(app.engine.outcome(), Some(Outcome::Baseline));
    }

    #[test]
    fn test_mode_keys_only_while_idle() {
        let clock = ManualClock::new();
        let mut app = test_app("tp", &clock);

        app.on_key(key(KeyCode::Char('p')));
        assert_eq!(app.engine.mode(), Mode::Passage);

        app.on_key(key(KeyCode::Enter));
        app.on_key(key(KeyCode::Char('t')));
        assert_eq!(app.engine.mode(), Mode::Passage);
        assert_eq!(app.engine.session().unwrap().cursor(), 1);
    }

    #[test]
    fn test_difficulty_keys() {
        let clock = ManualClock::new();
        let mut app = test_app("abc", &clock);

        app.on_key(key(KeyCode::Char('1')));
        assert_eq!(app.engine.difficulty(), Difficulty::Easy);
        app.on_key(key(KeyCode::Char('d')));
        assert_eq!(app.engine.difficulty(), Difficulty::Medium);
        app.on_key(key(KeyCode::Char('3')));
        assert_eq!(app.engine.difficulty(), Difficulty::Hard);
    }

    #[test]
    fn test_settings_are_persisted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let clock = ManualClock::new();
        let mut app = test_app("abc", &clock);
        app.config_store = Some(Box::new(FileConfigStore::with_path(&path)));

        app.on_key(key(KeyCode::Char('2')));
        app.on_key(key(KeyCode::Char('p')));

        let cfg = FileConfigStore::with_path(&path).load();
        assert_eq!(cfg.difficulty, Difficulty::Medium);
        assert_eq!(cfg.mode, Mode::Passage);
    }

    #[test]
    fn test_quit_keys() {
        let clock = ManualClock::new();
        let mut app = test_app("abc", &clock);

        assert!(!app.on_key(key(KeyCode::Esc)));
        assert!(!app.on_key(KeyEvent::new(
            KeyCode::Char('c'),
            KeyModifiers::CONTROL
        )));
    }

    #[test]
    fn test_left_restarts_same_passage() {
        let clock = ManualClock::new();
        let mut app = test_app("abc", &clock);
        app.on_key(key(KeyCode::Enter));
        type_str(&mut app, "ab");

        app.on_key(key(KeyCode::Left));

        let session = app.engine.session().unwrap();
        assert!(session.is_idle());
        assert_eq!(session.passage().as_str(), "abc");
        assert!(app.engine.recent_scores().is_empty());
    }

    #[test]
    fn test_ticks_drive_timeout() {
        let clock = ManualClock::new();
        let mut app = test_app("abcdefghij", &clock);
        app.on_key(key(KeyCode::Enter));
        type_str(&mut app, "ab");

        for _ in 0..60 {
            clock.advance(Duration::from_secs(1));
            app.on_tick();
        }

        assert_eq!(
            app.engine.session().unwrap().termination(),
            Some(Termination::Timeout)
        );
        assert!(app.engine.report().is_some());
    }

    #[test]
    fn test_print_scores() {
        let mut ledger = ScoreLedger::new(Box::new(MemoryStore::new()));
        let date = chrono::NaiveDate::from_ymd_opt(2024, 5, 17).unwrap();
        ledger.record(Difficulty::Easy, 30, date, 1);
        ledger.record(Difficulty::Easy, 45, date, 2);

        let mut out = Vec::new();
        print_scores(&ledger, &mut out).unwrap();
        let out = String::from_utf8(out).unwrap();

        assert!(out.contains("easy: personal best 45 wpm"));
        assert!(out.contains("1. 45 wpm  2024-05-17"));
        assert!(out.contains("2. 30 wpm  2024-05-17"));
        assert!(out.contains("hard: personal best 0 wpm"));
        assert!(out.contains("no scores yet"));
    }

    #[test]
    fn test_start_tui_runs_until_escape() {
        let clock = ManualClock::new();
        let mut app = test_app("cat", &clock);
        let (tx, rx) = mpsc::channel();
        for code in [
            KeyCode::Enter,
            KeyCode::Char('c'),
            KeyCode::Char('a'),
            KeyCode::Char('t'),
            KeyCode::Esc,
        ] {
            tx.send(TypingEvent::Key(key(code))).unwrap();
        }
        let runner = Runner::new(
            TestEventSource::new(rx),
            FixedTicker::new(Duration::from_millis(1)),
        );
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();

        start_tui(&mut terminal, &mut app, &runner).unwrap();

        assert_eq!(app.engine.recent_scores().len(), 1);
        let content: String = terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|c| c.symbol())
            .collect();
        assert!(content.contains("Baseline Established!"));
    }

    fn hard_only_app(clock: &ManualClock, settings: EngineSettings) -> App<ManualClock> {
        let bank = PassageBank::from_json("test", r#"{"hard": [{"text": "abc"}]}"#).unwrap();
        let engine = Engine::new(
            Box::new(bank) as Box<dyn PassageSource>,
            ScoreLedger::new(Box::new(MemoryStore::new())),
            clock.clone(),
            settings,
        );
        App::new(engine, None)
    }

    fn screen(app: &App<ManualClock>) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| f.render_widget(app, f.area())).unwrap();
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    #[test]
    fn test_switch_to_empty_pool_shows_error() {
        let clock = ManualClock::new();
        let mut app = hard_only_app(&clock, EngineSettings::default());
        assert_eq!(app.message, None);

        app.on_key(key(KeyCode::Char('1')));

        assert_eq!(app.engine.difficulty(), Difficulty::Easy);
        assert_eq!(
            app.message.as_deref(),
            Some("no passages available for difficulty 'easy'")
        );
        assert!(screen(&app).contains("no passages available for difficulty 'easy'"));

        app.on_key(key(KeyCode::Char('3')));
        assert_eq!(app.message, None);
        assert!(app.engine.session().unwrap().is_idle());
    }

    #[test]
    fn test_startup_passage_error_is_shown() {
        let clock = ManualClock::new();
        let settings = EngineSettings {
            difficulty: Difficulty::Medium,
            ..EngineSettings::default()
        };
        let app = hard_only_app(&clock, settings);

        assert_eq!(
            app.message.as_deref(),
            Some("no passages available for difficulty 'medium'")
        );
        assert!(screen(&app).contains("no passages available for difficulty 'medium'"));
    }

    #[test]
    fn test_key_after_deadline_does_not_type() {
        let clock = ManualClock::new();
        let mut app = test_app("abc", &clock);
        app.on_key(key(KeyCode::Enter));
        type_str(&mut app, "a");

        clock.advance_secs(61);
        app.on_key(key(KeyCode::Char('b')));

        let session = app.engine.session().unwrap();
        assert!(session.is_finished());
        assert_eq!(session.cursor(), 1);
        assert_eq!(
            app.engine.report().unwrap().termination,
            Termination::Timeout
        );
    }
}
