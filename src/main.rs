use brisk::{
    app::App,
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore},
    games::{self, GameKind},
    runtime::{Clock, CrosstermEventSource, FixedTicker, InputEvent, MonotonicClock, Runner},
    sound::{SoundSink, TerminalBell},
    stats::StatsDb,
    ui::history,
    words::{self, HttpGameplayApi, LivesPolicy, WordOrderingSession},
};
use chrono::Local;
use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use log::{info, warn};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    fs::{self, File, OpenOptions},
    io::{self, stdin},
    path::PathBuf,
    rc::Rc,
};

/// Seed used by `simulate` when neither the flag nor the config sets one.
const DEFAULT_SIMULATION_SEED: u64 = 1;

/// cognitive mini-games in your terminal
#[derive(Parser, Debug)]
#[clap(
    version,
    about,
    long_about = "Short attention, inhibition and working-memory drills played in the terminal. Every finished session is scored, summarised with per-game metrics and kept in a local history."
)]
pub struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// start with sound off
    #[clap(long, global = true)]
    mute: bool,

    /// seed every random choice for a reproducible session
    #[clap(long, global = true)]
    seed: Option<u64>,

    /// results database to use instead of the default one
    #[clap(long, global = true, env = "BRISK_DB")]
    db: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// play a game
    Play {
        #[clap(value_enum)]
        game: GameKind,
    },
    /// play a whole session headlessly and print its report as JSON
    Simulate {
        #[clap(value_enum)]
        game: GameKind,

        /// chance that the simulated player answers correctly
        #[clap(long, default_value_t = 0.8, value_parser = parse_accuracy)]
        accuracy: f64,
    },
    /// show recent results
    History {
        /// only this game
        #[clap(short, long, value_enum)]
        game: Option<GameKind>,

        /// number of results to show
        #[clap(short = 'n', long)]
        limit: Option<usize>,
    },
    /// write every stored result as CSV
    Export {
        /// file to write; stdout when omitted
        #[clap(short, long)]
        out: Option<PathBuf>,
    },
    /// list the available games
    List,
    /// put shuffled words back in order against a remote gameplay
    Words {
        #[clap(long)]
        gameplay_id: String,

        /// bearer token for the gameplay service
        #[clap(long, env = "BRISK_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// gameplay service base url
        #[clap(long)]
        api_url: Option<String>,

        /// keep lives across levels instead of refilling them
        #[clap(long)]
        carry_lives: bool,
    },
}

fn parse_accuracy(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|_| format!("`{s}` is not a number"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("accuracy must be between 0 and 1, got {value}"))
    }
}

impl Cli {
    /// Stored preferences with the command line laid over them.
    fn apply(&self, mut config: Config) -> Config {
        if self.mute {
            config.sound_enabled = false;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        config
    }

    fn open_db(&self) -> brisk::Result<StatsDb> {
        match &self.db {
            Some(path) => StatsDb::open(path),
            None => StatsDb::new(),
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging();

    let store = FileConfigStore::new();
    let config = cli.apply(store.load());

    match &cli.command {
        Command::Play { game } => play(&cli, *game, &config, &store)?,
        Command::Simulate { game, accuracy } => {
            let seed = config.seed.unwrap_or(DEFAULT_SIMULATION_SEED);
            let report = games::simulate(*game, seed, *accuracy)
                .ok_or("the simulated session did not finish")?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::History { game, limit } => {
            let db = cli.open_db()?;
            let results = db.recent(limit.unwrap_or(config.history_limit), *game)?;
            if results.is_empty() {
                println!("no results yet");
            } else {
                for line in history::format_history(&results, Local::now()) {
                    println!("{line}");
                }
            }
        }
        Command::Export { out } => {
            let db = cli.open_db()?;
            match out {
                Some(path) => {
                    let rows = db.export_csv(File::create(path)?)?;
                    println!("exported {rows} results to {}", path.display());
                }
                None => {
                    db.export_csv(io::stdout().lock())?;
                }
            }
        }
        Command::List => {
            for kind in GameKind::ALL {
                println!("{:<16} {}", kind.to_string(), kind.about());
            }
        }
        Command::Words {
            gameplay_id,
            token,
            api_url,
            carry_lives,
        } => {
            let url = api_url.as_deref().unwrap_or(&config.api_url);
            let api = HttpGameplayApi::new(url, gameplay_id, token.clone())?;
            let policy = if *carry_lives {
                LivesPolicy::CarryOver
            } else {
                LivesPolicy::ResetPerLevel
            };
            let mut session = WordOrderingSession::new(api, policy, config.seed);
            words::run_lines(
                &mut session,
                &MonotonicClock::new(),
                stdin().lock(),
                &mut io::stdout(),
            )?;
        }
    }

    Ok(())
}

/// Logs go to a file since the terminal belongs to the game; without
/// `RUST_LOG` nothing is logged.
fn init_logging() {
    if std::env::var_os("RUST_LOG").is_none() {
        return;
    }
    let Some(path) = AppDirs::log_path() else {
        return;
    };
    if let Some(parent) = path.parent() {
        if fs::create_dir_all(parent).is_err() {
            return;
        }
    }
    if let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) {
        env_logger::Builder::from_default_env()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();
    }
}

fn bell() -> Box<dyn SoundSink> {
    Box::new(TerminalBell::stdout())
}

fn play(
    cli: &Cli,
    game: GameKind,
    config: &Config,
    store: &FileConfigStore,
) -> Result<(), Box<dyn Error>> {
    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let stats = match cli.open_db() {
        Ok(db) => Some(Rc::new(db)),
        Err(e) => {
            warn!("results will not be saved: {e}");
            None
        }
    };
    let options = config.session_options();
    let sound_before = options.sound_enabled;

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::with_sound(game, options, stats, bell);
    let outcome = start_tui(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    outcome?;

    if app.options.sound_enabled != sound_before {
        let mut saved = store.load();
        saved.sound_enabled = app.options.sound_enabled;
        store.save(&saved)?;
        info!("sound preference saved: {}", saved.sound_enabled);
    }

    Ok(())
}

fn start_tui<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(CrosstermEventSource::new(), FixedTicker::default());
    let clock = MonotonicClock::new();
    app.start(clock.now_ms());

    while !app.should_quit() {
        terminal.draw(|f| f.render_widget(&*app, f.area()))?;

        match runner.step() {
            InputEvent::Tick | InputEvent::Resize => app.on_tick(clock.now_ms()),
            InputEvent::Key(key) => app.on_key(key, clock.now_ms()),
        }
    }

    Ok(())
}
