//! bibleplan - a terminal reader for a 365-day Bible reading plan.
//!
//! Reads one day of the plan at a time, tracks which days are done, and
//! keeps every chapter it has fetched readable offline.

mod app;
mod ui;

use std::io;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::{App, AppState};
use bibleplan_core::config::Config;
use bibleplan_core::models::{parse_day, FIRST_DAY};
use ui::input::handle_input;
use ui::render::render;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

const LOG_FILE: &str = "bibleplan.log";

const USAGE: &str = "\
Usage: bibleplan [--day N]
       bibleplan --sign-in [user]
       bibleplan --sign-out";

/// What the command line asked for.
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Run { day: u32 },
    /// `None` signs in again as the last user.
    SignIn(Option<String>),
    SignOut,
    Help,
}

fn parse_args(args: &[String]) -> Result<Command> {
    match args {
        [] => Ok(Command::Run { day: FIRST_DAY }),
        [flag, day] if flag == "--day" => parse_day(day)
            .map(|day| Command::Run { day })
            .ok_or_else(|| anyhow::anyhow!("Invalid day {:?}, expected 1-365", day)),
        [flag, user] if flag == "--sign-in" && !user.trim().is_empty() => {
            Ok(Command::SignIn(Some(user.trim().to_string())))
        }
        [flag] if flag == "--sign-in" => Ok(Command::SignIn(None)),
        [flag] if flag == "--sign-out" => Ok(Command::SignOut),
        [flag] if flag == "--help" || flag == "-h" => Ok(Command::Help),
        _ => anyhow::bail!("Unrecognized arguments\n\n{}", USAGE),
    }
}

/// Initialize the tracing subscriber, writing to a log file in the data
/// directory. The terminal belongs to the UI, so nothing is logged there.
fn init_tracing(data_dir: &Path) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let file = std::fs::create_dir_all(data_dir).and_then(|_| {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(data_dir.join(LOG_FILE))
    });

    match file {
        Ok(file) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                .with(filter)
                .init();
            Some(guard)
        }
        Err(e) => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::sink))
                .with(filter)
                .init();
            eprintln!("Warning: could not open log file: {}", e);
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_args(&args)?;

    let data_dir = Config::load()
        .unwrap_or_default()
        .data_dir()
        .context("Could not resolve the data directory")?;
    let _log_guard = init_tracing(&data_dir);

    match command {
        Command::Help => {
            println!("{}", USAGE);
            Ok(())
        }
        Command::SignIn(user) => {
            let user = match user {
                Some(user) => user,
                None => Config::load_stored()?
                    .last_user
                    .context("No previous user, pass one to --sign-in")?,
            };
            sign_in(&user)
        }
        Command::SignOut => {
            match app::sign_out()? {
                Some(user) => println!("Signed out {}.", user),
                None => println!("Not signed in."),
            }
            Ok(())
        }
        Command::Run { day } => run(day).await,
    }
}

fn sign_in(user: &str) -> Result<()> {
    let token = rpassword::prompt_password(format!("Sync token for {}: ", user))?;
    let token = token.trim();
    if token.is_empty() {
        anyhow::bail!("No token entered");
    }
    app::sign_in(user, token)?;
    println!("Signed in as {}. Progress will sync on next start.", user);
    Ok(())
}

async fn run(day: u32) -> Result<()> {
    info!(day, "bibleplan starting");

    // Create app before touching the terminal so config errors print normally
    let mut app = App::new(day)?;
    app.start();

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Main loop
    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        warn!(error = %e, "UI loop failed");
        eprintln!("Error: {}", e);
    }

    info!("bibleplan shutting down");
    Ok(())
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    loop {
        // Draw UI
        terminal.draw(|f| render(f, app))?;

        // Poll for events with timeout to allow background updates
        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                // Ctrl+C to quit
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    return Ok(());
                }

                if handle_input(app, key) {
                    return Ok(());
                }
            }
        }

        // Check for completed background tasks
        app.check_background_tasks();

        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }
    }
}
