use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::runtime::{Handle, Runtime};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use fleetwatch::data::duration::parse_duration;
use fleetwatch::ui::{self, Theme, CONTENT_START_ROW};
use fleetwatch::{
    events, App, Dashboard, FileHistoryClient, HistoryClient, HistoryLoader, HttpHistoryClient,
    Settings, SettingsFile, StreamSource, SystemClock, TelemetrySource,
};

#[derive(Parser, Debug)]
#[command(name = "fleetwatch")]
#[command(about = "Operator dashboard for monitoring a fleet of telemetry-emitting devices")]
struct Args {
    /// Connect to a TCP endpoint for NDJSON telemetry (host:port).
    /// Reads stdin when absent or "-".
    #[arg(short, long)]
    connect: Option<String>,

    /// Settings file (TOML, JSON or YAML); thresholds reload when it changes
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Base URL of the telemetry history API
    #[arg(long, conflicts_with = "history_dir")]
    history_url: Option<String>,

    /// Read histories from <dir>/<device>.json instead of HTTP
    #[arg(long)]
    history_dir: Option<PathBuf>,

    /// Number of history points requested per device
    #[arg(short, long)]
    limit: Option<u32>,

    /// Staleness check period (e.g., "2s", "500ms")
    #[arg(long)]
    tick: Option<String>,

    /// Seconds without contact before a device is inactive
    #[arg(long)]
    stale: Option<f64>,

    /// Log fleet changes instead of drawing the dashboard
    #[arg(long)]
    headless: bool,

    /// Write logs to this file (the dashboard otherwise logs nothing)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.headless, args.log_file.as_deref())?;

    let settings = resolve_settings(&args)?;
    info!(
        tick = ?settings.monitor.tick_period(),
        history_limit = settings.history.limit,
        "Starting fleetwatch"
    );

    // Sources and the history loader spawn onto this runtime
    let rt = Runtime::new()?;
    let _guard = rt.enter();

    let source = open_source(args.connect.as_deref());
    let dashboard = Dashboard::new(
        Arc::new(SystemClock),
        settings.thresholds,
        settings.monitor.tick_period(),
    );

    let mut app = App::new(source, dashboard, pick_theme(args.headless))
        .with_history(history_loader(&settings, rt.handle().clone())?);
    if let Some(path) = &args.settings {
        // Loaded above with the CLI overrides; only later edits are reloaded
        app = app.with_settings(SettingsFile::new(path).primed());
    }

    if args.headless {
        rt.block_on(run_headless(&mut app))
    } else {
        run_tui(&mut app)
    }
}

/// Install the tracing subscriber.
///
/// The dashboard owns the terminal, so it only logs to a file.
fn init_tracing(headless: bool, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None if headless => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::stderr)
                .init();
        }
        None => {}
    }
    Ok(())
}

/// Load the settings file and apply command-line overrides.
fn resolve_settings(args: &Args) -> Result<Settings> {
    let mut settings = Settings::load(args.settings.as_deref())?;

    if let Some(url) = &args.history_url {
        settings.history.base_url = url.clone();
    }
    if let Some(dir) = &args.history_dir {
        settings.history.dir = Some(dir.clone());
    }
    if let Some(limit) = args.limit {
        settings.history.limit = limit;
    }
    if let Some(tick) = &args.tick {
        parse_duration(tick).with_context(|| format!("Invalid --tick value: {}", tick))?;
        settings.monitor.tick = tick.clone();
    }
    if let Some(stale) = args.stale {
        settings.thresholds.stale_seconds = Some(stale);
    }
    Ok(settings)
}

fn open_source(connect: Option<&str>) -> Box<dyn TelemetrySource> {
    match connect {
        Some(addr) if addr != "-" => Box::new(StreamSource::connect(addr)),
        _ => Box::new(StreamSource::spawn(tokio::io::stdin(), "stdin")),
    }
}

fn history_loader(settings: &Settings, handle: Handle) -> Result<HistoryLoader> {
    let client: Arc<dyn HistoryClient> = match &settings.history.dir {
        Some(dir) => Arc::new(FileHistoryClient::new(dir)),
        None => Arc::new(HttpHistoryClient::new(settings.history.base_url.clone())?),
    };
    info!("History source: {}", client.description());
    Ok(HistoryLoader::new(client, handle, settings.history.limit))
}

fn pick_theme(headless: bool) -> Theme {
    if headless {
        Theme::dark()
    } else {
        Theme::auto_detect()
    }
}

/// Drive the dashboard without a terminal, logging fleet changes.
async fn run_headless(app: &mut App) -> Result<()> {
    let mut devices = app.dashboard.subscribe_devices();
    let mut alerts = app.dashboard.subscribe_alerts();
    info!("Reading from {}", app.source_description());

    loop {
        app.update();

        if devices.has_changed().unwrap_or(false) {
            let view = app.dashboard.view();
            info!(
                total = view.total,
                active = view.active,
                selected = ?view.selected,
                "Fleet updated"
            );
            devices.borrow_and_update();
        }
        if alerts.has_changed().unwrap_or(false) {
            for alert in alerts.borrow_and_update().iter() {
                warn!(level = alert.level.symbol(), "{}", alert.message);
            }
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                app.quit();
                return Ok(());
            }
            _ = tokio::time::sleep(app.poll_timeout()) => {}
        }
    }
}

/// Run the TUI until the user quits.
fn run_tui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Setup panic hook to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        original_hook(panic);
    }));

    let result = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    while app.running {
        app.update();

        terminal.draw(|frame| ui::draw(frame, app))?;

        if let Some(event) = events::poll_event(app.poll_timeout())? {
            match event {
                Event::Key(key) => events::handle_key_event(app, key),
                Event::Mouse(mouse) => events::handle_mouse_event(app, mouse, CONTENT_START_ROW),
                Event::Resize(_, _) => {
                    // Terminal will redraw on next iteration
                }
                _ => {}
            }
        }
    }

    Ok(())
}
