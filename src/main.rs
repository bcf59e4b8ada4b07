use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chatbox_core::config::Overrides;
use chatbox_core::{ChatBackend, Config, HttpBackend, LocalBackend, Settings};
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod app;
mod handler;
mod reply;
mod tui;
mod ui;

use app::App;
use tui::{EventHandler, Tui};

const DEFAULT_LOG_DIRECTIVE: &str = "chatbox=info,chatbox_core=info";

/// Terminal chat widget that forwards messages to a chat backend.
#[derive(Parser, Debug)]
#[command(name = "chatbox", version, about)]
struct Args {
    /// Reply protocol: "json" (single JSON reply) or "stream" (streamed text).
    #[arg(long, env = "CHATBOX_PROTOCOL")]
    protocol: Option<String>,

    /// Endpoint for the JSON protocol.
    #[arg(long, env = "CHATBOX_ASK_URL")]
    ask_url: Option<String>,

    /// Endpoint for the streaming protocol.
    #[arg(long, env = "CHATBOX_STREAM_URL")]
    stream_url: Option<String>,

    /// Answer from a local Pokédex JSON file instead of the HTTP endpoints.
    #[arg(long, env = "CHATBOX_POKEDEX")]
    pokedex: Option<PathBuf>,

    /// Log filter directive (e.g. debug, chatbox_core=trace).
    #[arg(long, env = "CHATBOX_LOG")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load config before logging so it can carry the log level
    let config_path = Config::config_path()?;
    let (config, config_error) = match Config::load_from(&config_path) {
        Ok(config) => (config, None),
        Err(e) => (Config::new(), Some(e)),
    };

    let log_path = init_logging(args.log_level.as_deref().or(config.log_level.as_deref()))?;
    tracing::info!("chatbox v{} starting (log: {})", env!("CARGO_PKG_VERSION"), log_path.display());
    if let Some(e) = config_error {
        tracing::warn!("Config load failed, using defaults: {e}");
    }

    let overrides = Overrides {
        protocol: args.protocol,
        ask_url: args.ask_url,
        stream_url: args.stream_url,
        pokedex: args.pokedex,
    };
    let settings = Settings::resolve(&config, &overrides)?;
    tracing::info!(
        protocol = settings.protocol.as_str(),
        ask_url = %settings.ask_url,
        stream_url = %settings.stream_url,
        "backend configured"
    );

    let backend: Arc<dyn ChatBackend> = match &settings.pokedex {
        Some(path) => {
            tracing::info!(path = %path.display(), "answering from local Pokédex");
            Arc::new(LocalBackend::load(path)?)
        }
        None => Arc::new(HttpBackend::from_settings(&settings)),
    };

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();
    let mut app = App::new(settings, backend, events.sender(), config_path);

    let result = run(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    if let Err(e) = &result {
        tracing::error!("chatbox exited with error: {e:#}");
    }
    result
}

async fn run(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event),
            None => break,
        }
    }

    // Quitting cancelled the exchange; let it wind down before the runtime stops
    if let Some(task) = app.reply_task.take() {
        let _ = task.await;
    }

    tracing::info!("chatbox shutting down");
    Ok(())
}

/// Log to a file: the terminal belongs to the TUI
fn init_logging(directive: Option<&str>) -> Result<PathBuf> {
    let log_dir = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("chatbox");
    std::fs::create_dir_all(&log_dir)?;

    let log_path = log_dir.join("chatbox.log");
    let file = OpenOptions::new().create(true).append(true).open(&log_path)?;

    let directive = directive.unwrap_or(DEFAULT_LOG_DIRECTIVE);
    let filter = EnvFilter::try_new(directive)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVE));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();

    Ok(log_path)
}
