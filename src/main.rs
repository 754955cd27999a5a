use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use openrouter_chat::tui::{self, EventHandler, Tui, TICK_RATE};
use openrouter_chat::{
    handler, ui, App, ChatRole, ChatSession, Config, OpenRouterClient, Submission,
};

#[derive(Parser)]
#[command(name = "openrouter-chat")]
#[command(author, version, about = "Chat with OpenRouter-hosted models from the terminal")]
struct Cli {
    /// Model identifier, e.g. openai/gpt-4o-mini
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Chat completions endpoint URL
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Config file (defaults to <config dir>/openrouter-chat/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one message and print the reply
    Ask {
        /// Your message
        message: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The TUI owns the terminal, so its logs go to a file
    init_logging(cli.verbose, cli.command.is_none())?;

    let config = resolve_config(&cli)?;
    info!(
        "API key: {}",
        if config.api_key().is_some() { "present" } else { "missing" }
    );
    info!(model = %config.model(), endpoint = %config.endpoint(), "Configuration loaded");

    match cli.command {
        Some(Commands::Ask { message }) => ask(config, &message).await,
        None => run_tui(config).await,
    }
}

/// Defaults, then the config file, then the environment, then flags.
fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    }
    .with_env();

    if let Some(model) = &cli.model {
        config = config.with_model(model);
    }
    if let Some(endpoint) = &cli.endpoint {
        config = config.with_endpoint(endpoint);
    }
    Ok(config)
}

fn init_logging(verbose: bool, to_file: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let result = if to_file {
        let log_path = log_file_path()?;
        if let Some(parent) = log_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&log_path)?;
        builder.with_ansi(false).with_writer(Mutex::new(file)).try_init()
    } else {
        builder.with_writer(std::io::stderr).try_init()
    };

    result.map_err(|e| anyhow!("Failed to initialize logging: {}", e))
}

fn log_file_path() -> Result<PathBuf> {
    let cache_dir = dirs::cache_dir()
        .ok_or_else(|| anyhow!("Could not determine cache directory"))?;

    Ok(cache_dir.join("openrouter-chat").join("chat.log"))
}

async fn ask(config: Config, message: &str) -> Result<()> {
    let client = OpenRouterClient::new(config.endpoint());
    let mut session = ChatSession::new(config);

    match session.submit(&client, message).await {
        Submission::Dropped => bail!("Nothing to send: the message is empty"),
        Submission::Unsent | Submission::Request(_) => {
            if let Some(error) = session.error() {
                bail!("{}", error);
            }
        }
    }

    if let Some(reply) = session
        .transcript()
        .last()
        .filter(|msg| msg.role == ChatRole::Assistant)
    {
        println!("{}", reply.content);
    }

    Ok(())
}

async fn run_tui(config: Config) -> Result<()> {
    let client = OpenRouterClient::new(config.endpoint());
    let mut app = App::new(config, Arc::new(client));

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new(TICK_RATE);

    let result = run_loop(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    if app.request_task.is_some() {
        info!("Exiting with a request still in flight; its reply is dropped");
    }
    result
}

async fn run_loop(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        let Some(event) = events.next().await else {
            break;
        };
        handler::handle_event(app, event)?;
        app.poll_request().await;
    }
    Ok(())
}
