use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::theme::ColorfulTheme;

use jarvis_chat::app::App;
use jarvis_chat::chat::{Answered, ChatClient, ChatOutcome, ClearOutcome, Confirm, CLEAR_HISTORY_FAILED};
use jarvis_chat::config::{Config, Settings};
use jarvis_chat::state::StatusKind;
use jarvis_chat::tui::{self, EventPump, Tui};
use jarvis_chat::{handler, logging, ui, ApiClient};

#[derive(Parser)]
#[command(name = "jarvis", version)]
#[command(about = "Terminal chat client for the Jarvis AI assistant")]
struct Cli {
    /// Base URL of the Jarvis API (e.g. http://localhost:5000/api)
    #[arg(long, global = true, env = "JARVIS_API_URL")]
    api_url: Option<String>,
    /// Request timeout in seconds
    #[arg(long, global = true, env = "JARVIS_TIMEOUT_SECS")]
    timeout: Option<u64>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive chat (default)
    Chat,
    /// Check whether the assistant is online
    Health,
    /// Send a single message and print the reply
    Ask {
        /// Your message
        message: String,
    },
    /// Clear the server-side conversation history
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Show knowledge base statistics
    Stats,
    /// Add a document to the knowledge base
    AddKnowledge {
        /// Text to add
        text: String,
        /// Metadata entries as key=value (repeatable)
        #[arg(short, long = "meta", value_parser = parse_key_value)]
        meta: Vec<(String, String)>,
    },
    /// Show the effective settings, or save new values with --set-*
    Config {
        /// API base URL to save
        #[arg(long)]
        set_api_url: Option<String>,
        /// Request timeout (seconds) to save
        #[arg(long)]
        set_timeout: Option<u64>,
        /// Directory for TUI log files
        #[arg(long)]
        set_log_dir: Option<PathBuf>,
    },
}

fn parse_key_value(s: &str) -> Result<(String, String)> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| anyhow!("expected key=value, got '{}'", s))?;
    if key.is_empty() {
        bail!("metadata key cannot be empty in '{}'", s);
    }
    Ok((key.to_string(), value.to_string()))
}

/// Yes/no prompt on the controlling terminal.
struct PromptConfirm;

#[async_trait]
impl Confirm for PromptConfirm {
    async fn confirm(&mut self, prompt: &str) -> bool {
        let prompt = prompt.to_string();
        tokio::task::spawn_blocking(move || {
            dialoguer::Confirm::with_theme(&ColorfulTheme::default())
                .with_prompt(prompt)
                .default(false)
                .interact()
                .unwrap_or(false)
        })
        .await
        .unwrap_or(false)
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let (config, config_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };
    let settings = config.resolve(cli.api_url, cli.timeout);

    let command = cli.command.unwrap_or(Commands::Chat);

    // The TUI owns the terminal, so it logs to a file
    let _log_guard = match command {
        Commands::Chat => logging::init_file(settings.log_dir.as_deref())?,
        _ => {
            logging::init_stderr()?;
            None
        }
    };
    if let Some(e) = config_error {
        tracing::warn!(error = %e, "ignoring unreadable config file");
    }

    match command {
        Commands::Chat => run_tui(&settings).await,
        Commands::Health => show_health(&settings).await,
        Commands::Ask { message } => ask(&settings, &message).await,
        Commands::Clear { yes } => clear(&settings, yes).await,
        Commands::Stats => show_stats(&settings).await,
        Commands::AddKnowledge { text, meta } => add_knowledge(&settings, &text, meta).await,
        Commands::Config {
            set_api_url,
            set_timeout,
            set_log_dir,
        } => update_config(config, &settings, set_api_url, set_timeout, set_log_dir),
    }
}

fn api_client(settings: &Settings) -> Result<ApiClient> {
    Ok(ApiClient::new(&settings.api_base_url, settings.request_timeout)?)
}

async fn run_tui(settings: &Settings) -> Result<ExitCode> {
    let mut app = App::new(api_client(settings)?);
    app.start_health_probe();
    tracing::info!(api = %settings.api_base_url, "starting chat session");

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run_app(&mut terminal, &mut app).await;
    app.shutdown();
    tui::restore()?;

    result.map(|_| ExitCode::SUCCESS)
}

async fn run_app(terminal: &mut Tui, app: &mut App) -> Result<()> {
    let mut events = EventPump::new();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event).await?,
            None => break,
        }
    }

    Ok(())
}

fn print_server_hint(settings: &Settings) {
    println!(
        "Make sure the backend server is running at {}",
        settings.api_base_url.bold()
    );
}

async fn show_health(settings: &Settings) -> Result<ExitCode> {
    let api = api_client(settings)?;
    let mut client = ChatClient::new();
    client.probe_health(&api).await;

    let status = client.status();
    match status.kind {
        StatusKind::Online => {
            println!("{} {}", "●".green(), status.label.bold());
            Ok(ExitCode::SUCCESS)
        }
        _ => {
            println!("{} {}", "●".red(), status.label.bold());
            print_server_hint(settings);
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn ask(settings: &Settings, message: &str) -> Result<ExitCode> {
    let api = api_client(settings)?;
    let mut client = ChatClient::new();

    let Some(outcome) = client.submit(&api, message).await else {
        bail!("Message cannot be empty");
    };

    let reply = client
        .conversation()
        .messages()
        .last()
        .ok_or_else(|| anyhow!("no reply recorded"))?;

    println!("{}", "Jarvis:".bold().yellow());
    println!("{}", reply.text());

    match outcome {
        ChatOutcome::Replied => {
            if let Some(sources) = reply.sources().filter(|n| *n > 0) {
                println!("\n{}", format!("({} knowledge sources)", sources).dimmed());
            }
            Ok(ExitCode::SUCCESS)
        }
        ChatOutcome::Failed => Ok(ExitCode::FAILURE),
    }
}

async fn clear(settings: &Settings, yes: bool) -> Result<ExitCode> {
    let api = api_client(settings)?;
    let mut client = ChatClient::new();

    let mut confirm: Box<dyn Confirm> = if yes {
        Box::new(Answered(true))
    } else {
        Box::new(PromptConfirm)
    };

    match client.clear_history(&api, confirm.as_mut()).await {
        ClearOutcome::Cancelled => {
            println!("{}", "Cancelled".dimmed());
            Ok(ExitCode::SUCCESS)
        }
        ClearOutcome::Cleared => {
            println!("{}", "Conversation history cleared".green());
            Ok(ExitCode::SUCCESS)
        }
        ClearOutcome::Failed(e) => {
            println!("{}: {}", CLEAR_HISTORY_FAILED.red(), e);
            print_server_hint(settings);
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn show_stats(settings: &Settings) -> Result<ExitCode> {
    let api = api_client(settings)?;

    match api.stats().await {
        Ok(stats) => {
            println!("\n{}", "📚 Knowledge Base".bold().blue());
            println!("{}", "=".repeat(30).dimmed());
            println!("  Documents:     {}", stats.total_documents.to_string().bold());
            if let Some(name) = &stats.collection_name {
                println!("  Collection:    {}", name.green());
            }
            if let Some(turns) = stats.conversation_length {
                println!("  Conversation:  {} messages", turns.to_string().bold());
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            println!("{}: {}", "Error fetching stats".red(), e);
            print_server_hint(settings);
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn add_knowledge(
    settings: &Settings,
    text: &str,
    meta: Vec<(String, String)>,
) -> Result<ExitCode> {
    if text.trim().is_empty() {
        bail!("Text cannot be empty");
    }

    let api = api_client(settings)?;
    let metadata: BTreeMap<String, String> = meta.into_iter().collect();

    match api.add_knowledge(text.trim(), &metadata).await {
        Ok(reply) => {
            println!("{} {}", "✓".green(), reply.message);
            if let Some(stats) = reply.stats {
                println!(
                    "  {} documents in the knowledge base",
                    stats.total_documents.to_string().bold()
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            println!("{}: {}", "Error adding knowledge".red(), e);
            print_server_hint(settings);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn update_config(
    mut config: Config,
    settings: &Settings,
    set_api_url: Option<String>,
    set_timeout: Option<u64>,
    set_log_dir: Option<PathBuf>,
) -> Result<ExitCode> {
    let changed = set_api_url.is_some() || set_timeout.is_some() || set_log_dir.is_some();

    if changed {
        if let Some(url) = set_api_url {
            config.api_base_url = Some(url);
        }
        if let Some(secs) = set_timeout {
            config.request_timeout_secs = Some(secs);
        }
        if let Some(dir) = set_log_dir {
            config.log_dir = Some(dir);
        }
        let path = config.save()?;
        println!("{} Saved {}", "✓".green(), path.display().to_string().dimmed());
        return Ok(ExitCode::SUCCESS);
    }

    println!("\n{}", "⚙ Configuration".bold().blue());
    println!("{}", "=".repeat(30).dimmed());
    println!("  File:     {}", Config::get_config_path()?.display());
    println!("  API URL:  {}", settings.api_base_url.green());
    println!("  Timeout:  {}s", settings.request_timeout.as_secs());
    match &settings.log_dir {
        Some(dir) => println!("  Logs:     {}", dir.display()),
        None => println!("  Logs:     {}", "disabled".dimmed()),
    }
    Ok(ExitCode::SUCCESS)
}
