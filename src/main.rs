use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use serde_json::json;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use whatsweb_cli::{Client, ClientConfig, ClientEvent, MessageInput, ScheduleOptions};

/// whatsweb - schedule and send WhatsApp Web messages from the terminal
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path (YAML or JSON)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Log line format on stderr
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Enable debug mode: error screenshots and a log file in the debug directory
    #[arg(short, long)]
    debug: bool,

    /// Run the browser without a window
    #[arg(long, global = true)]
    headless: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Open WhatsApp Web and wait until the session is logged in
    Login(LoginArgs),

    /// Schedule a message and wait until it has been sent
    Send(SendArgs),

    /// Stay connected and print incoming notifications
    Watch,

    /// Show build information and the resolved configuration
    Info,
}

#[derive(Args)]
struct LoginArgs {
    /// Give up after this long, e.g. "5m"
    #[arg(long, default_value = "5m", value_parser = humantime::parse_duration)]
    timeout: Duration,
}

#[derive(Args)]
#[command(group(ArgGroup::new("payload").required(true).args(["text", "file", "media"])))]
struct SendArgs {
    /// Target phone number, digits with optional spaces and leading +
    #[arg(short, long)]
    phone: String,

    /// Text content
    #[arg(long)]
    text: Option<String>,

    /// Document to attach
    #[arg(long, value_name = "PATH")]
    file: Option<String>,

    /// Image or video to attach
    #[arg(long, value_name = "PATH")]
    media: Option<String>,

    /// Wait this long before sending, e.g. "10m"
    #[arg(long, value_parser = humantime::parse_duration)]
    delay: Option<Duration>,

    /// Send at this time (RFC 3339)
    #[arg(long, value_parser = parse_rfc3339)]
    at: Option<DateTime<Utc>>,

    /// Caller-supplied correlation value
    #[arg(long)]
    nonce: Option<String>,

    /// Higher runs first
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    priority: i32,

    /// Print the outcome as JSON
    #[arg(long)]
    json: bool,
}

fn parse_rfc3339(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|err| err.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config =
        ClientConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    config.debug |= cli.debug;
    config.browser.headless |= cli.headless;

    // Initialize tracing
    let _log_guard = init_logging(&cli.log_level, cli.log_format, config.debug, &config.debug_dir)?;

    info!("Starting whatsweb v{}", env!("CARGO_PKG_VERSION"));

    let result = match cli.command {
        Commands::Login(args) => cmd_login(args, config).await,
        Commands::Send(args) => cmd_send(args, config).await,
        Commands::Watch => cmd_watch(config).await,
        Commands::Info => cmd_info(&config),
    };

    match result {
        Ok(()) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn init_logging(
    level: &str,
    format: LogFormat,
    debug: bool,
    debug_dir: &Path,
) -> Result<Option<WorkerGuard>> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };

    let (file_layer, guard) = if debug {
        std::fs::create_dir_all(debug_dir)
            .with_context(|| format!("creating {}", debug_dir.display()))?;
        let appender = tracing_appender::rolling::never(debug_dir, "whatsweb.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        (
            Some(fmt::layer().with_ansi(false).with_writer(writer)),
            Some(guard),
        )
    } else {
        (None, None)
    };

    let (text_layer, json_layer) = match format {
        LogFormat::Text => (Some(fmt::layer().with_writer(std::io::stderr)), None),
        LogFormat::Json => (None, Some(fmt::layer().json().with_writer(std::io::stderr))),
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string())),
        )
        .with(text_layer)
        .with(json_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}

/// Next event, skipping over lagged gaps. `None` once the bus is gone.
async fn next_event(events: &mut broadcast::Receiver<ClientEvent>) -> Option<ClientEvent> {
    loop {
        match events.recv().await {
            Ok(event) => return Some(event),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event consumer lagged"),
            Err(RecvError::Closed) => return None,
        }
    }
}

async fn cmd_login(args: LoginArgs, config: ClientConfig) -> Result<()> {
    let client = Client::launch(config).await?;
    let mut events = client.subscribe();
    client.start().await?;

    let outcome = tokio::time::timeout(args.timeout, async {
        while let Some(event) = next_event(&mut events).await {
            match event {
                ClientEvent::LoginRequired => println!("Scan the QR code with WhatsApp on your phone"),
                ClientEvent::LoggedIn => return Ok(()),
                ClientEvent::Stopped => bail!("browser closed before login"),
                _ => {}
            }
        }
        Err(anyhow!("event stream ended"))
    })
    .await;
    client.stop().await;

    outcome.map_err(|_| anyhow!("not logged in after {}", humantime::format_duration(args.timeout)))??;
    println!("Logged in");
    Ok(())
}

async fn cmd_send(args: SendArgs, config: ClientConfig) -> Result<()> {
    let input = MessageInput {
        content: args.text,
        file: args.file,
        media: args.media,
        nonce: args.nonce,
    };
    let options = ScheduleOptions {
        delay: args.delay,
        at: args.at,
        priority: args.priority,
    };

    let client = Client::launch(config).await?;
    let task = client.send_message(&args.phone, input, options)?;
    let mut events = client.subscribe();
    client.start().await?;
    info!(task = %task.id(), not_before = %task.not_before(), "Waiting for send");

    let finished = loop {
        match next_event(&mut events).await {
            Some(ClientEvent::TaskCompleted(done)) if done.id() == task.id() => break true,
            Some(ClientEvent::LoginRequired) => {
                println!("Not logged in: scan the QR code with WhatsApp on your phone")
            }
            Some(ClientEvent::Stopped) | None => break false,
            Some(_) => {}
        }
    };
    client.stop().await;

    if !finished {
        bail!("browser closed before the message was sent");
    }
    let message = task
        .message()
        .ok_or_else(|| anyhow!("task {} carries no message", task.id()))?;
    let record = message.record();

    if args.json {
        let report = json!({
            "task": task.id(),
            "phone": task.chat().map(|chat| chat.phone().as_str().to_string()),
            "state": task.state(),
            "nonce": message.nonce(),
            "record": record,
            "scheduler": client.metrics(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if let Some(id) = &record.id {
        println!("Sent {} ({})", message, id);
    }

    if let Some(err) = record.error {
        bail!("send failed: {err}");
    }
    Ok(())
}

async fn cmd_watch(config: ClientConfig) -> Result<()> {
    let client = Client::launch(config).await?;
    let mut events = client.subscribe();
    client.start().await?;
    println!("Watching notifications, press Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl-C, stopping");
                break;
            }
            event = next_event(&mut events) => match event {
                Some(ClientEvent::Notification(n)) => {
                    println!("[{}] {}: {}", Utc::now().format("%H:%M:%S"), n.phone_number, n.body);
                }
                Some(ClientEvent::LoginRequired) => println!("Scan the QR code with WhatsApp on your phone"),
                Some(ClientEvent::LoggedIn) => println!("Logged in"),
                Some(ClientEvent::LoggedOut) => println!("Logged out"),
                Some(ClientEvent::Stopped) | None => break,
                Some(_) => {}
            },
        }
    }
    client.stop().await;

    let totals = client.metrics();
    info!(
        enqueued = totals.enqueued,
        completed = totals.completed,
        failed = totals.failed,
        "Watch finished"
    );
    Ok(())
}

fn cmd_info(config: &ClientConfig) -> Result<()> {
    println!("whatsweb System Information");
    println!("===========================");
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!("Build Date: {}", env!("BUILD_DATE", "unknown"));
    println!("Git Commit: {}", env!("GIT_HASH", "unknown"));
    println!();
    println!("Configuration:");
    print!("{}", serde_yaml::to_string(config)?);
    Ok(())
}
