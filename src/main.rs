//! wsbridge CLI
//!
//! - `serve`: run the event hub (`/ws`, `/api/emit`, `/health`)
//! - `listen`: connect as a client and print events as JSON lines
//! - `emit`: connect as a client and publish one event
//! - `config`: print a default config file

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use wsbridge::api::{self, AppState};
use wsbridge::config::{generate_default_config, Config, LoggingConfig};
use wsbridge::router::callback;
use wsbridge::runtime::Runtime;

#[derive(Parser)]
#[command(name = "wsbridge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Resilient bidirectional event channel over WebSocket")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the event hub server
    Serve {
        /// Host to bind (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to bind (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
        /// Re-broadcast client events with these names to every client
        #[arg(long)]
        echo: Vec<String>,
    },

    /// Subscribe to events and print them
    Listen {
        /// Event names to subscribe to
        #[arg(required = true)]
        events: Vec<String>,
        /// Page origin to derive the endpoint from (overrides config)
        #[arg(long)]
        url: Option<String>,
        /// Exit after this many events
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },

    /// Publish one event
    Emit {
        /// Event name
        event: String,
        /// Arguments; each is parsed as JSON, falling back to a string
        args: Vec<String>,
        /// Page origin to derive the endpoint from (overrides config)
        #[arg(long)]
        url: Option<String>,
        /// Seconds to wait for the connection
        #[arg(long, default_value = "10")]
        timeout: u64,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().or_else(Config::find_default_path);
    let config = match &config_path {
        Some(path) => Config::load_with_env(path)?,
        None => Config::from_env(),
    };
    init_tracing(&config.logging);

    match &config_path {
        Some(path) => tracing::info!("Loaded config from {:?}", path),
        None => tracing::info!("Using default config with environment overrides"),
    }

    match cli.command {
        Commands::Serve { host, port, echo } => serve(config, host, port, echo).await,
        Commands::Listen { events, url, count } => listen(config, url, events, count).await,
        Commands::Emit {
            event,
            args,
            url,
            timeout,
        } => emit(config, url, event, args, Duration::from_secs(timeout)).await,
        Commands::Config { output } => {
            let content = generate_default_config();
            match output {
                Some(path) => {
                    std::fs::write(&path, content)
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!("Wrote default config to {}", path.display());
                }
                None => print!("{}", content),
            }
            Ok(())
        }
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("wsbridge={}", logging.level)));
    let registry = tracing_subscriber::registry().with(filter);

    // stdout is reserved for command output
    if logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn serve(
    config: Config,
    host: Option<String>,
    port: Option<u16>,
    echo: Vec<String>,
) -> anyhow::Result<()> {
    let mut api_config = config.server.api_config();
    if let Some(host) = host {
        api_config.host = host;
    }
    if let Some(port) = port {
        api_config.port = port;
    }

    tracing::info!("wsbridge event hub v{}", env!("CARGO_PKG_VERSION"));

    let state = AppState::new(api_config.clone());
    for name in echo {
        let hub = state.hub.clone();
        let event = name.clone();
        state.events.subscribe(
            &name,
            callback(move |data| {
                hub.emit(&event, data.clone());
            }),
        );
        tracing::info!(event = %name, "Echoing client event");
    }

    api::serve(state, &api_config).await?;
    Ok(())
}

fn connect(config: &Config, url: Option<String>) -> anyhow::Result<Runtime> {
    let mut channel = config.channel.clone();
    if let Some(url) = url {
        channel.page_url = url;
    }
    let options = channel
        .manager_options()
        .context("invalid channel configuration")?;

    tracing::debug!(endpoint = %options.endpoint, "Connecting");
    Ok(Runtime::builder(options).build())
}

async fn listen(
    config: Config,
    url: Option<String>,
    events: Vec<String>,
    count: Option<usize>,
) -> anyhow::Result<()> {
    let runtime = connect(&config, url)?;
    let (tx, mut rx) = mpsc::unbounded_channel::<(String, Value)>();

    for name in &events {
        let tx = tx.clone();
        let event = name.clone();
        runtime.events_on(name, move |data| {
            let _ = tx.send((event.clone(), data.clone()));
        });
    }

    let mut received = 0;
    loop {
        tokio::select! {
            next = rx.recv() => {
                let Some((event, data)) = next else { break };
                println!("{}", serde_json::json!({"event": event, "data": data}));
                received += 1;
                if count.is_some_and(|limit| received >= limit) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    runtime.shutdown().await;
    Ok(())
}

async fn emit(
    config: Config,
    url: Option<String>,
    event: String,
    args: Vec<String>,
    timeout: Duration,
) -> anyhow::Result<()> {
    let runtime = connect(&config, url)?;

    if tokio::time::timeout(timeout, runtime.wait_for_websocket())
        .await
        .is_err()
    {
        bail!(
            "could not connect to {} within {}s",
            runtime.manager().endpoint(),
            timeout.as_secs()
        );
    }

    let values = args.iter().map(|arg| parse_arg(arg)).collect();
    runtime.events_emit(&event, values);

    // Flushes the queued frame before closing
    runtime.shutdown().await;
    println!("Emitted {}", event);
    Ok(())
}

fn parse_arg(arg: &str) -> Value {
    serde_json::from_str(arg).unwrap_or_else(|_| Value::String(arg.to_string()))
}
