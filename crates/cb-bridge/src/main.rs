//! chatbot-bridge: main binary
//!
//! Relays WhatsApp messages to an external chatbot service and exposes an
//! HTTP route that lets the service send messages back out.
//!
//! Usage:
//!   chatbot-bridge                   - Start the bridge
//!   chatbot-bridge --config <path>   - Start with an explicit TOML config
//!   chatbot-bridge --help            - Show help

use cb_core::Config;
use cb_whatsapp::WhatsAppBridge;
use tracing_subscriber::EnvFilter;

/// Run mode
#[derive(Debug, PartialEq, Eq)]
enum RunMode {
    /// Run the bridge, optionally with a config file
    Bridge { config_path: Option<String> },
    /// Show help
    Help,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mode = parse_args(std::env::args().skip(1))?;

    let config_path = match mode {
        RunMode::Help => {
            print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("chatbot-bridge {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        RunMode::Bridge { config_path } => config_path,
    };

    // Load .env file before anything reads the environment
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = Config::load(config_path.as_deref())
        .map_err(|e| anyhow::anyhow!("Config error: {}", e))?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Config error: {}", e))?;

    run_bridge(config).await
}

/// Parse command line arguments
fn parse_args<I>(args: I) -> anyhow::Result<RunMode>
where
    I: IntoIterator<Item = String>,
{
    let mut config_path = None;
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => return Ok(RunMode::Help),
            "--version" | "-v" => return Ok(RunMode::Version),
            "--config" | "-c" => {
                let path = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config requires a path"))?;
                config_path = Some(path);
            }
            other => anyhow::bail!("Unknown argument: {} (see --help)", other),
        }
    }

    Ok(RunMode::Bridge { config_path })
}

/// Print help message
fn print_help() {
    println!("chatbot-bridge - WhatsApp <-> chatbot relay");
    println!();
    println!("Usage:");
    println!("  chatbot-bridge                   Start the bridge");
    println!("  chatbot-bridge --config <path>   Load settings from a TOML file");
    println!("  chatbot-bridge --help            Show this help message");
    println!("  chatbot-bridge --version         Show version");
    println!();
    println!("Environment Variables:");
    println!("  API_KEY                  Shared API key (required)");
    println!("  PYTHON_CHATBOT_ENDPOINT  Chatbot URL (required, alias: CHATBOT_ENDPOINT)");
    println!("  CHATBOT_TIMEOUT_SECS     Chatbot request timeout (default: 30)");
    println!("  API_PORT                 HTTP API port (default: 3000)");
    println!("  API_ALLOWED_ORIGINS      Comma-separated CORS origins (default: any)");
    println!("  SESSION_ID               WhatsApp session id (default: chatbot_session)");
    println!("  WHATSAPP_SIDECAR_URL     Session sidecar URL (default: http://127.0.0.1:3001)");
    println!("  WHATSAPP_AUTH_DIR        Credential directory (default: auth_<SESSION_ID>)");
    println!("  RUST_LOG                 Log filter (default: info)");
}

/// Run the WhatsApp session and the HTTP API until Ctrl+C
async fn run_bridge(config: Config) -> anyhow::Result<()> {
    tracing::info!("Starting chatbot-bridge...");
    tracing::info!("Session: {}", config.whatsapp.session_id);
    tracing::info!(
        "Chatbot endpoint: {}",
        config.chatbot.endpoint.as_deref().unwrap_or_default()
    );

    let bridge = WhatsAppBridge::new(&config)
        .map_err(|e| anyhow::anyhow!("Failed to create WhatsApp bridge: {}", e))?;
    let session = bridge.session();

    // Track running services for shutdown
    let mut service_handles = Vec::new();

    service_handles.push(tokio::spawn(async move {
        if let Err(e) = bridge.start().await {
            tracing::error!("WhatsApp bridge error: {}", e);
        }
    }));

    let api_config = config.clone();
    service_handles.push(tokio::spawn(async move {
        if let Err(e) = cb_api::start_server(&api_config, session).await {
            tracing::error!("HTTP API error: {}", e);
        }
    }));

    tracing::info!("chatbot-bridge initialized successfully");
    tracing::info!("Press Ctrl+C to exit");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");

    for handle in service_handles {
        handle.abort();
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
