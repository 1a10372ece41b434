mod config_commands;
mod conversation_commands;
mod serve;

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "handoff", about = "WhatsApp assistant gateway with human handoff")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Address to bind to (overrides config value).
    #[arg(long, global = true)]
    bind: Option<String>,
    /// Port to listen on (overrides config value).
    #[arg(long, global = true)]
    port: Option<u16>,
    /// Directory for conversation state (overrides config value).
    #[arg(long, global = true, env = "HANDOFF_DATA_DIR")]
    data_dir: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook gateway (default when no subcommand is provided).
    Serve,
    /// Work escalated conversations through a running gateway.
    Conversations {
        /// Gateway base URL. Defaults to the configured bind address and port.
        #[arg(long, env = "HANDOFF_URL")]
        url: Option<String>,
        #[command(subcommand)]
        action: conversation_commands::ConversationAction,
    },
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "handoff starting");

    let mut config = handoff_config::discover_and_load();
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(dir) = cli.data_dir {
        config.storage.data_dir = Some(dir);
    }

    match cli.command {
        None | Some(Commands::Serve) => serve::run(config).await,
        Some(Commands::Conversations { url, action }) => {
            conversation_commands::handle_conversations(&config, url, action).await
        },
        Some(Commands::Config { action }) => {
            config_commands::handle_config(action, &config).await
        },
    }
}
