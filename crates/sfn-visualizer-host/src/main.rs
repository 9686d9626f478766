//! SfnVisualizer host entry point.

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use sfn_visualizer::LogLevel;
use sfn_visualizer_host::config::HostConfig;
use sfn_visualizer_host::outbox::Outbox;
use sfn_visualizer_host::protocol::ProtocolHandler;
use sfn_visualizer_host::service::VisualizerService;
use sfn_visualizer_host::transport::StdioTransport;
use sfn_visualizer_host::types::{InitializeResult, SERVER_NOTIFICATIONS};

#[derive(Parser)]
#[command(
    name = "sfn-visualizer-host",
    about = "JSON-RPC host that renders state machine definitions as graphs",
    version
)]
struct Cli {
    /// Directory holding cached graph assets and their state.
    #[arg(long, global = true)]
    storage: Option<String>,

    /// Directory to copy graph assets from instead of the bundled ones.
    #[arg(long, global = true)]
    assets: Option<String>,

    /// Log level (error, warn, info, verbose, debug).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Also append log lines to this file.
    #[arg(long, global = true)]
    log_file: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve JSON-RPC over stdio (default).
    Serve,

    /// Materialize the graph assets into storage and exit.
    Warm,

    /// Print server capabilities and resolved paths as JSON.
    Info,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   sfn-visualizer-host completions bash > ~/.local/share/bash-completion/completions/sfn-visualizer-host
    ///   sfn-visualizer-host completions zsh > ~/.zfunc/_sfn-visualizer-host
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

/// `tracing` directive for a facade level.
fn tracing_level(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Verbose => "debug",
        LogLevel::Debug => "trace",
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level: LogLevel = cli
        .log_level
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(tracing_level(level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = HostConfig::resolve(
        cli.storage.as_deref(),
        cli.assets.as_deref(),
        level,
        cli.log_file.as_deref(),
    );

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let handler = ProtocolHandler::open(config)?;
            let transport = StdioTransport::new(handler);
            transport.run().await?;
            transport.handler().service().finish()?;
        }

        Commands::Warm => {
            let (notifier, _outbox) = Outbox::channel();
            let service = VisualizerService::open(config, notifier)?;
            service.logger().log_to_console()?;
            match service.warm().await {
                Ok(count) => {
                    println!(
                        "Cached {count} graph assets in {}",
                        service.config().storage_dir.display()
                    );
                    service.finish()?;
                }
                Err(e) => {
                    eprintln!("Failed to cache graph assets: {e}");
                    service.finish()?;
                    std::process::exit(1);
                }
            }
        }

        Commands::Info => {
            let init = InitializeResult::default_result();
            let info = serde_json::json!({
                "server": init.server_info,
                "protocol_version": init.protocol_version,
                "methods": init.capabilities.methods,
                "notifications": SERVER_NOTIFICATIONS,
                "storage": config.storage_dir.display().to_string(),
                "assets": config
                    .assets_dir
                    .as_ref()
                    .map(|dir| dir.display().to_string()),
                "asset_files": config.assets().iter().map(|a| &a.name).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&info)?);
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(
                shell,
                &mut cmd,
                "sfn-visualizer-host",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}
