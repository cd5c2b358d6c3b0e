mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, remote::RemoteCommand, serve::ServeArgs};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "rota",
    about = "Rotate a duty role through an ordered roster on a weekly schedule",
    version,
    propagate_version = true
)]
struct Cli {
    /// Rotation root (default: auto-detect from .rota/)
    #[arg(long, global = true, env = "ROTA_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Base URL of a running `rota serve`, used by the remote commands
    #[arg(
        long,
        global = true,
        env = "ROTA_URL",
        default_value = "http://localhost:3177"
    )]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default rotation config
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,

        /// Duty role id (default: unset)
        #[arg(long)]
        role: Option<String>,
    },

    /// Inspect the stored rotation config
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Run the rotation engine, scheduler and HTTP API
    Serve {
        /// Port to listen on (0 = OS-assigned)
        #[arg(long, env = "ROTA_PORT", default_value = "3177")]
        port: u16,

        /// Discord guild (server) id
        #[arg(long, env = "ROTA_GUILD_ID")]
        guild: Option<String>,

        /// Discord bot token
        #[arg(long, env = "DISCORD_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// Discord REST API base URL
        #[arg(long, default_value = rota_discord::DEFAULT_API_BASE)]
        api_base: String,

        /// Simulate role changes in memory instead of calling Discord
        #[arg(long)]
        dry_run: bool,
    },

    #[command(flatten)]
    Remote(RemoteCommand),
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init { force, role } => cmd::init::run(&root, role.as_deref(), force, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
        Commands::Serve {
            port,
            guild,
            token,
            api_base,
            dry_run,
        } => cmd::serve::run(
            &root,
            ServeArgs {
                port,
                guild,
                token,
                api_base,
                dry_run,
            },
        ),
        Commands::Remote(remote) => cmd::remote::run(&cli.url, remote, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
