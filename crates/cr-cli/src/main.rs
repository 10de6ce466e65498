//! c-Relay CLI
//!
//! Thin client over the controller's HTTP API: enqueue tasks for agents,
//! poll correlated results, list agents. The daemons live in their own
//! binaries (`cr-controller`, `cr-agent`).

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use c_relay::client::ControllerClient;
use c_relay::commands::enqueue::TaskArgs;
use c_relay::commands::{agents, enqueue, result, status};
use c_relay::output::print_error;

#[derive(Parser)]
#[command(name = "c-relay")]
#[command(author, version, about = "Command relay for agents behind NAT/VPN boundaries")]
#[command(propagate_version = true)]
struct Cli {
    /// Controller HTTP base URL
    #[arg(long, global = true, default_value = "http://localhost:7601")]
    controller: String,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered agents
    Agents,

    /// Show controller status
    Status,

    /// Enqueue a task for an agent
    Enqueue {
        /// Target agent id
        agent_id: String,

        /// Shell script to run on the agent host
        #[arg(long)]
        shell: Option<String>,

        /// Command to run on a remote host over SSH
        #[arg(long)]
        ssh_command: Option<String>,
        /// Remote host to execute on
        #[arg(long)]
        ssh_host: Option<String>,
        /// Remote SSH port
        #[arg(long)]
        ssh_port: Option<u16>,
        /// Remote login username
        #[arg(long)]
        ssh_user: Option<String>,
        /// Password secret reference (env:NAME or file:/path)
        #[arg(long)]
        password_secret: Option<String>,
        /// Private key path on the agent machine
        #[arg(long)]
        key_path: Option<PathBuf>,
        /// Key passphrase secret reference
        #[arg(long)]
        key_passphrase_secret: Option<String>,

        /// Jump host for targets the agent cannot reach directly
        #[arg(long)]
        jump_host: Option<String>,
        /// Jump host SSH port
        #[arg(long)]
        jump_port: Option<u16>,
        /// Jump host login username
        #[arg(long)]
        jump_user: Option<String>,
        /// Jump host password secret reference
        #[arg(long)]
        jump_password_secret: Option<String>,
        /// Jump host private key path on the agent machine
        #[arg(long)]
        jump_key_path: Option<PathBuf>,

        /// Wait up to this many seconds for the result
        #[arg(long)]
        wait: Option<u64>,
    },

    /// Fetch a result by correlation id
    Result {
        /// Correlation id returned by enqueue
        correlation_id: String,

        /// Wait up to this many seconds for the result
        #[arg(long)]
        wait: Option<u64>,

        /// Delete the result after fetching it
        #[arg(long)]
        delete: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let client = ControllerClient::new(&cli.controller);

    let outcome = match cli.command {
        Commands::Agents => agents::agents_command(&client).await,

        Commands::Status => status::status_command(&client).await,

        Commands::Enqueue {
            agent_id,
            shell,
            ssh_command,
            ssh_host,
            ssh_port,
            ssh_user,
            password_secret,
            key_path,
            key_passphrase_secret,
            jump_host,
            jump_port,
            jump_user,
            jump_password_secret,
            jump_key_path,
            wait,
        } => {
            let args = TaskArgs {
                shell,
                ssh_command,
                ssh_host,
                ssh_port,
                ssh_user,
                password_secret,
                key_path,
                key_passphrase_secret,
                jump_host,
                jump_port,
                jump_user,
                jump_password_secret,
                jump_key_path,
            };
            enqueue::enqueue_command(&client, &agent_id, args, wait).await
        }

        Commands::Result {
            correlation_id,
            wait,
            delete,
        } => result::result_command(&client, &correlation_id, wait, delete).await,
    };

    if let Err(e) = &outcome {
        print_error(&format!("{:#}", e));
    }
    outcome
}
