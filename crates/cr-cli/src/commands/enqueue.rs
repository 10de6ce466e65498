//! Enqueue command implementation

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};

use cr_protocol::{AuthMethod, JumpHost, RemoteTarget, SecretRef, TaskKind, DEFAULT_SSH_PORT};

use crate::client::ControllerClient;
use crate::commands::result::wait_for_result;
use crate::output::{print_info, print_success};

/// Flags describing what to run; exactly one of `shell` / `ssh_command`
/// must be set.
#[derive(Debug, Default)]
pub struct TaskArgs {
    pub shell: Option<String>,

    pub ssh_command: Option<String>,
    pub ssh_host: Option<String>,
    pub ssh_port: Option<u16>,
    pub ssh_user: Option<String>,
    pub password_secret: Option<String>,
    pub key_path: Option<PathBuf>,
    pub key_passphrase_secret: Option<String>,

    pub jump_host: Option<String>,
    pub jump_port: Option<u16>,
    pub jump_user: Option<String>,
    pub jump_password_secret: Option<String>,
    pub jump_key_path: Option<PathBuf>,
}

/// Execute the enqueue command
pub async fn enqueue_command(
    client: &ControllerClient,
    agent_id: &str,
    args: TaskArgs,
    wait_secs: Option<u64>,
) -> Result<()> {
    let task = build_task(args)?;
    let correlation_id = client.enqueue(agent_id, task).await?;

    print_success(&format!("Task enqueued for {}", agent_id));
    println!("{}", correlation_id);

    if let Some(secs) = wait_secs {
        print_info(&format!("Waiting up to {}s for the result...", secs));
        wait_for_result(client, &correlation_id.to_string(), Duration::from_secs(secs)).await?;
    }
    Ok(())
}

/// Turn the flag soup into a task, rejecting inconsistent combinations
/// before anything reaches the controller.
pub fn build_task(args: TaskArgs) -> Result<TaskKind> {
    match (&args.shell, &args.ssh_command) {
        (Some(_), Some(_)) => bail!("--shell and --ssh-command are mutually exclusive"),
        (None, None) => bail!("one of --shell or --ssh-command is required"),
        (Some(script), None) => Ok(TaskKind::Shell {
            script: script.clone(),
        }),
        (None, Some(command)) => {
            let host = match &args.ssh_host {
                Some(host) => host.clone(),
                None => bail!("--ssh-host is required with --ssh-command"),
            };
            let username = match &args.ssh_user {
                Some(user) => user.clone(),
                None => bail!("--ssh-user is required with --ssh-command"),
            };
            let auth = build_auth(
                args.password_secret.as_deref(),
                args.key_path.clone(),
                args.key_passphrase_secret.as_deref(),
                "--password-secret or --key-path",
            )?;

            let jump = match &args.jump_host {
                None => None,
                Some(jump_host) => {
                    let username = match &args.jump_user {
                        Some(user) => user.clone(),
                        None => bail!("--jump-user is required with --jump-host"),
                    };
                    let auth = build_auth(
                        args.jump_password_secret.as_deref(),
                        args.jump_key_path.clone(),
                        None,
                        "--jump-password-secret or --jump-key-path",
                    )?;
                    Some(JumpHost {
                        host: jump_host.clone(),
                        port: args.jump_port.unwrap_or(DEFAULT_SSH_PORT),
                        username,
                        auth,
                    })
                }
            };

            Ok(TaskKind::SshExec {
                target: RemoteTarget {
                    host,
                    port: args.ssh_port.unwrap_or(DEFAULT_SSH_PORT),
                    username,
                    auth,
                },
                command: command.clone(),
                jump,
            })
        }
    }
}

fn build_auth(
    password_secret: Option<&str>,
    key_path: Option<PathBuf>,
    key_passphrase_secret: Option<&str>,
    needed: &str,
) -> Result<AuthMethod> {
    match (password_secret, key_path) {
        (Some(_), Some(_)) => bail!("password and key authentication are mutually exclusive"),
        (Some(secret), None) => Ok(AuthMethod::Password {
            secret: parse_secret(secret)?,
        }),
        (None, Some(path)) => {
            let passphrase = key_passphrase_secret.map(parse_secret).transpose()?;
            Ok(AuthMethod::Key { path, passphrase })
        }
        (None, None) => bail!("{} is required", needed),
    }
}

fn parse_secret(raw: &str) -> Result<SecretRef> {
    raw.parse::<SecretRef>()
        .map_err(|e| anyhow::anyhow!("invalid secret reference: {}", e))
}
