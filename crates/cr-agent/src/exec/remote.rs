//! Remote execution over SSH
//!
//! Opens a session to the target (directly, or through a tunnel-broker
//! endpoint when a jump host is given), authenticates, runs exactly one
//! command, captures stdout/stderr/exit status, and always closes the
//! session, on error paths included.

use std::time::Duration;

use russh::{ChannelMsg, Disconnect};

use cr_core::error::ExecError;
use cr_core::time::current_time_millis;
use cr_protocol::{JumpHost, RemoteTarget, TaskResult};

use crate::ssh::{self, SshAuthError};
use crate::tunnel::TunnelBroker;

/// SSH extended-data stream carrying stderr
const SSH_EXTENDED_DATA_STDERR: u32 = 1;

/// Execute one command on the target.
///
/// Infrastructure failures surface as [`ExecError`]; the caller encodes
/// them into the result. A command outcome, whatever its exit code, is
/// returned as `Ok`.
pub async fn execute_remote(
    target: &RemoteTarget,
    command: &str,
    jump: Option<&JumpHost>,
    broker: &TunnelBroker,
    connect_timeout: Duration,
    exec_timeout: Duration,
) -> Result<TaskResult, ExecError> {
    // Through a jump host, the SSH endpoint becomes the tunnel's local
    // listener; the target still authenticates us, the jump host only
    // forwards bytes.
    let tunnel = match jump {
        Some(jump) => Some(broker.open(jump, &target.host, target.port).await?),
        None => None,
    };

    let endpoint = match &tunnel {
        Some(handle) => handle.local_addr.to_string(),
        None => target.address(),
    };

    let outcome = tokio::time::timeout(
        exec_timeout,
        run_command(&endpoint, target, command, connect_timeout),
    )
    .await;

    // The tunnel session is per-task; tear it down before error mapping
    // so timeouts release the local port too.
    if let Some(handle) = tunnel {
        let _ = broker.close(handle.session_id).await;
    }

    match outcome {
        Ok(result) => result,
        Err(_) => Err(ExecError::Timeout {
            timeout_secs: exec_timeout.as_secs(),
        }),
    }
}

async fn run_command(
    endpoint: &str,
    target: &RemoteTarget,
    command: &str,
    connect_timeout: Duration,
) -> Result<TaskResult, ExecError> {
    let mut session = ssh::connect(endpoint, connect_timeout)
        .await
        .map_err(ExecError::Io)?;

    if let Err(e) = ssh::authenticate(&mut session, &target.username, &target.auth).await {
        let _ = session
            .disconnect(Disconnect::ByApplication, "auth failed", "en")
            .await;
        return Err(match e {
            SshAuthError::Rejected => ExecError::Auth(format!(
                "{} rejected credentials for {}",
                target.address(),
                target.username
            )),
            SshAuthError::Secret(msg) => ExecError::Secret(msg),
            other => ExecError::Io(other.to_string()),
        });
    }

    let result = exec_on_session(&mut session, command).await;

    let _ = session
        .disconnect(Disconnect::ByApplication, "command finished", "en")
        .await;

    result
}

async fn exec_on_session(
    session: &mut russh::client::Handle<crate::ssh::AcceptingClient>,
    command: &str,
) -> Result<TaskResult, ExecError> {
    let mut channel = session
        .channel_open_session()
        .await
        .map_err(|e| ExecError::Io(format!("failed to open channel: {}", e)))?;

    channel
        .exec(true, command)
        .await
        .map_err(|e| ExecError::Io(format!("failed to start command: {}", e)))?;

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut returncode: Option<i32> = None;

    while let Some(msg) = channel.wait().await {
        match msg {
            ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
            ChannelMsg::ExtendedData { ref data, ext } if ext == SSH_EXTENDED_DATA_STDERR => {
                stderr.extend_from_slice(data)
            }
            ChannelMsg::ExitStatus { exit_status } => returncode = Some(exit_status as i32),
            ChannelMsg::ExitSignal { signal_name, .. } => {
                tracing::debug!("Remote command killed by signal {:?}", signal_name);
                returncode = Some(-1);
            }
            _ => {}
        }
    }

    let returncode = returncode
        .ok_or_else(|| ExecError::Io("channel closed without exit status".to_string()))?;

    Ok(TaskResult::completed(
        String::from_utf8_lossy(&stdout).into_owned(),
        String::from_utf8_lossy(&stderr).into_owned(),
        returncode,
        current_time_millis(),
    ))
}
