//! Local shell execution

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use cr_core::time::current_time_millis;
use cr_protocol::{ResultErrorKind, TaskResult};

/// Run a script under the local shell with a hard wall-clock timeout.
///
/// On expiry the child is killed and the result carries
/// `ExecutionTimeout`; a command that merely exits non-zero is a normal
/// result with its code and output captured.
pub async fn execute_local(script: &str, timeout: Duration) -> TaskResult {
    let mut command = shell_command(script);
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            return TaskResult::infra_failure(
                ResultErrorKind::ExecutionIoError,
                format!("failed to spawn shell: {}", e),
                current_time_millis(),
            );
        }
    };

    // Dropping the wait future kills the child (kill_on_drop), so a
    // runaway script cannot outlive its timeout.
    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => {
            let returncode = output.status.code().unwrap_or(-1);
            TaskResult::completed(
                String::from_utf8_lossy(&output.stdout).into_owned(),
                String::from_utf8_lossy(&output.stderr).into_owned(),
                returncode,
                current_time_millis(),
            )
        }
        Ok(Err(e)) => TaskResult::infra_failure(
            ResultErrorKind::ExecutionIoError,
            format!("failed to collect output: {}", e),
            current_time_millis(),
        ),
        Err(_) => TaskResult::infra_failure(
            ResultErrorKind::ExecutionTimeout,
            format!("command exceeded {}s wall-clock timeout", timeout.as_secs()),
            current_time_millis(),
        ),
    }
}

#[cfg(unix)]
fn shell_command(script: &str) -> Command {
    let mut command = Command::new("sh");
    command.arg("-c").arg(script);
    command
}

#[cfg(windows)]
fn shell_command(script: &str) -> Command {
    let mut command = Command::new("cmd");
    command.arg("/C").arg(script);
    command
}
