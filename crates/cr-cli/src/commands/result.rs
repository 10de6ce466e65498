//! Result command implementation

use std::time::Duration;

use anyhow::Result;

use cr_controller::http::ResultStateResponse;

use crate::client::ControllerClient;
use crate::output::{format_result, print_error, print_info, print_success};

/// Poll interval while waiting for a result
const WAIT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Execute the result command
pub async fn result_command(
    client: &ControllerClient,
    correlation_id: &str,
    wait_secs: Option<u64>,
    delete: bool,
) -> Result<()> {
    let resolved = match wait_secs {
        Some(secs) => wait_for_result(client, correlation_id, Duration::from_secs(secs)).await?,
        None => {
            let response = client.get_result(correlation_id).await?;
            match response.result {
                Some(result) => {
                    print_result(&result);
                    true
                }
                None => {
                    print_info("pending");
                    false
                }
            }
        }
    };

    if delete && resolved {
        client.delete_result(correlation_id).await?;
        print_info("Result deleted");
    }
    Ok(())
}

/// Poll until the result arrives or the deadline passes.
///
/// The controller never promotes a pending id to failed on its own;
/// this deadline is the caller-imposed timeout the protocol expects.
pub async fn wait_for_result(
    client: &ControllerClient,
    correlation_id: &str,
    deadline: Duration,
) -> Result<bool> {
    let started = std::time::Instant::now();

    loop {
        let response: ResultStateResponse = client.get_result(correlation_id).await?;
        if let Some(result) = response.result {
            print_result(&result);
            return Ok(true);
        }

        if started.elapsed() >= deadline {
            print_error(&format!(
                "No result for {} within {:?}; the task may be lost or still running",
                correlation_id, deadline
            ));
            return Ok(false);
        }
        tokio::time::sleep(WAIT_POLL_INTERVAL).await;
    }
}

fn print_result(result: &cr_protocol::TaskResult) {
    if result.success {
        print_success("Task completed");
    } else {
        print_error("Task failed");
    }
    print!("{}", format_result(result));
}
