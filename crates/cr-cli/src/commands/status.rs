//! Status command implementation

use anyhow::Result;

use crate::client::ControllerClient;
use crate::output::print_success;

/// Execute the status command
pub async fn status_command(client: &ControllerClient) -> Result<()> {
    let health = client.health().await?;
    let agents = client.list_agents().await?;

    print_success(&format!(
        "Controller {} ({}): {} agents registered",
        health.status, health.version, agents.total
    ));
    Ok(())
}
