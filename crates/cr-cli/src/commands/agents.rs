//! Agents command implementation

use anyhow::Result;

use crate::client::ControllerClient;
use crate::output::format_agents;

/// Execute the agents command
pub async fn agents_command(client: &ControllerClient) -> Result<()> {
    let response = client.list_agents().await?;

    println!("Registered Agents:");
    println!("{}", format_agents(&response.agents));
    Ok(())
}
