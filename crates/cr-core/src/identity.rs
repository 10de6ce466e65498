//! Persisted per-machine agent identity
//!
//! The agent's identity must be stable across restarts: the controller
//! keys queues and liveness by it, so a fresh id on every boot would
//! orphan queued tasks. The id is generated once (UUID v4) and written
//! to a file under the agent's config directory.

use std::path::Path;

use uuid::Uuid;

use crate::error::ConfigError;
use crate::types::AgentId;

/// Load the persisted agent identity, creating and persisting a new one
/// if the file does not exist yet.
pub fn load_or_create(path: &Path) -> Result<AgentId, ConfigError> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Invalid(format!("Failed to read identity file: {}", e)))?;
        let id = content.trim();
        if id.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "Identity file {} is empty",
                path.display()
            )));
        }
        return Ok(AgentId::new(id));
    }

    let id = Uuid::new_v4().to_string();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ConfigError::Invalid(format!("Failed to create identity dir: {}", e)))?;
    }
    std::fs::write(path, &id)
        .map_err(|e| ConfigError::Invalid(format!("Failed to write identity file: {}", e)))?;

    tracing::info!("Generated new agent identity {} at {}", id, path.display());
    Ok(AgentId::new(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creates_then_reloads_same_identity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent_id");

        let first = load_or_create(&path).unwrap();
        assert!(path.exists());

        let second = load_or_create(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_trims_whitespace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent_id");
        std::fs::write(&path, "edge-rack-03\n").unwrap();

        let id = load_or_create(&path).unwrap();
        assert_eq!(id.as_str(), "edge-rack-03");
    }

    #[test]
    fn test_empty_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent_id");
        std::fs::write(&path, "  \n").unwrap();

        assert!(load_or_create(&path).is_err());
    }
}
