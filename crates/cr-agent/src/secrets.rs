//! Secret reference resolution
//!
//! The wire protocol only ever carries `env:NAME` / `file:/path`
//! references; the plaintext is looked up here, on the executing agent,
//! immediately before use.

use cr_core::error::ExecError;
use cr_protocol::SecretRef;

/// Resolve a secret reference to its plaintext value.
///
/// File contents have trailing whitespace trimmed, so a secret file with
/// a trailing newline authenticates the same as one without.
pub fn resolve(secret: &SecretRef) -> Result<String, ExecError> {
    match secret {
        SecretRef::Env(name) => std::env::var(name)
            .map_err(|_| ExecError::Secret(format!("environment variable {} not set", name))),
        SecretRef::File(path) => {
            let content = std::fs::read_to_string(path).map_err(|e| {
                ExecError::Secret(format!("cannot read secret file {}: {}", path.display(), e))
            })?;
            Ok(content.trim_end().to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_resolve_env() {
        std::env::set_var("CR_AGENT_TEST_SECRET", "hunter2");
        let secret = SecretRef::Env("CR_AGENT_TEST_SECRET".to_string());
        assert_eq!(resolve(&secret).unwrap(), "hunter2");
    }

    #[test]
    fn test_missing_env_is_an_error() {
        let secret = SecretRef::Env("CR_AGENT_TEST_SECRET_MISSING".to_string());
        assert!(matches!(resolve(&secret), Err(ExecError::Secret(_))));
    }

    #[test]
    fn test_resolve_file_trims_trailing_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secret");
        std::fs::write(&path, "s3cret\n").unwrap();

        let secret = SecretRef::File(path);
        assert_eq!(resolve(&secret).unwrap(), "s3cret");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let secret = SecretRef::File(PathBuf::from("/nonexistent/secret"));
        assert!(matches!(resolve(&secret), Err(ExecError::Secret(_))));
    }
}
