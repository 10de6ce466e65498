//! Shared SSH client plumbing
//!
//! Both the tunnel broker (jump hosts) and the remote execution path
//! (targets) connect and authenticate the same way; the error mapping to
//! tunnel vs. execution kinds happens at the call sites.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, Handle};
use russh_keys::key::PublicKey;

use cr_protocol::AuthMethod;

use crate::secrets;

/// Client handler that accepts any host key.
///
/// Host key pinning is not part of the task schema; jump hosts and
/// targets sit on operator-controlled private networks.
pub(crate) struct AcceptingClient;

#[async_trait]
impl client::Handler for AcceptingClient {
    type Error = anyhow::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        tracing::debug!("Server host key: {}", server_public_key.fingerprint());
        Ok(true)
    }
}

/// Why authentication did not complete
#[derive(Debug)]
pub(crate) enum SshAuthError {
    /// Server rejected the credentials
    Rejected,
    /// Secret reference could not be resolved
    Secret(String),
    /// Private key could not be loaded
    Key(String),
    /// Transport failure mid-handshake
    Transport(String),
}

impl std::fmt::Display for SshAuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SshAuthError::Rejected => write!(f, "credentials rejected"),
            SshAuthError::Secret(e) => write!(f, "secret resolution failed: {}", e),
            SshAuthError::Key(e) => write!(f, "key load failed: {}", e),
            SshAuthError::Transport(e) => write!(f, "transport error: {}", e),
        }
    }
}

/// Connect to an SSH endpoint within the given bound
pub(crate) async fn connect(
    addr: &str,
    timeout: Duration,
) -> Result<Handle<AcceptingClient>, String> {
    let config = Arc::new(client::Config::default());
    tokio::time::timeout(timeout, client::connect(config, addr, AcceptingClient))
        .await
        .map_err(|_| format!("connection to {} timed out", addr))?
        .map_err(|e| format!("failed to connect to {}: {}", addr, e))
}

/// Authenticate an open session with the given method.
///
/// Secrets are resolved here, immediately before use; nothing upstream
/// ever saw the plaintext.
pub(crate) async fn authenticate(
    session: &mut Handle<AcceptingClient>,
    username: &str,
    auth: &AuthMethod,
) -> Result<(), SshAuthError> {
    let authenticated = match auth {
        AuthMethod::Password { secret } => {
            let password =
                secrets::resolve(secret).map_err(|e| SshAuthError::Secret(e.to_string()))?;
            session
                .authenticate_password(username, password.as_str())
                .await
                .map_err(|e| SshAuthError::Transport(e.to_string()))?
        }
        AuthMethod::Key { path, passphrase } => {
            let passphrase = match passphrase {
                Some(secret) => {
                    Some(secrets::resolve(secret).map_err(|e| SshAuthError::Secret(e.to_string()))?)
                }
                None => None,
            };
            let key = russh_keys::load_secret_key(path, passphrase.as_deref())
                .map_err(|e| SshAuthError::Key(e.to_string()))?;
            session
                .authenticate_publickey(username, Arc::new(key))
                .await
                .map_err(|e| SshAuthError::Transport(e.to_string()))?
        }
    };

    if authenticated {
        Ok(())
    } else {
        Err(SshAuthError::Rejected)
    }
}
