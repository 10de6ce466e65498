//! Task and result schema
//!
//! One schema serves both transports: tasks ride in `Command` frames on
//! the duplex wire (bincode) and in JSON bodies on the polling HTTP API.
//!
//! Credentials never appear inline. Anywhere a secret is needed the
//! schema carries a [`SecretRef`], resolved on the executing agent.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Default SSH port for remote targets and jump hosts
pub const DEFAULT_SSH_PORT: u16 = 22;

fn default_ssh_port() -> u16 {
    DEFAULT_SSH_PORT
}

/// What a task asks the agent to do.
///
/// The variant set is exhaustive: dispatch is a `match` with no default
/// arm, so an unhandled kind is a compile error, not a silent no-op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Run a script under the agent's local shell
    Shell {
        /// Script text passed to `sh -c`
        script: String,
    },

    /// Run a single command on a remote host over SSH
    SshExec {
        /// Host to execute on
        target: RemoteTarget,
        /// Command to run
        command: String,
        /// Optional jump host when the target is not directly reachable
        /// from the agent. Always encoded, even when None: command
        /// frames are bincode, which has no notion of omitted fields.
        #[serde(default)]
        jump: Option<JumpHost>,
    },
}

impl TaskKind {
    /// Short label for logging
    pub fn label(&self) -> &'static str {
        match self {
            TaskKind::Shell { .. } => "shell",
            TaskKind::SshExec { .. } => "ssh_exec",
        }
    }
}

/// A host the agent reaches over SSH
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTarget {
    /// Hostname or IP address
    pub host: String,
    /// SSH port
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    /// Login username
    pub username: String,
    /// Authentication method
    pub auth: AuthMethod,
}

impl RemoteTarget {
    /// `host:port` form for connecting and logging
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Intermediate host used to forward a connection to an otherwise
/// unreachable destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JumpHost {
    /// Jump host address
    pub host: String,
    /// SSH port on the jump host
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    /// Login username on the jump host
    pub username: String,
    /// Authentication method for the jump host
    pub auth: AuthMethod,
}

impl JumpHost {
    /// `host:port` form for connecting and logging
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// SSH authentication method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// Password authentication; the password itself is a secret reference
    Password {
        /// Reference to the password, resolved on the agent
        secret: SecretRef,
    },
    /// Private key authentication; the key lives on the agent's disk
    Key {
        /// Path to the private key on the agent machine
        path: PathBuf,
        /// Optional passphrase reference
        #[serde(default)]
        passphrase: Option<SecretRef>,
    },
}

/// Reference to a secret, serialized as `env:NAME` or `file:/path`.
///
/// The wire only ever carries the reference; the executing agent resolves
/// it from its own environment or filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretRef {
    /// Environment variable on the agent
    Env(String),
    /// File on the agent's filesystem (trailing whitespace trimmed)
    File(PathBuf),
}

impl FromStr for SecretRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(name) = s.strip_prefix("env:") {
            if name.is_empty() {
                return Err("empty env secret name".to_string());
            }
            Ok(SecretRef::Env(name.to_string()))
        } else if let Some(path) = s.strip_prefix("file:") {
            if path.is_empty() {
                return Err("empty file secret path".to_string());
            }
            Ok(SecretRef::File(PathBuf::from(path)))
        } else {
            Err(format!(
                "secret reference must start with 'env:' or 'file:', got '{}'",
                s
            ))
        }
    }
}

impl fmt::Display for SecretRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretRef::Env(name) => write!(f, "env:{}", name),
            SecretRef::File(path) => write!(f, "file:{}", path.display()),
        }
    }
}

impl Serialize for SecretRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SecretRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

/// Infrastructure failure kinds encoded into a result.
///
/// A non-zero exit code or stderr output is a normal outcome, not one of
/// these; only failures to connect, authenticate, or finish in time get a
/// kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultErrorKind {
    /// Command exceeded the wall-clock execution timeout
    ExecutionTimeout,
    /// Target host rejected the agent's credentials
    ExecutionAuthError,
    /// Connection or channel failure while executing
    ExecutionIoError,
    /// Jump host rejected the tunnel credentials
    TunnelAuthError,
    /// Destination unreachable from the jump host
    TunnelUnreachable,
    /// No forwarding path established within the bound
    TunnelTimeout,
}

impl fmt::Display for ResultErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResultErrorKind::ExecutionTimeout => "execution_timeout",
            ResultErrorKind::ExecutionAuthError => "execution_auth_error",
            ResultErrorKind::ExecutionIoError => "execution_io_error",
            ResultErrorKind::TunnelAuthError => "tunnel_auth_error",
            ResultErrorKind::TunnelUnreachable => "tunnel_unreachable",
            ResultErrorKind::TunnelTimeout => "tunnel_timeout",
        };
        f.write_str(s)
    }
}

/// Outcome of one task execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    /// Whether the command completed with exit status 0
    pub success: bool,
    /// Captured standard output
    #[serde(default)]
    pub stdout: String,
    /// Captured standard error
    #[serde(default)]
    pub stderr: String,
    /// Exit status, absent when the command never ran to completion
    #[serde(default)]
    pub returncode: Option<i32>,
    /// Infrastructure failure kind, absent for normal command outcomes
    #[serde(default)]
    pub error_kind: Option<ResultErrorKind>,
    /// Completion time, milliseconds since the Unix epoch
    pub completed_at_ms: u64,
}

impl TaskResult {
    /// Result for a command that ran to completion
    pub fn completed(
        stdout: String,
        stderr: String,
        returncode: i32,
        completed_at_ms: u64,
    ) -> Self {
        Self {
            success: returncode == 0,
            stdout,
            stderr,
            returncode: Some(returncode),
            error_kind: None,
            completed_at_ms,
        }
    }

    /// Result for an infrastructure failure
    pub fn infra_failure(kind: ResultErrorKind, detail: String, completed_at_ms: u64) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: detail,
            returncode: None,
            error_kind: Some(kind),
            completed_at_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_ref_parse() {
        assert_eq!(
            "env:SSH_PASSWORD".parse::<SecretRef>().unwrap(),
            SecretRef::Env("SSH_PASSWORD".to_string())
        );
        assert_eq!(
            "file:/run/secrets/jump".parse::<SecretRef>().unwrap(),
            SecretRef::File(PathBuf::from("/run/secrets/jump"))
        );
        assert!("SSH_PASSWORD".parse::<SecretRef>().is_err());
        assert!("env:".parse::<SecretRef>().is_err());
    }

    #[test]
    fn test_secret_ref_json_is_a_string() {
        let secret = SecretRef::Env("TOKEN".to_string());
        let json = serde_json::to_string(&secret).unwrap();
        assert_eq!(json, r#""env:TOKEN""#);
        let back: SecretRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, secret);
    }

    #[test]
    fn test_task_kind_json_shape() {
        let kind = TaskKind::Shell {
            script: "echo hi".to_string(),
        };
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["shell"]["script"], "echo hi");
    }

    #[test]
    fn test_ssh_exec_defaults_port() {
        let json = r#"{
            "ssh_exec": {
                "target": {
                    "host": "10.0.0.5",
                    "username": "deploy",
                    "auth": {"password": {"secret": "env:TARGET_PW"}}
                },
                "command": "uptime"
            }
        }"#;
        let kind: TaskKind = serde_json::from_str(json).unwrap();
        match kind {
            TaskKind::SshExec { target, jump, .. } => {
                assert_eq!(target.port, DEFAULT_SSH_PORT);
                assert!(jump.is_none());
            }
            other => panic!("expected ssh_exec, got {:?}", other),
        }
    }

    #[test]
    fn test_task_kind_bincode_roundtrip() {
        let kind = TaskKind::SshExec {
            target: RemoteTarget {
                host: "10.0.0.5".to_string(),
                port: 2222,
                username: "deploy".to_string(),
                auth: AuthMethod::Key {
                    path: PathBuf::from("/home/agent/.ssh/id_ed25519"),
                    passphrase: None,
                },
            },
            command: "hostname && uptime".to_string(),
            jump: Some(JumpHost {
                host: "bastion.example.com".to_string(),
                port: 22,
                username: "bridge".to_string(),
                auth: AuthMethod::Password {
                    secret: SecretRef::Env("JUMP_PW".to_string()),
                },
            }),
        };
        let bytes = bincode::serialize(&kind).unwrap();
        let back: TaskKind = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, kind);
    }

    #[test]
    fn test_result_constructors() {
        let ok = TaskResult::completed("hi\n".into(), String::new(), 0, 1_700_000_000_000);
        assert!(ok.success);
        assert_eq!(ok.returncode, Some(0));
        assert!(ok.error_kind.is_none());

        let failed = TaskResult::completed(String::new(), "boom".into(), 1, 1_700_000_000_000);
        assert!(!failed.success);
        assert_eq!(failed.returncode, Some(1));

        let infra = TaskResult::infra_failure(
            ResultErrorKind::TunnelUnreachable,
            "connect refused".into(),
            1_700_000_000_000,
        );
        assert!(!infra.success);
        assert!(infra.returncode.is_none());
        assert_eq!(infra.error_kind, Some(ResultErrorKind::TunnelUnreachable));
    }
}
