use crate::error::Error;
use std::fmt;
use std::time::Duration;

/// Structured error for remote docker CLI operations.
///
/// Machine-actionable variants so call sites can distinguish a dead endpoint
/// from a rejected command before the value is folded into the crate-level
/// [`Error`] taxonomy.
#[derive(Debug)]
pub enum RuntimeError {
    /// Command timed out against the remote daemon.
    Timeout { command: String, timeout: Duration },

    /// Command ran but returned non-zero exit.
    CommandFailed {
        command: String,
        stderr: String,
        exit_code: Option<i32>,
    },

    /// The docker binary couldn't be executed at all.
    ExecFailed {
        command: String,
        source: std::io::Error,
    },

    /// TLS handshake or TCP connection to the remote endpoint failed.
    ConnectionFailed { command: String, stderr: String },

    /// Container doesn't exist on the remote runtime.
    ContainerNotFound { container: String },
}

impl RuntimeError {
    pub fn timeout(cmd: impl Into<String>, dur: Duration) -> Self {
        RuntimeError::Timeout {
            command: cmd.into(),
            timeout: dur,
        }
    }

    /// Classify a non-zero exit by its stderr. Certificate and reachability
    /// failures become `ConnectionFailed`; a missing container becomes
    /// `ContainerNotFound`; the rest stay `CommandFailed`.
    pub fn from_output(
        cmd: impl Into<String>,
        container: Option<&str>,
        output: &std::process::Output,
    ) -> Self {
        let command = cmd.into();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let lowered = stderr.to_lowercase();

        if let Some(container) = container {
            if lowered.contains("no such container") {
                return RuntimeError::ContainerNotFound {
                    container: container.to_string(),
                };
            }
        }
        if lowered.contains("certificate")
            || lowered.contains("connection refused")
            || lowered.contains("no such host")
            || lowered.contains("i/o timeout")
            || lowered.contains("cannot connect to the docker daemon")
        {
            return RuntimeError::ConnectionFailed { command, stderr };
        }
        RuntimeError::CommandFailed {
            command,
            stderr,
            exit_code: output.status.code(),
        }
    }

    pub fn exec_failed(cmd: impl Into<String>, err: std::io::Error) -> Self {
        RuntimeError::ExecFailed {
            command: cmd.into(),
            source: err,
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::Timeout { command, timeout } => {
                write!(
                    f,
                    "Timed out running '{}' (exceeded {} seconds)",
                    command,
                    timeout.as_secs()
                )
            }
            RuntimeError::CommandFailed {
                command,
                stderr,
                exit_code,
            } => {
                if let Some(code) = exit_code {
                    write!(f, "'{}' failed (exit code {}): {}", command, code, stderr)
                } else {
                    write!(f, "'{}' failed: {}", command, stderr)
                }
            }
            RuntimeError::ExecFailed { command, source } => {
                write!(f, "Failed to execute '{}': {}", command, source)
            }
            RuntimeError::ConnectionFailed { command, stderr } => {
                write!(f, "'{}' could not reach the remote daemon: {}", command, stderr)
            }
            RuntimeError::ContainerNotFound { container } => {
                write!(f, "No such container: {}", container)
            }
        }
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RuntimeError::ExecFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<RuntimeError> for Error {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::Timeout { command, timeout } => Error::UpstreamTimeout {
                operation: command,
                timeout,
            },
            RuntimeError::ConnectionFailed { .. } => Error::Connection(err.to_string()),
            RuntimeError::ContainerNotFound { container } => Error::InstanceNotFound(container),
            RuntimeError::CommandFailed { .. } | RuntimeError::ExecFailed { .. } => {
                Error::Provision(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;
    use std::process::{ExitStatus, Output};

    fn output_with_stderr(stderr: &str) -> Output {
        Output {
            status: ExitStatus::from_raw(256),
            stdout: Vec::new(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    #[test]
    fn certificate_failures_classify_as_connection() {
        let err = RuntimeError::from_output(
            "docker ps",
            None,
            &output_with_stderr("error during connect: x509: certificate has expired"),
        );
        assert!(matches!(err, RuntimeError::ConnectionFailed { .. }));
        assert!(matches!(Error::from(err), Error::Connection(_)));
    }

    #[test]
    fn missing_container_classifies_as_not_found() {
        let err = RuntimeError::from_output(
            "docker start abc",
            Some("abc"),
            &output_with_stderr("Error response from daemon: No such container: abc"),
        );
        assert!(matches!(err, RuntimeError::ContainerNotFound { .. }));
        assert!(matches!(Error::from(err), Error::InstanceNotFound(_)));
    }

    #[test]
    fn timeout_maps_to_upstream_timeout() {
        let err = RuntimeError::timeout("docker create", Duration::from_secs(30));
        assert!(matches!(Error::from(err), Error::UpstreamTimeout { .. }));
    }
}
