use miette::Diagnostic;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Caller-visible outcome class for an error.
///
/// The façade is the single translation point from the typed error taxonomy
/// to whatever status scheme the embedding service speaks (HTTP or otherwise).
/// Raw internals (stack traces, reqwest/rusqlite details) never cross this
/// boundary; only the rendered message does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Unauthorized,
    BadRequest,
    NotFound,
    ServerError,
}

#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    #[error("Unauthorized: {0}")]
    #[diagnostic(
        code(plab::auth::invalid),
        help("Obtain a fresh token from the identity provider and retry")
    )]
    Auth(String),

    #[error("Invalid request: {0}")]
    #[diagnostic(code(plab::request::invalid))]
    Validation(String),

    #[error("No cluster '{name}' for user '{user}'")]
    #[diagnostic(
        code(plab::cluster::not_found),
        help("Call an operation that allows cluster creation (build, list) first")
    )]
    ClusterNotFound { user: String, name: String },

    #[error("No such instance: {0}")]
    #[diagnostic(code(plab::instance::not_found))]
    InstanceNotFound(String),

    #[error("Template error: {0}")]
    #[diagnostic(
        code(plab::template::malformed),
        help("The supplied document is not well-formed XML; the default document can be used instead")
    )]
    Template(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(plab::config::error))]
    Config(String),

    #[error("Operation out of order: {0}")]
    #[diagnostic(
        code(plab::provision::dependency),
        help("Creating a proxy requires a successful origin creation for the same build request")
    )]
    Dependency(String),

    #[error("Provisioning failed: {0}")]
    #[diagnostic(code(plab::provision::failed))]
    Provision(String),

    #[error("Connection to remote runtime failed: {0}")]
    #[diagnostic(
        code(plab::runtime::connection),
        help("The cluster's TLS bundle may be expired or the endpoint unreachable. Re-resolve the cluster and retry once")
    )]
    Connection(String),

    #[error("Timed out waiting for '{operation}' (exceeded {} seconds)", timeout.as_secs())]
    #[diagnostic(code(plab::upstream::timeout))]
    UpstreamTimeout { operation: String, timeout: Duration },

    #[error("Build stage '{stage}' failed: {source}")]
    #[diagnostic(code(plab::build::stage_failed))]
    Build {
        stage: &'static str,
        #[source]
        source: Box<Error>,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Database error: {0}")]
    #[diagnostic(code(plab::store::error))]
    Database(#[from] tokio_rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Map a reqwest transport failure onto the taxonomy: timeouts are
/// distinguished from connection failures, everything else is upstream.
pub(crate) fn transport_error(operation: &str, err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::UpstreamTimeout {
            operation: operation.to_string(),
            timeout: crate::REMOTE_TIMEOUT,
        }
    } else if err.is_connect() {
        Error::Connection(format!("{operation}: {err}"))
    } else {
        Error::Provision(format!("{operation}: {err}"))
    }
}

impl Error {
    /// Wrap a pipeline step failure with the stage that produced it.
    ///
    /// Partial failures are not rolled back, so the stage name is the only
    /// thing that tells the caller what was left behind (a failed
    /// `create-proxy` leaves the origin container running).
    pub fn at_stage(stage: &'static str, source: Error) -> Self {
        Error::Build {
            stage,
            source: Box::new(source),
        }
    }

    /// The caller-visible status class for this error.
    pub fn status(&self) -> StatusClass {
        match self {
            Error::Auth(_) => StatusClass::Unauthorized,
            Error::Validation(_) | Error::Template(_) | Error::Dependency(_) => {
                StatusClass::BadRequest
            }
            Error::ClusterNotFound { .. } | Error::InstanceNotFound(_) => StatusClass::NotFound,
            Error::Build { source, .. } => source.status(),
            Error::Config(_)
            | Error::Provision(_)
            | Error::Connection(_)
            | Error::UpstreamTimeout { .. }
            | Error::Io(_)
            | Error::Database(_) => StatusClass::ServerError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classes_map_per_taxonomy() {
        assert_eq!(
            Error::Auth("expired".into()).status(),
            StatusClass::Unauthorized
        );
        assert_eq!(
            Error::Validation("empty body".into()).status(),
            StatusClass::BadRequest
        );
        assert_eq!(
            Error::ClusterNotFound {
                user: "alice".into(),
                name: "default".into()
            }
            .status(),
            StatusClass::NotFound
        );
        assert_eq!(
            Error::UpstreamTimeout {
                operation: "docker create".into(),
                timeout: Duration::from_secs(30)
            }
            .status(),
            StatusClass::ServerError
        );
    }

    #[test]
    fn build_stage_delegates_status_and_names_stage() {
        let err = Error::at_stage("create-proxy", Error::Connection("bad cert".into()));
        assert_eq!(err.status(), StatusClass::ServerError);
        let msg = err.to_string();
        assert!(msg.contains("create-proxy"), "message was: {msg}");
    }
}
