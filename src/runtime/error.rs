// ABOUTME: Runtime connection error types with SNAFU pattern.
// ABOUTME: Distinguishes a missing socket from a refused or unresponsive daemon.

use snafu::Snafu;

/// Failure to reach the container runtime.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RuntimeError {
    #[snafu(display("no container runtime socket at {socket}"))]
    SocketMissing { socket: String },

    #[snafu(display("runtime connection failed ({socket}): {source}"))]
    Connection {
        socket: String,
        source: bollard::errors::Error,
    },

    #[snafu(display("runtime did not answer ping: {source}"))]
    Ping { source: bollard::errors::Error },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    /// The socket path does not exist.
    SocketMissing,
    /// The client could not be constructed for the socket.
    ConnectionFailed,
    /// The daemon is not answering.
    Unresponsive,
}

impl RuntimeError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> RuntimeErrorKind {
        match self {
            RuntimeError::SocketMissing { .. } => RuntimeErrorKind::SocketMissing,
            RuntimeError::Connection { .. } => RuntimeErrorKind::ConnectionFailed,
            RuntimeError::Ping { .. } => RuntimeErrorKind::Unresponsive,
        }
    }
}
