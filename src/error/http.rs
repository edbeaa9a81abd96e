use std::io;

use hyper::StatusCode;
use thiserror::Error;

/// Failure of a single CONNECT dial, tagged with the phase it happened in.
///
/// Timeouts are carried as [`io::ErrorKind::TimedOut`] and cancellation as
/// [`io::ErrorKind::Interrupted`] inside the phase variant.
#[derive(Error, Debug)]
pub enum TunnelError {
    #[error("Invalid tunnel target {0:?}")]
    InvalidTarget(String),
    #[error("Unable to connect to upstream proxy {upstream}: {source}")]
    Connect {
        upstream: String,
        #[source]
        source: io::Error,
    },
    #[error("Unable to send CONNECT request: {0}")]
    RequestWrite(#[source] io::Error),
    #[error("Unable to read CONNECT response: {0}")]
    ResponseRead(#[source] io::Error),
    #[error("Upstream proxy returned status {status}: {reason}")]
    UpstreamRejected { status: StatusCode, reason: String },
}

impl TunnelError {
    pub(crate) fn cancelled() -> io::Error {
        io::Error::new(io::ErrorKind::Interrupted, "operation cancelled")
    }

    pub(crate) fn timed_out() -> io::Error {
        io::Error::new(io::ErrorKind::TimedOut, "operation timed out")
    }

    /// Returns `true` when the dial was aborted through its cancellation token.
    pub fn is_cancelled(&self) -> bool {
        self.io_kind() == Some(io::ErrorKind::Interrupted)
    }

    /// The kind of the underlying I/O error, if this failure has one.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            TunnelError::Connect { source, .. } => Some(source.kind()),
            TunnelError::RequestWrite(e) | TunnelError::ResponseRead(e) => Some(e.kind()),
            TunnelError::InvalidTarget(_) | TunnelError::UpstreamRejected { .. } => None,
        }
    }
}
