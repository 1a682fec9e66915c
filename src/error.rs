use thiserror::Error;

/// Failures surfaced while decoding, dispatching, or forwarding relay
/// traffic.
///
/// None of these are fatal to the process. A malformed frame or an unknown
/// command is logged and the offending frame dropped; a transport failure
/// closes only the connection that produced it.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The frame was not valid JSON or did not carry the required envelope
    /// fields.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// A server-addressed command whose name is not in the command table.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// The connection's outbound channel or socket is gone.
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        RelayError::MalformedMessage(err.to_string())
    }
}
