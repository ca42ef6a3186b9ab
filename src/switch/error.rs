use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    /// TCP, SSH handshake or authentication failure; never retried
    #[error("failed to connect to {host}: {reason}")]
    Connection { host: String, reason: String },

    /// Enable mode was not reached, so the command was not sent
    #[error("insufficient privilege to run `{command}`")]
    InsufficientPrivilege { command: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("no prompt from switch within {0:?}")]
    Timeout(Duration),

    #[error("switch session is not connected")]
    NotConnected,
}
