//! Protocol error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Empty line")]
    EmptyLine,

    #[error("Malformed event: {0}")]
    MalformedEvent(#[from] serde_json::Error),
}
