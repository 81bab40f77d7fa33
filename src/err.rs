use std::borrow::Cow;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FlpError>;
pub type EventDecodeResult<T> = std::result::Result<T, EventDecodeError>;

/// Structural errors. Any of these aborts the whole parse.
#[derive(Debug, Error)]
pub enum FlpError {
    #[error("Invalid FLP file header magic, expected `FLhd`, found `{found:02X?}`")]
    InvalidHeader { found: Vec<u8> },

    #[error("Invalid FLP data chunk magic, expected `FLdt`, found `{found:02X?}`")]
    InvalidDataHeader { found: Vec<u8> },

    #[error(
        "Offset {offset}: event 0x{event_id:02x} is truncated (need {need} bytes, have {have})"
    )]
    TruncatedEvent {
        event_id: u8,
        offset: u64,
        need: u64,
        have: u64,
    },

    #[error("Offset {offset}: An I/O error has occurred while trying to read {what}")]
    FailedToRead {
        what: &'static str,
        offset: u64,
        #[source]
        source: io::Error,
    },

    #[error("Failed to open file {}", path.display())]
    FailedToOpenFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FlpError {
    /// Offset (relative to the start of the file) at which the error occurred, if known.
    pub fn offset(&self) -> Option<u64> {
        match self {
            FlpError::TruncatedEvent { offset, .. } | FlpError::FailedToRead { offset, .. } => {
                Some(*offset)
            }
            FlpError::InvalidHeader { .. } => Some(0),
            _ => None,
        }
    }
}

/// Errors scoped to a single event. These are never surfaced to the caller of
/// [`crate::FlpParser::parse`]; the offending event is dropped instead.
#[derive(Debug, Error)]
pub enum EventDecodeError {
    #[error("event 0x{event_id:02x}: failed to decode string with codec `{codec}`: {reason}")]
    Undecodable {
        event_id: u8,
        codec: &'static str,
        reason: Cow<'static, str>,
    },

    #[error("event 0x{event_id:02x} does not carry a string payload")]
    NotAStringEvent { event_id: u8 },
}
