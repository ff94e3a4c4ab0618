//! Defines wire-level error types.

use thiserror::Error;

/// An error at the framing layer.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The first byte of a length prefix is not a valid encoding.
    #[error("invalid length prefix byte 0x{0:02X}")]
    InvalidLength(u8),
    /// A word is too large for the 32-bit length the prefix can carry.
    #[error("word of {0} bytes exceeds the wire length limit")]
    WordTooLong(usize),
    /// A login challenge that is not a valid hex string.
    #[error("malformed login challenge: {0}")]
    InvalidChallenge(#[from] hex::FromHexError),
    /// An I/O error occurred while encoding a frame.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
