/// Errors raised while decoding HCI packets and beacon payloads
use thiserror::Error;

pub type DecodeResult<T> = Result<T, DecodeError>;

/// Decode failures are local to the packet (or codec call) that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Fewer bytes than a fixed layout needs
    #[error("truncated input: needed {needed} bytes, got {available}")]
    TruncatedInput { needed: usize, available: usize },

    /// Short header, or declared parameter length disagrees with the packet
    #[error("malformed HCI event header: declared {declared} parameter bytes, {available} available")]
    MalformedHeader { declared: usize, available: usize },

    /// Advertising report payload too short for the beacon window
    #[error("truncated advertising report: needed {needed} bytes, got {available}")]
    TruncatedReport { needed: usize, available: usize },

    #[error("invalid address length: expected 6 bytes, got {0}")]
    InvalidLength(usize),

    #[error("invalid address format: {0:?}")]
    InvalidFormat(String),
}
