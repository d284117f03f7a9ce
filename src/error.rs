//! Error types for dwg-forensics

use std::io;
use thiserror::Error;

/// Main error type for DWG decoding.
///
/// Only [`DwgError::UnsupportedVersion`] and errors raised while locating the
/// section table are fatal for a session. Every other variant describes a
/// localized failure: the caller records it as a finding and moves on to the
/// next unit (section, page, handle-map chunk, object record).
#[derive(Debug, Error)]
pub enum DwgError {
    /// IO error occurred while loading the file
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The file signature is not one of the supported DWG revisions
    #[error("Unsupported DWG version: {0:?}")]
    UnsupportedVersion(String),

    /// A section locator entry points outside the file or overlaps another entry
    #[error("Corrupt section locator '{name}': {reason}")]
    CorruptLocator { name: String, reason: String },

    /// An object record declares more bytes than remain in its section
    #[error("Object at offset {offset:#X} declares {declared} bytes but only {available} remain")]
    ObjectOverrun {
        offset: u64,
        declared: u64,
        available: u64,
    },

    /// A modular-char integer continued past its maximum byte count
    #[error("Malformed variable-length integer at byte {position:#X}")]
    MalformedVarInt { position: u64 },

    /// A byte-granular read was attempted in the middle of a byte
    #[error("Unaligned byte read at bit {bit_position}")]
    UnalignedRead { bit_position: u64 },

    /// Fewer bits remain in the stream than were requested
    #[error("Truncated stream: needed {needed} bits at bit {bit_position}, {available} available")]
    TruncatedStream {
        bit_position: u64,
        needed: u64,
        available: u64,
    },

    /// Error during decompression
    #[error("Decompression error: {0}")]
    Decompression(String),

    /// A section start or end marker did not match
    #[error("Invalid sentinel in {0}")]
    InvalidSentinel(String),

    /// Invalid file format
    #[error("Invalid file format: {0}")]
    InvalidFormat(String),
}

/// Result type alias for dwg-forensics operations
pub type Result<T> = std::result::Result<T, DwgError>;

impl DwgError {
    /// Whether this error must abort the whole session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DwgError::UnsupportedVersion(_) | DwgError::Io(_))
    }

    /// Short stable name used as the check name of a finding.
    pub fn kind_name(&self) -> &'static str {
        match self {
            DwgError::Io(_) => "io",
            DwgError::UnsupportedVersion(_) => "unsupported_version",
            DwgError::CorruptLocator { .. } => "corrupt_locator",
            DwgError::ObjectOverrun { .. } => "object_overrun",
            DwgError::MalformedVarInt { .. } => "malformed_var_int",
            DwgError::UnalignedRead { .. } => "unaligned_read",
            DwgError::TruncatedStream { .. } => "truncated_stream",
            DwgError::Decompression(_) => "decompression",
            DwgError::InvalidSentinel(_) => "invalid_sentinel",
            DwgError::InvalidFormat(_) => "invalid_format",
        }
    }
}
