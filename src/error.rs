//! Error types for MARC operations.
//!
//! This module provides the [`MarcError`] type for all codec operations
//! and the [`Result`] convenience type.

use thiserror::Error;

/// Error type for all MARC codec operations.
///
/// Structural problems (bad leader, broken directory, truncated data, bad
/// tags) and I/O failures are reported through this type. Recoverable content
/// issues, such as a non-repeatable field collision, are reported through
/// boolean returns instead.
#[derive(Error, Debug)]
pub enum MarcError {
    /// A tag was not exactly three bytes long.
    #[error("Invalid tag: {0}")]
    InvalidTag(String),

    /// Error indicating an invalid or malformed MARC record.
    #[error("Invalid MARC record: {0}")]
    InvalidRecord(String),

    /// Error indicating an invalid leader (24-byte header).
    #[error("Invalid leader: {0}")]
    InvalidLeader(String),

    /// Error indicating an invalid field structure.
    #[error("Invalid field: {0}")]
    InvalidField(String),

    /// An empty subfield or control field was found while the strict policy
    /// was in effect.
    #[error("Empty subfield: {0}")]
    EmptySubfield(String),

    /// A single field is too long to be described by a directory entry.
    #[error("Field too long: {0}")]
    FieldTooLong(String),

    /// Error during parsing of MARC-XML data.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Error indicating a truncated or incomplete record.
    #[error("Truncated record: {0}")]
    TruncatedRecord(String),

    /// The file type could not be derived from a file name.
    #[error("Can't guess the file type of \"{0}\"")]
    UnknownFileType(String),

    /// A writer mode that the chosen format cannot honor.
    #[error("Unsupported writer mode: {0}")]
    UnsupportedMode(String),

    /// IO error from the underlying source/destination.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Convenience type alias for [`std::result::Result`] with [`MarcError`].
pub type Result<T> = std::result::Result<T, MarcError>;
