//! File-level access to MARC data.
//!
//! Binary MARC and MARC-XML share the [`FormatReader`] and [`FormatWriter`]
//! traits. [`open_reader`] and [`create_writer`] pick the codec for a file,
//! either explicitly or from the file name:
//!
//! | Extension (any case) | [`FileType`] |
//! |----------------------|--------------|
//! | `.mrc`, `.marc`, `.raw` | [`FileType::Binary`] |
//! | `.xml` | [`FileType::Xml`] |
//!
//! # Examples
//!
//! ```no_run
//! use marcodec::formats::{create_writer, open_reader, FileType, FormatReader, FormatWriter, WriterMode};
//!
//! let mut reader = open_reader("records.mrc", FileType::Auto)?;
//! let mut writer = create_writer("records.xml", FileType::Auto, WriterMode::Overwrite)?;
//! while let Some(record) = reader.read_record()? {
//!     writer.write_record(&record)?;
//! }
//! writer.finish()?;
//! # Ok::<(), marcodec::MarcError>(())
//! ```

mod files;
mod maintenance;
mod traits;

pub use files::{create_writer, open_reader, MarcFileReader, MarcFileWriter};
pub use maintenance::{
    collect_record_offsets, file_locked_compose_and_write_record, is_valid_marc_file,
    remove_duplicate_control_number_records, LockableWriter,
};
pub use traits::{FormatReader, FormatReaderExt, FormatWriter, RecordIterator};

use crate::error::{MarcError, Result};
use std::path::Path;

/// Serialization of a MARC file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FileType {
    /// Derive the type from the file name
    #[default]
    Auto,
    /// ISO 2709 binary MARC
    Binary,
    /// MARC-XML
    Xml,
}

impl FileType {
    /// Map a file extension (without the dot) to a concrete type.
    ///
    /// ```
    /// use marcodec::formats::FileType;
    ///
    /// assert_eq!(FileType::from_extension("MARC"), Some(FileType::Binary));
    /// assert_eq!(FileType::from_extension("json"), None);
    /// ```
    #[must_use]
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "mrc" | "marc" | "raw" => Some(Self::Binary),
            "xml" => Some(Self::Xml),
            _ => None,
        }
    }

    /// Canonical extension for files of this type.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Auto => "",
            Self::Binary => "mrc",
            Self::Xml => "xml",
        }
    }

    /// Human-readable name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Binary => "MARC-21",
            Self::Xml => "MARC-XML",
        }
    }

    fn resolve(self, path: &Path) -> Result<Self> {
        match self {
            Self::Auto => guess_file_type(path),
            concrete => Ok(concrete),
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// How [`create_writer`] opens an existing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriterMode {
    /// Truncate the file
    #[default]
    Overwrite,
    /// Add records after the existing content (binary only)
    Append,
}

/// Derive the [`FileType`] of `path` from its extension.
///
/// # Errors
///
/// Returns [`MarcError::UnknownFileType`] if the extension is missing or not
/// recognized.
pub fn guess_file_type(path: impl AsRef<Path>) -> Result<FileType> {
    let path = path.as_ref();
    path.extension()
        .and_then(|extension| extension.to_str())
        .and_then(FileType::from_extension)
        .ok_or_else(|| MarcError::UnknownFileType(path.display().to_string()))
}
