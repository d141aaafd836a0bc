#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! ## Modules
//!
//! - [`tag`] - Three-character field tags with packed integer ordering
//! - [`subfields`] - Parsed view of a data field's subfields
//! - [`leader`] - The 24-byte record leader
//! - [`record`] - `Record` and `Field`, lookups, local blocks and checksums
//! - [`repeatable`] - Which tags may occur more than once
//! - [`validation`] - Structural checks and the empty-subfield policy
//! - [`reader`] - ISO 2709 binary reader with multi-part merging
//! - [`writer`] - ISO 2709 binary writer with oversized-record splitting
//! - [`marcxml`] - MARC-XML reader and writer
//! - [`formats`] - Reader/writer traits, file factories and file utilities
//! - [`error`] - Error types and result type

pub mod error;
/// Reader/writer traits, file factories and file-level utilities.
pub mod formats;
pub mod leader;
pub mod marcxml;
pub mod reader;
/// Core MARC record structures (`Record`, `Field`)
pub mod record;
pub mod repeatable;
pub mod subfields;
pub mod tag;
pub mod validation;
pub mod writer;

pub use error::{MarcError, Result};
pub use formats::{
    create_writer, guess_file_type, open_reader, FileType, FormatReader, FormatWriter, WriterMode,
};
pub use leader::Leader;
pub use marcxml::{record_to_marcxml, XmlReader, XmlWriter};
pub use reader::BinaryReader;
pub use record::{
    calc_checksum, calc_checksum_excluding, BibliographicLevel, Field, Record, RecordType,
    TypeOfRecord,
};
pub use repeatable::is_repeatable_field;
pub use subfields::{Subfield, Subfields};
pub use tag::Tag;
pub use validation::EmptySubfieldPolicy;
pub use writer::{record_to_binary, BinaryWriter};
