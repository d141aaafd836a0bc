//! Writing MARC records to binary format.
//!
//! This module provides [`BinaryWriter`] for serializing [`Record`] instances
//! to ISO 2709 binary format that can be written to any destination
//! implementing [`std::io::Write`].
//!
//! A record whose encoding would exceed [`MAX_RECORD_LENGTH`] bytes is split
//! into several physical records. Fields are packed greedily in their
//! original order; every part after the first starts with a copy of the 001
//! field, and every part but the last has its continuation flag set.
//! [`BinaryReader`](crate::BinaryReader) merges such parts back together.
//!
//! # Examples
//!
//! ```
//! use marcodec::{BinaryWriter, BibliographicLevel, Record, Tag, TypeOfRecord};
//!
//! # fn main() -> marcodec::Result<()> {
//! let mut record = Record::with_type(
//!     TypeOfRecord::LanguageMaterial,
//!     BibliographicLevel::MonographOrItem,
//!     "12345",
//! );
//! record.insert_field(Tag::new("245")?, "10\x1FaTitle");
//!
//! let mut writer = BinaryWriter::new(Vec::new());
//! writer.write_record(&record)?;
//! writer.finish()?;
//! assert_eq!(&writer.get_ref()[..5], b"00066");
//! # Ok(())
//! # }
//! ```

use crate::error::{MarcError, Result};
use crate::formats::FormatWriter;
use crate::leader::LEADER_LENGTH;
use crate::record::{
    Field, Record, DIRECTORY_ENTRY_LENGTH, FIELD_TERMINATOR, MAX_RECORD_LENGTH,
    MAX_VARIABLE_FIELD_DATA_LENGTH, RECORD_TERMINATOR,
};
use crate::validation::EmptySubfieldPolicy;
use std::io::Write;
use std::ops::Range;

/// Writer for ISO 2709 binary MARC.
///
/// The writer owns a scratch buffer that is reused for every physical
/// record, so one writer must not be shared between threads without
/// external locking.
#[derive(Debug)]
pub struct BinaryWriter<W: Write> {
    writer: W,
    policy: EmptySubfieldPolicy,
    buffer: Vec<u8>,
    records_written: usize,
    finished: bool,
}

impl<W: Write> BinaryWriter<W> {
    /// Create a new binary writer.
    pub fn new(writer: W) -> Self {
        BinaryWriter {
            writer,
            policy: EmptySubfieldPolicy::default(),
            buffer: Vec::with_capacity(MAX_RECORD_LENGTH),
            records_written: 0,
            finished: false,
        }
    }

    /// Set how empty subfields and empty control fields are handled before writing.
    #[must_use]
    pub fn with_empty_subfield_policy(mut self, policy: EmptySubfieldPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Write one logical record, as one or more physical records.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the record does not start with a 001 field or fails validation
    /// - a single field is longer than [`MAX_VARIABLE_FIELD_DATA_LENGTH`] bytes
    /// - the writer was already finished
    /// - an I/O error occurs
    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        if self.finished {
            return Err(MarcError::InvalidRecord(
                "Cannot write to a finished writer".to_string(),
            ));
        }
        record.validate(self.policy)?;

        let fields = record.fields();
        let control_number = &fields[0];
        if let Some(oversized) = fields
            .iter()
            .find(|field| field.contents().len() > MAX_VARIABLE_FIELD_DATA_LENGTH)
        {
            return Err(MarcError::FieldTooLong(format!(
                "field {} of record {:?} has {} bytes, at most {MAX_VARIABLE_FIELD_DATA_LENGTH} are allowed",
                oversized.tag(),
                control_number.contents(),
                oversized.contents().len()
            )));
        }

        let parts = split_into_parts(fields);
        if parts.len() > 1 {
            log::debug!(
                "splitting record {:?} into {} physical records",
                control_number.contents(),
                parts.len()
            );
        }

        let last_part = parts.len() - 1;
        for (part_number, part) in parts.into_iter().enumerate() {
            let part_fields = std::iter::once(control_number).chain(&fields[part]);
            self.encode_part(record, part_fields, part_number < last_part)?;
            self.writer.write_all(&self.buffer)?;
        }

        self.records_written += 1;
        Ok(())
    }

    /// Flush the writer and mark it as finished.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing the underlying writer fails.
    pub fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.finished = true;
        Ok(())
    }

    /// Flush without finishing.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing the underlying writer fails.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Number of logical records written so far.
    #[must_use]
    pub fn records_written(&self) -> usize {
        self.records_written
    }

    /// The underlying destination.
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Mutable access to the underlying destination.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Consume the writer and return the underlying destination.
    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Render one physical record into the scratch buffer.
    fn encode_part<'a>(
        &mut self,
        record: &Record,
        fields: impl Iterator<Item = &'a Field> + Clone,
        continued: bool,
    ) -> Result<()> {
        let (entry_count, data_length) = fields
            .clone()
            .fold((0, 0), |(count, length), field| (count + 1, length + field.contents().len() + 1));
        let base_address = LEADER_LENGTH + DIRECTORY_ENTRY_LENGTH * entry_count + 1;
        let record_length = base_address + data_length + 1;
        if record_length > MAX_RECORD_LENGTH {
            return Err(MarcError::InvalidRecord(format!(
                "physical record length {record_length} exceeds {MAX_RECORD_LENGTH}"
            )));
        }

        let mut leader = record.leader().clone();
        leader.record_length = u32::try_from(record_length)
            .map_err(|_| MarcError::InvalidRecord("record length overflow".to_string()))?;
        leader.data_base_address = u32::try_from(base_address)
            .map_err(|_| MarcError::InvalidRecord("base address overflow".to_string()))?;
        leader.set_continued(continued);

        self.buffer.clear();
        self.buffer.extend_from_slice(&leader.as_bytes()?);

        let mut offset = 0;
        for field in fields.clone() {
            let field_length = field.contents().len() + 1;
            self.buffer.extend_from_slice(field.tag().as_bytes());
            self.buffer
                .extend_from_slice(format!("{field_length:04}{offset:05}").as_bytes());
            offset += field_length;
        }
        self.buffer.push(FIELD_TERMINATOR);

        for field in fields {
            self.buffer.extend_from_slice(field.contents().as_bytes());
            self.buffer.push(FIELD_TERMINATOR);
        }
        self.buffer.push(RECORD_TERMINATOR);
        Ok(())
    }
}

impl<W: Write + std::fmt::Debug> FormatWriter for BinaryWriter<W> {
    fn write_record(&mut self, record: &Record) -> Result<()> {
        BinaryWriter::write_record(self, record)
    }

    fn finish(&mut self) -> Result<()> {
        BinaryWriter::finish(self)
    }

    fn records_written(&self) -> Option<usize> {
        Some(self.records_written)
    }
}

/// Serialize a single record to binary MARC, possibly as several physical records.
///
/// # Errors
///
/// Returns an error if the record cannot be written by [`BinaryWriter`].
pub fn record_to_binary(record: &Record) -> Result<Vec<u8>> {
    let mut writer = BinaryWriter::new(Vec::new());
    writer.write_record(record)?;
    Ok(writer.into_inner())
}

/// Greedy first-fit packing of the fields after the leading 001.
///
/// Returns, for every physical part, the range of fields (excluding the 001,
/// which every part carries) that go into it. A field joins the current part
/// as long as the part stays within [`MAX_RECORD_LENGTH`]; an exact fit
/// counts as fitting.
fn split_into_parts(fields: &[Field]) -> Vec<Range<usize>> {
    let field_cost = |field: &Field| DIRECTORY_ENTRY_LENGTH + field.contents().len() + 1;
    // Leader, directory terminator, record terminator and the 001.
    let part_overhead = LEADER_LENGTH + 1 + 1 + field_cost(&fields[0]);

    let mut parts = Vec::new();
    let mut start = 1;
    let mut size = part_overhead;
    for (index, field) in fields.iter().enumerate().skip(1) {
        let cost = field_cost(field);
        if size + cost > MAX_RECORD_LENGTH && index > start {
            parts.push(start..index);
            start = index;
            size = part_overhead;
        }
        size += cost;
    }
    parts.push(start..fields.len());
    parts
}
