//! Reading MARC records from binary streams.
//!
//! This module provides [`BinaryReader`] for reading ISO 2709 formatted MARC
//! records from any source that implements [`std::io::Read`].
//!
//! Logical records that the writer had to split into several physical
//! records are merged again: a physical record is appended to the previous
//! one if the previous one carries the continuation flag in its leader.
//! Neighbouring records that share a control number without the flag are
//! merged with [`Record::merge`], which skips fields that are not repeatable.
//! That second rule can be switched off with
//! [`BinaryReader::with_control_number_merging`].
//!
//! # Examples
//!
//! ```no_run
//! use marcodec::BinaryReader;
//! use std::fs::File;
//! use std::io::BufReader;
//!
//! let file = BufReader::new(File::open("records.mrc")?);
//! let mut reader = BinaryReader::new(file);
//!
//! while let Some(record) = reader.read_record()? {
//!     println!("{:?}", record.control_number());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::error::{MarcError, Result};
use crate::formats::FormatReader;
use crate::leader::{Leader, LEADER_LENGTH, RECORD_LENGTH_FIELD_LENGTH};
use crate::record::{
    Field, Record, CONTROL_NUMBER_TAG, DIRECTORY_ENTRY_LENGTH, FIELD_TERMINATOR, RECORD_TERMINATOR,
};
use crate::tag::Tag;
use crate::validation::EmptySubfieldPolicy;
use std::io::{ErrorKind, Read, Seek, SeekFrom};

/// Reader for ISO 2709 binary MARC.
///
/// The reader decodes one physical record ahead of the caller so that
/// multi-part records can be merged and [`BinaryReader::has_more`] can answer
/// without consuming a record.
#[derive(Debug)]
pub struct BinaryReader<R: Read> {
    reader: R,
    policy: EmptySubfieldPolicy,
    buffer: Vec<u8>,
    lookahead: Option<Record>,
    lookahead_offset: u64,
    primed: bool,
    position: u64,
    records_read: usize,
    last_control_number: Option<String>,
    merge_control_numbers: bool,
}

impl<R: Read> BinaryReader<R> {
    /// Create a reader positioned at the start of `reader`.
    pub fn new(reader: R) -> Self {
        BinaryReader {
            reader,
            policy: EmptySubfieldPolicy::default(),
            buffer: Vec::new(),
            lookahead: None,
            lookahead_offset: 0,
            primed: false,
            position: 0,
            records_read: 0,
            last_control_number: None,
            merge_control_numbers: true,
        }
    }

    /// Set how empty subfields and empty control fields are handled.
    ///
    /// # Examples
    ///
    /// ```
    /// use marcodec::{BinaryReader, EmptySubfieldPolicy};
    /// use std::io::Cursor;
    ///
    /// let reader = BinaryReader::new(Cursor::new(Vec::new()))
    ///     .with_empty_subfield_policy(EmptySubfieldPolicy::Warn);
    /// ```
    #[must_use]
    pub fn with_empty_subfield_policy(mut self, policy: EmptySubfieldPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Whether neighbouring records with the same control number but no
    /// continuation flag are merged. On by default.
    #[must_use]
    pub fn with_control_number_merging(mut self, enabled: bool) -> Self {
        self.merge_control_numbers = enabled;
        self
    }

    /// Read the next logical record.
    ///
    /// Returns `Ok(None)` at the end of the stream.
    ///
    /// # Errors
    ///
    /// Returns an error for truncated or structurally broken records, for
    /// empty content under [`EmptySubfieldPolicy::Abort`], and for I/O
    /// failures. Error messages name the last record read successfully.
    pub fn read_record(&mut self) -> Result<Option<Record>> {
        self.prime()?;
        let Some(mut record) = self.lookahead.take() else {
            return Ok(None);
        };

        self.last_control_number = record.control_number().map(str::to_string);
        let mut parts = 1;
        loop {
            let offset = self.position;
            match self.read_physical_record()? {
                Some(next) if record.leader().is_continued() => {
                    append_continuation(&mut record, next);
                    parts += 1;
                },
                Some(next)
                    if self.merge_control_numbers
                        && record.control_number() == next.control_number() =>
                {
                    record.merge(&next);
                    record.leader_mut().set_continued(next.leader().is_continued());
                    parts += 1;
                },
                next => {
                    self.lookahead = next;
                    self.lookahead_offset = offset;
                    break;
                },
            }
        }
        if parts > 1 {
            log::debug!(
                "merged {parts} physical records into record {:?}",
                record.control_number().unwrap_or_default()
            );
        }
        if record.leader().is_continued() {
            record.leader_mut().set_continued(false);
        }

        self.policy.check_record(&record)?;
        self.records_read += 1;
        Ok(Some(record))
    }

    /// True if another record can be read.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding the next record fails.
    pub fn has_more(&mut self) -> Result<bool> {
        self.prime()?;
        Ok(self.lookahead.is_some())
    }

    /// Byte offset of the next logical record, relative to where the reader started.
    #[must_use]
    pub fn tell(&self) -> u64 {
        if self.lookahead.is_some() {
            self.lookahead_offset
        } else {
            self.position
        }
    }

    /// Number of logical records returned so far.
    #[must_use]
    pub fn records_read(&self) -> usize {
        self.records_read
    }

    /// Consume the reader and return the underlying source.
    pub fn into_inner(self) -> R {
        self.reader
    }

    fn prime(&mut self) -> Result<()> {
        if !self.primed {
            self.lookahead_offset = self.position;
            self.lookahead = self.read_physical_record()?;
            self.primed = true;
        }
        Ok(())
    }

    fn read_physical_record(&mut self) -> Result<Option<Record>> {
        let mut length_prefix = [0u8; RECORD_LENGTH_FIELD_LENGTH];
        let prefix_read = read_up_to(&mut self.reader, &mut length_prefix)?;
        if prefix_read == 0 {
            return Ok(None);
        }
        if prefix_read < RECORD_LENGTH_FIELD_LENGTH {
            return Err(self.with_context(MarcError::TruncatedRecord(format!(
                "only {prefix_read} bytes of the record length are present"
            ))));
        }

        let record_length = parse_digits(&length_prefix).map_err(|e| self.with_context(e))?;
        if record_length < LEADER_LENGTH + 2 {
            return Err(self.with_context(MarcError::InvalidLeader(format!(
                "record length {record_length} is too small"
            ))));
        }

        self.buffer.clear();
        self.buffer.resize(record_length, 0);
        self.buffer[..RECORD_LENGTH_FIELD_LENGTH].copy_from_slice(&length_prefix);
        match self.reader.read_exact(&mut self.buffer[RECORD_LENGTH_FIELD_LENGTH..]) {
            Ok(()) => {},
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                return Err(self.with_context(MarcError::TruncatedRecord(format!(
                    "expected {record_length} bytes, hit end of stream"
                ))));
            },
            Err(e) => return Err(MarcError::IoError(e)),
        }
        self.position += record_length as u64;

        Record::from_binary(&self.buffer)
            .map(Some)
            .map_err(|e| self.with_context(e))
    }

    fn with_context(&self, error: MarcError) -> MarcError {
        let location = match &self.last_control_number {
            Some(control_number) => format!("after record {control_number:?}"),
            None => "in the first record".to_string(),
        };
        match error {
            MarcError::InvalidRecord(msg) => MarcError::InvalidRecord(format!("{msg} ({location})")),
            MarcError::InvalidLeader(msg) => MarcError::InvalidLeader(format!("{msg} ({location})")),
            MarcError::InvalidField(msg) => MarcError::InvalidField(format!("{msg} ({location})")),
            MarcError::InvalidTag(msg) => MarcError::InvalidTag(format!("{msg} ({location})")),
            MarcError::TruncatedRecord(msg) => MarcError::TruncatedRecord(format!("{msg} ({location})")),
            other => other,
        }
    }
}

impl<R: Read + Seek> BinaryReader<R> {
    /// Continue reading at byte `offset` of the underlying source.
    ///
    /// `offset` must be the start of a record, e.g. a value returned by
    /// [`BinaryReader::tell`].
    ///
    /// # Errors
    ///
    /// Returns an error if seeking fails.
    pub fn seek(&mut self, offset: u64) -> Result<()> {
        self.reader.seek(SeekFrom::Start(offset))?;
        self.position = offset;
        self.lookahead = None;
        self.primed = false;
        Ok(())
    }

    /// Go back to the start of the source.
    ///
    /// # Errors
    ///
    /// Returns an error if seeking fails.
    pub fn rewind(&mut self) -> Result<()> {
        self.seek(0)?;
        self.records_read = 0;
        self.last_control_number = None;
        Ok(())
    }
}

impl<R: Read + std::fmt::Debug> FormatReader for BinaryReader<R> {
    fn read_record(&mut self) -> Result<Option<Record>> {
        BinaryReader::read_record(self)
    }

    fn records_read(&self) -> Option<usize> {
        Some(self.records_read)
    }
}

impl<R: Read> Iterator for BinaryReader<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}

impl Record {
    /// Decode one complete physical record, length prefix and terminator included.
    pub(crate) fn from_binary(bytes: &[u8]) -> Result<Record> {
        if bytes.len() < LEADER_LENGTH + 2 {
            return Err(MarcError::TruncatedRecord(format!(
                "{} bytes cannot hold a record",
                bytes.len()
            )));
        }
        if bytes.last() != Some(&RECORD_TERMINATOR) {
            return Err(MarcError::InvalidRecord(
                "record does not end with a record terminator".to_string(),
            ));
        }

        let leader = Leader::from_bytes(&bytes[..LEADER_LENGTH])?;
        leader.validate_for_reading()?;
        if leader.record_length as usize != bytes.len() {
            return Err(MarcError::InvalidLeader(format!(
                "leader says {} bytes, record has {}",
                leader.record_length,
                bytes.len()
            )));
        }

        let base_address = leader.data_base_address as usize;
        if bytes[base_address - 1] != FIELD_TERMINATOR {
            return Err(MarcError::InvalidRecord(
                "directory is not followed by a field terminator".to_string(),
            ));
        }
        let directory = &bytes[LEADER_LENGTH..base_address - 1];
        if directory.len() % DIRECTORY_ENTRY_LENGTH != 0 {
            return Err(MarcError::InvalidRecord(format!(
                "directory length {} is not a multiple of {DIRECTORY_ENTRY_LENGTH}",
                directory.len()
            )));
        }
        let data = &bytes[base_address..bytes.len() - 1];

        let mut fields = Vec::with_capacity(directory.len() / DIRECTORY_ENTRY_LENGTH);
        for entry in directory.chunks_exact(DIRECTORY_ENTRY_LENGTH) {
            let tag = Tag::from_bytes(&entry[..3])?;
            let field_length = parse_digits(&entry[3..7])?;
            let field_start = parse_digits(&entry[7..12])?;
            let field_end = field_start + field_length;
            if field_length == 0 || field_end > data.len() {
                return Err(MarcError::InvalidRecord(format!(
                    "field {tag} at offset {field_start} with length {field_length} exceeds the data area"
                )));
            }
            if data[field_end - 1] != FIELD_TERMINATOR {
                return Err(MarcError::InvalidField(format!(
                    "field {tag} is not terminated by a field terminator"
                )));
            }
            let contents = decode_contents(&data[field_start..field_end - 1], tag);
            fields.push(Field::new(tag, contents));
        }

        match fields.first() {
            Some(first) if first.tag() == CONTROL_NUMBER_TAG => {},
            Some(first) => {
                return Err(MarcError::InvalidRecord(format!(
                    "first field must be 001, found {}",
                    first.tag()
                )))
            },
            None => return Err(MarcError::InvalidRecord("record has no fields".to_string())),
        }

        Ok(Record::from_parts(leader, fields))
    }
}

/// Append the fields of a continuation part, minus its repeated 001.
fn append_continuation(record: &mut Record, continuation: Record) {
    let still_continued = continuation.leader().is_continued();
    for (index, field) in continuation.iter().enumerate() {
        if index == 0 && field.tag() == CONTROL_NUMBER_TAG {
            continue;
        }
        record.append_field(field.tag(), field.contents());
    }
    record.leader_mut().set_continued(still_continued);
}

fn decode_contents(bytes: &[u8], tag: Tag) -> String {
    match std::str::from_utf8(bytes) {
        Ok(contents) => contents.to_string(),
        Err(e) => {
            log::warn!("field {tag} is not valid UTF-8 ({e}), replacing invalid bytes");
            String::from_utf8_lossy(bytes).into_owned()
        },
    }
}

/// Fill `buf` as far as the stream allows and return the number of bytes read.
fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {},
            Err(e) => return Err(MarcError::IoError(e)),
        }
    }
    Ok(filled)
}

/// Parse an ASCII decimal number.
fn parse_digits(bytes: &[u8]) -> Result<usize> {
    bytes.iter().try_fold(0usize, |acc, &byte| {
        if byte.is_ascii_digit() {
            Ok(acc * 10 + usize::from(byte - b'0'))
        } else {
            Err(MarcError::InvalidRecord(format!(
                "expected digits, got {:?}",
                String::from_utf8_lossy(bytes)
            )))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subfields::SUBFIELD_DELIMITER;
    use std::io::Cursor;

    /// Assemble a physical record by hand from (tag, contents) pairs.
    fn build_record(entry_map: &str, fields: &[(&str, &[u8])]) -> Vec<u8> {
        let mut directory = Vec::new();
        let mut data = Vec::new();
        for (tag, contents) in fields {
            directory.extend_from_slice(tag.as_bytes());
            directory.extend_from_slice(format!("{:04}", contents.len() + 1).as_bytes());
            directory.extend_from_slice(format!("{:05}", data.len()).as_bytes());
            data.extend_from_slice(contents);
            data.push(FIELD_TERMINATOR);
        }
        directory.push(FIELD_TERMINATOR);
        let base_address = LEADER_LENGTH + directory.len();
        let record_length = base_address + data.len() + 1;

        let mut bytes = format!("{record_length:05}nam a22{base_address:05} a {entry_map}").into_bytes();
        assert_eq!(bytes.len(), LEADER_LENGTH);
        bytes.extend_from_slice(&directory);
        bytes.extend_from_slice(&data);
        bytes.push(RECORD_TERMINATOR);
        bytes
    }

    fn title(value: &str) -> Vec<u8> {
        let mut contents = b"10".to_vec();
        contents.push(SUBFIELD_DELIMITER);
        contents.push(b'a');
        contents.extend_from_slice(value.as_bytes());
        contents
    }

    #[test]
    fn test_read_simple_record() {
        let bytes = build_record("4500", &[("001", b"000000001"), ("245", &title("Test title"))]);
        let mut reader = BinaryReader::new(Cursor::new(bytes));

        let record = reader.read_record().unwrap().unwrap();
        assert_eq!(record.control_number(), Some("000000001"));
        assert_eq!(record.len(), 2);
        let title_field = record.first_field(&Tag::new("245").unwrap()).unwrap();
        assert_eq!(title_field.first_subfield_with_code('a'), Some("Test title"));

        assert!(reader.read_record().unwrap().is_none());
        assert_eq!(reader.records_read(), 1);
    }

    #[test]
    fn test_empty_stream() {
        let mut reader = BinaryReader::new(Cursor::new(Vec::new()));
        assert!(!reader.has_more().unwrap());
        assert!(reader.read_record().unwrap().is_none());
    }

    #[test]
    fn test_has_more_does_not_consume() {
        let mut bytes = build_record("4500", &[("001", b"1")]);
        bytes.extend(build_record("4500", &[("001", b"2")]));
        let mut reader = BinaryReader::new(Cursor::new(bytes));

        assert!(reader.has_more().unwrap());
        assert!(reader.has_more().unwrap());
        assert_eq!(reader.read_record().unwrap().unwrap().control_number(), Some("1"));
        assert!(reader.has_more().unwrap());
        assert_eq!(reader.read_record().unwrap().unwrap().control_number(), Some("2"));
        assert!(!reader.has_more().unwrap());
    }

    #[test]
    fn test_partial_length_prefix_is_truncation() {
        let mut bytes = build_record("4500", &[("001", b"1")]);
        bytes.extend_from_slice(b"001");
        let mut reader = BinaryReader::new(Cursor::new(bytes));
        let err = reader.read_record().unwrap_err();
        assert!(matches!(err, MarcError::TruncatedRecord(_)));
    }

    #[test]
    fn test_truncated_body_names_last_good_record() {
        let mut bytes = build_record("4500", &[("001", b"good-one")]);
        let second = build_record("4500", &[("001", b"bad"), ("245", &title("x"))]);
        bytes.extend_from_slice(&second[..second.len() - 10]);

        let mut reader = BinaryReader::new(Cursor::new(bytes));
        // The lookahead decodes the broken record while returning the first one.
        let err = reader.read_record().unwrap_err();
        match err {
            MarcError::TruncatedRecord(msg) => assert!(msg.contains("after record \"good-one\""), "{msg}"),
            other => panic!("unexpected error {other:?}"),
        }

        let mut reader = BinaryReader::new(Cursor::new(second[..second.len() - 10].to_vec()));
        match reader.read_record().unwrap_err() {
            MarcError::TruncatedRecord(msg) => assert!(msg.contains("in the first record"), "{msg}"),
            other => panic!("unexpected error {other:?}"),
        }

        let mut bytes = build_record("4500", &[("001", b"good-one")]);
        bytes.extend(build_record("4500", &[("001", b"good-two")]));
        bytes.extend_from_slice(&second[..second.len() - 10]);
        let mut reader = BinaryReader::new(Cursor::new(bytes));
        assert!(reader.read_record().unwrap().is_some());
        match reader.read_record().unwrap_err() {
            MarcError::TruncatedRecord(msg) => assert!(msg.contains("good-two"), "{msg}"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_missing_record_terminator() {
        let mut bytes = build_record("4500", &[("001", b"1")]);
        let last = bytes.len() - 1;
        bytes[last] = b'X';
        assert!(matches!(
            Record::from_binary(&bytes),
            Err(MarcError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_first_field_must_be_control_number() {
        let bytes = build_record("4500", &[("245", &title("No id"))]);
        assert!(matches!(
            Record::from_binary(&bytes),
            Err(MarcError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_field_past_data_area() {
        let mut bytes = build_record("4500", &[("001", b"1"), ("245", &title("x"))]);
        // Bump the 245 directory length from 0006 to 0090.
        let entry = LEADER_LENGTH + DIRECTORY_ENTRY_LENGTH;
        bytes[entry + 3..entry + 7].copy_from_slice(b"0090");
        assert!(Record::from_binary(&bytes).is_err());
    }

    #[test]
    fn test_continuation_parts_are_merged() {
        let mut bytes = build_record("4501", &[("001", b"42"), ("245", &title("Part one"))]);
        bytes.extend(build_record("4500", &[("001", b"42"), ("500", &title("Part two"))]));
        bytes.extend(build_record("4500", &[("001", b"43")]));
        let mut reader = BinaryReader::new(Cursor::new(bytes));

        let merged = reader.read_record().unwrap().unwrap();
        let tags: Vec<String> = merged.iter().map(|f| f.tag().to_string()).collect();
        assert_eq!(tags, vec!["001", "245", "500"]);
        assert!(!merged.leader().is_continued());

        assert_eq!(reader.read_record().unwrap().unwrap().control_number(), Some("43"));
        assert!(reader.read_record().unwrap().is_none());
    }

    #[test]
    fn test_same_control_number_is_merged_without_flag() {
        let mut bytes = build_record("4500", &[("001", b"7"), ("245", &title("a")), ("500", &title("b"))]);
        bytes.extend(build_record("4500", &[("001", b"7"), ("245", &title("c")), ("500", &title("d"))]));
        let mut reader = BinaryReader::new(Cursor::new(bytes));
        let merged = reader.read_record().unwrap().unwrap();
        // The second 245 is not repeatable and is dropped; the 500 is kept.
        let contents: Vec<&str> = merged.iter().map(|f| f.contents()).collect();
        assert_eq!(contents, vec!["7", "10\x1Faa", "10\x1Fab", "10\x1Fad"]);
        assert!(merged.validate(EmptySubfieldPolicy::Abort).is_ok());
        assert!(reader.read_record().unwrap().is_none());
    }

    #[test]
    fn test_control_number_merging_can_be_disabled() {
        let mut bytes = build_record("4501", &[("001", b"7"), ("245", &title("a"))]);
        bytes.extend(build_record("4500", &[("001", b"7"), ("500", &title("b"))]));
        bytes.extend(build_record("4500", &[("001", b"7"), ("245", &title("c"))]));
        let mut reader = BinaryReader::new(Cursor::new(bytes)).with_control_number_merging(false);

        // Flagged parts are still merged.
        let first = reader.read_record().unwrap().unwrap();
        assert_eq!(first.len(), 3);
        let second = reader.read_record().unwrap().unwrap();
        assert_eq!(second.field(1).unwrap().contents(), "10\x1Fac");
        assert!(reader.read_record().unwrap().is_none());
    }

    #[test]
    fn test_empty_subfield_policy_on_read() {
        let mut contents = b"  ".to_vec();
        contents.extend_from_slice(&[SUBFIELD_DELIMITER, b'a', SUBFIELD_DELIMITER, b'b']);
        contents.extend_from_slice(b"foo");
        let bytes = build_record("4500", &[("001", b"1"), ("500", &contents)]);

        let mut strict = BinaryReader::new(Cursor::new(bytes.clone()));
        assert!(matches!(strict.read_record(), Err(MarcError::EmptySubfield(_))));

        let mut lenient =
            BinaryReader::new(Cursor::new(bytes)).with_empty_subfield_policy(EmptySubfieldPolicy::Warn);
        let record = lenient.read_record().unwrap().unwrap();
        let subfields = record.field(1).unwrap().subfields();
        let pairs: Vec<(char, &str)> = subfields.iter().map(|s| (s.code, s.value.as_str())).collect();
        assert_eq!(pairs, vec![('a', ""), ('b', "foo")]);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let bytes = build_record("4500", &[("001", b"1"), ("500", b"  \x1Fabad \xFF byte")]);
        let record = Record::from_binary(&bytes).unwrap();
        assert_eq!(record.field(1).unwrap().contents(), "  \x1Fabad \u{FFFD} byte");
    }

    #[test]
    fn test_tell_and_seek() {
        let first = build_record("4500", &[("001", b"1")]);
        let first_len = first.len() as u64;
        let mut bytes = first;
        bytes.extend(build_record("4500", &[("001", b"2")]));
        let mut reader = BinaryReader::new(Cursor::new(bytes));

        assert_eq!(reader.tell(), 0);
        reader.read_record().unwrap();
        assert_eq!(reader.tell(), first_len);
        reader.seek(first_len).unwrap();
        assert_eq!(reader.read_record().unwrap().unwrap().control_number(), Some("2"));
        reader.rewind().unwrap();
        assert_eq!(reader.read_record().unwrap().unwrap().control_number(), Some("1"));
    }

    #[test]
    fn test_iterator() {
        let mut bytes = build_record("4500", &[("001", b"1")]);
        bytes.extend(build_record("4500", &[("001", b"2")]));
        let records: Vec<Record> = BinaryReader::new(Cursor::new(bytes))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(records.len(), 2);
    }
}
