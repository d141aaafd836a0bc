//! MARCXML serialization and deserialization of MARC records.
//!
//! This module provides streaming conversion between MARC records and
//! standard MARCXML, as defined by the Library of Congress
//! (<https://www.loc.gov/standards/marcxml/>).
//!
//! [`XmlWriter`] emits a `<collection>` in the MARC21 slim namespace, one
//! `<record>` per call. [`XmlReader`] pulls records one at a time from any
//! [`BufRead`] source and accepts both the default-namespace form
//! (`<record xmlns="...">`) and the prefixed form
//! (`<marc:record xmlns:marc="...">`).
//!
//! Data field contents are rebuilt with `0x1F` delimiters, so a record read
//! from MARCXML has exactly the same fields as the same record read from
//! binary MARC.
//!
//! # Examples
//!
//! ```
//! use marcodec::marcxml::{marcxml_to_record, record_to_marcxml};
//! use marcodec::{Record, Tag};
//!
//! # fn main() -> marcodec::Result<()> {
//! let mut record = Record::default();
//! record.append_field(Tag::new("001")?, "123");
//! record.append_field(Tag::new("245")?, "10\x1FaTitle & more");
//!
//! let xml = record_to_marcxml(&record)?;
//! assert!(xml.contains("Title &amp; more"));
//! let restored = marcxml_to_record(&xml)?;
//! assert_eq!(restored.fields(), record.fields());
//! # Ok(())
//! # }
//! ```

use crate::error::{MarcError, Result};
use crate::formats::{FormatReader, FormatWriter};
use crate::leader::{Leader, LEADER_LENGTH};
use crate::record::{Field, Record};
use crate::subfields::split_subfields;
use crate::tag::Tag;
use crate::validation::EmptySubfieldPolicy;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::fmt;
use std::io::{BufRead, Write};

/// The MARCXML namespace URI.
pub const MARCXML_NS: &str = "http://www.loc.gov/MARC21/slim";

const SUBFIELD_DELIMITER_CHAR: char = '\x1F';

fn xml_error(error: impl std::fmt::Display) -> MarcError {
    MarcError::ParseError(error.to_string())
}

/// Where the reader is in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    /// Nothing but the prolog has been read.
    Prolog,
    /// Inside `<collection>`, between records.
    InCollection,
    /// A bare `<record>` document was read, or `</collection>` was reached.
    Done,
}

/// Streaming MARCXML reader.
pub struct XmlReader<R: BufRead> {
    reader: quick_xml::Reader<R>,
    buf: Vec<u8>,
    namespace_prefix: String,
    policy: EmptySubfieldPolicy,
    state: ReaderState,
    records_read: usize,
}

impl<R: BufRead> XmlReader<R> {
    /// Create a reader over a MARCXML document.
    pub fn new(source: R) -> Self {
        XmlReader {
            reader: quick_xml::Reader::from_reader(source),
            buf: Vec::new(),
            namespace_prefix: String::new(),
            policy: EmptySubfieldPolicy::default(),
            state: ReaderState::Prolog,
            records_read: 0,
        }
    }

    /// Set how empty subfields, empty control fields and data fields without
    /// subfields are handled.
    #[must_use]
    pub fn with_empty_subfield_policy(mut self, policy: EmptySubfieldPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Read the next record.
    ///
    /// Returns `Ok(None)` at `</collection>` or the end of the document.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::ParseError`] for malformed XML, unexpected
    /// elements or an unsupported namespace, and [`MarcError::EmptySubfield`]
    /// for empty content under [`EmptySubfieldPolicy::Abort`].
    pub fn read_record(&mut self) -> Result<Option<Record>> {
        loop {
            if self.state == ReaderState::Done {
                return Ok(None);
            }
            match self.next_event()? {
                Event::Start(start) => {
                    self.register_namespaces(&start)?;
                    let name = self.local_name(start.name().as_ref())?;
                    match (self.state, name.as_str()) {
                        (ReaderState::Prolog, "collection") => self.state = ReaderState::InCollection,
                        (_, "record") => {
                            if self.state == ReaderState::Prolog {
                                self.state = ReaderState::Done;
                            }
                            return self.read_record_body().map(Some);
                        },
                        // Anything wrapping the collection is skipped.
                        (ReaderState::Prolog, _) => {},
                        (_, other) => {
                            return Err(self.unexpected(&format!("element <{other}> between records")));
                        },
                    }
                },
                Event::Empty(start) => {
                    self.register_namespaces(&start)?;
                    let name = self.local_name(start.name().as_ref())?;
                    if name == "record" {
                        return Err(self.unexpected("empty <record> element"));
                    }
                    if name == "collection" {
                        self.state = ReaderState::Done;
                    }
                },
                Event::End(end) => {
                    let name = self.local_name(end.name().as_ref())?;
                    if name == "collection" {
                        self.state = ReaderState::Done;
                    }
                },
                Event::Eof => {
                    self.state = ReaderState::Done;
                },
                Event::Text(text) if self.state != ReaderState::Prolog && !is_whitespace(&text) => {
                    return Err(self.unexpected("text between records"));
                },
                _ => {},
            }
        }
    }

    /// Number of records returned so far.
    #[must_use]
    pub fn records_read(&self) -> usize {
        self.records_read
    }

    /// Consume the reader and return the underlying source.
    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }

    /// Parse everything up to `</record>`.
    fn read_record_body(&mut self) -> Result<Record> {
        let mut leader: Option<Leader> = None;
        let mut fields: Vec<Field> = Vec::new();
        let mut seen_data_field = false;

        loop {
            match self.next_event()? {
                Event::Start(start) => {
                    let name = self.local_name(start.name().as_ref())?;
                    match name.as_str() {
                        "leader" => {
                            let text = self.read_text("leader")?;
                            leader = Some(parse_leader(&text)?);
                        },
                        "controlfield" => {
                            let tag = required_tag(&start)?;
                            if seen_data_field {
                                return Err(self.unexpected(&format!(
                                    "control field {tag} after a data field"
                                )));
                            }
                            let contents = self.read_text("controlfield")?;
                            fields.push(Field::new(tag, contents));
                        },
                        "datafield" => {
                            let mut contents = indicators(&start)?;
                            let tag = required_tag(&start)?;
                            self.read_subfields(&mut contents)?;
                            fields.push(Field::new(tag, contents));
                            seen_data_field = true;
                        },
                        other => return Err(self.unexpected(&format!("element <{other}> inside <record>"))),
                    }
                },
                Event::Empty(start) => {
                    let name = self.local_name(start.name().as_ref())?;
                    match name.as_str() {
                        "controlfield" => {
                            let tag = required_tag(&start)?;
                            if seen_data_field {
                                return Err(self.unexpected(&format!(
                                    "control field {tag} after a data field"
                                )));
                            }
                            fields.push(Field::new(tag, String::new()));
                        },
                        "datafield" => {
                            let contents = indicators(&start)?;
                            fields.push(Field::new(required_tag(&start)?, contents));
                            seen_data_field = true;
                        },
                        other => return Err(self.unexpected(&format!("empty element <{other}> inside <record>"))),
                    }
                },
                Event::End(_) => break,
                Event::Text(text) if !is_whitespace(&text) => {
                    return Err(self.unexpected("text directly inside <record>"));
                },
                Event::Eof => return Err(self.unexpected("end of document inside <record>")),
                _ => {},
            }
        }

        let Some(leader) = leader else {
            return Err(self.unexpected("record without a <leader>"));
        };
        let record = Record::from_parts(leader, fields);
        self.policy.check_record(&record)?;
        self.records_read += 1;
        Ok(record)
    }

    /// Append `0x1F code value` for every `<subfield>` up to `</datafield>`.
    fn read_subfields(&mut self, contents: &mut String) -> Result<()> {
        loop {
            match self.next_event()? {
                Event::Start(start) => {
                    let code = self.subfield_code(&start)?;
                    let value = self.read_text("subfield")?;
                    contents.push(SUBFIELD_DELIMITER_CHAR);
                    contents.push(code);
                    contents.push_str(&value);
                },
                Event::Empty(start) => {
                    let code = self.subfield_code(&start)?;
                    contents.push(SUBFIELD_DELIMITER_CHAR);
                    contents.push(code);
                },
                Event::End(_) => return Ok(()),
                Event::Text(text) if !is_whitespace(&text) => {
                    return Err(self.unexpected("text directly inside <datafield>"));
                },
                Event::Eof => return Err(self.unexpected("end of document inside <datafield>")),
                _ => {},
            }
        }
    }

    fn subfield_code(&self, start: &BytesStart<'_>) -> Result<char> {
        let name = self.local_name(start.name().as_ref())?;
        if name != "subfield" {
            return Err(self.unexpected(&format!("element <{name}> inside <datafield>")));
        }
        attribute(start, b"code")?
            .and_then(|code| code.chars().next())
            .ok_or_else(|| self.unexpected("<subfield> without a code"))
    }

    /// Collect character data up to the matching end tag.
    fn read_text(&mut self, element: &str) -> Result<String> {
        let mut text = String::new();
        loop {
            match self.next_event()? {
                Event::Text(chunk) => text.push_str(&chunk.unescape().map_err(xml_error)?),
                Event::CData(chunk) => text.push_str(&String::from_utf8_lossy(&chunk.into_inner())),
                Event::End(_) => return Ok(text),
                Event::Comment(_) | Event::PI(_) => {},
                Event::Eof => return Err(self.unexpected(&format!("end of document inside <{element}>"))),
                _ => return Err(self.unexpected(&format!("markup inside <{element}>"))),
            }
        }
    }

    fn next_event(&mut self) -> Result<Event<'static>> {
        self.buf.clear();
        match self.reader.read_event_into(&mut self.buf) {
            Ok(event) => Ok(event.into_owned()),
            Err(e) => Err(MarcError::ParseError(format!(
                "{e} at byte {}",
                self.reader.buffer_position()
            ))),
        }
    }

    /// Pick up `xmlns` declarations of a collection or record element.
    fn register_namespaces(&mut self, start: &BytesStart<'_>) -> Result<()> {
        for attr in start.attributes() {
            let attr = attr.map_err(xml_error)?;
            let key = attr.key.as_ref();
            if key == b"xmlns" {
                let uri = attr.unescape_value().map_err(xml_error)?;
                if uri != MARCXML_NS {
                    return Err(MarcError::ParseError(format!("unsupported namespace {uri:?}")));
                }
            } else if let Some(prefix) = key.strip_prefix(b"xmlns:") {
                let uri = attr.unescape_value().map_err(xml_error)?;
                if uri == MARCXML_NS {
                    self.namespace_prefix = format!("{}:", String::from_utf8_lossy(prefix));
                }
            }
        }
        Ok(())
    }

    /// Element name with the MARC namespace prefix removed.
    fn local_name(&self, qualified_name: &[u8]) -> Result<String> {
        let name = String::from_utf8_lossy(qualified_name);
        if !self.namespace_prefix.is_empty() {
            if let Some(local) = name.strip_prefix(self.namespace_prefix.as_str()) {
                return Ok(local.to_string());
            }
        }
        if name.contains(':') {
            return Err(MarcError::ParseError(format!(
                "element <{name}> uses an unsupported namespace prefix"
            )));
        }
        Ok(name.into_owned())
    }

    fn unexpected(&self, what: &str) -> MarcError {
        MarcError::ParseError(format!(
            "unexpected {what} at byte {}",
            self.reader.buffer_position()
        ))
    }
}

impl<R: BufRead> fmt::Debug for XmlReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmlReader")
            .field("namespace_prefix", &self.namespace_prefix)
            .field("policy", &self.policy)
            .field("state", &self.state)
            .field("records_read", &self.records_read)
            .finish_non_exhaustive()
    }
}

impl<R: BufRead> FormatReader for XmlReader<R> {
    fn read_record(&mut self) -> Result<Option<Record>> {
        XmlReader::read_record(self)
    }

    fn records_read(&self) -> Option<usize> {
        Some(self.records_read)
    }
}

impl<R: BufRead> Iterator for XmlReader<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}

fn is_whitespace(text: &BytesText<'_>) -> bool {
    text.iter().all(u8::is_ascii_whitespace)
}

fn attribute(start: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>> {
    for attr in start.attributes() {
        let attr = attr.map_err(xml_error)?;
        if attr.key.as_ref() == name {
            return Ok(Some(attr.unescape_value().map_err(xml_error)?.into_owned()));
        }
    }
    Ok(None)
}

fn required_tag(start: &BytesStart<'_>) -> Result<Tag> {
    let raw_tag = attribute(start, b"tag")?.ok_or_else(|| {
        MarcError::ParseError(format!(
            "<{}> without a tag attribute",
            String::from_utf8_lossy(start.name().as_ref())
        ))
    })?;
    Tag::new(&raw_tag)
}

/// The two indicator characters of a `<datafield>`; missing ones become blanks.
fn indicators(start: &BytesStart<'_>) -> Result<String> {
    let mut contents = String::with_capacity(2);
    for name in [b"ind1".as_slice(), b"ind2".as_slice()] {
        let indicator = attribute(start, name)?
            .and_then(|value| value.chars().next())
            .unwrap_or(' ');
        contents.push(indicator);
    }
    Ok(contents)
}

/// Parse a `<leader>` text; blanks in the record length and base address
/// positions are read as zeros.
fn parse_leader(text: &str) -> Result<Leader> {
    let mut bytes = text.as_bytes().to_vec();
    if bytes.len() != LEADER_LENGTH {
        return Err(MarcError::InvalidLeader(format!(
            "<leader> must have {LEADER_LENGTH} characters, found {:?}",
            text
        )));
    }
    for position in (0..5).chain(12..17) {
        if bytes[position] == b' ' {
            bytes[position] = b'0';
        }
    }
    Leader::from_bytes(&bytes)
}

/// Streaming MARCXML writer.
///
/// The `<collection>` element is opened before the first record and closed
/// by [`XmlWriter::finish`].
pub struct XmlWriter<W: Write> {
    writer: quick_xml::Writer<W>,
    collection_open: bool,
    finished: bool,
    records_written: usize,
}

impl<W: Write> XmlWriter<W> {
    /// Create a writer producing compact XML.
    pub fn new(destination: W) -> Self {
        XmlWriter {
            writer: quick_xml::Writer::new(destination),
            collection_open: false,
            finished: false,
            records_written: 0,
        }
    }

    /// Indent nested elements by `indent` spaces.
    #[must_use]
    pub fn with_indent(self, indent: usize) -> Self {
        let XmlWriter {
            writer,
            collection_open,
            finished,
            records_written,
        } = self;
        XmlWriter {
            writer: quick_xml::Writer::new_with_indent(writer.into_inner(), b' ', indent),
            collection_open,
            finished,
            records_written,
        }
    }

    /// Write one record.
    ///
    /// # Errors
    ///
    /// Returns an error if the writer was finished, the leader cannot be
    /// rendered or writing fails.
    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        if self.finished {
            return Err(MarcError::InvalidRecord(
                "Cannot write to a finished writer".to_string(),
            ));
        }
        self.open_collection()?;
        write_record_element(&mut self.writer, record, false)?;
        self.records_written += 1;
        Ok(())
    }

    /// Close the collection and flush.
    ///
    /// A writer that never wrote a record still produces an empty collection.
    ///
    /// # Errors
    ///
    /// Returns an error if writing or flushing fails.
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.open_collection()?;
        self.writer
            .write_event(Event::End(BytesEnd::new("collection")))
            .map_err(xml_error)?;
        self.writer.get_mut().write_all(b"\n")?;
        self.writer.get_mut().flush()?;
        self.collection_open = false;
        self.finished = true;
        Ok(())
    }

    /// Number of records written so far.
    #[must_use]
    pub fn records_written(&self) -> usize {
        self.records_written
    }

    /// The underlying destination.
    pub fn get_ref(&self) -> &W {
        self.writer.get_ref()
    }

    /// Mutable access to the underlying destination.
    pub fn get_mut(&mut self) -> &mut W {
        self.writer.get_mut()
    }

    fn open_collection(&mut self) -> Result<()> {
        if self.collection_open {
            return Ok(());
        }
        self.writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_error)?;
        let mut collection = BytesStart::new("collection");
        collection.push_attribute(("xmlns", MARCXML_NS));
        self.writer.write_event(Event::Start(collection)).map_err(xml_error)?;
        self.collection_open = true;
        Ok(())
    }

    /// Consume the writer and return the underlying destination.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write> fmt::Debug for XmlWriter<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmlWriter")
            .field("collection_open", &self.collection_open)
            .field("finished", &self.finished)
            .field("records_written", &self.records_written)
            .finish_non_exhaustive()
    }
}

impl<W: Write> FormatWriter for XmlWriter<W> {
    fn write_record(&mut self, record: &Record) -> Result<()> {
        XmlWriter::write_record(self, record)
    }

    fn finish(&mut self) -> Result<()> {
        XmlWriter::finish(self)
    }

    fn records_written(&self) -> Option<usize> {
        Some(self.records_written)
    }
}

fn write_record_element<W: Write>(
    writer: &mut quick_xml::Writer<W>,
    record: &Record,
    declare_namespace: bool,
) -> Result<()> {
    let mut record_start = BytesStart::new("record");
    if declare_namespace {
        record_start.push_attribute(("xmlns", MARCXML_NS));
    }
    writer.write_event(Event::Start(record_start)).map_err(xml_error)?;

    let leader = record.leader().to_string();
    write_text_element(writer, BytesStart::new("leader"), &leader)?;

    for field in record.iter() {
        let tag = field.tag();
        if field.is_control_field() {
            let mut start = BytesStart::new("controlfield");
            start.push_attribute(("tag", tag.as_str()));
            write_text_element(writer, start, field.contents())?;
            continue;
        }

        let mut indicators = field.contents().chars();
        let ind1 = indicators.next().unwrap_or(' ').to_string();
        let ind2 = indicators.next().unwrap_or(' ').to_string();
        let mut start = BytesStart::new("datafield");
        start.push_attribute(("tag", tag.as_str()));
        start.push_attribute(("ind1", ind1.as_str()));
        start.push_attribute(("ind2", ind2.as_str()));
        writer.write_event(Event::Start(start)).map_err(xml_error)?;
        for (code, value) in split_subfields(field.contents()) {
            let mut subfield = BytesStart::new("subfield");
            let code = code.to_string();
            subfield.push_attribute(("code", code.as_str()));
            write_text_element(writer, subfield, value)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new("datafield")))
            .map_err(xml_error)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("record")))
        .map_err(xml_error)?;
    Ok(())
}

fn write_text_element<W: Write>(
    writer: &mut quick_xml::Writer<W>,
    start: BytesStart<'_>,
    text: &str,
) -> Result<()> {
    // Empty values are written as empty elements so indentation cannot
    // leak whitespace into them.
    if text.is_empty() {
        return writer.write_event(Event::Empty(start)).map_err(xml_error);
    }
    let end = start.to_end().into_owned();
    writer.write_event(Event::Start(start)).map_err(xml_error)?;
    writer.write_event(Event::Text(BytesText::new(text))).map_err(xml_error)?;
    writer.write_event(Event::End(end)).map_err(xml_error)?;
    Ok(())
}

/// Serialize one record as a standalone `<record>` document.
///
/// # Errors
///
/// Returns an error if the leader cannot be rendered.
pub fn record_to_marcxml(record: &Record) -> Result<String> {
    let mut writer = quick_xml::Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_error)?;
    write_record_element(&mut writer, record, true)?;
    String::from_utf8(writer.into_inner()).map_err(xml_error)
}

/// Parse the first record of a MARCXML document.
///
/// # Errors
///
/// Returns an error if the document is malformed or contains no record.
pub fn marcxml_to_record(xml: &str) -> Result<Record> {
    XmlReader::new(xml.as_bytes())
        .read_record()?
        .ok_or_else(|| MarcError::ParseError("no <record> element found".to_string()))
}

/// Parse every record of a MARCXML document.
///
/// # Errors
///
/// Returns an error if the document is malformed.
pub fn marcxml_to_records(xml: &str) -> Result<Vec<Record>> {
    XmlReader::new(xml.as_bytes()).collect()
}
