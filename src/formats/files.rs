//! Readers and writers bound to files on disk.

use super::{FileType, FormatReader, FormatWriter, WriterMode};
use crate::error::{MarcError, Result};
use crate::marcxml::{XmlReader, XmlWriter};
use crate::reader::BinaryReader;
use crate::record::Record;
use crate::validation::EmptySubfieldPolicy;
use crate::writer::BinaryWriter;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// A buffered file reader for either serialization.
#[derive(Debug)]
pub enum MarcFileReader {
    /// ISO 2709 input
    Binary(BinaryReader<BufReader<File>>),
    /// MARC-XML input
    Xml(XmlReader<BufReader<File>>),
}

impl MarcFileReader {
    /// The concrete type being read.
    #[must_use]
    pub fn file_type(&self) -> FileType {
        match self {
            MarcFileReader::Binary(_) => FileType::Binary,
            MarcFileReader::Xml(_) => FileType::Xml,
        }
    }

    /// Set how empty subfields and control fields are handled.
    #[must_use]
    pub fn with_empty_subfield_policy(self, policy: EmptySubfieldPolicy) -> Self {
        match self {
            MarcFileReader::Binary(reader) => {
                MarcFileReader::Binary(reader.with_empty_subfield_policy(policy))
            },
            MarcFileReader::Xml(reader) => MarcFileReader::Xml(reader.with_empty_subfield_policy(policy)),
        }
    }

    /// See [`BinaryReader::with_control_number_merging`]. MARC-XML input is
    /// never merged, so this only affects binary files.
    #[must_use]
    pub fn with_control_number_merging(self, enabled: bool) -> Self {
        match self {
            MarcFileReader::Binary(reader) => {
                MarcFileReader::Binary(reader.with_control_number_merging(enabled))
            },
            xml @ MarcFileReader::Xml(_) => xml,
        }
    }

    /// Read the next logical record.
    ///
    /// # Errors
    ///
    /// See [`BinaryReader::read_record`] and [`XmlReader::read_record`].
    pub fn read_record(&mut self) -> Result<Option<Record>> {
        match self {
            MarcFileReader::Binary(reader) => reader.read_record(),
            MarcFileReader::Xml(reader) => reader.read_record(),
        }
    }
}

impl FormatReader for MarcFileReader {
    fn read_record(&mut self) -> Result<Option<Record>> {
        MarcFileReader::read_record(self)
    }

    fn records_read(&self) -> Option<usize> {
        Some(match self {
            MarcFileReader::Binary(reader) => reader.records_read(),
            MarcFileReader::Xml(reader) => reader.records_read(),
        })
    }
}

impl Iterator for MarcFileReader {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}

/// A buffered file writer for either serialization.
#[derive(Debug)]
pub enum MarcFileWriter {
    /// ISO 2709 output
    Binary(BinaryWriter<BufWriter<File>>),
    /// MARC-XML output
    Xml(XmlWriter<BufWriter<File>>),
}

impl MarcFileWriter {
    /// The concrete type being written.
    #[must_use]
    pub fn file_type(&self) -> FileType {
        match self {
            MarcFileWriter::Binary(_) => FileType::Binary,
            MarcFileWriter::Xml(_) => FileType::Xml,
        }
    }

    /// The file records are written to.
    #[must_use]
    pub fn file(&self) -> &File {
        match self {
            MarcFileWriter::Binary(writer) => writer.get_ref().get_ref(),
            MarcFileWriter::Xml(writer) => writer.get_ref().get_ref(),
        }
    }

    /// Write one record.
    ///
    /// # Errors
    ///
    /// See [`BinaryWriter::write_record`] and [`XmlWriter::write_record`].
    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        match self {
            MarcFileWriter::Binary(writer) => writer.write_record(record),
            MarcFileWriter::Xml(writer) => writer.write_record(record),
        }
    }

    /// Finish the output and flush it to the file.
    ///
    /// # Errors
    ///
    /// Returns an error if writing or flushing fails.
    pub fn finish(&mut self) -> Result<()> {
        match self {
            MarcFileWriter::Binary(writer) => writer.finish(),
            MarcFileWriter::Xml(writer) => writer.finish(),
        }
    }
}

impl FormatWriter for MarcFileWriter {
    fn write_record(&mut self, record: &Record) -> Result<()> {
        MarcFileWriter::write_record(self, record)
    }

    fn finish(&mut self) -> Result<()> {
        MarcFileWriter::finish(self)
    }

    fn records_written(&self) -> Option<usize> {
        Some(match self {
            MarcFileWriter::Binary(writer) => writer.records_written(),
            MarcFileWriter::Xml(writer) => writer.records_written(),
        })
    }
}

/// Open `path` for reading.
///
/// [`FileType::Auto`] derives the type from the file name.
///
/// # Errors
///
/// Returns [`MarcError::UnknownFileType`] if the type cannot be derived and
/// [`MarcError::IoError`] if the file cannot be opened.
pub fn open_reader(path: impl AsRef<Path>, file_type: FileType) -> Result<MarcFileReader> {
    let path = path.as_ref();
    let file_type = file_type.resolve(path)?;
    let input = BufReader::new(File::open(path)?);
    log::debug!("reading {} as {file_type}", path.display());
    Ok(match file_type {
        FileType::Xml => MarcFileReader::Xml(XmlReader::new(input)),
        _ => MarcFileReader::Binary(BinaryReader::new(input)),
    })
}

/// Create a writer for `path`.
///
/// [`WriterMode::Append`] keeps existing content and adds records after it.
/// Appending is only supported for binary files, since a MARC-XML document
/// has a single closing `collection` element.
///
/// # Errors
///
/// Returns [`MarcError::UnknownFileType`] if the type cannot be derived,
/// [`MarcError::UnsupportedMode`] when appending to MARC-XML, and
/// [`MarcError::IoError`] if the file cannot be opened.
pub fn create_writer(
    path: impl AsRef<Path>,
    file_type: FileType,
    mode: WriterMode,
) -> Result<MarcFileWriter> {
    let path = path.as_ref();
    let file_type = file_type.resolve(path)?;
    if file_type == FileType::Xml && mode == WriterMode::Append {
        return Err(MarcError::UnsupportedMode(format!(
            "can't append to MARC-XML file \"{}\"",
            path.display()
        )));
    }

    let mut options = OpenOptions::new();
    match mode {
        WriterMode::Overwrite => options.write(true).create(true).truncate(true),
        WriterMode::Append => options.append(true).create(true),
    };
    let output = BufWriter::new(options.open(path)?);
    Ok(match file_type {
        FileType::Xml => MarcFileWriter::Xml(XmlWriter::new(output).with_indent(2)),
        _ => MarcFileWriter::Binary(BinaryWriter::new(output)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::Tag;
    use tempfile::tempdir;

    fn record(control_number: &str, title: &str) -> Record {
        let mut record = Record::default();
        record.append_field(Tag::new("001").unwrap(), control_number);
        record.append_field(Tag::new("245").unwrap(), format!("10\x1Fa{title}"));
        record
    }

    #[test]
    fn test_binary_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.mrc");

        let mut writer = create_writer(&path, FileType::Auto, WriterMode::Overwrite).unwrap();
        assert_eq!(writer.file_type(), FileType::Binary);
        writer.write_record(&record("1", "One")).unwrap();
        writer.write_record(&record("2", "Two")).unwrap();
        writer.finish().unwrap();
        assert_eq!(writer.records_written(), Some(2));
        drop(writer);

        let mut reader = open_reader(&path, FileType::Auto).unwrap();
        assert_eq!(reader.file_type(), FileType::Binary);
        let records = reader.read_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].fields(), record("1", "One").fields());
        assert_eq!(records[1].fields(), record("2", "Two").fields());
        assert_eq!(records[1].leader().record_length, 60);
        assert_eq!(FormatReader::records_read(&reader), Some(2));
    }

    #[test]
    fn test_xml_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.xml");

        let mut writer = create_writer(&path, FileType::Auto, WriterMode::Overwrite).unwrap();
        assert_eq!(writer.file_type(), FileType::Xml);
        writer.write_record(&record("1", "One")).unwrap();
        writer.finish().unwrap();
        drop(writer);

        let records: Vec<Record> = open_reader(&path, FileType::Auto)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].fields(), record("1", "One").fields());
    }

    #[test]
    fn test_append_mode_keeps_existing_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.mrc");

        for (control_number, mode) in [("1", WriterMode::Overwrite), ("2", WriterMode::Append)] {
            let mut writer = create_writer(&path, FileType::Binary, mode).unwrap();
            writer.write_record(&record(control_number, "Title")).unwrap();
            writer.finish().unwrap();
        }

        let records = open_reader(&path, FileType::Binary).unwrap().read_all().unwrap();
        let numbers: Vec<_> = records.iter().map(|r| r.control_number().unwrap()).collect();
        assert_eq!(numbers, ["1", "2"]);
    }

    #[test]
    fn test_explicit_type_and_rejected_modes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("records.dat");

        assert!(matches!(
            create_writer(&path, FileType::Auto, WriterMode::Overwrite),
            Err(MarcError::UnknownFileType(_))
        ));
        assert!(matches!(
            create_writer(&path, FileType::Xml, WriterMode::Append),
            Err(MarcError::UnsupportedMode(_))
        ));

        let mut writer = create_writer(&path, FileType::Binary, WriterMode::Overwrite).unwrap();
        writer.write_record(&record("9", "Nine")).unwrap();
        writer.finish().unwrap();
        let reader = open_reader(&path, FileType::Binary).unwrap();
        assert_eq!(reader.file_type(), FileType::Binary);
    }

    #[test]
    fn test_missing_input_file() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            open_reader(dir.path().join("missing.mrc"), FileType::Auto),
            Err(MarcError::IoError(_))
        ));
    }
}
