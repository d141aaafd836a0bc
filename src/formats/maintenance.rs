//! Whole-file operations: locked appends, de-duplication, validation and
//! record offset indexing.

use super::files::{create_writer, open_reader, MarcFileWriter};
use super::{FileType, FormatWriter, WriterMode};
use crate::error::{MarcError, Result};
use crate::reader::BinaryReader;
use crate::record::Record;
use crate::validation::EmptySubfieldPolicy;
use crate::writer::BinaryWriter;
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A writer whose output is a single file that can be locked.
pub trait LockableWriter: FormatWriter {
    /// The file the writer ends up writing to.
    fn output_file(&self) -> &File;

    /// Flush pending output and move the file cursor to the end.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing or seeking fails.
    fn seek_to_end(&mut self) -> Result<u64>;

    /// Push everything written so far into the file.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing fails.
    fn flush_output(&mut self) -> Result<()>;
}

impl LockableWriter for BinaryWriter<File> {
    fn output_file(&self) -> &File {
        self.get_ref()
    }

    fn seek_to_end(&mut self) -> Result<u64> {
        Ok(self.get_mut().seek(SeekFrom::End(0))?)
    }

    fn flush_output(&mut self) -> Result<()> {
        self.flush()
    }
}

impl LockableWriter for BinaryWriter<BufWriter<File>> {
    fn output_file(&self) -> &File {
        self.get_ref().get_ref()
    }

    fn seek_to_end(&mut self) -> Result<u64> {
        // BufWriter flushes before it seeks.
        Ok(self.get_mut().seek(SeekFrom::End(0))?)
    }

    fn flush_output(&mut self) -> Result<()> {
        self.flush()
    }
}

impl LockableWriter for MarcFileWriter {
    fn output_file(&self) -> &File {
        self.file()
    }

    fn seek_to_end(&mut self) -> Result<u64> {
        match self {
            MarcFileWriter::Binary(writer) => Ok(writer.get_mut().seek(SeekFrom::End(0))?),
            // A second prolog and <collection> would make the document malformed.
            MarcFileWriter::Xml(_) => Err(MarcError::UnsupportedMode(
                "appending to MARC-XML files is not supported".to_string(),
            )),
        }
    }

    fn flush_output(&mut self) -> Result<()> {
        match self {
            MarcFileWriter::Binary(writer) => writer.flush(),
            MarcFileWriter::Xml(writer) => Ok(writer.get_mut().flush()?),
        }
    }
}

/// Append `record` while holding an exclusive lock on the output file.
///
/// Several processes may share one output file this way: each record lands
/// whole at the current end of the file. The lock is released before
/// returning, also when writing fails.
///
/// # Errors
///
/// Returns an error if the lock cannot be taken or released, or if writing
/// the record fails.
pub fn file_locked_compose_and_write_record<W>(writer: &mut W, record: &Record) -> Result<()>
where
    W: LockableWriter + ?Sized,
{
    let file = writer.output_file().try_clone()?;
    fs2::FileExt::lock_exclusive(&file)?;

    let written = append_record(writer, record);
    let unlocked = fs2::FileExt::unlock(&file);

    written?;
    unlocked?;
    Ok(())
}

fn append_record<W: LockableWriter + ?Sized>(writer: &mut W, record: &Record) -> Result<()> {
    writer.seek_to_end()?;
    writer.write_record(record)?;
    writer.flush_output()
}

/// Rewrite `path` keeping only the first record for every control number.
///
/// The file keeps its serialization. Neighbouring records with the same
/// control number count as duplicates here instead of being merged; parts
/// joined by the continuation flag still form one record. Returns the number
/// of records dropped.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the rewritten file cannot
/// be put in its place. The original file is left untouched on error.
pub fn remove_duplicate_control_number_records(path: impl AsRef<Path>) -> Result<usize> {
    let path = path.as_ref();
    let mut reader = open_reader(path, FileType::Auto)?.with_control_number_merging(false);
    let temp_path = temporary_sibling(path);
    let mut writer = create_writer(&temp_path, reader.file_type(), WriterMode::Overwrite)?;

    let mut seen = HashSet::new();
    let mut dropped = 0;
    let mut copy_unique = || -> Result<()> {
        while let Some(record) = reader.read_record()? {
            let control_number = record.control_number().unwrap_or_default().to_string();
            if seen.insert(control_number) {
                writer.write_record(&record)?;
            } else {
                dropped += 1;
            }
        }
        writer.finish()
    };
    let copied = copy_unique();
    drop(writer);
    drop(reader);

    if let Err(e) = copied {
        if let Err(cleanup) = fs::remove_file(&temp_path) {
            log::warn!("failed to remove {}: {cleanup}", temp_path.display());
        }
        return Err(e);
    }
    fs::rename(&temp_path, path)?;
    log::debug!("dropped {dropped} duplicate records from {}", path.display());
    Ok(dropped)
}

fn temporary_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{}.tmp", std::process::id()))
}

/// Check that every record in `path` can be read and passes
/// [`Record::validate`] with [`EmptySubfieldPolicy::Abort`].
///
/// # Errors
///
/// Returns a description of the first problem found.
pub fn is_valid_marc_file(path: impl AsRef<Path>, file_type: FileType) -> std::result::Result<(), String> {
    let mut reader = open_reader(path, file_type).map_err(|e| e.to_string())?;
    while let Some(record) = reader.read_record().map_err(|e| e.to_string())? {
        record
            .validate(EmptySubfieldPolicy::Abort)
            .map_err(|e| e.to_string())?;
    }
    Ok(())
}

/// Map the control number of every remaining record to its byte offset.
///
/// Offsets are relative to where `reader` started and can be passed to
/// [`BinaryReader::seek`]. The first occurrence of a control number wins;
/// records without one are skipped.
///
/// # Errors
///
/// Returns an error if a record cannot be read.
pub fn collect_record_offsets<R: Read>(reader: &mut BinaryReader<R>) -> Result<HashMap<String, u64>> {
    let mut offsets = HashMap::new();
    loop {
        let offset = reader.tell();
        let Some(record) = reader.read_record()? else {
            break;
        };
        if let Some(control_number) = record.control_number() {
            offsets.entry(control_number.to_string()).or_insert(offset);
        }
    }
    Ok(offsets)
}
