//! Reader and writer traits shared by the binary and MARC-XML codecs.
//!
//! Code that only moves records around can be written once against these
//! traits and work with either serialization:
//!
//! ```
//! use marcodec::formats::{FormatReader, FormatWriter};
//!
//! fn copy_records<R: FormatReader, W: FormatWriter>(
//!     reader: &mut R,
//!     writer: &mut W,
//! ) -> marcodec::Result<usize> {
//!     let mut copied = 0;
//!     while let Some(record) = reader.read_record()? {
//!         writer.write_record(&record)?;
//!         copied += 1;
//!     }
//!     writer.finish()?;
//!     Ok(copied)
//! }
//! ```

use crate::error::Result;
use crate::record::Record;

/// A source of logical MARC records.
pub trait FormatReader: std::fmt::Debug {
    /// Read the next logical record.
    ///
    /// Returns `Ok(None)` once the source is exhausted. Multi-part binary
    /// records are returned merged.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed input or I/O failures.
    fn read_record(&mut self) -> Result<Option<Record>>;

    /// Read every remaining record.
    ///
    /// # Errors
    ///
    /// Stops at the first record that fails to read and returns its error.
    fn read_all(&mut self) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        while let Some(record) = self.read_record()? {
            records.push(record);
        }
        Ok(records)
    }

    /// Number of logical records returned so far, if tracked.
    fn records_read(&self) -> Option<usize> {
        None
    }
}

/// A sink for MARC records.
///
/// [`finish`](Self::finish) must be called once all records are written;
/// the XML writer only closes its collection there.
pub trait FormatWriter: std::fmt::Debug {
    /// Write one record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be encoded or writing fails.
    fn write_record(&mut self, record: &Record) -> Result<()>;

    /// Write several records in order.
    ///
    /// # Errors
    ///
    /// Stops at the first record that fails and returns its error.
    fn write_batch(&mut self, records: &[Record]) -> Result<()> {
        records
            .iter()
            .try_for_each(|record| self.write_record(record))
    }

    /// Finalize the output and flush it.
    ///
    /// # Errors
    ///
    /// Returns an error if the trailing markup cannot be written or the
    /// flush fails.
    fn finish(&mut self) -> Result<()>;

    /// Number of logical records written so far, if tracked.
    fn records_written(&self) -> Option<usize> {
        None
    }
}

/// Iterator access for any [`FormatReader`].
pub trait FormatReaderExt: FormatReader {
    /// Borrow the reader as an iterator of `Result<Record>`.
    fn records(&mut self) -> RecordIterator<'_, Self>
    where
        Self: Sized,
    {
        RecordIterator { reader: self }
    }
}

impl<T: FormatReader> FormatReaderExt for T {}

/// Iterator returned by [`FormatReaderExt::records`].
#[derive(Debug)]
pub struct RecordIterator<'a, R: FormatReader> {
    reader: &'a mut R,
}

impl<R: FormatReader> Iterator for RecordIterator<'_, R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.read_record().transpose()
    }
}
