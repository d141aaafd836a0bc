//! File factory and file utility tests

mod common;

use common::{book, create_realistic_record, oversized_record};
use marcodec::formats::{
    collect_record_offsets, file_locked_compose_and_write_record, is_valid_marc_file,
    remove_duplicate_control_number_records, FormatReaderExt,
};
use marcodec::{
    create_writer, open_reader, BinaryReader, FileType, FormatReader, FormatWriter, MarcError, WriterMode,
};
use std::fs::File;
use std::io::BufReader;
use tempfile::tempdir;

#[test]
fn test_convert_binary_file_to_xml_and_back() {
    let dir = tempdir().unwrap();
    let binary = dir.path().join("input.mrc");
    let xml = dir.path().join("converted.XML");
    let records = vec![create_realistic_record(), oversized_record(15), book("last")];

    let mut writer = create_writer(&binary, FileType::Auto, WriterMode::Overwrite).unwrap();
    writer.write_batch(&records).unwrap();
    writer.finish().unwrap();

    let mut reader = open_reader(&binary, FileType::Auto).unwrap();
    let mut writer = create_writer(&xml, FileType::Auto, WriterMode::Overwrite).unwrap();
    for record in reader.records() {
        writer.write_record(&record.unwrap()).unwrap();
    }
    writer.finish().unwrap();
    assert_eq!(writer.records_written(), Some(3));
    drop(writer);

    let converted = open_reader(&xml, FileType::Auto).unwrap().read_all().unwrap();
    assert_eq!(converted.len(), 3);
    for (original, converted) in records.iter().zip(&converted) {
        assert_eq!(original.fields(), converted.fields());
    }
    assert!(is_valid_marc_file(&xml, FileType::Auto).is_ok());
}

#[test]
fn test_unknown_extension_needs_explicit_type() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("records.bin");

    assert!(matches!(
        create_writer(&path, FileType::Auto, WriterMode::Overwrite),
        Err(MarcError::UnknownFileType(_))
    ));
    let mut writer = create_writer(&path, FileType::Binary, WriterMode::Overwrite).unwrap();
    writer.write_record(&book("x")).unwrap();
    writer.finish().unwrap();

    assert!(open_reader(&path, FileType::Auto).is_err());
    assert_eq!(open_reader(&path, FileType::Binary).unwrap().read_all().unwrap().len(), 1);
}

#[test]
fn test_locked_append_and_deduplication() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("shared.mrc");

    let mut first = create_writer(&path, FileType::Binary, WriterMode::Append).unwrap();
    let mut second = create_writer(&path, FileType::Binary, WriterMode::Append).unwrap();
    for control_number in ["1", "2", "3"] {
        file_locked_compose_and_write_record(&mut first, &book(control_number)).unwrap();
        file_locked_compose_and_write_record(&mut second, &book(control_number)).unwrap();
    }
    drop((first, second));

    // Equal control numbers in neighbouring records are merged on reading.
    let merged = open_reader(&path, FileType::Auto).unwrap().read_all().unwrap();
    assert_eq!(merged.len(), 3);

    let mut writer = create_writer(&path, FileType::Binary, WriterMode::Append).unwrap();
    file_locked_compose_and_write_record(&mut writer, &book("1")).unwrap();
    drop(writer);
    // Seven physical records, one per control number survives.
    assert_eq!(remove_duplicate_control_number_records(&path).unwrap(), 4);

    let mut reader = BinaryReader::new(BufReader::new(File::open(&path).unwrap()));
    let offsets = collect_record_offsets(&mut reader).unwrap();
    assert_eq!(offsets.len(), 3);
    assert_eq!(offsets["1"], 0);
}
