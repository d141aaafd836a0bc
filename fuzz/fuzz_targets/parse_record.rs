#![no_main]

use libfuzzer_sys::fuzz_target;
use marcodec::{BinaryReader, EmptySubfieldPolicy};
use std::io::Cursor;

// Arbitrary bytes must produce records or errors, never panics.
fuzz_target!(|data: &[u8]| {
    let mut reader =
        BinaryReader::new(Cursor::new(data)).with_empty_subfield_policy(EmptySubfieldPolicy::Warn);
    while let Ok(Some(record)) = reader.read_record() {
        let _ = record.find_all_local_data_blocks();
        let _ = record.main_title();
    }
});
