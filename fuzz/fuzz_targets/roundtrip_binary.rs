#![no_main]

use libfuzzer_sys::fuzz_target;
use marcodec::{record_to_binary, BinaryReader, EmptySubfieldPolicy, FormatReader};
use std::io::Cursor;

// Whatever decodes and re-encodes must decode to the same fields again.
fuzz_target!(|data: &[u8]| {
    let Ok(records) = BinaryReader::new(Cursor::new(data))
        .with_empty_subfield_policy(EmptySubfieldPolicy::Warn)
        .read_all()
    else {
        return;
    };
    for record in records {
        let Ok(bytes) = record_to_binary(&record) else {
            continue;
        };
        let decoded = BinaryReader::new(Cursor::new(bytes))
            .read_record()
            .expect("re-encoded record decodes")
            .expect("re-encoded record is present");
        assert_eq!(decoded.fields(), record.fields());
    }
});
