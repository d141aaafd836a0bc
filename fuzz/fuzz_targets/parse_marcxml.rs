#![no_main]

use libfuzzer_sys::fuzz_target;
use marcodec::{EmptySubfieldPolicy, XmlReader};

fuzz_target!(|data: &[u8]| {
    let mut reader = XmlReader::new(data).with_empty_subfield_policy(EmptySubfieldPolicy::Warn);
    while let Ok(Some(record)) = reader.read_record() {
        let _ = record.control_number();
    }
});
