//! Property tests for tag ordering, subfield serialization and codec round trips.

mod common;

use common::{book, tag};
use marcodec::marcxml::marcxml_to_record;
use marcodec::{record_to_binary, record_to_marcxml, BinaryReader, Field, Record, Subfield, Subfields, Tag};
use proptest::prelude::*;
use std::io::Cursor;

fn subfield_strategy(value_pattern: &'static str) -> impl Strategy<Value = Subfield> {
    ("[a-z0-9]", value_pattern).prop_map(|(code, value)| {
        Subfield::new(code.chars().next().unwrap_or('a'), value)
    })
}

fn data_field_strategy() -> impl Strategy<Value = Field> {
    (
        10u32..1000,
        "[ 0-9]",
        "[ 0-9]",
        prop::collection::vec(subfield_strategy("[A-Za-z0-9 .,:;/&<>'\"éü-]{1,24}"), 1..5),
    )
        .prop_map(|(number, ind1, ind2, subfields)| {
            let subfields: Subfields = subfields.into_iter().collect();
            Field::from_subfields(
                tag(&format!("{number:03}")),
                ind1.chars().next().unwrap_or(' '),
                ind2.chars().next().unwrap_or(' '),
                &subfields,
            )
        })
}

fn record_strategy() -> impl Strategy<Value = Record> {
    (
        "[A-Za-z0-9]{1,12}",
        prop::collection::vec("[0-9A-Za-z ]{1,30}", 0..3),
        prop::collection::vec(data_field_strategy(), 0..12),
    )
        .prop_map(|(control_number, control_fields, data_fields)| {
            let mut record = book(&control_number);
            for (n, contents) in control_fields.into_iter().enumerate() {
                record.append_field(tag(&format!("00{}", n + 5)), contents);
            }
            for field in data_fields {
                record.append_field(field.tag(), field.contents());
            }
            record
        })
}

proptest! {
    #[test]
    fn prop_tag_order_matches_string_order(t1 in "[0-9A-Z]{3}", t2 in "[0-9A-Z]{3}") {
        let (tag1, tag2) = (Tag::new(&t1).unwrap(), Tag::new(&t2).unwrap());
        prop_assert_eq!(tag1.cmp(&tag2), t1.cmp(&t2));
        prop_assert_eq!(tag1 == tag2, t1 == t2);
        prop_assert_eq!(tag1.as_str(), t1.as_str());
    }

    #[test]
    fn prop_subfields_serialization_is_idempotent(
        subfields in prop::collection::vec(subfield_strategy("[A-Za-z0-9 .é]{0,12}"), 0..6),
    ) {
        let subfields: Subfields = subfields.into_iter().collect();
        let serialized = subfields.to_string();
        // A lone empty subfield is too short to be recognized in field contents.
        prop_assume!(serialized.is_empty() || serialized.len() >= 3);

        let reparsed = Subfields::parse(&format!("  {serialized}"));
        prop_assert_eq!(reparsed.to_string(), serialized);
        prop_assert_eq!(reparsed, subfields);
    }

    #[test]
    fn prop_binary_round_trip(record in record_strategy()) {
        let bytes = record_to_binary(&record).unwrap();
        let decoded = BinaryReader::new(Cursor::new(bytes.clone())).read_record().unwrap().unwrap();
        prop_assert_eq!(decoded.fields(), record.fields());
        prop_assert_eq!(record_to_binary(&decoded).unwrap(), bytes);
    }

    #[test]
    fn prop_xml_round_trip(record in record_strategy()) {
        let xml = record_to_marcxml(&record).unwrap();
        prop_assert_eq!(marcxml_to_record(&xml).unwrap(), record);
    }

    #[test]
    fn prop_binary_and_xml_agree(record in record_strategy()) {
        let bytes = record_to_binary(&record).unwrap();
        let from_binary = BinaryReader::new(Cursor::new(bytes)).read_record().unwrap().unwrap();
        let from_xml = marcxml_to_record(&record_to_marcxml(&from_binary).unwrap()).unwrap();
        prop_assert_eq!(from_xml, from_binary);
    }
}
