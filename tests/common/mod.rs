//! Record builders shared by the integration tests.

#![allow(dead_code)]

use marcodec::{BibliographicLevel, Record, Subfields, Tag, TypeOfRecord};

pub fn tag(raw: &str) -> Tag {
    Tag::new(raw).expect("valid tag")
}

pub fn subfields(pairs: &[(char, &str)]) -> Subfields {
    let mut subfields = Subfields::new();
    for (code, value) in pairs {
        subfields.add_subfield(*code, *value);
    }
    subfields
}

/// A book record with the given control number and nothing else.
pub fn book(control_number: &str) -> Record {
    Record::with_type(
        TypeOfRecord::LanguageMaterial,
        BibliographicLevel::MonographOrItem,
        control_number,
    )
}

/// A small but realistic bibliographic record.
pub fn create_realistic_record() -> Record {
    let mut record = book("ocm01234567");
    record.insert_field(tag("005"), "20240101120000.0");
    record.insert_field(tag("008"), format!("{:35}eng d", "850101s1925    nyu"));
    record.insert_field_with_subfields(tag("020"), &subfields(&[('a', "9780743273565")]), ' ', ' ');
    record.insert_field_with_subfields(tag("100"), &subfields(&[('a', "Fitzgerald, F. Scott")]), '1', ' ');
    record.insert_field_with_subfields(
        tag("245"),
        &subfields(&[('a', "The great Gatsby /"), ('c', "F. Scott Fitzgerald.")]),
        '1',
        '4',
    );
    record.insert_field_with_subfields(tag("650"), &subfields(&[('a', "Rich people"), ('z', "New York")]), ' ', '0');
    record.insert_field_with_subfields(tag("650"), &subfields(&[('a', "Love stories")]), ' ', '0');
    record.insert_field_with_subfields(tag("700"), &subfields(&[('a', "Perkins, Maxwell")]), '1', ' ');
    record
}

/// A record with two local blocks of three and two fields.
pub fn record_with_local_blocks() -> Record {
    let mut record = create_realistic_record();
    for contents in [
        "  \x1F0000 \x1FaDE-21",
        "  \x1F0852  \x1FaDE-21",
        "  \x1F0866 0\x1Fa1990-",
        "  \x1F0000 \x1FaDE-Tue1",
        "  \x1F0852  \x1FaDE-Tue1",
    ] {
        record.append_field(tag("LOK"), contents);
    }
    record
}

/// A record that needs several physical records in binary form.
pub fn oversized_record(field_count: usize) -> Record {
    let mut record = book("big-1");
    for n in 0..field_count {
        let value = format!("{n:05} {}", "x".repeat(9_000));
        record.append_field(tag("500"), format!("  \x1Fa{value}"));
    }
    record
}
