//! Repeatability of MARC 21 bibliographic fields.
//!
//! See <https://www.loc.gov/marc/bibliographic/> for the authoritative list.
//! The table is immutable and built once on first use.

use crate::tag::Tag;
use lazy_static::lazy_static;
use std::collections::HashMap;

const NON_REPEATABLE_TAGS: &[&str] = &[
    "001", "003", "005", "008", "010", "018", "036", "038", "040", "042", "043", "044", "045",
    "066", "100", "110", "111", "130", "240", "243", "245", "254", "256", "263", "306", "310",
    "357", "384", "514", "652", "841", "842",
];

const REPEATABLE_TAGS: &[&str] = &[
    "007", "013", "015", "016", "017", "020", "022", "024", "025", "026", "027", "028", "030",
    "031", "032", "033", "034", "035", "037", "041", "046", "047", "048", "050", "051", "052",
    "055", "060", "061", "070", "071", "072", "074", "080", "082", "083", "084", "085", "086",
    "088", "186", "210", "222", "242", "246", "247", "250", "255", "257", "258", "260", "264",
    "270", "300", "307", "321", "336", "337", "338", "340", "342", "343", "344", "345", "346",
    "347", "348", "351", "352", "355", "362", "363", "365", "366", "370", "377", "380", "381",
    "382", "383", "385", "386", "388", "490", "500", "501", "502", "504", "505", "506", "507",
    "508", "510", "511", "513", "515", "516", "518", "520", "521", "522", "524", "525", "526",
    "530", "533", "534", "535", "536", "538", "540", "541", "542", "545", "546", "547", "550",
    "552", "555", "556", "561", "562", "563", "565", "567", "580", "581", "583", "584", "585",
    "586", "588", "600", "601", "610", "611", "630", "647", "648", "650", "651", "653", "654",
    "655", "657", "658", "662", "700", "710", "711", "720", "730", "740", "751", "752", "754",
    "758", "760", "762", "765", "767", "770", "772", "773", "774", "775", "776", "777", "780",
    "785", "786", "787", "800", "810", "811", "830", "843", "844", "845", "850", "852", "853",
    "854", "855", "856", "863", "864", "865", "866", "867", "868", "876", "877", "878", "880",
    "882", "883", "884", "885", "886", "887",
];

lazy_static! {
    static ref TAG_TO_REPEATABLE: HashMap<Tag, bool> = {
        let non_repeatable = NON_REPEATABLE_TAGS.iter().map(|t| (*t, false));
        let repeatable = REPEATABLE_TAGS.iter().map(|t| (*t, true));
        non_repeatable
            .chain(repeatable)
            .filter_map(|(raw_tag, flag)| Tag::new(raw_tag).ok().map(|tag| (tag, flag)))
            .collect()
    };
}

/// True if a record may carry more than one field with `tag`.
///
/// Local tags (containing a '9' or a non-digit, e.g. "LOK") are always
/// repeatable. Tags missing from the table are treated as repeatable and
/// logged.
#[must_use]
pub fn is_repeatable_field(tag: &Tag) -> bool {
    if tag.is_local() {
        return true;
    }
    match TAG_TO_REPEATABLE.get(tag) {
        Some(&repeatable) => repeatable,
        None => {
            log::warn!("{tag} is not in the repeatability table, treating it as repeatable");
            true
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(raw: &str) -> Tag {
        Tag::new(raw).unwrap()
    }

    #[test]
    fn test_non_repeatable_fields() {
        for raw in ["001", "008", "100", "245"] {
            assert!(!is_repeatable_field(&tag(raw)), "{raw} should not repeat");
        }
    }

    #[test]
    fn test_repeatable_fields() {
        for raw in ["007", "020", "650", "700", "856"] {
            assert!(is_repeatable_field(&tag(raw)), "{raw} should repeat");
        }
    }

    #[test]
    fn test_local_fields_are_repeatable() {
        assert!(is_repeatable_field(&tag("LOK")));
        assert!(is_repeatable_field(&tag("591")));
        assert!(is_repeatable_field(&tag("935")));
    }

    #[test]
    fn test_unknown_fields_are_repeatable() {
        assert!(is_repeatable_field(&tag("012")));
    }

    #[test]
    fn test_tables_are_disjoint() {
        for raw in NON_REPEATABLE_TAGS {
            assert!(!REPEATABLE_TAGS.contains(raw), "{raw} listed twice");
        }
    }
}
