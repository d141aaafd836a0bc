//! MARC record leader parsing and rendering.
//!
//! The leader is a 24-byte fixed-length header at the start of every MARC record.
//!
//! # Structure
//!
//! - Positions 0-4: Record length (5 digits)
//! - Position 5: Record status
//! - Position 6: Type of record (a = language material, z = authority, w = classification, ...)
//! - Position 7: Bibliographic level (m = monograph, s = serial, ...)
//! - Position 8: Type of control
//! - Position 9: Character coding scheme (space = MARC-8, a = UCS/Unicode)
//! - Position 10: Indicator count (always 2)
//! - Position 11: Subfield code count (always 2)
//! - Positions 12-16: Base address of data (5 digits)
//! - Positions 17-19: Encoding level, cataloging form, multipart level
//! - Positions 20-23: Entry map ("450" plus an undefined position)
//!
//! The binary writer uses the undefined last entry-map position (23) to flag
//! physical records that are continued by the next physical record.

use crate::error::{MarcError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of the leader in bytes.
pub const LEADER_LENGTH: usize = 24;

/// Length of the record length prefix in bytes.
pub const RECORD_LENGTH_FIELD_LENGTH: usize = 5;

/// Entry-map value of the last physical part of a record.
pub const FINAL_PART: char = '0';

/// Entry-map value of a physical part that is continued by the next one.
pub const CONTINUED_PART: char = '1';

/// MARC Leader - 24 bytes at the start of every MARC record.
///
/// Character positions are kept as `char`s so that any leader read from a
/// file renders back to the same bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leader {
    /// Record length (5 digits) - positions 0-4
    pub record_length: u32,
    /// Record status (1 char) - position 5
    pub record_status: char,
    /// Type of record (1 char) - position 6
    pub record_type: char,
    /// Bibliographic level (1 char) - position 7
    pub bibliographic_level: char,
    /// Type of control (1 char) - position 8
    pub control_record_type: char,
    /// Character coding scheme (1 char) - position 9
    pub character_coding: char,
    /// Indicator count (1 char) - position 10, normally '2'
    pub indicator_count: char,
    /// Subfield code count (1 char) - position 11, normally '2'
    pub subfield_code_count: char,
    /// Base address of data (5 digits) - positions 12-16
    pub data_base_address: u32,
    /// Encoding level (1 char) - position 17
    pub encoding_level: char,
    /// Descriptive cataloging form (1 char) - position 18
    pub cataloging_form: char,
    /// Multipart resource record level (1 char) - position 19
    pub multipart_level: char,
    /// Entry map (4 chars) - positions 20-23
    pub entry_map: String,
}

impl Default for Leader {
    fn default() -> Self {
        Leader {
            record_length: 0,
            record_status: 'n',
            record_type: 'a',
            bibliographic_level: 'm',
            control_record_type: ' ',
            character_coding: 'a',
            indicator_count: '2',
            subfield_code_count: '2',
            data_base_address: 0,
            encoding_level: ' ',
            cataloging_form: ' ',
            multipart_level: ' ',
            entry_map: "4500".to_string(),
        }
    }
}

impl Leader {
    /// Leader for a newly created record of the given type and bibliographic level.
    #[must_use]
    pub fn for_new_record(record_type: char, bibliographic_level: char) -> Self {
        Leader {
            record_type,
            bibliographic_level,
            data_base_address: 445,
            encoding_level: '2',
            ..Leader::default()
        }
    }

    /// Parse a leader from 24 bytes.
    ///
    /// Non-standard indicator counts, subfield code counts and entry maps are
    /// accepted with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if there are not exactly 24 bytes, if they are not
    /// ASCII or if the record length or base address is not numeric.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != LEADER_LENGTH {
            return Err(MarcError::InvalidLeader(format!(
                "Leader length must be {LEADER_LENGTH}, found {}! (Leader bytes are {:?})",
                bytes.len(),
                String::from_utf8_lossy(bytes)
            )));
        }
        if !bytes.is_ascii() {
            return Err(MarcError::InvalidLeader(format!(
                "Leader contains non-ASCII bytes: {:?}",
                String::from_utf8_lossy(bytes)
            )));
        }

        let record_length = parse_digits(&bytes[0..5], "record length")?;
        let data_base_address = parse_digits(&bytes[12..17], "base address of data")?;
        let entry_map = String::from_utf8_lossy(&bytes[20..24]).to_string();

        if bytes[10] != b'2' {
            log::warn!("invalid indicator count '{}'", bytes[10] as char);
        }
        if bytes[11] != b'2' {
            log::warn!(
                "invalid subfield code length! (Leader bytes are {:?})",
                String::from_utf8_lossy(bytes)
            );
        }
        if !entry_map.starts_with("450") {
            log::warn!("invalid entry map {entry_map:?}");
        }

        Ok(Leader {
            record_length,
            record_status: bytes[5] as char,
            record_type: bytes[6] as char,
            bibliographic_level: bytes[7] as char,
            control_record_type: bytes[8] as char,
            character_coding: bytes[9] as char,
            indicator_count: bytes[10] as char,
            subfield_code_count: bytes[11] as char,
            data_base_address,
            encoding_level: bytes[17] as char,
            cataloging_form: bytes[18] as char,
            multipart_level: bytes[19] as char,
            entry_map,
        })
    }

    /// Validate that the leader is suitable for binary record reading.
    ///
    /// # Errors
    ///
    /// Returns an error if `record_length` or `data_base_address` is smaller
    /// than a leader, or if the base address lies beyond the record.
    pub fn validate_for_reading(&self) -> Result<()> {
        if (self.record_length as usize) < LEADER_LENGTH {
            return Err(MarcError::InvalidLeader(format!(
                "Record length must be at least 24, got {}",
                self.record_length
            )));
        }
        if (self.data_base_address as usize) <= LEADER_LENGTH {
            return Err(MarcError::InvalidLeader(format!(
                "Base address of data must be greater than 24, got {}",
                self.data_base_address
            )));
        }
        if self.data_base_address >= self.record_length {
            return Err(MarcError::InvalidLeader(format!(
                "Base address of data ({}) lies beyond the record length ({})",
                self.data_base_address, self.record_length
            )));
        }
        Ok(())
    }

    /// True if the binary writer marked this physical record as continued.
    #[must_use]
    pub fn is_continued(&self) -> bool {
        self.entry_map.chars().nth(3) == Some(CONTINUED_PART)
    }

    /// Set or clear the continuation flag in the entry map.
    pub fn set_continued(&mut self, continued: bool) {
        let flag = if continued { CONTINUED_PART } else { FINAL_PART };
        let mut entry_map: Vec<char> = self.entry_map.chars().collect();
        entry_map.resize(4, FINAL_PART);
        entry_map[3] = flag;
        self.entry_map = entry_map.into_iter().collect();
    }

    /// Serialize the leader to its 24-byte form.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric value needs more than 5 digits, a
    /// character position is not ASCII or the entry map is not 4 characters.
    pub fn as_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(LEADER_LENGTH);

        push_digits(&mut bytes, self.record_length, "record length")?;
        for ch in [
            self.record_status,
            self.record_type,
            self.bibliographic_level,
            self.control_record_type,
            self.character_coding,
            self.indicator_count,
            self.subfield_code_count,
        ] {
            push_ascii(&mut bytes, ch)?;
        }
        push_digits(&mut bytes, self.data_base_address, "base address of data")?;
        for ch in [self.encoding_level, self.cataloging_form, self.multipart_level] {
            push_ascii(&mut bytes, ch)?;
        }

        let entry_map = self.entry_map.as_bytes();
        if entry_map.len() != 4 || !entry_map.is_ascii() {
            return Err(MarcError::InvalidLeader(format!(
                "Entry map must be 4 ASCII characters, got {:?}",
                self.entry_map
            )));
        }
        bytes.extend_from_slice(entry_map);

        Ok(bytes)
    }
}

impl fmt::Display for Leader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_bytes() {
            Ok(bytes) => f.write_str(&String::from_utf8_lossy(&bytes)),
            Err(_) => Err(fmt::Error),
        }
    }
}

fn push_digits(bytes: &mut Vec<u8>, value: u32, what: &str) -> Result<()> {
    if value > 99_999 {
        return Err(MarcError::InvalidLeader(format!(
            "{what} {value} does not fit into 5 digits"
        )));
    }
    bytes.extend_from_slice(format!("{value:05}").as_bytes());
    Ok(())
}

fn push_ascii(bytes: &mut Vec<u8>, ch: char) -> Result<()> {
    if !ch.is_ascii() {
        return Err(MarcError::InvalidLeader(format!(
            "leader positions must be ASCII, got {ch:?}"
        )));
    }
    bytes.push(ch as u8);
    Ok(())
}

/// Parse 5-digit ASCII number from bytes
fn parse_digits(bytes: &[u8], what: &str) -> Result<u32> {
    let s = String::from_utf8_lossy(bytes);
    if !bytes.iter().all(u8::is_ascii_digit) {
        return Err(MarcError::InvalidLeader(format!(
            "Can't parse {what}! (Found {s:?})"
        )));
    }
    s.parse::<u32>()
        .map_err(|_| MarcError::InvalidLeader(format!("Can't parse {what}! (Found {s:?})")))
}
