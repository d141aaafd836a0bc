//! Structural validation of records and the empty-subfield policy.
//!
//! Readers and writers share one [`EmptySubfieldPolicy`] so that an empty
//! subfield is handled the same way whether it came from binary MARC or
//! MARC-XML.

use crate::error::{MarcError, Result};
use crate::record::{Field, Record, CONTROL_NUMBER_TAG};
use crate::subfields::{split_subfields, SUBFIELD_DELIMITER};

/// What to do with empty subfields, empty control fields and data fields
/// without any subfields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptySubfieldPolicy {
    /// Fail with [`MarcError::EmptySubfield`] (default)
    #[default]
    Abort,
    /// Keep the data and log a warning
    Warn,
}

impl EmptySubfieldPolicy {
    fn report(self, message: String) -> Result<()> {
        match self {
            EmptySubfieldPolicy::Abort => Err(MarcError::EmptySubfield(message)),
            EmptySubfieldPolicy::Warn => {
                log::warn!("{message}");
                Ok(())
            },
        }
    }

    /// Apply the policy to the empty parts of one field.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::EmptySubfield`] under [`EmptySubfieldPolicy::Abort`].
    pub fn check_field(self, field: &Field, control_number: &str) -> Result<()> {
        let tag = field.tag();
        if field.is_control_field() {
            if field.contents().is_empty() {
                self.report(format!("empty control field {tag} in record {control_number:?}"))?;
            }
            return Ok(());
        }

        let mut subfield_count = 0;
        for (code, value) in split_subfields(field.contents()) {
            subfield_count += 1;
            if value.is_empty() {
                self.report(format!(
                    "empty subfield ${code} in field {tag} of record {control_number:?}"
                ))?;
            }
        }
        if subfield_count == 0 {
            self.report(format!("field {tag} of record {control_number:?} has no subfields"))?;
        }
        Ok(())
    }

    /// Apply the policy to every field of a record.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::EmptySubfield`] under [`EmptySubfieldPolicy::Abort`].
    pub fn check_record(self, record: &Record) -> Result<()> {
        let control_number = record.control_number().unwrap_or_default();
        record
            .iter()
            .try_for_each(|field| self.check_field(field, control_number))
    }
}

impl Record {
    /// Check the record's structure.
    ///
    /// A valid record starts with a 001 field, and every data field has two
    /// indicators followed directly by a subfield delimiter, with each
    /// delimiter followed by a code. Empty content is handled by `policy`.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidRecord`] or [`MarcError::InvalidField`] for
    /// structural problems and [`MarcError::EmptySubfield`] for empty content
    /// under [`EmptySubfieldPolicy::Abort`].
    pub fn validate(&self, policy: EmptySubfieldPolicy) -> Result<()> {
        let Some(first) = self.fields().first() else {
            return Err(MarcError::InvalidRecord("record has no fields".to_string()));
        };
        if first.tag() != CONTROL_NUMBER_TAG {
            return Err(MarcError::InvalidRecord(format!(
                "first field must be 001, found {}",
                first.tag()
            )));
        }
        let control_number = first.contents();

        for field in self.iter().filter(|field| field.is_data_field()) {
            let bytes = field.contents().as_bytes();
            if bytes.len() < 2 {
                return Err(MarcError::InvalidField(format!(
                    "field {} of record {control_number:?} is missing its indicators",
                    field.tag()
                )));
            }
            if bytes.len() > 2 && bytes[2] != SUBFIELD_DELIMITER {
                return Err(MarcError::InvalidField(format!(
                    "field {} of record {control_number:?} has data before its first subfield",
                    field.tag()
                )));
            }
            let code_missing = memchr::memchr_iter(SUBFIELD_DELIMITER, bytes)
                .any(|pos| bytes.get(pos + 1).map_or(true, |&next| next == SUBFIELD_DELIMITER));
            if code_missing {
                return Err(MarcError::InvalidField(format!(
                    "field {} of record {control_number:?} has a subfield delimiter without a code",
                    field.tag()
                )));
            }
        }

        policy.check_record(self)
    }

    /// True if [`Record::validate`] passes with [`EmptySubfieldPolicy::Abort`].
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validate(EmptySubfieldPolicy::Abort).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::Tag;

    fn tag(raw: &str) -> Tag {
        Tag::new(raw).unwrap()
    }

    fn record_with(fields: &[(&str, &str)]) -> Record {
        let mut record = Record::default();
        for (raw_tag, contents) in fields {
            record.append_field(tag(raw_tag), *contents);
        }
        record
    }

    #[test]
    fn test_valid_record() {
        let record = record_with(&[("001", "123"), ("245", "10\x1FaTitle")]);
        assert!(record.validate(EmptySubfieldPolicy::Abort).is_ok());
        assert!(record.is_valid());
    }

    #[test]
    fn test_missing_control_number() {
        let record = record_with(&[("245", "10\x1FaTitle")]);
        assert!(matches!(
            record.validate(EmptySubfieldPolicy::Warn),
            Err(MarcError::InvalidRecord(_))
        ));
        assert!(!Record::default().is_valid());
    }

    #[test]
    fn test_structural_field_errors() {
        for contents in ["1", "10xyz\x1Fab", "10\x1Faa\x1F", "10\x1FaA\x1F\x1Fbfoo"] {
            let record = record_with(&[("001", "123"), ("245", contents)]);
            assert!(
                matches!(record.validate(EmptySubfieldPolicy::Warn), Err(MarcError::InvalidField(_))),
                "{contents:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_empty_subfield_policy() {
        let record = record_with(&[("001", "123"), ("245", "  \x1Fa\x1Fbfoo")]);
        assert!(matches!(
            record.validate(EmptySubfieldPolicy::Abort),
            Err(MarcError::EmptySubfield(_))
        ));
        assert!(record.validate(EmptySubfieldPolicy::Warn).is_ok());
    }

    #[test]
    fn test_empty_control_field_and_field_without_subfields() {
        let empty_control = record_with(&[("001", "123"), ("005", "")]);
        assert!(EmptySubfieldPolicy::Abort.check_record(&empty_control).is_err());
        assert!(EmptySubfieldPolicy::Warn.check_record(&empty_control).is_ok());

        let bare_indicators = record_with(&[("001", "123"), ("500", "  ")]);
        assert!(bare_indicators.validate(EmptySubfieldPolicy::Abort).is_err());
        assert!(bare_indicators.validate(EmptySubfieldPolicy::Warn).is_ok());
    }
}
