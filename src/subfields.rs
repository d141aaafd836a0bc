//! Subfield lists embedded in data field contents.
//!
//! A data field's raw contents consist of two indicator characters followed
//! by zero or more `0x1F <code> <value>` groups. [`Subfields`] parses such
//! contents into an ordered list and serializes it back to the same bytes.
//!
//! # Examples
//!
//! ```
//! use marcodec::Subfields;
//!
//! let subfields = Subfields::parse("10\x1FaTitle\x1FcAuthor");
//! assert_eq!(subfields.first_subfield_with_code('a'), "Title");
//! assert_eq!(subfields.to_string(), "\x1FaTitle\x1FcAuthor");
//! ```

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Subfield delimiter byte.
pub const SUBFIELD_DELIMITER: u8 = 0x1F;

const SUBFIELD_DELIMITER_CHAR: char = '\x1F';

/// Iterate over the `(code, value)` pairs of raw data field contents.
///
/// Delimiters that are not followed by a code yield nothing.
/// Follows the same rules as [`Subfields::parse`].
pub(crate) fn split_subfields(field_contents: &str) -> impl Iterator<Item = (char, &str)> + '_ {
    let bytes = field_contents.as_bytes();
    let delimiters: Vec<usize> = if bytes.len() < 5 {
        Vec::new()
    } else {
        memchr::memchr_iter(SUBFIELD_DELIMITER, &bytes[2..])
            .map(|pos| pos + 2)
            .collect()
    };
    let ends: Vec<usize> = delimiters
        .iter()
        .skip(1)
        .copied()
        .chain(std::iter::once(bytes.len()))
        .collect();
    delimiters
        .into_iter()
        .zip(ends)
        .filter_map(move |(start, end)| {
            // Delimiter positions are always char boundaries.
            let segment = &field_contents[start + 1..end];
            let code = segment.chars().next()?;
            Some((code, &segment[code.len_utf8()..]))
        })
}

/// A subfield within a data field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subfield {
    /// Subfield code (single character)
    pub code: char,
    /// Subfield value
    pub value: String,
}

impl Subfield {
    /// Create a new subfield.
    pub fn new(code: char, value: impl Into<String>) -> Self {
        Subfield {
            code,
            value: value.into(),
        }
    }
}

impl fmt::Display for Subfield {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SUBFIELD_DELIMITER_CHAR}{}{}", self.code, self.value)
    }
}

/// An ordered list of subfields. Repeated codes are kept as distinct entries.
///
/// Stored in a `SmallVec` to avoid allocation for typical fields with 4 or
/// fewer subfields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subfields {
    subfields: SmallVec<[Subfield; 4]>,
}

impl Subfields {
    /// Create an empty subfield list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the raw contents of a data field, indicators included.
    ///
    /// Contents shorter than 5 bytes (2 indicators + delimiter + code + value)
    /// yield an empty list. Bytes between the indicators and the first
    /// delimiter, and a trailing delimiter without a code, are ignored here;
    /// [`Record::validate`](crate::Record::validate) reports them.
    /// Adjacent delimiters produce an empty-valued subfield, which is kept.
    #[must_use]
    pub fn parse(field_contents: &str) -> Self {
        split_subfields(field_contents)
            .map(|(code, value)| Subfield::new(code, value))
            .collect()
    }

    /// Iterate over the subfields in field order.
    pub fn iter(&self) -> std::slice::Iter<'_, Subfield> {
        self.subfields.iter()
    }

    /// Number of subfields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subfields.len()
    }

    /// True if there are no subfields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subfields.is_empty()
    }

    /// True if at least one subfield has the given code.
    #[must_use]
    pub fn has_subfield(&self, code: char) -> bool {
        self.subfields.iter().any(|s| s.code == code)
    }

    /// The value of the first subfield with `code`, if any.
    #[must_use]
    pub fn get(&self, code: char) -> Option<&str> {
        self.subfields
            .iter()
            .find(|s| s.code == code)
            .map(|s| s.value.as_str())
    }

    /// The value of the first subfield with `code`, or the empty string if there is none.
    #[must_use]
    pub fn first_subfield_with_code(&self, code: char) -> &str {
        self.get(code).unwrap_or("")
    }

    /// Values of all subfields with `code`, in field order.
    #[must_use]
    pub fn extract_subfields(&self, code: char) -> Vec<&str> {
        self.subfields
            .iter()
            .filter(|s| s.code == code)
            .map(|s| s.value.as_str())
            .collect()
    }

    /// Values of all subfields whose code occurs in `codes`, in field order.
    #[must_use]
    pub fn extract_subfields_with_codes(&self, codes: &str) -> Vec<&str> {
        self.subfields
            .iter()
            .filter(|s| codes.contains(s.code))
            .map(|s| s.value.as_str())
            .collect()
    }

    /// Extracts subfields for a spec that may contain numeric subfield specs.
    ///
    /// A digit in `spec` must be followed by a prefix character: `"a0x"` selects
    /// every `$a` plus every `$0` whose value looks like `"x:..."`. For the
    /// latter only the part after the colon is returned.
    #[must_use]
    pub fn extract_subfields_and_numeric_subfields(&self, spec: &str) -> Vec<&str> {
        let mut plain_codes = Vec::new();
        let mut numeric_specs = Vec::new();
        let mut chars = spec.chars();
        while let Some(code) = chars.next() {
            if code.is_ascii_digit() {
                match chars.next() {
                    Some(prefix) => numeric_specs.push((code, prefix)),
                    None => log::warn!("numeric subfield code '{code}' is missing a following character"),
                }
            } else {
                plain_codes.push(code);
            }
        }

        let mut values = Vec::new();
        for subfield in &self.subfields {
            if plain_codes.contains(&subfield.code) {
                values.push(subfield.value.as_str());
                continue;
            }
            let mut value_chars = subfield.value.chars();
            if let (Some(prefix), Some(':')) = (value_chars.next(), value_chars.next()) {
                if numeric_specs.contains(&(subfield.code, prefix)) {
                    values.push(&subfield.value[prefix.len_utf8() + 1..]);
                }
            }
        }
        values
    }

    /// Append a subfield.
    pub fn add_subfield(&mut self, code: char, value: impl Into<String>) {
        self.subfields.push(Subfield::new(code, value));
    }

    /// Replace the value of the first subfield with `code`.
    ///
    /// Returns `false` if there was no such subfield.
    pub fn replace_first_subfield(&mut self, code: char, new_value: impl Into<String>) -> bool {
        match self.subfields.iter_mut().find(|s| s.code == code) {
            Some(subfield) => {
                subfield.value = new_value.into();
                true
            },
            None => false,
        }
    }

    /// Replace every `code` subfield whose value equals `old_value`.
    ///
    /// Returns `true` if at least one subfield was replaced.
    pub fn replace_all_subfields(&mut self, code: char, old_value: &str, new_value: &str) -> bool {
        let mut replaced = false;
        for subfield in self
            .subfields
            .iter_mut()
            .filter(|s| s.code == code && s.value == old_value)
        {
            subfield.value = new_value.to_string();
            replaced = true;
        }
        replaced
    }

    /// Remove the first subfield with `code`, if any.
    pub fn delete_first_subfield_with_code(&mut self, code: char) {
        if let Some(pos) = self.subfields.iter().position(|s| s.code == code) {
            self.subfields.remove(pos);
        }
    }

    /// Remove every subfield with `code`.
    pub fn delete_all_subfields_with_code(&mut self, code: char) {
        self.subfields.retain(|s| s.code != code);
    }
}

impl fmt::Display for Subfields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for subfield in &self.subfields {
            write!(f, "{subfield}")?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Subfields {
    type Item = &'a Subfield;
    type IntoIter = std::slice::Iter<'a, Subfield>;

    fn into_iter(self) -> Self::IntoIter {
        self.subfields.iter()
    }
}

impl FromIterator<Subfield> for Subfields {
    fn from_iter<I: IntoIterator<Item = Subfield>>(iter: I) -> Self {
        Subfields {
            subfields: iter.into_iter().collect(),
        }
    }
}

impl From<Vec<Subfield>> for Subfields {
    fn from(subfields: Vec<Subfield>) -> Self {
        subfields.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(subfields: &Subfields) -> Vec<(char, &str)> {
        subfields.iter().map(|s| (s.code, s.value.as_str())).collect()
    }

    #[test]
    fn test_parse_simple() {
        let subfields = Subfields::parse("10\x1FaTest title\x1FcAuthor");
        assert_eq!(pairs(&subfields), vec![('a', "Test title"), ('c', "Author")]);
    }

    #[test]
    fn test_parse_keeps_empty_subfield_between_delimiters() {
        let subfields = Subfields::parse("  \x1Fa\x1Fbfoo");
        assert_eq!(pairs(&subfields), vec![('a', ""), ('b', "foo")]);
    }

    #[test]
    fn test_parse_short_contents_is_empty() {
        assert!(Subfields::parse("").is_empty());
        assert!(Subfields::parse("  ").is_empty());
        assert!(Subfields::parse("  \x1Fa").is_empty());
    }

    #[test]
    fn test_parse_drops_trailing_delimiter_without_code() {
        let subfields = Subfields::parse("  \x1Fabc\x1F");
        assert_eq!(pairs(&subfields), vec![('a', "bc")]);
    }

    #[test]
    fn test_parse_multibyte_values() {
        let subfields = Subfields::parse(" 0\x1FaMünchen\x1Fbčeština");
        assert_eq!(pairs(&subfields), vec![('a', "München"), ('b', "čeština")]);
    }

    #[test]
    fn test_to_string_reproduces_contents() {
        let contents = "  \x1Fa\x1Fbfoo\x1Fbbar";
        let subfields = Subfields::parse(contents);
        assert_eq!(format!("  {subfields}"), contents);
    }

    #[test]
    fn test_repeated_codes_preserved() {
        let subfields = Subfields::parse(" 0\x1FaOne\x1FxSub\x1FaTwo");
        assert_eq!(subfields.extract_subfields('a'), vec!["One", "Two"]);
        assert_eq!(subfields.extract_subfields_with_codes("xa"), vec!["One", "Sub", "Two"]);
    }

    #[test]
    fn test_first_subfield_with_code() {
        let subfields = Subfields::parse("  \x1FaOne\x1FaTwo");
        assert_eq!(subfields.first_subfield_with_code('a'), "One");
        assert_eq!(subfields.first_subfield_with_code('z'), "");
        assert_eq!(subfields.get('z'), None);
        assert!(subfields.has_subfield('a'));
        assert!(!subfields.has_subfield('b'));
    }

    #[test]
    fn test_add_subfield_appends() {
        let mut subfields = Subfields::parse("  \x1FzLast");
        subfields.add_subfield('a', "Appended");
        assert_eq!(pairs(&subfields), vec![('z', "Last"), ('a', "Appended")]);
    }

    #[test]
    fn test_replace_first_subfield() {
        let mut subfields = Subfields::parse("  \x1FaOne\x1FaTwo");
        assert!(subfields.replace_first_subfield('a', "Uno"));
        assert!(!subfields.replace_first_subfield('q', "Nothing"));
        assert_eq!(pairs(&subfields), vec![('a', "Uno"), ('a', "Two")]);
    }

    #[test]
    fn test_replace_all_subfields() {
        let mut subfields = Subfields::parse("  \x1Fax\x1Fay\x1Fax");
        assert!(subfields.replace_all_subfields('a', "x", "z"));
        assert_eq!(pairs(&subfields), vec![('a', "z"), ('a', "y"), ('a', "z")]);
        assert!(!subfields.replace_all_subfields('a', "nope", "z"));
    }

    #[test]
    fn test_delete_subfields() {
        let mut subfields = Subfields::parse("  \x1Fa1\x1Fb2\x1Fa3\x1Fa4");
        subfields.delete_first_subfield_with_code('a');
        assert_eq!(pairs(&subfields), vec![('b', "2"), ('a', "3"), ('a', "4")]);
        subfields.delete_all_subfields_with_code('a');
        assert_eq!(pairs(&subfields), vec![('b', "2")]);
    }

    #[test]
    fn test_numeric_subfields() {
        let subfields = Subfields::parse("  \x1FaTerm\x1F0x:12345\x1F0y:skip\x1F0plain");
        assert_eq!(
            subfields.extract_subfields_and_numeric_subfields("a0x"),
            vec!["Term", "12345"]
        );
    }
}
