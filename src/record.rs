//! MARC record structures and operations.
//!
//! A [`Record`] is a [`Leader`] plus an ordered list of [`Field`]s. Each field
//! is a [`Tag`] and its raw contents: opaque text for control fields, two
//! indicators followed by `0x1F`-delimited subfields for data fields.
//!
//! Lookups that return positions or ranges (`find_tag`, `tag_range`,
//! `find_all_local_data_blocks`, ...) return plain indices into
//! [`Record::fields`]. They are only meaningful until the record is next
//! mutated.
//!
//! # Examples
//!
//! ```
//! use marcodec::{BibliographicLevel, Record, Subfields, Tag, TypeOfRecord};
//!
//! let mut record = Record::with_type(
//!     TypeOfRecord::LanguageMaterial,
//!     BibliographicLevel::MonographOrItem,
//!     "000000001",
//! );
//! let mut subfields = Subfields::new();
//! subfields.add_subfield('a', "Test Title");
//! assert!(record.insert_field_with_subfields(Tag::new("245").unwrap(), &subfields, '1', '0'));
//!
//! assert_eq!(record.control_number(), Some("000000001"));
//! assert_eq!(record.main_title().as_deref(), Some("Test Title"));
//! ```

use crate::error::{MarcError, Result};
use crate::leader::{Leader, LEADER_LENGTH};
use crate::repeatable::is_repeatable_field;
use crate::subfields::{split_subfields, Subfields, SUBFIELD_DELIMITER};
use crate::tag::Tag;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};
use std::ops::Range;

/// Field terminator byte.
pub const FIELD_TERMINATOR: u8 = 0x1E;

/// Record terminator byte.
pub const RECORD_TERMINATOR: u8 = 0x1D;

/// Length of one directory entry: tag (3) + field length (4) + offset (5).
pub const DIRECTORY_ENTRY_LENGTH: usize = 12;

/// Largest record length expressible in the 5-digit leader field.
pub const MAX_RECORD_LENGTH: usize = 99_999;

/// Largest field data length expressible in the 4-digit directory field,
/// excluding the field terminator.
pub const MAX_VARIABLE_FIELD_DATA_LENGTH: usize = 9_998;

pub(crate) const CONTROL_NUMBER_TAG: Tag = Tag::from_static(b"001");
pub(crate) const LOCAL_TAG: Tag = Tag::from_static(b"LOK");

/// Every LOK field's contents start with this, followed by its pseudo-tag.
const LOCAL_FIELD_PREFIX: &str = "  \x1F0";
/// Contents prefix of the first field of a local block (pseudo-tag "000").
const LOCAL_BLOCK_START: &str = "  \x1F0000";

/// Subfield codes of 041 that hold language codes.
const LANGUAGE_CODE_SUBFIELD_CODES: &str = "abdefghjkmn";

/// Broad class of a record, derived from leader position 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    /// Authority data ('z')
    Authority,
    /// Classification data ('w')
    Classification,
    /// Any of the bibliographic types
    Bibliographic,
    /// Anything else
    Unknown,
}

/// Leader position 6 values for bibliographic, authority and classification records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum TypeOfRecord {
    LanguageMaterial,
    NotatedMusic,
    ManuscriptNotatedMusic,
    CartographicMaterial,
    ManuscriptCartographicMaterial,
    ProjectedMedium,
    NonmusicalSoundRecording,
    MusicalSoundRecording,
    TwoDimensionalNonprojectableGraphic,
    ComputerFile,
    Kit,
    MixedMaterials,
    ThreeDimensionalArtifact,
    ManuscriptLanguageMaterial,
    Authority,
    Classification,
}

impl TypeOfRecord {
    /// The leader character for this type.
    #[must_use]
    pub fn as_char(self) -> char {
        match self {
            TypeOfRecord::LanguageMaterial => 'a',
            TypeOfRecord::NotatedMusic => 'c',
            TypeOfRecord::ManuscriptNotatedMusic => 'd',
            TypeOfRecord::CartographicMaterial => 'e',
            TypeOfRecord::ManuscriptCartographicMaterial => 'f',
            TypeOfRecord::ProjectedMedium => 'g',
            TypeOfRecord::NonmusicalSoundRecording => 'i',
            TypeOfRecord::MusicalSoundRecording => 'j',
            TypeOfRecord::TwoDimensionalNonprojectableGraphic => 'k',
            TypeOfRecord::ComputerFile => 'm',
            TypeOfRecord::Kit => 'o',
            TypeOfRecord::MixedMaterials => 'p',
            TypeOfRecord::ThreeDimensionalArtifact => 'r',
            TypeOfRecord::ManuscriptLanguageMaterial => 't',
            TypeOfRecord::Authority => 'z',
            TypeOfRecord::Classification => 'w',
        }
    }
}

/// Leader position 7 values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum BibliographicLevel {
    MonographicComponentPart,
    SerialComponentPart,
    Collection,
    Subunit,
    IntegratingResource,
    MonographOrItem,
    Serial,
    Undefined,
}

impl BibliographicLevel {
    /// The leader character for this level.
    #[must_use]
    pub fn as_char(self) -> char {
        match self {
            BibliographicLevel::MonographicComponentPart => 'a',
            BibliographicLevel::SerialComponentPart => 'b',
            BibliographicLevel::Collection => 'c',
            BibliographicLevel::Subunit => 'd',
            BibliographicLevel::IntegratingResource => 'i',
            BibliographicLevel::MonographOrItem => 'm',
            BibliographicLevel::Serial => 's',
            BibliographicLevel::Undefined => ' ',
        }
    }

    /// Map a leader character to a level; unknown characters give `Undefined`.
    #[must_use]
    pub fn from_char(ch: char) -> Self {
        match ch {
            'a' => BibliographicLevel::MonographicComponentPart,
            'b' => BibliographicLevel::SerialComponentPart,
            'c' => BibliographicLevel::Collection,
            'd' => BibliographicLevel::Subunit,
            'i' => BibliographicLevel::IntegratingResource,
            'm' => BibliographicLevel::MonographOrItem,
            's' => BibliographicLevel::Serial,
            _ => BibliographicLevel::Undefined,
        }
    }
}

/// A single field: a tag plus its raw contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    tag: Tag,
    contents: String,
}

impl Field {
    /// Create a field from a tag and raw contents.
    pub fn new(tag: Tag, contents: impl Into<String>) -> Self {
        Field {
            tag,
            contents: contents.into(),
        }
    }

    /// Create a data field from indicators and subfields.
    #[must_use]
    pub fn from_subfields(tag: Tag, indicator1: char, indicator2: char, subfields: &Subfields) -> Self {
        let mut contents = String::with_capacity(2 + subfields.iter().map(|s| s.value.len() + 2).sum::<usize>());
        contents.push(indicator1);
        contents.push(indicator2);
        contents.push_str(&subfields.to_string());
        Field { tag, contents }
    }

    /// The field's tag.
    #[must_use]
    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// Change the field's tag.
    pub fn set_tag(&mut self, tag: Tag) {
        self.tag = tag;
    }

    /// Raw contents, indicators included for data fields.
    #[must_use]
    pub fn contents(&self) -> &str {
        &self.contents
    }

    /// Replace the raw contents.
    pub fn set_contents(&mut self, contents: impl Into<String>) {
        self.contents = contents.into();
    }

    /// Replace the contents with the given indicators and subfields.
    pub fn set_contents_from_subfields(&mut self, subfields: &Subfields, indicator1: char, indicator2: char) {
        *self = Field::from_subfields(self.tag, indicator1, indicator2, subfields);
    }

    /// True if the tag is a control field tag.
    #[must_use]
    pub fn is_control_field(&self) -> bool {
        self.tag.is_control_field_tag()
    }

    /// True if the tag is a data field tag.
    #[must_use]
    pub fn is_data_field(&self) -> bool {
        self.tag.is_data_field_tag()
    }

    /// First indicator, or `None` for control fields and empty contents.
    #[must_use]
    pub fn indicator1(&self) -> Option<char> {
        if self.is_control_field() {
            return None;
        }
        self.contents.chars().next()
    }

    /// Second indicator, or `None` for control fields and short contents.
    #[must_use]
    pub fn indicator2(&self) -> Option<char> {
        if self.is_control_field() {
            return None;
        }
        self.contents.chars().nth(1)
    }

    /// The parsed subfields of a data field. Control fields have none.
    #[must_use]
    pub fn subfields(&self) -> Subfields {
        if self.is_control_field() {
            return Subfields::new();
        }
        Subfields::parse(&self.contents)
    }

    /// Value of the first subfield with `code`, borrowed from the contents.
    #[must_use]
    pub fn first_subfield_with_code(&self, code: char) -> Option<&str> {
        if self.is_control_field() {
            return None;
        }
        split_subfields(&self.contents)
            .find(|(subfield_code, _)| *subfield_code == code)
            .map(|(_, value)| value)
    }

    /// True if the data field has a subfield with `code`.
    #[must_use]
    pub fn has_subfield(&self, code: char) -> bool {
        self.first_subfield_with_code(code).is_some()
    }

    /// Replace the first `code` subfield or append a new one.
    pub fn insert_or_replace_subfield(&mut self, code: char, value: impl Into<String>) {
        let value = value.into();
        let mut subfields = self.subfields();
        if !subfields.replace_first_subfield(code, value.clone()) {
            subfields.add_subfield(code, value);
        }
        self.replace_subfields(&subfields);
    }

    /// Append a subfield to a data field.
    pub fn add_subfield(&mut self, code: char, value: &str) {
        self.contents.reserve(value.len() + 2);
        self.contents.push(char::from(SUBFIELD_DELIMITER));
        self.contents.push(code);
        self.contents.push_str(value);
    }

    /// Remove every subfield with `code`. Returns the number removed.
    pub fn delete_all_subfields_with_code(&mut self, code: char) -> usize {
        let mut subfields = self.subfields();
        let before = subfields.len();
        subfields.delete_all_subfields_with_code(code);
        let removed = before - subfields.len();
        if removed > 0 {
            self.replace_subfields(&subfields);
        }
        removed
    }

    /// The pseudo-tag of a LOK field, e.g. "852" for `"  \x1F0852..."`.
    #[must_use]
    pub fn local_tag(&self) -> Option<&str> {
        if self.tag != LOCAL_TAG {
            return None;
        }
        self.contents
            .strip_prefix(LOCAL_FIELD_PREFIX)
            .and_then(|rest| rest.get(..3))
    }

    /// Pseudo-indicators of a LOK field (the two characters after the pseudo-tag).
    fn local_indicators(&self) -> Option<(char, char)> {
        let rest = self.contents.strip_prefix(LOCAL_FIELD_PREFIX)?.get(3..)?;
        let mut chars = rest.chars();
        Some((chars.next()?, chars.next()?))
    }

    fn is_local_block_start(&self) -> bool {
        self.tag == LOCAL_TAG && self.contents.starts_with(LOCAL_BLOCK_START)
    }

    /// Keep the current indicators and replace the subfield data.
    fn replace_subfields(&mut self, subfields: &Subfields) {
        let indicators: String = self.contents.chars().take(2).collect();
        let mut contents = format!("{indicators:<2}");
        contents.push_str(&subfields.to_string());
        self.contents = contents;
    }
}

impl PartialOrd for Field {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Orders by tag, then by contents.
impl Ord for Field {
    fn cmp(&self, other: &Self) -> Ordering {
        self.tag
            .cmp(&other.tag)
            .then_with(|| self.contents.cmp(&other.contents))
    }
}

/// A MARC record.
///
/// The first field is normally the "001" control number. Field order is
/// kept exactly as read or appended; [`Record::insert_field`] keeps fields
/// sorted by tag, [`Record::append_field`] does not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    leader: Leader,
    fields: Vec<Field>,
}

impl Default for Record {
    fn default() -> Self {
        Record::new(Leader::default())
    }
}

impl Record {
    /// Create an empty record with the given leader.
    #[must_use]
    pub fn new(leader: Leader) -> Self {
        Record {
            leader,
            fields: Vec::new(),
        }
    }

    /// Create a record of the given type and level. A non-empty
    /// `control_number` becomes the 001 field.
    #[must_use]
    pub fn with_type(
        type_of_record: TypeOfRecord,
        bibliographic_level: BibliographicLevel,
        control_number: &str,
    ) -> Self {
        let leader = Leader::for_new_record(type_of_record.as_char(), bibliographic_level.as_char());
        let mut record = Record::new(leader);
        if !control_number.is_empty() {
            record.fields.push(Field::new(CONTROL_NUMBER_TAG, control_number));
        }
        record
    }

    /// Assemble a record from already decoded parts. Only the codecs use this.
    pub(crate) fn from_parts(leader: Leader, fields: Vec<Field>) -> Self {
        Record { leader, fields }
    }

    /// The record leader.
    #[must_use]
    pub fn leader(&self) -> &Leader {
        &self.leader
    }

    /// Mutable access to the leader.
    pub fn leader_mut(&mut self) -> &mut Leader {
        &mut self.leader
    }

    /// All fields in record order.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Mutable access to the fields. The number of fields cannot change through this.
    pub fn fields_mut(&mut self) -> &mut [Field] {
        &mut self.fields
    }

    /// Iterate over the fields.
    pub fn iter(&self) -> std::slice::Iter<'_, Field> {
        self.fields.iter()
    }

    /// Field at `index`.
    #[must_use]
    pub fn field(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    /// Mutable field at `index`.
    pub fn field_mut(&mut self, index: usize) -> Option<&mut Field> {
        self.fields.get_mut(index)
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if the record has no fields. Readers never return such records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The contents of the leading 001 field.
    #[must_use]
    pub fn control_number(&self) -> Option<&str> {
        self.fields
            .first()
            .filter(|field| field.tag == CONTROL_NUMBER_TAG)
            .map(Field::contents)
    }

    /// Derived from leader position 6.
    #[must_use]
    pub fn record_type(&self) -> RecordType {
        match self.leader.record_type {
            'z' => RecordType::Authority,
            'w' => RecordType::Classification,
            'a' | 'c' | 'd' | 'e' | 'f' | 'g' | 'i' | 'j' | 'k' | 'm' | 'o' | 'p' | 'r' | 't' => {
                RecordType::Bibliographic
            },
            _ => RecordType::Unknown,
        }
    }

    /// Leader position 7.
    #[must_use]
    pub fn bibliographic_level(&self) -> BibliographicLevel {
        BibliographicLevel::from_char(self.leader.bibliographic_level)
    }

    /// Set leader position 7.
    pub fn set_bibliographic_level(&mut self, level: BibliographicLevel) {
        self.leader.bibliographic_level = level.as_char();
    }

    /// Bibliographic level 'm'.
    #[must_use]
    pub fn is_monograph(&self) -> bool {
        self.leader.bibliographic_level == 'm'
    }

    /// Bibliographic level 's'.
    #[must_use]
    pub fn is_serial(&self) -> bool {
        self.leader.bibliographic_level == 's'
    }

    /// Bibliographic level 'a' or 'b' (component parts).
    #[must_use]
    pub fn is_article(&self) -> bool {
        matches!(self.leader.bibliographic_level, 'a' | 'b')
    }

    /// Index of the first field with `tag`.
    #[must_use]
    pub fn find_tag(&self, tag: &Tag) -> Option<usize> {
        self.fields.iter().position(|field| field.tag == *tag)
    }

    /// The first field with `tag`.
    #[must_use]
    pub fn first_field(&self, tag: &Tag) -> Option<&Field> {
        self.fields.iter().find(|field| field.tag == *tag)
    }

    /// Mutable first field with `tag`.
    pub fn first_field_mut(&mut self, tag: &Tag) -> Option<&mut Field> {
        self.fields.iter_mut().find(|field| field.tag == *tag)
    }

    /// The run of consecutive fields starting at the first field with `tag`.
    ///
    /// Only covers every `tag` field if the record is sorted by tag. The
    /// range is empty (and positioned at the end) if the tag is absent.
    #[must_use]
    pub fn tag_range(&self, tag: &Tag) -> Range<usize> {
        match self.find_tag(tag) {
            Some(start) => {
                let run = self.fields[start..]
                    .iter()
                    .take_while(|field| field.tag == *tag)
                    .count();
                start..start + run
            },
            None => self.fields.len()..self.fields.len(),
        }
    }

    /// The fields covered by [`Record::tag_range`].
    #[must_use]
    pub fn fields_with_tag(&self, tag: &Tag) -> &[Field] {
        &self.fields[self.tag_range(tag)]
    }

    /// Mutable variant of [`Record::fields_with_tag`].
    pub fn fields_with_tag_mut(&mut self, tag: &Tag) -> &mut [Field] {
        let range = self.tag_range(tag);
        &mut self.fields[range]
    }

    /// True if any field has `tag`.
    #[must_use]
    pub fn has_tag(&self, tag: &Tag) -> bool {
        self.find_tag(tag).is_some()
    }

    /// True if some field in the `tag` range has exactly these indicators.
    #[must_use]
    pub fn has_tag_with_indicators(&self, tag: &Tag, indicator1: char, indicator2: char) -> bool {
        self.fields_with_tag(tag).iter().any(|field| {
            field.indicator1() == Some(indicator1) && field.indicator2() == Some(indicator2)
        })
    }

    /// Values of the subfields whose code is in `codes`, over all `tag` fields.
    #[must_use]
    pub fn subfield_values(&self, tag: &Tag, codes: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|field| field.tag == *tag && field.is_data_field())
            .flat_map(|field| split_subfields(&field.contents))
            .filter(|(code, _)| codes.contains(*code))
            .map(|(_, value)| value)
            .collect()
    }

    /// The distinct tags present in the record.
    #[must_use]
    pub fn tag_set(&self) -> HashSet<Tag> {
        self.fields.iter().map(|field| field.tag).collect()
    }

    /// Insert a field keeping tag order. New fields go after existing fields
    /// with the same tag.
    ///
    /// Returns `false`, leaving the record untouched, if `tag` is not
    /// repeatable and the record already has such a field.
    pub fn insert_field(&mut self, tag: Tag, contents: impl Into<String>) -> bool {
        if !is_repeatable_field(&tag) && self.has_tag(&tag) {
            return false;
        }
        let position = self
            .fields
            .iter()
            .position(|field| field.tag > tag)
            .unwrap_or(self.fields.len());
        self.fields.insert(position, Field::new(tag, contents));
        true
    }

    /// [`Record::insert_field`] for a data field built from subfields.
    pub fn insert_field_with_subfields(
        &mut self,
        tag: Tag,
        subfields: &Subfields,
        indicator1: char,
        indicator2: char,
    ) -> bool {
        let field = Field::from_subfields(tag, indicator1, indicator2, subfields);
        self.insert_field(tag, field.contents)
    }

    /// Append a field at the end without any checks.
    pub fn append_field(&mut self, tag: Tag, contents: impl Into<String>) {
        self.fields.push(Field::new(tag, contents));
    }

    /// Append a subfield to the first field with `tag`. Returns `false` if there is none.
    pub fn add_subfield(&mut self, tag: &Tag, code: char, value: &str) -> bool {
        match self.first_field_mut(tag) {
            Some(field) if field.is_data_field() => {
                field.add_subfield(code, value);
                true
            },
            _ => false,
        }
    }

    /// Remove the fields at the given indices. Out-of-range and duplicate
    /// indices are ignored.
    pub fn delete_fields(&mut self, indices: &[usize]) {
        let doomed: HashSet<usize> = indices.iter().copied().collect();
        let mut index = 0;
        self.fields.retain(|_| {
            let keep = !doomed.contains(&index);
            index += 1;
            keep
        });
    }

    /// Remove every field with `tag`. Returns the number removed.
    pub fn delete_fields_with_tag(&mut self, tag: &Tag) -> usize {
        let before = self.fields.len();
        self.fields.retain(|field| field.tag != *tag);
        before - self.fields.len()
    }

    /// Insert every field of `other` with [`Record::insert_field`], so
    /// non-repeatable duplicates are skipped.
    pub fn merge(&mut self, other: &Record) {
        for field in &other.fields {
            self.insert_field(field.tag, field.contents.clone());
        }
    }

    /// Change the tag of every field in `from`'s tag range, then re-sort by tag.
    /// Returns the number of changed fields.
    pub fn re_tag(&mut self, from: &Tag, to: Tag) -> usize {
        let range = self.tag_range(from);
        let changed = range.len();
        for field in &mut self.fields[range] {
            field.tag = to;
        }
        if changed > 0 {
            self.sort_fields();
        }
        changed
    }

    /// Stable sort by tag.
    pub fn sort_fields(&mut self) {
        self.fields.sort_by_key(|field| field.tag);
    }

    /// 245 $a, or 245 $b if $a is empty, with trailing blanks and slashes removed.
    #[must_use]
    pub fn main_title(&self) -> Option<String> {
        let title_field = self.first_field(&Tag::from_static(b"245"))?;
        let trim = |value: &str| value.trim_end_matches([' ', '\t', '/']).to_string();
        let main_title = title_field.first_subfield_with_code('a').map(trim).unwrap_or_default();
        if !main_title.is_empty() {
            return Some(main_title);
        }
        title_field
            .first_subfield_with_code('b')
            .map(trim)
            .filter(|title| !title.is_empty())
    }

    /// The language code at 008/35-37.
    #[must_use]
    pub fn language_code(&self) -> Option<&str> {
        self.first_field(&Tag::from_static(b"008"))
            .and_then(|field| field.contents.get(35..38))
    }

    /// The 008 language code plus every language code from 041.
    #[must_use]
    pub fn language_codes(&self) -> BTreeSet<String> {
        let mut codes: BTreeSet<String> = self.language_code().map(str::to_string).into_iter().collect();
        codes.extend(
            self.subfield_values(&Tag::from_static(b"041"), LANGUAGE_CODE_SUBFIELD_CODES)
                .into_iter()
                .map(str::to_string),
        );
        codes
    }

    /// Ranges of all local data blocks.
    ///
    /// A block is a run of consecutive LOK fields. A LOK field with pseudo-tag
    /// "000" starts a new block, as does any LOK field following a non-LOK
    /// field.
    #[must_use]
    pub fn find_all_local_data_blocks(&self) -> Vec<Range<usize>> {
        let mut blocks = Vec::new();
        let mut current_start: Option<usize> = None;
        for (index, field) in self.fields.iter().enumerate() {
            if field.tag != LOCAL_TAG {
                if let Some(start) = current_start.take() {
                    blocks.push(start..index);
                }
                continue;
            }
            match current_start {
                None => current_start = Some(index),
                Some(start) if field.is_local_block_start() => {
                    blocks.push(start..index);
                    current_start = Some(index);
                },
                Some(_) => {},
            }
        }
        if let Some(start) = current_start {
            blocks.push(start..self.fields.len());
        }
        blocks
    }

    /// Start indices of all local data blocks.
    #[must_use]
    pub fn find_start_of_all_local_data_blocks(&self) -> Vec<usize> {
        self.find_all_local_data_blocks()
            .into_iter()
            .map(|block| block.start)
            .collect()
    }

    /// Indices of the LOK fields in `block` with pseudo-tag `local_tag` whose
    /// pseudo-indicators match `indicators`. A '?' in `indicators` matches
    /// any character.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidField`] if `local_tag` is not 3 characters
    /// or `indicators` is not 2 characters.
    pub fn find_fields_in_local_block(
        &self,
        local_tag: &str,
        indicators: &str,
        block: Range<usize>,
    ) -> Result<Vec<usize>> {
        if local_tag.len() != 3 {
            return Err(MarcError::InvalidField(format!(
                "local tag must have 3 characters: {local_tag:?}"
            )));
        }
        let pattern: Vec<char> = indicators.chars().collect();
        let &[pattern1, pattern2] = pattern.as_slice() else {
            return Err(MarcError::InvalidField(format!(
                "indicator pattern must have 2 characters: {indicators:?}"
            )));
        };
        let matches = |wanted: char, actual: char| wanted == '?' || wanted == actual;

        let end = block.end.min(self.fields.len());
        let start = block.start.min(end);
        Ok((start..end)
            .filter(|&index| {
                let field = &self.fields[index];
                field.local_tag() == Some(local_tag)
                    && field
                        .local_indicators()
                        .is_some_and(|(ind1, ind2)| matches(pattern1, ind1) && matches(pattern2, ind2))
            })
            .collect())
    }

    /// The run of fields with pseudo-tag `local_tag` inside the local block
    /// starting at `block_start`. Empty if there is none.
    #[must_use]
    pub fn local_tag_range(&self, local_tag: &str, block_start: usize) -> Range<usize> {
        let block_end = self
            .find_all_local_data_blocks()
            .into_iter()
            .find(|block| block.start == block_start)
            .map_or(block_start, |block| block.end);
        let Some(first) = (block_start..block_end).find(|&index| self.fields[index].local_tag() == Some(local_tag))
        else {
            return block_end..block_end;
        };
        let run = self.fields[first..block_end]
            .iter()
            .take_while(|field| field.local_tag() == Some(local_tag))
            .count();
        first..first + run
    }

    /// Remove the given local blocks, as returned by
    /// [`Record::find_all_local_data_blocks`].
    pub fn delete_local_blocks(&mut self, blocks: &[Range<usize>]) {
        let mut blocks: Vec<Range<usize>> = blocks.to_vec();
        blocks.sort_by(|a, b| b.start.cmp(&a.start));
        for block in blocks {
            let end = block.end.min(self.fields.len());
            if block.start < end {
                self.fields.drain(block.start..end);
            }
        }
    }

    /// Binary size of the record if written as one physical record.
    #[must_use]
    pub fn size(&self) -> usize {
        let data: usize = self.fields.iter().map(|field| field.contents.len() + 1).sum();
        LEADER_LENGTH + DIRECTORY_ENTRY_LENGTH * self.fields.len() + 1 + data + 1
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = &'a Field;
    type IntoIter = std::slice::Iter<'a, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

/// SHA-256 hex digest identifying the content of a record.
///
/// Fields are sorted by tag and contents first, so records that differ only
/// in the order of fields produce the same checksum. Record length, base
/// address and the continuation flag are ignored.
///
/// # Errors
///
/// Returns an error if the leader cannot be rendered.
pub fn calc_checksum(record: &Record, exclude_001: bool) -> Result<String> {
    let excluded: HashSet<Tag> = if exclude_001 {
        std::iter::once(CONTROL_NUMBER_TAG).collect()
    } else {
        HashSet::new()
    };
    calc_checksum_excluding(record, &excluded, false)
}

/// [`calc_checksum`] with an explicit set of excluded tags, optionally
/// also leaving out all local fields.
///
/// # Errors
///
/// Returns an error if the leader cannot be rendered.
pub fn calc_checksum_excluding(
    record: &Record,
    excluded_tags: &HashSet<Tag>,
    suppress_local_fields: bool,
) -> Result<String> {
    let mut fields: Vec<&Field> = record
        .fields
        .iter()
        .filter(|field| !excluded_tags.contains(&field.tag))
        .filter(|field| !suppress_local_fields || !field.tag.is_local())
        .collect();
    fields.sort();

    let mut leader = record.leader.clone();
    leader.record_length = 0;
    leader.data_base_address = 0;
    leader.set_continued(false);

    let mut hasher = Sha256::new();
    hasher.update(leader.as_bytes()?);
    for field in fields {
        hasher.update(field.tag.as_bytes());
        hasher.update(field.contents.as_bytes());
        hasher.update([FIELD_TERMINATOR]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
