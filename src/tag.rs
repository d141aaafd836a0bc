//! Three-character MARC field tags.
//!
//! A [`Tag`] keeps the raw bytes for display and a packed big-endian integer
//! key for comparison and hashing. Because the key is composed most
//! significant byte first, integer order and byte-wise string order agree.

use crate::error::{MarcError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Length of every MARC tag in bytes.
pub const TAG_LENGTH: usize = 3;

/// A MARC field tag such as `"001"`, `"245"` or `"LOK"`.
///
/// # Examples
///
/// ```
/// use marcodec::Tag;
///
/// let title = Tag::new("245").unwrap();
/// let control_number = Tag::new("001").unwrap();
/// assert!(control_number < title);
/// assert!(control_number.is_control_field_tag());
/// assert!(Tag::new("24").is_err());
/// ```
#[derive(Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Tag {
    bytes: [u8; TAG_LENGTH],
    key: u32,
}

/// Composes the ordering key, most significant byte first.
const fn pack(bytes: [u8; TAG_LENGTH]) -> u32 {
    ((bytes[0] as u32) << 16) | ((bytes[1] as u32) << 8) | bytes[2] as u32
}

impl Tag {
    /// Create a tag from a 3-character string.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidTag`] if `raw_tag` is not exactly 3 bytes long.
    pub fn new(raw_tag: &str) -> Result<Self> {
        Self::from_bytes(raw_tag.as_bytes())
    }

    /// Create a tag from a 3-byte slice.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidTag`] if `raw_tag` is not exactly 3 bytes long.
    pub fn from_bytes(raw_tag: &[u8]) -> Result<Self> {
        let bytes: [u8; TAG_LENGTH] = raw_tag.try_into().map_err(|_| {
            MarcError::InvalidTag(format!(
                "\"raw_tag\" must have a length of 3: {}",
                String::from_utf8_lossy(raw_tag)
            ))
        })?;
        if !bytes.is_ascii() {
            return Err(MarcError::InvalidTag(format!(
                "tag must consist of ASCII characters: {}",
                String::from_utf8_lossy(raw_tag)
            )));
        }
        Ok(Tag {
            bytes,
            key: pack(bytes),
        })
    }

    /// Tag from a literal known to be ASCII.
    pub(crate) const fn from_static(bytes: &[u8; TAG_LENGTH]) -> Self {
        Tag {
            bytes: *bytes,
            key: pack(*bytes),
        }
    }

    /// The packed integer used for ordering and hashing.
    #[must_use]
    pub fn as_int(&self) -> u32 {
        self.key
    }

    /// The raw tag bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; TAG_LENGTH] {
        &self.bytes
    }

    /// The tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        // Only ASCII tags can be constructed.
        std::str::from_utf8(&self.bytes).unwrap_or("???")
    }

    /// True for tags "000" through "009" (and any other "00x" tag).
    #[must_use]
    pub fn is_control_field_tag(&self) -> bool {
        self.bytes[0] == b'0' && self.bytes[1] == b'0'
    }

    /// True for every tag that is not a control field tag.
    #[must_use]
    pub fn is_data_field_tag(&self) -> bool {
        !self.is_control_field_tag()
    }

    /// True if any character of the tag is a '9' or not a digit, e.g. "LOK" or "591".
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.bytes.iter().any(|&b| !b.is_ascii_digit() || b == b'9')
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Tag {}

impl PartialOrd for Tag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Tag {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl Hash for Tag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialEq<str> for Tag {
    fn eq(&self, other: &str) -> bool {
        self.bytes.as_slice() == other.as_bytes()
    }
}

impl PartialEq<&str> for Tag {
    fn eq(&self, other: &&str) -> bool {
        self.bytes.as_slice() == other.as_bytes()
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({:?})", self.as_str())
    }
}

impl FromStr for Tag {
    type Err = MarcError;

    fn from_str(s: &str) -> Result<Self> {
        Tag::new(s)
    }
}

impl TryFrom<&str> for Tag {
    type Error = MarcError;

    fn try_from(value: &str) -> Result<Self> {
        Tag::new(value)
    }
}

impl TryFrom<String> for Tag {
    type Error = MarcError;

    fn try_from(value: String) -> Result<Self> {
        Tag::new(&value)
    }
}

impl From<Tag> for String {
    fn from(tag: Tag) -> Self {
        tag.as_str().to_string()
    }
}
