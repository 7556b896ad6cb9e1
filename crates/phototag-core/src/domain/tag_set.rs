//! Slot-indexed tag set shared with the photo server
//!
//! A user's tags are stored as five parallel arrays indexed by slot. Slot
//! indices are stable for the lifetime of the set: deleting a tag marks its
//! photo as [`DELETED_PHOTO`] and the slot is later reused by
//! [`TagSet::find_empty_slot`], never removed.
//!
//! `numberOfTags` is the high-water mark of allocated slots, not the number
//! of live tags, and travels on the wire as a decimal string.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::UserId;

/// Photo sentinel marking a slot as deleted or empty
pub const DELETED_PHOTO: &str = "na";

// ============================================================================
// TagEntry
// ============================================================================

/// The contents of a single slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagEntry {
    /// Free-text description
    pub description: String,
    /// Photo filename, or [`DELETED_PHOTO`]
    pub photo: String,
    /// Free-text location (usually `"lat,lon"`)
    pub location: String,
    /// Comma-separated people names
    pub people: String,
}

impl TagEntry {
    /// Creates a new entry
    pub fn new(
        description: impl Into<String>,
        photo: impl Into<String>,
        location: impl Into<String>,
        people: impl Into<String>,
    ) -> Self {
        Self {
            description: description.into(),
            photo: photo.into(),
            location: location.into(),
            people: people.into(),
        }
    }

    /// Returns true if this entry marks a deleted slot
    pub fn is_deleted(&self) -> bool {
        self.photo == DELETED_PHOTO
    }
}

// ============================================================================
// TagSet
// ============================================================================

/// One user's tags, in the server's wire layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagSet {
    /// Owning user id
    pub id: String,
    #[serde(with = "number_as_string")]
    number_of_tags: usize,
    #[serde(default)]
    tag_id: Vec<String>,
    #[serde(default)]
    tag_des: Vec<String>,
    #[serde(default)]
    tag_photo: Vec<String>,
    #[serde(default)]
    tag_location: Vec<String>,
    #[serde(default)]
    tag_people_name: Vec<String>,
}

impl TagSet {
    /// Creates an empty tag set for a user
    pub fn empty(user: &UserId) -> Self {
        Self {
            id: user.as_str().to_string(),
            number_of_tags: 0,
            tag_id: Vec::new(),
            tag_des: Vec::new(),
            tag_photo: Vec::new(),
            tag_location: Vec::new(),
            tag_people_name: Vec::new(),
        }
    }

    /// Parses a tag set from its JSON form and checks its shape
    pub fn from_json(json: &[u8]) -> Result<Self, DomainError> {
        let mut tags: TagSet = serde_json::from_slice(json)
            .map_err(|e| DomainError::MalformedTagSet(e.to_string()))?;
        tags.validate()?;
        tags.normalize();
        Ok(tags)
    }

    /// Serializes the tag set to its JSON form
    pub fn to_json(&self) -> Result<Vec<u8>, DomainError> {
        serde_json::to_vec(self).map_err(|e| DomainError::MalformedTagSet(e.to_string()))
    }

    /// High-water mark of allocated slots
    pub fn number_of_tags(&self) -> usize {
        self.number_of_tags
    }

    /// Checks that every per-slot array covers `[0, numberOfTags)`
    pub fn validate(&self) -> Result<(), DomainError> {
        let n = self.number_of_tags;
        let arrays = [
            ("tagId", self.tag_id.len()),
            ("tagDes", self.tag_des.len()),
            ("tagPhoto", self.tag_photo.len()),
            ("tagLocation", self.tag_location.len()),
            ("tagPeopleName", self.tag_people_name.len()),
        ];
        for (name, len) in arrays {
            if len < n {
                return Err(DomainError::MalformedTagSet(format!(
                    "{} has {} entries but numberOfTags is {}",
                    name, len, n
                )));
            }
        }
        Ok(())
    }

    /// Pads the per-slot arrays to a common length
    fn normalize(&mut self) {
        let len = [
            self.tag_id.len(),
            self.tag_des.len(),
            self.tag_photo.len(),
            self.tag_location.len(),
            self.tag_people_name.len(),
        ]
        .into_iter()
        .max()
        .unwrap_or(0);
        self.grow_to(len);
    }

    fn grow_to(&mut self, len: usize) {
        while self.tag_id.len() < len {
            self.tag_id.push(self.tag_id.len().to_string());
        }
        self.tag_des.resize(len.max(self.tag_des.len()), String::new());
        self.tag_photo
            .resize(len.max(self.tag_photo.len()), DELETED_PHOTO.to_string());
        self.tag_location
            .resize(len.max(self.tag_location.len()), String::new());
        self.tag_people_name
            .resize(len.max(self.tag_people_name.len()), String::new());
    }

    /// Returns the slot for the next publish
    ///
    /// The first slot below `numberOfTags` whose photo is [`DELETED_PHOTO`]
    /// wins. Otherwise the first fresh slot at or above `numberOfTags`.
    /// Slots in `reserved` are held by in-flight publishes and are skipped
    /// in both ranges.
    pub fn find_empty_slot(&self, reserved: &BTreeSet<usize>) -> usize {
        let reusable = (0..self.number_of_tags)
            .find(|&i| self.tag_photo[i] == DELETED_PHOTO && !reserved.contains(&i));
        if let Some(slot) = reusable {
            return slot;
        }
        let mut slot = self.number_of_tags;
        while reserved.contains(&slot) {
            slot += 1;
        }
        slot
    }

    /// Returns the entry stored at `slot`, if allocated
    pub fn entry(&self, slot: usize) -> Option<TagEntry> {
        if slot >= self.number_of_tags {
            return None;
        }
        Some(TagEntry {
            description: self.tag_des[slot].clone(),
            photo: self.tag_photo[slot].clone(),
            location: self.tag_location[slot].clone(),
            people: self.tag_people_name[slot].clone(),
        })
    }

    /// Returns the entry at `slot` or a range error
    pub fn require_entry(&self, slot: usize) -> Result<TagEntry, DomainError> {
        self.entry(slot).ok_or(DomainError::SlotOutOfRange {
            slot,
            allocated: self.number_of_tags,
        })
    }

    /// Writes `entry` into `slot`
    ///
    /// Arrays grow as needed and `numberOfTags` rises to at least
    /// `slot + 1`. Returns the previous entry if the slot was allocated.
    pub fn apply(&mut self, slot: usize, entry: TagEntry) -> Option<TagEntry> {
        let previous = self.entry(slot);
        self.grow_to(slot + 1);
        self.tag_id[slot] = slot.to_string();
        self.tag_des[slot] = entry.description;
        self.tag_photo[slot] = entry.photo;
        self.tag_location[slot] = entry.location;
        self.tag_people_name[slot] = entry.people;
        self.number_of_tags = self.number_of_tags.max(slot + 1);
        previous
    }

    /// Iterates over `(slot, entry)` for every allocated slot
    pub fn entries(&self) -> impl Iterator<Item = (usize, TagEntry)> + '_ {
        (0..self.number_of_tags).filter_map(move |i| self.entry(i).map(|e| (i, e)))
    }

    /// Filenames referenced by live slots
    pub fn live_file_names(&self) -> Vec<String> {
        self.tag_photo[..self.number_of_tags]
            .iter()
            .filter(|p| p.as_str() != DELETED_PHOTO && !p.is_empty())
            .cloned()
            .collect()
    }

    /// Number of live (non-deleted) slots
    pub fn live_count(&self) -> usize {
        self.tag_photo[..self.number_of_tags]
            .iter()
            .filter(|p| p.as_str() != DELETED_PHOTO)
            .count()
    }
}

/// `numberOfTags` is a decimal string on the wire; bare numbers are
/// accepted on input as well.
mod number_as_string {
    use serde::de::{self, Deserializer, Visitor};
    use serde::Serializer;
    use std::fmt;

    pub fn serialize<S>(value: &usize, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<usize, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct CountVisitor;

        impl<'de> Visitor<'de> for CountVisitor {
            type Value = usize;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a non-negative integer or its decimal string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<usize, E> {
                usize::try_from(v).map_err(E::custom)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<usize, E> {
                usize::try_from(v).map_err(E::custom)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<usize, E> {
                v.trim().parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(CountVisitor)
    }
}
