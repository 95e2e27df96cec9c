//! Participants admitted to a live session
//!
//! The roster of a session is fixed when the session is created. Display
//! metadata is resolved once through a [`ParticipantDirectory`] and never
//! consulted again, so a session keeps working if the directory changes.

use std::{
    collections::{BTreeMap, HashMap, HashSet, btree_map::Entry},
    fmt::Display,
    num::ParseIntError,
    str::FromStr,
};

use heck::ToTitleCase;
use rustrict::CensorStr;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants;

/// Identifies a participant (the account ID for members, an allocated ID for guests)
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    derive_more::From,
)]
#[serde(transparent)]
pub struct ParticipantId(i32);

impl ParticipantId {
    /// Wraps a raw account ID
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    /// Returns the raw ID
    pub const fn get(self) -> i32 {
        self.0
    }
}

impl Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ParticipantId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// How a participant is shown to the others
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayMetadata {
    /// Name shown on the roster and score table
    pub display_name: String,
    /// Reference to the participant's profile picture
    pub avatar: Option<String>,
}

impl DisplayMetadata {
    /// Metadata with a name and no avatar
    pub fn named(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            avatar: None,
        }
    }
}

/// How names are made up for guests whose directory entry has none
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, garde::Validate)]
#[serde(tag = "style", rename_all = "snake_case")]
pub enum GuestNames {
    /// Adjectives followed by an animal, like "Brave Otter"
    Animal {
        /// Number of words, the animal included
        #[garde(range(min = 2, max = 3))]
        words: u8,
    },
    /// A Roman name, like "Marcus Aurelius"
    Roman {
        /// Whether to lead with a praenomen
        #[garde(skip)]
        praenomen: bool,
    },
}

impl Default for GuestNames {
    fn default() -> Self {
        Self::Animal { words: 2 }
    }
}

impl GuestNames {
    fn generate(self) -> Option<String> {
        match self {
            Self::Animal { words } => petname::petname(words, " "),
            Self::Roman { praenomen } => {
                Some(romanname::romanname(romanname::NameConfig { praenomen }))
            }
        }
        .map(|name| name.to_title_case())
    }

    /// Makes up a name for `id` that is not in `taken` (lowercased names)
    ///
    /// Falls back to "Guest {id}" when no fresh name turns up.
    pub fn name_for(self, id: ParticipantId, taken: &HashSet<String>) -> String {
        std::iter::repeat_with(|| self.generate())
            .take(constants::participant::GUEST_NAME_ATTEMPTS)
            .flatten()
            .find(|name| !taken.contains(&name.to_lowercase()))
            .unwrap_or_else(|| format!("Guest {id}"))
    }
}

/// Looks up display metadata for participant IDs
///
/// Consulted only while a registry is being built.
pub trait ParticipantDirectory {
    /// Returns the metadata for `id`, or `None` if the ID is unknown
    fn resolve(&self, id: ParticipantId) -> Option<DisplayMetadata>;
}

impl ParticipantDirectory for HashMap<ParticipantId, DisplayMetadata> {
    fn resolve(&self, id: ParticipantId) -> Option<DisplayMetadata> {
        self.get(&id).cloned()
    }
}

impl ParticipantDirectory for BTreeMap<ParticipantId, DisplayMetadata> {
    fn resolve(&self, id: ParticipantId) -> Option<DisplayMetadata> {
        self.get(&id).cloned()
    }
}

/// Errors raised while building a registry
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The same ID was admitted twice
    #[error("participant {0} admitted more than once")]
    Duplicate(ParticipantId),
    /// The directory has no entry for the ID
    #[error("participant {0} is unknown")]
    Unknown(ParticipantId),
    /// The roster exceeds the per-session limit
    #[error("maximum number of participants reached")]
    TooMany,
    /// The display name or avatar reference exceeds its length limit
    #[error("display metadata of participant {0} is too long")]
    TooLong(ParticipantId),
    /// The display name is inappropriate
    #[error("display name of participant {0} is inappropriate")]
    Sinful(ParticipantId),
}

/// The fixed roster of a session
///
/// Built once; there are no mutation operations. Replacing the roster means
/// creating a new session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParticipantRegistry {
    participants: BTreeMap<ParticipantId, DisplayMetadata>,
}

impl ParticipantRegistry {
    /// Builds a registry from already resolved entries
    ///
    /// Display names are trimmed; an empty name is kept empty.
    ///
    /// # Errors
    ///
    /// * `Error::TooMany` - more entries than a session admits
    /// * `Error::Duplicate` - an ID appears twice
    /// * `Error::TooLong` / `Error::Sinful` - the metadata fails validation
    pub fn new<I>(entries: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (ParticipantId, DisplayMetadata)>,
    {
        let mut participants = BTreeMap::new();

        for (id, metadata) in entries {
            if participants.len() >= constants::session::MAX_PARTICIPANT_COUNT {
                return Err(Error::TooMany);
            }
            let metadata = Self::check_metadata(id, metadata)?;
            match participants.entry(id) {
                Entry::Occupied(_) => return Err(Error::Duplicate(id)),
                Entry::Vacant(v) => {
                    v.insert(metadata);
                }
            }
        }

        Ok(Self { participants })
    }

    /// Resolves `ids` through `directory` and builds a registry
    ///
    /// Entries resolved with an empty name get one from `guests`, distinct
    /// from every other name on the roster.
    ///
    /// # Errors
    ///
    /// * `Error::Unknown` - the directory cannot resolve an ID
    /// * any error of [`ParticipantRegistry::new`]
    pub fn resolve<D: ParticipantDirectory + ?Sized>(
        ids: &[ParticipantId],
        directory: &D,
        guests: GuestNames,
    ) -> Result<Self, Error> {
        let mut entries = ids
            .iter()
            .map(|&id| Ok((id, directory.resolve(id).ok_or(Error::Unknown(id))?)))
            .collect::<Result<Vec<_>, Error>>()?;

        let mut taken = entries
            .iter()
            .map(|(_, metadata)| metadata.display_name.trim().to_lowercase())
            .filter(|name| !name.is_empty())
            .collect::<HashSet<_>>();

        for (id, metadata) in &mut entries {
            if metadata.display_name.trim().is_empty() {
                let name = guests.name_for(*id, &taken);
                taken.insert(name.to_lowercase());
                metadata.display_name = name;
            }
        }

        Self::new(entries)
    }

    fn check_metadata(id: ParticipantId, metadata: DisplayMetadata) -> Result<DisplayMetadata, Error> {
        if metadata.display_name.len() > constants::participant::MAX_DISPLAY_NAME_LENGTH
            || metadata
                .avatar
                .as_ref()
                .is_some_and(|a| a.len() > constants::participant::MAX_AVATAR_LENGTH)
        {
            return Err(Error::TooLong(id));
        }
        let display_name = rustrict::trim_whitespace(&metadata.display_name).to_owned();
        if display_name.is_inappropriate() {
            return Err(Error::Sinful(id));
        }
        Ok(DisplayMetadata {
            display_name,
            avatar: metadata.avatar,
        })
    }

    /// Whether `id` was admitted
    pub fn contains(&self, id: ParticipantId) -> bool {
        self.participants.contains_key(&id)
    }

    /// Display metadata of an admitted participant
    pub fn get(&self, id: ParticipantId) -> Option<&DisplayMetadata> {
        self.participants.get(&id)
    }

    /// Admitted IDs in ascending order
    pub fn ids(&self) -> Vec<ParticipantId> {
        self.participants.keys().copied().collect()
    }

    /// Iterates over the roster in ascending ID order
    pub fn iter(&self) -> impl Iterator<Item = (ParticipantId, &DisplayMetadata)> {
        self.participants.iter().map(|(id, m)| (*id, m))
    }

    /// Number of admitted participants
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// Whether nobody was admitted
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}
