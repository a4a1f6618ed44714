use super::{Result, RosterError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// JSON field holding an account's character identifiers.
pub const CHARACTERS_FIELD: &str = "characters";

/// JSON field holding a character's display name.
pub const CHARACTER_NAME_FIELD: &str = "characterName";

/// Display name used for characters whose record could not be read.
pub const UNKNOWN_CHARACTER_NAME: &str = "Unknown";

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Identifier of an account record.
    AccountId
);

string_id!(
    /// Identifier of a character record.
    CharacterId
);

/// Whether side-effecting store calls touch storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    #[default]
    Apply,
    /// Report the write, leave storage untouched.
    DryRun,
}

impl WriteMode {
    pub fn from_dry_run(dry_run: bool) -> Self {
        if dry_run { Self::DryRun } else { Self::Apply }
    }

    pub fn is_dry_run(self) -> bool {
        self == Self::DryRun
    }
}

/// A player's saved-game record.
///
/// Only the character list is interpreted; every other field of the stored
/// document is carried through untouched so a rewrite keeps the game's data.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub id: AccountId,
    pub characters: Vec<CharacterId>,
    document: Map<String, Value>,
}

impl Account {
    pub fn new(id: impl Into<AccountId>, characters: Vec<CharacterId>) -> Self {
        Self {
            id: id.into(),
            characters,
            document: Map::new(),
        }
    }

    /// Build an account from its decoded JSON document.
    pub fn from_document(id: AccountId, document: Value) -> Result<Self> {
        let Value::Object(document) = document else {
            return Err(RosterError::Decode(format!(
                "account '{}' is not a JSON object",
                id
            )));
        };

        let characters = match document.get(CHARACTERS_FIELD) {
            None | Some(Value::Null) => Vec::new(),
            Some(value) => serde_json::from_value(value.clone()).map_err(|err| {
                RosterError::Decode(format!(
                    "account '{}' has an invalid '{}' list: {}",
                    id, CHARACTERS_FIELD, err
                ))
            })?,
        };

        Ok(Self {
            id,
            characters,
            document,
        })
    }

    /// The stored document with the current character list written back in place.
    pub fn to_document(&self) -> Value {
        let mut document = self.document.clone();
        let characters = self
            .characters
            .iter()
            .map(|id| Value::String(id.as_str().to_string()))
            .collect();
        document.insert(CHARACTERS_FIELD.to_string(), Value::Array(characters));
        Value::Object(document)
    }

    pub fn character_count(&self) -> usize {
        self.characters.len()
    }
}

/// One saved character; read-only here.
#[derive(Debug, Clone, PartialEq)]
pub struct Character {
    pub id: CharacterId,
    pub name: String,
    attributes: Map<String, Value>,
}

impl Character {
    pub fn new(id: impl Into<CharacterId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            attributes: Map::new(),
        }
    }

    /// Stand-in for a record that is missing or unreadable: default
    /// attributes, placeholder name.
    pub fn placeholder(id: CharacterId) -> Self {
        Self::new(id, UNKNOWN_CHARACTER_NAME)
    }

    pub fn from_document(id: CharacterId, document: Value) -> Result<Self> {
        let Value::Object(attributes) = document else {
            return Err(RosterError::Decode(format!(
                "character '{}' is not a JSON object",
                id
            )));
        };

        let name = attributes
            .get(CHARACTER_NAME_FIELD)
            .and_then(Value::as_str)
            .unwrap_or(UNKNOWN_CHARACTER_NAME)
            .to_string();

        Ok(Self {
            id,
            name,
            attributes,
        })
    }

    pub fn with_attribute(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }
}

/// Characters removed from an account by its latest trims, pending restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverflowEntry {
    #[serde(skip)]
    pub account: AccountId,
    #[serde(default)]
    pub trimmed_characters: Vec<CharacterId>,
}

impl OverflowEntry {
    pub fn new(account: AccountId, trimmed_characters: Vec<CharacterId>) -> Self {
        Self {
            account,
            trimmed_characters,
        }
    }

    pub fn len(&self) -> usize {
        self.trimmed_characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trimmed_characters.is_empty()
    }
}
