//! Core type definitions with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// Invalid work change kind value.
    #[error("invalid change kind: {value}")]
    InvalidChangeKind { value: String },
}

/// Generates a validated string ID newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                Ok(Self(id))
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// A validated work assignment identifier.
    WorkId, "work ID"
);

define_string_id!(
    /// A validated work change identifier.
    ChangeId, "change ID"
);

define_string_id!(
    /// A validated break identifier.
    BreakId, "break ID"
);

define_string_id!(
    /// A validated client identifier.
    ///
    /// Clients own works, breaks, and the rects derived from them. Replacements
    /// may hand part of a work over to a different client.
    ClientId, "client ID"
);

define_string_id!(
    /// A validated shift identifier.
    ///
    /// Opaque to the engine; carried through for callers.
    ShiftId, "shift ID"
);

define_string_id!(
    /// The record a rect was derived from: a work or a break.
    ///
    /// Correction and replacement rects carry the ID of their parent work, so
    /// rects sharing a source ID never collide with each other.
    SourceId, "source ID"
);

impl From<&WorkId> for SourceId {
    fn from(id: &WorkId) -> Self {
        Self(id.0.clone())
    }
}

impl From<&BreakId> for SourceId {
    fn from(id: &BreakId) -> Self {
        Self(id.0.clone())
    }
}

/// Which boundary of a work a change adjusts, and whether it hands the
/// adjusted span to another client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Moves the work's start to the correction's end.
    StartCorrection,
    /// Moves the work's end to the correction's start.
    EndCorrection,
    /// Moves the work's start to the replacement's end.
    StartReplacement,
    /// Moves the work's end to the replacement's start.
    EndReplacement,
}

impl ChangeKind {
    /// String representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::StartCorrection => "start_correction",
            Self::EndCorrection => "end_correction",
            Self::StartReplacement => "start_replacement",
            Self::EndReplacement => "end_replacement",
        }
    }

    /// Whether this change adjusts the start boundary.
    #[must_use]
    pub const fn adjusts_start(self) -> bool {
        matches!(self, Self::StartCorrection | Self::StartReplacement)
    }

    /// Whether this change hands its span to a replacement client.
    #[must_use]
    pub const fn is_replacement(self) -> bool {
        matches!(self, Self::StartReplacement | Self::EndReplacement)
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ChangeKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start_correction" => Ok(Self::StartCorrection),
            "end_correction" => Ok(Self::EndCorrection),
            "start_replacement" => Ok(Self::StartReplacement),
            "end_replacement" => Ok(Self::EndReplacement),
            _ => Err(ValidationError::InvalidChangeKind {
                value: s.to_string(),
            }),
        }
    }
}
