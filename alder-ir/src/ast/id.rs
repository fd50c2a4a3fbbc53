/*
 * Copyright Alder Contributors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *      https://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use miette::Diagnostic;
use serde::{Deserialize, Deserializer, Serialize};
use smol_str::SmolStr;
use thiserror::Error;

/// Identifiers. Anything in `Id` is a valid identifier: a nonempty string
/// whose first character is `_` or an ASCII letter and whose remaining
/// characters are `_`, ASCII letters, or ASCII digits. Namespace segments,
/// record keys, attribute names, and tag names all use this grammar.
/// Whether an identifier collides with a keyword of some surface syntax is
/// not this layer's concern.
//
// For now, internally, `Id`s are just owned `SmolStr`s.
#[derive(Serialize, Debug, PartialEq, Eq, Clone, Hash, PartialOrd, Ord)]
pub struct Id(SmolStr);

impl Id {
    /// Get the underlying string
    pub fn into_smolstr(self) -> SmolStr {
        self.0
    }
}

impl AsRef<str> for Id {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.0)
    }
}

// allow `.parse()` on a string to make an `Id`
impl std::str::FromStr for Id {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validate_identifier(s)?;
        Ok(Id(s.into()))
    }
}

/// Identifiers used as annotation keys. Same lexical grammar as [`Id`]; a
/// separate type because annotation keys live in their own namespace and, in
/// surface syntaxes, may shadow keywords that ordinary identifiers cannot.
#[derive(Serialize, Debug, PartialEq, Eq, Clone, Hash, PartialOrd, Ord)]
pub struct AnyId(SmolStr);

impl AnyId {
    /// Get the underlying string
    pub fn into_smolstr(self) -> SmolStr {
        self.0
    }
}

impl AsRef<str> for AnyId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AnyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.0)
    }
}

impl std::str::FromStr for AnyId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validate_identifier(s)?;
        Ok(AnyId(s.into()))
    }
}

/// Deserialize an [`Id`] with validation, rejecting strings that are not
/// valid identifiers.
impl<'de> Deserialize<'de> for Id {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = SmolStr::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Deserialize an [`AnyId`] with validation, rejecting strings that are not
/// valid identifiers.
impl<'de> Deserialize<'de> for AnyId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = SmolStr::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

fn validate_identifier(s: &str) -> Result<(), ParseIdError> {
    let mut chars = s.chars();
    let Some(first) = chars.next() else {
        return Err(ParseIdError::Empty);
    };
    if !(first == '_' || first.is_ascii_alphabetic()) {
        return Err(ParseIdError::InvalidCharacter {
            character: first,
            id: s.into(),
        });
    }
    for character in chars {
        if !(character == '_' || character.is_ascii_alphanumeric()) {
            return Err(ParseIdError::InvalidCharacter { character, id: s.into() });
        }
    }
    Ok(())
}

/// Errors raised when a string does not satisfy the identifier grammar
#[derive(Debug, Clone, PartialEq, Eq, Diagnostic, Error)]
pub enum ParseIdError {
    /// Identifiers must contain at least one character
    #[error("identifiers must not be empty")]
    Empty,
    /// The string contained a character outside the identifier grammar
    #[error("invalid character `{character}` in identifier `{}`", .id.escape_debug())]
    InvalidCharacter {
        /// The first offending character
        character: char,
        /// The full candidate string
        id: SmolStr,
    },
}
