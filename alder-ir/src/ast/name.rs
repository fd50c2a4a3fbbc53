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

use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smol_str::ToSmolStr;

use super::{Id, ParseIdError};

/// This is the `Name` type used to name entity types, extension functions,
/// etc. The name can include namespaces.
/// Clone is O(1).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name {
    /// Basename
    pub(crate) id: Id,
    /// Namespaces, outermost first
    pub(crate) path: Arc<Vec<Id>>,
}

impl Name {
    /// A full constructor for `Name`
    pub fn new(basename: Id, path: impl IntoIterator<Item = Id>) -> Self {
        Self {
            id: basename,
            path: Arc::new(path.into_iter().collect()),
        }
    }

    /// Create a `Name` with no path (no namespaces).
    pub fn unqualified_name(id: Id) -> Self {
        Self {
            id,
            path: Arc::new(vec![]),
        }
    }

    /// Get the basename of the `Name` (ie, with namespaces stripped).
    pub fn basename(&self) -> &Id {
        &self.id
    }

    /// Get the namespace of the `Name`, as components
    pub fn namespace_components(&self) -> impl Iterator<Item = &Id> {
        self.path.iter()
    }

    /// Get the full namespace of the `Name`, as a single string.
    ///
    /// Examples:
    /// - `foo::bar` --> the namespace is `"foo"`
    /// - `bar` --> the namespace is `""`
    /// - `foo::bar::baz` --> the namespace is `"foo::bar"`
    pub fn namespace(&self) -> String {
        use itertools::Itertools;
        self.path.iter().join("::")
    }

    /// Test if a `Name` is an `Id`
    pub fn is_unqualified(&self) -> bool {
        self.path.is_empty()
    }
}

impl std::fmt::Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for elem in self.path.as_ref() {
            write!(f, "{}::", elem)?;
        }
        write!(f, "{}", self.id)?;
        Ok(())
    }
}

/// Serialize a `Name` using its `Display` implementation
impl Serialize for Name {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_smolstr().serialize(serializer)
    }
}

/// Deserialize a `Name` by parsing its `::`-separated string form
impl<'de> Deserialize<'de> for Name {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// allow `.parse()` on a string to make a `Name`
impl std::str::FromStr for Name {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut ids = s
            .split("::")
            .map(Id::from_str)
            .collect::<Result<Vec<Id>, ParseIdError>>()?;
        // `split` always yields at least one element, so `ids` is nonempty
        match ids.pop() {
            Some(basename) => Ok(Self::new(basename, ids)),
            None => Err(ParseIdError::Empty),
        }
    }
}

impl From<Id> for Name {
    fn from(value: Id) -> Self {
        Self::unqualified_name(value)
    }
}

/// The type of an entity, a wrapper around [`Name`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityType(Name);

impl EntityType {
    /// The name of this entity type
    pub fn name(&self) -> &Name {
        &self.0
    }
}

impl AsRef<Name> for EntityType {
    fn as_ref(&self) -> &Name {
        &self.0
    }
}

impl From<Name> for EntityType {
    fn from(n: Name) -> Self {
        Self(n)
    }
}

impl From<EntityType> for Name {
    fn from(ty: EntityType) -> Name {
        ty.0
    }
}

impl std::str::FromStr for EntityType {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a template slot. Only the principal and resource positions
/// of a template scope may be slotted.
#[derive(Debug, Clone, Copy, Eq, PartialEq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SlotId {
    /// The slot filled by the link's principal binding
    #[serde(rename = "?principal")]
    Principal,
    /// The slot filled by the link's resource binding
    #[serde(rename = "?resource")]
    Resource,
}

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SlotId::Principal => "principal",
            SlotId::Resource => "resource",
        };
        write!(f, "?{s}")
    }
}
