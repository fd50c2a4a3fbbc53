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

use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smol_str::SmolStr;

use super::{EntityType, Expr, ParseIdError};

/// The `Eid` type represents the id of an `Entity`, without the typename.
/// Together with the typename it comprises an `EntityUid`.
/// For example, in `User::"alice"`, the `Eid` is `alice`.
///
/// `Eid`s are free-form strings, not identifiers.
///
/// `Eid` does not implement `Display`, because it is unclear whether
/// `Display` should produce an escaped or an unescaped representation.
/// To get an escaped representation, use `.escaped()`.
/// To get an unescaped representation, use `.as_ref()`.
#[derive(PartialEq, Eq, Debug, Clone, Hash, PartialOrd, Ord)]
pub struct Eid(SmolStr);

impl Eid {
    /// Construct an Eid
    pub fn new(eid: impl Into<SmolStr>) -> Self {
        Eid(eid.into())
    }

    /// Get the contents of the `Eid` as an escaped string
    pub fn escaped(&self) -> SmolStr {
        self.0.escape_debug().collect()
    }
}

impl AsRef<SmolStr> for Eid {
    fn as_ref(&self) -> &SmolStr {
        &self.0
    }
}

impl AsRef<str> for Eid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for Eid {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Eid {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = SmolStr::deserialize(deserializer)?;
        Ok(Eid(value))
    }
}

/// Unique id for an entity, such as `User::"alice"`. An `EntityUid` contains
/// an [`EntityType`] and an [`Eid`] and is immutable once constructed.
///
/// The derived ordering (by type, then eid) gives uid sets and uid-keyed maps
/// a deterministic iteration order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityUid {
    /// Typename of the entity
    ty: EntityType,
    /// Eid of the entity
    eid: Eid,
}

impl EntityUid {
    /// Create an `EntityUid` from its components
    pub fn from_components(ty: EntityType, eid: Eid) -> Self {
        Self { ty, eid }
    }

    /// Create an `EntityUid` with the given (unqualified or `::`-qualified)
    /// typename and (free-form) eid
    pub fn with_eid_and_type(typename: &str, eid: &str) -> Result<Self, ParseIdError> {
        Ok(Self {
            ty: typename.parse()?,
            eid: Eid::new(eid),
        })
    }

    /// Split into the `EntityType` and `Eid` components
    pub fn components(self) -> (EntityType, Eid) {
        (self.ty, self.eid)
    }

    /// Get the type component
    pub fn entity_type(&self) -> &EntityType {
        &self.ty
    }

    /// Get the Eid component
    pub fn eid(&self) -> &Eid {
        &self.eid
    }
}

impl std::fmt::Display for EntityUid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}::\"{}\"", self.entity_type(), self.eid().escaped())
    }
}

/// One principal/action/resource node in the entity graph: a uid, attribute
/// and tag maps whose values reuse the expression grammar as a literal
/// encoding, and the set of this entity's ancestors in the hierarchy.
///
/// Whether the attribute/tag expressions are required to be fully reduced
/// literal values depends on the mode of the containing store; see
/// [`crate::entities::Entities`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// UID
    uid: EntityUid,

    /// Internal BTreeMap of attributes, so that two equal entities encode
    /// identically regardless of attribute insertion order.
    attrs: BTreeMap<SmolStr, Expr>,

    /// Set of ancestors of this `Entity` (i.e., all direct and transitive
    /// parents this store knows of). Computing transitive closure is a
    /// consumer's job; this layer stores the edges it is given.
    ancestors: BTreeSet<EntityUid>,

    /// Tags on this entity; like `attrs` but in a separate namespace.
    tags: BTreeMap<SmolStr, Expr>,
}

impl Entity {
    /// Create a new `Entity` with this uid, attributes, ancestors, and tags.
    ///
    /// Takes already-built maps, so duplicate attribute or tag names cannot
    /// arise here; decoders that read key/value lists must reject duplicates
    /// before calling this.
    pub fn new(
        uid: EntityUid,
        attrs: BTreeMap<SmolStr, Expr>,
        ancestors: BTreeSet<EntityUid>,
        tags: BTreeMap<SmolStr, Expr>,
    ) -> Self {
        Self {
            uid,
            attrs,
            ancestors,
            tags,
        }
    }

    /// Create a new `Entity` with this uid, no attributes, no parents, and
    /// no tags.
    pub fn with_uid(uid: EntityUid) -> Self {
        Self {
            uid,
            attrs: BTreeMap::new(),
            ancestors: BTreeSet::new(),
            tags: BTreeMap::new(),
        }
    }

    /// Get the uid of the entity
    pub fn uid(&self) -> &EntityUid {
        &self.uid
    }

    /// Get the value of the attribute `attr`, if any
    pub fn attr(&self, attr: &str) -> Option<&Expr> {
        self.attrs.get(attr)
    }

    /// Get the value of the tag `tag`, if any
    pub fn tag(&self, tag: &str) -> Option<&Expr> {
        self.tags.get(tag)
    }

    /// Is this entity a descendant of `e` in the entity hierarchy, as far as
    /// this entity's recorded ancestor edges know?
    pub fn is_descendant_of(&self, e: &EntityUid) -> bool {
        self.ancestors.contains(e)
    }

    /// Iterate over this entity's ancestors
    pub fn ancestors(&self) -> impl Iterator<Item = &EntityUid> {
        self.ancestors.iter()
    }

    /// Iterate over (attribute name, value) pairs, in name order
    pub fn attrs(&self) -> impl Iterator<Item = (&SmolStr, &Expr)> {
        self.attrs.iter()
    }

    /// Iterate over (tag name, value) pairs, in name order
    pub fn tags(&self) -> impl Iterator<Item = (&SmolStr, &Expr)> {
        self.tags.iter()
    }

    /// Number of attributes on this entity
    pub fn attrs_len(&self) -> usize {
        self.attrs.len()
    }

    /// Number of tags on this entity
    pub fn tags_len(&self) -> usize {
        self.tags.len()
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:\n  attrs:{}\n  ancestors:{}\n  tags:{}",
            self.uid,
            self.attrs
                .iter()
                .map(|(k, v)| format!("{k}: {v}"))
                .join("; "),
            self.ancestors().join(", "),
            self.tags.iter().map(|(k, v)| format!("{k}: {v}")).join("; "),
        )
    }
}
