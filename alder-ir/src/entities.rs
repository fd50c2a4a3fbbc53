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

//! This module contains the entity store: the container for entities and
//! their attribute, tag, and hierarchy data.

use std::collections::{btree_map, BTreeMap};

use crate::ast::{BorrowedRestrictedExpr, Entity, EntityUid};

mod err;
pub use err::*;

/// Represents an entity hierarchy, and allows looking up `Entity` objects by
/// UID.
///
/// Entities are kept in uid order, so iteration order (and everything derived
/// from it, including the wire encoding) is deterministic.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Entities {
    /// Important internal invariant: in `Concrete` mode, every attribute and
    /// tag value of every entity is a restricted expression. This is
    /// established by `from_entities` and cannot be broken afterwards because
    /// entities are immutable once stored.
    entities: BTreeMap<EntityUid, Entity>,

    /// The mode flag determines whether this store functions as a partial
    /// store or as a fully concrete store.
    /// `Mode::Concrete` means that the store is fully concrete, and failed
    /// dereferences mean the entity does not exist.
    /// `Mode::Partial` means the store is partial, and failed dereferences
    /// mean the entity's presence is unknown.
    mode: Mode,
}

impl Entities {
    /// Create a fresh `Entities` with no entities, in `Concrete` mode
    pub fn new() -> Self {
        Self {
            entities: BTreeMap::new(),
            mode: Mode::default(),
        }
    }

    /// Create an `Entities` object with the given entities and mode.
    ///
    /// Fails if the input contains two entities with the same uid, or, in
    /// `Concrete` mode, if any attribute or tag value is not a restricted
    /// expression. Violations are reported in a deterministic order: entities
    /// in uid order, and within an entity all attributes (in key order)
    /// before all tags (in key order).
    pub fn from_entities(
        entities: impl IntoIterator<Item = Entity>,
        mode: Mode,
    ) -> Result<Self> {
        let mut entity_map = BTreeMap::new();
        for entity in entities {
            match entity_map.entry(entity.uid().clone()) {
                btree_map::Entry::Occupied(oentry) => {
                    return Err(EntitiesError::Duplicate {
                        uid: oentry.key().clone(),
                    });
                }
                btree_map::Entry::Vacant(ventry) => {
                    ventry.insert(entity);
                }
            }
        }
        if mode == Mode::Concrete {
            for entity in entity_map.values() {
                for (key, value) in entity.attrs().chain(entity.tags()) {
                    if let Err(source) = BorrowedRestrictedExpr::new(value) {
                        return Err(EntitiesError::UnresolvedValue {
                            uid: entity.uid().clone(),
                            key: key.clone(),
                            source,
                        });
                    }
                }
            }
        }
        Ok(Self {
            entities: entity_map,
            mode,
        })
    }

    /// Get the `Entity` with the given UID, if any
    pub fn entity(&self, uid: &EntityUid) -> Dereference<'_, Entity> {
        match self.entities.get(uid) {
            Some(e) => Dereference::Data(e),
            None => match self.mode {
                Mode::Concrete => Dereference::NoSuchEntity,
                Mode::Partial => Dereference::Unknown,
            },
        }
    }

    /// Iterate over the `Entity`s in the `Entities`, in uid order
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// The number of entities in the store
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the store contains no entities
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Get the mode of this store
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Does the hierarchy place `child` below `ancestor`?
    ///
    /// Three-valued: `Some(true)` when `child` is stored and records
    /// `ancestor` in its ancestor set; `Some(false)` when `child` is stored
    /// without that edge (a stored entity's ancestor set is authoritative,
    /// in both modes), or when `child` is absent from a `Concrete` store;
    /// `None` when `child` is absent from a `Partial` store.
    pub fn is_descendant_of(&self, child: &EntityUid, ancestor: &EntityUid) -> Option<bool> {
        match self.entity(child) {
            Dereference::Data(e) => Some(e.is_descendant_of(ancestor)),
            Dereference::NoSuchEntity => Some(false),
            Dereference::Unknown => None,
        }
    }
}

impl std::fmt::Display for Entities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for e in self.entities.values() {
            writeln!(f, "{e}")?;
        }
        Ok(())
    }
}

/// The mode of an entity store. See [`Entities`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Fully concrete store: an entity not in the store does not exist, and
    /// all attribute and tag values are restricted expressions
    Concrete,
    /// Partial store: an entity not in the store may or may not exist, and
    /// attribute and tag values may mention variables, slots, and operators
    Partial,
}

impl Default for Mode {
    fn default() -> Self {
        Self::Concrete
    }
}

/// Results from dereferencing values from the Entity Store
#[derive(Debug, Clone)]
pub enum Dereference<'a, T> {
    /// No entity with the dereferenced EntityUid exists. This is an error.
    NoSuchEntity,
    /// The entity store is partial, so it is unknown whether the entity
    /// exists
    Unknown,
    /// The entity store has returned the requested data.
    Data(&'a T),
}

impl<'a, T> Dereference<'a, T>
where
    T: std::fmt::Debug,
{
    /// Returns the contained `Data` value, consuming the `self` value.
    ///
    /// Because this function may panic, its use is generally discouraged.
    /// Instead, prefer to use pattern matching and handle the `NoSuchEntity`
    /// and `Unknown` cases explicitly.
    ///
    /// # Panics
    ///
    /// Panics if the self value is not `Data`.
    // PANIC SAFETY: This function is intended to panic, and says so in the documentation
    #[allow(clippy::panic)]
    pub fn unwrap(self) -> &'a T {
        match self {
            Self::Data(e) => e,
            e => panic!("unwrap() called on {:?}", e),
        }
    }

    /// Returns the contained `Data` value, consuming the `self` value.
    ///
    /// Because this function may panic, its use is generally discouraged.
    /// Instead, prefer to use pattern matching and handle the `NoSuchEntity`
    /// and `Unknown` cases explicitly.
    ///
    /// # Panics
    ///
    /// Panics if the self value is not `Data`.
    // PANIC SAFETY: This function is intended to panic, and says so in the documentation
    #[allow(clippy::panic)]
    #[track_caller] // report the caller's location as the location of the panic, not the location in this function
    pub fn expect(self, msg: &str) -> &'a T {
        match self {
            Self::Data(e) => e,
            e => panic!("expect() called on {:?}, msg: {msg}", e),
        }
    }
}

// PANIC SAFETY tests
#[allow(clippy::panic)]
// PANIC SAFETY tests
#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod test {
    use std::collections::{BTreeMap, BTreeSet};

    use cool_asserts::assert_matches;

    use super::*;
    use crate::ast::{Expr, SlotId, Var};

    fn uid(ty: &str, eid: &str) -> EntityUid {
        EntityUid::with_eid_and_type(ty, eid).unwrap()
    }

    fn alice_in_admins() -> Entity {
        Entity::new(
            uid("User", "alice"),
            BTreeMap::from([("age".into(), Expr::val(30))]),
            BTreeSet::from([uid("Group", "admins")]),
            BTreeMap::from([("dept".into(), Expr::val("eng"))]),
        )
    }

    #[test]
    fn concrete_lookup() {
        let es = Entities::from_entities([alice_in_admins()], Mode::Concrete).unwrap();
        assert_eq!(es.len(), 1);
        assert!(!es.is_empty());
        assert_eq!(es.mode(), Mode::Concrete);
        let alice = es.entity(&uid("User", "alice")).unwrap();
        assert_eq!(alice.attr("age"), Some(&Expr::val(30)));
        assert_eq!(alice.tag("dept"), Some(&Expr::val("eng")));
        assert_matches!(es.entity(&uid("User", "bob")), Dereference::NoSuchEntity);
    }

    #[test]
    fn partial_lookup() {
        let es = Entities::from_entities([alice_in_admins()], Mode::Partial).unwrap();
        assert_matches!(es.entity(&uid("User", "alice")), Dereference::Data(_));
        assert_matches!(es.entity(&uid("User", "bob")), Dereference::Unknown);
    }

    #[test]
    fn duplicate_uid_rejected() {
        let result = Entities::from_entities(
            [alice_in_admins(), Entity::with_uid(uid("User", "alice"))],
            Mode::Concrete,
        );
        assert_matches!(
            result,
            Err(EntitiesError::Duplicate { uid: u }) => {
                assert_eq!(u, uid("User", "alice"));
            }
        );
    }

    #[test]
    fn concrete_rejects_unresolved_values() {
        let bad = Entity::new(
            uid("User", "alice"),
            BTreeMap::from([("owner".into(), Expr::var(Var::Principal))]),
            BTreeSet::new(),
            BTreeMap::new(),
        );
        assert_matches!(
            Entities::from_entities([bad.clone()], Mode::Concrete),
            Err(EntitiesError::UnresolvedValue { uid: u, key, .. }) => {
                assert_eq!(u, uid("User", "alice"));
                assert_eq!(key, "owner");
            }
        );
        // the same input is accepted by a partial store
        let es = Entities::from_entities([bad], Mode::Partial).unwrap();
        assert_matches!(es.entity(&uid("User", "alice")), Dereference::Data(_));
    }

    #[test]
    fn concrete_rejects_unresolved_tags() {
        let bad = Entity::new(
            uid("User", "alice"),
            BTreeMap::new(),
            BTreeSet::new(),
            BTreeMap::from([("grant".into(), Expr::slot(SlotId::Principal))]),
        );
        assert_matches!(
            Entities::from_entities([bad], Mode::Concrete),
            Err(EntitiesError::UnresolvedValue { key, .. }) => {
                assert_eq!(key, "grant");
            }
        );
    }

    #[test]
    fn first_violation_is_deterministic() {
        // within one entity, attrs are checked before tags regardless of key
        // order across the two maps
        let entity = Entity::new(
            uid("User", "alice"),
            BTreeMap::from([("z".into(), Expr::var(Var::Principal))]),
            BTreeSet::new(),
            BTreeMap::from([("a".into(), Expr::var(Var::Principal))]),
        );
        assert_matches!(
            Entities::from_entities([entity], Mode::Concrete),
            Err(EntitiesError::UnresolvedValue { key, .. }) => {
                assert_eq!(key, "z");
            }
        );
        // across entities, the lowest uid is reported first
        let mk = |eid: &str| {
            Entity::new(
                uid("User", eid),
                BTreeMap::from([("k".into(), Expr::var(Var::Principal))]),
                BTreeSet::new(),
                BTreeMap::new(),
            )
        };
        assert_matches!(
            Entities::from_entities([mk("b"), mk("a")], Mode::Concrete),
            Err(EntitiesError::UnresolvedValue { uid: u, .. }) => {
                assert_eq!(u, uid("User", "a"));
            }
        );
    }

    #[test]
    fn descendant_queries_are_three_valued() {
        let concrete = Entities::from_entities([alice_in_admins()], Mode::Concrete).unwrap();
        assert_eq!(
            concrete.is_descendant_of(&uid("User", "alice"), &uid("Group", "admins")),
            Some(true)
        );
        assert_eq!(
            concrete.is_descendant_of(&uid("User", "alice"), &uid("Group", "sre")),
            Some(false)
        );
        assert_eq!(
            concrete.is_descendant_of(&uid("User", "bob"), &uid("Group", "admins")),
            Some(false)
        );

        let partial = Entities::from_entities([alice_in_admins()], Mode::Partial).unwrap();
        // a stored entity's ancestor set is authoritative even in a partial store
        assert_eq!(
            partial.is_descendant_of(&uid("User", "alice"), &uid("Group", "sre")),
            Some(false)
        );
        assert_eq!(
            partial.is_descendant_of(&uid("User", "bob"), &uid("Group", "admins")),
            None
        );
    }

    #[test]
    fn iteration_is_in_uid_order() {
        let es = Entities::from_entities(
            [
                Entity::with_uid(uid("User", "b")),
                Entity::with_uid(uid("User", "a")),
            ],
            Mode::Concrete,
        )
        .unwrap();
        let uids: Vec<_> = es.iter().map(Entity::uid).collect();
        assert_eq!(uids, vec![&uid("User", "a"), &uid("User", "b")]);
    }
}
