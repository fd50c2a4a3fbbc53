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

//! Conversions between wire models and the entity store.

use std::collections::{btree_map, BTreeMap, BTreeSet};

use smol_str::SmolStr;

use crate::ast;
use crate::entities::{Entities, Mode};

use super::ast::{decode_enum, required};
use super::err::DecodeError;
use super::models;

impl From<Mode> for models::Mode {
    fn from(v: Mode) -> Self {
        match v {
            Mode::Concrete => models::Mode::Concrete,
            Mode::Partial => models::Mode::Partial,
        }
    }
}

impl From<models::Mode> for Mode {
    fn from(v: models::Mode) -> Self {
        match v {
            models::Mode::Concrete => Mode::Concrete,
            models::Mode::Partial => Mode::Partial,
        }
    }
}

impl From<&ast::Entity> for models::Entity {
    fn from(v: &ast::Entity) -> Self {
        let attr_entry = |(key, value): (&SmolStr, &ast::Expr)| models::AttrEntry {
            key: key.to_string(),
            value: Some(models::Expr::from(value)),
        };
        Self {
            uid: Some(models::EntityUid::from(v.uid())),
            attrs: v.attrs().map(attr_entry).collect(),
            ancestors: v.ancestors().map(models::EntityUid::from).collect(),
            tags: v.tags().map(attr_entry).collect(),
        }
    }
}

impl TryFrom<&models::Entity> for ast::Entity {
    type Error = DecodeError;
    fn try_from(v: &models::Entity) -> Result<Self, Self::Error> {
        let uid = ast::EntityUid::try_from(required(&v.uid, "Entity")?)?;
        let attrs = fold_attr_entries(&v.attrs, "entity attributes")?;
        // a repeated ancestor edge is not a conflict, so the set just
        // absorbs it
        let ancestors = v
            .ancestors
            .iter()
            .map(ast::EntityUid::try_from)
            .collect::<Result<BTreeSet<_>, _>>()?;
        let tags = fold_attr_entries(&v.tags, "entity tags")?;
        Ok(ast::Entity::new(uid, attrs, ancestors, tags))
    }
}

/// Fold a key/value entry list into a map, validating keys against the
/// identifier grammar and rejecting duplicates.
fn fold_attr_entries(
    entries: &[models::AttrEntry],
    context: &'static str,
) -> Result<BTreeMap<SmolStr, ast::Expr>, DecodeError> {
    let mut map = BTreeMap::new();
    for entry in entries {
        let key = entry.key.parse::<ast::Id>()?.into_smolstr();
        let value = ast::Expr::try_from(required(&entry.value, "AttrEntry")?)?;
        match map.entry(key) {
            btree_map::Entry::Vacant(spot) => {
                spot.insert(value);
            }
            btree_map::Entry::Occupied(existing) => {
                return Err(DecodeError::DuplicateKey {
                    context,
                    key: existing.key().clone(),
                });
            }
        }
    }
    Ok(map)
}

impl From<&Entities> for models::Entities {
    fn from(v: &Entities) -> Self {
        Self {
            entities: v.iter().map(models::Entity::from).collect(),
            mode: models::Mode::from(v.mode()) as i32,
        }
    }
}

impl TryFrom<&models::Entities> for Entities {
    type Error = DecodeError;
    fn try_from(v: &models::Entities) -> Result<Self, Self::Error> {
        let mode = decode_enum::<models::Mode>("Mode", v.mode)?;
        let entities = v
            .entities
            .iter()
            .map(ast::Entity::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        // the same invariants hold for a decoded store as for one built in
        // memory
        Ok(Entities::from_entities(entities, Mode::from(mode))?)
    }
}
