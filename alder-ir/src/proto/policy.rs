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

//! Conversions between wire models and the template/link policy AST.

use std::collections::{btree_map, BTreeMap};
use std::sync::Arc;

use crate::ast;

use super::ast::{decode_enum, required};
use super::err::DecodeError;
use super::models;

impl From<ast::Effect> for models::Effect {
    fn from(v: ast::Effect) -> Self {
        match v {
            ast::Effect::Forbid => models::Effect::Forbid,
            ast::Effect::Permit => models::Effect::Permit,
        }
    }
}

impl From<models::Effect> for ast::Effect {
    fn from(v: models::Effect) -> Self {
        match v {
            models::Effect::Forbid => ast::Effect::Forbid,
            models::Effect::Permit => ast::Effect::Permit,
        }
    }
}

impl From<&ast::EntityReference> for models::EntityReference {
    fn from(v: &ast::EntityReference) -> Self {
        match v {
            ast::EntityReference::Slot => Self {
                slot: Some(models::Empty {}),
                euid: None,
            },
            ast::EntityReference::EUID(euid) => Self {
                slot: None,
                euid: Some(models::EntityUid::from(euid.as_ref())),
            },
        }
    }
}

impl TryFrom<&models::EntityReference> for ast::EntityReference {
    type Error = DecodeError;
    fn try_from(v: &models::EntityReference) -> Result<Self, Self::Error> {
        match (&v.slot, &v.euid) {
            (Some(_), None) => Ok(ast::EntityReference::Slot),
            (None, Some(euid)) => Ok(ast::EntityReference::euid(Arc::new(
                ast::EntityUid::try_from(euid)?,
            ))),
            _ => Err(DecodeError::MalformedNode {
                node: "EntityReference",
            }),
        }
    }
}

impl From<&ast::PrincipalOrResourceConstraint> for models::PrincipalOrResourceConstraint {
    fn from(v: &ast::PrincipalOrResourceConstraint) -> Self {
        match v {
            ast::PrincipalOrResourceConstraint::Any => Self {
                any: Some(models::Empty {}),
                ..Self::default()
            },
            ast::PrincipalOrResourceConstraint::In(er) => Self {
                r#in: Some(models::EntityReference::from(er)),
                ..Self::default()
            },
            ast::PrincipalOrResourceConstraint::Eq(er) => Self {
                eq: Some(models::EntityReference::from(er)),
                ..Self::default()
            },
            ast::PrincipalOrResourceConstraint::Is(entity_type) => Self {
                is: Some(models::EntityType::from(entity_type)),
                ..Self::default()
            },
            ast::PrincipalOrResourceConstraint::IsIn(er, entity_type) => Self {
                is_in: Some(models::IsInConstraint {
                    er: Some(models::EntityReference::from(er)),
                    entity_type: Some(models::EntityType::from(entity_type)),
                }),
                ..Self::default()
            },
        }
    }
}

impl TryFrom<&models::PrincipalOrResourceConstraint> for ast::PrincipalOrResourceConstraint {
    type Error = DecodeError;
    fn try_from(v: &models::PrincipalOrResourceConstraint) -> Result<Self, Self::Error> {
        match (&v.any, &v.r#in, &v.eq, &v.is, &v.is_in) {
            (Some(_), None, None, None, None) => Ok(ast::PrincipalOrResourceConstraint::Any),
            (None, Some(er), None, None, None) => Ok(ast::PrincipalOrResourceConstraint::In(
                ast::EntityReference::try_from(er)?,
            )),
            (None, None, Some(er), None, None) => Ok(ast::PrincipalOrResourceConstraint::Eq(
                ast::EntityReference::try_from(er)?,
            )),
            (None, None, None, Some(entity_type), None) => Ok(
                ast::PrincipalOrResourceConstraint::Is(ast::EntityType::try_from(entity_type)?),
            ),
            (None, None, None, None, Some(is_in)) => {
                let er = ast::EntityReference::try_from(required(&is_in.er, "IsInConstraint")?)?;
                let entity_type =
                    ast::EntityType::try_from(required(&is_in.entity_type, "IsInConstraint")?)?;
                Ok(ast::PrincipalOrResourceConstraint::IsIn(er, entity_type))
            }
            _ => Err(DecodeError::MalformedNode {
                node: "PrincipalOrResourceConstraint",
            }),
        }
    }
}

impl From<&ast::PrincipalConstraint> for models::PrincipalOrResourceConstraint {
    fn from(v: &ast::PrincipalConstraint) -> Self {
        Self::from(v.as_inner())
    }
}

impl From<&ast::ResourceConstraint> for models::PrincipalOrResourceConstraint {
    fn from(v: &ast::ResourceConstraint) -> Self {
        Self::from(v.as_inner())
    }
}

impl From<&ast::ActionConstraint> for models::ActionConstraint {
    fn from(v: &ast::ActionConstraint) -> Self {
        match v {
            ast::ActionConstraint::Any => Self {
                any: Some(models::Empty {}),
                ..Self::default()
            },
            ast::ActionConstraint::In(euids) => Self {
                r#in: Some(models::EuidList {
                    euids: euids
                        .iter()
                        .map(|euid| models::EntityUid::from(euid.as_ref()))
                        .collect(),
                }),
                ..Self::default()
            },
            ast::ActionConstraint::Eq(euid) => Self {
                eq: Some(models::EntityUid::from(euid.as_ref())),
                ..Self::default()
            },
        }
    }
}

impl TryFrom<&models::ActionConstraint> for ast::ActionConstraint {
    type Error = DecodeError;
    fn try_from(v: &models::ActionConstraint) -> Result<Self, Self::Error> {
        match (&v.any, &v.r#in, &v.eq) {
            (Some(_), None, None) => Ok(ast::ActionConstraint::any()),
            (None, Some(list), None) => {
                let euids = list
                    .euids
                    .iter()
                    .map(ast::EntityUid::try_from)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ast::ActionConstraint::is_in(euids))
            }
            (None, None, Some(euid)) => {
                Ok(ast::ActionConstraint::is_eq(ast::EntityUid::try_from(euid)?))
            }
            _ => Err(DecodeError::MalformedNode {
                node: "ActionConstraint",
            }),
        }
    }
}

impl From<&ast::TemplateBody> for models::TemplateBody {
    fn from(v: &ast::TemplateBody) -> Self {
        Self {
            id: v.id().as_ref().to_string(),
            // annotations iterate in key order, keeping the entry list
            // deterministic
            annotations: v
                .annotations()
                .map(|(key, annotation)| models::AnnotationEntry {
                    key: key.to_string(),
                    value: Some(models::Annotation {
                        val: annotation.val.to_string(),
                    }),
                })
                .collect(),
            effect: models::Effect::from(v.effect()) as i32,
            principal_constraint: Some(models::PrincipalOrResourceConstraint::from(
                v.principal_constraint(),
            )),
            action_constraint: Some(models::ActionConstraint::from(v.action_constraint())),
            resource_constraint: Some(models::PrincipalOrResourceConstraint::from(
                v.resource_constraint(),
            )),
            non_scope_constraints: Some(models::Expr::from(v.non_scope_constraints())),
        }
    }
}

impl TryFrom<&models::TemplateBody> for ast::TemplateBody {
    type Error = DecodeError;
    fn try_from(v: &models::TemplateBody) -> Result<Self, Self::Error> {
        let id = ast::PolicyId::from_string(&v.id);

        let mut annotations = BTreeMap::new();
        for entry in &v.annotations {
            let key = entry.key.parse::<ast::AnyId>()?;
            let value = required(&entry.value, "AnnotationEntry")?;
            match annotations.entry(key) {
                btree_map::Entry::Vacant(spot) => {
                    spot.insert(ast::Annotation {
                        val: value.val.as_str().into(),
                    });
                }
                btree_map::Entry::Occupied(existing) => {
                    return Err(DecodeError::DuplicateKey {
                        context: "annotations",
                        key: existing.key().clone().into_smolstr(),
                    });
                }
            }
        }

        let effect = decode_enum::<models::Effect>("Effect", v.effect)?;
        let principal_constraint =
            ast::PrincipalConstraint::new(ast::PrincipalOrResourceConstraint::try_from(
                required(&v.principal_constraint, "TemplateBody")?,
            )?);
        let action_constraint =
            ast::ActionConstraint::try_from(required(&v.action_constraint, "TemplateBody")?)?;
        let resource_constraint =
            ast::ResourceConstraint::new(ast::PrincipalOrResourceConstraint::try_from(
                required(&v.resource_constraint, "TemplateBody")?,
            )?);
        let non_scope_constraints =
            ast::Expr::try_from(required(&v.non_scope_constraints, "TemplateBody")?)?;

        Ok(ast::TemplateBody::new(
            id,
            ast::Annotations::from(annotations),
            ast::Effect::from(effect),
            principal_constraint,
            action_constraint,
            resource_constraint,
            non_scope_constraints,
        ))
    }
}

impl From<&ast::LiteralPolicy> for models::LiteralPolicy {
    fn from(v: &ast::LiteralPolicy) -> Self {
        Self {
            template_id: v.template_id().as_ref().to_string(),
            link_id: v.link_id().map(|id| id.as_ref().to_string()),
            link_id_specified: v.link_id().is_some(),
            principal_euid: v
                .value(&ast::SlotId::Principal)
                .map(models::EntityUid::from),
            resource_euid: v
                .value(&ast::SlotId::Resource)
                .map(models::EntityUid::from),
        }
    }
}

impl TryFrom<&models::LiteralPolicy> for ast::LiteralPolicy {
    type Error = DecodeError;
    fn try_from(v: &models::LiteralPolicy) -> Result<Self, Self::Error> {
        let template_id = ast::PolicyId::from_string(&v.template_id);
        let link_id = match (&v.link_id, v.link_id_specified) {
            (Some(id), true) => Some(ast::PolicyId::from_string(id)),
            (None, false) => None,
            // the two fields must agree
            _ => {
                return Err(DecodeError::MalformedNode {
                    node: "LiteralPolicy",
                })
            }
        };

        let mut values = ast::SlotEnv::new();
        if let Some(euid) = &v.principal_euid {
            values.insert(ast::SlotId::Principal, ast::EntityUid::try_from(euid)?);
        }
        if let Some(euid) = &v.resource_euid {
            values.insert(ast::SlotId::Resource, ast::EntityUid::try_from(euid)?);
        }

        match link_id {
            Some(link_id) => Ok(ast::LiteralPolicy::template_linked_policy(
                template_id,
                link_id,
                values,
            )),
            None if values.is_empty() => Ok(ast::LiteralPolicy::static_policy(template_id)),
            // a static policy has no open slots, so a binding can never be
            // used; reject rather than silently drop it
            None => Err(DecodeError::MalformedNode {
                node: "LiteralPolicy",
            }),
        }
    }
}

impl From<&ast::LiteralPolicySet> for models::LiteralPolicySet {
    fn from(v: &ast::LiteralPolicySet) -> Self {
        Self {
            templates: v.templates().map(models::TemplateBody::from).collect(),
            links: v.links().map(models::LiteralPolicy::from).collect(),
        }
    }
}

impl TryFrom<&models::LiteralPolicySet> for ast::LiteralPolicySet {
    type Error = DecodeError;
    fn try_from(v: &models::LiteralPolicySet) -> Result<Self, Self::Error> {
        let mut templates = BTreeMap::new();
        for template in &v.templates {
            let template = ast::TemplateBody::try_from(template)?;
            match templates.entry(template.id().clone()) {
                btree_map::Entry::Vacant(spot) => {
                    spot.insert(Arc::new(template));
                }
                btree_map::Entry::Occupied(existing) => {
                    return Err(DecodeError::DuplicateKey {
                        context: "policy set templates",
                        key: existing.key().as_ref().into(),
                    });
                }
            }
        }

        let mut links = BTreeMap::new();
        for link in &v.links {
            let link = ast::LiteralPolicy::try_from(link)?;
            match links.entry(link.id().clone()) {
                btree_map::Entry::Vacant(spot) => {
                    spot.insert(link);
                }
                btree_map::Entry::Occupied(existing) => {
                    return Err(DecodeError::DuplicateKey {
                        context: "policy set links",
                        key: existing.key().as_ref().into(),
                    });
                }
            }
        }

        Ok(ast::LiteralPolicySet::new(
            templates.into_values(),
            links.into_values(),
        ))
    }
}
