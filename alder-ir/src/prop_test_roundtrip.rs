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

#![cfg(test)]
// PANIC SAFETY unit tests
#![allow(clippy::panic)]
// PANIC SAFETY unit tests
#![allow(clippy::unwrap_used)]

//! Property tests for the wire format: round-trip and determinism over
//! generated values.

use std::collections::BTreeMap;
use std::sync::Arc;

use proptest::prelude::*;
use smol_str::SmolStr;

use crate::ast::{
    ActionConstraint, Annotation, Annotations, AnyId, BinaryOp, Context, Effect, Eid, Entity,
    EntityReference, EntityType, EntityUid, EntityUidEntry, Expr, Id, LiteralPolicy,
    LiteralPolicySet, Name, PatternElem, PolicyId, PrincipalConstraint,
    PrincipalOrResourceConstraint, Request, ResourceConstraint, SlotEnv, SlotId, TemplateBody,
    UnaryOp, Var,
};
use crate::entities::{Entities, Mode};
use crate::proto::Protobuf;

fn arb_id_string() -> impl Strategy<Value = String> {
    "[a-z_][a-zA-Z0-9_]{0,6}"
}

fn arb_key() -> impl Strategy<Value = SmolStr> {
    arb_id_string().prop_map(SmolStr::from)
}

/// Printable ASCII, including quotes and backslashes, so display escaping
/// never leaks into the wire form.
fn arb_free_string() -> impl Strategy<Value = String> {
    "[ -~]{0,8}"
}

fn arb_name() -> impl Strategy<Value = Name> {
    (
        arb_id_string(),
        proptest::collection::vec(arb_id_string(), 0..2),
    )
        .prop_map(|(basename, path)| {
            Name::new(
                basename.parse::<Id>().unwrap(),
                path.into_iter().map(|segment| segment.parse::<Id>().unwrap()),
            )
        })
}

fn arb_entity_type() -> impl Strategy<Value = EntityType> {
    arb_name().prop_map(EntityType::from)
}

fn arb_euid() -> impl Strategy<Value = EntityUid> {
    (arb_entity_type(), arb_free_string())
        .prop_map(|(ty, eid)| EntityUid::from_components(ty, Eid::new(eid)))
}

fn arb_var() -> impl Strategy<Value = Var> {
    prop_oneof![
        Just(Var::Principal),
        Just(Var::Action),
        Just(Var::Resource),
        Just(Var::Context),
    ]
}

fn arb_slot() -> impl Strategy<Value = SlotId> {
    prop_oneof![Just(SlotId::Principal), Just(SlotId::Resource)]
}

fn arb_unary_op() -> impl Strategy<Value = UnaryOp> {
    prop_oneof![
        Just(UnaryOp::Not),
        Just(UnaryOp::Neg),
        Just(UnaryOp::IsEmpty),
    ]
}

fn arb_binary_op() -> impl Strategy<Value = BinaryOp> {
    proptest::sample::select(vec![
        BinaryOp::Eq,
        BinaryOp::Less,
        BinaryOp::LessEq,
        BinaryOp::Add,
        BinaryOp::Sub,
        BinaryOp::Mul,
        BinaryOp::In,
        BinaryOp::Contains,
        BinaryOp::ContainsAll,
        BinaryOp::ContainsAny,
        BinaryOp::GetTag,
        BinaryOp::HasTag,
    ])
}

fn arb_pattern_elem() -> impl Strategy<Value = PatternElem> {
    prop_oneof![
        Just(PatternElem::Wildcard),
        any::<char>().prop_map(PatternElem::Char),
    ]
}

fn arb_expr() -> impl Strategy<Value = Expr> {
    let leaf = prop_oneof![
        any::<bool>().prop_map(Expr::val),
        any::<i64>().prop_map(Expr::val),
        arb_free_string().prop_map(|s| Expr::val(s.as_str())),
        arb_euid().prop_map(Expr::val),
        arb_var().prop_map(Expr::var),
        arb_slot().prop_map(Expr::slot),
    ];
    leaf.prop_recursive(4, 24, 3, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone(), inner.clone())
                .prop_map(|(cond, then_expr, else_expr)| Expr::ite(cond, then_expr, else_expr)),
            (any::<bool>(), inner.clone(), inner.clone()).prop_map(|(conj, left, right)| {
                if conj {
                    Expr::and(left, right)
                } else {
                    Expr::or(left, right)
                }
            }),
            (arb_unary_op(), inner.clone()).prop_map(|(op, arg)| Expr::unary_app(op, arg)),
            (arb_binary_op(), inner.clone(), inner.clone())
                .prop_map(|(op, arg1, arg2)| Expr::binary_app(op, arg1, arg2)),
            (arb_name(), proptest::collection::vec(inner.clone(), 0..3))
                .prop_map(|(fn_name, args)| Expr::call_extension_fn(fn_name, args)),
            (any::<bool>(), inner.clone(), arb_free_string()).prop_map(|(get, expr, attr)| {
                if get {
                    Expr::get_attr(expr, attr.into())
                } else {
                    Expr::has_attr(expr, attr.into())
                }
            }),
            (
                inner.clone(),
                proptest::collection::vec(arb_pattern_elem(), 0..4)
            )
                .prop_map(|(expr, pattern)| Expr::like(expr, pattern)),
            (inner.clone(), arb_entity_type())
                .prop_map(|(expr, ty)| Expr::is_entity_type(expr, ty)),
            proptest::collection::vec(inner.clone(), 0..3).prop_map(Expr::set),
            proptest::collection::btree_map(arb_key(), inner, 0..3)
                .prop_map(|map| Expr::record_arc(Arc::new(map))),
        ]
    })
}

fn arb_entity() -> impl Strategy<Value = Entity> {
    (
        arb_euid(),
        proptest::collection::btree_map(arb_key(), arb_expr(), 0..3),
        proptest::collection::btree_set(arb_euid(), 0..3),
        proptest::collection::btree_map(arb_key(), arb_expr(), 0..3),
    )
        .prop_map(|(uid, attrs, ancestors, tags)| Entity::new(uid, attrs, ancestors, tags))
}

fn arb_annotations() -> impl Strategy<Value = Annotations> {
    proptest::collection::btree_map(
        arb_id_string().prop_map(|s| s.parse::<AnyId>().unwrap()),
        arb_free_string(),
        0..3,
    )
    .prop_map(|map| {
        map.into_iter()
            .map(|(key, val)| (key, Annotation { val: val.into() }))
            .collect()
    })
}

fn arb_entity_reference() -> impl Strategy<Value = EntityReference> {
    prop_oneof![
        Just(EntityReference::Slot),
        arb_euid().prop_map(|euid| EntityReference::euid(Arc::new(euid))),
    ]
}

fn arb_scope_constraint() -> impl Strategy<Value = PrincipalOrResourceConstraint> {
    prop_oneof![
        Just(PrincipalOrResourceConstraint::Any),
        arb_entity_reference().prop_map(PrincipalOrResourceConstraint::In),
        arb_entity_reference().prop_map(PrincipalOrResourceConstraint::Eq),
        arb_entity_type().prop_map(PrincipalOrResourceConstraint::Is),
        (arb_entity_reference(), arb_entity_type())
            .prop_map(|(er, ty)| PrincipalOrResourceConstraint::IsIn(er, ty)),
    ]
}

fn arb_action_constraint() -> impl Strategy<Value = ActionConstraint> {
    prop_oneof![
        Just(ActionConstraint::any()),
        proptest::collection::vec(arb_euid(), 0..3).prop_map(ActionConstraint::is_in),
        arb_euid().prop_map(ActionConstraint::is_eq),
    ]
}

fn arb_template() -> impl Strategy<Value = TemplateBody> {
    (
        arb_id_string(),
        arb_annotations(),
        prop_oneof![Just(Effect::Permit), Just(Effect::Forbid)],
        arb_scope_constraint(),
        arb_action_constraint(),
        arb_scope_constraint(),
        arb_expr(),
    )
        .prop_map(
            |(id, annotations, effect, principal, action, resource, non_scope)| {
                TemplateBody::new(
                    PolicyId::from_string(id),
                    annotations,
                    effect,
                    PrincipalConstraint::new(principal),
                    action,
                    ResourceConstraint::new(resource),
                    non_scope,
                )
            },
        )
}

fn arb_literal_policy() -> impl Strategy<Value = LiteralPolicy> {
    (
        arb_id_string(),
        proptest::option::of(arb_id_string()),
        proptest::option::of(arb_euid()),
        proptest::option::of(arb_euid()),
    )
        .prop_map(|(template_id, link_id, principal, resource)| match link_id {
            Some(link_id) => {
                let mut values = SlotEnv::new();
                if let Some(principal) = principal {
                    values.insert(SlotId::Principal, principal);
                }
                if let Some(resource) = resource {
                    values.insert(SlotId::Resource, resource);
                }
                LiteralPolicy::template_linked_policy(
                    PolicyId::from_string(template_id),
                    PolicyId::from_string(link_id),
                    values,
                )
            }
            None => LiteralPolicy::static_policy(PolicyId::from_string(template_id)),
        })
}

fn arb_uid_entry() -> impl Strategy<Value = EntityUidEntry> {
    prop_oneof![
        Just(EntityUidEntry::Unknown),
        arb_euid().prop_map(EntityUidEntry::known),
    ]
}

proptest! {
    #[test]
    fn expr_roundtrips(expr in arb_expr()) {
        prop_assert_eq!(Expr::decode(&*expr.encode()).unwrap(), expr);
    }

    #[test]
    fn record_encoding_ignores_insertion_order(
        map in proptest::collection::btree_map(arb_key(), arb_expr(), 0..4)
    ) {
        let pairs: Vec<_> = map.into_iter().collect();
        let mut reversed = pairs.clone();
        reversed.reverse();
        let forward = Expr::record(pairs).unwrap();
        let backward = Expr::record(reversed).unwrap();
        prop_assert_eq!(&forward, &backward);
        prop_assert_eq!(forward.encode(), backward.encode());
    }

    #[test]
    fn entity_roundtrips(entity in arb_entity()) {
        prop_assert_eq!(Entity::decode(&*entity.encode()).unwrap(), entity);
    }

    #[test]
    fn partial_entities_roundtrip(
        entities in proptest::collection::vec(arb_entity(), 0..4)
    ) {
        // keep the last entity for each uid; the builder rejects duplicates
        let mut by_uid = BTreeMap::new();
        for entity in entities {
            by_uid.insert(entity.uid().clone(), entity);
        }
        let store = Entities::from_entities(by_uid.into_values(), Mode::Partial).unwrap();
        prop_assert_eq!(Entities::decode(&*store.encode()).unwrap(), store);
    }

    #[test]
    fn template_roundtrips(template in arb_template()) {
        prop_assert_eq!(TemplateBody::decode(&*template.encode()).unwrap(), template);
    }

    #[test]
    fn literal_policy_roundtrips(policy in arb_literal_policy()) {
        prop_assert_eq!(LiteralPolicy::decode(&*policy.encode()).unwrap(), policy);
    }

    #[test]
    fn policy_set_roundtrips(
        templates in proptest::collection::vec(arb_template(), 0..3),
        links in proptest::collection::vec(arb_literal_policy(), 0..3),
    ) {
        let set = LiteralPolicySet::new(templates.into_iter().map(Arc::new), links);
        prop_assert_eq!(LiteralPolicySet::decode(&*set.encode()).unwrap(), set);
    }

    #[test]
    fn request_roundtrips(
        principal in arb_uid_entry(),
        action in arb_uid_entry(),
        resource in arb_uid_entry(),
        context in proptest::option::of(arb_expr()),
    ) {
        let request = Request::new(principal, action, resource, context.map(Context::from_expr));
        prop_assert_eq!(Request::decode(&*request.encode()).unwrap(), request);
    }
}
