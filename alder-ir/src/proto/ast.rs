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

//! Conversions between wire models and the expression/request AST.
//!
//! Model-to-AST conversions are `TryFrom` and perform all decode-side
//! validation; AST-to-model conversions are `From` and cannot fail.

use std::collections::{btree_map, BTreeMap};
use std::sync::Arc;

use crate::ast;

use super::err::DecodeError;
use super::models;
use super::MAX_EXPR_DEPTH;

/// Borrow a required message field, or report the enclosing node as
/// malformed.
pub(super) fn required<'a, T>(
    field: &'a Option<T>,
    node: &'static str,
) -> Result<&'a T, DecodeError> {
    field.as_ref().ok_or(DecodeError::MalformedNode { node })
}

/// Interpret a raw enum discriminant, rejecting values this version does not
/// know.
pub(super) fn decode_enum<M: TryFrom<i32>>(
    name: &'static str,
    value: i32,
) -> Result<M, DecodeError> {
    M::try_from(value).map_err(|_| DecodeError::UnknownEnumDiscriminant { name, value })
}

impl From<ast::Var> for models::Var {
    fn from(v: ast::Var) -> Self {
        match v {
            ast::Var::Principal => models::Var::Principal,
            ast::Var::Action => models::Var::Action,
            ast::Var::Resource => models::Var::Resource,
            ast::Var::Context => models::Var::Context,
        }
    }
}

impl From<models::Var> for ast::Var {
    fn from(v: models::Var) -> Self {
        match v {
            models::Var::Principal => ast::Var::Principal,
            models::Var::Action => ast::Var::Action,
            models::Var::Resource => ast::Var::Resource,
            models::Var::Context => ast::Var::Context,
        }
    }
}

impl From<ast::SlotId> for models::SlotId {
    fn from(v: ast::SlotId) -> Self {
        match v {
            ast::SlotId::Principal => models::SlotId::Principal,
            ast::SlotId::Resource => models::SlotId::Resource,
        }
    }
}

impl From<models::SlotId> for ast::SlotId {
    fn from(v: models::SlotId) -> Self {
        match v {
            models::SlotId::Principal => ast::SlotId::Principal,
            models::SlotId::Resource => ast::SlotId::Resource,
        }
    }
}

impl From<ast::UnaryOp> for models::UnaryOp {
    fn from(v: ast::UnaryOp) -> Self {
        match v {
            ast::UnaryOp::Not => models::UnaryOp::Not,
            ast::UnaryOp::Neg => models::UnaryOp::Neg,
            ast::UnaryOp::IsEmpty => models::UnaryOp::IsEmpty,
        }
    }
}

impl From<models::UnaryOp> for ast::UnaryOp {
    fn from(v: models::UnaryOp) -> Self {
        match v {
            models::UnaryOp::Not => ast::UnaryOp::Not,
            models::UnaryOp::Neg => ast::UnaryOp::Neg,
            models::UnaryOp::IsEmpty => ast::UnaryOp::IsEmpty,
        }
    }
}

impl From<ast::BinaryOp> for models::BinaryOp {
    fn from(v: ast::BinaryOp) -> Self {
        match v {
            ast::BinaryOp::Eq => models::BinaryOp::Eq,
            ast::BinaryOp::Less => models::BinaryOp::Less,
            ast::BinaryOp::LessEq => models::BinaryOp::LessEq,
            ast::BinaryOp::Add => models::BinaryOp::Add,
            ast::BinaryOp::Sub => models::BinaryOp::Sub,
            ast::BinaryOp::Mul => models::BinaryOp::Mul,
            ast::BinaryOp::In => models::BinaryOp::In,
            ast::BinaryOp::Contains => models::BinaryOp::Contains,
            ast::BinaryOp::ContainsAll => models::BinaryOp::ContainsAll,
            ast::BinaryOp::ContainsAny => models::BinaryOp::ContainsAny,
            ast::BinaryOp::GetTag => models::BinaryOp::GetTag,
            ast::BinaryOp::HasTag => models::BinaryOp::HasTag,
        }
    }
}

impl From<models::BinaryOp> for ast::BinaryOp {
    fn from(v: models::BinaryOp) -> Self {
        match v {
            models::BinaryOp::Eq => ast::BinaryOp::Eq,
            models::BinaryOp::Less => ast::BinaryOp::Less,
            models::BinaryOp::LessEq => ast::BinaryOp::LessEq,
            models::BinaryOp::Add => ast::BinaryOp::Add,
            models::BinaryOp::Sub => ast::BinaryOp::Sub,
            models::BinaryOp::Mul => ast::BinaryOp::Mul,
            models::BinaryOp::In => ast::BinaryOp::In,
            models::BinaryOp::Contains => ast::BinaryOp::Contains,
            models::BinaryOp::ContainsAll => ast::BinaryOp::ContainsAll,
            models::BinaryOp::ContainsAny => ast::BinaryOp::ContainsAny,
            models::BinaryOp::GetTag => ast::BinaryOp::GetTag,
            models::BinaryOp::HasTag => ast::BinaryOp::HasTag,
        }
    }
}

impl From<&ast::Name> for models::Name {
    fn from(v: &ast::Name) -> Self {
        Self {
            id: v.basename().to_string(),
            path: v.namespace_components().map(ToString::to_string).collect(),
        }
    }
}

impl TryFrom<&models::Name> for ast::Name {
    type Error = DecodeError;
    fn try_from(v: &models::Name) -> Result<Self, Self::Error> {
        let basename = v.id.parse::<ast::Id>()?;
        let path = v
            .path
            .iter()
            .map(|segment| segment.parse::<ast::Id>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ast::Name::new(basename, path))
    }
}

impl From<&ast::EntityType> for models::EntityType {
    fn from(v: &ast::EntityType) -> Self {
        Self {
            name: Some(models::Name::from(v.name())),
        }
    }
}

impl TryFrom<&models::EntityType> for ast::EntityType {
    type Error = DecodeError;
    fn try_from(v: &models::EntityType) -> Result<Self, Self::Error> {
        let name = required(&v.name, "EntityType")?;
        Ok(ast::EntityType::from(ast::Name::try_from(name)?))
    }
}

impl From<&ast::EntityUid> for models::EntityUid {
    fn from(v: &ast::EntityUid) -> Self {
        Self {
            ty: Some(models::EntityType::from(v.entity_type())),
            // raw eid; escaping is a display concern only
            eid: AsRef::<str>::as_ref(v.eid()).to_string(),
        }
    }
}

impl TryFrom<&models::EntityUid> for ast::EntityUid {
    type Error = DecodeError;
    fn try_from(v: &models::EntityUid) -> Result<Self, Self::Error> {
        let ty = required(&v.ty, "EntityUid")?;
        Ok(ast::EntityUid::from_components(
            ast::EntityType::try_from(ty)?,
            ast::Eid::new(v.eid.as_str()),
        ))
    }
}

impl From<&ast::EntityUidEntry> for models::EntityUidEntry {
    fn from(v: &ast::EntityUidEntry) -> Self {
        Self {
            euid: v.uid().map(models::EntityUid::from),
        }
    }
}

impl TryFrom<&models::EntityUidEntry> for ast::EntityUidEntry {
    type Error = DecodeError;
    fn try_from(v: &models::EntityUidEntry) -> Result<Self, Self::Error> {
        match &v.euid {
            Some(euid) => Ok(ast::EntityUidEntry::known(ast::EntityUid::try_from(euid)?)),
            None => Ok(ast::EntityUidEntry::Unknown),
        }
    }
}

impl From<&ast::Literal> for models::Literal {
    fn from(v: &ast::Literal) -> Self {
        match v {
            ast::Literal::Bool(b) => Self {
                b: Some(*b),
                ..Self::default()
            },
            ast::Literal::Long(i) => Self {
                i: Some(*i),
                ..Self::default()
            },
            ast::Literal::String(s) => Self {
                s: Some(s.to_string()),
                ..Self::default()
            },
            ast::Literal::EntityUID(euid) => Self {
                euid: Some(models::EntityUid::from(euid.as_ref())),
                ..Self::default()
            },
        }
    }
}

impl TryFrom<&models::Literal> for ast::Literal {
    type Error = DecodeError;
    fn try_from(v: &models::Literal) -> Result<Self, Self::Error> {
        match (&v.b, &v.i, &v.s, &v.euid) {
            (Some(b), None, None, None) => Ok(ast::Literal::Bool(*b)),
            (None, Some(i), None, None) => Ok(ast::Literal::Long(*i)),
            (None, None, Some(s), None) => Ok(ast::Literal::from(s.as_str())),
            (None, None, None, Some(euid)) => {
                Ok(ast::Literal::from(ast::EntityUid::try_from(euid)?))
            }
            _ => Err(DecodeError::MalformedNode { node: "Literal" }),
        }
    }
}

impl From<&ast::PatternElem> for models::PatternElem {
    fn from(v: &ast::PatternElem) -> Self {
        match v {
            ast::PatternElem::Wildcard => Self {
                wildcard: Some(models::Wildcard {}),
                c: None,
            },
            ast::PatternElem::Char(c) => Self {
                wildcard: None,
                c: Some(c.to_string()),
            },
        }
    }
}

impl TryFrom<&models::PatternElem> for ast::PatternElem {
    type Error = DecodeError;
    fn try_from(v: &models::PatternElem) -> Result<Self, Self::Error> {
        match (&v.wildcard, &v.c) {
            (Some(_), None) => Ok(ast::PatternElem::Wildcard),
            (None, Some(s)) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(ast::PatternElem::Char(c)),
                    _ => Err(DecodeError::MalformedNode { node: "PatternElem" }),
                }
            }
            _ => Err(DecodeError::MalformedNode { node: "PatternElem" }),
        }
    }
}

impl From<&ast::Expr> for models::Expr {
    fn from(v: &ast::Expr) -> Self {
        match v.expr_kind() {
            ast::ExprKind::Lit(lit) => Self {
                lit: Some(models::Literal::from(lit)),
                ..Self::default()
            },
            ast::ExprKind::Var(var) => Self {
                var: Some(models::Var::from(*var) as i32),
                ..Self::default()
            },
            ast::ExprKind::Slot(slot) => Self {
                slot: Some(models::SlotId::from(*slot) as i32),
                ..Self::default()
            },
            ast::ExprKind::If {
                test_expr,
                then_expr,
                else_expr,
            } => Self {
                ite: Some(Box::new(models::IteExpr {
                    cond: Some(models::Expr::from(test_expr.as_ref())),
                    then_expr: Some(models::Expr::from(then_expr.as_ref())),
                    else_expr: Some(models::Expr::from(else_expr.as_ref())),
                })),
                ..Self::default()
            },
            ast::ExprKind::And { left, right } => Self {
                and: Some(Box::new(models::AndExpr {
                    left: Some(models::Expr::from(left.as_ref())),
                    right: Some(models::Expr::from(right.as_ref())),
                })),
                ..Self::default()
            },
            ast::ExprKind::Or { left, right } => Self {
                or: Some(Box::new(models::OrExpr {
                    left: Some(models::Expr::from(left.as_ref())),
                    right: Some(models::Expr::from(right.as_ref())),
                })),
                ..Self::default()
            },
            ast::ExprKind::UnaryApp { op, arg } => Self {
                u_app: Some(Box::new(models::UnaryAppExpr {
                    op: models::UnaryOp::from(*op) as i32,
                    expr: Some(models::Expr::from(arg.as_ref())),
                })),
                ..Self::default()
            },
            ast::ExprKind::BinaryApp { op, arg1, arg2 } => Self {
                b_app: Some(Box::new(models::BinaryAppExpr {
                    op: models::BinaryOp::from(*op) as i32,
                    left: Some(models::Expr::from(arg1.as_ref())),
                    right: Some(models::Expr::from(arg2.as_ref())),
                })),
                ..Self::default()
            },
            ast::ExprKind::ExtensionFunctionApp { fn_name, args } => Self {
                ext_app: Some(models::ExtensionAppExpr {
                    fn_name: Some(models::Name::from(fn_name)),
                    args: args.iter().map(models::Expr::from).collect(),
                }),
                ..Self::default()
            },
            ast::ExprKind::GetAttr { expr, attr } => Self {
                get_attr: Some(Box::new(models::GetAttrExpr {
                    attr: attr.to_string(),
                    expr: Some(models::Expr::from(expr.as_ref())),
                })),
                ..Self::default()
            },
            ast::ExprKind::HasAttr { expr, attr } => Self {
                has_attr: Some(Box::new(models::HasAttrExpr {
                    attr: attr.to_string(),
                    expr: Some(models::Expr::from(expr.as_ref())),
                })),
                ..Self::default()
            },
            ast::ExprKind::Like { expr, pattern } => Self {
                like: Some(Box::new(models::LikeExpr {
                    expr: Some(models::Expr::from(expr.as_ref())),
                    pattern: pattern.iter().map(models::PatternElem::from).collect(),
                })),
                ..Self::default()
            },
            ast::ExprKind::Is { expr, entity_type } => Self {
                is: Some(Box::new(models::IsExpr {
                    expr: Some(models::Expr::from(expr.as_ref())),
                    entity_type: Some(models::EntityType::from(entity_type)),
                })),
                ..Self::default()
            },
            ast::ExprKind::Set(elements) => Self {
                set: Some(models::SetExpr {
                    elements: elements.iter().map(models::Expr::from).collect(),
                }),
                ..Self::default()
            },
            // BTreeMap iteration order makes the entry list deterministic
            ast::ExprKind::Record(map) => Self {
                record: Some(models::RecordExpr {
                    items: map
                        .iter()
                        .map(|(key, value)| models::RecordEntry {
                            key: key.to_string(),
                            value: Some(models::Expr::from(value)),
                        })
                        .collect(),
                }),
                ..Self::default()
            },
        }
    }
}

impl TryFrom<&models::Expr> for ast::Expr {
    type Error = DecodeError;
    fn try_from(v: &models::Expr) -> Result<Self, Self::Error> {
        expr_from_model(v, 0)
    }
}

/// Decode one expression node at the given depth (the root is at depth 0),
/// recursing into children at `depth + 1`.
fn expr_from_model(v: &models::Expr, depth: u32) -> Result<ast::Expr, DecodeError> {
    if depth >= MAX_EXPR_DEPTH {
        return Err(DecodeError::DepthExceeded {
            limit: MAX_EXPR_DEPTH,
        });
    }
    let populated = [
        v.lit.is_some(),
        v.var.is_some(),
        v.slot.is_some(),
        v.ite.is_some(),
        v.and.is_some(),
        v.or.is_some(),
        v.u_app.is_some(),
        v.b_app.is_some(),
        v.ext_app.is_some(),
        v.get_attr.is_some(),
        v.has_attr.is_some(),
        v.like.is_some(),
        v.is.is_some(),
        v.set.is_some(),
        v.record.is_some(),
    ]
    .iter()
    .filter(|populated| **populated)
    .count();
    if populated > 1 {
        return Err(DecodeError::MalformedNode { node: "Expr" });
    }

    if let Some(lit) = &v.lit {
        Ok(ast::Expr::val(ast::Literal::try_from(lit)?))
    } else if let Some(raw) = v.var {
        let var = decode_enum::<models::Var>("Var", raw)?;
        Ok(ast::Expr::var(var.into()))
    } else if let Some(raw) = v.slot {
        let slot = decode_enum::<models::SlotId>("SlotId", raw)?;
        Ok(ast::Expr::slot(slot.into()))
    } else if let Some(ite) = &v.ite {
        Ok(ast::Expr::ite(
            expr_from_model(required(&ite.cond, "IteExpr")?, depth + 1)?,
            expr_from_model(required(&ite.then_expr, "IteExpr")?, depth + 1)?,
            expr_from_model(required(&ite.else_expr, "IteExpr")?, depth + 1)?,
        ))
    } else if let Some(and) = &v.and {
        Ok(ast::Expr::and(
            expr_from_model(required(&and.left, "AndExpr")?, depth + 1)?,
            expr_from_model(required(&and.right, "AndExpr")?, depth + 1)?,
        ))
    } else if let Some(or) = &v.or {
        Ok(ast::Expr::or(
            expr_from_model(required(&or.left, "OrExpr")?, depth + 1)?,
            expr_from_model(required(&or.right, "OrExpr")?, depth + 1)?,
        ))
    } else if let Some(u_app) = &v.u_app {
        let op = decode_enum::<models::UnaryOp>("UnaryOp", u_app.op)?;
        Ok(ast::Expr::unary_app(
            ast::UnaryOp::from(op),
            expr_from_model(required(&u_app.expr, "UnaryAppExpr")?, depth + 1)?,
        ))
    } else if let Some(b_app) = &v.b_app {
        let op = decode_enum::<models::BinaryOp>("BinaryOp", b_app.op)?;
        Ok(ast::Expr::binary_app(
            ast::BinaryOp::from(op),
            expr_from_model(required(&b_app.left, "BinaryAppExpr")?, depth + 1)?,
            expr_from_model(required(&b_app.right, "BinaryAppExpr")?, depth + 1)?,
        ))
    } else if let Some(ext_app) = &v.ext_app {
        let fn_name = ast::Name::try_from(required(&ext_app.fn_name, "ExtensionAppExpr")?)?;
        let args = ext_app
            .args
            .iter()
            .map(|arg| expr_from_model(arg, depth + 1))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ast::Expr::call_extension_fn(fn_name, args))
    } else if let Some(get_attr) = &v.get_attr {
        // attr strings are free-form, like eids; only record keys are identifiers
        Ok(ast::Expr::get_attr(
            expr_from_model(required(&get_attr.expr, "GetAttrExpr")?, depth + 1)?,
            get_attr.attr.as_str().into(),
        ))
    } else if let Some(has_attr) = &v.has_attr {
        Ok(ast::Expr::has_attr(
            expr_from_model(required(&has_attr.expr, "HasAttrExpr")?, depth + 1)?,
            has_attr.attr.as_str().into(),
        ))
    } else if let Some(like) = &v.like {
        let pattern = like
            .pattern
            .iter()
            .map(ast::PatternElem::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ast::Expr::like(
            expr_from_model(required(&like.expr, "LikeExpr")?, depth + 1)?,
            pattern,
        ))
    } else if let Some(is) = &v.is {
        Ok(ast::Expr::is_entity_type(
            expr_from_model(required(&is.expr, "IsExpr")?, depth + 1)?,
            ast::EntityType::try_from(required(&is.entity_type, "IsExpr")?)?,
        ))
    } else if let Some(set) = &v.set {
        let elements = set
            .elements
            .iter()
            .map(|element| expr_from_model(element, depth + 1))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ast::Expr::set(elements))
    } else if let Some(record) = &v.record {
        let mut map = BTreeMap::new();
        for item in &record.items {
            let key = item.key.parse::<ast::Id>()?.into_smolstr();
            let value = expr_from_model(required(&item.value, "RecordEntry")?, depth + 1)?;
            match map.entry(key) {
                btree_map::Entry::Vacant(slot) => {
                    slot.insert(value);
                }
                btree_map::Entry::Occupied(entry) => {
                    return Err(DecodeError::DuplicateKey {
                        context: "record literal",
                        key: entry.key().clone(),
                    });
                }
            }
        }
        Ok(ast::Expr::record_arc(Arc::new(map)))
    } else {
        // no variant field was populated
        Err(DecodeError::MalformedNode { node: "Expr" })
    }
}

impl From<&ast::Context> for models::Context {
    fn from(v: &ast::Context) -> Self {
        Self {
            expr: Some(models::Expr::from(v.expr())),
        }
    }
}

impl TryFrom<&models::Context> for ast::Context {
    type Error = DecodeError;
    fn try_from(v: &models::Context) -> Result<Self, Self::Error> {
        let expr = required(&v.expr, "Context")?;
        Ok(ast::Context::from_expr(ast::Expr::try_from(expr)?))
    }
}

impl From<&ast::Request> for models::Request {
    fn from(v: &ast::Request) -> Self {
        Self {
            principal: Some(models::EntityUidEntry::from(v.principal())),
            action: Some(models::EntityUidEntry::from(v.action())),
            resource: Some(models::EntityUidEntry::from(v.resource())),
            context: v.context().map(models::Context::from),
        }
    }
}

impl TryFrom<&models::Request> for ast::Request {
    type Error = DecodeError;
    fn try_from(v: &models::Request) -> Result<Self, Self::Error> {
        // an absent component is unknown (partial request), same as an
        // entry with no euid
        let entry = |field: &Option<models::EntityUidEntry>| match field {
            Some(entry) => ast::EntityUidEntry::try_from(entry),
            None => Ok(ast::EntityUidEntry::Unknown),
        };
        Ok(ast::Request::new(
            entry(&v.principal)?,
            entry(&v.action)?,
            entry(&v.resource)?,
            v.context
                .as_ref()
                .map(ast::Context::try_from)
                .transpose()?,
        ))
    }
}

// PANIC SAFETY: Unit Test Code
#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod test {
    use std::str::FromStr;

    use cool_asserts::assert_matches;

    use crate::ast::{
        Context, Eid, EntityType, EntityUid, EntityUidEntry, Expr, PatternElem, Request, Var,
    };
    use crate::proto::{models, DecodeError, Protobuf, MAX_EXPR_DEPTH};

    #[test]
    fn name_roundtrip() {
        let unqualified = crate::ast::Name::from_str("blog").unwrap();
        assert_eq!(
            crate::ast::Name::decode(&*unqualified.encode()).unwrap(),
            unqualified
        );

        let qualified = crate::ast::Name::from_str("alder::ext::ipaddr").unwrap();
        assert_eq!(
            crate::ast::Name::decode(&*qualified.encode()).unwrap(),
            qualified
        );
    }

    #[test]
    fn name_segments_must_be_identifiers() {
        let m = models::Name {
            id: "not an id".into(),
            path: Vec::new(),
        };
        assert_matches!(
            crate::ast::Name::try_from(&m),
            Err(DecodeError::InvalidId(_))
        );

        let m = models::Name {
            id: "fine".into(),
            path: vec!["also_fine".into(), "1bad".into()],
        };
        assert_matches!(
            crate::ast::Name::try_from(&m),
            Err(DecodeError::InvalidId(_))
        );
    }

    #[test]
    fn euid_preserves_raw_eid() {
        let uid = EntityUid::from_components(
            EntityType::from_str("User").unwrap(),
            Eid::new("weird \"eid\"\nwith newline"),
        );
        assert_eq!(EntityUid::decode(&*uid.encode()).unwrap(), uid);
    }

    #[test]
    fn literal_must_set_exactly_one_variant() {
        let none = models::Literal::default();
        assert_matches!(
            crate::ast::Literal::try_from(&none),
            Err(DecodeError::MalformedNode { node: "Literal" })
        );

        let both = models::Literal {
            b: Some(true),
            i: Some(3),
            ..Default::default()
        };
        assert_matches!(
            crate::ast::Literal::try_from(&both),
            Err(DecodeError::MalformedNode { node: "Literal" })
        );
    }

    #[test]
    fn expr_roundtrip() {
        let owner = EntityUid::with_eid_and_type("User", "alice").unwrap();
        let expr = Expr::ite(
            Expr::and(
                Expr::is_entity_type(
                    Expr::var(Var::Principal),
                    EntityType::from_str("User").unwrap(),
                ),
                Expr::has_attr(Expr::var(Var::Resource), "owner".into()),
            ),
            Expr::is_eq(
                Expr::get_attr(Expr::var(Var::Resource), "owner".into()),
                Expr::val(owner),
            ),
            Expr::or(
                Expr::like(
                    Expr::get_attr(Expr::var(Var::Context), "ip".into()),
                    vec![
                        PatternElem::Char('1'),
                        PatternElem::Char('0'),
                        PatternElem::Char('.'),
                        PatternElem::Wildcard,
                    ],
                ),
                Expr::contains(Expr::set([Expr::val(1), Expr::val(2)]), Expr::val(2)),
            ),
        );
        assert_eq!(Expr::decode(&*expr.encode()).unwrap(), expr);
    }

    #[test]
    fn expr_roundtrip_ext_call_and_record() {
        let expr = Expr::call_extension_fn(
            crate::ast::Name::from_str("alder::ext::ip").unwrap(),
            vec![Expr::record([
                ("addr".into(), Expr::val("10.0.0.1")),
                ("port".into(), Expr::val(8080)),
            ])
            .unwrap()],
        );
        assert_eq!(Expr::decode(&*expr.encode()).unwrap(), expr);
    }

    #[test]
    fn non_identifier_attrs_roundtrip() {
        let get = Expr::get_attr(Expr::var(Var::Resource), "strange key".into());
        assert_eq!(Expr::decode(&*get.encode()).unwrap(), get);

        let has = Expr::has_attr(Expr::var(Var::Principal), "dotted.name".into());
        assert_eq!(Expr::decode(&*has.encode()).unwrap(), has);
    }

    #[test]
    fn expr_must_set_exactly_one_variant() {
        let none = models::Expr::default();
        assert_matches!(
            Expr::try_from(&none),
            Err(DecodeError::MalformedNode { node: "Expr" })
        );

        let both = models::Expr {
            var: Some(models::Var::Principal as i32),
            slot: Some(models::SlotId::Principal as i32),
            ..Default::default()
        };
        assert_matches!(
            Expr::try_from(&both),
            Err(DecodeError::MalformedNode { node: "Expr" })
        );
    }

    #[test]
    fn unknown_discriminants_are_rejected() {
        let m = models::Expr {
            var: Some(17),
            ..Default::default()
        };
        assert_matches!(
            Expr::try_from(&m),
            Err(DecodeError::UnknownEnumDiscriminant {
                name: "Var",
                value: 17
            })
        );

        let m = models::Expr {
            slot: Some(5),
            ..Default::default()
        };
        assert_matches!(
            Expr::try_from(&m),
            Err(DecodeError::UnknownEnumDiscriminant {
                name: "SlotId",
                value: 5
            })
        );

        let leaf = || models::Expr {
            lit: Some(models::Literal {
                b: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };

        let m = models::Expr {
            u_app: Some(Box::new(models::UnaryAppExpr {
                op: 99,
                expr: Some(leaf()),
            })),
            ..Default::default()
        };
        assert_matches!(
            Expr::try_from(&m),
            Err(DecodeError::UnknownEnumDiscriminant {
                name: "UnaryOp",
                value: 99
            })
        );

        // 11 (HasTag) is the last assigned binary operator
        let m = models::Expr {
            b_app: Some(Box::new(models::BinaryAppExpr {
                op: 12,
                left: Some(leaf()),
                right: Some(leaf()),
            })),
            ..Default::default()
        };
        assert_matches!(
            Expr::try_from(&m),
            Err(DecodeError::UnknownEnumDiscriminant {
                name: "BinaryOp",
                value: 12
            })
        );
    }

    /// A model expression of `n` unary-not applications around a `true` leaf,
    /// i.e. an AST of depth `n` (the leaf sits at depth `n`).
    fn nots(n: usize) -> models::Expr {
        let leaf = models::Expr {
            lit: Some(models::Literal {
                b: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };
        (0..n).fold(leaf, |inner, _| models::Expr {
            u_app: Some(Box::new(models::UnaryAppExpr {
                op: models::UnaryOp::Not as i32,
                expr: Some(inner),
            })),
            ..Default::default()
        })
    }

    #[test]
    fn depth_limit_is_enforced() {
        assert_matches!(Expr::try_from(&nots(31)), Ok(_));
        assert_matches!(
            Expr::try_from(&nots(32)),
            Err(DecodeError::DepthExceeded { limit }) => assert_eq!(limit, MAX_EXPR_DEPTH)
        );
    }

    #[test]
    fn deepest_accepted_expr_roundtrips_through_bytes() {
        let expr = (0..31).fold(Expr::val(true), |inner, _| Expr::not(inner));
        assert_eq!(Expr::decode(&*expr.encode()).unwrap(), expr);
    }

    #[test]
    fn like_pattern_order_survives_roundtrip() {
        let pattern = vec![
            PatternElem::Wildcard,
            PatternElem::Char('a'),
            PatternElem::Char('b'),
            PatternElem::Wildcard,
        ];
        let expr = Expr::like(Expr::var(Var::Context), pattern.clone());
        assert_eq!(Expr::decode(&*expr.encode()).unwrap(), expr);

        let reversed = Expr::like(Expr::var(Var::Context), pattern.into_iter().rev());
        assert_ne!(Expr::decode(&*reversed.encode()).unwrap(), expr);
    }

    #[test]
    fn pattern_char_must_be_one_char() {
        let empty = models::PatternElem {
            wildcard: None,
            c: Some(String::new()),
        };
        assert_matches!(
            PatternElem::try_from(&empty),
            Err(DecodeError::MalformedNode {
                node: "PatternElem"
            })
        );

        let long = models::PatternElem {
            wildcard: None,
            c: Some("ab".into()),
        };
        assert_matches!(
            PatternElem::try_from(&long),
            Err(DecodeError::MalformedNode {
                node: "PatternElem"
            })
        );
    }

    #[test]
    fn record_duplicate_key_is_rejected() {
        let entry = |key: &str, b: bool| models::RecordEntry {
            key: key.into(),
            value: Some(models::Expr {
                lit: Some(models::Literal {
                    b: Some(b),
                    ..Default::default()
                }),
                ..Default::default()
            }),
        };
        let m = models::Expr {
            record: Some(models::RecordExpr {
                items: vec![entry("a", true), entry("a", false)],
            }),
            ..Default::default()
        };
        assert_matches!(
            Expr::try_from(&m),
            Err(DecodeError::DuplicateKey {
                context: "record literal",
                key
            }) => assert_eq!(key, "a")
        );
    }

    #[test]
    fn record_keys_must_be_identifiers() {
        let m = models::Expr {
            record: Some(models::RecordExpr {
                items: vec![models::RecordEntry {
                    key: "not an id".into(),
                    value: Some(models::Expr {
                        lit: Some(models::Literal {
                            b: Some(true),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }),
                }],
            }),
            ..Default::default()
        };
        assert_matches!(Expr::try_from(&m), Err(DecodeError::InvalidId(_)));
    }

    #[test]
    fn record_encoding_is_insertion_order_independent() {
        let r1 = Expr::record([
            ("a".into(), Expr::val(1)),
            ("b".into(), Expr::val(2)),
        ])
        .unwrap();
        let r2 = Expr::record([
            ("b".into(), Expr::val(2)),
            ("a".into(), Expr::val(1)),
        ])
        .unwrap();
        assert_eq!(r1, r2);
        assert_eq!(r1.encode(), r2.encode());
    }

    #[test]
    fn request_roundtrip() {
        let request = Request::new(
            EntityUidEntry::known(EntityUid::with_eid_and_type("User", "alice").unwrap()),
            EntityUidEntry::known(EntityUid::with_eid_and_type("Action", "view").unwrap()),
            EntityUidEntry::Unknown,
            Some(
                Context::from_pairs([("ip".into(), Expr::val("10.0.0.1"))]).unwrap(),
            ),
        );
        assert_eq!(Request::decode(&*request.encode()).unwrap(), request);

        let bare = Request::new(
            EntityUidEntry::Unknown,
            EntityUidEntry::Unknown,
            EntityUidEntry::Unknown,
            None,
        );
        assert_eq!(Request::decode(&*bare.encode()).unwrap(), bare);
    }

    #[test]
    fn absent_request_components_decode_as_unknown() {
        // both wire spellings of absence: an empty entry and no entry at all
        let m = models::Request {
            principal: Some(models::EntityUidEntry::default()),
            action: None,
            resource: None,
            context: None,
        };
        let request = Request::try_from(&m).unwrap();
        assert_eq!(request.principal(), &EntityUidEntry::Unknown);
        assert_eq!(request.action(), &EntityUidEntry::Unknown);
        assert_eq!(request.resource(), &EntityUidEntry::Unknown);
        assert_eq!(request.context(), None);
    }
}
