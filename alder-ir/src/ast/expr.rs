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

use std::collections::{btree_map, BTreeMap};
use std::sync::Arc;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use thiserror::Error;

use super::{BinaryOp, EntityType, Id, Literal, Name, Pattern, PatternElem, SlotId, UnaryOp};

/// AST for condition expressions. This structure is a wrapper around an
/// [`ExprKind`], which is the expression variant this object contains.
/// Cloning is O(1).
#[derive(Serialize, Deserialize, Hash, Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    expr_kind: ExprKind,
}

/// The possible expression variants. This enum should be matched on by code
/// recursively traversing the AST. Exactly one variant is populated per node,
/// and adding a variant is intentionally a compile-visible break for every
/// consumer.
#[derive(Serialize, Deserialize, Hash, Debug, Clone, PartialEq, Eq)]
pub enum ExprKind {
    /// Literal value
    Lit(Literal),
    /// Variable
    Var(Var),
    /// Template slot
    Slot(SlotId),
    /// Ternary expression
    If {
        /// Condition for the ternary expression. Must evaluate to Bool type
        test_expr: Arc<Expr>,
        /// Value if true
        then_expr: Arc<Expr>,
        /// Value if false
        else_expr: Arc<Expr>,
    },
    /// Boolean AND
    And {
        /// Left operand, which will be eagerly evaluated
        left: Arc<Expr>,
        /// Right operand, which may not be evaluated due to short-circuiting
        right: Arc<Expr>,
    },
    /// Boolean OR
    Or {
        /// Left operand, which will be eagerly evaluated
        left: Arc<Expr>,
        /// Right operand, which may not be evaluated due to short-circuiting
        right: Arc<Expr>,
    },
    /// Application of a built-in unary operator (single parameter)
    UnaryApp {
        /// Unary operator to apply
        op: UnaryOp,
        /// Argument to apply operator to
        arg: Arc<Expr>,
    },
    /// Application of a built-in binary operator (two parameters)
    BinaryApp {
        /// Binary operator to apply
        op: BinaryOp,
        /// First arg
        arg1: Arc<Expr>,
        /// Second arg
        arg2: Arc<Expr>,
    },
    /// Application of an extension function to n arguments. The function set
    /// is open-ended; this layer records the name and arguments and leaves
    /// resolution to the evaluator.
    ExtensionFunctionApp {
        /// Extension function to apply
        fn_name: Name,
        /// Args to apply the function to
        args: Arc<Vec<Expr>>,
    },
    /// Get an attribute of an entity, or a field of a record
    GetAttr {
        /// Expression to get an attribute/field of. Must evaluate to either
        /// Entity or Record type
        expr: Arc<Expr>,
        /// Attribute or field to get
        attr: SmolStr,
    },
    /// Does the given `expr` have the given `attr`?
    HasAttr {
        /// Expression to test. Must evaluate to either Entity or Record type
        expr: Arc<Expr>,
        /// Attribute or field to check for
        attr: SmolStr,
    },
    /// String matching with wildcards, similar to IAM's `StringLike` operator.
    Like {
        /// Expression to test. Must evaluate to String type
        expr: Arc<Expr>,
        /// Pattern to match on; can include the wildcard `*`, which matches
        /// any string. To match a literal `*` in the test expression, users
        /// can use `\*`.
        pattern: Pattern,
    },
    /// Entity type test. Does the first argument have the entity type
    /// specified by the second argument.
    Is {
        /// Expression to test. Must evaluate to an Entity.
        expr: Arc<Expr>,
        /// The entity type used for the type membership test.
        entity_type: EntityType,
    },
    /// Set (whose elements may be arbitrary expressions)
    //
    // This is backed by `Vec` (and not e.g. a set type), because two `Expr`s
    // that are syntactically unequal may be semantically equal, so dedup
    // cannot happen until evaluation.
    Set(Arc<Vec<Expr>>),
    /// Anonymous record (whose elements may be arbitrary expressions)
    Record(Arc<BTreeMap<SmolStr, Expr>>),
}

impl From<ExprKind> for Expr {
    fn from(expr_kind: ExprKind) -> Self {
        Self { expr_kind }
    }
}

impl Expr {
    /// Access the inner `ExprKind` for this `Expr`. The `ExprKind` is the
    /// `enum` which specifies the expression variant, so it must be accessed
    /// by any code matching and recursing on an expression.
    pub fn expr_kind(&self) -> &ExprKind {
        &self.expr_kind
    }

    /// Access the inner `ExprKind`, taking ownership.
    pub fn into_expr_kind(self) -> ExprKind {
        self.expr_kind
    }

    /// Check whether this expression is an entity reference, as required for
    /// the right-hand sides of scope constraints.
    pub fn is_ref(&self) -> bool {
        match &self.expr_kind {
            ExprKind::Lit(lit) => lit.is_ref(),
            _ => false,
        }
    }

    /// Check whether this expression is a template slot.
    pub fn is_slot(&self) -> bool {
        matches!(&self.expr_kind, ExprKind::Slot(_))
    }

    /// Iterate over all of the expressions in this expression tree, including
    /// this expression itself.
    pub fn subexpressions(&self) -> impl Iterator<Item = &Self> {
        ExprIterator::new(self)
    }

    /// Iterate over all of the slots in this expression tree.
    pub fn slots(&self) -> impl Iterator<Item = SlotId> + '_ {
        self.subexpressions()
            .filter_map(|exp| match &exp.expr_kind {
                ExprKind::Slot(slotid) => Some(*slotid),
                _ => None,
            })
    }

    /// Create an `Expr` that's just a single `Literal`.
    ///
    /// Note that you can pass this a `Literal`, an `i64`, a `String`, etc.
    pub fn val(v: impl Into<Literal>) -> Self {
        ExprKind::Lit(v.into()).into()
    }

    /// Create an `Expr` that's just this variable
    pub fn var(v: Var) -> Self {
        ExprKind::Var(v).into()
    }

    /// Create an `Expr` that's just this template slot
    pub fn slot(s: SlotId) -> Self {
        ExprKind::Slot(s).into()
    }

    /// Create a ternary (if-then-else) `Expr`.
    ///
    /// `test_expr` must evaluate to a Bool type
    pub fn ite(test_expr: Expr, then_expr: Expr, else_expr: Expr) -> Self {
        ExprKind::If {
            test_expr: Arc::new(test_expr),
            then_expr: Arc::new(then_expr),
            else_expr: Arc::new(else_expr),
        }
        .into()
    }

    /// Create a 'not' expression. `e` must evaluate to Bool type
    pub fn not(e: Expr) -> Self {
        Self::unary_app(UnaryOp::Not, e)
    }

    /// Create a '==' expression
    pub fn is_eq(e1: Expr, e2: Expr) -> Self {
        Self::binary_app(BinaryOp::Eq, e1, e2)
    }

    /// Create a '!=' expression
    pub fn noteq(e1: Expr, e2: Expr) -> Self {
        Self::not(Self::is_eq(e1, e2))
    }

    /// Create an 'and' expression. Arguments must evaluate to Bool type
    pub fn and(e1: Expr, e2: Expr) -> Self {
        ExprKind::And {
            left: Arc::new(e1),
            right: Arc::new(e2),
        }
        .into()
    }

    /// Create an 'or' expression. Arguments must evaluate to Bool type
    pub fn or(e1: Expr, e2: Expr) -> Self {
        ExprKind::Or {
            left: Arc::new(e1),
            right: Arc::new(e2),
        }
        .into()
    }

    /// Create a '<' expression. Arguments must evaluate to Long type
    pub fn less(e1: Expr, e2: Expr) -> Self {
        Self::binary_app(BinaryOp::Less, e1, e2)
    }

    /// Create a '<=' expression. Arguments must evaluate to Long type
    pub fn lesseq(e1: Expr, e2: Expr) -> Self {
        Self::binary_app(BinaryOp::LessEq, e1, e2)
    }

    /// Create a '>' expression. Arguments must evaluate to Long type
    pub fn greater(e1: Expr, e2: Expr) -> Self {
        Self::less(e2, e1)
    }

    /// Create a '>=' expression. Arguments must evaluate to Long type
    pub fn greatereq(e1: Expr, e2: Expr) -> Self {
        Self::lesseq(e2, e1)
    }

    /// Create an 'add' expression. Arguments must evaluate to Long type
    pub fn add(e1: Expr, e2: Expr) -> Self {
        Self::binary_app(BinaryOp::Add, e1, e2)
    }

    /// Create a 'sub' expression. Arguments must evaluate to Long type
    pub fn sub(e1: Expr, e2: Expr) -> Self {
        Self::binary_app(BinaryOp::Sub, e1, e2)
    }

    /// Create a 'mul' expression. Arguments must evaluate to Long type
    pub fn mul(e1: Expr, e2: Expr) -> Self {
        Self::binary_app(BinaryOp::Mul, e1, e2)
    }

    /// Create a negation expression. `e` must evaluate to Long type
    pub fn neg(e: Expr) -> Self {
        Self::unary_app(UnaryOp::Neg, e)
    }

    /// Create an 'in' expression. First argument must evaluate to Entity
    /// type. Second argument must evaluate to either Entity type or Set type
    /// where all set elements have Entity type.
    pub fn is_in(e1: Expr, e2: Expr) -> Self {
        Self::binary_app(BinaryOp::In, e1, e2)
    }

    /// Create a 'contains' expression. First argument must evaluate to Set
    /// type
    pub fn contains(e1: Expr, e2: Expr) -> Self {
        Self::binary_app(BinaryOp::Contains, e1, e2)
    }

    /// Create a 'containsAll' expression. Arguments must evaluate to Set type
    pub fn contains_all(e1: Expr, e2: Expr) -> Self {
        Self::binary_app(BinaryOp::ContainsAll, e1, e2)
    }

    /// Create a 'containsAny' expression. Arguments must evaluate to Set type
    pub fn contains_any(e1: Expr, e2: Expr) -> Self {
        Self::binary_app(BinaryOp::ContainsAny, e1, e2)
    }

    /// Create an 'isEmpty' expression. Argument must evaluate to Set type
    pub fn is_empty(e: Expr) -> Self {
        Self::unary_app(UnaryOp::IsEmpty, e)
    }

    /// Create a 'getTag' expression. `expr` must evaluate to Entity type,
    /// `tag` must evaluate to String type.
    pub fn get_tag(expr: Expr, tag: Expr) -> Self {
        Self::binary_app(BinaryOp::GetTag, expr, tag)
    }

    /// Create a 'hasTag' expression. `expr` must evaluate to Entity type,
    /// `tag` must evaluate to String type.
    pub fn has_tag(expr: Expr, tag: Expr) -> Self {
        Self::binary_app(BinaryOp::HasTag, expr, tag)
    }

    /// Create an `Expr` which evaluates to a Set of the given `Expr`s
    pub fn set(exprs: impl IntoIterator<Item = Expr>) -> Self {
        ExprKind::Set(Arc::new(exprs.into_iter().collect())).into()
    }

    /// Create an `Expr` which evaluates to a Record with the given (key,
    /// value) pairs.
    ///
    /// Throws an error if any key occurs two or more times in `pairs`.
    pub fn record(
        pairs: impl IntoIterator<Item = (SmolStr, Expr)>,
    ) -> Result<Self, ExprConstructionError> {
        let mut map = BTreeMap::new();
        for (k, v) in pairs {
            match map.entry(k) {
                btree_map::Entry::Occupied(oentry) => {
                    return Err(ExprConstructionError::DuplicateKeyInRecordLiteral {
                        key: oentry.key().clone(),
                    });
                }
                btree_map::Entry::Vacant(ventry) => {
                    ventry.insert(v);
                }
            }
        }
        Ok(Self::record_arc(Arc::new(map)))
    }

    /// Create an `Expr` which evaluates to a Record with the given key-value
    /// mapping.
    ///
    /// If you have an iterator of pairs, generally prefer calling
    /// `Expr::record()` instead of `.collect()`-ing yourself and calling
    /// this, because `.record()` will properly reject duplicate keys while
    /// `.collect()` on a `BTreeMap` silently drops them.
    pub fn record_arc(map: Arc<BTreeMap<SmolStr, Expr>>) -> Self {
        ExprKind::Record(map).into()
    }

    /// Create an `Expr` which calls the extension function with the given
    /// `Name` on `args`
    pub fn call_extension_fn(fn_name: Name, args: Vec<Expr>) -> Self {
        ExprKind::ExtensionFunctionApp {
            fn_name,
            args: Arc::new(args),
        }
        .into()
    }

    /// Create an application `Expr` which applies the given built-in unary
    /// operator to the given `arg`
    pub fn unary_app(op: impl Into<UnaryOp>, arg: Expr) -> Self {
        ExprKind::UnaryApp {
            op: op.into(),
            arg: Arc::new(arg),
        }
        .into()
    }

    /// Create an application `Expr` which applies the given built-in binary
    /// operator to `arg1` and `arg2`
    pub fn binary_app(op: impl Into<BinaryOp>, arg1: Expr, arg2: Expr) -> Self {
        ExprKind::BinaryApp {
            op: op.into(),
            arg1: Arc::new(arg1),
            arg2: Arc::new(arg2),
        }
        .into()
    }

    /// Create an `Expr` which gets a given attribute of a given `Entity` or
    /// record.
    ///
    /// `expr` must evaluate to either Entity or Record type
    pub fn get_attr(expr: Expr, attr: SmolStr) -> Self {
        ExprKind::GetAttr {
            expr: Arc::new(expr),
            attr,
        }
        .into()
    }

    /// Create an `Expr` which tests for the existence of a given attribute
    /// on a given `Entity` or record.
    ///
    /// `expr` must evaluate to either Entity or Record type
    pub fn has_attr(expr: Expr, attr: SmolStr) -> Self {
        ExprKind::HasAttr {
            expr: Arc::new(expr),
            attr,
        }
        .into()
    }

    /// Create a 'like' expression.
    ///
    /// `expr` must evaluate to a String type
    pub fn like(expr: Expr, pattern: impl IntoIterator<Item = PatternElem>) -> Self {
        ExprKind::Like {
            expr: Arc::new(expr),
            pattern: pattern.into_iter().collect(),
        }
        .into()
    }

    /// Create an 'is' expression.
    pub fn is_entity_type(expr: Expr, entity_type: EntityType) -> Self {
        ExprKind::Is {
            expr: Arc::new(expr),
            entity_type,
        }
        .into()
    }
}

/// Display an attribute in either dot or bracket form, depending on whether
/// it is a valid identifier
fn display_attr(f: &mut std::fmt::Formatter<'_>, attr: &SmolStr) -> std::fmt::Result {
    if attr.parse::<Id>().is_ok() {
        write!(f, ".{attr}")
    } else {
        write!(f, "[\"{}\"]", attr.escape_debug())
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.expr_kind {
            ExprKind::Lit(lit) => write!(f, "{lit}"),
            ExprKind::Var(v) => write!(f, "{v}"),
            ExprKind::Slot(slot) => write!(f, "{slot}"),
            ExprKind::If {
                test_expr,
                then_expr,
                else_expr,
            } => write!(f, "if {test_expr} then {then_expr} else {else_expr}"),
            ExprKind::And { left, right } => write!(f, "({left} && {right})"),
            ExprKind::Or { left, right } => write!(f, "({left} || {right})"),
            ExprKind::UnaryApp { op, arg } => match op {
                UnaryOp::Not => write!(f, "!{arg}"),
                UnaryOp::Neg => write!(f, "-{arg}"),
                UnaryOp::IsEmpty => write!(f, "{arg}.isEmpty()"),
            },
            ExprKind::BinaryApp { op, arg1, arg2 } => match op {
                BinaryOp::Eq
                | BinaryOp::Less
                | BinaryOp::LessEq
                | BinaryOp::Add
                | BinaryOp::Sub
                | BinaryOp::Mul
                | BinaryOp::In => write!(f, "({arg1} {op} {arg2})"),
                BinaryOp::Contains
                | BinaryOp::ContainsAll
                | BinaryOp::ContainsAny
                | BinaryOp::GetTag
                | BinaryOp::HasTag => write!(f, "{arg1}.{op}({arg2})"),
            },
            ExprKind::ExtensionFunctionApp { fn_name, args } => {
                use itertools::Itertools;
                write!(f, "{}({})", fn_name, args.iter().join(", "))
            }
            ExprKind::GetAttr { expr, attr } => {
                write!(f, "{expr}")?;
                display_attr(f, attr)
            }
            ExprKind::HasAttr { expr, attr } => {
                write!(f, "({expr} has \"{}\")", attr.escape_debug())
            }
            ExprKind::Like { expr, pattern } => write!(f, "({expr} like \"{pattern}\")"),
            ExprKind::Is { expr, entity_type } => write!(f, "({expr} is {entity_type})"),
            ExprKind::Set(elements) => {
                use itertools::Itertools;
                write!(f, "[{}]", elements.iter().join(", "))
            }
            ExprKind::Record(items) => {
                use itertools::Itertools;
                write!(
                    f,
                    "{{{}}}",
                    items
                        .iter()
                        .map(|(k, v)| format!("\"{}\": {}", k.escape_debug(), v))
                        .join(", ")
                )
            }
        }
    }
}

/// Errors when constructing an `Expr`
#[derive(Debug, Clone, PartialEq, Eq, Diagnostic, Error)]
pub enum ExprConstructionError {
    /// A key occurred twice (or more) in a record literal
    #[error("duplicate key `{key}` in record literal")]
    DuplicateKeyInRecordLiteral {
        /// The key which occurred twice (or more) in the record literal
        key: SmolStr,
    },
}

/// Iterator over the subexpressions of an expression, including the
/// expression itself. Uses an explicit worklist, so arbitrarily deep trees
/// cannot overflow the stack. Visits every node exactly once; the order is
/// deterministic but not otherwise specified.
#[derive(Debug)]
struct ExprIterator<'a> {
    expression_stack: Vec<&'a Expr>,
}

impl<'a> ExprIterator<'a> {
    fn new(expr: &'a Expr) -> Self {
        Self {
            expression_stack: vec![expr],
        }
    }
}

impl<'a> Iterator for ExprIterator<'a> {
    type Item = &'a Expr;

    fn next(&mut self) -> Option<Self::Item> {
        let next_expr = self.expression_stack.pop()?;
        match next_expr.expr_kind() {
            ExprKind::Lit(_) | ExprKind::Var(_) | ExprKind::Slot(_) => (),
            ExprKind::If {
                test_expr,
                then_expr,
                else_expr,
            } => {
                self.expression_stack.push(test_expr);
                self.expression_stack.push(then_expr);
                self.expression_stack.push(else_expr);
            }
            ExprKind::And { left, right } | ExprKind::Or { left, right } => {
                self.expression_stack.push(left);
                self.expression_stack.push(right);
            }
            ExprKind::UnaryApp { arg, .. } => {
                self.expression_stack.push(arg);
            }
            ExprKind::BinaryApp { arg1, arg2, .. } => {
                self.expression_stack.push(arg1);
                self.expression_stack.push(arg2);
            }
            ExprKind::ExtensionFunctionApp { args, .. } => {
                self.expression_stack.extend(args.iter());
            }
            ExprKind::GetAttr { expr, .. }
            | ExprKind::HasAttr { expr, .. }
            | ExprKind::Like { expr, .. }
            | ExprKind::Is { expr, .. } => {
                self.expression_stack.push(expr);
            }
            ExprKind::Set(elements) => {
                self.expression_stack.extend(elements.iter());
            }
            ExprKind::Record(items) => {
                self.expression_stack.extend(items.values());
            }
        }
        Some(next_expr)
    }
}

/// The variables bound by an authorization request
#[derive(Serialize, Deserialize, Hash, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Var {
    /// the Principal of the given request
    #[serde(rename = "principal")]
    Principal,
    /// the Action of the given request
    #[serde(rename = "action")]
    Action,
    /// the Resource of the given request
    #[serde(rename = "resource")]
    Resource,
    /// the Context of the given request
    #[serde(rename = "context")]
    Context,
}

impl std::fmt::Display for Var {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Principal => write!(f, "principal"),
            Self::Action => write!(f, "action"),
            Self::Resource => write!(f, "resource"),
            Self::Context => write!(f, "context"),
        }
    }
}

impl From<SlotId> for Var {
    fn from(slot: SlotId) -> Self {
        match slot {
            SlotId::Principal => Var::Principal,
            SlotId::Resource => Var::Resource,
        }
    }
}

#[cfg(test)]
// PANIC SAFETY: Unit Test Code
#[allow(clippy::unwrap_used)]
mod test {
    use super::*;
    use crate::ast::EntityUid;
    use cool_asserts::assert_matches;

    #[test]
    fn record_rejects_duplicate_keys() {
        assert_matches!(
            Expr::record([
                ("role".into(), Expr::val("admin")),
                ("role".into(), Expr::val("user")),
            ]),
            Err(ExprConstructionError::DuplicateKeyInRecordLiteral { key }) => {
                assert_eq!(key, "role");
            }
        );
        assert_matches!(
            Expr::record([
                ("a".into(), Expr::val(1)),
                ("b".into(), Expr::val(2)),
            ]),
            Ok(_)
        );
    }

    #[test]
    fn subexpressions_visits_all_nodes() {
        let e = Expr::and(
            Expr::is_eq(Expr::var(Var::Principal), Expr::val(true)),
            Expr::not(Expr::val(false)),
        );
        // and, ==, principal, true, !, false
        assert_eq!(e.subexpressions().count(), 6);
    }

    #[test]
    fn slots_found_at_any_depth() {
        let e = Expr::ite(
            Expr::val(true),
            Expr::is_in(
                Expr::slot(SlotId::Principal),
                Expr::set([Expr::slot(SlotId::Resource)]),
            ),
            Expr::val(false),
        );
        let slots: Vec<SlotId> = e.slots().collect();
        assert_eq!(slots.len(), 2);
        assert!(slots.contains(&SlotId::Principal));
        assert!(slots.contains(&SlotId::Resource));
        assert!(Expr::val(1).slots().next().is_none());
    }

    #[test]
    fn display_forms() {
        let uid = EntityUid::with_eid_and_type("User", "alice").unwrap();
        assert_eq!(Expr::val(uid).to_string(), "User::\"alice\"");
        assert_eq!(
            Expr::and(Expr::var(Var::Principal), Expr::val(true)).to_string(),
            "(principal && true)"
        );
        assert_eq!(
            Expr::get_attr(Expr::var(Var::Resource), "owner".into()).to_string(),
            "resource.owner"
        );
        assert_eq!(
            Expr::get_attr(Expr::var(Var::Resource), "strange key".into()).to_string(),
            "resource[\"strange key\"]"
        );
        assert_eq!(
            Expr::like(
                Expr::val("ham"),
                vec![PatternElem::Char('h'), PatternElem::Wildcard]
            )
            .to_string(),
            "(\"ham\" like \"h*\")"
        );
    }
}
