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

use super::{EntityUid, Expr, ExprConstructionError, ExprKind, Literal, Name};

/// A few `Expr` variants describe fully-reduced values rather than
/// computations: literals, sets and records of such values, and extension
/// constructor calls over them. These are the only forms allowed in entity
/// attribute values, entity tag values, and request contexts in a fully
/// concrete store.
///
/// `RestrictedExpr` is a proof-carrying wrapper: if you have one, the wrapped
/// expression satisfies that restriction. Variables, slots, conditionals,
/// operator applications, attribute accesses, `like`, and `is` never appear
/// inside it.
#[derive(Serialize, Hash, Debug, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct RestrictedExpr(Expr);

impl RestrictedExpr {
    /// Create a new `RestrictedExpr` from an `Expr`.
    ///
    /// This function is "safe" in the sense that it will verify that the
    /// provided `expr` does not use any features disallowed in a restricted
    /// expression, and error if it does.
    pub fn new(expr: Expr) -> Result<Self, RestrictedExprError> {
        is_restricted(&expr)?;
        Ok(Self(expr))
    }

    /// Create a new `RestrictedExpr` from an `Expr`, where the caller is
    /// responsible for ensuring that the `Expr` is a valid restricted
    /// expression. If it is not, internal invariants will be violated, which
    /// may lead to errors later, panics later, or even incorrect results.
    pub fn new_unchecked(expr: Expr) -> Self {
        Self(expr)
    }

    /// Create a `RestrictedExpr` that's just a single `Literal`.
    ///
    /// Note that you can pass this a `Literal`, an `i64`, a `String`, etc.
    pub fn val(v: impl Into<Literal>) -> Self {
        // a literal is always a valid restricted expression
        Self::new_unchecked(Expr::val(v))
    }

    /// Create a `RestrictedExpr` which evaluates to a Set of the given
    /// `RestrictedExpr`s
    pub fn set(exprs: impl IntoIterator<Item = RestrictedExpr>) -> Self {
        // set elements are themselves restricted, so the set is too
        Self::new_unchecked(Expr::set(exprs.into_iter().map(Into::into)))
    }

    /// Create a `RestrictedExpr` which evaluates to a Record with the given
    /// (key, value) pairs.
    ///
    /// Throws an error if any key occurs two or more times in `pairs`.
    pub fn record(
        pairs: impl IntoIterator<Item = (SmolStr, RestrictedExpr)>,
    ) -> Result<Self, ExprConstructionError> {
        Ok(Self::new_unchecked(Expr::record(
            pairs.into_iter().map(|(k, v)| (k, v.into())),
        )?))
    }

    /// Create a `RestrictedExpr` which calls the given extension function on
    /// the given (restricted) arguments
    pub fn call_extension_fn(
        fn_name: Name,
        args: impl IntoIterator<Item = RestrictedExpr>,
    ) -> Self {
        Self::new_unchecked(Expr::call_extension_fn(
            fn_name,
            args.into_iter().map(Into::into).collect(),
        ))
    }

    /// Get the `bool` value of this `RestrictedExpr` if it's a boolean, or
    /// `None` if it is not a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self.0.expr_kind() {
            ExprKind::Lit(Literal::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Get the `i64` value of this `RestrictedExpr` if it's a long, or
    /// `None` if it is not a long
    pub fn as_long(&self) -> Option<i64> {
        match self.0.expr_kind() {
            ExprKind::Lit(Literal::Long(i)) => Some(*i),
            _ => None,
        }
    }

    /// Get the string value of this `RestrictedExpr` if it's a string, or
    /// `None` if it is not a string
    pub fn as_string(&self) -> Option<&SmolStr> {
        match self.0.expr_kind() {
            ExprKind::Lit(Literal::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Get the uid of this `RestrictedExpr` if it's an entity reference, or
    /// `None` if it is not one
    pub fn as_euid(&self) -> Option<&EntityUid> {
        match self.0.expr_kind() {
            ExprKind::Lit(Literal::EntityUID(uid)) => Some(uid),
            _ => None,
        }
    }

    /// Borrow the wrapped `Expr`
    pub fn as_expr(&self) -> &Expr {
        &self.0
    }
}

impl From<RestrictedExpr> for Expr {
    fn from(r: RestrictedExpr) -> Expr {
        r.0
    }
}

impl AsRef<Expr> for RestrictedExpr {
    fn as_ref(&self) -> &Expr {
        &self.0
    }
}

impl std::fmt::Display for RestrictedExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deserialize a `RestrictedExpr` with validation, so deserialized values
/// uphold the restricted-grammar invariant just like constructed ones.
impl<'de> Deserialize<'de> for RestrictedExpr {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let expr = Expr::deserialize(deserializer)?;
        RestrictedExpr::new(expr).map_err(serde::de::Error::custom)
    }
}

/// A `RestrictedExpr` that borrows the expression it checked rather than
/// owning it. Useful for validating expressions in place, e.g. attribute
/// values already held by an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BorrowedRestrictedExpr<'a>(&'a Expr);

impl<'a> BorrowedRestrictedExpr<'a> {
    /// Create a new `BorrowedRestrictedExpr` from an `&Expr`.
    ///
    /// This function is "safe" in the sense that it will verify that the
    /// provided `expr` does not use any features disallowed in a restricted
    /// expression, and error if it does.
    pub fn new(expr: &'a Expr) -> Result<Self, RestrictedExprError> {
        is_restricted(expr)?;
        Ok(Self(expr))
    }

    /// Write a `BorrowedRestrictedExpr` into an owned `RestrictedExpr`
    pub fn to_owned(self) -> RestrictedExpr {
        RestrictedExpr::new_unchecked(self.0.clone())
    }
}

impl AsRef<Expr> for BorrowedRestrictedExpr<'_> {
    fn as_ref(&self) -> &Expr {
        self.0
    }
}

/// Check whether `expr` is a valid restricted expression: every node in the
/// tree must be a literal, set, record, or extension-function call. Walks
/// iteratively, so adversarially deep trees cannot overflow the stack, and
/// reports the first offending node in traversal order.
fn is_restricted(expr: &Expr) -> Result<(), RestrictedExprError> {
    for e in expr.subexpressions() {
        let feature: SmolStr = match e.expr_kind() {
            ExprKind::Lit(_)
            | ExprKind::Set(_)
            | ExprKind::Record(_)
            | ExprKind::ExtensionFunctionApp { .. } => continue,
            ExprKind::Var(_) => "variables".into(),
            ExprKind::Slot(_) => "template slots".into(),
            ExprKind::If { .. } => "if-then-else".into(),
            ExprKind::And { .. } => "&&".into(),
            ExprKind::Or { .. } => "||".into(),
            ExprKind::UnaryApp { op, .. } => op.to_string().into(),
            ExprKind::BinaryApp { op, .. } => op.to_string().into(),
            ExprKind::GetAttr { .. } => "attribute accesses".into(),
            ExprKind::HasAttr { .. } => "'has'".into(),
            ExprKind::Like { .. } => "'like'".into(),
            ExprKind::Is { .. } => "'is'".into(),
        };
        return Err(RestrictedExprError::InvalidRestrictedExpression {
            feature,
            expr: e.clone(),
        });
    }
    Ok(())
}

/// Error when constructing a restricted expression from an unrestricted one
#[derive(Debug, Clone, PartialEq, Eq, Diagnostic, Error)]
pub enum RestrictedExprError {
    /// An expression was expected to be a "restricted" expression, but
    /// contained a feature that is not allowed in restricted expressions. The
    /// `feature` argument is a string description of the feature that is not
    /// allowed. The `expr` argument is the expression that uses the
    /// disallowed feature. Note that it is potentially a sub-expression of a
    /// larger expression.
    #[error("not allowed to use {feature} in a restricted expression: `{expr}`")]
    InvalidRestrictedExpression {
        /// what disallowed feature appeared in the expression
        feature: SmolStr,
        /// the (sub-)expression that uses the disallowed feature
        expr: Expr,
    },
}
