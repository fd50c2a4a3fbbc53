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

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use super::{EntityUid, Expr, ExprConstructionError};

/// Represents the request tuple <P, A, R, C>.
///
/// No cross-field validation is performed: any combination of known and
/// unknown fields is a valid (possibly partial) request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Principal associated with the request
    pub(crate) principal: EntityUidEntry,

    /// Action associated with the request
    pub(crate) action: EntityUidEntry,

    /// Resource associated with the request
    pub(crate) resource: EntityUidEntry,

    /// Context associated with the request.
    /// `None` means the context is unknown (partial request).
    pub(crate) context: Option<Context>,
}

/// An entry in a request for a Entity UID.
/// It may either be a known EUID or an unknown in the case of a partial
/// request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityUidEntry {
    /// A known EntityUid
    Known(Arc<EntityUid>),
    /// An EntityUid left unknown
    Unknown,
}

impl EntityUidEntry {
    /// Create an entry with a known EntityUid
    pub fn known(euid: EntityUid) -> Self {
        Self::Known(Arc::new(euid))
    }

    /// Get the UID of the entry, or `None` if it is unknown
    pub fn uid(&self) -> Option<&EntityUid> {
        match self {
            Self::Known(euid) => Some(euid),
            Self::Unknown => None,
        }
    }
}

impl Request {
    /// Default constructor. Performs no validation of any kind: the fields
    /// are stored exactly as given.
    pub fn new(
        principal: EntityUidEntry,
        action: EntityUidEntry,
        resource: EntityUidEntry,
        context: Option<Context>,
    ) -> Self {
        Self {
            principal,
            action,
            resource,
            context,
        }
    }

    /// Get the principal associated with the request
    pub fn principal(&self) -> &EntityUidEntry {
        &self.principal
    }

    /// Get the action associated with the request
    pub fn action(&self) -> &EntityUidEntry {
        &self.action
    }

    /// Get the resource associated with the request
    pub fn resource(&self) -> &EntityUidEntry {
        &self.resource
    }

    /// Get the context associated with the request.
    /// Returning `None` means the context is unknown
    pub fn context(&self) -> Option<&Context> {
        self.context.as_ref()
    }
}

impl std::fmt::Display for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let display_euid = |maybe_euid: &EntityUidEntry| match maybe_euid {
            EntityUidEntry::Known(euid) => format!("{euid}"),
            EntityUidEntry::Unknown => "unknown".to_string(),
        };
        write!(
            f,
            "request with principal {}, action {}, resource {}, and context {}",
            display_euid(&self.principal),
            display_euid(&self.action),
            display_euid(&self.resource),
            match &self.context {
                Some(x) => format!("{x}"),
                None => "unknown".to_string(),
            }
        )
    }
}

/// `Context` field of a `Request`.
///
/// Conventionally the wrapped expression is a record, and the `empty` and
/// `from_pairs` constructors only build records, but the interchange form
/// does not enforce this: `from_expr` accepts any expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context {
    context: Expr,
}

impl Context {
    /// Create an empty `Context`
    pub fn empty() -> Self {
        Self {
            context: Expr::record_arc(Arc::new(std::collections::BTreeMap::new())),
        }
    }

    /// Create a `Context` from any expression.
    pub fn from_expr(expr: Expr) -> Self {
        Self { context: expr }
    }

    /// Create a `Context` from a Vec of `(key, Expr)` pairs, or any other
    /// iterator of `(key, Expr)` pairs. The result is always a record.
    pub fn from_pairs(
        pairs: impl IntoIterator<Item = (SmolStr, Expr)>,
    ) -> Result<Self, ExprConstructionError> {
        Ok(Self {
            context: Expr::record(pairs)?,
        })
    }

    /// Get the expression this context wraps
    pub fn expr(&self) -> &Expr {
        &self.context
    }

    /// Consume the context, returning the expression it wraps
    pub fn into_expr(self) -> Expr {
        self.context
    }
}

impl std::fmt::Display for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.context)
    }
}

#[cfg(test)]
// PANIC SAFETY: Unit Test Code
#[allow(clippy::unwrap_used)]
mod test {
    use cool_asserts::assert_matches;

    use super::*;

    fn uid(ty: &str, eid: &str) -> EntityUid {
        EntityUid::with_eid_and_type(ty, eid).unwrap()
    }

    #[test]
    fn display_fully_known_request() {
        let req = Request::new(
            EntityUidEntry::known(uid("User", "alice")),
            EntityUidEntry::known(uid("Action", "view")),
            EntityUidEntry::known(uid("Photo", "vacation")),
            Some(Context::empty()),
        );
        assert_eq!(
            req.to_string(),
            "request with principal User::\"alice\", action Action::\"view\", resource Photo::\"vacation\", and context {}"
        );
    }

    #[test]
    fn display_partial_request() {
        let req = Request::new(
            EntityUidEntry::known(uid("User", "alice")),
            EntityUidEntry::Unknown,
            EntityUidEntry::Unknown,
            None,
        );
        assert_eq!(
            req.to_string(),
            "request with principal User::\"alice\", action unknown, resource unknown, and context unknown"
        );
        assert_eq!(req.action().uid(), None);
        assert_eq!(req.principal().uid(), Some(&uid("User", "alice")));
    }

    #[test]
    fn context_from_pairs_rejects_duplicates() {
        assert_matches!(
            Context::from_pairs([
                ("k".into(), Expr::val(1)),
                ("k".into(), Expr::val(2)),
            ]),
            Err(ExprConstructionError::DuplicateKeyInRecordLiteral { key }) => {
                assert_eq!(key, "k");
            }
        );
    }

    #[test]
    fn context_wraps_arbitrary_expressions() {
        let ctx = Context::from_expr(Expr::val(7));
        assert_eq!(ctx.expr(), &Expr::val(7));
        assert_eq!(ctx.to_string(), "7");
        let ctx = Context::from_pairs([("role".into(), Expr::val("admin"))]).unwrap();
        assert_eq!(ctx.to_string(), "{\"role\": \"admin\"}");
    }
}
