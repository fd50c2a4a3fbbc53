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
use smol_str::SmolStr;
use thiserror::Error;

use crate::ast::{EntityUid, RestrictedExprError};

/// Error type for errors raised in entities.rs.
#[derive(Debug, Clone, PartialEq, Eq, Diagnostic, Error)]
pub enum EntitiesError {
    /// Two entities in the input had the same uid
    #[error("duplicate entity entry `{uid}`")]
    Duplicate {
        /// [`EntityUid`] that appeared twice (or more) in the input
        uid: EntityUid,
    },
    /// An attribute or tag value of an entity in a concrete store was not a
    /// restricted expression
    #[error("in entity `{uid}`, the value for `{key}` is not a concrete value")]
    UnresolvedValue {
        /// [`EntityUid`] of the entity with the offending value
        uid: EntityUid,
        /// attribute or tag name the offending value is stored under
        key: SmolStr,
        /// why the value is not a concrete value
        #[source]
        source: RestrictedExprError,
    },
}

/// Type alias for convenience
pub type Result<T> = std::result::Result<T, EntitiesError>;
