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

use crate::ast::ParseIdError;
use crate::entities::EntitiesError;

/// Errors raised when decoding untrusted bytes into IR values.
///
/// Decoding validates eagerly: the error reported is the first violation
/// encountered in field-number order, so malformed input always produces the
/// same diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Diagnostic, Error)]
pub enum DecodeError {
    /// The bytes are not a well-formed protobuf message (truncated input,
    /// wrong wire types, or nesting beyond the transport's recursion limit)
    #[error(transparent)]
    Wire(#[from] prost::DecodeError),
    /// A union message with zero variant fields set, more than one variant
    /// field set, or a required field absent
    #[error("malformed `{node}` node")]
    MalformedNode {
        /// Which message type was malformed
        node: &'static str,
    },
    /// A map-like collection carried the same key twice. Last-wins would make
    /// decoding lossy, so duplicates are rejected instead.
    #[error("duplicate key `{key}` in {context}")]
    DuplicateKey {
        /// Which collection contained the duplicate
        context: &'static str,
        /// The repeated key
        key: SmolStr,
    },
    /// Expression nesting deeper than the supported maximum
    #[error("expression nesting exceeds the maximum supported depth ({limit})")]
    DepthExceeded {
        /// The depth limit that was exceeded
        limit: u32,
    },
    /// An enum field carried a discriminant this version does not know.
    /// Unknown discriminants are never silently mapped to a default.
    #[error("unknown discriminant {value} for enum `{name}`")]
    UnknownEnumDiscriminant {
        /// Which enum was being decoded
        name: &'static str,
        /// The unrecognized raw value
        value: i32,
    },
    /// A string field that must satisfy the identifier grammar did not
    #[error(transparent)]
    #[diagnostic(transparent)]
    InvalidId(#[from] ParseIdError),
    /// A decoded entity store failed the builder checks that
    /// [`Entities::from_entities`](crate::entities::Entities::from_entities)
    /// applies to stores built in memory
    #[error(transparent)]
    #[diagnostic(transparent)]
    Entities(#[from] EntitiesError),
}

/// Shorthand for decode results.
pub type Result<T> = std::result::Result<T, DecodeError>;
