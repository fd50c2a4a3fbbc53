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

//! The stable binary interchange format for IR values.
//!
//! Encoding is infallible and deterministic: map-like collections are
//! ordered in memory and serialized in key order, so structurally equal
//! values always produce byte-identical output. Decoding validates untrusted
//! input eagerly (union shape, identifier grammar, duplicate keys, nesting
//! depth, enum discriminants) and reports the first violation as a
//! [`DecodeError`]; nothing is silently dropped, defaulted, or overwritten.
//!
//! `decode(encode(x)) == x` holds for every value of a type implementing
//! [`Protobuf`].

#[allow(missing_docs, clippy::doc_markdown)]
pub mod models;

mod ast;
mod entities;
mod err;
mod policy;
pub mod traits;

pub use err::{DecodeError, Result};
pub use traits::Protobuf;

/// Maximum expression nesting depth accepted by the decoder.
///
/// The root of an expression is at depth 0. Decoding a tree that nests
/// deeper fails with [`DecodeError::DepthExceeded`] rather than risking a
/// stack overflow on hostile input. Encoding does not check depth: values
/// built in memory may nest arbitrarily, but round-tripping them through the
/// wire format requires staying within this limit.
pub const MAX_EXPR_DEPTH: u32 = 32;

macro_rules! standard_protobuf_impl {
    ( $ast_ty:ty, $model:ty ) => {
        impl traits::Protobuf for $ast_ty {
            fn encode(&self) -> Vec<u8> {
                traits::encode_to_vec::<$model>(self)
            }
            fn decode(buf: impl prost::bytes::Buf) -> std::result::Result<Self, DecodeError> {
                traits::try_decode::<$model, Self>(buf)
            }
        }
    };
}

standard_protobuf_impl!(crate::ast::Name, models::Name);
standard_protobuf_impl!(crate::ast::EntityType, models::EntityType);
standard_protobuf_impl!(crate::ast::EntityUid, models::EntityUid);
standard_protobuf_impl!(crate::ast::Expr, models::Expr);
standard_protobuf_impl!(crate::ast::TemplateBody, models::TemplateBody);
standard_protobuf_impl!(crate::ast::LiteralPolicy, models::LiteralPolicy);
standard_protobuf_impl!(crate::ast::LiteralPolicySet, models::LiteralPolicySet);
standard_protobuf_impl!(crate::ast::Request, models::Request);
standard_protobuf_impl!(crate::ast::Entity, models::Entity);
standard_protobuf_impl!(crate::entities::Entities, models::Entities);
