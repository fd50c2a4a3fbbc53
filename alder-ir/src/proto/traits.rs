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

//! Defines the trait for types which have a stable binary wire form.

use super::err::DecodeError;

/// Trait for AST types with a stable binary wire form.
pub trait Protobuf: Sized {
    /// Serialize to bytes. Infallible: every in-memory value has a wire form,
    /// and structurally equal values serialize to identical bytes.
    fn encode(&self) -> Vec<u8>;
    /// Deserialize from bytes, validating the input as described on
    /// [`DecodeError`].
    fn decode(buf: impl prost::bytes::Buf) -> Result<Self, DecodeError>;
}

/// Encode `thing` into protobuf format, using the protobuf model `M`.
pub(crate) fn encode_to_vec<M: prost::Message>(thing: impl Into<M>) -> Vec<u8> {
    thing.into().encode_to_vec()
}

/// Decode a `T` from protobuf format, using the protobuf model `M`.
/// Both transport-level failures and semantic validation failures surface as
/// [`DecodeError`].
pub(crate) fn try_decode<M, T>(buf: impl prost::bytes::Buf) -> Result<T, DecodeError>
where
    M: prost::Message + Default,
    T: for<'a> TryFrom<&'a M, Error = DecodeError>,
{
    let message = M::decode(buf)?;
    T::try_from(&message)
}
