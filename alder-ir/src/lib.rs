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

//! Canonical interchange representation for the Alder authorization-policy
//! engine.
//!
//! This crate defines the data that independently-built components (parsers,
//! evaluators, validators, host-language bindings) exchange: the condition
//! expression AST, policy templates and their linked instances, entity
//! stores with concrete/partial modes, and authorization requests. The
//! [`proto`] module carries all of it over a stable binary encoding with a
//! round-trip guarantee; the in-memory types in [`ast`] and [`entities`] are
//! immutable values safe to share across threads.
//!
//! Parsing policy text, evaluating policies, and validating against a schema
//! are deliberately out of scope; those live in the components on either
//! side of this boundary.
#![forbid(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

pub mod ast;
pub mod entities;
pub mod proto;

#[cfg(test)]
mod prop_test_roundtrip;
