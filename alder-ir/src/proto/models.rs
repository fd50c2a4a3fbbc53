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

//! Wire-level message types.
//!
//! These are written by hand with `prost` derives rather than generated from
//! a `.proto` file, which keeps the build free of a `protoc` dependency. The
//! field numbers and enum discriminants below are the versioned wire
//! contract: never renumber or reuse them, only append.
//!
//! Two deliberate departures from stock protobuf modeling:
//!
//! * Tagged unions are carried as one optional field per variant instead of
//!   a `oneof`, because `prost` decodes a `oneof` by keeping the last
//!   variant seen. Carrying plain optional fields keeps "zero variants" and
//!   "multiple variants" observable so the conversion layer can reject them.
//! * Map-like data is carried as `repeated` entry messages instead of
//!   protobuf `map` fields, whose decoding silently keeps the last value for
//!   a repeated key. Repeated entries keep duplicates observable.
//!
//! Consequently the types here are transport only. All validation lives in
//! the conversion layer; a populated model is not evidence of a well-formed
//! value.

// Policy effect. Forbid is 0 so that a forgotten effect field fails closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Effect {
    Forbid = 0,
    Permit = 1,
}

// Entity-store completeness mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Mode {
    Concrete = 0,
    Partial = 1,
}

// Template slot identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum SlotId {
    Principal = 0,
    Resource = 1,
}

// Request variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Var {
    Principal = 0,
    Action = 1,
    Resource = 2,
    Context = 3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum UnaryOp {
    Not = 0,
    Neg = 1,
    IsEmpty = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum BinaryOp {
    Eq = 0,
    Less = 1,
    LessEq = 2,
    Add = 3,
    Sub = 4,
    Mul = 5,
    In = 6,
    Contains = 7,
    ContainsAll = 8,
    ContainsAny = 9,
    GetTag = 10,
    HasTag = 11,
}

/// Zero-field marker used for union variants that carry no payload.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Empty {}

/// Marker for the `*` element of a pattern.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Wildcard {}

/// A possibly-namespaced name. `id` is the basename; `path` holds the
/// namespace segments in order.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Name {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, repeated, tag = "2")]
    pub path: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EntityType {
    #[prost(message, optional, tag = "1")]
    pub name: Option<Name>,
}

/// Entity uid: type plus entity id. `eid` is the raw (unescaped) string.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EntityUid {
    #[prost(message, optional, tag = "1")]
    pub ty: Option<EntityType>,
    #[prost(string, tag = "2")]
    pub eid: String,
}

/// A request component; an absent `euid` means the component is unknown.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EntityUidEntry {
    #[prost(message, optional, tag = "1")]
    pub euid: Option<EntityUid>,
}

/// Literal value union: exactly one field must be set.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Literal {
    #[prost(bool, optional, tag = "1")]
    pub b: Option<bool>,
    #[prost(int64, optional, tag = "2")]
    pub i: Option<i64>,
    #[prost(string, optional, tag = "3")]
    pub s: Option<String>,
    #[prost(message, optional, tag = "4")]
    pub euid: Option<EntityUid>,
}

/// Pattern element union: exactly one field must be set, and `c` must hold
/// exactly one character.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PatternElem {
    #[prost(message, optional, tag = "1")]
    pub wildcard: Option<Wildcard>,
    #[prost(string, optional, tag = "2")]
    pub c: Option<String>,
}

/// Expression node union: exactly one field must be set. The variant fields
/// sit directly on this message (no inner kind wrapper), so each level of
/// expression nesting costs at most two levels of wire nesting.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Expr {
    #[prost(message, optional, tag = "1")]
    pub lit: Option<Literal>,
    #[prost(enumeration = "Var", optional, tag = "2")]
    pub var: Option<i32>,
    #[prost(enumeration = "SlotId", optional, tag = "3")]
    pub slot: Option<i32>,
    #[prost(message, optional, boxed, tag = "4")]
    pub ite: Option<Box<IteExpr>>,
    #[prost(message, optional, boxed, tag = "5")]
    pub and: Option<Box<AndExpr>>,
    #[prost(message, optional, boxed, tag = "6")]
    pub or: Option<Box<OrExpr>>,
    #[prost(message, optional, boxed, tag = "7")]
    pub u_app: Option<Box<UnaryAppExpr>>,
    #[prost(message, optional, boxed, tag = "8")]
    pub b_app: Option<Box<BinaryAppExpr>>,
    #[prost(message, optional, tag = "9")]
    pub ext_app: Option<ExtensionAppExpr>,
    #[prost(message, optional, boxed, tag = "10")]
    pub get_attr: Option<Box<GetAttrExpr>>,
    #[prost(message, optional, boxed, tag = "11")]
    pub has_attr: Option<Box<HasAttrExpr>>,
    #[prost(message, optional, boxed, tag = "12")]
    pub like: Option<Box<LikeExpr>>,
    #[prost(message, optional, boxed, tag = "13")]
    pub is: Option<Box<IsExpr>>,
    #[prost(message, optional, tag = "14")]
    pub set: Option<SetExpr>,
    #[prost(message, optional, tag = "15")]
    pub record: Option<RecordExpr>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IteExpr {
    #[prost(message, optional, tag = "1")]
    pub cond: Option<Expr>,
    #[prost(message, optional, tag = "2")]
    pub then_expr: Option<Expr>,
    #[prost(message, optional, tag = "3")]
    pub else_expr: Option<Expr>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AndExpr {
    #[prost(message, optional, tag = "1")]
    pub left: Option<Expr>,
    #[prost(message, optional, tag = "2")]
    pub right: Option<Expr>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct OrExpr {
    #[prost(message, optional, tag = "1")]
    pub left: Option<Expr>,
    #[prost(message, optional, tag = "2")]
    pub right: Option<Expr>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UnaryAppExpr {
    #[prost(enumeration = "UnaryOp", tag = "1")]
    pub op: i32,
    #[prost(message, optional, tag = "2")]
    pub expr: Option<Expr>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BinaryAppExpr {
    #[prost(enumeration = "BinaryOp", tag = "1")]
    pub op: i32,
    #[prost(message, optional, tag = "2")]
    pub left: Option<Expr>,
    #[prost(message, optional, tag = "3")]
    pub right: Option<Expr>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExtensionAppExpr {
    #[prost(message, optional, tag = "1")]
    pub fn_name: Option<Name>,
    #[prost(message, repeated, tag = "2")]
    pub args: Vec<Expr>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetAttrExpr {
    #[prost(string, tag = "1")]
    pub attr: String,
    #[prost(message, optional, tag = "2")]
    pub expr: Option<Expr>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HasAttrExpr {
    #[prost(string, tag = "1")]
    pub attr: String,
    #[prost(message, optional, tag = "2")]
    pub expr: Option<Expr>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LikeExpr {
    #[prost(message, optional, tag = "1")]
    pub expr: Option<Expr>,
    #[prost(message, repeated, tag = "2")]
    pub pattern: Vec<PatternElem>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IsExpr {
    #[prost(message, optional, tag = "1")]
    pub expr: Option<Expr>,
    #[prost(message, optional, tag = "2")]
    pub entity_type: Option<EntityType>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SetExpr {
    #[prost(message, repeated, tag = "1")]
    pub elements: Vec<Expr>,
}

/// Record literal as an entry list; key order is not significant on the wire
/// but duplicate keys are rejected at decode.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RecordExpr {
    #[prost(message, repeated, tag = "1")]
    pub items: Vec<RecordEntry>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RecordEntry {
    #[prost(string, tag = "1")]
    pub key: String,
    #[prost(message, optional, tag = "2")]
    pub value: Option<Expr>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Annotation {
    #[prost(string, tag = "1")]
    pub val: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AnnotationEntry {
    #[prost(string, tag = "1")]
    pub key: String,
    #[prost(message, optional, tag = "2")]
    pub value: Option<Annotation>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TemplateBody {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(message, repeated, tag = "2")]
    pub annotations: Vec<AnnotationEntry>,
    #[prost(enumeration = "Effect", tag = "3")]
    pub effect: i32,
    #[prost(message, optional, tag = "4")]
    pub principal_constraint: Option<PrincipalOrResourceConstraint>,
    #[prost(message, optional, tag = "5")]
    pub action_constraint: Option<ActionConstraint>,
    #[prost(message, optional, tag = "6")]
    pub resource_constraint: Option<PrincipalOrResourceConstraint>,
    #[prost(message, optional, tag = "7")]
    pub non_scope_constraints: Option<Expr>,
}

/// Scope constraint union for principal or resource: exactly one field must
/// be set.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PrincipalOrResourceConstraint {
    #[prost(message, optional, tag = "1")]
    pub any: Option<Empty>,
    #[prost(message, optional, tag = "2")]
    pub r#in: Option<EntityReference>,
    #[prost(message, optional, tag = "3")]
    pub eq: Option<EntityReference>,
    #[prost(message, optional, tag = "4")]
    pub is: Option<EntityType>,
    #[prost(message, optional, tag = "5")]
    pub is_in: Option<IsInConstraint>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IsInConstraint {
    #[prost(message, optional, tag = "1")]
    pub er: Option<EntityReference>,
    #[prost(message, optional, tag = "2")]
    pub entity_type: Option<EntityType>,
}

/// Either the scope's slot or a concrete euid: exactly one field must be
/// set. Which slot is meant follows from position (principal constraint or
/// resource constraint), so the slot variant carries no payload.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EntityReference {
    #[prost(message, optional, tag = "1")]
    pub slot: Option<Empty>,
    #[prost(message, optional, tag = "2")]
    pub euid: Option<EntityUid>,
}

/// Action scope constraint union: exactly one field must be set.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ActionConstraint {
    #[prost(message, optional, tag = "1")]
    pub any: Option<Empty>,
    #[prost(message, optional, tag = "2")]
    pub r#in: Option<EuidList>,
    #[prost(message, optional, tag = "3")]
    pub eq: Option<EntityUid>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EuidList {
    #[prost(message, repeated, tag = "1")]
    pub euids: Vec<EntityUid>,
}

/// A static policy or template link in literal form. `link_id_specified`
/// distinguishes links from static policies and must agree with `link_id`.
/// Slot bindings ride as two optional fields rather than a map because map
/// keys cannot be enum-typed.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LiteralPolicy {
    #[prost(string, tag = "1")]
    pub template_id: String,
    #[prost(string, optional, tag = "2")]
    pub link_id: Option<String>,
    #[prost(bool, tag = "3")]
    pub link_id_specified: bool,
    #[prost(message, optional, tag = "4")]
    pub principal_euid: Option<EntityUid>,
    #[prost(message, optional, tag = "5")]
    pub resource_euid: Option<EntityUid>,
}

/// Policy set as parallel template and link lists, each keyed by ids
/// embedded in the elements; duplicate ids are rejected at decode.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LiteralPolicySet {
    #[prost(message, repeated, tag = "1")]
    pub templates: Vec<TemplateBody>,
    #[prost(message, repeated, tag = "2")]
    pub links: Vec<LiteralPolicy>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AttrEntry {
    #[prost(string, tag = "1")]
    pub key: String,
    #[prost(message, optional, tag = "2")]
    pub value: Option<Expr>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Entity {
    #[prost(message, optional, tag = "1")]
    pub uid: Option<EntityUid>,
    #[prost(message, repeated, tag = "2")]
    pub attrs: Vec<AttrEntry>,
    #[prost(message, repeated, tag = "3")]
    pub ancestors: Vec<EntityUid>,
    #[prost(message, repeated, tag = "4")]
    pub tags: Vec<AttrEntry>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Entities {
    #[prost(message, repeated, tag = "1")]
    pub entities: Vec<Entity>,
    #[prost(enumeration = "Mode", tag = "2")]
    pub mode: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Context {
    #[prost(message, optional, tag = "1")]
    pub expr: Option<Expr>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Request {
    #[prost(message, optional, tag = "1")]
    pub principal: Option<EntityUidEntry>,
    #[prost(message, optional, tag = "2")]
    pub action: Option<EntityUidEntry>,
    #[prost(message, optional, tag = "3")]
    pub resource: Option<EntityUidEntry>,
    #[prost(message, optional, tag = "4")]
    pub context: Option<Context>,
}
