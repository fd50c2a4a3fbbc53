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

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use itertools::Itertools;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use thiserror::Error;

use super::{
    Annotation, Annotations, AnyId, EntityType, EntityUid, Expr, ExprKind, SlotId, Var,
};

/// Policy datatype. This is used for both templates (in which case it contains
/// slots) and static policies (in which case it contains zero slots).
#[derive(Clone, Hash, Eq, PartialEq, Debug)]
pub struct TemplateBody {
    /// ID of this policy
    id: PolicyId,
    /// Annotations available for external applications, as key-value store.
    /// Note that the AST does not include the source location of each
    /// annotation; they are kept in key order for deterministic output.
    annotations: Arc<Annotations>,
    /// `Effect` of this policy
    effect: Effect,
    /// Scope constraint for principal. This will be a boolean-valued expression:
    /// either `true` (if the policy just has `principal,`), or an equality or
    /// hierarchy constraint
    principal_constraint: PrincipalConstraint,
    /// Scope constraint for action. This will be a boolean-valued expression:
    /// either `true` (if the policy just has `action,`), or an equality or
    /// hierarchy constraint
    action_constraint: ActionConstraint,
    /// Scope constraint for resource. This will be a boolean-valued expression:
    /// either `true` (if the policy just has `resource,`), or an equality or
    /// hierarchy constraint
    resource_constraint: ResourceConstraint,
    /// Conjunction of all of the non-scope constraints in the policy
    non_scope_constraints: Arc<Expr>,
}

impl TemplateBody {
    /// Construct a `TemplateBody` from its components
    pub fn new(
        id: PolicyId,
        annotations: Annotations,
        effect: Effect,
        principal_constraint: PrincipalConstraint,
        action_constraint: ActionConstraint,
        resource_constraint: ResourceConstraint,
        non_scope_constraints: Expr,
    ) -> Self {
        Self {
            id,
            annotations: Arc::new(annotations),
            effect,
            principal_constraint,
            action_constraint,
            resource_constraint,
            non_scope_constraints: Arc::new(non_scope_constraints),
        }
    }

    /// Construct a `TemplateBody` from components that are already
    /// [`std::sync::Arc`] allocated
    pub fn new_shared(
        id: PolicyId,
        annotations: Arc<Annotations>,
        effect: Effect,
        principal_constraint: PrincipalConstraint,
        action_constraint: ActionConstraint,
        resource_constraint: ResourceConstraint,
        non_scope_constraints: Arc<Expr>,
    ) -> Self {
        Self {
            id,
            annotations,
            effect,
            principal_constraint,
            action_constraint,
            resource_constraint,
            non_scope_constraints,
        }
    }

    /// Get the `Id` of this policy.
    pub fn id(&self) -> &PolicyId {
        &self.id
    }

    /// Get the `Effect` of this policy.
    pub fn effect(&self) -> Effect {
        self.effect
    }

    /// Get data from an annotation.
    pub fn annotation(&self, key: &AnyId) -> Option<&Annotation> {
        self.annotations.get(key)
    }

    /// Get all annotation data.
    pub fn annotations(&self) -> impl Iterator<Item = (&AnyId, &Annotation)> {
        self.annotations.iter()
    }

    /// Get shared ref to annotations
    pub fn annotations_arc(&self) -> &Arc<Annotations> {
        &self.annotations
    }

    /// Get the `principal` scope constraint of this policy.
    pub fn principal_constraint(&self) -> &PrincipalConstraint {
        &self.principal_constraint
    }

    /// Get the `principal` scope constraint as an expression.
    /// This will be a boolean-valued expression: either `true` (if the policy
    /// just has `principal,`), or an equality or hierarchy constraint
    pub fn principal_constraint_expr(&self) -> Expr {
        self.principal_constraint.as_expr()
    }

    /// Get the `action` scope constraint of this policy.
    pub fn action_constraint(&self) -> &ActionConstraint {
        &self.action_constraint
    }

    /// Get the `action` scope constraint of this policy as an expression.
    /// This will be a boolean-valued expression: either `true` (if the policy
    /// just has `action,`), or an equality or hierarchy constraint
    pub fn action_constraint_expr(&self) -> Expr {
        self.action_constraint.as_expr()
    }

    /// Get the `resource` scope constraint of this policy.
    pub fn resource_constraint(&self) -> &ResourceConstraint {
        &self.resource_constraint
    }

    /// Get the `resource` scope constraint of this policy as an expression.
    /// This will be a boolean-valued expression: either `true` (if the policy
    /// just has `resource,`), or an equality or hierarchy constraint
    pub fn resource_constraint_expr(&self) -> Expr {
        self.resource_constraint.as_expr()
    }

    /// Get the non-scope constraints of this policy.
    ///
    /// This will be a conjunction of the policy's `when` conditions and the
    /// negation of each of the policy's `unless` conditions.
    pub fn non_scope_constraints(&self) -> &Expr {
        &self.non_scope_constraints
    }

    /// Get the Arc owning the non scope constraints
    pub fn non_scope_constraints_arc(&self) -> &Arc<Expr> {
        &self.non_scope_constraints
    }

    /// Get the condition expression of this policy.
    ///
    /// This will be a conjunction of the policy's scope constraints (on
    /// principal, resource, and action); the policy's "when" conditions; and
    /// the negation of each of the policy's "unless" conditions.
    pub fn condition(&self) -> Expr {
        Expr::and(
            Expr::and(
                Expr::and(
                    self.principal_constraint_expr(),
                    self.action_constraint_expr(),
                ),
                self.resource_constraint_expr(),
            ),
            self.non_scope_constraints.as_ref().clone(),
        )
    }

    /// Get all of the open slots in this template, in slot-id order and
    /// without duplicates. Slots can appear in the principal and resource
    /// scope constraints and anywhere in the non-scope constraints.
    ///
    /// An empty iterator means this template is a static policy.
    pub fn slots(&self) -> impl Iterator<Item = SlotId> {
        let mut slots = BTreeSet::new();
        if self.principal_constraint.as_inner().has_slot() {
            slots.insert(SlotId::Principal);
        }
        if self.resource_constraint.as_inner().has_slot() {
            slots.insert(SlotId::Resource);
        }
        slots.extend(self.non_scope_constraints.slots());
        slots.into_iter()
    }

    /// Check that `values` bind exactly the open slots of this template:
    /// every open slot has a value, and every value corresponds to an open
    /// slot. Slots are examined in slot-id order, so the error reported for a
    /// given (template, values) pair is deterministic.
    pub fn check_binding(&self, values: &SlotEnv) -> Result<(), LinkingError> {
        let open_slots: BTreeSet<SlotId> = self.slots().collect();
        for slot in [SlotId::Principal, SlotId::Resource] {
            match (open_slots.contains(&slot), values.contains_key(&slot)) {
                (true, false) => return Err(LinkingError::UnboundSlot { slot }),
                (false, true) => return Err(LinkingError::UnusedBinding { slot }),
                _ => (),
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for TemplateBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.annotations.fmt(f)?;
        write!(
            f,
            "{}(\n  {},\n  {},\n  {}\n) when {{\n  {}\n}};",
            self.effect(),
            self.principal_constraint(),
            self.action_constraint(),
            self.resource_constraint(),
            self.non_scope_constraints()
        )
    }
}

/// Errors linking templates
#[derive(Debug, Clone, PartialEq, Eq, Diagnostic, Error)]
pub enum LinkingError {
    /// An open slot was not provided a value
    #[error("the slot `{slot}` was not provided as an argument")]
    UnboundSlot {
        /// [`SlotId`] of the slot that has no value
        slot: SlotId,
    },

    /// A value was provided for a slot the template does not have
    #[error("the slot `{slot}` was provided as an argument, but does not exist in the template")]
    UnusedBinding {
        /// [`SlotId`] of the binding that has no matching slot
        slot: SlotId,
    },
}

/// A Policy that contains:
///   - a pointer to its template
///   - a link ID (unless it's a static policy)
///   - the bound values for slots in the template
///
/// Policies are not serializable (due to the pointer), and can be serialized
/// by converting to/from `LiteralPolicy`
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Policy {
    /// Reference to the template
    template: Arc<TemplateBody>,
    /// Id of this link
    /// None in the case that this is an instance of a Static Policy
    link: Option<PolicyId>,
    // INVARIANT (values total map)
    // All of the slots in `template` MUST be bound by `values`
    //
    /// values the slots are bound to.
    /// The constructor `new` is only visible in this module,
    /// so it is the responsibility of callers to maintain
    values: SlotEnv,
}

impl Policy {
    /// Link a policy to its template
    /// INVARIANT (values total map):
    /// `values` must bind every open slot in `template`
    fn new(template: Arc<TemplateBody>, link_id: Option<PolicyId>, values: SlotEnv) -> Self {
        #[cfg(debug_assertions)]
        {
            // PANIC SAFETY: asserts (value total map invariant) which is justified at call sites
            #[allow(clippy::expect_used)]
            template
                .check_binding(&values)
                .expect("(values total map) does not hold!");
        }
        Self {
            template,
            link: link_id,
            values,
        }
    }

    /// Get pointer to the template for this policy
    pub fn template(&self) -> &TemplateBody {
        &self.template
    }

    /// Get the effect (forbid or permit) of this policy.
    pub fn effect(&self) -> Effect {
        self.template.effect()
    }

    /// Get data from an annotation.
    pub fn annotation(&self, key: &AnyId) -> Option<&Annotation> {
        self.template.annotation(key)
    }

    /// Get all annotation data.
    pub fn annotations(&self) -> impl Iterator<Item = (&AnyId, &Annotation)> {
        self.template.annotations()
    }

    /// Get the principal constraint for this policy.
    ///
    /// By the invariant, this principal constraint will not contain
    /// (unresolved) slots, so you will not get `EntityReference::Slot`
    /// anywhere in it.
    pub fn principal_constraint(&self) -> PrincipalConstraint {
        let constraint = self.template.principal_constraint().clone();
        match self.values.get(&SlotId::Principal) {
            None => constraint,
            Some(principal) => constraint.with_filled_slot(Arc::new(principal.clone())),
        }
    }

    /// Get the action constraint for this policy.
    pub fn action_constraint(&self) -> &ActionConstraint {
        self.template.action_constraint()
    }

    /// Get the resource constraint for this policy.
    ///
    /// By the invariant, this resource constraint will not contain
    /// (unresolved) slots, so you will not get `EntityReference::Slot`
    /// anywhere in it.
    pub fn resource_constraint(&self) -> ResourceConstraint {
        let constraint = self.template.resource_constraint().clone();
        match self.values.get(&SlotId::Resource) {
            None => constraint,
            Some(resource) => constraint.with_filled_slot(Arc::new(resource.clone())),
        }
    }

    /// Get the expression that represents this policy, with all of the
    /// template's slots (in the scope constraints and in the non-scope
    /// constraints) replaced by their bound values.
    ///
    /// By the invariant, the returned expression contains no slots.
    pub fn condition(&self) -> Expr {
        let condition = self.template.condition();
        if self.values.is_empty() {
            condition
        } else {
            fill_slots(&condition, &self.values)
        }
    }

    /// Get the mapping from SlotIds to EntityUids for this policy. (This will
    /// be empty for static policies.)
    pub fn env(&self) -> &SlotEnv {
        &self.values
    }

    /// Get the ID of this policy.
    pub fn id(&self) -> &PolicyId {
        self.link.as_ref().unwrap_or_else(|| self.template.id())
    }

    /// Returns true if this policy is a static policy
    pub fn is_static(&self) -> bool {
        self.link.is_none()
    }
}

impl std::fmt::Display for Policy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_static() {
            write!(f, "{}", self.template())
        } else {
            write!(
                f,
                "Template Instance of {}, slots: [{}]",
                self.template().id(),
                display_slot_env(self.env())
            )
        }
    }
}

/// Replace every slot node in `expr` with the euid literal `values` binds it
/// to. Slots with no binding are left in place; under the (values total map)
/// invariant that case never arises for a reified policy.
fn fill_slots(expr: &Expr, values: &SlotEnv) -> Expr {
    match expr.expr_kind() {
        ExprKind::Lit(_) | ExprKind::Var(_) => expr.clone(),
        ExprKind::Slot(slot) => match values.get(slot) {
            Some(euid) => Expr::val(euid.clone()),
            None => expr.clone(),
        },
        ExprKind::If {
            test_expr,
            then_expr,
            else_expr,
        } => Expr::ite(
            fill_slots(test_expr, values),
            fill_slots(then_expr, values),
            fill_slots(else_expr, values),
        ),
        ExprKind::And { left, right } => {
            Expr::and(fill_slots(left, values), fill_slots(right, values))
        }
        ExprKind::Or { left, right } => {
            Expr::or(fill_slots(left, values), fill_slots(right, values))
        }
        ExprKind::UnaryApp { op, arg } => Expr::unary_app(*op, fill_slots(arg, values)),
        ExprKind::BinaryApp { op, arg1, arg2 } => Expr::binary_app(
            *op,
            fill_slots(arg1, values),
            fill_slots(arg2, values),
        ),
        ExprKind::ExtensionFunctionApp { fn_name, args } => Expr::call_extension_fn(
            fn_name.clone(),
            args.iter().map(|arg| fill_slots(arg, values)).collect(),
        ),
        ExprKind::GetAttr { expr, attr } => {
            Expr::get_attr(fill_slots(expr, values), attr.clone())
        }
        ExprKind::HasAttr { expr, attr } => {
            Expr::has_attr(fill_slots(expr, values), attr.clone())
        }
        ExprKind::Like { expr, pattern } => {
            Expr::like(fill_slots(expr, values), pattern.iter().copied())
        }
        ExprKind::Is { expr, entity_type } => {
            Expr::is_entity_type(fill_slots(expr, values), entity_type.clone())
        }
        ExprKind::Set(elems) => Expr::set(elems.iter().map(|elem| fill_slots(elem, values))),
        ExprKind::Record(map) => Expr::record_arc(Arc::new(
            map.iter()
                .map(|(key, value)| (key.clone(), fill_slots(value, values)))
                .collect(),
        )),
    }
}

/// Map from Slot Ids to Entity UIDs which fill the slots
pub type SlotEnv = BTreeMap<SlotId, EntityUid>;

/// Represents either a static policy or a template linked policy.
///
/// Contains less rich information than `Policy`. In particular, this form is
/// easier to convert to/from the wire representation of a policy, because
/// it simply refers to the `TemplateBody` by its Id and does not contain a
/// reference to the `TemplateBody` itself.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct LiteralPolicy {
    /// ID of the template this policy is an instance of
    template_id: PolicyId,
    /// ID of this link.
    /// This is `None` for static policies, and the static policy ID is defined
    /// as the `template_id`
    link_id: Option<PolicyId>,
    /// Values of the slots
    values: SlotEnv,
}

impl LiteralPolicy {
    /// Create a `LiteralPolicy` representing a static policy with the given ID.
    ///
    /// The policy set should also contain a (zero-slot) `TemplateBody` with the given ID.
    pub fn static_policy(template_id: PolicyId) -> Self {
        Self {
            template_id,
            link_id: None,
            values: SlotEnv::new(),
        }
    }

    /// Create a `LiteralPolicy` representing a template-linked policy.
    ///
    /// The policy set should also contain the associated `TemplateBody`.
    pub fn template_linked_policy(
        template_id: PolicyId,
        link_id: PolicyId,
        values: SlotEnv,
    ) -> Self {
        Self {
            template_id,
            link_id: Some(link_id),
            values,
        }
    }

    /// Get the `EntityUid` associated with the given `SlotId`, if it exists
    pub fn value(&self, slot: &SlotId) -> Option<&EntityUid> {
        self.values.get(slot)
    }
}

/// Errors that can happen during policy reification
#[derive(Debug, Diagnostic, Error)]
pub enum ReificationError {
    /// The [`PolicyId`] linked to did not exist
    #[error("the id linked to does not exist")]
    NoSuchTemplate(PolicyId),
    /// Error linking the policy
    #[error(transparent)]
    #[diagnostic(transparent)]
    Linking(#[from] LinkingError),
}

impl LiteralPolicy {
    /// Attempt to reify this template linked policy.
    /// Ensures the linked template actually exists, replaces the id with a reference to the underlying template.
    /// Fails if the template does not exist, or if the slot bindings do not
    /// match the template's open slots.
    /// Consumes the policy.
    pub fn reify(
        self,
        templates: &BTreeMap<PolicyId, Arc<TemplateBody>>,
    ) -> Result<Policy, ReificationError> {
        let template = templates
            .get(&self.template_id)
            .ok_or_else(|| ReificationError::NoSuchTemplate(self.template_id.clone()))?;
        // INVARIANT (values total map)
        template
            .check_binding(&self.values)
            .map_err(ReificationError::Linking)?;
        Ok(Policy::new(Arc::clone(template), self.link_id, self.values))
    }

    /// Get the [`PolicyId`] of this static or template-linked policy.
    pub fn id(&self) -> &PolicyId {
        self.link_id.as_ref().unwrap_or(&self.template_id)
    }

    /// Get the [`PolicyId`] of the template associated with this policy.
    ///
    /// For static policies, this is just the static policy ID.
    pub fn template_id(&self) -> &PolicyId {
        &self.template_id
    }

    /// Get the [`PolicyId`] of this link. This is `None` for static policies.
    pub fn link_id(&self) -> Option<&PolicyId> {
        self.link_id.as_ref()
    }

    /// Is this a static policy
    pub fn is_static(&self) -> bool {
        self.link_id.is_none()
    }
}

fn display_slot_env(env: &SlotEnv) -> String {
    env.iter()
        .map(|(slot, value)| format!("{slot} -> {value}"))
        .join(",")
}

impl std::fmt::Display for LiteralPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_static() {
            write!(f, "Static policy w/ ID {}", self.template_id())
        } else {
            write!(
                f,
                "Template linked policy of {}, slots: [{}]",
                self.template_id(),
                display_slot_env(&self.values),
            )
        }
    }
}

impl From<Policy> for LiteralPolicy {
    fn from(p: Policy) -> Self {
        Self {
            template_id: p.template.id().clone(),
            link_id: p.link,
            values: p.values,
        }
    }
}

/// Template constraint on principal scope variables
#[derive(Clone, Hash, Eq, PartialEq, PartialOrd, Ord, Debug)]
pub struct PrincipalConstraint {
    pub(crate) constraint: PrincipalOrResourceConstraint,
}

impl PrincipalConstraint {
    /// Construct a principal constraint
    pub fn new(constraint: PrincipalOrResourceConstraint) -> Self {
        PrincipalConstraint { constraint }
    }

    /// Get constraint as ref
    pub fn as_inner(&self) -> &PrincipalOrResourceConstraint {
        &self.constraint
    }

    /// Get constraint by value
    pub fn into_inner(self) -> PrincipalOrResourceConstraint {
        self.constraint
    }

    /// Get the constraint as raw AST
    pub fn as_expr(&self) -> Expr {
        self.constraint.as_expr(SlotId::Principal)
    }

    /// Unconstrained.
    pub fn any() -> Self {
        PrincipalConstraint {
            constraint: PrincipalOrResourceConstraint::any(),
        }
    }

    /// Constrained to equal a specific euid.
    pub fn is_eq(euid: Arc<EntityUid>) -> Self {
        PrincipalConstraint {
            constraint: PrincipalOrResourceConstraint::is_eq(euid),
        }
    }

    /// Constrained to be equal to a slot
    pub fn is_eq_slot() -> Self {
        Self {
            constraint: PrincipalOrResourceConstraint::is_eq_slot(),
        }
    }

    /// Hierarchical constraint.
    pub fn is_in(euid: Arc<EntityUid>) -> Self {
        PrincipalConstraint {
            constraint: PrincipalOrResourceConstraint::is_in(euid),
        }
    }

    /// Hierarchical constraint to Slot
    pub fn is_in_slot() -> Self {
        Self {
            constraint: PrincipalOrResourceConstraint::is_in_slot(),
        }
    }

    /// Type constraint, with no hierarchical constraint or slot.
    pub fn is_entity_type(entity_type: EntityType) -> Self {
        Self {
            constraint: PrincipalOrResourceConstraint::is_entity_type(entity_type),
        }
    }

    /// Type constraint, with a hierarchical constraint.
    pub fn is_entity_type_in(entity_type: EntityType, in_entity: Arc<EntityUid>) -> Self {
        Self {
            constraint: PrincipalOrResourceConstraint::is_entity_type_in(entity_type, in_entity),
        }
    }

    /// Type constraint additionally constrained to be in a slot.
    pub fn is_entity_type_in_slot(entity_type: EntityType) -> Self {
        Self {
            constraint: PrincipalOrResourceConstraint::is_entity_type_in_slot(entity_type),
        }
    }

    /// Fill in the Slot, if any, with the given EUID
    pub fn with_filled_slot(self, euid: Arc<EntityUid>) -> Self {
        Self {
            constraint: self.constraint.with_filled_slot(euid),
        }
    }
}

impl std::fmt::Display for PrincipalConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.constraint.display(SlotId::Principal))
    }
}

/// Template constraint on resource scope variables
#[derive(Clone, Hash, Eq, PartialEq, PartialOrd, Ord, Debug)]
pub struct ResourceConstraint {
    pub(crate) constraint: PrincipalOrResourceConstraint,
}

impl ResourceConstraint {
    /// Construct from constraint
    pub fn new(constraint: PrincipalOrResourceConstraint) -> Self {
        ResourceConstraint { constraint }
    }

    /// Get constraint as ref
    pub fn as_inner(&self) -> &PrincipalOrResourceConstraint {
        &self.constraint
    }

    /// Get constraint by value
    pub fn into_inner(self) -> PrincipalOrResourceConstraint {
        self.constraint
    }

    /// Convert into an Expression. It will be a boolean valued expression.
    pub fn as_expr(&self) -> Expr {
        self.constraint.as_expr(SlotId::Resource)
    }

    /// Unconstrained.
    pub fn any() -> Self {
        ResourceConstraint {
            constraint: PrincipalOrResourceConstraint::any(),
        }
    }

    /// Constrained to equal a specific euid.
    pub fn is_eq(euid: Arc<EntityUid>) -> Self {
        ResourceConstraint {
            constraint: PrincipalOrResourceConstraint::is_eq(euid),
        }
    }

    /// Constrained to equal a slot.
    pub fn is_eq_slot() -> Self {
        Self {
            constraint: PrincipalOrResourceConstraint::is_eq_slot(),
        }
    }

    /// Hierarchical constraint.
    pub fn is_in(euid: Arc<EntityUid>) -> Self {
        ResourceConstraint {
            constraint: PrincipalOrResourceConstraint::is_in(euid),
        }
    }

    /// Constrained to be in a slot
    pub fn is_in_slot() -> Self {
        Self {
            constraint: PrincipalOrResourceConstraint::is_in_slot(),
        }
    }

    /// Type constraint, with no hierarchical constraint or slot.
    pub fn is_entity_type(entity_type: EntityType) -> Self {
        Self {
            constraint: PrincipalOrResourceConstraint::is_entity_type(entity_type),
        }
    }

    /// Type constraint, with a hierarchical constraint.
    pub fn is_entity_type_in(entity_type: EntityType, in_entity: Arc<EntityUid>) -> Self {
        Self {
            constraint: PrincipalOrResourceConstraint::is_entity_type_in(entity_type, in_entity),
        }
    }

    /// Type constraint additionally constrained to be in a slot.
    pub fn is_entity_type_in_slot(entity_type: EntityType) -> Self {
        Self {
            constraint: PrincipalOrResourceConstraint::is_entity_type_in_slot(entity_type),
        }
    }

    /// Fill in the Slot, if any, with the given EUID
    pub fn with_filled_slot(self, euid: Arc<EntityUid>) -> Self {
        Self {
            constraint: self.constraint.with_filled_slot(euid),
        }
    }
}

impl std::fmt::Display for ResourceConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_inner().display(SlotId::Resource))
    }
}

/// A reference to an EntityUid that may be a Slot
#[derive(Debug, Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub enum EntityReference {
    /// Reference to a literal EUID
    EUID(Arc<EntityUid>),
    /// Template Slot
    Slot,
}

impl EntityReference {
    /// Create an entity reference to a specific EntityUid
    pub fn euid(euid: Arc<EntityUid>) -> Self {
        Self::EUID(euid)
    }

    /// Transform into an expression AST
    ///
    /// `slot` indicates what `SlotId` would be implied by
    /// `EntityReference::Slot`, which is always clear from the caller's
    /// context.
    pub fn into_expr(&self, slot: SlotId) -> Expr {
        match self {
            EntityReference::EUID(euid) => Expr::val(Arc::clone(euid)),
            EntityReference::Slot => Expr::slot(slot),
        }
    }
}

impl From<EntityUid> for EntityReference {
    fn from(euid: EntityUid) -> Self {
        Self::EUID(Arc::new(euid))
    }
}

/// Represents the constraints for principals and resources.
/// Can either not constrain, or constrain via `==` or `in` for a single
/// entity literal or slot.
#[derive(Clone, Hash, Eq, PartialEq, PartialOrd, Ord, Debug)]
pub enum PrincipalOrResourceConstraint {
    /// Unconstrained
    Any,
    /// Hierarchical constraint
    In(EntityReference),
    /// Equality constraint
    Eq(EntityReference),
    /// Type constraint
    Is(EntityType),
    /// Type constraint with a hierarchy constraint
    IsIn(EntityReference, EntityType),
}

impl PrincipalOrResourceConstraint {
    /// Unconstrained.
    pub fn any() -> Self {
        PrincipalOrResourceConstraint::Any
    }

    /// Constrained to equal a specific euid.
    pub fn is_eq(euid: Arc<EntityUid>) -> Self {
        PrincipalOrResourceConstraint::Eq(EntityReference::euid(euid))
    }

    /// Constrained to equal a slot
    pub fn is_eq_slot() -> Self {
        PrincipalOrResourceConstraint::Eq(EntityReference::Slot)
    }

    /// Constrained to be in a slot
    pub fn is_in_slot() -> Self {
        PrincipalOrResourceConstraint::In(EntityReference::Slot)
    }

    /// Hierarchical constraint.
    pub fn is_in(euid: Arc<EntityUid>) -> Self {
        PrincipalOrResourceConstraint::In(EntityReference::euid(euid))
    }

    /// Type constraint additionally constrained to be in a slot.
    pub fn is_entity_type_in_slot(entity_type: EntityType) -> Self {
        PrincipalOrResourceConstraint::IsIn(EntityReference::Slot, entity_type)
    }

    /// Type constraint with a hierarchical constraint.
    pub fn is_entity_type_in(entity_type: EntityType, in_entity: Arc<EntityUid>) -> Self {
        PrincipalOrResourceConstraint::IsIn(EntityReference::euid(in_entity), entity_type)
    }

    /// Type constraint, with no hierarchical constraint or slot.
    pub fn is_entity_type(entity_type: EntityType) -> Self {
        PrincipalOrResourceConstraint::Is(entity_type)
    }

    /// Does this constraint contain a slot
    pub fn has_slot(&self) -> bool {
        match self {
            PrincipalOrResourceConstraint::Any | PrincipalOrResourceConstraint::Is(_) => false,
            PrincipalOrResourceConstraint::In(eref)
            | PrincipalOrResourceConstraint::Eq(eref)
            | PrincipalOrResourceConstraint::IsIn(eref, _) => {
                matches!(eref, EntityReference::Slot)
            }
        }
    }

    /// Fill in the Slot, if any, with the given EUID
    pub fn with_filled_slot(self, euid: Arc<EntityUid>) -> Self {
        match self {
            PrincipalOrResourceConstraint::Eq(EntityReference::Slot) => {
                PrincipalOrResourceConstraint::Eq(EntityReference::EUID(euid))
            }
            PrincipalOrResourceConstraint::In(EntityReference::Slot) => {
                PrincipalOrResourceConstraint::In(EntityReference::EUID(euid))
            }
            PrincipalOrResourceConstraint::IsIn(EntityReference::Slot, entity_type) => {
                PrincipalOrResourceConstraint::IsIn(EntityReference::EUID(euid), entity_type)
            }
            _ => self,
        }
    }

    /// Turn the constraint into an expr
    /// # arguments
    /// * `slot` - The slot id, determining the variable used in the expression.
    pub fn as_expr(&self, slot: SlotId) -> Expr {
        let v = Var::from(slot);
        match self {
            PrincipalOrResourceConstraint::Any => Expr::val(true),
            PrincipalOrResourceConstraint::Eq(euid) => {
                Expr::is_eq(Expr::var(v), euid.into_expr(slot))
            }
            PrincipalOrResourceConstraint::In(euid) => {
                Expr::is_in(Expr::var(v), euid.into_expr(slot))
            }
            PrincipalOrResourceConstraint::IsIn(euid, entity_type) => Expr::and(
                Expr::is_entity_type(Expr::var(v), entity_type.clone()),
                Expr::is_in(Expr::var(v), euid.into_expr(slot)),
            ),
            PrincipalOrResourceConstraint::Is(entity_type) => {
                Expr::is_entity_type(Expr::var(v), entity_type.clone())
            }
        }
    }

    /// Pretty print the constraint
    /// # arguments
    /// * `slot` - The slot id, determining the variable used in the expression.
    pub fn display(&self, slot: SlotId) -> String {
        let v = Var::from(slot);
        match self {
            PrincipalOrResourceConstraint::In(euid) => {
                format!("{} in {}", v, euid.into_expr(slot))
            }
            PrincipalOrResourceConstraint::Eq(euid) => {
                format!("{} == {}", v, euid.into_expr(slot))
            }
            PrincipalOrResourceConstraint::IsIn(euid, entity_type) => {
                format!("{} is {} in {}", v, entity_type, euid.into_expr(slot))
            }
            PrincipalOrResourceConstraint::Is(entity_type) => {
                format!("{v} is {entity_type}")
            }
            PrincipalOrResourceConstraint::Any => format!("{v}"),
        }
    }

    /// Get the entity uid in this constraint or `None` if there are no uids in the constraint
    pub fn get_euid(&self) -> Option<&Arc<EntityUid>> {
        match self {
            PrincipalOrResourceConstraint::Any => None,
            PrincipalOrResourceConstraint::In(EntityReference::EUID(euid)) => Some(euid),
            PrincipalOrResourceConstraint::In(EntityReference::Slot) => None,
            PrincipalOrResourceConstraint::Eq(EntityReference::EUID(euid)) => Some(euid),
            PrincipalOrResourceConstraint::Eq(EntityReference::Slot) => None,
            PrincipalOrResourceConstraint::IsIn(EntityReference::EUID(euid), _) => Some(euid),
            PrincipalOrResourceConstraint::IsIn(EntityReference::Slot, _) => None,
            PrincipalOrResourceConstraint::Is(_) => None,
        }
    }

    /// Get an iterator over all of the entity uids in this constraint.
    pub fn iter_euids(&self) -> impl Iterator<Item = &'_ EntityUid> {
        self.get_euid().into_iter().map(Arc::as_ref)
    }
}

/// Constraint for action scope variables.
/// Action variables can be constrained to be in any variable in a list.
#[derive(Clone, Hash, Eq, PartialEq, PartialOrd, Ord, Debug)]
pub enum ActionConstraint {
    /// Unconstrained
    Any,
    /// Constrained to being in a list.
    In(Vec<Arc<EntityUid>>),
    /// Constrained to equal a specific euid.
    Eq(Arc<EntityUid>),
}

impl std::fmt::Display for ActionConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let render_euids =
            |euids: &Vec<Arc<EntityUid>>| euids.iter().map(|euid| format!("{euid}")).join(",");
        match self {
            ActionConstraint::Any => write!(f, "action"),
            ActionConstraint::In(euids) => {
                write!(f, "action in [{}]", render_euids(euids))
            }
            ActionConstraint::Eq(euid) => write!(f, "action == {euid}"),
        }
    }
}

impl ActionConstraint {
    /// Unconstrained action.
    pub fn any() -> Self {
        ActionConstraint::Any
    }

    /// Action constrained to being in a list of euids.
    pub fn is_in(euids: impl IntoIterator<Item = EntityUid>) -> Self {
        ActionConstraint::In(euids.into_iter().map(Arc::new).collect())
    }

    /// Action constrained to being equal to a euid.
    pub fn is_eq(euid: EntityUid) -> Self {
        ActionConstraint::Eq(Arc::new(euid))
    }

    fn euids_into_expr(euids: impl IntoIterator<Item = Arc<EntityUid>>) -> Expr {
        Expr::set(euids.into_iter().map(Expr::val))
    }

    /// Turn the constraint into an expression.
    pub fn as_expr(&self) -> Expr {
        match self {
            ActionConstraint::Any => Expr::val(true),
            ActionConstraint::In(euids) => Expr::is_in(
                Expr::var(Var::Action),
                ActionConstraint::euids_into_expr(euids.iter().cloned()),
            ),
            ActionConstraint::Eq(euid) => {
                Expr::is_eq(Expr::var(Var::Action), Expr::val(Arc::clone(euid)))
            }
        }
    }

    /// Get an iterator over all of the entity uids in this constraint.
    pub fn iter_euids(&self) -> impl Iterator<Item = &'_ EntityUid> {
        match self {
            ActionConstraint::Any => EntityIterator::None,
            ActionConstraint::In(euids) => {
                EntityIterator::Bunch(euids.iter().map(Arc::as_ref).collect())
            }
            ActionConstraint::Eq(euid) => EntityIterator::One(euid),
        }
    }
}

/// A unique identifier for a policy statement
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash)]
pub struct PolicyId(SmolStr);

impl PolicyId {
    /// Create a PolicyId from a string or string-like
    pub fn from_string(id: impl AsRef<str>) -> Self {
        Self(SmolStr::from(id.as_ref()))
    }

    /// Create a PolicyId from a `SmolStr`
    pub fn from_smolstr(id: SmolStr) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for PolicyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.escape_debug())
    }
}

impl AsRef<str> for PolicyId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// the Effect of a policy
#[derive(Serialize, Deserialize, Hash, Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
#[serde(rename_all = "camelCase")]
pub enum Effect {
    /// this is a Forbid policy
    Forbid,
    /// this is a Permit policy
    Permit,
}

impl std::fmt::Display for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Forbid => write!(f, "forbid"),
            Self::Permit => write!(f, "permit"),
        }
    }
}

enum EntityIterator<'a> {
    None,
    One(&'a EntityUid),
    Bunch(Vec<&'a EntityUid>),
}

impl<'a> Iterator for EntityIterator<'a> {
    type Item = &'a EntityUid;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            EntityIterator::None => None,
            EntityIterator::One(euid) => {
                let eptr = *euid;
                let mut ptr = EntityIterator::None;
                std::mem::swap(self, &mut ptr);
                Some(eptr)
            }
            EntityIterator::Bunch(v) => v.pop(),
        }
    }
}

#[cfg(test)]
// PANIC SAFETY: Unit Test Code
#[allow(clippy::unwrap_used)]
mod test {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    use cool_asserts::assert_matches;

    use super::*;

    fn alice() -> EntityUid {
        EntityUid::with_eid_and_type("User", "alice").unwrap()
    }

    fn principal_slot_template() -> TemplateBody {
        TemplateBody::new(
            PolicyId::from_string("t1"),
            Annotations::new(),
            Effect::Permit,
            PrincipalConstraint::is_in_slot(),
            ActionConstraint::any(),
            ResourceConstraint::any(),
            Expr::val(true),
        )
    }

    fn static_body() -> TemplateBody {
        TemplateBody::new(
            PolicyId::from_string("t0"),
            Annotations::new(),
            Effect::Forbid,
            PrincipalConstraint::any(),
            ActionConstraint::any(),
            ResourceConstraint::any(),
            Expr::val(true),
        )
    }

    fn template_map(bodies: impl IntoIterator<Item = TemplateBody>) -> BTreeMap<PolicyId, Arc<TemplateBody>> {
        bodies
            .into_iter()
            .map(|body| (body.id().clone(), Arc::new(body)))
            .collect()
    }

    #[test]
    fn link_fills_principal_slot() {
        let templates = template_map([principal_slot_template()]);
        let mut values = SlotEnv::new();
        values.insert(SlotId::Principal, alice());
        let link = LiteralPolicy::template_linked_policy(
            PolicyId::from_string("t1"),
            PolicyId::from_string("l1"),
            values,
        );
        let policy = link.reify(&templates).unwrap();
        assert_eq!(policy.id(), &PolicyId::from_string("l1"));
        assert!(!policy.is_static());
        assert_eq!(
            policy.principal_constraint(),
            PrincipalConstraint::is_in(Arc::new(alice()))
        );
        assert_eq!(policy.condition().slots().next(), None);
    }

    #[test]
    fn link_fills_expression_level_slots() {
        let body = TemplateBody::new(
            PolicyId::from_string("t2"),
            Annotations::new(),
            Effect::Permit,
            PrincipalConstraint::any(),
            ActionConstraint::any(),
            ResourceConstraint::any(),
            Expr::is_eq(Expr::var(Var::Principal), Expr::slot(SlotId::Principal)),
        );
        assert_eq!(body.slots().collect::<Vec<_>>(), vec![SlotId::Principal]);
        let templates = template_map([body]);
        let mut values = SlotEnv::new();
        values.insert(SlotId::Principal, alice());
        let link = LiteralPolicy::template_linked_policy(
            PolicyId::from_string("t2"),
            PolicyId::from_string("l2"),
            values,
        );
        let policy = link.reify(&templates).unwrap();
        let condition = policy.condition();
        assert_eq!(condition.slots().next(), None);
        assert!(condition
            .subexpressions()
            .any(|e| e == &Expr::val(alice())));
    }

    #[test]
    fn unbound_slot_is_rejected() {
        let templates = template_map([principal_slot_template()]);
        let link = LiteralPolicy::template_linked_policy(
            PolicyId::from_string("t1"),
            PolicyId::from_string("l1"),
            SlotEnv::new(),
        );
        assert_matches!(
            link.reify(&templates),
            Err(ReificationError::Linking(LinkingError::UnboundSlot {
                slot: SlotId::Principal
            }))
        );
    }

    #[test]
    fn unused_binding_is_rejected() {
        let templates = template_map([static_body()]);
        let mut values = SlotEnv::new();
        values.insert(SlotId::Resource, alice());
        let link = LiteralPolicy::template_linked_policy(
            PolicyId::from_string("t0"),
            PolicyId::from_string("l0"),
            values,
        );
        assert_matches!(
            link.reify(&templates),
            Err(ReificationError::Linking(LinkingError::UnusedBinding {
                slot: SlotId::Resource
            }))
        );
    }

    #[test]
    fn dangling_template_reference() {
        let templates = BTreeMap::new();
        let p = LiteralPolicy::static_policy(PolicyId::from_string("nope"));
        assert_matches!(
            p.reify(&templates),
            Err(ReificationError::NoSuchTemplate(id)) => {
                assert_eq!(id, PolicyId::from_string("nope"));
            }
        );
    }

    #[test]
    fn static_policy_reifies_without_bindings() {
        let templates = template_map([static_body()]);
        let policy = LiteralPolicy::static_policy(PolicyId::from_string("t0"))
            .reify(&templates)
            .unwrap();
        assert!(policy.is_static());
        assert_eq!(policy.id(), &PolicyId::from_string("t0"));
        assert_eq!(policy.condition(), policy.template().condition());
    }

    #[test]
    fn slots_are_ordered_and_deduplicated() {
        let body = TemplateBody::new(
            PolicyId::from_string("t3"),
            Annotations::new(),
            Effect::Permit,
            PrincipalConstraint::is_eq_slot(),
            ActionConstraint::any(),
            ResourceConstraint::is_in_slot(),
            Expr::is_eq(Expr::var(Var::Principal), Expr::slot(SlotId::Principal)),
        );
        assert_eq!(
            body.slots().collect::<Vec<_>>(),
            vec![SlotId::Principal, SlotId::Resource]
        );
    }

    #[test]
    fn condition_is_nested_conjunction() {
        let body = static_body();
        let expected = Expr::and(
            Expr::and(
                Expr::and(Expr::val(true), Expr::val(true)),
                Expr::val(true),
            ),
            Expr::val(true),
        );
        assert_eq!(body.condition(), expected);
    }

    #[test]
    fn template_display() {
        let t = principal_slot_template();
        assert_eq!(
            t.to_string(),
            "permit(\n  principal in ?principal,\n  action,\n  resource\n) when {\n  true\n};"
        );
        let euid = Arc::new(alice());
        let t2 = TemplateBody::new(
            PolicyId::from_string("t4"),
            Annotations::new(),
            Effect::Forbid,
            PrincipalConstraint::is_eq(Arc::clone(&euid)),
            ActionConstraint::is_eq(alice()),
            ResourceConstraint::is_entity_type_in(
                "Folder".parse().unwrap(),
                Arc::clone(&euid),
            ),
            Expr::val(true),
        );
        assert_eq!(
            t2.to_string(),
            "forbid(\n  principal == User::\"alice\",\n  action == User::\"alice\",\n  resource is Folder in User::\"alice\"\n) when {\n  true\n};"
        );
    }

    #[test]
    fn literal_policy_hash_matches_eq() {
        let build = || {
            let mut values = SlotEnv::new();
            values.insert(SlotId::Principal, alice());
            LiteralPolicy::template_linked_policy(
                PolicyId::from_string("template"),
                PolicyId::from_string("id"),
                values,
            )
        };
        let compute_hash = |ir: &LiteralPolicy| {
            let mut s = DefaultHasher::new();
            ir.hash(&mut s);
            s.finish()
        };
        let a = build();
        let b = build();
        assert_eq!(a, b);
        assert_eq!(compute_hash(&a), compute_hash(&b));
    }

    #[test]
    fn effect_display() {
        assert_eq!(Effect::Permit.to_string(), "permit");
        assert_eq!(Effect::Forbid.to_string(), "forbid");
    }
}
