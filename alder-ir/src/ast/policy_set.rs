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

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{LiteralPolicy, Policy, PolicyId, ReificationError, TemplateBody};

/// A policy set in its interchange form: templates and the links made against
/// them, each collection keyed by its embedded ids.
///
/// A static policy appears as a zero-slot template plus a link with
/// `link_id = None` and the same id. This form does not maintain the
/// referential invariants a reified set has; [`LiteralPolicySet::reify`]
/// checks them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LiteralPolicySet {
    /// All templates in the set, keyed by [`TemplateBody::id`]
    templates: BTreeMap<PolicyId, Arc<TemplateBody>>,
    /// All links in the set, keyed by [`LiteralPolicy::id`]
    links: BTreeMap<PolicyId, LiteralPolicy>,
}

impl LiteralPolicySet {
    /// Construct a `LiteralPolicySet` from its templates and links, keying
    /// each collection by the ids embedded in the elements. A later element
    /// with the same id replaces an earlier one; the wire decoder rejects
    /// duplicate ids before this constructor runs.
    pub fn new(
        templates: impl IntoIterator<Item = Arc<TemplateBody>>,
        links: impl IntoIterator<Item = LiteralPolicy>,
    ) -> Self {
        Self {
            templates: templates
                .into_iter()
                .map(|template| (template.id().clone(), template))
                .collect(),
            links: links
                .into_iter()
                .map(|link| (link.id().clone(), link))
                .collect(),
        }
    }

    /// Iterate over the templates in the set, in id order.
    pub fn templates(&self) -> impl Iterator<Item = &TemplateBody> {
        self.templates.values().map(Arc::as_ref)
    }

    /// Iterate over the links in the set, in id order.
    pub fn links(&self) -> impl Iterator<Item = &LiteralPolicy> {
        self.links.values()
    }

    /// Look up a template by id.
    pub fn get_template(&self, id: &PolicyId) -> Option<&Arc<TemplateBody>> {
        self.templates.get(id)
    }

    /// Reify every link in the set against its template, in id order,
    /// returning the first failure.
    ///
    /// On success every returned [`Policy`] has fully-concrete scope
    /// constraints and condition.
    pub fn reify(&self) -> Result<Vec<Policy>, ReificationError> {
        self.links
            .values()
            .cloned()
            .map(|link| link.reify(&self.templates))
            .collect()
    }
}

// PANIC SAFETY tests
#[allow(clippy::unwrap_used)]
// PANIC SAFETY tests
#[allow(clippy::indexing_slicing)]
#[cfg(test)]
mod test {
    use cool_asserts::assert_matches;

    use super::*;
    use crate::ast::{
        ActionConstraint, Annotations, Effect, EntityUid, Expr, LinkingError,
        PrincipalConstraint, ResourceConstraint, SlotEnv, SlotId,
    };

    fn uid(ty: &str, eid: &str) -> EntityUid {
        EntityUid::with_eid_and_type(ty, eid).unwrap()
    }

    fn static_template(id: &str) -> Arc<TemplateBody> {
        Arc::new(TemplateBody::new(
            PolicyId::from_string(id),
            Annotations::new(),
            Effect::Permit,
            PrincipalConstraint::any(),
            ActionConstraint::any(),
            ResourceConstraint::any(),
            Expr::val(true),
        ))
    }

    fn slotted_template(id: &str) -> Arc<TemplateBody> {
        Arc::new(TemplateBody::new(
            PolicyId::from_string(id),
            Annotations::new(),
            Effect::Permit,
            PrincipalConstraint::is_in_slot(),
            ActionConstraint::any(),
            ResourceConstraint::any(),
            Expr::val(true),
        ))
    }

    #[test]
    fn reify_static_and_linked() {
        let mut values = SlotEnv::new();
        values.insert(SlotId::Principal, uid("User", "alice"));
        let pset = LiteralPolicySet::new(
            [static_template("s0"), slotted_template("t1")],
            [
                LiteralPolicy::static_policy(PolicyId::from_string("s0")),
                LiteralPolicy::template_linked_policy(
                    PolicyId::from_string("t1"),
                    PolicyId::from_string("l1"),
                    values,
                ),
            ],
        );
        let policies = pset.reify().unwrap();
        assert_eq!(policies.len(), 2);
        // BTreeMap iteration: "l1" sorts before "s0"
        assert_eq!(policies[0].id(), &PolicyId::from_string("l1"));
        assert!(!policies[0].is_static());
        assert_eq!(
            policies[0].principal_constraint(),
            PrincipalConstraint::is_in(Arc::new(uid("User", "alice")))
        );
        assert_eq!(policies[1].id(), &PolicyId::from_string("s0"));
        assert!(policies[1].is_static());
    }

    #[test]
    fn reify_reports_first_failure_in_id_order() {
        // "a" has an unbound slot, "b" dangles; "a" sorts first
        let pset = LiteralPolicySet::new(
            [slotted_template("t1")],
            [
                LiteralPolicy::template_linked_policy(
                    PolicyId::from_string("t1"),
                    PolicyId::from_string("a"),
                    SlotEnv::new(),
                ),
                LiteralPolicy::static_policy(PolicyId::from_string("b")),
            ],
        );
        assert_matches!(
            pset.reify(),
            Err(ReificationError::Linking(LinkingError::UnboundSlot {
                slot: SlotId::Principal
            }))
        );
    }

    #[test]
    fn get_template() {
        let pset = LiteralPolicySet::new([static_template("s0")], []);
        assert!(pset.get_template(&PolicyId::from_string("s0")).is_some());
        assert!(pset.get_template(&PolicyId::from_string("nope")).is_none());
        assert_eq!(pset.templates().count(), 1);
        assert_eq!(pset.links().count(), 0);
    }
}
