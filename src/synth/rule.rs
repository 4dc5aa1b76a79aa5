//! Listener-rule manager and synthesizer.
//!
//! Rules route by priority scan, so mutating a live listener has two hard
//! constraints: no request class may become unroutable mid-flight, and the
//! listener's rule cap may never be exceeded. The plan is: re-prioritize
//! settings-matched rules while pushing doomed rules into the top of the
//! priority space (one batched call, nothing deleted yet), modify
//! priority-matched rules in place (atomic on the API), then interleave
//! creates and deletes, preferring creates while capacity lasts.
use crate::api::{
    CreateRuleInput, DeleteRuleInput, ModifyRuleInput, Rule, RulePriorityPair,
    SetRulePrioritiesInput, Tag,
};
use crate::client::Elbv2Api;
use crate::config::Config;
use crate::context::SynthContext;
use crate::error::{codes, SyncError};
use crate::model::{
    build_actions, build_conditions, build_transforms, ListenerRuleSpec, Stack, StackId,
    MAX_RULE_PRIORITY,
};
use crate::synth::compare::{actions_equivalent, conditions_equivalent, transforms_equivalent};
use crate::synth::tagging::{ReconcileTagsOpts, Tagged, TaggingManager};
use crate::tags::TrackingProvider;
use crate::util::retry_with_budget;
use crate::Result;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

/// Desired actions, conditions and transforms resolved through the wire
/// shapes, with target-group references already materialized into ARNs.
#[derive(Debug, Clone, Default)]
pub struct ActionConditionPair {
    pub actions: Vec<crate::api::Action>,
    pub conditions: Vec<crate::api::RuleCondition>,
    pub transforms: Vec<crate::api::RuleTransform>,
}

impl ActionConditionPair {
    pub fn build(ctx: &SynthContext, spec: &ListenerRuleSpec) -> Result<Self> {
        Ok(ActionConditionPair {
            actions: build_actions(ctx, &spec.actions)?,
            conditions: build_conditions(&spec.conditions),
            transforms: build_transforms(&spec.transforms)?,
        })
    }

    fn matches_rule(&self, rule: &Rule) -> bool {
        actions_equivalent(&self.actions, rule.actions.as_deref().unwrap_or(&[]))
            && conditions_equivalent(&self.conditions, rule.conditions.as_deref().unwrap_or(&[]))
            && transforms_equivalent(&self.transforms, rule.transforms.as_deref().unwrap_or(&[]))
    }
}

#[derive(Debug, Clone)]
pub struct RuleWithPair {
    pub spec: ListenerRuleSpec,
    pub pair: ActionConditionPair,
}

/// How the desired and observed rule sets line up.
#[derive(Debug, Default)]
pub struct RuleMatches {
    /// Settings and priority both equal: only tags may need work.
    pub fully_matched: Vec<(RuleWithPair, Tagged<Rule>)>,
    /// Settings equal, priority not: re-prioritized in the batched call.
    pub matched_by_settings: Vec<(RuleWithPair, Tagged<Rule>)>,
    /// Priority equal, settings not: modified in place.
    pub matched_by_priority: Vec<(RuleWithPair, Tagged<Rule>)>,
    pub to_create: Vec<RuleWithPair>,
    /// Ordered by descending current priority, so the push-down keeps their
    /// relative order near the top of the priority space.
    pub to_delete: Vec<Tagged<Rule>>,
}

fn sdk_priority(rule: &Tagged<Rule>) -> Result<i64> {
    let raw = rule.inner.priority.as_deref().unwrap_or_default();
    raw.parse::<i64>().map_err(|_| {
        SyncError::Validation(format!(
            "unparseable rule priority {:?} on {}",
            rule.inner.priority,
            rule.inner.rule_arn.as_deref().unwrap_or_default()
        ))
    })
}

/// Two-stage matching: first by settings equality (first surviving
/// candidate wins, in listing order), then by priority among the leftovers.
pub fn match_rules(
    desired: Vec<RuleWithPair>,
    sdk_rules: Vec<Tagged<Rule>>,
) -> Result<RuleMatches> {
    let mut matches = RuleMatches::default();
    let mut sdk_pool: Vec<Option<Tagged<Rule>>> = sdk_rules.into_iter().map(Some).collect();
    let mut unmatched_desired: Vec<RuleWithPair> = Vec::new();

    for rule in desired {
        let candidate = sdk_pool.iter().position(|slot| {
            slot.as_ref()
                .map_or(false, |sdk| rule.pair.matches_rule(&sdk.inner))
        });
        match candidate {
            Some(idx) => {
                let sdk = sdk_pool[idx].take().unwrap();
                if sdk_priority(&sdk)? == rule.spec.priority {
                    matches.fully_matched.push((rule, sdk));
                } else {
                    matches.matched_by_settings.push((rule, sdk));
                }
            }
            None => unmatched_desired.push(rule),
        }
    }

    let mut sdk_by_priority: BTreeMap<i64, Tagged<Rule>> = BTreeMap::new();
    let mut displaced: Vec<Tagged<Rule>> = Vec::new();
    for sdk in sdk_pool.into_iter().flatten() {
        // the API guarantees unique priorities; a stray twin is only ever
        // deletable
        if let Some(twin) = sdk_by_priority.insert(sdk_priority(&sdk)?, sdk) {
            displaced.push(twin);
        }
    }

    for rule in unmatched_desired {
        match sdk_by_priority.remove(&rule.spec.priority) {
            Some(sdk) => matches.matched_by_priority.push((rule, sdk)),
            None => matches.to_create.push(rule),
        }
    }

    // descending priority: the highest-numbered doomed rule lands at 50000
    matches.to_delete = sdk_by_priority.into_iter().rev().map(|(_, sdk)| sdk).collect();
    matches.to_delete.extend(displaced);

    Ok(matches)
}

/// One batched `SetRulePriorities` payload: doomed rules walk down from the
/// top of the priority space, then the settings-matched rules take their
/// desired priorities. The freed low band guarantees a duplicate-free
/// post-state.
pub fn build_priority_pairs(
    matched_by_settings: &[(RuleWithPair, Tagged<Rule>)],
    to_delete: &[Tagged<Rule>],
) -> Vec<RulePriorityPair> {
    let mut pairs = Vec::with_capacity(to_delete.len() + matched_by_settings.len());
    let mut last = MAX_RULE_PRIORITY;
    for sdk in to_delete {
        pairs.push(RulePriorityPair {
            rule_arn: sdk.inner.rule_arn.clone().unwrap_or_default(),
            priority: last,
        });
        last -= 1;
    }
    for (rule, sdk) in matched_by_settings {
        pairs.push(RulePriorityPair {
            rule_arn: sdk.inner.rule_arn.clone().unwrap_or_default(),
            priority: rule.spec.priority,
        });
    }
    pairs
}

/// The listener's rule bound, learned the hard way.
#[derive(Debug, Copy, Clone, PartialEq)]
enum RuleCapacity {
    Unknown,
    Bound(usize),
}

impl RuleCapacity {
    fn allows(&self, count: usize) -> bool {
        match self {
            RuleCapacity::Unknown => true,
            RuleCapacity::Bound(bound) => count < *bound,
        }
    }

    fn is_unknown(&self) -> bool {
        matches!(self, RuleCapacity::Unknown)
    }
}

pub struct RuleManager {
    client: Arc<dyn Elbv2Api>,
    tagging: Arc<TaggingManager>,
    tracking: Arc<dyn TrackingProvider>,
    config: Config,
}

impl RuleManager {
    pub fn new(
        client: Arc<dyn Elbv2Api>,
        tagging: Arc<TaggingManager>,
        tracking: Arc<dyn TrackingProvider>,
        config: Config,
    ) -> Self {
        RuleManager {
            client,
            tagging,
            tracking,
            config,
        }
    }

    fn ignored_tag_keys(&self) -> BTreeSet<String> {
        self.tracking
            .legacy_tag_keys()
            .into_iter()
            .chain(self.config.external_managed_tags.iter().cloned())
            .collect()
    }

    /// Creates one rule, retrying within the poll budget while the listener
    /// is not yet visible to eventually-consistent readers. A capacity
    /// error is surfaced verbatim for the caller's interleave machine.
    pub async fn create(
        &self,
        ctx: &SynthContext,
        stack_id: &StackId,
        listener_arn: &str,
        rule: &RuleWithPair,
    ) -> Result<()> {
        debug!(
            resource = rule.spec.resource_id.as_str(),
            priority = rule.spec.priority,
            "Creating rule"
        );
        let tags = self
            .tracking
            .resource_tags(stack_id, &rule.spec.resource_id, &rule.spec.tags);
        let input = CreateRuleInput {
            listener_arn: listener_arn.to_string(),
            priority: rule.spec.priority,
            actions: rule.pair.actions.clone(),
            conditions: rule.pair.conditions.clone(),
            transforms: if rule.pair.transforms.is_empty() {
                None
            } else {
                Some(rule.pair.transforms.clone())
            },
            tags: Some(
                tags.iter()
                    .map(|(key, value)| Tag {
                        key: key.clone(),
                        value: Some(value.clone()),
                    })
                    .collect(),
            ),
        };

        let client = &self.client;
        retry_with_budget(
            ctx,
            self.config.poll.rule_create_interval,
            self.config.poll.rule_create_timeout,
            |err| err.is_listener_not_found(),
            || {
                let input = input.clone();
                async move { client.create_rule(input).await.map(|_| ()) }
            },
        )
        .await
    }

    /// In-place rule modification; atomic on the API, so the matched
    /// request class keeps routing throughout. An empty desired transform
    /// list clears whatever the rule carried.
    pub async fn modify(
        &self,
        ctx: &SynthContext,
        rule_arn: &str,
        pair: &ActionConditionPair,
    ) -> Result<()> {
        debug!(resource = rule_arn, "Modifying rule");
        let input = ModifyRuleInput {
            rule_arn: rule_arn.to_string(),
            actions: pair.actions.clone(),
            conditions: pair.conditions.clone(),
            transforms: if pair.transforms.is_empty() {
                None
            } else {
                Some(pair.transforms.clone())
            },
            reset_transforms: if pair.transforms.is_empty() {
                Some(true)
            } else {
                None
            },
        };
        ctx.guard(self.client.modify_rule(input)).await
    }

    pub async fn delete(&self, ctx: &SynthContext, sdk: &Tagged<Rule>) -> Result<()> {
        let arn = sdk.inner.rule_arn.clone().unwrap_or_default();
        debug!(resource = arn.as_str(), "Deleting rule");
        ctx.guard(self.client.delete_rule(DeleteRuleInput { rule_arn: arn }))
            .await
    }

    pub async fn set_priorities(
        &self,
        ctx: &SynthContext,
        pairs: Vec<RulePriorityPair>,
    ) -> Result<()> {
        debug!(count = pairs.len(), "Re-assigning rule priorities");
        ctx.guard(self.client.set_rule_priorities(SetRulePrioritiesInput {
            rule_priorities: pairs,
        }))
        .await
    }

    pub async fn reconcile_tags(
        &self,
        ctx: &SynthContext,
        stack_id: &StackId,
        rule: &RuleWithPair,
        sdk: &Tagged<Rule>,
    ) -> Result<()> {
        let arn = sdk.inner.rule_arn.clone().unwrap_or_default();
        let desired = self
            .tracking
            .resource_tags(stack_id, &rule.spec.resource_id, &rule.spec.tags);
        self.tagging
            .reconcile_tags(
                ctx,
                &arn,
                &desired,
                ReconcileTagsOpts::default()
                    .with_current(sdk.tags.clone())
                    .ignoring(self.ignored_tag_keys()),
            )
            .await
    }
}

pub struct RuleSynthesizer {
    manager: RuleManager,
    tagging: Arc<TaggingManager>,
}

impl RuleSynthesizer {
    pub fn new(
        client: Arc<dyn Elbv2Api>,
        tagging: Arc<TaggingManager>,
        tracking: Arc<dyn TrackingProvider>,
        config: Config,
    ) -> Self {
        RuleSynthesizer {
            manager: RuleManager::new(client, tagging.clone(), tracking, config),
            tagging,
        }
    }

    pub async fn synthesize(&self, ctx: &SynthContext, stack: &Stack) -> Result<()> {
        let mut rules_by_listener: BTreeMap<(String, i64), Vec<ListenerRuleSpec>> =
            BTreeMap::new();
        for rule in &stack.listener_rules {
            rules_by_listener
                .entry((rule.lb_resource_id.clone(), rule.port))
                .or_default()
                .push(rule.clone());
        }

        let listener_keys: BTreeSet<(String, i64)> = stack
            .listeners
            .iter()
            .map(|listener| (listener.lb_resource_id.clone(), listener.port))
            .collect();
        if let Some(orphan) = rules_by_listener
            .keys()
            .find(|key| !listener_keys.contains(key))
        {
            return Err(SyncError::UnresolvedReference {
                resource_id: format!("{}:{}", orphan.0, orphan.1),
            });
        }

        for listener in &stack.listeners {
            let key = (listener.lb_resource_id.clone(), listener.port);
            let desired = rules_by_listener.remove(&key).unwrap_or_default();
            let listener_arn = ctx.listener_arn(&listener.lb_resource_id, listener.port)?;
            self.sync_listener_rules(ctx, &stack.id, &listener_arn, desired)
                .await?;
        }

        Ok(())
    }

    async fn sync_listener_rules(
        &self,
        ctx: &SynthContext,
        stack_id: &StackId,
        listener_arn: &str,
        desired: Vec<ListenerRuleSpec>,
    ) -> Result<()> {
        validate_priorities(&desired)?;

        let mut rules = Vec::with_capacity(desired.len());
        for spec in desired {
            let pair = ActionConditionPair::build(ctx, &spec)?;
            rules.push(RuleWithPair { spec, pair });
        }

        let sdk_rules: Vec<Tagged<Rule>> = self
            .tagging
            .list_listener_rules(ctx, listener_arn)
            .await?
            .into_iter()
            .filter(|rule| rule.inner.is_default != Some(true))
            .collect();
        let initial_count = sdk_rules.len();

        let matches = match_rules(rules, sdk_rules)?;

        let priority_pairs =
            build_priority_pairs(&matches.matched_by_settings, &matches.to_delete);
        if !priority_pairs.is_empty() {
            self.manager.set_priorities(ctx, priority_pairs).await?;
        }

        for (rule, sdk) in &matches.matched_by_priority {
            let arn = sdk.inner.rule_arn.clone().unwrap_or_default();
            self.manager.modify(ctx, &arn, &rule.pair).await?;
            self.manager.reconcile_tags(ctx, stack_id, rule, sdk).await?;
        }

        self.interleave_creates_and_deletes(
            ctx,
            stack_id,
            listener_arn,
            &matches.to_create,
            &matches.to_delete,
            initial_count,
        )
        .await?;

        for (rule, sdk) in matches
            .fully_matched
            .iter()
            .chain(matches.matched_by_settings.iter())
        {
            self.manager.reconcile_tags(ctx, stack_id, rule, sdk).await?;
        }

        Ok(())
    }

    /// Creates are preferred so a new rule is routable before its
    /// predecessor disappears; deletes only happen once the listener's rule
    /// bound has actually been hit.
    async fn interleave_creates_and_deletes(
        &self,
        ctx: &SynthContext,
        stack_id: &StackId,
        listener_arn: &str,
        to_create: &[RuleWithPair],
        to_delete: &[Tagged<Rule>],
        initial_count: usize,
    ) -> Result<()> {
        let mut res_idx = 0;
        let mut sdk_idx = 0;
        let mut count = initial_count;
        let mut capacity = RuleCapacity::Unknown;

        while res_idx < to_create.len() || sdk_idx < to_delete.len() {
            if res_idx < to_create.len() && capacity.allows(count) {
                match self
                    .manager
                    .create(ctx, stack_id, listener_arn, &to_create[res_idx])
                    .await
                {
                    Ok(()) => {
                        res_idx += 1;
                        count += 1;
                    }
                    Err(err)
                        if err.is_code(codes::TOO_MANY_RULES) && capacity.is_unknown() =>
                    {
                        capacity = RuleCapacity::Bound(count);
                    }
                    Err(err) => return Err(err),
                }
            } else if sdk_idx < to_delete.len() {
                self.manager.delete(ctx, &to_delete[sdk_idx]).await?;
                sdk_idx += 1;
                count -= 1;
            } else {
                return Err(SyncError::TooManyRules {
                    listener_arn: listener_arn.to_string(),
                });
            }
        }

        Ok(())
    }
}

fn validate_priorities(desired: &[ListenerRuleSpec]) -> Result<()> {
    let mut seen: BTreeSet<i64> = BTreeSet::new();
    for rule in desired {
        if rule.priority < 1 || rule.priority > MAX_RULE_PRIORITY {
            return Err(SyncError::Validation(format!(
                "rule {} priority {} outside [1, {}]",
                rule.resource_id, rule.priority, MAX_RULE_PRIORITY
            )));
        }
        if !seen.insert(rule.priority) {
            return Err(SyncError::Validation(format!(
                "duplicate rule priority {} on listener",
                rule.priority
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::*;
    use crate::client::testing::{Call, MockApi};
    use crate::model::{
        ActionSpec, ListenerSpec, LoadBalancerSpec, Protocol, RuleConditionSpec, TargetGroupRef,
        TransformSpec, WeightedTargetGroup,
    };
    use crate::tags::{tag_map, ClusterTrackingProvider, TagMap};
    use std::sync::Arc;

    fn create_synthesizer(api: Arc<MockApi>, config: Config) -> RuleSynthesizer {
        let tagging = Arc::new(TaggingManager::new(api.clone(), config.describe_tags_chunk));
        let tracking = Arc::new(ClusterTrackingProvider::new("prod"));
        RuleSynthesizer::new(api, tagging, tracking, config)
    }

    fn forward_spec(tg_arn: &str) -> ActionSpec {
        ActionSpec::Forward {
            target_groups: vec![WeightedTargetGroup {
                target_group: TargetGroupRef::Arn(tg_arn.to_string()),
                weight: None,
            }],
            stickiness: None,
        }
    }

    fn rule_spec(resource_id: &str, priority: i64, path: &str, tg_arn: &str) -> ListenerRuleSpec {
        ListenerRuleSpec {
            resource_id: resource_id.to_string(),
            lb_resource_id: "lb-1".to_string(),
            port: 443,
            priority,
            actions: vec![forward_spec(tg_arn)],
            conditions: vec![RuleConditionSpec::PathPattern {
                values: vec![path.to_string()],
            }],
            ..Default::default()
        }
    }

    fn rule_with_pair(priority: i64) -> RuleWithPair {
        RuleWithPair {
            spec: ListenerRuleSpec {
                priority,
                ..Default::default()
            },
            pair: ActionConditionPair::default(),
        }
    }

    fn owned_rule_tags(resource_id: &str) -> TagMap {
        tag_map(&[
            ("elbv2.k8s.aws/cluster", "prod"),
            ("elbv2.k8s.aws/stack", "ns/app"),
            ("elbv2.k8s.aws/resource", resource_id),
        ])
    }

    fn sdk_rule(arn: &str, priority: &str, path: &str, tg_arn: &str) -> Tagged<Rule> {
        Tagged::new(
            Rule {
                rule_arn: Some(arn.to_string()),
                priority: Some(priority.to_string()),
                actions: Some(vec![Action {
                    type_: Some("forward".to_string()),
                    order: Some(1),
                    target_group_arn: Some(tg_arn.to_string()),
                    ..Default::default()
                }]),
                conditions: Some(vec![RuleCondition {
                    field: Some("path-pattern".to_string()),
                    path_pattern_config: Some(PathPatternConditionConfig {
                        values: vec![path.to_string()],
                    }),
                    ..Default::default()
                }]),
                is_default: Some(false),
                ..Default::default()
            },
            owned_rule_tags(arn),
        )
    }

    fn bare_sdk_rule(arn: &str, priority: &str) -> Tagged<Rule> {
        Tagged::new(
            Rule {
                rule_arn: Some(arn.to_string()),
                priority: Some(priority.to_string()),
                is_default: Some(false),
                ..Default::default()
            },
            TagMap::new(),
        )
    }

    // ---------------------------------------------------------------------
    // priority batch construction

    #[test]
    fn reprioritize_settings_matched_pairs() {
        let matched = vec![
            (rule_with_pair(3), bare_sdk_rule("arn-1", "1")),
            (rule_with_pair(1), bare_sdk_rule("arn-3", "3")),
        ];

        let pairs = build_priority_pairs(&matched, &[]);

        assert_eq!(
            vec![
                RulePriorityPair {
                    rule_arn: "arn-1".to_string(),
                    priority: 3,
                },
                RulePriorityPair {
                    rule_arn: "arn-3".to_string(),
                    priority: 1,
                },
            ],
            pairs
        );
    }

    #[test]
    fn push_down_walks_from_the_top() {
        let doomed = vec![bare_sdk_rule("arn-3", "3"), bare_sdk_rule("arn-1", "1")];

        let pairs = build_priority_pairs(&[], &doomed);

        assert_eq!(
            vec![
                RulePriorityPair {
                    rule_arn: "arn-3".to_string(),
                    priority: 50_000,
                },
                RulePriorityPair {
                    rule_arn: "arn-1".to_string(),
                    priority: 49_999,
                },
            ],
            pairs
        );
    }

    #[test]
    fn push_down_and_reprioritize_combine_in_one_batch() {
        let matched = vec![
            (rule_with_pair(3), bare_sdk_rule("arn-1", "1")),
            (rule_with_pair(1), bare_sdk_rule("arn-3", "3")),
        ];
        let doomed = vec![bare_sdk_rule("arn-35", "35"), bare_sdk_rule("arn-16", "16")];

        let pairs = build_priority_pairs(&matched, &doomed);

        assert_eq!(
            vec![
                RulePriorityPair {
                    rule_arn: "arn-35".to_string(),
                    priority: 50_000,
                },
                RulePriorityPair {
                    rule_arn: "arn-16".to_string(),
                    priority: 49_999,
                },
                RulePriorityPair {
                    rule_arn: "arn-1".to_string(),
                    priority: 3,
                },
                RulePriorityPair {
                    rule_arn: "arn-3".to_string(),
                    priority: 1,
                },
            ],
            pairs
        );
    }

    #[test]
    fn priority_batch_has_unique_priorities() {
        let matched = vec![
            (rule_with_pair(3), bare_sdk_rule("arn-1", "1")),
            (rule_with_pair(1), bare_sdk_rule("arn-3", "3")),
        ];
        let doomed = vec![
            bare_sdk_rule("arn-9", "9"),
            bare_sdk_rule("arn-7", "7"),
            bare_sdk_rule("arn-5", "5"),
        ];

        let pairs = build_priority_pairs(&matched, &doomed);

        let priorities: BTreeSet<i64> = pairs.iter().map(|pair| pair.priority).collect();
        assert_eq!(pairs.len(), priorities.len());
        assert!(priorities.iter().all(|p| (1..=50_000).contains(p)));
    }

    // ---------------------------------------------------------------------
    // matching

    fn build_rules(ctx: &SynthContext, specs: Vec<ListenerRuleSpec>) -> Vec<RuleWithPair> {
        specs
            .into_iter()
            .map(|spec| {
                let pair = ActionConditionPair::build(ctx, &spec).unwrap();
                RuleWithPair { spec, pair }
            })
            .collect()
    }

    #[test]
    fn settings_match_beats_priority_match() {
        let ctx = SynthContext::detached();
        let desired = build_rules(&ctx, vec![rule_spec("r-1", 10, "/api", "arn:tg-1")]);
        // same settings live at priority 20; priority 10 holds different settings
        let sdk = vec![
            sdk_rule("arn-a", "10", "/other", "arn:tg-2"),
            sdk_rule("arn-b", "20", "/api", "arn:tg-1"),
        ];

        let matches = match_rules(desired, sdk).unwrap();

        assert_eq!(1, matches.matched_by_settings.len());
        assert_eq!(
            Some("arn-b".to_string()),
            matches.matched_by_settings[0].1.inner.rule_arn
        );
        assert!(matches.fully_matched.is_empty());
        assert!(matches.matched_by_priority.is_empty());
        assert!(matches.to_create.is_empty());
        assert_eq!(1, matches.to_delete.len());
        assert_eq!(Some("arn-a".to_string()), matches.to_delete[0].inner.rule_arn);
    }

    #[test]
    fn fully_matched_needs_nothing_but_tags() {
        let ctx = SynthContext::detached();
        let desired = build_rules(&ctx, vec![rule_spec("r-1", 10, "/api", "arn:tg-1")]);
        let sdk = vec![sdk_rule("arn-a", "10", "/api", "arn:tg-1")];

        let matches = match_rules(desired, sdk).unwrap();

        assert_eq!(1, matches.fully_matched.len());
        assert!(matches.matched_by_settings.is_empty());
        assert!(matches.matched_by_priority.is_empty());
        assert!(matches.to_create.is_empty());
        assert!(matches.to_delete.is_empty());
    }

    #[test]
    fn priority_match_marks_in_place_modify() {
        let ctx = SynthContext::detached();
        let desired = build_rules(&ctx, vec![rule_spec("r-1", 10, "/api", "arn:tg-1")]);
        let sdk = vec![sdk_rule("arn-a", "10", "/old", "arn:tg-2")];

        let matches = match_rules(desired, sdk).unwrap();

        assert_eq!(1, matches.matched_by_priority.len());
        assert!(matches.to_create.is_empty());
        assert!(matches.to_delete.is_empty());
    }

    #[test]
    fn to_delete_is_ordered_by_descending_priority() {
        let matches = match_rules(
            vec![],
            vec![
                sdk_rule("arn-low", "16", "/a", "arn:tg-1"),
                sdk_rule("arn-high", "35", "/b", "arn:tg-1"),
            ],
        )
        .unwrap();

        let arns: Vec<_> = matches
            .to_delete
            .iter()
            .map(|sdk| sdk.inner.rule_arn.clone().unwrap())
            .collect();
        assert_eq!(vec!["arn-high".to_string(), "arn-low".to_string()], arns);
    }

    #[test]
    fn unparseable_priority_is_rejected() {
        let result = match_rules(vec![], vec![bare_sdk_rule("arn-bad", "not-a-number")]);
        assert!(result.is_err());
    }

    // ---------------------------------------------------------------------
    // end-to-end synthesis over the mock port

    fn stack_with_rules(rules: Vec<ListenerRuleSpec>) -> Stack {
        let mut stack = Stack::new(crate::model::StackId::new("ns", "app"));
        stack.load_balancers = vec![LoadBalancerSpec {
            resource_id: "lb-1".to_string(),
            name: "k8s-lb-1".to_string(),
            ..Default::default()
        }];
        stack.listeners = vec![ListenerSpec {
            lb_resource_id: "lb-1".to_string(),
            port: 443,
            protocol: Protocol::Https,
            ..Default::default()
        }];
        stack.listener_rules = rules;
        stack
    }

    fn rule_ctx() -> SynthContext {
        let ctx = SynthContext::detached();
        ctx.record_load_balancer_arn("lb-1", "arn:lb-1");
        ctx.record_listener_arn("lb-1", 443, "arn:listener-1");
        ctx
    }

    fn enqueue_rule_discovery(api: &MockApi, rules: &[&Tagged<Rule>]) {
        api.enqueue_describe_rules(DescribeRulesOutput {
            rules: rules.iter().map(|rule| rule.inner.clone()).collect(),
            next_marker: None,
        });
        if !rules.is_empty() {
            api.enqueue_describe_tags(DescribeTagsOutput {
                tag_descriptions: rules
                    .iter()
                    .map(|rule| TagDescription {
                        resource_arn: rule.inner.rule_arn.clone(),
                        tags: Some(
                            rule.tags
                                .iter()
                                .map(|(k, v)| Tag {
                                    key: k.clone(),
                                    value: Some(v.clone()),
                                })
                                .collect(),
                        ),
                    })
                    .collect(),
            });
        }
    }

    #[tokio::test]
    async fn pure_reprioritization_is_one_batched_call() {
        let api = MockApi::new();
        let sdk_a = sdk_rule("arn-1", "1", "/three", "arn:tg-3");
        let sdk_b = sdk_rule("arn-3", "3", "/one", "arn:tg-1");
        enqueue_rule_discovery(&api, &[&sdk_a, &sdk_b]);

        // tags carry the rule resource ids so the final tag pass is clean
        let mut rule_three = rule_spec("arn-1", 3, "/three", "arn:tg-3");
        rule_three.resource_id = "arn-1".to_string();
        let mut rule_one = rule_spec("arn-3", 1, "/one", "arn:tg-1");
        rule_one.resource_id = "arn-3".to_string();

        let synthesizer = create_synthesizer(api.clone(), Config::default());
        let ctx = rule_ctx();
        synthesizer
            .synthesize(&ctx, &stack_with_rules(vec![rule_three, rule_one]))
            .await
            .unwrap();

        assert_eq!(vec!["set_rule_priorities"], api.mutation_names());
        let batch = api
            .calls()
            .into_iter()
            .find_map(|call| match call {
                Call::SetRulePriorities(input) => Some(input),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            vec![
                RulePriorityPair {
                    rule_arn: "arn-1".to_string(),
                    priority: 3,
                },
                RulePriorityPair {
                    rule_arn: "arn-3".to_string(),
                    priority: 1,
                },
            ],
            batch.rule_priorities
        );
    }

    #[tokio::test]
    async fn doomed_rules_are_pushed_down_before_deletion() {
        let api = MockApi::new();
        let doomed_a = sdk_rule("arn-35", "35", "/dead-a", "arn:tg-old");
        let doomed_b = sdk_rule("arn-16", "16", "/dead-b", "arn:tg-old");
        enqueue_rule_discovery(&api, &[&doomed_a, &doomed_b]);

        let synthesizer = create_synthesizer(api.clone(), Config::default());
        let ctx = rule_ctx();
        synthesizer
            .synthesize(&ctx, &stack_with_rules(vec![]))
            .await
            .unwrap();

        assert_eq!(
            vec!["set_rule_priorities", "delete_rule", "delete_rule"],
            api.mutation_names()
        );
        let batch = api
            .calls()
            .into_iter()
            .find_map(|call| match call {
                Call::SetRulePriorities(input) => Some(input),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            vec![
                RulePriorityPair {
                    rule_arn: "arn-35".to_string(),
                    priority: 50_000,
                },
                RulePriorityPair {
                    rule_arn: "arn-16".to_string(),
                    priority: 49_999,
                },
            ],
            batch.rule_priorities
        );
    }

    #[tokio::test]
    async fn capacity_bound_interleaves_creates_and_deletes() {
        let api = MockApi::new();
        // listener sits at its cap with two doomed rules
        let doomed_x = sdk_rule("arn-x", "90", "/dead-x", "arn:tg-old");
        let doomed_y = sdk_rule("arn-y", "91", "/dead-y", "arn:tg-old");
        enqueue_rule_discovery(&api, &[&doomed_x, &doomed_y]);
        api.fail_next(
            "create_rule",
            SyncError::api("TooManyRules", "maximum number of rules reached"),
        );

        let synthesizer = create_synthesizer(api.clone(), Config::default());
        let ctx = rule_ctx();
        synthesizer
            .synthesize(
                &ctx,
                &stack_with_rules(vec![
                    rule_spec("r-1", 10, "/new-one", "arn:tg-1"),
                    rule_spec("r-2", 11, "/new-two", "arn:tg-1"),
                ]),
            )
            .await
            .unwrap();

        assert_eq!(
            vec![
                "set_rule_priorities",
                "create_rule",
                "delete_rule",
                "create_rule",
                "delete_rule",
                "create_rule",
            ],
            api.mutation_names()
        );
        // the doomed rule at the top of the priority space dies first
        let first_delete = api
            .calls()
            .into_iter()
            .find_map(|call| match call {
                Call::DeleteRule(input) => Some(input),
                _ => None,
            })
            .unwrap();
        assert_eq!("arn-y", first_delete.rule_arn);
    }

    #[tokio::test]
    async fn creates_without_pressure_never_delete_early() {
        let api = MockApi::new();
        let doomed = sdk_rule("arn-old", "5", "/old", "arn:tg-old");
        enqueue_rule_discovery(&api, &[&doomed]);

        let synthesizer = create_synthesizer(api.clone(), Config::default());
        let ctx = rule_ctx();
        synthesizer
            .synthesize(
                &ctx,
                &stack_with_rules(vec![rule_spec("r-1", 10, "/new", "arn:tg-1")]),
            )
            .await
            .unwrap();

        assert_eq!(
            vec!["set_rule_priorities", "create_rule", "delete_rule"],
            api.mutation_names()
        );
    }

    #[tokio::test]
    async fn empty_transform_modify_carries_the_reset_flag() {
        let api = MockApi::new();
        let mut sdk = sdk_rule("arn-a", "10", "/api", "arn:tg-1");
        sdk.inner.transforms = Some(vec![RuleTransform {
            type_: Some("url-rewrite".to_string()),
            url_rewrite_config: Some(RewriteConfig {
                regex: Some("^/api/(.*)$".to_string()),
                replace: Some("/v2/$1".to_string()),
            }),
            ..Default::default()
        }]);
        enqueue_rule_discovery(&api, &[&sdk]);

        let mut spec = rule_spec("arn-a", 10, "/api", "arn:tg-1");
        spec.resource_id = "arn-a".to_string();

        let synthesizer = create_synthesizer(api.clone(), Config::default());
        let ctx = rule_ctx();
        synthesizer
            .synthesize(&ctx, &stack_with_rules(vec![spec]))
            .await
            .unwrap();

        let modify = api
            .calls()
            .into_iter()
            .find_map(|call| match call {
                Call::ModifyRule(input) => Some(input),
                _ => None,
            })
            .expect("transform removal goes through modify");
        assert_eq!(Some(true), modify.reset_transforms);
        assert_eq!(None, modify.transforms);
    }

    #[tokio::test]
    async fn desired_transforms_modify_without_reset() {
        let api = MockApi::new();
        let sdk = sdk_rule("arn-a", "10", "/api", "arn:tg-1");
        enqueue_rule_discovery(&api, &[&sdk]);

        let mut spec = rule_spec("arn-a", 10, "/api", "arn:tg-1");
        spec.transforms = vec![TransformSpec::UrlRewrite {
            regex: "^/api/(.*)$".to_string(),
            replace: "/v2/$1".to_string(),
        }];

        let synthesizer = create_synthesizer(api.clone(), Config::default());
        let ctx = rule_ctx();
        synthesizer
            .synthesize(&ctx, &stack_with_rules(vec![spec]))
            .await
            .unwrap();

        let modify = api
            .calls()
            .into_iter()
            .find_map(|call| match call {
                Call::ModifyRule(input) => Some(input),
                _ => None,
            })
            .unwrap();
        assert_eq!(None, modify.reset_transforms);
        assert_eq!(1, modify.transforms.unwrap().len());
    }

    #[tokio::test(start_paused = true)]
    async fn create_retries_until_the_listener_is_visible() {
        let api = MockApi::new();
        enqueue_rule_discovery(&api, &[]);
        api.fail_next(
            "create_rule",
            SyncError::api("ListenerNotFound", "listener does not exist"),
        );
        api.fail_next(
            "create_rule",
            SyncError::api("ListenerNotFoundException", "listener does not exist"),
        );

        let synthesizer = create_synthesizer(api.clone(), Config::default());
        let ctx = rule_ctx();
        synthesizer
            .synthesize(
                &ctx,
                &stack_with_rules(vec![rule_spec("r-1", 10, "/new", "arn:tg-1")]),
            )
            .await
            .unwrap();

        assert_eq!(
            vec!["create_rule", "create_rule", "create_rule"],
            api.mutation_names()
        );
    }

    #[tokio::test]
    async fn converged_rules_issue_no_mutations() {
        let api = MockApi::new();
        let sdk = sdk_rule("r-1", "10", "/api", "arn:tg-1");
        enqueue_rule_discovery(&api, &[&sdk]);

        let synthesizer = create_synthesizer(api.clone(), Config::default());
        let ctx = rule_ctx();
        synthesizer
            .synthesize(
                &ctx,
                &stack_with_rules(vec![rule_spec("r-1", 10, "/api", "arn:tg-1")]),
            )
            .await
            .unwrap();

        assert!(api.mutation_names().is_empty());
    }

    #[tokio::test]
    async fn duplicate_desired_priorities_are_rejected() {
        let api = MockApi::new();
        let synthesizer = create_synthesizer(api, Config::default());
        let ctx = rule_ctx();

        let result = synthesizer
            .synthesize(
                &ctx,
                &stack_with_rules(vec![
                    rule_spec("r-1", 10, "/a", "arn:tg-1"),
                    rule_spec("r-2", 10, "/b", "arn:tg-1"),
                ]),
            )
            .await;

        match result {
            Err(SyncError::Validation(msg)) => assert!(msg.contains("duplicate")),
            other => panic!("expected Validation, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn out_of_range_priority_is_rejected() {
        let api = MockApi::new();
        let synthesizer = create_synthesizer(api, Config::default());
        let ctx = rule_ctx();

        let result = synthesizer
            .synthesize(
                &ctx,
                &stack_with_rules(vec![rule_spec("r-1", 50_001, "/a", "arn:tg-1")]),
            )
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn rules_for_unknown_listener_are_rejected() {
        let api = MockApi::new();
        let synthesizer = create_synthesizer(api, Config::default());
        let ctx = rule_ctx();

        let mut stack = stack_with_rules(vec![]);
        stack.listener_rules = vec![ListenerRuleSpec {
            resource_id: "r-1".to_string(),
            lb_resource_id: "lb-1".to_string(),
            port: 8443,
            priority: 1,
            ..Default::default()
        }];

        match synthesizer.synthesize(&ctx, &stack).await {
            Err(SyncError::UnresolvedReference { resource_id }) => {
                assert_eq!("lb-1:8443", resource_id)
            }
            other => panic!("expected UnresolvedReference, got {:?}", other.map(|_| ())),
        }
    }
}
