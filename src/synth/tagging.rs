//! Discovery by stack tags and tag reconciliation.
use crate::api::{
    AddTagsInput, DescribeListenersInput, DescribeLoadBalancersInput, DescribeRulesInput,
    DescribeTagsInput, DescribeTargetGroupsInput, Listener, LoadBalancer, RemoveTagsInput, Rule,
    Tag, TargetGroup,
};
use crate::client::Elbv2Api;
use crate::context::SynthContext;
use crate::tags::{any_filter_matches, diff_tags, TagFilter, TagMap};
use crate::Result;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

/// A cloud resource together with its full tag map.
#[derive(Debug, Clone, PartialEq)]
pub struct Tagged<T> {
    pub inner: T,
    pub tags: TagMap,
}

impl<T> Tagged<T> {
    pub fn new(inner: T, tags: TagMap) -> Self {
        Tagged { inner, tags }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReconcileTagsOpts {
    /// Known-current tags; when absent the manager re-describes.
    pub current_tags: Option<TagMap>,
    /// Keys that are never added, updated or removed.
    pub ignored_keys: BTreeSet<String>,
}

impl ReconcileTagsOpts {
    pub fn with_current(mut self, tags: TagMap) -> Self {
        self.current_tags = Some(tags);
        self
    }

    pub fn ignoring<I: IntoIterator<Item = String>>(mut self, keys: I) -> Self {
        self.ignored_keys.extend(keys);
        self
    }
}

pub struct TaggingManager {
    client: Arc<dyn Elbv2Api>,
    describe_tags_chunk: usize,
}

impl TaggingManager {
    pub fn new(client: Arc<dyn Elbv2Api>, describe_tags_chunk: usize) -> Self {
        TaggingManager {
            client,
            describe_tags_chunk,
        }
    }

    /// Load balancers whose tag map satisfies any of the filters.
    pub async fn list_load_balancers(
        &self,
        ctx: &SynthContext,
        filters: &[TagFilter],
    ) -> Result<Vec<Tagged<LoadBalancer>>> {
        let mut lbs: Vec<LoadBalancer> = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let result = ctx
                .guard(self.client.describe_load_balancers(DescribeLoadBalancersInput {
                    marker: marker.take(),
                    ..Default::default()
                }))
                .await?;
            lbs.extend(result.load_balancers);
            if result.next_marker.is_none() {
                break;
            }
            marker = result.next_marker;
        }

        let arns: Vec<String> = lbs
            .iter()
            .filter_map(|lb| lb.load_balancer_arn.clone())
            .collect();
        let mut tags_by_arn = self.tags_by_arn(ctx, arns).await?;

        Ok(lbs
            .into_iter()
            .filter_map(|lb| {
                let arn = lb.load_balancer_arn.clone()?;
                let tags = tags_by_arn.remove(&arn).unwrap_or_default();
                if any_filter_matches(filters, &tags) {
                    Some(Tagged::new(lb, tags))
                } else {
                    None
                }
            })
            .collect())
    }

    /// Target groups whose tag map satisfies any of the filters.
    pub async fn list_target_groups(
        &self,
        ctx: &SynthContext,
        filters: &[TagFilter],
    ) -> Result<Vec<Tagged<TargetGroup>>> {
        let mut tgs: Vec<TargetGroup> = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let result = ctx
                .guard(self.client.describe_target_groups(DescribeTargetGroupsInput {
                    marker: marker.take(),
                    ..Default::default()
                }))
                .await?;
            tgs.extend(result.target_groups);
            if result.next_marker.is_none() {
                break;
            }
            marker = result.next_marker;
        }

        let arns: Vec<String> = tgs
            .iter()
            .filter_map(|tg| tg.target_group_arn.clone())
            .collect();
        let mut tags_by_arn = self.tags_by_arn(ctx, arns).await?;

        Ok(tgs
            .into_iter()
            .filter_map(|tg| {
                let arn = tg.target_group_arn.clone()?;
                let tags = tags_by_arn.remove(&arn).unwrap_or_default();
                if any_filter_matches(filters, &tags) {
                    Some(Tagged::new(tg, tags))
                } else {
                    None
                }
            })
            .collect())
    }

    /// All listeners on one owned load balancer, with their tags.
    pub async fn list_listeners(
        &self,
        ctx: &SynthContext,
        lb_arn: &str,
    ) -> Result<Vec<Tagged<Listener>>> {
        let mut listeners: Vec<Listener> = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let result = ctx
                .guard(self.client.describe_listeners(DescribeListenersInput {
                    load_balancer_arn: lb_arn.to_string(),
                    marker: marker.take(),
                }))
                .await?;
            listeners.extend(result.listeners);
            if result.next_marker.is_none() {
                break;
            }
            marker = result.next_marker;
        }

        let arns: Vec<String> = listeners
            .iter()
            .filter_map(|listener| listener.listener_arn.clone())
            .collect();
        let mut tags_by_arn = self.tags_by_arn(ctx, arns).await?;

        Ok(listeners
            .into_iter()
            .map(|listener| {
                let tags = listener
                    .listener_arn
                    .as_ref()
                    .and_then(|arn| tags_by_arn.remove(arn))
                    .unwrap_or_default();
                Tagged::new(listener, tags)
            })
            .collect())
    }

    /// All rules on one listener, with their tags. The default rule is
    /// included; callers decide whether it participates.
    pub async fn list_listener_rules(
        &self,
        ctx: &SynthContext,
        listener_arn: &str,
    ) -> Result<Vec<Tagged<Rule>>> {
        let mut rules: Vec<Rule> = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let result = ctx
                .guard(self.client.describe_rules(DescribeRulesInput {
                    listener_arn: listener_arn.to_string(),
                    marker: marker.take(),
                }))
                .await?;
            rules.extend(result.rules);
            if result.next_marker.is_none() {
                break;
            }
            marker = result.next_marker;
        }

        let arns: Vec<String> = rules
            .iter()
            .filter_map(|rule| rule.rule_arn.clone())
            .collect();
        let mut tags_by_arn = self.tags_by_arn(ctx, arns).await?;

        Ok(rules
            .into_iter()
            .map(|rule| {
                let tags = rule
                    .rule_arn
                    .as_ref()
                    .and_then(|arn| tags_by_arn.remove(arn))
                    .unwrap_or_default();
                Tagged::new(rule, tags)
            })
            .collect())
    }

    /// Converges the tags on `arn` to `desired`, never touching ignored
    /// keys. Issues no call when nothing changed.
    pub async fn reconcile_tags(
        &self,
        ctx: &SynthContext,
        arn: &str,
        desired: &TagMap,
        opts: ReconcileTagsOpts,
    ) -> Result<()> {
        let current = match opts.current_tags {
            Some(tags) => tags,
            None => {
                let mut tags_by_arn = self.tags_by_arn(ctx, vec![arn.to_string()]).await?;
                tags_by_arn.remove(arn).unwrap_or_default()
            }
        };

        let (upserts, removals) = diff_tags(desired, &current, &opts.ignored_keys);

        if !upserts.is_empty() {
            debug!(resource = arn, count = upserts.len(), "Adding tags");
            ctx.guard(self.client.add_tags(AddTagsInput {
                resource_arns: vec![arn.to_string()],
                tags: upserts
                    .into_iter()
                    .map(|(key, value)| Tag {
                        key,
                        value: Some(value),
                    })
                    .collect(),
            }))
            .await?;
        }

        if !removals.is_empty() {
            debug!(resource = arn, count = removals.len(), "Removing tags");
            ctx.guard(self.client.remove_tags(RemoveTagsInput {
                resource_arns: vec![arn.to_string()],
                tag_keys: removals,
            }))
            .await?;
        }

        Ok(())
    }

    async fn tags_by_arn(
        &self,
        ctx: &SynthContext,
        arns: Vec<String>,
    ) -> Result<HashMap<String, TagMap>> {
        let mut tags_by_arn = HashMap::with_capacity(arns.len());
        for chunk in arns.chunks(self.describe_tags_chunk.max(1)) {
            let result = ctx
                .guard(self.client.describe_tags(DescribeTagsInput {
                    resource_arns: chunk.to_vec(),
                }))
                .await?;
            for description in result.tag_descriptions {
                if let Some(arn) = description.resource_arn {
                    let tags: TagMap = description
                        .tags
                        .unwrap_or_default()
                        .into_iter()
                        .filter_map(|tag| Some((tag.key, tag.value?)))
                        .collect();
                    tags_by_arn.insert(arn, tags);
                }
            }
        }
        Ok(tags_by_arn)
    }
}
