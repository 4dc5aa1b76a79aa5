//! Target group manager and synthesizer.
//!
//! Deletion of unmatched target groups is deferred to post-synthesize: a
//! listener rule about to be removed in the same cycle may still reference
//! them, and `DeleteTargetGroup` answers `ResourceInUse` until it no longer
//! does.
use crate::api::{
    CreateTargetGroupInput, DeleteTargetGroupInput, ModifyTargetGroupInput, Tag, TargetGroup,
};
use crate::client::Elbv2Api;
use crate::config::Config;
use crate::context::SynthContext;
use crate::error::{codes, SyncError};
use crate::model::{HealthCheckSpec, Stack, StackId, TargetGroupSpec};
use crate::synth::attrs::TargetGroupAttributeReconciler;
use crate::synth::matcher::match_resources;
use crate::synth::tagging::{ReconcileTagsOpts, Tagged, TaggingManager};
use crate::tags::TrackingProvider;
use crate::util::retry_with_budget;
use crate::Result;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Immutable facets force replacement. On network protocols the health
/// check is effectively immutable too, except for the thresholds.
pub fn requires_replacement(spec: &TargetGroupSpec, sdk: &Tagged<TargetGroup>) -> bool {
    if sdk.inner.target_type.as_deref() != Some(spec.target_type.as_str())
        || sdk.inner.protocol.as_deref() != Some(spec.protocol.as_str())
    {
        return true;
    }
    if let Some(version) = spec.protocol_version {
        if sdk.inner.protocol_version.as_deref() != Some(version.as_str()) {
            return true;
        }
    }

    if spec.protocol.is_network() {
        let hc = &spec.health_check;
        if let Some(protocol) = hc.protocol {
            if sdk.inner.health_check_protocol.as_deref() != Some(protocol.as_str()) {
                return true;
            }
        }
        if hc.interval_seconds.is_some()
            && sdk.inner.health_check_interval_seconds != hc.interval_seconds
        {
            return true;
        }
        if hc.timeout_seconds.is_some()
            && sdk.inner.health_check_timeout_seconds != hc.timeout_seconds
        {
            return true;
        }
        if let Some(matcher) = &hc.matcher {
            let sdk_matcher = sdk.inner.matcher.clone().unwrap_or_default();
            if matcher.http_code.is_some() && sdk_matcher.http_code != matcher.http_code {
                return true;
            }
            if matcher.grpc_code.is_some() && sdk_matcher.grpc_code != matcher.grpc_code {
                return true;
            }
        }
    }

    false
}

/// True when any specified health-check field differs from the observed
/// target group.
pub fn is_health_check_drifted(spec: &HealthCheckSpec, sdk: &TargetGroup) -> bool {
    if spec.enabled.is_some() && sdk.health_check_enabled != spec.enabled {
        return true;
    }
    if let Some(protocol) = spec.protocol {
        if sdk.health_check_protocol.as_deref() != Some(protocol.as_str()) {
            return true;
        }
    }
    if spec.path.is_some() && sdk.health_check_path != spec.path {
        return true;
    }
    if spec.port.is_some() && sdk.health_check_port != spec.port {
        return true;
    }
    if spec.interval_seconds.is_some() && sdk.health_check_interval_seconds != spec.interval_seconds
    {
        return true;
    }
    if spec.timeout_seconds.is_some() && sdk.health_check_timeout_seconds != spec.timeout_seconds {
        return true;
    }
    if spec.healthy_threshold.is_some() && sdk.healthy_threshold_count != spec.healthy_threshold {
        return true;
    }
    if spec.unhealthy_threshold.is_some()
        && sdk.unhealthy_threshold_count != spec.unhealthy_threshold
    {
        return true;
    }
    if let Some(matcher) = &spec.matcher {
        let sdk_matcher = sdk.matcher.clone().unwrap_or_default();
        if matcher.http_code.is_some() && sdk_matcher.http_code != matcher.http_code {
            return true;
        }
        if matcher.grpc_code.is_some() && sdk_matcher.grpc_code != matcher.grpc_code {
            return true;
        }
    }
    false
}

pub struct TargetGroupManager {
    client: Arc<dyn Elbv2Api>,
    tagging: Arc<TaggingManager>,
    tracking: Arc<dyn TrackingProvider>,
    attrs: TargetGroupAttributeReconciler,
    config: Config,
}

impl TargetGroupManager {
    pub fn new(
        client: Arc<dyn Elbv2Api>,
        tagging: Arc<TaggingManager>,
        tracking: Arc<dyn TrackingProvider>,
        config: Config,
    ) -> Self {
        TargetGroupManager {
            attrs: TargetGroupAttributeReconciler::new(client.clone()),
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

    pub async fn create(
        &self,
        ctx: &SynthContext,
        stack_id: &StackId,
        spec: &TargetGroupSpec,
    ) -> Result<TargetGroup> {
        debug!(resource = spec.resource_id.as_str(), "Creating target group");
        let tags = self
            .tracking
            .resource_tags(stack_id, &spec.resource_id, &spec.tags);
        let hc = &spec.health_check;

        let input = CreateTargetGroupInput {
            name: spec.name.clone(),
            target_type: spec.target_type.as_str().to_string(),
            protocol: Some(spec.protocol.as_str().to_string()),
            protocol_version: spec.protocol_version.map(|v| v.as_str().to_string()),
            port: spec.port,
            vpc_id: if spec.vpc_id.is_empty() {
                None
            } else {
                Some(spec.vpc_id.clone())
            },
            health_check_enabled: hc.enabled,
            health_check_protocol: hc.protocol.map(|p| p.as_str().to_string()),
            health_check_path: hc.path.clone(),
            health_check_port: hc.port.clone(),
            health_check_interval_seconds: hc.interval_seconds,
            health_check_timeout_seconds: hc.timeout_seconds,
            healthy_threshold_count: hc.healthy_threshold,
            unhealthy_threshold_count: hc.unhealthy_threshold,
            matcher: hc.matcher.as_ref().map(|m| m.build()),
            tags: Some(
                tags.iter()
                    .map(|(key, value)| Tag {
                        key: key.clone(),
                        value: Some(value.clone()),
                    })
                    .collect(),
            ),
        };

        let output = ctx.guard(self.client.create_target_group(input)).await?;
        let tg = output.target_groups.into_iter().next().ok_or_else(|| {
            SyncError::Validation(format!("create returned no target group for {}", spec.name))
        })?;
        let arn = tg.target_group_arn.clone().unwrap_or_default();

        self.attrs.reconcile(ctx, &arn, &spec.attributes).await?;

        Ok(tg)
    }

    pub async fn update(
        &self,
        ctx: &SynthContext,
        stack_id: &StackId,
        spec: &TargetGroupSpec,
        sdk: &Tagged<TargetGroup>,
    ) -> Result<()> {
        let arn = sdk.inner.target_group_arn.clone().unwrap_or_default();

        let desired_tags = self
            .tracking
            .resource_tags(stack_id, &spec.resource_id, &spec.tags);
        self.tagging
            .reconcile_tags(
                ctx,
                &arn,
                &desired_tags,
                ReconcileTagsOpts::default()
                    .with_current(sdk.tags.clone())
                    .ignoring(self.ignored_tag_keys()),
            )
            .await?;

        if is_health_check_drifted(&spec.health_check, &sdk.inner) {
            debug!(resource = arn.as_str(), "Modifying target group health check");
            let hc = &spec.health_check;
            ctx.guard(self.client.modify_target_group(ModifyTargetGroupInput {
                target_group_arn: arn.clone(),
                health_check_enabled: hc.enabled,
                health_check_protocol: hc.protocol.map(|p| p.as_str().to_string()),
                health_check_path: hc.path.clone(),
                health_check_port: hc.port.clone(),
                health_check_interval_seconds: hc.interval_seconds,
                health_check_timeout_seconds: hc.timeout_seconds,
                healthy_threshold_count: hc.healthy_threshold,
                unhealthy_threshold_count: hc.unhealthy_threshold,
                matcher: hc.matcher.as_ref().map(|m| m.build()),
            }))
            .await?;
        }

        self.attrs.reconcile(ctx, &arn, &spec.attributes).await?;

        Ok(())
    }

    /// Deletes a target group, retrying `ResourceInUse` within the
    /// configured poll budget.
    pub async fn delete(&self, ctx: &SynthContext, sdk: &Tagged<TargetGroup>) -> Result<()> {
        let arn = sdk.inner.target_group_arn.clone().unwrap_or_default();
        debug!(resource = arn.as_str(), "Deleting target group");

        let client = &self.client;
        retry_with_budget(
            ctx,
            self.config.poll.tg_delete_interval,
            self.config.poll.tg_delete_timeout,
            |err| err.is_code(codes::RESOURCE_IN_USE),
            || {
                let input = DeleteTargetGroupInput {
                    target_group_arn: arn.clone(),
                };
                async move { client.delete_target_group(input).await }
            },
        )
        .await
    }
}

pub struct TargetGroupSynthesizer {
    manager: TargetGroupManager,
    tagging: Arc<TaggingManager>,
    tracking: Arc<dyn TrackingProvider>,
    deferred_deletions: Vec<Tagged<TargetGroup>>,
}

impl TargetGroupSynthesizer {
    pub fn new(
        client: Arc<dyn Elbv2Api>,
        tagging: Arc<TaggingManager>,
        tracking: Arc<dyn TrackingProvider>,
        config: Config,
    ) -> Self {
        TargetGroupSynthesizer {
            manager: TargetGroupManager::new(client, tagging.clone(), tracking.clone(), config),
            tagging,
            tracking,
            deferred_deletions: Vec::new(),
        }
    }

    pub async fn synthesize(&mut self, ctx: &SynthContext, stack: &Stack) -> Result<()> {
        let filters = self.tracking.stack_filters(&stack.id);
        let sdk_tgs = self.tagging.list_target_groups(ctx, &filters).await?;

        let resource_id_tag_key = self.tracking.resource_id_tag_key();
        let matches = match_resources(
            stack.target_groups.clone(),
            sdk_tgs,
            &resource_id_tag_key,
            |spec| spec.resource_id.clone(),
            |sdk| sdk.target_group_arn.clone().unwrap_or_default(),
            requires_replacement,
        )?;

        for spec in &matches.unmatched_res {
            let tg = self.manager.create(ctx, &stack.id, spec).await?;
            let arn = tg.target_group_arn.clone().unwrap_or_default();
            ctx.record_target_group_arn(spec.resource_id.as_str(), arn.as_str());
        }

        for (spec, sdk) in &matches.matched {
            let arn = sdk.inner.target_group_arn.clone().unwrap_or_default();
            ctx.record_target_group_arn(spec.resource_id.as_str(), arn.as_str());
            self.manager.update(ctx, &stack.id, spec, sdk).await?;
        }

        // unmatched cloud target groups may still be referenced by rules the
        // rule synthesizer removes later this cycle
        self.deferred_deletions = matches.unmatched_sdk;

        Ok(())
    }

    pub async fn post_synthesize(&mut self, ctx: &SynthContext) -> Result<()> {
        for sdk in std::mem::take(&mut self.deferred_deletions) {
            self.manager.delete(ctx, &sdk).await?;
        }
        Ok(())
    }
}
