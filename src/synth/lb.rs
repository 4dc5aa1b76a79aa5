//! Load balancer manager and synthesizer.
use crate::api::{
    CreateLoadBalancerInput, DeleteLoadBalancerInput, DescribeLoadBalancersInput, IpamPools,
    LoadBalancer, LoadBalancerAttribute, ModifyIpPoolsInput, ModifyLoadBalancerAttributesInput,
    SetIpAddressTypeInput, SetSecurityGroupsInput, SetSubnetsInput, Tag,
};
use crate::client::Elbv2Api;
use crate::config::Config;
use crate::context::SynthContext;
use crate::deploy::RequeueAfter;
use crate::error::{codes, SyncError};
use crate::model::{LoadBalancerSpec, LoadBalancerType, Stack, StackId};
use crate::synth::attrs::{CapacityReservationReconciler, LoadBalancerAttributeReconciler};
use crate::synth::matcher::match_resources;
use crate::synth::tagging::{ReconcileTagsOpts, Tagged, TaggingManager};
use crate::tags::{TagMap, TrackingProvider};
use crate::Result;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

pub const LB_STATE_ACTIVE: &str = "active";
pub const LB_STATE_PROVISIONING: &str = "provisioning";

const ATTR_DELETION_PROTECTION: &str = "deletion_protection.enabled";
const IPAM_POOL_IPV4: &str = "ipv4";

/// Type or scheme changes can only be realized by replacing the load
/// balancer; everything else converges in place.
pub fn requires_replacement(spec: &LoadBalancerSpec, sdk: &Tagged<LoadBalancer>) -> bool {
    sdk.inner.type_.as_deref() != Some(spec.type_.as_str())
        || sdk.inner.scheme.as_deref() != Some(spec.scheme.as_str())
}

pub struct LoadBalancerManager {
    client: Arc<dyn Elbv2Api>,
    tagging: Arc<TaggingManager>,
    tracking: Arc<dyn TrackingProvider>,
    attrs: LoadBalancerAttributeReconciler,
    config: Config,
}

impl LoadBalancerManager {
    pub fn new(
        client: Arc<dyn Elbv2Api>,
        tagging: Arc<TaggingManager>,
        tracking: Arc<dyn TrackingProvider>,
        config: Config,
    ) -> Self {
        LoadBalancerManager {
            attrs: LoadBalancerAttributeReconciler::new(client.clone()),
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
        spec: &LoadBalancerSpec,
    ) -> Result<LoadBalancer> {
        debug!(resource = spec.resource_id.as_str(), "Creating load balancer");
        let tags = self
            .tracking
            .resource_tags(stack_id, &spec.resource_id, &spec.tags);

        let input = CreateLoadBalancerInput {
            name: spec.name.clone(),
            type_: spec.type_.as_str().to_string(),
            scheme: Some(spec.scheme.as_str().to_string()),
            ip_address_type: Some(spec.ip_address_type.as_str().to_string()),
            subnet_mappings: Some(spec.build_subnet_mappings()),
            security_groups: if spec.security_groups.is_empty() {
                None
            } else {
                Some(spec.security_groups.clone())
            },
            customer_owned_ipv4_pool: spec.customer_owned_ipv4_pool.clone(),
            ipam_pools: spec.ipv4_ipam_pool_id.clone().map(|pool| IpamPools {
                ipv4_ipam_pool_id: Some(pool),
            }),
            enable_prefix_for_ipv6_source_nat: spec.source_nat_prefix_flag(),
            tags: Some(build_tag_list(&tags)),
        };

        let output = ctx.guard(self.client.create_load_balancer(input)).await?;
        let lb = output.load_balancers.into_iter().next().ok_or_else(|| {
            SyncError::Validation(format!(
                "create returned no load balancer for {}",
                spec.name
            ))
        })?;
        let arn = lb.load_balancer_arn.clone().unwrap_or_default();

        self.attrs.reconcile(ctx, &arn, &spec.attributes).await?;

        // PrivateLink enforcement is not part of the create input
        if spec.type_ == LoadBalancerType::Network {
            if let Some(flag) = spec.private_link_enforcement_flag() {
                ctx.guard(self.client.set_security_groups(SetSecurityGroupsInput {
                    load_balancer_arn: arn.clone(),
                    security_groups: spec.security_groups.clone(),
                    enforce_security_group_inbound_rules_on_private_link_traffic: Some(flag),
                }))
                .await?;
            }
        }

        Ok(lb)
    }

    /// Converges a matched load balancer in the fixed step order: IPAM pool
    /// removal, tags, security groups, subnets, IP address type, attributes,
    /// CoIP drift check, IPAM pool addition.
    pub async fn update(
        &self,
        ctx: &SynthContext,
        stack_id: &StackId,
        spec: &LoadBalancerSpec,
        sdk: &Tagged<LoadBalancer>,
    ) -> Result<()> {
        let arn = sdk.inner.load_balancer_arn.clone().unwrap_or_default();

        self.remove_ip_pools(ctx, spec, sdk, &arn).await?;

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

        self.update_security_groups(ctx, spec, sdk, &arn).await?;
        self.update_subnets(ctx, spec, sdk, &arn).await?;
        self.update_ip_address_type(ctx, spec, sdk, &arn).await?;
        self.attrs.reconcile(ctx, &arn, &spec.attributes).await?;
        self.check_coip_pool_drift(spec, sdk, &arn);
        self.add_ip_pools(ctx, spec, sdk, &arn).await?;

        Ok(())
    }

    /// Deletes a load balancer, disabling deletion protection once if that
    /// is what blocks the delete. The delete cascades the listeners.
    pub async fn delete(&self, ctx: &SynthContext, sdk: &Tagged<LoadBalancer>) -> Result<()> {
        let arn = sdk.inner.load_balancer_arn.clone().unwrap_or_default();
        debug!(resource = arn.as_str(), "Deleting load balancer");

        let input = DeleteLoadBalancerInput {
            load_balancer_arn: arn.clone(),
        };
        match ctx.guard(self.client.delete_load_balancer(input.clone())).await {
            Ok(()) => Ok(()),
            Err(err) if is_blocked_by_deletion_protection(&err) => {
                debug!(resource = arn.as_str(), "Disabling deletion protection");
                ctx.guard(self.client.modify_load_balancer_attributes(
                    ModifyLoadBalancerAttributesInput {
                        load_balancer_arn: arn.clone(),
                        attributes: vec![LoadBalancerAttribute {
                            key: ATTR_DELETION_PROTECTION.to_string(),
                            value: "false".to_string(),
                        }],
                    },
                ))
                .await?;
                ctx.guard(self.client.delete_load_balancer(input)).await
            }
            Err(err) => Err(err),
        }
    }

    async fn remove_ip_pools(
        &self,
        ctx: &SynthContext,
        spec: &LoadBalancerSpec,
        sdk: &Tagged<LoadBalancer>,
        arn: &str,
    ) -> Result<()> {
        let current_pool = sdk
            .inner
            .ipam_pools
            .as_ref()
            .and_then(|pools| pools.ipv4_ipam_pool_id.as_ref());
        if spec.ipv4_ipam_pool_id.is_none() && current_pool.is_some() {
            debug!(resource = arn, "Removing IPAM pool binding");
            ctx.guard(self.client.modify_ip_pools(ModifyIpPoolsInput {
                load_balancer_arn: arn.to_string(),
                ipam_pools: None,
                remove_ipam_pools: Some(vec![IPAM_POOL_IPV4.to_string()]),
            }))
            .await?;
        }
        Ok(())
    }

    async fn add_ip_pools(
        &self,
        ctx: &SynthContext,
        spec: &LoadBalancerSpec,
        sdk: &Tagged<LoadBalancer>,
        arn: &str,
    ) -> Result<()> {
        let current_pool = sdk
            .inner
            .ipam_pools
            .as_ref()
            .and_then(|pools| pools.ipv4_ipam_pool_id.clone());
        if let Some(desired_pool) = &spec.ipv4_ipam_pool_id {
            if current_pool.as_ref() != Some(desired_pool) {
                debug!(resource = arn, pool = desired_pool.as_str(), "Binding IPAM pool");
                ctx.guard(self.client.modify_ip_pools(ModifyIpPoolsInput {
                    load_balancer_arn: arn.to_string(),
                    ipam_pools: Some(IpamPools {
                        ipv4_ipam_pool_id: Some(desired_pool.clone()),
                    }),
                    remove_ipam_pools: None,
                }))
                .await?;
            }
        }
        Ok(())
    }

    async fn update_security_groups(
        &self,
        ctx: &SynthContext,
        spec: &LoadBalancerSpec,
        sdk: &Tagged<LoadBalancer>,
        arn: &str,
    ) -> Result<()> {
        let current: BTreeSet<&String> = sdk
            .inner
            .security_groups
            .iter()
            .flatten()
            .collect();
        let desired: BTreeSet<&String> = spec.security_groups.iter().collect();

        let enforcement_flag = if spec.type_ == LoadBalancerType::Network {
            spec.private_link_enforcement_flag()
        } else {
            None
        };
        let enforcement_drifted = match &enforcement_flag {
            Some(flag) => {
                sdk.inner
                    .enforce_security_group_inbound_rules_on_private_link_traffic
                    .as_ref()
                    != Some(flag)
            }
            None => false,
        };

        if current != desired || enforcement_drifted {
            debug!(resource = arn, "Updating security groups");
            ctx.guard(self.client.set_security_groups(SetSecurityGroupsInput {
                load_balancer_arn: arn.to_string(),
                security_groups: spec.security_groups.clone(),
                enforce_security_group_inbound_rules_on_private_link_traffic: enforcement_flag,
            }))
            .await?;
        }
        Ok(())
    }

    async fn update_subnets(
        &self,
        ctx: &SynthContext,
        spec: &LoadBalancerSpec,
        sdk: &Tagged<LoadBalancer>,
        arn: &str,
    ) -> Result<()> {
        let zones = sdk.inner.availability_zones.as_deref().unwrap_or(&[]);

        let current_subnets: BTreeSet<String> = zones
            .iter()
            .filter_map(|zone| zone.subnet_id.clone())
            .collect();
        let desired_subnets: BTreeSet<String> = spec.subnet_ids().into_iter().collect();

        let current_prefixes: BTreeSet<String> = zones
            .iter()
            .flat_map(|zone| zone.source_nat_ipv6_prefixes.clone().unwrap_or_default())
            .collect();
        let desired_prefixes: BTreeSet<String> = spec
            .subnet_mappings
            .iter()
            .filter_map(|mapping| mapping.source_nat_ipv6_prefix.clone())
            .collect();

        let prefix_flag = spec.source_nat_prefix_flag();
        let prefix_flag_drifted = match &prefix_flag {
            Some(flag) => sdk.inner.enable_prefix_for_ipv6_source_nat.as_ref() != Some(flag),
            None => false,
        };

        let mut drifted = current_subnets != desired_subnets
            || current_prefixes != desired_prefixes
            || prefix_flag_drifted;

        // An NLB moving from ipv4 to dualstack binds its new IPv6 addresses
        // through SetSubnets even when the subnet set itself is unchanged.
        if !drifted
            && spec.type_ == LoadBalancerType::Network
            && spec.ip_address_type.is_dualstack()
            && !zones_have_ipv6_addresses(zones)
            && spec
                .subnet_mappings
                .iter()
                .any(|mapping| mapping.ipv6_address.is_some())
        {
            drifted = true;
        }

        if drifted {
            debug!(resource = arn, "Updating subnet mappings");
            ctx.guard(self.client.set_subnets(SetSubnetsInput {
                load_balancer_arn: arn.to_string(),
                subnets: None,
                subnet_mappings: Some(spec.build_subnet_mappings()),
                enable_prefix_for_ipv6_source_nat: prefix_flag,
            }))
            .await?;
        }
        Ok(())
    }

    async fn update_ip_address_type(
        &self,
        ctx: &SynthContext,
        spec: &LoadBalancerSpec,
        sdk: &Tagged<LoadBalancer>,
        arn: &str,
    ) -> Result<()> {
        if sdk.inner.ip_address_type.as_deref() != Some(spec.ip_address_type.as_str()) {
            debug!(
                resource = arn,
                ip_address_type = spec.ip_address_type.as_str(),
                "Updating IP address type"
            );
            ctx.guard(self.client.set_ip_address_type(SetIpAddressTypeInput {
                load_balancer_arn: arn.to_string(),
                ip_address_type: spec.ip_address_type.as_str().to_string(),
            }))
            .await?;
        }
        Ok(())
    }

    fn check_coip_pool_drift(
        &self,
        spec: &LoadBalancerSpec,
        sdk: &Tagged<LoadBalancer>,
        arn: &str,
    ) {
        if spec.customer_owned_ipv4_pool != sdk.inner.customer_owned_ipv4_pool {
            warn!(
                resource = arn,
                desired = ?spec.customer_owned_ipv4_pool,
                observed = ?sdk.inner.customer_owned_ipv4_pool,
                "customer-owned IPv4 pool drifted; drift is not reconciled"
            );
        }
    }
}

fn zones_have_ipv6_addresses(zones: &[crate::api::AvailabilityZone]) -> bool {
    zones.iter().any(|zone| {
        zone.load_balancer_addresses
            .iter()
            .flatten()
            .any(|address| address.ipv6_address.is_some())
    })
}

fn is_blocked_by_deletion_protection(err: &SyncError) -> bool {
    match err {
        SyncError::Api { code, message } => {
            code == codes::OPERATION_NOT_PERMITTED && message.contains("deletion protection")
        }
        _ => false,
    }
}

fn build_tag_list(tags: &TagMap) -> Vec<Tag> {
    tags.iter()
        .map(|(key, value)| Tag {
            key: key.clone(),
            value: Some(value.clone()),
        })
        .collect()
}

/// A load balancer whose capacity reservation is checked after synthesis.
struct PendingCapacity {
    resource_id: String,
    arn: String,
    desired_units: Option<i64>,
}

pub struct LoadBalancerSynthesizer {
    manager: LoadBalancerManager,
    tagging: Arc<TaggingManager>,
    tracking: Arc<dyn TrackingProvider>,
    capacity: CapacityReservationReconciler,
    client: Arc<dyn Elbv2Api>,
    config: Config,
    pending_capacity: Vec<PendingCapacity>,
}

impl LoadBalancerSynthesizer {
    pub fn new(
        client: Arc<dyn Elbv2Api>,
        tagging: Arc<TaggingManager>,
        tracking: Arc<dyn TrackingProvider>,
        config: Config,
    ) -> Self {
        LoadBalancerSynthesizer {
            manager: LoadBalancerManager::new(
                client.clone(),
                tagging.clone(),
                tracking.clone(),
                config.clone(),
            ),
            capacity: CapacityReservationReconciler::new(client.clone()),
            client,
            tagging,
            tracking,
            config,
            pending_capacity: Vec::new(),
        }
    }

    pub async fn synthesize(&mut self, ctx: &SynthContext, stack: &Stack) -> Result<()> {
        let filters = self.tracking.stack_filters(&stack.id);
        let sdk_lbs = self.tagging.list_load_balancers(ctx, &filters).await?;

        let resource_id_tag_key = self.tracking.resource_id_tag_key();
        let matches = match_resources(
            stack.load_balancers.clone(),
            sdk_lbs,
            &resource_id_tag_key,
            |spec| spec.resource_id.clone(),
            |sdk| sdk.load_balancer_arn.clone().unwrap_or_default(),
            requires_replacement,
        )?;

        // deletes run first: a replaced LB frees its name, and the delete
        // cascades listeners so target groups detach cleanly
        for sdk in &matches.unmatched_sdk {
            self.manager.delete(ctx, sdk).await?;
        }

        for spec in &matches.unmatched_res {
            let lb = self.manager.create(ctx, &stack.id, spec).await?;
            let arn = lb.load_balancer_arn.clone().unwrap_or_default();
            ctx.record_load_balancer_arn(spec.resource_id.as_str(), arn.as_str());
            self.queue_capacity_check(spec, arn);
        }

        for (spec, sdk) in &matches.matched {
            let arn = sdk.inner.load_balancer_arn.clone().unwrap_or_default();
            ctx.record_load_balancer_arn(spec.resource_id.as_str(), arn.as_str());
            self.manager.update(ctx, &stack.id, spec, sdk).await?;
            self.queue_capacity_check(spec, arn);
        }

        Ok(())
    }

    /// Capacity reservation needs an `active` load balancer. A still
    /// provisioning one surfaces as a requeue signal, not as an error.
    pub async fn post_synthesize(&self, ctx: &SynthContext) -> Result<Option<RequeueAfter>> {
        for pending in &self.pending_capacity {
            let described = ctx
                .guard(self.client.describe_load_balancers(DescribeLoadBalancersInput {
                    load_balancer_arns: Some(vec![pending.arn.clone()]),
                    ..Default::default()
                }))
                .await?;
            let lb = described.load_balancers.into_iter().next().ok_or_else(|| {
                SyncError::Validation(format!("load balancer {} disappeared", pending.arn))
            })?;
            let state = lb.state.as_ref().and_then(|state| state.code.as_deref());

            if state == Some(LB_STATE_PROVISIONING) {
                return Ok(Some(RequeueAfter::new(
                    format!(
                        "load balancer {} is still provisioning",
                        pending.resource_id
                    ),
                    self.config.lb_stabilization_requeue,
                )));
            }

            self.capacity
                .reconcile(ctx, &pending.arn, pending.desired_units)
                .await?;
        }
        Ok(None)
    }

    fn queue_capacity_check(&mut self, spec: &LoadBalancerSpec, arn: String) {
        if self.config.features.capacity_reservation {
            self.pending_capacity.push(PendingCapacity {
                resource_id: spec.resource_id.clone(),
                arn,
                desired_units: spec.minimum_capacity_units,
            });
        }
    }
}
