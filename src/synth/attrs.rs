//! Attribute reconcilers: diff the desired key/value map against the
//! described one and modify only the changed keys.
use crate::api::{
    DescribeCapacityReservationInput, DescribeLoadBalancerAttributesInput,
    DescribeTargetGroupAttributesInput, LoadBalancerAttribute, MinimumLoadBalancerCapacity,
    ModifyCapacityReservationInput, ModifyLoadBalancerAttributesInput,
    ModifyTargetGroupAttributesInput, TargetGroupAttribute,
};
use crate::client::Elbv2Api;
use crate::context::SynthContext;
use crate::util::changed_entries;
use crate::Result;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

pub struct LoadBalancerAttributeReconciler {
    client: Arc<dyn Elbv2Api>,
}

impl LoadBalancerAttributeReconciler {
    pub fn new(client: Arc<dyn Elbv2Api>) -> Self {
        LoadBalancerAttributeReconciler { client }
    }

    pub async fn reconcile(
        &self,
        ctx: &SynthContext,
        lb_arn: &str,
        desired: &BTreeMap<String, String>,
    ) -> Result<()> {
        if desired.is_empty() {
            return Ok(());
        }
        let described = ctx
            .guard(
                self.client
                    .describe_load_balancer_attributes(DescribeLoadBalancerAttributesInput {
                        load_balancer_arn: lb_arn.to_string(),
                    }),
            )
            .await?;
        let current: BTreeMap<String, String> = described
            .attributes
            .into_iter()
            .map(|attr| (attr.key, attr.value))
            .collect();

        let changed = changed_entries(desired, &current);
        if changed.is_empty() {
            return Ok(());
        }

        debug!(resource = lb_arn, count = changed.len(), "Modifying load balancer attributes");
        ctx.guard(
            self.client
                .modify_load_balancer_attributes(ModifyLoadBalancerAttributesInput {
                    load_balancer_arn: lb_arn.to_string(),
                    attributes: changed
                        .into_iter()
                        .map(|(key, value)| LoadBalancerAttribute { key, value })
                        .collect(),
                }),
        )
        .await
    }
}

pub struct TargetGroupAttributeReconciler {
    client: Arc<dyn Elbv2Api>,
}

impl TargetGroupAttributeReconciler {
    pub fn new(client: Arc<dyn Elbv2Api>) -> Self {
        TargetGroupAttributeReconciler { client }
    }

    pub async fn reconcile(
        &self,
        ctx: &SynthContext,
        tg_arn: &str,
        desired: &BTreeMap<String, String>,
    ) -> Result<()> {
        if desired.is_empty() {
            return Ok(());
        }
        let described = ctx
            .guard(
                self.client
                    .describe_target_group_attributes(DescribeTargetGroupAttributesInput {
                        target_group_arn: tg_arn.to_string(),
                    }),
            )
            .await?;
        let current: BTreeMap<String, String> = described
            .attributes
            .into_iter()
            .map(|attr| (attr.key, attr.value))
            .collect();

        let changed = changed_entries(desired, &current);
        if changed.is_empty() {
            return Ok(());
        }

        debug!(resource = tg_arn, count = changed.len(), "Modifying target group attributes");
        ctx.guard(
            self.client
                .modify_target_group_attributes(ModifyTargetGroupAttributesInput {
                    target_group_arn: tg_arn.to_string(),
                    attributes: changed
                        .into_iter()
                        .map(|(key, value)| TargetGroupAttribute { key, value })
                        .collect(),
                }),
        )
        .await
    }
}

/// Converges the minimum-capacity reservation of an active load balancer.
/// Callers gate this behind the feature flag and the `active` state check.
pub struct CapacityReservationReconciler {
    client: Arc<dyn Elbv2Api>,
}

impl CapacityReservationReconciler {
    pub fn new(client: Arc<dyn Elbv2Api>) -> Self {
        CapacityReservationReconciler { client }
    }

    pub async fn reconcile(
        &self,
        ctx: &SynthContext,
        lb_arn: &str,
        desired_units: Option<i64>,
    ) -> Result<()> {
        let described = ctx
            .guard(
                self.client
                    .describe_capacity_reservation(DescribeCapacityReservationInput {
                        load_balancer_arn: lb_arn.to_string(),
                    }),
            )
            .await?;
        let current_units = described
            .minimum_load_balancer_capacity
            .map(|capacity| capacity.capacity_units);

        match (desired_units, current_units) {
            (None, None) => Ok(()),
            (None, Some(_)) => {
                debug!(resource = lb_arn, "Resetting capacity reservation");
                ctx.guard(self.client.modify_capacity_reservation(
                    ModifyCapacityReservationInput {
                        load_balancer_arn: lb_arn.to_string(),
                        minimum_load_balancer_capacity: None,
                        reset_capacity_reservation: Some(true),
                    },
                ))
                .await
            }
            (Some(desired), current) if current != Some(desired) => {
                debug!(resource = lb_arn, units = desired, "Reserving minimum capacity");
                ctx.guard(self.client.modify_capacity_reservation(
                    ModifyCapacityReservationInput {
                        load_balancer_arn: lb_arn.to_string(),
                        minimum_load_balancer_capacity: Some(MinimumLoadBalancerCapacity {
                            capacity_units: desired,
                        }),
                        reset_capacity_reservation: None,
                    },
                ))
                .await
            }
            _ => Ok(()),
        }
    }
}
