//! The narrow ELBV2 client port consumed by the reconciliation core.
//!
//! The production binding (SDK transport, credentials, endpoint resolution)
//! lives with the caller; the core only depends on this trait. The port does
//! not retry and does not interpret errors beyond carrying the control-plane
//! code and message.
use crate::api::*;
use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait Elbv2Api: Send + Sync {
    // load balancers
    async fn create_load_balancer(
        &self,
        input: CreateLoadBalancerInput,
    ) -> Result<CreateLoadBalancerOutput>;
    async fn delete_load_balancer(&self, input: DeleteLoadBalancerInput) -> Result<()>;
    async fn describe_load_balancers(
        &self,
        input: DescribeLoadBalancersInput,
    ) -> Result<DescribeLoadBalancersOutput>;
    async fn modify_load_balancer_attributes(
        &self,
        input: ModifyLoadBalancerAttributesInput,
    ) -> Result<()>;
    async fn describe_load_balancer_attributes(
        &self,
        input: DescribeLoadBalancerAttributesInput,
    ) -> Result<DescribeLoadBalancerAttributesOutput>;
    async fn set_ip_address_type(&self, input: SetIpAddressTypeInput) -> Result<()>;
    async fn set_subnets(&self, input: SetSubnetsInput) -> Result<()>;
    async fn set_security_groups(&self, input: SetSecurityGroupsInput) -> Result<()>;
    async fn modify_ip_pools(&self, input: ModifyIpPoolsInput) -> Result<()>;
    async fn modify_capacity_reservation(
        &self,
        input: ModifyCapacityReservationInput,
    ) -> Result<()>;
    async fn describe_capacity_reservation(
        &self,
        input: DescribeCapacityReservationInput,
    ) -> Result<DescribeCapacityReservationOutput>;

    // target groups
    async fn create_target_group(
        &self,
        input: CreateTargetGroupInput,
    ) -> Result<CreateTargetGroupOutput>;
    async fn delete_target_group(&self, input: DeleteTargetGroupInput) -> Result<()>;
    async fn describe_target_groups(
        &self,
        input: DescribeTargetGroupsInput,
    ) -> Result<DescribeTargetGroupsOutput>;
    async fn modify_target_group(&self, input: ModifyTargetGroupInput) -> Result<()>;
    async fn modify_target_group_attributes(
        &self,
        input: ModifyTargetGroupAttributesInput,
    ) -> Result<()>;
    async fn describe_target_group_attributes(
        &self,
        input: DescribeTargetGroupAttributesInput,
    ) -> Result<DescribeTargetGroupAttributesOutput>;

    // listeners
    async fn create_listener(&self, input: CreateListenerInput) -> Result<CreateListenerOutput>;
    async fn delete_listener(&self, input: DeleteListenerInput) -> Result<()>;
    async fn modify_listener(&self, input: ModifyListenerInput) -> Result<()>;
    async fn describe_listeners(
        &self,
        input: DescribeListenersInput,
    ) -> Result<DescribeListenersOutput>;
    async fn add_listener_certificates(&self, input: AddListenerCertificatesInput) -> Result<()>;
    async fn remove_listener_certificates(
        &self,
        input: RemoveListenerCertificatesInput,
    ) -> Result<()>;
    async fn describe_listener_certificates(
        &self,
        input: DescribeListenerCertificatesInput,
    ) -> Result<DescribeListenerCertificatesOutput>;

    // rules
    async fn create_rule(&self, input: CreateRuleInput) -> Result<CreateRuleOutput>;
    async fn delete_rule(&self, input: DeleteRuleInput) -> Result<()>;
    async fn modify_rule(&self, input: ModifyRuleInput) -> Result<()>;
    async fn set_rule_priorities(&self, input: SetRulePrioritiesInput) -> Result<()>;
    async fn describe_rules(&self, input: DescribeRulesInput) -> Result<DescribeRulesOutput>;

    // tags
    async fn add_tags(&self, input: AddTagsInput) -> Result<()>;
    async fn remove_tags(&self, input: RemoveTagsInput) -> Result<()>;
    async fn describe_tags(&self, input: DescribeTagsInput) -> Result<DescribeTagsOutput>;
}
