//! Typed ELBv2 wire shapes consumed by the client port.
//!
//! Resource shapes mirror the control-plane responses: every field is
//! optional and `Default`-constructible, so partial values can be built with
//! `..Default::default()`. Inputs carry their required fields plainly.

// ---------------------------------------------------------------------------
// shared

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tag {
    pub key: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagDescription {
    pub resource_arn: Option<String>,
    pub tags: Option<Vec<Tag>>,
}

// ---------------------------------------------------------------------------
// load balancers

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadBalancer {
    pub load_balancer_arn: Option<String>,
    pub load_balancer_name: Option<String>,
    pub type_: Option<String>,
    pub scheme: Option<String>,
    pub ip_address_type: Option<String>,
    pub availability_zones: Option<Vec<AvailabilityZone>>,
    pub security_groups: Option<Vec<String>>,
    pub state: Option<LoadBalancerState>,
    pub customer_owned_ipv4_pool: Option<String>,
    pub ipam_pools: Option<IpamPools>,
    pub enforce_security_group_inbound_rules_on_private_link_traffic: Option<String>,
    pub enable_prefix_for_ipv6_source_nat: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadBalancerState {
    pub code: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AvailabilityZone {
    pub zone_name: Option<String>,
    pub subnet_id: Option<String>,
    pub load_balancer_addresses: Option<Vec<LoadBalancerAddress>>,
    pub source_nat_ipv6_prefixes: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadBalancerAddress {
    pub ip_address: Option<String>,
    pub ipv6_address: Option<String>,
    pub allocation_id: Option<String>,
    pub private_ipv4_address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubnetMapping {
    pub subnet_id: Option<String>,
    pub allocation_id: Option<String>,
    pub private_ipv4_address: Option<String>,
    pub ipv6_address: Option<String>,
    pub source_nat_ipv6_prefix: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IpamPools {
    pub ipv4_ipam_pool_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadBalancerAttribute {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MinimumLoadBalancerCapacity {
    pub capacity_units: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateLoadBalancerInput {
    pub name: String,
    pub type_: String,
    pub scheme: Option<String>,
    pub ip_address_type: Option<String>,
    pub subnet_mappings: Option<Vec<SubnetMapping>>,
    pub security_groups: Option<Vec<String>>,
    pub customer_owned_ipv4_pool: Option<String>,
    pub ipam_pools: Option<IpamPools>,
    pub enable_prefix_for_ipv6_source_nat: Option<String>,
    pub tags: Option<Vec<Tag>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateLoadBalancerOutput {
    pub load_balancers: Vec<LoadBalancer>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteLoadBalancerInput {
    pub load_balancer_arn: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescribeLoadBalancersInput {
    pub load_balancer_arns: Option<Vec<String>>,
    pub names: Option<Vec<String>>,
    pub marker: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescribeLoadBalancersOutput {
    pub load_balancers: Vec<LoadBalancer>,
    pub next_marker: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModifyLoadBalancerAttributesInput {
    pub load_balancer_arn: String,
    pub attributes: Vec<LoadBalancerAttribute>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescribeLoadBalancerAttributesInput {
    pub load_balancer_arn: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescribeLoadBalancerAttributesOutput {
    pub attributes: Vec<LoadBalancerAttribute>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetIpAddressTypeInput {
    pub load_balancer_arn: String,
    pub ip_address_type: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetSubnetsInput {
    pub load_balancer_arn: String,
    pub subnets: Option<Vec<String>>,
    pub subnet_mappings: Option<Vec<SubnetMapping>>,
    pub enable_prefix_for_ipv6_source_nat: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetSecurityGroupsInput {
    pub load_balancer_arn: String,
    pub security_groups: Vec<String>,
    pub enforce_security_group_inbound_rules_on_private_link_traffic: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModifyIpPoolsInput {
    pub load_balancer_arn: String,
    pub ipam_pools: Option<IpamPools>,
    pub remove_ipam_pools: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModifyCapacityReservationInput {
    pub load_balancer_arn: String,
    pub minimum_load_balancer_capacity: Option<MinimumLoadBalancerCapacity>,
    pub reset_capacity_reservation: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescribeCapacityReservationInput {
    pub load_balancer_arn: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescribeCapacityReservationOutput {
    pub minimum_load_balancer_capacity: Option<MinimumLoadBalancerCapacity>,
}

// ---------------------------------------------------------------------------
// target groups

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetGroup {
    pub target_group_arn: Option<String>,
    pub target_group_name: Option<String>,
    pub target_type: Option<String>,
    pub protocol: Option<String>,
    pub protocol_version: Option<String>,
    pub port: Option<i64>,
    pub vpc_id: Option<String>,
    pub health_check_enabled: Option<bool>,
    pub health_check_protocol: Option<String>,
    pub health_check_path: Option<String>,
    pub health_check_port: Option<String>,
    pub health_check_interval_seconds: Option<i64>,
    pub health_check_timeout_seconds: Option<i64>,
    pub healthy_threshold_count: Option<i64>,
    pub unhealthy_threshold_count: Option<i64>,
    pub matcher: Option<Matcher>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Matcher {
    pub http_code: Option<String>,
    pub grpc_code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetGroupAttribute {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateTargetGroupInput {
    pub name: String,
    pub target_type: String,
    pub protocol: Option<String>,
    pub protocol_version: Option<String>,
    pub port: Option<i64>,
    pub vpc_id: Option<String>,
    pub health_check_enabled: Option<bool>,
    pub health_check_protocol: Option<String>,
    pub health_check_path: Option<String>,
    pub health_check_port: Option<String>,
    pub health_check_interval_seconds: Option<i64>,
    pub health_check_timeout_seconds: Option<i64>,
    pub healthy_threshold_count: Option<i64>,
    pub unhealthy_threshold_count: Option<i64>,
    pub matcher: Option<Matcher>,
    pub tags: Option<Vec<Tag>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateTargetGroupOutput {
    pub target_groups: Vec<TargetGroup>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteTargetGroupInput {
    pub target_group_arn: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescribeTargetGroupsInput {
    pub target_group_arns: Option<Vec<String>>,
    pub names: Option<Vec<String>>,
    pub marker: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescribeTargetGroupsOutput {
    pub target_groups: Vec<TargetGroup>,
    pub next_marker: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModifyTargetGroupInput {
    pub target_group_arn: String,
    pub health_check_enabled: Option<bool>,
    pub health_check_protocol: Option<String>,
    pub health_check_path: Option<String>,
    pub health_check_port: Option<String>,
    pub health_check_interval_seconds: Option<i64>,
    pub health_check_timeout_seconds: Option<i64>,
    pub healthy_threshold_count: Option<i64>,
    pub unhealthy_threshold_count: Option<i64>,
    pub matcher: Option<Matcher>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModifyTargetGroupAttributesInput {
    pub target_group_arn: String,
    pub attributes: Vec<TargetGroupAttribute>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescribeTargetGroupAttributesInput {
    pub target_group_arn: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescribeTargetGroupAttributesOutput {
    pub attributes: Vec<TargetGroupAttribute>,
}

// ---------------------------------------------------------------------------
// listeners

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Listener {
    pub listener_arn: Option<String>,
    pub load_balancer_arn: Option<String>,
    pub port: Option<i64>,
    pub protocol: Option<String>,
    pub ssl_policy: Option<String>,
    pub certificates: Option<Vec<Certificate>>,
    pub default_actions: Option<Vec<Action>>,
    pub alpn_policy: Option<Vec<String>>,
    pub mutual_authentication: Option<MutualAuthenticationAttributes>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Certificate {
    pub certificate_arn: Option<String>,
    pub is_default: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutualAuthenticationAttributes {
    pub mode: Option<String>,
    pub trust_store_arn: Option<String>,
    pub ignore_client_certificate_expiry: Option<bool>,
    pub advertise_trust_store_ca_names: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateListenerInput {
    pub load_balancer_arn: String,
    pub port: i64,
    pub protocol: String,
    pub ssl_policy: Option<String>,
    pub certificates: Option<Vec<Certificate>>,
    pub default_actions: Vec<Action>,
    pub alpn_policy: Option<Vec<String>>,
    pub mutual_authentication: Option<MutualAuthenticationAttributes>,
    pub tags: Option<Vec<Tag>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateListenerOutput {
    pub listeners: Vec<Listener>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteListenerInput {
    pub listener_arn: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModifyListenerInput {
    pub listener_arn: String,
    pub port: Option<i64>,
    pub protocol: Option<String>,
    pub ssl_policy: Option<String>,
    pub certificates: Option<Vec<Certificate>>,
    pub default_actions: Option<Vec<Action>>,
    pub alpn_policy: Option<Vec<String>>,
    pub mutual_authentication: Option<MutualAuthenticationAttributes>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescribeListenersInput {
    pub load_balancer_arn: String,
    pub marker: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescribeListenersOutput {
    pub listeners: Vec<Listener>,
    pub next_marker: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddListenerCertificatesInput {
    pub listener_arn: String,
    pub certificates: Vec<Certificate>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoveListenerCertificatesInput {
    pub listener_arn: String,
    pub certificates: Vec<Certificate>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescribeListenerCertificatesInput {
    pub listener_arn: String,
    pub marker: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescribeListenerCertificatesOutput {
    pub certificates: Vec<Certificate>,
    pub next_marker: Option<String>,
}

// ---------------------------------------------------------------------------
// rules

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rule {
    pub rule_arn: Option<String>,
    /// Decimal string on the wire; semantically a positive 32-bit integer.
    pub priority: Option<String>,
    pub actions: Option<Vec<Action>>,
    pub conditions: Option<Vec<RuleCondition>>,
    pub transforms: Option<Vec<RuleTransform>>,
    pub is_default: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Action {
    pub type_: Option<String>,
    pub order: Option<i64>,
    pub target_group_arn: Option<String>,
    pub forward_config: Option<ForwardActionConfig>,
    pub redirect_config: Option<RedirectActionConfig>,
    pub fixed_response_config: Option<FixedResponseActionConfig>,
    pub authenticate_cognito_config: Option<AuthenticateCognitoActionConfig>,
    pub authenticate_oidc_config: Option<AuthenticateOidcActionConfig>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForwardActionConfig {
    pub target_groups: Vec<TargetGroupTuple>,
    pub target_group_stickiness_config: Option<TargetGroupStickinessConfig>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetGroupTuple {
    pub target_group_arn: Option<String>,
    pub weight: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetGroupStickinessConfig {
    pub enabled: Option<bool>,
    pub duration_seconds: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RedirectActionConfig {
    pub protocol: Option<String>,
    pub port: Option<String>,
    pub host: Option<String>,
    pub path: Option<String>,
    pub query: Option<String>,
    pub status_code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FixedResponseActionConfig {
    pub status_code: Option<String>,
    pub content_type: Option<String>,
    pub message_body: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthenticateCognitoActionConfig {
    pub user_pool_arn: Option<String>,
    pub user_pool_client_id: Option<String>,
    pub user_pool_domain: Option<String>,
    pub scope: Option<String>,
    pub session_cookie_name: Option<String>,
    pub session_timeout: Option<i64>,
    pub on_unauthenticated_request: Option<String>,
    pub authentication_request_extra_params: Option<std::collections::BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthenticateOidcActionConfig {
    pub issuer: Option<String>,
    pub authorization_endpoint: Option<String>,
    pub token_endpoint: Option<String>,
    pub user_info_endpoint: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub scope: Option<String>,
    pub session_cookie_name: Option<String>,
    pub session_timeout: Option<i64>,
    pub on_unauthenticated_request: Option<String>,
    pub use_existing_client_secret: Option<bool>,
    pub authentication_request_extra_params: Option<std::collections::BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleCondition {
    pub field: Option<String>,
    pub host_header_config: Option<HostHeaderConditionConfig>,
    pub path_pattern_config: Option<PathPatternConditionConfig>,
    pub http_header_config: Option<HttpHeaderConditionConfig>,
    pub http_request_method_config: Option<HttpRequestMethodConditionConfig>,
    pub query_string_config: Option<QueryStringConditionConfig>,
    pub source_ip_config: Option<SourceIpConditionConfig>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostHeaderConditionConfig {
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathPatternConditionConfig {
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpHeaderConditionConfig {
    pub http_header_name: Option<String>,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpRequestMethodConditionConfig {
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryStringConditionConfig {
    pub values: Vec<QueryStringKeyValuePair>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryStringKeyValuePair {
    pub key: Option<String>,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceIpConditionConfig {
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleTransform {
    pub type_: Option<String>,
    pub url_rewrite_config: Option<RewriteConfig>,
    pub host_header_rewrite_config: Option<RewriteConfig>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RewriteConfig {
    pub regex: Option<String>,
    pub replace: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateRuleInput {
    pub listener_arn: String,
    pub priority: i64,
    pub actions: Vec<Action>,
    pub conditions: Vec<RuleCondition>,
    pub transforms: Option<Vec<RuleTransform>>,
    pub tags: Option<Vec<Tag>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateRuleOutput {
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteRuleInput {
    pub rule_arn: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModifyRuleInput {
    pub rule_arn: String,
    pub actions: Vec<Action>,
    pub conditions: Vec<RuleCondition>,
    pub transforms: Option<Vec<RuleTransform>>,
    pub reset_transforms: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RulePriorityPair {
    pub rule_arn: String,
    pub priority: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetRulePrioritiesInput {
    pub rule_priorities: Vec<RulePriorityPair>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescribeRulesInput {
    pub listener_arn: String,
    pub marker: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescribeRulesOutput {
    pub rules: Vec<Rule>,
    pub next_marker: Option<String>,
}

// ---------------------------------------------------------------------------
// tags

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddTagsInput {
    pub resource_arns: Vec<String>,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoveTagsInput {
    pub resource_arns: Vec<String>,
    pub tag_keys: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescribeTagsInput {
    pub resource_arns: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescribeTagsOutput {
    pub tag_descriptions: Vec<TagDescription>,
}
