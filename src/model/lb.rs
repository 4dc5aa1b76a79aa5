use crate::api;
use crate::tags::TagMap;
use crate::StdResult;
use std::collections::BTreeMap;
use std::str::FromStr;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LoadBalancerType {
    Application,
    Network,
    Gateway,
}

impl LoadBalancerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadBalancerType::Application => "application",
            LoadBalancerType::Network => "network",
            LoadBalancerType::Gateway => "gateway",
        }
    }
}

impl FromStr for LoadBalancerType {
    type Err = ();

    fn from_str(s: &str) -> StdResult<LoadBalancerType, ()> {
        match s {
            "application" => Ok(LoadBalancerType::Application),
            "network" => Ok(LoadBalancerType::Network),
            "gateway" => Ok(LoadBalancerType::Gateway),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LoadBalancerScheme {
    InternetFacing,
    Internal,
}

impl LoadBalancerScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadBalancerScheme::InternetFacing => "internet-facing",
            LoadBalancerScheme::Internal => "internal",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IpAddressType {
    Ipv4,
    Dualstack,
    DualstackWithoutPublicIpv4,
}

impl IpAddressType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IpAddressType::Ipv4 => "ipv4",
            IpAddressType::Dualstack => "dualstack",
            IpAddressType::DualstackWithoutPublicIpv4 => "dualstack-without-public-ipv4",
        }
    }

    pub fn is_dualstack(&self) -> bool {
        !matches!(self, IpAddressType::Ipv4)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubnetMappingSpec {
    pub subnet_id: String,
    pub allocation_id: Option<String>,
    pub private_ipv4_address: Option<String>,
    pub ipv6_address: Option<String>,
    pub source_nat_ipv6_prefix: Option<String>,
}

impl SubnetMappingSpec {
    pub fn build(&self) -> api::SubnetMapping {
        api::SubnetMapping {
            subnet_id: Some(self.subnet_id.clone()),
            allocation_id: self.allocation_id.clone(),
            private_ipv4_address: self.private_ipv4_address.clone(),
            ipv6_address: self.ipv6_address.clone(),
            source_nat_ipv6_prefix: self.source_nat_ipv6_prefix.clone(),
        }
    }
}

/// Desired load balancer. `name` drift on an owned resource is tolerated;
/// `type_` and `scheme` changes force replacement.
#[derive(Debug, Clone)]
pub struct LoadBalancerSpec {
    pub resource_id: String,
    pub name: String,
    pub type_: LoadBalancerType,
    pub scheme: LoadBalancerScheme,
    pub ip_address_type: IpAddressType,
    pub subnet_mappings: Vec<SubnetMappingSpec>,
    pub security_groups: Vec<String>,
    pub attributes: BTreeMap<String, String>,
    pub tags: TagMap,
    pub ipv4_ipam_pool_id: Option<String>,
    pub customer_owned_ipv4_pool: Option<String>,
    pub minimum_capacity_units: Option<i64>,
    pub enforce_inbound_rules_on_private_link: Option<bool>,
    pub enable_prefix_for_ipv6_source_nat: Option<bool>,
}

impl Default for LoadBalancerSpec {
    fn default() -> Self {
        LoadBalancerSpec {
            resource_id: String::new(),
            name: String::new(),
            type_: LoadBalancerType::Application,
            scheme: LoadBalancerScheme::Internal,
            ip_address_type: IpAddressType::Ipv4,
            subnet_mappings: Vec::new(),
            security_groups: Vec::new(),
            attributes: BTreeMap::new(),
            tags: TagMap::new(),
            ipv4_ipam_pool_id: None,
            customer_owned_ipv4_pool: None,
            minimum_capacity_units: None,
            enforce_inbound_rules_on_private_link: None,
            enable_prefix_for_ipv6_source_nat: None,
        }
    }
}

impl LoadBalancerSpec {
    pub fn subnet_ids(&self) -> Vec<String> {
        self.subnet_mappings
            .iter()
            .map(|mapping| mapping.subnet_id.clone())
            .collect()
    }

    pub fn build_subnet_mappings(&self) -> Vec<api::SubnetMapping> {
        self.subnet_mappings
            .iter()
            .map(SubnetMappingSpec::build)
            .collect()
    }

    /// `on`/`off` wire form of the source-NAT prefix toggle, when set.
    pub fn source_nat_prefix_flag(&self) -> Option<String> {
        self.enable_prefix_for_ipv6_source_nat
            .map(|enabled| if enabled { "on" } else { "off" }.to_string())
    }

    /// `on`/`off` wire form of the PrivateLink inbound-rule enforcement,
    /// when set. Only meaningful for network load balancers.
    pub fn private_link_enforcement_flag(&self) -> Option<String> {
        self.enforce_inbound_rules_on_private_link
            .map(|enabled| if enabled { "on" } else { "off" }.to_string())
    }
}
