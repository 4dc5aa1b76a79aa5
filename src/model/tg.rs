use crate::api;
use crate::tags::TagMap;
use crate::StdResult;
use std::collections::BTreeMap;
use std::str::FromStr;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TargetType {
    Instance,
    Ip,
    Lambda,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::Instance => "instance",
            TargetType::Ip => "ip",
            TargetType::Lambda => "lambda",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Protocol {
    Http,
    Https,
    Tcp,
    Tls,
    Udp,
    TcpUdp,
    Geneve,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "HTTP",
            Protocol::Https => "HTTPS",
            Protocol::Tcp => "TCP",
            Protocol::Tls => "TLS",
            Protocol::Udp => "UDP",
            Protocol::TcpUdp => "TCP_UDP",
            Protocol::Geneve => "GENEVE",
        }
    }

    /// Network-load-balancer protocol family. Health-check changes on these
    /// force target-group replacement.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            Protocol::Tcp | Protocol::Tls | Protocol::Udp | Protocol::TcpUdp
        )
    }

    pub fn is_tls_terminating(&self) -> bool {
        matches!(self, Protocol::Https | Protocol::Tls)
    }
}

impl FromStr for Protocol {
    type Err = ();

    fn from_str(s: &str) -> StdResult<Protocol, ()> {
        match s {
            "HTTP" => Ok(Protocol::Http),
            "HTTPS" => Ok(Protocol::Https),
            "TCP" => Ok(Protocol::Tcp),
            "TLS" => Ok(Protocol::Tls),
            "UDP" => Ok(Protocol::Udp),
            "TCP_UDP" => Ok(Protocol::TcpUdp),
            "GENEVE" => Ok(Protocol::Geneve),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ProtocolVersion {
    Http1,
    Http2,
    Grpc,
}

impl ProtocolVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolVersion::Http1 => "HTTP1",
            ProtocolVersion::Http2 => "HTTP2",
            ProtocolVersion::Grpc => "GRPC",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatcherSpec {
    pub http_code: Option<String>,
    pub grpc_code: Option<String>,
}

impl MatcherSpec {
    pub fn build(&self) -> api::Matcher {
        api::Matcher {
            http_code: self.http_code.clone(),
            grpc_code: self.grpc_code.clone(),
        }
    }
}

/// Desired health check. Unset fields keep whatever the cloud default is;
/// only set fields participate in drift detection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HealthCheckSpec {
    pub enabled: Option<bool>,
    pub protocol: Option<Protocol>,
    pub path: Option<String>,
    pub port: Option<String>,
    pub interval_seconds: Option<i64>,
    pub timeout_seconds: Option<i64>,
    pub healthy_threshold: Option<i64>,
    pub unhealthy_threshold: Option<i64>,
    pub matcher: Option<MatcherSpec>,
}

#[derive(Debug, Clone)]
pub struct TargetGroupSpec {
    pub resource_id: String,
    pub name: String,
    pub target_type: TargetType,
    pub protocol: Protocol,
    pub protocol_version: Option<ProtocolVersion>,
    pub port: Option<i64>,
    pub vpc_id: String,
    pub health_check: HealthCheckSpec,
    pub attributes: BTreeMap<String, String>,
    pub tags: TagMap,
}

impl Default for TargetGroupSpec {
    fn default() -> Self {
        TargetGroupSpec {
            resource_id: String::new(),
            name: String::new(),
            target_type: TargetType::Ip,
            protocol: Protocol::Http,
            protocol_version: None,
            port: None,
            vpc_id: String::new(),
            health_check: HealthCheckSpec::default(),
            attributes: BTreeMap::new(),
            tags: TagMap::new(),
        }
    }
}
