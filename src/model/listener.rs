use crate::api;
use crate::model::{ActionSpec, Protocol};
use crate::tags::TagMap;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MutualAuthenticationMode {
    Off,
    Passthrough,
    Verify,
}

impl MutualAuthenticationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutualAuthenticationMode::Off => "off",
            MutualAuthenticationMode::Passthrough => "passthrough",
            MutualAuthenticationMode::Verify => "verify",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MutualAuthenticationSpec {
    pub mode: MutualAuthenticationMode,
    pub trust_store_arn: Option<String>,
    pub ignore_client_certificate_expiry: Option<bool>,
    pub advertise_trust_store_ca_names: Option<bool>,
}

impl MutualAuthenticationSpec {
    pub fn build(&self) -> api::MutualAuthenticationAttributes {
        api::MutualAuthenticationAttributes {
            mode: Some(self.mode.as_str().to_string()),
            trust_store_arn: self.trust_store_arn.clone(),
            ignore_client_certificate_expiry: self.ignore_client_certificate_expiry,
            advertise_trust_store_ca_names: self
                .advertise_trust_store_ca_names
                .map(|on| if on { "on" } else { "off" }.to_string()),
        }
    }
}

/// Desired listener. Identified by its load balancer plus port; the
/// certificate list carries the default certificate first, any further
/// entries are reconciled as additional SNI certificates.
#[derive(Debug, Clone)]
pub struct ListenerSpec {
    pub lb_resource_id: String,
    pub port: i64,
    pub protocol: Protocol,
    pub ssl_policy: Option<String>,
    pub alpn_policy: Option<String>,
    pub certificates: Vec<String>,
    pub default_actions: Vec<ActionSpec>,
    pub mutual_authentication: Option<MutualAuthenticationSpec>,
    pub tags: TagMap,
}

impl Default for ListenerSpec {
    fn default() -> Self {
        ListenerSpec {
            lb_resource_id: String::new(),
            port: 80,
            protocol: Protocol::Http,
            ssl_policy: None,
            alpn_policy: None,
            certificates: Vec::new(),
            default_actions: Vec::new(),
            mutual_authentication: None,
            tags: TagMap::new(),
        }
    }
}

impl ListenerSpec {
    pub fn default_certificate(&self) -> Option<&str> {
        self.certificates.first().map(String::as_str)
    }

    pub fn extra_certificates(&self) -> &[String] {
        if self.certificates.is_empty() {
            &[]
        } else {
            &self.certificates[1..]
        }
    }
}
