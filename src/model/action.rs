//! Rule and listener actions, conditions, and transforms, plus their
//! resolution into wire shapes.
//!
//! Target groups referenced by resource id become real ARNs only after the
//! target-group synthesizer ran earlier in the same cycle; resolution goes
//! through the caller-scoped [`SynthContext`].
use crate::api;
use crate::context::SynthContext;
use crate::error::SyncError;
use crate::Result;
use std::collections::BTreeMap;

pub const ACTION_TYPE_FORWARD: &str = "forward";
pub const ACTION_TYPE_REDIRECT: &str = "redirect";
pub const ACTION_TYPE_FIXED_RESPONSE: &str = "fixed-response";
pub const ACTION_TYPE_AUTHENTICATE_COGNITO: &str = "authenticate-cognito";
pub const ACTION_TYPE_AUTHENTICATE_OIDC: &str = "authenticate-oidc";

pub const CONDITION_FIELD_HOST_HEADER: &str = "host-header";
pub const CONDITION_FIELD_PATH_PATTERN: &str = "path-pattern";
pub const CONDITION_FIELD_HTTP_HEADER: &str = "http-header";
pub const CONDITION_FIELD_HTTP_REQUEST_METHOD: &str = "http-request-method";
pub const CONDITION_FIELD_QUERY_STRING: &str = "query-string";
pub const CONDITION_FIELD_SOURCE_IP: &str = "source-ip";

pub const TRANSFORM_TYPE_URL_REWRITE: &str = "url-rewrite";
pub const TRANSFORM_TYPE_HOST_HEADER_REWRITE: &str = "host-header-rewrite";

/// A target group either known by ARN up front or created earlier in the
/// same synthesis cycle and referenced by resource id.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetGroupRef {
    Arn(String),
    ResourceId(String),
}

impl TargetGroupRef {
    pub fn resolve(&self, ctx: &SynthContext) -> Result<String> {
        ctx.ensure_active()?;
        match self {
            TargetGroupRef::Arn(arn) => Ok(arn.clone()),
            TargetGroupRef::ResourceId(resource_id) => ctx.target_group_arn(resource_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeightedTargetGroup {
    pub target_group: TargetGroupRef,
    pub weight: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StickinessSpec {
    pub enabled: bool,
    pub duration_seconds: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionSpec {
    Forward {
        target_groups: Vec<WeightedTargetGroup>,
        stickiness: Option<StickinessSpec>,
    },
    Redirect {
        protocol: Option<String>,
        port: Option<String>,
        host: Option<String>,
        path: Option<String>,
        query: Option<String>,
        status_code: String,
    },
    FixedResponse {
        status_code: String,
        content_type: Option<String>,
        message_body: Option<String>,
    },
    AuthenticateCognito {
        user_pool_arn: String,
        user_pool_client_id: String,
        user_pool_domain: String,
        scope: Option<String>,
        session_cookie_name: Option<String>,
        session_timeout: Option<i64>,
        on_unauthenticated_request: Option<String>,
        extra_params: BTreeMap<String, String>,
    },
    AuthenticateOidc {
        issuer: String,
        authorization_endpoint: String,
        token_endpoint: String,
        user_info_endpoint: String,
        client_id: String,
        client_secret: Option<String>,
        scope: Option<String>,
        session_cookie_name: Option<String>,
        session_timeout: Option<i64>,
        on_unauthenticated_request: Option<String>,
        extra_params: BTreeMap<String, String>,
    },
}

impl ActionSpec {
    pub fn build(&self, ctx: &SynthContext) -> Result<api::Action> {
        match self {
            ActionSpec::Forward {
                target_groups,
                stickiness,
            } => {
                let mut tuples = Vec::with_capacity(target_groups.len());
                for wtg in target_groups {
                    tuples.push(api::TargetGroupTuple {
                        target_group_arn: Some(wtg.target_group.resolve(ctx)?),
                        weight: wtg.weight,
                    });
                }
                // the API mirrors single-target forwards into the flat field
                let single_arn = if tuples.len() == 1 {
                    tuples[0].target_group_arn.clone()
                } else {
                    None
                };
                Ok(api::Action {
                    type_: Some(ACTION_TYPE_FORWARD.to_string()),
                    target_group_arn: single_arn,
                    forward_config: Some(api::ForwardActionConfig {
                        target_groups: tuples,
                        target_group_stickiness_config: stickiness.as_ref().map(|s| {
                            api::TargetGroupStickinessConfig {
                                enabled: Some(s.enabled),
                                duration_seconds: s.duration_seconds,
                            }
                        }),
                    }),
                    ..Default::default()
                })
            }
            ActionSpec::Redirect {
                protocol,
                port,
                host,
                path,
                query,
                status_code,
            } => Ok(api::Action {
                type_: Some(ACTION_TYPE_REDIRECT.to_string()),
                redirect_config: Some(api::RedirectActionConfig {
                    protocol: protocol.clone(),
                    port: port.clone(),
                    host: host.clone(),
                    path: path.clone(),
                    query: query.clone(),
                    status_code: Some(status_code.clone()),
                }),
                ..Default::default()
            }),
            ActionSpec::FixedResponse {
                status_code,
                content_type,
                message_body,
            } => Ok(api::Action {
                type_: Some(ACTION_TYPE_FIXED_RESPONSE.to_string()),
                fixed_response_config: Some(api::FixedResponseActionConfig {
                    status_code: Some(status_code.clone()),
                    content_type: content_type.clone(),
                    message_body: message_body.clone(),
                }),
                ..Default::default()
            }),
            ActionSpec::AuthenticateCognito {
                user_pool_arn,
                user_pool_client_id,
                user_pool_domain,
                scope,
                session_cookie_name,
                session_timeout,
                on_unauthenticated_request,
                extra_params,
            } => Ok(api::Action {
                type_: Some(ACTION_TYPE_AUTHENTICATE_COGNITO.to_string()),
                authenticate_cognito_config: Some(api::AuthenticateCognitoActionConfig {
                    user_pool_arn: Some(user_pool_arn.clone()),
                    user_pool_client_id: Some(user_pool_client_id.clone()),
                    user_pool_domain: Some(user_pool_domain.clone()),
                    scope: scope.clone(),
                    session_cookie_name: session_cookie_name.clone(),
                    session_timeout: *session_timeout,
                    on_unauthenticated_request: on_unauthenticated_request.clone(),
                    authentication_request_extra_params: if extra_params.is_empty() {
                        None
                    } else {
                        Some(extra_params.clone())
                    },
                }),
                ..Default::default()
            }),
            ActionSpec::AuthenticateOidc {
                issuer,
                authorization_endpoint,
                token_endpoint,
                user_info_endpoint,
                client_id,
                client_secret,
                scope,
                session_cookie_name,
                session_timeout,
                on_unauthenticated_request,
                extra_params,
            } => Ok(api::Action {
                type_: Some(ACTION_TYPE_AUTHENTICATE_OIDC.to_string()),
                authenticate_oidc_config: Some(api::AuthenticateOidcActionConfig {
                    issuer: Some(issuer.clone()),
                    authorization_endpoint: Some(authorization_endpoint.clone()),
                    token_endpoint: Some(token_endpoint.clone()),
                    user_info_endpoint: Some(user_info_endpoint.clone()),
                    client_id: Some(client_id.clone()),
                    client_secret: client_secret.clone(),
                    scope: scope.clone(),
                    session_cookie_name: session_cookie_name.clone(),
                    session_timeout: *session_timeout,
                    on_unauthenticated_request: on_unauthenticated_request.clone(),
                    use_existing_client_secret: if client_secret.is_none() {
                        Some(true)
                    } else {
                        None
                    },
                    authentication_request_extra_params: if extra_params.is_empty() {
                        None
                    } else {
                        Some(extra_params.clone())
                    },
                }),
                ..Default::default()
            }),
        }
    }
}

pub fn build_actions(ctx: &SynthContext, specs: &[ActionSpec]) -> Result<Vec<api::Action>> {
    specs.iter().map(|spec| spec.build(ctx)).collect()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPair {
    pub key: Option<String>,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RuleConditionSpec {
    HostHeader { values: Vec<String> },
    PathPattern { values: Vec<String> },
    HttpHeader { name: String, values: Vec<String> },
    HttpRequestMethod { values: Vec<String> },
    QueryString { pairs: Vec<QueryPair> },
    SourceIp { values: Vec<String> },
}

impl RuleConditionSpec {
    pub fn build(&self) -> api::RuleCondition {
        match self {
            RuleConditionSpec::HostHeader { values } => api::RuleCondition {
                field: Some(CONDITION_FIELD_HOST_HEADER.to_string()),
                host_header_config: Some(api::HostHeaderConditionConfig {
                    values: values.clone(),
                }),
                ..Default::default()
            },
            RuleConditionSpec::PathPattern { values } => api::RuleCondition {
                field: Some(CONDITION_FIELD_PATH_PATTERN.to_string()),
                path_pattern_config: Some(api::PathPatternConditionConfig {
                    values: values.clone(),
                }),
                ..Default::default()
            },
            RuleConditionSpec::HttpHeader { name, values } => api::RuleCondition {
                field: Some(CONDITION_FIELD_HTTP_HEADER.to_string()),
                http_header_config: Some(api::HttpHeaderConditionConfig {
                    http_header_name: Some(name.clone()),
                    values: values.clone(),
                }),
                ..Default::default()
            },
            RuleConditionSpec::HttpRequestMethod { values } => api::RuleCondition {
                field: Some(CONDITION_FIELD_HTTP_REQUEST_METHOD.to_string()),
                http_request_method_config: Some(api::HttpRequestMethodConditionConfig {
                    values: values.clone(),
                }),
                ..Default::default()
            },
            RuleConditionSpec::QueryString { pairs } => api::RuleCondition {
                field: Some(CONDITION_FIELD_QUERY_STRING.to_string()),
                query_string_config: Some(api::QueryStringConditionConfig {
                    values: pairs
                        .iter()
                        .map(|pair| api::QueryStringKeyValuePair {
                            key: pair.key.clone(),
                            value: Some(pair.value.clone()),
                        })
                        .collect(),
                }),
                ..Default::default()
            },
            RuleConditionSpec::SourceIp { values } => api::RuleCondition {
                field: Some(CONDITION_FIELD_SOURCE_IP.to_string()),
                source_ip_config: Some(api::SourceIpConditionConfig {
                    values: values.clone(),
                }),
                ..Default::default()
            },
        }
    }
}

pub fn build_conditions(specs: &[RuleConditionSpec]) -> Vec<api::RuleCondition> {
    specs.iter().map(RuleConditionSpec::build).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransformSpec {
    UrlRewrite { regex: String, replace: String },
    HostHeaderRewrite { regex: String, replace: String },
}

impl TransformSpec {
    pub fn build(&self) -> Result<api::RuleTransform> {
        match self {
            TransformSpec::UrlRewrite { regex, replace } => {
                validate_rewrite_pattern(regex)?;
                Ok(api::RuleTransform {
                    type_: Some(TRANSFORM_TYPE_URL_REWRITE.to_string()),
                    url_rewrite_config: Some(api::RewriteConfig {
                        regex: Some(regex.clone()),
                        replace: Some(replace.clone()),
                    }),
                    ..Default::default()
                })
            }
            TransformSpec::HostHeaderRewrite { regex, replace } => {
                validate_rewrite_pattern(regex)?;
                Ok(api::RuleTransform {
                    type_: Some(TRANSFORM_TYPE_HOST_HEADER_REWRITE.to_string()),
                    host_header_rewrite_config: Some(api::RewriteConfig {
                        regex: Some(regex.clone()),
                        replace: Some(replace.clone()),
                    }),
                    ..Default::default()
                })
            }
        }
    }
}

fn validate_rewrite_pattern(pattern: &str) -> Result<()> {
    regex::Regex::new(pattern)
        .map(|_| ())
        .map_err(|err| SyncError::Validation(format!("invalid rewrite pattern: {}", err)))
}

pub fn build_transforms(specs: &[TransformSpec]) -> Result<Vec<api::RuleTransform>> {
    specs.iter().map(TransformSpec::build).collect()
}
