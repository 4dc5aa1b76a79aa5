//! Outer deployer: runs the synthesizers in dependency order against one
//! stack, then the post-synthesize hooks.
use crate::client::Elbv2Api;
use crate::config::Config;
use crate::context::SynthContext;
use crate::model::Stack;
use crate::synth::lb::LoadBalancerSynthesizer;
use crate::synth::listener::ListenerSynthesizer;
use crate::synth::rule::RuleSynthesizer;
use crate::synth::tagging::TaggingManager;
use crate::synth::tg::TargetGroupSynthesizer;
use crate::tags::TrackingProvider;
use crate::Result;
use humantime::format_duration;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};
use tracing_futures::Instrument;

/// "Retry synthesis after at least `after`": a value, not an error, so the
/// caller's error handling never misclassifies a healthy wait as a failure.
#[derive(Debug, Clone, PartialEq)]
pub struct RequeueAfter {
    pub message: String,
    pub after: Duration,
}

impl RequeueAfter {
    pub fn new<M: Into<String>>(message: M, after: Duration) -> Self {
        RequeueAfter {
            message: message.into(),
            after,
        }
    }
}

pub struct StackDeployer {
    client: Arc<dyn Elbv2Api>,
    tracking: Arc<dyn TrackingProvider>,
    config: Config,
}

impl StackDeployer {
    pub fn new(
        client: Arc<dyn Elbv2Api>,
        tracking: Arc<dyn TrackingProvider>,
        config: Config,
    ) -> Self {
        StackDeployer {
            client,
            tracking,
            config,
        }
    }

    /// One synthesize → post-synthesize cycle. Stops on the first error;
    /// partially applied changes remain in place, the cloud is the store.
    pub async fn deploy(&self, ctx: &SynthContext, stack: &Stack) -> Result<Option<RequeueAfter>> {
        trace!(stack = %stack.id, "Starting stack synthesis");
        let tagging = Arc::new(TaggingManager::new(
            self.client.clone(),
            self.config.describe_tags_chunk,
        ));

        let mut lbs = LoadBalancerSynthesizer::new(
            self.client.clone(),
            tagging.clone(),
            self.tracking.clone(),
            self.config.clone(),
        );
        let mut tgs = TargetGroupSynthesizer::new(
            self.client.clone(),
            tagging.clone(),
            self.tracking.clone(),
            self.config.clone(),
        );
        let listeners = ListenerSynthesizer::new(
            self.client.clone(),
            tagging.clone(),
            self.tracking.clone(),
            self.config.clone(),
        );
        let rules = RuleSynthesizer::new(
            self.client.clone(),
            tagging.clone(),
            self.tracking.clone(),
            self.config.clone(),
        );

        let stack_name = stack.id.to_string();

        lbs.synthesize(ctx, stack)
            .instrument(tracing::trace_span!("elbsync", component = "load-balancers"))
            .await
            .map_err(|err| err.wrap("load-balancer-synthesizer", stack_name.clone()))?;
        tgs.synthesize(ctx, stack)
            .instrument(tracing::trace_span!("elbsync", component = "target-groups"))
            .await
            .map_err(|err| err.wrap("target-group-synthesizer", stack_name.clone()))?;
        listeners
            .synthesize(ctx, stack)
            .instrument(tracing::trace_span!("elbsync", component = "listeners"))
            .await
            .map_err(|err| err.wrap("listener-synthesizer", stack_name.clone()))?;
        rules
            .synthesize(ctx, stack)
            .instrument(tracing::trace_span!("elbsync", component = "listener-rules"))
            .await
            .map_err(|err| err.wrap("listener-rule-synthesizer", stack_name.clone()))?;

        // deferred target-group deletions go first: the rules that held the
        // references are gone by now
        tgs.post_synthesize(ctx)
            .await
            .map_err(|err| err.wrap("target-group-synthesizer", stack_name.clone()))?;
        let requeue = lbs
            .post_synthesize(ctx)
            .await
            .map_err(|err| err.wrap("load-balancer-synthesizer", stack_name.clone()))?;

        match &requeue {
            Some(requeue) => debug!(
                stack = stack_name.as_str(),
                after = %format_duration(requeue.after),
                "Synthesis pending cloud stabilization"
            ),
            None => trace!(stack = stack_name.as_str(), "Stack synthesis complete"),
        }

        Ok(requeue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::*;
    use crate::client::testing::MockApi;
    use crate::error::SyncError;
    use crate::model::{
        ActionSpec, IpAddressType, ListenerRuleSpec, ListenerSpec, LoadBalancerScheme,
        LoadBalancerSpec, LoadBalancerType, Protocol, RuleConditionSpec, StackId,
        SubnetMappingSpec, TargetGroupRef, TargetGroupSpec, TargetType, WeightedTargetGroup,
    };
    use crate::tags::{tag_map, ClusterTrackingProvider, TagMap};
    use std::sync::Arc;

    fn create_deployer(api: Arc<MockApi>) -> StackDeployer {
        StackDeployer::new(
            api,
            Arc::new(ClusterTrackingProvider::new("prod")),
            Config::default(),
        )
    }

    fn create_stack() -> Stack {
        let mut stack = Stack::new(StackId::new("ns", "app"));
        stack.load_balancers = vec![LoadBalancerSpec {
            resource_id: "lb-1".to_string(),
            name: "k8s-ns-app-lb".to_string(),
            type_: LoadBalancerType::Application,
            scheme: LoadBalancerScheme::InternetFacing,
            ip_address_type: IpAddressType::Ipv4,
            subnet_mappings: vec![SubnetMappingSpec {
                subnet_id: "subnet-a".to_string(),
                ..Default::default()
            }],
            security_groups: vec!["sg-1".to_string()],
            ..Default::default()
        }];
        stack.target_groups = vec![TargetGroupSpec {
            resource_id: "tg-1".to_string(),
            name: "k8s-ns-app-tg".to_string(),
            target_type: TargetType::Ip,
            protocol: Protocol::Http,
            port: Some(8080),
            vpc_id: "vpc-1".to_string(),
            ..Default::default()
        }];
        stack.listeners = vec![ListenerSpec {
            lb_resource_id: "lb-1".to_string(),
            port: 80,
            protocol: Protocol::Http,
            default_actions: vec![ActionSpec::FixedResponse {
                status_code: "404".to_string(),
                content_type: Some("text/plain".to_string()),
                message_body: None,
            }],
            ..Default::default()
        }];
        stack.listener_rules = vec![ListenerRuleSpec {
            resource_id: "rule-1".to_string(),
            lb_resource_id: "lb-1".to_string(),
            port: 80,
            priority: 10,
            actions: vec![ActionSpec::Forward {
                target_groups: vec![WeightedTargetGroup {
                    // resolved from the target group created in this cycle
                    target_group: TargetGroupRef::ResourceId("tg-1".to_string()),
                    weight: None,
                }],
                stickiness: None,
            }],
            conditions: vec![RuleConditionSpec::PathPattern {
                values: vec!["/api/*".to_string()],
            }],
            ..Default::default()
        }];
        stack
    }

    #[tokio::test]
    async fn fresh_stack_creates_in_dependency_order() {
        let api = MockApi::new();
        api.enqueue_create_load_balancer(CreateLoadBalancerOutput {
            load_balancers: vec![LoadBalancer {
                load_balancer_arn: Some("arn:lb-1".to_string()),
                ..Default::default()
            }],
        });
        api.enqueue_create_target_group(CreateTargetGroupOutput {
            target_groups: vec![TargetGroup {
                target_group_arn: Some("arn:tg-1".to_string()),
                ..Default::default()
            }],
        });
        api.enqueue_create_listener(CreateListenerOutput {
            listeners: vec![Listener {
                listener_arn: Some("arn:listener-1".to_string()),
                port: Some(80),
                ..Default::default()
            }],
        });

        let deployer = create_deployer(api.clone());
        let ctx = SynthContext::detached();
        let requeue = deployer.deploy(&ctx, &create_stack()).await.unwrap();

        assert!(requeue.is_none());
        assert_eq!(
            vec![
                "create_load_balancer",
                "create_target_group",
                "create_listener",
                "create_rule"
            ],
            api.mutation_names()
        );
        // the rule's forward action resolved the target group created above
        let rule = api
            .calls()
            .into_iter()
            .find_map(|call| match call {
                crate::client::testing::Call::CreateRule(input) => Some(input),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            Some("arn:tg-1".to_string()),
            rule.actions[0].target_group_arn
        );
    }

    fn owned_tags(resource_id: &str) -> TagMap {
        tag_map(&[
            ("elbv2.k8s.aws/cluster", "prod"),
            ("elbv2.k8s.aws/stack", "ns/app"),
            ("elbv2.k8s.aws/resource", resource_id),
        ])
    }

    fn tag_description(arn: &str, tags: &TagMap) -> TagDescription {
        TagDescription {
            resource_arn: Some(arn.to_string()),
            tags: Some(
                tags.iter()
                    .map(|(k, v)| Tag {
                        key: k.clone(),
                        value: Some(v.clone()),
                    })
                    .collect(),
            ),
        }
    }

    #[tokio::test]
    async fn converged_stack_issues_zero_mutations() {
        let api = MockApi::new();

        // discovery: the cloud already matches the desired stack
        api.enqueue_describe_load_balancers(DescribeLoadBalancersOutput {
            load_balancers: vec![LoadBalancer {
                load_balancer_arn: Some("arn:lb-1".to_string()),
                load_balancer_name: Some("k8s-ns-app-lb".to_string()),
                type_: Some("application".to_string()),
                scheme: Some("internet-facing".to_string()),
                ip_address_type: Some("ipv4".to_string()),
                availability_zones: Some(vec![AvailabilityZone {
                    subnet_id: Some("subnet-a".to_string()),
                    ..Default::default()
                }]),
                security_groups: Some(vec!["sg-1".to_string()]),
                state: Some(LoadBalancerState {
                    code: Some("active".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            }],
            next_marker: None,
        });
        api.enqueue_describe_tags(DescribeTagsOutput {
            tag_descriptions: vec![tag_description("arn:lb-1", &owned_tags("lb-1"))],
        });
        api.enqueue_describe_target_groups(DescribeTargetGroupsOutput {
            target_groups: vec![TargetGroup {
                target_group_arn: Some("arn:tg-1".to_string()),
                target_group_name: Some("k8s-ns-app-tg".to_string()),
                target_type: Some("ip".to_string()),
                protocol: Some("HTTP".to_string()),
                port: Some(8080),
                vpc_id: Some("vpc-1".to_string()),
                ..Default::default()
            }],
            next_marker: None,
        });
        api.enqueue_describe_tags(DescribeTagsOutput {
            tag_descriptions: vec![tag_description("arn:tg-1", &owned_tags("tg-1"))],
        });
        api.enqueue_describe_listeners(DescribeListenersOutput {
            listeners: vec![Listener {
                listener_arn: Some("arn:listener-1".to_string()),
                port: Some(80),
                protocol: Some("HTTP".to_string()),
                default_actions: Some(vec![Action {
                    type_: Some("fixed-response".to_string()),
                    order: Some(1),
                    fixed_response_config: Some(FixedResponseActionConfig {
                        status_code: Some("404".to_string()),
                        content_type: Some("text/plain".to_string()),
                        message_body: None,
                    }),
                    ..Default::default()
                }]),
                ..Default::default()
            }],
            next_marker: None,
        });
        api.enqueue_describe_tags(DescribeTagsOutput {
            tag_descriptions: vec![tag_description("arn:listener-1", &owned_tags("lb-1:80"))],
        });
        api.enqueue_describe_rules(DescribeRulesOutput {
            rules: vec![Rule {
                rule_arn: Some("arn:rule-1".to_string()),
                priority: Some("10".to_string()),
                actions: Some(vec![Action {
                    type_: Some("forward".to_string()),
                    order: Some(1),
                    target_group_arn: Some("arn:tg-1".to_string()),
                    ..Default::default()
                }]),
                conditions: Some(vec![RuleCondition {
                    field: Some("path-pattern".to_string()),
                    path_pattern_config: Some(PathPatternConditionConfig {
                        values: vec!["/api/*".to_string()],
                    }),
                    ..Default::default()
                }]),
                is_default: Some(false),
                ..Default::default()
            }],
            next_marker: None,
        });
        api.enqueue_describe_tags(DescribeTagsOutput {
            tag_descriptions: vec![tag_description("arn:rule-1", &owned_tags("rule-1"))],
        });

        let deployer = create_deployer(api.clone());
        let ctx = SynthContext::detached();
        let requeue = deployer.deploy(&ctx, &create_stack()).await.unwrap();

        assert!(requeue.is_none());
        assert!(api.mutation_names().is_empty());
    }

    #[tokio::test]
    async fn errors_carry_the_failing_component() {
        let api = MockApi::new();
        api.fail_next(
            "describe_load_balancers",
            SyncError::api("AccessDenied", "not authorized"),
        );

        let deployer = create_deployer(api);
        let ctx = SynthContext::detached();
        let err = deployer
            .deploy(&ctx, &create_stack())
            .await
            .unwrap_err();

        match err {
            SyncError::Component {
                component, context, ..
            } => {
                assert_eq!("load-balancer-synthesizer", component);
                assert_eq!("ns/app", context);
            }
            other => panic!("expected Component, got {}", other),
        }
    }
}
