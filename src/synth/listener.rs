//! Listener manager and synthesizer.
use crate::api::{
    Certificate, CreateListenerInput, DeleteListenerInput, DescribeListenerCertificatesInput,
    Listener, ModifyListenerInput, MutualAuthenticationAttributes, Tag,
};
use crate::client::Elbv2Api;
use crate::config::Config;
use crate::context::SynthContext;
use crate::error::SyncError;
use crate::model::{build_actions, ListenerSpec, MutualAuthenticationMode, Stack, StackId};
use crate::synth::compare::{actions_equivalent, certificates_equivalent};
use crate::synth::tagging::{ReconcileTagsOpts, Tagged, TaggingManager};
use crate::tags::TrackingProvider;
use crate::Result;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

const MTLS_MODE_OFF: &str = "off";
const MTLS_MODE_VERIFY: &str = "verify";
const ALPN_NONE: &str = "None";

pub struct ListenerManager {
    client: Arc<dyn Elbv2Api>,
    tagging: Arc<TaggingManager>,
    tracking: Arc<dyn TrackingProvider>,
    config: Config,
}

impl ListenerManager {
    pub fn new(
        client: Arc<dyn Elbv2Api>,
        tagging: Arc<TaggingManager>,
        tracking: Arc<dyn TrackingProvider>,
        config: Config,
    ) -> Self {
        ListenerManager {
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
        spec: &ListenerSpec,
    ) -> Result<Listener> {
        let lb_arn = ctx.load_balancer_arn(&spec.lb_resource_id)?;
        debug!(
            resource = spec.lb_resource_id.as_str(),
            port = spec.port,
            "Creating listener"
        );

        let desired_actions = build_actions(ctx, &spec.default_actions)?;
        let resource_id = listener_resource_id(spec);
        let tags = self.tracking.resource_tags(stack_id, &resource_id, &spec.tags);

        let input = CreateListenerInput {
            load_balancer_arn: lb_arn,
            port: spec.port,
            protocol: spec.protocol.as_str().to_string(),
            ssl_policy: spec.ssl_policy.clone(),
            certificates: spec.default_certificate().map(|arn| {
                vec![Certificate {
                    certificate_arn: Some(arn.to_string()),
                    is_default: None,
                }]
            }),
            default_actions: desired_actions,
            alpn_policy: spec.alpn_policy.clone().map(|policy| vec![policy]),
            mutual_authentication: spec.mutual_authentication.as_ref().map(|mtls| mtls.build()),
            tags: Some(
                tags.iter()
                    .map(|(key, value)| Tag {
                        key: key.clone(),
                        value: Some(value.clone()),
                    })
                    .collect(),
            ),
        };

        let output = ctx.guard(self.client.create_listener(input)).await?;
        let listener = output.listeners.into_iter().next().ok_or_else(|| {
            SyncError::Validation(format!(
                "create returned no listener for {}:{}",
                spec.lb_resource_id, spec.port
            ))
        })?;
        let arn = listener.listener_arn.clone().unwrap_or_default();

        if !spec.extra_certificates().is_empty() {
            ctx.guard(self.client.add_listener_certificates(
                crate::api::AddListenerCertificatesInput {
                    listener_arn: arn,
                    certificates: spec
                        .extra_certificates()
                        .iter()
                        .map(|cert_arn| Certificate {
                            certificate_arn: Some(cert_arn.clone()),
                            is_default: None,
                        })
                        .collect(),
                },
            ))
            .await?;
        }

        Ok(listener)
    }

    pub async fn update(
        &self,
        ctx: &SynthContext,
        stack_id: &StackId,
        spec: &ListenerSpec,
        sdk: &Tagged<Listener>,
    ) -> Result<()> {
        let arn = sdk.inner.listener_arn.clone().unwrap_or_default();
        let desired_actions = build_actions(ctx, &spec.default_actions)?;

        if self.is_settings_drifted(spec, &desired_actions, &sdk.inner) {
            debug!(resource = arn.as_str(), "Modifying listener");
            let input = self.build_modify_input(spec, desired_actions, &sdk.inner, &arn);
            ctx.guard(self.client.modify_listener(input)).await?;
        }

        if spec.protocol.is_tls_terminating() {
            self.reconcile_extra_certificates(ctx, spec, &arn).await?;
        }

        let resource_id = listener_resource_id(spec);
        let desired_tags = self.tracking.resource_tags(stack_id, &resource_id, &spec.tags);
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

        Ok(())
    }

    pub async fn delete(&self, ctx: &SynthContext, sdk: &Tagged<Listener>) -> Result<()> {
        let arn = sdk.inner.listener_arn.clone().unwrap_or_default();
        debug!(resource = arn.as_str(), "Deleting listener");
        ctx.guard(self.client.delete_listener(DeleteListenerInput { listener_arn: arn }))
            .await
    }

    fn is_settings_drifted(
        &self,
        spec: &ListenerSpec,
        desired_actions: &[crate::api::Action],
        sdk: &Listener,
    ) -> bool {
        if sdk.port != Some(spec.port) {
            return true;
        }
        if sdk.protocol.as_deref() != Some(spec.protocol.as_str()) {
            return true;
        }
        if spec.ssl_policy.is_some() && sdk.ssl_policy != spec.ssl_policy {
            return true;
        }
        if let Some(default_cert) = spec.default_certificate() {
            let desired = [Certificate {
                certificate_arn: Some(default_cert.to_string()),
                is_default: None,
            }];
            if !certificates_equivalent(&desired, sdk.certificates.as_deref().unwrap_or(&[])) {
                return true;
            }
        }
        if !actions_equivalent(desired_actions, sdk.default_actions.as_deref().unwrap_or(&[])) {
            return true;
        }
        if self.is_alpn_drifted(spec, sdk) {
            return true;
        }
        self.is_mutual_auth_drifted(spec.mutual_authentication.as_ref(), sdk)
    }

    fn is_alpn_drifted(&self, spec: &ListenerSpec, sdk: &Listener) -> bool {
        let sdk_alpn = sdk.alpn_policy.as_deref().unwrap_or(&[]);
        match &spec.alpn_policy {
            Some(desired) => sdk_alpn.first().map(String::as_str) != Some(desired.as_str()),
            // unset desired ALPN converges the cloud side back to None
            // under the enhanced policy, and is ignored under the legacy one
            None => {
                self.config.features.enhanced_mtls_drift
                    && !sdk_alpn.is_empty()
                    && !alpn_is_none(sdk_alpn)
            }
        }
    }

    fn is_mutual_auth_drifted(
        &self,
        desired: Option<&crate::model::MutualAuthenticationSpec>,
        sdk: &Listener,
    ) -> bool {
        let sdk_mtls = sdk.mutual_authentication.clone().unwrap_or_default();
        match desired {
            Some(desired) => {
                sdk_mtls.mode.as_deref() != Some(desired.mode.as_str())
                    || sdk_mtls.trust_store_arn != desired.trust_store_arn
                    || sdk_mtls.ignore_client_certificate_expiry.unwrap_or(false)
                        != desired.ignore_client_certificate_expiry.unwrap_or(false)
            }
            // the enhanced policy converges verify back to off; an sdk-side
            // off (or passthrough left by hand) is only drift when specified
            None => {
                self.config.features.enhanced_mtls_drift
                    && sdk_mtls.mode.as_deref() == Some(MTLS_MODE_VERIFY)
            }
        }
    }

    fn build_modify_input(
        &self,
        spec: &ListenerSpec,
        desired_actions: Vec<crate::api::Action>,
        sdk: &Listener,
        arn: &str,
    ) -> ModifyListenerInput {
        let sdk_mode = sdk
            .mutual_authentication
            .as_ref()
            .and_then(|mtls| mtls.mode.as_deref());
        let desired_mode = spec.mutual_authentication.as_ref().map(|mtls| mtls.mode);

        let mutual_authentication = if sdk_mode == Some(MTLS_MODE_VERIFY)
            && desired_mode != Some(MutualAuthenticationMode::Verify)
        {
            Some(MutualAuthenticationAttributes {
                mode: Some(MTLS_MODE_OFF.to_string()),
                ..Default::default()
            })
        } else {
            spec.mutual_authentication.as_ref().map(|mtls| mtls.build())
        };

        let sdk_alpn = sdk.alpn_policy.as_deref().unwrap_or(&[]);
        let alpn_policy = match &spec.alpn_policy {
            Some(policy) => Some(vec![policy.clone()]),
            None if self.config.features.enhanced_mtls_drift
                && !sdk_alpn.is_empty()
                && !alpn_is_none(sdk_alpn) =>
            {
                Some(vec![ALPN_NONE.to_string()])
            }
            None => None,
        };

        ModifyListenerInput {
            listener_arn: arn.to_string(),
            port: Some(spec.port),
            protocol: Some(spec.protocol.as_str().to_string()),
            ssl_policy: spec.ssl_policy.clone(),
            certificates: spec.default_certificate().map(|cert_arn| {
                vec![Certificate {
                    certificate_arn: Some(cert_arn.to_string()),
                    is_default: None,
                }]
            }),
            default_actions: Some(desired_actions),
            alpn_policy,
            mutual_authentication,
        }
    }

    /// Converges the non-default (SNI) certificate set.
    async fn reconcile_extra_certificates(
        &self,
        ctx: &SynthContext,
        spec: &ListenerSpec,
        arn: &str,
    ) -> Result<()> {
        let mut current: Vec<Certificate> = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let result = ctx
                .guard(self.client.describe_listener_certificates(
                    DescribeListenerCertificatesInput {
                        listener_arn: arn.to_string(),
                        marker: marker.take(),
                    },
                ))
                .await?;
            current.extend(result.certificates);
            if result.next_marker.is_none() {
                break;
            }
            marker = result.next_marker;
        }

        let current_extras: BTreeSet<String> = current
            .into_iter()
            .filter(|cert| cert.is_default != Some(true))
            .filter_map(|cert| cert.certificate_arn)
            .collect();
        let desired_extras: BTreeSet<String> =
            spec.extra_certificates().iter().cloned().collect();

        let to_add: Vec<Certificate> = desired_extras
            .difference(&current_extras)
            .map(|cert_arn| Certificate {
                certificate_arn: Some(cert_arn.clone()),
                is_default: None,
            })
            .collect();
        let to_remove: Vec<Certificate> = current_extras
            .difference(&desired_extras)
            .map(|cert_arn| Certificate {
                certificate_arn: Some(cert_arn.clone()),
                is_default: None,
            })
            .collect();

        if !to_add.is_empty() {
            debug!(resource = arn, count = to_add.len(), "Adding listener certificates");
            ctx.guard(self.client.add_listener_certificates(
                crate::api::AddListenerCertificatesInput {
                    listener_arn: arn.to_string(),
                    certificates: to_add,
                },
            ))
            .await?;
        }
        if !to_remove.is_empty() {
            debug!(resource = arn, count = to_remove.len(), "Removing listener certificates");
            ctx.guard(self.client.remove_listener_certificates(
                crate::api::RemoveListenerCertificatesInput {
                    listener_arn: arn.to_string(),
                    certificates: to_remove,
                },
            ))
            .await?;
        }

        Ok(())
    }
}

fn alpn_is_none(sdk_alpn: &[String]) -> bool {
    sdk_alpn.len() == 1 && sdk_alpn[0] == ALPN_NONE
}

/// Listener resource id used for the resource-id tag: LB resource id plus
/// port, matching the listener's desired-side identity.
fn listener_resource_id(spec: &ListenerSpec) -> String {
    format!("{}:{}", spec.lb_resource_id, spec.port)
}

pub struct ListenerSynthesizer {
    manager: ListenerManager,
    tagging: Arc<TaggingManager>,
}

impl ListenerSynthesizer {
    pub fn new(
        client: Arc<dyn Elbv2Api>,
        tagging: Arc<TaggingManager>,
        tracking: Arc<dyn TrackingProvider>,
        config: Config,
    ) -> Self {
        ListenerSynthesizer {
            manager: ListenerManager::new(client, tagging.clone(), tracking, config),
            tagging,
        }
    }

    pub async fn synthesize(&self, ctx: &SynthContext, stack: &Stack) -> Result<()> {
        let lb_ids: BTreeSet<&str> = stack
            .load_balancers
            .iter()
            .map(|lb| lb.resource_id.as_str())
            .collect();
        if let Some(orphan) = stack
            .listeners
            .iter()
            .find(|listener| !lb_ids.contains(listener.lb_resource_id.as_str()))
        {
            return Err(SyncError::UnresolvedReference {
                resource_id: orphan.lb_resource_id.clone(),
            });
        }

        for lb_spec in &stack.load_balancers {
            let lb_arn = ctx.load_balancer_arn(&lb_spec.resource_id)?;
            let sdk_listeners = self.tagging.list_listeners(ctx, &lb_arn).await?;

            let mut sdk_by_port: BTreeMap<i64, Tagged<Listener>> = sdk_listeners
                .into_iter()
                .filter_map(|listener| {
                    let port = listener.inner.port?;
                    Some((port, listener))
                })
                .collect();

            for spec in stack
                .listeners
                .iter()
                .filter(|listener| listener.lb_resource_id == lb_spec.resource_id)
            {
                match sdk_by_port.remove(&spec.port) {
                    Some(sdk) => {
                        let arn = sdk.inner.listener_arn.clone().unwrap_or_default();
                        ctx.record_listener_arn(spec.lb_resource_id.as_str(), spec.port, arn.as_str());
                        self.manager.update(ctx, &stack.id, spec, &sdk).await?;
                    }
                    None => {
                        let listener = self.manager.create(ctx, &stack.id, spec).await?;
                        let arn = listener.listener_arn.clone().unwrap_or_default();
                        ctx.record_listener_arn(spec.lb_resource_id.as_str(), spec.port, arn.as_str());
                    }
                }
            }

            for (_, sdk) in sdk_by_port {
                self.manager.delete(ctx, &sdk).await?;
            }
        }

        Ok(())
    }
}
