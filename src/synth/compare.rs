//! Domain-aware equality for listener settings and rule settings.
//!
//! The control plane decorates what it stores: actions come back with a
//! server-assigned `Order`, single-target forwards are mirrored into both
//! the flat ARN field and a forward config, and list-valued condition fields
//! are unordered. Comparers canonicalize both sides before comparing so
//! that semantically identical settings never read as drift.
use crate::api::{
    Action, Certificate, ForwardActionConfig, RuleCondition, RuleTransform,
    TargetGroupStickinessConfig,
};
use std::collections::BTreeSet;

/// Order-of-`Order`-insensitive action sequence equality. The sequence
/// itself is positional: an authenticate action ahead of a forward action is
/// meaningful ordering.
pub fn actions_equivalent(left: &[Action], right: &[Action]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    left.iter()
        .zip(right.iter())
        .all(|(l, r)| canonical_action(l) == canonical_action(r))
}

fn canonical_action(action: &Action) -> Action {
    let mut action = action.clone();
    action.order = None;

    if action.type_.as_deref() == Some("forward") {
        let mut forward = action
            .forward_config
            .clone()
            .unwrap_or_else(ForwardActionConfig::default);
        if forward.target_groups.is_empty() {
            if let Some(arn) = action.target_group_arn.clone() {
                forward.target_groups.push(crate::api::TargetGroupTuple {
                    target_group_arn: Some(arn),
                    weight: None,
                });
            }
        }
        forward
            .target_groups
            .sort_by(|a, b| a.target_group_arn.cmp(&b.target_group_arn));
        // a missing stickiness block means disabled
        if forward.target_group_stickiness_config.is_none() {
            forward.target_group_stickiness_config = Some(TargetGroupStickinessConfig {
                enabled: Some(false),
                duration_seconds: None,
            });
        } else if let Some(stickiness) = forward.target_group_stickiness_config.as_mut() {
            if stickiness.enabled.is_none() {
                stickiness.enabled = Some(false);
            }
            if stickiness.enabled == Some(false) {
                stickiness.duration_seconds = None;
            }
        }
        action.forward_config = Some(forward);
        action.target_group_arn = None;
    }

    action
}

/// Conditions are an unordered AND set with unordered value lists.
pub fn conditions_equivalent(left: &[RuleCondition], right: &[RuleCondition]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    let mut left: Vec<RuleCondition> = left.iter().map(canonical_condition).collect();
    let mut right: Vec<RuleCondition> = right.iter().map(canonical_condition).collect();
    left.sort_by_key(condition_sort_key);
    right.sort_by_key(condition_sort_key);
    left == right
}

fn canonical_condition(condition: &RuleCondition) -> RuleCondition {
    let mut condition = condition.clone();
    if let Some(config) = condition.host_header_config.as_mut() {
        config.values.sort();
    }
    if let Some(config) = condition.path_pattern_config.as_mut() {
        config.values.sort();
    }
    if let Some(config) = condition.http_header_config.as_mut() {
        config.values.sort();
    }
    if let Some(config) = condition.http_request_method_config.as_mut() {
        config.values.sort();
    }
    if let Some(config) = condition.query_string_config.as_mut() {
        config
            .values
            .sort_by(|a, b| (&a.key, &a.value).cmp(&(&b.key, &b.value)));
    }
    if let Some(config) = condition.source_ip_config.as_mut() {
        config.values.sort();
    }
    condition
}

fn condition_sort_key(condition: &RuleCondition) -> (String, String) {
    let field = condition.field.clone().unwrap_or_default();
    let values = if let Some(config) = &condition.host_header_config {
        config.values.join("\n")
    } else if let Some(config) = &condition.path_pattern_config {
        config.values.join("\n")
    } else if let Some(config) = &condition.http_header_config {
        format!(
            "{}\n{}",
            config.http_header_name.clone().unwrap_or_default(),
            config.values.join("\n")
        )
    } else if let Some(config) = &condition.http_request_method_config {
        config.values.join("\n")
    } else if let Some(config) = &condition.query_string_config {
        config
            .values
            .iter()
            .map(|pair| {
                format!(
                    "{}={}",
                    pair.key.clone().unwrap_or_default(),
                    pair.value.clone().unwrap_or_default()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    } else if let Some(config) = &condition.source_ip_config {
        config.values.join("\n")
    } else {
        String::new()
    };
    (field, values)
}

/// Transforms compare exactly and pairwise; their order is the order the
/// control plane applies them in.
pub fn transforms_equivalent(left: &[RuleTransform], right: &[RuleTransform]) -> bool {
    left == right
}

/// Certificates compare as ARN sets; `is_default` is server bookkeeping.
pub fn certificates_equivalent(left: &[Certificate], right: &[Certificate]) -> bool {
    let left: BTreeSet<&str> = left
        .iter()
        .filter_map(|cert| cert.certificate_arn.as_deref())
        .collect();
    let right: BTreeSet<&str> = right
        .iter()
        .filter_map(|cert| cert.certificate_arn.as_deref())
        .collect();
    left == right
}
