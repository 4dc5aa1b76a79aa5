use crate::model::{ActionSpec, RuleConditionSpec, TransformSpec};
use crate::tags::TagMap;

/// Highest priority the control plane accepts on a non-default rule.
pub const MAX_RULE_PRIORITY: i64 = 50_000;

/// Desired listener rule. Identified by `(listener, resource_id)`; the
/// priority orders evaluation, lower first.
#[derive(Debug, Clone)]
pub struct ListenerRuleSpec {
    pub resource_id: String,
    pub lb_resource_id: String,
    pub port: i64,
    pub priority: i64,
    pub actions: Vec<ActionSpec>,
    pub conditions: Vec<RuleConditionSpec>,
    pub transforms: Vec<TransformSpec>,
    pub tags: TagMap,
}

impl Default for ListenerRuleSpec {
    fn default() -> Self {
        ListenerRuleSpec {
            resource_id: String::new(),
            lb_resource_id: String::new(),
            port: 80,
            priority: 1,
            actions: Vec::new(),
            conditions: Vec::new(),
            transforms: Vec::new(),
            tags: TagMap::new(),
        }
    }
}
