//! Tag model and the tracking-provider port.
//!
//! Tags are the only durable identity this system has: every cloud resource
//! it creates carries the stack tag pair plus a resource-id tag, and
//! discovery works by matching those tags back.
use crate::model::StackId;
use std::collections::{BTreeMap, BTreeSet};

/// Deterministically ordered tag key/value map.
pub type TagMap = BTreeMap<String, String>;

/// Builds a [`TagMap`] from literal pairs. Test and caller convenience.
pub fn tag_map(pairs: &[(&str, &str)]) -> TagMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// An AND of `key == value` predicates. A key mapped to an empty value list
/// only requires the key to be present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagFilter {
    exprs: BTreeMap<String, Vec<String>>,
}

impl TagFilter {
    pub fn new() -> Self {
        TagFilter::default()
    }

    pub fn insert<K: Into<String>>(&mut self, key: K, values: Vec<String>) {
        self.exprs.insert(key.into(), values);
    }

    pub fn matches(&self, tags: &TagMap) -> bool {
        self.exprs.iter().all(|(key, values)| match tags.get(key) {
            Some(value) => values.is_empty() || values.contains(value),
            None => false,
        })
    }
}

impl From<TagMap> for TagFilter {
    fn from(tags: TagMap) -> Self {
        let mut filter = TagFilter::new();
        for (key, value) in tags {
            filter.insert(key, vec![value]);
        }
        filter
    }
}

/// True when any of the provided filters matches the tag map. An empty
/// filter slice matches nothing.
pub fn any_filter_matches(filters: &[TagFilter], tags: &TagMap) -> bool {
    filters.iter().any(|filter| filter.matches(tags))
}

/// Computes the tag mutation needed to move `current` to `desired`.
///
/// Keys in `ignored` are never added, updated or removed. Returns the
/// add-or-update map and the list of keys to remove.
pub fn diff_tags(
    desired: &TagMap,
    current: &TagMap,
    ignored: &BTreeSet<String>,
) -> (TagMap, Vec<String>) {
    let mut upserts = TagMap::new();
    for (key, value) in desired {
        if ignored.contains(key) {
            continue;
        }
        if current.get(key) != Some(value) {
            upserts.insert(key.clone(), value.clone());
        }
    }

    let removals: Vec<String> = current
        .keys()
        .filter(|key| !desired.contains_key(*key) && !ignored.contains(*key))
        .cloned()
        .collect();

    (upserts, removals)
}

/// Supplies the stack and resource tag vocabulary. The concrete provider is
/// owned by the calling controller; the core only consumes it.
pub trait TrackingProvider: Send + Sync {
    /// Tag key whose value identifies a desired resource within its stack.
    fn resource_id_tag_key(&self) -> String;

    /// Tag keys written by earlier controller generations. They are matched
    /// during discovery and left untouched during tag reconciliation.
    fn legacy_tag_keys(&self) -> Vec<String>;

    fn stack_tags(&self, stack: &StackId) -> TagMap;

    fn stack_tags_legacy(&self, stack: &StackId) -> TagMap;

    /// Full tag set for one resource: user tags, overlaid by the stack tags
    /// and the resource-id tag (system tags win on conflict).
    fn resource_tags(&self, stack: &StackId, resource_id: &str, user_tags: &TagMap) -> TagMap {
        let mut tags = user_tags.clone();
        tags.extend(self.stack_tags(stack));
        tags.insert(self.resource_id_tag_key(), resource_id.to_string());
        tags
    }

    /// Discovery filters: current stack tags OR the legacy stack tags.
    fn stack_filters(&self, stack: &StackId) -> Vec<TagFilter> {
        vec![
            TagFilter::from(self.stack_tags(stack)),
            TagFilter::from(self.stack_tags_legacy(stack)),
        ]
    }
}

/// Cluster-scoped tracking vocabulary, one controller deployment per
/// cluster.
#[derive(Debug, Clone)]
pub struct ClusterTrackingProvider {
    cluster_name: String,
}

impl ClusterTrackingProvider {
    pub fn new<S: Into<String>>(cluster_name: S) -> Self {
        ClusterTrackingProvider {
            cluster_name: cluster_name.into(),
        }
    }

    fn cluster_ownership_key(&self) -> String {
        format!("kubernetes.io/cluster/{}", self.cluster_name)
    }
}

impl TrackingProvider for ClusterTrackingProvider {
    fn resource_id_tag_key(&self) -> String {
        "elbv2.k8s.aws/resource".to_string()
    }

    fn legacy_tag_keys(&self) -> Vec<String> {
        vec![
            self.cluster_ownership_key(),
            "kubernetes.io/ingress-name".to_string(),
        ]
    }

    fn stack_tags(&self, stack: &StackId) -> TagMap {
        tag_map(&[
            ("elbv2.k8s.aws/cluster", self.cluster_name.as_str()),
            ("elbv2.k8s.aws/stack", &stack.to_string()),
        ])
    }

    fn stack_tags_legacy(&self, stack: &StackId) -> TagMap {
        let mut tags = TagMap::new();
        tags.insert(self.cluster_ownership_key(), "owned".to_string());
        tags.insert("elbv2.k8s.aws/stack".to_string(), stack.to_string());
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_requires_all_keys() {
        let mut filter = TagFilter::new();
        filter.insert("elbv2.k8s.aws/cluster", vec!["prod".to_string()]);
        filter.insert("elbv2.k8s.aws/stack", vec![]);

        assert!(filter.matches(&tag_map(&[
            ("elbv2.k8s.aws/cluster", "prod"),
            ("elbv2.k8s.aws/stack", "ns/app"),
        ])));
        assert!(!filter.matches(&tag_map(&[("elbv2.k8s.aws/cluster", "prod")])));
        assert!(!filter.matches(&tag_map(&[
            ("elbv2.k8s.aws/cluster", "staging"),
            ("elbv2.k8s.aws/stack", "ns/app"),
        ])));
    }

    #[test]
    fn filters_are_or_combined() {
        let current = TagFilter::from(tag_map(&[("stack", "ns/app")]));
        let legacy = TagFilter::from(tag_map(&[("kubernetes.io/cluster/prod", "owned")]));
        let filters = vec![current, legacy];

        assert!(any_filter_matches(
            &filters,
            &tag_map(&[("kubernetes.io/cluster/prod", "owned")])
        ));
        assert!(!any_filter_matches(&filters, &tag_map(&[("stack", "ns/other")])));
        assert!(!any_filter_matches(&[], &tag_map(&[("stack", "ns/app")])));
    }

    #[test]
    fn diff_tags_never_touches_ignored_keys() {
        let desired = tag_map(&[("a", "1"), ("ignored-add", "x")]);
        let current = tag_map(&[("a", "0"), ("ignored-keep", "y"), ("stale", "z")]);
        let ignored: BTreeSet<String> = vec!["ignored-add".to_string(), "ignored-keep".to_string()]
            .into_iter()
            .collect();

        let (upserts, removals) = diff_tags(&desired, &current, &ignored);

        assert_eq!(tag_map(&[("a", "1")]), upserts);
        assert_eq!(vec!["stale".to_string()], removals);
    }

    #[test]
    fn diff_tags_is_empty_when_converged() {
        let tags = tag_map(&[("a", "1"), ("b", "2")]);
        let (upserts, removals) = diff_tags(&tags, &tags, &BTreeSet::new());
        assert!(upserts.is_empty());
        assert!(removals.is_empty());
    }

    #[test]
    fn resource_tags_system_keys_win() {
        let provider = ClusterTrackingProvider::new("prod");
        let stack = StackId::new("ns", "app");
        let user = tag_map(&[("team", "infra"), ("elbv2.k8s.aws/cluster", "spoofed")]);

        let tags = provider.resource_tags(&stack, "lb-1", &user);

        assert_eq!("prod", tags["elbv2.k8s.aws/cluster"]);
        assert_eq!("lb-1", tags["elbv2.k8s.aws/resource"]);
        assert_eq!("infra", tags["team"]);
    }
}
