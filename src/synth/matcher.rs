//! Pairs desired resources with the cloud resources that carry their
//! resource-id tag.
//!
//! Ownership is weak: only resources carrying the stack tags ever reach
//! this matcher, and a discovered resource without the resource-id tag is a
//! hard error, never a silent skip.
use crate::error::SyncError;
use crate::synth::tagging::Tagged;
use crate::Result;
use std::collections::BTreeMap;

#[derive(Debug)]
pub struct MatchResult<R, S> {
    pub matched: Vec<(R, Tagged<S>)>,
    pub unmatched_res: Vec<R>,
    pub unmatched_sdk: Vec<Tagged<S>>,
}

/// Partitions `resources` and `sdks` into matched pairs and the two
/// unmatched sets.
///
/// Several cloud resources may carry the same resource id (left-overs of
/// interrupted replacements); each is paired or queued for deletion
/// individually. A pair that `requires_replacement` accepts is torn apart:
/// the cloud side joins `unmatched_sdk`, and the desired side joins
/// `unmatched_res` unless another cloud twin survived.
pub fn match_resources<R, S>(
    resources: Vec<R>,
    sdks: Vec<Tagged<S>>,
    resource_id_tag_key: &str,
    resource_id: impl Fn(&R) -> String,
    sdk_arn: impl Fn(&S) -> String,
    requires_replacement: impl Fn(&R, &Tagged<S>) -> bool,
) -> Result<MatchResult<R, S>>
where
    R: Clone,
{
    let mut sdks_by_id: BTreeMap<String, Vec<Tagged<S>>> = BTreeMap::new();
    for sdk in sdks {
        let id = match sdk.tags.get(resource_id_tag_key) {
            Some(id) => id.clone(),
            None => {
                return Err(SyncError::MissingResourceIdTag {
                    tag_key: resource_id_tag_key.to_string(),
                    arn: sdk_arn(&sdk.inner),
                })
            }
        };
        sdks_by_id.entry(id).or_default().push(sdk);
    }

    let mut result = MatchResult {
        matched: Vec::new(),
        unmatched_res: Vec::new(),
        unmatched_sdk: Vec::new(),
    };

    for resource in resources {
        let id = resource_id(&resource);
        match sdks_by_id.remove(&id) {
            Some(candidates) => {
                let mut survived = false;
                for sdk in candidates {
                    if requires_replacement(&resource, &sdk) {
                        result.unmatched_sdk.push(sdk);
                    } else {
                        result.matched.push((resource.clone(), sdk));
                        survived = true;
                    }
                }
                if !survived {
                    result.unmatched_res.push(resource);
                }
            }
            None => result.unmatched_res.push(resource),
        }
    }

    for (_, leftovers) in sdks_by_id {
        result.unmatched_sdk.extend(leftovers);
    }

    Ok(result)
}
