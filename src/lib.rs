//! ELBv2 stack reconciliation core.
//!
//! Given the desired model of one stack (load balancers, target groups,
//! listeners, listener rules), the deployer discovers the matching cloud
//! resources by stack tags, computes the minimum-disruption mutation plan,
//! and executes it through the narrow [`Elbv2Api`] port. The cloud is the
//! only state store; tags are the only identity.
pub mod api;
pub mod client;
pub mod config;
pub mod context;
pub mod deploy;
pub mod error;
pub mod model;
pub mod synth;
pub mod tags;
mod util;

pub use client::Elbv2Api;
pub use config::{parse_config, Config, Features, PollConfig};
pub use context::SynthContext;
pub use deploy::{RequeueAfter, StackDeployer};
pub use error::SyncError as Error;
pub use model::{Stack, StackId, MAX_RULE_PRIORITY};
pub use tags::{tag_map, ClusterTrackingProvider, TagFilter, TagMap, TrackingProvider};

use std::result::Result as StdResult;

pub type Result<T> = StdResult<T, Error>;
