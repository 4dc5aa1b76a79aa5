//! Synthesizers and their per-resource managers.
//!
//! Each resource kind pairs a manager (the actual cloud mutations) with a
//! synthesizer (discovery, matching, and the mutation plan). The deployer
//! runs them in dependency order: load balancers, target groups, listeners,
//! listener rules.
pub mod attrs;
pub mod compare;
pub mod lb;
pub mod listener;
pub mod matcher;
pub mod rule;
pub mod tagging;
pub mod tg;
