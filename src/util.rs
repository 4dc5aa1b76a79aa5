//! Small helpers shared by the managers.
use crate::context::SynthContext;
use crate::error::SyncError;
use crate::Result;
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

/// Retries `op` while `retryable` accepts the error, sleeping `interval`
/// between attempts, for at most `budget` of wall time. The first
/// non-retryable error, and the last retryable error once the budget cannot
/// fit another attempt, are returned verbatim.
pub async fn retry_with_budget<T, F, Fut, P>(
    ctx: &SynthContext,
    interval: Duration,
    budget: Duration,
    mut retryable: P,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: FnMut(&SyncError) -> bool,
{
    let deadline = Instant::now() + budget;
    loop {
        match ctx.guard(op()).await {
            Ok(value) => return Ok(value),
            Err(err) if retryable(&err) && Instant::now() + interval <= deadline => {
                trace!(err = %err, "Retrying after transient failure");
                ctx.sleep(interval).await?;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Entries of `desired` whose value differs from (or is absent in)
/// `current`. Keys present only in `current` are left alone; the cloud API
/// treats attribute modification as additive.
pub fn changed_entries(
    desired: &BTreeMap<String, String>,
    current: &BTreeMap<String, String>,
) -> Vec<(String, String)> {
    desired
        .iter()
        .filter(|(key, value)| current.get(*key) != Some(*value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
