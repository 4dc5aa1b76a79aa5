//! Per-synthesis execution context.
//!
//! One `SynthContext` lives for a single synthesize → post-synthesize cycle.
//! It carries the caller's cancellation token (raced against every cloud
//! call and every retry sleep) and the ARN registries that later
//! synthesizers resolve lazy references through. Nothing in here survives
//! across cycles.
use crate::error::SyncError;
use crate::Result;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct StackExports {
    load_balancer_arns: HashMap<String, String>,
    target_group_arns: HashMap<String, String>,
    listener_arns: HashMap<(String, i64), String>,
}

pub struct SynthContext {
    token: CancellationToken,
    exports: Mutex<StackExports>,
}

impl SynthContext {
    pub fn new(token: CancellationToken) -> Self {
        SynthContext {
            token,
            exports: Mutex::new(StackExports::default()),
        }
    }

    /// Context that can only be cancelled by dropping the caller.
    pub fn detached() -> Self {
        SynthContext::new(CancellationToken::new())
    }

    pub fn ensure_active(&self) -> Result<()> {
        if self.token.is_cancelled() {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Races a cloud call against cancellation. The in-flight call is
    /// dropped on cancellation; no compensation is attempted.
    pub async fn guard<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(SyncError::Cancelled),
            result = fut => result,
        }
    }

    /// Cancellable sleep for the bounded retry loops.
    pub async fn sleep(&self, duration: Duration) -> Result<()> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(SyncError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }

    pub fn record_load_balancer_arn<I: Into<String>, A: Into<String>>(
        &self,
        resource_id: I,
        arn: A,
    ) {
        self.exports
            .lock()
            .unwrap()
            .load_balancer_arns
            .insert(resource_id.into(), arn.into());
    }

    pub fn load_balancer_arn(&self, resource_id: &str) -> Result<String> {
        self.exports
            .lock()
            .unwrap()
            .load_balancer_arns
            .get(resource_id)
            .cloned()
            .ok_or_else(|| SyncError::UnresolvedReference {
                resource_id: resource_id.to_string(),
            })
    }

    pub fn record_target_group_arn<I: Into<String>, A: Into<String>>(
        &self,
        resource_id: I,
        arn: A,
    ) {
        self.exports
            .lock()
            .unwrap()
            .target_group_arns
            .insert(resource_id.into(), arn.into());
    }

    /// Resolves a target-group reference recorded earlier in this cycle.
    /// Takes the caller-scoped context so cancellation applies even to
    /// reference resolution.
    pub fn target_group_arn(&self, resource_id: &str) -> Result<String> {
        self.ensure_active()?;
        self.exports
            .lock()
            .unwrap()
            .target_group_arns
            .get(resource_id)
            .cloned()
            .ok_or_else(|| SyncError::UnresolvedReference {
                resource_id: resource_id.to_string(),
            })
    }

    pub fn record_listener_arn<I: Into<String>, A: Into<String>>(
        &self,
        lb_resource_id: I,
        port: i64,
        arn: A,
    ) {
        self.exports
            .lock()
            .unwrap()
            .listener_arns
            .insert((lb_resource_id.into(), port), arn.into());
    }

    pub fn listener_arn(&self, lb_resource_id: &str, port: i64) -> Result<String> {
        self.exports
            .lock()
            .unwrap()
            .listener_arns
            .get(&(lb_resource_id.to_string(), port))
            .cloned()
            .ok_or_else(|| SyncError::UnresolvedReference {
                resource_id: format!("{}:{}", lb_resource_id, port),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn guard_returns_cancelled_once_token_fires() {
        let token = CancellationToken::new();
        let ctx = SynthContext::new(token.clone());
        token.cancel();

        let result: Result<()> = ctx.guard(async { Ok(()) }).await;
        match result {
            Err(SyncError::Cancelled) => {}
            other => panic!("expected Cancelled, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn exports_resolve_recorded_arns() {
        let ctx = SynthContext::detached();
        ctx.record_target_group_arn("tg-1", "arn:tg-1");
        ctx.record_listener_arn("lb-1", 443, "arn:listener-1");

        assert_eq!("arn:tg-1", ctx.target_group_arn("tg-1").unwrap());
        assert_eq!("arn:listener-1", ctx.listener_arn("lb-1", 443).unwrap());
        assert!(ctx.target_group_arn("tg-missing").is_err());
    }
}
