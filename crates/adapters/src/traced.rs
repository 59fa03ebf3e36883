// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::power::{PowerBackend, PowerError};
use async_trait::async_trait;
use std::time::Duration;
use tracing::Instrument;

/// Wrapper that adds tracing to any PowerBackend
#[derive(Clone)]
pub struct TracedPowerBackend<P> {
    inner: P,
    /// Place or resource the outlet belongs to, for log context
    target: String,
}

impl<P> TracedPowerBackend<P> {
    pub fn new(inner: P, target: impl Into<String>) -> Self {
        Self {
            inner,
            target: target.into(),
        }
    }
}

impl<P: PowerBackend> TracedPowerBackend<P> {
    async fn switch(
        &self,
        action: &'static str,
        op: impl std::future::Future<Output = Result<(), PowerError>>,
    ) -> Result<(), PowerError> {
        let span = tracing::info_span!("power", action, outlet = %self.target, model = self.inner.model());
        async move {
            tracing::info!("switching");
            let start = std::time::Instant::now();
            let result = op.await;
            let elapsed = start.elapsed();

            match &result {
                Ok(()) => tracing::info!(elapsed_ms = elapsed.as_millis() as u64, "switched"),
                Err(e) => tracing::error!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "switch failed"
                ),
            }

            result
        }
        .instrument(span)
        .await
    }
}

#[async_trait]
impl<P: PowerBackend> PowerBackend for TracedPowerBackend<P> {
    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn on(&self) -> Result<(), PowerError> {
        self.switch("on", self.inner.on()).await
    }

    async fn off(&self) -> Result<(), PowerError> {
        self.switch("off", self.inner.off()).await
    }

    async fn get(&self) -> Result<bool, PowerError> {
        let result = self.inner.get().await;
        tracing::debug!(outlet = %self.target, powered = ?result.as_ref().ok(), "queried power");
        result
    }

    fn cycle_delay(&self) -> Duration {
        self.inner.cycle_delay()
    }

    async fn cycle(&self) -> Result<(), PowerError> {
        self.switch("cycle", self.inner.cycle()).await
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
