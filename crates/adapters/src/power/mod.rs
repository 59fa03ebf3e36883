// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Power switching backends
//!
//! A power resource names its backend with a `model` parameter. The set of
//! models is fixed at compile time; [`backend_for`] picks the implementation
//! when the resource is resolved, so an unknown model fails before any
//! switching is attempted.

mod external;

pub use external::ExternalPowerBackend;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakePowerBackend, PowerCall};

use async_trait::async_trait;
use lg_core::Params;
use std::time::Duration;
use thiserror::Error;

/// Pause between off and on in the default `cycle`
pub const DEFAULT_CYCLE_DELAY: Duration = Duration::from_secs(2);

/// Errors from power operations
#[derive(Debug, Error)]
pub enum PowerError {
    #[error("unknown power model '{0}' (known: {models})", models = MODELS.join(", "))]
    UnknownModel(String),
    #[error("power model '{model}' requires parameter '{param}'")]
    MissingParam { model: String, param: String },
    #[error("invalid power parameter '{param}': {reason}")]
    InvalidParam { param: String, reason: String },
    #[error("power model '{model}' does not support '{action}'")]
    Unsupported { model: String, action: String },
    #[error("command failed: {0}")]
    CommandFailed(String),
}

/// A switchable power outlet
#[async_trait]
pub trait PowerBackend: Send + Sync {
    /// Model tag this backend was built for
    fn model(&self) -> &str;

    async fn on(&self) -> Result<(), PowerError>;

    async fn off(&self) -> Result<(), PowerError>;

    /// Current state; `true` means powered
    async fn get(&self) -> Result<bool, PowerError>;

    /// Pause used by the default `cycle`
    fn cycle_delay(&self) -> Duration {
        DEFAULT_CYCLE_DELAY
    }

    /// Off, wait, on
    async fn cycle(&self) -> Result<(), PowerError> {
        self.off().await?;
        tokio::time::sleep(self.cycle_delay()).await;
        self.on().await
    }
}

#[async_trait]
impl<P: PowerBackend + ?Sized> PowerBackend for Box<P> {
    fn model(&self) -> &str {
        (**self).model()
    }

    async fn on(&self) -> Result<(), PowerError> {
        (**self).on().await
    }

    async fn off(&self) -> Result<(), PowerError> {
        (**self).off().await
    }

    async fn get(&self) -> Result<bool, PowerError> {
        (**self).get().await
    }

    fn cycle_delay(&self) -> Duration {
        (**self).cycle_delay()
    }

    async fn cycle(&self) -> Result<(), PowerError> {
        (**self).cycle().await
    }
}

/// Model tags accepted by [`backend_for`]
#[cfg(not(any(test, feature = "test-support")))]
pub const MODELS: &[&str] = &[ExternalPowerBackend::MODEL];
#[cfg(any(test, feature = "test-support"))]
pub const MODELS: &[&str] = &[ExternalPowerBackend::MODEL, FakePowerBackend::MODEL];

/// Build the backend for a power resource's `model` and parameters
pub fn backend_for(model: &str, params: &Params) -> Result<Box<dyn PowerBackend>, PowerError> {
    match model {
        ExternalPowerBackend::MODEL => Ok(Box::new(ExternalPowerBackend::from_params(params)?)),
        #[cfg(any(test, feature = "test-support"))]
        FakePowerBackend::MODEL => Ok(Box::new(FakePowerBackend::from_params(params))),
        other => Err(PowerError::UnknownModel(other.to_string())),
    }
}

/// Fetch a string parameter
pub(crate) fn str_param<'a>(params: &'a Params, name: &str) -> Option<&'a str> {
    params.get(name).and_then(|v| v.as_str())
}

/// Fetch an optional duration given in (fractional) seconds
pub(crate) fn seconds_param(params: &Params, name: &str) -> Result<Option<Duration>, PowerError> {
    let Some(value) = params.get(name) else {
        return Ok(None);
    };
    let invalid = |reason: &str| PowerError::InvalidParam {
        param: name.to_string(),
        reason: reason.to_string(),
    };
    let seconds = value
        .as_f64()
        .ok_or_else(|| invalid("expected a number of seconds"))?;
    Duration::try_from_secs_f64(seconds)
        .map(Some)
        .map_err(|_| invalid("must be a non-negative number of seconds"))
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
