// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake power backend for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{PowerBackend, PowerError};
use async_trait::async_trait;
use lg_core::Params;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Recorded power call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PowerCall {
    On,
    Off,
    Get,
}

#[derive(Default)]
struct FakeState {
    powered: bool,
    calls: Vec<PowerCall>,
    fail: Option<String>,
}

/// In-memory outlet that records every call
#[derive(Clone, Default)]
pub struct FakePowerBackend {
    state: Arc<Mutex<FakeState>>,
}

impl FakePowerBackend {
    pub const MODEL: &'static str = "fake";

    pub fn new() -> Self {
        Self::default()
    }

    /// `powered = true` starts the outlet switched on
    pub fn from_params(params: &Params) -> Self {
        let fake = Self::new();
        let powered = params
            .get("powered")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        fake.state.lock().unwrap_or_else(|e| e.into_inner()).powered = powered;
        fake
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<PowerCall> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .calls
            .clone()
    }

    pub fn is_powered(&self) -> bool {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).powered
    }

    /// Make every following call fail with `message`
    pub fn fail_with(&self, message: impl Into<String>) {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).fail = Some(message.into());
    }

    fn record(&self, call: PowerCall, set: Option<bool>) -> Result<bool, PowerError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.calls.push(call);
        if let Some(message) = &state.fail {
            return Err(PowerError::CommandFailed(message.clone()));
        }
        if let Some(powered) = set {
            state.powered = powered;
        }
        Ok(state.powered)
    }
}

#[async_trait]
impl PowerBackend for FakePowerBackend {
    fn model(&self) -> &str {
        Self::MODEL
    }

    async fn on(&self) -> Result<(), PowerError> {
        self.record(PowerCall::On, Some(true)).map(|_| ())
    }

    async fn off(&self) -> Result<(), PowerError> {
        self.record(PowerCall::Off, Some(false)).map(|_| ())
    }

    async fn get(&self) -> Result<bool, PowerError> {
        self.record(PowerCall::Get, None)
    }

    fn cycle_delay(&self) -> Duration {
        Duration::ZERO
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
