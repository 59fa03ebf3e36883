// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Power switching through site-specific shell commands

use super::{seconds_param, str_param, PowerBackend, PowerError, DEFAULT_CYCLE_DELAY};
use async_trait::async_trait;
use lg_core::Params;
use std::time::Duration;
use tokio::process::Command;

/// Runs `cmd_on` / `cmd_off` / `cmd_get` with `sh -c`
///
/// `cmd_get` must print `on`/`off` (or `1`/`0`). An optional `cmd_cycle`
/// replaces the default off-delay-on sequence.
#[derive(Debug, Clone)]
pub struct ExternalPowerBackend {
    cmd_on: String,
    cmd_off: String,
    cmd_get: Option<String>,
    cmd_cycle: Option<String>,
    delay: Duration,
}

impl ExternalPowerBackend {
    pub const MODEL: &'static str = "external";

    pub fn new(cmd_on: impl Into<String>, cmd_off: impl Into<String>) -> Self {
        Self {
            cmd_on: cmd_on.into(),
            cmd_off: cmd_off.into(),
            cmd_get: None,
            cmd_cycle: None,
            delay: DEFAULT_CYCLE_DELAY,
        }
    }

    pub fn with_get(mut self, cmd_get: impl Into<String>) -> Self {
        self.cmd_get = Some(cmd_get.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn from_params(params: &Params) -> Result<Self, PowerError> {
        let required = |param: &str| {
            str_param(params, param)
                .map(str::to_string)
                .ok_or_else(|| PowerError::MissingParam {
                    model: Self::MODEL.to_string(),
                    param: param.to_string(),
                })
        };
        Ok(Self {
            cmd_on: required("cmd_on")?,
            cmd_off: required("cmd_off")?,
            cmd_get: str_param(params, "cmd_get").map(str::to_string),
            cmd_cycle: str_param(params, "cmd_cycle").map(str::to_string),
            delay: seconds_param(params, "delay")?.unwrap_or(DEFAULT_CYCLE_DELAY),
        })
    }

    async fn run(cmd: &str) -> Result<String, PowerError> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(cmd)
            .output()
            .await
            .map_err(|e| PowerError::CommandFailed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PowerError::CommandFailed(format!(
                "`{}` exited with {}: {}",
                cmd,
                output.status,
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl PowerBackend for ExternalPowerBackend {
    fn model(&self) -> &str {
        Self::MODEL
    }

    async fn on(&self) -> Result<(), PowerError> {
        Self::run(&self.cmd_on).await.map(|_| ())
    }

    async fn off(&self) -> Result<(), PowerError> {
        Self::run(&self.cmd_off).await.map(|_| ())
    }

    async fn get(&self) -> Result<bool, PowerError> {
        let Some(cmd) = &self.cmd_get else {
            return Err(PowerError::Unsupported {
                model: Self::MODEL.to_string(),
                action: "get".to_string(),
            });
        };
        let stdout = Self::run(cmd).await?;
        match stdout.trim().to_ascii_lowercase().as_str() {
            "on" | "1" | "true" => Ok(true),
            "off" | "0" | "false" => Ok(false),
            other => Err(PowerError::CommandFailed(format!(
                "`{}` printed '{}', expected on or off",
                cmd, other
            ))),
        }
    }

    fn cycle_delay(&self) -> Duration {
        self.delay
    }

    async fn cycle(&self) -> Result<(), PowerError> {
        if let Some(cmd) = &self.cmd_cycle {
            return Self::run(cmd).await.map(|_| ());
        }
        self.off().await?;
        tokio::time::sleep(self.delay).await;
        self.on().await
    }
}

#[cfg(test)]
#[path = "external_tests.rs"]
mod tests;
