// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable place definitions rebuilt from WAL replay

use crate::wal::{Wal, WalError};
use lg_core::{Operation, Registry};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to create state directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Wal(#[from] WalError),
}

/// Outcome of replaying the log into a registry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    pub applied: usize,
    pub skipped: usize,
    pub places: usize,
}

/// Persists administrative place operations
pub struct PlaceStore {
    path: PathBuf,
    wal: Wal,
}

impl PlaceStore {
    pub const FILE_NAME: &'static str = "places.wal";

    /// Replay the log in `dir` into `registry`, compact it, and open it for
    /// appending
    pub fn open(dir: &Path, registry: &mut Registry) -> Result<(Self, ReplayReport), StoreError> {
        std::fs::create_dir_all(dir).map_err(|source| StoreError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = dir.join(Self::FILE_NAME);

        let mut report = ReplayReport::default();
        for op in Wal::replay(&path)? {
            match op.apply(registry) {
                Ok(_) => report.applied += 1,
                Err(e) => {
                    // Only valid operations are logged, so this means the
                    // file was edited by hand
                    tracing::warn!(?op, error = %e, "skipping WAL entry");
                    report.skipped += 1;
                }
            }
        }
        report.places = registry.places().len();

        let compacted: Vec<Operation> = registry
            .places()
            .values()
            .flat_map(Operation::recreate)
            .collect();
        Wal::rewrite(&path, &compacted)?;
        tracing::info!(
            applied = report.applied,
            skipped = report.skipped,
            places = report.places,
            "replayed place store"
        );

        let wal = Wal::open(&path)?;
        Ok((Self { path, wal }, report))
    }

    /// Append a committed operation
    pub fn record(&mut self, op: &Operation) -> Result<u64, WalError> {
        self.wal.append(op)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
