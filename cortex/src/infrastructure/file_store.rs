// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! JSON-lines [`PersistentStore`] for single-node deployments.
//!
//! Each record kind lives in `<dir>/<kind>.jsonl`. The whole file is
//! rewritten through a temporary file and an atomic rename on every `put`,
//! which keeps the on-disk copy consistent at the cost of write throughput.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

use super::repository::PersistentStore;
use crate::domain::ScoredRecord;
use crate::error::CortexError;

pub struct JsonFileStore<T: ScoredRecord> {
    path: PathBuf,
    records: DashMap<T::Id, T>,
    write_lock: Mutex<()>,
}

impl<T> JsonFileStore<T>
where
    T: ScoredRecord + Serialize + DeserializeOwned,
{
    /// Open (or create) the store for `T` under `dir`.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, CortexError> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| CortexError::Persistence(format!("create {}: {}", dir.display(), e)))?;

        let path = dir.join(format!("{}.jsonl", T::KIND));
        let records = DashMap::new();

        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                for (line_no, line) in content.lines().enumerate() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let record: T = serde_json::from_str(line).map_err(|e| {
                        CortexError::Persistence(format!("{}:{}: {}", path.display(), line_no + 1, e))
                    })?;
                    records.insert(record.id(), record);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(CortexError::Persistence(format!("read {}: {}", path.display(), e)));
            }
        }

        debug!(kind = T::KIND, path = %path.display(), count = records.len(), "Opened file store");
        Ok(Self {
            path,
            records,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self) -> Result<(), CortexError> {
        let mut lines = Vec::with_capacity(self.records.len());
        for entry in self.records.iter() {
            let line = serde_json::to_string(entry.value())
                .map_err(|e| CortexError::Persistence(e.to_string()))?;
            lines.push(line);
        }
        lines.sort();
        let mut body = lines.join("\n");
        body.push('\n');

        let tmp = self.path.with_extension("jsonl.tmp");
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| CortexError::Persistence(format!("write {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| CortexError::Persistence(format!("rename {}: {}", self.path.display(), e)))
    }
}

#[async_trait]
impl<T> PersistentStore<T> for JsonFileStore<T>
where
    T: ScoredRecord + Serialize + DeserializeOwned,
{
    async fn put(&self, record: &T) -> Result<(), CortexError> {
        let _guard = self.write_lock.lock().await;
        let previous = self.records.insert(record.id(), record.clone());
        if let Err(e) = self.flush().await {
            match previous {
                Some(previous) => self.records.insert(record.id(), previous),
                None => self.records.remove(&record.id()).map(|(_, r)| r),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn get(&self, id: T::Id) -> Result<Option<T>, CortexError> {
        Ok(self.records.get(&id).map(|r| r.value().clone()))
    }

    async fn scan(&self) -> Result<Vec<T>, CortexError> {
        Ok(self.records.iter().map(|r| r.value().clone()).collect())
    }
}
