// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Background workspace indexing
//!
//! Files are discovered with `walkdir`, queued on a bounded channel and
//! extracted by a fixed pool of workers. Results are applied to the
//! [`SymbolIndex`] in batches, yielding to the runtime between batches so
//! interactive requests keep being served during a long scan.

use super::extractor::DocumentSymbolExtractor;
use super::index::{SymbolEntry, SymbolIndex};
use crate::config::IndexConfig;
use crate::error::{IntellisenseError, Result};
use log::{debug, info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::sync::{Mutex, mpsc};
use url::Url;
use walkdir::WalkDir;

/// Shared flag checked before each indexing task
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Summary of one indexing run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexReport {
    pub files_indexed: usize,
    pub files_failed: usize,
    pub symbols: usize,
    pub cancelled: bool,
}

impl IndexReport {
    fn record(&mut self, index: &SymbolIndex, outcome: FileOutcome) {
        match outcome.result {
            Ok(symbols) => {
                self.files_indexed += 1;
                self.symbols += symbols.len();
                index.update_file(&outcome.uri, symbols);
            }
            Err(err) => {
                self.files_failed += 1;
                warn!("skipping {}: {err}", outcome.uri);
            }
        }
    }
}

struct FileOutcome {
    uri: String,
    result: Result<Vec<SymbolEntry>>,
}

/// `file://` URI of a path, falling back to the plain path
pub fn file_uri(path: &Path) -> String {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    Url::from_file_path(&absolute)
        .map(|url| url.to_string())
        .unwrap_or_else(|()| absolute.display().to_string())
}

fn discover_blocking(root: &Path, config: &IndexConfig) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(root)
        .max_depth(config.max_depth)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("cannot read workspace entry: {err}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && config.matches(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    paths.sort();
    paths
}

async fn index_one(extractor: &DocumentSymbolExtractor, path: &Path) -> FileOutcome {
    let uri = file_uri(path);
    let result = match tokio::fs::read_to_string(path).await {
        Ok(text) => extractor.extract(&uri, &text).await,
        Err(err) => Err(IntellisenseError::io(path, err)),
    };
    FileOutcome { uri, result }
}

/// Populates a [`SymbolIndex`] from the files of a workspace
#[derive(Debug, Clone)]
pub struct WorkspaceIndexer {
    index: Arc<SymbolIndex>,
    extractor: Arc<DocumentSymbolExtractor>,
    config: IndexConfig,
}

impl WorkspaceIndexer {
    pub fn new(index: Arc<SymbolIndex>, extractor: Arc<DocumentSymbolExtractor>, config: IndexConfig) -> Self {
        Self {
            index,
            extractor,
            config,
        }
    }

    /// Indexable files under `root`, sorted
    ///
    /// The directory walk runs on the blocking pool; a failed walk is logged
    /// and yields no files.
    pub async fn discover(&self, root: &Path) -> Vec<PathBuf> {
        let root = root.to_path_buf();
        let config = self.config.clone();
        tokio::task::spawn_blocking(move || discover_blocking(&root, &config))
            .await
            .unwrap_or_else(|err| {
                warn!("workspace scan failed: {err}");
                Vec::new()
            })
    }

    /// Index every file under `root` on the worker pool
    ///
    /// Cancellation stops new tasks from starting; files already extracted
    /// are still applied.
    pub async fn index_workspace(&self, root: &Path, cancel: &CancellationFlag) -> IndexReport {
        let started = Instant::now();
        let paths = self.discover(root).await;
        let total = paths.len();
        let capacity = self.config.queue_capacity.max(1);

        let (task_tx, task_rx) = mpsc::channel::<PathBuf>(capacity);
        let (result_tx, mut result_rx) = mpsc::channel::<FileOutcome>(capacity);
        let task_rx = Arc::new(Mutex::new(task_rx));

        let producer = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                for path in paths {
                    if cancel.is_cancelled() || task_tx.send(path).await.is_err() {
                        break;
                    }
                }
            })
        };

        let workers: Vec<_> = (0..self.config.worker_count.max(1))
            .map(|worker| {
                let task_rx = Arc::clone(&task_rx);
                let result_tx = result_tx.clone();
                let extractor = Arc::clone(&self.extractor);
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    loop {
                        let next = task_rx.lock().await.recv().await;
                        let Some(path) = next else { break };
                        if cancel.is_cancelled() {
                            debug!("worker {worker}: cancelled before {}", path.display());
                            continue;
                        }
                        let outcome = index_one(&extractor, &path).await;
                        if result_tx.send(outcome).await.is_err() {
                            break;
                        }
                    }
                })
            })
            .collect();
        drop(result_tx);

        let batch_size = self.config.batch_size.max(1);
        let mut report = IndexReport::default();
        let mut batch = Vec::with_capacity(batch_size);
        while let Some(outcome) = result_rx.recv().await {
            batch.push(outcome);
            if batch.len() >= batch_size {
                for outcome in batch.drain(..) {
                    report.record(&self.index, outcome);
                }
                tokio::task::yield_now().await;
            }
        }
        for outcome in batch {
            report.record(&self.index, outcome);
        }

        if let Err(err) = producer.await {
            warn!("indexing producer failed: {err}");
        }
        for worker in workers {
            if let Err(err) = worker.await {
                warn!("indexing worker failed: {err}");
            }
        }

        report.cancelled = cancel.is_cancelled();
        info!(
            "indexed {}/{total} files ({} failed, {} symbols) under {} in {:?}{}",
            report.files_indexed,
            report.files_failed,
            report.symbols,
            root.display(),
            started.elapsed(),
            if report.cancelled { ", cancelled" } else { "" }
        );
        report
    }

    /// Index every file under `root` one at a time on the calling task
    ///
    /// Used where a worker pool is unwanted, such as single-threaded hosts.
    /// Only the directory walk leaves the calling task.
    pub async fn index_sync(&self, root: &Path) -> IndexReport {
        let mut report = IndexReport::default();
        for path in self.discover(root).await {
            let outcome = index_one(&self.extractor, &path).await;
            report.record(&self.index, outcome);
        }
        info!(
            "indexed {} files ({} failed) under {} without workers",
            report.files_indexed,
            report.files_failed,
            root.display()
        );
        report
    }
}
