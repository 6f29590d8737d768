use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::models::RejectionRecord;
use crate::services::titles;

/// Snapshot of the memory to be written to disk
struct PersistMessage {
    records: Vec<RejectionRecord>,
}

/// Handle for gracefully shutting down the rejection writer
pub struct RejectionWriterHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl RejectionWriterHandle {
    /// Signals the writer to flush pending snapshots and stop
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tracing::info!("Rejection writer shutdown signal sent");
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Rejection writer terminated abnormally");
        }
    }
}

/// Bounded record of the most recently rejected titles
///
/// Used as a soft negative filter: consulted before accepting a suggestion
/// and fed to the discovery prompt. Inserting at capacity evicts the oldest
/// record. When created with [`RejectionMemory::load`], every change is
/// persisted by a background writer task so the memory survives restarts.
pub struct RejectionMemory {
    capacity: usize,
    records: Mutex<VecDeque<RejectionRecord>>,
    persist_tx: Option<mpsc::UnboundedSender<PersistMessage>>,
}

impl RejectionMemory {
    /// Creates a memory that is never written to disk
    pub fn in_memory(capacity: usize) -> Self {
        Self {
            capacity,
            records: Mutex::new(VecDeque::with_capacity(capacity)),
            persist_tx: None,
        }
    }

    /// Loads retained rejections from `path` and spawns the writer task
    ///
    /// A missing or unreadable file starts an empty memory.
    pub async fn load(path: impl Into<PathBuf>, capacity: usize) -> (Self, RejectionWriterHandle) {
        let path = path.into();
        let mut records = read_records(&path).await;
        if records.len() > capacity {
            records.drain(..records.len() - capacity);
        }

        tracing::info!(
            path = %path.display(),
            retained = records.len(),
            capacity,
            "Loaded recent rejections"
        );

        let (persist_tx, persist_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let task = tokio::spawn(async move {
            Self::writer_task(path, persist_rx, shutdown_rx).await;
        });

        let memory = Self {
            capacity,
            records: Mutex::new(records.into()),
            persist_tx: Some(persist_tx),
        };

        (memory, RejectionWriterHandle { shutdown_tx, task })
    }

    /// Background task writing snapshots as they arrive
    ///
    /// Each message is a full snapshot, so on shutdown only the newest
    /// pending one needs to reach disk.
    async fn writer_task(
        path: PathBuf,
        mut persist_rx: mpsc::UnboundedReceiver<PersistMessage>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::debug!(path = %path.display(), "Rejection writer task started");

        loop {
            tokio::select! {
                Some(msg) = persist_rx.recv() => {
                    write_records(&path, &msg.records).await;
                }
                _ = shutdown_rx.recv() => {
                    let mut latest = None;
                    while let Ok(msg) = persist_rx.try_recv() {
                        latest = Some(msg);
                    }
                    if let Some(msg) = latest {
                        write_records(&path, &msg.records).await;
                    }
                    tracing::info!("Rejection writer task stopped");
                    break;
                }
                else => break,
            }
        }
    }

    /// Appends a rejection, evicting the oldest entry when full
    pub async fn record(&self, title: &str, reason: &str) {
        if self.capacity == 0 {
            return;
        }

        let snapshot = {
            let mut records = self.records.lock().await;
            while records.len() >= self.capacity {
                records.pop_front();
            }
            records.push_back(RejectionRecord {
                title: title.to_string(),
                normalized: titles::normalize(title),
                reason: Some(reason.to_string()),
            });
            tracing::info!(
                title = %title,
                reason = %reason,
                retained = records.len(),
                "Recorded rejection"
            );
            records.iter().cloned().collect::<Vec<_>>()
        };

        if let Some(tx) = &self.persist_tx {
            if let Err(e) = tx.send(PersistMessage { records: snapshot }) {
                tracing::error!(error = %e, "Failed to queue rejection snapshot");
            }
        }
    }

    /// Finds a retained rejection with the same normalized key
    pub async fn find(&self, normalized: &str) -> Option<RejectionRecord> {
        self.records
            .lock()
            .await
            .iter()
            .rev()
            .find(|r| r.normalized == normalized)
            .cloned()
    }

    /// Retained titles, oldest first
    pub async fn titles(&self) -> Vec<String> {
        self.records
            .lock()
            .await
            .iter()
            .map(|r| r.title.clone())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

async fn read_records(path: &Path) -> Vec<RejectionRecord> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            tracing::error!(error = %e, path = %path.display(), "Error loading recent rejections");
            return Vec::new();
        }
    };

    serde_json::from_str(&raw).unwrap_or_else(|e| {
        tracing::error!(error = %e, path = %path.display(), "Error parsing recent rejections");
        Vec::new()
    })
}

async fn write_records(path: &Path, records: &[RejectionRecord]) {
    let json = match serde_json::to_string(records) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(error = %e, "Rejection serialization error");
            return;
        }
    };

    if let Some(parent) = path.parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            tracing::error!(error = %e, path = %parent.display(), "Failed to create rejection directory");
            return;
        }
    }

    if let Err(e) = tokio::fs::write(path, json).await {
        tracing::error!(error = %e, path = %path.display(), "Error saving recent rejections");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_record_and_find() {
        let memory = RejectionMemory::in_memory(5);
        memory.record("The Matrix (1999)", "exists in watched").await;

        let found = memory.find("matrix 1999").await.unwrap();
        assert_eq!(found.title, "The Matrix (1999)");
        assert_eq!(found.reason.as_deref(), Some("exists in watched"));
        assert!(memory.find("matrix 2003").await.is_none());
    }

    #[tokio::test]
    async fn test_eviction_keeps_most_recent() {
        let memory = RejectionMemory::in_memory(3);
        for title in ["A1 (2001)", "B2 (2002)", "C3 (2003)", "D4 (2004)"] {
            memory.record(title, "test").await;
        }

        assert_eq!(memory.len().await, 3);
        assert_eq!(
            memory.titles().await,
            vec!["B2 (2002)", "C3 (2003)", "D4 (2004)"]
        );
        assert!(memory.find("a1 2001").await.is_none());
    }

    #[tokio::test]
    async fn test_zero_capacity_retains_nothing() {
        let memory = RejectionMemory::in_memory(0);
        memory.record("Heat (1995)", "test").await;
        assert!(memory.is_empty().await);
    }

    #[tokio::test]
    async fn test_persists_across_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("rejects.json");

        let (memory, handle) = RejectionMemory::load(&path, 2).await;
        memory.record("Heat (1995)", "exists in watched").await;
        memory.record("Ronin (1998)", "similar exists in undecided").await;
        memory.record("Thief (1981)", "exists in suggestion queue").await;
        handle.shutdown().await;

        let mut reloaded = None;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let (memory, _handle) = RejectionMemory::load(&path, 2).await;
            if memory.titles().await == vec!["Ronin (1998)", "Thief (1981)"] {
                reloaded = Some(memory);
                break;
            }
        }

        let reloaded = reloaded.expect("rejections were not persisted");
        assert_eq!(reloaded.find("thief 1981").await.unwrap().reason.as_deref(), Some("exists in suggestion queue"));
    }

    #[tokio::test]
    async fn test_load_trims_to_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rejects.json");
        let records: Vec<RejectionRecord> = (0..4)
            .map(|i| RejectionRecord {
                title: format!("Movie {}", i),
                normalized: format!("movie {}", i),
                reason: None,
            })
            .collect();
        std::fs::write(&path, serde_json::to_string(&records).unwrap()).unwrap();

        let (memory, _handle) = RejectionMemory::load(&path, 2).await;
        assert_eq!(memory.titles().await, vec!["Movie 2", "Movie 3"]);
    }

    #[tokio::test]
    async fn test_load_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rejects.json");
        std::fs::write(&path, "not json").unwrap();

        let (memory, _handle) = RejectionMemory::load(&path, 5).await;
        assert!(memory.is_empty().await);
    }
}
