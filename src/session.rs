use std::sync::{Arc, Mutex, MutexGuard};
use log::info;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::config::AppConfig;
use crate::error::{ProbeError, Result};
use crate::history::{HistoryEntry, ProbeHistory};
use crate::ping::{ProbeRequest, ProbeStatistics};
use crate::ping_executor::PingExecutor;

/// Runs probes in the background, one at a time, and keeps their history.
pub struct ProbeSession {
    executor: Arc<PingExecutor>,
    history: Arc<Mutex<ProbeHistory>>,
    in_flight: Arc<Semaphore>,
}

impl ProbeSession {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_executor(PingExecutor::new(config), config.history_capacity)
    }

    pub fn with_executor(executor: PingExecutor, history_capacity: usize) -> Self {
        Self {
            executor: Arc::new(executor),
            history: Arc::new(Mutex::new(ProbeHistory::new(history_capacity))),
            in_flight: Arc::new(Semaphore::new(1)),
        }
    }

    pub fn executor(&self) -> &PingExecutor {
        &self.executor
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.available_permits() == 0
    }

    /// Starts a probe on the runtime. Fails with `Busy` instead of queueing
    /// when another probe from this session has not finished yet.
    pub fn submit(&self, request: ProbeRequest) -> Result<JoinHandle<HistoryEntry>> {
        let permit = Arc::clone(&self.in_flight)
            .try_acquire_owned()
            .map_err(|_| ProbeError::Busy)?;
        let executor = Arc::clone(&self.executor);
        let history = Arc::clone(&self.history);

        info!("probing {} ({} x {} ms)", request.host, request.count, request.timeout_ms);
        Ok(tokio::spawn(async move {
            let result = executor.probe(&request).await;
            let entry = HistoryEntry::new(request.host, result);
            lock(&history).push(entry.clone());
            drop(permit);
            entry
        }))
    }

    /// Snapshot of the history, newest first.
    pub fn history(&self) -> Vec<HistoryEntry> {
        lock(&self.history).iter().cloned().collect()
    }

    pub fn clear_history(&self) {
        lock(&self.history).clear();
        info!("history cleared");
    }

    pub fn statistics(&self) -> ProbeStatistics {
        lock(&self.history).statistics()
    }
}

fn lock(history: &Mutex<ProbeHistory>) -> MutexGuard<'_, ProbeHistory> {
    history.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(capacity: usize) -> ProbeSession {
        ProbeSession::with_executor(PingExecutor::new(&AppConfig::default()), capacity)
    }

    #[tokio::test]
    async fn finished_probe_is_recorded_newest_first() {
        let session = session(2);
        for host in ["-a", "-b", "-c"] {
            let request = ProbeRequest::new(host, 1, 1000).unwrap();
            let entry = session.submit(request).unwrap().await.unwrap();
            assert_eq!(entry.host, host);
            assert!(!entry.result.reachable);
        }

        let hosts: Vec<String> = session.history().into_iter().map(|e| e.host).collect();
        assert_eq!(hosts, vec!["-c", "-b"]);
        assert_eq!(session.statistics().unreachable_probes, 2);
        assert!(!session.is_busy());

        session.clear_history();
        assert!(session.history().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn second_submit_while_running_is_busy() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("slow-ping");
        std::fs::write(&script, "#!/bin/sh\nsleep 1\necho 'time=1ms'\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        let config = AppConfig {
            utility: script.display().to_string(),
            ..AppConfig::default()
        };
        let session = ProbeSession::with_executor(
            PingExecutor::with_platform(&config, crate::ping::PlatformKind::Posix),
            10,
        );

        let first = session.submit(ProbeRequest::new("127.0.0.1", 1, 1000).unwrap()).unwrap();
        assert!(session.is_busy());
        let second = session.submit(ProbeRequest::new("127.0.0.1", 1, 1000).unwrap());
        assert!(matches!(second, Err(ProbeError::Busy)));

        let entry = first.await.unwrap();
        assert!(entry.result.reachable);
        assert!(!session.is_busy());
        assert!(session.submit(ProbeRequest::new("-x", 1, 1000).unwrap()).is_ok());
    }
}
