use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{ProbeError, Result};

pub const UNKNOWN_ADDRESS: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRequest {
    pub host: String,
    pub count: u32,
    pub timeout_ms: u64,
}

impl ProbeRequest {
    pub fn new(host: impl Into<String>, count: u32, timeout_ms: u64) -> Result<Self> {
        if count == 0 {
            return Err(ProbeError::InvalidRequest("count must be at least 1"));
        }
        if timeout_ms == 0 {
            return Err(ProbeError::InvalidRequest("timeout must be at least 1 ms"));
        }
        Ok(Self {
            host: host.into().trim().to_string(),
            count,
            timeout_ms,
        })
    }

    /// Wall-clock budget for the whole probe: `count * timeout + 5s`.
    pub fn overall_timeout_secs(&self) -> f64 {
        self.count as f64 * (self.timeout_ms as f64 / 1000.0) + 5.0
    }

    /// `overall_timeout_secs` as a `Duration`, saturating at `Duration::MAX`.
    pub fn overall_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.overall_timeout_secs()).unwrap_or(Duration::MAX)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub reachable: bool,
    pub resolved_address: String,
    pub average_latency_ms: Option<u64>,
    /// Usually in `0..=100`; the sample-count fallback can go negative when
    /// more replies were parsed than requested.
    pub packet_loss_percent: Option<i32>,
    pub raw_output: String,
}

impl ProbeResult {
    pub fn failure(resolved_address: Option<String>, raw_output: String) -> Self {
        Self {
            reachable: false,
            resolved_address: resolved_address.unwrap_or_else(|| UNKNOWN_ADDRESS.to_string()),
            average_latency_ms: None,
            packet_loss_percent: None,
            raw_output,
        }
    }

    pub fn status_symbol(&self) -> &'static str {
        if self.reachable { "✅" } else { "❌" }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformKind {
    Windows,
    Posix,
}

impl PlatformKind {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            PlatformKind::Windows
        } else {
            PlatformKind::Posix
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeStatistics {
    pub total_probes: u64,
    pub reachable_probes: u64,
    pub unreachable_probes: u64,
    pub mean_latency_ms: Option<f64>,
    pub mean_loss_percent: Option<f64>,
}

impl ProbeStatistics {
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a ProbeResult>) -> Self {
        let mut stats = ProbeStatistics::default();
        let mut latency_sum = 0u64;
        let mut latency_count = 0u64;
        let mut loss_sum = 0i64;
        let mut loss_count = 0u64;

        for result in results {
            stats.total_probes += 1;
            if result.reachable {
                stats.reachable_probes += 1;
            }
            if let Some(avg) = result.average_latency_ms {
                latency_sum += avg;
                latency_count += 1;
            }
            if let Some(loss) = result.packet_loss_percent {
                loss_sum += loss as i64;
                loss_count += 1;
            }
        }

        stats.unreachable_probes = stats.total_probes - stats.reachable_probes;
        stats.mean_latency_ms = (latency_count > 0).then(|| latency_sum as f64 / latency_count as f64);
        stats.mean_loss_percent = (loss_count > 0).then(|| loss_sum as f64 / loss_count as f64);
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(reachable: bool, avg: Option<u64>, loss: Option<i32>) -> ProbeResult {
        ProbeResult {
            reachable,
            resolved_address: UNKNOWN_ADDRESS.to_string(),
            average_latency_ms: avg,
            packet_loss_percent: loss,
            raw_output: String::new(),
        }
    }

    #[test]
    fn request_rejects_zero_count_and_timeout() {
        assert!(matches!(ProbeRequest::new("a", 0, 1000), Err(ProbeError::InvalidRequest(_))));
        assert!(matches!(ProbeRequest::new("a", 1, 0), Err(ProbeError::InvalidRequest(_))));
    }

    #[test]
    fn request_trims_host() {
        let req = ProbeRequest::new("  example.com ", 4, 2000).unwrap();
        assert_eq!(req.host, "example.com");
    }

    #[test]
    fn overall_timeout_adds_grace_period() {
        let req = ProbeRequest::new("a", 4, 2000).unwrap();
        assert_eq!(req.overall_timeout_secs(), 13.0);
        let req = ProbeRequest::new("a", 3, 500).unwrap();
        assert_eq!(req.overall_timeout_secs(), 6.5);
        assert_eq!(req.overall_timeout(), Duration::from_millis(6500));
    }

    #[test]
    fn huge_request_timeout_saturates() {
        let req = ProbeRequest::new("a", u32::MAX, u64::MAX).unwrap();
        assert_eq!(req.overall_timeout(), Duration::MAX);
    }

    #[test]
    fn failure_is_unreachable_with_unknown_address() {
        let r = ProbeResult::failure(None, "ERROR: boom".into());
        assert!(!r.reachable);
        assert_eq!(r.resolved_address, UNKNOWN_ADDRESS);
        assert_eq!(r.average_latency_ms, None);
        assert_eq!(r.packet_loss_percent, None);
        assert_eq!(r.status_symbol(), "❌");
    }

    #[test]
    fn statistics_over_mixed_results() {
        let results = vec![
            result(true, Some(10), Some(0)),
            result(true, Some(20), Some(50)),
            result(false, None, Some(100)),
            result(false, None, None),
        ];
        let stats = ProbeStatistics::from_results(&results);
        assert_eq!(stats.total_probes, 4);
        assert_eq!(stats.reachable_probes, 2);
        assert_eq!(stats.unreachable_probes, 2);
        assert_eq!(stats.mean_latency_ms, Some(15.0));
        assert_eq!(stats.mean_loss_percent, Some(50.0));
    }

    #[test]
    fn statistics_of_nothing_are_empty() {
        let stats = ProbeStatistics::from_results(&Vec::<ProbeResult>::new());
        assert_eq!(stats, ProbeStatistics::default());
    }

    #[test]
    fn result_serializes_camel_case() {
        let json = serde_json::to_value(result(true, Some(12), Some(0))).unwrap();
        assert_eq!(json["averageLatencyMs"], 12);
        assert_eq!(json["packetLossPercent"], 0);
        assert_eq!(json["resolvedAddress"], "unknown");
    }
}
