use std::collections::VecDeque;
use chrono::{DateTime, Local};
use serde::Serialize;

use crate::ping::{ProbeResult, ProbeStatistics};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub recorded_at: DateTime<Local>,
    pub host: String,
    pub result: ProbeResult,
}

impl HistoryEntry {
    pub fn new(host: impl Into<String>, result: ProbeResult) -> Self {
        Self {
            recorded_at: Local::now(),
            host: host.into(),
            result,
        }
    }
}

/// Most recent probes, newest first. Holds at most `capacity` entries.
#[derive(Debug)]
pub struct ProbeHistory {
    capacity: usize,
    entries: VecDeque<HistoryEntry>,
}

impl ProbeHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    /// Records an entry and returns the one evicted to make room, if any.
    pub fn push(&mut self, entry: HistoryEntry) -> Option<HistoryEntry> {
        self.entries.push_front(entry);
        if self.entries.len() > self.capacity {
            self.entries.pop_back()
        } else {
            None
        }
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn statistics(&self) -> ProbeStatistics {
        ProbeStatistics::from_results(self.entries.iter().map(|e| &e.result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(host: &str, reachable: bool) -> HistoryEntry {
        let mut result = ProbeResult::failure(None, String::new());
        result.reachable = reachable;
        HistoryEntry::new(host, result)
    }

    #[test]
    fn newest_first_and_oldest_evicted() {
        let mut history = ProbeHistory::new(2);
        assert!(history.push(entry("a", true)).is_none());
        assert!(history.push(entry("b", true)).is_none());
        let evicted = history.push(entry("c", false)).unwrap();

        assert_eq!(evicted.host, "a");
        let hosts: Vec<&str> = history.iter().map(|e| e.host.as_str()).collect();
        assert_eq!(hosts, vec!["c", "b"]);
        assert_eq!(history.latest().map(|e| e.host.as_str()), Some("c"));
    }

    #[test]
    fn default_capacity_holds_two_hundred() {
        let mut history = ProbeHistory::new(crate::config::MAX_HISTORY);
        for i in 0..250 {
            history.push(entry(&format!("h{i}"), true));
        }
        assert_eq!(history.len(), 200);
        assert_eq!(history.latest().map(|e| e.host.as_str()), Some("h249"));
        assert_eq!(history.iter().last().map(|e| e.host.as_str()), Some("h50"));
    }

    #[test]
    fn clear_and_statistics() {
        let mut history = ProbeHistory::new(10);
        history.push(entry("a", true));
        history.push(entry("b", false));
        let stats = history.statistics();
        assert_eq!(stats.total_probes, 2);
        assert_eq!(stats.reachable_probes, 1);

        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.statistics().total_probes, 0);
    }

    #[test]
    fn huge_capacity_allocates_lazily() {
        let mut history = ProbeHistory::new(usize::MAX);
        history.push(entry("a", true));
        assert_eq!(history.capacity(), usize::MAX);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let mut history = ProbeHistory::new(0);
        history.push(entry("a", true));
        history.push(entry("b", true));
        assert_eq!(history.capacity(), 1);
        assert_eq!(history.len(), 1);
    }
}
