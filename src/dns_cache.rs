use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct DnsCacheEntry {
    ip_address: IpAddr,
    cached_at: Instant,
    ttl: Duration,
}

impl DnsCacheEntry {
    pub fn new(ip_address: IpAddr, ttl: Duration) -> Self {
        Self {
            ip_address,
            cached_at: Instant::now(),
            ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.cached_at.elapsed() >= self.ttl
    }

    pub fn ip_address(&self) -> IpAddr {
        self.ip_address
    }
}

/// Successful forward resolutions keyed by the host string the user typed.
/// Shared between concurrent probes, so access goes through a mutex.
pub struct DnsCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, DnsCacheEntry>>,
}

impl DnsCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached address if it is still fresh. Stale entries are dropped.
    pub fn get_valid_ip(&self, hostname: &str) -> Option<IpAddr> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(hostname) {
            Some(entry) if !entry.is_expired() => Some(entry.ip_address()),
            Some(_) => {
                entries.remove(hostname);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, hostname: &str, ip_address: IpAddr) {
        if self.ttl.is_zero() {
            return;
        }
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Self::clean_expired(&mut entries);
        entries.insert(hostname.to_string(), DnsCacheEntry::new(ip_address, self.ttl));
    }

    fn clean_expired(entries: &mut HashMap<String, DnsCacheEntry>) {
        entries.retain(|_, entry| !entry.is_expired());
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_entry_is_returned() {
        let cache = DnsCache::new(Duration::from_secs(60));
        let ip: IpAddr = "8.8.8.8".parse().unwrap();
        cache.insert("dns.google", ip);
        assert_eq!(cache.get_valid_ip("dns.google"), Some(ip));
        assert_eq!(cache.get_valid_ip("example.com"), None);
    }

    #[test]
    fn expired_entry_is_purged() {
        let cache = DnsCache::new(Duration::from_secs(60));
        let ip: IpAddr = "1.1.1.1".parse().unwrap();
        cache.entries.lock().unwrap().insert(
            "one.one".to_string(),
            DnsCacheEntry::new(ip, Duration::ZERO),
        );
        assert_eq!(cache.get_valid_ip("one.one"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn insert_sweeps_other_expired_hosts() {
        let cache = DnsCache::new(Duration::from_secs(60));
        cache.entries.lock().unwrap().insert(
            "stale.example".to_string(),
            DnsCacheEntry::new("192.0.2.1".parse().unwrap(), Duration::ZERO),
        );
        cache.insert("fresh.example", "192.0.2.2".parse().unwrap());
        assert_eq!(cache.len(), 1);
        assert!(cache.get_valid_ip("fresh.example").is_some());
    }

    #[test]
    fn zero_ttl_disables_caching() {
        let cache = DnsCache::new(Duration::ZERO);
        cache.insert("dns.google", "8.8.8.8".parse().unwrap());
        assert!(cache.is_empty());
    }
}
