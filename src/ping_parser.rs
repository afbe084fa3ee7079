use std::net::IpAddr;

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::ping::{ProbeResult, UNKNOWN_ADDRESS};

// Per-reply latency. The lenient form also accepts `time= <1ms` style spacing.
static STRICT_SAMPLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:time|temps|zeit)[=<]\s*([0-9]+)(?:[.,][0-9]+)?\s*ms").expect("sample pattern")
});
static LENIENT_SAMPLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:time|temps|zeit)[=<]\s*<?\s*([0-9]+)(?:[.,][0-9]+)?\s*ms").expect("sample pattern")
});

static REPORTED_AVERAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:average|moyenne|mittelwert)\s*=\s*([0-9]+)\s*ms").expect("average pattern")
});
// rtt min/avg/max/mdev = 9.1/10.4/11.2/0.8 ms (Linux), round-trip min/avg/max/stddev = ... (BSD)
static SUMMARY_AVERAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:rtt|round-trip)\s+min/avg/max(?:/\w+)?\s*=\s*[0-9.]+/([0-9]+)(?:\.[0-9]+)?/")
        .expect("summary pattern")
});

static RECEIVED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:received|reçus|empfangen)\s*=\s*([0-9]+)").expect("received pattern")
});
static SENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:sent|envoyés|envoyes|envoyé|gesendet)\s*=\s*([0-9]+)").expect("sent pattern")
});
static TRANSMITTED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)([0-9]+)\s+(?:packets|paquets)\s+(?:transmitted|transmis)\s*,\s*([0-9]+)\s+(?:packets\s+)?(?:received|reçus)",
    )
    .expect("transmitted pattern")
});
static PERCENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([0-9]{1,3})\s*%").expect("percent pattern"));

static REPLY_FROM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:Reply from|Réponse de|Antwort von)\s*([0-9A-Fa-f:.]+)").expect("reply pattern")
});

/// Everything an extraction rule may look at.
struct Extraction<'a> {
    text: &'a str,
    requested_count: u32,
    samples: &'a [u64],
}

/// A single extraction rule. Rules for one field are tried in order and the
/// first one yielding a value wins.
struct Rule<T> {
    name: &'static str,
    extract: fn(&Extraction<'_>) -> Option<T>,
}

const SAMPLE_RULES: &[Rule<Vec<u64>>] = &[
    Rule { name: "strict time marker", extract: strict_samples },
    Rule { name: "lenient time marker", extract: lenient_samples },
];

const AVERAGE_RULES: &[Rule<u64>] = &[
    Rule { name: "reported average", extract: reported_average },
    Rule { name: "summary line average", extract: summary_average },
    Rule { name: "mean of samples", extract: mean_of_samples },
];

const LOSS_RULES: &[Rule<i32>] = &[
    Rule { name: "received/sent counts", extract: loss_from_reply_counts },
    Rule { name: "transmitted/received counts", extract: loss_from_transmitted_counts },
    Rule { name: "last percentage", extract: last_percentage },
    Rule { name: "sample count", extract: loss_from_samples },
];

const ADDRESS_RULES: &[Rule<String>] = &[
    Rule { name: "reply source", extract: reply_source_address },
];

fn first_match<T>(field: &str, rules: &[Rule<T>], extraction: &Extraction<'_>) -> Option<T> {
    rules.iter().find_map(|rule| {
        let value = (rule.extract)(extraction)?;
        debug!("{field}: using {}", rule.name);
        Some(value)
    })
}

/// Normalizes raw probe output when no forward resolution is available.
pub fn parse(raw_output: &str, requested_count: u32) -> ProbeResult {
    parse_with_resolution(raw_output, requested_count, None)
}

/// Normalizes raw probe output. A forward-resolved address takes precedence
/// over any address found in the output.
pub fn parse_with_resolution(raw_output: &str, requested_count: u32, resolved: Option<&str>) -> ProbeResult {
    let no_samples: [u64; 0] = [];
    let bootstrap = Extraction { text: raw_output, requested_count, samples: &no_samples };
    let samples = first_match("samples", SAMPLE_RULES, &bootstrap).unwrap_or_default();

    let extraction = Extraction { text: raw_output, requested_count, samples: &samples };
    let average_latency_ms = first_match("average", AVERAGE_RULES, &extraction);
    let packet_loss_percent = first_match("loss", LOSS_RULES, &extraction);
    let resolved_address = resolved
        .map(str::to_string)
        .or_else(|| first_match("address", ADDRESS_RULES, &extraction))
        .unwrap_or_else(|| UNKNOWN_ADDRESS.to_string());

    let reachable = match packet_loss_percent {
        Some(loss) => loss < 100,
        None => !samples.is_empty(),
    };

    ProbeResult {
        reachable,
        resolved_address,
        average_latency_ms,
        packet_loss_percent,
        raw_output: raw_output.to_string(),
    }
}

fn collect_samples(re: &Regex, text: &str) -> Option<Vec<u64>> {
    let samples: Vec<u64> = re
        .captures_iter(text)
        .filter_map(|caps| caps.get(1)?.as_str().parse().ok())
        .collect();
    (!samples.is_empty()).then_some(samples)
}

fn strict_samples(ex: &Extraction<'_>) -> Option<Vec<u64>> {
    collect_samples(&STRICT_SAMPLE_RE, ex.text)
}

fn lenient_samples(ex: &Extraction<'_>) -> Option<Vec<u64>> {
    collect_samples(&LENIENT_SAMPLE_RE, ex.text)
}

fn capture_number<T: std::str::FromStr>(re: &Regex, text: &str) -> Option<T> {
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

fn reported_average(ex: &Extraction<'_>) -> Option<u64> {
    capture_number(&REPORTED_AVERAGE_RE, ex.text)
}

fn summary_average(ex: &Extraction<'_>) -> Option<u64> {
    capture_number(&SUMMARY_AVERAGE_RE, ex.text)
}

fn mean_of_samples(ex: &Extraction<'_>) -> Option<u64> {
    if ex.samples.is_empty() {
        return None;
    }
    let total: u128 = ex.samples.iter().map(|&s| s as u128).sum();
    u64::try_from(total / ex.samples.len() as u128).ok()
}

/// `round((1 - received / sent) * 100)` with ties to even, clamped to 0..=100.
fn loss_from_counts(received: u64, sent: u64) -> Option<i32> {
    if sent == 0 {
        return None;
    }
    let loss = ((1.0 - received as f64 / sent as f64) * 100.0).round_ties_even();
    Some(loss.clamp(0.0, 100.0) as i32)
}

fn loss_from_reply_counts(ex: &Extraction<'_>) -> Option<i32> {
    let received: u64 = capture_number(&RECEIVED_RE, ex.text)?;
    let sent = capture_number(&SENT_RE, ex.text).unwrap_or(ex.requested_count as u64);
    loss_from_counts(received, sent)
}

fn loss_from_transmitted_counts(ex: &Extraction<'_>) -> Option<i32> {
    let caps = TRANSMITTED_RE.captures(ex.text)?;
    let sent: u64 = caps.get(1)?.as_str().parse().ok()?;
    let received: u64 = caps.get(2)?.as_str().parse().ok()?;
    loss_from_counts(received, sent)
}

fn last_percentage(ex: &Extraction<'_>) -> Option<i32> {
    PERCENT_RE
        .captures_iter(ex.text)
        .filter_map(|caps| caps.get(1)?.as_str().parse::<i32>().ok())
        .filter(|pct| *pct <= 100)
        .last()
}

// Not clamped: duplicate replies can push this below zero.
fn loss_from_samples(ex: &Extraction<'_>) -> Option<i32> {
    if ex.requested_count == 0 {
        return None;
    }
    let ratio = ex.samples.len() as f64 / ex.requested_count as f64;
    Some(((1.0 - ratio) * 100.0).round_ties_even() as i32)
}

fn reply_source_address(ex: &Extraction<'_>) -> Option<String> {
    REPLY_FROM_RE.captures_iter(ex.text).find_map(|caps| {
        let candidate = caps.get(1)?.as_str();
        candidate
            .parse::<IpAddr>()
            .ok()
            .or_else(|| candidate.strip_suffix(':')?.parse().ok())
            .map(|ip| ip.to_string())
    })
}
