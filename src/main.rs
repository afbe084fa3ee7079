use std::io::Read;
use std::path::PathBuf;
use std::fs;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ping_probe::{AppConfig, HistoryEntry, ProbeRequest, ProbeResult, ProbeSession, ProbeStatistics};

#[derive(Parser)]
#[command(name = "ping-probe", version)]
#[command(about = "Ping hosts and summarize reachability, latency and packet loss.")]
struct CommandLine {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe one or more hosts with the system ping utility
    Probe {
        #[arg(required = true)]
        hosts: Vec<String>,
        /// Echo requests per probe
        #[arg(short, long)]
        count: Option<u32>,
        /// Per-reply timeout in milliseconds
        #[arg(short = 'w', long)]
        timeout_ms: Option<u64>,
        /// Probe every host this many times
        #[arg(short, long, default_value_t = 1)]
        repeat: u32,
        /// Print one JSON object per probe
        #[arg(long)]
        json: bool,
        /// Include the utility's raw output
        #[arg(long)]
        raw: bool,
    },
    /// Normalize saved ping output (use - for stdin)
    Parse {
        file: PathBuf,
        /// Echo requests the output was produced with
        #[arg(short, long)]
        count: Option<u32>,
        #[arg(long)]
        json: bool,
    },
    /// Show the effective configuration
    Config {
        /// Write it to the config file
        #[arg(long)]
        save: bool,
    },
}

fn display_or_na<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| v.to_string())
}

fn print_result(host: &str, result: &ProbeResult, recorded_at: Option<&str>, raw: bool) {
    println!(
        "{} {host}  ip={}  avg={} ms  loss={}%{}",
        result.status_symbol(),
        result.resolved_address,
        display_or_na(result.average_latency_ms),
        display_or_na(result.packet_loss_percent),
        recorded_at.map(|t| format!("  at {t}")).unwrap_or_default(),
    );
    if raw {
        for line in result.raw_output.lines() {
            println!("    {line}");
        }
    }
}

fn print_statistics(stats: &ProbeStatistics) {
    println!(
        "{} probes, {} reachable, {} unreachable, mean latency {} ms, mean loss {}%",
        stats.total_probes,
        stats.reachable_probes,
        stats.unreachable_probes,
        display_or_na(stats.mean_latency_ms.map(|v| format!("{v:.1}"))),
        display_or_na(stats.mean_loss_percent.map(|v| format!("{v:.1}"))),
    );
}

fn print_entry(entry: &HistoryEntry, json: bool, raw: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(entry)?);
    } else {
        let at = entry.recorded_at.format("%Y-%m-%d %H:%M:%S").to_string();
        print_result(&entry.host, &entry.result, Some(&at), raw);
    }
    Ok(())
}

async fn probe(
    config: &AppConfig,
    hosts: Vec<String>,
    count: Option<u32>,
    timeout_ms: Option<u64>,
    repeat: u32,
    json: bool,
    raw: bool,
) -> Result<()> {
    let session = ProbeSession::new(config);
    let utility = session.executor().ensure_utility()?;
    log::debug!("using {}", utility.display());

    let count = count.unwrap_or(config.default_count);
    let timeout_ms = timeout_ms.unwrap_or(config.default_timeout_ms);

    for _ in 0..repeat {
        for host in &hosts {
            let request = ProbeRequest::new(host.as_str(), count, timeout_ms)?;
            let entry = session.submit(request)?.await.context("probe task failed")?;
            print_entry(&entry, json, raw)?;
        }
    }

    let stats = session.statistics();
    if json {
        println!("{}", serde_json::to_string(&stats)?);
    } else {
        print_statistics(&stats);
    }
    Ok(())
}

fn parse_file(config: &AppConfig, file: PathBuf, count: Option<u32>, json: bool) -> Result<()> {
    let text = if file.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).context("failed to read stdin")?;
        buf
    } else {
        fs::read_to_string(&file).with_context(|| format!("failed to read {}", file.display()))?
    };

    let result = ping_probe::parse(&text, count.unwrap_or(config.default_count));
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&file.display().to_string(), &result, None, false);
    }
    Ok(())
}

fn show_config(config: &AppConfig, save: bool) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    if save {
        let path = config.save()?;
        println!("saved to {}", path.display());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let commands = CommandLine::parse();
    let config = AppConfig::load();

    match commands.command {
        Commands::Probe { hosts, count, timeout_ms, repeat, json, raw } => {
            probe(&config, hosts, count, timeout_ms, repeat, json, raw).await
        }
        Commands::Parse { file, count, json } => parse_file(&config, file, count, json),
        Commands::Config { save } => show_config(&config, save),
    }
}
