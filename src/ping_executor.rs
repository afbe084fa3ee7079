use std::net::IpAddr;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use log::{debug, warn};
use oem_cp::code_table::DECODING_TABLE_CP_MAP;
use oem_cp::code_table_type::TableType;
use oem_cp::{decode_string_complete_table, decode_string_incomplete_table_checked};
use tokio::process::Command;
use tokio::time::timeout;

use crate::config::AppConfig;
use crate::dns_cache::DnsCache;
use crate::error::{ProbeError, Result};
use crate::ping::{PlatformKind, ProbeRequest, ProbeResult};
use crate::ping_parser;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeCommand {
    pub program: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutput {
    pub output: String,
    pub execution_failed: bool,
}

/// Rejects hosts the probing utility would misread. Anything starting with
/// `-` would be taken as an option.
pub fn validate_host(host: &str) -> Result<&str> {
    let valid = !host.is_empty()
        && !host.starts_with('-')
        && host
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '.' | '-' | ':' | '_' | '%'));
    if valid {
        Ok(host)
    } else {
        Err(ProbeError::InvalidHost(host.to_string()))
    }
}

/// POSIX `-W` takes whole seconds: `ceil(ms / 1000)`, at least 1.
pub fn posix_timeout_secs(timeout_ms: u64) -> u64 {
    timeout_ms.div_ceil(1000).max(1)
}

pub fn build_command(program: &str, host: &str, count: u32, timeout_ms: u64, platform: PlatformKind) -> ProbeCommand {
    let args = match platform {
        PlatformKind::Windows => vec![
            "-n".to_string(),
            count.to_string(),
            "-w".to_string(),
            timeout_ms.to_string(),
            host.to_string(),
        ],
        PlatformKind::Posix => vec![
            "-c".to_string(),
            count.to_string(),
            "-W".to_string(),
            posix_timeout_secs(timeout_ms).to_string(),
            host.to_string(),
        ],
    };
    ProbeCommand {
        program: program.to_string(),
        args,
    }
}

/// Best-effort forward resolution. IPv4 is preferred when both families come back.
pub async fn resolve_address(host: &str) -> Option<IpAddr> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Some(ip);
    }

    match tokio::net::lookup_host((host, 0)).await {
        Ok(addrs) => {
            let addrs: Vec<IpAddr> = addrs.map(|addr| addr.ip()).collect();
            addrs.iter().copied().find(IpAddr::is_ipv4).or_else(|| addrs.first().copied())
        }
        Err(e) => {
            debug!("{}: {e}", ProbeError::Resolution(host.to_string()));
            None
        }
    }
}

/// Decodes merged probe output: UTF-8 first, then the console's OEM code page.
/// Redirected `ping.exe` output is written in that code page (CP850 on French
/// systems), so localized markers are not valid UTF-8.
pub fn decode_output(bytes: Vec<u8>, code_page: Option<u16>) -> Option<String> {
    let bytes = match String::from_utf8(bytes) {
        Ok(text) => return Some(text),
        Err(e) => e.into_bytes(),
    };
    match DECODING_TABLE_CP_MAP.get(&code_page?)? {
        TableType::Complete(table) => Some(decode_string_complete_table(&bytes, table)),
        TableType::Incomplete(table) => decode_string_incomplete_table_checked(&bytes, table),
    }
}

#[cfg(windows)]
fn console_code_page() -> Option<u16> {
    // SAFETY: GetOEMCP takes no arguments and only reads system settings.
    u16::try_from(unsafe { windows_sys::Win32::Globalization::GetOEMCP() }).ok()
}

#[cfg(not(windows))]
fn console_code_page() -> Option<u16> {
    None
}

async fn run_command(command: &ProbeCommand, overall_timeout: Duration) -> Result<String> {
    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args)
        .stdin(Stdio::null())
        .kill_on_drop(true);
    #[cfg(windows)]
    cmd.creation_flags(CREATE_NO_WINDOW);

    let output = timeout(overall_timeout, cmd.output())
        .await
        .map_err(|_| ProbeError::Timeout(overall_timeout.as_secs_f64()))?
        .map_err(|source| ProbeError::Spawn {
            program: command.program.clone(),
            source,
        })?;

    let mut merged = output.stdout;
    merged.extend_from_slice(&output.stderr);
    decode_output(merged, console_code_page()).ok_or(ProbeError::Decode)
}

/// Runs the probe command. Failures are reported as text, never as errors.
pub async fn execute_probe(command: &ProbeCommand, overall_timeout: Duration) -> ExecutionOutput {
    debug!("running {} {:?} (timeout {:?})", command.program, command.args, overall_timeout);
    match run_command(command, overall_timeout).await {
        Ok(output) => ExecutionOutput {
            output,
            execution_failed: false,
        },
        Err(e) => {
            warn!("probe execution failed: {e}");
            ExecutionOutput {
                output: e.to_raw_output(),
                execution_failed: true,
            }
        }
    }
}

pub struct PingExecutor {
    utility: String,
    platform: PlatformKind,
    dns_cache: DnsCache,
}

impl PingExecutor {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_platform(config, PlatformKind::current())
    }

    pub fn with_platform(config: &AppConfig, platform: PlatformKind) -> Self {
        Self {
            utility: config.utility.clone(),
            platform,
            dns_cache: DnsCache::new(config.dns_ttl()),
        }
    }

    /// Locates the probing utility on `PATH`.
    pub fn ensure_utility(&self) -> Result<PathBuf> {
        which::which(&self.utility).map_err(|_| ProbeError::UtilityMissing(self.utility.clone()))
    }

    pub async fn resolve(&self, host: &str) -> Option<IpAddr> {
        if let Some(ip) = self.dns_cache.get_valid_ip(host) {
            return Some(ip);
        }
        let ip = resolve_address(host).await?;
        self.dns_cache.insert(host, ip);
        Some(ip)
    }

    /// Resolves, runs and normalizes one probe. Always yields a result.
    pub async fn probe(&self, request: &ProbeRequest) -> ProbeResult {
        let host = match validate_host(&request.host) {
            Ok(host) => host,
            Err(e) => {
                warn!("{e}");
                return ProbeResult::failure(None, e.to_raw_output());
            }
        };

        let resolved = self.resolve(host).await.map(|ip| ip.to_string());
        let command = build_command(&self.utility, host, request.count, request.timeout_ms, self.platform);
        let overall_timeout = request.overall_timeout();
        let execution = execute_probe(&command, overall_timeout).await;

        if execution.execution_failed {
            return ProbeResult::failure(resolved, execution.output);
        }
        ping_parser::parse_with_resolution(&execution.output, request.count, resolved.as_deref())
    }
}
