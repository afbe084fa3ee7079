pub mod config;
pub mod dns_cache;
pub mod error;
pub mod history;
pub mod ping;
pub mod ping_executor;
pub mod ping_parser;
pub mod session;

pub use config::AppConfig;
pub use error::ProbeError;
pub use history::{HistoryEntry, ProbeHistory};
pub use ping::{PlatformKind, ProbeRequest, ProbeResult, ProbeStatistics, UNKNOWN_ADDRESS};
pub use ping_executor::{PingExecutor, ProbeCommand, build_command, execute_probe, resolve_address};
pub use ping_parser::{parse, parse_with_resolution};
pub use session::ProbeSession;
