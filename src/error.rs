use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("could not resolve {0}")]
    Resolution(String),

    #[error("invalid host {0:?}")]
    InvalidHost(String),

    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("probe did not finish within {0:.1}s")]
    Timeout(f64),

    #[error("probe output is neither UTF-8 nor in the console code page")]
    Decode,

    #[error("invalid request: {0}")]
    InvalidRequest(&'static str),

    #[error("a probe is already in progress")]
    Busy,

    #[error("command '{0}' not found on this system")]
    UtilityMissing(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProbeError {
    /// Text stored in `ProbeResult::raw_output` when a probe collapses to unreachable.
    pub fn to_raw_output(&self) -> String {
        format!("ERROR: {self}")
    }
}

pub type Result<T> = std::result::Result<T, ProbeError>;
