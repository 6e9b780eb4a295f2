use std::fmt;
use waypoint_core::{
    config::AppConfig,
    runtime::{RuntimeError, WaypointRuntime},
    upstream::UpstreamError,
};

#[derive(Debug)]
pub enum CliError {
    Config(String),
    Io(String),
    Upstream(UpstreamError),
    General(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "Configuration error: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
            Self::Upstream(error) => write!(f, "Upstream error: {error}"),
            Self::General(msg) => write!(f, "Error: {msg}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Upstream(error) => Some(error),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<UpstreamError> for CliError {
    fn from(error: UpstreamError) -> Self {
        Self::Upstream(error)
    }
}

impl From<RuntimeError> for CliError {
    fn from(error: RuntimeError) -> Self {
        match error {
            RuntimeError::ConfigValidation(msg) => Self::Config(msg),
            RuntimeError::Initialization(msg) => Self::General(msg),
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(error: serde_json::Error) -> Self {
        Self::General(error.to_string())
    }
}

pub type CliResult<T> = Result<T, CliError>;

pub fn print_success(message: &str) {
    println!("[SUCCESS] {message}");
}

pub fn print_error(message: &str) {
    eprintln!("[ERROR] {message}");
}

pub fn print_info(message: &str) {
    println!("[INFO] {message}");
}

/// Loads `file` (plus `WAYPOINT__*` overrides) and validates it.
pub fn load_config(file: &str) -> CliResult<AppConfig> {
    let config = AppConfig::from_file(file).map_err(|e| CliError::Config(e.to_string()))?;
    config.validate().map_err(CliError::Config)?;
    Ok(config)
}

/// Builds a runtime for one-shot commands; the prober loop is never started.
pub fn build_runtime(config: AppConfig) -> CliResult<WaypointRuntime> {
    Ok(WaypointRuntime::builder().with_config(config).disable_prober().build()?)
}

/// Renders a body as pretty JSON when it parses, raw text otherwise.
pub fn render_body(body: &[u8]) -> String {
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(value) => {
            serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
        }
        Err(_) => String::from_utf8_lossy(body).into_owned(),
    }
}
