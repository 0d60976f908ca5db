// src/config/error.rs
use super::script::ScriptError;

/// Startup configuration errors. Any of these aborts before the listener binds.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required parameter, one of --port / --script / --http required")]
    NoProbes,

    #[error("Invalid port \"{0}\": expected PORT or HOST:PORT")]
    InvalidPort(String),

    #[error("Invalid HTTP check \"{0}\": {1}")]
    InvalidHttpCheck(String, url::ParseError),

    #[error(transparent)]
    Script(#[from] ScriptError),
}
