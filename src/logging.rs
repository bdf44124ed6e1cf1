//! Log initialization for the binary. Output goes to stderr so stdout
//! stays clean for structured responses.

use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{NugsError, Result};

/// Initializes the global subscriber. `NUGS_LOG` overrides `level`.
pub fn init(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_env("NUGS_LOG")
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|err| NugsError::InvalidArgument(format!("invalid log level: {err}")))?;
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|_| NugsError::InvalidArgument("logging already initialized".into()))
}
