use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Every option is also readable from the environment; flags win. Values
/// left unset here fall back to the config file, then to defaults.
#[derive(Parser, Debug, Default)]
#[command(name = "scriptgate")]
#[command(
    version,
    about = "Run a server for executing custom scripts over HTTPS and streaming their output"
)]
pub struct Cli {
    /// Host IP address to bind to (default: 0.0.0.0)
    #[arg(long, env = "HOST")]
    pub host: Option<String>,

    /// Port number for the server (default: 8443)
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Path to the TLS certificate chain (PEM)
    #[arg(long, env = "CERT_FILE")]
    pub certfile: Option<PathBuf>,

    /// Path to the TLS private key (PEM)
    #[arg(long, env = "KEY_FILE")]
    pub keyfile: Option<PathBuf>,

    /// Serve plain HTTP when the certificate or key cannot be loaded
    #[arg(long, env = "PLAINTEXT_FALLBACK")]
    pub plaintext_fallback: bool,

    /// Folder containing the available scripts (default: current directory)
    #[arg(long, env = "SCRIPTS_FOLDER")]
    pub scripts_folder: Option<PathBuf>,

    /// Shared secret expected verbatim in the Authorization header
    #[arg(long, env = "AUTH_PASSWORD", hide_env_values = true)]
    pub auth_password: Option<String>,

    /// Wrong passwords tolerated before the server kills itself (-1 disables)
    #[arg(long, env = "SENSITIVE", allow_negative_numbers = true)]
    pub sensitive: Option<i64>,

    /// ntfy.sh room (or full topic URL) for notifications
    #[arg(long, env = "NTFY")]
    pub ntfy: Option<String>,

    /// Interpreter used to run scripts (default: bash)
    #[arg(long, env = "SCRIPT_SHELL")]
    pub shell: Option<String>,

    /// Maximum number of scripts running at once (default: unbounded)
    #[arg(long, env = "MAX_CONCURRENT")]
    pub max_concurrent: Option<usize>,

    /// TOML config file (defaults to ./scriptgate.toml when present)
    #[arg(long, env = "SCRIPTGATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "text")]
    pub log_format: LogFormat,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_negative_sensitivity_flag() {
        let cli = Cli::try_parse_from(["scriptgate", "--sensitive", "-1"]).unwrap();
        assert_eq!(cli.sensitive, Some(-1));
    }

    #[test]
    fn test_log_format_flag() {
        let cli = Cli::try_parse_from(["scriptgate", "--log-format", "json"]).unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
    }
}
