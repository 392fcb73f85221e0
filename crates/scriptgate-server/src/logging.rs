use crate::cli::LogFormat;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,scriptgate_server=info,scriptgate_core=info";
const VERBOSE_FILTER: &str = "info,scriptgate_server=debug,scriptgate_core=debug";

/// Installs the global subscriber. `RUST_LOG` overrides the built-in filter.
pub fn init(format: LogFormat, verbose: bool) {
    let fallback = if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback.into());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true);

    let result = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if let Err(err) = result {
        eprintln!("Logging already initialized: {err}");
    }
}
