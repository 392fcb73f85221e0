use crate::cli::Cli;
use anyhow::{Context, anyhow};
use scriptgate_core::{DEFAULT_SHELL, LockoutPolicy};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_FILE: &str = "scriptgate.toml";

/// Resolved, immutable startup configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub tls: Option<TlsFiles>,
    pub plaintext_fallback: bool,
    pub scripts_folder: PathBuf,
    pub auth_password: Option<String>,
    pub lockout: LockoutPolicy,
    pub ntfy: Option<String>,
    pub shell: String,
    pub max_concurrent: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFiles {
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    #[serde(default)]
    server: ServerSection,
    #[serde(default)]
    tls: TlsSection,
    #[serde(default)]
    scripts: ScriptsSection,
    #[serde(default)]
    auth: AuthSection,
    #[serde(default)]
    notify: NotifySection,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ServerSection {
    host: Option<String>,
    port: Option<u16>,
    max_concurrent: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct TlsSection {
    cert_file: Option<PathBuf>,
    key_file: Option<PathBuf>,
    plaintext_fallback: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ScriptsSection {
    folder: Option<PathBuf>,
    shell: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct AuthSection {
    password: Option<String>,
    sensitive: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct NotifySection {
    ntfy: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8443
}

const DEFAULT_SENSITIVITY: i64 = 1;

impl ServerConfig {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let file_config = load_from_file(cli.config.as_deref())?.unwrap_or_default();
        Self::resolve(cli, file_config)
    }

    /// Flags/environment (already merged by clap) take precedence over the
    /// file, the file over built-in defaults.
    fn resolve(cli: &Cli, file: FileConfig) -> anyhow::Result<Self> {
        let host = cli
            .host
            .clone()
            .or(file.server.host)
            .unwrap_or_else(default_host);
        let port = cli.port.or(file.server.port).unwrap_or_else(default_port);

        let cert_file = cli.certfile.clone().or(file.tls.cert_file);
        let key_file = cli.keyfile.clone().or(file.tls.key_file);
        let tls = match (cert_file, key_file) {
            (Some(cert_file), Some(key_file)) => Some(TlsFiles {
                cert_file,
                key_file,
            }),
            (None, None) => None,
            (Some(_), None) => return Err(anyhow!("--certfile was given without --keyfile")),
            (None, Some(_)) => return Err(anyhow!("--keyfile was given without --certfile")),
        };
        let plaintext_fallback =
            cli.plaintext_fallback || file.tls.plaintext_fallback.unwrap_or(false);

        let scripts_folder = match cli.scripts_folder.clone().or(file.scripts.folder) {
            Some(folder) => folder,
            None => env::current_dir().context("Failed to determine current directory")?,
        };

        let auth_password = cli
            .auth_password
            .clone()
            .or(file.auth.password)
            .filter(|password| !password.is_empty());

        let sensitivity = cli
            .sensitive
            .or(file.auth.sensitive)
            .unwrap_or(DEFAULT_SENSITIVITY);
        let lockout = LockoutPolicy::from_sensitivity(sensitivity).ok_or_else(|| {
            anyhow!(
                "Invalid sensitivity {}: expected -1 (disabled) or a non-negative count",
                sensitivity
            )
        })?;

        let max_concurrent = cli.max_concurrent.or(file.server.max_concurrent);
        if max_concurrent == Some(0) {
            return Err(anyhow!("--max-concurrent must be at least 1"));
        }

        Ok(Self {
            host,
            port,
            tls,
            plaintext_fallback,
            scripts_folder,
            auth_password,
            lockout,
            ntfy: cli.ntfy.clone().or(file.notify.ntfy),
            shell: cli
                .shell
                .clone()
                .or(file.scripts.shell)
                .unwrap_or_else(|| DEFAULT_SHELL.to_string()),
            max_concurrent,
        })
    }
}

fn load_from_file(explicit: Option<&Path>) -> anyhow::Result<Option<FileConfig>> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => PathBuf::from(DEFAULT_CONFIG_FILE),
        None => return Ok(None),
    };

    let contents = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let parsed = parse_file_config(&contents)
        .with_context(|| format!("Failed to parse config {}", path.display()))?;
    Ok(Some(parsed))
}

fn parse_file_config(contents: &str) -> anyhow::Result<FileConfig> {
    Ok(toml::from_str(contents)?)
}
