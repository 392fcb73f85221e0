//! Maps untrusted script names onto files inside the scripts directory.

use crate::error::ResolveError;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// A script name that was validated and found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptPath {
    name: String,
    path: PathBuf,
}

impl ScriptPath {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for ScriptPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

#[derive(Debug, Clone)]
pub struct ScriptResolver {
    scripts_dir: PathBuf,
}

impl ScriptResolver {
    pub fn new(scripts_dir: impl Into<PathBuf>) -> Self {
        Self {
            scripts_dir: scripts_dir.into(),
        }
    }

    pub fn scripts_dir(&self) -> &Path {
        &self.scripts_dir
    }

    pub async fn resolve(&self, name: &str) -> Result<ScriptPath, ResolveError> {
        validate_name(name)?;

        // SECURITY: name carries no separators, but a symlink inside the
        // directory may still point elsewhere, so compare canonical paths.
        let root = fs::canonicalize(&self.scripts_dir)
            .await
            .map_err(|_| ResolveError::NotFound(name.to_string()))?;
        let candidate = fs::canonicalize(self.scripts_dir.join(name))
            .await
            .map_err(|_| ResolveError::NotFound(name.to_string()))?;

        if !candidate.starts_with(&root) {
            debug!(
                script = name,
                target = %candidate.display(),
                "Script resolves outside the scripts directory"
            );
            return Err(ResolveError::InvalidName(name.to_string()));
        }

        let metadata = fs::metadata(&candidate)
            .await
            .map_err(|_| ResolveError::NotFound(name.to_string()))?;
        if !metadata.is_file() {
            return Err(ResolveError::NotFound(name.to_string()));
        }

        Ok(ScriptPath {
            name: name.to_string(),
            path: candidate,
        })
    }
}

fn validate_name(name: &str) -> Result<(), ResolveError> {
    if name.is_empty() {
        return Err(ResolveError::EmptyName);
    }
    if name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(ResolveError::InvalidName(name.to_string()));
    }
    Ok(())
}
