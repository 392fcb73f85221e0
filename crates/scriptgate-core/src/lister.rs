use std::path::Path;
use tokio::fs;

/// File name suffixes advertised as runnable commands.
pub const SCRIPT_EXTENSIONS: &[&str] = &[".sh", ".py"];

/// Names of the entries in `scripts_dir` carrying a script extension,
/// sorted by name. Entries with non-UTF-8 names are skipped.
pub async fn list_scripts(scripts_dir: &Path) -> std::io::Result<Vec<String>> {
    let mut commands = Vec::new();
    let mut entries = fs::read_dir(scripts_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if let Some(name) = entry.file_name().to_str()
            && is_script_name(name)
        {
            commands.push(name.to_string());
        }
    }
    commands.sort();
    Ok(commands)
}

fn is_script_name(name: &str) -> bool {
    SCRIPT_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}
