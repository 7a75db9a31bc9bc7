use anyhow::{Context, Result};
use blockspace_editor::EditorConfig;
use std::path::Path;

/// Explicit `--config` file, else `blockspace.config.json` in `cwd`, else defaults
pub fn resolve(explicit: Option<&Path>, cwd: &Path) -> Result<EditorConfig> {
    match explicit {
        Some(path) => EditorConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => EditorConfig::load(cwd).context("Failed to load blockspace.config.json"),
    }
}
