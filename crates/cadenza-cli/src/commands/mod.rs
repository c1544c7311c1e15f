//! CLI command implementations.

pub mod check;
pub mod processors;
pub mod render;

use std::path::Path;

use anyhow::Context;
use cadenza_config::Project;

/// Loads a project, naming the file in any error.
pub fn load_project(path: &Path) -> anyhow::Result<Project> {
    let project = Project::load(path).with_context(|| format!("loading {}", path.display()))?;
    tracing::info!(
        "loaded '{}': {} oscillators, {} notes, {} commands",
        project.name,
        project.instrument.oscillators.len(),
        project.score.notes.len(),
        project.score.commands.len()
    );
    Ok(project)
}
