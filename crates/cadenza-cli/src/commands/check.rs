//! Project validation command.

use std::path::PathBuf;

use anyhow::Context;
use cadenza_config::builtin_functions;
use cadenza_synth::PluggableRegistry;
use clap::Args;

use super::load_project;

#[derive(Args)]
pub struct CheckArgs {
    /// Project file (TOML)
    #[arg(value_name = "PROJECT")]
    project: PathBuf,
}

pub fn run(args: CheckArgs) -> anyhow::Result<()> {
    let project = load_project(&args.project)?;
    let library = project
        .validate(&builtin_functions(), &PluggableRegistry::new())
        .with_context(|| format!("checking {}", args.project.display()))?;

    println!("{}: ok", project.name);
    println!(
        "  {} wave tables, {} samples, {} oscillators",
        library.wave_table_names().count(),
        library.sample_names().count(),
        project.instrument.oscillators.len()
    );
    println!(
        "  {} notes, {} commands, {:.2} divisions long",
        project.score.notes.len(),
        project.score.commands.len(),
        project.score.length()
    );
    Ok(())
}
