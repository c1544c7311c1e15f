//! Score rendering command.
//!
//! Renders the whole score in memory and prints level statistics. Nothing
//! is written to disk.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use cadenza_config::builtin_functions;
use cadenza_core::{linear_to_db, linear_to_db_f64};
use cadenza_synth::PluggableRegistry;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

use super::load_project;
use crate::performance::{LevelMeter, Performance};

#[derive(Args)]
pub struct RenderArgs {
    /// Project file (TOML)
    #[arg(value_name = "PROJECT")]
    project: PathBuf,

    /// Seconds to keep rendering after the last note while track effects ring out
    #[arg(long, default_value = "2.0")]
    tail: f64,

    /// Override the project's sample rate (Hz)
    #[arg(long)]
    sample_rate: Option<f64>,

    /// Hide the progress bar
    #[arg(short, long)]
    quiet: bool,
}

pub fn run(args: RenderArgs) -> anyhow::Result<()> {
    let mut project = load_project(&args.project)?;
    if let Some(rate) = args.sample_rate {
        project.settings.sample_rate = rate;
    }

    let host = builtin_functions();
    let registry = PluggableRegistry::new();
    let library = project
        .validate(&host, &registry)
        .with_context(|| format!("checking {}", args.project.display()))?;
    let mut performance = Performance::new(&project, &library, Arc::new(host), &registry, args.tail)?;

    let estimate = performance.last_entry_tick()
        + (project.score.length() * project.score.ticks_per_division(&project.settings)) as u64;
    let pb = if args.quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(estimate.max(1))
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ticks ({eta})")?
            .progress_chars("##-"),
    );

    while !performance.is_done() {
        performance.render_tick()?;
        if performance.tick() > pb.length().unwrap_or(0) {
            pb.set_length(performance.tick());
        }
        pb.set_position(performance.tick());
    }
    pb.finish_and_clear();

    let ticks = performance.tick();
    let [left, right] = performance.meters();
    let seconds = left.samples() as f64 / project.settings.sample_rate;
    tracing::info!("rendered {} ticks", ticks);

    println!("{}", project.name);
    println!("{}", "=".repeat(project.name.len()));
    println!();
    println!("  Notes:     {}", performance.notes());
    println!("  Ticks:     {ticks}");
    println!("  Duration:  {seconds:.3}s ({} samples)", left.samples());
    print_channel("Left", left);
    print_channel("Right", right);
    Ok(())
}

fn print_channel(name: &str, meter: &LevelMeter) {
    println!(
        "  {name:6}     peak {:.4} ({:.1} dBFS), rms {:.4} ({:.1} dBFS), {} clipped",
        meter.peak(),
        linear_to_db(meter.peak()),
        meter.rms(),
        linear_to_db_f64(meter.rms()),
        meter.clipped()
    );
}
