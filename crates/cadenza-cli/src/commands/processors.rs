//! Pluggable processor listing command.

#![allow(clippy::print_literal)] // Table headers use literal strings

use cadenza_synth::PluggableRegistry;
use clap::Args;

#[derive(Args)]
pub struct ProcessorsArgs {
    /// Show details for a specific processor
    #[arg(value_name = "PROCESSOR")]
    processor: Option<String>,
}

pub fn run(args: ProcessorsArgs) -> anyhow::Result<()> {
    let registry = PluggableRegistry::new();

    if let Some(name) = &args.processor {
        let factory = registry
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown processor: {}", name))?;

        println!("{}", factory.name());
        println!("{}", "=".repeat(factory.name().len()));
        println!();
        println!("{}", factory.description());
        println!();
        println!("Configuration keys:");
        println!();
        println!("  {:16}  {:8}  {}", "Key", "Type", "Count");
        println!("  {:16}  {:8}  {}", "---", "----", "-----");
        for key in factory.config_keys() {
            println!(
                "  {:16}  {:8}  {}..={}",
                key.name,
                format!("{:?}", key.value_type).to_lowercase(),
                key.min_count,
                key.max_count
            );
        }
    } else {
        println!("Available Processors");
        println!("====================");
        println!();
        for descriptor in registry.all() {
            println!("  {:15} - {}", descriptor.name, descriptor.description);
        }
        println!();
        println!("Use 'cadenza processors <name>' for configuration keys.");
    }

    Ok(())
}
