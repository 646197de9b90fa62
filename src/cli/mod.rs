// ============================================================
// CLI / Presentation Layer
// ============================================================
// Thin clap front end over the head registry. It only routes
// and prints; every decision is made by the library.
//
// Reference: Rust Book §12 (CLI programs)

pub mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use commands::{Commands, CreateArgs, InspectArgs};

use prediction_heads::AnyHead;

type CliBackend = burn::backend::Wgpu;

#[derive(Parser, Debug)]
#[command(
    name = "heads",
    version = "0.1.0",
    about = "Create, save and inspect task prediction heads."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Create(args)  => run_create(args),
            Commands::Inspect(args) => run_inspect(args),
        }
    }
}

fn run_create(args: CreateArgs) -> Result<()> {
    let device = burn::backend::wgpu::WgpuDevice::default();
    tracing::info!("Using WGPU device: {:?}", device);

    let head = AnyHead::<CliBackend>::create(&args.name, args.layer_dims, args.class_weights, &device)
        .with_context(|| format!("Cannot create head '{}'", args.name))?;
    let (weights, config) = head
        .save(&args.out, args.index)
        .with_context(|| format!("Cannot save head into '{}'", args.out))?;

    println!("Saved {} weights to {}", head.kind(), weights.display());
    println!("Saved {} config  to {}", head.kind(), config.display());
    Ok(())
}

fn run_inspect(args: InspectArgs) -> Result<()> {
    let device = burn::backend::wgpu::WgpuDevice::default();

    let head = AnyHead::<CliBackend>::load(&args.weights, &args.config, &device)
        .with_context(|| format!("Cannot load head from '{}'", args.weights))?;
    let config = head.config();

    println!("variant:     {}", head.kind());
    println!("output type: {:?}", config.output_type());
    println!("layer dims:  {:?}", config.layer_dims());
    Ok(())
}
