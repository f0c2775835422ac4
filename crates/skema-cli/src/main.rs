//! # skema CLI Entry Point
//!
//! Assembles subcommands and dispatches to handler modules.

use clap::Parser;
use skema_cli::{inspect, load, render, resolve};

/// skema: schema-driven object model toolchain.
///
/// Inspects the types built from a schema directory, loads documents
/// against them and resolves canonical names.
#[derive(Parser, Debug)]
#[command(name = "skema", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Show the flattened property table of a type.
    Inspect(inspect::InspectArgs),
    /// Load a document and print its serialized form.
    Load(load::LoadArgs),
    /// Print the node reached by a canonical name.
    Resolve(resolve::ResolveArgs),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let (value, format) = match &cli.command {
        Commands::Inspect(args) => (inspect::run(args)?, args.format),
        Commands::Load(args) => (load::run(args)?, args.format),
        Commands::Resolve(args) => (resolve::run(args)?, args.format),
    };
    println!("{}", render(&value, format)?);

    Ok(())
}
