//! shapefuzz: schema inference for the fuzzing harness
//!
//! ## Example Usage
//!
//! ```bash
//! # Hand-written schema of a named project
//! shapefuzz infer --project pako -o pako.schema.json
//!
//! # Derive a schema from a type-declaration file
//! shapefuzz infer --decl node_modules/fast-xml-parser/src/fxp.d.ts
//!
//! # Check a schema and a call plan against it
//! shapefuzz validate pako.schema.json --graph plan.json
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;

mod shapefuzz_cli;

use shapefuzz_cli::{infer::InferCmd, validate::ValidateCmd};

#[derive(Parser)]
#[command(
    name = "shapefuzz",
    author,
    version,
    about = "Schema inference for schema-driven library fuzzing"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON instead of human-readable format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (debug logging)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Produce a schema from a named project or a declaration file
    Infer(InferCmd),

    /// Check a schema file, and optionally call plans against it
    Validate(ValidateCmd),
}

fn main() -> Result<()> {
    let Cli {
        command,
        json,
        verbose,
    } = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if verbose { Level::DEBUG } else { Level::WARN })
        .init();

    match command {
        Commands::Infer(cmd) => cmd.execute(json),
        Commands::Validate(cmd) => cmd.execute(json),
    }
}
