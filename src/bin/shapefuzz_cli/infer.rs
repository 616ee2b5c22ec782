//! Infer command - produce a schema from a named project or a declaration file

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::builder::PossibleValuesParser;
use clap::{ArgGroup, Parser};
use tracing::info;

use shapefuzz::projects::PROJECTS;
use shapefuzz::{derive_from_file, project_schema, validate_schema, Schema};

#[derive(Parser, Debug)]
#[command(about = "Infer a schema for a library")]
#[command(group(ArgGroup::new("source").required(true).args(["project", "decl"])))]
pub struct InferCmd {
    /// Named project with a hand-written schema
    #[arg(long, value_parser = PossibleValuesParser::new(PROJECTS))]
    pub project: Option<String>,

    /// Type-declaration file to derive the schema from
    #[arg(long, value_name = "PATH")]
    pub decl: Option<PathBuf>,

    /// Write the schema to this file instead of stdout
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

impl InferCmd {
    pub fn execute(&self, json_output: bool) -> Result<()> {
        let schema = self.schema()?;
        validate_schema(&schema).context("inferred schema violates schema invariants")?;

        let Some(path) = &self.output else {
            println!("{}", schema.to_json_pretty()?);
            return Ok(());
        };
        schema.save(path)?;
        info!(path = %path.display(), endpoints = schema.len(), "schema written");

        if json_output {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "success": true,
                    "output": path.display().to_string(),
                    "endpoints": schema.len(),
                }))?
            );
        } else {
            println!("Wrote {} endpoints to {}", schema.len(), path.display());
        }
        Ok(())
    }

    fn schema(&self) -> Result<Schema> {
        match (&self.project, &self.decl) {
            (Some(project), None) => project_schema(project),
            (None, Some(decl)) => derive_from_file(decl),
            _ => bail!("exactly one of --project or --decl must be given"),
        }
    }
}
