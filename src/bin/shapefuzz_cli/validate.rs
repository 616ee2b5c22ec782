//! Validate command - check a schema file, and optionally call plans against it

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, ensure, Context, Result};
use clap::Parser;
use tracing::info;

use shapefuzz::exec::validate_graph;
use shapefuzz::types::{ApiCallArg, NodePayload};
use shapefuzz::{validate_schema, ApiSeq, Graph, Schema};

#[derive(Parser, Debug)]
#[command(about = "Check a schema file and call plans for consistency")]
pub struct ValidateCmd {
    /// Schema file to check
    pub schema: PathBuf,

    /// Dependency-graph plan to check against the schema
    #[arg(long, value_name = "PATH")]
    pub graph: Option<PathBuf>,

    /// Call-sequence plan to check against the schema
    #[arg(long, value_name = "PATH")]
    pub sequence: Option<PathBuf>,
}

impl ValidateCmd {
    pub fn execute(&self, json_output: bool) -> Result<()> {
        let schema = Schema::load(&self.schema)?;
        validate_schema(&schema)
            .with_context(|| format!("schema {} is invalid", self.schema.display()))?;
        info!(endpoints = schema.len(), "schema is valid");

        if let Some(path) = &self.graph {
            let graph = Graph::from_json(&read(path)?)?;
            check_graph(&schema, &graph)
                .with_context(|| format!("graph {} is invalid", path.display()))?;
        }
        if let Some(path) = &self.sequence {
            let seq = ApiSeq::from_json(&read(path)?)?;
            check_sequence(&schema, &seq)
                .with_context(|| format!("sequence {} is invalid", path.display()))?;
        }

        if json_output {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "success": true,
                    "endpoints": schema.len(),
                }))?
            );
        } else {
            println!("OK: {} endpoints", schema.len());
        }
        Ok(())
    }
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn check_graph(schema: &Schema, graph: &Graph) -> Result<()> {
    validate_graph(graph)?;
    for node in graph.nodes.values() {
        if let NodePayload::Api { name, signature } = &node.payload {
            let Some(entry) = schema.get(name) else {
                bail!("node {} calls {}, which is not in the schema", node.id, name);
            };
            ensure!(
                entry.callconv == signature.callconv,
                "node {} calls {} as {:?} but the schema says {:?}",
                node.id,
                name,
                signature.callconv,
                entry.callconv
            );
        }
    }
    Ok(())
}

fn check_sequence(schema: &Schema, seq: &ApiSeq) -> Result<()> {
    let mut seen = HashSet::new();
    for call in &seq.seq {
        ensure!(
            schema.contains(&call.name),
            "call {} invokes {}, which is not in the schema",
            call.id,
            call.name
        );
        for arg in &call.args {
            match arg {
                ApiCallArg::Output(src) => ensure!(
                    seen.contains(src),
                    "call {} uses the output of call {} before it runs",
                    call.id,
                    src
                ),
                ApiCallArg::Missing => bail!("call {} has a missing argument", call.id),
                ApiCallArg::Constant(_) => {}
            }
        }
        ensure!(seen.insert(call.id), "duplicate call id {}", call.id);
    }
    Ok(())
}
