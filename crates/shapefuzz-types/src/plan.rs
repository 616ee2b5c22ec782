//! Call plans supplied by the host fuzz engine.
//!
//! Two shapes exist:
//!
//! - [`Graph`]: a DAG of API calls and constants. Edges carry the argument `port` they
//!   feed and an `evaluationOrder` fixing the order in which a node's inputs run.
//! - [`ApiSeq`]: a linear list of calls whose arguments either reference an earlier
//!   call's output or are synthesized from the attached fuzz bytes.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::schema::{CallConvention, EndpointName, Type};

pub type NodeId = u64;

pub type CallId = u64;

/// Concrete signature chosen by the plan producer for one call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub args: Vec<Type>,
    pub ret: Type,
    pub callconv: CallConvention,
}

/// Literal value of a constant node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstantValue {
    Number(f64),
    String(String),
    Boolean(bool),
    Object(BTreeMap<String, ConstantValue>),
    Array(Vec<ConstantValue>),
    Undefined,
    Null,
    /// Materialized as a callable that ignores its arguments.
    Function,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodePayload {
    Api {
        name: EndpointName,
        signature: Signature,
    },
    Constant {
        #[serde(alias = "type")]
        typ: Type,
        value: ConstantValue,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingEdge {
    pub src: NodeId,
    #[serde(rename = "evaluationOrder")]
    pub evaluation_order: usize,
    /// Argument position fed by `src`.
    pub port: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingEdge {
    pub dst: NodeId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub payload: NodePayload,
    #[serde(default)]
    pub incoming: Vec<IncomingEdge>,
    #[serde(default)]
    pub outgoing: Vec<OutgoingEdge>,
}

impl Node {
    pub fn api(id: NodeId, name: impl Into<EndpointName>, signature: Signature) -> Self {
        Self {
            id,
            payload: NodePayload::Api {
                name: name.into(),
                signature,
            },
            incoming: Vec::new(),
            outgoing: Vec::new(),
        }
    }

    pub fn constant(id: NodeId, typ: Type, value: ConstantValue) -> Self {
        Self {
            id,
            payload: NodePayload::Constant { typ, value },
            incoming: Vec::new(),
            outgoing: Vec::new(),
        }
    }

    /// A node nothing else consumes.
    pub fn is_sink(&self) -> bool {
        self.outgoing.is_empty()
    }
}

/// Dependency graph of calls and constants.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default)]
    pub root: Option<NodeId>,
    pub nodes: BTreeMap<NodeId, Node>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: Node) -> &mut Self {
        self.nodes.insert(node.id, node);
        self
    }

    /// Feed the output of `src` into argument `port` of `dst`, evaluated at position
    /// `evaluation_order` among `dst`'s inputs. Unknown node ids are ignored here and
    /// rejected by graph validation.
    pub fn connect(
        &mut self,
        src: NodeId,
        dst: NodeId,
        port: usize,
        evaluation_order: usize,
    ) -> &mut Self {
        if let Some(node) = self.nodes.get_mut(&dst) {
            node.incoming.push(IncomingEdge {
                src,
                evaluation_order,
                port,
            });
        }
        if let Some(node) = self.nodes.get_mut(&src) {
            node.outgoing.push(OutgoingEdge { dst });
        }
        self
    }

    /// Sink nodes in ascending id order.
    pub fn sinks(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values().filter(|node| node.is_sink())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("failed to parse call graph")
    }
}

/// One argument slot of a sequence call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiCallArg {
    /// Synthesize a fresh value of this type from the fuzz bytes.
    Constant(Type),
    /// Reuse the result of the call with this id.
    Output(CallId),
    /// Never valid at execution time.
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiCall {
    pub id: CallId,
    pub name: EndpointName,
    pub args: Vec<ApiCallArg>,
    pub conv: CallConvention,
}

/// Linear call trace plus the byte stream that feeds its constant arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiSeq {
    #[serde(default)]
    pub fuzz: Vec<u8>,
    pub seq: Vec<ApiCall>,
}

impl ApiSeq {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("failed to parse call sequence")
    }
}
