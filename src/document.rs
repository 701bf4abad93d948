//! Material graph documents: the read-only input to shader generation.
//!
//! A document is JSON: top-level `nodes` and `outputs`, optional `nodegraphs` (compound node
//! bodies) and optional `nodedefs`/`implementations` that extend the node library for one
//! compile. Construction only ever reads a [`Document`]; it is never mutated by generation.

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::library::{Implementation, NodeDef, NodeLibrary};
use crate::types::{TypeRegistry, Value};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Document {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub nodegraphs: Vec<NodeGraph>,
    #[serde(default)]
    pub outputs: Vec<Output>,
    #[serde(default)]
    pub nodedefs: Vec<NodeDef>,
    #[serde(default)]
    pub implementations: Vec<Implementation>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// One node instance.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Node {
    pub name: String,
    /// Node category, e.g. `image` or `add`.
    pub category: String,
    #[serde(rename = "type")]
    pub node_type: String,
    /// Explicit NodeDef name; resolved from category and types when absent.
    #[serde(default)]
    pub nodedef: Option<String>,
    #[serde(default)]
    pub inputs: Vec<Input>,
}

/// A value or connection bound to one input of a node.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Input {
    pub name: String,
    #[serde(rename = "type")]
    pub input_type: String,
    #[serde(default)]
    pub value: Option<String>,
    /// Upstream node name.
    #[serde(default)]
    pub nodename: Option<String>,
    /// Upstream output name, for nodes with several outputs.
    #[serde(default)]
    pub output: Option<String>,
    /// Channel select applied to the upstream value, e.g. `"rgb"` or `"xy01"`.
    #[serde(default)]
    pub channels: Option<String>,
    /// Interface input of the enclosing node graph this input is bound to.
    #[serde(default)]
    pub interfacename: Option<String>,
}

/// A graph output, either at document level or inside a node graph.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Output {
    pub name: String,
    #[serde(rename = "type")]
    pub output_type: String,
    #[serde(default)]
    pub nodename: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub channels: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

/// A compound node body. With a `nodedef` it implements that NodeDef for every target.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NodeGraph {
    pub name: String,
    #[serde(default)]
    pub nodedef: Option<String>,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub outputs: Vec<Output>,
}

/// The element a shader is generated for.
#[derive(Debug, Clone, Copy)]
pub enum ElementKind<'a> {
    Output(&'a Output),
    /// A shader node, e.g. a `surface` node, whose output becomes the shader output.
    ShaderNode(&'a Node),
}

#[derive(Debug, Clone, Copy)]
pub struct Element<'a> {
    pub document: &'a Document,
    pub kind: ElementKind<'a>,
}

impl<'a> Element<'a> {
    pub fn name(&self) -> &'a str {
        match self.kind {
            ElementKind::Output(o) => &o.name,
            ElementKind::ShaderNode(n) => &n.name,
        }
    }
}

impl Document {
    pub fn find_node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn find_output(&self, name: &str) -> Option<&Output> {
        self.outputs.iter().find(|o| o.name == name)
    }

    pub fn find_nodegraph(&self, name: &str) -> Option<&NodeGraph> {
        self.nodegraphs.iter().find(|g| g.name == name)
    }

    /// Root element by name: a document output, or a top-level node.
    pub fn element(&self, name: &str) -> Result<Element<'_>> {
        let kind = if let Some(o) = self.find_output(name) {
            ElementKind::Output(o)
        } else if let Some(n) = self.find_node(name) {
            ElementKind::ShaderNode(n)
        } else {
            return Err(anyhow!("document has no output or node named '{name}'"));
        };
        Ok(Element {
            document: self,
            kind,
        })
    }
}

pub fn load_document_from_path(path: impl AsRef<std::path::Path>) -> Result<Document> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read material document at {}", path.display()))?;
    load_document_from_str(&text)
}

pub fn load_document_from_str(text: &str) -> Result<Document> {
    serde_json::from_str(text).context("failed to parse material document json")
}

/// Advisory document check. Never fails: returns whether the document is valid together with
/// one human-readable message per problem found.
pub fn validate(doc: &Document, library: &NodeLibrary, types: &TypeRegistry) -> (bool, Vec<String>) {
    let mut messages = Vec::new();

    validate_scope(library, types, "", &doc.nodes, &doc.outputs, &mut messages);
    for graph in &doc.nodegraphs {
        if let Some(def) = graph.nodedef.as_deref() {
            if library.nodedef(def).is_none() && !doc.nodedefs.iter().any(|d| d.name == def) {
                messages.push(format!("nodegraph '{}' references missing nodedef '{def}'", graph.name));
            }
        }
        let prefix = format!("{}/", graph.name);
        validate_scope(library, types, &prefix, &graph.nodes, &graph.outputs, &mut messages);
    }

    (messages.is_empty(), messages)
}

fn validate_scope(
    library: &NodeLibrary,
    types: &TypeRegistry,
    prefix: &str,
    nodes: &[Node],
    outputs: &[Output],
    messages: &mut Vec<String>,
) {
    let mut seen: HashSet<&str> = HashSet::new();
    let by_name: HashMap<&str, &Node> = nodes.iter().map(|n| (n.name.as_str(), n)).collect();

    for node in nodes {
        let path = format!("{prefix}{}", node.name);
        if !seen.insert(node.name.as_str()) {
            messages.push(format!("duplicate node name '{path}'"));
        }
        if types.find(&node.node_type).is_none() && node.node_type != "multioutput" {
            messages.push(format!("node '{path}' has unknown type '{}'", node.node_type));
        }
        let resolved = library.resolve_nodedef(node);
        if resolved.is_none() {
            messages.push(format!("node '{path}' has no matching nodedef"));
        }
        for input in &node.inputs {
            let Some(ty) = types.find(&input.input_type) else {
                messages.push(format!(
                    "input '{path}.{}' has unknown type '{}'",
                    input.name, input.input_type
                ));
                continue;
            };
            if let Some(up) = input.nodename.as_deref() {
                if !by_name.contains_key(up) {
                    messages.push(format!(
                        "input '{path}.{}' references missing node '{up}'",
                        input.name
                    ));
                }
            }
            if let Some(v) = input.value.as_deref() {
                if Value::parse(&ty, v).is_err() {
                    messages.push(format!(
                        "input '{path}.{}' has invalid {} value '{v}'",
                        input.name, input.input_type
                    ));
                }
            }
            if let Some(def) = resolved {
                if !def.inputs.iter().any(|p| p.name == input.name) {
                    messages.push(format!(
                        "input '{path}.{}' is not declared by nodedef '{}'",
                        input.name, def.name
                    ));
                }
            }
        }
    }

    for output in outputs {
        if let Some(up) = output.nodename.as_deref() {
            if !by_name.contains_key(up) {
                messages.push(format!(
                    "output '{prefix}{}' references missing node '{up}'",
                    output.name
                ));
            }
        }
        if types.find(&output.output_type).is_none() {
            messages.push(format!(
                "output '{prefix}{}' has unknown type '{}'",
                output.name, output.output_type
            ));
        }
    }
}
