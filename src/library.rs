//! Node library: NodeDef signatures and their per-target implementations.
//!
//! The standard library is bundled JSON (`assets/stdlib.json`). Documents may carry extra
//! `nodedefs`, `implementations` and implementing `nodegraphs`; [`NodeLibrary::extended_with`]
//! layers those on top for a single compile.

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::document::{Document, Node, NodeGraph};

const DEFAULT_LIBRARY_JSON: &str = include_str!("../assets/stdlib.json");

/// Declared signature of a node category for one set of port types.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NodeDef {
    pub name: String,
    /// Node category this definition applies to.
    pub node: String,
    #[serde(rename = "type")]
    pub output_type: String,
    #[serde(default)]
    pub nodegroup: String,
    /// Scattering restriction of a BSDF: `R` (reflection only) or `T` (transmission only).
    #[serde(default)]
    pub bsdf: Option<String>,
    #[serde(default)]
    pub inputs: Vec<PortDef>,
    /// Explicit outputs; a single `out` of `output_type` when empty.
    #[serde(default)]
    pub outputs: Vec<PortDef>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PortDef {
    pub name: String,
    #[serde(rename = "type")]
    pub port_type: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub uniform: bool,
    /// Comma-separated enumeration of the accepted string values.
    #[serde(default, rename = "enum")]
    pub enum_names: Option<String>,
    /// Geometric property bound when the input is left unconnected (`UV0`, `Pworld`, `Nworld`).
    #[serde(default)]
    pub defaultgeomprop: Option<String>,
}

impl NodeDef {
    /// Declared outputs, with the implicit `out` filled in.
    pub fn output_ports(&self) -> Vec<PortDef> {
        if !self.outputs.is_empty() {
            return self.outputs.clone();
        }
        vec![PortDef {
            name: "out".to_string(),
            port_type: self.output_type.clone(),
            value: None,
            uniform: false,
            enum_names: None,
            defaultgeomprop: None,
        }]
    }

    pub fn input(&self, name: &str) -> Option<&PortDef> {
        self.inputs.iter().find(|p| p.name == name)
    }
}

/// Source text written either as one string or as a list of lines.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum SourceText {
    One(String),
    Lines(Vec<String>),
}

impl SourceText {
    pub fn text(&self) -> String {
        match self {
            SourceText::One(s) => s.clone(),
            SourceText::Lines(lines) => lines.join("\n"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum NameList {
    One(String),
    Many(Vec<String>),
}

impl NameList {
    pub fn contains(&self, name: &str) -> bool {
        match self {
            NameList::One(n) => n == name,
            NameList::Many(v) => v.iter().any(|n| n == name),
        }
    }
}

/// Emitters provided by the generator itself rather than by library source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Builtin {
    Switch,
    Compare,
    Swizzle,
    Surface,
}

impl Builtin {
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Switch => "switch",
            Builtin::Compare => "compare",
            Builtin::Swizzle => "swizzle",
            Builtin::Surface => "surface",
        }
    }
}

/// Per-vertex data a pixel-stage implementation reads, computed by the vertex stage.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VertexDataDef {
    /// Member name in the vertex-to-pixel block.
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    /// Application vertex attribute feeding it.
    pub input: String,
    #[serde(default, rename = "inputType")]
    pub input_type: Option<String>,
    /// Vertex-stage expression assigned to the member.
    pub assign: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct UniformDef {
    pub name: String,
    #[serde(rename = "type")]
    pub uniform_type: String,
    #[serde(default)]
    pub value: Option<String>,
}

/// Concrete realization of one or more NodeDefs for a target.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Implementation {
    pub name: String,
    pub nodedef: NameList,
    /// Target this implementation is written for; any target when absent.
    #[serde(default)]
    pub target: Option<String>,
    /// Inline expression template with `{{input}}` placeholders.
    #[serde(default)]
    pub inline: Option<String>,
    /// Function called by name; its definition is `source`.
    #[serde(default)]
    pub function: Option<String>,
    #[serde(default)]
    pub source: Option<SourceText>,
    #[serde(default)]
    pub builtin: Option<Builtin>,
    #[serde(default, rename = "vertexData")]
    pub vertex_data: Vec<VertexDataDef>,
    /// Private uniforms the implementation reads.
    #[serde(default)]
    pub uniforms: Vec<UniformDef>,
}

/// What a NodeDef resolves to for one target.
#[derive(Debug, Clone, Copy)]
pub enum ImplRef<'a> {
    Source(&'a Implementation),
    Graph(&'a NodeGraph),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeLibrary {
    #[serde(default)]
    pub nodedefs: Vec<NodeDef>,
    #[serde(default)]
    pub implementations: Vec<Implementation>,
    #[serde(default)]
    pub nodegraphs: Vec<NodeGraph>,
    /// Geometric property name to the NodeDef that produces it.
    #[serde(default)]
    pub geomprops: HashMap<String, String>,
}

pub fn load_default_library() -> Result<NodeLibrary> {
    load_library_from_str(DEFAULT_LIBRARY_JSON)
}

pub fn load_library_from_str(text: &str) -> Result<NodeLibrary> {
    let lib: NodeLibrary = serde_json::from_str(text).context("failed to parse node library json")?;
    lib.check_unique()?;
    Ok(lib)
}

impl NodeLibrary {
    pub fn nodedef(&self, name: &str) -> Option<&NodeDef> {
        self.nodedefs.iter().find(|d| d.name == name)
    }

    /// NodeDef for a node instance: the named one when the node names it, otherwise the first
    /// definition of the node's category and output type whose inputs accept every authored
    /// input.
    pub fn resolve_nodedef(&self, node: &Node) -> Option<&NodeDef> {
        if let Some(name) = node.nodedef.as_deref() {
            return self.nodedef(name);
        }
        self.nodedefs.iter().find(|def| {
            def.node == node.category
                && def.output_type == node.node_type
                && node.inputs.iter().all(|input| {
                    def.input(&input.name)
                        .is_some_and(|p| p.port_type == input.input_type)
                })
        })
    }

    /// Implementation of `nodedef` for `target`. A target-specific implementation wins over a
    /// target-independent one; an implementing node graph is the last resort.
    pub fn implementation(&self, nodedef: &str, target: &str) -> Option<ImplRef<'_>> {
        let candidates = || self.implementations.iter().filter(|i| i.nodedef.contains(nodedef));
        if let Some(i) = candidates().find(|i| i.target.as_deref() == Some(target)) {
            return Some(ImplRef::Source(i));
        }
        if let Some(i) = candidates().find(|i| i.target.is_none()) {
            return Some(ImplRef::Source(i));
        }
        self.nodegraphs
            .iter()
            .find(|g| g.nodedef.as_deref() == Some(nodedef))
            .map(ImplRef::Graph)
    }

    pub fn geomprop_nodedef(&self, geomprop: &str) -> Option<&NodeDef> {
        self.geomprops
            .get(geomprop)
            .and_then(|name| self.nodedef(name))
    }

    /// This library plus the definitions carried by `doc`.
    pub fn extended_with(&self, doc: &Document) -> Result<NodeLibrary> {
        let mut lib = self.clone();
        lib.nodedefs.extend(doc.nodedefs.iter().cloned());
        lib.implementations
            .extend(doc.implementations.iter().cloned());
        lib.nodegraphs.extend(
            doc.nodegraphs
                .iter()
                .filter(|g| g.nodedef.is_some())
                .cloned(),
        );
        lib.check_unique()
            .with_context(|| format!("failed to extend node library with document '{}'", doc.metadata.name))?;
        Ok(lib)
    }

    fn check_unique(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for def in &self.nodedefs {
            if !seen.insert(def.name.as_str()) {
                bail!("duplicate nodedef '{}'", def.name);
            }
        }
        seen.clear();
        for imp in &self.implementations {
            if !seen.insert(imp.name.as_str()) {
                bail!("duplicate implementation '{}'", imp.name);
            }
        }
        seen.clear();
        for graph in &self.nodegraphs {
            if !seen.insert(graph.name.as_str()) {
                bail!("duplicate nodegraph '{}'", graph.name);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Input;

    fn node(category: &str, ty: &str, inputs: &[(&str, &str)]) -> Node {
        Node {
            name: "n".into(),
            category: category.into(),
            node_type: ty.into(),
            nodedef: None,
            inputs: inputs
                .iter()
                .map(|(name, ty)| Input {
                    name: name.to_string(),
                    input_type: ty.to_string(),
                    value: None,
                    nodename: None,
                    output: None,
                    channels: None,
                    interfacename: None,
                })
                .collect(),
        }
    }

    #[test]
    fn default_library_loads() {
        let lib = load_default_library().expect("load default library");
        assert!(lib.nodedef("ND_image_color3").is_some());
        assert!(lib.nodedef("ND_surface").is_some());
        assert_eq!(
            lib.geomprop_nodedef("UV0").map(|d| d.name.as_str()),
            Some("ND_texcoord_vector2")
        );
    }

    #[test]
    fn nodedef_resolution_matches_types() {
        let lib = load_default_library().unwrap();
        let def = lib
            .resolve_nodedef(&node("add", "color3", &[("in1", "color3")]))
            .unwrap();
        assert_eq!(def.name, "ND_add_color3");
        assert!(lib.resolve_nodedef(&node("add", "color3", &[("in1", "float")])).is_none());
        assert!(lib.resolve_nodedef(&node("nosuch", "float", &[])).is_none());
    }

    #[test]
    fn target_specific_implementation_wins() {
        let lib = load_default_library().unwrap();
        let Some(ImplRef::Source(generic)) = lib.implementation("ND_add_color4", "genglsl") else {
            panic!("expected a source implementation");
        };
        assert!(generic.target.is_none());
        let Some(ImplRef::Source(mdl)) = lib.implementation("ND_add_color4", "genmdl") else {
            panic!("expected a source implementation");
        };
        assert_eq!(mdl.target.as_deref(), Some("genmdl"));
        assert!(lib.implementation("ND_image_color3", "nosuchtarget").is_none());
    }

    #[test]
    fn document_definitions_must_not_collide() {
        let lib = load_default_library().unwrap();
        let mut doc = Document::default();
        doc.nodedefs.push(lib.nodedefs[0].clone());
        let err = lib.extended_with(&doc).unwrap_err();
        assert!(format!("{err:#}").contains("duplicate nodedef"));
    }
}
