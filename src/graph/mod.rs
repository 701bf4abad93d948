//! Shader graph IR.
//!
//! A [`ShaderGraph`] owns its nodes and ports in flat arenas; nodes and ports refer to each other
//! through index handles ([`NodeId`], [`InputId`], [`OutputId`]). Connections are only changed
//! through [`ShaderGraph::make_connection`] / [`ShaderGraph::break_connection`], which update both
//! ends together.
//!
//! Node 0 of every graph is the boundary: its outputs are the graph's input sockets (interior
//! inputs connect to them) and its inputs are the output sockets.

pub mod build;
pub mod flatten;
pub mod optimize;
pub mod scope;
pub mod sort;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::ops::{BitOr, BitOrAssign};

use anyhow::{Result, bail};

use crate::library::{Builtin, Implementation, NodeDef};
use crate::shadergen::{GenOptions, InterfaceType};
use crate::syntax::Syntax;
use crate::types::{BaseType, Semantic, TypeDesc, Value, names};

pub use scope::{ScopeInfo, ScopeType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InputId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputId(pub usize);

/// Behavior flags computed once from a node's NodeDef.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Classification(u32);

impl Classification {
    pub const NONE: Self = Self(0);
    pub const TEXTURE: Self = Self(1 << 0);
    pub const CLOSURE: Self = Self(1 << 1);
    pub const SHADER: Self = Self(1 << 2);
    pub const FILETEXTURE: Self = Self(1 << 3);
    pub const CONDITIONAL: Self = Self(1 << 4);
    pub const CONSTANT: Self = Self(1 << 5);
    pub const BSDF: Self = Self(1 << 6);
    pub const BSDF_R: Self = Self(1 << 7);
    pub const BSDF_T: Self = Self(1 << 8);
    pub const EDF: Self = Self(1 << 9);
    pub const VDF: Self = Self(1 << 10);
    pub const SURFACE: Self = Self(1 << 11);
    pub const VOLUME: Self = Self(1 << 12);
    pub const LIGHT: Self = Self(1 << 13);
    pub const IFELSE: Self = Self(1 << 14);
    pub const SWITCH: Self = Self(1 << 15);
    pub const SAMPLE2D: Self = Self(1 << 16);
    pub const SAMPLE3D: Self = Self(1 << 17);
    pub const DOT: Self = Self(1 << 18);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

impl BitOr for Classification {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Classification {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Classification of a node instantiated from `def`.
pub fn classify(def: &NodeDef) -> Classification {
    use Classification as C;
    let mut c = match def.output_type.as_str() {
        names::SURFACESHADER => C::SURFACE | C::SHADER,
        names::VOLUMESHADER => C::VOLUME | C::SHADER,
        names::LIGHTSHADER => C::LIGHT | C::SHADER,
        names::MATERIAL => C::SHADER,
        names::BSDF => {
            let mut c = C::BSDF | C::CLOSURE;
            match def.bsdf.as_deref() {
                Some("R") => c |= C::BSDF_R,
                Some("T") => c |= C::BSDF_T,
                _ => {}
            }
            c
        }
        names::EDF => C::EDF | C::CLOSURE,
        names::VDF => C::VDF | C::CLOSURE,
        _ => match def.node.as_str() {
            "constant" => C::TEXTURE | C::CONSTANT,
            "compare" => C::TEXTURE | C::CONDITIONAL | C::IFELSE,
            "switch" => C::TEXTURE | C::CONDITIONAL | C::SWITCH,
            "dot" => C::TEXTURE | C::DOT,
            _ => C::TEXTURE,
        },
    };
    match def.nodegroup.as_str() {
        "texture2d" => c |= C::TEXTURE | C::FILETEXTURE | C::SAMPLE2D,
        "texture3d" => c |= C::TEXTURE | C::FILETEXTURE | C::SAMPLE3D,
        "procedural2d" => c |= C::TEXTURE | C::SAMPLE2D,
        "procedural3d" => c |= C::TEXTURE | C::SAMPLE3D,
        _ => {}
    }
    c
}

#[derive(Debug, Clone)]
pub struct ShaderInput {
    pub name: String,
    pub ty: TypeDesc,
    pub node: NodeId,
    pub variable: String,
    pub value: Option<Value>,
    pub connection: Option<OutputId>,
    /// Declared uniform on the NodeDef: the value cannot vary per shading point.
    pub uniform: bool,
}

#[derive(Debug, Clone)]
pub struct ShaderOutput {
    pub name: String,
    pub ty: TypeDesc,
    pub node: NodeId,
    pub variable: String,
    /// Default of an input socket; unused on node outputs.
    pub value: Option<Value>,
    pub connections: Vec<InputId>,
}

/// A node-graph implementation kept as a nested graph and emitted as a function.
#[derive(Debug, Clone)]
pub struct Compound {
    pub function_name: String,
    pub graph: ShaderGraph,
}

#[derive(Debug, Clone)]
pub enum NodeImpl {
    /// The graph boundary node.
    Boundary,
    /// Library source: inline template, function or generator built-in.
    Source(Implementation),
    Compound(Box<Compound>),
}

impl NodeImpl {
    pub fn builtin(&self) -> Option<Builtin> {
        match self {
            NodeImpl::Source(imp) => imp.builtin,
            _ => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            NodeImpl::Boundary => "",
            NodeImpl::Source(imp) => &imp.name,
            NodeImpl::Compound(c) => &c.graph.name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShaderNode {
    pub name: String,
    pub category: String,
    pub nodedef: String,
    pub classification: Classification,
    pub inputs: Vec<InputId>,
    pub outputs: Vec<OutputId>,
    pub implementation: NodeImpl,
    pub scope: ScopeInfo,
    /// Closure nodes this shader node depends on.
    pub used_closures: BTreeSet<NodeId>,
}

impl ShaderNode {
    pub fn has(&self, c: Classification) -> bool {
        self.classification.contains(c)
    }

    pub fn is_compound(&self) -> bool {
        matches!(self.implementation, NodeImpl::Compound(_))
    }
}

#[derive(Debug, Clone)]
pub struct ShaderGraph {
    pub name: String,
    nodes: Vec<ShaderNode>,
    inputs: Vec<ShaderInput>,
    outputs: Vec<ShaderOutput>,
    /// Live children; in dependency order once sorted.
    order: Vec<NodeId>,
    by_name: HashMap<String, NodeId>,
    input_sockets: Vec<OutputId>,
    output_sockets: Vec<InputId>,
}

const BOUNDARY: NodeId = NodeId(0);

impl ShaderGraph {
    pub fn new(name: &str) -> Self {
        let boundary = ShaderNode {
            name: name.to_string(),
            category: String::new(),
            nodedef: String::new(),
            classification: Classification::NONE,
            inputs: Vec::new(),
            outputs: Vec::new(),
            implementation: NodeImpl::Boundary,
            scope: ScopeInfo::default(),
            used_closures: BTreeSet::new(),
        };
        Self {
            name: name.to_string(),
            nodes: vec![boundary],
            inputs: Vec::new(),
            outputs: Vec::new(),
            order: Vec::new(),
            by_name: HashMap::new(),
            input_sockets: Vec::new(),
            output_sockets: Vec::new(),
        }
    }

    pub fn boundary(&self) -> NodeId {
        BOUNDARY
    }

    pub fn add_node(
        &mut self,
        name: &str,
        category: &str,
        nodedef: &str,
        classification: Classification,
        implementation: NodeImpl,
    ) -> Result<NodeId> {
        if self.by_name.contains_key(name) {
            bail!("graph '{}' already has a node named '{name}'", self.name);
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(ShaderNode {
            name: name.to_string(),
            category: category.to_string(),
            nodedef: nodedef.to_string(),
            classification,
            inputs: Vec::new(),
            outputs: Vec::new(),
            implementation,
            scope: ScopeInfo::default(),
            used_closures: BTreeSet::new(),
        });
        self.order.push(id);
        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn add_input(&mut self, node: NodeId, name: &str, ty: TypeDesc) -> InputId {
        let id = InputId(self.inputs.len());
        self.inputs.push(ShaderInput {
            name: name.to_string(),
            ty,
            node,
            variable: String::new(),
            value: None,
            connection: None,
            uniform: false,
        });
        self.nodes[node.0].inputs.push(id);
        id
    }

    pub fn add_output(&mut self, node: NodeId, name: &str, ty: TypeDesc) -> OutputId {
        let id = OutputId(self.outputs.len());
        self.outputs.push(ShaderOutput {
            name: name.to_string(),
            ty,
            node,
            variable: String::new(),
            value: None,
            connections: Vec::new(),
        });
        self.nodes[node.0].outputs.push(id);
        id
    }

    pub fn add_input_socket(&mut self, name: &str, ty: TypeDesc) -> OutputId {
        let id = self.add_output(BOUNDARY, name, ty);
        self.input_sockets.push(id);
        id
    }

    pub fn add_output_socket(&mut self, name: &str, ty: TypeDesc) -> InputId {
        let id = self.add_input(BOUNDARY, name, ty);
        self.output_sockets.push(id);
        id
    }

    pub fn node(&self, id: NodeId) -> &ShaderNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut ShaderNode {
        &mut self.nodes[id.0]
    }

    pub fn input(&self, id: InputId) -> &ShaderInput {
        &self.inputs[id.0]
    }

    pub fn input_mut(&mut self, id: InputId) -> &mut ShaderInput {
        &mut self.inputs[id.0]
    }

    pub fn output(&self, id: OutputId) -> &ShaderOutput {
        &self.outputs[id.0]
    }

    pub fn output_mut(&mut self, id: OutputId) -> &mut ShaderOutput {
        &mut self.outputs[id.0]
    }

    pub fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    pub fn node_input(&self, node: NodeId, name: &str) -> Option<InputId> {
        self.nodes[node.0]
            .inputs
            .iter()
            .copied()
            .find(|i| self.inputs[i.0].name == name)
    }

    pub fn node_output(&self, node: NodeId, name: &str) -> Option<OutputId> {
        self.nodes[node.0]
            .outputs
            .iter()
            .copied()
            .find(|o| self.outputs[o.0].name == name)
    }

    pub fn input_socket(&self, name: &str) -> Option<OutputId> {
        self.input_sockets
            .iter()
            .copied()
            .find(|o| self.outputs[o.0].name == name)
    }

    pub fn output_socket(&self, name: &str) -> Option<InputId> {
        self.output_sockets
            .iter()
            .copied()
            .find(|i| self.inputs[i.0].name == name)
    }

    pub fn input_sockets(&self) -> &[OutputId] {
        &self.input_sockets
    }

    pub fn output_sockets(&self) -> &[InputId] {
        &self.output_sockets
    }

    /// Live children in current order.
    pub fn nodes(&self) -> &[NodeId] {
        &self.order
    }

    pub fn node_count(&self) -> usize {
        self.order.len()
    }

    pub fn node_names(&self) -> Vec<&str> {
        self.order.iter().map(|id| self.nodes[id.0].name.as_str()).collect()
    }

    /// Connect `input` to `output`, replacing any previous connection of `input`.
    pub fn make_connection(&mut self, input: InputId, output: OutputId) {
        self.break_connection(input);
        self.inputs[input.0].connection = Some(output);
        self.outputs[output.0].connections.push(input);
    }

    pub fn break_connection(&mut self, input: InputId) {
        if let Some(output) = self.inputs[input.0].connection.take() {
            self.outputs[output.0].connections.retain(|i| *i != input);
        }
    }

    pub fn break_output_connections(&mut self, output: OutputId) {
        for input in std::mem::take(&mut self.outputs[output.0].connections) {
            self.inputs[input.0].connection = None;
        }
    }

    /// Node feeding `input`, or `None` when unconnected or fed by an input socket.
    pub fn upstream_node(&self, input: InputId) -> Option<NodeId> {
        let output = self.inputs[input.0].connection?;
        let node = self.outputs[output.0].node;
        (node != BOUNDARY).then_some(node)
    }

    /// Detach `node` from every connection and drop it from the children.
    pub fn remove_node(&mut self, node: NodeId) {
        let (inputs, outputs) = {
            let n = &self.nodes[node.0];
            (n.inputs.clone(), n.outputs.clone())
        };
        for i in inputs {
            self.break_connection(i);
        }
        for o in outputs {
            self.break_output_connections(o);
        }
        self.order.retain(|id| *id != node);
        let name = self.nodes[node.0].name.clone();
        self.by_name.remove(&name);
    }

    /// `base`, or `base` with the smallest numeric suffix that no node uses yet.
    pub fn unique_node_name(&self, base: &str) -> String {
        if !self.by_name.contains_key(base) {
            return base.to_string();
        }
        let mut n = 2;
        loop {
            let candidate = format!("{base}{n}");
            if !self.by_name.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Every node upstream of `start`, `start` included.
    pub fn upstream_reachable(&self, start: NodeId) -> HashSet<NodeId> {
        let mut visited = HashSet::new();
        let mut stack = vec![start];
        while let Some(n) = stack.pop() {
            if n == BOUNDARY || !visited.insert(n) {
                continue;
            }
            for input in &self.nodes[n.0].inputs {
                if let Some(up) = self.upstream_node(*input) {
                    stack.push(up);
                }
            }
        }
        visited
    }

    /// Nodes reachable upstream from any output socket.
    pub fn used_nodes(&self) -> HashSet<NodeId> {
        let mut used = HashSet::new();
        for socket in &self.output_sockets {
            if let Some(up) = self.upstream_node(*socket) {
                used.extend(self.upstream_reachable(up));
            }
        }
        used
    }

    /// Run the passes that turn a freshly built graph into one ready for emission.
    /// `output_suffix` names the stage variable each output socket is written to, e.g.
    /// `_color` for pixel outputs; empty when the socket variable is written directly.
    pub fn finalize(&mut self, options: &GenOptions, syntax: &Syntax, reserved: &[&str], output_suffix: &str) -> Result<()> {
        if options.flatten_subgraphs {
            self.flatten_graph()?;
        }
        self.optimize(options)?;
        self.publish_inputs(options);
        self.prepare(options, syntax, reserved, output_suffix)
    }

    /// Scheduling, scopes and names, for this graph and any compound kept as a function.
    fn prepare(&mut self, options: &GenOptions, syntax: &Syntax, reserved: &[&str], output_suffix: &str) -> Result<()> {
        self.topological_sort()?;
        self.calculate_scopes();
        self.set_variable_names(syntax, reserved, output_suffix);
        self.collect_used_closures();

        for id in self.order.clone() {
            if let NodeImpl::Compound(compound) = &mut self.nodes[id.0].implementation {
                compound.graph.optimize(options)?;
                compound.graph.prepare(options, syntax, reserved, "")?;
            }
        }
        Ok(())
    }

    /// Promote unconnected inputs to input sockets, which become public uniforms. Filename
    /// inputs of file-texture nodes are always promoted; the complete interface also promotes
    /// every other editable value.
    pub fn publish_inputs(&mut self, options: &GenOptions) {
        for node in self.order.clone() {
            let is_filetexture = self.nodes[node.0].has(Classification::FILETEXTURE);
            for input in self.nodes[node.0].inputs.clone() {
                let port = &self.inputs[input.0];
                if port.connection.is_some() {
                    continue;
                }
                let is_file = port.ty.semantic() == Semantic::Filename;
                let publish = if is_file {
                    is_filetexture
                } else {
                    options.shader_interface_type == InterfaceType::Complete
                        && port.ty.is_editable()
                        && port.ty.base_type() != BaseType::String
                };
                if !publish {
                    continue;
                }
                let base = format!("{}_{}", self.nodes[node.0].name, port.name);
                let mut name = base.clone();
                let mut n = 2;
                while self.input_socket(&name).is_some() {
                    name = format!("{base}{n}");
                    n += 1;
                }
                let (ty, value) = (port.ty.clone(), port.value.clone());
                let socket = self.add_input_socket(&name, ty);
                self.outputs[socket.0].value = value;
                self.make_connection(input, socket);
            }
        }
    }

    /// Assign unique, valid variable names to sockets and node outputs. With a non-empty
    /// `output_suffix`, `<output variable><suffix>` is kept free as well.
    pub fn set_variable_names(&mut self, syntax: &Syntax, reserved: &[&str], output_suffix: &str) {
        let mut names = syntax.unique_names();
        for word in reserved {
            names.reserve(word);
        }
        for socket in self.input_sockets.clone() {
            let name = self.outputs[socket.0].name.clone();
            self.outputs[socket.0].variable = syntax.make_unique(&name, &mut names);
        }
        for socket in self.output_sockets.clone() {
            let name = self.inputs[socket.0].name.clone();
            let mut variable = syntax.make_unique(&name, &mut names);
            if !output_suffix.is_empty() {
                while names.contains(&format!("{variable}{output_suffix}")) {
                    variable = syntax.make_unique(&name, &mut names);
                }
                names.reserve(&format!("{variable}{output_suffix}"));
            }
            self.inputs[socket.0].variable = variable;
        }
        for node in self.order.clone() {
            for output in self.nodes[node.0].outputs.clone() {
                let name = format!("{}_{}", self.nodes[node.0].name, self.outputs[output.0].name);
                self.outputs[output.0].variable = syntax.make_unique(&name, &mut names);
            }
        }
    }

    /// Record, for every shader node, the closure nodes upstream of it.
    pub fn collect_used_closures(&mut self) {
        for node in self.order.clone() {
            if !self.nodes[node.0].has(Classification::SHADER) {
                continue;
            }
            let used: BTreeSet<NodeId> = self
                .upstream_reachable(node)
                .into_iter()
                .filter(|n| *n != node && self.nodes[n.0].has(Classification::CLOSURE))
                .collect();
            self.nodes[node.0].used_closures = used;
        }
    }

    /// True when some shader node in this graph depends on `node`.
    pub fn is_used_closure(&self, node: NodeId) -> bool {
        self.order
            .iter()
            .any(|s| self.nodes[s.0].used_closures.contains(&node))
    }
}
