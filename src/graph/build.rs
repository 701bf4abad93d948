//! Construction of a [`ShaderGraph`] from a material document.
//!
//! Nodes are created on demand while walking connections upstream from the root element, one
//! shader node per document node no matter how many consumers it has. Node-graph
//! implementations become [`Compound`] nodes holding their own nested graph.

use std::collections::VecDeque;

use anyhow::{Context, Result, anyhow, bail};

use super::{Classification, Compound, InputId, NodeId, NodeImpl, OutputId, ShaderGraph, classify};
use crate::document::{Element, ElementKind, Input, Node, NodeGraph, Output};
use crate::error::ShaderGenError;
use crate::library::{Builtin, ImplRef, Implementation, NameList, NodeDef, NodeLibrary, PortDef};
use crate::shadergen::GenContext;
use crate::syntax::Syntax;
use crate::types::{BaseType, Semantic, TypeDesc, TypeRegistry, Value, names};

/// Upstream reference carried by a document input or output.
#[derive(Debug, Clone, Copy, Default)]
struct Link<'n> {
    nodename: Option<&'n str>,
    output: Option<&'n str>,
    channels: Option<&'n str>,
    interfacename: Option<&'n str>,
}

impl<'n> Link<'n> {
    fn from_input(input: &'n Input) -> Self {
        Self {
            nodename: input.nodename.as_deref(),
            output: input.output.as_deref(),
            channels: input.channels.as_deref(),
            interfacename: input.interfacename.as_deref(),
        }
    }

    fn from_output(output: &'n Output) -> Self {
        Self {
            nodename: output.nodename.as_deref(),
            output: output.output.as_deref(),
            channels: output.channels.as_deref(),
            interfacename: None,
        }
    }

    fn is_connection(&self) -> bool {
        self.nodename.is_some() || self.interfacename.is_some()
    }
}

type Pending<'n> = VecDeque<(InputId, Link<'n>)>;

struct Builder<'a> {
    library: &'a NodeLibrary,
    types: &'a TypeRegistry,
    syntax: &'a Syntax,
    target: &'a str,
    /// Node graphs being instantiated, outermost first.
    graph_stack: Vec<String>,
}

impl ShaderGraph {
    /// Build the graph computing `element` for `target`. The document is only read; its own
    /// NodeDefs and implementations extend the context's library for this build.
    pub fn create(
        name: &str,
        element: Element<'_>,
        syntax: &Syntax,
        target: &str,
        ctx: &GenContext,
    ) -> Result<ShaderGraph> {
        let library = ctx.library.extended_with(element.document)?;
        let mut builder = Builder {
            library: &library,
            types: &ctx.types,
            syntax,
            target,
            graph_stack: Vec::new(),
        };

        let mut graph = ShaderGraph::new(name);
        let mut bindings = Vec::new();
        match element.kind {
            ElementKind::Output(output) => {
                let ty = ctx.types.get_type(&output.output_type)?;
                let socket = graph.add_output_socket(&output.name, ty.clone());
                if let Some(text) = output.value.as_deref() {
                    graph.input_mut(socket).value = Some(
                        Value::parse(&ty, text)
                            .with_context(|| format!("invalid value on output '{}'", output.name))?,
                    );
                }
                bindings.push((socket, Link::from_output(output)));
            }
            ElementKind::ShaderNode(node) => {
                let def = library
                    .resolve_nodedef(node)
                    .ok_or_else(|| ShaderGenError::MissingNodeDef {
                        node: node.name.clone(),
                    })?;
                let node_link = Link {
                    nodename: Some(node.name.as_str()),
                    ..Link::default()
                };
                if def.outputs.is_empty() {
                    let ty = ctx.types.get_type(&def.output_type)?;
                    let socket = graph.add_output_socket("out", ty);
                    bindings.push((socket, node_link));
                } else {
                    for port in &def.outputs {
                        let ty = ctx.types.get_type(&port.port_type)?;
                        let socket = graph.add_output_socket(&port.name, ty);
                        let link = Link {
                            output: Some(port.name.as_str()),
                            ..node_link
                        };
                        bindings.push((socket, link));
                    }
                }
            }
        }

        builder.populate(&mut graph, &element.document.nodes, bindings)?;
        if let ElementKind::ShaderNode(node) = element.kind {
            graph.bind_root_inputs(&node.name)?;
        }
        log::debug!(
            "[graph] created {} node(s) for '{}' ({})",
            graph.node_count(),
            element.name(),
            target
        );
        Ok(graph)
    }
}

impl ShaderGraph {
    /// Give every unconnected, editable input of the root node an input socket of the same
    /// name carrying its bound value, so the root's parameters become part of the interface.
    fn bind_root_inputs(&mut self, root: &str) -> Result<()> {
        let id = self
            .node_by_name(root)
            .ok_or_else(|| anyhow!("root node '{root}' was not created"))?;
        for input in self.node(id).inputs.clone() {
            let port = self.input(input);
            let ty = port.ty.clone();
            let bindable = ty.is_editable()
                && (ty.base_type() != BaseType::String || ty.semantic() == Semantic::Filename);
            if port.connection.is_some() || !bindable {
                continue;
            }
            let name = port.name.clone();
            if self.input_socket(&name).is_some() {
                bail!("root node '{root}' binds input '{name}' twice");
            }
            let value = port.value.clone();
            let socket = self.add_input_socket(&name, ty);
            self.output_mut(socket).value = value;
            self.make_connection(input, socket);
        }
        Ok(())
    }
}

impl<'a> Builder<'a> {
    /// Resolve every binding against `nodes`, creating nodes as they are first referenced.
    fn populate<'n>(
        &mut self,
        graph: &mut ShaderGraph,
        nodes: &'n [Node],
        bindings: Vec<(InputId, Link<'n>)>,
    ) -> Result<()> {
        let mut pending: Pending<'n> = bindings.into_iter().collect();
        while let Some((input, link)) = pending.pop_front() {
            self.connect(graph, nodes, input, link, &mut pending)?;
        }
        Ok(())
    }

    fn connect<'n>(
        &mut self,
        graph: &mut ShaderGraph,
        nodes: &'n [Node],
        input: InputId,
        link: Link<'n>,
        pending: &mut Pending<'n>,
    ) -> Result<()> {
        let library = self.library;
        let upstream = if let Some(name) = link.nodename {
            let id = match graph.node_by_name(name) {
                Some(id) => id,
                None => {
                    let node = nodes
                        .iter()
                        .find(|n| n.name == name)
                        .ok_or_else(|| anyhow!("node '{name}' not found in graph '{}'", graph.name))?;
                    let def = library.resolve_nodedef(node).ok_or_else(|| {
                        ShaderGenError::MissingNodeDef {
                            node: node.name.clone(),
                        }
                    })?;
                    self.create_node(graph, &node.name, def, &node.inputs, pending)?
                }
            };
            match link.output {
                Some(out) => graph
                    .node_output(id, out)
                    .ok_or_else(|| anyhow!("node '{name}' has no output '{out}'"))?,
                None => *graph
                    .node(id)
                    .outputs
                    .first()
                    .ok_or_else(|| anyhow!("node '{name}' has no outputs"))?,
            }
        } else if let Some(interface) = link.interfacename {
            graph.input_socket(interface).ok_or_else(|| {
                anyhow!(
                    "input '{}' binds unknown interface input '{interface}' in graph '{}'",
                    graph.input(input).name,
                    graph.name
                )
            })?
        } else {
            return Ok(());
        };

        let source = match link.channels {
            Some(channels) if !channels.is_empty() => self.add_swizzle(graph, input, upstream, channels)?,
            _ => upstream,
        };
        graph.make_connection(input, source);
        Ok(())
    }

    /// Instantiate `def` as node `name` with the given authored inputs. Connections found on
    /// the inputs are queued on `pending`.
    fn create_node<'n>(
        &mut self,
        graph: &mut ShaderGraph,
        name: &str,
        def: &NodeDef,
        authored: &'n [Input],
        pending: &mut Pending<'n>,
    ) -> Result<NodeId> {
        for port in def.output_ports() {
            let ty = self.types.get_type(&port.port_type)?;
            if !self.syntax.type_supported(&ty) {
                return Err(ShaderGenError::UnsupportedType {
                    type_name: ty.name().to_string(),
                    language: self.syntax.language().to_string(),
                }
                .into());
            }
        }

        let library = self.library;
        let implementation = match library.implementation(&def.name, self.target) {
            Some(ImplRef::Source(imp)) => NodeImpl::Source(imp.clone()),
            Some(ImplRef::Graph(ng)) => NodeImpl::Compound(Box::new(self.create_compound(ng, def)?)),
            None => {
                return Err(ShaderGenError::MissingImplementation {
                    node: name.to_string(),
                    language: self.syntax.language().to_string(),
                    target: self.target.to_string(),
                }
                .into());
            }
        };

        let id = graph.add_node(name, &def.node, &def.name, classify(def), implementation)?;
        for port in &def.inputs {
            let given = authored.iter().find(|i| i.name == port.name);
            let (ty, value) = self
                .port_value(port, given.and_then(|i| i.value.as_deref()))
                .with_context(|| format!("invalid value on input '{}' of node '{name}'", port.name))?;
            let input = graph.add_input(id, &port.name, ty);
            let slot = graph.input_mut(input);
            slot.value = value;
            slot.uniform = port.uniform;

            match given.map(Link::from_input) {
                Some(link) if link.is_connection() => pending.push_back((input, link)),
                _ => {
                    let has_value = given.is_some_and(|i| i.value.is_some());
                    if let (false, Some(prop)) = (has_value, port.defaultgeomprop.as_deref()) {
                        let geom = self.geomprop_output(graph, prop)?;
                        graph.make_connection(input, geom);
                    }
                }
            }
        }
        for port in def.output_ports() {
            let ty = self.types.get_type(&port.port_type)?;
            graph.add_output(id, &port.name, ty);
        }
        Ok(id)
    }

    /// Port type and value: the authored value, else the NodeDef default. String inputs with
    /// an enumeration become integer indices in languages without strings.
    fn port_value(&self, port: &PortDef, authored: Option<&str>) -> Result<(TypeDesc, Option<Value>)> {
        let ty = self.types.get_type(&port.port_type)?;
        let text = authored.or(port.value.as_deref());
        if let Some(enum_names) = port.enum_names.as_deref() {
            if let Some(index) = self.syntax.remap_enumeration(text.unwrap_or(""), &ty, enum_names)? {
                return Ok((self.types.get_type(names::INTEGER)?, Some(index)));
            }
        }
        let value = match text {
            Some(t) => Some(Value::parse(&ty, t)?),
            None => None,
        };
        Ok((ty, value))
    }

    /// Output of the shared `geomprop_<prop>` node, created on first use.
    fn geomprop_output(&mut self, graph: &mut ShaderGraph, prop: &str) -> Result<OutputId> {
        let name = format!("geomprop_{prop}");
        let id = match graph.node_by_name(&name) {
            Some(id) => id,
            None => {
                let library = self.library;
                let def = library
                    .geomprop_nodedef(prop)
                    .ok_or_else(|| anyhow!("no nodedef provides geometric property '{prop}'"))?;
                let mut none = Pending::new();
                self.create_node(graph, &name, def, &[], &mut none)?
            }
        };
        graph
            .node(id)
            .outputs
            .first()
            .copied()
            .ok_or_else(|| anyhow!("geometric node '{name}' has no outputs"))
    }

    /// Insert a swizzle node between `upstream` and `input`, selecting `channels`.
    fn add_swizzle(
        &mut self,
        graph: &mut ShaderGraph,
        input: InputId,
        upstream: OutputId,
        channels: &str,
    ) -> Result<OutputId> {
        let src = graph.output(upstream).ty.clone();
        let dst = graph.input(input).ty.clone();
        // Reject bad patterns while the document location is still known.
        self.syntax
            .swizzled_variable("v", &src, channels, &dst)
            .with_context(|| format!("invalid channels on input '{}'", graph.input(input).name))?;

        let consumer = &graph.node(graph.input(input).node).name;
        let name = graph.unique_node_name(&format!("{consumer}_{}_swizzle", graph.input(input).name));
        let nodedef = format!("ND_swizzle_{}_{}", src.name(), dst.name());
        let implementation = Implementation {
            name: "IM_swizzle".to_string(),
            nodedef: NameList::One(nodedef.clone()),
            target: None,
            inline: None,
            function: None,
            source: None,
            builtin: Some(Builtin::Swizzle),
            vertex_data: Vec::new(),
            uniforms: Vec::new(),
        };
        let id = graph.add_node(&name, "swizzle", &nodedef, Classification::TEXTURE, NodeImpl::Source(implementation))?;
        let src_in = graph.add_input(id, "in", src);
        graph.make_connection(src_in, upstream);
        let pattern = graph.add_input(id, "channels", self.types.get_type(names::STRING)?);
        let slot = graph.input_mut(pattern);
        slot.value = Some(Value::String(channels.to_string()));
        slot.uniform = true;
        Ok(graph.add_output(id, "out", dst))
    }

    /// Nested graph for a node-graph implementation of `def`.
    fn create_compound(&mut self, ng: &'a NodeGraph, def: &NodeDef) -> Result<Compound> {
        if let Some(from) = self.graph_stack.iter().position(|g| *g == ng.name) {
            let mut path = self.graph_stack[from..].to_vec();
            path.push(ng.name.clone());
            return Err(ShaderGenError::cycle(path).into());
        }
        self.graph_stack.push(ng.name.clone());

        let mut sub = ShaderGraph::new(&ng.name);
        for port in &def.inputs {
            let (ty, value) = self
                .port_value(port, None)
                .with_context(|| format!("invalid default on input '{}' of '{}'", port.name, def.name))?;
            let socket = sub.add_input_socket(&port.name, ty);
            sub.output_mut(socket).value = value;
        }
        let mut bindings = Vec::new();
        for port in def.output_ports() {
            let ty = self.types.get_type(&port.port_type)?;
            let socket = sub.add_output_socket(&port.name, ty);
            let Some(output) = ng.outputs.iter().find(|o| o.name == port.name) else {
                bail!("nodegraph '{}' does not define output '{}'", ng.name, port.name);
            };
            if let Some(text) = output.value.as_deref() {
                let ty = sub.input(socket).ty.clone();
                sub.input_mut(socket).value = Some(Value::parse(&ty, text)?);
            }
            bindings.push((socket, Link::from_output(output)));
        }
        self.populate(&mut sub, &ng.nodes, bindings)
            .with_context(|| format!("failed to build nodegraph '{}'", ng.name))?;

        self.graph_stack.pop();
        Ok(Compound {
            function_name: self.syntax.make_valid_name(&ng.name),
            graph: sub,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::load_document_from_str;
    use crate::library::load_default_library;
    use crate::shadergen::GenContext;
    use crate::syntax::glsl;

    fn ctx() -> GenContext {
        GenContext::new(load_default_library().expect("library"))
    }

    fn build(doc: &str, root: &str) -> Result<ShaderGraph> {
        let doc = load_document_from_str(doc).expect("document");
        let syntax = glsl::syntax();
        let ctx = ctx();
        let element = doc.element(root)?;
        ShaderGraph::create("test", element, &syntax, glsl::LANGUAGE, &ctx)
    }

    #[test]
    fn shared_upstream_nodes_are_created_once() {
        let g = build(
            r#"{
              "nodes": [
                {"name": "c", "category": "constant", "type": "float", "inputs": [{"name": "value", "type": "float", "value": "2.0"}]},
                {"name": "sum", "category": "add", "type": "float", "inputs": [
                  {"name": "in1", "type": "float", "nodename": "c"},
                  {"name": "in2", "type": "float", "nodename": "c"}]}
              ],
              "outputs": [{"name": "out", "type": "float", "nodename": "sum"}]
            }"#,
            "out",
        )
        .unwrap();
        assert_eq!(g.node_count(), 2);
        let c = g.node_by_name("c").unwrap();
        assert_eq!(g.output(g.node(c).outputs[0]).connections.len(), 2);
        let value = g.node_input(c, "value").unwrap();
        assert_eq!(g.input(value).value, Some(Value::Float(2.0)));
    }

    #[test]
    fn defaults_fill_unauthored_inputs() {
        let g = build(
            r#"{"nodes": [{"name": "a", "category": "add", "type": "color3"}],
                "outputs": [{"name": "out", "type": "color3", "nodename": "a"}]}"#,
            "out",
        )
        .unwrap();
        let a = g.node_by_name("a").unwrap();
        let in2 = g.node_input(a, "in2").unwrap();
        assert_eq!(g.input(in2).value, Some(Value::Floats(vec![0.0, 0.0, 0.0])));
    }

    #[test]
    fn image_gets_texcoord_and_integer_address_modes() {
        let g = build(
            r#"{"nodes": [{"name": "img", "category": "image", "type": "color3",
                 "inputs": [{"name": "file", "type": "filename", "value": "wood.png"},
                            {"name": "uaddressmode", "type": "string", "value": "clamp"}]}],
                "outputs": [{"name": "out", "type": "color3", "nodename": "img"}]}"#,
            "out",
        )
        .unwrap();
        let img = g.node_by_name("img").unwrap();
        let texcoord = g.node_input(img, "texcoord").unwrap();
        let geom = g.upstream_node(texcoord).unwrap();
        assert_eq!(g.node(geom).name, "geomprop_UV0");

        let mode = g.node_input(img, "uaddressmode").unwrap();
        assert_eq!(g.input(mode).ty.name(), "integer");
        assert_eq!(g.input(mode).value, Some(Value::Integer(1)));
        let vmode = g.node_input(img, "vaddressmode").unwrap();
        assert_eq!(g.input(vmode).value, Some(Value::Integer(2)));
    }

    #[test]
    fn channels_insert_a_swizzle_node() {
        let g = build(
            r#"{"nodes": [
                  {"name": "c", "category": "constant", "type": "color3", "inputs": [{"name": "value", "type": "color3", "value": "0.1, 0.2, 0.3"}]},
                  {"name": "m", "category": "multiply", "type": "float", "inputs": [{"name": "in1", "type": "float", "nodename": "c", "channels": "g"}]}
                ],
                "outputs": [{"name": "out", "type": "float", "nodename": "m"}]}"#,
            "out",
        )
        .unwrap();
        let m = g.node_by_name("m").unwrap();
        let sw = g.upstream_node(g.node(m).inputs[0]).unwrap();
        assert_eq!(g.node(sw).name, "m_in1_swizzle");
        assert_eq!(g.node(sw).implementation.builtin(), Some(Builtin::Swizzle));
    }

    #[test]
    fn bad_channel_pattern_is_rejected() {
        let err = build(
            r#"{"nodes": [
                  {"name": "c", "category": "constant", "type": "float"},
                  {"name": "m", "category": "multiply", "type": "color3", "inputs": [{"name": "in1", "type": "color3", "nodename": "c", "channels": "xyw"}]}
                ],
                "outputs": [{"name": "out", "type": "color3", "nodename": "m"}]}"#,
            "out",
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ShaderGenError>(),
            Some(ShaderGenError::InvalidSwizzle { .. })
        ));
    }

    #[test]
    fn unknown_category_is_missing_nodedef() {
        let err = build(
            r#"{"nodes": [{"name": "x", "category": "warp", "type": "float"}],
                "outputs": [{"name": "out", "type": "float", "nodename": "x"}]}"#,
            "out",
        )
        .unwrap_err();
        assert_eq!(
            err.downcast_ref::<ShaderGenError>(),
            Some(&ShaderGenError::MissingNodeDef { node: "x".into() })
        );
    }

    #[test]
    fn nodedef_without_target_implementation_is_reported() {
        let err = build(
            r#"{"nodedefs": [{"name": "ND_bare_float", "node": "bare", "type": "float"}],
                "nodes": [{"name": "x", "category": "bare", "type": "float"}],
                "outputs": [{"name": "out", "type": "float", "nodename": "x"}]}"#,
            "out",
        )
        .unwrap_err();
        assert_eq!(
            err.downcast_ref::<ShaderGenError>(),
            Some(&ShaderGenError::MissingImplementation {
                node: "x".into(),
                language: "genglsl".into(),
                target: "genglsl".into(),
            })
        );
    }

    #[test]
    fn string_output_is_unsupported_in_glsl() {
        let err = build(
            r#"{"nodedefs": [{"name": "ND_label_string", "node": "label", "type": "string"}],
                "nodes": [{"name": "l", "category": "label", "type": "string"}],
                "outputs": [{"name": "out", "type": "string", "nodename": "l"}]}"#,
            "out",
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ShaderGenError>(),
            Some(ShaderGenError::UnsupportedType { type_name, language })
                if type_name == "string" && language == "genglsl"
        ));
    }

    #[test]
    fn shader_node_root_binds_its_values_to_input_sockets() {
        let g = build(
            r#"{"nodes": [
                  {"name": "diff", "category": "diffuse_bsdf", "type": "BSDF"},
                  {"name": "surf", "category": "surface", "type": "surfaceshader", "inputs": [
                    {"name": "bsdf", "type": "BSDF", "nodename": "diff"},
                    {"name": "opacity", "type": "float", "value": "0.5"}]}
                ]}"#,
            "surf",
        )
        .unwrap();
        let surf = g.node_by_name("surf").unwrap();

        let socket = g.input_socket("opacity").expect("opacity socket");
        assert_eq!(g.output(socket).value, Some(Value::Float(0.5)));
        let opacity = g.node_input(surf, "opacity").unwrap();
        assert_eq!(g.input(opacity).connection, Some(socket));

        let bsdf = g.node_input(surf, "bsdf").unwrap();
        assert_eq!(g.node(g.upstream_node(bsdf).unwrap()).name, "diff");
        assert!(g.input_socket("bsdf").is_none());
        assert!(g.input_socket("edf").is_none());
    }

    #[test]
    fn recursive_nodegraph_is_a_cycle() {
        let err = build(
            r#"{"nodedefs": [{"name": "ND_loop_float", "node": "loop", "type": "float",
                              "inputs": [{"name": "in", "type": "float", "value": "0.0"}]}],
                "nodegraphs": [{"name": "NG_loop", "nodedef": "ND_loop_float",
                  "nodes": [{"name": "again", "category": "loop", "type": "float",
                             "inputs": [{"name": "in", "type": "float", "interfacename": "in"}]}],
                  "outputs": [{"name": "out", "type": "float", "nodename": "again"}]}],
                "nodes": [{"name": "top", "category": "loop", "type": "float"}],
                "outputs": [{"name": "out", "type": "float", "nodename": "top"}]}"#,
            "out",
        )
        .unwrap_err();
        match err.downcast_ref::<ShaderGenError>() {
            Some(ShaderGenError::Cycle { node, .. }) => assert_eq!(node, "NG_loop"),
            other => panic!("expected a cycle, got {other:?}"),
        }
    }
}
