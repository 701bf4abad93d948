//! Language-independent emission of node calls.
//!
//! An [`Emitter`] walks a prepared graph in dependency order and writes one declaration (or
//! function call) per node into a [`CodeWriter`]. Languages differ only in how functions hand
//! back outputs ([`Syntax::outputs_by_return`]) and in how conditionals are written
//! ([`ControlFlow`]); everything else is driven by the [`Syntax`] tables.

use std::collections::{BTreeSet, HashSet};

use anyhow::{Result, anyhow, bail};

use super::GenContext;
use super::hw;
use crate::document::Element;
use crate::graph::{Classification, InputId, NodeId, NodeImpl, ShaderGraph};
use crate::library::{Builtin, Implementation, UniformDef, VertexDataDef};
use crate::syntax::Syntax;
use crate::types::{Semantic, TypeDesc};
use crate::utils::{fmt_float, indent_block};

/// Indented source text builder.
#[derive(Debug, Clone, Default)]
pub struct CodeWriter {
    code: String,
    indent: usize,
}

impl CodeWriter {
    pub fn new(indent: usize) -> Self {
        Self {
            code: String::new(),
            indent,
        }
    }

    pub fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.code.push_str("    ");
        }
        self.code.push_str(text);
        self.code.push('\n');
    }

    pub fn statement(&mut self, text: &str) {
        self.line(&format!("{text};"));
    }

    pub fn blank(&mut self) {
        self.code.push('\n');
    }

    pub fn comment(&mut self, prefix: &str, text: &str) {
        self.line(&format!("{prefix} {text}"));
    }

    pub fn begin_scope(&mut self) {
        self.line("{");
        self.indent += 1;
    }

    pub fn end_scope(&mut self, semicolon: bool) {
        self.end_scope_with(if semicolon { ";" } else { "" });
    }

    /// Close a scope with `trailer` after the brace, e.g. ` vd;` for an instance name.
    pub fn end_scope_with(&mut self, trailer: &str) {
        self.indent = self.indent.saturating_sub(1);
        self.line(&format!("}}{trailer}"));
    }

    /// Append a multi-line block at the current indentation.
    pub fn block(&mut self, text: &str) {
        self.code.push_str(&indent_block(text, self.indent));
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn finish(self) -> String {
        self.code
    }
}

/// How a language writes conditional nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFlow {
    /// `if`/`else` blocks with the branch-only dependencies inside each block.
    Branches,
    /// A single `?:` expression; for languages whose bodies cannot hold statements.
    Ternary,
}

pub struct Emitter<'s> {
    pub syntax: &'s Syntax,
    /// Closures are evaluated per closure context rather than as values.
    pub hardware: bool,
    pub control_flow: ControlFlow,
    functions: Vec<String>,
    function_keys: HashSet<String>,
    vertex_data: Vec<VertexDataDef>,
    private_uniforms: Vec<UniformDef>,
}

impl<'s> Emitter<'s> {
    pub fn new(syntax: &'s Syntax, hardware: bool, control_flow: ControlFlow) -> Self {
        Self {
            syntax,
            hardware,
            control_flow,
            functions: Vec::new(),
            function_keys: HashSet::new(),
            vertex_data: Vec::new(),
            private_uniforms: Vec::new(),
        }
    }

    /// Emit every node of `graph` in order. Nodes only needed by some branches of a
    /// conditional are left to that conditional; used closures on hardware targets are left to
    /// the shader node integrating them.
    pub fn emit_function_calls(&mut self, w: &mut CodeWriter, graph: &ShaderGraph, ctx: &mut GenContext) -> Result<()> {
        for &id in graph.nodes() {
            let node = graph.node(id);
            if self.hardware
                && node.has(Classification::CLOSURE)
                && ctx.closure_context().is_none()
                && graph.is_used_closure(id)
            {
                continue;
            }
            if node.scope.referenced_conditionally() {
                if ctx.options.emit_omission_comments {
                    let conditional = node
                        .scope
                        .conditional_node
                        .map(|c| graph.node(c).name.as_str())
                        .unwrap_or_default();
                    w.comment(
                        &self.syntax.comment_prefix,
                        &format!("Omitted node '{}'. Only used in conditional node '{conditional}'", node.name),
                    );
                }
                continue;
            }
            self.emit_function_call(w, graph, id, ctx)?;
        }
        Ok(())
    }

    /// Emit the code computing the outputs of one node.
    pub fn emit_function_call(
        &mut self,
        w: &mut CodeWriter,
        graph: &ShaderGraph,
        id: NodeId,
        ctx: &mut GenContext,
    ) -> Result<()> {
        let node = graph.node(id);
        if self.hardware && node.has(Classification::CLOSURE) {
            if let Some(context) = ctx.closure_context() {
                if !hw::supports_context(node, context.kind) {
                    return self.emit_default_outputs(w, graph, id);
                }
            }
        }

        match &node.implementation {
            NodeImpl::Boundary => Ok(()),
            NodeImpl::Compound(compound) => {
                ctx.add_used_implementation(&compound.graph.name);
                self.emit_compound_call(w, graph, id, ctx)
            }
            NodeImpl::Source(imp) => {
                ctx.add_used_implementation(&imp.name);
                self.collect_requirements(imp);
                match imp.builtin {
                    Some(Builtin::Switch | Builtin::Compare) => self.emit_conditional(w, graph, id, ctx),
                    Some(Builtin::Swizzle) => self.emit_swizzle(w, graph, id),
                    Some(Builtin::Surface) => {
                        if !self.hardware {
                            bail!("surface built-in is only available on hardware targets");
                        }
                        hw::emit_surface(self, w, graph, id, ctx)
                    }
                    None => {
                        if let Some(template) = imp.inline.as_deref() {
                            let expr = self.expand_inline(graph, id, template, &imp.name)?;
                            let out = single_output(graph, id)?;
                            self.declare(w, graph, out, &expr)
                        } else if let Some(function) = imp.function.as_deref() {
                            if self.function_keys.insert(imp.name.clone()) {
                                if let Some(source) = &imp.source {
                                    self.functions.push(source.text());
                                }
                            }
                            self.emit_call(w, graph, id, function, ctx)
                        } else {
                            bail!("implementation '{}' has no inline expression, function or built-in", imp.name)
                        }
                    }
                }
            }
        }
    }

    /// Expression for the value arriving at `input`.
    pub fn input_expr(&self, graph: &ShaderGraph, input: InputId) -> Result<String> {
        let port = graph.input(input);
        if let Some(out) = port.connection {
            return Ok(graph.output(out).variable.clone());
        }
        match &port.value {
            Some(v) => self.syntax.value(&port.ty, v, false),
            None => self.syntax.default_value(&port.ty, false),
        }
    }

    /// `<type> <variable> = <expr>;`
    pub fn declare(&self, w: &mut CodeWriter, graph: &ShaderGraph, output: crate::graph::OutputId, expr: &str) -> Result<()> {
        let port = graph.output(output);
        let ty = self.syntax.type_name(&port.ty)?;
        w.statement(&format!("{ty} {} = {expr}", port.variable));
        Ok(())
    }

    fn emit_default_outputs(&self, w: &mut CodeWriter, graph: &ShaderGraph, id: NodeId) -> Result<()> {
        for &out in &graph.node(id).outputs {
            let value = self.syntax.default_value(&graph.output(out).ty, false)?;
            self.declare(w, graph, out, &value)?;
        }
        Ok(())
    }

    fn expand_inline(&self, graph: &ShaderGraph, id: NodeId, template: &str, imp: &str) -> Result<String> {
        let mut result = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find("{{") {
            result.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after
                .find("}}")
                .ok_or_else(|| anyhow!("unterminated placeholder in inline expression of '{imp}'"))?;
            let name = after[..end].trim();
            let input = graph
                .node_input(id, name)
                .ok_or_else(|| anyhow!("unknown input '{name}' in inline expression of '{imp}'"))?;
            result.push_str(&self.input_expr(graph, input)?);
            rest = &after[end + 2..];
        }
        result.push_str(rest);
        Ok(result)
    }

    /// Call `function` with the node's inputs in declaration order, prefixed by the closure
    /// context arguments when a closure is evaluated for a lighting term.
    fn emit_call(&mut self, w: &mut CodeWriter, graph: &ShaderGraph, id: NodeId, function: &str, ctx: &GenContext) -> Result<()> {
        let node = graph.node(id);
        let mut name = function.to_string();
        let mut args = Vec::new();
        if self.hardware && node.has(Classification::CLOSURE) {
            if let Some(context) = ctx.closure_context() {
                name.push_str(context.suffix);
                args.extend(context.call_arguments());
            }
        }
        for &input in &node.inputs {
            args.push(self.input_expr(graph, input)?);
        }

        if self.syntax.outputs_by_return {
            let out = single_output(graph, id)?;
            return self.declare(w, graph, out, &format!("{name}({})", args.join(", ")));
        }
        for &out in &node.outputs {
            let value = self.syntax.default_value(&graph.output(out).ty, false)?;
            self.declare(w, graph, out, &value)?;
            args.push(graph.output(out).variable.clone());
        }
        w.statement(&format!("{name}({})", args.join(", ")));
        Ok(())
    }

    fn emit_compound_call(&mut self, w: &mut CodeWriter, graph: &ShaderGraph, id: NodeId, ctx: &mut GenContext) -> Result<()> {
        let NodeImpl::Compound(compound) = &graph.node(id).implementation else {
            return Ok(());
        };
        let suffix = match ctx.closure_context() {
            Some(c) if self.hardware && graph.node(id).has(Classification::CLOSURE) => c.suffix,
            _ => "",
        };
        let function = format!("{}{suffix}", compound.function_name);
        if self.function_keys.insert(function.clone()) {
            let definition = self.compound_definition(&function, &compound.graph, graph.node(id).has(Classification::CLOSURE), ctx)?;
            self.functions.push(definition);
        }
        self.emit_call(w, graph, id, &compound.function_name, ctx)
    }

    /// Source of a function evaluating `sub`, emitted under the active closure context.
    fn compound_definition(
        &mut self,
        function: &str,
        sub: &ShaderGraph,
        closure: bool,
        ctx: &mut GenContext,
    ) -> Result<String> {
        let mut params = Vec::new();
        if self.hardware && closure {
            if let Some(context) = ctx.closure_context() {
                params.extend(context.parameter_list(self.syntax, &ctx.types)?);
            }
        }
        for &socket in sub.input_sockets() {
            let port = sub.output(socket);
            params.push(format!("{} {}", self.syntax.type_name(&port.ty)?, port.variable));
        }
        let outputs = sub.output_sockets();

        let mut body = CodeWriter::new(1);
        self.emit_function_calls(&mut body, sub, ctx)?;

        let mut w = CodeWriter::new(0);
        if self.syntax.outputs_by_return {
            let [out] = outputs else {
                bail!("function '{function}' needs exactly one output in language '{}'", self.syntax.language());
            };
            let ret = self.syntax.type_name(&sub.input(*out).ty)?;
            w.line(&format!("{ret} {function}({})", params.join(", ")));
            w.begin_scope();
            w.block(&body.finish());
            w.statement(&format!("return {}", self.input_expr(sub, *out)?));
        } else {
            for &out in outputs {
                let port = sub.input(out);
                params.push(format!("{} {}", self.syntax.output_type_name(&port.ty)?, port.variable));
            }
            w.line(&format!("void {function}({})", params.join(", ")));
            w.begin_scope();
            w.block(&body.finish());
            for &out in outputs {
                let expr = self.input_expr(sub, out)?;
                w.statement(&format!("{} = {expr}", sub.input(out).variable));
            }
        }
        w.end_scope(false);
        Ok(w.finish())
    }

    fn emit_swizzle(&self, w: &mut CodeWriter, graph: &ShaderGraph, id: NodeId) -> Result<()> {
        let node = graph.node(id);
        let input = graph
            .node_input(id, "in")
            .ok_or_else(|| anyhow!("swizzle node '{}' has no input 'in'", node.name))?;
        let channels = graph
            .node_input(id, "channels")
            .and_then(|c| graph.input(c).value.as_ref())
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("swizzle node '{}' needs a literal channel pattern", node.name))?;
        let out = single_output(graph, id)?;
        let expr = self.syntax.swizzled_variable(
            &self.input_expr(graph, input)?,
            &graph.input(input).ty,
            channels,
            &graph.output(out).ty,
        )?;
        self.declare(w, graph, out, &expr)
    }

    /// `switch` and `compare`. The nodes a branch alone needs are emitted with that branch;
    /// a literal control selects one branch at generation time.
    fn emit_conditional(&mut self, w: &mut CodeWriter, graph: &ShaderGraph, id: NodeId, ctx: &mut GenContext) -> Result<()> {
        let out = single_output(graph, id)?;
        let branches = graph.conditional_branches(id);
        if branches.is_empty() {
            bail!("conditional node '{}' has no branches", graph.node(id).name);
        }
        let selected = match branches.as_slice() {
            [only] => Some(*only),
            _ => graph.selected_branch(id),
        };
        let conditions = self.branch_conditions(graph, id, branches.len())?;
        let variable = graph.output(out).variable.clone();

        match self.control_flow {
            ControlFlow::Branches => {
                let default = self.syntax.default_value(&graph.output(out).ty, false)?;
                self.declare(w, graph, out, &default)?;
                match selected {
                    Some(branch) => {
                        w.begin_scope();
                        self.emit_branch(w, graph, id, branch, &variable, ctx)?;
                        w.end_scope(false);
                    }
                    None => {
                        let last = branches.len() - 1;
                        for (k, &branch) in branches.iter().enumerate() {
                            if k == 0 {
                                w.line(&format!("if ({})", conditions[0]));
                            } else if k == last {
                                w.line("else");
                            } else {
                                w.line(&format!("else if ({})", conditions[k]));
                            }
                            w.begin_scope();
                            self.emit_branch(w, graph, id, branch, &variable, ctx)?;
                            w.end_scope(false);
                        }
                    }
                }
            }
            ControlFlow::Ternary => {
                for &dep in graph.nodes() {
                    let scope = graph.node(dep).scope;
                    let needed = match selected {
                        Some(branch) => scope.uses_branch(id, branch),
                        None => scope.referenced_conditionally() && scope.conditional_node == Some(id),
                    };
                    if needed {
                        self.emit_function_call(w, graph, dep, ctx)?;
                    }
                }
                let expr = match selected {
                    Some(branch) => self.input_expr(graph, graph.node(id).inputs[branch])?,
                    None => {
                        let node = graph.node(id);
                        let last = branches.len() - 1;
                        let mut expr = self.input_expr(graph, node.inputs[branches[last]])?;
                        for k in (0..last).rev() {
                            let value = self.input_expr(graph, node.inputs[branches[k]])?;
                            expr = format!("({}) ? {value} : {expr}", conditions[k]);
                        }
                        expr
                    }
                };
                self.declare(w, graph, out, &expr)?;
            }
        }
        Ok(())
    }

    fn emit_branch(
        &mut self,
        w: &mut CodeWriter,
        graph: &ShaderGraph,
        id: NodeId,
        branch: usize,
        variable: &str,
        ctx: &mut GenContext,
    ) -> Result<()> {
        for &dep in graph.nodes() {
            if graph.node(dep).scope.uses_branch(id, branch) {
                self.emit_function_call(w, graph, dep, ctx)?;
            }
        }
        let expr = self.input_expr(graph, graph.node(id).inputs[branch])?;
        w.statement(&format!("{variable} = {expr}"));
        Ok(())
    }

    /// Test selecting each branch but the last.
    fn branch_conditions(&self, graph: &ShaderGraph, id: NodeId, count: usize) -> Result<Vec<String>> {
        let node = graph.node(id);
        let named = |name: &str| -> Result<String> {
            let input = graph
                .node_input(id, name)
                .ok_or_else(|| anyhow!("conditional node '{}' has no input '{name}'", node.name))?;
            self.input_expr(graph, input)
        };
        if node.has(Classification::SWITCH) {
            let which = named("which")?;
            Ok((1..count).map(|k| format!("{which} < {}", fmt_float(k as f32))).collect())
        } else {
            Ok(vec![format!("{} <= {}", named("intest")?, named("cutoff")?)])
        }
    }

    fn collect_requirements(&mut self, imp: &Implementation) {
        for data in &imp.vertex_data {
            if !self.vertex_data.iter().any(|d| d.name == data.name) {
                self.vertex_data.push(data.clone());
            }
        }
        for uniform in &imp.uniforms {
            if !self.private_uniforms.iter().any(|u| u.name == uniform.name) {
                self.private_uniforms.push(uniform.clone());
            }
        }
    }

    /// Function definitions in first-use order.
    pub fn functions(&self) -> &[String] {
        &self.functions
    }

    pub fn vertex_data(&self) -> &[VertexDataDef] {
        &self.vertex_data
    }

    pub fn private_uniforms(&self) -> &[UniformDef] {
        &self.private_uniforms
    }
}

pub(crate) fn single_output(graph: &ShaderGraph, id: NodeId) -> Result<crate::graph::OutputId> {
    let node = graph.node(id);
    match node.outputs.as_slice() {
        [out] => Ok(*out),
        _ => bail!("node '{}' must have exactly one output here", node.name),
    }
}

/// A graph output socket after emission.
#[derive(Debug, Clone)]
pub struct EmittedOutput {
    pub ty: TypeDesc,
    pub variable: String,
    /// Expression holding the final value.
    pub expr: String,
}

/// Everything a generator needs to lay out its stages.
pub struct EmittedGraph {
    pub graph: ShaderGraph,
    /// Main body statements, indented one level.
    pub body: String,
    pub functions: Vec<String>,
    pub vertex_data: Vec<VertexDataDef>,
    pub private_uniforms: Vec<UniformDef>,
    pub outputs: Vec<EmittedOutput>,
    pub type_definitions: Vec<String>,
}

/// Build, prepare and emit the graph for `element`.
pub fn emit_graph(
    name: &str,
    element: Element<'_>,
    syntax: &Syntax,
    target: &str,
    hardware: bool,
    control_flow: ControlFlow,
    reserved: &[&str],
    ctx: &mut GenContext,
) -> Result<EmittedGraph> {
    ctx.begin_generation();
    let mut graph = ShaderGraph::create(name, element, syntax, target, ctx)?;
    let options = ctx.options.clone();
    let output_suffix = if hardware { hw::PIXEL_OUTPUT_SUFFIX } else { "" };
    graph.finalize(&options, syntax, reserved, output_suffix)?;

    if hardware {
        for &socket in graph.output_sockets() {
            let ty = &graph.input(socket).ty;
            if ty.semantic() == Semantic::Closure {
                bail!(
                    "hardware targets cannot output closure type '{}' from '{}'",
                    ty.name(),
                    element.name()
                );
            }
        }
    }

    let mut emitter = Emitter::new(syntax, hardware, control_flow);
    let mut body = CodeWriter::new(1);
    emitter.emit_function_calls(&mut body, &graph, ctx)?;

    let mut outputs = Vec::new();
    for &socket in graph.output_sockets() {
        let port = graph.input(socket);
        outputs.push(EmittedOutput {
            ty: port.ty.clone(),
            variable: port.variable.clone(),
            expr: emitter.input_expr(&graph, socket)?,
        });
    }

    let mut used = BTreeSet::new();
    collect_types(&graph, &mut used);
    let type_definitions = syntax.type_definitions(ctx.types.iter().filter(|t| used.contains(t.name())));

    log::debug!(
        "[gen] emitted '{name}' for {target}: {} node(s), {} function(s)",
        graph.node_count(),
        emitter.functions().len()
    );
    Ok(EmittedGraph {
        body: body.finish(),
        functions: emitter.functions,
        vertex_data: emitter.vertex_data,
        private_uniforms: emitter.private_uniforms,
        outputs,
        type_definitions,
        graph,
    })
}

/// Names of every type a port of `graph` (or of a nested compound) carries.
fn collect_types(graph: &ShaderGraph, used: &mut BTreeSet<String>) {
    for &socket in graph.input_sockets() {
        used.insert(graph.output(socket).ty.name().to_string());
    }
    for &socket in graph.output_sockets() {
        used.insert(graph.input(socket).ty.name().to_string());
    }
    for &id in graph.nodes() {
        let node = graph.node(id);
        for &i in &node.inputs {
            used.insert(graph.input(i).ty.name().to_string());
        }
        for &o in &node.outputs {
            used.insert(graph.output(o).ty.name().to_string());
        }
        if let NodeImpl::Compound(c) = &node.implementation {
            collect_types(&c.graph, used);
        }
    }
}
