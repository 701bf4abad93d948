//! OSL generator: a single `shader` whose parameters are the published inputs and whose output
//! parameters are the graph outputs. Closures are ordinary values in OSL, so the graph is emitted
//! as-is without closure contexts.

use anyhow::Result;

use super::emit::{CodeWriter, ControlFlow, EmittedGraph, emit_graph};
use super::shader::{PIXEL_STAGE, Shader, ShaderPort, ShaderStage, block};
use super::{GenContext, ShaderGenerator};
use crate::document::Element;
use crate::syntax::{self, Syntax};

pub const TARGET: &str = syntax::osl::LANGUAGE;

const INCLUDES: &[&str] = &["stdosl.h", "color4.h", "vector2.h", "vector4.h"];

pub struct OslShaderGenerator {
    syntax: Syntax,
}

impl OslShaderGenerator {
    pub fn new() -> Self {
        Self {
            syntax: syntax::osl::syntax(),
        }
    }

    fn parameter(&self, port: &ShaderPort, output: bool) -> Result<String> {
        let ty = self.syntax.type_name(&port.ty)?;
        let value = match &port.value {
            Some(v) => self.syntax.value(&port.ty, v, true)?,
            None => self.syntax.default_value(&port.ty, true)?,
        };
        let qualifier = if output {
            format!("{} ", self.syntax.output_qualifier)
        } else {
            String::new()
        };
        Ok(format!("{qualifier}{ty} {} = {value}", port.variable))
    }

    fn source(&self, name: &str, emitted: &EmittedGraph, stage: &ShaderStage) -> Result<String> {
        let mut w = CodeWriter::new(0);
        for include in INCLUDES {
            w.line(&format!("#include \"{include}\""));
        }
        w.blank();
        for definition in &emitted.type_definitions {
            w.line(definition);
        }
        if !emitted.type_definitions.is_empty() {
            w.blank();
        }
        for function in &emitted.functions {
            w.block(function);
            w.blank();
        }

        let mut params = Vec::new();
        if let Some(inputs) = stage.uniform_block(block::PUBLIC_UNIFORMS) {
            for port in inputs.ports() {
                params.push(self.parameter(port, false)?);
            }
        }
        if let Some(outputs) = stage.output_block(block::PIXEL_OUTPUTS) {
            for port in outputs.ports() {
                params.push(self.parameter(port, true)?);
            }
        }
        w.line(&format!("shader {}", self.syntax.make_valid_name(name)));
        w.line("(");
        let last = params.len().saturating_sub(1);
        for (i, param) in params.iter().enumerate() {
            let separator = if i == last { "" } else { "," };
            w.line(&format!("    {param}{separator}"));
        }
        w.line(")");
        w.begin_scope();
        w.block(&emitted.body);
        for out in &emitted.outputs {
            w.statement(&format!("{} = {}", out.variable, out.expr));
        }
        w.end_scope(false);
        Ok(w.finish())
    }
}

impl Default for OslShaderGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShaderGenerator for OslShaderGenerator {
    fn language(&self) -> &str {
        syntax::osl::LANGUAGE
    }

    fn target(&self) -> &str {
        TARGET
    }

    fn syntax(&self) -> &Syntax {
        &self.syntax
    }

    fn generate(&self, name: &str, element: Element<'_>, ctx: &mut GenContext) -> Result<Shader> {
        let emitted = emit_graph(name, element, &self.syntax, TARGET, false, ControlFlow::Branches, &[], ctx)?;

        let mut stage = ShaderStage::new(PIXEL_STAGE);
        let graph = &emitted.graph;
        let inputs = stage.add_uniform_block(block::PUBLIC_UNIFORMS, "");
        for &socket in graph.input_sockets() {
            let port = graph.output(socket);
            inputs.add(ShaderPort::new(port.ty.clone(), &port.variable).with_value(port.value.clone()));
        }
        let outputs = stage.add_output_block(block::PIXEL_OUTPUTS, "");
        for out in &emitted.outputs {
            outputs.add(ShaderPort::new(out.ty.clone(), &out.variable));
        }
        stage.set_source_code(self.source(name, &emitted, &stage)?);
        log::debug!("[gen] osl '{name}': {} bytes", stage.source_code().len());

        let mut shader = Shader::new(name, emitted.graph);
        shader.add_stage(stage);
        shader.set_used_implementations(ctx.used_implementations());
        Ok(shader)
    }
}
