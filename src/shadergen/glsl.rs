//! GLSL 4.00 generator: a vertex stage computing world-space vertex data and a pixel stage
//! evaluating the graph.

use anyhow::Result;

use super::emit::{CodeWriter, ControlFlow, EmittedGraph, emit_graph};
use super::hw;
use super::shader::{PIXEL_STAGE, Shader, ShaderStage, VERTEX_STAGE, VariableBlock, block};
use super::{GenContext, ShaderGenerator};
use crate::document::Element;
use crate::syntax::{self, Syntax};

pub const TARGET: &str = syntax::glsl::LANGUAGE;
pub const VERSION: &str = "#version 400";

pub struct GlslShaderGenerator {
    syntax: Syntax,
}

impl GlslShaderGenerator {
    pub fn new() -> Self {
        Self {
            syntax: syntax::glsl::syntax(),
        }
    }

    fn uniform_declarations(&self, w: &mut CodeWriter, block: &VariableBlock) -> Result<()> {
        if block.is_empty() {
            return Ok(());
        }
        w.comment(&self.syntax.comment_prefix, &format!("Uniform block: {}", block.name));
        for port in block.ports() {
            let ty = self.syntax.type_name(&port.ty)?;
            let init = match &port.value {
                Some(v) => self.syntax.value(&port.ty, v, true)?,
                None => self.syntax.default_value(&port.ty, true)?,
            };
            if init.is_empty() {
                w.statement(&format!("uniform {ty} {}", port.variable));
            } else {
                w.statement(&format!("uniform {ty} {} = {init}", port.variable));
            }
        }
        w.blank();
        Ok(())
    }

    fn interface_block(&self, w: &mut CodeWriter, qualifier: &str, block: &VariableBlock) -> Result<()> {
        if block.is_empty() {
            return Ok(());
        }
        w.line(&format!("{qualifier} {}", block.name));
        w.begin_scope();
        for port in block.ports() {
            w.statement(&format!("{} {}", self.syntax.type_name(&port.ty)?, port.variable));
        }
        w.end_scope_with(&format!(" {};", block.instance));
        w.blank();
        Ok(())
    }

    fn vertex_source(&self, emitted: &EmittedGraph, stage: &ShaderStage) -> Result<String> {
        let mut w = CodeWriter::new(0);
        w.line(VERSION);
        w.blank();
        for uniforms in stage.uniform_blocks() {
            self.uniform_declarations(&mut w, uniforms)?;
        }
        if let Some(inputs) = stage.input_block(block::VERTEX_INPUTS) {
            for port in inputs.ports() {
                w.statement(&format!("in {} {}", self.syntax.type_name(&port.ty)?, port.variable));
            }
            w.blank();
        }
        if let Some(data) = stage.output_block(block::VERTEX_DATA) {
            self.interface_block(&mut w, "out", data)?;
        }
        w.line("void main()");
        w.begin_scope();
        w.statement("vec4 hPositionWorld = u_worldMatrix * vec4(i_position, 1.0)");
        w.statement("gl_Position = u_viewProjectionMatrix * hPositionWorld");
        for data in &emitted.vertex_data {
            w.statement(&format!("vd.{} = {}", data.name, data.assign));
        }
        w.end_scope(false);
        Ok(w.finish())
    }

    fn pixel_source(&self, emitted: &EmittedGraph, stage: &ShaderStage) -> Result<String> {
        let mut w = CodeWriter::new(0);
        w.line(VERSION);
        w.blank();
        for definition in &emitted.type_definitions {
            w.line(definition);
        }
        if !emitted.type_definitions.is_empty() {
            w.blank();
        }
        for uniforms in stage.uniform_blocks() {
            self.uniform_declarations(&mut w, uniforms)?;
        }
        if let Some(data) = stage.input_block(block::VERTEX_DATA) {
            self.interface_block(&mut w, "in", data)?;
        }
        if let Some(outputs) = stage.output_block(block::PIXEL_OUTPUTS) {
            w.comment(&self.syntax.comment_prefix, "Pixel shader outputs");
            for port in outputs.ports() {
                w.statement(&format!("out vec4 {}", port.variable));
            }
            w.blank();
        }
        for function in &emitted.functions {
            w.block(function);
            w.blank();
        }
        w.line("void main()");
        w.begin_scope();
        w.block(&emitted.body);
        for out in &emitted.outputs {
            let value = hw::to_vec4(TARGET, &out.ty, &out.expr)?;
            w.statement(&format!("{} = {value}", hw::pixel_output_name(&out.variable)));
        }
        w.end_scope(false);
        Ok(w.finish())
    }
}

impl Default for GlslShaderGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShaderGenerator for GlslShaderGenerator {
    fn language(&self) -> &str {
        syntax::glsl::LANGUAGE
    }

    fn target(&self) -> &str {
        TARGET
    }

    fn syntax(&self) -> &Syntax {
        &self.syntax
    }

    fn generate(&self, name: &str, element: Element<'_>, ctx: &mut GenContext) -> Result<Shader> {
        let reserved = hw::reserved_words();
        let emitted = emit_graph(name, element, &self.syntax, TARGET, true, ControlFlow::Branches, &reserved, ctx)?;

        let mut vertex = ShaderStage::new(VERTEX_STAGE);
        let mut pixel = ShaderStage::new(PIXEL_STAGE);
        hw::populate_stages(&emitted, ctx, &mut vertex, &mut pixel)?;
        vertex.set_source_code(self.vertex_source(&emitted, &vertex)?);
        pixel.set_source_code(self.pixel_source(&emitted, &pixel)?);
        log::debug!(
            "[gen] glsl '{name}': vertex {} bytes, pixel {} bytes",
            vertex.source_code().len(),
            pixel.source_code().len()
        );

        let mut shader = Shader::new(name, emitted.graph);
        shader.add_stage(vertex);
        shader.add_stage(pixel);
        shader.set_used_implementations(ctx.used_implementations());
        Ok(shader)
    }
}
