//! Slang generator. Both stages are written as entry points over a shared `VertexData` struct.

use anyhow::Result;

use super::emit::{CodeWriter, ControlFlow, EmittedGraph, emit_graph};
use super::hw;
use super::shader::{PIXEL_STAGE, Shader, ShaderStage, VERTEX_STAGE, VariableBlock, block};
use super::{GenContext, ShaderGenerator};
use crate::document::Element;
use crate::syntax::{self, Syntax};

pub const TARGET: &str = syntax::slang::LANGUAGE;

pub struct SlangShaderGenerator {
    syntax: Syntax,
}

impl SlangShaderGenerator {
    pub fn new() -> Self {
        Self {
            syntax: syntax::slang::syntax(),
        }
    }

    fn uniforms(&self, w: &mut CodeWriter, block: &VariableBlock) -> Result<()> {
        if block.is_empty() {
            return Ok(());
        }
        w.comment(&self.syntax.comment_prefix, &format!("Uniform block: {}", block.name));
        for port in block.ports() {
            w.statement(&format!("uniform {} {}", self.syntax.type_name(&port.ty)?, port.variable));
        }
        w.blank();
        Ok(())
    }

    /// `struct` with one semantic-annotated member per port, plus any `extra` leading members.
    fn semantic_struct(&self, w: &mut CodeWriter, name: &str, extra: &[&str], block: Option<&VariableBlock>) -> Result<()> {
        w.line(&format!("struct {name}"));
        w.begin_scope();
        for member in extra {
            w.statement(member);
        }
        for port in block.map(VariableBlock::ports).unwrap_or_default() {
            let semantic = port.semantic.as_deref().unwrap_or_default();
            w.statement(&format!("{} {} : {semantic}", self.syntax.type_name(&port.ty)?, port.variable));
        }
        w.end_scope(true);
        w.blank();
        Ok(())
    }

    fn vertex_data_struct(&self, w: &mut CodeWriter, stage: &ShaderStage, output: bool) -> Result<()> {
        let block = if output {
            stage.output_block(block::VERTEX_DATA)
        } else {
            stage.input_block(block::VERTEX_DATA)
        };
        self.semantic_struct(w, "VertexData", &["float4 position : SV_Position"], block)
    }

    fn vertex_source(&self, emitted: &EmittedGraph, stage: &ShaderStage) -> Result<String> {
        let mut w = CodeWriter::new(0);
        for uniforms in stage.uniform_blocks() {
            self.uniforms(&mut w, uniforms)?;
        }
        self.semantic_struct(&mut w, "VertexInput", &[], stage.input_block(block::VERTEX_INPUTS))?;
        self.vertex_data_struct(&mut w, stage, true)?;

        w.line("[shader(\"vertex\")]");
        w.line("VertexData vertexMain(VertexInput vin)");
        w.begin_scope();
        w.statement("VertexData vd");
        w.statement("float4 hPositionWorld = mul(u_worldMatrix, float4(vin.i_position, 1.0))");
        w.statement("vd.position = mul(u_viewProjectionMatrix, hPositionWorld)");
        for data in &emitted.vertex_data {
            w.statement(&format!("vd.{} = {}", data.name, data.assign));
        }
        w.statement("return vd");
        w.end_scope(false);
        Ok(w.finish())
    }

    fn pixel_source(&self, emitted: &EmittedGraph, stage: &ShaderStage) -> Result<String> {
        let mut w = CodeWriter::new(0);
        for definition in &emitted.type_definitions {
            w.line(definition);
        }
        if !emitted.type_definitions.is_empty() {
            w.blank();
        }
        for uniforms in stage.uniform_blocks() {
            self.uniforms(&mut w, uniforms)?;
        }
        self.vertex_data_struct(&mut w, stage, false)?;
        for function in &emitted.functions {
            w.block(function);
            w.blank();
        }

        // Only the first graph output reaches the render target.
        let first = emitted.outputs.first();
        w.line("[shader(\"fragment\")]");
        w.line("float4 fragmentMain(VertexData vd) : SV_Target");
        w.begin_scope();
        w.block(&emitted.body);
        match first {
            Some(out) => w.statement(&format!("return {}", hw::to_vec4(TARGET, &out.ty, &out.expr)?)),
            None => w.statement("return float4(0.0, 0.0, 0.0, 1.0)"),
        }
        w.end_scope(false);
        Ok(w.finish())
    }
}

impl Default for SlangShaderGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShaderGenerator for SlangShaderGenerator {
    fn language(&self) -> &str {
        syntax::slang::LANGUAGE
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
            "[gen] slang '{name}': vertex {} bytes, pixel {} bytes",
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
