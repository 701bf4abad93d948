//! MDL generator: an exported material whose `let` block holds the node declarations.
//!
//! MDL functions return their result, and a `let` block cannot hold statements, so conditionals
//! become `?:` expressions. Graph outputs that are not materials are shown through an emissive
//! material.

use anyhow::{Result, bail};

use super::emit::{CodeWriter, ControlFlow, EmittedGraph, EmittedOutput, emit_graph};
use super::shader::{PIXEL_STAGE, Shader, ShaderPort, ShaderStage, block};
use super::{GenContext, ShaderGenerator};
use crate::document::Element;
use crate::syntax::{self, Syntax};
use crate::types::{BaseType, Semantic, names};

pub const TARGET: &str = syntax::mdl::LANGUAGE;
pub const VERSION: &str = "mdl 1.6;";

const IMPORTS: &[&str] = &[
    "import ::df::*;",
    "import ::base::*;",
    "import ::math::*;",
    "import ::state::*;",
    "import ::tex::*;",
    "using ::materialx::core import *;",
    "import ::materialx::pbrlib::*;",
];

pub struct MdlShaderGenerator {
    syntax: Syntax,
}

impl MdlShaderGenerator {
    pub fn new() -> Self {
        Self {
            syntax: syntax::mdl::syntax(),
        }
    }

    fn parameter(&self, port: &ShaderPort) -> Result<String> {
        let ty = self.syntax.type_name(&port.ty)?;
        let value = match &port.value {
            Some(v) => self.syntax.value(&port.ty, v, true)?,
            None => self.syntax.default_value(&port.ty, true)?,
        };
        let uniform = matches!(port.ty.semantic(), Semantic::Filename) || port.ty.base_type() == BaseType::String;
        let qualifier = if uniform { "uniform " } else { "" };
        Ok(format!("{qualifier}{ty} {} = {value}", port.variable))
    }

    /// Material expression presenting `out`.
    fn material(&self, out: &EmittedOutput) -> Result<String> {
        let expr = &out.expr;
        let color = match out.ty.name() {
            names::SURFACESHADER | names::MATERIAL | names::VOLUMESHADER => return Ok(expr.clone()),
            names::COLOR3 => expr.clone(),
            names::COLOR4 => format!("{expr}.rgb"),
            names::FLOAT | names::VECTOR3 => format!("color({expr})"),
            names::VECTOR2 => format!("color({expr}.x, {expr}.y, 0.0)"),
            names::VECTOR4 => format!("color({expr}.x, {expr}.y, {expr}.z)"),
            names::INTEGER => format!("color(float({expr}))"),
            other => bail!("cannot present type '{other}' as an MDL material"),
        };
        Ok(format!(
            "material(surface: material_surface(emission: material_emission(emission: df::diffuse_edf(), intensity: {color} * math::PI)))"
        ))
    }

    fn source(&self, name: &str, emitted: &EmittedGraph, stage: &ShaderStage) -> Result<String> {
        let mut w = CodeWriter::new(0);
        w.line(VERSION);
        w.blank();
        for import in IMPORTS {
            w.line(import);
        }
        w.blank();
        for definition in &emitted.type_definitions {
            w.line(definition);
        }
        for function in &emitted.functions {
            w.block(function);
            w.blank();
        }

        let mut params = Vec::new();
        if let Some(inputs) = stage.uniform_block(block::PUBLIC_UNIFORMS) {
            for port in inputs.ports() {
                params.push(self.parameter(port)?);
            }
        }
        let material = match emitted.outputs.first() {
            Some(out) => self.material(out)?,
            None => "material()".to_string(),
        };

        let name = self.syntax.make_valid_name(name);
        if params.is_empty() {
            w.line(&format!("export material {name}()"));
        } else {
            w.line(&format!("export material {name}("));
            let last = params.len() - 1;
            for (i, param) in params.iter().enumerate() {
                let separator = if i == last { "" } else { "," };
                w.line(&format!("    {param}{separator}"));
            }
            w.line(")");
        }
        if emitted.body.trim().is_empty() {
            w.statement(&format!("= {material}"));
        } else {
            w.line("= let");
            w.begin_scope();
            w.block(&emitted.body);
            w.end_scope(false);
            w.statement(&format!("in {material}"));
        }
        Ok(w.finish())
    }
}

impl Default for MdlShaderGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShaderGenerator for MdlShaderGenerator {
    fn language(&self) -> &str {
        syntax::mdl::LANGUAGE
    }

    fn target(&self) -> &str {
        TARGET
    }

    fn syntax(&self) -> &Syntax {
        &self.syntax
    }

    fn generate(&self, name: &str, element: Element<'_>, ctx: &mut GenContext) -> Result<Shader> {
        let emitted = emit_graph(name, element, &self.syntax, TARGET, false, ControlFlow::Ternary, &[], ctx)?;
        if emitted.outputs.len() > 1 {
            log::debug!("[gen] mdl '{name}': only the first of {} outputs is presented", emitted.outputs.len());
        }

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
        log::debug!("[gen] mdl '{name}': {} bytes", stage.source_code().len());

        let mut shader = Shader::new(name, emitted.graph);
        shader.add_stage(stage);
        shader.set_used_implementations(ctx.used_implementations());
        Ok(shader)
    }
}
