//! The generated shader: named stages holding source code and the variable blocks that make
//! up each stage's interface.

use anyhow::{Result, anyhow};

use crate::graph::ShaderGraph;
use crate::types::{TypeDesc, Value};

pub const VERTEX_STAGE: &str = "vertex";
pub const PIXEL_STAGE: &str = "pixel";

/// Standard block names.
pub mod block {
    pub const PRIVATE_UNIFORMS: &str = "PrivateUniforms";
    pub const PUBLIC_UNIFORMS: &str = "PublicUniforms";
    pub const VERTEX_INPUTS: &str = "VertexInputs";
    pub const VERTEX_DATA: &str = "VertexData";
    pub const PIXEL_OUTPUTS: &str = "PixelOutputs";
    pub const CONSTANTS: &str = "Constants";
}

/// One variable of a stage interface.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderPort {
    pub ty: TypeDesc,
    pub variable: String,
    pub value: Option<Value>,
    /// Binding semantic for languages that need one, e.g. `POSITION`.
    pub semantic: Option<String>,
}

impl ShaderPort {
    pub fn new(ty: TypeDesc, variable: &str) -> Self {
        Self {
            ty,
            variable: variable.to_string(),
            value: None,
            semantic: None,
        }
    }

    pub fn with_value(mut self, value: Option<Value>) -> Self {
        self.value = value;
        self
    }

    pub fn with_semantic(mut self, semantic: &str) -> Self {
        self.semantic = Some(semantic.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct VariableBlock {
    pub name: String,
    /// Instance name the block is accessed through, e.g. `vd` for vertex data.
    pub instance: String,
    ports: Vec<ShaderPort>,
}

impl VariableBlock {
    pub fn new(name: &str, instance: &str) -> Self {
        Self {
            name: name.to_string(),
            instance: instance.to_string(),
            ports: Vec::new(),
        }
    }

    /// Add `port` unless a port with the same variable is already present. Returns whether it
    /// was added.
    pub fn add(&mut self, port: ShaderPort) -> bool {
        if self.find(&port.variable).is_some() {
            return false;
        }
        self.ports.push(port);
        true
    }

    pub fn find(&self, variable: &str) -> Option<&ShaderPort> {
        self.ports.iter().find(|p| p.variable == variable)
    }

    pub fn ports(&self) -> &[ShaderPort] {
        &self.ports
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ShaderStage {
    pub name: String,
    uniforms: Vec<VariableBlock>,
    inputs: Vec<VariableBlock>,
    outputs: Vec<VariableBlock>,
    pub constants: VariableBlock,
    code: String,
}

impl ShaderStage {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            constants: VariableBlock::new(block::CONSTANTS, ""),
            ..Self::default()
        }
    }

    pub fn add_uniform_block(&mut self, name: &str, instance: &str) -> &mut VariableBlock {
        get_or_insert(&mut self.uniforms, name, instance)
    }

    pub fn add_input_block(&mut self, name: &str, instance: &str) -> &mut VariableBlock {
        get_or_insert(&mut self.inputs, name, instance)
    }

    pub fn add_output_block(&mut self, name: &str, instance: &str) -> &mut VariableBlock {
        get_or_insert(&mut self.outputs, name, instance)
    }

    pub fn uniform_block(&self, name: &str) -> Option<&VariableBlock> {
        self.uniforms.iter().find(|b| b.name == name)
    }

    pub fn input_block(&self, name: &str) -> Option<&VariableBlock> {
        self.inputs.iter().find(|b| b.name == name)
    }

    pub fn output_block(&self, name: &str) -> Option<&VariableBlock> {
        self.outputs.iter().find(|b| b.name == name)
    }

    pub fn uniform_blocks(&self) -> &[VariableBlock] {
        &self.uniforms
    }

    pub fn source_code(&self) -> &str {
        &self.code
    }

    pub fn set_source_code(&mut self, code: String) {
        self.code = code;
    }
}

fn get_or_insert<'a>(blocks: &'a mut Vec<VariableBlock>, name: &str, instance: &str) -> &'a mut VariableBlock {
    let index = match blocks.iter().position(|b| b.name == name) {
        Some(i) => i,
        None => {
            blocks.push(VariableBlock::new(name, instance));
            blocks.len() - 1
        }
    };
    &mut blocks[index]
}

/// Result of generation: the stages plus the graph they were emitted from.
#[derive(Debug, Clone)]
pub struct Shader {
    pub name: String,
    stages: Vec<ShaderStage>,
    graph: ShaderGraph,
    used_implementations: Vec<String>,
}

impl Shader {
    pub fn new(name: &str, graph: ShaderGraph) -> Self {
        Self {
            name: name.to_string(),
            stages: Vec::new(),
            graph,
            used_implementations: Vec::new(),
        }
    }

    pub fn add_stage(&mut self, stage: ShaderStage) {
        self.stages.push(stage);
    }

    pub fn stage(&self, name: &str) -> Option<&ShaderStage> {
        self.stages.iter().find(|s| s.name == name)
    }

    pub fn stages(&self) -> &[ShaderStage] {
        &self.stages
    }

    pub fn source_code(&self, stage: &str) -> Result<&str> {
        self.stage(stage)
            .map(ShaderStage::source_code)
            .ok_or_else(|| anyhow!("shader '{}' has no stage '{stage}'", self.name))
    }

    pub fn graph(&self) -> &ShaderGraph {
        &self.graph
    }

    /// Names of the node implementations the generated code uses, sorted.
    pub fn used_implementations(&self) -> &[String] {
        &self.used_implementations
    }

    pub fn set_used_implementations(&mut self, names: Vec<String>) {
        self.used_implementations = names;
    }
}
