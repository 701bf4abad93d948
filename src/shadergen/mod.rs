//! Code generation: one [`ShaderGenerator`] per target language.
//!
//! Every generator follows the same pipeline: build a [`ShaderGraph`](crate::graph::ShaderGraph)
//! for the requested element, run the graph passes, then emit the node calls into the target's
//! stage layout. The shared emission rules live in [`emit`]; hardware-only closure handling lives
//! in [`hw`].

pub mod context;
pub mod emit;
pub mod glsl;
pub mod hw;
pub mod mdl;
pub mod osl;
pub mod shader;
pub mod slang;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::document::Element;
use crate::syntax::Syntax;

pub use context::{ClosureContext, ClosureContextType, GenContext};
pub use glsl::GlslShaderGenerator;
pub use mdl::MdlShaderGenerator;
pub use osl::OslShaderGenerator;
pub use shader::{Shader, ShaderPort, ShaderStage, VariableBlock};
pub use slang::SlangShaderGenerator;

const DEFAULT_OPTIONS_JSON: &str = include_str!("../../assets/gen-options.json");

/// Which unconnected inputs become public uniforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceType {
    /// Every editable input is published.
    Complete,
    /// Only file-texture filenames are published; everything else stays a literal.
    #[default]
    Reduced,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenOptions {
    pub shader_interface_type: InterfaceType,
    pub flatten_subgraphs: bool,
    pub elide_constant_nodes: bool,
    pub fold_constant_conditionals: bool,
    pub emit_omission_comments: bool,
}

impl Default for GenOptions {
    fn default() -> Self {
        Self {
            shader_interface_type: InterfaceType::Reduced,
            flatten_subgraphs: true,
            elide_constant_nodes: false,
            fold_constant_conditionals: false,
            emit_omission_comments: true,
        }
    }
}

impl GenOptions {
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("failed to parse generator options json")
    }
}

/// Options bundled with the crate.
pub fn load_default_options() -> Result<GenOptions> {
    GenOptions::from_json_str(DEFAULT_OPTIONS_JSON)
}

pub trait ShaderGenerator {
    /// Language the generated source is written in, e.g. `genglsl`.
    fn language(&self) -> &str;

    /// Implementation target looked up in the node library.
    fn target(&self) -> &str;

    fn syntax(&self) -> &Syntax;

    /// Generate the shader computing `element`.
    fn generate(&self, name: &str, element: Element<'_>, ctx: &mut GenContext) -> Result<Shader>;
}

/// Generator for a target name (`genglsl`, `genslang`, `genosl`, `genmdl`).
pub fn generator_for(target: &str) -> Result<Box<dyn ShaderGenerator>> {
    Ok(match target {
        glsl::TARGET => Box::new(GlslShaderGenerator::new()),
        slang::TARGET => Box::new(SlangShaderGenerator::new()),
        osl::TARGET => Box::new(OslShaderGenerator::new()),
        mdl::TARGET => Box::new(MdlShaderGenerator::new()),
        other => bail!("unknown shader generation target '{other}'"),
    })
}
