//! GLSL validation using the naga library.
//!
//! naga's GLSL front end accepts the Vulkan-flavored 440/450/460 dialects, so this is meant for
//! hardware stages written against those versions (or rewritten to them by the caller).

use anyhow::{Context, Result, anyhow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlslStage {
    Vertex,
    Fragment,
}

impl GlslStage {
    /// Stage for a shader stage name, e.g. `pixel` is a fragment stage.
    pub fn from_stage_name(name: &str) -> Result<Self> {
        match name {
            crate::shadergen::shader::VERTEX_STAGE => Ok(GlslStage::Vertex),
            crate::shadergen::shader::PIXEL_STAGE => Ok(GlslStage::Fragment),
            other => Err(anyhow!("no GLSL stage for shader stage '{other}'")),
        }
    }

    fn naga(self) -> naga::ShaderStage {
        match self {
            GlslStage::Vertex => naga::ShaderStage::Vertex,
            GlslStage::Fragment => naga::ShaderStage::Fragment,
        }
    }
}

fn parse_glsl(source: &str, stage: GlslStage) -> Result<naga::Module> {
    let mut parser = naga::front::glsl::Frontend::default();
    let options = naga::front::glsl::Options {
        stage: stage.naga(),
        defines: Default::default(),
    };
    parser
        .parse(&options, source)
        .map_err(|e| anyhow!("GLSL parse failed: {e:?}\n{}", numbered(source)))
}

/// Parse and validate GLSL source, returning the naga module and its validation info.
pub fn validate_glsl(source: &str, stage: GlslStage) -> Result<(naga::Module, naga::valid::ModuleInfo)> {
    let module = parse_glsl(source, stage)?;
    let info = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|e| anyhow!("GLSL validation failed: {e:?}"))?;
    Ok((module, info))
}

/// Validate GLSL and name what produced it in the error.
pub fn validate_glsl_with_context(source: &str, stage: GlslStage, context: &str) -> Result<naga::Module> {
    validate_glsl(source, stage)
        .map(|(module, _)| module)
        .with_context(|| format!("{context} generated invalid GLSL"))
}

/// Cross-compile validated GLSL to WGSL.
pub fn glsl_to_wgsl(source: &str, stage: GlslStage) -> Result<String> {
    let (module, info) = validate_glsl(source, stage)?;
    naga::back::wgsl::write_string(&module, &info, naga::back::wgsl::WriterFlags::EXPLICIT_TYPES)
        .map_err(|e| anyhow!("WGSL writer failed: {e:?}"))
}

fn numbered(source: &str) -> String {
    let mut output = String::from("---\n");
    for (line_num, line) in source.lines().enumerate() {
        output.push_str(&format!("{:4} | {}\n", line_num + 1, line));
    }
    output.push_str("---\n");
    output
}
