//! Shader graph compiler: turns a material node graph into shader source for GLSL, Slang, OSL
//! and MDL.
//!
//! ```ignore
//! let library = library::load_default_library()?;
//! let doc = document::load_document_from_str(json)?;
//! let mut ctx = shadergen::GenContext::new(library);
//! let generator = shadergen::generator_for("genglsl")?;
//! let shader = generator.generate("my_material", doc.element("out")?, &mut ctx)?;
//! println!("{}", shader.source_code(shadergen::shader::PIXEL_STAGE)?);
//! ```

pub mod document;
pub mod error;
pub mod graph;
pub mod library;
pub mod shadergen;
pub mod syntax;
pub mod types;
pub mod utils;
pub mod validation;

pub use error::ShaderGenError;
pub use shadergen::{GenContext, GenOptions, Shader, ShaderGenerator, generator_for};
