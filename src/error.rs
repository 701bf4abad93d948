//! Typed failures raised by the compiler.
//!
//! Everything public returns `anyhow::Result`; the variants below are the root causes callers
//! can `downcast_ref` to when they need to react to a specific failure (for example, falling back
//! to another target on `MissingImplementation`).

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShaderGenError {
    #[error("type '{name}' is already registered")]
    DuplicateType { name: String },

    #[error("unknown type '{name}'")]
    UnknownType { name: String },

    #[error("invalid channel '{channel}' for type '{type_name}'")]
    InvalidChannel { channel: char, type_name: String },

    #[error("invalid channel pattern '{channels}' for type '{type_name}'")]
    InvalidSwizzle { channels: String, type_name: String },

    #[error("value '{value}' is not a valid '{type_name}'")]
    InvalidValue { value: String, type_name: String },

    #[error("type '{type_name}' is not supported by language '{language}'")]
    UnsupportedType { type_name: String, language: String },

    #[error("could not find a nodedef for node '{node}'")]
    MissingNodeDef { node: String },

    #[error(
        "could not find a matching implementation for node '{node}' matching language '{language}' and target '{target}'"
    )]
    MissingImplementation {
        node: String,
        language: String,
        target: String,
    },

    #[error("encountered a cycle in graph at node '{node}' (path: {})", .path.join(" -> "))]
    Cycle { node: String, path: Vec<String> },

    #[error("uniform array of type '{type_name}' cannot initialize to an empty value")]
    EmptyUniformArray { type_name: String },
}

impl ShaderGenError {
    pub fn cycle(path: Vec<String>) -> Self {
        let node = path.last().cloned().unwrap_or_default();
        ShaderGenError::Cycle { node, path }
    }
}
