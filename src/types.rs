//! Type/value model: the registry of semantic data types and the values they carry.
//!
//! A [`TypeRegistry`] is built once (usually via [`TypeRegistry::standard`]) and then shared
//! read-only by every compilation. [`TypeDesc`] handles are cheap to clone and compare by name.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use anyhow::Result;

use crate::error::ShaderGenError;
use crate::utils::fmt_float;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseType {
    None,
    Boolean,
    Integer,
    Float,
    String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Semantic {
    None,
    Color,
    Vector,
    Matrix,
    Filename,
    Closure,
    Shader,
}

#[derive(Debug)]
struct TypeInfo {
    name: String,
    base: BaseType,
    semantic: Semantic,
    size: usize,
    editable: bool,
    channels: HashMap<char, usize>,
}

/// Descriptor of one registered data type. Identity is the registered name.
#[derive(Clone)]
pub struct TypeDesc(Arc<TypeInfo>);

impl TypeDesc {
    pub fn new(name: &str, base: BaseType, semantic: Semantic, size: usize) -> Self {
        let editable = !matches!(semantic, Semantic::Closure | Semantic::Shader)
            && base != BaseType::None;
        TypeDesc(Arc::new(TypeInfo {
            name: name.to_string(),
            base,
            semantic,
            size,
            editable,
            channels: HashMap::new(),
        }))
    }

    /// Attach a channel map. Each character in `pattern` maps to its position, so `"rgba"`
    /// maps `r` to 0 and `a` to 3. Several patterns may be combined (`"rgb"` and `"xyz"`).
    pub fn with_channels(mut self, patterns: &[&str]) -> Self {
        if let Some(info) = Arc::get_mut(&mut self.0) {
            for p in patterns {
                for (i, c) in p.chars().enumerate() {
                    info.channels.insert(c, i);
                }
            }
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn base_type(&self) -> BaseType {
        self.0.base
    }

    pub fn semantic(&self) -> Semantic {
        self.0.semantic
    }

    /// Component count; 0 for variable-length arrays.
    pub fn size(&self) -> usize {
        self.0.size
    }

    pub fn is_editable(&self) -> bool {
        self.0.editable
    }

    pub fn is_scalar(&self) -> bool {
        self.0.size == 1
    }

    pub fn is_array(&self) -> bool {
        self.0.size == 0 && matches!(self.0.base, BaseType::Integer | BaseType::Float)
    }

    pub fn is_aggregate(&self) -> bool {
        self.0.size > 1 || self.0.semantic == Semantic::Shader
    }

    pub fn is_closure(&self) -> bool {
        matches!(self.0.semantic, Semantic::Closure | Semantic::Shader)
    }

    pub fn is_float2(&self) -> bool {
        self.0.base == BaseType::Float && self.0.size == 2
    }

    pub fn is_float3(&self) -> bool {
        self.0.base == BaseType::Float && self.0.size == 3 && self.0.semantic != Semantic::Matrix
    }

    pub fn is_float4(&self) -> bool {
        self.0.base == BaseType::Float && self.0.size == 4 && self.0.semantic != Semantic::Matrix
    }

    /// Resolve a swizzle character to a component index.
    pub fn channel_index(&self, channel: char) -> Result<usize> {
        match self.0.channels.get(&channel) {
            Some(&i) if i < self.0.size.max(1) => Ok(i),
            _ => Err(ShaderGenError::InvalidChannel {
                channel,
                type_name: self.0.name.clone(),
            }
            .into()),
        }
    }
}

impl PartialEq for TypeDesc {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.name == other.0.name
    }
}

impl Eq for TypeDesc {}

impl Hash for TypeDesc {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.name.hash(state);
    }
}

impl fmt::Debug for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeDesc({})", self.0.name)
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

/// Well-known type names.
pub mod names {
    pub const NONE: &str = "none";
    pub const MULTIOUTPUT: &str = "multioutput";
    pub const BOOLEAN: &str = "boolean";
    pub const INTEGER: &str = "integer";
    pub const INTEGERARRAY: &str = "integerarray";
    pub const FLOAT: &str = "float";
    pub const FLOATARRAY: &str = "floatarray";
    pub const VECTOR2: &str = "vector2";
    pub const VECTOR3: &str = "vector3";
    pub const VECTOR4: &str = "vector4";
    pub const COLOR3: &str = "color3";
    pub const COLOR4: &str = "color4";
    pub const MATRIX33: &str = "matrix33";
    pub const MATRIX44: &str = "matrix44";
    pub const STRING: &str = "string";
    pub const FILENAME: &str = "filename";
    pub const BSDF: &str = "BSDF";
    pub const EDF: &str = "EDF";
    pub const VDF: &str = "VDF";
    pub const SURFACESHADER: &str = "surfaceshader";
    pub const VOLUMESHADER: &str = "volumeshader";
    pub const DISPLACEMENTSHADER: &str = "displacementshader";
    pub const LIGHTSHADER: &str = "lightshader";
    pub const MATERIAL: &str = "material";
}

/// Process-wide table of data types, immutable once compilation starts.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    order: Vec<TypeDesc>,
    by_name: HashMap<String, TypeDesc>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every standard type.
    pub fn standard() -> Self {
        use names::*;
        const COLOR: &[&str] = &["rgba", "xyzw"];
        const VECTOR: &[&str] = &["xyzw", "rgba"];

        let mut reg = TypeRegistry::new();
        let standard = [
            TypeDesc::new(NONE, BaseType::None, Semantic::None, 1),
            TypeDesc::new(MULTIOUTPUT, BaseType::None, Semantic::None, 1),
            TypeDesc::new(BOOLEAN, BaseType::Boolean, Semantic::None, 1),
            TypeDesc::new(INTEGER, BaseType::Integer, Semantic::None, 1).with_channels(&["x", "r"]),
            TypeDesc::new(INTEGERARRAY, BaseType::Integer, Semantic::None, 0),
            TypeDesc::new(FLOAT, BaseType::Float, Semantic::None, 1).with_channels(&["x", "r"]),
            TypeDesc::new(FLOATARRAY, BaseType::Float, Semantic::None, 0),
            TypeDesc::new(VECTOR2, BaseType::Float, Semantic::Vector, 2).with_channels(VECTOR),
            TypeDesc::new(VECTOR3, BaseType::Float, Semantic::Vector, 3).with_channels(VECTOR),
            TypeDesc::new(VECTOR4, BaseType::Float, Semantic::Vector, 4).with_channels(VECTOR),
            TypeDesc::new(COLOR3, BaseType::Float, Semantic::Color, 3).with_channels(COLOR),
            TypeDesc::new(COLOR4, BaseType::Float, Semantic::Color, 4).with_channels(COLOR),
            TypeDesc::new(MATRIX33, BaseType::Float, Semantic::Matrix, 9),
            TypeDesc::new(MATRIX44, BaseType::Float, Semantic::Matrix, 16),
            TypeDesc::new(STRING, BaseType::String, Semantic::None, 1),
            TypeDesc::new(FILENAME, BaseType::String, Semantic::Filename, 1),
            TypeDesc::new(BSDF, BaseType::None, Semantic::Closure, 1),
            TypeDesc::new(EDF, BaseType::None, Semantic::Closure, 1),
            TypeDesc::new(VDF, BaseType::None, Semantic::Closure, 1),
            TypeDesc::new(SURFACESHADER, BaseType::None, Semantic::Shader, 1),
            TypeDesc::new(VOLUMESHADER, BaseType::None, Semantic::Shader, 1),
            TypeDesc::new(DISPLACEMENTSHADER, BaseType::None, Semantic::Shader, 1),
            TypeDesc::new(LIGHTSHADER, BaseType::None, Semantic::Shader, 1),
            TypeDesc::new(MATERIAL, BaseType::None, Semantic::Shader, 1),
        ];
        for ty in standard {
            reg.order.push(ty.clone());
            reg.by_name.insert(ty.name().to_string(), ty);
        }
        reg
    }

    /// Register a fully described type. First registration wins: a second type with the same
    /// name is rejected and the registry keeps the original.
    pub fn register(&mut self, ty: TypeDesc) -> Result<TypeDesc> {
        if self.by_name.contains_key(ty.name()) {
            return Err(ShaderGenError::DuplicateType {
                name: ty.name().to_string(),
            }
            .into());
        }
        self.order.push(ty.clone());
        self.by_name.insert(ty.name().to_string(), ty.clone());
        Ok(ty)
    }

    /// Register a plain type from its base type, size and channel pattern (e.g. `"xyz"`).
    pub fn register_type(
        &mut self,
        name: &str,
        base: BaseType,
        size: usize,
        channels: &str,
    ) -> Result<TypeDesc> {
        let ty = TypeDesc::new(name, base, Semantic::None, size).with_channels(&[channels]);
        self.register(ty)
    }

    pub fn get_type(&self, name: &str) -> Result<TypeDesc> {
        self.find(name).ok_or_else(|| {
            ShaderGenError::UnknownType {
                name: name.to_string(),
            }
            .into()
        })
    }

    pub fn find(&self, name: &str) -> Option<TypeDesc> {
        self.by_name.get(name).cloned()
    }

    pub fn channel_index_of(&self, type_name: &str, channel: char) -> Result<usize> {
        self.get_type(type_name)?.channel_index(channel)
    }

    /// Types in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &TypeDesc> {
        self.order.iter()
    }
}

/// One concrete instance of a type's data.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    Integer(i32),
    Float(f32),
    /// Fixed-size float tuples: vectors, colors and matrices (row-major).
    Floats(Vec<f32>),
    String(String),
    IntegerArray(Vec<i32>),
    FloatArray(Vec<f32>),
    /// Struct values, one member value per struct member.
    Aggregate(Vec<Value>),
}

impl Value {
    /// Parse a document value string as the given type.
    pub fn parse(ty: &TypeDesc, text: &str) -> Result<Value> {
        let invalid = || -> anyhow::Error {
            ShaderGenError::InvalidValue {
                value: text.to_string(),
                type_name: ty.name().to_string(),
            }
            .into()
        };
        let text_trimmed = text.trim();
        let value = match (ty.base_type(), ty.size()) {
            (BaseType::Boolean, _) => match text_trimmed {
                "true" => Value::Boolean(true),
                "false" => Value::Boolean(false),
                _ => return Err(invalid()),
            },
            (BaseType::Integer, 0) => Value::IntegerArray(
                split_list(text_trimmed)
                    .map(|s| s.parse::<i32>().map_err(|_| invalid()))
                    .collect::<Result<_>>()?,
            ),
            (BaseType::Integer, _) => {
                Value::Integer(text_trimmed.parse::<i32>().map_err(|_| invalid())?)
            }
            (BaseType::Float, 0) => Value::FloatArray(parse_floats(text_trimmed).ok_or_else(invalid)?),
            (BaseType::Float, 1) => {
                Value::Float(text_trimmed.parse::<f32>().map_err(|_| invalid())?)
            }
            (BaseType::Float, n) => {
                let v = parse_floats(text_trimmed).ok_or_else(invalid)?;
                if v.len() != n {
                    return Err(invalid());
                }
                Value::Floats(v)
            }
            (BaseType::String, _) => Value::String(text.to_string()),
            (BaseType::None, _) => return Err(invalid()),
        };
        Ok(value)
    }

    /// True when this value's tag can be paired with `ty`.
    pub fn matches(&self, ty: &TypeDesc) -> bool {
        match self {
            Value::Boolean(_) => ty.base_type() == BaseType::Boolean,
            Value::Integer(_) => ty.base_type() == BaseType::Integer && ty.size() == 1,
            Value::Float(_) => ty.base_type() == BaseType::Float && ty.size() == 1,
            Value::Floats(v) => ty.base_type() == BaseType::Float && ty.size() == v.len(),
            Value::String(_) => ty.base_type() == BaseType::String,
            Value::IntegerArray(_) => ty.base_type() == BaseType::Integer && ty.size() == 0,
            Value::FloatArray(_) => ty.base_type() == BaseType::Float && ty.size() == 0,
            Value::Aggregate(_) => ty.base_type() == BaseType::None,
        }
    }

    /// Scalar view used when a control value picks a branch.
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Integer(i) => Some(*i as f32),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Float components of numeric values, widened from scalars where needed.
    pub fn components(&self) -> Vec<f32> {
        match self {
            Value::Boolean(b) => vec![if *b { 1.0 } else { 0.0 }],
            Value::Integer(i) => vec![*i as f32],
            Value::Float(f) => vec![*f],
            Value::Floats(v) | Value::FloatArray(v) => v.clone(),
            Value::IntegerArray(v) => v.iter().map(|i| *i as f32).collect(),
            Value::String(_) | Value::Aggregate(_) => Vec::new(),
        }
    }

    /// Textual form, the inverse of [`Value::parse`].
    pub fn value_string(&self) -> String {
        match self {
            Value::Boolean(b) => b.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => fmt_float(*f),
            Value::Floats(v) | Value::FloatArray(v) => join_floats(v),
            Value::String(s) => s.clone(),
            Value::IntegerArray(v) => v
                .iter()
                .map(|i| i.to_string())
                .collect::<Vec<_>>()
                .join(", "),
            Value::Aggregate(members) => members
                .iter()
                .map(Value::value_string)
                .collect::<Vec<_>>()
                .join("; "),
        }
    }
}

fn split_list(text: &str) -> impl Iterator<Item = &str> {
    text.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_floats(text: &str) -> Option<Vec<f32>> {
    split_list(text).map(|s| s.parse::<f32>().ok()).collect()
}

pub(crate) fn join_floats(v: &[f32]) -> String {
    v.iter().map(|f| fmt_float(*f)).collect::<Vec<_>>().join(", ")
}
