//! Language syntax layer.
//!
//! A [`Syntax`] maps the abstract type/value model onto one target language: native type names,
//! literal rendering, identifier rules and swizzle synthesis. Every backend builds the same
//! struct from its own tables (see the per-language modules), so the rest of the compiler never
//! branches on the language.

pub mod glsl;
pub mod mdl;
pub mod osl;
pub mod slang;

use std::collections::{HashMap, HashSet};

use anyhow::{Result, bail};

use crate::error::ShaderGenError;
use crate::types::{BaseType, TypeDesc, Value};
use crate::utils::{fmt_float, sanitize_ident};

/// How a type's literal values are spelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueStyle {
    /// Single component written as-is.
    Scalar,
    /// `name(c0, c1, ...)`.
    Constructor,
    /// `name(c0, c1)` locally, `{c0, c1}` as a uniform initializer.
    StructLiteral,
    /// Double-quoted string.
    Quoted,
    /// No literal form (samplers, closures); the default value is used.
    Opaque,
    /// `elem[N](c0, ...)`.
    SizedArray { element: String },
    /// `{c0, ...}`; an empty uniform array is rejected.
    BraceArray,
    /// `name(color(c0, c1, c2), c3)` locally, `{color(c0, c1, c2), c3}` as uniform.
    ColorAlpha { color: String },
    /// `maker(c0, c1, ...)`, for struct types built by a helper function.
    Maker { function: String },
    /// 3x3 matrix widened into a 4x4 constructor.
    PromotedMatrix33,
    /// `prefix"value"suffix`, e.g. a texture resource constructor.
    Wrapped { prefix: String, suffix: String },
}

#[derive(Debug, Clone)]
pub struct TypeSyntax {
    pub name: String,
    pub default_value: String,
    pub uniform_default_value: String,
    /// Native type the name stands for, when the name is a define or typedef.
    pub type_alias: String,
    /// Source emitted once before any function that uses the type.
    pub type_definition: String,
    /// Member accessors in channel order, e.g. `.x`, `.y`.
    pub members: Vec<String>,
    /// Member types for struct values, in member order.
    pub member_types: Vec<String>,
    pub style: ValueStyle,
}

impl TypeSyntax {
    pub fn scalar(name: &str, default_value: &str) -> Self {
        Self {
            name: name.to_string(),
            default_value: default_value.to_string(),
            uniform_default_value: default_value.to_string(),
            type_alias: String::new(),
            type_definition: String::new(),
            members: Vec::new(),
            member_types: Vec::new(),
            style: ValueStyle::Scalar,
        }
    }

    pub fn aggregate(name: &str, default_value: &str, members: &[&str]) -> Self {
        Self {
            members: members.iter().map(|m| m.to_string()).collect(),
            style: ValueStyle::Constructor,
            ..Self::scalar(name, default_value)
        }
    }

    pub fn with_style(mut self, style: ValueStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_uniform_default(mut self, value: &str) -> Self {
        self.uniform_default_value = value.to_string();
        self
    }

    pub fn with_definition(mut self, alias: &str, definition: &str) -> Self {
        self.type_alias = alias.to_string();
        self.type_definition = definition.to_string();
        self
    }

    pub fn with_member_types(mut self, types: &[&str]) -> Self {
        self.member_types = types.iter().map(|t| t.to_string()).collect();
        self
    }
}

/// Rewrites applied to identifiers after character sanitizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamePrefixRule {
    None,
    /// Prefix names that start with an underscore.
    LeadingUnderscore(String),
    /// Prefix names that start with a digit.
    LeadingDigit(String),
}

/// Per-scope table of names already handed out, keyed by base name with its last suffix.
#[derive(Debug, Clone, Default)]
pub struct UniqueNames {
    counts: HashMap<String, usize>,
}

impl UniqueNames {
    pub fn contains(&self, name: &str) -> bool {
        self.counts.contains_key(name)
    }

    pub fn reserve(&mut self, name: &str) {
        self.counts.entry(name.to_string()).or_insert(0);
    }
}

#[derive(Debug, Clone)]
pub struct Syntax {
    language: String,
    types: HashMap<String, TypeSyntax>,
    unsupported: HashSet<String>,
    restricted: HashSet<String>,
    invalid_tokens: Vec<(String, String)>,
    prefix_rule: NamePrefixRule,
    pub output_qualifier: String,
    pub uniform_qualifier: String,
    pub constant_qualifier: String,
    /// Functions hand back their single output as a return value instead of an out parameter.
    pub outputs_by_return: bool,
    pub comment_prefix: String,
}

impl Syntax {
    pub fn new(language: &str) -> Self {
        Self {
            language: language.to_string(),
            types: HashMap::new(),
            unsupported: HashSet::new(),
            restricted: HashSet::new(),
            invalid_tokens: Vec::new(),
            prefix_rule: NamePrefixRule::None,
            output_qualifier: "out".to_string(),
            uniform_qualifier: "uniform".to_string(),
            constant_qualifier: "const".to_string(),
            outputs_by_return: false,
            comment_prefix: "//".to_string(),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Register the syntax for a type. The native name becomes a restricted identifier.
    pub fn register_type_syntax(&mut self, type_name: &str, syntax: TypeSyntax) {
        self.restricted.insert(syntax.name.clone());
        self.types.insert(type_name.to_string(), syntax);
    }

    pub fn register_reserved_words(&mut self, words: &[&str]) {
        self.restricted.extend(words.iter().map(|w| w.to_string()));
    }

    pub fn register_invalid_tokens(&mut self, tokens: &[(&str, &str)]) {
        self.invalid_tokens
            .extend(tokens.iter().map(|(a, b)| (a.to_string(), b.to_string())));
    }

    pub fn set_prefix_rule(&mut self, rule: NamePrefixRule) {
        self.prefix_rule = rule;
    }

    pub fn mark_unsupported(&mut self, type_name: &str) {
        self.unsupported.insert(type_name.to_string());
    }

    pub fn is_reserved(&self, name: &str) -> bool {
        self.restricted.contains(name)
    }

    pub fn type_supported(&self, ty: &TypeDesc) -> bool {
        !self.unsupported.contains(ty.name()) && self.types.contains_key(ty.name())
    }

    pub fn type_syntax(&self, ty: &TypeDesc) -> Result<&TypeSyntax> {
        self.types.get(ty.name()).ok_or_else(|| {
            ShaderGenError::UnsupportedType {
                type_name: ty.name().to_string(),
                language: self.language.clone(),
            }
            .into()
        })
    }

    pub fn type_name(&self, ty: &TypeDesc) -> Result<&str> {
        Ok(&self.type_syntax(ty)?.name)
    }

    /// Type name as written for a function output parameter, e.g. `out vec3`.
    pub fn output_type_name(&self, ty: &TypeDesc) -> Result<String> {
        let name = self.type_name(ty)?;
        Ok(if self.output_qualifier.is_empty() {
            name.to_string()
        } else {
            format!("{} {}", self.output_qualifier, name)
        })
    }

    pub fn default_value(&self, ty: &TypeDesc, uniform: bool) -> Result<String> {
        let ts = self.type_syntax(ty)?;
        Ok(if uniform {
            ts.uniform_default_value.clone()
        } else {
            ts.default_value.clone()
        })
    }

    /// Render a literal of `ty`.
    pub fn value(&self, ty: &TypeDesc, value: &Value, uniform: bool) -> Result<String> {
        let ts = self.type_syntax(ty)?;
        match (&ts.style, value) {
            (ValueStyle::Opaque, _) => Ok(self.default_value(ty, uniform)?),
            (ValueStyle::Quoted, v) => Ok(format!("\"{}\"", v.value_string())),
            (ValueStyle::Wrapped { prefix, suffix }, v) => {
                let text = v.value_string();
                if text.is_empty() {
                    Ok(self.default_value(ty, uniform)?)
                } else {
                    Ok(format!("{prefix}\"{text}\"{suffix}"))
                }
            }
            // Strings in a language without strings only get here after enumeration remapping.
            (ValueStyle::Scalar, Value::String(_)) => Ok(ts.default_value.clone()),
            (ValueStyle::Scalar, Value::Boolean(b)) => Ok(b.to_string()),
            (ValueStyle::Scalar, Value::Integer(i)) => Ok(i.to_string()),
            (_, Value::Aggregate(members)) => {
                let mut parts = Vec::with_capacity(members.len());
                for (i, m) in members.iter().enumerate() {
                    let Some(member_type) = ts.member_types.get(i) else {
                        bail!("too many members in value for struct type '{}'", ty.name());
                    };
                    parts.push(self.value(&struct_member_desc(member_type, m), m, uniform)?);
                }
                Ok(format!("{}({})", ts.name, parts.join(", ")))
            }
            (ValueStyle::SizedArray { .. } | ValueStyle::BraceArray, v) => {
                let parts = array_components(v);
                if parts.is_empty() && uniform && ts.style == ValueStyle::BraceArray {
                    return Err(ShaderGenError::EmptyUniformArray {
                        type_name: ty.name().to_string(),
                    }
                    .into());
                }
                Ok(compose(ts, &parts, uniform))
            }
            (_, v) => {
                let parts: Vec<String> = if ty.base_type() == BaseType::Integer {
                    v.components().iter().map(|f| (*f as i32).to_string()).collect()
                } else {
                    v.components().iter().map(|f| fmt_float(*f)).collect()
                };
                if parts.is_empty() {
                    bail!("value '{}' has no components for type '{}'", v.value_string(), ty.name());
                }
                Ok(compose(ts, &parts, uniform))
            }
        }
    }

    /// Synthesize an expression selecting `channels` from `src_name` (of `src_type`) into a
    /// value of `dst_type`. `0` and `1` in the pattern are literal fills.
    pub fn swizzled_variable(
        &self,
        src_name: &str,
        src_type: &TypeDesc,
        channels: &str,
        dst_type: &TypeDesc,
    ) -> Result<String> {
        let invalid = || -> anyhow::Error {
            ShaderGenError::InvalidSwizzle {
                channels: channels.to_string(),
                type_name: src_type.name().to_string(),
            }
            .into()
        };
        let src = self.type_syntax(src_type)?;
        let dst = self.type_syntax(dst_type)?;
        let (zero, one) = if dst_type.base_type() == BaseType::Integer {
            ("0", "1")
        } else {
            ("0.0", "1.0")
        };

        let mut parts = Vec::with_capacity(channels.len());
        for ch in channels.chars() {
            match ch {
                '0' => parts.push(zero.to_string()),
                '1' => parts.push(one.to_string()),
                _ => {
                    let index = src_type.channel_index(ch).map_err(|_| invalid())?;
                    if src.members.is_empty() {
                        if index > 0 {
                            return Err(invalid());
                        }
                        parts.push(src_name.to_string());
                    } else {
                        let member = src.members.get(index).ok_or_else(invalid)?;
                        parts.push(format!("{src_name}{member}"));
                    }
                }
            }
        }
        if parts.len() != dst_type.size().max(1) {
            return Err(invalid());
        }
        Ok(compose(dst, &parts, false))
    }

    /// Sanitize an identifier for this language.
    pub fn make_valid_name(&self, name: &str) -> String {
        let mut name = sanitize_ident(name);
        for (from, to) in &self.invalid_tokens {
            if name.contains(from.as_str()) {
                name = name.replace(from.as_str(), to);
            }
        }
        match &self.prefix_rule {
            NamePrefixRule::LeadingUnderscore(p) if name.starts_with('_') => format!("{p}{name}"),
            NamePrefixRule::LeadingDigit(p) if name.starts_with(|c: char| c.is_ascii_digit()) => {
                format!("{p}{name}")
            }
            _ => name,
        }
    }

    /// Fresh name table for one emission scope, pre-seeded with the restricted words.
    pub fn unique_names(&self) -> UniqueNames {
        let mut names = UniqueNames::default();
        for w in &self.restricted {
            names.reserve(w);
        }
        names
    }

    /// Make `name` valid and unique within `names`, appending an increasing numeric suffix
    /// until no collision remains.
    pub fn make_unique(&self, name: &str, names: &mut UniqueNames) -> String {
        let base = self.make_valid_name(name);
        let Some(&count) = names.counts.get(&base) else {
            names.counts.insert(base.clone(), 0);
            return base;
        };
        let mut n = count;
        let candidate = loop {
            n += 1;
            let candidate = format!("{base}{n}");
            if !names.counts.contains_key(&candidate) {
                break candidate;
            }
        };
        names.counts.insert(base, n);
        names.counts.insert(candidate.clone(), 0);
        candidate
    }

    /// Replace a string value by its index in a comma-separated enumeration, for languages
    /// without a native string type. Returns `None` when no remapping applies.
    pub fn remap_enumeration(
        &self,
        value: &str,
        ty: &TypeDesc,
        enum_names: &str,
    ) -> Result<Option<Value>> {
        if enum_names.is_empty() || ty.base_type() != BaseType::String || self.type_supported(ty)
        {
            return Ok(None);
        }
        if value.is_empty() {
            return Ok(Some(Value::Integer(0)));
        }
        let index = enum_names
            .split(',')
            .map(str::trim)
            .position(|e| e == value)
            .ok_or_else(|| ShaderGenError::InvalidValue {
                value: value.to_string(),
                type_name: ty.name().to_string(),
            })?;
        Ok(Some(Value::Integer(index as i32)))
    }

    /// Type definitions for the given types, in the order given, skipping duplicates.
    pub fn type_definitions<'a>(&self, types: impl IntoIterator<Item = &'a TypeDesc>) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for ty in types {
            let Some(ts) = self.types.get(ty.name()) else {
                continue;
            };
            if !ts.type_definition.is_empty() && seen.insert(ts.type_definition.clone()) {
                out.push(ts.type_definition.clone());
            }
        }
        out
    }
}

fn compose(ts: &TypeSyntax, parts: &[String], uniform: bool) -> String {
    let list = parts.join(", ");
    match &ts.style {
        ValueStyle::Scalar | ValueStyle::Opaque | ValueStyle::Quoted | ValueStyle::Wrapped { .. } => {
            parts.first().cloned().unwrap_or_else(|| ts.default_value.clone())
        }
        ValueStyle::Constructor => format!("{}({list})", ts.name),
        ValueStyle::StructLiteral if uniform => format!("{{{list}}}"),
        ValueStyle::StructLiteral => format!("{}({list})", ts.name),
        ValueStyle::SizedArray { element } => format!("{element}[{}]({list})", parts.len()),
        ValueStyle::BraceArray => format!("{{{list}}}"),
        ValueStyle::ColorAlpha { color } => {
            let (rgb, a) = parts.split_at(parts.len().saturating_sub(1));
            let alpha = a.first().map(String::as_str).unwrap_or("1.0");
            if uniform {
                format!("{{{color}({}), {alpha}}}", rgb.join(", "))
            } else {
                format!("{}({color}({}), {alpha})", ts.name, rgb.join(", "))
            }
        }
        ValueStyle::Maker { function } => format!("{function}({list})"),
        ValueStyle::PromotedMatrix33 => {
            if parts.len() == 9 {
                let p = |i: usize| parts[i].as_str();
                format!(
                    "{}({}, {}, {}, 0.0, {}, {}, {}, 0.0, {}, {}, {}, 0.0, 0.0, 0.0, 0.0, 1.0)",
                    ts.name,
                    p(0),
                    p(1),
                    p(2),
                    p(3),
                    p(4),
                    p(5),
                    p(6),
                    p(7),
                    p(8)
                )
            } else {
                format!("{}({list})", ts.name)
            }
        }
    }
}

fn array_components(v: &Value) -> Vec<String> {
    match v {
        Value::IntegerArray(a) => a.iter().map(|i| i.to_string()).collect(),
        Value::FloatArray(a) => a.iter().map(|f| fmt_float(*f)).collect(),
        other => other
            .components()
            .iter()
            .map(|f| fmt_float(*f))
            .collect(),
    }
}

/// Descriptor for a struct member, derived from its value when the registry is not at hand.
fn struct_member_desc(type_name: &str, value: &Value) -> TypeDesc {
    use crate::types::Semantic;
    let (base, size) = match value {
        Value::Boolean(_) => (BaseType::Boolean, 1),
        Value::Integer(_) => (BaseType::Integer, 1),
        Value::Float(_) => (BaseType::Float, 1),
        Value::Floats(v) => (BaseType::Float, v.len()),
        Value::String(_) => (BaseType::String, 1),
        Value::IntegerArray(_) => (BaseType::Integer, 0),
        Value::FloatArray(_) => (BaseType::Float, 0),
        Value::Aggregate(_) => (BaseType::None, 1),
    };
    TypeDesc::new(type_name, base, Semantic::None, size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeRegistry;

    fn reg() -> TypeRegistry {
        TypeRegistry::standard()
    }

    #[test]
    fn make_unique_escalates_past_taken_suffixes() {
        let syntax = glsl::syntax();
        let mut names = syntax.unique_names();
        assert_eq!(syntax.make_unique("add1_out", &mut names), "add1_out");
        assert_eq!(syntax.make_unique("add1_out", &mut names), "add1_out1");
        assert_eq!(syntax.make_unique("add1_out", &mut names), "add1_out2");

        names.reserve("n1");
        assert_eq!(syntax.make_unique("n", &mut names), "n");
        assert_eq!(syntax.make_unique("n", &mut names), "n2");
    }

    #[test]
    fn make_unique_never_returns_reserved_words() {
        let syntax = glsl::syntax();
        let mut names = syntax.unique_names();
        assert_eq!(syntax.make_unique("float", &mut names), "float1");
        assert_eq!(syntax.make_unique("vec3", &mut names), "vec31");
        assert_eq!(syntax.make_unique("texture", &mut names), "texture1");
    }

    #[test]
    fn swizzle_rejects_out_of_range_and_bad_characters() {
        let r = reg();
        let syntax = glsl::syntax();
        let c3 = r.get_type("color3").unwrap();
        let c4 = r.get_type("color4").unwrap();
        let err = syntax.swizzled_variable("c", &c3, "rgba", &c4).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ShaderGenError>(),
            Some(ShaderGenError::InvalidSwizzle { .. })
        ));
        assert!(syntax.swizzled_variable("c", &c3, "rgq", &c3).is_err());
        assert!(syntax.swizzled_variable("c", &c3, "rg", &c3).is_err());
    }

    #[test]
    fn swizzle_pads_with_literal_fills() {
        let r = reg();
        let syntax = glsl::syntax();
        let v2 = r.get_type("vector2").unwrap();
        let c4 = r.get_type("color4").unwrap();
        assert_eq!(
            syntax.swizzled_variable("uv", &v2, "xy01", &c4).unwrap(),
            "vec4(uv.x, uv.y, 0.0, 1.0)"
        );
        let f = r.get_type("float").unwrap();
        let c3 = r.get_type("color3").unwrap();
        assert_eq!(
            syntax.swizzled_variable("x", &f, "rrr", &c3).unwrap(),
            "vec3(x, x, x)"
        );
        assert_eq!(syntax.swizzled_variable("c", &c3, "b", &f).unwrap(), "c.z");
    }

    #[test]
    fn enumeration_remaps_strings_to_indices() {
        let r = reg();
        let syntax = glsl::syntax();
        let s = r.get_type("string").unwrap();
        let v = syntax
            .remap_enumeration("periodic", &s, "constant, clamp, periodic, mirror")
            .unwrap();
        assert_eq!(v, Some(Value::Integer(2)));
        assert!(
            syntax
                .remap_enumeration("wrap", &s, "constant, clamp, periodic, mirror")
                .is_err()
        );
        assert_eq!(syntax.remap_enumeration("periodic", &s, "").unwrap(), None);

        // OSL keeps strings as strings.
        let osl = osl::syntax();
        assert_eq!(
            osl.remap_enumeration("periodic", &s, "constant, clamp, periodic")
                .unwrap(),
            None
        );
    }
}
