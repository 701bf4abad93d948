//! Slang syntax tables.

use super::{NamePrefixRule, Syntax, TypeSyntax, ValueStyle};
use crate::types::names;

pub const LANGUAGE: &str = "genslang";

const VEC2_MEMBERS: &[&str] = &[".x", ".y"];
const VEC3_MEMBERS: &[&str] = &[".x", ".y", ".z"];
const VEC4_MEMBERS: &[&str] = &[".x", ".y", ".z", ".w"];

const RESERVED_WORDS: &[&str] = &[
    "throws", "static", "const", "in", "out", "inout", "ref", "__subscript", "__init",
    "property", "get", "set", "class", "struct", "interface", "public", "private", "internal",
    "protected", "typedef", "typealias", "uniform", "export", "groupshared", "extension",
    "associatedtype", "this", "namespace", "This", "using", "__generic", "__exported", "import",
    "enum", "cbuffer", "tbuffer", "func", "if", "else", "switch", "case", "default", "return",
    "try", "throw", "catch", "while", "for", "do", "break", "continue", "discard", "defer", "is",
    "as", "nullptr", "none", "true", "false", "float", "int", "bool", "void", "Sampler2D",
    "SamplerTexture2D",
];

pub fn syntax() -> Syntax {
    let mut s = Syntax::new(LANGUAGE);
    s.register_reserved_words(RESERVED_WORDS);
    s.set_prefix_rule(NamePrefixRule::LeadingDigit("v_".into()));

    s.register_type_syntax(names::FLOAT, TypeSyntax::scalar("float", "0.0"));
    s.register_type_syntax(
        names::FLOATARRAY,
        TypeSyntax::scalar("float", "").with_style(ValueStyle::BraceArray),
    );
    s.register_type_syntax(names::INTEGER, TypeSyntax::scalar("int", "0"));
    s.register_type_syntax(
        names::INTEGERARRAY,
        TypeSyntax::scalar("int", "").with_style(ValueStyle::BraceArray),
    );
    s.register_type_syntax(names::BOOLEAN, TypeSyntax::scalar("bool", "false"));
    s.register_type_syntax(names::COLOR3, TypeSyntax::aggregate("float3", "float3(0.0)", VEC3_MEMBERS));
    s.register_type_syntax(names::COLOR4, TypeSyntax::aggregate("float4", "float4(0.0)", VEC4_MEMBERS));
    s.register_type_syntax(names::VECTOR2, TypeSyntax::aggregate("float2", "float2(0.0)", VEC2_MEMBERS));
    s.register_type_syntax(names::VECTOR3, TypeSyntax::aggregate("float3", "float3(0.0)", VEC3_MEMBERS));
    s.register_type_syntax(names::VECTOR4, TypeSyntax::aggregate("float4", "float4(0.0)", VEC4_MEMBERS));
    s.register_type_syntax(
        names::MATRIX33,
        TypeSyntax::aggregate("float3x3", "float3x3(1,0,0, 0,1,0, 0,0,1)", &[]),
    );
    s.register_type_syntax(
        names::MATRIX44,
        TypeSyntax::aggregate("float4x4", "float4x4(1,0,0,0, 0,1,0,0, 0,0,1,0, 0,0,0,1)", &[]),
    );
    s.register_type_syntax(names::STRING, TypeSyntax::scalar("int", "0"));
    s.mark_unsupported(names::STRING);
    s.register_type_syntax(
        names::FILENAME,
        TypeSyntax::scalar("Sampler2D", "").with_style(ValueStyle::Opaque),
    );
    s.register_type_syntax(
        names::BSDF,
        TypeSyntax::aggregate("BSDF", "BSDF(0.0)", &[])
            .with_style(ValueStyle::Opaque)
            .with_definition("float3", "#define BSDF float3"),
    );
    s.register_type_syntax(
        names::EDF,
        TypeSyntax::aggregate("EDF", "EDF(0.0)", &[])
            .with_style(ValueStyle::Opaque)
            .with_definition("float3", "#define EDF float3"),
    );
    s.register_type_syntax(
        names::VDF,
        TypeSyntax::aggregate("VDF", "VDF(float3(0.0),float3(0.0))", &[".absorption", ".scattering"])
            .with_style(ValueStyle::Opaque)
            .with_definition("", "struct VDF { float3 absorption; float3 scattering; };"),
    );
    s.register_type_syntax(
        names::SURFACESHADER,
        TypeSyntax::aggregate(
            "surfaceshader",
            "surfaceshader(float3(0.0),float3(0.0))",
            &[".color", ".transparency"],
        )
        .with_style(ValueStyle::Opaque)
        .with_member_types(&[names::COLOR3, names::COLOR3])
        .with_definition("", "struct surfaceshader { float3 color; float3 transparency; };"),
    );
    s.register_type_syntax(
        names::VOLUMESHADER,
        TypeSyntax::aggregate(
            "volumeshader",
            "volumeshader(float3(0.0),float3(0.0))",
            &[".color", ".transparency"],
        )
        .with_style(ValueStyle::Opaque)
        .with_definition("", "struct volumeshader { float3 color; float3 transparency; };"),
    );
    s.register_type_syntax(
        names::DISPLACEMENTSHADER,
        TypeSyntax::aggregate(
            "displacementshader",
            "displacementshader(float3(0.0),1.0)",
            &[".offset", ".scale"],
        )
        .with_style(ValueStyle::Opaque)
        .with_definition("", "struct displacementshader { float3 offset; float scale; };"),
    );
    s.register_type_syntax(
        names::LIGHTSHADER,
        TypeSyntax::aggregate(
            "lightshader",
            "lightshader(float3(0.0),float3(0.0))",
            &[".intensity", ".direction"],
        )
        .with_style(ValueStyle::Opaque)
        .with_definition("", "struct lightshader { float3 intensity; float3 direction; };"),
    );
    s.register_type_syntax(
        names::MATERIAL,
        TypeSyntax::aggregate("material", "material(float3(0.0),float3(0.0))", &[])
            .with_style(ValueStyle::Opaque)
            .with_definition("surfaceshader", "#define material surfaceshader"),
    );
    s
}
