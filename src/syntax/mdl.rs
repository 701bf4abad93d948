//! MDL syntax tables.

use super::{NamePrefixRule, Syntax, TypeSyntax, ValueStyle};
use crate::types::names;

pub const LANGUAGE: &str = "genmdl";

const VECTOR2_MEMBERS: &[&str] = &[".x", ".y"];
const VECTOR3_MEMBERS: &[&str] = &[".x", ".y", ".z"];
const VECTOR4_MEMBERS: &[&str] = &[".x", ".y", ".z", ".w"];
const COLOR3_MEMBERS: &[&str] = &[".x", ".y", ".z"];
const COLOR4_MEMBERS: &[&str] = &[".rgb.x", ".rgb.y", ".rgb.z", ".a"];

const RESERVED_WORDS: &[&str] = &[
    "annotation", "bool", "bool2", "bool3", "bool4", "break", "bsdf", "bsdf_measurement", "case",
    "cast", "color", "const", "continue", "default", "do", "double", "double2", "double2x2",
    "double2x3", "double3", "double3x2", "double3x3", "double3x4", "double4", "double4x3",
    "double4x4", "double4x2", "double2x4", "edf", "else", "enum", "export", "false", "float",
    "float2", "float2x2", "float2x3", "float3", "float3x2", "float3x3", "float3x4", "float4",
    "float4x3", "float4x4", "float4x2", "float2x4", "for", "hair_bsdf", "if", "import", "in",
    "int", "int2", "int3", "int4", "intensity_mode", "intensity_power",
    "intensity_radiant_exitance", "let", "light_profile", "material", "material_emission",
    "material_geometry", "material_surface", "material_volume", "mdl", "module", "package",
    "return", "string", "struct", "switch", "texture_2d", "texture_3d", "texture_cube",
    "texture_ptex", "true", "typedef", "uniform", "using", "varying", "vdf", "while", "auto",
    "catch", "char", "class", "const_cast", "delete", "dynamic_cast", "explicit", "extern",
    "external", "foreach", "friend", "goto", "graph", "half", "half2", "half2x2", "half2x3",
    "half3", "half3x2", "half3x3", "half3x4", "half4", "half4x3", "half4x4", "half4x2",
    "half2x4", "inline", "inout", "lambda", "long", "mutable", "namespace", "native", "new",
    "operator", "out", "phenomenon", "private", "protected", "public", "reinterpret_cast",
    "sampler", "shader", "short", "signed", "sizeof", "static", "static_cast", "technique",
    "template", "this", "throw", "try", "typeid", "typename", "union", "unsigned", "virtual",
    "void", "volatile", "wchar_t",
];

fn closure() -> TypeSyntax {
    TypeSyntax::scalar("material", "material()").with_style(ValueStyle::Opaque)
}

pub fn syntax() -> Syntax {
    let mut s = Syntax::new(LANGUAGE);
    s.register_reserved_words(RESERVED_WORDS);
    s.set_prefix_rule(NamePrefixRule::LeadingUnderscore("v".into()));
    s.output_qualifier = String::new();
    s.constant_qualifier = String::new();
    s.outputs_by_return = true;

    s.register_type_syntax(names::FLOAT, TypeSyntax::scalar("float", "0.0"));
    s.register_type_syntax(
        names::FLOATARRAY,
        TypeSyntax::scalar("float", "").with_style(ValueStyle::SizedArray {
            element: "float".into(),
        }),
    );
    s.register_type_syntax(names::INTEGER, TypeSyntax::scalar("int", "0"));
    s.register_type_syntax(
        names::INTEGERARRAY,
        TypeSyntax::scalar("int", "").with_style(ValueStyle::SizedArray {
            element: "int".into(),
        }),
    );
    s.register_type_syntax(names::BOOLEAN, TypeSyntax::scalar("bool", "false"));
    s.register_type_syntax(names::COLOR3, TypeSyntax::aggregate("color", "color(0.0)", COLOR3_MEMBERS));
    // No native 4-channel color: a struct of color and alpha built by a helper.
    s.register_type_syntax(
        names::COLOR4,
        TypeSyntax::aggregate("color4", "mk_color4(0.0)", COLOR4_MEMBERS).with_style(
            ValueStyle::Maker {
                function: "mk_color4".into(),
            },
        ),
    );
    s.register_type_syntax(names::VECTOR2, TypeSyntax::aggregate("float2", "float2(0.0)", VECTOR2_MEMBERS));
    s.register_type_syntax(names::VECTOR3, TypeSyntax::aggregate("float3", "float3(0.0)", VECTOR3_MEMBERS));
    s.register_type_syntax(names::VECTOR4, TypeSyntax::aggregate("float4", "float4(0.0)", VECTOR4_MEMBERS));
    s.register_type_syntax(names::MATRIX33, TypeSyntax::aggregate("float3x3", "float3x3(1.0)", &[]));
    s.register_type_syntax(names::MATRIX44, TypeSyntax::aggregate("float4x4", "float4x4(1.0)", &[]));
    s.register_type_syntax(
        names::STRING,
        TypeSyntax::scalar("string", "\"\"").with_style(ValueStyle::Quoted),
    );
    s.register_type_syntax(
        names::FILENAME,
        TypeSyntax::scalar("texture_2d", "texture_2d()").with_style(ValueStyle::Wrapped {
            prefix: "texture_2d(".into(),
            suffix: ", tex::gamma_default)".into(),
        }),
    );
    for closure_type in [
        names::BSDF,
        names::EDF,
        names::VDF,
        names::SURFACESHADER,
        names::VOLUMESHADER,
        names::DISPLACEMENTSHADER,
        names::LIGHTSHADER,
        names::MATERIAL,
    ] {
        s.register_type_syntax(closure_type, closure());
    }
    s
}
