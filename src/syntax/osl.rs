//! OSL syntax tables.

use super::{Syntax, TypeSyntax, ValueStyle};
use crate::types::names;

pub const LANGUAGE: &str = "genosl";

const VECTOR_MEMBERS: &[&str] = &["[0]", "[1]", "[2]"];
const VECTOR2_MEMBERS: &[&str] = &[".x", ".y"];
const VECTOR4_MEMBERS: &[&str] = &[".x", ".y", ".z", ".w"];
const COLOR4_MEMBERS: &[&str] = &[".rgb[0]", ".rgb[1]", ".rgb[2]", ".a"];

const RESERVED_WORDS: &[&str] = &[
    "and", "break", "closure", "color", "continue", "do", "else", "emit", "float", "for", "if",
    "illuminance", "illuminate", "int", "matrix", "normal", "not", "or", "output", "point",
    "public", "return", "string", "struct", "vector", "void", "while", "bool", "case", "catch",
    "char", "class", "const", "delete", "default", "double", "enum", "extern", "false", "friend",
    "goto", "inline", "long", "new", "operator", "private", "protected", "short", "signed",
    "sizeof", "static", "switch", "template", "this", "throw", "true", "try", "typedef",
    "uniform", "union", "unsigned", "varying", "virtual", "volatile", "emission", "background",
    "diffuse", "oren_nayer", "translucent", "phong", "ward", "microfacet", "reflection",
    "transparent", "debug", "holdout", "subsurface",
];

fn closure(name: &str) -> TypeSyntax {
    TypeSyntax::scalar(name, "null_closure")
        .with_uniform_default("0")
        .with_style(ValueStyle::Opaque)
        .with_definition("closure color", &format!("#define {name} closure color"))
}

pub fn syntax() -> Syntax {
    let mut s = Syntax::new(LANGUAGE);
    s.register_reserved_words(RESERVED_WORDS);
    s.output_qualifier = "output".to_string();

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
    s.register_type_syntax(
        names::BOOLEAN,
        TypeSyntax::scalar("int", "0").with_definition("", "#define true 1\n#define false 0"),
    );
    s.register_type_syntax(names::COLOR3, TypeSyntax::aggregate("color", "color(0.0)", VECTOR_MEMBERS));
    s.register_type_syntax(
        names::COLOR4,
        TypeSyntax::aggregate("color4", "color4(color(0.0), 0.0)", COLOR4_MEMBERS)
            .with_uniform_default("{color(0.0), 0.0}")
            .with_style(ValueStyle::ColorAlpha {
                color: "color".into(),
            }),
    );
    s.register_type_syntax(
        names::VECTOR2,
        TypeSyntax::aggregate("vector2", "vector2(0.0, 0.0)", VECTOR2_MEMBERS)
            .with_uniform_default("{0.0, 0.0}")
            .with_style(ValueStyle::StructLiteral),
    );
    s.register_type_syntax(
        names::VECTOR3,
        TypeSyntax::aggregate("vector", "vector(0.0)", VECTOR_MEMBERS),
    );
    s.register_type_syntax(
        names::VECTOR4,
        TypeSyntax::aggregate("vector4", "vector4(0.0, 0.0, 0.0, 0.0)", VECTOR4_MEMBERS)
            .with_uniform_default("{0.0, 0.0, 0.0, 0.0}")
            .with_style(ValueStyle::StructLiteral),
    );
    // OSL only has 4x4 matrices.
    s.register_type_syntax(
        names::MATRIX33,
        TypeSyntax::aggregate("matrix", "matrix(1.0)", &[]).with_style(ValueStyle::PromotedMatrix33),
    );
    s.register_type_syntax(names::MATRIX44, TypeSyntax::aggregate("matrix", "matrix(1.0)", &[]));
    s.register_type_syntax(
        names::STRING,
        TypeSyntax::scalar("string", "\"\"").with_style(ValueStyle::Quoted),
    );
    s.register_type_syntax(
        names::FILENAME,
        TypeSyntax::scalar("string", "\"\"").with_style(ValueStyle::Quoted),
    );
    s.register_type_syntax(names::BSDF, closure("BSDF"));
    s.register_type_syntax(names::EDF, closure("EDF"));
    s.register_type_syntax(names::VDF, closure("VDF"));
    s.register_type_syntax(names::SURFACESHADER, closure("surfaceshader"));
    s.register_type_syntax(names::VOLUMESHADER, closure("volumeshader"));
    s.register_type_syntax(names::LIGHTSHADER, closure("lightshader"));
    s.register_type_syntax(names::MATERIAL, closure("MATERIAL"));
    s.register_type_syntax(
        names::DISPLACEMENTSHADER,
        TypeSyntax::aggregate("displacementshader", "{vector(0.0), 0.0}", &[".offset", ".scale"])
            .with_style(ValueStyle::Opaque)
            .with_definition("", "struct displacementshader { vector offset; float scale; };"),
    );
    s
}
