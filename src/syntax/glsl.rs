//! GLSL syntax tables.

use super::{Syntax, TypeSyntax, ValueStyle};
use crate::types::names;

const VEC2_MEMBERS: &[&str] = &[".x", ".y"];
const VEC3_MEMBERS: &[&str] = &[".x", ".y", ".z"];
const VEC4_MEMBERS: &[&str] = &[".x", ".y", ".z", ".w"];

pub const LANGUAGE: &str = "genglsl";

pub(crate) const RESERVED_WORDS: &[&str] = &[
    "centroid", "flat", "smooth", "noperspective", "patch", "sample", "break", "continue", "do",
    "for", "while", "switch", "case", "default", "if", "else", "subroutine", "in", "out", "inout",
    "float", "double", "int", "void", "bool", "true", "false", "invariant", "discard", "return",
    "mat2", "mat3", "mat4", "dmat2", "dmat3", "dmat4", "mat2x2", "mat2x3", "mat2x4", "dmat2x2",
    "dmat2x3", "dmat2x4", "mat3x2", "mat3x3", "mat3x4", "dmat3x2", "dmat3x3", "dmat3x4",
    "mat4x2", "mat4x3", "mat4x4", "dmat4x2", "dmat4x3", "dmat4x4", "vec2", "vec3", "vec4",
    "ivec2", "ivec3", "ivec4", "bvec2", "bvec3", "bvec4", "dvec2", "dvec3", "dvec4", "uint",
    "uvec2", "uvec3", "uvec4", "lowp", "mediump", "highp", "precision", "sampler1D",
    "sampler2D", "sampler3D", "samplerCube", "sampler1DShadow", "sampler2DShadow",
    "samplerCubeShadow", "sampler1DArray", "sampler2DArray", "sampler1DArrayShadow",
    "sampler2DArrayShadow", "isampler1D", "isampler2D", "isampler3D", "isamplerCube",
    "isampler1DArray", "isampler2DArray", "usampler1D", "usampler2D", "usampler3D",
    "usamplerCube", "usampler1DArray", "usampler2DArray", "sampler2DRect", "sampler2DRectShadow",
    "isampler2DRect", "usampler2DRect", "samplerBuffer", "isamplerBuffer", "usamplerBuffer",
    "sampler2DMS", "isampler2DMS", "usampler2DMS", "sampler2DMSArray", "isampler2DMSArray",
    "usampler2DMSArray", "samplerCubeArray", "samplerCubeArrayShadow", "isamplerCubeArray",
    "usamplerCubeArray", "common", "partition", "active", "asm", "struct", "class", "union",
    "enum", "typedef", "template", "this", "packed", "goto", "inline", "noinline", "volatile",
    "public", "static", "extern", "external", "interface", "long", "short", "half", "fixed",
    "unsigned", "superp", "input", "output", "hvec2", "hvec3", "hvec4", "fvec2", "fvec3",
    "fvec4", "sampler3DRect", "filter", "image1D", "image2D", "image3D", "imageCube",
    "iimage1D", "iimage2D", "iimage3D", "iimageCube", "uimage1D", "uimage2D", "uimage3D",
    "uimageCube", "image1DArray", "image2DArray", "iimage1DArray", "iimage2DArray",
    "uimage1DArray", "uimage2DArray", "image1DShadow", "image2DShadow", "image1DArrayShadow",
    "image2DArrayShadow", "imageBuffer", "iimageBuffer", "uimageBuffer", "sizeof", "cast",
    "namespace", "using", "row_major", "texture", "main",
];

pub fn syntax() -> Syntax {
    let mut s = Syntax::new(LANGUAGE);
    s.register_reserved_words(RESERVED_WORDS);
    s.register_invalid_tokens(&[("__", "_"), ("gl_", "gll")]);

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
    s.register_type_syntax(names::COLOR3, TypeSyntax::aggregate("vec3", "vec3(0.0)", VEC3_MEMBERS));
    s.register_type_syntax(names::COLOR4, TypeSyntax::aggregate("vec4", "vec4(0.0)", VEC4_MEMBERS));
    s.register_type_syntax(names::VECTOR2, TypeSyntax::aggregate("vec2", "vec2(0.0)", VEC2_MEMBERS));
    s.register_type_syntax(names::VECTOR3, TypeSyntax::aggregate("vec3", "vec3(0.0)", VEC3_MEMBERS));
    s.register_type_syntax(names::VECTOR4, TypeSyntax::aggregate("vec4", "vec4(0.0)", VEC4_MEMBERS));
    s.register_type_syntax(names::MATRIX33, TypeSyntax::aggregate("mat3", "mat3(1.0)", &[]));
    s.register_type_syntax(names::MATRIX44, TypeSyntax::aggregate("mat4", "mat4(1.0)", &[]));
    // No strings in GLSL: enumerations are remapped to integers, anything else becomes 0.
    s.register_type_syntax(names::STRING, TypeSyntax::scalar("int", "0"));
    s.mark_unsupported(names::STRING);
    s.register_type_syntax(
        names::FILENAME,
        TypeSyntax::scalar("sampler2D", "").with_style(ValueStyle::Opaque),
    );
    s.register_type_syntax(
        names::BSDF,
        TypeSyntax::aggregate("BSDF", "BSDF(0.0)", &[])
            .with_style(ValueStyle::Opaque)
            .with_definition("vec3", "#define BSDF vec3"),
    );
    s.register_type_syntax(
        names::EDF,
        TypeSyntax::aggregate("EDF", "EDF(0.0)", &[])
            .with_style(ValueStyle::Opaque)
            .with_definition("vec3", "#define EDF vec3"),
    );
    s.register_type_syntax(
        names::VDF,
        TypeSyntax::aggregate("VDF", "VDF(vec3(0.0),vec3(0.0))", &[".absorption", ".scattering"])
            .with_style(ValueStyle::Opaque)
            .with_member_types(&[names::VECTOR3, names::VECTOR3])
            .with_definition("", "struct VDF { vec3 absorption; vec3 scattering; };"),
    );
    s.register_type_syntax(
        names::SURFACESHADER,
        TypeSyntax::aggregate(
            "surfaceshader",
            "surfaceshader(vec3(0.0),vec3(0.0))",
            &[".color", ".transparency"],
        )
        .with_style(ValueStyle::Opaque)
        .with_member_types(&[names::COLOR3, names::COLOR3])
        .with_definition("", "struct surfaceshader { vec3 color; vec3 transparency; };"),
    );
    s.register_type_syntax(
        names::VOLUMESHADER,
        TypeSyntax::aggregate(
            "volumeshader",
            "volumeshader(VDF(vec3(0.0),vec3(0.0)),EDF(0.0))",
            &[".vdf", ".edf"],
        )
        .with_style(ValueStyle::Opaque)
        .with_definition("", "struct volumeshader { VDF vdf; EDF edf; };"),
    );
    s.register_type_syntax(
        names::DISPLACEMENTSHADER,
        TypeSyntax::aggregate(
            "displacementshader",
            "displacementshader(vec3(0.0),1.0)",
            &[".offset", ".scale"],
        )
        .with_style(ValueStyle::Opaque)
        .with_member_types(&[names::VECTOR3, names::FLOAT])
        .with_definition("", "struct displacementshader { vec3 offset; float scale; };"),
    );
    s.register_type_syntax(
        names::LIGHTSHADER,
        TypeSyntax::aggregate(
            "lightshader",
            "lightshader(vec3(0.0),vec3(0.0))",
            &[".intensity", ".direction"],
        )
        .with_style(ValueStyle::Opaque)
        .with_member_types(&[names::VECTOR3, names::VECTOR3])
        .with_definition("", "struct lightshader { vec3 intensity; vec3 direction; };"),
    );
    s.register_type_syntax(
        names::MATERIAL,
        TypeSyntax::aggregate("material", "material(vec3(0.0),vec3(0.0))", &[".color", ".transparency"])
            .with_style(ValueStyle::Opaque)
            .with_definition("surfaceshader", "#define material surfaceshader"),
    );
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TypeRegistry, Value};

    #[test]
    fn glsl_renders_vectors_and_arrays() {
        let reg = TypeRegistry::standard();
        let s = syntax();
        let c3 = reg.get_type("color3").unwrap();
        assert_eq!(s.type_name(&c3).unwrap(), "vec3");
        assert_eq!(
            s.value(&c3, &Value::Floats(vec![0.1, 0.2, 0.3]), false).unwrap(),
            "vec3(0.1, 0.2, 0.3)"
        );
        let fa = reg.get_type("floatarray").unwrap();
        assert_eq!(
            s.value(&fa, &Value::FloatArray(vec![1.0, 2.0]), true).unwrap(),
            "float[2](1.0, 2.0)"
        );
        assert_eq!(s.output_type_name(&c3).unwrap(), "out vec3");
        let file = reg.get_type("filename").unwrap();
        assert_eq!(s.type_name(&file).unwrap(), "sampler2D");
        assert!(!s.type_supported(&reg.get_type("string").unwrap()));
    }

    #[test]
    fn glsl_names_avoid_builtin_prefixes() {
        let s = syntax();
        assert_eq!(s.make_valid_name("gl_Position"), "gllPosition");
        assert_eq!(s.make_valid_name("a__b"), "a_b");
        assert_eq!(s.make_valid_name("node.out-1"), "node_out_1");
    }

    #[test]
    fn glsl_struct_definitions_follow_type_order() {
        let reg = TypeRegistry::standard();
        let s = syntax();
        let types = [
            reg.get_type("surfaceshader").unwrap(),
            reg.get_type("BSDF").unwrap(),
            reg.get_type("color3").unwrap(),
        ];
        let defs = s.type_definitions(types.iter());
        assert_eq!(
            defs,
            vec![
                "struct surfaceshader { vec3 color; vec3 transparency; };".to_string(),
                "#define BSDF vec3".to_string(),
            ]
        );
    }
}
