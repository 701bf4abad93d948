use std::path::PathBuf;

use shader_graph_gen::document::{Document, load_document_from_path};
use shader_graph_gen::graph::ShaderGraph;
use shader_graph_gen::library::load_default_library;
use shader_graph_gen::shadergen::shader::{PIXEL_STAGE, VERTEX_STAGE, block};
use shader_graph_gen::shadergen::{GenContext, GenOptions, InterfaceType};
use shader_graph_gen::types::Value;
use shader_graph_gen::{Shader, ShaderGenError, generator_for, syntax};

/// Every case generates the document output named `result`.
const ROOT: &str = "result";

#[derive(Clone, Debug)]
struct Case {
    name: &'static str,
    target: &'static str,
    stage: &'static str,
    /// Must all appear, each after the previous one.
    in_order: &'static [&'static str],
    forbid: &'static [&'static str],
}

fn cases_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("cases")
}

fn load_case_document(name: &str) -> Document {
    let path = cases_root().join(name).join("document.json");
    load_document_from_path(&path).unwrap_or_else(|e| panic!("case {name}: {e:#}"))
}

fn context(options: GenOptions) -> GenContext {
    let library = load_default_library().unwrap_or_else(|e| panic!("failed to load library: {e:#}"));
    GenContext::new(library).with_options(options)
}

fn generate(case: &Case, options: GenOptions) -> Shader {
    let doc = load_case_document(case.name);
    let mut ctx = context(options);
    let generator = generator_for(case.target).unwrap_or_else(|e| panic!("case {}: {e:#}", case.name));
    let element = doc
        .element(ROOT)
        .unwrap_or_else(|e| panic!("case {}: {e:#}", case.name));
    generator
        .generate(case.name, element, &mut ctx)
        .unwrap_or_else(|e| panic!("case {}: failed to generate {}: {e:#}", case.name, case.target))
}

/// Check the expectations of `case`, then align with the stored golden source when there is
/// one. `UPDATE_GOLDENS=1` rewrites the golden from the current output.
fn run_case(case: &Case) -> Shader {
    let shader = generate(case, GenOptions::default());
    let source = shader
        .source_code(case.stage)
        .unwrap_or_else(|e| panic!("case {}: {e:#}", case.name));

    let mut at = 0;
    for expected in case.in_order {
        match source[at..].find(expected) {
            Some(offset) => at += offset + expected.len(),
            None => panic!(
                "case {}: expected `{expected}` after byte {at} of {} {} source:\n{source}",
                case.name, case.target, case.stage
            ),
        }
    }
    for forbidden in case.forbid {
        assert!(
            !source.contains(forbidden),
            "case {}: unexpected `{forbidden}` in {} {} source:\n{source}",
            case.name,
            case.target,
            case.stage
        );
    }

    let update_goldens = std::env::var("UPDATE_GOLDENS").is_ok_and(|v| v != "0");
    let golden = cases_root()
        .join(case.name)
        .join(format!("{}.{}.golden", case.target, case.stage));
    if update_goldens {
        std::fs::write(&golden, source)
            .unwrap_or_else(|e| panic!("case {}: write {}: {e}", case.name, golden.display()));
    } else if golden.exists() {
        let expected = std::fs::read_to_string(&golden)
            .unwrap_or_else(|e| panic!("case {}: read {}: {e}", case.name, golden.display()));
        assert_eq!(
            source, expected,
            "case {}: {} {} source differs from golden (regenerate with UPDATE_GOLDENS=1)",
            case.name, case.target, case.stage
        );
    }
    shader
}

/// Statements of the GLSL `main` body, trimmed.
fn main_body(source: &str) -> Vec<&str> {
    let start = source.find("void main()\n{\n").expect("main function") + "void main()\n{\n".len();
    let end = source[start..].find("\n}").expect("end of main") + start;
    source[start..end]
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect()
}

#[test]
fn constants_feed_an_add_in_dependency_order() {
    let shader = run_case(&Case {
        name: "const_add",
        target: "genglsl",
        stage: PIXEL_STAGE,
        in_order: &[
            "#version 400",
            "out vec4 result_color;",
            "void main()",
            "float c1_out = 1.0;",
            "float c2_out = 2.0;",
            "float sum_out = c1_out + c2_out;",
            "result_color = vec4(sum_out, sum_out, sum_out, 1.0);",
        ],
        forbid: &["Omitted node"],
    });

    assert_eq!(shader.graph().node_names(), vec!["c1", "c2", "sum"]);
    let body = main_body(shader.source_code(PIXEL_STAGE).unwrap());
    assert_eq!(body.len(), 4, "three node statements and the output write: {body:?}");
    assert_eq!(shader.used_implementations(), ["IM_add", "IM_constant"]);

    let vertex = shader.source_code(VERTEX_STAGE).unwrap();
    assert!(vertex.contains("gl_Position = u_viewProjectionMatrix * hPositionWorld;"));
    assert!(vertex.contains("uniform mat4 u_worldMatrix"));
}

#[test]
fn const_add_on_every_target() {
    let cases = [
        Case {
            name: "const_add",
            target: "genslang",
            stage: PIXEL_STAGE,
            in_order: &[
                "[shader(\"fragment\")]",
                "float4 fragmentMain(VertexData vd) : SV_Target",
                "float sum_out = c1_out + c2_out;",
                "return float4(sum_out, sum_out, sum_out, 1.0);",
            ],
            forbid: &["#version"],
        },
        Case {
            name: "const_add",
            target: "genosl",
            stage: PIXEL_STAGE,
            in_order: &[
                "#include \"stdosl.h\"",
                "shader const_add",
                "output float result = 0.0",
                "float sum_out = c1_out + c2_out;",
                "result = sum_out;",
            ],
            forbid: &["void main()"],
        },
        Case {
            name: "const_add",
            target: "genmdl",
            stage: PIXEL_STAGE,
            in_order: &[
                "mdl 1.6;",
                "import ::df::*;",
                "export material const_add()",
                "= let",
                "float sum_out = c1_out + c2_out;",
                "in material(surface: material_surface(emission: material_emission(emission: df::diffuse_edf(), intensity: color(sum_out) * math::PI)));",
            ],
            forbid: &["?"],
        },
    ];
    for case in &cases {
        let shader = run_case(case);
        assert_eq!(shader.stage(VERTEX_STAGE).is_some(), case.target == "genslang", "case {}", case.target);
    }
}

#[test]
fn literal_switch_emits_only_the_selected_branch() {
    let shader = run_case(&Case {
        name: "switch_literal",
        target: "genglsl",
        stage: PIXEL_STAGE,
        in_order: &[
            "void main()",
            "// Omitted node 'img1'. Only used in conditional node 'sw'",
            "// Omitted node 'img2'. Only used in conditional node 'sw'",
            "// Omitted node 'img3'. Only used in conditional node 'sw'",
            "vec3 sw_out = vec3(0.0);",
            "mx_image_color3(img1_file, ",
            "sw_out = img1_out;",
            "result_color = vec4(sw_out, 1.0);",
        ],
        forbid: &["mx_image_color3(img2_file", "mx_image_color3(img3_file", "img2_out", "else if ("],
    });

    let pixel = shader.source_code(PIXEL_STAGE).unwrap();
    assert_eq!(pixel.matches("mx_image_color3(img").count(), 1);
    assert_eq!(pixel.matches("void mx_image_color3(").count(), 1);
    assert!(shader.used_implementations().contains(&"IM_switch".to_string()));
}

#[test]
fn runtime_switch_writes_every_branch() {
    let case = Case {
        name: "switch_literal",
        target: "genglsl",
        stage: PIXEL_STAGE,
        in_order: &[],
        forbid: &[],
    };
    let options = GenOptions {
        shader_interface_type: InterfaceType::Complete,
        ..GenOptions::default()
    };
    let shader = generate(&case, options);
    let pixel = shader.source_code(PIXEL_STAGE).unwrap();
    let public = shader
        .stage(PIXEL_STAGE)
        .and_then(|s| s.uniform_block(block::PUBLIC_UNIFORMS))
        .expect("public uniforms");
    assert!(public.find("sw_which").is_some());

    let mut at = 0;
    for expected in [
        "if (sw_which < 1.0)",
        "mx_image_color3(img1_file, ",
        "sw_out = img1_out;",
        "else if (sw_which < 2.0)",
        "mx_image_color3(img2_file, ",
        "else if (sw_which < 3.0)",
        "mx_image_color3(img3_file, ",
        "else if (sw_which < 4.0)",
        "sw_out = sw_in4;",
        "else",
        "sw_out = sw_in5;",
    ] {
        let offset = pixel[at..]
            .find(expected)
            .unwrap_or_else(|| panic!("expected `{expected}` after byte {at}:\n{pixel}"));
        at += offset + expected.len();
    }
}

#[test]
fn image_filename_becomes_a_public_sampler() {
    let shader = run_case(&Case {
        name: "image_uniform",
        target: "genglsl",
        stage: PIXEL_STAGE,
        in_order: &[
            "// Uniform block: PublicUniforms",
            "uniform sampler2D img_file;",
            "in VertexData",
            "vec2 texcoord_0;",
            "} vd;",
            "void mx_image_color3(sampler2D tex_sampler",
            "void main()",
            "vec2 geomprop_UV0_out = vd.texcoord_0;",
            "mx_image_color3(img_file, vec3(0.0, 0.0, 0.0), geomprop_UV0_out, 2, 2, img_out);",
        ],
        forbid: &["wood.png"],
    });

    let pixel = shader.stage(PIXEL_STAGE).expect("pixel stage");
    let public = pixel.uniform_block(block::PUBLIC_UNIFORMS).expect("public uniforms");
    assert_eq!(public.len(), 1);
    let port = public.find("img_file").expect("img_file uniform");
    assert_eq!(port.ty.name(), "filename");
    assert_eq!(port.value, Some(Value::String("wood.png".into())));

    let vertex = shader.source_code(VERTEX_STAGE).unwrap();
    assert!(vertex.contains("in vec2 i_texcoord_0;"));
    assert!(vertex.contains("vd.texcoord_0 = i_texcoord_0;"));
}

#[test]
fn image_filename_is_a_string_parameter_in_osl() {
    run_case(&Case {
        name: "image_uniform",
        target: "genosl",
        stage: PIXEL_STAGE,
        in_order: &["shader image_uniform", "string img_file = \"wood.png\"", "mx_image_color3(img_file, "],
        forbid: &[],
    });
}

#[test]
fn nested_nodegraphs_flatten_to_leaves() {
    let doc = load_case_document("nested_nodegraph");
    let ctx = context(GenOptions::default());
    let syntax = syntax::glsl::syntax();
    let mut graph = ShaderGraph::create("nested", doc.element(ROOT).unwrap(), &syntax, "genglsl", &ctx)
        .unwrap_or_else(|e| panic!("case nested_nodegraph: {e:#}"));

    assert_eq!(graph.node_count(), 1);
    assert_eq!(graph.compound_count(), 3);
    let leaves = graph.leaf_count();
    assert_eq!(leaves, 4);

    assert_eq!(graph.flatten_graph().unwrap(), 3);
    assert_eq!(graph.compound_count(), 0);
    assert_eq!(graph.node_count(), leaves);
    let mut names = graph.node_names();
    names.sort_unstable();
    assert_eq!(names, vec!["o_i1_a", "o_i1_b", "o_i2_a", "o_i2_b"]);

    assert_eq!(graph.flatten_graph().unwrap(), 0);
    assert_eq!(graph.node_count(), leaves);
}

#[test]
fn flattened_nodegraph_is_emitted_inline() {
    run_case(&Case {
        name: "nested_nodegraph",
        target: "genglsl",
        stage: PIXEL_STAGE,
        in_order: &[
            "float o_i1_a_out = 0.5 + 1.0;",
            "float o_i1_b_out = o_i1_a_out * 2.0;",
            "float o_i2_a_out = o_i1_b_out + 1.0;",
            "float o_i2_b_out = o_i2_a_out * 2.0;",
            "result_color = vec4(o_i2_b_out, o_i2_b_out, o_i2_b_out, 1.0);",
        ],
        forbid: &["NG_inner", "NG_outer"],
    });
}

#[test]
fn unflattened_nodegraphs_become_functions() {
    let case = Case {
        name: "nested_nodegraph",
        target: "genglsl",
        stage: PIXEL_STAGE,
        in_order: &[],
        forbid: &[],
    };
    let options = GenOptions {
        flatten_subgraphs: false,
        ..GenOptions::default()
    };
    let shader = generate(&case, options);
    let pixel = shader.source_code(PIXEL_STAGE).unwrap();
    let inner = pixel.find("void NG_inner(float ").expect("inner function");
    let outer = pixel.find("void NG_outer(float ").expect("outer function");
    assert!(inner < outer, "callee must be defined first:\n{pixel}");
    assert!(pixel.contains("NG_outer(0.5, o_out);"), "{pixel}");
    assert_eq!(pixel.matches("void NG_inner(").count(), 1);
    assert!(shader.used_implementations().contains(&"NG_inner".to_string()));
    assert!(shader.used_implementations().contains(&"NG_outer".to_string()));
}

#[test]
fn connection_cycle_is_reported_with_its_path() {
    let doc = load_case_document("cycle");
    for target in ["genglsl", "genosl"] {
        let mut ctx = context(GenOptions::default());
        let generator = generator_for(target).unwrap();
        let err = match generator.generate("cycle", doc.element(ROOT).unwrap(), &mut ctx) {
            Ok(_) => panic!("case cycle: {target} generated a cyclic graph"),
            Err(e) => e,
        };
        match err.downcast_ref::<ShaderGenError>() {
            Some(ShaderGenError::Cycle { node, path }) => {
                assert_eq!(node, "A");
                assert_eq!(path, &["A", "B", "A"]);
            }
            other => panic!("case cycle: expected a cycle error from {target}, got {other:?} ({err:#})"),
        }
    }
}

#[test]
fn color4_constant_uses_the_mdl_maker() {
    run_case(&Case {
        name: "color4_constant",
        target: "genmdl",
        stage: PIXEL_STAGE,
        in_order: &[
            "export material color4_constant()",
            "color4 c_out = mk_color4(0.1, 0.2, 0.3, 1.0);",
            "in material(surface: material_surface(emission: material_emission(emission: df::diffuse_edf(), intensity: c_out.rgb * math::PI)));",
        ],
        forbid: &["= color4("],
    });
}

#[test]
fn color4_output_is_a_color_alpha_struct_in_osl() {
    run_case(&Case {
        name: "color4_constant",
        target: "genosl",
        stage: PIXEL_STAGE,
        in_order: &[
            "#include \"color4.h\"",
            "shader color4_constant",
            "output color4 result = {color(0.0), 0.0}",
            "color4 c_out = color4(color(0.1, 0.2, 0.3), 1.0);",
            "result = c_out;",
        ],
        forbid: &["mk_color4", "vec4("],
    });
}

#[test]
fn color4_constant_is_a_vec4_in_glsl() {
    run_case(&Case {
        name: "color4_constant",
        target: "genglsl",
        stage: PIXEL_STAGE,
        in_order: &["vec4 c_out = vec4(0.1, 0.2, 0.3, 1.0);", "result_color = c_out;"],
        forbid: &["mk_color4"],
    });
}

#[test]
fn surface_evaluates_closures_per_lighting_term() {
    let shader = run_case(&Case {
        name: "surface_lighting",
        target: "genglsl",
        stage: PIXEL_STAGE,
        in_order: &[
            "#define BSDF vec3",
            "struct surfaceshader { vec3 color; vec3 transparency; };",
            "uniform vec3 u_lightColor = vec3(1.0, 1.0, 1.0);",
            "void mx_diffuse_bsdf_reflection(",
            "void main()",
            "vec3 geomprop_Nworld_out = normalize(vd.normalWorld);",
            "surfaceshader surf_out = surfaceshader(vec3(0.0),vec3(0.0));",
            "float surfaceOpacity = 1.0;",
            "// Light contribution",
            "mx_diffuse_bsdf_reflection(L, V, 1.0, vec3(0.8, 0.2, 0.2), 0.0, geomprop_Nworld_out, diff_out);",
            "surf_out.color += u_lightColor * diff_out;",
            "// Ambient contribution",
            "mx_diffuse_bsdf_indirect(V, 1.0, vec3(0.8, 0.2, 0.2), 0.0, geomprop_Nworld_out, diff_out);",
            "surf_out.color += u_ambientColor * diff_out;",
            "// Transmission",
            "BSDF diff_out = BSDF(0.0);",
            "surf_out.transparency += diff_out;",
            "// Emission",
            "mx_uniform_edf(N, L, vec3(0.1, 0.1, 0.1), emit_out);",
            "surf_out.color += emit_out;",
            "surf_out.color *= surfaceOpacity;",
            "surf_out.transparency = mix(vec3(1.0), surf_out.transparency, surfaceOpacity);",
            "result_color = vec4(surf_out.color, 1.0 - ",
        ],
        forbid: &["mx_diffuse_bsdf_transmission", "mx_uniform_edf_"],
    });

    assert_eq!(
        shader.used_implementations(),
        [
            "IM_diffuse_bsdf_genglsl",
            "IM_normal_vector3_genglsl",
            "IM_surface_genglsl",
            "IM_uniform_edf_genglsl",
        ]
    );
    let vertex = shader.source_code(VERTEX_STAGE).unwrap();
    assert!(vertex.contains("vd.normalWorld = normalize((u_worldInverseTransposeMatrix * vec4(i_normal, 0.0)).xyz);"));
    assert!(vertex.contains("vd.positionWorld = hPositionWorld.xyz;"));
}

#[test]
fn surface_closures_are_values_in_osl() {
    run_case(&Case {
        name: "surface_lighting",
        target: "genosl",
        stage: PIXEL_STAGE,
        in_order: &[
            "diff_out = 1.0 * color(0.8, 0.2, 0.2) * oren_nayar(geomprop_Nworld_out, 0.0);",
            "emit_out = color(0.1, 0.1, 0.1) * emission();",
            "surf_out = (diff_out + emit_out) * 1.0 + transparent() * (1.0 - 1.0);",
        ],
        forbid: &["_reflection("],
    });
}

#[test]
fn shader_node_root_publishes_its_bound_values() {
    let doc = load_case_document("surface_lighting");
    let element = doc.element("surf").unwrap();

    let mut ctx = context(GenOptions::default());
    let shader = generator_for("genglsl")
        .unwrap()
        .generate("surf", element, &mut ctx)
        .unwrap_or_else(|e| panic!("failed to generate surf: {e:#}"));
    let pixel = shader.stage(PIXEL_STAGE).expect("pixel stage");
    let public = pixel.uniform_block(block::PUBLIC_UNIFORMS).expect("public uniforms");
    let opacity = public.find("opacity").expect("opacity uniform");
    assert_eq!(opacity.ty.name(), "float");
    assert_eq!(opacity.value, Some(Value::Float(1.0)));
    assert!(public.find("bsdf").is_none());
    let source = shader.source_code(PIXEL_STAGE).unwrap();
    assert!(source.contains("float surfaceOpacity = opacity;"), "{source}");

    let mut ctx = context(GenOptions::default());
    let osl = generator_for("genosl")
        .unwrap()
        .generate("surf", element, &mut ctx)
        .unwrap_or_else(|e| panic!("failed to generate surf for osl: {e:#}"));
    let source = osl.source_code(PIXEL_STAGE).unwrap();
    assert!(source.contains("    float opacity = 1.0,"), "{source}");
}
