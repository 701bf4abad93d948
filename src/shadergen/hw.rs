//! Closure evaluation for hardware (GLSL, Slang) targets.
//!
//! Hardware languages have no closure values. A BSDF or EDF is instead evaluated once per
//! lighting term: the surface node pushes a [`ClosureContext`] and re-emits the closure nodes it
//! depends on, each call selecting the function variant for that term.

use anyhow::{Result, bail};

use super::emit::{CodeWriter, EmittedGraph, Emitter, single_output};
use super::shader::{ShaderPort, ShaderStage, block};
use super::{ClosureContext, ClosureContextType, GenContext};
use crate::graph::{Classification, InputId, NodeId, ShaderGraph, ShaderNode};
use crate::syntax::slang;
use crate::types::{TypeDesc, Value, names};

/// Names the lighting code declares in the surface scope.
pub const RESERVED_NAMES: &[&str] = &["N", "V", "L", "surfaceOpacity"];

/// Lighting terms a closure node contributes to.
pub fn node_closure_contexts(node: &ShaderNode) -> Vec<ClosureContextType> {
    use ClosureContextType as Ctx;
    if node.has(Classification::BSDF_R) {
        vec![Ctx::Reflection, Ctx::Indirect]
    } else if node.has(Classification::BSDF_T) {
        vec![Ctx::Transmission]
    } else if node.has(Classification::BSDF) {
        vec![Ctx::Reflection, Ctx::Transmission, Ctx::Indirect]
    } else if node.has(Classification::EDF) {
        vec![Ctx::Emission]
    } else {
        Vec::new()
    }
}

pub fn supports_context(node: &ShaderNode, kind: ClosureContextType) -> bool {
    node_closure_contexts(node).contains(&kind)
}

/// Emit the closure nodes feeding `input` of `shader` under a `kind` context and return the
/// expression holding the closure result.
pub fn emit_bsdf_nodes(
    em: &mut Emitter<'_>,
    w: &mut CodeWriter,
    graph: &ShaderGraph,
    shader: NodeId,
    input: InputId,
    kind: ClosureContextType,
    ctx: &mut GenContext,
) -> Result<String> {
    ctx.with_closure_context(ClosureContext::new(kind), |ctx| {
        if let Some(root) = graph.upstream_node(input) {
            let upstream = graph.upstream_reachable(root);
            let used = &graph.node(shader).used_closures;
            for &id in graph.nodes() {
                if upstream.contains(&id) && used.contains(&id) {
                    em.emit_function_call(w, graph, id, ctx)?;
                }
            }
        }
        em.input_expr(graph, input)
    })
}

struct LightingTerm {
    comment: &'static str,
    input: &'static str,
    kind: ClosureContextType,
    /// Accumulation into the surface variable; `{s}` is the surface, `{c}` the closure.
    accumulate: &'static str,
}

const LIGHTING_TERMS: &[LightingTerm] = &[
    LightingTerm {
        comment: "Light contribution",
        input: "bsdf",
        kind: ClosureContextType::Reflection,
        accumulate: "{s}.color += u_lightColor * {c}",
    },
    LightingTerm {
        comment: "Ambient contribution",
        input: "bsdf",
        kind: ClosureContextType::Indirect,
        accumulate: "{s}.color += u_ambientColor * {c}",
    },
    LightingTerm {
        comment: "Transmission",
        input: "bsdf",
        kind: ClosureContextType::Transmission,
        accumulate: "{s}.transparency += {c}",
    },
    LightingTerm {
        comment: "Emission",
        input: "edf",
        kind: ClosureContextType::Emission,
        accumulate: "{s}.color += {c}",
    },
];

/// The `surface` built-in: a single directional light plus ambient, emission and
/// transmission, weighted by opacity.
pub fn emit_surface(
    em: &mut Emitter<'_>,
    w: &mut CodeWriter,
    graph: &ShaderGraph,
    id: NodeId,
    ctx: &mut GenContext,
) -> Result<()> {
    let out = single_output(graph, id)?;
    let surface = graph.output(out).variable.clone();
    let default = em.syntax.default_value(&graph.output(out).ty, false)?;
    em.declare(w, graph, out, &default)?;

    let (vec3, mix) = if em.syntax.language() == slang::LANGUAGE {
        ("float3", "lerp")
    } else {
        ("vec3", "mix")
    };
    let opacity = match graph.node_input(id, "opacity") {
        Some(input) => em.input_expr(graph, input)?,
        None => "1.0".to_string(),
    };

    w.begin_scope();
    w.statement(&format!("{vec3} N = normalize(vd.normalWorld)"));
    w.statement(&format!("{vec3} V = normalize(u_viewPosition - vd.positionWorld)"));
    w.statement(&format!("{vec3} L = normalize(-u_lightDirection)"));
    w.statement(&format!("float surfaceOpacity = {opacity}"));
    for term in LIGHTING_TERMS {
        let Some(input) = graph.node_input(id, term.input) else {
            continue;
        };
        if graph.input(input).connection.is_none() {
            continue;
        }
        w.blank();
        w.comment(&em.syntax.comment_prefix, term.comment);
        w.begin_scope();
        let closure = emit_bsdf_nodes(em, w, graph, id, input, term.kind, ctx)?;
        w.statement(&term.accumulate.replace("{s}", &surface).replace("{c}", &closure));
        w.end_scope(false);
    }
    w.blank();
    w.statement(&format!("{surface}.color *= surfaceOpacity"));
    w.statement(&format!(
        "{surface}.transparency = {mix}({vec3}(1.0), {surface}.transparency, surfaceOpacity)"
    ));
    w.end_scope(false);
    Ok(())
}

/// Expression converting `expr` of type `ty` to the RGBA pixel output.
pub fn to_vec4(language: &str, ty: &TypeDesc, expr: &str) -> Result<String> {
    let v4 = if language == slang::LANGUAGE { "float4" } else { "vec4" };
    Ok(match ty.name() {
        names::FLOAT => format!("{v4}({expr}, {expr}, {expr}, 1.0)"),
        names::INTEGER | names::BOOLEAN => {
            let f = format!("float({expr})");
            format!("{v4}({f}, {f}, {f}, 1.0)")
        }
        names::VECTOR2 => format!("{v4}({expr}, 0.0, 1.0)"),
        names::VECTOR3 | names::COLOR3 => format!("{v4}({expr}, 1.0)"),
        names::VECTOR4 | names::COLOR4 => expr.to_string(),
        names::SURFACESHADER => format!(
            "{v4}({expr}.color, 1.0 - ({expr}.transparency.x + {expr}.transparency.y + {expr}.transparency.z) / 3.0)"
        ),
        other => bail!("cannot write type '{other}' to a pixel output"),
    })
}

pub const PIXEL_OUTPUT_SUFFIX: &str = "_color";

/// Variable name of the pixel output for a graph output socket. Graph naming keeps this
/// name free of any node output or uniform.
pub fn pixel_output_name(socket: &str) -> String {
    format!("{socket}{PIXEL_OUTPUT_SUFFIX}")
}

/// Vertex attribute semantic derived from its name, e.g. `i_texcoord_0` is `TEXCOORD_0`.
pub fn semantic_for(variable: &str) -> String {
    variable.strip_prefix("i_").unwrap_or(variable).to_uppercase()
}

/// Fill the interface blocks shared by every hardware layout.
pub fn populate_stages(
    emitted: &EmittedGraph,
    ctx: &GenContext,
    vertex: &mut ShaderStage,
    pixel: &mut ShaderStage,
) -> Result<()> {
    let matrix44 = ctx.types.get_type(names::MATRIX44)?;
    let transforms = vertex.add_uniform_block(block::PRIVATE_UNIFORMS, "u_prv");
    for name in TRANSFORM_UNIFORMS {
        transforms.add(ShaderPort::new(matrix44.clone(), name));
    }

    let inputs = vertex.add_input_block(block::VERTEX_INPUTS, "i_vs");
    inputs.add(ShaderPort::new(ctx.types.get_type(names::VECTOR3)?, "i_position").with_semantic("POSITION"));
    for data in &emitted.vertex_data {
        let ty = ctx.types.get_type(data.input_type.as_deref().unwrap_or(&data.data_type))?;
        inputs.add(ShaderPort::new(ty, &data.input).with_semantic(&semantic_for(&data.input)));
    }

    for data in &emitted.vertex_data {
        let ty = ctx.types.get_type(&data.data_type)?;
        let port = ShaderPort::new(ty, &data.name).with_semantic(&data.name.to_uppercase());
        vertex.add_output_block(block::VERTEX_DATA, "vd").add(port.clone());
        pixel.add_input_block(block::VERTEX_DATA, "vd").add(port);
    }

    let private = pixel.add_uniform_block(block::PRIVATE_UNIFORMS, "u_prv");
    for uniform in &emitted.private_uniforms {
        let ty = ctx.types.get_type(&uniform.uniform_type)?;
        let value = match uniform.value.as_deref() {
            Some(text) => Some(Value::parse(&ty, text)?),
            None => None,
        };
        private.add(ShaderPort::new(ty, &uniform.name).with_value(value));
    }

    let graph = &emitted.graph;
    let public = pixel.add_uniform_block(block::PUBLIC_UNIFORMS, "u_pub");
    for &socket in graph.input_sockets() {
        let port = graph.output(socket);
        public.add(ShaderPort::new(port.ty.clone(), &port.variable).with_value(port.value.clone()));
    }

    let vector4 = ctx.types.get_type(names::VECTOR4)?;
    let outputs = pixel.add_output_block(block::PIXEL_OUTPUTS, "");
    for (index, out) in emitted.outputs.iter().enumerate() {
        outputs.add(ShaderPort::new(vector4.clone(), &pixel_output_name(&out.variable)).with_semantic(&format!("SV_Target{index}")));
    }
    Ok(())
}

pub const TRANSFORM_UNIFORMS: &[&str] = &[
    "u_worldMatrix",
    "u_viewProjectionMatrix",
    "u_worldInverseTransposeMatrix",
];

/// Names hardware layouts declare around the generated body.
pub fn reserved_words() -> Vec<&'static str> {
    let mut words = RESERVED_NAMES.to_vec();
    words.extend_from_slice(TRANSFORM_UNIFORMS);
    words.extend_from_slice(&[
        "vd",
        "vin",
        "hPositionWorld",
        "u_viewPosition",
        "u_lightDirection",
        "u_lightColor",
        "u_ambientColor",
    ]);
    words
}
