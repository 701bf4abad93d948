use std::collections::HashMap;

use proptest::prelude::*;

use shader_graph_gen::document::load_document_from_str;
use shader_graph_gen::graph::{Classification, NodeId, NodeImpl, ScopeType, ShaderGraph, classify};
use shader_graph_gen::library::load_default_library;
use shader_graph_gen::shadergen::hw::node_closure_contexts;
use shader_graph_gen::shadergen::shader::PIXEL_STAGE;
use shader_graph_gen::shadergen::{ClosureContextType, GenContext};
use shader_graph_gen::types::{TypeDesc, TypeRegistry};
use shader_graph_gen::{ShaderGenError, generator_for, syntax};

fn float_type() -> TypeDesc {
    TypeRegistry::standard().get_type("float").unwrap()
}

/// Float nodes named by rank, inserted in `insertion` order, wired by `edges` given as
/// (upstream rank, downstream rank, input slot).
fn ranked_graph(insertion: &[usize], inputs: usize, edges: &[(usize, usize, usize)]) -> (ShaderGraph, Vec<NodeId>) {
    let f = float_type();
    let mut g = ShaderGraph::new("ranked");
    let mut ids = vec![None; insertion.len()];
    for &rank in insertion {
        let id = g
            .add_node(&format!("n{rank}"), "add", "ND_add_float", Classification::TEXTURE, NodeImpl::Boundary)
            .unwrap();
        for k in 0..inputs {
            g.add_input(id, &format!("in{}", k + 1), f.clone());
        }
        g.add_output(id, "out", f.clone());
        ids[rank] = Some(id);
    }
    let ids: Vec<NodeId> = ids.into_iter().map(Option::unwrap).collect();
    for &(up, down, slot) in edges {
        let out = g.node(ids[up]).outputs[0];
        let input = g.node(ids[down]).inputs[slot];
        g.make_connection(input, out);
    }
    (g, ids)
}

fn dag_strategy() -> impl Strategy<Value = (Vec<usize>, Vec<(usize, usize, usize)>)> {
    (2usize..12).prop_flat_map(|n| {
        let insertion = Just((0..n).collect::<Vec<_>>()).prop_shuffle();
        let edges = prop::collection::vec((0..n, 0..n, 0usize..3), 0..24).prop_map(|raw| {
            raw.into_iter()
                .filter(|(a, b, _)| a != b)
                .map(|(a, b, slot)| (a.min(b), a.max(b), slot))
                .collect::<Vec<_>>()
        });
        (insertion, edges)
    })
}

proptest! {
    #[test]
    fn sorted_nodes_follow_their_dependencies((insertion, edges) in dag_strategy()) {
        let (mut g, ids) = ranked_graph(&insertion, 3, &edges);
        let socket = g.add_output_socket("out", float_type());
        let last = g.node(ids[ids.len() - 1]).outputs[0];
        g.make_connection(socket, last);

        g.topological_sort().unwrap();

        let order: HashMap<NodeId, usize> = g.nodes().iter().enumerate().map(|(i, id)| (*id, i)).collect();
        prop_assert_eq!(g.nodes().len(), ids.len());
        prop_assert_eq!(order.len(), ids.len());
        for id in &ids {
            for input in g.node(*id).inputs.clone() {
                if let Some(up) = g.upstream_node(input) {
                    prop_assert!(
                        order[&up] < order[id],
                        "'{}' sorted after its consumer '{}'",
                        g.node(up).name,
                        g.node(*id).name
                    );
                }
            }
        }
    }

    #[test]
    fn connection_ring_reports_a_closed_path(n in 2usize..8) {
        let insertion: Vec<usize> = (0..n).collect();
        let edges: Vec<(usize, usize, usize)> = (0..n).map(|i| ((i + 1) % n, i, 0)).collect();
        let (mut g, ids) = ranked_graph(&insertion, 1, &edges);
        let socket = g.add_output_socket("out", float_type());
        let out = g.node(ids[0]).outputs[0];
        g.make_connection(socket, out);

        let err = g.topological_sort().unwrap_err();
        match err.downcast_ref::<ShaderGenError>() {
            Some(ShaderGenError::Cycle { node, path }) => {
                prop_assert_eq!(path.len(), n + 1);
                prop_assert_eq!(path.first(), path.last());
                prop_assert_eq!(Some(node), path.last());
            }
            other => prop_assert!(false, "expected a cycle error, got {other:?}"),
        }
    }

    #[test]
    fn switch_scopes_track_the_branches_a_node_feeds(
        branches in 2usize..6,
        feeds in prop::collection::vec(any::<bool>(), 6),
    ) {
        let f = float_type();
        let mut g = ShaderGraph::new("scoped");
        let shared = g.add_node("shared", "constant", "ND_constant_float", Classification::TEXTURE, NodeImpl::Boundary).unwrap();
        g.add_output(shared, "out", f.clone());
        let sw = g
            .add_node("sw", "switch", "ND_switch_float", Classification::TEXTURE | Classification::CONDITIONAL | Classification::SWITCH, NodeImpl::Boundary)
            .unwrap();
        for b in 0..branches {
            g.add_input(sw, &format!("in{}", b + 1), f.clone());
        }
        g.add_input(sw, "which", f.clone());
        g.add_output(sw, "out", f.clone());

        let mut mask = 0u32;
        for b in 0..branches {
            let upstream = if feeds[b] {
                mask |= 1 << b;
                shared
            } else {
                let filler = g
                    .add_node(&format!("fill{b}"), "constant", "ND_constant_float", Classification::TEXTURE, NodeImpl::Boundary)
                    .unwrap();
                g.add_output(filler, "out", f.clone());
                filler
            };
            let out = g.node(upstream).outputs[0];
            let input = g.node(sw).inputs[b];
            g.make_connection(input, out);
        }
        let socket = g.add_output_socket("out", f.clone());
        let out = g.node(sw).outputs[0];
        g.make_connection(socket, out);

        g.topological_sort().unwrap();
        g.calculate_scopes();

        prop_assert_eq!(g.node(sw).scope.kind, ScopeType::Global);
        let full = (1u32 << branches) - 1;
        let scope = g.node(shared).scope;
        if mask == full {
            prop_assert_eq!(scope.kind, ScopeType::Global);
        } else if mask == 0 {
            prop_assert_eq!(scope.kind, ScopeType::Unknown);
        } else {
            prop_assert_eq!(scope.kind, ScopeType::Single);
            prop_assert_eq!(scope.conditional_node, Some(sw));
            prop_assert_eq!(scope.condition_bitmask, mask);
            prop_assert_eq!(scope.full_condition_mask, full);
        }
        for b in (0..branches).filter(|b| !feeds[*b]) {
            let filler = g.node_by_name(&format!("fill{b}")).unwrap();
            let s = g.node(filler).scope;
            prop_assert_eq!(s.kind, ScopeType::Single);
            prop_assert_eq!(s.condition_bitmask, 1 << b);
        }
    }

    #[test]
    fn swizzle_reads_members_in_pattern_order(
        type_name in prop::sample::select(vec!["vector2", "vector3", "vector4", "color3", "color4"]),
        seed in prop::collection::vec(0usize..4, 4),
    ) {
        let reg = TypeRegistry::standard();
        let ty = reg.get_type(type_name).unwrap();
        let size = ty.size();
        let alphabet: &[char] = if type_name.starts_with("color") {
            &['r', 'g', 'b', 'a']
        } else {
            &['x', 'y', 'z', 'w']
        };
        let picks: Vec<usize> = seed.iter().take(size).map(|s| s % size).collect();
        let pattern: String = picks.iter().map(|i| alphabet[*i]).collect();

        for syntax in [syntax::glsl::syntax(), syntax::slang::syntax(), syntax::osl::syntax(), syntax::mdl::syntax()] {
            let members = syntax.type_syntax(&ty).unwrap().members.clone();
            prop_assert_eq!(members.len(), size);
            let expr = syntax.swizzled_variable("v", &ty, &pattern, &ty).unwrap();
            let mut at = 0;
            for i in &picks {
                let access = format!("v{}", members[*i]);
                match expr[at..].find(&access) {
                    Some(offset) => at += offset + access.len(),
                    None => prop_assert!(false, "{}: `{access}` missing after byte {at} of `{expr}`", syntax.language()),
                }
            }
        }
    }
}

#[test]
fn identity_swizzle_does_not_depend_on_the_channel_alphabet() {
    let reg = TypeRegistry::standard();
    for syntax in [syntax::glsl::syntax(), syntax::slang::syntax(), syntax::osl::syntax(), syntax::mdl::syntax()] {
        for (name, colors, vectors) in [("color3", "rgb", "xyz"), ("color4", "rgba", "xyzw"), ("vector3", "rgb", "xyz")] {
            let ty = reg.get_type(name).unwrap();
            let a = syntax.swizzled_variable("v", &ty, colors, &ty).unwrap();
            let b = syntax.swizzled_variable("v", &ty, vectors, &ty).unwrap();
            assert_eq!(a, b, "{} {name}", syntax.language());
        }
    }
}

/// A chain of adds over a constant, each node reading the previous one and optionally the
/// constant again.
fn chain_document(reread: &[bool]) -> String {
    let mut nodes = vec![
        r#"{"name": "c", "category": "constant", "type": "float", "inputs": [{"name": "value", "type": "float", "value": "0.25"}]}"#
            .to_string(),
    ];
    let mut previous = "c".to_string();
    for (i, again) in reread.iter().enumerate() {
        let second = if *again {
            r#"{"name": "in2", "type": "float", "nodename": "c"}"#.to_string()
        } else {
            format!(r#"{{"name": "in2", "type": "float", "value": "{i}.5"}}"#)
        };
        nodes.push(format!(
            r#"{{"name": "a{i}", "category": "add", "type": "float", "inputs": [{{"name": "in1", "type": "float", "nodename": "{previous}"}}, {second}]}}"#
        ));
        previous = format!("a{i}");
    }
    format!(
        r#"{{"nodes": [{}], "outputs": [{{"name": "result", "type": "float", "nodename": "{previous}"}}]}}"#,
        nodes.join(",\n")
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn generation_is_deterministic(reread in prop::collection::vec(any::<bool>(), 1..6)) {
        let doc = load_document_from_str(&chain_document(&reread)).unwrap();
        for target in ["genglsl", "genslang", "genosl", "genmdl"] {
            let generator = generator_for(target).unwrap();
            let mut sources = Vec::new();
            for _ in 0..2 {
                let mut ctx = GenContext::new(load_default_library().unwrap());
                let shader = generator.generate("chain", doc.element("result").unwrap(), &mut ctx).unwrap();
                sources.push(shader.source_code(PIXEL_STAGE).unwrap().to_string());
            }
            prop_assert_eq!(&sources[0], &sources[1], "{} output changed between runs", target);
            let last = format!("a{}_out", reread.len() - 1);
            prop_assert!(sources[0].contains(&last), "{}: `{}` missing", target, last);
        }
    }
}

/// Names and upstream wiring of every node input, in graph order.
fn wiring(g: &ShaderGraph) -> Vec<(String, Vec<(String, Option<String>)>)> {
    g.nodes()
        .iter()
        .map(|id| {
            let node = g.node(*id);
            let inputs = node
                .inputs
                .iter()
                .map(|i| {
                    let upstream = g.upstream_node(*i).map(|up| g.node(up).name.clone());
                    (g.input(*i).name.clone(), upstream)
                })
                .collect();
            (node.name.clone(), inputs)
        })
        .collect()
}

#[test]
fn flattening_twice_changes_nothing_the_second_time() {
    let text = std::fs::read_to_string(
        std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/cases/nested_nodegraph/document.json"),
    )
    .unwrap();
    let doc = load_document_from_str(&text).unwrap();
    let ctx = GenContext::new(load_default_library().unwrap());
    let syntax = syntax::glsl::syntax();
    let mut g = ShaderGraph::create("nested", doc.element("result").unwrap(), &syntax, "genglsl", &ctx).unwrap();

    assert!(g.flatten_graph().unwrap() > 0);
    let once = wiring(&g);
    assert_eq!(g.flatten_graph().unwrap(), 0);
    assert_eq!(wiring(&g), once);
}

#[test]
fn closure_contexts_follow_the_bsdf_flavor() {
    let lib = load_default_library().unwrap();
    let mut g = ShaderGraph::new("closures");
    let mut seen = 0;
    for def in &lib.nodedefs {
        let classification = classify(def);
        let id = g
            .add_node(&def.name, &def.node, &def.name, classification, NodeImpl::Boundary)
            .unwrap();
        let contexts = node_closure_contexts(g.node(id));
        let expected: &[ClosureContextType] = if classification.contains(Classification::BSDF_R) {
            &[ClosureContextType::Reflection, ClosureContextType::Indirect]
        } else if classification.contains(Classification::BSDF_T) {
            &[ClosureContextType::Transmission]
        } else if classification.contains(Classification::BSDF) {
            &[ClosureContextType::Reflection, ClosureContextType::Transmission, ClosureContextType::Indirect]
        } else if classification.contains(Classification::EDF) {
            &[ClosureContextType::Emission]
        } else {
            &[]
        };
        assert_eq!(contexts, expected, "{}", def.name);
        if !expected.is_empty() {
            seen += 1;
        }
    }
    assert!(seen > 0, "library has no closure nodes");

    let diffuse = lib.nodedef("ND_diffuse_bsdf").unwrap();
    let id = g.node_by_name(&diffuse.name).unwrap();
    assert_eq!(
        node_closure_contexts(g.node(id)),
        vec![ClosureContextType::Reflection, ClosureContextType::Indirect]
    );
}
