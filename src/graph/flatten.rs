//! Inlining of compound (node-graph) implementations into the parent graph.

use std::collections::HashMap;

use anyhow::{Result, bail};

use super::{NodeId, NodeImpl, OutputId, ShaderGraph};
use crate::types::Value;

/// Where an interior connection ends up once the compound is gone.
enum Source {
    Output(OutputId),
    Value(Option<Value>),
}

impl ShaderGraph {
    /// Inline compound nodes until none is left. Interior nodes are renamed
    /// `<compound>_<child>`. Returns how many compounds were inlined; a second call on the
    /// result inlines nothing.
    pub fn flatten_graph(&mut self) -> Result<usize> {
        let mut count = 0;
        while let Some(id) = self.nodes().iter().copied().find(|n| self.node(*n).is_compound()) {
            self.inline_compound(id)?;
            count += 1;
        }
        if count > 0 {
            log::debug!(
                "[graph] flattened {count} compound node(s) in '{}', {} node(s) remain",
                self.name,
                self.node_count()
            );
        }
        Ok(count)
    }

    fn inline_compound(&mut self, id: NodeId) -> Result<()> {
        let compound_name = self.node(id).name.clone();
        let NodeImpl::Compound(compound) =
            std::mem::replace(&mut self.node_mut(id).implementation, NodeImpl::Boundary)
        else {
            return Ok(());
        };
        let sub = compound.graph;

        // Clone interior nodes and their ports.
        let mut node_map: HashMap<NodeId, NodeId> = HashMap::new();
        let mut output_map: HashMap<OutputId, OutputId> = HashMap::new();
        for &child in sub.nodes() {
            let src = sub.node(child);
            let name = self.unique_node_name(&format!("{compound_name}_{}", src.name));
            let new_id = self.add_node(
                &name,
                &src.category,
                &src.nodedef,
                src.classification,
                src.implementation.clone(),
            )?;
            for &i in &src.inputs {
                let port = sub.input(i);
                let new_input = self.add_input(new_id, &port.name, port.ty.clone());
                let copy = self.input_mut(new_input);
                copy.value = port.value.clone();
                copy.uniform = port.uniform;
            }
            for &o in &src.outputs {
                let port = sub.output(o);
                let new_output = self.add_output(new_id, &port.name, port.ty.clone());
                output_map.insert(o, new_output);
            }
            node_map.insert(child, new_id);
        }

        let resolve = |this: &ShaderGraph, sub_output: OutputId| -> Source {
            let port = sub.output(sub_output);
            if port.node != sub.boundary() {
                return match output_map.get(&sub_output) {
                    Some(o) => Source::Output(*o),
                    None => Source::Value(None),
                };
            }
            // Interior input bound to an interface input: take whatever feeds the compound,
            // falling back to the interface default.
            match this.node_input(id, &port.name) {
                Some(outer) => match this.input(outer).connection {
                    Some(up) => Source::Output(up),
                    None => Source::Value(this.input(outer).value.clone().or_else(|| port.value.clone())),
                },
                None => Source::Value(port.value.clone()),
            }
        };

        for &child in sub.nodes() {
            for (k, &i) in sub.node(child).inputs.iter().enumerate() {
                let Some(up) = sub.input(i).connection else {
                    continue;
                };
                let target = self.node(node_map[&child]).inputs[k];
                match resolve(self, up) {
                    Source::Output(o) => self.make_connection(target, o),
                    Source::Value(Some(v)) => self.input_mut(target).value = Some(v),
                    Source::Value(None) => {}
                }
            }
        }

        for out in self.node(id).outputs.clone() {
            let name = self.output(out).name.clone();
            let Some(socket) = sub.output_socket(&name) else {
                bail!("compound '{compound_name}' has no output socket '{name}'");
            };
            let source = match sub.input(socket).connection {
                Some(up) => resolve(self, up),
                None => Source::Value(sub.input(socket).value.clone()),
            };
            for downstream in self.output(out).connections.clone() {
                self.break_connection(downstream);
                match &source {
                    Source::Output(o) => self.make_connection(downstream, *o),
                    Source::Value(Some(v)) => self.input_mut(downstream).value = Some(v.clone()),
                    Source::Value(None) => {}
                }
            }
        }

        self.remove_node(id);
        Ok(())
    }

    /// Nodes with a compound implementation, counted through every nesting level.
    pub fn compound_count(&self) -> usize {
        self.nodes()
            .iter()
            .map(|id| match &self.node(*id).implementation {
                NodeImpl::Compound(c) => 1 + c.graph.compound_count(),
                _ => 0,
            })
            .sum()
    }

    /// Non-compound nodes, counted through every nesting level.
    pub fn leaf_count(&self) -> usize {
        self.nodes()
            .iter()
            .map(|id| match &self.node(*id).implementation {
                NodeImpl::Compound(c) => c.graph.leaf_count(),
                _ => 1,
            })
            .sum()
    }
}
