//! Graph rewrites that remove nodes without changing what the graph computes.

use anyhow::{Result, bail};

use super::{Classification, InputId, NodeId, ShaderGraph};
use crate::shadergen::GenOptions;
use crate::types::Value;

impl ShaderGraph {
    /// Bypass pass-through nodes, optionally fold constants and constant conditionals, then
    /// drop everything no output socket depends on. Returns the number of removed nodes.
    pub fn optimize(&mut self, options: &GenOptions) -> Result<usize> {
        let mut edits = 0;
        for id in self.nodes().to_vec() {
            let node = self.node(id);
            let bypass_input = if node.has(Classification::DOT)
                || (options.elide_constant_nodes && node.has(Classification::CONSTANT))
            {
                Some(0)
            } else if options.fold_constant_conditionals && node.has(Classification::CONDITIONAL) {
                self.selected_branch(id)
            } else {
                None
            };
            let Some(input_index) = bypass_input else {
                continue;
            };
            if self.node(id).inputs.len() <= input_index || self.node(id).outputs.len() != 1 {
                continue;
            }
            log::debug!(
                "[optimize] bypassing '{}' through input {input_index}",
                self.node(id).name
            );
            self.bypass(id, input_index, 0)?;
            edits += 1;
        }

        let used = self.used_nodes();
        for id in self.nodes().to_vec() {
            if !used.contains(&id) {
                log::debug!("[optimize] pruning unused node '{}'", self.node(id).name);
                self.remove_node(id);
                edits += 1;
            }
        }
        Ok(edits)
    }

    /// Replace `node` by what feeds its input `input_index`: every consumer of output
    /// `output_index` is reconnected upstream (or given the input's literal value) and the
    /// node is removed. Fails when another output of the node is still connected.
    pub fn bypass(&mut self, node: NodeId, input_index: usize, output_index: usize) -> Result<()> {
        let n = self.node(node);
        let (Some(&input), Some(&output)) = (n.inputs.get(input_index), n.outputs.get(output_index)) else {
            bail!(
                "cannot bypass node '{}': no input {input_index} or output {output_index}",
                n.name
            );
        };
        for (k, &other) in n.outputs.iter().enumerate() {
            if k != output_index && !self.output(other).connections.is_empty() {
                bail!(
                    "cannot bypass node '{}': output '{}' is still connected",
                    n.name,
                    self.output(other).name
                );
            }
        }

        let upstream = self.input(input).connection;
        let value = self.input(input).value.clone();
        for downstream in self.output(output).connections.clone() {
            self.break_connection(downstream);
            match upstream {
                Some(up) => self.make_connection(downstream, up),
                None => self.input_mut(downstream).value = value.clone(),
            }
        }
        self.remove_node(node);
        Ok(())
    }

    /// Literal value behind `input`: its own value when unconnected, or the value of a
    /// constant node feeding it.
    pub fn literal_value(&self, input: InputId) -> Option<&Value> {
        let port = self.input(input);
        match port.connection {
            None => port.value.as_ref(),
            Some(_) => {
                let up = self.upstream_node(input)?;
                if !self.node(up).has(Classification::CONSTANT) {
                    return None;
                }
                let value = *self.node(up).inputs.first()?;
                if self.input(value).connection.is_some() {
                    return None;
                }
                self.input(value).value.as_ref()
            }
        }
    }

    /// Input index a conditional node statically resolves to, when its controls are literal.
    pub fn selected_branch(&self, node: NodeId) -> Option<usize> {
        let n = self.node(node);
        let named = |name: &str| self.node_input(node, name).and_then(|i| self.literal_value(i));
        let branches = self.conditional_branches(node);
        if n.has(Classification::SWITCH) {
            let which = named("which")?.as_f32()?;
            let index = select_switch_branch(which, branches.len())?;
            branches.get(index).copied()
        } else if n.has(Classification::IFELSE) {
            let intest = named("intest")?.as_f32()?;
            let cutoff = named("cutoff")?.as_f32()?;
            let index = if intest <= cutoff { 0 } else { 1 };
            branches.get(index).copied()
        } else {
            None
        }
    }
}

/// Branch a switch takes for control value `which` among `count` branches.
pub fn select_switch_branch(which: f32, count: usize) -> Option<usize> {
    if count == 0 {
        return None;
    }
    let index = which.floor().max(0.0) as usize;
    Some(index.min(count - 1))
}
