//! Dependency ordering of graph children.

use std::collections::HashMap;

use anyhow::Result;

use super::{NodeId, ShaderGraph};
use crate::error::ShaderGenError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    OnPath,
    Done,
}

impl ShaderGraph {
    /// Reorder children so every node follows all of its upstream dependencies.
    ///
    /// Depth-first from the output sockets in declaration order, then from any remaining node in
    /// current order; inputs are visited in declaration order, so the result depends only on
    /// the graph's structure. A connection cycle fails with [`ShaderGenError::Cycle`] and leaves
    /// the order untouched.
    pub fn topological_sort(&mut self) -> Result<()> {
        let mut marks: HashMap<NodeId, Mark> = HashMap::new();
        let mut sorted = Vec::with_capacity(self.node_count());

        let roots: Vec<NodeId> = self
            .output_sockets()
            .iter()
            .filter_map(|s| self.upstream_node(*s))
            .chain(self.nodes().iter().copied())
            .collect();
        for root in roots {
            if !marks.contains_key(&root) {
                self.visit(root, &mut marks, &mut sorted)?;
            }
        }

        self.order = sorted;
        Ok(())
    }

    fn visit(&self, start: NodeId, marks: &mut HashMap<NodeId, Mark>, sorted: &mut Vec<NodeId>) -> Result<()> {
        // (node, next input to look at)
        let mut stack: Vec<(NodeId, usize)> = vec![(start, 0)];
        marks.insert(start, Mark::OnPath);

        while let Some(top) = stack.last_mut() {
            let (node, next) = *top;
            let inputs = &self.node(node).inputs;
            if next < inputs.len() {
                top.1 += 1;
                let Some(up) = self.upstream_node(inputs[next]) else {
                    continue;
                };
                match marks.get(&up) {
                    Some(Mark::Done) => {}
                    Some(Mark::OnPath) => {
                        let from = stack.iter().position(|(n, _)| *n == up).unwrap_or(0);
                        let mut path: Vec<String> = stack[from..]
                            .iter()
                            .map(|(n, _)| self.node(*n).name.clone())
                            .collect();
                        path.push(self.node(up).name.clone());
                        return Err(ShaderGenError::cycle(path).into());
                    }
                    None => {
                        marks.insert(up, Mark::OnPath);
                        stack.push((up, 0));
                    }
                }
            } else {
                stack.pop();
                marks.insert(node, Mark::Done);
                sorted.push(node);
            }
        }
        Ok(())
    }
}
