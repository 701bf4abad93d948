//! Conditional scope analysis: which branches of which conditional node need a node.

use super::{Classification, NodeId, ShaderGraph};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScopeType {
    #[default]
    Unknown,
    /// Needed unconditionally.
    Global,
    /// Needed only by some branches of one conditional node.
    Single,
    /// Needed by branches of different conditionals; emitted like `Global`.
    Multiple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScopeInfo {
    pub kind: ScopeType,
    pub conditional_node: Option<NodeId>,
    pub condition_bitmask: u32,
    pub full_condition_mask: u32,
}

impl ScopeInfo {
    pub fn global() -> Self {
        Self {
            kind: ScopeType::Global,
            ..Self::default()
        }
    }

    /// Narrow this scope to branch `branch` of `node`, whose branches together cover
    /// `full_mask`. Branches past the width of the mask are not tracked and leave the scope
    /// as it is.
    pub fn adjust_at_conditional_input(&mut self, node: NodeId, branch: usize, full_mask: u32) {
        let Some(bit) = branch_bit(branch) else {
            return;
        };
        let unrestricted = self.kind == ScopeType::Global
            || (self.kind == ScopeType::Single && self.condition_bitmask == self.full_condition_mask);
        if unrestricted {
            self.kind = ScopeType::Single;
            self.conditional_node = Some(node);
            self.condition_bitmask = bit;
            self.full_condition_mask = full_mask;
        } else if self.kind == ScopeType::Single {
            self.kind = ScopeType::Multiple;
            self.conditional_node = None;
        }
    }

    pub fn merge(&mut self, from: &ScopeInfo) {
        if self.kind == ScopeType::Unknown || from.kind == ScopeType::Global {
            *self = *from;
        } else if self.kind == ScopeType::Global {
            // already unconditional
        } else if self.kind == ScopeType::Single
            && from.kind == ScopeType::Single
            && self.conditional_node == from.conditional_node
        {
            self.condition_bitmask |= from.condition_bitmask;
            if self.condition_bitmask == self.full_condition_mask {
                *self = ScopeInfo::global();
            }
        } else {
            self.kind = ScopeType::Multiple;
            self.conditional_node = None;
        }
    }

    /// Needed only by some branches of a single conditional node.
    pub fn referenced_conditionally(&self) -> bool {
        self.kind == ScopeType::Single && self.conditional_node.is_some()
    }

    pub fn uses_branch(&self, node: NodeId, branch: usize) -> bool {
        self.conditional_node == Some(node) && branch_bit(branch).is_some_and(|bit| self.condition_bitmask & bit != 0)
    }
}

fn branch_bit(branch: usize) -> Option<u32> {
    u32::try_from(branch).ok().and_then(|b| 1u32.checked_shl(b))
}

impl ShaderGraph {
    /// Input indices of `node` that are branches, when it is a conditional.
    pub fn conditional_branches(&self, node: NodeId) -> Vec<usize> {
        let n = self.node(node);
        if n.has(Classification::IFELSE) {
            ["in1", "in2"]
                .iter()
                .filter_map(|name| n.inputs.iter().position(|i| self.input(*i).name == *name))
                .collect()
        } else if n.has(Classification::SWITCH) {
            (0..n.inputs.len())
                .filter(|i| self.input(n.inputs[*i]).name != "which")
                .collect()
        } else {
            Vec::new()
        }
    }

    /// Propagate scopes from the output sockets upstream. Requires dependency order.
    pub fn calculate_scopes(&mut self) {
        for id in self.nodes().to_vec() {
            self.node_mut(id).scope = ScopeInfo::default();
        }
        for socket in self.output_sockets().to_vec() {
            if let Some(up) = self.upstream_node(socket) {
                self.node_mut(up).scope.merge(&ScopeInfo::global());
            }
        }

        for id in self.nodes().iter().rev().copied().collect::<Vec<_>>() {
            let scope = self.node(id).scope;
            if scope.kind == ScopeType::Unknown {
                continue;
            }
            let branches = self.conditional_branches(id);
            let full_mask = branches.iter().filter_map(|b| branch_bit(*b)).fold(0u32, |m, bit| m | bit);
            for (index, input) in self.node(id).inputs.clone().into_iter().enumerate() {
                let Some(up) = self.upstream_node(input) else {
                    continue;
                };
                let mut new_scope = scope;
                if branches.contains(&index) {
                    new_scope.adjust_at_conditional_input(id, index, full_mask);
                }
                self.node_mut(up).scope.merge(&new_scope);
            }
        }
    }
}
