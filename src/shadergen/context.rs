//! Per-compile state threaded through generation.

use std::collections::BTreeSet;

use anyhow::Result;

use super::GenOptions;
use crate::library::NodeLibrary;
use crate::syntax::Syntax;
use crate::types::{TypeRegistry, names};

/// Term of the lighting equation a closure is being evaluated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ClosureContextType {
    Reflection,
    Transmission,
    Indirect,
    Emission,
}

/// How closure functions are called for one lighting term: the extra leading arguments and the
/// function-name suffix selecting the variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosureContext {
    pub kind: ClosureContextType,
    /// `(type, name)` pairs passed before the node's own inputs.
    pub arguments: Vec<(&'static str, &'static str)>,
    pub suffix: &'static str,
}

impl ClosureContext {
    pub fn new(kind: ClosureContextType) -> Self {
        let (arguments, suffix) = match kind {
            ClosureContextType::Reflection => {
                (vec![(names::VECTOR3, "L"), (names::VECTOR3, "V")], "_reflection")
            }
            ClosureContextType::Transmission => (vec![(names::VECTOR3, "V")], "_transmission"),
            ClosureContextType::Indirect => (vec![(names::VECTOR3, "V")], "_indirect"),
            ClosureContextType::Emission => (vec![(names::VECTOR3, "N"), (names::VECTOR3, "L")], ""),
        };
        Self {
            kind,
            arguments,
            suffix,
        }
    }

    /// Parameter declarations, e.g. `vec3 L, vec3 V`.
    pub fn parameter_list(&self, syntax: &Syntax, types: &TypeRegistry) -> Result<Vec<String>> {
        self.arguments
            .iter()
            .map(|(ty, name)| {
                let ty = types.get_type(ty)?;
                Ok(format!("{} {name}", syntax.type_name(&ty)?))
            })
            .collect()
    }

    pub fn call_arguments(&self) -> Vec<String> {
        self.arguments.iter().map(|(_, name)| name.to_string()).collect()
    }
}

pub struct GenContext {
    pub types: TypeRegistry,
    pub library: NodeLibrary,
    pub options: GenOptions,
    closure_contexts: Vec<ClosureContext>,
    used_implementations: BTreeSet<String>,
}

impl GenContext {
    pub fn new(library: NodeLibrary) -> Self {
        Self {
            types: TypeRegistry::standard(),
            library,
            options: GenOptions::default(),
            closure_contexts: Vec::new(),
            used_implementations: BTreeSet::new(),
        }
    }

    pub fn with_options(mut self, options: GenOptions) -> Self {
        self.options = options;
        self
    }

    /// Innermost active closure context.
    pub fn closure_context(&self) -> Option<&ClosureContext> {
        self.closure_contexts.last()
    }

    pub fn push_closure_context(&mut self, context: ClosureContext) {
        self.closure_contexts.push(context);
    }

    pub fn pop_closure_context(&mut self) -> Option<ClosureContext> {
        self.closure_contexts.pop()
    }

    /// Run `f` with `context` active; the context is popped again whatever `f` returns.
    pub fn with_closure_context<R>(&mut self, context: ClosureContext, f: impl FnOnce(&mut Self) -> R) -> R {
        self.push_closure_context(context);
        let result = f(self);
        self.pop_closure_context();
        result
    }

    pub fn add_used_implementation(&mut self, name: &str) {
        if !name.is_empty() {
            self.used_implementations.insert(name.to_string());
        }
    }

    /// Implementations emitted since the last reset, sorted by name.
    pub fn used_implementations(&self) -> Vec<String> {
        self.used_implementations.iter().cloned().collect()
    }

    pub(crate) fn begin_generation(&mut self) {
        self.closure_contexts.clear();
        self.used_implementations.clear();
    }
}
