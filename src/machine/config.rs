use crate::types::Atom;

/// Construction parameters for a [`MachineState`](crate::machine::MachineState).
///
/// The two atoms are indices into the embedder's symbol table: the core
/// needs to recognize `[]` when matching lists against their terminator and
/// `:` when building or reusing module-qualified meta-terms.
#[derive(Debug, Clone, Copy)]
pub struct MachineConfig {
    pub heap_limit: usize,
    pub local_limit: usize,
    pub trail_limit: usize,
    pub nil_atom: Atom,
    pub colon_atom: Atom,
}

impl Default for MachineConfig {
    fn default() -> Self {
        MachineConfig {
            heap_limit: usize::MAX,
            local_limit: usize::MAX,
            trail_limit: usize::MAX,
            nil_atom: Atom(0),
            colon_atom: Atom(1),
        }
    }
}

impl MachineConfig {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_heap_limit(mut self, limit: usize) -> Self {
        self.heap_limit = limit;
        self
    }

    pub fn with_local_limit(mut self, limit: usize) -> Self {
        self.local_limit = limit;
        self
    }

    pub fn with_trail_limit(mut self, limit: usize) -> Self {
        self.trail_limit = limit;
        self
    }

    pub fn with_nil_atom(mut self, nil_atom: Atom) -> Self {
        self.nil_atom = nil_atom;
        self
    }

    pub fn with_colon_atom(mut self, colon_atom: Atom) -> Self {
        self.colon_atom = colon_atom;
        self
    }
}
