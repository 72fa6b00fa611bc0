//! First-argument indexing: tag dispatch and open-addressed constant tables.

use crate::machine::MachineState;
use crate::types::*;

#[derive(Debug, Clone, Copy)]
struct SwitchSlot {
    key: i64,
    code: CodePtr,
}

/// An open-addressed dispatch table over atom, integer or functor/arity
/// keys. Built once at clause-compilation time for a declared number of
/// keys; sized one slot larger so a probe always terminates on a free slot.
#[derive(Debug)]
pub struct SwitchTable {
    slots: Vec<Option<SwitchSlot>>,
}

impl SwitchTable {
    pub fn new(size: usize) -> Self {
        SwitchTable {
            slots: vec![None; size + 1],
        }
    }

    pub fn insert_atom(&mut self, atom: Atom, code: CodePtr) {
        self.insert(atom.0 as i64, code);
    }

    pub fn insert_integer(&mut self, value: i64, code: CodePtr) {
        self.insert(value, code);
    }

    pub fn insert_structure(&mut self, functor: Atom, arity: usize, code: CodePtr) {
        self.insert(FunctorArity::build_with(functor, arity).as_key(), code);
    }

    fn insert(&mut self, key: i64, code: CodePtr) {
        let n = self.locate(key);

        if self.slots[n].is_none() {
            let free = self.slots.iter().filter(|slot| slot.is_none()).count();

            assert!(free > 1, "switch table sized too small for its key set");
        }

        self.slots[n] = Some(SwitchSlot { key, code });
    }

    /// Linear probe from the key's home slot, wrapping at the end. Stops at
    /// the key or at a free slot; at least one free slot always exists.
    fn locate(&self, key: i64) -> usize {
        let size = self.slots.len();
        let mut n = key.rem_euclid(size as i64) as usize;

        loop {
            match self.slots[n] {
                Some(slot) if slot.key != key => {
                    n += 1;

                    if n == size {
                        n = 0;
                    }
                }
                _ => return n,
            }
        }
    }

    pub fn lookup(&self, key: i64) -> Option<CodePtr> {
        self.slots[self.locate(key)].map(|slot| slot.code)
    }
}

impl MachineState {
    /// The alternative of the current choice point, where every dispatch
    /// miss falls through to.
    fn backtrack_code(&self) -> Option<CodePtr> {
        if self.b == 0 {
            None
        } else {
            self.stack.or_frame(self.b).alt
        }
    }

    fn dispatch_a0(&mut self) -> Word {
        let word = self.deref(self.registers[0]);

        self.registers[0] = word;
        word
    }

    /// Dispatches on the tag of the first argument, leaving it dereferenced
    /// in its register for the per-tag code to pick up. A missing target
    /// (`None`) falls through to the current choice point's alternative.
    pub fn switch_on_term(
        &mut self,
        c_var: Option<CodePtr>,
        c_atm: Option<CodePtr>,
        c_int: Option<CodePtr>,
        c_lst: Option<CodePtr>,
        c_stc: Option<CodePtr>,
    ) -> Option<CodePtr> {
        let code = match self.dispatch_a0() {
            Word::Atm(_) => c_atm,
            Word::Int(_) => c_int,
            Word::Lis(_) => c_lst,
            Word::Stc(_) => c_stc,
            _ => c_var,
        };

        code.or_else(|| self.backtrack_code())
    }

    pub fn switch_on_term_var_atm(
        &mut self,
        c_var: Option<CodePtr>,
        c_atm: Option<CodePtr>,
    ) -> Option<CodePtr> {
        let code = match self.dispatch_a0() {
            Word::Atm(_) => c_atm,
            Word::Ref(_) | Word::Fdv(_) => c_var,
            _ => None,
        };

        code.or_else(|| self.backtrack_code())
    }

    pub fn switch_on_term_var_stc(
        &mut self,
        c_var: Option<CodePtr>,
        c_stc: Option<CodePtr>,
    ) -> Option<CodePtr> {
        let code = match self.dispatch_a0() {
            Word::Stc(_) => c_stc,
            Word::Ref(_) | Word::Fdv(_) => c_var,
            _ => None,
        };

        code.or_else(|| self.backtrack_code())
    }

    pub fn switch_on_term_var_atm_lst(
        &mut self,
        c_var: Option<CodePtr>,
        c_atm: Option<CodePtr>,
        c_lst: Option<CodePtr>,
    ) -> Option<CodePtr> {
        let code = match self.dispatch_a0() {
            Word::Atm(_) => c_atm,
            Word::Lis(_) => c_lst,
            Word::Ref(_) | Word::Fdv(_) => c_var,
            _ => None,
        };

        code.or_else(|| self.backtrack_code())
    }

    pub fn switch_on_term_var_atm_stc(
        &mut self,
        c_var: Option<CodePtr>,
        c_atm: Option<CodePtr>,
        c_stc: Option<CodePtr>,
    ) -> Option<CodePtr> {
        let code = match self.dispatch_a0() {
            Word::Atm(_) => c_atm,
            Word::Stc(_) => c_stc,
            Word::Ref(_) | Word::Fdv(_) => c_var,
            _ => None,
        };

        code.or_else(|| self.backtrack_code())
    }

    /// Table dispatch on the first argument, already dereferenced to an
    /// atom by [`switch_on_term`](Self::switch_on_term).
    pub fn switch_on_atom(&self, table: &SwitchTable) -> Option<CodePtr> {
        let key = match self.registers[0] {
            Word::Atm(atom) => atom.0 as i64,
            _ => unreachable!("atom dispatch on a non-atom first argument"),
        };

        table.lookup(key).or_else(|| self.backtrack_code())
    }

    pub fn switch_on_integer(&self, table: &SwitchTable) -> Option<CodePtr> {
        let key = match self.registers[0] {
            Word::Int(n) => n,
            _ => unreachable!("integer dispatch on a non-integer first argument"),
        };

        table.lookup(key).or_else(|| self.backtrack_code())
    }

    pub fn switch_on_structure(&self, table: &SwitchTable) -> Option<CodePtr> {
        let key = match self.registers[0] {
            Word::Stc(s) => match self.heap[s] {
                Word::Fun(fa) => fa.as_key(),
                _ => unreachable!("structure without a header cell"),
            },
            _ => unreachable!("structure dispatch on a non-structure first argument"),
        };

        table.lookup(key).or_else(|| self.backtrack_code())
    }
}
