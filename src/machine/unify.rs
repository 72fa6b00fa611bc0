use crate::machine::machine_errors::*;
use crate::machine::MachineState;
use crate::types::*;

use derive_more::{Deref, DerefMut};

use std::ops::{Deref, DerefMut};

/// The unification loop, parameterized over the binding step so that the
/// occurs-check variant can interpose without duplicating the traversal.
pub(crate) trait Unifier: DerefMut<Target = MachineState> {
    fn bind(&mut self, r: Addr, value: Word) -> MachineResult<()>;

    /// Drains the push-down list pairwise, decomposing compound terms and
    /// binding variables until it is empty or a mismatch sets `fail`.
    fn unify_internal(&mut self) -> MachineResult<()> {
        while !(self.pdl.is_empty() || self.fail) {
            let w1 = self.pdl.pop().unwrap();
            let w1 = (self.deref() as &MachineState).deref(w1);

            let w2 = self.pdl.pop().unwrap();
            let w2 = (self.deref() as &MachineState).deref(w2);

            if w1 == w2 {
                continue;
            }

            match (w1, w2) {
                (Word::Ref(a1), Word::Ref(a2)) => {
                    // younger binds to older
                    if a1 < a2 {
                        Self::bind(self, a2, w1)?;
                    } else {
                        Self::bind(self, a1, w2)?;
                    }
                }
                (Word::Ref(a), word) | (word, Word::Ref(a)) => {
                    Self::bind(self, a, word)?;
                }
                (Word::Fdv(fd), Word::Int(n)) | (Word::Int(n), Word::Fdv(fd)) => {
                    if !self.fd_unify_with_integer(fd, n) {
                        self.fail = true;
                    }
                }
                (Word::Flt(h1), Word::Flt(h2)) => {
                    if self.heap.float_at(h1) != self.heap.float_at(h2) {
                        self.fail = true;
                    }
                }
                (Word::Lis(l1), Word::Lis(l2)) => {
                    let machine_st = self.deref_mut();

                    machine_st.pdl.push(machine_st.heap[l1 + 1]);
                    machine_st.pdl.push(machine_st.heap[l2 + 1]);
                    machine_st.pdl.push(machine_st.heap[l1]);
                    machine_st.pdl.push(machine_st.heap[l2]);
                }
                (Word::Stc(s1), Word::Stc(s2)) => {
                    let machine_st = self.deref_mut();

                    if machine_st.heap[s1] != machine_st.heap[s2] {
                        machine_st.fail = true;
                        continue;
                    }

                    let arity = match machine_st.heap[s1] {
                        Word::Fun(fa) => fa.get_arity(),
                        _ => unreachable!("structure without a header cell"),
                    };

                    for i in (1..=arity).rev() {
                        machine_st.pdl.push(machine_st.heap[s1 + i]);
                        machine_st.pdl.push(machine_st.heap[s2 + i]);
                    }
                }
                _ => {
                    self.fail = true;
                }
            }
        }

        Ok(())
    }
}

#[derive(Deref, DerefMut)]
#[deref(forward)]
pub(crate) struct DefaultUnifier<'a> {
    machine_st: &'a mut MachineState,
}

impl<'a> From<&'a mut MachineState> for DefaultUnifier<'a> {
    fn from(machine_st: &'a mut MachineState) -> Self {
        DefaultUnifier { machine_st }
    }
}

impl<'a> Unifier for DefaultUnifier<'a> {
    fn bind(&mut self, r: Addr, value: Word) -> MachineResult<()> {
        self.machine_st.bind(r, value)
    }
}

pub(crate) struct CompositeUnifierForOccursCheck<U: Unifier> {
    unifier: U,
}

impl<U: Unifier> Deref for CompositeUnifierForOccursCheck<U> {
    type Target = MachineState;

    fn deref(&self) -> &Self::Target {
        self.unifier.deref()
    }
}

impl<U: Unifier> DerefMut for CompositeUnifierForOccursCheck<U> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.unifier.deref_mut()
    }
}

impl<U: Unifier> From<U> for CompositeUnifierForOccursCheck<U> {
    fn from(unifier: U) -> Self {
        CompositeUnifierForOccursCheck { unifier }
    }
}

impl<U: Unifier> Unifier for CompositeUnifierForOccursCheck<U> {
    fn bind(&mut self, r: Addr, value: Word) -> MachineResult<()> {
        // heap cells never reference the local stack, so a local variable
        // cannot occur inside the term it is bound to
        if !r.is_stack() && self.occurs(r, value) {
            self.fail = true;
            return Ok(());
        }

        U::bind(&mut self.unifier, r, value)
    }
}

impl MachineState {
    fn run_unifier<U: Unifier>(mut unifier: U) -> MachineResult<bool> {
        unifier.unify_internal()?;

        let failed = unifier.fail;

        unifier.fail = false;
        unifier.pdl.clear();

        Ok(!failed)
    }

    /// Structural unification. On failure the bindings made along the way
    /// remain; the caller rolls back via the trail.
    pub fn unify(&mut self, w1: Word, w2: Word) -> MachineResult<bool> {
        self.pdl.push(w1);
        self.pdl.push(w2);

        Self::run_unifier(DefaultUnifier::from(self))
    }

    /// Structural unification refusing to bind a variable to a term that
    /// contains it.
    pub fn unify_with_occurs_check(&mut self, w1: Word, w2: Word) -> MachineResult<bool> {
        self.pdl.push(w1);
        self.pdl.push(w2);

        Self::run_unifier(CompositeUnifierForOccursCheck::from(DefaultUnifier::from(
            self,
        )))
    }
}
