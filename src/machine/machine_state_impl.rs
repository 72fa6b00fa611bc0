use crate::machine::machine_errors::*;
use crate::machine::trail::TrailEntry;
use crate::machine::{MachineMode, MachineState};
use crate::types::*;

impl MachineState {
    #[inline]
    pub fn read(&self, a: Addr) -> Word {
        match a {
            Addr::Heap(h) => self.heap[h],
            Addr::Stack(s) => self.stack[s],
        }
    }

    #[inline]
    pub(crate) fn write(&mut self, a: Addr, word: Word) {
        match a {
            Addr::Heap(h) => self.heap[h] = word,
            Addr::Stack(s) => self.stack[s] = word,
        }
    }

    /// Follows reference chains to the end: either a non-reference word or
    /// an unbound variable (a reference to itself). Chains are acyclic by
    /// construction, so this takes at most one step per live cell.
    pub fn deref(&self, mut word: Word) -> Word {
        while let Word::Ref(a) = word {
            let value = self.read(a);

            if value == word {
                return word;
            }

            word = value;
        }

        word
    }

    /// Binds the unbound variable at `r` to `value` and trails the binding.
    /// When the operands are both variables the caller directs the younger
    /// at the older.
    pub(crate) fn bind(&mut self, r: Addr, value: Word) -> MachineResult<()> {
        self.write(r, value);

        let slot = self.trail.tr();
        self.trail.push(TrailEntry::Unbind(Some(r)))?;

        if let (Some(hooks), Addr::Heap(_)) = (self.collector.as_mut(), r) {
            hooks.register_disappearing_link(slot, r);
        }

        Ok(())
    }

    /// Whether the unbound variable at `r` occurs inside `value`.
    pub(crate) fn occurs(&self, r: Addr, value: Word) -> bool {
        let mut worklist = vec![value];

        while let Some(word) = worklist.pop() {
            match self.deref(word) {
                Word::Ref(a) => {
                    if a == r {
                        return true;
                    }
                }
                Word::Lis(l) => {
                    worklist.push(self.heap[l]);
                    worklist.push(self.heap[l + 1]);
                }
                Word::Stc(s) => {
                    if let Word::Fun(fa) = self.heap[s] {
                        for i in 1..=fa.get_arity() {
                            worklist.push(self.heap[s + i]);
                        }
                    }
                }
                _ => {}
            }
        }

        false
    }

    pub(crate) fn fd_unify_with_integer(&mut self, fd: usize, value: i64) -> bool {
        match self.fd_solver.as_mut() {
            Some(solver) => solver.unify_with_integer(fd, value),
            None => false,
        }
    }

    /// Replaces an unbound local variable with a fresh heap variable bound
    /// from the local cell, and returns the heap variable's word.
    fn globalize_local_unbound_var(&mut self, a: Addr) -> MachineResult<Word> {
        let word = self.heap.push_var()?;
        self.bind(a, word)?;
        Ok(word)
    }

    // put instructions

    /// Pushes a fresh unbound heap variable and returns its word.
    pub fn put_x_variable(&mut self) -> MachineResult<Word> {
        self.heap.push_var()
    }

    /// Reinitializes permanent variable `y` of the current environment as
    /// unbound and returns its word.
    pub fn put_y_variable(&mut self, y: usize) -> Word {
        let s = self.e + 1 + y;
        let word = Word::unbound(Addr::Stack(s));

        self.stack[s] = word;
        word
    }

    /// Dereferences `start`; an unbound variable of the current environment
    /// is globalized first so the result never points into a frame about to
    /// be deallocated.
    pub fn put_unsafe_value(&mut self, start: Word) -> MachineResult<Word> {
        let word = self.deref(start);

        if let Word::Ref(a @ Addr::Stack(s)) = word {
            if s >= self.e {
                return self.globalize_local_unbound_var(a);
            }
        }

        Ok(word)
    }

    pub fn put_atom(&self, atom: Atom) -> Word {
        Word::Atm(atom)
    }

    pub fn put_integer(&self, n: i64) -> Word {
        Word::Int(n)
    }

    pub fn put_float(&mut self, n: f64) -> MachineResult<Word> {
        let word = Word::Flt(self.heap.h());
        self.heap.push_float(n)?;
        Ok(word)
    }

    pub fn put_nil(&self) -> Word {
        Word::Atm(self.nil_atom)
    }

    /// Starts a list at the heap top; the car and cdr are supplied by the
    /// two following write-mode unify instructions.
    pub fn put_list(&mut self) -> Word {
        self.mode = MachineMode::Write;
        Word::Lis(self.heap.h())
    }

    pub fn put_structure(&mut self, functor: Atom, arity: usize) -> MachineResult<Word> {
        self.put_structure_tagged(FunctorArity::build_with(functor, arity))
    }

    /// Pushes a structure header; the arguments are supplied by the
    /// following write-mode unify instructions.
    pub fn put_structure_tagged(&mut self, fa: FunctorArity) -> MachineResult<Word> {
        let h = self.heap.h();

        self.heap.push(Word::Fun(fa))?;
        self.mode = MachineMode::Write;
        Ok(Word::Stc(h))
    }

    pub fn put_meta_term(&mut self, module: Atom, goal: Word) -> MachineResult<Word> {
        self.put_meta_term_tagged(Word::Atm(module), goal)
    }

    /// Wraps `goal` as `Module:Goal`. A goal already wrapped with the same
    /// module is returned as is.
    pub fn put_meta_term_tagged(&mut self, module: Word, goal: Word) -> MachineResult<Word> {
        let colon_2 = FunctorArity::build_with(self.colon_atom, 2);

        if let Word::Stc(s) = self.deref(goal) {
            if self.heap[s] == Word::Fun(colon_2)
                && self.deref(self.heap[s + 1]) == self.deref(module)
            {
                return Ok(goal);
            }
        }

        let h = self.heap.h();

        self.heap.push(Word::Fun(colon_2))?;
        self.heap.push(module)?;
        self.heap.push(goal)?;
        Ok(Word::Stc(h))
    }

    // get instructions

    pub fn get_atom(&mut self, atom: Atom, start: Word) -> MachineResult<bool> {
        self.get_atom_tagged(Word::Atm(atom), start)
    }

    pub fn get_atom_tagged(&mut self, w: Word, start: Word) -> MachineResult<bool> {
        let word = self.deref(start);

        if let Some(r) = word.as_var() {
            self.bind(r, w)?;
            return Ok(true);
        }

        Ok(word == w)
    }

    pub fn get_integer(&mut self, n: i64, start: Word) -> MachineResult<bool> {
        self.get_integer_tagged(Word::Int(n), start)
    }

    pub fn get_integer_tagged(&mut self, w: Word, start: Word) -> MachineResult<bool> {
        let word = self.deref(start);

        if let Some(r) = word.as_var() {
            self.bind(r, w)?;
            return Ok(true);
        }

        if let (Word::Fdv(fd), Word::Int(n)) = (word, w) {
            return Ok(self.fd_unify_with_integer(fd, n));
        }

        Ok(word == w)
    }

    pub fn get_float(&mut self, n: f64, start: Word) -> MachineResult<bool> {
        let word = self.deref(start);

        if let Some(r) = word.as_var() {
            let boxed = self.put_float(n)?;
            self.bind(r, boxed)?;
            return Ok(true);
        }

        match word {
            Word::Flt(h) => Ok(self.heap.float_at(h) == n),
            _ => Ok(false),
        }
    }

    pub fn get_nil(&mut self, start: Word) -> MachineResult<bool> {
        self.get_atom_tagged(Word::Atm(self.nil_atom), start)
    }

    /// Matches a list cell. Against a variable, switches to write mode with
    /// the pair to be built at the heap top; against a list, switches to
    /// read mode with `s` at the car.
    pub fn get_list(&mut self, start: Word) -> MachineResult<bool> {
        let word = self.deref(start);

        if let Some(r) = word.as_var() {
            let lis = Word::Lis(self.heap.h());
            self.bind(r, lis)?;
            self.mode = MachineMode::Write;
            return Ok(true);
        }

        if let Word::Lis(l) = word {
            self.s = l;
            self.mode = MachineMode::Read;
            return Ok(true);
        }

        Ok(false)
    }

    pub fn get_structure(
        &mut self,
        functor: Atom,
        arity: usize,
        start: Word,
    ) -> MachineResult<bool> {
        self.get_structure_tagged(FunctorArity::build_with(functor, arity), start)
    }

    pub fn get_structure_tagged(&mut self, fa: FunctorArity, start: Word) -> MachineResult<bool> {
        let word = self.deref(start);

        if let Some(r) = word.as_var() {
            let stc = self.put_structure_tagged(fa)?;
            self.bind(r, stc)?;
            return Ok(true);
        }

        if let Word::Stc(s) = word {
            if self.heap[s] == Word::Fun(fa) {
                self.s = s + 1;
                self.mode = MachineMode::Read;
                return Ok(true);
            }
        }

        Ok(false)
    }

    // unify instructions

    /// Next subterm as a word: reads it, dereferenced, in read mode;
    /// creates it fresh in write mode.
    pub fn unify_variable(&mut self) -> MachineResult<Word> {
        match self.mode {
            MachineMode::Read => {
                let word = self.heap[self.s];
                self.s += 1;
                Ok(self.deref(word))
            }
            MachineMode::Write => self.heap.push_var(),
        }
    }

    /// Skips `n` subterms, creating them unbound in write mode.
    pub fn unify_void(&mut self, n: usize) -> MachineResult<()> {
        match self.mode {
            MachineMode::Read => self.s += n,
            MachineMode::Write => {
                for _ in 0..n {
                    self.heap.push_var()?;
                }
            }
        }

        Ok(())
    }

    /// Unifies `start` with the next subterm in read mode; stores it as the
    /// next subterm in write mode.
    pub fn unify_value(&mut self, start: Word) -> MachineResult<bool> {
        match self.mode {
            MachineMode::Read => {
                let word = self.heap[self.s];
                self.s += 1;
                self.unify(start, word)
            }
            MachineMode::Write => {
                self.heap.push(start)?;
                Ok(true)
            }
        }
    }

    /// Like [`unify_value`](Self::unify_value), but globalizes an unbound
    /// local variable before storing, so heap cells never reference the
    /// local stack.
    pub fn unify_local_value(&mut self, start: Word) -> MachineResult<bool> {
        match self.mode {
            MachineMode::Read => {
                let word = self.heap[self.s];
                self.s += 1;
                self.unify(start, word)
            }
            MachineMode::Write => {
                let word = self.deref(start);

                match word {
                    Word::Ref(a) if a.is_stack() => {
                        self.globalize_local_unbound_var(a)?;
                    }
                    word => self.heap.push(word)?,
                }

                Ok(true)
            }
        }
    }

    pub fn unify_atom(&mut self, atom: Atom) -> MachineResult<bool> {
        self.unify_atom_tagged(Word::Atm(atom))
    }

    pub fn unify_atom_tagged(&mut self, w: Word) -> MachineResult<bool> {
        match self.mode {
            MachineMode::Read => {
                let word = self.heap[self.s];
                self.s += 1;

                let word = self.deref(word);

                if let Some(r) = word.as_var() {
                    self.bind(r, w)?;
                    return Ok(true);
                }

                Ok(word == w)
            }
            MachineMode::Write => {
                self.heap.push(w)?;
                Ok(true)
            }
        }
    }

    pub fn unify_integer(&mut self, n: i64) -> MachineResult<bool> {
        self.unify_integer_tagged(Word::Int(n))
    }

    pub fn unify_integer_tagged(&mut self, w: Word) -> MachineResult<bool> {
        match self.mode {
            MachineMode::Read => {
                let word = self.heap[self.s];
                self.s += 1;

                self.get_integer_tagged(w, word)
            }
            MachineMode::Write => {
                self.heap.push(w)?;
                Ok(true)
            }
        }
    }

    pub fn unify_nil(&mut self) -> MachineResult<bool> {
        self.unify_atom_tagged(Word::Atm(self.nil_atom))
    }

    pub fn unify_list(&mut self) -> MachineResult<bool> {
        match self.mode {
            MachineMode::Read => {
                let word = self.heap[self.s];
                self.get_list(word)
            }
            MachineMode::Write => {
                let h = self.heap.h();
                self.heap.push(Word::Lis(h + 1))?;
                Ok(true)
            }
        }
    }

    pub fn unify_structure(&mut self, functor: Atom, arity: usize) -> MachineResult<bool> {
        self.unify_structure_tagged(FunctorArity::build_with(functor, arity))
    }

    pub fn unify_structure_tagged(&mut self, fa: FunctorArity) -> MachineResult<bool> {
        match self.mode {
            MachineMode::Read => {
                let word = self.heap[self.s];
                self.get_structure_tagged(fa, word)
            }
            MachineMode::Write => {
                let h = self.heap.h();
                self.heap.push(Word::Stc(h + 1))?;
                self.heap.push(Word::Fun(fa))?;
                Ok(true)
            }
        }
    }

    /// Globalizes `start` if it dereferences to an unbound local variable;
    /// otherwise leaves it alone. Returns `start` unchanged either way.
    pub fn globalize_if_in_local(&mut self, start: Word) -> MachineResult<Word> {
        if let Word::Ref(a) = self.deref(start) {
            if a.is_stack() {
                self.globalize_local_unbound_var(a)?;
            }
        }

        Ok(start)
    }
}
