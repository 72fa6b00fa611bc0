pub mod config;
pub mod gc;
pub mod heap;
pub mod machine_errors;
mod machine_state_impl;
pub mod stack;
pub mod trail;
mod unify;

use crate::machine::config::MachineConfig;
use crate::machine::gc::CollectorHooks;
use crate::machine::heap::Heap;
use crate::machine::machine_errors::*;
use crate::machine::stack::{AndFramePrelude, OrFramePrelude, Stack};
use crate::machine::trail::Trail;
use crate::types::*;

use std::fmt;

/// Number of argument registers.
pub const NB_OF_X_REGS: usize = 256;

/// Read or write mode of the unify instruction family, set by the most
/// recent get/put of a compound term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineMode {
    Read,
    Write,
}

/// An external finite-domain constraint solver. The core never inspects an
/// `Fdv` handle; whenever unification meets one against an integer it
/// delegates here.
pub trait FdSolver {
    fn unify_with_integer(&mut self, fd: usize, value: i64) -> bool;
}

/// The complete register and memory state of one execution core. Every
/// register the instruction set touches lives here; two machines share
/// nothing.
pub struct MachineState {
    pub registers: Vec<Word>,
    pub heap: Heap,
    pub stack: Stack,
    pub trail: Trail,
    /// Structure-argument pointer, paired with `mode`.
    pub s: usize,
    pub mode: MachineMode,
    /// Youngest live choice point, 0 for none.
    pub b: usize,
    /// Current environment, 0 for none.
    pub e: usize,
    /// Heap top at the youngest choice point's creation.
    pub hb: usize,
    /// Continuation code pointer.
    pub cp: Option<CodePtr>,
    /// Opaque byte-code context saved and restored alongside `cp`.
    pub bci: u64,
    /// Opaque code-segment marker saved in choice points.
    pub cs: usize,
    /// Generation counter: incremented per choice-point creation,
    /// decremented per deletion.
    pub stamp: usize,
    /// Unifier failure flag.
    pub fail: bool,
    pub(crate) pdl: Vec<Word>,
    pub(crate) nil_atom: Atom,
    pub(crate) colon_atom: Atom,
    pub(crate) fd_solver: Option<Box<dyn FdSolver>>,
    pub(crate) collector: Option<Box<dyn CollectorHooks>>,
}

impl fmt::Debug for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MachineState")
            .field("h", &self.heap.h())
            .field("tr", &self.trail.tr())
            .field("s", &self.s)
            .field("mode", &self.mode)
            .field("b", &self.b)
            .field("e", &self.e)
            .field("hb", &self.hb)
            .field("cp", &self.cp)
            .field("stamp", &self.stamp)
            .field("fail", &self.fail)
            .finish()
    }
}

impl MachineState {
    pub fn new() -> Self {
        Self::with_config(MachineConfig::default())
    }

    pub fn with_config(config: MachineConfig) -> Self {
        MachineState {
            registers: vec![Word::Int(0); NB_OF_X_REGS],
            heap: Heap::new(config.heap_limit),
            stack: Stack::new(config.local_limit),
            trail: Trail::new(config.trail_limit),
            s: 0,
            mode: MachineMode::Read,
            b: 0,
            e: 0,
            hb: 0,
            cp: None,
            bci: 0,
            cs: 0,
            stamp: 0,
            fail: false,
            pdl: vec![],
            nil_atom: config.nil_atom,
            colon_atom: config.colon_atom,
            fd_solver: None,
            collector: None,
        }
    }

    pub fn set_fd_solver(&mut self, solver: Box<dyn FdSolver>) {
        self.fd_solver = Some(solver);
    }

    pub fn set_collector(&mut self, hooks: Box<dyn CollectorHooks>) {
        self.collector = Some(hooks);
    }

    /// Pushes an environment with `n` permanent variables, saving the
    /// continuation registers.
    pub fn allocate(&mut self, n: usize) -> MachineResult<()> {
        let prelude = AndFramePrelude {
            num_cells: n,
            e: self.e,
            cp: self.cp,
            bci: self.bci,
        };

        self.e = self.stack.allocate_and_frame(n, prelude)?;
        Ok(())
    }

    /// Pops the current environment, restoring the continuation registers.
    pub fn deallocate(&mut self) {
        let frame = *self.stack.and_frame(self.e);

        self.cp = frame.cp;
        self.bci = frame.bci;
        self.e = frame.e;
    }

    /// Pushes a choice point saving the first `arity` argument registers.
    /// `alt` is the code to resume at on backtracking; `None` makes the
    /// frame defeasible (a pure undo barrier with no alternative).
    pub fn create_choice_point(
        &mut self,
        alt: Option<CodePtr>,
        arity: usize,
    ) -> MachineResult<()> {
        let prelude = OrFramePrelude {
            num_cells: arity,
            alt,
            cp: self.cp,
            bci: self.bci,
            e: self.e,
            b: self.b,
            h: self.heap.h(),
            tr: self.trail.tr(),
            cs: self.cs,
            stamp: self.stamp + 1,
        };

        self.b = self.stack.allocate_or_frame(prelude, &self.registers[..arity])?;
        self.stamp += 1;
        self.hb = self.heap.h();
        Ok(())
    }

    /// Restores the machine to the current choice point's creation state,
    /// reloads the first `arity` saved argument registers, and replaces the
    /// frame's alternative with `alt`. The frame stays live.
    pub fn update_choice_point(&mut self, alt: Option<CodePtr>, arity: usize) {
        let b = self.b;

        self.untrail(self.stack.or_frame(b).tr);

        let frame = *self.stack.or_frame(b);

        self.cp = frame.cp;
        self.bci = frame.bci;
        self.e = frame.e;
        self.cs = frame.cs;
        self.heap.truncate(frame.h);
        self.hb = frame.h;

        self.stack.or_frame_mut(b).alt = alt;

        for i in 0..arity {
            self.registers[i] = self.stack[b + 1 + i];
        }

        self.stack.truncate(b + 1 + frame.num_cells);
    }

    /// Restores the machine to the current choice point's creation state,
    /// reloads the first `arity` saved argument registers, and pops the
    /// frame, reinstating its predecessor.
    pub fn delete_choice_point(&mut self, arity: usize) {
        let b = self.b;

        self.untrail(self.stack.or_frame(b).tr);

        let frame = *self.stack.or_frame(b);

        self.cp = frame.cp;
        self.bci = frame.bci;
        self.e = frame.e;
        self.cs = frame.cs;
        self.heap.truncate(frame.h);

        for i in 0..arity {
            self.registers[i] = self.stack[b + 1 + i];
        }

        self.assign_b(frame.b);
        self.stamp -= 1;
        self.stack.truncate(b);
    }

    pub fn create_choice_point0(&mut self, alt: Option<CodePtr>) -> MachineResult<()> {
        self.create_choice_point(alt, 0)
    }

    pub fn create_choice_point1(&mut self, alt: Option<CodePtr>) -> MachineResult<()> {
        self.create_choice_point(alt, 1)
    }

    pub fn create_choice_point2(&mut self, alt: Option<CodePtr>) -> MachineResult<()> {
        self.create_choice_point(alt, 2)
    }

    pub fn create_choice_point3(&mut self, alt: Option<CodePtr>) -> MachineResult<()> {
        self.create_choice_point(alt, 3)
    }

    pub fn create_choice_point4(&mut self, alt: Option<CodePtr>) -> MachineResult<()> {
        self.create_choice_point(alt, 4)
    }

    pub fn update_choice_point0(&mut self, alt: Option<CodePtr>) {
        self.update_choice_point(alt, 0)
    }

    pub fn update_choice_point1(&mut self, alt: Option<CodePtr>) {
        self.update_choice_point(alt, 1)
    }

    pub fn update_choice_point2(&mut self, alt: Option<CodePtr>) {
        self.update_choice_point(alt, 2)
    }

    pub fn update_choice_point3(&mut self, alt: Option<CodePtr>) {
        self.update_choice_point(alt, 3)
    }

    pub fn update_choice_point4(&mut self, alt: Option<CodePtr>) {
        self.update_choice_point(alt, 4)
    }

    pub fn delete_choice_point0(&mut self) {
        self.delete_choice_point(0)
    }

    pub fn delete_choice_point1(&mut self) {
        self.delete_choice_point(1)
    }

    pub fn delete_choice_point2(&mut self) {
        self.delete_choice_point(2)
    }

    pub fn delete_choice_point3(&mut self) {
        self.delete_choice_point(3)
    }

    pub fn delete_choice_point4(&mut self) {
        self.delete_choice_point(4)
    }

    /// Sets the B register, keeping `hb` in sync with the new frame's heap
    /// snapshot.
    pub(crate) fn assign_b(&mut self, b: usize) {
        self.b = b;
        self.hb = if b == 0 { 0 } else { self.stack.or_frame(b).h };
    }

    /// The current choice point as a storable word, for later `cut` or
    /// `soft_cut`.
    pub fn get_current_choice(&self) -> Word {
        Word::Int(self.b as i64)
    }

    fn to_choice_point(word: Word) -> usize {
        match word {
            Word::Int(b) => b as usize,
            _ => unreachable!("cut argument is not a saved choice point"),
        }
    }

    /// Discards every choice point younger than the one saved in `b_word`.
    pub fn cut(&mut self, b_word: Word) {
        self.assign_b(Self::to_choice_point(b_word));
    }

    /// Unchains exactly the choice point saved in `b_word`, leaving younger
    /// ones intact. If backtracking already discarded it, does nothing.
    pub fn soft_cut(&mut self, b_word: Word) {
        let kill_b = Self::to_choice_point(b_word);
        let mut cur_b = self.b;

        if cur_b == kill_b {
            let prev = self.stack.or_frame(cur_b).b;
            self.assign_b(prev);
            return;
        }

        // the target sits somewhere below the top of the chain; splice it
        // out. Running past it means it was already discarded.
        while cur_b > kill_b {
            let prev = self.stack.or_frame(cur_b).b;

            if prev == kill_b {
                self.stack.or_frame_mut(cur_b).b = self.stack.or_frame(kill_b).b;
                return;
            }

            cur_b = prev;
        }
    }

    /// Opens a defeasible region: work done after this call can be undone
    /// with [`defeasible_undo`](Self::defeasible_undo) or committed with
    /// [`defeasible_close`](Self::defeasible_close).
    pub fn defeasible_open(&mut self) -> MachineResult<()> {
        self.create_choice_point0(None)
    }

    /// Rolls the open defeasible region back to its opening state, keeping
    /// it open.
    pub fn defeasible_undo(&mut self) {
        self.update_choice_point0(None);
    }

    /// Closes the open defeasible region. On `success` the work done inside
    /// it is kept; otherwise it is undone.
    pub fn defeasible_close(&mut self, success: bool) {
        if success {
            let prev = self.stack.or_frame(self.b).b;
            self.assign_b(prev);
        } else {
            self.delete_choice_point0();
        }
    }
}

impl Default for MachineState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_allocate_deallocate() {
        let mut machine = MachineState::new();

        machine.cp = Some(CodePtr(7));
        machine.bci = 99;
        machine.allocate(2).unwrap();

        let e = machine.e;
        machine.cp = Some(CodePtr(8));
        machine.bci = 100;

        // permanent variables start unbound
        assert_eq!(machine.stack[e + 1], Word::unbound(Addr::Stack(e + 1)));
        assert_eq!(machine.stack[e + 2], Word::unbound(Addr::Stack(e + 2)));

        machine.deallocate();

        assert_eq!(machine.e, 0);
        assert_eq!(machine.cp, Some(CodePtr(7)));
        assert_eq!(machine.bci, 99);
    }

    #[test]
    fn choice_point_saves_and_restores_arguments() {
        let mut machine = MachineState::new();

        machine.registers[0] = Word::Int(1);
        machine.registers[1] = Word::Atm(Atom(2));
        machine.create_choice_point2(Some(CodePtr(10))).unwrap();

        assert_eq!(machine.stamp, 1);
        assert_eq!(machine.stack.or_frame(machine.b).alt, Some(CodePtr(10)));

        machine.registers[0] = Word::Int(99);
        machine.registers[1] = Word::Int(99);

        machine.update_choice_point2(Some(CodePtr(11)));

        assert_eq!(machine.registers[0], Word::Int(1));
        assert_eq!(machine.registers[1], Word::Atm(Atom(2)));
        assert_eq!(machine.stack.or_frame(machine.b).alt, Some(CodePtr(11)));
        assert_eq!(machine.stamp, 1);

        machine.registers[1] = Word::Int(99);
        machine.delete_choice_point2();

        assert_eq!(machine.registers[1], Word::Atm(Atom(2)));
        assert_eq!(machine.b, 0);
        assert_eq!(machine.stamp, 0);
    }

    #[test]
    fn failed_choice_point_creation_leaves_the_counters_alone() {
        let config = MachineConfig::new().with_local_limit(2);
        let mut machine = MachineState::with_config(config);

        assert_eq!(
            machine.create_choice_point2(Some(CodePtr(1))),
            Err(ResourceError::LocalOverflow)
        );

        assert_eq!(machine.stamp, 0);
        assert_eq!(machine.b, 0);
    }

    #[test]
    fn update_rolls_back_heap_and_trail() {
        let mut machine = MachineState::new();

        let var = machine.put_x_variable().unwrap();
        machine.create_choice_point0(Some(CodePtr(1))).unwrap();

        let h0 = machine.heap.h();
        let tr0 = machine.trail.tr();

        assert!(machine.unify(var, Word::Int(7)).unwrap());
        machine.put_x_variable().unwrap();

        machine.update_choice_point0(Some(CodePtr(2)));

        assert_eq!(machine.heap.h(), h0);
        assert_eq!(machine.trail.tr(), tr0);
        assert_eq!(machine.deref(var), var);
        assert_eq!(machine.hb, h0);
    }

    #[test]
    fn cut_discards_younger_choice_points() {
        let mut machine = MachineState::new();

        machine.create_choice_point0(Some(CodePtr(1))).unwrap();
        let barrier = machine.get_current_choice();

        machine.create_choice_point0(Some(CodePtr(2))).unwrap();
        machine.create_choice_point0(Some(CodePtr(3))).unwrap();

        machine.cut(barrier);

        assert_eq!(machine.stack.or_frame(machine.b).alt, Some(CodePtr(1)));
        assert_eq!(machine.hb, machine.stack.or_frame(machine.b).h);
    }

    #[test]
    fn soft_cut_unchains_only_its_target() {
        let mut machine = MachineState::new();

        machine.create_choice_point0(Some(CodePtr(1))).unwrap();
        machine.create_choice_point0(Some(CodePtr(2))).unwrap();
        let target = machine.get_current_choice();
        let target_b = machine.b;

        machine.create_choice_point0(Some(CodePtr(3))).unwrap();
        let top = machine.b;

        machine.soft_cut(target);

        // the top frame survives, now chained past the target
        assert_eq!(machine.b, top);
        assert_ne!(machine.stack.or_frame(top).b, target_b);
        assert_eq!(
            machine.stack.or_frame(machine.stack.or_frame(top).b).alt,
            Some(CodePtr(1))
        );
    }

    #[test]
    fn soft_cut_splices_a_deep_target() {
        let mut machine = MachineState::new();

        machine.create_choice_point0(Some(CodePtr(1))).unwrap();
        let below = machine.b;
        machine.create_choice_point0(Some(CodePtr(2))).unwrap();
        let target = machine.get_current_choice();
        machine.create_choice_point0(Some(CodePtr(3))).unwrap();
        let mid = machine.b;
        machine.create_choice_point0(Some(CodePtr(4))).unwrap();
        let top = machine.b;

        machine.soft_cut(target);

        assert_eq!(machine.b, top);
        assert_eq!(machine.stack.or_frame(top).b, mid);
        assert_eq!(machine.stack.or_frame(mid).b, below);
    }

    #[test]
    fn soft_cut_of_the_top_frame_pops_it() {
        let mut machine = MachineState::new();

        machine.create_choice_point0(Some(CodePtr(1))).unwrap();
        machine.create_choice_point0(Some(CodePtr(2))).unwrap();
        let target = machine.get_current_choice();

        machine.soft_cut(target);

        assert_eq!(machine.stack.or_frame(machine.b).alt, Some(CodePtr(1)));
    }

    #[test]
    fn soft_cut_of_a_discarded_target_is_a_no_op() {
        let mut machine = MachineState::new();

        machine.create_choice_point0(Some(CodePtr(1))).unwrap();
        let keep = machine.b;

        machine.create_choice_point0(Some(CodePtr(2))).unwrap();
        let stale = machine.get_current_choice();

        // normal backtracking discards the target before the soft cut runs
        machine.delete_choice_point0();

        machine.soft_cut(stale);

        assert_eq!(machine.b, keep);
        assert_eq!(machine.stack.or_frame(machine.b).b, 0);

        // with no live choice point at all it is still a no-op
        machine.delete_choice_point0();
        machine.soft_cut(stale);

        assert_eq!(machine.b, 0);
    }

    #[test]
    fn defeasible_undo_and_commit() {
        let mut machine = MachineState::new();

        let var = machine.put_x_variable().unwrap();

        machine.defeasible_open().unwrap();
        assert_eq!(machine.stack.or_frame(machine.b).alt, None);

        assert!(machine.unify(var, Word::Int(1)).unwrap());
        machine.defeasible_undo();
        assert_eq!(machine.deref(var), var);

        assert!(machine.unify(var, Word::Int(2)).unwrap());
        machine.defeasible_close(true);

        // committed: the region is gone but its bindings stay
        assert_eq!(machine.b, 0);
        assert_eq!(machine.deref(var), Word::Int(2));
    }

    #[test]
    fn defeasible_close_on_failure_rolls_back() {
        let mut machine = MachineState::new();

        let var = machine.put_x_variable().unwrap();

        machine.defeasible_open().unwrap();
        assert!(machine.unify(var, Word::Int(1)).unwrap());
        machine.defeasible_close(false);

        assert_eq!(machine.b, 0);
        assert_eq!(machine.deref(var), var);
    }

    #[test]
    fn unify_backtrack_round_trip_restores_regions() {
        let mut machine = MachineState::new();

        // some pre-existing term the round trip must leave untouched
        let old_var = machine.put_x_variable().unwrap();

        machine.create_choice_point0(Some(CodePtr(1))).unwrap();

        let heap_image = machine.heap.image();
        let tr0 = machine.trail.tr();

        let s = machine.put_structure(Atom(5), 2).unwrap();
        assert!(machine.unify_value(old_var).unwrap());
        assert!(machine.unify_integer(3).unwrap());
        assert!(machine.unify(s, old_var).is_ok());

        machine.delete_choice_point0();

        assert_eq!(machine.heap.image(), heap_image);
        assert_eq!(machine.trail.tr(), tr0);
        assert_eq!(machine.deref(old_var), old_var);
    }

    #[test]
    fn create_bind_untrail_delete_scenario() {
        let mut machine = MachineState::new();

        let h0 = machine.heap.h();
        let tr0 = machine.trail.tr();

        machine.create_choice_point0(Some(CodePtr(50))).unwrap();

        let x = machine.put_x_variable().unwrap();
        assert!(machine.unify(x, Word::Int(7)).unwrap());
        assert_eq!(machine.trail.tr(), tr0 + 1);

        machine.untrail(tr0);

        assert_eq!(machine.deref(x), x);
        assert_eq!(machine.trail.tr(), tr0);

        machine.delete_choice_point0();

        assert_eq!(machine.b, 0);
        assert_eq!(machine.heap.h(), h0);
        assert_eq!(machine.trail.tr(), tr0);
    }
}
