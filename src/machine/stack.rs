use crate::machine::machine_errors::*;
use crate::types::*;

use std::ops::{Index, IndexMut};

/// Registers saved by `allocate`: the continuation and the environment chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AndFramePrelude {
    pub num_cells: usize,
    pub e: usize,
    pub cp: Option<CodePtr>,
    pub bci: u64,
}

/// Registers saved by choice-point creation. `alt` is the next alternative
/// to try on backtracking (`None` for a defeasible frame), `b` the previous
/// choice point, and `h`/`tr`/`cs` the region snapshots taken at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrFramePrelude {
    pub num_cells: usize,
    pub alt: Option<CodePtr>,
    pub cp: Option<CodePtr>,
    pub bci: u64,
    pub e: usize,
    pub b: usize,
    pub h: usize,
    pub tr: usize,
    pub cs: usize,
    pub stamp: usize,
}

#[derive(Debug, Clone, Copy)]
enum StackSlot {
    // slot 0, so that frame index 0 can mean "no frame"
    Base,
    Cell(Word),
    AndPrelude(AndFramePrelude),
    OrPrelude(OrFramePrelude),
}

/// The local stack. Environments and choice points share it; a frame is
/// identified by the index of its prelude slot, and the prelude variant
/// records which kind of frame lives there. Frame indices are comparable:
/// a larger index never belongs to an older live frame.
#[derive(Debug)]
pub struct Stack {
    slots: Vec<StackSlot>,
    limit: usize,
}

impl Stack {
    pub fn new(limit: usize) -> Self {
        Stack {
            slots: vec![StackSlot::Base],
            limit,
        }
    }

    /// The index just past the youngest live slot.
    #[inline]
    pub fn top(&self) -> usize {
        self.slots.len()
    }

    /// Pushes an environment frame with `num_cells` permanent variables,
    /// each initialized unbound, and returns its index.
    pub fn allocate_and_frame(
        &mut self,
        num_cells: usize,
        prelude: AndFramePrelude,
    ) -> MachineResult<usize> {
        let e = self.slots.len();

        if e + 1 + num_cells > self.limit {
            return Err(ResourceError::LocalOverflow);
        }

        self.slots.push(StackSlot::AndPrelude(prelude));

        for idx in 0..num_cells {
            let s = e + 1 + idx;
            self.slots.push(StackSlot::Cell(Word::unbound(Addr::Stack(s))));
        }

        Ok(e)
    }

    /// Pushes a choice-point frame saving the words in `args`, and returns
    /// its index.
    pub fn allocate_or_frame(
        &mut self,
        prelude: OrFramePrelude,
        args: &[Word],
    ) -> MachineResult<usize> {
        let b = self.slots.len();

        if b + 1 + args.len() > self.limit {
            return Err(ResourceError::LocalOverflow);
        }

        self.slots.push(StackSlot::OrPrelude(prelude));

        for &arg in args {
            self.slots.push(StackSlot::Cell(arg));
        }

        Ok(b)
    }

    #[inline]
    pub fn and_frame(&self, e: usize) -> &AndFramePrelude {
        match &self.slots[e] {
            StackSlot::AndPrelude(prelude) => prelude,
            _ => unreachable!("local stack slot {} is not an environment", e),
        }
    }

    #[inline]
    pub fn or_frame(&self, b: usize) -> &OrFramePrelude {
        match &self.slots[b] {
            StackSlot::OrPrelude(prelude) => prelude,
            _ => unreachable!("local stack slot {} is not a choice point", b),
        }
    }

    #[inline]
    pub fn or_frame_mut(&mut self, b: usize) -> &mut OrFramePrelude {
        match &mut self.slots[b] {
            StackSlot::OrPrelude(prelude) => prelude,
            _ => unreachable!("local stack slot {} is not a choice point", b),
        }
    }

    /// Discards every slot at or above `top`. The base sentinel survives.
    #[inline]
    pub fn truncate(&mut self, top: usize) {
        if top >= 1 && top < self.slots.len() {
            self.slots.truncate(top);
        }
    }
}

impl Index<usize> for Stack {
    type Output = Word;

    #[inline]
    fn index(&self, index: usize) -> &Word {
        match &self.slots[index] {
            StackSlot::Cell(word) => word,
            _ => unreachable!("local stack slot {} is not a cell", index),
        }
    }
}

impl IndexMut<usize> for Stack {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut Word {
        match &mut self.slots[index] {
            StackSlot::Cell(word) => word,
            _ => unreachable!("local stack slot {} is not a cell", index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn and_prelude(e: usize, num_cells: usize) -> AndFramePrelude {
        AndFramePrelude {
            num_cells,
            e,
            cp: Some(CodePtr(100)),
            bci: 0,
        }
    }

    fn or_prelude(b: usize, num_cells: usize) -> OrFramePrelude {
        OrFramePrelude {
            num_cells,
            alt: Some(CodePtr(200)),
            cp: None,
            bci: 0,
            e: 0,
            b,
            h: 0,
            tr: 0,
            cs: 0,
            stamp: 1,
        }
    }

    #[test]
    fn environment_cells_start_unbound() {
        let mut stack = Stack::new(usize::MAX);

        let e = stack.allocate_and_frame(3, and_prelude(0, 3)).unwrap();

        assert_eq!(e, 1);
        assert_eq!(stack.and_frame(e).cp, Some(CodePtr(100)));

        for idx in 0..3 {
            let s = e + 1 + idx;
            assert_eq!(stack[s], Word::unbound(Addr::Stack(s)));
        }
    }

    #[test]
    fn frame_kind_is_recoverable_from_its_index() {
        let mut stack = Stack::new(usize::MAX);

        let e = stack.allocate_and_frame(1, and_prelude(0, 1)).unwrap();
        let args = [Word::Int(9)];
        let b = stack.allocate_or_frame(or_prelude(0, 1), &args).unwrap();

        assert!(b > e);
        assert_eq!(stack.and_frame(e).num_cells, 1);
        assert_eq!(stack.or_frame(b).num_cells, 1);
        assert_eq!(stack[b + 1], Word::Int(9));
    }

    #[test]
    fn truncate_discards_younger_frames_only() {
        let mut stack = Stack::new(usize::MAX);

        let b = stack.allocate_or_frame(or_prelude(0, 0), &[]).unwrap();
        let top = stack.top();
        stack.allocate_and_frame(2, and_prelude(0, 2)).unwrap();

        stack.truncate(top);

        assert_eq!(stack.top(), top);
        assert_eq!(stack.or_frame(b).stamp, 1);

        // never discards the base sentinel
        stack.truncate(0);
        assert_eq!(stack.top(), top);
    }

    #[test]
    fn limit_is_enforced() {
        let mut stack = Stack::new(4);

        stack.allocate_and_frame(2, and_prelude(0, 2)).unwrap();

        assert_eq!(
            stack.allocate_and_frame(2, and_prelude(0, 2)),
            Err(ResourceError::LocalOverflow)
        );
    }
}
