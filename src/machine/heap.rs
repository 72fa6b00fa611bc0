use crate::machine::machine_errors::*;
use crate::types::*;

use ordered_float::OrderedFloat;

use std::ops::{Index, IndexMut};

/// The global stack. Compound terms and globalized variables live here;
/// cells are addressed by index and the top only moves back on backtracking.
#[derive(Debug)]
pub struct Heap {
    cells: Vec<Word>,
    limit: usize,
}

impl Heap {
    pub fn new(limit: usize) -> Self {
        Heap {
            cells: vec![],
            limit,
        }
    }

    /// The current top of the heap, i.e. the index the next push lands at.
    #[inline]
    pub fn h(&self) -> usize {
        self.cells.len()
    }

    pub fn push(&mut self, word: Word) -> MachineResult<()> {
        if self.cells.len() >= self.limit {
            return Err(ResourceError::HeapOverflow);
        }

        self.cells.push(word);
        Ok(())
    }

    /// Pushes an unbound variable cell and returns its word.
    pub fn push_var(&mut self) -> MachineResult<Word> {
        let word = Word::unbound(Addr::Heap(self.h()));
        self.push(word)?;
        Ok(word)
    }

    pub fn push_float(&mut self, n: f64) -> MachineResult<()> {
        self.push(Word::F64(OrderedFloat(n)))
    }

    #[inline]
    pub(crate) fn float_at(&self, h: usize) -> f64 {
        match self.cells[h] {
            Word::F64(OrderedFloat(n)) => n,
            _ => unreachable!("heap cell {} does not hold a boxed float", h),
        }
    }

    #[inline]
    pub fn truncate(&mut self, h: usize) {
        if h < self.cells.len() {
            self.cells.truncate(h);
        }
    }

    /// A copy of the live cells, for snapshot comparisons.
    pub fn image(&self) -> Vec<Word> {
        self.cells.clone()
    }
}

impl Index<usize> for Heap {
    type Output = Word;

    #[inline]
    fn index(&self, index: usize) -> &Word {
        &self.cells[index]
    }
}

impl IndexMut<usize> for Heap {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut Word {
        &mut self.cells[index]
    }
}
