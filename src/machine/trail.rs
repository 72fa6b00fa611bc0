use crate::machine::machine_errors::*;
use crate::machine::MachineState;
use crate::types::*;

use std::fmt;

/// A deferred undo action, invoked with its saved words when the entry is
/// popped by [`MachineState::untrail`].
pub type UndoFn = Box<dyn FnMut(&[Word])>;

/// One recorded side effect, undone LIFO on backtracking.
pub enum TrailEntry {
    /// A variable binding. Undo resets the cell to an unbound self-reference.
    /// `None` marks an entry the collector has cleared; undo skips it.
    Unbind(Option<Addr>),
    /// A destructive single-cell overwrite, with the previous word.
    Overwrite(Addr, Word),
    /// A destructive multi-cell overwrite, with the previous words.
    Restore(Addr, Vec<Word>),
    /// An arbitrary undo action with its saved words.
    Undo(UndoFn, Vec<Word>),
}

impl fmt::Debug for TrailEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TrailEntry::Unbind(addr) => f.debug_tuple("Unbind").field(addr).finish(),
            TrailEntry::Overwrite(addr, word) => {
                f.debug_tuple("Overwrite").field(addr).field(word).finish()
            }
            TrailEntry::Restore(addr, words) => {
                f.debug_tuple("Restore").field(addr).field(words).finish()
            }
            TrailEntry::Undo(_, words) => f.debug_tuple("Undo").field(words).finish(),
        }
    }
}

#[derive(Debug)]
pub struct Trail {
    entries: Vec<TrailEntry>,
    limit: usize,
}

impl Trail {
    pub fn new(limit: usize) -> Self {
        Trail {
            entries: vec![],
            limit,
        }
    }

    /// The current trail top, i.e. the index the next push lands at.
    #[inline]
    pub fn tr(&self) -> usize {
        self.entries.len()
    }

    pub fn push(&mut self, entry: TrailEntry) -> MachineResult<()> {
        if self.entries.len() >= self.limit {
            return Err(ResourceError::TrailOverflow);
        }

        self.entries.push(entry);
        Ok(())
    }

    #[inline]
    pub(crate) fn pop(&mut self) -> Option<TrailEntry> {
        self.entries.pop()
    }

    /// Clears a binding entry in place. Called by the collector when the
    /// bound cell itself has been reclaimed.
    pub fn clear_unbind(&mut self, slot: usize) {
        match &mut self.entries[slot] {
            entry @ TrailEntry::Unbind(_) => *entry = TrailEntry::Unbind(None),
            _ => unreachable!("trail slot {} is not a binding entry", slot),
        }
    }

    pub(crate) fn take_entries(&mut self) -> Vec<TrailEntry> {
        std::mem::take(&mut self.entries)
    }

    pub(crate) fn replace_entries(&mut self, entries: Vec<TrailEntry>) {
        self.entries = entries;
    }
}

impl MachineState {
    /// Records a destructive overwrite of the cell at `a`, saving its
    /// current word.
    pub fn trail_overwrite(&mut self, a: Addr) -> MachineResult<()> {
        let old = self.read(a);
        self.trail.push(TrailEntry::Overwrite(a, old))
    }

    /// Records a destructive overwrite of the `n` cells starting at `a`,
    /// saving their current words.
    pub fn trail_restore(&mut self, a: Addr, n: usize) -> MachineResult<()> {
        let words = (0..n).map(|i| self.read(a.offset(i))).collect();
        self.trail.push(TrailEntry::Restore(a, words))
    }

    /// Records an arbitrary undo action. `undo` is called with `words` when
    /// the entry is rolled back.
    pub fn trail_undo_fn(&mut self, undo: UndoFn, words: Vec<Word>) -> MachineResult<()> {
        self.trail.push(TrailEntry::Undo(undo, words))
    }

    /// Rolls the trail back to `low`, undoing every recorded side effect
    /// above it in reverse order of recording. The single rollback
    /// primitive: choice-point restoration and explicit rewinds both land
    /// here.
    pub fn untrail(&mut self, low: usize) {
        while self.trail.tr() > low {
            let entry = match self.trail.pop() {
                Some(entry) => entry,
                None => return,
            };

            match entry {
                TrailEntry::Unbind(None) => {}
                TrailEntry::Unbind(Some(a)) => {
                    if let (Some(hooks), Addr::Heap(_)) = (self.collector.as_mut(), a) {
                        hooks.unregister_disappearing_link(self.trail.tr());
                    }

                    self.write(a, Word::unbound(a));
                }
                TrailEntry::Overwrite(a, old) => self.write(a, old),
                TrailEntry::Restore(a, words) => {
                    for (i, word) in words.into_iter().enumerate() {
                        self.write(a.offset(i), word);
                    }
                }
                TrailEntry::Undo(mut undo, words) => undo(&words),
            }
        }
    }
}
