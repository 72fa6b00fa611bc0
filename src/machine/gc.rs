use crate::machine::trail::TrailEntry;
use crate::machine::MachineState;
use crate::types::Addr;

/// Callbacks into an external relocating collector.
///
/// Every live binding-trail entry targeting a heap cell is announced as a
/// disappearing link keyed by its trail slot, so the collector can clear
/// the entry (via [`Trail::clear_unbind`](crate::machine::trail::Trail::clear_unbind))
/// when it reclaims the cell. The core re-announces entries whenever
/// compaction moves them.
pub trait CollectorHooks {
    fn register_disappearing_link(&mut self, slot: usize, target: Addr);
    fn unregister_disappearing_link(&mut self, slot: usize);
}

impl MachineState {
    /// Called by the embedder when a collection cycle has finished. The
    /// trail is the only region the core compacts itself; the collector
    /// owns the heap.
    pub fn collection_happened(&mut self) {
        self.compact_trail();
    }

    /// Rewrites the trail without the binding entries the collector has
    /// cleared, keeping every choice point's saved trail top pointed at the
    /// same logical boundary. Returns the number of entries dropped.
    pub fn compact_trail(&mut self) -> usize {
        let mut hooks = self.collector.take();
        let old_entries = self.trail.take_entries();
        let old_len = old_entries.len();

        let mut entries = Vec::with_capacity(old_len);
        let mut new_index_of = Vec::with_capacity(old_len + 1);

        for (slot, entry) in old_entries.into_iter().enumerate() {
            new_index_of.push(entries.len());

            match entry {
                TrailEntry::Unbind(None) => {}
                TrailEntry::Unbind(Some(a @ Addr::Heap(_))) => {
                    if let Some(hooks) = hooks.as_mut() {
                        hooks.unregister_disappearing_link(slot);
                        hooks.register_disappearing_link(entries.len(), a);
                    }

                    entries.push(TrailEntry::Unbind(Some(a)));
                }
                entry => entries.push(entry),
            }
        }

        new_index_of.push(entries.len());

        let dropped = old_len - entries.len();

        self.trail.replace_entries(entries);
        self.collector = hooks;

        let mut b = self.b;

        while b != 0 {
            let frame = self.stack.or_frame_mut(b);

            frame.tr = new_index_of[frame.tr];
            b = frame.b;
        }

        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::*;

    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::rc::Rc;

    #[derive(Default)]
    struct RecordingHooks {
        links: Rc<RefCell<BTreeMap<usize, Addr>>>,
    }

    impl CollectorHooks for RecordingHooks {
        fn register_disappearing_link(&mut self, slot: usize, target: Addr) {
            self.links.borrow_mut().insert(slot, target);
        }

        fn unregister_disappearing_link(&mut self, slot: usize) {
            self.links.borrow_mut().remove(&slot);
        }
    }

    fn machine_with_hooks() -> (MachineState, Rc<RefCell<BTreeMap<usize, Addr>>>) {
        let mut machine = MachineState::new();
        let hooks = RecordingHooks::default();
        let links = hooks.links.clone();

        machine.set_collector(Box::new(hooks));
        (machine, links)
    }

    #[test]
    fn heap_bindings_are_announced_and_withdrawn() {
        let (mut machine, links) = machine_with_hooks();

        let x = machine.put_x_variable().unwrap();
        let a = x.as_var().unwrap();

        machine.bind(a, Word::Int(1)).unwrap();
        assert_eq!(links.borrow().get(&0), Some(&a));

        machine.untrail(0);
        assert!(links.borrow().is_empty());
    }

    #[test]
    fn local_bindings_are_not_announced() {
        let (mut machine, links) = machine_with_hooks();

        machine.allocate(1).unwrap();
        let y = machine.put_y_variable(0);

        machine.bind(y.as_var().unwrap(), Word::Int(1)).unwrap();

        assert!(links.borrow().is_empty());
    }

    #[test]
    fn compaction_drops_cleared_entries_and_rewrites_snapshots() {
        let (mut machine, links) = machine_with_hooks();

        let x = machine.put_x_variable().unwrap();
        let y = machine.put_x_variable().unwrap();
        let z = machine.put_x_variable().unwrap();

        machine.bind(x.as_var().unwrap(), Word::Int(1)).unwrap();

        machine.create_choice_point0(Some(CodePtr(1))).unwrap();
        let tr_snapshot = machine.stack.or_frame(machine.b).tr;
        assert_eq!(tr_snapshot, 1);

        machine.bind(y.as_var().unwrap(), Word::Int(2)).unwrap();
        machine.bind(z.as_var().unwrap(), Word::Int(3)).unwrap();

        // the collector reclaims x's cell and clears its entry
        machine.trail.clear_unbind(0);
        links.borrow_mut().remove(&0);

        let dropped = machine.compact_trail();

        assert_eq!(dropped, 1);
        assert_eq!(machine.trail.tr(), 2);
        assert_eq!(machine.stack.or_frame(machine.b).tr, 0);

        // surviving links were re-announced under their new slots
        assert_eq!(
            *links.borrow(),
            BTreeMap::from([(0, y.as_var().unwrap()), (1, z.as_var().unwrap())])
        );

        // rolling back to the choice point undoes exactly y and z
        machine.update_choice_point0(Some(CodePtr(2)));

        assert_eq!(machine.deref(y), y);
        assert_eq!(machine.deref(z), z);
        assert_eq!(machine.trail.tr(), 0);
    }

    #[test]
    fn collection_notification_compacts() {
        let (mut machine, _links) = machine_with_hooks();

        let x = machine.put_x_variable().unwrap();
        machine.bind(x.as_var().unwrap(), Word::Int(1)).unwrap();
        machine.trail.clear_unbind(0);

        machine.collection_happened();

        assert_eq!(machine.trail.tr(), 0);
    }
}
