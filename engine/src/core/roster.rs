//! Mutation-safe ordered list shared by update registries and observer lists.
//!
//! A [`Roster`] is visited in insertion order while the values it visits are free to add and
//! remove entries, including themselves. The rules:
//!
//! - **Adds during a pass are deferred.** They go to a pending buffer that is appended to the
//!   live list once the pass completes, so an entry added mid-pass is never visited in that pass.
//! - **Removes during a pass are tombstoned.** The slot is marked in a bitset and skipped if the
//!   pass has not reached it yet. Slots never move during a pass, so neighbours are neither
//!   skipped nor repeated. Tombstoned slots are compacted after the pass.
//! - **No lock is held while a value is visited.** Each step takes the lock, clones the value out
//!   and releases it before calling the visitor.
//!
//! ```text
//! insert/remove ──► State { live, pending, tombstones, iterating }
//!                          │
//!      for_each ──────────►├─ begin:  iterating = true, size tombstones to live.len()
//!                          ├─ visit:  for index in 0..len { skip tombstones; clone; visit }
//!                          └─ settle: compact tombstones, append pending, iterating = false
//!                                     (also when a visitor unwinds)
//! ```

use std::collections::{HashMap, HashSet};

use fixedbitset::FixedBitSet;
use log::error;
use parking_lot::Mutex;

use crate::core::error::{LoopError, RegistryCorruption};

/// Identity of a roster entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Key(pub(crate) usize);

/// Why a pass could not run to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PassError {
    /// A pass over the same roster is already in progress.
    Busy,
    /// Post-pass bookkeeping found inconsistent state.
    Corrupt(RegistryCorruption),
}

impl PassError {
    /// Convert into a [`LoopError`], using `busy` for re-entrant passes.
    pub(crate) fn into_loop_error(self, busy: impl FnOnce() -> LoopError) -> LoopError {
        match self {
            PassError::Busy => busy(),
            PassError::Corrupt(corruption) => corruption.into(),
        }
    }
}

struct Slot<T> {
    key: Key,
    value: T,
}

struct State<T> {
    live: Vec<Slot<T>>,
    /// Position in `live` of every live, non-tombstoned key.
    index: HashMap<Key, usize>,
    pending: Vec<Slot<T>>,
    pending_keys: HashSet<Key>,
    tombstones: FixedBitSet,
    iterating: bool,
}

impl<T> State<T> {
    /// Index of the live, non-tombstoned slot holding `key`.
    fn live_index(&self, key: Key) -> Option<usize> {
        self.index.get(&key).copied()
    }

    fn is_pending(&self, key: Key) -> bool {
        self.pending_keys.contains(&key)
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (position, slot) in self.live.iter().enumerate() {
            self.index.insert(slot.key, position);
        }
    }

    /// End a pass: compact tombstones and merge pending adds.
    fn settle(&mut self) -> Result<(), RegistryCorruption> {
        self.iterating = false;
        let tombstones = std::mem::take(&mut self.tombstones);

        let len = self.live.len();
        if let Some(index) = tombstones.ones().find(|&index| index >= len) {
            self.reindex();
            return Err(RegistryCorruption::TombstoneOutOfRange { index, len });
        }
        if tombstones.count_ones(..) > 0 {
            let mut index = 0;
            self.live.retain(|_| {
                let keep = !tombstones.contains(index);
                index += 1;
                keep
            });
        }
        self.reindex();

        self.pending_keys.clear();
        for slot in std::mem::take(&mut self.pending) {
            if self.index.contains_key(&slot.key) {
                return Err(RegistryCorruption::DuplicateEntry { key: slot.key.0 });
            }
            self.index.insert(slot.key, self.live.len());
            self.live.push(slot);
        }
        Ok(())
    }
}

/// Settles the pass when dropped, so a visitor that unwinds does not leave the roster marked
/// as iterating.
struct Pass<'a, T> {
    state: &'a Mutex<State<T>>,
    settled: bool,
}

impl<T> Pass<'_, T> {
    fn finish(mut self) -> Result<(), RegistryCorruption> {
        self.settled = true;
        self.state.lock().settle()
    }
}

impl<T> Drop for Pass<'_, T> {
    fn drop(&mut self) {
        if !self.settled {
            if let Err(err) = self.state.lock().settle() {
                error!("Roster pass abandoned with {err}");
            }
        }
    }
}

/// Ordered collection that tolerates mutation from within its own visitor.
pub(crate) struct Roster<T> {
    state: Mutex<State<T>>,
}

impl<T: Clone> Roster<T> {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(State {
                live: Vec::new(),
                index: HashMap::new(),
                pending: Vec::new(),
                pending_keys: HashSet::new(),
                tombstones: FixedBitSet::new(),
                iterating: false,
            }),
        }
    }

    /// Add an entry. Returns `false` if the key is already live or pending.
    pub(crate) fn insert(&self, key: Key, value: T) -> bool {
        let mut state = self.state.lock();
        if state.live_index(key).is_some() || state.is_pending(key) {
            return false;
        }
        let slot = Slot { key, value };
        if state.iterating {
            state.pending_keys.insert(key);
            state.pending.push(slot);
        } else {
            let position = state.live.len();
            state.index.insert(key, position);
            state.live.push(slot);
        }
        true
    }

    /// Remove an entry. Returns `false` if the key was neither live nor pending.
    pub(crate) fn remove(&self, key: Key) -> bool {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if state.pending_keys.remove(&key) {
            state.pending.retain(|slot| slot.key != key);
            return true;
        }
        let Some(position) = state.index.remove(&key) else {
            return false;
        };
        if state.iterating {
            state.tombstones.insert(position);
        } else {
            state.live.remove(position);
            for (offset, slot) in state.live[position..].iter().enumerate() {
                state.index.insert(slot.key, position + offset);
            }
        }
        true
    }

    /// `true` if the key is live. Pending adds are not contained yet.
    pub(crate) fn contains(&self, key: Key) -> bool {
        self.state.lock().live_index(key).is_some()
    }

    /// Number of live entries.
    pub(crate) fn len(&self) -> usize {
        self.state.lock().index.len()
    }

    /// Number of adds waiting for the current pass to finish.
    pub(crate) fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Visit every live entry in insertion order, returning how many were visited.
    pub(crate) fn for_each(&self, mut visit: impl FnMut(&T)) -> Result<usize, PassError> {
        let len = {
            let mut state = self.state.lock();
            if state.iterating {
                return Err(PassError::Busy);
            }
            state.iterating = true;
            let len = state.live.len();
            state.tombstones.clear();
            state.tombstones.grow(len);
            len
        };
        let pass = Pass {
            state: &self.state,
            settled: false,
        };

        let mut visited = 0;
        for index in 0..len {
            let value = {
                let state = self.state.lock();
                if state.tombstones.contains(index) {
                    continue;
                }
                let Some(slot) = state.live.get(index) else {
                    break;
                };
                slot.value.clone()
            };
            visit(&value);
            visited += 1;
        }

        pass.finish().map_err(PassError::Corrupt)?;
        Ok(visited)
    }

    /// Queue an entry for the next settle without any membership checks.
    #[cfg(test)]
    pub(crate) fn push_pending_unchecked(&self, key: Key, value: T) {
        self.state.lock().pending.push(Slot { key, value });
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;

    type Log = Rc<RefCell<Vec<usize>>>;

    fn roster_of(keys: &[usize]) -> Roster<usize> {
        let roster = Roster::new();
        for &key in keys {
            assert!(roster.insert(Key(key), key));
        }
        roster
    }

    fn visit_all(roster: &Roster<usize>) -> Vec<usize> {
        let mut seen = Vec::new();
        roster.for_each(|&value| seen.push(value)).unwrap();
        seen
    }

    // ==================== Membership ====================

    #[test]
    fn visits_in_insertion_order() {
        let roster = roster_of(&[3, 1, 2]);

        assert_eq!(visit_all(&roster), vec![3, 1, 2]);
        assert_eq!(roster.len(), 3);
    }

    #[test]
    fn duplicate_insert_is_noop() {
        let roster = roster_of(&[1]);

        assert!(!roster.insert(Key(1), 1));
        assert_eq!(visit_all(&roster), vec![1]);
    }

    #[test]
    fn remove_outside_pass_preserves_order() {
        let roster = roster_of(&[1, 2, 3, 4]);

        assert!(roster.remove(Key(2)));
        assert!(!roster.remove(Key(2)));
        assert!(!roster.contains(Key(2)));
        assert_eq!(visit_all(&roster), vec![1, 3, 4]);
    }

    // ==================== Mutation During a Pass ====================

    #[test]
    fn insert_during_pass_is_deferred() {
        let roster = roster_of(&[1, 2]);
        let log: Log = Rc::default();

        roster
            .for_each(|&value| {
                log.borrow_mut().push(value);
                if value == 1 {
                    assert!(roster.insert(Key(9), 9));
                    assert!(!roster.contains(Key(9)));
                    assert_eq!(roster.pending_len(), 1);
                    // Pending entries are still deduplicated.
                    assert!(!roster.insert(Key(9), 9));
                }
            })
            .unwrap();

        assert_eq!(*log.borrow(), vec![1, 2]);
        assert!(roster.contains(Key(9)));
        assert_eq!(roster.pending_len(), 0);
        assert_eq!(visit_all(&roster), vec![1, 2, 9]);
    }

    #[test]
    fn remove_unvisited_during_pass_skips_only_that_entry() {
        let roster = roster_of(&[1, 2, 3, 4]);
        let log: Log = Rc::default();

        roster
            .for_each(|&value| {
                log.borrow_mut().push(value);
                if value == 1 {
                    assert!(roster.remove(Key(3)));
                    assert!(!roster.contains(Key(3)));
                    assert_eq!(roster.len(), 3);
                }
            })
            .unwrap();

        assert_eq!(*log.borrow(), vec![1, 2, 4]);
        assert_eq!(visit_all(&roster), vec![1, 2, 4]);
    }

    #[test]
    fn remove_self_during_pass_keeps_neighbours() {
        let roster = roster_of(&[1, 2, 3]);
        let log: Log = Rc::default();

        roster
            .for_each(|&value| {
                log.borrow_mut().push(value);
                if value == 2 {
                    assert!(roster.remove(Key(2)));
                }
            })
            .unwrap();

        assert_eq!(*log.borrow(), vec![1, 2, 3]);
        assert_eq!(visit_all(&roster), vec![1, 3]);
    }

    #[test]
    fn remove_then_reinsert_during_pass_moves_entry_to_end() {
        let roster = roster_of(&[1, 2, 3]);

        roster
            .for_each(|&value| {
                if value == 1 {
                    assert!(roster.remove(Key(2)));
                    assert!(roster.insert(Key(2), 2));
                }
            })
            .unwrap();

        assert_eq!(visit_all(&roster), vec![1, 3, 2]);
    }

    #[test]
    fn remove_pending_cancels_add() {
        let roster = roster_of(&[1]);

        roster
            .for_each(|_| {
                roster.insert(Key(5), 5);
                assert!(roster.remove(Key(5)));
            })
            .unwrap();

        assert_eq!(visit_all(&roster), vec![1]);
    }

    #[test]
    fn nested_pass_is_rejected() {
        let roster = roster_of(&[1]);
        let mut nested = None;

        roster
            .for_each(|_| nested = Some(roster.for_each(|_| {})))
            .unwrap();

        assert_eq!(nested, Some(Err(PassError::Busy)));
        // The outer pass still settled normally.
        assert_eq!(visit_all(&roster), vec![1]);
    }

    #[test]
    fn unwinding_visitor_still_settles_pass() {
        let roster = roster_of(&[1, 2, 3]);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            roster.for_each(|&value| {
                if value == 1 {
                    roster.insert(Key(7), 7);
                    roster.remove(Key(3));
                    panic!("visitor failed");
                }
            })
        }));

        assert!(result.is_err());
        assert_eq!(roster.pending_len(), 0);
        assert_eq!(visit_all(&roster), vec![1, 2, 7]);
    }

    #[test]
    fn lookups_follow_entries_after_removal() {
        let roster = roster_of(&[1, 2, 3, 4]);

        assert!(roster.remove(Key(1)));
        assert!(roster.remove(Key(3)));

        assert!(roster.contains(Key(2)));
        assert!(roster.contains(Key(4)));
        assert!(roster.remove(Key(4)));
        assert_eq!(roster.len(), 1);
        assert_eq!(visit_all(&roster), vec![2]);
    }

    // ==================== Settle ====================

    #[test]
    fn settle_detects_duplicate_pending_entry() {
        let roster = roster_of(&[1]);
        roster.push_pending_unchecked(Key(1), 1);

        let err = roster.for_each(|_| {}).unwrap_err();

        assert_eq!(
            err,
            PassError::Corrupt(RegistryCorruption::DuplicateEntry { key: 1 })
        );
    }

    #[test]
    fn settle_detects_out_of_range_tombstone() {
        let roster = roster_of(&[1]);

        let err = roster
            .for_each(|_| {
                let mut state = roster.state.lock();
                state.tombstones.grow(4);
                state.tombstones.insert(3);
            })
            .unwrap_err();

        assert_eq!(
            err,
            PassError::Corrupt(RegistryCorruption::TombstoneOutOfRange { index: 3, len: 1 })
        );
    }
}
