//! Module handles change observers,
//! which record which parts of the machine state were changed.
//!
//! You would typically access an observer via the [`Machine::observer`] field.
//! A presentation layer can either poll the [`ChangeObserver`] with [`take_changes`],
//! or [`subscribe`] to receive every change as it happens.
//!
//! [`Machine::observer`]: crate::sim::Machine::observer
//! [`take_changes`]: ChangeObserver::take_changes
//! [`subscribe`]: ChangeObserver::subscribe

use std::collections::BTreeSet;

use crossbeam_channel as cbc;

use crate::ast::Reg;

/// A part of the machine state which can change.
///
/// Changes are ordered by location, so a set of changes
/// lists registers first, then the special registers, then memory.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub enum Change {
    /// A general purpose register.
    Reg(Reg),
    /// The program counter.
    Pc,
    /// The instruction register.
    Ir,
    /// The next-instruction register.
    Nr,
    /// The status register.
    Sr,
    /// The 4-bit memory cell at this address.
    Mem(u8),
    /// Whether the machine is being run continuously.
    Running,
}

/// A struct that tracks changes to the machine state.
///
/// ## Example
///
/// ```
/// use nic_ensemble::sim::observer::{Change, ChangeObserver};
///
/// let mut observer = ChangeObserver::new();
/// let rx = observer.subscribe();
///
/// observer.notify(Change::Mem(0x10));
/// observer.notify(Change::Pc);
///
/// assert!(observer.changed(Change::Pc));
/// assert_eq!(observer.take_changes(), vec![Change::Pc, Change::Mem(0x10)]);
/// assert!(!observer.changed(Change::Pc));
///
/// // Subscribers get the changes in the order they happened.
/// assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![Change::Mem(0x10), Change::Pc]);
/// ```
#[derive(Debug)]
pub struct ChangeObserver {
    changes: BTreeSet<Change>,
    subscribers: Vec<cbc::Sender<Change>>,
}
impl ChangeObserver {
    /// Creates a new change observer.
    pub fn new() -> Self {
        Self {
            changes: Default::default(),
            subscribers: vec![],
        }
    }

    /// Clears all recorded changes.
    ///
    /// Subscribers are kept.
    pub fn clear(&mut self) {
        self.changes.clear();
    }

    /// Records a change and sends it to every subscriber.
    ///
    /// Subscribers whose receivers were dropped are removed.
    pub fn notify(&mut self, change: Change) {
        self.changes.insert(change);
        self.subscribers.retain(|tx| tx.send(change).is_ok());
    }

    /// True if the given change has occurred since the last clear.
    pub fn changed(&self, change: Change) -> bool {
        self.changes.contains(&change)
    }

    /// Takes all changes which have occurred since the last clear,
    /// as well as clearing them.
    ///
    /// This is sorted in [`Change`] order.
    pub fn take_changes(&mut self) -> Vec<Change> {
        std::mem::take(&mut self.changes).into_iter().collect()
    }

    /// Creates a receiver which gets every change from now on.
    pub fn subscribe(&mut self) -> cbc::Receiver<Change> {
        let (tx, rx) = cbc::unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// The number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
impl Default for ChangeObserver {
    fn default() -> Self {
        Self::new()
    }
}
