//! Map from cursor number to the statement currently open on it.
//!
//! Cursor numbers are small and usually arrive in increasing order, but
//! nothing in the trace guarantees that, so the table is a sparse map rather
//! than a positional array. Slot 0 exists from construction and holds an
//! empty placeholder, as does any slot after a disconnect.

use std::collections::BTreeMap;

use crate::trace::models::StatementId;

/// State of one cursor slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CursorSlot {
    /// No statement is open on the cursor (fresh table or after a disconnect).
    Placeholder,
    Bound(StatementId),
}

impl CursorSlot {
    pub fn statement(&self) -> Option<StatementId> {
        match self {
            Self::Placeholder => None,
            Self::Bound(id) => Some(*id),
        }
    }
}

#[derive(Debug)]
pub struct CursorTable {
    slots: BTreeMap<u32, CursorSlot>,
}

impl CursorTable {
    pub fn new() -> Self {
        let mut slots = BTreeMap::new();
        slots.insert(0, CursorSlot::Placeholder);
        Self { slots }
    }

    /// Open `statement` on `cursor`, replacing whatever was there.
    pub fn bind(&mut self, cursor: u32, statement: StatementId) {
        self.slots.insert(cursor, CursorSlot::Bound(statement));
    }

    /// Slot for `cursor`, or `None` if the cursor was never seen.
    pub fn get(&self, cursor: u32) -> Option<CursorSlot> {
        self.slots.get(&cursor).copied()
    }

    /// Statement open on `cursor`, if any.
    pub fn statement(&self, cursor: u32) -> Option<StatementId> {
        self.get(cursor).and_then(|slot| slot.statement())
    }

    /// Tear the cursor down; later lookups return the placeholder until the
    /// next `bind`.
    pub fn disconnect(&mut self, cursor: u32) {
        self.slots.insert(cursor, CursorSlot::Placeholder);
    }

    /// Number of cursors with a statement bound.
    pub fn open_count(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| matches!(slot, CursorSlot::Bound(_)))
            .count()
    }
}

impl Default for CursorTable {
    fn default() -> Self {
        Self::new()
    }
}
