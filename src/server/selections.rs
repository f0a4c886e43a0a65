//! Selection ownership table

use crate::protocol::*;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    /// Owner window, `NONE` when unowned
    pub window: ResourceId,
    pub client: Option<ClientId>,
    pub last_change: Timestamp,
}

/// Result of a SetSelectionOwner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerChange {
    /// Timestamp was older than the last change or in the future
    Ignored,
    /// Ownership recorded. `displaced` is the previous owner when it must
    /// receive a SelectionClear.
    Changed {
        displaced: Option<(ClientId, ResourceId)>,
        time: Timestamp,
    },
}

#[derive(Debug, Clone, Default)]
pub struct SelectionTable {
    entries: HashMap<Atom, Selection>,
}

impl SelectionTable {
    pub fn new() -> Self {
        SelectionTable {
            entries: HashMap::new(),
        }
    }

    /// Record `window` (owned by `client`) as the owner of `selection`.
    /// `window == NONE` releases the selection.
    pub fn set_owner(
        &mut self,
        selection: Atom,
        window: ResourceId,
        client: ClientId,
        time: Timestamp,
        now: Timestamp,
    ) -> OwnerChange {
        let time = if time == CURRENT_TIME { now } else { time };
        let current = self.entries.get(&selection).copied();
        if let Some(current) = current {
            if time < current.last_change {
                return OwnerChange::Ignored;
            }
        }
        if time > now {
            return OwnerChange::Ignored;
        }

        let new_client = if window == NONE { None } else { Some(client) };
        let displaced = current.and_then(|c| match c.client {
            Some(old) if c.window != NONE && Some(old) != new_client => Some((old, c.window)),
            _ => None,
        });
        self.entries.insert(
            selection,
            Selection {
                window,
                client: new_client,
                last_change: time,
            },
        );
        log::debug!(
            "Selection {} owner is now {:#x}",
            selection.get(),
            window
        );
        OwnerChange::Changed { displaced, time }
    }

    pub fn get(&self, selection: Atom) -> Option<&Selection> {
        self.entries.get(&selection)
    }

    /// Owner window or `NONE`
    pub fn owner(&self, selection: Atom) -> ResourceId {
        self.entries.get(&selection).map_or(NONE, |s| s.window)
    }

    /// Release every selection held by a departing client
    pub fn clear_client(&mut self, client: ClientId) {
        for sel in self.entries.values_mut() {
            if sel.client == Some(client) {
                sel.client = None;
                sel.window = NONE;
            }
        }
    }

    /// Release every selection owned through a destroyed window
    pub fn clear_window(&mut self, window: ResourceId) {
        for sel in self.entries.values_mut() {
            if sel.window == window {
                sel.client = None;
                sel.window = NONE;
            }
        }
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }
}
