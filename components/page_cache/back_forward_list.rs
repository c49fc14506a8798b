/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::rc::Rc;

use log::{debug, warn};
use servo_config::prefs::Preferences;

use crate::history_entry::HistoryEntry;
use crate::session_state::{SessionHistoryState, SessionStateError};
use crate::store::PageCacheStore;

/// The session history of a page: top-level history entries in navigation
/// order, with a cursor on the entry that is shown.
///
/// Every operation that drops an entry also drops its page cache snapshot.
pub struct BackForwardList {
    entries: Vec<Rc<HistoryEntry>>,
    current: Option<usize>,
    capacity: usize,
    enabled: bool,
    closed: bool,
}

impl BackForwardList {
    pub fn new(capacity: usize) -> BackForwardList {
        BackForwardList {
            entries: Vec::new(),
            current: None,
            capacity,
            enabled: true,
            closed: false,
        }
    }

    pub fn from_preferences(preferences: &Preferences) -> BackForwardList {
        let mut list = BackForwardList::new(preferences.session_history_max_length());
        list.enabled = preferences.session_history_enabled;
        list
    }

    /// Make `entry` the current entry, dropping every forward entry and, when
    /// the list is full, the oldest entry.
    pub fn add_item(&mut self, entry: Rc<HistoryEntry>, page_cache: &mut PageCacheStore) {
        if !self.enabled || self.capacity == 0 || self.closed {
            return;
        }

        // Toss anything in the forward list.
        if let Some(current) = self.current {
            for removed in self.entries.drain(current + 1..) {
                page_cache.remove(&removed);
            }
        }

        // Toss the first item if the list is getting too big, as long as we're
        // not using it (or even if we are, if we only want one entry).
        while !self.entries.is_empty() &&
            self.entries.len() >= self.capacity &&
            (self.current != Some(0) || self.capacity == 1)
        {
            let removed = self.entries.remove(0);
            debug!("Dropping {} from the back/forward list", removed.id());
            page_cache.remove(&removed);
            self.current = self.current.and_then(|current| current.checked_sub(1));
        }

        let index = self.current.map_or(0, |current| current + 1);
        self.entries.insert(index, entry);
        self.current = Some(index);
    }

    pub fn go_back(&mut self) {
        match self.current {
            Some(current) if current > 0 => self.current = Some(current - 1),
            _ => warn!("No entry to go back to"),
        }
    }

    pub fn go_forward(&mut self) {
        match self.current {
            Some(current) if current + 1 < self.entries.len() => self.current = Some(current + 1),
            _ => warn!("No entry to go forward to"),
        }
    }

    /// Move the cursor to `entry`. Returns false if it is not in the list.
    pub fn go_to_item(&mut self, entry: &Rc<HistoryEntry>) -> bool {
        match self.index_of(entry) {
            Some(index) => {
                self.current = Some(index);
                true
            },
            None => {
                warn!("{} is not in the back/forward list", entry.id());
                false
            },
        }
    }

    pub fn back_item(&self) -> Option<Rc<HistoryEntry>> {
        self.item_at_index(-1)
    }

    pub fn current_item(&self) -> Option<Rc<HistoryEntry>> {
        self.item_at_index(0)
    }

    pub fn forward_item(&self) -> Option<Rc<HistoryEntry>> {
        self.item_at_index(1)
    }

    /// The entry `index` steps away from the current one; negative values
    /// look back.
    pub fn item_at_index(&self, index: i32) -> Option<Rc<HistoryEntry>> {
        let current = self.current?;
        let target = current.checked_add_signed(isize::try_from(index).ok()?)?;
        self.entries.get(target).cloned()
    }

    pub fn back_list_count(&self) -> usize {
        self.current.unwrap_or(0)
    }

    pub fn forward_list_count(&self) -> usize {
        self.current
            .map_or(0, |current| self.entries.len() - current - 1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn entries(&self) -> &[Rc<HistoryEntry>] {
        &self.entries
    }

    pub fn contains_item(&self, entry: &Rc<HistoryEntry>) -> bool {
        self.index_of(entry).is_some()
    }

    fn index_of(&self, entry: &Rc<HistoryEntry>) -> Option<usize> {
        self.entries
            .iter()
            .position(|existing| Rc::ptr_eq(existing, entry))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Shrink or grow the list. Shrinking drops entries from the back of the
    /// list first, then from the front, never the current entry.
    pub fn set_capacity(&mut self, capacity: usize, page_cache: &mut PageCacheStore) {
        self.capacity = capacity;
        if capacity == 0 {
            self.remove_all(page_cache);
            return;
        }
        while self.entries.len() > capacity {
            let current = self.current.unwrap_or(0);
            let index = if current + 1 < self.entries.len() {
                self.entries.len() - 1
            } else {
                0
            };
            let removed = self.entries.remove(index);
            page_cache.remove(&removed);
            if index < current {
                self.current = Some(current - 1);
            }
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Disabling the list drops every entry.
    pub fn set_enabled(&mut self, enabled: bool, page_cache: &mut PageCacheStore) {
        self.enabled = enabled;
        if !enabled {
            self.remove_all(page_cache);
        }
    }

    /// Remove `entry` unless it is the current entry. Returns whether it was
    /// removed.
    pub fn remove_item(&mut self, entry: &Rc<HistoryEntry>, page_cache: &mut PageCacheStore) -> bool {
        let Some(index) = self.index_of(entry) else {
            return false;
        };
        if Some(index) == self.current {
            warn!("Refusing to remove the current entry {}", entry.id());
            return false;
        }
        let removed = self.entries.remove(index);
        page_cache.remove(&removed);
        if let Some(current) = self.current.filter(|current| index < *current) {
            self.current = Some(current - 1);
        }
        true
    }

    /// Drop every entry. The list refuses new entries afterwards.
    pub fn close(&mut self, page_cache: &mut PageCacheStore) {
        self.remove_all(page_cache);
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn remove_all(&mut self, page_cache: &mut PageCacheStore) {
        for removed in self.entries.drain(..) {
            page_cache.remove(&removed);
        }
        self.current = None;
    }

    /// A serializable copy of the list. Snapshots are not part of it.
    pub fn session_state(&self) -> SessionHistoryState {
        SessionHistoryState::from_entries(&self.entries, self.current)
    }

    /// Replace every entry with entries decoded from `state`.
    pub fn restore_session_state(
        &mut self,
        state: &SessionHistoryState,
        page_cache: &mut PageCacheStore,
    ) -> Result<(), SessionStateError> {
        let (entries, current) = state.to_entries()?;
        self.remove_all(page_cache);
        self.entries = entries;
        self.current = current;
        self.set_capacity(self.capacity, page_cache);
        Ok(())
    }
}
