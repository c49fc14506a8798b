/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::cell::Ref;
use std::rc::Rc;
use std::time::{Duration, Instant};

use base::id::{HistoryEntryId, PageId};
use log::debug;
use rustc_hash::FxHashMap;
use servo_config::prefs::Preferences;

use crate::eligibility::{CacheBlockers, frame_tree_blockers, page_blockers};
use crate::history_entry::HistoryEntry;
use crate::page::Page;
use crate::snapshot::{DeferredRecalc, PageSnapshot};

struct LruNode {
    entry: Rc<HistoryEntry>,
    /// Toward the head, the most recently added entry.
    previous: Option<usize>,
    next: Option<usize>,
}

/// The back/forward page cache.
///
/// Snapshots are attached to the history entries they were captured for; the
/// store keeps a strong reference to each such entry and orders them by time
/// of insertion. Reading a snapshot does not change that order.
pub struct PageCacheStore {
    capacity: usize,
    expiration: Option<Duration>,
    supports_plugins: bool,
    nodes: Vec<Option<LruNode>>,
    free_slots: Vec<usize>,
    slots: FxHashMap<HistoryEntryId, usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl PageCacheStore {
    pub fn new(capacity: usize) -> PageCacheStore {
        PageCacheStore {
            capacity,
            expiration: None,
            supports_plugins: false,
            nodes: Vec::new(),
            free_slots: Vec::new(),
            slots: FxHashMap::default(),
            head: None,
            tail: None,
        }
    }

    pub fn from_preferences(preferences: &Preferences) -> PageCacheStore {
        let mut store = PageCacheStore::new(preferences.page_cache_capacity());
        store.expiration = preferences.page_cache_expiration();
        store.supports_plugins = preferences.page_cache_supports_plugins;
        store
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        self.prune();
    }

    pub fn expiration(&self) -> Option<Duration> {
        self.expiration
    }

    /// Snapshots at least `expiration` old are dropped instead of returned.
    /// `None` keeps snapshots until they are evicted.
    pub fn set_expiration(&mut self, expiration: Option<Duration>) {
        self.expiration = expiration;
    }

    pub fn supports_plugins(&self) -> bool {
        self.supports_plugins
    }

    pub fn set_supports_plugins(&mut self, supports_plugins: bool) {
        self.supports_plugins = supports_plugins;
    }

    pub fn page_count(&self) -> usize {
        self.slots.len()
    }

    /// The number of frames, including subframes, held by all cached pages.
    pub fn frame_count(&self) -> usize {
        self.nodes
            .iter()
            .flatten()
            .filter_map(|node| node.entry.cached_page().map(|snapshot| snapshot.frame_count()))
            .sum()
    }

    /// Every reason `page` cannot be captured right now.
    pub fn blockers(&self, page: &Page) -> CacheBlockers {
        let mut blockers =
            page_blockers(&page.conditions(self.capacity)) | frame_tree_blockers(page.main_frame());
        if self.supports_plugins {
            blockers.remove(CacheBlockers::HAS_PLUGINS);
        }
        blockers
    }

    pub fn can_cache(&self, page: &Page) -> bool {
        let blockers = self.blockers(page);
        if !blockers.is_empty() {
            debug!("{} cannot enter the page cache: {:?}", page.id(), blockers);
        }
        blockers.is_empty()
    }

    /// Capture `page` and attach the snapshot to `entry`, replacing any older
    /// snapshot of that entry. The caller must have checked [`Self::can_cache`].
    /// Returns whether a snapshot was stored.
    pub fn add(&mut self, entry: &Rc<HistoryEntry>, page: &Page) -> bool {
        self.remove(entry);
        let Some(snapshot) = PageSnapshot::capture(page) else {
            debug!("Nothing to capture in {}", page.id());
            return false;
        };
        entry.set_cached_page(snapshot);
        self.link_at_head(entry.clone());
        debug!(
            "Added {} to the page cache ({} of {} pages)",
            entry.id(),
            self.page_count(),
            self.capacity
        );
        self.prune();
        true
    }

    /// The snapshot of `entry`, unless it has expired, in which case it is
    /// removed.
    pub fn get<'a>(&mut self, entry: &'a HistoryEntry) -> Option<Ref<'a, PageSnapshot>> {
        if !self.contains(entry) || self.remove_if_expired(entry) {
            return None;
        }
        entry.cached_page()
    }

    /// Remove the snapshot of `entry` from the cache and hand it to the caller.
    pub fn take(&mut self, entry: &HistoryEntry) -> Option<PageSnapshot> {
        if self.remove_if_expired(entry) {
            return None;
        }
        let slot = *self.slots.get(&entry.id())?;
        let snapshot = entry.take_cached_page();
        let _entry = self.unlink(slot);
        snapshot
    }

    /// Destroy the snapshot of `entry`, if it has one.
    pub fn remove(&mut self, entry: &HistoryEntry) {
        let Some(&slot) = self.slots.get(&entry.id()) else {
            return;
        };
        let snapshot = entry.take_cached_page();
        let _entry = self.unlink(slot);
        drop(snapshot);
    }

    pub fn contains(&self, entry: &HistoryEntry) -> bool {
        self.slots.contains_key(&entry.id())
    }

    /// Evict the least recently added snapshots until the cache fits its
    /// capacity.
    pub fn prune(&mut self) {
        while self.page_count() > self.capacity {
            let Some(tail) = self.tail.and_then(|slot| self.node(slot)) else {
                break;
            };
            let entry = tail.entry.clone();
            debug!("Evicting {} from the page cache", entry.id());
            self.remove(&entry);
        }
    }

    /// Cached entries, most recently added first.
    pub fn entries(&self) -> Vec<Rc<HistoryEntry>> {
        let mut entries = Vec::with_capacity(self.page_count());
        let mut cursor = self.head;
        while let Some(node) = cursor.and_then(|slot| self.node(slot)) {
            entries.push(node.entry.clone());
            cursor = node.next;
        }
        entries
    }

    pub fn mark_pages_for_full_style_recalc(&self) {
        self.mark_pages(None, DeferredRecalc::FULL_STYLE);
    }

    pub fn mark_pages_for_visited_link_style_recalc(&self) {
        self.mark_pages(None, DeferredRecalc::VISITED_LINK_STYLE);
    }

    pub fn mark_pages_for_device_scale_changed(&self, page_id: PageId) {
        self.mark_pages(Some(page_id), DeferredRecalc::DEVICE_SCALE);
    }

    pub fn mark_pages_for_caption_preferences_changed(&self) {
        self.mark_pages(None, DeferredRecalc::CAPTION_PREFERENCES);
    }

    fn mark_pages(&self, page_id: Option<PageId>, recalc: DeferredRecalc) {
        for node in self.nodes.iter().flatten() {
            if let Some(mut snapshot) = node.entry.cached_page_mut() {
                if page_id.is_none_or(|page_id| snapshot.page_id() == page_id) {
                    snapshot.mark(recalc);
                }
            }
        }
    }

    fn remove_if_expired(&mut self, entry: &HistoryEntry) -> bool {
        let expired = entry
            .cached_page()
            .is_some_and(|snapshot| snapshot.has_expired(self.expiration, Instant::now()));
        if expired {
            debug!("Snapshot of {} has expired", entry.id());
            self.remove(entry);
        }
        expired
    }

    fn node(&self, slot: usize) -> Option<&LruNode> {
        self.nodes.get(slot).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, slot: usize) -> Option<&mut LruNode> {
        self.nodes.get_mut(slot).and_then(Option::as_mut)
    }

    fn link_at_head(&mut self, entry: Rc<HistoryEntry>) {
        let id = entry.id();
        let node = LruNode {
            entry,
            previous: None,
            next: self.head,
        };
        let slot = match self.free_slots.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                slot
            },
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            },
        };
        if let Some(old_head) = self.head.and_then(|head| self.node_mut(head)) {
            old_head.previous = Some(slot);
        }
        self.head = Some(slot);
        if self.tail.is_none() {
            self.tail = Some(slot);
        }
        self.slots.insert(id, slot);
    }

    /// Returns the strong reference the store held on the entry.
    fn unlink(&mut self, slot: usize) -> Option<Rc<HistoryEntry>> {
        let node = self.nodes.get_mut(slot)?.take()?;
        match node.previous {
            Some(previous) => {
                if let Some(previous) = self.node_mut(previous) {
                    previous.next = node.next;
                }
            },
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => {
                if let Some(next) = self.node_mut(next) {
                    next.previous = node.previous;
                }
            },
            None => self.tail = node.previous,
        }
        self.free_slots.push(slot);
        self.slots.remove(&node.entry.id());
        Some(node.entry)
    }
}
