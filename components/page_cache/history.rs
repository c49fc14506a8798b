/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Per-frame session history bookkeeping.
//!
//! Every frame tracks the history entry for the document it shows, the entry
//! it showed before, and the entry an in-flight history traversal is moving
//! it to. When a navigation commits, [`HistoryController`] decides, based on
//! the type of the load, whether a new entry tree is pushed onto the
//! back/forward list, the current entry is updated in place, or nothing
//! changes at all.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::SystemTime;

use log::{debug, warn};
use url::Url;

use crate::document_loader::DocumentLoader;
use crate::frame::{Frame, WeakFrame};
use crate::frame_loader::{FrameLoadType, SameDocumentNavigation};
use crate::history_entry::{HistoryEntry, equal_ignoring_fragment};

pub struct HistoryController {
    frame: WeakFrame,
    current_item: RefCell<Option<Rc<HistoryEntry>>>,
    previous_item: RefCell<Option<Rc<HistoryEntry>>>,
    provisional_item: RefCell<Option<Rc<HistoryEntry>>>,
    /// Whether the frame finished loading since `current_item` was set.
    frame_load_complete: Cell<bool>,
    /// A traversal requested while the page was deferring loads.
    deferred_item: RefCell<Option<(Rc<HistoryEntry>, FrameLoadType)>>,
}

impl HistoryController {
    pub(crate) fn new(frame: WeakFrame) -> HistoryController {
        HistoryController {
            frame,
            current_item: RefCell::new(None),
            previous_item: RefCell::new(None),
            provisional_item: RefCell::new(None),
            frame_load_complete: Cell::new(true),
            deferred_item: RefCell::new(None),
        }
    }

    pub fn current_item(&self) -> Option<Rc<HistoryEntry>> {
        self.current_item.borrow().clone()
    }

    pub fn previous_item(&self) -> Option<Rc<HistoryEntry>> {
        self.previous_item.borrow().clone()
    }

    pub fn provisional_item(&self) -> Option<Rc<HistoryEntry>> {
        self.provisional_item.borrow().clone()
    }

    pub(crate) fn set_current_item(&self, item: Option<Rc<HistoryEntry>>) {
        self.frame_load_complete.set(false);
        *self.previous_item.borrow_mut() = self.current_item.replace(item);
    }

    pub(crate) fn set_provisional_item(&self, item: Option<Rc<HistoryEntry>>) {
        *self.provisional_item.borrow_mut() = item;
    }

    pub(crate) fn clear(&self) {
        *self.current_item.borrow_mut() = None;
        *self.previous_item.borrow_mut() = None;
        *self.provisional_item.borrow_mut() = None;
        *self.deferred_item.borrow_mut() = None;
    }

    pub(crate) fn update_for_frame_load_completed(&self) {
        self.frame_load_complete.set(true);
    }

    pub(crate) fn save_scroll_position_and_view_state_to_item(&self, item: Option<&Rc<HistoryEntry>>) {
        let (Some(frame), Some(item)) = (self.frame.upgrade(), item) else {
            return;
        };
        let Some(view) = frame.view() else {
            return;
        };
        item.set_scroll_position(view.scroll_position);
        item.set_page_scale_factor(view.page_scale_factor);
    }

    pub(crate) fn restore_scroll_position_and_view_state(&self) {
        let (Some(frame), Some(item)) = (self.frame.upgrade(), self.current_item()) else {
            return;
        };
        frame.scroll_to(item.scroll_position());
        frame.set_page_scale_factor(item.page_scale_factor());
    }

    pub(crate) fn save_document_state(&self) {
        let Some(frame) = self.frame.upgrade() else {
            return;
        };
        let item = if self.frame_load_complete.get() {
            self.current_item()
        } else {
            self.previous_item()
        };
        let (Some(item), Some(document)) = (item, frame.document()) else {
            return;
        };
        if document.is_initial_empty_document() {
            return;
        }
        item.set_document_state(document.form_state());
    }

    pub(crate) fn restore_document_state(&self) {
        let Some(frame) = self.frame.upgrade() else {
            return;
        };
        let load_type = frame.loader().load_type();
        if !load_type.is_back_forward() && !load_type.is_reload() {
            return;
        }
        let (Some(item), Some(document)) = (self.current_item(), frame.document()) else {
            return;
        };
        document.set_form_state(item.document_state());
    }

    /// Save form and scroll state of this frame and all of its descendants to
    /// their current entries.
    pub(crate) fn save_document_and_scroll_state(&self) {
        let Some(frame) = self.frame.upgrade() else {
            return;
        };
        for frame in frame.self_and_descendants() {
            let history = frame.history();
            history.save_document_state();
            history.save_scroll_position_and_view_state_to_item(history.current_item().as_ref());
        }
    }

    /// Traverse the session history to `target`, a top-level entry in the
    /// page's back/forward list.
    ///
    /// Frames whose entries are clones of the ones they show are left alone;
    /// only the frames that differ are loaded.
    pub fn go_to_item(&self, target: &Rc<HistoryEntry>, load_type: FrameLoadType) -> bool {
        let Some(frame) = self.frame.upgrade() else {
            return false;
        };
        if !frame.is_main_frame() {
            warn!("History traversal must start at the main frame");
            return false;
        }
        let Some(page) = frame.page() else {
            warn!("History traversal in a detached frame");
            return false;
        };

        if page.defers_loading() {
            debug!("Deferring traversal to {}", target.id());
            *self.deferred_item.borrow_mut() = Some((target.clone(), load_type));
            return true;
        }

        let from_item = page.back_forward_list().current_item();
        if !page.back_forward_list_mut().go_to_item(target) {
            return false;
        }

        match from_item {
            Some(from_item) => {
                self.recursive_set_provisional_item(target, &from_item);
                self.recursive_go_to_item(target, &from_item, load_type);
            },
            None => frame.loader().load_item(target, load_type),
        }
        true
    }

    /// A history traversal was cancelled before it committed: move the
    /// back/forward list back to the entry this frame still shows and forget
    /// the provisional entries of the frame tree.
    pub(crate) fn restore_list_to_current_item(&self) {
        let Some(frame) = self.frame.upgrade() else {
            return;
        };
        for frame in frame.self_and_descendants() {
            frame.history().set_provisional_item(None);
        }
        let (Some(page), Some(current_item)) = (frame.page(), self.current_item()) else {
            return;
        };
        if page.back_forward_list_mut().go_to_item(&current_item) {
            debug!("Traversal cancelled, back at {}", current_item.url());
        }
    }

    /// Start the traversal that was requested while loads were deferred.
    pub(crate) fn resume_deferred_traversal(&self) {
        let deferred = self.deferred_item.borrow_mut().take();
        if let Some((item, load_type)) = deferred {
            self.go_to_item(&item, load_type);
        }
    }

    fn recursive_set_provisional_item(&self, item: &Rc<HistoryEntry>, from_item: &Rc<HistoryEntry>) {
        let Some(frame) = self.frame.upgrade() else {
            return;
        };
        if !self.items_are_clones(item, Some(from_item)) {
            return;
        }

        self.set_provisional_item(Some(item.clone()));

        for child_item in item.children() {
            let target = child_item.target();
            let (Some(child_frame), Some(from_child_item)) =
                (frame.child(&target), from_item.child_with_target(&target))
            else {
                continue;
            };
            child_frame
                .history()
                .recursive_set_provisional_item(&child_item, &from_child_item);
        }
    }

    fn recursive_go_to_item(
        &self,
        item: &Rc<HistoryEntry>,
        from_item: &Rc<HistoryEntry>,
        load_type: FrameLoadType,
    ) {
        let Some(frame) = self.frame.upgrade() else {
            return;
        };
        if !self.items_are_clones(item, Some(from_item)) {
            frame.loader().load_item(item, load_type);
            return;
        }

        for child_item in item.children() {
            let target = child_item.target();
            let (Some(child_frame), Some(from_child_item)) =
                (frame.child(&target), from_item.child_with_target(&target))
            else {
                continue;
            };
            child_frame
                .history()
                .recursive_go_to_item(&child_item, &from_child_item, load_type);
        }
    }

    /// Whether `first` and `second` are distinct entries that show the same
    /// document in a frame tree of the same shape as this frame's.
    ///
    /// Clones appear when a subframe navigates: the new entry tree copies the
    /// entries of every frame that did not change.
    pub fn items_are_clones(&self, first: &Rc<HistoryEntry>, second: Option<&Rc<HistoryEntry>>) -> bool {
        let Some(second) = second else {
            return false;
        };
        !Rc::ptr_eq(first, second) &&
            first.item_sequence_number() == second.item_sequence_number() &&
            first.document_sequence_number() == second.document_sequence_number() &&
            self.current_frames_match_item(first) &&
            second.has_same_frames(first)
    }

    /// Whether the frame tree below this frame has the names and shape of the
    /// entry tree below `item`.
    fn current_frames_match_item(&self, item: &HistoryEntry) -> bool {
        let Some(frame) = self.frame.upgrade() else {
            return false;
        };
        let name = frame.name();
        let target = item.target();
        if (!name.is_empty() || !target.is_empty()) && name != target {
            return false;
        }

        let child_items = item.children();
        if child_items.len() != frame.child_count() {
            return false;
        }
        child_items
            .iter()
            .all(|child_item| frame.child(&child_item.target()).is_some())
    }

    /// Promote the provisional entry once a history traversal commits.
    pub(crate) fn update_for_commit(&self) {
        let Some(frame) = self.frame.upgrade() else {
            return;
        };
        let load_type = frame.loader().load_type();
        let traversal = load_type.is_back_forward() ||
            (load_type.is_reload() && self.provisional_item.borrow().is_some());
        if !traversal {
            return;
        }

        let Some(provisional_item) = self.provisional_item.borrow_mut().take() else {
            return;
        };
        self.frame_load_complete.set(false);
        *self.previous_item.borrow_mut() = self.current_item.replace(Some(provisional_item));

        // Ancestors and siblings that were only cloned also reach their
        // provisional entries now.
        if let Some(main_frame) = frame.main_frame() {
            main_frame.history().recursive_update_for_commit();
        }
    }

    fn recursive_update_for_commit(&self) {
        let Some(frame) = self.frame.upgrade() else {
            return;
        };
        // Frames that were loaded by the traversal have already been updated.
        let Some(provisional_item) = self.provisional_item() else {
            return;
        };

        if self.items_are_clones(&provisional_item, self.current_item().as_ref()) {
            self.save_document_state();
            self.save_scroll_position_and_view_state_to_item(self.current_item().as_ref());
            self.restore_scroll_position_and_view_state_from(&provisional_item);

            self.frame_load_complete.set(false);
            *self.previous_item.borrow_mut() = self.current_item.replace(Some(provisional_item));
        }
        self.set_provisional_item(None);

        for child in frame.children() {
            child.history().recursive_update_for_commit();
        }
    }

    fn restore_scroll_position_and_view_state_from(&self, item: &HistoryEntry) {
        if let Some(frame) = self.frame.upgrade() {
            frame.scroll_to(item.scroll_position());
            frame.set_page_scale_factor(item.page_scale_factor());
        }
    }

    pub(crate) fn update_for_back_forward_navigation(&self) {
        // The scroll position of the page we left was saved before the commit
        // unless the page had not finished loading.
        if !self.frame_load_complete.get() {
            self.save_scroll_position_and_view_state_to_item(self.previous_item().as_ref());
        }
    }

    pub(crate) fn update_for_reload(&self) {
        let Some(frame) = self.frame.upgrade() else {
            return;
        };
        if let Some(current_item) = self.current_item() {
            if let Some(page) = frame.page() {
                page.page_cache().borrow_mut().remove(&current_item);
            }
            // Subframes add their entries again as they reload.
            current_item.clear_children();
        }
        // The reload may have been redirected somewhere else this time.
        self.update_current_item();
    }

    pub(crate) fn update_for_standard_load(&self) {
        let Some(frame) = self.frame.upgrade() else {
            return;
        };
        let Some(document_loader) = frame.loader().document_loader() else {
            return;
        };
        if document_loader.is_client_redirect() && self.current_item().is_some() {
            self.update_current_item();
        } else {
            self.update_back_forward_list_clipped_at_target(true);
        }
    }

    /// A `Replace` load reuses the current entry for the new document.
    pub(crate) fn update_for_replace(&self) {
        let Some(frame) = self.frame.upgrade() else {
            return;
        };
        let (Some(current_item), Some(document_loader)) =
            (self.current_item(), frame.loader().document_loader())
        else {
            self.update_for_standard_load();
            return;
        };
        if let Some(page) = frame.page() {
            page.page_cache().borrow_mut().remove(&current_item);
        }
        current_item.reset();
        current_item.clear_children();
        self.initialize_item(&frame, &current_item, &document_loader);
    }

    pub(crate) fn update_for_redirect_with_locked_back_forward_list(&self) {
        let Some(frame) = self.frame.upgrade() else {
            return;
        };
        let Some(document_loader) = frame.loader().document_loader() else {
            return;
        };

        if document_loader.is_client_redirect() || frame.is_main_frame() {
            if self.current_item().is_none() && frame.is_main_frame() {
                self.update_back_forward_list_clipped_at_target(true);
            }
            self.update_current_item();
            return;
        }

        // A subframe load that must not create a new back/forward entry still
        // gets an entry in its parent's current entry tree.
        if let Some(parent_item) = frame.parent().and_then(|parent| parent.history().current_item()) {
            if let Some(item) = self.create_item(&frame) {
                parent_item.set_child(item);
            }
        }
    }

    pub(crate) fn update_for_same_document_navigation(&self) {
        let (Some(frame), Some(current_item)) = (self.frame.upgrade(), self.current_item()) else {
            return;
        };
        if let Some(url) = frame.url() {
            current_item.set_url(url);
        }
    }

    /// Push a new entry tree for a fragment navigation within the current
    /// document.
    pub(crate) fn update_back_forward_list_for_fragment_scroll(&self) {
        self.update_back_forward_list_clipped_at_target(false);
    }

    /// Rewrite the current entry so that it describes the document that
    /// `document_loader` now shows.
    pub(crate) fn update_current_item(&self) {
        let Some(frame) = self.frame.upgrade() else {
            return;
        };
        let (Some(current_item), Some(document_loader)) =
            (self.current_item(), frame.loader().document_loader())
        else {
            return;
        };

        if current_item.url() != document_loader.url() {
            // A snapshot of the previous document no longer matches the entry.
            if let Some(page) = frame.page() {
                page.page_cache().borrow_mut().remove(&current_item);
            }
            current_item.reset();
            self.initialize_item(&frame, &current_item, &document_loader);
        } else {
            // The URL did not change, but the request may have form data now.
            current_item.set_form_data(document_loader.request().form_data.clone());
        }
    }

    fn update_back_forward_list_clipped_at_target(&self, clip_at_target: bool) {
        let Some(frame) = self.frame.upgrade() else {
            return;
        };
        let Some(page) = frame.page() else {
            return;
        };
        if frame.loader().document_loader().is_none() {
            return;
        }

        let main_frame = page.main_frame().clone();
        let Some(top_item) = main_frame
            .history()
            .create_item_tree(&frame, clip_at_target)
        else {
            return;
        };
        debug!(
            "Adding {} for {} to the back/forward list",
            top_item.id(),
            top_item.url()
        );
        page.add_history_entry(top_item);
    }

    /// Create entries for this frame and its descendants. Every frame except
    /// `target` gets a clone of its current entry.
    fn create_item_tree(&self, target: &Frame, clip_at_target: bool) -> Option<Rc<HistoryEntry>> {
        let frame = self.frame.upgrade()?;
        let item = self.create_item(&frame)?;
        let is_target = frame.ptr_eq(target);

        if !clip_at_target || !is_target {
            if let Some(previous_item) = self.previous_item() {
                if !is_target {
                    item.set_item_sequence_number(previous_item.item_sequence_number());
                }
                item.set_document_sequence_number(previous_item.document_sequence_number());
                item.set_scroll_position(previous_item.scroll_position());
                item.set_page_scale_factor(previous_item.page_scale_factor());
                item.set_state_object(previous_item.state_object());
                item.set_document_state(previous_item.document_state());
            }

            for child in frame.children() {
                if let Some(child_item) = child.history().create_item_tree(target, clip_at_target) {
                    item.add_child(child_item);
                }
            }
        }

        if is_target {
            item.set_is_target_item(true);
        }
        Some(item)
    }

    /// Create an entry for the document `frame` shows and make it current.
    fn create_item(&self, frame: &Frame) -> Option<Rc<HistoryEntry>> {
        let document_loader = frame.loader().document_loader()?;
        let item = HistoryEntry::new_with_target(document_loader.url(), frame.name());
        self.initialize_item(frame, &item, &document_loader);

        self.frame_load_complete.set(false);
        *self.previous_item.borrow_mut() = self.current_item.replace(Some(item.clone()));
        Some(item)
    }

    fn initialize_item(&self, frame: &Frame, item: &HistoryEntry, document_loader: &DocumentLoader) {
        let request = document_loader.request();
        item.set_url(document_loader.url());
        item.set_original_url(document_loader.original_url());
        item.set_referrer(request.referrer.clone());
        item.set_form_data(request.form_data.clone());
        item.set_target(frame.name());
        item.set_title(frame.document().map(|document| document.title()).unwrap_or_default());
        item.set_last_visited_time(Some(SystemTime::now()));
        item.set_last_visit_was_failure(document_loader.main_resource_error().is_some());
    }

    /// Add an entry for `url` in the current document, as `history.pushState`
    /// does. The new entry shares the document sequence number of the current
    /// one, so traversing between them never reloads.
    pub fn push_state(&self, state_object: Option<Vec<u8>>, title: &str, url: Option<Url>) -> bool {
        let Some(frame) = self.frame.upgrade() else {
            return false;
        };
        let Some(page) = frame.page() else {
            return false;
        };
        if self.current_item().is_none() {
            warn!("pushState without a current history entry");
            return false;
        }
        if let Some(url) = url {
            self.update_document_url(&frame, url);
        }

        let main_frame = page.main_frame().clone();
        let Some(top_item) = main_frame.history().create_item_tree(&frame, false) else {
            return false;
        };
        let Some(current_item) = self.current_item() else {
            return false;
        };
        current_item.set_title(title.to_owned());
        current_item.set_state_object(state_object);
        page.add_history_entry(top_item);
        true
    }

    /// Replace the state object, title and URL of the current entry, as
    /// `history.replaceState` does.
    pub fn replace_state(&self, state_object: Option<Vec<u8>>, title: &str, url: Option<Url>) -> bool {
        let Some(frame) = self.frame.upgrade() else {
            return false;
        };
        let Some(current_item) = self.current_item() else {
            warn!("replaceState without a current history entry");
            return false;
        };
        if let Some(url) = url {
            self.update_document_url(&frame, url.clone());
            current_item.set_url(url);
        }
        current_item.set_title(title.to_owned());
        current_item.set_state_object(state_object);
        true
    }

    /// Scroll to the fragment of `url` within the current document. With
    /// `replace` the current entry is updated instead of a new entry pushed.
    pub fn navigate_to_fragment(&self, url: Url, replace: bool) -> bool {
        let Some(frame) = self.frame.upgrade() else {
            return false;
        };
        let same_document = frame
            .url()
            .is_some_and(|current| equal_ignoring_fragment(&current, &url));
        if !same_document {
            warn!("{} is not a fragment of the current document", url);
            return false;
        }
        let navigation = if replace {
            SameDocumentNavigation::Replace
        } else {
            SameDocumentNavigation::Push
        };
        frame.loader().load_in_same_document(url, None, navigation);
        true
    }

    fn update_document_url(&self, frame: &Frame, url: Url) {
        if let Some(document) = frame.document() {
            document.set_url(url.clone());
        }
        if let Some(document_loader) = frame.loader().document_loader() {
            document_loader.replace_request_url_for_same_document_navigation(url);
        }
    }
}
