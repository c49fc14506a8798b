/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;
use std::time::SystemTime;

use base::CSSPixel;
use base::id::{DocumentSequenceNumber, HistoryEntryId, ItemSequenceNumber};
use euclid::Point2D;
use url::Url;

use crate::document_loader::FormData;
use crate::snapshot::PageSnapshot;

/// One navigable state in the session history.
///
/// Entries form a tree that mirrors the frame tree at the time the entry was
/// created: the entry for the main frame has one child per subframe, keyed by
/// the subframe's name (its `target`).
///
/// An entry owns at most one [`PageSnapshot`]. Only the [`crate::PageCacheStore`]
/// attaches or detaches snapshots, and it holds a strong reference to every
/// entry that currently has one.
pub struct HistoryEntry {
    id: HistoryEntryId,
    item_sequence_number: Cell<ItemSequenceNumber>,
    document_sequence_number: Cell<DocumentSequenceNumber>,
    url: RefCell<Url>,
    original_url: RefCell<Url>,
    referrer: RefCell<Option<Url>>,
    title: RefCell<String>,
    /// The name of the frame this entry belongs to.
    target: RefCell<String>,
    /// Set on the entry for the frame that was the target of the navigation
    /// that created this entry tree.
    is_target_item: Cell<bool>,
    scroll_position: Cell<Point2D<f32, CSSPixel>>,
    page_scale_factor: Cell<f32>,
    /// Form data and content type, used to resubmit POST navigations.
    form_data: RefCell<Option<FormData>>,
    /// Serialized state object from `pushState` / `replaceState`.
    state_object: RefCell<Option<Vec<u8>>>,
    /// Saved form control state of the document.
    document_state: RefCell<Vec<String>>,
    last_visited_time: Cell<Option<SystemTime>>,
    last_visit_was_failure: Cell<bool>,
    children: RefCell<Vec<Rc<HistoryEntry>>>,
    cached_page: RefCell<Option<PageSnapshot>>,
}

impl HistoryEntry {
    pub fn new(url: Url) -> Rc<HistoryEntry> {
        Self::new_with_target(url, String::new())
    }

    pub fn new_with_target(url: Url, target: String) -> Rc<HistoryEntry> {
        Rc::new(HistoryEntry {
            id: HistoryEntryId::new(),
            item_sequence_number: Cell::new(ItemSequenceNumber::new()),
            document_sequence_number: Cell::new(DocumentSequenceNumber::new()),
            original_url: RefCell::new(url.clone()),
            url: RefCell::new(url),
            referrer: RefCell::new(None),
            title: RefCell::new(String::new()),
            target: RefCell::new(target),
            is_target_item: Cell::new(false),
            scroll_position: Cell::new(Point2D::origin()),
            page_scale_factor: Cell::new(1.0),
            form_data: RefCell::new(None),
            state_object: RefCell::new(None),
            document_state: RefCell::new(Vec::new()),
            last_visited_time: Cell::new(None),
            last_visit_was_failure: Cell::new(false),
            children: RefCell::new(Vec::new()),
            cached_page: RefCell::new(None),
        })
    }

    pub fn id(&self) -> HistoryEntryId {
        self.id
    }

    pub fn item_sequence_number(&self) -> ItemSequenceNumber {
        self.item_sequence_number.get()
    }

    pub fn set_item_sequence_number(&self, number: ItemSequenceNumber) {
        self.item_sequence_number.set(number);
    }

    pub fn document_sequence_number(&self) -> DocumentSequenceNumber {
        self.document_sequence_number.get()
    }

    pub fn set_document_sequence_number(&self, number: DocumentSequenceNumber) {
        self.document_sequence_number.set(number);
    }

    pub fn url(&self) -> Url {
        self.url.borrow().clone()
    }

    pub fn set_url(&self, url: Url) {
        *self.url.borrow_mut() = url;
    }

    pub fn original_url(&self) -> Url {
        self.original_url.borrow().clone()
    }

    pub fn set_original_url(&self, url: Url) {
        *self.original_url.borrow_mut() = url;
    }

    pub fn referrer(&self) -> Option<Url> {
        self.referrer.borrow().clone()
    }

    pub fn set_referrer(&self, referrer: Option<Url>) {
        *self.referrer.borrow_mut() = referrer;
    }

    pub fn title(&self) -> String {
        self.title.borrow().clone()
    }

    pub fn set_title(&self, title: String) {
        *self.title.borrow_mut() = title;
    }

    pub fn target(&self) -> String {
        self.target.borrow().clone()
    }

    pub fn set_target(&self, target: String) {
        *self.target.borrow_mut() = target;
    }

    pub fn is_target_item(&self) -> bool {
        self.is_target_item.get()
    }

    pub fn set_is_target_item(&self, is_target_item: bool) {
        self.is_target_item.set(is_target_item);
    }

    pub fn scroll_position(&self) -> Point2D<f32, CSSPixel> {
        self.scroll_position.get()
    }

    pub fn set_scroll_position(&self, position: Point2D<f32, CSSPixel>) {
        self.scroll_position.set(position);
    }

    pub fn page_scale_factor(&self) -> f32 {
        self.page_scale_factor.get()
    }

    pub fn set_page_scale_factor(&self, scale: f32) {
        self.page_scale_factor.set(scale);
    }

    pub fn form_data(&self) -> Option<FormData> {
        self.form_data.borrow().clone()
    }

    pub fn set_form_data(&self, form_data: Option<FormData>) {
        *self.form_data.borrow_mut() = form_data;
    }

    pub fn state_object(&self) -> Option<Vec<u8>> {
        self.state_object.borrow().clone()
    }

    pub fn set_state_object(&self, state_object: Option<Vec<u8>>) {
        *self.state_object.borrow_mut() = state_object;
    }

    pub fn document_state(&self) -> Vec<String> {
        self.document_state.borrow().clone()
    }

    pub fn set_document_state(&self, state: Vec<String>) {
        *self.document_state.borrow_mut() = state;
    }

    pub fn last_visited_time(&self) -> Option<SystemTime> {
        self.last_visited_time.get()
    }

    pub fn set_last_visited_time(&self, time: Option<SystemTime>) {
        self.last_visited_time.set(time);
    }

    pub fn last_visit_was_failure(&self) -> bool {
        self.last_visit_was_failure.get()
    }

    pub fn set_last_visit_was_failure(&self, failed: bool) {
        self.last_visit_was_failure.set(failed);
    }

    /// Forget everything about the document this entry pointed at, so that the
    /// entry can be reinitialized for a different document. The entry keeps its
    /// identity and its position in the back/forward list.
    pub fn reset(&self) {
        self.item_sequence_number.set(ItemSequenceNumber::new());
        self.document_sequence_number
            .set(DocumentSequenceNumber::new());
        *self.referrer.borrow_mut() = None;
        self.title.borrow_mut().clear();
        self.is_target_item.set(false);
        self.scroll_position.set(Point2D::origin());
        self.page_scale_factor.set(1.0);
        *self.form_data.borrow_mut() = None;
        *self.state_object.borrow_mut() = None;
        self.document_state.borrow_mut().clear();
        self.last_visited_time.set(None);
        self.last_visit_was_failure.set(false);
    }

    pub fn children(&self) -> Vec<Rc<HistoryEntry>> {
        self.children.borrow().clone()
    }

    pub fn child_count(&self) -> usize {
        self.children.borrow().len()
    }

    pub fn has_children(&self) -> bool {
        !self.children.borrow().is_empty()
    }

    pub fn add_child(&self, child: Rc<HistoryEntry>) {
        self.children.borrow_mut().push(child);
    }

    /// Add `child`, replacing an existing child for the same frame.
    pub fn set_child(&self, child: Rc<HistoryEntry>) {
        let target = child.target();
        let mut children = self.children.borrow_mut();
        match children.iter().position(|existing| existing.target() == target) {
            Some(index) => children[index] = child,
            None => children.push(child),
        }
    }

    pub fn child_with_target(&self, target: &str) -> Option<Rc<HistoryEntry>> {
        self.children
            .borrow()
            .iter()
            .find(|child| *child.target.borrow() == target)
            .cloned()
    }

    pub fn clear_children(&self) {
        self.children.borrow_mut().clear();
    }

    /// The entry in this tree for the frame that was navigated, or this entry if
    /// no entry in the tree is flagged.
    pub fn target_item(self: &Rc<Self>) -> Rc<HistoryEntry> {
        self.find_target_item().unwrap_or_else(|| self.clone())
    }

    fn find_target_item(self: &Rc<Self>) -> Option<Rc<HistoryEntry>> {
        if self.is_target_item() {
            return Some(self.clone());
        }
        self.children()
            .iter()
            .find_map(|child| child.find_target_item())
    }

    /// Whether this entry tree has the same frame names and shape as `other`.
    pub fn has_same_frames(&self, other: &HistoryEntry) -> bool {
        if self.target() != other.target() {
            return false;
        }
        let children = self.children();
        if children.len() != other.child_count() {
            return false;
        }
        children.iter().all(|child| {
            other
                .child_with_target(&child.target())
                .is_some_and(|other_child| child.has_same_frames(&other_child))
        })
    }

    /// Whether every frame in this tree shows the same document as the
    /// corresponding frame in `other`.
    pub fn has_same_document_tree(&self, other: &HistoryEntry) -> bool {
        if self.document_sequence_number() != other.document_sequence_number() {
            return false;
        }
        let children = self.children();
        if children.len() != other.child_count() {
            return false;
        }
        children.iter().all(|child| {
            other
                .child_with_target(&child.target())
                .is_some_and(|other_child| child.has_same_document_tree(&other_child))
        })
    }

    /// Whether traversing from `other` to this entry can reuse the loaded
    /// document instead of loading a new one.
    pub fn should_do_same_document_navigation_to(&self, other: &HistoryEntry) -> bool {
        if self.id == other.id {
            return false;
        }

        if self.state_object.borrow().is_some() || other.state_object.borrow().is_some() {
            return self.document_sequence_number() == other.document_sequence_number();
        }

        let url = self.url();
        let other_url = other.url();
        if (url.fragment().is_some() || other_url.fragment().is_some()) &&
            equal_ignoring_fragment(&url, &other_url)
        {
            return self.document_sequence_number() == other.document_sequence_number();
        }

        self.has_same_document_tree(other)
    }

    pub fn is_in_page_cache(&self) -> bool {
        self.cached_page.borrow().is_some()
    }

    pub(crate) fn cached_page(&self) -> Option<Ref<'_, PageSnapshot>> {
        Ref::filter_map(self.cached_page.borrow(), Option::as_ref).ok()
    }

    pub(crate) fn cached_page_mut(&self) -> Option<RefMut<'_, PageSnapshot>> {
        RefMut::filter_map(self.cached_page.borrow_mut(), Option::as_mut).ok()
    }

    pub(crate) fn set_cached_page(&self, snapshot: PageSnapshot) -> Option<PageSnapshot> {
        self.cached_page.borrow_mut().replace(snapshot)
    }

    pub(crate) fn take_cached_page(&self) -> Option<PageSnapshot> {
        self.cached_page.borrow_mut().take()
    }
}

impl fmt::Debug for HistoryEntry {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter
            .debug_struct("HistoryEntry")
            .field("id", &self.id)
            .field("item_sequence_number", &self.item_sequence_number())
            .field("document_sequence_number", &self.document_sequence_number())
            .field("url", &self.url.borrow().as_str())
            .field("target", &self.target.borrow())
            .field("children", &self.child_count())
            .field("in_page_cache", &self.is_in_page_cache())
            .finish()
    }
}

pub(crate) fn equal_ignoring_fragment(first: &Url, second: &Url) -> bool {
    first[..url::Position::AfterQuery] == second[..url::Position::AfterQuery]
}
