/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::LazyLock;

use base::id::DocumentId;
use log::debug;
use url::Url;

use crate::frame::Frame;
use crate::snapshot::DeferredRecalc;

/// A script callback run when the document is unloaded.
pub type UnloadHandler = Rc<dyn Fn(&Frame)>;

/// Where a document is with respect to the page cache.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PageCacheState {
    NotInCache,
    AboutToEnterCache,
    InCache,
}

/// The parts of a loaded document that decide whether it can be suspended into
/// the page cache, and that record what happened to it while it was there.
pub struct Document {
    id: DocumentId,
    url: RefCell<Url>,
    title: RefCell<String>,
    is_initial_empty_document: bool,
    unload_handlers: RefCell<Vec<UnloadHandler>>,
    unload_event_fired: Cell<bool>,
    open_databases: Cell<usize>,
    shared_workers: Cell<usize>,
    plugins: Cell<usize>,
    can_suspend_active_dom_objects: Cell<bool>,
    page_cache_state: Cell<PageCacheState>,
    /// Saved form control state.
    form_state: RefCell<Vec<String>>,
    bytes_received: Cell<usize>,
    page_show_count: Cell<u32>,
    page_hide_count: Cell<u32>,
    style_recalc_count: Cell<u32>,
    visited_link_recalc_count: Cell<u32>,
    device_scale_change_count: Cell<u32>,
    caption_preferences_change_count: Cell<u32>,
    pop_state_count: Cell<u32>,
    last_popped_state: RefCell<Option<Vec<u8>>>,
    destroyed: Cell<bool>,
}

impl Document {
    pub fn new(url: Url) -> Rc<Document> {
        Rc::new(Self::new_inherited(url, false))
    }

    /// The `about:blank` document every new frame starts with.
    pub(crate) fn new_initial_empty() -> Rc<Document> {
        Rc::new(Self::new_inherited(about_blank(), true))
    }

    fn new_inherited(url: Url, is_initial_empty_document: bool) -> Document {
        Document {
            id: DocumentId::new(),
            url: RefCell::new(url),
            title: RefCell::new(String::new()),
            is_initial_empty_document,
            unload_handlers: RefCell::new(Vec::new()),
            unload_event_fired: Cell::new(false),
            open_databases: Cell::new(0),
            shared_workers: Cell::new(0),
            plugins: Cell::new(0),
            can_suspend_active_dom_objects: Cell::new(true),
            page_cache_state: Cell::new(PageCacheState::NotInCache),
            form_state: RefCell::new(Vec::new()),
            bytes_received: Cell::new(0),
            page_show_count: Cell::new(0),
            page_hide_count: Cell::new(0),
            style_recalc_count: Cell::new(0),
            visited_link_recalc_count: Cell::new(0),
            device_scale_change_count: Cell::new(0),
            caption_preferences_change_count: Cell::new(0),
            pop_state_count: Cell::new(0),
            last_popped_state: RefCell::new(None),
            destroyed: Cell::new(false),
        }
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn url(&self) -> Url {
        self.url.borrow().clone()
    }

    pub fn set_url(&self, url: Url) {
        *self.url.borrow_mut() = url;
    }

    pub fn title(&self) -> String {
        self.title.borrow().clone()
    }

    pub fn set_title(&self, title: &str) {
        *self.title.borrow_mut() = title.to_owned();
    }

    pub fn is_initial_empty_document(&self) -> bool {
        self.is_initial_empty_document
    }

    pub fn add_unload_handler(&self, handler: UnloadHandler) {
        self.unload_handlers.borrow_mut().push(handler);
    }

    pub fn has_unload_handlers(&self) -> bool {
        !self.unload_handlers.borrow().is_empty()
    }

    pub(crate) fn unload_handlers(&self) -> Vec<UnloadHandler> {
        self.unload_handlers.borrow().clone()
    }

    pub fn unload_event_fired(&self) -> bool {
        self.unload_event_fired.get()
    }

    pub(crate) fn mark_unload_fired(&self) {
        self.unload_event_fired.set(true);
    }

    pub fn open_databases(&self) -> usize {
        self.open_databases.get()
    }

    pub fn set_open_databases(&self, count: usize) {
        self.open_databases.set(count);
    }

    pub fn shared_workers(&self) -> usize {
        self.shared_workers.get()
    }

    pub fn set_shared_workers(&self, count: usize) {
        self.shared_workers.set(count);
    }

    pub fn plugins(&self) -> usize {
        self.plugins.get()
    }

    pub fn set_plugins(&self, count: usize) {
        self.plugins.set(count);
    }

    pub fn can_suspend_active_dom_objects(&self) -> bool {
        self.can_suspend_active_dom_objects.get()
    }

    pub fn set_can_suspend_active_dom_objects(&self, can_suspend: bool) {
        self.can_suspend_active_dom_objects.set(can_suspend);
    }

    pub fn page_cache_state(&self) -> PageCacheState {
        self.page_cache_state.get()
    }

    pub fn form_state(&self) -> Vec<String> {
        self.form_state.borrow().clone()
    }

    pub fn set_form_state(&self, state: Vec<String>) {
        *self.form_state.borrow_mut() = state;
    }

    pub fn bytes_received(&self) -> usize {
        self.bytes_received.get()
    }

    pub(crate) fn append_bytes(&self, length: usize) {
        self.bytes_received
            .set(self.bytes_received.get().saturating_add(length));
    }

    pub fn page_show_count(&self) -> u32 {
        self.page_show_count.get()
    }

    pub fn page_hide_count(&self) -> u32 {
        self.page_hide_count.get()
    }

    pub fn style_recalc_count(&self) -> u32 {
        self.style_recalc_count.get()
    }

    pub fn visited_link_recalc_count(&self) -> u32 {
        self.visited_link_recalc_count.get()
    }

    pub fn device_scale_change_count(&self) -> u32 {
        self.device_scale_change_count.get()
    }

    pub fn caption_preferences_change_count(&self) -> u32 {
        self.caption_preferences_change_count.get()
    }

    pub fn pop_state_count(&self) -> u32 {
        self.pop_state_count.get()
    }

    pub fn last_popped_state(&self) -> Option<Vec<u8>> {
        self.last_popped_state.borrow().clone()
    }

    pub(crate) fn state_popped(&self, state: Option<Vec<u8>>) {
        self.pop_state_count.set(self.pop_state_count.get() + 1);
        *self.last_popped_state.borrow_mut() = state;
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    pub(crate) fn set_page_cache_state(&self, state: PageCacheState) {
        self.page_cache_state.set(state);
    }

    /// Fire `pagehide` and stop all script activity.
    pub(crate) fn suspend_for_page_cache(&self) {
        debug!("Suspending {} into the page cache", self.id);
        self.page_hide_count.set(self.page_hide_count.get() + 1);
        self.page_cache_state.set(PageCacheState::InCache);
    }

    /// Resume script activity and fire `pageshow`.
    pub(crate) fn resume_from_page_cache(&self) {
        debug!("Resuming {} from the page cache", self.id);
        self.page_cache_state.set(PageCacheState::NotInCache);
        self.page_show_count.set(self.page_show_count.get() + 1);
    }

    /// Perform recalculations that were skipped while the document was cached.
    pub(crate) fn apply_deferred_recalc(&self, recalc: DeferredRecalc) {
        if recalc.contains(DeferredRecalc::FULL_STYLE) {
            self.style_recalc_count
                .set(self.style_recalc_count.get() + 1);
        }
        if recalc.contains(DeferredRecalc::VISITED_LINK_STYLE) {
            self.visited_link_recalc_count
                .set(self.visited_link_recalc_count.get() + 1);
        }
        if recalc.contains(DeferredRecalc::DEVICE_SCALE) {
            self.device_scale_change_count
                .set(self.device_scale_change_count.get() + 1);
        }
        if recalc.contains(DeferredRecalc::CAPTION_PREFERENCES) {
            self.caption_preferences_change_count
                .set(self.caption_preferences_change_count.get() + 1);
        }
    }

    /// Tear the document down for good. Nothing may use it afterwards.
    pub(crate) fn prepare_for_destruction(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        debug!("Destroying {}", self.id);
        self.unload_handlers.borrow_mut().clear();
        self.page_cache_state.set(PageCacheState::NotInCache);
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter
            .debug_struct("Document")
            .field("id", &self.id)
            .field("url", &self.url.borrow().as_str())
            .field("page_cache_state", &self.page_cache_state.get())
            .field("destroyed", &self.destroyed.get())
            .finish()
    }
}

static ABOUT_BLANK: LazyLock<Url> =
    LazyLock::new(|| Url::parse("about:blank").expect("infallible"));

pub(crate) fn about_blank() -> Url {
    ABOUT_BLANK.clone()
}
