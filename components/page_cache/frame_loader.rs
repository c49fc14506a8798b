/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The load state machine of a frame.
//!
//! A load starts out provisional: its document loader waits for a response
//! while the old document stays visible. When the response arrives the load
//! commits. This is the point where the outgoing page is captured into the
//! page cache or torn down, and where a page coming back from the cache is
//! restored. Once the main resource and every subframe are done the frame
//! is complete.
//!
//! Unload handlers and embedder callbacks run synchronously in the middle of
//! this, and may start, stop, or replace loads. Every step that runs foreign
//! code is followed by a check of the loader's [`Epoch`], which changes
//! whenever the provisional document loader changes.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use base::Epoch;
use base::id::DocumentLoaderId;
use log::{debug, warn};
use url::Url;

use crate::document::Document;
use crate::document_loader::{
    DocumentLoader, LoadError, LoadRequest, ResourceResponse, SubstituteData,
};
use crate::frame::{Frame, FrameView, WeakFrame};
use crate::history_entry::{HistoryEntry, equal_ignoring_fragment};
use crate::page::Page;
use crate::timer_scheduler::{TimerId, TimerTask};

/// Redirects scheduled at most this far in the future keep the page out of
/// the page cache.
const QUICK_REDIRECT_DELAY: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FrameState {
    Provisional,
    Committed,
    Complete,
}

/// How a navigation was started, which decides what happens to the session
/// history when it commits.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum FrameLoadType {
    #[default]
    Standard,
    Back,
    Forward,
    IndexedBackForward,
    Reload,
    ReloadFromOrigin,
    /// A load of the URL that is already shown.
    Same,
    Replace,
    RedirectWithLockedBackForwardList,
}

impl FrameLoadType {
    pub fn is_back_forward(self) -> bool {
        matches!(
            self,
            FrameLoadType::Back | FrameLoadType::Forward | FrameLoadType::IndexedBackForward
        )
    }

    pub fn is_reload(self) -> bool {
        matches!(self, FrameLoadType::Reload | FrameLoadType::ReloadFromOrigin)
    }
}

/// How a navigation within the current document affects the session history.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum SameDocumentNavigation {
    /// A new navigation that gets its own history entry.
    Push,
    /// A new navigation that rewrites the current history entry.
    Replace,
    /// A traversal to another history entry of the same document.
    Traversal,
}

#[derive(Clone, Copy, Eq, PartialEq)]
enum ClearProvisionalItem {
    Yes,
    No,
}

struct ScheduledRedirect {
    url: Url,
    quick: bool,
    timer: TimerId,
}

pub struct FrameLoader {
    frame: WeakFrame,
    state: Cell<FrameState>,
    load_type: Cell<FrameLoadType>,
    epoch: Cell<Epoch>,
    document_loader: RefCell<Option<Rc<DocumentLoader>>>,
    provisional_document_loader: RefCell<Option<Rc<DocumentLoader>>>,
    loading_from_cached_page: Cell<bool>,
    in_stop_all_loaders: Cell<bool>,
    scheduled_redirect: RefCell<Option<ScheduledRedirect>>,
    pending_load_check: Cell<Option<TimerId>>,
}

impl FrameLoader {
    pub(crate) fn new(frame: WeakFrame) -> FrameLoader {
        FrameLoader {
            frame,
            state: Cell::new(FrameState::Complete),
            load_type: Cell::new(FrameLoadType::Standard),
            epoch: Cell::new(Epoch::default()),
            document_loader: RefCell::new(Some(DocumentLoader::for_initial_empty_document())),
            provisional_document_loader: RefCell::new(None),
            loading_from_cached_page: Cell::new(false),
            in_stop_all_loaders: Cell::new(false),
            scheduled_redirect: RefCell::new(None),
            pending_load_check: Cell::new(None),
        }
    }

    pub fn state(&self) -> FrameState {
        self.state.get()
    }

    pub(crate) fn set_state(&self, state: FrameState) {
        self.state.set(state);
    }

    pub fn load_type(&self) -> FrameLoadType {
        self.load_type.get()
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch.get()
    }

    pub fn document_loader(&self) -> Option<Rc<DocumentLoader>> {
        self.document_loader.borrow().clone()
    }

    pub(crate) fn set_document_loader(&self, loader: Option<Rc<DocumentLoader>>) {
        *self.document_loader.borrow_mut() = loader;
    }

    pub fn provisional_document_loader(&self) -> Option<Rc<DocumentLoader>> {
        self.provisional_document_loader.borrow().clone()
    }

    fn set_provisional_document_loader(&self, loader: Option<Rc<DocumentLoader>>) {
        *self.provisional_document_loader.borrow_mut() = loader;
        let mut epoch = self.epoch.get();
        epoch.next();
        self.epoch.set(epoch);
    }

    fn is_provisional_document_loader(&self, loader: &Rc<DocumentLoader>) -> bool {
        self.provisional_document_loader
            .borrow()
            .as_ref()
            .is_some_and(|current| Rc::ptr_eq(current, loader))
    }

    pub fn is_loading_from_cached_page(&self) -> bool {
        self.loading_from_cached_page.get()
    }

    /// Whether a provisional load is pending or the committed document is
    /// still loading.
    pub fn is_loading(&self) -> bool {
        self.provisional_document_loader.borrow().is_some() ||
            self.document_loader()
                .is_some_and(|loader| loader.is_loading())
    }

    pub fn is_stopping(&self) -> bool {
        self.in_stop_all_loaders.get() ||
            self.document_loader()
                .is_some_and(|loader| loader.is_stopping()) ||
            self.provisional_document_loader()
                .is_some_and(|loader| loader.is_stopping())
    }

    /// Whether a redirect is due within a second.
    pub fn quick_redirect_coming(&self) -> bool {
        self.scheduled_redirect
            .borrow()
            .as_ref()
            .is_some_and(|redirect| redirect.quick)
    }

    /// Start loading `request` into the frame.
    pub fn load(&self, request: LoadRequest, load_type: FrameLoadType) {
        let Some(frame) = self.frame.upgrade() else {
            return;
        };

        if load_type == FrameLoadType::Standard &&
            request.form_data.is_none() &&
            should_perform_fragment_navigation(&frame, &request.url)
        {
            self.load_in_same_document(request.url, None, SameDocumentNavigation::Push);
            return;
        }

        let load_type = if load_type == FrameLoadType::Standard &&
            request.form_data.is_none() &&
            should_treat_url_as_same_as_current(&frame, &request.url)
        {
            FrameLoadType::Same
        } else {
            load_type
        };
        self.load_with_document_loader(DocumentLoader::new(request), load_type, false);
    }

    /// Load a document from data supplied by the embedder, such as an error
    /// page. The data is delivered from a timer, like a network response.
    pub fn load_substitute_data(&self, request: LoadRequest, substitute_data: SubstituteData) {
        let loader = DocumentLoader::with_substitute_data(request, substitute_data);
        self.load_with_document_loader(loader, FrameLoadType::Standard, false);
    }

    pub fn reload(&self, from_origin: bool) {
        let Some(frame) = self.frame.upgrade() else {
            return;
        };
        let Some(document_loader) = self.document_loader() else {
            return;
        };
        if frame
            .document()
            .is_some_and(|document| document.is_initial_empty_document())
        {
            return;
        }
        let request = document_loader.request().clone();
        let load_type = if from_origin {
            FrameLoadType::ReloadFromOrigin
        } else {
            FrameLoadType::Reload
        };
        self.load_with_document_loader(DocumentLoader::new(request), load_type, false);
    }

    /// Load the document of `item`, without touching the back/forward list.
    pub fn load_item(&self, item: &Rc<HistoryEntry>, load_type: FrameLoadType) {
        let Some(frame) = self.frame.upgrade() else {
            return;
        };
        let same_document = frame
            .history()
            .current_item()
            .is_some_and(|current_item| item.should_do_same_document_navigation_to(&current_item));
        if same_document {
            self.load_same_document_item(&frame, item);
        } else {
            self.load_different_document_item(item, load_type);
        }
    }

    fn load_same_document_item(&self, frame: &Frame, item: &Rc<HistoryEntry>) {
        let history = frame.history();
        history.save_scroll_position_and_view_state_to_item(history.current_item().as_ref());
        history.set_current_item(Some(item.clone()));
        self.load_in_same_document(
            item.url(),
            item.state_object(),
            SameDocumentNavigation::Traversal,
        );
        history.restore_scroll_position_and_view_state();
    }

    /// Load the document of `item` from the page cache if it is there, or
    /// from the network otherwise.
    pub(crate) fn load_different_document_item(&self, item: &Rc<HistoryEntry>, load_type: FrameLoadType) {
        let Some(frame) = self.frame.upgrade() else {
            return;
        };
        let Some(page) = frame.page() else {
            return;
        };
        frame.history().set_provisional_item(Some(item.clone()));

        let cached_loader = if frame.is_main_frame() {
            page.page_cache()
                .borrow_mut()
                .get(item)
                .and_then(|snapshot| snapshot.document_loader())
        } else {
            None
        };
        if let Some(loader) = cached_loader {
            debug!("Loading {} from the page cache", item.id());
            loader.prepare_for_cached_load();
            self.load_with_document_loader(loader, load_type, true);
            return;
        }

        let request = LoadRequest {
            url: item.url(),
            referrer: item.referrer(),
            form_data: item.form_data(),
        };
        self.load_with_document_loader(DocumentLoader::new(request), load_type, false);
    }

    fn load_with_document_loader(
        &self,
        loader: Rc<DocumentLoader>,
        load_type: FrameLoadType,
        from_page_cache: bool,
    ) {
        let Some(frame) = self.frame.upgrade() else {
            return;
        };

        // A history load already set the provisional item it is going to.
        self.stop_all_loaders_with_policy(ClearProvisionalItem::No);
        let Some(page) = frame.page() else {
            warn!("{} was detached while stopping its loads", frame.id());
            return;
        };

        self.set_provisional_document_loader(Some(loader.clone()));
        self.load_type.set(load_type);
        self.state.set(FrameState::Provisional);
        self.loading_from_cached_page.set(from_page_cache);

        page.delegate().did_start_provisional_load(&frame);
        if !self.is_provisional_document_loader(&loader) {
            return;
        }

        if from_page_cache {
            self.commit_provisional_load();
        } else {
            self.start_provisional_fetch(&frame, &page, &loader);
        }
    }

    fn start_provisional_fetch(&self, frame: &Frame, page: &Page, loader: &Rc<DocumentLoader>) {
        loader.start_loading();
        if loader.substitute_data().is_some() {
            page.queue_timer(
                Duration::ZERO,
                TimerTask::DeliverSubstituteData {
                    frame: frame.id(),
                    loader: loader.id(),
                },
            );
            return;
        }
        let request = loader.request().clone();
        debug!("Fetching {} into {}", request.url, frame.id());
        page.delegate().fetch(frame, &request);
    }

    pub(crate) fn deliver_substitute_data(&self, loader_id: DocumentLoaderId) {
        let Some(loader) = self
            .provisional_document_loader()
            .filter(|loader| loader.id() == loader_id)
        else {
            return;
        };
        let Some(substitute_data) = loader.substitute_data().cloned() else {
            return;
        };
        let mut response = ResourceResponse::new(substitute_data.response_url.clone());
        response.mime_type = substitute_data.mime_type.clone();
        self.did_receive_response(response);

        let committed = self
            .document_loader()
            .is_some_and(|current| Rc::ptr_eq(&current, &loader));
        if committed {
            self.did_receive_data(&substitute_data.content);
            self.did_finish_loading();
        }
    }

    /// The response of the provisional load arrived: commit it.
    pub fn did_receive_response(&self, response: ResourceResponse) {
        let Some(loader) = self.provisional_document_loader() else {
            warn!("Response for {} without a provisional load", response.url);
            return;
        };
        loader.set_response(response);
        self.commit_provisional_load();
    }

    pub fn did_receive_data(&self, data: &[u8]) {
        let Some(frame) = self.frame.upgrade() else {
            return;
        };
        if let Some(document) = frame.document() {
            document.append_bytes(data.len());
        }
    }

    /// The main resource of the committed load finished.
    pub fn did_finish_loading(&self) {
        let Some(loader) = self.document_loader() else {
            return;
        };
        loader.finish_loading();
        self.check_completed();
    }

    /// The main resource failed, before or after the load committed.
    pub fn did_fail_loading(&self, error: LoadError) {
        let Some(frame) = self.frame.upgrade() else {
            return;
        };
        let delegate = frame.page().map(|page| page.delegate());

        if let Some(loader) = self.provisional_document_loader() {
            debug!("Provisional load of {} failed: {}", loader.url(), error);
            loader.set_main_resource_error(error.clone());
            self.set_provisional_document_loader(None);
            frame.history().set_provisional_item(None);
            self.loading_from_cached_page.set(false);
            if self.state.get() == FrameState::Provisional {
                self.state.set(FrameState::Complete);
            }
            self.restore_history_after_cancelled_traversal(&frame);
            if let Some(delegate) = delegate {
                delegate.did_fail_load(&frame, &error);
            }
            return;
        }

        if let Some(loader) = self.document_loader() {
            debug!("Load of {} failed: {}", loader.url(), error);
            loader.set_main_resource_error(error.clone());
            if let Some(delegate) = delegate {
                delegate.did_fail_load(&frame, &error);
            }
            self.check_completed();
        }
    }

    pub fn subresource_load_started(&self) {
        if let Some(loader) = self.document_loader() {
            loader.begin_subresource_load();
        }
    }

    pub fn subresource_load_finished(&self) {
        if let Some(loader) = self.document_loader() {
            loader.finish_subresource_load();
            self.check_completed();
        }
    }

    /// Navigate to `url` after `delay`, replacing any redirect that is already
    /// scheduled.
    pub fn schedule_redirect(&self, url: Url, delay: Duration) {
        let Some(frame) = self.frame.upgrade() else {
            return;
        };
        let Some(page) = frame.page() else {
            return;
        };
        self.cancel_scheduled_redirect(&page);
        let timer = page.queue_timer(delay, TimerTask::Redirect { frame: frame.id() });
        *self.scheduled_redirect.borrow_mut() = Some(ScheduledRedirect {
            url,
            quick: delay <= QUICK_REDIRECT_DELAY,
            timer,
        });
    }

    fn cancel_scheduled_redirect(&self, page: &Page) {
        let redirect = self.scheduled_redirect.borrow_mut().take();
        if let Some(redirect) = redirect {
            debug!("Cancelling redirect to {}", redirect.url);
            page.cancel_timer(redirect.timer);
        }
    }

    pub(crate) fn redirect_timer_fired(&self) {
        let Some(redirect) = self.scheduled_redirect.borrow_mut().take() else {
            return;
        };
        let mut request = LoadRequest::new(redirect.url);
        request.referrer = self.document_loader().map(|loader| loader.url());
        let loader = DocumentLoader::new(request);
        loader.set_is_client_redirect(true);
        self.load_with_document_loader(
            loader,
            FrameLoadType::RedirectWithLockedBackForwardList,
            false,
        );
    }

    /// Cancel every load in this frame and its descendants. Calls made while
    /// a stop is in progress do nothing.
    pub fn stop_all_loaders(&self) {
        self.stop_all_loaders_with_policy(ClearProvisionalItem::Yes);
    }

    fn stop_all_loaders_with_policy(&self, clear_provisional_item: ClearProvisionalItem) {
        if self.in_stop_all_loaders.get() {
            return;
        }
        let Some(frame) = self.frame.upgrade() else {
            return;
        };
        self.in_stop_all_loaders.set(true);

        let page = frame.page();
        if let Some(page) = page.as_ref() {
            self.cancel_scheduled_redirect(page);
        }

        for child in frame.children() {
            child
                .loader()
                .stop_all_loaders_with_policy(clear_provisional_item);
        }

        let delegate = page.map(|page| page.delegate());
        let notify = |error: &LoadError| {
            if let Some(delegate) = delegate.as_ref() {
                delegate.did_fail_load(&frame, error);
            }
        };
        let provisional = self.provisional_document_loader();
        if let Some(loader) = provisional.as_ref() {
            loader.stop_loading(notify);
        }
        if let Some(loader) = self.document_loader() {
            loader.stop_loading(notify);
        }

        // A callback may have started another load, which stays.
        if provisional
            .as_ref()
            .is_some_and(|loader| self.is_provisional_document_loader(loader))
        {
            self.set_provisional_document_loader(None);
        }
        let provisional_cancelled =
            provisional.is_some() && self.provisional_document_loader.borrow().is_none();
        if clear_provisional_item == ClearProvisionalItem::Yes {
            frame.history().set_provisional_item(None);
            if provisional_cancelled {
                self.restore_history_after_cancelled_traversal(&frame);
            }
        }
        if self.provisional_document_loader.borrow().is_none() {
            self.loading_from_cached_page.set(false);
            if self.state.get() == FrameState::Provisional {
                self.state.set(FrameState::Complete);
            }
        }

        self.in_stop_all_loaders.set(false);
        self.check_completed();
    }

    /// The provisional load of the main frame ended without committing. If it
    /// was a history traversal, the back/forward list already moved to its
    /// target and has to move back.
    fn restore_history_after_cancelled_traversal(&self, frame: &Frame) {
        if frame.is_main_frame() && self.load_type.get().is_back_forward() {
            frame.history().restore_list_to_current_item();
        }
    }

    /// Move from committed to complete once the main resource, all
    /// subresources, and every subframe are done.
    pub(crate) fn check_completed(&self) {
        let Some(frame) = self.frame.upgrade() else {
            return;
        };
        if self.state.get() != FrameState::Committed || self.in_stop_all_loaders.get() {
            return;
        }
        let Some(loader) = self.document_loader() else {
            return;
        };
        if loader.is_loading() {
            return;
        }
        let children_loading = frame.children().iter().any(|child| {
            child.loader().is_loading() || child.loader().state() != FrameState::Complete
        });
        if children_loading {
            return;
        }

        self.state.set(FrameState::Complete);
        frame.history().update_for_frame_load_completed();
        debug!("{} finished loading {}", frame.id(), loader.url());

        let page = frame.page();
        if loader.main_resource_error().is_none() {
            if let Some(delegate) = page.as_ref().map(|page| page.delegate()) {
                delegate.did_finish_load(&frame);
            }
        }
        if let Some(parent) = frame.parent() {
            parent.loader().schedule_check_load_complete();
        }
    }

    fn schedule_check_load_complete(&self) {
        if self.pending_load_check.get().is_some() {
            return;
        }
        let Some(frame) = self.frame.upgrade() else {
            return;
        };
        let Some(page) = frame.page() else {
            return;
        };
        let timer = page.queue_timer(
            Duration::ZERO,
            TimerTask::CheckLoadComplete { frame: frame.id() },
        );
        self.pending_load_check.set(Some(timer));
    }

    pub(crate) fn check_load_complete_timer_fired(&self) {
        self.pending_load_check.set(None);
        self.check_completed();
    }

    /// Whether the commit that started at `epoch` for `provisional` may go on.
    fn commit_is_current(&self, frame: &Frame, provisional: &Rc<DocumentLoader>, epoch: Epoch) -> bool {
        frame.page().is_some() &&
            self.epoch.get() == epoch &&
            self.is_provisional_document_loader(provisional)
    }

    /// Turn the provisional load into the frame's live load.
    fn commit_provisional_load(&self) {
        let Some(frame) = self.frame.upgrade() else {
            return;
        };
        let Some(page) = frame.page() else {
            warn!("Commit in detached {}", frame.id());
            return;
        };
        let Some(provisional) = self.provisional_document_loader() else {
            return;
        };
        let load_type = self.load_type.get();
        let history = frame.history();

        // Pin the snapshot being restored, so capturing the outgoing page
        // cannot evict it.
        let mut cached_page = None;
        if self.loading_from_cached_page.get() {
            cached_page = history
                .provisional_item()
                .and_then(|item| page.page_cache().borrow_mut().take(&item));
            if cached_page.is_none() {
                debug!("Snapshot expired before commit, loading from the network");
                self.reload_provisional_item_from_network(&frame, &page);
                return;
            }
        }

        history.save_document_and_scroll_state();

        let mut captured = false;
        if frame.is_main_frame() {
            if let Some(current_item) = history
                .current_item()
                .filter(|item| !item.is_in_page_cache())
            {
                let can_cache = page.page_cache().borrow().can_cache(&page);
                if can_cache {
                    captured = page.page_cache().borrow_mut().add(&current_item, &page);
                }
            }
        }

        if !captured {
            let epoch = self.epoch.get();
            if !self.fire_unload_handlers(&frame, &provisional, epoch) {
                warn!(
                    "Commit of {} in {} was interrupted by an unload handler",
                    provisional.url(),
                    frame.id()
                );
                return;
            }
            frame.detach_children();
            if let Some(document) = frame.set_document(None) {
                document.prepare_for_destruction();
            }
            // Detaching subframes stopped their loads, which notifies the embedder.
            if !self.commit_is_current(&frame, &provisional, epoch) {
                warn!("Commit of {} in {} was interrupted", provisional.url(), frame.id());
                return;
            }
        }

        self.set_document_loader(Some(provisional.clone()));
        self.set_provisional_document_loader(None);
        provisional.set_committed();
        self.state.set(FrameState::Committed);
        history.update_for_commit();

        let restored = cached_page.and_then(|snapshot| snapshot.restore(&frame));
        let from_page_cache = restored.is_some();
        if !from_page_cache {
            frame.set_document(Some(Document::new(provisional.url())));
            frame.set_view(Some(FrameView::default()));
        }

        match load_type {
            FrameLoadType::Standard => history.update_for_standard_load(),
            FrameLoadType::Back | FrameLoadType::Forward | FrameLoadType::IndexedBackForward => {
                history.update_for_back_forward_navigation()
            },
            FrameLoadType::Reload | FrameLoadType::ReloadFromOrigin | FrameLoadType::Same => {
                history.update_for_reload()
            },
            FrameLoadType::Replace => history.update_for_replace(),
            FrameLoadType::RedirectWithLockedBackForwardList => {
                history.update_for_redirect_with_locked_back_forward_list()
            },
        }

        if !from_page_cache && (load_type.is_back_forward() || load_type.is_reload()) {
            history.restore_document_state();
            history.restore_scroll_position_and_view_state();
        }

        debug!(
            "Committed {} in {} ({:?}{})",
            provisional.url(),
            frame.id(),
            load_type,
            if from_page_cache { ", from the page cache" } else { "" }
        );

        let delegate = page.delegate();
        delegate.did_commit_load(&frame);
        if from_page_cache {
            delegate.did_restore_from_page_cache(&frame);
            self.loading_from_cached_page.set(false);
            self.check_completed();
        }
    }

    /// Fire the unload handlers of every document in the frame's subtree.
    /// Returns false as soon as a handler invalidated the commit.
    fn fire_unload_handlers(&self, frame: &Frame, provisional: &Rc<DocumentLoader>, epoch: Epoch) -> bool {
        for target in frame.self_and_descendants() {
            let Some(document) = target.document() else {
                continue;
            };
            if document.unload_event_fired() {
                continue;
            }
            document.mark_unload_fired();
            for handler in document.unload_handlers() {
                handler(&target);
                if !self.commit_is_current(frame, provisional, epoch) {
                    return false;
                }
            }
        }
        true
    }

    fn reload_provisional_item_from_network(&self, frame: &Frame, page: &Page) {
        self.loading_from_cached_page.set(false);
        let Some(item) = frame.history().provisional_item() else {
            self.set_provisional_document_loader(None);
            return;
        };
        let request = LoadRequest {
            url: item.url(),
            referrer: item.referrer(),
            form_data: item.form_data(),
        };
        let loader = DocumentLoader::new(request);
        self.set_provisional_document_loader(Some(loader.clone()));
        self.start_provisional_fetch(frame, page, &loader);
    }

    /// Navigate within the current document, as for a fragment link or a
    /// history traversal between entries of the same document.
    pub(crate) fn load_in_same_document(
        &self,
        url: Url,
        state_object: Option<Vec<u8>>,
        navigation: SameDocumentNavigation,
    ) {
        let Some(frame) = self.frame.upgrade() else {
            return;
        };
        // Navigating within the document cancels a load of another one.
        if self.provisional_document_loader.borrow().is_some() {
            self.stop_all_loaders_with_policy(ClearProvisionalItem::No);
        }
        let Some(document) = frame.document() else {
            return;
        };

        let old_url = document.url();
        document.set_url(url.clone());
        if let Some(loader) = self.document_loader() {
            loader.replace_request_url_for_same_document_navigation(url.clone());
        }

        let history = frame.history();
        if navigation == SameDocumentNavigation::Push &&
            old_url != url &&
            state_object.is_none()
        {
            history.update_back_forward_list_for_fragment_scroll();
        }
        history.update_for_same_document_navigation();
        if navigation == SameDocumentNavigation::Traversal {
            document.state_popped(state_object);
        }
        debug!("{} navigated within its document to {}", frame.id(), url);

        if let Some(delegate) = frame.page().map(|page| page.delegate()) {
            delegate.did_navigate_in_same_document(&frame);
        }
    }
}

fn should_perform_fragment_navigation(frame: &Frame, url: &Url) -> bool {
    if url.fragment().is_none() {
        return false;
    }
    let Some(document) = frame.document() else {
        return false;
    };
    !document.is_initial_empty_document() && equal_ignoring_fragment(&document.url(), url)
}

fn should_treat_url_as_same_as_current(frame: &Frame, url: &Url) -> bool {
    frame.document().is_some_and(|document| {
        !document.is_initial_empty_document() && document.url() == *url
    })
}
