/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use base::CSSPixel;
use base::id::FrameId;
use euclid::Point2D;
use url::Url;

use crate::document::Document;
use crate::document_loader::LoadRequest;
use crate::eligibility::{CacheBlockers, FrameLoadState, FrameTreeView};
use crate::frame_loader::{FrameLoadType, FrameLoader};
use crate::history::HistoryController;
use crate::page::Page;

/// Presentation state of a frame that is saved into history entries and kept
/// with cached pages.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameView {
    pub scroll_position: Point2D<f32, CSSPixel>,
    pub page_scale_factor: f32,
    pub focused_element: Option<String>,
}

impl Default for FrameView {
    fn default() -> FrameView {
        FrameView {
            scroll_position: Point2D::origin(),
            page_scale_factor: 1.0,
            focused_element: None,
        }
    }
}

/// A browsing context: a node of a page's frame tree.
#[derive(Clone)]
pub struct Frame(Rc<FrameInner>);

struct FrameInner {
    id: FrameId,
    is_main_frame: bool,
    name: RefCell<String>,
    page: RefCell<Weak<Page>>,
    parent: RefCell<Weak<FrameInner>>,
    children: RefCell<Vec<Frame>>,
    document: RefCell<Option<Rc<Document>>>,
    view: RefCell<Option<FrameView>>,
    loader: FrameLoader,
    history: HistoryController,
}

/// A non-owning handle to a [`Frame`], held by the frame's own loader and
/// history controller.
#[derive(Clone, Default)]
pub(crate) struct WeakFrame(Weak<FrameInner>);

impl WeakFrame {
    pub(crate) fn upgrade(&self) -> Option<Frame> {
        self.0.upgrade().map(Frame)
    }
}

impl Frame {
    pub(crate) fn new_main_frame(page: Weak<Page>) -> Frame {
        Frame::new(page, Weak::new(), String::new(), true)
    }

    fn new(page: Weak<Page>, parent: Weak<FrameInner>, name: String, is_main_frame: bool) -> Frame {
        Frame(Rc::new_cyclic(|weak| FrameInner {
            id: FrameId::new(),
            is_main_frame,
            name: RefCell::new(name),
            page: RefCell::new(page),
            parent: RefCell::new(parent),
            children: RefCell::new(Vec::new()),
            document: RefCell::new(Some(Document::new_initial_empty())),
            view: RefCell::new(Some(FrameView::default())),
            loader: FrameLoader::new(WeakFrame(weak.clone())),
            history: HistoryController::new(WeakFrame(weak.clone())),
        }))
    }

    pub fn id(&self) -> FrameId {
        self.0.id
    }

    pub fn name(&self) -> String {
        self.0.name.borrow().clone()
    }

    pub fn is_main_frame(&self) -> bool {
        self.0.is_main_frame
    }

    pub fn ptr_eq(&self, other: &Frame) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn downgrade(&self) -> WeakFrame {
        WeakFrame(Rc::downgrade(&self.0))
    }

    /// The page this frame belongs to. `None` once the frame was detached,
    /// including while it sits inside a cached page.
    pub fn page(&self) -> Option<Rc<Page>> {
        self.0.page.borrow().upgrade()
    }

    pub(crate) fn set_page(&self, page: Weak<Page>) {
        *self.0.page.borrow_mut() = page;
    }

    pub fn parent(&self) -> Option<Frame> {
        self.0.parent.borrow().upgrade().map(Frame)
    }

    pub fn main_frame(&self) -> Option<Frame> {
        match self.parent() {
            Some(parent) => parent.main_frame(),
            None if self.is_main_frame() => Some(self.clone()),
            None => None,
        }
    }

    pub fn children(&self) -> Vec<Frame> {
        self.0.children.borrow().clone()
    }

    pub fn child_count(&self) -> usize {
        self.0.children.borrow().len()
    }

    pub fn child(&self, name: &str) -> Option<Frame> {
        self.0
            .children
            .borrow()
            .iter()
            .find(|child| *child.0.name.borrow() == name)
            .cloned()
    }

    /// This frame and all of its descendants, in tree order.
    pub fn self_and_descendants(&self) -> Vec<Frame> {
        let mut frames = vec![self.clone()];
        for child in self.children() {
            frames.extend(child.self_and_descendants());
        }
        frames
    }

    pub fn find_descendant(&self, id: FrameId) -> Option<Frame> {
        self.self_and_descendants()
            .into_iter()
            .find(|frame| frame.id() == id)
    }

    /// Create a subframe named `name` that shows the initial empty document.
    pub fn create_child(&self, name: &str) -> Frame {
        let child = Frame::new(
            self.0.page.borrow().clone(),
            Rc::downgrade(&self.0),
            name.to_owned(),
            false,
        );
        self.0.children.borrow_mut().push(child.clone());
        child
    }

    /// Load `request` into the subframe named `name`, creating it if needed.
    ///
    /// While this frame is itself being loaded from history, the subframe is
    /// loaded from the matching child of this frame's history entry instead.
    pub fn load_url_into_child_frame(&self, name: &str, request: LoadRequest) -> Frame {
        let child = self.child(name).unwrap_or_else(|| self.create_child(name));
        let load_type = self.loader().load_type();
        if load_type.is_back_forward() {
            let child_item = self
                .history()
                .current_item()
                .and_then(|item| item.child_with_target(name));
            if let Some(child_item) = child_item {
                child
                    .loader()
                    .load_different_document_item(&child_item, load_type);
                return child;
            }
        }
        child
            .loader()
            .load(request, FrameLoadType::RedirectWithLockedBackForwardList);
        child
    }

    pub(crate) fn append_child(&self, child: Frame) {
        *child.0.parent.borrow_mut() = Rc::downgrade(&self.0);
        self.0.children.borrow_mut().push(child);
    }

    pub(crate) fn remove_child(&self, child: &Frame) {
        self.0
            .children
            .borrow_mut()
            .retain(|existing| !existing.ptr_eq(child));
        *child.0.parent.borrow_mut() = Weak::new();
    }

    /// Detach and destroy every subframe.
    pub(crate) fn detach_children(&self) {
        for child in self.children() {
            child.detach();
        }
    }

    /// Stop this frame's loads, destroy its documents, and remove it from the
    /// frame tree.
    pub(crate) fn detach(&self) {
        self.loader().stop_all_loaders();
        self.detach_children();
        if let Some(document) = self.set_document(None) {
            document.prepare_for_destruction();
        }
        self.set_view(None);
        self.loader().set_document_loader(None);
        self.history().clear();
        if let Some(parent) = self.parent() {
            parent.remove_child(self);
        }
        self.set_page(Weak::new());
    }

    pub fn document(&self) -> Option<Rc<Document>> {
        self.0.document.borrow().clone()
    }

    pub(crate) fn set_document(&self, document: Option<Rc<Document>>) -> Option<Rc<Document>> {
        self.0.document.replace(document)
    }

    pub fn url(&self) -> Option<Url> {
        self.document().map(|document| document.url())
    }

    pub fn view(&self) -> Option<FrameView> {
        self.0.view.borrow().clone()
    }

    pub(crate) fn set_view(&self, view: Option<FrameView>) -> Option<FrameView> {
        self.0.view.replace(view)
    }

    pub fn scroll_position(&self) -> Point2D<f32, CSSPixel> {
        self.0
            .view
            .borrow()
            .as_ref()
            .map_or(Point2D::origin(), |view| view.scroll_position)
    }

    pub fn scroll_to(&self, position: Point2D<f32, CSSPixel>) {
        if let Some(view) = self.0.view.borrow_mut().as_mut() {
            view.scroll_position = position;
        }
    }

    pub fn set_page_scale_factor(&self, scale: f32) {
        if let Some(view) = self.0.view.borrow_mut().as_mut() {
            view.page_scale_factor = scale;
        }
    }

    pub fn focus_element(&self, element: Option<&str>) {
        if let Some(view) = self.0.view.borrow_mut().as_mut() {
            view.focused_element = element.map(str::to_owned);
        }
    }

    pub fn focused_element(&self) -> Option<String> {
        self.0
            .view
            .borrow()
            .as_ref()
            .and_then(|view| view.focused_element.clone())
    }

    pub fn loader(&self) -> &FrameLoader {
        &self.0.loader
    }

    pub fn history(&self) -> &HistoryController {
        &self.0.history
    }
}

impl FrameTreeView for Frame {
    fn children(&self) -> Vec<Frame> {
        Frame::children(self)
    }

    fn load_state(&self) -> FrameLoadState {
        let loader = self.loader();
        let document_loader = loader.document_loader();
        let document = self.document();
        FrameLoadState {
            has_page: self.page().is_some(),
            has_committed_load: document.is_some() &&
                document_loader
                    .as_ref()
                    .is_some_and(|document_loader| document_loader.is_committed()),
            is_initial_empty_document: document
                .as_ref()
                .is_some_and(|document| document.is_initial_empty_document()),
            has_history_entry: self.history().current_item().is_some(),
            main_resource_failed: document_loader
                .as_ref()
                .is_some_and(|document_loader| document_loader.main_resource_error().is_some()),
            is_loading: document_loader
                .as_ref()
                .is_some_and(|document_loader| document_loader.is_loading()) ||
                (!self.is_main_frame() && loader.provisional_document_loader().is_some()),
            is_stopping: loader.is_stopping(),
            quick_redirect_coming: loader.quick_redirect_coming(),
        }
    }

    fn exclusion_flags(&self) -> CacheBlockers {
        let mut blockers = CacheBlockers::empty();
        if let Some(document) = self.document() {
            if document.has_unload_handlers() {
                blockers |= CacheBlockers::UNLOAD_LISTENER;
            }
            if document.plugins() > 0 {
                blockers |= CacheBlockers::HAS_PLUGINS;
            }
            if document.open_databases() > 0 {
                blockers |= CacheBlockers::OPEN_DATABASES;
            }
            if document.shared_workers() > 0 {
                blockers |= CacheBlockers::SHARED_WORKERS;
            }
            if !document.can_suspend_active_dom_objects() {
                blockers |= CacheBlockers::CANNOT_SUSPEND_ACTIVE_DOM_OBJECTS;
            }
        }
        if let Some(document_loader) = self.loader().document_loader() {
            if document_loader.substitute_data().is_some() {
                blockers |= CacheBlockers::SUBSTITUTE_DATA;
            }
            if document_loader
                .response()
                .is_some_and(|response| response.is_secure() && response.cache_control_no_store)
            {
                blockers |= CacheBlockers::SECURE_NO_STORE;
            }
            if !document_loader.application_cache_allows_page_cache() {
                blockers |= CacheBlockers::APPLICATION_CACHE;
            }
        }
        let denied = self
            .page()
            .and_then(|page| page.cache_policy())
            .is_some_and(|policy| !policy.can_cache_frame(self));
        if denied {
            blockers |= CacheBlockers::CLIENT_DENIED;
        }
        blockers
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter
            .debug_struct("Frame")
            .field("id", &self.0.id)
            .field("name", &self.0.name.borrow())
            .field("is_main_frame", &self.0.is_main_frame)
            .field("children", &self.child_count())
            .finish()
    }
}
