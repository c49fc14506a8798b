/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use base::id::DocumentLoaderId;
use log::debug;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::document::about_blank;

/// The body of a form submission, kept with a history entry so that the
/// navigation can be repeated.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct FormData {
    pub content_type: String,
    pub body: Vec<u8>,
}

/// A request for the main resource of a document.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadRequest {
    pub url: Url,
    pub referrer: Option<Url>,
    pub form_data: Option<FormData>,
}

impl LoadRequest {
    pub fn new(url: Url) -> LoadRequest {
        LoadRequest {
            url,
            referrer: None,
            form_data: None,
        }
    }

    pub fn with_referrer(mut self, referrer: Url) -> LoadRequest {
        self.referrer = Some(referrer);
        self
    }

    pub fn with_form_data(mut self, form_data: FormData) -> LoadRequest {
        self.form_data = Some(form_data);
        self
    }
}

/// The response headers of the main resource, as far as the page cache cares.
#[derive(Clone, Debug, PartialEq)]
pub struct ResourceResponse {
    pub url: Url,
    pub status: u16,
    pub mime_type: String,
    /// `Cache-Control: no-store` was present.
    pub cache_control_no_store: bool,
}

impl ResourceResponse {
    pub fn new(url: Url) -> ResourceResponse {
        ResourceResponse {
            url,
            status: 200,
            mime_type: "text/html".to_owned(),
            cache_control_no_store: false,
        }
    }

    pub fn with_no_store(mut self) -> ResourceResponse {
        self.cache_control_no_store = true;
        self
    }

    pub fn is_secure(&self) -> bool {
        self.url.scheme() == "https"
    }
}

/// Content supplied directly by the embedder instead of being fetched, such
/// as an error page.
#[derive(Clone, Debug, PartialEq)]
pub struct SubstituteData {
    pub content: Vec<u8>,
    pub mime_type: String,
    pub response_url: Url,
    pub is_error_page: bool,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LoadError {
    /// The load was stopped before it completed.
    Cancelled,
    /// The network layer reported an error.
    Network(String),
    /// The server answered with an error status and no content to show.
    HttpStatus(u16),
}

impl fmt::Display for LoadError {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LoadError::Cancelled => formatter.write_str("load cancelled"),
            LoadError::Network(reason) => write!(formatter, "network error: {reason}"),
            LoadError::HttpStatus(status) => write!(formatter, "HTTP status {status}"),
        }
    }
}

impl std::error::Error for LoadError {}

/// Load state for one document: its request, its response, and whether the
/// main resource or any subresource is still in flight.
pub struct DocumentLoader {
    id: DocumentLoaderId,
    request: RefCell<LoadRequest>,
    original_url: Url,
    response: RefCell<Option<ResourceResponse>>,
    substitute_data: Option<SubstituteData>,
    main_resource_error: RefCell<Option<LoadError>>,
    /// The main resource has been requested and has not finished.
    is_loading: Cell<bool>,
    is_stopping: Cell<bool>,
    committed: Cell<bool>,
    is_client_redirect: Cell<bool>,
    application_cache_allows_page_cache: Cell<bool>,
    pending_subresources: Cell<usize>,
}

impl DocumentLoader {
    pub fn new(request: LoadRequest) -> Rc<DocumentLoader> {
        Rc::new(Self::new_inherited(request, None))
    }

    pub fn with_substitute_data(
        request: LoadRequest,
        substitute_data: SubstituteData,
    ) -> Rc<DocumentLoader> {
        Rc::new(Self::new_inherited(request, Some(substitute_data)))
    }

    /// The loader for the initial `about:blank` document of a new frame.
    pub(crate) fn for_initial_empty_document() -> Rc<DocumentLoader> {
        let loader = Self::new_inherited(LoadRequest::new(about_blank()), None);
        loader.committed.set(true);
        Rc::new(loader)
    }

    fn new_inherited(
        request: LoadRequest,
        substitute_data: Option<SubstituteData>,
    ) -> DocumentLoader {
        DocumentLoader {
            id: DocumentLoaderId::new(),
            original_url: request.url.clone(),
            request: RefCell::new(request),
            response: RefCell::new(None),
            substitute_data,
            main_resource_error: RefCell::new(None),
            is_loading: Cell::new(false),
            is_stopping: Cell::new(false),
            committed: Cell::new(false),
            is_client_redirect: Cell::new(false),
            application_cache_allows_page_cache: Cell::new(true),
            pending_subresources: Cell::new(0),
        }
    }

    pub fn id(&self) -> DocumentLoaderId {
        self.id
    }

    pub fn request(&self) -> Ref<'_, LoadRequest> {
        self.request.borrow()
    }

    /// The URL of the loaded document: the response URL once there is one.
    pub fn url(&self) -> Url {
        match &*self.response.borrow() {
            Some(response) => response.url.clone(),
            None => self.request.borrow().url.clone(),
        }
    }

    pub fn original_url(&self) -> Url {
        self.original_url.clone()
    }

    pub fn response(&self) -> Option<ResourceResponse> {
        self.response.borrow().clone()
    }

    pub fn substitute_data(&self) -> Option<&SubstituteData> {
        self.substitute_data.as_ref()
    }

    pub fn main_resource_error(&self) -> Option<LoadError> {
        self.main_resource_error.borrow().clone()
    }

    pub fn is_committed(&self) -> bool {
        self.committed.get()
    }

    pub fn is_client_redirect(&self) -> bool {
        self.is_client_redirect.get()
    }

    pub fn is_loading_main_resource(&self) -> bool {
        self.is_loading.get()
    }

    /// Whether the main resource or any subresource is still loading.
    pub fn is_loading(&self) -> bool {
        self.is_loading.get() || self.pending_subresources.get() > 0
    }

    pub fn is_stopping(&self) -> bool {
        self.is_stopping.get()
    }

    pub fn application_cache_allows_page_cache(&self) -> bool {
        self.application_cache_allows_page_cache.get()
    }

    pub fn set_application_cache_allows_page_cache(&self, allows: bool) {
        self.application_cache_allows_page_cache.set(allows);
    }

    pub fn pending_subresources(&self) -> usize {
        self.pending_subresources.get()
    }

    pub(crate) fn begin_subresource_load(&self) {
        self.pending_subresources
            .set(self.pending_subresources.get() + 1);
    }

    pub(crate) fn finish_subresource_load(&self) {
        self.pending_subresources
            .set(self.pending_subresources.get().saturating_sub(1));
    }

    pub(crate) fn start_loading(&self) {
        self.is_loading.set(true);
    }

    pub(crate) fn finish_loading(&self) {
        self.is_loading.set(false);
    }

    pub(crate) fn set_response(&self, response: ResourceResponse) {
        *self.response.borrow_mut() = Some(response);
    }

    pub(crate) fn set_main_resource_error(&self, error: LoadError) {
        self.is_loading.set(false);
        *self.main_resource_error.borrow_mut() = Some(error);
    }

    pub(crate) fn set_committed(&self) {
        self.committed.set(true);
    }

    pub(crate) fn set_is_client_redirect(&self, is_client_redirect: bool) {
        self.is_client_redirect.set(is_client_redirect);
    }

    /// Pretend the document was loaded from `url`, after a fragment navigation
    /// or a `pushState`.
    pub(crate) fn replace_request_url_for_same_document_navigation(&self, url: Url) {
        self.request.borrow_mut().url = url.clone();
        if let Some(response) = self.response.borrow_mut().as_mut() {
            response.url = url;
        }
    }

    /// A loader restored from the page cache is reused for the new navigation,
    /// which must not look like a failed or stopped load.
    pub(crate) fn prepare_for_cached_load(&self) {
        self.is_stopping.set(false);
        self.is_client_redirect.set(false);
    }

    /// Cancel everything still in flight. `did_cancel` is called while the
    /// loader reports that it is stopping.
    pub(crate) fn stop_loading(&self, did_cancel: impl FnOnce(&LoadError)) {
        if !self.is_loading() || self.is_stopping.get() {
            return;
        }
        debug!("Stopping {}", self.id);
        self.is_stopping.set(true);
        self.pending_subresources.set(0);
        if self.is_loading.get() {
            self.set_main_resource_error(LoadError::Cancelled);
        }
        did_cancel(&LoadError::Cancelled);
        self.is_stopping.set(false);
    }
}

impl fmt::Debug for DocumentLoader {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter
            .debug_struct("DocumentLoader")
            .field("id", &self.id)
            .field("url", &self.url().as_str())
            .field("committed", &self.committed.get())
            .field("is_loading", &self.is_loading())
            .finish()
    }
}
