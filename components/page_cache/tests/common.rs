/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::cell::RefCell;
use std::rc::Rc;

use base::id::FrameId;
use page_cache::{
    BackForwardList, Frame, LoadError, LoadRequest, LoaderDelegate, Page, PageCacheStore,
    ResourceResponse,
};
use url::Url;

/// Everything the loader told the embedder, in order.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Fetch(FrameId, Url),
    StartProvisional(FrameId),
    Commit(FrameId),
    RestoreFromPageCache(FrameId),
    Finish(FrameId),
    Fail(FrameId, LoadError),
    SameDocument(FrameId),
}

/// A delegate that never answers fetches on its own; tests answer them with
/// [`commit`] and friends.
#[derive(Default)]
pub struct FakeNetwork {
    events: RefCell<Vec<Event>>,
}

impl FakeNetwork {
    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    pub fn take_events(&self) -> Vec<Event> {
        self.events.take()
    }

    pub fn fetched_urls(&self) -> Vec<Url> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                Event::Fetch(_, url) => Some(url.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: Event) {
        self.events.borrow_mut().push(event);
    }
}

impl LoaderDelegate for FakeNetwork {
    fn fetch(&self, frame: &Frame, request: &LoadRequest) {
        self.record(Event::Fetch(frame.id(), request.url.clone()));
    }

    fn did_start_provisional_load(&self, frame: &Frame) {
        self.record(Event::StartProvisional(frame.id()));
    }

    fn did_commit_load(&self, frame: &Frame) {
        self.record(Event::Commit(frame.id()));
    }

    fn did_restore_from_page_cache(&self, frame: &Frame) {
        self.record(Event::RestoreFromPageCache(frame.id()));
    }

    fn did_finish_load(&self, frame: &Frame) {
        self.record(Event::Finish(frame.id()));
    }

    fn did_fail_load(&self, frame: &Frame, error: &LoadError) {
        self.record(Event::Fail(frame.id(), error.clone()));
    }

    fn did_navigate_in_same_document(&self, frame: &Frame) {
        self.record(Event::SameDocument(frame.id()));
    }
}

pub fn url(address: &str) -> Url {
    Url::parse(address).unwrap()
}

/// A page with its own page cache and a recording delegate.
pub fn new_page(cache_capacity: usize, list_capacity: usize) -> (Rc<Page>, Rc<FakeNetwork>) {
    let store = Rc::new(RefCell::new(PageCacheStore::new(cache_capacity)));
    new_page_with_store(store, list_capacity)
}

pub fn new_page_with_store(
    store: Rc<RefCell<PageCacheStore>>,
    list_capacity: usize,
) -> (Rc<Page>, Rc<FakeNetwork>) {
    let page = Page::new(store, BackForwardList::new(list_capacity));
    let network = Rc::new(FakeNetwork::default());
    page.set_delegate(network.clone());
    (page, network)
}

/// Answer the provisional load of `frame` and finish its main resource.
pub fn commit(frame: &Frame, address: &str) {
    frame
        .loader()
        .did_receive_response(ResourceResponse::new(url(address)));
    frame.loader().did_finish_loading();
}

/// Load `address` into the main frame and let it finish.
pub fn navigate(page: &Page, address: &str) {
    page.load_url(url(address));
    commit(page.main_frame(), address);
}

/// Answer the provisional load of the main frame, which a traversal started.
pub fn commit_traversal(page: &Page) {
    let url = page
        .main_frame()
        .loader()
        .provisional_document_loader()
        .unwrap()
        .url();
    commit(page.main_frame(), url.as_str());
}

pub fn current_url(page: &Page) -> Url {
    page.main_frame().url().unwrap()
}

pub fn list_urls(page: &Page) -> Vec<String> {
    page.back_forward_list()
        .entries()
        .iter()
        .map(|entry| entry.url().to_string())
        .collect()
}
