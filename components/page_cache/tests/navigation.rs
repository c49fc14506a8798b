/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::cell::Cell;
use std::rc::Rc;

use euclid::Point2D;
use page_cache::{
    Frame, FrameLoadType, FrameState, LoadError, LoadRequest, LoaderDelegate, Page,
    PageCacheState, ResourceResponse,
};

use crate::common::{
    Event, FakeNetwork, commit, commit_traversal, current_url, list_urls, navigate, new_page, url,
};

#[test]
fn first_navigation_adds_an_entry() {
    let (page, network) = new_page(3, 10);
    let main_id = page.main_frame().id();
    page.load_url(url("http://a.test/"));
    assert_eq!(page.main_frame().loader().state(), FrameState::Provisional);
    assert!(page.main_frame().loader().is_loading());

    commit(page.main_frame(), "http://a.test/");
    assert_eq!(page.main_frame().loader().state(), FrameState::Complete);
    assert_eq!(list_urls(&page), ["http://a.test/"]);
    assert_eq!(
        network.events(),
        [
            Event::StartProvisional(main_id),
            Event::Fetch(main_id, url("http://a.test/")),
            Event::Commit(main_id),
            Event::Finish(main_id),
        ]
    );
}

#[test]
fn new_frames_start_with_an_empty_document() {
    let (page, _network) = new_page(3, 10);
    let document = page.main_frame().document().unwrap();
    assert!(document.is_initial_empty_document());
    assert_eq!(document.url().as_str(), "about:blank");
    let loader = page.main_frame().loader().document_loader().unwrap();
    assert_eq!(loader.url().as_str(), "about:blank");
    assert!(loader.is_committed());
    assert!(list_urls(&page).is_empty());
}

#[test]
fn going_back_restores_the_same_document() {
    let (page, network) = new_page(3, 10);
    let main_id = page.main_frame().id();
    navigate(&page, "http://a.test/");
    let a_document = page.main_frame().document().unwrap();
    navigate(&page, "http://b.test/");
    let b_document = page.main_frame().document().unwrap();
    assert_eq!(a_document.page_cache_state(), PageCacheState::InCache);
    assert_eq!(a_document.page_hide_count(), 1);
    network.take_events();

    assert!(page.can_go_back());
    assert!(page.go_back());

    assert!(Rc::ptr_eq(&page.main_frame().document().unwrap(), &a_document));
    assert_eq!(a_document.page_cache_state(), PageCacheState::NotInCache);
    assert_eq!(a_document.page_show_count(), 1);
    assert_eq!(current_url(&page), url("http://a.test/"));
    assert_eq!(page.back_forward_list().current_index(), Some(0));
    assert_eq!(page.main_frame().loader().state(), FrameState::Complete);
    assert_eq!(
        network.events(),
        [
            Event::StartProvisional(main_id),
            Event::Commit(main_id),
            Event::RestoreFromPageCache(main_id),
            Event::Finish(main_id),
        ]
    );

    // The page that was left is cached in turn.
    assert_eq!(b_document.page_cache_state(), PageCacheState::InCache);
    assert!(page.back_forward_list().entries()[1].is_in_page_cache());
    assert!(!page.back_forward_list().entries()[0].is_in_page_cache());

    assert!(page.go_forward());
    assert!(Rc::ptr_eq(&page.main_frame().document().unwrap(), &b_document));
}

#[test]
fn cached_pages_keep_their_scroll_position() {
    let (page, _network) = new_page(3, 10);
    navigate(&page, "http://a.test/");
    page.main_frame().scroll_to(Point2D::new(0.0, 480.0));
    page.main_frame().focus_element(Some("search"));
    navigate(&page, "http://b.test/");
    assert_eq!(page.main_frame().scroll_position(), Point2D::origin());

    assert!(page.go_back());
    assert_eq!(page.main_frame().scroll_position(), Point2D::new(0.0, 480.0));
    assert_eq!(page.main_frame().focused_element().as_deref(), Some("search"));
}

#[test]
fn network_traversals_restore_saved_state() {
    let (page, network) = new_page(0, 10);
    navigate(&page, "http://a.test/");
    page.main_frame().scroll_to(Point2D::new(10.0, 200.0));
    page.main_frame()
        .document()
        .unwrap()
        .set_form_state(vec!["query=rust".to_owned()]);
    navigate(&page, "http://b.test/");
    network.take_events();

    assert!(page.go_back());
    assert_eq!(network.fetched_urls(), [url("http://a.test/")]);
    commit_traversal(&page);

    let document = page.main_frame().document().unwrap();
    assert_eq!(document.form_state(), ["query=rust"]);
    assert_eq!(page.main_frame().scroll_position(), Point2D::new(10.0, 200.0));
    assert_eq!(page.back_forward_list().current_index(), Some(0));
    assert_eq!(list_urls(&page), ["http://a.test/", "http://b.test/"]);
}

#[test]
fn an_unload_handler_can_start_another_navigation() {
    let (page, network) = new_page(3, 10);
    let main_id = page.main_frame().id();
    navigate(&page, "http://a.test/");
    let a_document = page.main_frame().document().unwrap();
    let fired = Rc::new(Cell::new(0));
    let counter = fired.clone();
    a_document.add_unload_handler(Rc::new(move |frame: &Frame| {
        counter.set(counter.get() + 1);
        frame.page().unwrap().load_url(url("http://c.test/"));
    }));

    page.load_url(url("http://b.test/"));
    network.take_events();
    page.main_frame()
        .loader()
        .did_receive_response(ResourceResponse::new(url("http://b.test/")));

    // The commit of b was abandoned in favor of c.
    assert_eq!(fired.get(), 1);
    assert!(Rc::ptr_eq(&page.main_frame().document().unwrap(), &a_document));
    assert!(!a_document.is_destroyed());
    assert_eq!(
        page.main_frame()
            .loader()
            .provisional_document_loader()
            .unwrap()
            .url(),
        url("http://c.test/")
    );
    assert_eq!(
        network.events(),
        [
            Event::Fail(main_id, LoadError::Cancelled),
            Event::StartProvisional(main_id),
            Event::Fetch(main_id, url("http://c.test/")),
        ]
    );

    commit(page.main_frame(), "http://c.test/");
    assert_eq!(fired.get(), 1);
    assert!(a_document.is_destroyed());
    assert_eq!(current_url(&page), url("http://c.test/"));
    assert_eq!(list_urls(&page), ["http://a.test/", "http://c.test/"]);
}

struct StopOnStart;

impl LoaderDelegate for StopOnStart {
    fn did_start_provisional_load(&self, frame: &Frame) {
        frame.loader().stop_all_loaders();
    }
}

#[test]
fn a_delegate_can_stop_a_load_as_it_starts() {
    let (page, _network) = new_page(3, 10);
    navigate(&page, "http://a.test/");
    let document = page.main_frame().document().unwrap();

    page.set_delegate(Rc::new(StopOnStart));
    page.load_url(url("http://b.test/"));
    assert!(page.main_frame().loader().provisional_document_loader().is_none());
    assert_eq!(page.main_frame().loader().state(), FrameState::Complete);
    assert!(Rc::ptr_eq(&page.main_frame().document().unwrap(), &document));
    assert_eq!(list_urls(&page), ["http://a.test/"]);
}

#[test]
fn stopping_cancels_the_provisional_load() {
    let (page, network) = new_page(3, 10);
    let main_id = page.main_frame().id();
    navigate(&page, "http://a.test/");
    page.load_url(url("http://b.test/"));
    network.take_events();

    page.main_frame().loader().stop_all_loaders();
    assert!(!page.main_frame().loader().is_loading());
    assert_eq!(network.events(), [Event::Fail(main_id, LoadError::Cancelled)]);
    assert_eq!(current_url(&page), url("http://a.test/"));

    // A late response for the cancelled load is ignored.
    commit(page.main_frame(), "http://b.test/");
    assert_eq!(current_url(&page), url("http://a.test/"));
}

#[test]
fn a_failed_provisional_load_keeps_the_current_page() {
    let (page, network) = new_page(3, 10);
    let main_id = page.main_frame().id();
    navigate(&page, "http://a.test/");
    page.load_url(url("http://unreachable.test/"));
    network.take_events();

    let error = LoadError::Network("connection refused".to_owned());
    page.main_frame().loader().did_fail_loading(error.clone());
    assert_eq!(network.events(), [Event::Fail(main_id, error)]);
    assert_eq!(current_url(&page), url("http://a.test/"));
    assert_eq!(page.main_frame().loader().state(), FrameState::Complete);
    assert_eq!(list_urls(&page), ["http://a.test/"]);
}

/// A page at `b` with `a` behind it, going back to `a` over the network.
fn page_going_back_over_the_network() -> (Rc<Page>, Rc<FakeNetwork>) {
    let (page, network) = new_page(0, 10);
    navigate(&page, "http://a.test/");
    navigate(&page, "http://b.test/");
    assert!(page.go_back());
    assert_eq!(network.fetched_urls().last(), Some(&url("http://a.test/")));
    assert!(page.main_frame().history().provisional_item().is_some());
    network.take_events();
    (page, network)
}

fn assert_list_follows_the_shown_page(page: &Page) {
    assert_eq!(current_url(page), url("http://b.test/"));
    let list_item = page.back_forward_list().current_item().unwrap();
    let shown_item = page.main_frame().history().current_item().unwrap();
    assert!(Rc::ptr_eq(&list_item, &shown_item));
    assert_eq!(page.back_forward_list().current_index(), Some(1));
    assert!(page.main_frame().history().provisional_item().is_none());
    assert!(page.can_go_back());
    assert!(!page.can_go_forward());
}

#[test]
fn a_failed_traversal_leaves_the_list_at_the_shown_entry() {
    let (page, network) = page_going_back_over_the_network();
    let main_id = page.main_frame().id();

    let error = LoadError::Network("connection refused".to_owned());
    page.main_frame().loader().did_fail_loading(error.clone());
    assert_eq!(network.events(), [Event::Fail(main_id, error)]);
    assert_list_follows_the_shown_page(&page);

    assert!(page.go_back());
    assert_eq!(network.fetched_urls(), [url("http://a.test/")]);
    commit_traversal(&page);
    assert_eq!(current_url(&page), url("http://a.test/"));
    assert_eq!(page.back_forward_list().current_index(), Some(0));
}

#[test]
fn a_stopped_traversal_leaves_the_list_at_the_shown_entry() {
    let (page, network) = page_going_back_over_the_network();
    let main_id = page.main_frame().id();

    page.main_frame().loader().stop_all_loaders();
    assert_eq!(network.events(), [Event::Fail(main_id, LoadError::Cancelled)]);
    assert_list_follows_the_shown_page(&page);
}

#[test]
fn a_traversal_replacing_another_keeps_its_target() {
    let (page, network) = new_page(0, 10);
    navigate(&page, "http://a.test/");
    navigate(&page, "http://b.test/");
    navigate(&page, "http://c.test/");
    assert!(page.go_back());
    assert!(page.go_back());
    assert_eq!(
        network.fetched_urls()[3..],
        [url("http://b.test/"), url("http://a.test/")]
    );
    assert_eq!(page.back_forward_list().current_index(), Some(0));

    commit_traversal(&page);
    assert_eq!(current_url(&page), url("http://a.test/"));
    assert_eq!(page.back_forward_list().current_index(), Some(0));
}

#[test]
fn reloading_never_uses_the_page_cache() {
    let (page, network) = new_page(3, 10);
    navigate(&page, "http://a.test/");
    navigate(&page, "http://b.test/");
    let b_document = page.main_frame().document().unwrap();
    network.take_events();

    page.reload(false);
    assert_eq!(page.main_frame().loader().load_type(), FrameLoadType::Reload);
    assert_eq!(network.fetched_urls(), [url("http://b.test/")]);
    commit(page.main_frame(), "http://b.test/");

    assert!(b_document.is_destroyed());
    assert_eq!(list_urls(&page), ["http://a.test/", "http://b.test/"]);
    assert!(!page.back_forward_list().entries()[1].is_in_page_cache());
    assert_eq!(page.page_cache().borrow().page_count(), 1);
}

#[test]
fn loading_the_current_url_again_does_not_add_an_entry() {
    let (page, _network) = new_page(3, 10);
    navigate(&page, "http://a.test/");
    let document = page.main_frame().document().unwrap();

    page.load_url(url("http://a.test/"));
    assert_eq!(page.main_frame().loader().load_type(), FrameLoadType::Same);
    commit(page.main_frame(), "http://a.test/");
    assert!(document.is_destroyed());
    assert_eq!(list_urls(&page), ["http://a.test/"]);
    assert_eq!(page.page_cache().borrow().page_count(), 0);
}

#[test]
fn replace_loads_reuse_the_current_entry() {
    let (page, _network) = new_page(3, 10);
    navigate(&page, "http://a.test/");
    navigate(&page, "http://b.test/");
    let entry = page.back_forward_list().current_item().unwrap();
    let old_sequence_number = entry.item_sequence_number();

    page.main_frame().loader().load(
        LoadRequest::new(url("http://b2.test/")),
        FrameLoadType::Replace,
    );
    commit(page.main_frame(), "http://b2.test/");

    assert_eq!(list_urls(&page), ["http://a.test/", "http://b2.test/"]);
    assert!(Rc::ptr_eq(&page.back_forward_list().current_item().unwrap(), &entry));
    assert_ne!(entry.item_sequence_number(), old_sequence_number);
    assert!(!entry.is_in_page_cache());
}

#[test]
fn go_moves_by_an_offset() {
    let (page, network) = new_page(5, 10);
    for address in ["http://a.test/", "http://b.test/", "http://c.test/"] {
        navigate(&page, address);
    }
    network.take_events();

    assert!(!page.go(-3));
    assert!(page.go(-2));
    assert_eq!(current_url(&page), url("http://a.test/"));
    assert_eq!(page.back_forward_list().current_index(), Some(0));
    assert!(network.fetched_urls().is_empty());

    assert!(page.go(2));
    assert_eq!(current_url(&page), url("http://c.test/"));
    assert!(!page.can_go_forward());

    assert!(page.go(0));
    assert_eq!(network.fetched_urls(), [url("http://c.test/")]);
}

#[test]
fn traversals_wait_while_loading_is_deferred() {
    let (page, _network) = new_page(3, 10);
    navigate(&page, "http://a.test/");
    navigate(&page, "http://b.test/");

    page.set_defers_loading(true);
    assert!(page.go_back());
    assert_eq!(current_url(&page), url("http://b.test/"));
    assert_eq!(page.back_forward_list().current_index(), Some(1));

    page.set_defers_loading(false);
    assert_eq!(current_url(&page), url("http://a.test/"));
    assert_eq!(page.back_forward_list().current_index(), Some(0));
}

#[test]
fn cached_subframes_come_back_with_their_page() {
    let (page, network) = new_page(3, 10);
    navigate(&page, "http://a.test/");
    let child = page
        .main_frame()
        .load_url_into_child_frame("sidebar", LoadRequest::new(url("http://side.test/")));
    commit(&child, "http://side.test/");
    let child_document = child.document().unwrap();

    navigate(&page, "http://b.test/");
    assert_eq!(page.main_frame().child_count(), 0);
    assert!(child.page().is_none());
    assert_eq!(page.page_cache().borrow().frame_count(), 2);
    network.take_events();

    assert!(page.go_back());
    let restored = page.main_frame().child("sidebar").unwrap();
    assert!(restored.ptr_eq(&child));
    assert!(child.page().is_some());
    assert!(Rc::ptr_eq(&child.document().unwrap(), &child_document));
    assert_eq!(child.loader().state(), FrameState::Complete);
    assert!(network.fetched_urls().is_empty());
}
