/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::rc::Rc;
use std::time::{Duration, Instant};

use page_cache::{FrameState, LoadRequest, ResourceResponse, SubstituteData};

use crate::common::{Event, commit, current_url, list_urls, navigate, new_page, url};

fn offline_page() -> SubstituteData {
    SubstituteData {
        content: b"<p>You are offline</p>".to_vec(),
        mime_type: "text/html".to_owned(),
        response_url: url("http://a.test/"),
        is_error_page: true,
    }
}

#[test]
fn substitute_data_is_delivered_from_a_timer() {
    let (page, network) = new_page(3, 10);
    let main_id = page.main_frame().id();
    page.main_frame()
        .loader()
        .load_substitute_data(LoadRequest::new(url("http://a.test/")), offline_page());
    assert_eq!(page.main_frame().loader().state(), FrameState::Provisional);
    assert!(page.has_pending_timers());
    assert_eq!(page.timer_timeout(Instant::now()), Some(Duration::ZERO));

    assert_eq!(page.run_timers(Instant::now()), 1);
    assert_eq!(page.main_frame().loader().state(), FrameState::Complete);
    let document = page.main_frame().document().unwrap();
    assert_eq!(document.url(), url("http://a.test/"));
    assert_eq!(document.bytes_received(), offline_page().content.len());
    assert_eq!(list_urls(&page), ["http://a.test/"]);
    assert!(network.fetched_urls().is_empty());
    assert_eq!(
        network.events(),
        [
            Event::StartProvisional(main_id),
            Event::Commit(main_id),
            Event::Finish(main_id),
        ]
    );
}

#[test]
fn deferred_loading_holds_back_timers() {
    let (page, _network) = new_page(3, 10);
    page.main_frame()
        .loader()
        .load_substitute_data(LoadRequest::new(url("http://a.test/")), offline_page());

    page.set_defers_loading(true);
    assert_eq!(page.run_timers(Instant::now()), 0);
    assert_eq!(page.main_frame().loader().state(), FrameState::Provisional);

    page.set_defers_loading(false);
    assert_eq!(page.run_timers(Instant::now()), 1);
    assert_eq!(page.main_frame().loader().state(), FrameState::Complete);
}

#[test]
fn scheduled_redirects_replace_the_current_entry() {
    let (page, network) = new_page(3, 10);
    navigate(&page, "http://a.test/");
    let a_document = page.main_frame().document().unwrap();
    let entry = page.back_forward_list().current_item().unwrap();
    network.take_events();

    page.main_frame()
        .loader()
        .schedule_redirect(url("http://b.test/"), Duration::from_secs(2));
    assert_eq!(page.run_timers(Instant::now()), 0);
    assert!(network.fetched_urls().is_empty());

    assert_eq!(page.run_timers(Instant::now() + Duration::from_secs(2)), 1);
    assert_eq!(network.fetched_urls(), [url("http://b.test/")]);
    let loader = page
        .main_frame()
        .loader()
        .provisional_document_loader()
        .unwrap();
    assert!(loader.is_client_redirect());
    commit(page.main_frame(), "http://b.test/");

    assert_eq!(current_url(&page), url("http://b.test/"));
    assert_eq!(list_urls(&page), ["http://b.test/"]);
    let current = page.back_forward_list().current_item().unwrap();
    assert!(Rc::ptr_eq(&current, &entry));
    assert!(!entry.is_in_page_cache());
    assert!(a_document.is_destroyed());
}

#[test]
fn a_new_redirect_replaces_the_scheduled_one() {
    let (page, network) = new_page(3, 10);
    navigate(&page, "http://a.test/");
    network.take_events();

    let loader = page.main_frame().loader();
    loader.schedule_redirect(url("http://b.test/"), Duration::from_secs(2));
    loader.schedule_redirect(url("http://c.test/"), Duration::from_secs(3));
    assert!(page.has_pending_timers());

    assert_eq!(page.run_timers(Instant::now() + Duration::from_secs(5)), 1);
    assert_eq!(network.fetched_urls(), [url("http://c.test/")]);
}

#[test]
fn stopping_cancels_a_scheduled_redirect() {
    let (page, network) = new_page(3, 10);
    navigate(&page, "http://a.test/");
    let now = Instant::now();
    page.main_frame()
        .loader()
        .schedule_redirect(url("http://b.test/"), Duration::from_secs(10));
    assert!(page.timer_timeout(now).unwrap() >= Duration::from_secs(10));
    assert!(!page.main_frame().loader().quick_redirect_coming());

    page.main_frame().loader().stop_all_loaders();
    assert!(!page.has_pending_timers());
    assert_eq!(page.timer_timeout(now), None);
    assert_eq!(page.run_timers(now + Duration::from_secs(10)), 0);
    assert_eq!(network.fetched_urls(), [url("http://a.test/")]);
}

#[test]
fn a_frame_completes_after_its_subframes() {
    let (page, network) = new_page(3, 10);
    let main_frame = page.main_frame();
    page.load_url(url("http://a.test/"));
    main_frame
        .loader()
        .did_receive_response(ResourceResponse::new(url("http://a.test/")));
    let child = main_frame
        .load_url_into_child_frame("ad", LoadRequest::new(url("http://ad.test/")));
    main_frame.loader().did_finish_loading();
    assert_eq!(main_frame.loader().state(), FrameState::Committed);

    commit(&child, "http://ad.test/");
    assert_eq!(child.loader().state(), FrameState::Complete);
    assert_eq!(main_frame.loader().state(), FrameState::Committed);
    assert!(page.has_pending_timers());
    assert!(!network.events().contains(&Event::Finish(main_frame.id())));

    assert_eq!(page.run_timers(Instant::now()), 1);
    assert_eq!(main_frame.loader().state(), FrameState::Complete);
    assert_eq!(network.events().last(), Some(&Event::Finish(main_frame.id())));
    assert!(page.can_cache());
}

#[test]
fn subresources_keep_a_frame_loading() {
    let (page, network) = new_page(3, 10);
    let main_frame = page.main_frame();
    page.load_url(url("http://a.test/"));
    main_frame
        .loader()
        .did_receive_response(ResourceResponse::new(url("http://a.test/")));
    main_frame.loader().subresource_load_started();
    main_frame.loader().did_finish_loading();
    assert_eq!(main_frame.loader().state(), FrameState::Committed);

    main_frame.loader().subresource_load_finished();
    assert_eq!(main_frame.loader().state(), FrameState::Complete);
    assert_eq!(network.events().last(), Some(&Event::Finish(main_frame.id())));
}
